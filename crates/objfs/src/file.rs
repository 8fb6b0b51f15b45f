//! Open file and directory handles.
//!
//! A [`StorageFile`] is either a directory handle or a file handle, decided
//! once when it is opened. A file handle owns a full in-memory copy of the
//! object; reads and writes touch only that copy, and the backend sees the
//! result at [`sync`](StorageFile::sync) or [`close`](StorageFile::close).
//!
//! # Handle States
//!
//! | State     | Data ops      | `readdir` / `readdir_names` | `stat`, `sync`, `close` |
//! |-----------|---------------|-----------------------------|-------------------------|
//! | directory | `IsDirectory` | pages through the listing   | allowed                 |
//! | file      | allowed       | `NotDirectory`              | allowed                 |
//! | closed    | `Closed`      | `Closed`                    | `close` is a no-op      |

use std::io::{self, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::buffer::ContentBuffer;
use crate::context::FsContext;
use crate::error::{FsError, FsResult};
use crate::info::FileInfo;
use crate::listing;
use crate::mode::{FileMode, OpenFlags};
use crate::path;

/// An open file or directory.
///
/// All operations lock a per-handle mutex, so a handle can be shared across
/// threads. Separate handles on the same path do not see each other's
/// buffered writes.
pub struct StorageFile {
    ctx: Arc<FsContext>,
    name: String,
    flags: OpenFlags,
    is_dir: bool,
    state: Mutex<HandleState>,
}

struct HandleState {
    buffer: ContentBuffer,
    /// Cursor for `read`/`write`; never negative.
    offset: i64,
    closed: bool,
    info: FileInfo,
    /// Directory handles: the listing, fetched on the first `readdir`.
    listing: Option<Vec<FileInfo>>,
    dir_index: usize,
}

impl HandleState {
    fn new(buffer: ContentBuffer, info: FileInfo) -> Self {
        Self {
            buffer,
            offset: 0,
            closed: false,
            info,
            listing: None,
            dir_index: 0,
        }
    }
}

impl StorageFile {
    /// Open `name`, which must already be normalized.
    pub(crate) fn open(
        ctx: Arc<FsContext>,
        name: String,
        flags: OpenFlags,
        perm: FileMode,
    ) -> FsResult<Self> {
        if ctx.dir_exists(&name)? {
            let synthetic = || {
                FileInfo::synthetic_dir(path::base_name(&name), ctx.config.default_dir_mode)
            };
            let info = match ctx.sidecar().load(&name) {
                Ok(Some(info)) => info,
                Ok(None) => synthetic(),
                Err(e) => {
                    warn!(path = %name, error = %e, "unreadable directory record");
                    synthetic()
                }
            };
            trace!(path = %name, "opened directory handle");
            return Ok(Self {
                ctx,
                name,
                flags,
                is_dir: true,
                state: Mutex::new(HandleState::new(ContentBuffer::new(), info)),
            });
        }

        if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) && ctx.data_exists(&name)? {
            return Err(FsError::already_exists(name));
        }

        let buffer = Self::load_content(&ctx, &name, flags)?;

        let info = match ctx.sidecar().load(&name) {
            Ok(Some(info)) => info,
            Ok(None) => FileInfo::synthetic_file(path::base_name(&name), buffer.len() as i64, perm),
            Err(e) => {
                warn!(path = %name, error = %e, "unreadable metadata record");
                FileInfo::synthetic_file(path::base_name(&name), buffer.len() as i64, perm)
            }
        };

        trace!(path = %name, ?flags, len = buffer.len(), "opened file handle");
        Ok(Self {
            ctx,
            name,
            flags,
            is_dir: false,
            state: Mutex::new(HandleState::new(buffer, info)),
        })
    }

    /// Initial buffer contents for a file handle.
    fn load_content(ctx: &FsContext, name: &str, flags: OpenFlags) -> FsResult<ContentBuffer> {
        let create = flags.contains(OpenFlags::CREATE);
        let truncate = flags.contains(OpenFlags::TRUNCATE);

        if flags.can_read() {
            let mut buffer = match ctx.storage().get(name) {
                Ok(data) => ContentBuffer::from(data),
                Err(e) if e.is_not_found() && create => ContentBuffer::new(),
                Err(e) if e.is_not_found() => return Err(FsError::not_exist(name)),
                Err(e) => return Err(e.into()),
            };
            if truncate && flags.can_write() {
                buffer.clear();
            }
            return Ok(buffer);
        }

        // Write-only: keep existing bytes only when they are going to be extended.
        if flags.contains(OpenFlags::APPEND) || (create && !truncate) {
            return Ok(ctx
                .storage()
                .get(name)
                .map(ContentBuffer::from)
                .unwrap_or_default());
        }
        Ok(ContentBuffer::new())
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self, state: &HandleState) -> FsResult<()> {
        if state.closed {
            return Err(FsError::closed(&self.name));
        }
        Ok(())
    }

    /// Open and not a directory.
    fn check_data(&self, state: &HandleState) -> FsResult<()> {
        self.check_open(state)?;
        if self.is_dir {
            return Err(FsError::is_directory(&self.name));
        }
        Ok(())
    }

    fn check_readable(&self, state: &HandleState) -> FsResult<()> {
        self.check_data(state)?;
        if !self.flags.can_read() {
            return Err(FsError::permission_denied("read", &self.name));
        }
        Ok(())
    }

    fn check_writable(&self, state: &HandleState, op: &'static str) -> FsResult<()> {
        self.check_data(state)?;
        if !self.flags.can_write() {
            return Err(FsError::permission_denied(op, &self.name));
        }
        Ok(())
    }

    /// The normalized path this handle was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Read from the cursor, advancing it. Returns `Ok(0)` at end of file.
    pub fn read(&self, buf: &mut [u8]) -> FsResult<usize> {
        let mut state = self.lock();
        self.check_readable(&state)?;

        let offset = to_index(state.offset)?;
        let n = state.buffer.read_at(buf, offset);
        state.offset += n as i64;
        trace!(path = %self.name, offset, n, "read");
        Ok(n)
    }

    /// Read at `offset` without moving the cursor.
    ///
    /// May return fewer bytes than `buf` holds; returns `Ok(0)` at or past
    /// the end.
    pub fn read_at(&self, buf: &mut [u8], offset: i64) -> FsResult<usize> {
        let state = self.lock();
        self.check_readable(&state)?;

        let offset = non_negative(offset, "read offset")?;
        let n = state.buffer.read_at(buf, offset);
        trace!(path = %self.name, offset, n, "read_at");
        Ok(n)
    }

    /// The whole buffer, independent of the cursor.
    pub(crate) fn contents(&self) -> FsResult<Vec<u8>> {
        let state = self.lock();
        self.check_readable(&state)?;
        Ok(state.buffer.as_slice().to_vec())
    }

    /// Write at the cursor (at the end with `APPEND`), advancing it.
    pub fn write(&self, data: &[u8]) -> FsResult<usize> {
        let mut state = self.lock();
        self.check_writable(&state, "write")?;

        if self.flags.contains(OpenFlags::APPEND) {
            state.offset = state.buffer.len() as i64;
        }
        let offset = to_index(state.offset)?;
        let next = state
            .offset
            .checked_add(data.len() as i64)
            .ok_or_else(|| FsError::InvalidArgument(format!("write at {offset} overflows")))?;
        state.buffer.splice_at(offset, data)?;
        state.offset = next;
        trace!(path = %self.name, offset, n = data.len(), "write");
        Ok(data.len())
    }

    /// Write at `offset` without moving the cursor. `APPEND` does not apply.
    pub fn write_at(&self, data: &[u8], offset: i64) -> FsResult<usize> {
        let mut state = self.lock();
        self.check_writable(&state, "write")?;

        let offset = non_negative(offset, "write offset")?;
        state.buffer.splice_at(offset, data)?;
        trace!(path = %self.name, offset, n = data.len(), "write_at");
        Ok(data.len())
    }

    pub fn write_string(&self, s: &str) -> FsResult<usize> {
        self.write(s.as_bytes())
    }

    /// Move the cursor. Seeking past the end is allowed; the gap is
    /// zero-filled by the next write.
    pub fn seek(&self, pos: SeekFrom) -> FsResult<u64> {
        let mut state = self.lock();
        self.check_data(&state)?;

        let target = match pos {
            SeekFrom::Start(n) => i64::try_from(n).ok(),
            SeekFrom::Current(delta) => state.offset.checked_add(delta),
            SeekFrom::End(delta) => (state.buffer.len() as i64).checked_add(delta),
        };
        let target = match target {
            Some(t) if t >= 0 => t,
            _ => {
                return Err(FsError::InvalidArgument(format!(
                    "seek to {pos:?} resolves outside the file"
                )))
            }
        };

        state.offset = target;
        trace!(path = %self.name, offset = target, "seek");
        Ok(target as u64)
    }

    /// Shrink or zero-extend the buffer to exactly `size` bytes. The cursor
    /// does not move.
    pub fn truncate(&self, size: i64) -> FsResult<()> {
        let mut state = self.lock();
        self.check_writable(&state, "truncate")?;

        let len = non_negative(size, "size")?;
        state.buffer.resize(len)?;
        state.info.set_size(size);
        trace!(path = %self.name, size, "truncate");
        Ok(())
    }

    /// Write the buffer and its metadata record back to the backend.
    ///
    /// A no-op for directory handles and for handles opened without write
    /// intent.
    pub fn sync(&self) -> FsResult<()> {
        let mut state = self.lock();
        self.check_open(&state)?;
        self.flush_locked(&mut state)
    }

    /// Sync and release the handle. Closing twice is a no-op.
    ///
    /// The handle is closed even when the final write-back fails; the error
    /// is still returned.
    pub fn close(&self) -> FsResult<()> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut HandleState) -> FsResult<()> {
        if self.is_dir || !self.flags.has_write_intent() {
            return Ok(());
        }

        let data = state.buffer.to_bytes();
        let len = data.len();
        self.ctx.storage().put(&self.name, data)?;

        state.info.set_size(len as i64);
        state.info.set_mod_time(Utc::now());
        self.ctx.sidecar().store(&self.name, &state.info)?;

        debug!(path = %self.name, len, "synced file");
        Ok(())
    }

    /// Cached attributes, with the size taken from the live buffer.
    pub fn stat(&self) -> FsResult<FileInfo> {
        let mut state = self.lock();
        self.check_open(&state)?;
        if !self.is_dir {
            let len = state.buffer.len() as i64;
            state.info.set_size(len);
        }
        Ok(state.info.clone())
    }

    /// Next entries of a directory handle.
    ///
    /// `count <= 0` returns everything that is left; a positive count returns
    /// at most that many. Once the listing is exhausted the result is empty.
    /// The listing is fetched on the first call and then served from the
    /// handle.
    pub fn readdir(&self, count: isize) -> FsResult<Vec<FileInfo>> {
        let mut state = self.lock();
        self.check_open(&state)?;
        if !self.is_dir {
            return Err(FsError::not_directory(&self.name));
        }

        if state.listing.is_none() {
            let entries = listing::read_dir_entries(&self.ctx, &self.name)?;
            state.listing = Some(entries.into_iter().map(|e| e.into_info()).collect());
        }

        let HandleState {
            listing, dir_index, ..
        } = &mut *state;
        let all = listing.as_deref().unwrap_or_default();
        let remaining = &all[(*dir_index).min(all.len())..];
        let take = match usize::try_from(count) {
            Ok(n) if n > 0 => n.min(remaining.len()),
            _ => remaining.len(),
        };
        let page = remaining[..take].to_vec();
        *dir_index += take;

        trace!(path = %self.name, count, returned = page.len(), "readdir");
        Ok(page)
    }

    /// Like [`readdir`](Self::readdir), returning only names.
    pub fn readdir_names(&self, count: isize) -> FsResult<Vec<String>> {
        Ok(self
            .readdir(count)?
            .into_iter()
            .map(|info| info.name().to_string())
            .collect())
    }
}

/// Convert a POSIX `whence` (0 = start, 1 = current, 2 = end) and offset
/// into a [`SeekFrom`].
pub fn seek_from_whence(offset: i64, whence: i32) -> FsResult<SeekFrom> {
    match whence {
        0 => u64::try_from(offset).map(SeekFrom::Start).map_err(|_| {
            FsError::InvalidArgument(format!("negative offset {offset} from start"))
        }),
        1 => Ok(SeekFrom::Current(offset)),
        2 => Ok(SeekFrom::End(offset)),
        other => Err(FsError::InvalidArgument(format!("invalid whence {other}"))),
    }
}

fn non_negative(value: i64, what: &str) -> FsResult<usize> {
    if value < 0 {
        return Err(FsError::InvalidArgument(format!("negative {what} {value}")));
    }
    to_index(value)
}

fn to_index(value: i64) -> FsResult<usize> {
    usize::try_from(value)
        .map_err(|_| FsError::InvalidArgument(format!("offset {value} out of range")))
}

impl std::fmt::Debug for StorageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("StorageFile")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("is_dir", &self.is_dir)
            .field("len", &state.buffer.len())
            .field("offset", &state.offset)
            .field("closed", &state.closed)
            .finish()
    }
}

impl io::Read for StorageFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(StorageFile::read(self, buf)?)
    }
}

impl io::Read for &StorageFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(StorageFile::read(*self, buf)?)
    }
}

/// `flush` does nothing: only [`StorageFile::sync`] reaches the backend.
impl io::Write for StorageFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(StorageFile::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &StorageFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(StorageFile::write(*self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for StorageFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(StorageFile::seek(self, pos)?)
    }
}

impl io::Seek for &StorageFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(StorageFile::seek(*self, pos)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    use bytes::Bytes;
    use objfs_storage::{FaultOp, InMemoryStorage, Storage};
    use proptest::prelude::*;

    use crate::StorageFs;

    fn setup() -> (Arc<InMemoryStorage>, StorageFs) {
        let storage = Arc::new(InMemoryStorage::new());
        let fs = StorageFs::from_backend(storage.clone());
        (storage, fs)
    }

    fn rw() -> OpenFlags {
        OpenFlags::READ_WRITE | OpenFlags::CREATE
    }

    fn perm() -> FileMode {
        FileMode::from_bits(0o644)
    }

    fn read_all(file: &StorageFile) -> Vec<u8> {
        let mut out = Vec::new();
        let mut reader = file;
        reader.read_to_end(&mut out).unwrap();
        out
    }

    // ---- opening ----

    #[test]
    fn open_missing_read_only_is_not_exist() {
        let (_, fs) = setup();
        let err = fs.open("nope.txt").unwrap_err();
        assert!(err.is_not_exist());
    }

    #[test]
    fn write_only_create_leaves_empty_object() {
        let (storage, fs) = setup();
        let file = fs
            .open_file("empty", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, perm())
            .unwrap();
        file.close().unwrap();
        assert_eq!(storage.get("empty").unwrap(), Bytes::new());
        assert!(storage.contains(".meta/empty"));
    }

    #[test]
    fn exclusive_create_rejects_existing() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"x")).unwrap();
        let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::EXCLUSIVE;
        assert!(fs.open_file("f", flags, perm()).unwrap_err().is_already_exists());
        assert!(fs.open_file("g", flags, perm()).is_ok());
    }

    #[test]
    fn truncate_flag_discards_content() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"old")).unwrap();
        let file = fs
            .open_file("f", OpenFlags::READ_WRITE | OpenFlags::TRUNCATE, perm())
            .unwrap();
        assert_eq!(file.stat().unwrap().size(), 0);
        file.close().unwrap();
        assert!(storage.get("f").unwrap().is_empty());
    }

    #[test]
    fn truncate_flag_ignored_for_read_only() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"keep")).unwrap();
        let file = fs.open_file("f", OpenFlags::TRUNCATE, perm()).unwrap();
        assert_eq!(read_all(&file), b"keep");
    }

    #[test]
    fn write_only_without_create_starts_empty() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"gone")).unwrap();
        let file = fs.open_file("f", OpenFlags::WRITE_ONLY, perm()).unwrap();
        file.write(b"new").unwrap();
        file.close().unwrap();
        assert_eq!(storage.get("f").unwrap(), Bytes::from_static(b"new"));
    }

    #[test]
    fn write_only_create_preserves_content() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"abcdef")).unwrap();
        let file = fs
            .open_file("f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, perm())
            .unwrap();
        file.write(b"XY").unwrap();
        file.close().unwrap();
        assert_eq!(storage.get("f").unwrap(), Bytes::from_static(b"XYcdef"));
    }

    #[test]
    fn backend_error_on_open_propagates() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"x")).unwrap();
        storage.fail_next(FaultOp::Get, "f");
        let err = fs.open("f").unwrap_err();
        assert!(matches!(err, FsError::Storage(_)));
    }

    #[test]
    fn seeded_metadata_uses_perm_and_length() {
        let (storage, fs) = setup();
        storage.put("dir/f", Bytes::from_static(b"12345")).unwrap();
        let file = fs
            .open_file("/dir//f", OpenFlags::READ_ONLY, FileMode::from_bits(0o600))
            .unwrap();
        assert_eq!(file.name(), "dir/f");
        let info = file.stat().unwrap();
        assert_eq!(info.name(), "f");
        assert_eq!(info.size(), 5);
        assert_eq!(info.mode().bits(), 0o600);
    }

    // ---- reading and writing ----

    #[test]
    fn read_advances_and_hits_end() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"hello")).unwrap();
        let file = fs.open("f").unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(file.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_at_leaves_cursor() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"abcdef")).unwrap();
        let file = fs.open("f").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(file.read_at(&mut buf, 4).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(file.read_at(&mut buf, 6).unwrap(), 0);
        assert_eq!(file.read_at(&mut buf, 60).unwrap(), 0);
        assert!(matches!(
            file.read_at(&mut buf, -1),
            Err(FsError::InvalidArgument(_))
        ));
        assert_eq!(read_all(&file), b"abcdef");
    }

    #[test]
    fn write_overwrites_in_place() {
        let (_, fs) = setup();
        let file = fs.create("f").unwrap();
        file.write_string("hello world").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.write(b"HELLO").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(read_all(&file), b"HELLO world");
    }

    #[test]
    fn write_past_end_zero_pads() {
        let (_, fs) = setup();
        let file = fs.create("f").unwrap();
        file.write(b"ab").unwrap();
        file.seek(SeekFrom::Start(5)).unwrap();
        file.write(b"cd").unwrap();
        assert_eq!(file.stat().unwrap().size(), 7);
        let mut buf = [0xffu8; 7];
        file.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"ab\0\0\0cd");
    }

    #[test]
    fn append_writes_at_end() {
        let (storage, fs) = setup();
        storage.put("log", Bytes::from_static(b"one\n")).unwrap();
        let file = fs
            .open_file("log", OpenFlags::WRITE_ONLY | OpenFlags::APPEND, perm())
            .unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.write(b"two\n").unwrap();
        file.write_at(b"ONE", 0).unwrap();
        file.close().unwrap();
        assert_eq!(storage.get("log").unwrap(), Bytes::from_static(b"ONE\ntwo\n"));
    }

    #[test]
    fn write_at_leaves_cursor() {
        let (_, fs) = setup();
        let file = fs.create("f").unwrap();
        file.write(b"abc").unwrap();
        file.write_at(b"Z", 10).unwrap();
        assert_eq!(file.seek(SeekFrom::Current(0)).unwrap(), 3);
        assert_eq!(file.stat().unwrap().size(), 11);
        assert!(matches!(
            file.write_at(b"x", -4),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn access_mode_is_enforced() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"data")).unwrap();

        let ro = fs.open("f").unwrap();
        assert!(matches!(ro.write(b"x"), Err(FsError::PermissionDenied { .. })));
        assert!(matches!(ro.truncate(0), Err(FsError::PermissionDenied { .. })));

        let wo = fs.open_file("f", OpenFlags::WRITE_ONLY, perm()).unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(wo.read(&mut buf), Err(FsError::PermissionDenied { .. })));
        assert!(matches!(wo.read_at(&mut buf, 0), Err(FsError::PermissionDenied { .. })));
    }

    // ---- seek ----

    #[test]
    fn seek_variants() {
        let (_, fs) = setup();
        let file = fs.create("f").unwrap();
        file.write(b"0123456789").unwrap();

        assert_eq!(file.seek(SeekFrom::Start(2)).unwrap(), 2);
        assert_eq!(file.seek(SeekFrom::Current(3)).unwrap(), 5);
        assert_eq!(file.seek(SeekFrom::End(-1)).unwrap(), 9);
        assert_eq!(file.seek(SeekFrom::End(5)).unwrap(), 15);

        assert!(matches!(
            file.seek(SeekFrom::End(-11)),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            file.seek(SeekFrom::Start(u64::MAX)),
            Err(FsError::InvalidArgument(_))
        ));
        // A failed seek leaves the cursor alone.
        assert_eq!(file.seek(SeekFrom::Current(0)).unwrap(), 15);
    }

    #[test]
    fn whence_conversion() {
        assert_eq!(seek_from_whence(4, 0).unwrap(), SeekFrom::Start(4));
        assert_eq!(seek_from_whence(-4, 1).unwrap(), SeekFrom::Current(-4));
        assert_eq!(seek_from_whence(-1, 2).unwrap(), SeekFrom::End(-1));
        assert!(matches!(seek_from_whence(0, 3), Err(FsError::InvalidArgument(_))));
        assert!(matches!(seek_from_whence(-1, 0), Err(FsError::InvalidArgument(_))));
    }

    // ---- truncate, sync, close ----

    #[test]
    fn truncate_grows_and_shrinks() {
        let (_, fs) = setup();
        let file = fs.create("f").unwrap();
        file.write(b"abcdef").unwrap();

        file.truncate(3).unwrap();
        assert_eq!(file.stat().unwrap().size(), 3);
        file.truncate(8).unwrap();
        assert_eq!(file.stat().unwrap().size(), 8);
        assert_eq!(file.seek(SeekFrom::Current(0)).unwrap(), 6);

        let mut buf = [0xffu8; 8];
        file.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"abc\0\0\0\0\0");
        assert!(matches!(file.truncate(-1), Err(FsError::InvalidArgument(_))));
    }

    #[test]
    fn unallocatable_sizes_are_rejected() {
        let (_, fs) = setup();
        let file = fs.create("f").unwrap();
        file.write(b"abc").unwrap();

        assert!(matches!(file.truncate(i64::MAX), Err(FsError::InvalidArgument(_))));
        assert!(matches!(file.write_at(b"x", i64::MAX - 1), Err(FsError::InvalidArgument(_))));

        file.seek(SeekFrom::Start(i64::MAX as u64)).unwrap();
        assert!(matches!(file.write(b"x"), Err(FsError::InvalidArgument(_))));
        assert_eq!(file.seek(SeekFrom::Current(0)).unwrap(), i64::MAX as u64);

        assert_eq!(file.stat().unwrap().size(), 3);
        file.close().unwrap();
        assert_eq!(fs.read_file("f").unwrap(), b"abc");
    }

    #[test]
    fn writes_reach_backend_only_on_sync() {
        let (storage, fs) = setup();
        let file = fs.create("f").unwrap();
        file.close().unwrap();

        let file = fs.open_file("f", OpenFlags::READ_WRITE, perm()).unwrap();
        file.write(b"pending").unwrap();
        assert!(storage.get("f").unwrap().is_empty());

        file.sync().unwrap();
        assert_eq!(storage.get("f").unwrap(), Bytes::from_static(b"pending"));
        let record = fs.stat("f").unwrap();
        assert_eq!(record.size(), 7);
    }

    #[test]
    fn read_only_close_does_not_write() {
        let (storage, fs) = setup();
        storage.put("f", Bytes::from_static(b"x")).unwrap();
        let file = fs.open("f").unwrap();
        file.close().unwrap();
        assert!(!storage.contains(".meta/f"));
    }

    #[test]
    fn closed_handle_rejects_operations() {
        let (_, fs) = setup();
        let file = fs.create("f").unwrap();
        file.close().unwrap();

        let mut buf = [0u8; 1];
        assert!(matches!(file.read(&mut buf), Err(FsError::Closed { .. })));
        assert!(matches!(file.write(b"x"), Err(FsError::Closed { .. })));
        assert!(matches!(file.seek(SeekFrom::Start(0)), Err(FsError::Closed { .. })));
        assert!(matches!(file.truncate(0), Err(FsError::Closed { .. })));
        assert!(matches!(file.sync(), Err(FsError::Closed { .. })));
        assert!(matches!(file.stat(), Err(FsError::Closed { .. })));
        assert!(matches!(file.readdir(0), Err(FsError::Closed { .. })));
        file.close().unwrap();
    }

    #[test]
    fn failed_close_still_closes() {
        let (storage, fs) = setup();
        let file = fs.create("f").unwrap();
        file.write(b"data").unwrap();
        storage.fail_next(FaultOp::Put, "f");

        assert!(matches!(file.close(), Err(FsError::Storage(_))));
        assert!(matches!(file.write(b"x"), Err(FsError::Closed { .. })));
        assert!(!storage.contains("f"));
    }

    #[test]
    fn sync_persists_metadata_mode() {
        let (storage, fs) = setup();
        let file = fs
            .open_file("f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, FileMode::from_bits(0o600))
            .unwrap();
        file.write(b"abc").unwrap();
        file.sync().unwrap();

        let raw = storage.get(".meta/f").unwrap();
        let record = FileInfo::from_json(&raw).unwrap();
        assert_eq!(record.name(), "f");
        assert_eq!(record.size(), 3);
        assert_eq!(record.mode().bits(), 0o600);
        assert!(!record.is_dir());
    }

    // ---- directory handles ----

    fn populated_dir(fs: &StorageFs) {
        fs.mkdir("d", FileMode::from_bits(0o755)).unwrap();
        fs.mkdir("d/sub", FileMode::from_bits(0o755)).unwrap();
        fs.write_file("d/a.txt", b"a", perm()).unwrap();
        fs.write_file("d/b.txt", b"bb", perm()).unwrap();
        fs.write_file("d/sub/deep.txt", b"c", perm()).unwrap();
    }

    #[test]
    fn directory_handle_rejects_data_ops() {
        let (_, fs) = setup();
        populated_dir(&fs);
        let dir = fs.open("d").unwrap();
        assert!(dir.is_dir());

        let mut buf = [0u8; 1];
        assert!(matches!(dir.read(&mut buf), Err(FsError::IsDirectory { .. })));
        assert!(matches!(dir.read_at(&mut buf, 0), Err(FsError::IsDirectory { .. })));
        assert!(matches!(dir.write(b"x"), Err(FsError::IsDirectory { .. })));
        assert!(matches!(dir.write_at(b"x", 0), Err(FsError::IsDirectory { .. })));
        assert!(matches!(dir.seek(SeekFrom::Start(0)), Err(FsError::IsDirectory { .. })));
        assert!(matches!(dir.truncate(0), Err(FsError::IsDirectory { .. })));

        assert!(dir.stat().unwrap().is_dir());
        dir.sync().unwrap();
        dir.close().unwrap();
    }

    #[test]
    fn directory_handle_with_write_flags_writes_nothing() {
        let (storage, fs) = setup();
        fs.mkdir("d", FileMode::from_bits(0o755)).unwrap();
        let before = storage.keys();
        let dir = fs.open_file("d", rw(), perm()).unwrap();
        dir.close().unwrap();
        assert_eq!(storage.keys(), before);
    }

    #[test]
    fn readdir_pages_then_signals_exhaustion() {
        let (_, fs) = setup();
        populated_dir(&fs);
        let dir = fs.open("d").unwrap();

        let first = dir.readdir(2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name(), "sub");
        assert!(first[0].is_dir());
        assert_eq!(first[1].name(), "a.txt");

        let rest = dir.readdir(10).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name(), "b.txt");
        assert_eq!(rest[0].size(), 2);

        assert!(dir.readdir(1).unwrap().is_empty());
        assert!(dir.readdir(0).unwrap().is_empty());
    }

    #[test]
    fn readdir_all_and_names() {
        let (_, fs) = setup();
        populated_dir(&fs);

        let dir = fs.open("d").unwrap();
        assert_eq!(dir.readdir(-1).unwrap().len(), 3);

        let dir = fs.open("d").unwrap();
        assert_eq!(dir.readdir_names(0).unwrap(), vec!["sub", "a.txt", "b.txt"]);
    }

    #[test]
    fn readdir_on_file_is_not_directory() {
        let (_, fs) = setup();
        let file = fs.create("f").unwrap();
        assert!(matches!(file.readdir(0), Err(FsError::NotDirectory { .. })));
        assert!(matches!(file.readdir_names(0), Err(FsError::NotDirectory { .. })));
    }

    #[test]
    fn root_handle_is_a_directory() {
        let (_, fs) = setup();
        fs.write_file("top", b"t", perm()).unwrap();
        let root = fs.open("/").unwrap();
        assert!(root.is_dir());
        assert_eq!(root.readdir_names(0).unwrap(), vec!["top"]);
    }

    // ---- std::io ----

    #[test]
    fn std_io_traits() {
        let (_, fs) = setup();
        let mut file = fs.create("io").unwrap();
        io::Write::write_all(&mut file, b"line one\nline two\n").unwrap();
        io::Write::flush(&mut file).unwrap();
        io::Seek::seek(&mut file, SeekFrom::Start(5)).unwrap();

        let mut rest = String::new();
        io::Read::read_to_string(&mut file, &mut rest).unwrap();
        assert_eq!(rest, "one\nline two\n");
        file.close().unwrap();

        let err = io::Write::write(&mut file, b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        let inner = err.into_inner().unwrap().downcast::<FsError>().unwrap();
        assert!(matches!(*inner, FsError::Closed { .. }));
    }

    #[test]
    fn shared_handle_across_threads() {
        let (storage, fs) = setup();
        let file = Arc::new(fs.create("shared").unwrap());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let file = Arc::clone(&file);
                std::thread::spawn(move || {
                    file.write_at(&[b'a' + i as u8; 4], i * 4).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        file.close().unwrap();
        assert_eq!(storage.get("shared").unwrap(), Bytes::from_static(b"aaaabbbbccccdddd"));
    }

    #[test]
    fn writer_via_reference() {
        let (_, fs) = setup();
        let file = fs.create("w").unwrap();
        {
            let mut w = &file;
            writeln!(w, "{}-{}", 1, 2).unwrap();
        }
        file.close().unwrap();
        assert_eq!(fs.read_file("w").unwrap(), b"1-2\n");
    }

    proptest! {
        #[test]
        fn create_write_close_reads_back(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let (_, fs) = setup();
            let file = fs.create("p").unwrap();
            file.write(&data).unwrap();
            file.close().unwrap();

            let file = fs.open("p").unwrap();
            prop_assert_eq!(read_all(&file), data);
        }

        #[test]
        fn write_at_then_read_at(
            initial in proptest::collection::vec(any::<u8>(), 0..64),
            data in proptest::collection::vec(any::<u8>(), 1..32),
            offset in 0i64..128,
        ) {
            let (_, fs) = setup();
            let file = fs.create("p").unwrap();
            file.write(&initial).unwrap();
            file.write_at(&data, offset).unwrap();

            let mut out = vec![0u8; data.len()];
            prop_assert_eq!(file.read_at(&mut out, offset).unwrap(), data.len());
            prop_assert_eq!(&out, &data);

            let expected_len = initial.len().max(offset as usize + data.len());
            prop_assert_eq!(file.stat().unwrap().size(), expected_len as i64);
        }

        #[test]
        fn truncate_sets_size(
            initial in proptest::collection::vec(any::<u8>(), 0..64),
            size in 0i64..128,
        ) {
            let (_, fs) = setup();
            let file = fs.create("p").unwrap();
            file.write(&initial).unwrap();
            file.truncate(size).unwrap();
            prop_assert_eq!(file.stat().unwrap().size(), size);
        }
    }
}
