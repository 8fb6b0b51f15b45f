use std::io::{self, Read, Write};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use colored::Colorize;
use objfs::{FileInfo, FileMode, FsConfig, OpenFlags, StorageFs};
use objfs_storage::{LocalStorage, LocalStorageConfig};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let fs = open_fs(&cli)?;
    let stdout = io::stdout();
    let stdin = io::stdin();
    execute(&fs, cli.command, cli.format, &mut stdout.lock(), &mut stdin.lock())
}

fn open_fs(cli: &Cli) -> anyhow::Result<StorageFs> {
    let config = match &cli.config {
        Some(path) => FsConfig::load(path)?,
        None => FsConfig::default(),
    };
    let storage = LocalStorage::open(&LocalStorageConfig {
        root: cli.root.clone(),
        create_root: true,
    })
    .with_context(|| format!("opening store at {}", cli.root.display()))?;

    debug!(root = %cli.root.display(), fs = %config.name, "filesystem ready");
    Ok(StorageFs::from_backend(Arc::new(storage)).with_config(config))
}

pub fn execute(
    fs: &StorageFs,
    command: Command,
    format: OutputFormat,
    out: &mut dyn Write,
    input: &mut dyn Read,
) -> anyhow::Result<()> {
    match command {
        Command::Ls(args) => cmd_ls(fs, args, format, out),
        Command::Cat(args) => {
            let data = fs.read_file(&args.path)?;
            out.write_all(&data)?;
            Ok(())
        }
        Command::Write(args) => cmd_write(fs, args, out, input),
        Command::Mkdir(args) => cmd_mkdir(fs, args, out),
        Command::Rm(args) => cmd_rm(fs, args, out),
        Command::Mv(args) => {
            fs.rename(&args.from, &args.to)?;
            writeln!(out, "{} {} -> {}", "✓".green(), args.from.bold(), args.to.bold())?;
            Ok(())
        }
        Command::Stat(args) => cmd_stat(fs, args, format, out),
        Command::Chmod(args) => cmd_chmod(fs, args, out),
        Command::Touch(args) => cmd_touch(fs, args),
    }
}

fn cmd_ls(
    fs: &StorageFs,
    args: LsArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let path = args.path.unwrap_or_else(|| ".".into());
    let entries = fs.read_dir(&path)?;

    if format == OutputFormat::Json {
        let infos: Vec<&FileInfo> = entries.iter().map(|e| e.info()).collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&infos)?)?;
        return Ok(());
    }

    for entry in &entries {
        let name = if entry.is_dir() {
            format!("{}/", entry.name()).blue().bold().to_string()
        } else {
            entry.name().to_string()
        };
        if args.long {
            writeln!(out, "{}  {}", long_prefix(entry.info()), name)?;
        } else {
            writeln!(out, "{name}")?;
        }
    }
    Ok(())
}

fn long_prefix(info: &FileInfo) -> String {
    format!(
        "{} {:>10} {}",
        info.mode(),
        info.size(),
        info.mod_time().format("%Y-%m-%d %H:%M").to_string().dimmed()
    )
}

fn cmd_write(
    fs: &StorageFs,
    args: WriteArgs,
    out: &mut dyn Write,
    input: &mut dyn Read,
) -> anyhow::Result<()> {
    let data = match args.text {
        Some(text) => text.into_bytes(),
        None => {
            let mut buf = Vec::new();
            input.read_to_end(&mut buf).context("reading stdin")?;
            buf
        }
    };

    let perm = fs.config().default_file_mode;
    if args.append {
        let file = fs.open_file(
            &args.path,
            OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::APPEND,
            perm,
        )?;
        file.write(&data)?;
        file.close()?;
    } else {
        fs.write_file(&args.path, &data, perm)?;
    }

    writeln!(out, "{} wrote {} bytes to {}", "✓".green(), data.len(), args.path.bold())?;
    Ok(())
}

fn cmd_mkdir(fs: &StorageFs, args: MkdirArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let perm = fs.config().default_dir_mode;
    if args.parents {
        fs.mkdir_all(&args.path, perm)?;
    } else {
        fs.mkdir(&args.path, perm)?;
    }
    writeln!(out, "{} created {}", "✓".green(), args.path.bold())?;
    Ok(())
}

fn cmd_rm(fs: &StorageFs, args: RmArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    if args.recursive {
        fs.remove_all(&args.path)?;
    } else {
        fs.remove(&args.path)?;
    }
    writeln!(out, "{} removed {}", "✓".green(), args.path.bold())?;
    Ok(())
}

fn cmd_stat(
    fs: &StorageFs,
    args: StatArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let info = fs.stat(&args.path)?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?,
        OutputFormat::Text => {
            let kind = if info.is_dir() { "directory" } else { "file" };
            writeln!(out, "  Name: {}", info.name().bold())?;
            writeln!(out, "  Type: {}", kind.cyan())?;
            writeln!(out, "  Size: {}", info.size())?;
            writeln!(out, "  Mode: {} ({:o})", info.mode(), info.mode().perm().bits())?;
            writeln!(out, "  Modified: {}", info.mod_time().to_rfc3339())?;
        }
    }
    Ok(())
}

fn cmd_chmod(fs: &StorageFs, args: ChmodArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let bits = u32::from_str_radix(&args.mode, 8)
        .with_context(|| format!("invalid octal mode {:?}", args.mode))?;
    let mode = FileMode::from_bits(bits).perm();
    fs.chmod(&args.path, mode)?;
    writeln!(out, "{} {} is now {}", "✓".green(), args.path.bold(), mode)?;
    Ok(())
}

fn cmd_touch(fs: &StorageFs, args: TouchArgs) -> anyhow::Result<()> {
    if fs.is_dir(&args.path)? {
        let now = Utc::now();
        fs.chtimes(&args.path, now, now)?;
        return Ok(());
    }
    // Reopening with write intent rewrites the content unchanged and
    // refreshes the record.
    let file = fs.open_file(
        &args.path,
        OpenFlags::READ_WRITE | OpenFlags::CREATE,
        fs.config().default_file_mode,
    )?;
    file.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use objfs_storage::InMemoryStorage;

    fn fs() -> StorageFs {
        StorageFs::from_backend(Arc::new(InMemoryStorage::new()))
    }

    fn run(fs: &StorageFs, args: &[&str]) -> anyhow::Result<String> {
        run_with_input(fs, args, b"")
    }

    fn run_with_input(fs: &StorageFs, args: &[&str], input: &[u8]) -> anyhow::Result<String> {
        use clap::Parser;
        colored::control::set_override(false);

        let argv = std::iter::once("objfs").chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv)?;
        let mut out = Vec::new();
        let mut input = input;
        execute(fs, cli.command, cli.format, &mut out, &mut input)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn write_then_cat() {
        let fs = fs();
        run(&fs, &["write", "note.txt", "hello"]).unwrap();
        assert_eq!(run(&fs, &["cat", "note.txt"]).unwrap(), "hello");
    }

    #[test]
    fn write_from_stdin_and_append() {
        let fs = fs();
        run_with_input(&fs, &["write", "log"], b"one\n").unwrap();
        run(&fs, &["write", "--append", "log", "two\n"]).unwrap();
        assert_eq!(fs.read_file("log").unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn ls_lists_dirs_first() {
        let fs = fs();
        run(&fs, &["mkdir", "-p", "docs/sub"]).unwrap();
        run(&fs, &["write", "docs/a.txt", "a"]).unwrap();

        let listing = run(&fs, &["ls", "docs"]).unwrap();
        assert_eq!(listing, "sub/\na.txt\n");

        let long = run(&fs, &["ls", "-l", "docs"]).unwrap();
        assert!(long.lines().next().unwrap().starts_with("drwxr-xr-x"));
        assert!(long.contains("-rw-r--r--"));
    }

    #[test]
    fn ls_json() {
        let fs = fs();
        run(&fs, &["write", "f", "xyz"]).unwrap();
        let out = run(&fs, &["ls", "--format", "json"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["name"], "f");
        assert_eq!(value[0]["size"], 3);
    }

    #[test]
    fn stat_text_and_json() {
        let fs = fs();
        run(&fs, &["mkdir", "d"]).unwrap();
        let text = run(&fs, &["stat", "d"]).unwrap();
        assert!(text.contains("Type: directory"));
        assert!(text.contains("(755)"));

        let json = run(&fs, &["stat", "d", "--format", "json"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["isDir"], true);
    }

    #[test]
    fn chmod_parses_octal() {
        let fs = fs();
        run(&fs, &["write", "f", "x"]).unwrap();
        run(&fs, &["chmod", "600", "f"]).unwrap();
        assert_eq!(fs.stat("f").unwrap().mode().bits(), 0o600);
        assert!(run(&fs, &["chmod", "9z", "f"]).is_err());
    }

    #[test]
    fn mv_and_rm() {
        let fs = fs();
        run(&fs, &["mkdir", "-p", "a/b"]).unwrap();
        run(&fs, &["write", "a/b/f", "x"]).unwrap();
        run(&fs, &["mv", "a/b/f", "a/g"]).unwrap();
        assert!(fs.exists("a/g").unwrap());

        assert!(run(&fs, &["rm", "missing"]).is_err());
        run(&fs, &["rm", "-r", "a"]).unwrap();
        assert!(!fs.exists("a").unwrap());
    }

    #[test]
    fn touch_creates_and_preserves() {
        let fs = fs();
        run(&fs, &["touch", "new"]).unwrap();
        assert!(fs.read_file("new").unwrap().is_empty());

        fs.write_file("kept", b"data", FileMode::from_bits(0o644)).unwrap();
        run(&fs, &["touch", "kept"]).unwrap();
        assert_eq!(fs.read_file("kept").unwrap(), b"data");

        run(&fs, &["mkdir", "d"]).unwrap();
        run(&fs, &["touch", "d"]).unwrap();
    }

    #[test]
    fn errors_surface_as_fs_errors() {
        let fs = fs();
        let err = run(&fs, &["cat", "nope"]).unwrap_err();
        let fs_err = err.downcast_ref::<objfs::FsError>().unwrap();
        assert!(fs_err.is_not_exist());
    }

    #[test]
    fn open_fs_uses_root_and_config() {
        use clap::Parser;

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("fs.toml");
        std::fs::write(&config_path, "name = \"disk\"\n").unwrap();
        let root = dir.path().join("store");

        let cli = Cli::try_parse_from([
            "objfs",
            "--root",
            root.to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "ls",
        ])
        .unwrap();
        let fs = open_fs(&cli).unwrap();
        assert_eq!(fs.name(), "disk");
        assert!(root.is_dir());
    }
}
