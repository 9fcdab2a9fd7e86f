//! Log file rotation and subscriber setup.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::Level;

/// Name an existing log file is moved to: `name.log` becomes
/// `name.<stamp>.log`, any other name gets `.<stamp>` appended.
pub fn rotated_name(path: &Path, stamp: &str) -> PathBuf {
    let name = path.to_string_lossy();
    match name.strip_suffix(".log") {
        Some(stem) => PathBuf::from(format!("{}.{}.log", stem, stamp)),
        None => PathBuf::from(format!("{}.{}", name, stamp)),
    }
}

/// Move an existing log file out of the way.
pub fn rotate(path: &Path) -> std::io::Result<()> {
    if path.is_file() {
        let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        fs::rename(path, rotated_name(path, &stamp))?;
    }
    Ok(())
}

pub fn parse_level(verbosity: &str) -> Level {
    match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Rotate the log file and install the subscriber writing to it.
pub fn setup(path: &Path, verbosity: &str, format: &str) -> std::io::Result<()> {
    rotate(path)?;
    let file = File::create(path)?;

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(parse_level(verbosity))
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotated_name() {
        assert_eq!(
            rotated_name(Path::new("ora-pg-sync.log"), "20240102030405"),
            PathBuf::from("ora-pg-sync.20240102030405.log")
        );
        assert_eq!(
            rotated_name(Path::new("run.txt"), "20240102030405"),
            PathBuf::from("run.txt.20240102030405")
        );
    }

    #[test]
    fn test_rotate_moves_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.log");
        fs::write(&path, "old run").unwrap();

        rotate(&path).unwrap();
        assert!(!path.exists());
        let rotated: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(rotated.len(), 1);
    }

    #[test]
    fn test_rotate_without_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        rotate(&dir.path().join("missing.log")).unwrap();
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }
}
