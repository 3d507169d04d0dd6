//! The running job's process id, kept in a file so it can be stopped from
//! outside.

use std::{fs, io::ErrorKind, path::Path, process};

use crate::error::StampError;

pub fn record(path: &Path) -> Result<u32, StampError> {
    let pid = process::id();
    fs::write(path, pid.to_string())
        .map_err(|e| StampError::io(format!("failed to write pid file {}", path.display()), e))?;
    Ok(pid)
}

pub fn read(path: &Path) -> Result<u32, StampError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| StampError::io(format!("failed to read pid file {}", path.display()), e))?;
    raw.trim().parse().map_err(|_| {
        StampError::Config(format!(
            "pid file {} does not hold a process id: {:?}",
            path.display(),
            raw.trim()
        ))
    })
}

/// Removes the file; a file that is already gone is fine.
pub fn clear(path: &Path) -> Result<(), StampError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StampError::io(
            format!("failed to remove pid file {}", path.display()),
            e,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_read_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.pid");

        let pid = record(&path).unwrap();

        assert_eq!(read(&path).unwrap(), pid);
        clear(&path).unwrap();
        assert!(!path.exists());
        clear(&path).unwrap();
    }

    #[test]
    fn garbage_is_not_a_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.pid");
        fs::write(&path, "not a number\n").unwrap();

        assert!(matches!(read(&path), Err(StampError::Config(_))));
    }
}
