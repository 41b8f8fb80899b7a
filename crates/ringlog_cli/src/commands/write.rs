//! Write command implementation.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error};

/// Writes `text` to `file`, creating or truncating it.
pub fn run(file: &Path, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    debug!(file = %file.display(), text, "writing");

    let result = File::create(file).and_then(|mut f| {
        f.write_all(text.as_bytes())?;
        f.flush()
    });

    if let Err(err) = &result {
        error!(file = %file.display(), error = %err, "write failed");
    }
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        run(&path, "first version").unwrap();
        run(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        assert!(run(&path, "text").is_err());
    }
}
