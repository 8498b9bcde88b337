//! Completion checks backed by the output artifact on disk.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Answers whether an input already has its output artifact.
///
/// The output lives next to the input with the same stem and the output
/// extension. Nothing is cached: every call reflects the current disk state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOracle {
    output_extension: OsString,
}

impl CompletionOracle {
    /// Create an oracle; `output_extension` is given without the leading dot.
    pub fn new(output_extension: impl Into<OsString>) -> Self {
        Self {
            output_extension: output_extension.into(),
        }
    }

    pub fn output_extension(&self) -> &OsStr {
        &self.output_extension
    }

    /// Path of the output artifact for `input`.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        input.with_extension(&self.output_extension)
    }

    /// True when the output artifact exists as a regular file.
    ///
    /// Errors other than "not found" are logged and reported as incomplete.
    pub fn is_complete(&self, input: &Path) -> bool {
        let output = self.output_path_for(input);
        match std::fs::metadata(&output) {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                debug!(path = %output.display(), error = %e, "Cannot stat output, treating as incomplete");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_output_path_keeps_dir_and_stem() {
        let oracle = CompletionOracle::new("docx");
        assert_eq!(
            oracle.output_path_for(Path::new("/srv/in/qwerty/mail.2024.json")),
            PathBuf::from("/srv/in/qwerty/mail.2024.docx")
        );
    }

    #[test]
    fn test_reflects_disk_state_without_caching() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("a.json");
        fs::write(&input, "{}").unwrap();
        let oracle = CompletionOracle::new("docx");

        assert!(!oracle.is_complete(&input));
        fs::write(temp_dir.path().join("a.docx"), "done").unwrap();
        assert!(oracle.is_complete(&input));
        fs::remove_file(temp_dir.path().join("a.docx")).unwrap();
        assert!(!oracle.is_complete(&input));
    }

    #[test]
    fn test_directory_named_like_output_is_not_completion() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("a.json");
        fs::create_dir(temp_dir.path().join("a.docx")).unwrap();

        assert!(!CompletionOracle::new("docx").is_complete(&input));
    }
}
