//! Eligibility rules for input files.

use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Decides whether a path is an input file the daemon should process.
///
/// A path is eligible when its immediate parent directory is named
/// `target_dir` and its extension equals `input_extension`. Both comparisons
/// are exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFilter {
    target_dir: OsString,
    input_extension: OsString,
}

impl InputFilter {
    /// Create a filter; `input_extension` is given without the leading dot.
    pub fn new(target_dir: impl Into<OsString>, input_extension: impl Into<OsString>) -> Self {
        Self {
            target_dir: target_dir.into(),
            input_extension: input_extension.into(),
        }
    }

    pub fn target_dir(&self) -> &OsStr {
        &self.target_dir
    }

    pub fn input_extension(&self) -> &OsStr {
        &self.input_extension
    }

    /// Check a path by name only; the filesystem is not consulted.
    pub fn matches(&self, path: &Path) -> bool {
        if path.extension() != Some(self.input_extension.as_os_str()) {
            return false;
        }
        // "dir/.json" has no stem worth processing
        if path.file_stem().is_none_or(|stem| stem.is_empty()) {
            return false;
        }
        path.parent()
            .and_then(Path::file_name)
            .is_some_and(|parent| parent == self.target_dir.as_os_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn filter() -> InputFilter {
        InputFilter::new("qwerty", "json")
    }

    #[test]
    fn test_matches_target_dir_at_any_depth() {
        let f = filter();
        assert!(f.matches(&PathBuf::from("/opt/test/qwerty/a.json")));
        assert!(f.matches(&PathBuf::from("/opt/test/x/y/qwerty/report.v2.json")));
    }

    #[test]
    fn test_rejects_other_directories() {
        let f = filter();
        assert!(!f.matches(&PathBuf::from("/opt/test/other/a.json")));
        assert!(!f.matches(&PathBuf::from("/opt/test/qwerty/nested/a.json")));
        assert!(!f.matches(&PathBuf::from("a.json")));
    }

    #[test]
    fn test_rejects_other_extensions() {
        let f = filter();
        assert!(!f.matches(&PathBuf::from("/opt/test/qwerty/a.docx")));
        assert!(!f.matches(&PathBuf::from("/opt/test/qwerty/a.JSON")));
        assert!(!f.matches(&PathBuf::from("/opt/test/qwerty/a.json.tmp")));
        assert!(!f.matches(&PathBuf::from("/opt/test/qwerty/json")));
    }
}
