//! Attachment resolution: which downloaded files go onto the release.

use crate::error::{PublishError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Files selected by the attachment patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentSet {
    /// Files to upload, unique by file name
    pub files: Vec<PathBuf>,
    /// Patterns that matched no file
    pub unmatched: Vec<String>,
}

/// Evaluate glob patterns relative to `root`.
///
/// `**` matches any number of directories. Only regular files are kept, and
/// a file name already selected by an earlier match is skipped since release
/// assets are identified by name.
pub fn resolve_attachments(root: &Path, patterns: &[String]) -> Result<AttachmentSet> {
    let mut set = AttachmentSet::default();
    let mut names = HashSet::new();

    for pattern in patterns {
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            pattern
        );
        let paths = glob::glob(&full).map_err(|e| PublishError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        let mut matched = false;
        let mut hits: Vec<PathBuf> = paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect();
        hits.sort();

        for path in hits {
            matched = true;
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if names.insert(name.clone()) {
                set.files.push(path);
            } else {
                log::warn!("Skipping {}: an asset named {} is already attached", path.display(), name);
            }
        }

        if !matched {
            set.unmatched.push(pattern.clone());
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloads() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let win = dir.path().join("dist").join("pdf_to_table_windows");
        let linux = dir.path().join("dist").join("pdf_to_table_linux");
        std::fs::create_dir_all(&win).unwrap();
        std::fs::create_dir_all(&linux).unwrap();
        std::fs::write(win.join("extract_windows.exe"), b"MZ").unwrap();
        std::fs::write(win.join("README.txt"), b"w").unwrap();
        std::fs::write(linux.join("extract_linux"), b"elf").unwrap();
        std::fs::write(linux.join("README.txt"), b"l").unwrap();
        dir
    }

    #[test]
    fn default_patterns_attach_both_executables() {
        let dir = downloads();
        let patterns = vec![
            "dist/**/extract_windows.exe".to_string(),
            "dist/**/extract_linux".to_string(),
        ];
        let set = resolve_attachments(dir.path(), &patterns).unwrap();
        let names: Vec<_> = set
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["extract_windows.exe", "extract_linux"]);
        assert!(set.unmatched.is_empty());
    }

    #[test]
    fn truncated_linux_pattern_matches_nothing() {
        let dir = downloads();
        let patterns = vec![
            "dist/**/extract_windows.exe".to_string(),
            "dist/**/extract_linu".to_string(),
        ];
        let set = resolve_attachments(dir.path(), &patterns).unwrap();
        assert_eq!(set.files.len(), 1);
        assert_eq!(set.unmatched, vec!["dist/**/extract_linu"]);
    }

    #[test]
    fn duplicate_names_are_attached_once() {
        let dir = downloads();
        let patterns = vec!["dist/**/README.txt".to_string()];
        let set = resolve_attachments(dir.path(), &patterns).unwrap();
        assert_eq!(set.files.len(), 1);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let dir = downloads();
        assert!(resolve_attachments(dir.path(), &["dist/[".to_string()]).is_err());
    }
}
