// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Core - Source tree enumeration
//
// Walks the source directory and produces one FileDescriptor per regular
// file, with paths relative to the root and `/`-separated.

use crate::protocol::epoch_seconds;
use crate::types::{AppError, FileDescriptor};
use std::path::{Component, Path};
use walkdir::WalkDir;

/// Ordered, case-insensitive suffix allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    suffixes: Vec<String>,
}

impl Default for ExtensionFilter {
    /// A single empty suffix, which matches every file
    fn default() -> Self {
        Self {
            suffixes: vec![String::new()],
        }
    }
}

impl ExtensionFilter {
    pub fn new(suffixes: Vec<String>) -> Self {
        if suffixes.is_empty() {
            return Self::default();
        }
        Self {
            suffixes: suffixes.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Parse a comma-separated list such as `.jpg,.png`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(',').map(|s| s.trim().to_string()).collect())
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// The first configured suffix that `path` ends with, if any
    pub fn matching(&self, path: &str) -> Option<&str> {
        let lower = path.to_lowercase();
        self.suffixes
            .iter()
            .find(|suffix| lower.ends_with(suffix.as_str()))
            .map(String::as_str)
    }

    pub fn allows(&self, path: &str) -> bool {
        self.matching(path).is_some()
    }
}

/// Finder and AppleDouble metadata files never leave the machine
fn is_metadata_file(name: &str) -> bool {
    name.starts_with(".DS") || name.starts_with("._")
}

/// Join the normal components of `rel` with `/`
fn to_wire_path(rel: &Path) -> Option<String> {
    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Enumerate every regular file under `root`, sorted by path.
///
/// Entries that cannot be read are logged and skipped so one bad file does
/// not abort the whole session.
pub fn scan_directory(root: &Path) -> Result<Vec<FileDescriptor>, AppError> {
    if !root.is_dir() {
        return Err(AppError::InvalidConfig(format!(
            "Source directory does not exist: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_metadata_file(&name) {
            continue;
        }

        let rel = match entry.path().strip_prefix(root).ok().and_then(to_wire_path) {
            Some(rel) => rel,
            None => {
                tracing::warn!("Skipping non UTF-8 path: {}", entry.path().display());
                continue;
            }
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", rel, e);
                continue;
            }
        };
        let mtime = metadata.modified().map(epoch_seconds).unwrap_or(0.0);

        files.push(FileDescriptor {
            rel_path: rel,
            size: metadata.len(),
            mtime,
        });
    }

    tracing::debug!("Scanned {} files under {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::fs;

    #[test]
    fn test_default_filter_matches_everything() {
        let filter = ExtensionFilter::default();
        assert_eq!(filter.matching("notes/todo.txt"), Some(""));
        assert!(filter.allows("Makefile"));
    }

    #[test]
    fn test_filter_is_case_insensitive_first_match() {
        let filter = ExtensionFilter::parse(".JPG, .jpeg,g");
        assert_eq!(filter.matching("DCIM/IMG_0001.jpg"), Some(".jpg"));
        assert_eq!(filter.matching("a.JPEG"), Some(".jpeg"));
        // ".jpg" comes before "g" in the list, so it wins
        assert_eq!(filter.matching("b.jpg"), Some(".jpg"));
        assert_eq!(filter.matching("c.png"), Some("g"));
        assert!(!filter.allows("d.txt"));
    }

    #[test]
    fn test_empty_list_falls_back_to_match_all() {
        assert_eq!(ExtensionFilter::new(Vec::new()), ExtensionFilter::default());
    }

    #[test]
    fn test_scan_produces_relative_forward_slash_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("notes/deep")).unwrap();
        fs::write(dir.path().join("notes/todo.txt"), vec![b'x'; 500]).unwrap();
        fs::write(dir.path().join("notes/deep/a.bin"), b"abc").unwrap();
        fs::write(dir.path().join("root.md"), b"").unwrap();
        filetime::set_file_mtime(
            dir.path().join("notes/todo.txt"),
            FileTime::from_unix_time(1_700_000_000, 0),
        )
        .unwrap();

        let files = scan_directory(dir.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["notes/deep/a.bin", "notes/todo.txt", "root.md"]);

        let todo = &files[1];
        assert_eq!(todo.size, 500);
        assert_eq!(todo.mtime, 1_700_000_000.0);
    }

    #[test]
    fn test_scan_skips_metadata_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        fs::write(dir.path().join("._photo.jpg"), b"x").unwrap();
        fs::write(dir.path().join(".hidden"), b"x").unwrap();
        fs::write(dir.path().join("photo.jpg"), b"x").unwrap();

        let files = scan_directory(dir.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec![".hidden", "photo.jpg"]);
    }

    #[test]
    fn test_scan_missing_root_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            scan_directory(&missing),
            Err(AppError::InvalidConfig(_))
        ));
    }
}
