use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::pipeline::LoadError;

fn has_extension(name: &str, suffix: &str) -> bool {
    name.ends_with(suffix)
}

fn invalid(path: &Path, reason: impl Into<String>) -> LoadError {
    LoadError::InvalidInputPath {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Resolve a user-supplied path into the D0010 files to load.
///
/// A directory yields its `.{extension}` entries (non-recursive, sorted by
/// name), possibly none. A file must itself carry the extension. Anything
/// else is an [`LoadError::InvalidInputPath`].
pub fn resolve_input_paths(path: &Path, extension: &str) -> Result<Vec<PathBuf>, LoadError> {
    let suffix = format!(".{extension}");

    if path.is_dir() {
        let entries = fs::read_dir(path).map_err(|e| invalid(path, e.to_string()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| invalid(path, e.to_string()))?;
            if !has_extension(&entry.file_name().to_string_lossy(), &suffix) {
                continue;
            }
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                tracing::debug!(path = %entry.path().display(), "skipping directory with matching extension");
                continue;
            }
            paths.push(entry.path());
        }
        paths.sort();

        if paths.is_empty() {
            tracing::warn!(directory = %path.display(), "no {suffix} files found in directory");
        }
        return Ok(paths);
    }

    if !path.exists() {
        return Err(invalid(path, "path does not exist"));
    }
    if !path.is_file() {
        return Err(invalid(path, "not a regular file or directory"));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !has_extension(&name, &suffix) {
        return Err(invalid(path, format!("expected a {suffix} file")));
    }

    Ok(vec![path.to_path_buf()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn single_file_with_extension_resolves_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("flow.uff");
        fs::write(&file, "").unwrap();

        assert_eq!(resolve_input_paths(&file, "uff").unwrap(), vec![file]);
    }

    #[test]
    fn directory_yields_matching_entries_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.uff"), "").unwrap();
        fs::write(dir.path().join("a.uff"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("c.uff.bak"), "").unwrap();
        fs::create_dir(dir.path().join("nested.uff")).unwrap();

        let paths = resolve_input_paths(dir.path(), "uff").unwrap();
        assert_eq!(
            paths,
            vec![dir.path().join("a.uff"), dir.path().join("b.uff")]
        );
    }

    #[test]
    fn directory_without_matches_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();

        assert!(resolve_input_paths(dir.path(), "uff").unwrap().is_empty());
    }

    #[test]
    fn missing_path_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input_paths(&dir.path().join("missing.uff"), "uff").unwrap_err();
        assert!(matches!(err, LoadError::InvalidInputPath { .. }));
    }

    #[test]
    fn wrong_extension_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("flow.csv");
        fs::write(&file, "").unwrap();

        let err = resolve_input_paths(&file, "uff").unwrap_err();
        assert!(matches!(err, LoadError::InvalidInputPath { .. }));
    }
}
