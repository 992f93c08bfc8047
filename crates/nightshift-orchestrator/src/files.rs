use std::path::{Path, PathBuf};

/// Filters a phase's reported files to (a) exist on disk, (b) be regular
/// files, (c) resolve within `cwd`. Paths failing any check are logged as
/// skipped, never passed downstream.
pub fn filter_existing_within(candidates: &[String], cwd: &Path) -> Vec<PathBuf> {
    let cwd_canonical = match cwd.canonicalize() {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!(cwd = %cwd.display(), %err, "working directory not resolvable, skipping all files");
            return Vec::new();
        }
    };

    let mut kept = Vec::new();
    for candidate in candidates {
        let path = Path::new(candidate);
        let absolute = if path.is_absolute() { path.to_path_buf() } else { cwd.join(path) };

        if !absolute.exists() {
            tracing::debug!(path = %absolute.display(), "skipped file: does not exist");
            continue;
        }
        if !absolute.is_file() {
            tracing::debug!(path = %absolute.display(), "skipped file: not a regular file");
            continue;
        }
        match absolute.canonicalize() {
            Ok(resolved) if resolved.starts_with(&cwd_canonical) => kept.push(resolved),
            Ok(resolved) => {
                tracing::warn!(path = %resolved.display(), "skipped file: resolves outside working directory");
            }
            Err(err) => {
                tracing::debug!(path = %absolute.display(), %err, "skipped file: canonicalize failed");
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_existing_regular_files_within_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("in_scope.rs");
        std::fs::write(&file, "x").unwrap();

        let kept = filter_existing_within(&["in_scope.rs".to_string()], dir.path());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn drops_nonexistent_files() {
        let dir = tempfile::tempdir().unwrap();
        let kept = filter_existing_within(&["missing.rs".to_string()], dir.path());
        assert!(kept.is_empty());
    }

    #[test]
    fn drops_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        let kept = filter_existing_within(&["subdir".to_string()], dir.path());
        assert!(kept.is_empty());
    }

    #[test]
    fn drops_paths_outside_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let escapee = outside.path().join("secret.rs");
        std::fs::write(&escapee, "x").unwrap();

        let kept = filter_existing_within(&[escapee.to_string_lossy().to_string()], dir.path());
        assert!(kept.is_empty());
    }
}
