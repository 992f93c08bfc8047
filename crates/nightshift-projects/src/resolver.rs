use std::path::{Path, PathBuf};

use crate::error::{ProjectsError, ProjectsResult};

/// Files whose presence marks a directory as a project root. Fixed, never
/// extended at runtime.
const PROJECT_MARKERS: &[&str] = &[
    ".git",
    "Cargo.toml",
    "go.mod",
    "package.json",
    "pyproject.toml",
    "setup.py",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
];

/// One configured project source: a literal path or a glob pattern, with its
/// own exclude prefixes and a priority used for sorting and budget weight.
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    pub pattern: String,
    pub excludes: Vec<String>,
    pub priority: u32,
}

pub fn is_project_path(path: &Path) -> bool {
    PROJECT_MARKERS.iter().any(|marker| path.join(marker).exists())
}

/// Expands `patterns` (literal paths pass through unchanged if they exist;
/// anything else is treated as a glob) against the filesystem, dropping any
/// result that resolves under an `excludes` prefix.
pub fn expand_glob_patterns(patterns: &[String], excludes: &[String]) -> ProjectsResult<Vec<PathBuf>> {
    let exclude_prefixes: Vec<PathBuf> = excludes.iter().map(PathBuf::from).collect();
    let mut matched = Vec::new();

    for pattern in patterns {
        let direct = Path::new(pattern);
        if direct.is_dir() {
            matched.push(direct.to_path_buf());
            continue;
        }

        let paths = glob::glob(pattern).map_err(|source| ProjectsError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        for entry in paths {
            if let Ok(path) = entry {
                if path.is_dir() {
                    matched.push(path);
                }
            }
        }
    }

    matched.retain(|path| !exclude_prefixes.iter().any(|prefix| path.starts_with(prefix)));
    matched.sort();
    matched.dedup();
    Ok(matched)
}

/// Resolves every descriptor to `(path, priority)` pairs, filters to actual
/// project roots, and sorts descending by priority.
pub fn resolve_projects(descriptors: &[ProjectDescriptor]) -> ProjectsResult<Vec<(PathBuf, u32)>> {
    let mut resolved = Vec::new();
    for descriptor in descriptors {
        let patterns = vec![descriptor.pattern.clone()];
        for path in expand_glob_patterns(&patterns, &descriptor.excludes)? {
            if is_project_path(&path) {
                resolved.push((path, descriptor.priority));
            }
        }
    }
    Ok(sort_by_priority(resolved))
}

pub fn sort_by_priority(mut projects: Vec<(PathBuf, u32)>) -> Vec<(PathBuf, u32)> {
    projects.sort_by(|a, b| b.1.cmp(&a.1));
    projects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_existing_directory_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = vec![dir.path().to_string_lossy().to_string()];
        let matched = expand_glob_patterns(&patterns, &[]).unwrap();
        assert_eq!(matched, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn excluded_prefix_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        let patterns = vec![format!("{}/*", dir.path().display())];
        let matched = expand_glob_patterns(&patterns, &[sub.to_string_lossy().to_string()]).unwrap();
        assert!(!matched.contains(&sub));
    }

    #[test]
    fn is_project_path_detects_cargo_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        assert!(is_project_path(dir.path()));
    }

    #[test]
    fn is_project_path_false_for_plain_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_project_path(dir.path()));
    }

    #[test]
    fn sort_by_priority_is_descending() {
        let sorted = sort_by_priority(vec![(PathBuf::from("/a"), 1), (PathBuf::from("/b"), 5), (PathBuf::from("/c"), 3)]);
        let priorities: Vec<u32> = sorted.into_iter().map(|(_, p)| p).collect();
        assert_eq!(priorities, vec![5, 3, 1]);
    }
}
