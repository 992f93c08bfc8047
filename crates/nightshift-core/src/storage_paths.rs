use std::path::PathBuf;

/// Resolved filesystem layout for Nightshift's durable state. Falls back to
/// `~/.local/share/nightshift` when `$XDG_DATA_HOME` is unset.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub legacy_state_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl StoragePaths {
    pub fn resolve() -> anyhow::Result<Self> {
        let data_dir = if let Ok(explicit) = std::env::var("NIGHTSHIFT_DATA_DIR") {
            PathBuf::from(explicit)
        } else {
            dirs::data_dir()
                .ok_or_else(|| anyhow::anyhow!("could not resolve a data directory"))?
                .join("nightshift")
        };
        Ok(Self {
            db_path: data_dir.join("nightshift.db"),
            legacy_state_path: data_dir.join("state.json"),
            logs_dir: data_dir.join("logs"),
            data_dir,
        })
    }

    /// Creates the data directory with owner-only permissions.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&self.data_dir)?.permissions();
            perms.set_mode(0o700);
            std::fs::set_permissions(&self.data_dir, perms)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_honors_explicit_data_dir_override() {
        std::env::set_var("NIGHTSHIFT_DATA_DIR", "/tmp/nightshift-test-override");
        let paths = StoragePaths::resolve().unwrap();
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/nightshift-test-override"));
        assert_eq!(
            paths.db_path,
            PathBuf::from("/tmp/nightshift-test-override/nightshift.db")
        );
        std::env::remove_var("NIGHTSHIFT_DATA_DIR");
    }

    #[test]
    fn ensure_data_dir_creates_owner_only_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("NIGHTSHIFT_DATA_DIR", tmp.path().join("nightshift"));
        let paths = StoragePaths::resolve().unwrap();
        paths.ensure_data_dir().unwrap();
        assert!(paths.data_dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&paths.data_dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
        std::env::remove_var("NIGHTSHIFT_DATA_DIR");
    }
}
