//! Process-wide bootstrap: owns the one [`Catalog`] for a writable data
//! directory. Constructed once from `main`; a second `Environment` over the
//! same directory within one process is not supported (mirrors the rule
//! that a table must not be opened twice simultaneously).

use std::path::{Path, PathBuf};

use tracing::info;

use crate::catalog::Catalog;
use crate::error::RelationError;

pub struct Environment {
    dir: PathBuf,
    catalog: Catalog,
}

impl Environment {
    /// Open (creating if missing) the database rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RelationError> {
        let dir = dir.into();
        info!(dir = %dir.display(), "opening environment");
        let catalog = Catalog::open(&dir)?;
        Ok(Self { dir, catalog })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("db");
        assert!(!nested.exists());
        Environment::open(&nested).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn reopening_does_not_duplicate_bootstrap_rows() {
        let dir = tempdir().unwrap();
        {
            Environment::open(dir.path()).unwrap();
        }
        let env = Environment::open(dir.path()).unwrap();
        assert_eq!(
            env.catalog()
                .table_names()
                .unwrap()
                .iter()
                .filter(|n| n.as_str() == "_tables")
                .count(),
            1
        );
    }
}
