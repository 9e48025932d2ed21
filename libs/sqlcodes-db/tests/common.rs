#![allow(dead_code)]
use anyhow::Result;
use sqlcodes_db::{ConnectOpts, SqlTemplate};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// A file-backed SQLite database living in its own temp directory.
pub struct TestDb {
    pub template: SqlTemplate,
    pub path: PathBuf,
    _dir: TempDir,
}

impl TestDb {
    pub fn dsn_for(path: &std::path::Path) -> String {
        format!("sqlite://{}", path.display())
    }

    pub async fn open() -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("classify.db");
        let template = SqlTemplate::connect(&Self::dsn_for(&path), test_opts()).await?;
        Ok(Self {
            template,
            path,
            _dir: dir,
        })
    }

    pub fn dsn(&self) -> String {
        Self::dsn_for(&self.path)
    }
}

pub fn test_opts() -> ConnectOpts {
    ConnectOpts {
        max_conns: Some(2),
        acquire_timeout: Some(Duration::from_secs(5)),
        ..ConnectOpts::default()
    }
}
