use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::CheckpointStore;
use crate::sync::{RetryPolicy, SyncOptions};

pub const MAX_BATCH_SIZE: usize = 10_000;

/// 运行配置（TOML）。所有字段都有默认值，空文件即合法配置。
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite 目录库文件
    pub catalog_path: PathBuf,
    pub port: u16,
    pub batch_size: usize,
    pub retry: RetryPolicy,
    /// 不配置则不持久化同步游标
    pub checkpoint_path: Option<PathBuf>,
    pub log_filter: String,
    pub default_page_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("catalog.db"),
            port: 8085,
            batch_size: crate::sync::DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            checkpoint_path: None,
            log_filter: "info".to_string(),
            default_page_size: crate::query::pagination::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    /// 查找顺序：显式路径 → `<config_dir>/facet-sync/config.toml` → 默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };
        match path {
            Some(p) => Self::from_file(&p),
            None => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("facet-sync").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {:?}: {}", path, e)))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{:?}: {}", path, msg)),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(Error::Config(format!(
                "batch_size must be 1-{}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if !(1..=1000).contains(&self.default_page_size) {
            return Err(Error::Config(format!(
                "default_page_size must be 1-1000, got {}",
                self.default_page_size
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.batch_size,
            retry: self.retry.clone(),
            checkpoint: self.checkpoint_path.clone().map(CheckpointStore::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_tmp_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("facet-sync-config-{}-{}", tag, nanos))
    }

    #[test]
    fn empty_document_is_all_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        let opts = Config::default().sync_options();
        assert_eq!(opts.batch_size, 1000);
        assert!(opts.checkpoint.is_none());
    }

    #[test]
    fn partial_overrides() {
        let cfg = Config::parse(
            r#"
            catalog_path = "/var/lib/shop/catalog.db"
            port = 9000
            checkpoint_path = "/tmp/sync.ckpt"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.batch_size, 1000);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.base_delay_ms, 100);
        let opts = cfg.sync_options();
        assert_eq!(
            opts.checkpoint.unwrap().path(),
            Path::new("/tmp/sync.ckpt")
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        for doc in [
            "batch_size = 0",
            "batch_size = 10001",
            "default_page_size = 0",
            "[retry]\nmax_attempts = 0",
            "unknown_key = 1",
            "port = \"eighty\"",
        ] {
            assert!(matches!(Config::parse(doc), Err(Error::Config(_))), "{doc}");
        }
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = unique_tmp_dir("load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "batch_size = 250\nlog_filter = \"debug\"\n").unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.batch_size, 250);
        assert_eq!(cfg.log_filter, "debug");

        let missing = dir.join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(Error::Config(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
