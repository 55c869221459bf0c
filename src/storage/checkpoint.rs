use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::ProductId;
use crate::error::{Error, Result};

const MAGIC: u32 = 0xFAC3_0001;

/// 同步游标快照（可选启用）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub magic: u32,
    /// 下一批次的起始 product id（包含）
    pub cursor: ProductId,
    pub products_seen: u64,
}

impl SyncCheckpoint {
    pub fn new(cursor: ProductId, products_seen: u64) -> Self {
        Self {
            magic: MAGIC,
            cursor,
            products_seen,
        }
    }
}

/// 游标持久化：写 tmp → fsync → rename，崩溃时旧 checkpoint 不受影响
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, checkpoint: &SyncCheckpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let data = bincode::serialize(checkpoint)?;
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&data)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// 文件缺失返回 None；内容损坏视为错误（不静默回退到 0）
    pub fn load(&self) -> Result<Option<SyncCheckpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path)?;
        let checkpoint: SyncCheckpoint = bincode::deserialize(&data)?;
        if checkpoint.magic != MAGIC {
            return Err(Error::Checkpoint(format!(
                "magic mismatch in {:?}: {:#x}",
                self.path, checkpoint.magic
            )));
        }
        Ok(Some(checkpoint))
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
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
        std::env::temp_dir().join(format!("facet-sync-ckpt-{}-{}", tag, nanos))
    }

    #[test]
    fn save_load_clear() {
        let dir = unique_tmp_dir("basic");
        let store = CheckpointStore::new(dir.join("sync.ckpt"));
        assert_eq!(store.load().unwrap(), None);

        store.save(&SyncCheckpoint::new(42, 1000)).unwrap();
        store.save(&SyncCheckpoint::new(77, 2000)).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.cursor, 77);
        assert_eq!(loaded.products_seen, 2000);

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // 重复 clear 不报错
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_checkpoint_is_an_error() {
        let dir = unique_tmp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sync.ckpt");
        std::fs::write(&path, b"xx").unwrap();

        let err = CheckpointStore::new(path).load().unwrap_err();
        assert!(matches!(err, Error::Checkpoint(_)));
    }
}
