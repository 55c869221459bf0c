use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::core::{ProductId, Projector};
use crate::error::{Error, Result};
use crate::index::IndexWriter;
use crate::stats::SyncReport;
use crate::storage::checkpoint::SyncCheckpoint;
use crate::storage::{CatalogReader, CheckpointStore};
use crate::sync::retry::RetryPolicy;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Clone, Debug)]
pub struct SyncOptions {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    /// 为 None 时不持久化游标：中断后只能从 0 全量重跑
    pub checkpoint: Option<CheckpointStore>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            checkpoint: None,
        }
    }
}

/// 运行中标记；drop 时释放
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(flag))
            .map_err(|_| Error::SyncInProgress)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sync Orchestrator：Reader → Projector → Writer，按 keyset 批次推进。
///
/// - 单条 upsert 失败只记录并跳过，不中断批次与整次运行
/// - upsert 是按主键替换，重复运行收敛到同一索引状态
/// - 同一实例上的运行互斥（single-flight）；跨进程/跨实例不互斥
/// - 取消标记只在批次之间检查
pub struct SyncOrchestrator {
    reader: CatalogReader,
    writer: IndexWriter,
    options: SyncOptions,
    running: AtomicBool,
    cancel: AtomicBool,
    last_report: Mutex<Option<SyncReport>>,
}

impl SyncOrchestrator {
    pub fn new(reader: CatalogReader, writer: IndexWriter, options: SyncOptions) -> Self {
        Self {
            reader,
            writer,
            options,
            running: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            last_report: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 请求在下一个批次边界停止
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.lock().clone()
    }

    /// 从 `from`（包含）开始同步到目录末尾
    pub fn run(&self, from: ProductId) -> Result<SyncReport> {
        let _guard = InFlight::acquire(&self.running)?;
        self.run_exclusive(from)
    }

    /// 从持久化游标续跑；未配置或不存在 checkpoint 时从 0 开始
    pub fn resume(&self) -> Result<SyncReport> {
        let from = match &self.options.checkpoint {
            Some(store) => match store.load()? {
                Some(ckpt) => {
                    tracing::info!(
                        "Resuming sync from checkpoint cursor {} ({} products already seen)",
                        ckpt.cursor,
                        ckpt.products_seen
                    );
                    ckpt.cursor
                }
                None => 0,
            },
            None => 0,
        };
        self.run(from)
    }

    /// 后台运行：立即返回；进度只通过日志观察。
    ///
    /// 互斥在 spawn 前获取，避免两个触发同时通过检查。
    pub fn spawn(self: &Arc<Self>, from: ProductId) -> Result<tokio::task::JoinHandle<()>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SyncInProgress)?;

        let this = Arc::clone(self);
        Ok(tokio::task::spawn_blocking(move || {
            let _guard = InFlight(&this.running);
            match this.run_exclusive(from) {
                Ok(report) => tracing::info!("Background sync finished:\n{}", report),
                Err(e) => tracing::error!("Background sync failed: {}", e),
            }
        }))
    }

    fn run_exclusive(&self, from: ProductId) -> Result<SyncReport> {
        let started = Instant::now();
        let batch_size = self.options.batch_size.max(1);
        let retry = &self.options.retry;
        let mut report = SyncReport::new(from);
        let mut cursor = from;

        tracing::info!("Starting sync from product {} (batch size {})", from, batch_size);

        loop {
            if self.cancel.swap(false, Ordering::AcqRel) {
                tracing::warn!("Sync cancelled before batch at cursor {}", cursor);
                report.resume_cursor = Some(cursor);
                return Ok(self.finish(report, started));
            }

            let page = match retry.run("catalog batch fetch", || {
                self.reader.read_page(cursor, batch_size)
            }) {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Sync aborted at cursor {}: {}", cursor, e);
                    report.resume_cursor = Some(cursor);
                    self.finish(report, started);
                    return Err(e);
                }
            };

            if page.products.is_empty() {
                break;
            }
            report.batches += 1;

            let mut batch_failed = 0usize;
            for product in &page.products {
                report.products_seen += 1;
                let projection = Projector::project(product);
                match retry.run("index upsert", || self.writer.upsert(projection.clone())) {
                    Ok(()) => report.upserted += 1,
                    Err(e) => {
                        tracing::warn!("Skipping product {}: {}", product.id, e);
                        report.record_failure(product.id);
                        batch_failed += 1;
                    }
                }
            }

            tracing::info!(
                "Synced batch of {} products ({} failed, total {}), next cursor {:?}",
                page.products.len(),
                batch_failed,
                report.products_seen,
                page.next_product_id
            );

            match page.next_product_id {
                Some(next) => {
                    cursor = next;
                    self.save_checkpoint(cursor, report.products_seen);
                }
                None => break,
            }
        }

        report.completed = true;
        if let Some(store) = &self.options.checkpoint {
            if let Err(e) = store.clear() {
                tracing::warn!("Failed to clear sync checkpoint {:?}: {}", store.path(), e);
            }
        }
        Ok(self.finish(report, started))
    }

    /// checkpoint 写失败不影响同步本身
    fn save_checkpoint(&self, cursor: ProductId, products_seen: u64) {
        let Some(store) = &self.options.checkpoint else {
            return;
        };
        if let Err(e) = store.save(&SyncCheckpoint::new(cursor, products_seen)) {
            tracing::warn!("Failed to persist sync checkpoint {:?}: {}", store.path(), e);
        }
    }

    fn finish(&self, mut report: SyncReport, started: Instant) -> SyncReport {
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Sync finished: completed={} products={} upserted={} failed={} in {}ms",
            report.completed,
            report.products_seen,
            report.upserted,
            report.failed,
            report.elapsed_ms
        );
        *self.last_report.lock() = Some(report.clone());
        report
    }
}
