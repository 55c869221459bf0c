use std::fmt;

use serde::Serialize;

use crate::core::ProductId;

/// 失败 product id 样本上限（报告里不保留全量）
pub const FAILED_SAMPLE_CAP: usize = 100;

/// 索引统计
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// 文档数（= 已同步商品数）
    pub documents: usize,
    /// 不同 option_value_id 数量
    pub distinct_values: usize,
    /// 所有 posting 的 product 总数
    pub postings_total: u64,
    /// posting 序列化估算（字节）
    pub postings_bytes: u64,
}

/// 单次同步运行报告
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub started_from: ProductId,
    pub batches: u64,
    pub products_seen: u64,
    pub upserted: u64,
    pub failed: u64,
    pub failed_sample: Vec<ProductId>,
    /// 运行中断时的续跑游标；正常结束为 None
    pub resume_cursor: Option<ProductId>,
    pub completed: bool,
    pub elapsed_ms: u64,
}

impl SyncReport {
    pub fn new(started_from: ProductId) -> Self {
        Self {
            started_from,
            ..Default::default()
        }
    }

    pub fn record_failure(&mut self, product_id: ProductId) {
        self.failed += 1;
        if self.failed_sample.len() < FAILED_SAMPLE_CAP {
            self.failed_sample.push(product_id);
        }
    }
}

fn human_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "documents={} values={} postings={} ({})",
            self.documents,
            self.distinct_values,
            self.postings_total,
            human_bytes(self.postings_bytes)
        )
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════════════╗")?;
        writeln!(f, "║           facet-sync Sync Report                 ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════╣")?;
        writeln!(f, "║   started from: {:>10}                       ║", self.started_from)?;
        writeln!(f, "║   batches:      {:>10}                       ║", self.batches)?;
        writeln!(f, "║   products:     {:>10}                       ║", self.products_seen)?;
        writeln!(f, "║   upserted:     {:>10}                       ║", self.upserted)?;
        writeln!(f, "║   failed:       {:>10}                       ║", self.failed)?;
        match self.resume_cursor {
            Some(c) => writeln!(f, "║   resume at:    {:>10}                       ║", c)?,
            None => writeln!(f, "║   resume at:    {:>10}                       ║", "-")?,
        }
        writeln!(
            f,
            "║   completed:    {:>10}                       ║",
            self.completed
        )?;
        writeln!(f, "║   elapsed:      {:>8}ms                       ║", self.elapsed_ms)?;
        writeln!(f, "╚══════════════════════════════════════════════════╝")?;
        Ok(())
    }
}
