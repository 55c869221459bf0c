use std::fmt;

use thiserror::Error;

use crate::core::ProductId;

/// 上游依赖（关系型目录 / 搜索索引）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upstream {
    Catalog,
    Index,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Catalog => f.write_str("catalog"),
            Upstream::Index => f.write_str("index"),
        }
    }
}

/// facet 查询的三个独立 pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryPass {
    Count,
    Page,
    Facets,
}

impl fmt::Display for QueryPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPass::Count => f.write_str("count"),
            QueryPass::Page => f.write_str("page"),
            QueryPass::Facets => f.write_str("facets"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// 请求参数非法：在任何 I/O 之前拒绝
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{upstream} unavailable: {message}")]
    UpstreamUnavailable { upstream: Upstream, message: String },

    /// 单条 projection upsert 失败：记录日志后跳过，不中断批次
    #[error("failed to sync product {product_id}: {source}")]
    RecordSync {
        product_id: ProductId,
        #[source]
        source: Box<Error>,
    },

    #[error("query execution failed in {pass} pass: {source}")]
    QueryExecution {
        pass: QueryPass,
        #[source]
        source: Box<Error>,
    },

    #[error("a sync run is already in progress")]
    SyncInProgress,

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Error::UpstreamUnavailable {
            upstream: Upstream::Catalog,
            message: message.into(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        Error::UpstreamUnavailable {
            upstream: Upstream::Index,
            message: message.into(),
        }
    }

    pub fn in_pass(self, pass: QueryPass) -> Self {
        Error::QueryExecution {
            pass,
            source: Box::new(self),
        }
    }

    /// 仅上游不可用视为瞬时错误（可重试）
    pub fn is_transient(&self) -> bool {
        match self {
            Error::UpstreamUnavailable { .. } => true,
            Error::RecordSync { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::UpstreamUnavailable { .. } => "upstream_unavailable",
            Error::RecordSync { .. } => "record_sync",
            Error::QueryExecution { .. } => "query_execution",
            Error::SyncInProgress => "sync_in_progress",
            Error::Checkpoint(_) => "checkpoint",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::catalog(format!("SQLite error: {}", err))
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Checkpoint(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn rusqlite_error_is_transient_catalog_failure() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.is_transient());
        assert_eq!(err.kind(), "upstream_unavailable");
        assert!(err.to_string().starts_with("catalog unavailable"));
    }

    #[test]
    fn query_execution_keeps_source_chain() {
        let err = Error::index("connection reset").in_pass(QueryPass::Facets);
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "query execution failed in facets pass: index unavailable: connection reset"
        );
        let source = err.source().unwrap();
        assert!(source.to_string().contains("connection reset"));
    }

    #[test]
    fn validation_is_not_retried() {
        assert!(!Error::validation("count out of range").is_transient());
        assert!(!Error::SyncInProgress.is_transient());
    }
}
