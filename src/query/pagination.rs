use serde::Serialize;

use crate::error::{Error, Result};

pub const MIN_PAGE_SIZE: i64 = 1;
pub const MAX_PAGE_SIZE: i64 = 1000;
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// 已校验的分页请求（page 从 0 开始，page_size ∈ [1, 1000]）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Result<Self> {
        if page < 0 {
            return Err(Error::validation(format!(
                "invalid page parameter: {} (must be >= 0)",
                page
            )));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(Error::validation(format!(
                "invalid count parameter: {} (must be {}-{})",
                page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok(Self {
            page: page as u64,
            page_size: page_size as u64,
        })
    }

    /// 从原始查询参数解析；缺省或空串取默认值
    pub fn parse(page: Option<&str>, count: Option<&str>, default_size: u64) -> Result<Self> {
        let page = match page.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s
                .parse::<i64>()
                .map_err(|_| Error::validation(format!("invalid page parameter: {}", s)))?,
            None => 0,
        };
        let size = match count.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s
                .parse::<i64>()
                .map_err(|_| Error::validation(format!("invalid count parameter: {}", s)))?,
            None => default_size as i64,
        };
        Self::new(page, size)
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        usize::try_from(self.page.saturating_mul(self.page_size)).unwrap_or(usize::MAX)
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }
}

/// 响应中的分页元信息
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total_count: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub next_page: Option<u64>,
    /// 本页实际返回条数
    pub count: usize,
}

impl PageMeta {
    /// total_pages = ceil(total / size)；仅当还有后续页时给出 next_page
    pub fn compute(total_count: u64, request: PageRequest, returned: usize) -> Self {
        let total_pages = total_count.div_ceil(request.page_size);
        let next_page = (request.page + 1 < total_pages).then_some(request.page + 1);
        Self {
            total_count,
            total_pages,
            current_page: request.page,
            next_page,
            count: returned,
        }
    }
}
