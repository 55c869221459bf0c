use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};

use crate::core::{JoinedSkuRow, OptionRow, OptionValue, ProductId, ProductRow, SkuOption};
use crate::error::Result;
use crate::storage::CatalogSource;

/// IN (...) 子句每次绑定的最大参数数
const IN_CLAUSE_CHUNK: usize = 500;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    article TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS skus (
    id INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL REFERENCES products(id),
    count INTEGER NOT NULL DEFAULT 0,
    barcode TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_skus_product ON skus(product_id);
CREATE TABLE IF NOT EXISTS options (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    display_name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS option_values (
    id INTEGER PRIMARY KEY,
    option_id INTEGER NOT NULL REFERENCES options(id),
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS sku_options (
    id INTEGER PRIMARY KEY,
    sku_id INTEGER NOT NULL REFERENCES skus(id),
    option_value_id INTEGER NOT NULL REFERENCES option_values(id),
    is_range INTEGER NOT NULL DEFAULT 0,
    range_end_value_id INTEGER REFERENCES option_values(id)
);
CREATE INDEX IF NOT EXISTS idx_sku_options_sku ON sku_options(sku_id);
";

/// SQLite 实现的目录读取端
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// 打开已有目录库（不建表、不迁移）
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 建表（仅用于空库：测试 fixture / 本地演示）
    pub fn create_schema(&self) -> Result<()> {
        self.execute_batch(SCHEMA)
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    pub fn version(&self) -> Result<String> {
        let conn = self.conn.lock();
        let v: String = conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?;
        Ok(v)
    }

    fn product_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
        Ok(ProductRow {
            id: row.get(0)?,
            name: row.get(1)?,
            article: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn joined_row(row: &Row<'_>) -> rusqlite::Result<JoinedSkuRow> {
        let value_id: Option<i64> = row.get(9)?;
        let is_range = row.get::<_, Option<i64>>(11)?.unwrap_or(0) == 1;
        let range_end: Option<String> = row.get(12)?;

        // 属性是否存在只看 ov.id；option 取自 ov.option_id，options 行缺失时名称为空
        let attribute = match value_id {
            Some(value_id) => Some(SkuOption {
                option_id: row.get(6)?,
                option_name: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                option_display_name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                value_id,
                value: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
                is_range,
                range_end_value: range_end.filter(|v| is_range && !v.is_empty()),
            }),
            None => None,
        };

        Ok(JoinedSkuRow {
            product_id: row.get(0)?,
            sku_id: row.get(1)?,
            count: row.get(2)?,
            barcode: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            attribute,
        })
    }
}

impl CatalogSource for SqliteCatalog {
    fn fetch_products_page(&self, min_id: ProductId, limit: usize) -> Result<Vec<ProductRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, article, created_at, updated_at
             FROM products
             WHERE id >= ?1
             ORDER BY id
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![min_id, limit as i64], Self::product_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn next_product_id(&self, after: ProductId) -> Result<Option<ProductId>> {
        let conn = self.conn.lock();
        let next = conn
            .query_row(
                "SELECT id FROM products WHERE id > ?1 ORDER BY id LIMIT 1",
                params![after],
                |r| r.get(0),
            )
            .optional()?;
        Ok(next)
    }

    fn fetch_joined_rows(&self, product_ids: &[ProductId]) -> Result<Vec<JoinedSkuRow>> {
        let conn = self.conn.lock();
        let mut out = Vec::new();
        for chunk in product_ids.chunks(IN_CLAUSE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT
                    s.product_id,
                    s.id,
                    s.count,
                    s.barcode,
                    s.created_at,
                    s.updated_at,
                    ov.option_id,
                    o.name,
                    o.display_name,
                    ov.id,
                    ov.value,
                    so.is_range,
                    ov_end.value
                 FROM skus s
                 LEFT JOIN sku_options so ON s.id = so.sku_id
                 LEFT JOIN option_values ov ON so.option_value_id = ov.id
                 LEFT JOIN options o ON ov.option_id = o.id
                 LEFT JOIN option_values ov_end ON so.range_end_value_id = ov_end.id
                 WHERE s.product_id IN ({})
                 ORDER BY s.product_id, s.id, o.name, ov.id",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), Self::joined_row)?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }

    fn fetch_option_rows(&self) -> Result<Vec<OptionRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT o.id, o.name, o.display_name, ov.id, ov.value
             FROM options o
             LEFT JOIN option_values ov ON o.id = ov.option_id
             ORDER BY o.id, ov.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let value_id: Option<i64> = row.get(3)?;
                let value: Option<String> = row.get(4)?;
                Ok(OptionRow {
                    option_id: row.get(0)?,
                    option_name: row.get(1)?,
                    option_display_name: row.get(2)?,
                    value: value_id
                        .zip(value)
                        .map(|(id, value)| OptionValue { id, value }),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
        Ok(())
    }
}
