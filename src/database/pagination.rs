use serde::{Deserialize, Serialize};

use super::{error::Error, filters::QueryParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Reads `limit`/`offset`; the limit is clamped to `page_size`.
    pub fn from_params(params: &QueryParams, page_size: i64) -> Result<Self, Error> {
        let limit = params
            .get_number::<i64>("limit")?
            .unwrap_or(page_size)
            .clamp(1, page_size);
        let offset = params.get_number::<i64>("offset")?.unwrap_or(0).max(0);

        Ok(Self { limit, offset })
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PageContext<T> {
    pub count: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: Pagination) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows, page);
        }

        let next_offset = page.offset + page.limit;
        let next_offset = (next_offset < total_rows).then_some(next_offset);
        let prev_offset = (page.offset > 0).then(|| (page.offset - page.limit).max(0));

        Self {
            count: total_rows,
            next_offset,
            prev_offset,
            results: rows,
        }
    }

    /// An empty page; `total_rows` still reports every matching row.
    pub fn no_rows(total_rows: i64, page: Pagination) -> Self {
        Self {
            count: total_rows,
            next_offset: None,
            prev_offset: (page.offset > 0).then(|| (page.offset - page.limit).max(0)),
            results: vec![],
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            count: self.count,
            next_offset: self.next_offset,
            prev_offset: self.prev_offset,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
