use serde::Serialize;

pub const PER_PAGE: i64 = 10;

/// One page of results in the shape clients already consume:
/// `{ current_page, data, per_page, total, last_page }`
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub current_page: i64,
    pub data: Vec<T>,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, current_page: i64, per_page: i64, total: i64) -> Page<T> {
        Page {
            current_page,
            data,
            per_page,
            total,
            last_page: last_page(total, per_page),
        }
    }
}

/// Pages are 1-based, anything lower is treated as the first page.
/// `None` when the page starts past any row a table could hold.
pub fn offset(page: i64, per_page: i64) -> Option<i64> {
    (page.max(1) - 1).checked_mul(per_page)
}

pub fn last_page(total: i64, per_page: i64) -> i64 {
    ((total + per_page - 1) / per_page).max(1)
}
