use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct PageQuery {
    /// Page number, starting at 1
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page (1..=100)
    #[schema(example = 20)]
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// Returns `(page, per_page, offset)` with defaults applied and bounds clamped.
    pub fn resolve(&self) -> (u32, u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, query: &PageQuery, total: i64) -> Self {
        let (page, per_page, _) = query.resolve();
        Self {
            data,
            page,
            per_page,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(page: Option<u32>, per_page: Option<u32>) -> PageQuery {
        PageQuery { page, per_page }
    }

    #[test]
    fn defaults_apply() {
        assert_eq!(q(None, None).resolve(), (1, 20, 0));
    }

    #[test]
    fn bounds_are_clamped() {
        assert_eq!(q(Some(0), Some(0)).resolve(), (1, 1, 0));
        assert_eq!(q(Some(3), Some(500)).resolve(), (3, 100, 200));
    }

    #[test]
    fn huge_pages_do_not_overflow() {
        let (_, _, offset) = q(Some(u32::MAX), Some(100)).resolve();
        assert_eq!(offset, u32::MAX);
    }
}
