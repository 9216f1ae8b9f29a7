use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A 1-indexed page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    /// Create a pagination; zero page numbers and sizes are bumped to 1.
    pub fn new(page_num: usize, page_size: usize) -> Self {
        Self {
            page_num: page_num.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Create a pagination the database can express: both the offset and the
    /// page size must fit in an `i64`. Returns `None` for zero or huge values.
    pub fn checked(page_num: usize, page_size: usize) -> Option<Self> {
        if page_num == 0 || page_size == 0 {
            return None;
        }
        let skip = (page_num - 1).checked_mul(page_size)?;
        i64::try_from(skip).ok()?;
        i64::try_from(page_size).ok()?;
        Some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of documents before this page, saturating at `i64::MAX`.
    pub fn skip(&self) -> u64 {
        let skip = (self.page_num - 1).saturating_mul(self.page_size);
        i64::try_from(skip).unwrap_or(i64::MAX).unsigned_abs()
    }

    /// The page size as a database limit, saturating at `i64::MAX`.
    pub fn limit(&self) -> i64 {
        i64::try_from(self.page_size).unwrap_or(i64::MAX)
    }

    /// The page after this one.
    pub fn next(&self) -> Self {
        Self::new(self.page_num.saturating_add(1), self.page_size)
    }

    pub fn result(self, total: usize) -> PaginationResult {
        PaginationResult {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = req.query_value::<usize>("page_num").unwrap_or(Ok(1));
        let page_size = req
            .query_value::<usize>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE));
        match (page_num, page_size) {
            (Ok(page_num), Ok(page_size)) => match Self::checked(page_num, page_size) {
                Some(pagination) => request::Outcome::Success(pagination),
                None => request::Outcome::Failure((Status::BadRequest, ())),
            },
            _ => request::Outcome::Failure((Status::BadRequest, ())),
        }
    }
}

/// Where a page sits within the whole listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: usize,
    pub page_size: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips() {
        let first = Pagination::new(1, 100);
        assert_eq!(0, first.skip());
        assert_eq!(100, first.next().skip());
        assert_eq!(250, Pagination::new(6, 50).skip());
        assert_eq!(Pagination::new(1, 1), Pagination::new(0, 0));
    }

    #[test]
    fn huge_pages() {
        assert_eq!(None, Pagination::checked(0, 10));
        assert_eq!(None, Pagination::checked(1, 0));
        assert_eq!(None, Pagination::checked(usize::MAX, 2));
        assert_eq!(None, Pagination::checked(1, usize::MAX));
        assert_eq!(None, Pagination::checked(2, i64::MAX as usize + 1));
        assert_eq!(Some(Pagination::new(3, 2)), Pagination::checked(3, 2));

        let unchecked = Pagination::new(usize::MAX, 2);
        assert_eq!(i64::MAX as u64, unchecked.skip());
        assert_eq!(i64::MAX, Pagination::new(1, usize::MAX).limit());
        assert_eq!(usize::MAX, unchecked.next().page_num());
    }
}
