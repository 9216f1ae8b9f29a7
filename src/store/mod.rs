//! The document-store collaborator: where vote receipts and question tallies live.
//!
//! Reads and writes are asymmetric. The controller treats a failed
//! receipt *read* as "not voted yet" and lets the voter try, but a receipt *write*
//! only succeeds once per identity, because the store enforces uniqueness on it.
//! That uniqueness is the only real guard against double voting.

use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::identity::Identity;
use crate::model::{
    mongodb::{is_duplicate_key_error, is_permission_error, is_unreachable_error, Id},
    pagination::Pagination,
    question::Question,
    receipt::{NewVoteReceipt, VoteReceipt},
};

#[cfg(test)]
pub mod memory;
mod mongo;

pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A document with the same unique key already exists.
    #[error("A document with the same unique key already exists")]
    Duplicate,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Db(DbError),
    /// The database could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if is_duplicate_key_error(&err) {
            Self::Duplicate
        } else if is_permission_error(&err) {
            Self::PermissionDenied(err.to_string())
        } else if is_unreachable_error(&err) {
            Self::Unavailable(err.to_string())
        } else {
            Self::Db(err)
        }
    }
}

/// The collection of vote receipts.
#[rocket::async_trait]
pub trait BallotBox: Send + Sync {
    /// Find the receipt for this identity, if it has voted.
    async fn find_receipt(&self, identity: &Identity) -> Result<Option<VoteReceipt>, StoreError>;

    /// Atomically create a receipt, failing with [`StoreError::Duplicate`] if one
    /// already exists for the same identity.
    async fn create_receipt(&self, receipt: &NewVoteReceipt) -> Result<(), StoreError>;
}

/// The collection of questions and their tallies.
#[rocket::async_trait]
pub trait TallyStore: Send + Sync {
    /// One page of questions, in a stable order.
    async fn list_questions(&self, pagination: &Pagination) -> Result<Vec<Question>, StoreError>;

    /// Add one vote to the given option slot of a question.
    async fn increment(&self, question: Id, slot: usize) -> Result<(), StoreError>;
}

/// Fetch every question, page by page, stopping at the first short page.
pub async fn all_questions<S>(store: &S, page_size: usize) -> Result<Vec<Question>, StoreError>
where
    S: TallyStore + ?Sized,
{
    let mut questions = Vec::new();
    let mut pagination = Pagination::new(1, page_size);
    loop {
        let page = store.list_questions(&pagination).await?;
        let short = page.len() < pagination.page_size();
        questions.extend(page);
        if short {
            return Ok(questions);
        }
        pagination = pagination.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::MemoryStore;

    #[rocket::async_test]
    async fn pages_until_short_page() {
        let store = MemoryStore::with_questions((0..7).map(|_| Question::example()).collect());

        let questions = all_questions(&store, 3).await.unwrap();
        assert_eq!(7, questions.len());
        assert_eq!(3, store.calls().list_questions);

        // An exact multiple needs one extra, empty page to discover the end.
        let store = MemoryStore::with_questions((0..6).map(|_| Question::example()).collect());
        let questions = all_questions(&store, 3).await.unwrap();
        assert_eq!(6, questions.len());
        assert_eq!(3, store.calls().list_questions);
    }

    #[test]
    fn classifies_db_errors() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            StoreError::from(DbError::from(refused)),
            StoreError::Unavailable(_)
        ));
    }

    #[rocket::async_test]
    async fn keeps_order() {
        let expected: Vec<_> = (0..5).map(|_| Question::example2()).collect();
        let store = MemoryStore::with_questions(expected.clone());
        assert_eq!(expected, all_questions(&store, 2).await.unwrap());
    }
}
