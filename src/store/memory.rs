//! An in-memory store with fault injection, for exercising the voting protocol
//! without a database.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::identity::Identity;
use crate::model::{
    mongodb::Id,
    pagination::Pagination,
    question::Question,
    receipt::{NewVoteReceipt, VoteReceipt},
};

use super::{BallotBox, StoreError, TallyStore};

/// Number of calls made to each store operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub find_receipt: usize,
    pub create_receipt: usize,
    pub list_questions: usize,
    pub increment: usize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.find_receipt + self.create_receipt + self.list_questions + self.increment
    }

    pub fn writes(&self) -> usize {
        self.create_receipt + self.increment
    }
}

/// Faults to inject.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Receipt reads fail with a permission error.
    pub deny_receipt_reads: bool,
    /// Receipt reads see nothing, as if racing with another session's write.
    pub hide_receipts: bool,
    /// Receipt creation fails for a reason other than a duplicate.
    pub fail_receipt_creates: bool,
    /// Question listing fails.
    pub fail_question_reads: bool,
    /// Increments on these questions fail.
    pub failing_tallies: HashSet<Id>,
}

#[derive(Debug, Default)]
struct Inner {
    receipts: Vec<VoteReceipt>,
    questions: Vec<Question>,
    faults: Faults,
    calls: Calls,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn with_questions(questions: Vec<Question>) -> Self {
        let store = Self::default();
        store.lock().questions = questions;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls
    }

    pub fn receipts(&self) -> Vec<VoteReceipt> {
        self.lock().receipts.clone()
    }

    pub fn questions(&self) -> Vec<Question> {
        self.lock().questions.clone()
    }
}

#[rocket::async_trait]
impl BallotBox for MemoryStore {
    async fn find_receipt(&self, identity: &Identity) -> Result<Option<VoteReceipt>, StoreError> {
        let mut inner = self.lock();
        inner.calls.find_receipt += 1;
        if inner.faults.deny_receipt_reads {
            return Err(StoreError::PermissionDenied("receipts".to_string()));
        }
        if inner.faults.hide_receipts {
            return Ok(None);
        }
        Ok(inner
            .receipts
            .iter()
            .find(|receipt| &receipt.identity == identity)
            .cloned())
    }

    async fn create_receipt(&self, receipt: &NewVoteReceipt) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.create_receipt += 1;
        if inner.faults.fail_receipt_creates {
            return Err(StoreError::Unavailable("receipts".to_string()));
        }
        if inner
            .receipts
            .iter()
            .any(|existing| existing.identity == receipt.identity)
        {
            return Err(StoreError::Duplicate);
        }
        inner.receipts.push(VoteReceipt {
            id: Id::new(),
            receipt: receipt.clone(),
        });
        Ok(())
    }
}

#[rocket::async_trait]
impl TallyStore for MemoryStore {
    async fn list_questions(&self, pagination: &Pagination) -> Result<Vec<Question>, StoreError> {
        let mut inner = self.lock();
        inner.calls.list_questions += 1;
        if inner.faults.fail_question_reads {
            return Err(StoreError::Unavailable("questions".to_string()));
        }
        Ok(inner
            .questions
            .iter()
            .skip(pagination.skip() as usize)
            .take(pagination.page_size())
            .cloned()
            .collect())
    }

    async fn increment(&self, question: Id, slot: usize) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.increment += 1;
        if inner.faults.failing_tallies.contains(&question) {
            return Err(StoreError::Unavailable(format!("question {question}")));
        }
        let option = inner
            .questions
            .iter_mut()
            .find(|q| q.id == question)
            .and_then(|q| q.options.get_mut(slot))
            .and_then(Option::as_mut)
            .ok_or_else(|| StoreError::NotFound(format!("question {question} slot {slot}")))?;
        option.votes += 1;
        Ok(())
    }
}
