use mongodb::{
    bson::{doc, Document},
    options::FindOptions,
    Database,
};
use rocket::{
    futures::TryStreamExt,
    request::{self, FromRequest, Request},
    State,
};

use crate::identity::Identity;
use crate::model::{
    mongodb::{Coll, Id},
    pagination::Pagination,
    question::Question,
    receipt::{NewVoteReceipt, VoteReceipt},
};

use super::{BallotBox, StoreError, TallyStore};

/// Both stores, backed by MongoDB collections.
#[derive(Clone)]
pub struct MongoStore {
    questions: Coll<Question>,
    receipts: Coll<VoteReceipt>,
    new_receipts: Coll<NewVoteReceipt>,
}

impl MongoStore {
    pub fn from_db(db: &Database) -> Self {
        Self {
            questions: Coll::from_db(db),
            receipts: Coll::from_db(db),
            new_receipts: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl BallotBox for MongoStore {
    async fn find_receipt(&self, identity: &Identity) -> Result<Option<VoteReceipt>, StoreError> {
        let receipt = self
            .receipts
            .find_one(doc! { "identity": identity.as_str() }, None)
            .await?;
        Ok(receipt)
    }

    async fn create_receipt(&self, receipt: &NewVoteReceipt) -> Result<(), StoreError> {
        self.new_receipts.insert_one(receipt, None).await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl TallyStore for MongoStore {
    async fn list_questions(&self, pagination: &Pagination) -> Result<Vec<Question>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .skip(pagination.skip())
            .limit(pagination.limit())
            .build();
        let questions = self
            .questions
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(questions)
    }

    async fn increment(&self, question: Id, slot: usize) -> Result<(), StoreError> {
        let mut increment = Document::new();
        increment.insert(format!("options.{slot}.votes"), 1_i64);
        let result = self
            .questions
            .update_one(question.as_doc(), doc! { "$inc": increment }, None)
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound(format!("No question with ID {question}")));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MongoStore {
    type Error = ();

    /// Fails iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<Database>>()
            .await
            .map(|db| MongoStore::from_db(db))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mongodb::Database;

    use super::*;
    use crate::identity::{IdentityPolicy, Normalizer};
    use crate::model::{
        question::{NewQuestion, QuestionCore},
        receipt::VoteReceiptCore,
    };

    fn identity(raw: &str) -> Identity {
        Normalizer::new(IdentityPolicy::default())
            .unwrap()
            .normalize(raw)
            .unwrap()
    }

    #[backend_test]
    async fn receipts_are_unique(db: Database) {
        let store = MongoStore::from_db(&db);
        let receipt = VoteReceiptCore::new(identity("SCI20MCB001"), Id::new(), vec![Id::new()]);

        assert!(store.find_receipt(&receipt.identity).await.unwrap().is_none());
        store.create_receipt(&receipt).await.unwrap();

        let found = store.find_receipt(&receipt.identity).await.unwrap().unwrap();
        assert_eq!(receipt.identity, found.identity);
        assert_eq!(receipt.voted_questions, found.voted_questions);
        assert!(found.timestamp <= Utc::now());

        let again = VoteReceiptCore::new(identity("20mcb001"), Id::new(), vec![]);
        assert!(matches!(
            store.create_receipt(&again).await,
            Err(StoreError::Duplicate)
        ));

        let other = VoteReceiptCore::new(identity("SCI20MCB002"), Id::new(), vec![]);
        store.create_receipt(&other).await.unwrap();
    }

    #[backend_test]
    async fn increments_one_slot(db: Database, new_questions: Coll<NewQuestion>) {
        let store = MongoStore::from_db(&db);
        let id: Id = new_questions
            .insert_one(QuestionCore::example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        store.increment(id, 0).await.unwrap();
        store.increment(id, 2).await.unwrap();
        store.increment(id, 2).await.unwrap();

        let questions = store.list_questions(&Pagination::new(1, 10)).await.unwrap();
        assert_eq!(1, questions.len());
        let votes: Vec<_> = questions[0].occupied().map(|(_, o)| o.votes).collect();
        assert_eq!(vec![4, 4, 7], votes);

        assert!(matches!(
            store.increment(Id::new(), 0).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[backend_test]
    async fn lists_in_pages(db: Database, new_questions: Coll<NewQuestion>) {
        let store = MongoStore::from_db(&db);
        for _ in 0..5 {
            new_questions
                .insert_one(QuestionCore::example2(), None)
                .await
                .unwrap();
        }

        let first = store.list_questions(&Pagination::new(1, 2)).await.unwrap();
        let third = store.list_questions(&Pagination::new(3, 2)).await.unwrap();
        assert_eq!(2, first.len());
        assert_eq!(1, third.len());
        assert!(first[0].id < first[1].id);

        let all = super::super::all_questions(&store, 2).await.unwrap();
        assert_eq!(5, all.len());
    }
}
