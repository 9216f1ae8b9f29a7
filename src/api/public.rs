use rocket::{serde::json::Json, Route};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    mongodb::Coll,
    pagination::{Pagination, PaginationResult},
    question::Question,
    tally::QuestionView,
};
use crate::store::{MongoStore, TallyStore};

pub fn routes() -> Vec<Route> {
    routes![questions]
}

/// A page of questions with their live results.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionPage {
    pub questions: Vec<QuestionView>,
    pub pagination: PaginationResult,
}

/// Results are public: anyone may read the tallies.
#[get("/questions")]
async fn questions(
    pagination: Pagination,
    store: MongoStore,
    questions: Coll<Question>,
) -> Result<Json<QuestionPage>> {
    let page = store.list_questions(&pagination).await?;
    let total = questions.count_documents(None, None).await?;

    Ok(Json(QuestionPage {
        questions: page.iter().map(QuestionView::from).collect(),
        pagination: pagination.result(usize::try_from(total).unwrap_or(usize::MAX)),
    }))
}
