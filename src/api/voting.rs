use rocket::{
    http::{CookieJar, Status},
    serde::json::{self, Json},
    Route, State,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    identity::Normalizer,
    logging::RequestId,
    model::{account::Account, auth::AuthToken, ballot::Ballot, mongodb::Coll, mongodb::Id},
    session::{SessionView, Sessions, Submission, VoteError},
    store::MongoStore,
    Config,
};

use super::common::session_for;

pub fn routes() -> Vec<Route> {
    routes![session, session_unauthenticated, select_option, submit]
}

/// One choice on the ballot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub question: Id,
    pub option: String,
}

/// Re-check whether the caller has voted and reload the tallies, then describe
/// their session.
#[allow(clippy::too_many_arguments)]
#[get("/session", rank = 1)]
async fn session(
    token: AuthToken,
    cookies: &CookieJar<'_>,
    accounts: Coll<Account>,
    store: MongoStore,
    normalizer: &State<Normalizer>,
    sessions: &State<Sessions>,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    let handle = session_for(
        &token,
        &accounts,
        normalizer,
        &store,
        sessions,
        config.question_page_size(),
        cookies,
    )
    .await?;
    let mut session = handle.lock().await;
    session.check(&store).await;
    session.refresh(&store).await;
    Ok(Json(session.view()))
}

/// No valid auth token. Sessions left behind by expired tokens are swept here.
#[get("/session", rank = 2)]
fn session_unauthenticated(sessions: &State<Sessions>) -> Json<SessionView> {
    sessions.prune();
    Json(SessionView::unauthenticated())
}

#[allow(clippy::too_many_arguments)]
#[put("/session/ballot", data = "<selection>", format = "json")]
async fn select_option(
    token: AuthToken,
    selection: Json<Selection>,
    cookies: &CookieJar<'_>,
    accounts: Coll<Account>,
    store: MongoStore,
    normalizer: &State<Normalizer>,
    sessions: &State<Sessions>,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    let handle = session_for(
        &token,
        &accounts,
        normalizer,
        &store,
        sessions,
        config.question_page_size(),
        cookies,
    )
    .await?;
    let mut session = handle.lock().await;
    let Selection { question, option } = selection.into_inner();
    match session.select_option(question, option) {
        // The view carries the state and the banner.
        Ok(()) | Err(VoteError::AlreadyVoted) => Ok(Json(session.view())),
        Err(err) => Err(err.into()),
    }
}

/// Submit the caller's ballot. A ballot in the body replaces the one built up
/// through `PUT /session/ballot`; an empty body submits that one as it is.
/// A body that is not a valid ballot is refused without submitting anything.
#[allow(clippy::too_many_arguments)]
#[post("/session/submit", data = "<ballot>")]
async fn submit(
    id: &RequestId,
    token: AuthToken,
    ballot: std::result::Result<Json<Ballot>, json::Error<'_>>,
    cookies: &CookieJar<'_>,
    accounts: Coll<Account>,
    store: MongoStore,
    normalizer: &State<Normalizer>,
    sessions: &State<Sessions>,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    let handle = session_for(
        &token,
        &accounts,
        normalizer,
        &store,
        sessions,
        config.question_page_size(),
        cookies,
    )
    .await?;
    let ballot = match ballot {
        Ok(Json(ballot)) => Some(ballot),
        Err(json::Error::Parse(body, _)) if body.trim().is_empty() => None,
        Err(err) => {
            return Err(Error::Status(Status::BadRequest, format!("Invalid ballot: {err}")));
        }
    };
    let mut session = handle.lock().await;
    if let Some(ballot) = ballot {
        if let Err(err) = session.replace_ballot(ballot) {
            return match err {
                VoteError::AlreadyVoted => Ok(Json(session.view())),
                err => Err(err.into()),
            };
        }
    }

    // Questions created since the session last loaded them could not be tallied.
    let stale = session
        .ballot()
        .questions()
        .into_iter()
        .any(|question| session.questions().iter().all(|loaded| loaded.id != question));
    if stale {
        session.refresh(&store).await;
    }

    match session.submit(&store).await? {
        Submission::Recorded { failed_tallies } if !failed_tallies.is_empty() => {
            warn!("{id}: vote recorded with {} failed tally update(s)", failed_tallies.len());
        }
        Submission::Recorded { .. } => info!("{id}: vote recorded"),
        Submission::AlreadyVoted => info!("{id}: submission refused, already voted"),
    }
    Ok(Json(session.view()))
}
