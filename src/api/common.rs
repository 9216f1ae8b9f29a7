use rocket::http::{Cookie, CookieJar, Status};

use crate::error::{Error, Result};
use crate::identity::Normalizer;
use crate::model::{
    account::Account,
    auth::{AuthToken, AUTH_TOKEN_COOKIE},
    mongodb::{Coll, Id},
};
use crate::session::{SessionHandle, Sessions, VoteError, VotingSession};
use crate::store::MongoStore;

/// Look up an account by ID.
pub async fn account_by_id(id: Id, accounts: &Coll<Account>) -> Result<Option<Account>> {
    Ok(accounts.find_one(id.as_doc(), None).await?)
}

/// Start a session for the account and register it, replacing any earlier one.
///
/// A rejected identity ends the authenticated session: the cookie is removed.
pub async fn start_session(
    account: &Account,
    normalizer: &Normalizer,
    store: &MongoStore,
    sessions: &Sessions,
    page_size: usize,
    cookies: &CookieJar<'_>,
) -> Result<SessionHandle> {
    match VotingSession::start(account, normalizer, store, page_size).await {
        Ok(session) => Ok(sessions.insert(session)),
        Err(err) => {
            if matches!(err, VoteError::IdentityRejected(_)) {
                cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
                sessions.remove(account.id);
            }
            Err(err.into())
        }
    }
}

/// The caller's live session, re-established from their auth token if the
/// server has none (e.g. after a restart).
pub async fn session_for(
    token: &AuthToken,
    accounts: &Coll<Account>,
    normalizer: &Normalizer,
    store: &MongoStore,
    sessions: &Sessions,
    page_size: usize,
    cookies: &CookieJar<'_>,
) -> Result<SessionHandle> {
    if let Some(session) = sessions.get(token.id) {
        return Ok(session);
    }

    let Some(account) = account_by_id(token.id, accounts).await? else {
        cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
        return Err(Error::Status(
            Status::Unauthorized,
            format!("No account found with ID {}", token.id),
        ));
    };
    debug!("Re-establishing voting session for account {}", account.id);
    start_session(&account, normalizer, store, sessions, page_size, cookies).await
}
