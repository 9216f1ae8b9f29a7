use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    identity::Normalizer,
    logging::RequestId,
    model::{
        account::{login_token, Account, Credentials, NewAccount, MIN_LOGIN_PASSWORD_LENGTH},
        auth::{AuthToken, AUTH_TOKEN_COOKIE},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    session::{SessionView, Sessions, VoteError},
    store::MongoStore,
    Config,
};

use super::common::{account_by_id, start_session};

pub fn routes() -> Vec<Route> {
    routes![signup, login, logout]
}

const BAD_CREDENTIALS: &str = "Invalid matric number or password";

#[allow(clippy::too_many_arguments)]
#[post("/auth/signup", data = "<credentials>", format = "json")]
pub async fn signup(
    id: &RequestId,
    credentials: Json<Credentials>,
    cookies: &CookieJar<'_>,
    accounts: Coll<Account>,
    new_accounts: Coll<NewAccount>,
    store: MongoStore,
    normalizer: &State<Normalizer>,
    sessions: &State<Sessions>,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    // Only members of the electorate may sign up.
    let identity = normalizer
        .admit(&credentials.matric_number)
        .map_err(VoteError::from)?;
    let account = NewAccount::new(&identity, &credentials.password, config.login_domain())?;

    let new_id: Id = match new_accounts.insert_one(&account, None).await {
        Ok(result) => result.inserted_id.as_object_id().map(Id::from).ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                "Database returned a non-ObjectId account ID".to_string(),
            )
        })?,
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::Status(
                Status::Conflict,
                format!("An account for {identity} already exists"),
            ));
        }
        Err(err) => return Err(err.into()),
    };
    info!("{id}: created account {new_id} for {identity}");

    let account = account_by_id(new_id, &accounts).await?.ok_or_else(|| {
        Error::Status(
            Status::InternalServerError,
            format!("Account {new_id} vanished after creation"),
        )
    })?;

    cookies.add(AuthToken::new(&account).into_cookie(config)?);
    let session = start_session(
        &account,
        normalizer,
        &store,
        sessions,
        config.question_page_size(),
        cookies,
    )
    .await?;
    let view = session.lock().await.view();
    Ok(Json(view))
}

#[allow(clippy::too_many_arguments)]
#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    id: &RequestId,
    credentials: Json<Credentials>,
    cookies: &CookieJar<'_>,
    accounts: Coll<Account>,
    store: MongoStore,
    normalizer: &State<Normalizer>,
    sessions: &State<Sessions>,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    if credentials.password.chars().count() < MIN_LOGIN_PASSWORD_LENGTH {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Password must be at least {MIN_LOGIN_PASSWORD_LENGTH} characters"),
        ));
    }
    let unauthorized = || Error::Status(Status::Unauthorized, BAD_CREDENTIALS.to_string());

    let identity = normalizer
        .normalize(&credentials.matric_number)
        .ok_or_else(unauthorized)?;
    let with_login = doc! {
        "login": login_token(&identity, config.login_domain()),
    };
    let account = accounts
        .find_one(with_login, None)
        .await?
        .filter(|account| account.verify_password(&credentials.password))
        .ok_or_else(unauthorized)?;
    info!("{id}: {identity} signed in as account {}", account.id);

    // The session decides whether this identity may vote before any cookie is set.
    let session = start_session(
        &account,
        normalizer,
        &store,
        sessions,
        config.question_page_size(),
        cookies,
    )
    .await?;
    cookies.add(AuthToken::new(&account).into_cookie(config)?);
    let view = session.lock().await.view();
    Ok(Json(view))
}

#[delete("/auth")]
pub async fn logout(
    token: Option<AuthToken>,
    cookies: &CookieJar<'_>,
    sessions: &State<Sessions>,
) -> Status {
    if let Some(token) = token {
        if let Some(session) = sessions.get(token.id) {
            session.lock().await.logout();
        }
        sessions.remove(token.id);
    }
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
