use std::ops::{Deref, DerefMut};

use argon2::Config as Argon2Config;
use rand::Rng;
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::model::mongodb::Id;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 265;
/// Passwords shorter than this can never match, so login rejects them up front.
pub const MIN_LOGIN_PASSWORD_LENGTH: usize = 6;

/// Raw credentials, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub matric_number: String,
    pub password: String,
}

/// The login token an identity signs in with.
pub fn login_token(identity: &Identity, login_domain: &str) -> String {
    format!("{}@{login_domain}", identity.to_lowercase())
}

/// Core account data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCore {
    /// Unique login token, derived from the canonical identity.
    pub login: String,
    /// Display name; holds the canonical identity.
    pub name: String,
    pub password_hash: String,
}

impl AccountCore {
    /// Create an account for the given identity, hashing the password.
    /// This enforces the password length limits.
    pub fn new(identity: &Identity, password: &str, login_domain: &str) -> Result<Self> {
        let length = password.chars().count();
        if length < MIN_PASSWORD_LENGTH {
            return Err(Error::Status(
                Status::BadRequest,
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            ));
        }
        if length > MAX_PASSWORD_LENGTH {
            return Err(Error::Status(
                Status::BadRequest,
                format!("Password must be at most {MAX_PASSWORD_LENGTH} characters"),
            ));
        }

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(password.as_bytes(), &salt, &Argon2Config::default())?;
        Ok(Self {
            login: login_token(identity, login_domain),
            name: identity.to_string(),
            password_hash,
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// An account without an ID.
pub type NewAccount = AccountCore;

/// An account from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub account: AccountCore,
}

impl Deref for Account {
    type Target = AccountCore;

    fn deref(&self) -> &Self::Target {
        &self.account
    }
}

impl DerefMut for Account {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.account
    }
}
