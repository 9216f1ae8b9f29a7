use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::identity::{IdentityPolicy, Normalizer};
use crate::model::mongodb::ensure_indexes_exist;
use crate::session::Sessions;

fn default_question_page_size() -> usize {
    100
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    login_domain: String,
    #[serde(default = "default_question_page_size")]
    question_page_size: usize,
    #[serde(default)]
    electorate: IdentityPolicy,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Domain appended to identities to form login tokens.
    pub fn login_domain(&self) -> &str {
        &self.login_domain
    }

    /// Page size used when loading every question.
    pub fn question_page_size(&self) -> usize {
        self.question_page_size.max(1)
    }

    /// Who may vote.
    pub fn electorate(&self) -> &IdentityPolicy {
        &self.electorate
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                auth_ttl: 3600,
                login_domain: "mcb.student".to_string(),
                question_page_size: 100,
                electorate: IdentityPolicy::default(),
                jwt_secret: "jwt secret".to_string(),
            }
        }
    }
}

/// A fairing that loads the application config and puts it in managed state,
/// together with the identity normalizer built from it and an empty session
/// registry.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Compile the identity patterns.
        let normalizer = match Normalizer::new(config.electorate().clone()) {
            Ok(normalizer) => normalizer,
            Err(e) => {
                error!("Invalid electorate config: {e}");
                return Err(rocket);
            }
        };
        info!("Electorate: {}", config.electorate().describe_ranges());

        // Manage the state. Sessions idle for a whole token lifetime are dropped.
        let sessions = Sessions::new(config.auth_ttl());
        rocket = rocket
            .manage(config)
            .manage(normalizer)
            .manage(sessions);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist. Receipt uniqueness depends on them.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "vote_poll".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

#[cfg(test)]
mod tests {
    use rocket::figment::{
        providers::{Format, Toml},
        Figment,
    };

    use super::*;

    #[test]
    fn electorate_defaults() {
        let config: Config = Figment::from(Toml::string(
            r#"
                auth_ttl = 3600
                login_domain = "mcb.student"
                jwt_secret = "secret"
            "#,
        ))
        .extract()
        .unwrap();

        assert_eq!(Duration::hours(1), config.auth_ttl());
        assert_eq!(100, config.question_page_size());
        assert_eq!(&IdentityPolicy::default(), config.electorate());
    }

    #[test]
    fn electorate_overrides() {
        let config: Config = Figment::from(Toml::string(
            r#"
                auth_ttl = 60
                login_domain = "ab.student"
                jwt_secret = "secret"
                question_page_size = 0

                [electorate]
                department = "AB"
                cohorts = [{ cohort = "19", min = 1, max = 9 }]
            "#,
        ))
        .extract()
        .unwrap();

        assert_eq!(1, config.question_page_size());
        assert_eq!("AB", config.electorate().department);
        assert_eq!("SCI", config.electorate().faculty);
        assert!(config.electorate().has_cohort("19"));
        assert!(!config.electorate().has_cohort("20"));
    }
}
