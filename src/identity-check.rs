//! A CLI tool for checking whether matric numbers may vote.
//! This uses the same normalizer as the server and reads the electorate from
//! the server's configuration, so its answers match what sign-in would do.

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json::{self, json};

use vote_poll::identity::{IdentityPolicy, Normalizer, Rejection, Verdict};

const PROGRAM_NAME: &str = "identity-check";

const ABOUT_TEXT: &str = "Normalize matric numbers and check them against the electorate.

The electorate is read from the `electorate` table of Rocket.toml (and
ROCKET_ELECTORATE), falling back to the built-in default.

EXIT CODES:
     0: Every identifier may vote.
   255: Ran successfully, but at least one identifier was rejected.
 Other: Error.";

const IDENTIFIERS: &str = "IDENTIFIERS";
const JSON: &str = "json";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(IDENTIFIERS)
                .help("Raw identifiers, in any supported form (e.g. `20mcb001`, `MCB 001`)")
                .action(ArgAction::Append)
                .required(true),
        )
        .arg(
            Arg::new(JSON)
                .long(JSON)
                .help("Print one JSON object per identifier")
                .action(ArgAction::SetTrue),
        )
}

/// The outcome for one identifier.
#[derive(Debug, PartialEq, Eq)]
struct Check {
    raw: String,
    canonical: Option<String>,
    verdict: Verdict,
}

impl Check {
    fn to_json(&self) -> serde_json::Value {
        let rejection = match &self.verdict {
            Verdict::Allowed => None,
            Verdict::Rejected(rejection) => Some(rejection),
        };
        json!({
            "input": self.raw,
            "canonical": self.canonical,
            "allowed": self.verdict.is_allowed(),
            "rejection": rejection,
        })
    }
}

/// The configured electorate, or the default when none is configured.
fn load_policy() -> Result<IdentityPolicy, String> {
    let figment = rocket::Config::figment();
    if !figment.contains("electorate") {
        return Ok(IdentityPolicy::default());
    }
    figment
        .extract_inner("electorate")
        .map_err(|e| format!("Invalid electorate config: {e}"))
}

fn check(normalizer: &Normalizer, raw: &str) -> Check {
    match normalizer.normalize(raw) {
        Some(identity) => Check {
            raw: raw.to_string(),
            canonical: Some(identity.to_string()),
            verdict: normalizer.authorize(&identity),
        },
        None => Check {
            raw: raw.to_string(),
            canonical: None,
            verdict: Verdict::Rejected(Rejection::Missing),
        },
    }
}

/// Check every identifier, report the results, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let policy = match load_policy() {
        Ok(policy) => policy,
        Err(msg) => {
            println!("{msg}");
            return 1;
        }
    };
    let normalizer = match Normalizer::new(policy) {
        Ok(normalizer) => normalizer,
        Err(e) => {
            println!("Invalid electorate config: {e}");
            return 1;
        }
    };

    let as_json = args.get_flag(JSON);
    let checks: Vec<Check> = args
        .get_many::<String>(IDENTIFIERS)
        .into_iter()
        .flatten()
        .map(|raw| check(&normalizer, raw))
        .collect();

    for check in &checks {
        if as_json {
            println!("{}", check.to_json());
        } else {
            println!(
                "{:?} -> {}: {}",
                check.raw,
                check.canonical.as_deref().unwrap_or("(empty)"),
                check.verdict
            );
        }
    }

    if checks.iter().all(|check| check.verdict.is_allowed()) {
        0
    } else {
        255
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(IdentityPolicy::default()).unwrap()
    }

    #[test]
    fn cli_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn checks() {
        let n = normalizer();

        let allowed = check(&n, "20 mcb 001");
        assert_eq!(Some("SCI20MCB001".to_string()), allowed.canonical);
        assert_eq!(Verdict::Allowed, allowed.verdict);

        let exception = check(&n, "21mcb801");
        assert_eq!(Verdict::Allowed, exception.verdict);

        let outside = check(&n, "SCI21MCB166");
        assert!(matches!(
            outside.verdict,
            Verdict::Rejected(Rejection::OutOfRange { .. })
        ));

        let empty = check(&n, "--");
        assert_eq!(None, empty.canonical);
        assert_eq!(Verdict::Rejected(Rejection::Missing), empty.verdict);
    }

    #[test]
    fn exit_codes() {
        let args = cli().get_matches_from([PROGRAM_NAME, "SCI20MCB001", "MCB150"]);
        assert_eq!(0, run(&args));

        let args = cli().get_matches_from([PROGRAM_NAME, "--json", "SCI20MCB001", "SCI20MCB151"]);
        assert_eq!(255, run(&args));
    }

    #[test]
    fn json_output() {
        let value = check(&normalizer(), "mcb151").to_json();
        assert_eq!("SCI20MCB151", value["canonical"]);
        assert_eq!(false, value["allowed"]);
        assert_eq!("out_of_range", value["rejection"]["kind"]);
    }
}
