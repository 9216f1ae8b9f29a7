use std::fmt::{Display, Formatter};
use std::ops::Deref;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::policy::{IdentityPolicy, Rejection, Verdict};

/// The single canonical form of a voter's identifier, e.g. `SCI20MCB001`.
/// This is the uniqueness key for vote receipts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Identity {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns raw user input into canonical identities and decides whether they may vote.
///
/// All operations are pure functions of the [`IdentityPolicy`]; nothing here does I/O.
#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: IdentityPolicy,
    /// `SCI20MCB001`, capturing cohort and sequence.
    canonical: Regex,
    /// `20MCB001`: faculty omitted.
    without_faculty: Regex,
    /// `MCB001`: faculty and cohort omitted.
    bare: Regex,
}

impl Normalizer {
    /// Compile the structural patterns for the given policy.
    pub fn new(policy: IdentityPolicy) -> Result<Self, regex::Error> {
        let faculty = regex::escape(&policy.faculty.to_uppercase());
        let department = regex::escape(&policy.department.to_uppercase());
        Ok(Self {
            canonical: Regex::new(&format!(r"^{faculty}(\d{{2}}){department}(\d{{3}})$"))?,
            without_faculty: Regex::new(&format!(r"^\d{{2}}{department}\d{{3}}$"))?,
            bare: Regex::new(&format!(r"^{department}\d{{3}}$"))?,
            policy,
        })
    }

    pub fn policy(&self) -> &IdentityPolicy {
        &self.policy
    }

    /// Canonicalize a raw identifier.
    ///
    /// Returns `None` only if nothing alphanumeric remains. Inputs that match no known
    /// partial form are returned cleaned but otherwise untouched, so that [`Self::authorize`]
    /// rejects them rather than having them coerced into something valid.
    pub fn normalize(&self, raw: &str) -> Option<Identity> {
        let cleaned: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        let canonical = if self.canonical.is_match(&cleaned) {
            cleaned
        } else if self.without_faculty.is_match(&cleaned) {
            format!("{}{cleaned}", self.policy.faculty.to_uppercase())
        } else if self.bare.is_match(&cleaned) {
            format!(
                "{}{}{cleaned}",
                self.policy.faculty.to_uppercase(),
                self.policy.default_cohort
            )
        } else {
            cleaned
        };
        Some(Identity(canonical))
    }

    /// Derive the identity of an account: its display name if set, else the local part
    /// of its login.
    pub fn identity_of(&self, display_name: &str, login: &str) -> Option<Identity> {
        let display_name = display_name.trim();
        if !display_name.is_empty() {
            return self.normalize(display_name);
        }
        let local_part = login.split('@').next().unwrap_or_default();
        self.normalize(local_part)
    }

    /// Check format, then electorate membership.
    pub fn authorize(&self, identity: &Identity) -> Verdict {
        let format_error = || {
            Verdict::Rejected(Rejection::Format {
                pattern: format!(
                    "{}xx{}xxx",
                    self.policy.faculty.to_uppercase(),
                    self.policy.department.to_uppercase()
                ),
                example: self.policy.example(),
            })
        };

        let Some(captures) = self.canonical.captures(identity) else {
            return format_error();
        };
        let cohort = &captures[1];
        let Ok(sequence) = captures[2].parse::<u32>() else {
            return format_error();
        };
        if !self.policy.has_cohort(cohort) {
            return format_error();
        }

        if self.policy.admits(identity, cohort, sequence) {
            Verdict::Allowed
        } else {
            Verdict::Rejected(Rejection::OutOfRange {
                ranges: self.policy.describe_ranges(),
            })
        }
    }

    /// Normalize then authorize in one step.
    pub fn admit(&self, raw: &str) -> Result<Identity, Rejection> {
        let identity = self.normalize(raw).ok_or(Rejection::Missing)?;
        self.authorize(&identity).into_result()?;
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CohortRange;

    fn normalizer() -> Normalizer {
        Normalizer::new(IdentityPolicy::default()).unwrap()
    }

    fn normalized(raw: &str) -> Option<String> {
        normalizer().normalize(raw).map(|id| id.to_string())
    }

    #[test]
    fn supported_forms() {
        assert_eq!(Some("SCI20MCB001".into()), normalized("SCI20MCB001"));
        assert_eq!(Some("SCI20MCB001".into()), normalized("sci/20/mcb/001"));
        assert_eq!(Some("SCI21MCB042".into()), normalized("21MCB042"));
        assert_eq!(Some("SCI21MCB042".into()), normalized(" 21-mcb-042 "));
        assert_eq!(Some("SCI20MCB001".into()), normalized("MCB001"));
    }

    #[test]
    fn short_inputs_are_not_coerced() {
        assert_eq!(Some("MCB01".into()), normalized("MCB01"));
        assert_eq!(Some("001".into()), normalized("001"));
        assert!(!normalizer().authorize(&normalizer().normalize("MCB01").unwrap()).is_allowed());
    }

    #[test]
    fn empty_input() {
        assert_eq!(None, normalized(""));
        assert_eq!(None, normalized("  /-_. "));
        assert_eq!(Err(Rejection::Missing), normalizer().admit("--"));
    }

    #[test]
    fn idempotent() {
        let n = normalizer();
        for raw in [
            "SCI20MCB001", "20mcb150", "mcb007", "sci22mcb001", "MCB01", "hello world", "21MCB999",
        ] {
            let once = n.normalize(raw).unwrap();
            let twice = n.normalize(&once).unwrap();
            assert_eq!(once, twice, "normalizing {raw:?} is not idempotent");
            assert_eq!(n.authorize(&once), n.authorize(&twice));
        }
    }

    #[test]
    fn default_cohort_is_policy() {
        let policy = IdentityPolicy {
            default_cohort: "21".into(),
            ..IdentityPolicy::default()
        };
        let n = Normalizer::new(policy).unwrap();
        assert_eq!("SCI21MCB001", n.normalize("MCB001").unwrap().as_str());
    }

    #[test]
    fn authorization() {
        let n = normalizer();
        assert_eq!(Ok(n.normalize("SCI20MCB150").unwrap()), n.admit("20MCB150"));
        assert_eq!(Ok(n.normalize("SCI21MCB170").unwrap()), n.admit("SCI21MCB170"));
        assert_eq!(Ok(n.normalize("SCI21MCB801").unwrap()), n.admit("SCI21MCB801"));

        assert!(matches!(n.admit("SCI20MCB151"), Err(Rejection::OutOfRange { .. })));
        assert!(matches!(n.admit("SCI20MCB000"), Err(Rejection::OutOfRange { .. })));
        assert!(matches!(n.admit("SCI21MCB166"), Err(Rejection::OutOfRange { .. })));
        assert!(matches!(n.admit("SCI22MCB001"), Err(Rejection::Format { .. })));
        assert!(matches!(n.admit("ENG20MCB001"), Err(Rejection::Format { .. })));
        assert!(matches!(n.admit("SCI20MCB0011"), Err(Rejection::Format { .. })));
    }

    #[test]
    fn bare_sequence_uses_default_cohort() {
        let policy = IdentityPolicy {
            department: "AB".into(),
            cohorts: vec![CohortRange::new("20", 1, 50)],
            exceptions: Default::default(),
            ..IdentityPolicy::default()
        };
        let n = Normalizer::new(policy.clone()).unwrap();
        let identity = n.normalize("AB001").unwrap();
        assert_eq!("SCI20AB001", identity.as_str());
        assert!(n.authorize(&identity).is_allowed());

        let narrow = Normalizer::new(IdentityPolicy {
            cohorts: vec![CohortRange::new("20", 2, 50)],
            ..policy
        })
        .unwrap();
        let identity = narrow.normalize("AB001").unwrap();
        assert_eq!("SCI20AB001", identity.as_str());
        assert!(!narrow.authorize(&identity).is_allowed());
    }

    #[test]
    fn identity_of_account() {
        let n = normalizer();
        assert_eq!(
            "SCI20MCB003",
            n.identity_of(" sci20mcb003 ", "whatever@mcb.student").unwrap().as_str()
        );
        assert_eq!(
            "SCI21MCB010",
            n.identity_of("", "21mcb010@mcb.student").unwrap().as_str()
        );
        assert_eq!(None, n.identity_of("   ", "@mcb.student"));
    }

    #[test]
    fn rejection_messages() {
        let n = normalizer();
        assert_eq!(
            "Invalid matric number format. Expected format: SCIxxMCBxxx (e.g., SCI20MCB001)",
            n.authorize(&n.normalize("nonsense").unwrap()).reason()
        );
        assert_eq!(
            "Matric number not in authorized range. Must be SCI20MCB001-150 or SCI21MCB001-165",
            n.authorize(&n.normalize("SCI20MCB151").unwrap()).reason()
        );
    }
}
