use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An inclusive range of sequence numbers admitted for one cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortRange {
    /// Two-digit cohort (admission year) code, e.g. `"20"`.
    pub cohort: String,
    pub min: u32,
    pub max: u32,
}

impl CohortRange {
    pub fn new(cohort: impl Into<String>, min: u32, max: u32) -> Self {
        Self {
            cohort: cohort.into(),
            min,
            max,
        }
    }

    pub fn contains(&self, cohort: &str, sequence: u32) -> bool {
        self.cohort == cohort && (self.min..=self.max).contains(&sequence)
    }
}

/// Who may vote, described as static configuration rather than an enumerated list.
///
/// Canonical identities look like `{faculty}{cohort}{department}{sequence}`,
/// e.g. `SCI20MCB001`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPolicy {
    pub faculty: String,
    pub department: String,
    /// Cohort assumed when the input carries no cohort at all (e.g. `MCB001`).
    /// This is a policy decision; nothing in the input implies it.
    pub default_cohort: String,
    pub cohorts: Vec<CohortRange>,
    /// Canonical identities admitted despite falling outside every range.
    pub exceptions: BTreeSet<String>,
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self {
            faculty: "SCI".to_string(),
            department: "MCB".to_string(),
            default_cohort: "20".to_string(),
            cohorts: vec![CohortRange::new("20", 1, 150), CohortRange::new("21", 1, 165)],
            exceptions: BTreeSet::from(["SCI21MCB170".to_string(), "SCI21MCB801".to_string()]),
        }
    }
}

impl IdentityPolicy {
    /// Is this cohort code one the policy knows about?
    pub fn has_cohort(&self, cohort: &str) -> bool {
        self.cohorts.iter().any(|range| range.cohort == cohort)
    }

    /// Is the given, structurally valid, identity a member of the electorate?
    pub fn admits(&self, identity: &str, cohort: &str, sequence: u32) -> bool {
        self.exceptions.contains(identity)
            || self
                .cohorts
                .iter()
                .any(|range| range.contains(cohort, sequence))
    }

    /// An example of a well-formed identity, used in error messages.
    pub fn example(&self) -> String {
        let cohort = self
            .cohorts
            .first()
            .map(|range| range.cohort.as_str())
            .unwrap_or(&self.default_cohort);
        format!("{}{}{}001", self.faculty, cohort, self.department)
    }

    /// Human readable summary of the admitted ranges.
    pub fn describe_ranges(&self) -> String {
        self.cohorts
            .iter()
            .map(|range| {
                format!(
                    "{}{}{}{:03}-{:03}",
                    self.faculty, range.cohort, self.department, range.min, range.max
                )
            })
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

/// Why an identity was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("Matric number is required")]
    Missing,
    #[error("Invalid matric number format. Expected format: {pattern} (e.g., {example})")]
    Format { pattern: String, example: String },
    #[error("Matric number not in authorized range. Must be {ranges}")]
    OutOfRange { ranges: String },
}

/// The outcome of an authorization check. Always produced; never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Convert into a `Result`, for use with `?`.
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Self::Allowed => Ok(()),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => write!(f, "Authorized"),
            Self::Rejected(rejection) => write!(f, "{rejection}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_inclusive() {
        let range = CohortRange::new("20", 1, 150);
        assert!(range.contains("20", 1));
        assert!(range.contains("20", 150));
        assert!(!range.contains("20", 0));
        assert!(!range.contains("20", 151));
        assert!(!range.contains("21", 10));
    }

    #[test]
    fn exceptions_bypass_ranges() {
        let policy = IdentityPolicy::default();
        assert!(policy.admits("SCI21MCB801", "21", 801));
        assert!(!policy.admits("SCI21MCB802", "21", 802));
        assert!(policy.admits("SCI21MCB165", "21", 165));
        assert!(!policy.admits("SCI21MCB166", "21", 166));
    }

    #[test]
    fn reasons() {
        let policy = IdentityPolicy::default();
        assert_eq!(
            "SCI20MCB001-150 or SCI21MCB001-165",
            policy.describe_ranges()
        );
        assert_eq!("SCI20MCB001", policy.example());
        assert_eq!("Authorized", Verdict::Allowed.reason());
        assert_eq!(
            "Matric number is required",
            Verdict::Rejected(Rejection::Missing).reason()
        );
    }
}
