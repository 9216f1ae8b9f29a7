//! Voter identity: canonicalization of user-supplied identifiers and the
//! electorate policy that decides who may vote.

mod normalize;
mod policy;

pub use normalize::{Identity, Normalizer};
pub use policy::{CohortRange, IdentityPolicy, Rejection, Verdict};
