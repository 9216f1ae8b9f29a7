//! The per-session voting state machine and the registry of live sessions.

mod controller;
mod registry;

pub use controller::{SessionState, SessionView, Submission, VoteError, VotingSession};
pub use registry::{SessionHandle, Sessions};
