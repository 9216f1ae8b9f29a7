use log::{debug, error, info, warn};
use rocket::futures::future::{join, join_all};
use serde::Serialize;
use thiserror::Error;

use crate::identity::{Identity, Normalizer, Rejection};
use crate::model::{
    account::Account, ballot::Ballot, mongodb::Id, question::Question, receipt::NewVoteReceipt,
    tally::QuestionView,
};
use crate::store::{all_questions, BallotBox, StoreError, TallyStore};

const QUESTIONS_UNAVAILABLE: &str = "Failed to load questions. Please refresh the page.";

/// Where a voting session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Checking,
    NotVoted,
    AlreadyVoted,
    Submitting,
    Submitted,
    SubmitFailed,
}

impl SessionState {
    /// Has this identity's vote been recorded, by this session or another?
    pub fn has_voted(self) -> bool {
        matches!(self, Self::AlreadyVoted | Self::Submitted)
    }
}

#[derive(Debug, Error)]
pub enum VoteError {
    /// The identity is malformed or outside the electorate. Ends the session.
    #[error("Access denied: {0}")]
    IdentityRejected(#[from] Rejection),
    #[error("This matric number has already been used to vote!")]
    AlreadyVoted,
    #[error("Please select at least one option before submitting.")]
    EmptyBallot,
    /// The receipt could not be written. Nothing was recorded; the voter may retry.
    #[error("Failed to submit votes. Please try again.")]
    SubmitFailed(#[source] StoreError),
}

/// The result of a submission that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The receipt is durable. Tallies of the listed questions could not be updated;
    /// they are not retried or rolled back.
    Recorded { failed_tallies: Vec<Id> },
    /// The identity had already voted; nothing was written.
    AlreadyVoted,
}

/// Everything the presentation layer needs to render a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub identity: Option<Identity>,
    pub voted: bool,
    pub ballot: Ballot,
    pub questions: Vec<QuestionView>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl SessionView {
    pub fn unauthenticated() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            identity: None,
            voted: false,
            ballot: Ballot::default(),
            questions: Vec::new(),
            error: None,
            warning: None,
        }
    }
}

/// One authenticated voter's path from sign-in to a recorded vote.
///
/// The "already voted" checks made here are only a courtesy to the voter. What
/// actually prevents a second vote is the store refusing a second receipt for
/// the same identity, which is why the receipt is written before any tally.
#[derive(Debug)]
pub struct VotingSession {
    account: Id,
    identity: Identity,
    state: SessionState,
    ballot: Ballot,
    questions: Vec<Question>,
    page_size: usize,
    error: Option<String>,
    warning: Option<String>,
}

impl VotingSession {
    /// Establish a session for a signed-in account.
    ///
    /// The account's identity must be authorized; otherwise the caller must end the
    /// authenticated session. Questions are loaded and the vote status checked
    /// together.
    pub async fn start<S>(
        account: &Account,
        normalizer: &Normalizer,
        store: &S,
        page_size: usize,
    ) -> Result<Self, VoteError>
    where
        S: BallotBox + TallyStore + ?Sized,
    {
        let identity = normalizer
            .identity_of(&account.name, &account.login)
            .ok_or(Rejection::Missing)?;
        if let Err(rejection) = normalizer.authorize(&identity).into_result() {
            warn!("Rejected {identity} for account {}: {rejection}", account.id);
            return Err(rejection.into());
        }
        info!("Starting voting session for {identity}");

        let mut session = Self {
            account: account.id,
            identity,
            state: SessionState::Checking,
            ballot: Ballot::default(),
            questions: Vec::new(),
            page_size,
            error: None,
            warning: None,
        };
        let (questions, voted) = join(
            all_questions(store, page_size),
            has_voted(store, &session.identity),
        )
        .await;
        session.apply_questions(questions);
        session.state = if voted {
            SessionState::AlreadyVoted
        } else {
            SessionState::NotVoted
        };
        Ok(session)
    }

    pub fn account(&self) -> Id {
        self.account
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn ballot(&self) -> &Ballot {
        &self.ballot
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Re-check whether this identity has voted. Only ever reads.
    pub async fn check<S>(&mut self, store: &S) -> SessionState
    where
        S: BallotBox + ?Sized,
    {
        if self.state.has_voted() {
            return self.state;
        }
        self.state = SessionState::Checking;
        self.state = if has_voted(store, &self.identity).await {
            SessionState::AlreadyVoted
        } else {
            SessionState::NotVoted
        };
        self.state
    }

    /// Choose an option for a question; a later choice for the same question wins.
    pub fn select_option(
        &mut self,
        question: Id,
        option: impl Into<String>,
    ) -> Result<(), VoteError> {
        self.ensure_can_vote()?;
        self.ballot.select(question, option);
        self.error = None;
        Ok(())
    }

    /// Replace the whole ballot.
    pub fn replace_ballot(&mut self, ballot: Ballot) -> Result<(), VoteError> {
        self.ensure_can_vote()?;
        self.ballot = ballot;
        self.error = None;
        Ok(())
    }

    fn ensure_can_vote(&mut self) -> Result<(), VoteError> {
        if self.state.has_voted() {
            self.error = Some(VoteError::AlreadyVoted.to_string());
            return Err(VoteError::AlreadyVoted);
        }
        Ok(())
    }

    /// Submit the current ballot.
    ///
    /// The receipt is created first. If it already exists, nothing else is touched. If
    /// creating it fails, nothing has been written. Once it exists, every ballot entry
    /// that names a known option has its tally incremented, all concurrently; those
    /// that fail are reported but do not undo the vote.
    pub async fn submit<S>(&mut self, store: &S) -> Result<Submission, VoteError>
    where
        S: BallotBox + TallyStore + ?Sized,
    {
        if self.state.has_voted() {
            self.mark_already_voted();
            return Ok(Submission::AlreadyVoted);
        }
        if self.ballot.is_empty() {
            self.error = Some(VoteError::EmptyBallot.to_string());
            return Err(VoteError::EmptyBallot);
        }
        if has_voted(store, &self.identity).await {
            info!("{} voted elsewhere since this session started", self.identity);
            self.mark_already_voted();
            return Ok(Submission::AlreadyVoted);
        }

        self.state = SessionState::Submitting;
        self.error = None;
        self.warning = None;
        info!(
            "Submitting {} selection(s) for {}",
            self.ballot.len(),
            self.identity
        );

        let receipt =
            NewVoteReceipt::new(self.identity.clone(), self.account, self.ballot.questions());
        match store.create_receipt(&receipt).await {
            Ok(()) => info!("Recorded vote receipt for {}", self.identity),
            Err(StoreError::Duplicate) => {
                info!("{} already holds a vote receipt", self.identity);
                self.mark_already_voted();
                return Ok(Submission::AlreadyVoted);
            }
            Err(err) => {
                error!("Failed to record vote receipt for {}: {err}", self.identity);
                let err = VoteError::SubmitFailed(err);
                self.state = SessionState::SubmitFailed;
                self.error = Some(err.to_string());
                return Err(err);
            }
        }

        let failed_tallies = self.apply_tallies(store).await;
        if !failed_tallies.is_empty() {
            self.warning = Some(format!(
                "Your vote was recorded, but {} tally update(s) could not be applied.",
                failed_tallies.len()
            ));
        }
        self.ballot.clear();
        self.state = SessionState::Submitted;
        self.refresh(store).await;
        Ok(Submission::Recorded { failed_tallies })
    }

    /// Issue one increment per ballot entry that matches a known option, returning
    /// the questions whose tally was not updated. A question that is not loaded
    /// cannot be located, so its tally counts as failed.
    async fn apply_tallies<S>(&self, store: &S) -> Vec<Id>
    where
        S: TallyStore + ?Sized,
    {
        let mut unlocated = Vec::new();
        let mut increments = Vec::new();
        for (question_id, option) in self.ballot.iter() {
            let Some(question) = self.questions.iter().find(|q| q.id == question_id) else {
                warn!("Question {question_id} is not loaded, cannot update its tally");
                unlocated.push(question_id);
                continue;
            };
            match question.slot_of(option) {
                Some(slot) => increments.push((question_id, slot)),
                None => {
                    debug!("{option:?} is not an option of question {question_id}, skipping its tally")
                }
            }
        }

        let results = join_all(increments.into_iter().map(|(question, slot)| async move {
            (question, store.increment(question, slot).await)
        }))
        .await;

        let failed = results
            .into_iter()
            .filter_map(|(question, result)| match result {
                Ok(()) => None,
                Err(err) => {
                    warn!(
                        "Failed to update tally of question {question} for {}: {err}",
                        self.identity
                    );
                    Some(question)
                }
            });
        unlocated.into_iter().chain(failed).collect()
    }

    /// Reload the questions and their tallies.
    pub async fn refresh<S>(&mut self, store: &S)
    where
        S: TallyStore + ?Sized,
    {
        let questions = all_questions(store, self.page_size).await;
        self.apply_questions(questions);
    }

    fn apply_questions(&mut self, questions: Result<Vec<Question>, StoreError>) {
        match questions {
            Ok(questions) => {
                debug!("Loaded {} question(s)", questions.len());
                self.questions = questions;
            }
            Err(err) => {
                warn!("Failed to load questions: {err}");
                self.error = Some(QUESTIONS_UNAVAILABLE.to_string());
            }
        }
    }

    fn mark_already_voted(&mut self) {
        self.state = SessionState::AlreadyVoted;
        self.error = Some(VoteError::AlreadyVoted.to_string());
    }

    /// End the session, discarding the ballot.
    pub fn logout(&mut self) {
        info!("Ending voting session for {}", self.identity);
        self.ballot.clear();
        self.error = None;
        self.warning = None;
        self.state = SessionState::Unauthenticated;
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            identity: Some(self.identity.clone()),
            voted: self.state.has_voted(),
            ballot: self.ballot.clone(),
            questions: self.questions.iter().map(QuestionView::from).collect(),
            error: self.error.clone(),
            warning: self.warning.clone(),
        }
    }
}

/// Has this identity voted? Read failures of any kind count as "no": the voter is
/// allowed to try, and the receipt's uniqueness decides.
async fn has_voted<S>(store: &S, identity: &Identity) -> bool
where
    S: BallotBox + ?Sized,
{
    match store.find_receipt(identity).await {
        Ok(receipt) => receipt.is_some(),
        Err(StoreError::PermissionDenied(reason)) => {
            info!("Cannot read vote receipts for {identity} ({reason}), assuming not voted");
            false
        }
        Err(err) => {
            warn!("Failed to check vote receipts for {identity}, assuming not voted: {err}");
            false
        }
    }
}
