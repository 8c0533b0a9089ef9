use crate::state::cache::CacheError;
use bracket_api::client::ApiError;
use bracket_api::{MatchStatus, TournamentId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BracketError {
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("a bracket needs at least 2 teams, found {found}")]
    InsufficientTeams { found: usize },
    #[error("tournament {0} was reset; generate a new bracket first")]
    ResetInProgress(TournamentId),
    #[error("the bracket is committed; reset it before editing slots or schedules")]
    AlreadyCommitted,
    #[error("round {0} does not exist")]
    UnknownRound(u32),
    #[error("round {round} has no match at position {position}")]
    UnknownMatch { round: u32, position: u32 },
    #[error("slot index {0} is out of range (expected 0 or 1)")]
    InvalidSlotIndex(usize),
    #[error("match cannot move from {from} to {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },
    #[error("round {round} is not ready: {unresolved} slot(s) still wait for earlier results")]
    RoundNotReady { round: u32, unresolved: usize },
    #[error("round {round} match {position} is level; record a tiebreak to decide it")]
    Draw { round: u32, position: u32 },
    #[error("bracket integrity error at round {round} match {position}: {reason}")]
    BracketIntegrity {
        round: u32,
        position: u32,
        reason: String,
    },
    #[error("persistence failure: {0}")]
    Persistence(#[from] ApiError),
    #[error("commit saved nothing (0 created, 0 updated); the draft is still uncommitted")]
    StaleCommit,
    #[error("draft cache failure: {0}")]
    Cache(#[from] CacheError),
}

impl BracketError {
    pub(crate) fn integrity(round: u32, position: u32, reason: impl Into<String>) -> Self {
        BracketError::BracketIntegrity { round, position, reason: reason.into() }
    }

    /// True when the failed call left every piece of state as it found it.
    ///
    /// A draw keeps the recorded scores, an integrity error keeps the
    /// completed match, and a cache failure may follow a successful remote call.
    pub fn nothing_changed(&self) -> bool {
        !matches!(
            self,
            BracketError::Draw { .. } | BracketError::BracketIntegrity { .. } | BracketError::Cache(_)
        )
    }

    /// Rejected before any collaborator was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BracketError::InvalidState(_)
                | BracketError::InsufficientTeams { .. }
                | BracketError::ResetInProgress(_)
                | BracketError::AlreadyCommitted
                | BracketError::UnknownRound(_)
                | BracketError::UnknownMatch { .. }
                | BracketError::InvalidSlotIndex(_)
                | BracketError::InvalidTransition { .. }
                | BracketError::RoundNotReady { .. }
        )
    }

    pub fn remedy(&self) -> &'static str {
        match self {
            BracketError::Persistence(_) => "retry once the bracket service is reachable",
            BracketError::StaleCommit => "nothing new to save; edit or regenerate before committing",
            BracketError::BracketIntegrity { .. } => "reset the tournament and generate a new bracket",
            BracketError::Draw { .. } => "record the result again with a tiebreak",
            BracketError::ResetInProgress(_) => "generate a new bracket first",
            BracketError::Cache(_) => "reload the tournament to see what was kept",
            _ => "correct the request and try again",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_persistence_errors_change_nothing() {
        let errors = [
            BracketError::InsufficientTeams { found: 1 },
            BracketError::AlreadyCommitted,
            BracketError::StaleCommit,
            BracketError::Persistence(ApiError::Other("offline".into())),
        ];
        for err in errors {
            assert!(err.nothing_changed(), "{err}");
        }
    }

    #[test]
    fn stuck_propagation_is_distinguishable() {
        let err = BracketError::integrity(2, 1, "slot 0 already holds Ajax");
        assert!(!err.nothing_changed());
        assert!(!err.is_validation());
        assert_eq!(err.remedy(), "reset the tournament and generate a new bracket");
        assert_eq!(
            err.to_string(),
            "bracket integrity error at round 2 match 1: slot 0 already holds Ajax"
        );
    }
}
