use crate::state::error::BracketError;
use bracket_api::{Match, Round, TournamentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Draft flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftPhase {
    #[default]
    Empty,
    Generated,
    /// Persisted as the system of record. Only a reset leaves this phase.
    Committed,
}

/// Lifecycle flags of a draft. Fields only change through the bracket
/// operations, never directly from presentation code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftFlags {
    phase: DraftPhase,
    temporarily_saved: bool,
    last_saved: Option<DateTime<Utc>>,
    #[serde(default)]
    fixtures_created: bool,
}

impl DraftFlags {
    pub fn phase(&self) -> DraftPhase {
        self.phase
    }

    pub fn generated(&self) -> bool {
        self.phase != DraftPhase::Empty
    }

    /// Also known as "fixtures created" in the persisted store.
    pub fn committed(&self) -> bool {
        self.phase == DraftPhase::Committed
    }

    pub fn temporarily_saved(&self) -> bool {
        self.temporarily_saved
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn fixtures_created(&self) -> bool {
        self.fixtures_created
    }
}

// ---------------------------------------------------------------------------
// Draft store
// ---------------------------------------------------------------------------

/// Editable bracket for one tournament, together with its lifecycle flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketDraft {
    pub tournament_id: TournamentId,
    pub rounds: Vec<Round>,
    flags: DraftFlags,
}

impl BracketDraft {
    pub fn empty(tournament_id: &str) -> Self {
        Self {
            tournament_id: tournament_id.to_string(),
            rounds: Vec::new(),
            flags: DraftFlags::default(),
        }
    }

    pub(crate) fn generated(tournament_id: &str, rounds: Vec<Round>) -> Self {
        Self {
            tournament_id: tournament_id.to_string(),
            rounds: sorted(rounds),
            flags: DraftFlags { phase: DraftPhase::Generated, ..DraftFlags::default() },
        }
    }

    /// Rebuild a draft from the system of record.
    pub(crate) fn from_persisted(tournament_id: &str, rounds: Vec<Round>) -> Self {
        Self {
            tournament_id: tournament_id.to_string(),
            rounds: sorted(rounds),
            flags: DraftFlags { phase: DraftPhase::Committed, ..DraftFlags::default() },
        }
    }

    pub fn flags(&self) -> &DraftFlags {
        &self.flags
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub(crate) fn require_generated(&self) -> Result<(), BracketError> {
        if self.flags.generated() && !self.rounds.is_empty() {
            Ok(())
        } else {
            Err(BracketError::InvalidState(format!(
                "no bracket has been generated for {}",
                self.tournament_id
            )))
        }
    }

    pub fn total_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn round(&self, round_number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.round_number == round_number)
    }

    pub(crate) fn round_mut(&mut self, round_number: u32) -> Result<&mut Round, BracketError> {
        self.rounds
            .iter_mut()
            .find(|r| r.round_number == round_number)
            .ok_or(BracketError::UnknownRound(round_number))
    }

    pub fn match_at(&self, round_number: u32, position: u32) -> Result<&Match, BracketError> {
        self.round(round_number)
            .ok_or(BracketError::UnknownRound(round_number))?
            .match_at(position)
            .ok_or(BracketError::UnknownMatch { round: round_number, position })
    }

    pub(crate) fn match_at_mut(
        &mut self,
        round_number: u32,
        position: u32,
    ) -> Result<&mut Match, BracketError> {
        self.round_mut(round_number)?
            .match_at_mut(position)
            .ok_or(BracketError::UnknownMatch { round: round_number, position })
    }

    // -----------------------------------------------------------------------
    // Flag transitions
    // -----------------------------------------------------------------------

    pub(crate) fn mark_temporarily_saved(&mut self, at: DateTime<Utc>) {
        self.flags.temporarily_saved = true;
        self.flags.last_saved = Some(at);
    }

    pub(crate) fn mark_committed(&mut self, at: DateTime<Utc>) {
        self.flags.phase = DraftPhase::Committed;
        self.flags.temporarily_saved = false;
        self.flags.last_saved = Some(at);
    }

    pub(crate) fn mark_fixtures_created(&mut self) {
        self.flags.fixtures_created = true;
    }
}

fn sorted(mut rounds: Vec<Round>) -> Vec<Round> {
    rounds.sort_by_key(|r| r.round_number);
    for round in &mut rounds {
        round.matches.sort_by_key(|m| m.bracket_position);
    }
    rounds
}
