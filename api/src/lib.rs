pub mod bracket;
pub mod client;
pub mod memory;
pub mod wire;

use crate::client::ApiResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

pub type TournamentId = String;

// ---------------------------------------------------------------------------
// Domain types — clean model, independent of the HTTP wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededTeam {
    pub team: Team,
    pub seed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    #[default]
    Draft,
    Registration,
    Active,
    Completed,
}

impl TournamentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TournamentStatus::Draft => "draft",
            TournamentStatus::Registration => "registration",
            TournamentStatus::Active => "active",
            TournamentStatus::Completed => "completed",
        }
    }
}

/// Only single elimination is modelled; other formats are rejected at the wire boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentType {
    #[default]
    SingleElimination,
}

/// Read-only view of a tournament owned by the tournament-management service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub status: TournamentStatus,
    pub tournament_type: TournamentType,
    pub teams: Vec<SeededTeam>,
}

impl Tournament {
    /// Teams ordered by seed, best seed first. Ties keep roster order.
    pub fn teams_by_seed(&self) -> Vec<&SeededTeam> {
        let mut teams: Vec<&SeededTeam> = self.teams.iter().collect();
        teams.sort_by_key(|t| t.seed);
        teams
    }

    pub fn find_team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().map(|t| &t.team).find(|t| t.id == team_id)
    }
}

/// One side of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Slot {
    Team(Team),
    /// Unresolved: waits for the winner of an earlier match.
    #[serde(rename_all = "camelCase")]
    Winner { source_round: u32, source_match: u32 },
    /// No opponent. A match with one bye is a walkover.
    Bye,
}

impl Slot {
    pub fn winner_of(source_round: u32, source_match: u32) -> Self {
        Slot::Winner { source_round, source_match }
    }

    pub fn team(&self) -> Option<&Team> {
        match self {
            Slot::Team(team) => Some(team),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Slot::Winner { .. })
    }

    pub fn is_bye(&self) -> bool {
        matches!(self, Slot::Bye)
    }

    pub fn label(&self) -> String {
        match self {
            Slot::Team(team) => team.name.clone(),
            Slot::Winner { source_round, source_match } => {
                format!("Winner R{source_round} M{}", source_match + 1)
            }
            Slot::Bye => "bye".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Completed,
    Cancelled,
    Postponed,
}

impl MatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
            MatchStatus::Postponed => "postponed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }

    /// Allowed moves: scheduled → live → completed, cancel or postpone from
    /// scheduled/live, resume a postponed match. Completed and cancelled are final.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        use MatchStatus::*;
        matches!(
            (self, next),
            (Scheduled, Live | Completed | Cancelled | Postponed)
                | (Live, Completed | Cancelled | Postponed)
                | (Postponed, Scheduled | Live)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    /// Index within the round; match i feeds slot (i % 2) of match i / 2 next round.
    pub bracket_position: u32,
    pub slot_a: Slot,
    pub slot_b: Slot,
    pub venue: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: MatchStatus,
    pub score_a: Option<u32>,
    pub score_b: Option<u32>,
    pub tiebreak_a: Option<u32>,
    pub tiebreak_b: Option<u32>,
    pub winner: Option<Team>,
}

impl Match {
    pub fn new(id: impl Into<String>, bracket_position: u32, slot_a: Slot, slot_b: Slot) -> Self {
        Self {
            id: id.into(),
            bracket_position,
            slot_a,
            slot_b,
            venue: None,
            scheduled_at: None,
            status: MatchStatus::Scheduled,
            score_a: None,
            score_b: None,
            tiebreak_a: None,
            tiebreak_b: None,
            winner: None,
        }
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        match index {
            0 => Some(&self.slot_a),
            1 => Some(&self.slot_b),
            _ => None,
        }
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        match index {
            0 => Some(&mut self.slot_a),
            1 => Some(&mut self.slot_b),
            _ => None,
        }
    }

    /// Number of slots still waiting on an earlier result.
    pub fn unresolved_slots(&self) -> usize {
        [&self.slot_a, &self.slot_b]
            .into_iter()
            .filter(|s| s.is_placeholder())
            .count()
    }

    pub fn is_resolved(&self) -> bool {
        self.unresolved_slots() == 0
    }

    /// The team that advances without playing, if exactly one side is a bye.
    pub fn walkover_team(&self) -> Option<&Team> {
        match (&self.slot_a, &self.slot_b) {
            (Slot::Team(team), Slot::Bye) | (Slot::Bye, Slot::Team(team)) => Some(team),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    #[default]
    Pending,
    Active,
    Completed,
}

impl RoundStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Active => "active",
            RoundStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: String,
    pub round_number: u32,
    pub round_name: String,
    pub status: RoundStatus,
    pub matches: Vec<Match>,
}

impl Round {
    pub fn total_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn completed_matches(&self) -> usize {
        self.matches.iter().filter(|m| m.is_completed()).count()
    }

    /// Completion is derived from the matches rather than trusted from storage.
    pub fn effective_status(&self) -> RoundStatus {
        if !self.matches.is_empty() && self.completed_matches() == self.total_matches() {
            RoundStatus::Completed
        } else {
            self.status
        }
    }

    /// Every match has both slots bound to a team or a bye.
    pub fn is_ready_for_activation(&self) -> bool {
        self.matches.iter().all(Match::is_resolved)
    }

    pub fn match_at(&self, position: u32) -> Option<&Match> {
        self.matches.iter().find(|m| m.bracket_position == position)
    }

    pub fn match_at_mut(&mut self, position: u32) -> Option<&mut Match> {
        self.matches.iter_mut().find(|m| m.bracket_position == position)
    }
}

/// Counts reported by `saveBrackets`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub created_count: u32,
    pub updated_count: u32,
}

impl SaveSummary {
    pub fn touched(&self) -> u32 {
        self.created_count.saturating_add(self.updated_count)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureSummary {
    pub created_count: u32,
}

// ---------------------------------------------------------------------------
// Persistence collaborator
// ---------------------------------------------------------------------------

/// Request/response operations the bracket engine needs from the backend.
///
/// Calls carry no implicit retry. A failed call must leave the backend as it was.
pub trait BracketService: Send + Sync {
    fn fetch_tournament(
        &self,
        tournament_id: &str,
    ) -> impl Future<Output = ApiResult<Tournament>> + Send;

    /// Pure computation of a fresh bracket; nothing is persisted.
    fn generate_bracket(
        &self,
        tournament_id: &str,
    ) -> impl Future<Output = ApiResult<Vec<Round>>> + Send;

    /// Rounds currently persisted for the tournament, possibly empty.
    fn fetch_rounds(&self, tournament_id: &str)
    -> impl Future<Output = ApiResult<Vec<Round>>> + Send;

    fn save_brackets(
        &self,
        tournament_id: &str,
        rounds: &[Round],
    ) -> impl Future<Output = ApiResult<SaveSummary>> + Send;

    fn create_fixtures(
        &self,
        tournament_id: &str,
    ) -> impl Future<Output = ApiResult<FixtureSummary>> + Send;

    fn reset_bracket(&self, tournament_id: &str) -> impl Future<Output = ApiResult<()>> + Send;
}
