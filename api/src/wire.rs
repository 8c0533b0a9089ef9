/// Wire types for the bracket service HTTP API.
/// Endpoints are rooted at `{base}/tournaments/{id}`.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TournamentWire {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status: String,
    /// Absent on older deployments, which only run single elimination.
    pub tournament_type: Option<String>,
    #[serde(default)]
    pub teams: Vec<SeededTeamWire>,
}

#[derive(Deserialize, Default, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SeededTeamWire {
    pub team_id: String,
    pub team_name: String,
    pub seed: Option<u32>,
}

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct BracketWire {
    #[serde(default)]
    pub rounds: Vec<RoundWire>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoundWire {
    pub id: String,
    pub round_number: u32,
    #[serde(default)]
    pub round_name: String,
    /// Informational; the client derives totals from `matches`.
    pub total_matches: Option<u32>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub matches: Vec<MatchWire>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MatchWire {
    pub id: String,
    pub bracket_position: u32,
    #[serde(default)]
    pub slot_a: SlotWire,
    #[serde(default)]
    pub slot_b: SlotWire,
    pub venue: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: String,
    pub score_a: Option<u32>,
    pub score_b: Option<u32>,
    pub tiebreak_a: Option<u32>,
    pub tiebreak_b: Option<u32>,
    pub winner_id: Option<String>,
}

/// Flat slot: a team, a reference to the feeding match, or a bye.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SlotWire {
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub source_round: Option<u32>,
    pub source_match: Option<u32>,
    #[serde(default)]
    pub bye: bool,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponseWire {
    #[serde(default)]
    pub created_count: u32,
    #[serde(default)]
    pub updated_count: u32,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FixturesResponseWire {
    #[serde(default)]
    pub created_count: u32,
}
