use crate::wire::{
    BracketWire, FixturesResponseWire, MatchWire, RoundWire, SaveResponseWire, SlotWire,
    TournamentWire,
};
use crate::{
    BracketService, FixtureSummary, Match, MatchStatus, Round, RoundStatus, SaveSummary,
    SeededTeam, Slot, Team, Tournament, TournamentStatus, TournamentType,
};
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

const USER_AGENT: &str = "bracket-desk/0.1 (bracket lifecycle engine)";

/// Bracket service client over JSON/HTTP.
#[derive(Debug, Clone)]
pub struct BracketApi {
    client: Client,
    base_url: String,
    /// No timeout unless configured; callers decide when to give up.
    timeout: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error for {1}: {0}")]
    Network(#[source] reqwest::Error, String),
    #[error("API error for {1}: {0}")]
    Api(#[source] reqwest::Error, String),
    #[error("Parse error for {1}: {0}")]
    Parsing(#[source] reqwest::Error, String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Error: {0}")]
    Other(String),
}

impl BracketApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            base_url,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, tournament_id: &str, path: &str) -> String {
        format!("{}/tournaments/{tournament_id}{path}", self.base_url)
    }

    async fn dispatch(&self, request: RequestBuilder, url: &str) -> ApiResult<Response> {
        let request = match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(url.to_owned()));
        }
        response
            .error_for_status()
            .map_err(|e| ApiError::Api(e, url.to_owned()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> ApiResult<T> {
        self.dispatch(request, url)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parsing(e, url.to_owned()))
    }
}

impl BracketService for BracketApi {
    async fn fetch_tournament(&self, tournament_id: &str) -> ApiResult<Tournament> {
        let url = self.url(tournament_id, "");
        debug!("fetching tournament {tournament_id}");
        let raw: TournamentWire = self.send(self.client.get(&url), &url).await?;
        map_tournament(raw)
    }

    async fn generate_bracket(&self, tournament_id: &str) -> ApiResult<Vec<Round>> {
        let url = self.url(tournament_id, "/bracket/generate");
        debug!("requesting generated bracket for {tournament_id}");
        let raw: BracketWire = self.send(self.client.post(&url), &url).await?;
        raw.rounds.into_iter().map(map_round).collect()
    }

    async fn fetch_rounds(&self, tournament_id: &str) -> ApiResult<Vec<Round>> {
        let url = self.url(tournament_id, "/bracket");
        debug!("fetching persisted bracket for {tournament_id}");
        let raw: BracketWire = self.send(self.client.get(&url), &url).await?;
        raw.rounds.into_iter().map(map_round).collect()
    }

    async fn save_brackets(&self, tournament_id: &str, rounds: &[Round]) -> ApiResult<SaveSummary> {
        let url = self.url(tournament_id, "/bracket");
        let body = BracketWire { rounds: rounds.iter().map(round_to_wire).collect() };
        debug!("saving {} round(s) for {tournament_id}", body.rounds.len());
        let raw: SaveResponseWire = self.send(self.client.put(&url).json(&body), &url).await?;
        Ok(SaveSummary {
            created_count: raw.created_count,
            updated_count: raw.updated_count,
        })
    }

    async fn create_fixtures(&self, tournament_id: &str) -> ApiResult<FixtureSummary> {
        let url = self.url(tournament_id, "/fixtures");
        debug!("creating fixtures for {tournament_id}");
        let raw: FixturesResponseWire = self.send(self.client.post(&url), &url).await?;
        Ok(FixtureSummary { created_count: raw.created_count })
    }

    async fn reset_bracket(&self, tournament_id: &str) -> ApiResult<()> {
        let url = self.url(tournament_id, "/bracket");
        debug!("deleting persisted bracket for {tournament_id}");
        self.dispatch(self.client.delete(&url), &url).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mapping: wire types → clean domain types
// ---------------------------------------------------------------------------

fn map_tournament(raw: TournamentWire) -> ApiResult<Tournament> {
    let status = parse_tournament_status(&raw.status).ok_or_else(|| {
        ApiError::Other(format!("tournament {} has unknown status '{}'", raw.id, raw.status))
    })?;
    let tournament_type = match raw.tournament_type.as_deref() {
        None | Some("single_elimination") => TournamentType::SingleElimination,
        Some(other) => {
            return Err(ApiError::Other(format!(
                "tournament {} uses unsupported format '{other}'",
                raw.id
            )));
        }
    };

    let teams = raw
        .teams
        .into_iter()
        .enumerate()
        .map(|(i, t)| SeededTeam {
            team: Team { id: t.team_id, name: t.team_name },
            // Unseeded teams keep roster order.
            seed: t.seed.unwrap_or(i as u32 + 1),
        })
        .collect();

    Ok(Tournament {
        id: raw.id,
        name: raw.name,
        status,
        tournament_type,
        teams,
    })
}

fn map_round(raw: RoundWire) -> ApiResult<Round> {
    let mut matches = raw.matches.into_iter().map(map_match).collect::<ApiResult<Vec<Match>>>()?;
    matches.sort_by_key(|m| m.bracket_position);
    Ok(Round {
        id: raw.id,
        round_number: raw.round_number,
        round_name: raw.round_name,
        status: parse_round_status(&raw.status),
        matches,
    })
}

fn map_match(raw: MatchWire) -> ApiResult<Match> {
    let slot_a = map_slot(raw.slot_a, &raw.id)?;
    let slot_b = map_slot(raw.slot_b, &raw.id)?;
    let status = parse_match_status(&raw.status);

    // Winners only exist on completed matches.
    let winner = raw.winner_id.filter(|_| status == MatchStatus::Completed).map(|id| {
        [&slot_a, &slot_b]
            .into_iter()
            .filter_map(|s| s.team())
            .find(|t| t.id == id)
            .cloned()
            .unwrap_or_else(|| Team { name: id.clone(), id })
    });

    Ok(Match {
        id: raw.id,
        bracket_position: raw.bracket_position,
        slot_a,
        slot_b,
        venue: raw.venue,
        scheduled_at: raw.scheduled_at,
        status,
        score_a: raw.score_a,
        score_b: raw.score_b,
        tiebreak_a: raw.tiebreak_a,
        tiebreak_b: raw.tiebreak_b,
        winner,
    })
}

/// Byes must be explicit; a slot that is none of team, feeder or bye is
/// rejected rather than guessed.
fn map_slot(raw: SlotWire, match_id: &str) -> ApiResult<Slot> {
    if raw.bye {
        return Ok(Slot::Bye);
    }
    match (raw.team_id, raw.source_round, raw.source_match) {
        (Some(id), _, _) => Ok(Slot::Team(Team {
            name: raw.team_name.unwrap_or_else(|| id.clone()),
            id,
        })),
        (None, Some(source_round), Some(source_match)) => {
            Ok(Slot::Winner { source_round, source_match })
        }
        _ => Err(ApiError::Other(format!(
            "match {match_id} has a slot with no team, feeder or bye"
        ))),
    }
}

fn parse_tournament_status(status: &str) -> Option<TournamentStatus> {
    match status {
        "draft" => Some(TournamentStatus::Draft),
        "registration" => Some(TournamentStatus::Registration),
        "active" => Some(TournamentStatus::Active),
        "completed" => Some(TournamentStatus::Completed),
        _ => None,
    }
}

fn parse_round_status(status: &str) -> RoundStatus {
    match status {
        "active" => RoundStatus::Active,
        "completed" => RoundStatus::Completed,
        _ => RoundStatus::Pending,
    }
}

fn parse_match_status(status: &str) -> MatchStatus {
    match status {
        "live" | "in_progress" => MatchStatus::Live,
        "completed" | "final" => MatchStatus::Completed,
        "cancelled" | "canceled" => MatchStatus::Cancelled,
        "postponed" => MatchStatus::Postponed,
        _ => MatchStatus::Scheduled,
    }
}

// ---------------------------------------------------------------------------
// Mapping: domain types → wire types
// ---------------------------------------------------------------------------

fn round_to_wire(round: &Round) -> RoundWire {
    RoundWire {
        id: round.id.clone(),
        round_number: round.round_number,
        round_name: round.round_name.clone(),
        total_matches: Some(round.total_matches() as u32),
        status: round.effective_status().label().to_string(),
        matches: round.matches.iter().map(match_to_wire).collect(),
    }
}

fn match_to_wire(m: &Match) -> MatchWire {
    MatchWire {
        id: m.id.clone(),
        bracket_position: m.bracket_position,
        slot_a: slot_to_wire(&m.slot_a),
        slot_b: slot_to_wire(&m.slot_b),
        venue: m.venue.clone(),
        scheduled_at: m.scheduled_at,
        status: m.status.label().to_string(),
        score_a: m.score_a,
        score_b: m.score_b,
        tiebreak_a: m.tiebreak_a,
        tiebreak_b: m.tiebreak_b,
        winner_id: m.winner.as_ref().map(|t| t.id.clone()),
    }
}

fn slot_to_wire(slot: &Slot) -> SlotWire {
    match slot {
        Slot::Team(team) => SlotWire {
            team_id: Some(team.id.clone()),
            team_name: Some(team.name.clone()),
            ..Default::default()
        },
        Slot::Winner { source_round, source_match } => SlotWire {
            source_round: Some(*source_round),
            source_match: Some(*source_match),
            ..Default::default()
        },
        Slot::Bye => SlotWire { bye: true, ..Default::default() },
    }
}
