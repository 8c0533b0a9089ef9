//! In-process bracket service. Keeps tournaments, persisted rounds and
//! created fixtures in memory and can be told to fail specific operations.

use crate::bracket::seeded_rounds;
use crate::client::{ApiError, ApiResult};
use crate::{BracketService, FixtureSummary, Match, Round, SaveSummary, Tournament};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchTournament,
    GenerateBracket,
    FetchRounds,
    SaveBrackets,
    CreateFixtures,
    ResetBracket,
}

#[derive(Debug, Default)]
struct Store {
    tournaments: HashMap<String, Tournament>,
    rounds: HashMap<String, Vec<Round>>,
    /// Match ids already turned into standalone fixtures, per tournament.
    fixtures: HashMap<String, HashSet<String>>,
    failing: HashSet<Operation>,
    save_override: Option<SaveSummary>,
    calls: Vec<Operation>,
}

#[derive(Debug, Default)]
pub struct InMemoryService {
    store: Mutex<Store>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tournament(self, tournament: Tournament) -> Self {
        self.insert_tournament(tournament);
        self
    }

    pub fn insert_tournament(&self, tournament: Tournament) {
        self.lock().tournaments.insert(tournament.id.clone(), tournament);
    }

    /// Make every call to `operation` fail until `recover` is called.
    pub fn fail(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.lock().failing.remove(&operation);
    }

    /// Answer `save_brackets` with fixed counts (the rounds are still stored).
    pub fn override_save_summary(&self, summary: Option<SaveSummary>) {
        self.lock().save_override = summary;
    }

    pub fn persisted_rounds(&self, tournament_id: &str) -> Vec<Round> {
        self.lock().rounds.get(tournament_id).cloned().unwrap_or_default()
    }

    pub fn fixture_count(&self, tournament_id: &str) -> usize {
        self.lock().fixtures.get(tournament_id).map_or(0, HashSet::len)
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.lock().calls.iter().filter(|&&op| op == operation).count()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, operation: Operation, tournament_id: &str) -> ApiResult<MutexGuard<'_, Store>> {
        let mut store = self.lock();
        store.calls.push(operation);
        if store.failing.contains(&operation) {
            return Err(ApiError::Other(format!(
                "{operation:?} for {tournament_id} is unavailable"
            )));
        }
        Ok(store)
    }
}

impl BracketService for InMemoryService {
    async fn fetch_tournament(&self, tournament_id: &str) -> ApiResult<Tournament> {
        let store = self.begin(Operation::FetchTournament, tournament_id)?;
        store
            .tournaments
            .get(tournament_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("tournament {tournament_id}")))
    }

    async fn generate_bracket(&self, tournament_id: &str) -> ApiResult<Vec<Round>> {
        let store = self.begin(Operation::GenerateBracket, tournament_id)?;
        let tournament = store
            .tournaments
            .get(tournament_id)
            .ok_or_else(|| ApiError::NotFound(format!("tournament {tournament_id}")))?;
        Ok(seeded_rounds(tournament))
    }

    async fn fetch_rounds(&self, tournament_id: &str) -> ApiResult<Vec<Round>> {
        let store = self.begin(Operation::FetchRounds, tournament_id)?;
        Ok(store.rounds.get(tournament_id).cloned().unwrap_or_default())
    }

    async fn save_brackets(&self, tournament_id: &str, rounds: &[Round]) -> ApiResult<SaveSummary> {
        let mut store = self.begin(Operation::SaveBrackets, tournament_id)?;

        let existing: HashMap<&str, &Match> = store
            .rounds
            .get(tournament_id)
            .into_iter()
            .flatten()
            .flat_map(|r| r.matches.iter())
            .map(|m| (m.id.as_str(), m))
            .collect();

        let mut summary = SaveSummary::default();
        for m in rounds.iter().flat_map(|r| r.matches.iter()) {
            match existing.get(m.id.as_str()) {
                None => summary.created_count += 1,
                Some(&stored) if stored != m => summary.updated_count += 1,
                Some(_) => {}
            }
        }

        store.rounds.insert(tournament_id.to_string(), rounds.to_vec());
        Ok(store.save_override.unwrap_or(summary))
    }

    async fn create_fixtures(&self, tournament_id: &str) -> ApiResult<FixtureSummary> {
        let mut store = self.begin(Operation::CreateFixtures, tournament_id)?;
        let match_ids: Vec<String> = store
            .rounds
            .get(tournament_id)
            .into_iter()
            .flatten()
            .flat_map(|r| r.matches.iter())
            .filter(|m| m.walkover_team().is_none())
            .map(|m| m.id.clone())
            .collect();

        let created = store.fixtures.entry(tournament_id.to_string()).or_default();
        let mut created_count = 0;
        for id in match_ids {
            if created.insert(id) {
                created_count += 1;
            }
        }
        Ok(FixtureSummary { created_count })
    }

    async fn reset_bracket(&self, tournament_id: &str) -> ApiResult<()> {
        let mut store = self.begin(Operation::ResetBracket, tournament_id)?;
        store.rounds.remove(tournament_id);
        store.fixtures.remove(tournament_id);
        Ok(())
    }
}
