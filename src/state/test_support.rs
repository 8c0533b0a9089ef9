use crate::state::bus::InvalidationBus;
use crate::state::cache::MemoryCache;
use crate::state::desk::BracketDesk;
use crate::state::draft::BracketDraft;
use bracket_api::bracket::seeded_rounds;
use bracket_api::memory::InMemoryService;
use bracket_api::{SeededTeam, Team, Tournament, TournamentStatus, TournamentType};

pub type TestDesk = BracketDesk<InMemoryService, MemoryCache>;

/// Tournament whose teams are seeded in the order given.
pub fn tournament(id: &str, team_names: &[&str]) -> Tournament {
    Tournament {
        id: id.to_string(),
        name: format!("{id} cup"),
        status: TournamentStatus::Draft,
        tournament_type: TournamentType::SingleElimination,
        teams: team_names
            .iter()
            .enumerate()
            .map(|(i, name)| SeededTeam {
                team: Team::new(name.to_lowercase(), *name),
                seed: i as u32 + 1,
            })
            .collect(),
    }
}

/// Draft as the generator would hand it over, walkovers settled.
pub fn generated_draft(tournament: &Tournament) -> BracketDraft {
    let mut draft = BracketDraft::generated(&tournament.id, seeded_rounds(tournament));
    draft.settle_walkovers().expect("fresh brackets settle cleanly");
    draft
}

pub fn desk_with(tournament: Tournament) -> TestDesk {
    BracketDesk::new(
        InMemoryService::new().with_tournament(tournament),
        MemoryCache::new(),
        InvalidationBus::default(),
    )
}

pub fn team(name: &str) -> Team {
    Team::new(name.to_lowercase(), name)
}
