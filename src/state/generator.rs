use crate::state::cache::DraftCache;
use crate::state::desk::BracketDesk;
use crate::state::draft::BracketDraft;
use crate::state::error::BracketError;
use bracket_api::bracket::{expected_slot, match_counts, match_id, round_id, round_name};
use bracket_api::{BracketService, Round, Slot, Tournament, TournamentStatus};
use log::{debug, info};
use std::collections::HashSet;

impl<S: BracketService, C: DraftCache> BracketDesk<S, C> {
    /// Ask the service for a fresh bracket and make it the live draft.
    pub async fn generate(&self, tournament: &Tournament) -> Result<BracketDraft, BracketError> {
        let tournament_id = tournament.id.as_str();
        let lock = self.locks().lock_for(tournament_id);
        let _writer = lock.lock().await;

        if tournament.status != TournamentStatus::Draft {
            return Err(BracketError::InvalidState(format!(
                "tournament {tournament_id} is {}; brackets are generated while it is a draft",
                tournament.status.label()
            )));
        }
        if self.draft(tournament_id).await.flags().committed() {
            return Err(BracketError::InvalidState(format!(
                "the bracket for {tournament_id} is committed; reset it before generating again"
            )));
        }
        if tournament.teams.len() < 2 {
            return Err(BracketError::InsufficientTeams { found: tournament.teams.len() });
        }

        debug!("{tournament_id}: generating bracket for {} teams", tournament.teams.len());
        let rounds = self.service().generate_bracket(tournament_id).await?;
        let mut draft = normalize_generated(tournament, rounds)?;
        draft.settle_walkovers()?;

        // A locally saved copy belongs to the bracket this one replaces.
        self.drop_cached_draft(tournament_id)?;
        self.clear_reset(tournament_id)?;
        self.replace_draft(draft.clone()).await;
        info!("{tournament_id}: generated {} round(s)", draft.total_rounds());
        Ok(draft)
    }

    pub async fn generate_by_id(&self, tournament_id: &str) -> Result<BracketDraft, BracketError> {
        let tournament = self.service().fetch_tournament(tournament_id).await?;
        self.generate(&tournament).await
    }
}

/// Check a generated bracket against the shape the team count dictates and
/// fill in ids and names the service left blank.
pub fn normalize_generated(
    tournament: &Tournament,
    rounds: Vec<Round>,
) -> Result<BracketDraft, BracketError> {
    let mut draft = BracketDraft::generated(&tournament.id, rounds);
    let counts = match_counts(tournament.teams.len());
    let total_rounds = counts.len() as u32;

    if draft.rounds.len() != counts.len() {
        return Err(BracketError::integrity(
            0,
            0,
            format!("expected {} round(s), got {}", counts.len(), draft.rounds.len()),
        ));
    }

    let mut seen_teams = HashSet::new();
    for (index, &expected_matches) in counts.iter().enumerate() {
        let round_number = index as u32 + 1;
        let (earlier, rest) = draft.rounds.split_at_mut(index);
        let round = &mut rest[0];

        if round.round_number != round_number {
            return Err(BracketError::integrity(
                round_number,
                0,
                format!("found round number {} in its place", round.round_number),
            ));
        }
        if round.matches.len() != expected_matches {
            return Err(BracketError::integrity(
                round_number,
                0,
                format!("expected {expected_matches} match(es), got {}", round.matches.len()),
            ));
        }
        if round.id.is_empty() {
            round.id = round_id(&tournament.id, round_number);
        }
        if round.round_name.is_empty() {
            round.round_name = round_name(round_number, total_rounds);
        }

        let previous = earlier.last();
        for (position, m) in round.matches.iter_mut().enumerate() {
            let position = position as u32;
            if m.bracket_position != position {
                return Err(BracketError::integrity(
                    round_number,
                    position,
                    format!("found bracket position {}", m.bracket_position),
                ));
            }
            if m.id.is_empty() {
                m.id = match_id(&tournament.id, round_number, position);
            }
            for (slot_index, slot) in [&m.slot_a, &m.slot_b].into_iter().enumerate() {
                let valid = match previous {
                    None => match slot {
                        Slot::Team(team) => {
                            tournament.find_team(&team.id).is_some() && seen_teams.insert(team.id.clone())
                        }
                        Slot::Bye => true,
                        Slot::Winner { .. } => false,
                    },
                    Some(previous) => {
                        let expected = expected_slot(round_number, position, slot_index, previous.matches.len());
                        *slot == expected || walked_over_into(previous, &expected, slot)
                    }
                };
                if !valid {
                    return Err(BracketError::integrity(
                        round_number,
                        position,
                        format!("unexpected slot {slot_index}: {}", slot.label()),
                    ));
                }
            }
        }
    }

    if seen_teams.len() != tournament.teams.len() {
        return Err(BracketError::integrity(
            1,
            0,
            format!(
                "round 1 places {} of {} teams",
                seen_teams.len(),
                tournament.teams.len()
            ),
        ));
    }
    Ok(draft)
}

// A later-round slot may already hold the team that walked over its feeder.
fn walked_over_into(previous: &Round, expected: &Slot, slot: &Slot) -> bool {
    let (Slot::Winner { source_match, .. }, Slot::Team(team)) = (expected, slot) else {
        return false;
    };
    previous
        .match_at(*source_match)
        .and_then(|m| m.walkover_team())
        .is_some_and(|t| t == team)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cache::draft_key;
    use crate::state::reconcile::DraftSource;
    use crate::state::test_support::{desk_with, team, tournament};
    use bracket_api::MatchStatus;
    use bracket_api::bracket::seeded_rounds;
    use bracket_api::memory::Operation;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("T{i}")).collect()
    }

    #[tokio::test]
    async fn round_counts_follow_the_team_count() {
        for n in 2..=17usize {
            let owned = names(n);
            let borrowed: Vec<&str> = owned.iter().map(String::as_str).collect();
            let desk = desk_with(tournament("cup", &borrowed));

            let draft = desk.generate_by_id("cup").await.unwrap();

            let expected_rounds = (n as f64).log2().ceil() as u32;
            assert_eq!(draft.total_rounds(), expected_rounds, "teams: {n}");
            assert_eq!(draft.rounds[0].matches.len(), n.div_ceil(2), "teams: {n}");
            assert_eq!(draft.rounds.last().unwrap().matches.len(), 1, "teams: {n}");
            assert!(draft.flags().generated());
            assert!(!draft.flags().committed());
            assert!(!draft.flags().temporarily_saved());
        }
    }

    #[tokio::test]
    async fn three_teams_give_the_top_seed_a_bye() {
        let desk = desk_with(tournament("cup", &["A", "B", "C"]));
        let draft = desk.generate_by_id("cup").await.unwrap();

        assert_eq!(draft.total_rounds(), 2);
        assert_eq!(draft.match_at(1, 0).unwrap().status, MatchStatus::Completed);
        assert_eq!(draft.match_at(2, 0).unwrap().slot_a, Slot::Team(team("A")));
        assert_eq!(desk.draft("cup").await, draft);
    }

    #[tokio::test]
    async fn only_draft_tournaments_get_a_bracket() {
        let mut cup = tournament("cup", &["A", "B"]);
        cup.status = TournamentStatus::Active;
        let desk = desk_with(cup.clone());

        assert!(matches!(desk.generate(&cup).await, Err(BracketError::InvalidState(_))));
        assert_eq!(desk.service().call_count(Operation::GenerateBracket), 0);
    }

    #[tokio::test]
    async fn a_single_team_is_not_enough() {
        let cup = tournament("cup", &["A"]);
        let desk = desk_with(cup.clone());

        assert!(matches!(
            desk.generate(&cup).await,
            Err(BracketError::InsufficientTeams { found: 1 })
        ));
        assert_eq!(desk.service().call_count(Operation::GenerateBracket), 0);
    }

    #[tokio::test]
    async fn committed_brackets_are_not_regenerated() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let desk = desk_with(cup.clone());
        desk.generate(&cup).await.unwrap();
        desk.commit("cup").await.unwrap();

        assert!(matches!(desk.generate(&cup).await, Err(BracketError::InvalidState(_))));
        assert_eq!(desk.service().call_count(Operation::GenerateBracket), 1);
    }

    #[tokio::test]
    async fn generation_clears_the_reset_marker() {
        let cup = tournament("cup", &["A", "B"]);
        let desk = desk_with(cup.clone());
        desk.raise_reset("cup", chrono::Utc::now()).unwrap();

        desk.generate(&cup).await.unwrap();
        assert!(!desk.reset_pending("cup").unwrap());
    }

    #[tokio::test]
    async fn regenerating_discards_the_locally_saved_draft() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let desk = desk_with(cup.clone());
        desk.generate(&cup).await.unwrap();
        desk.set_slot("cup", 1, 0, 1, Slot::Team(team("C"))).await.unwrap();
        desk.save_temporarily("cup").await.unwrap();

        let fresh = desk.generate(&cup).await.unwrap();
        assert!(!fresh.flags().temporarily_saved());
        assert_eq!(desk.cache().get(&draft_key("cup")).unwrap(), None);

        // Nothing was saved or committed since, so a reload finds no bracket.
        let loaded = desk.load("cup").await;
        assert_eq!(loaded.source, DraftSource::Empty);
        assert!(loaded.draft.is_empty());
    }

    #[tokio::test]
    async fn service_failure_leaves_no_draft() {
        let desk = desk_with(tournament("cup", &["A", "B"]));
        desk.service().fail(Operation::GenerateBracket);

        assert!(matches!(desk.generate_by_id("cup").await, Err(BracketError::Persistence(_))));
        assert!(desk.draft("cup").await.is_empty());
    }

    #[test]
    fn missing_round_is_rejected() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let mut rounds = seeded_rounds(&cup);
        rounds.pop();
        assert!(matches!(
            normalize_generated(&cup, rounds),
            Err(BracketError::BracketIntegrity { .. })
        ));
    }

    #[test]
    fn miswired_placeholder_is_rejected() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let mut rounds = seeded_rounds(&cup);
        rounds[1].matches[0].slot_b = Slot::winner_of(1, 0);
        assert!(matches!(
            normalize_generated(&cup, rounds),
            Err(BracketError::BracketIntegrity { round: 2, position: 0, .. })
        ));
    }

    #[test]
    fn strangers_and_duplicates_are_rejected() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let mut rounds = seeded_rounds(&cup);
        rounds[0].matches[1].slot_a = Slot::Team(team("Z"));
        assert!(normalize_generated(&cup, rounds).is_err());

        let mut rounds = seeded_rounds(&cup);
        rounds[0].matches[1].slot_a = rounds[0].matches[0].slot_a.clone();
        assert!(normalize_generated(&cup, rounds).is_err());
    }

    #[test]
    fn blank_names_are_filled_in() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let mut rounds = seeded_rounds(&cup);
        rounds[1].round_name.clear();
        rounds[1].matches[0].id.clear();

        let draft = normalize_generated(&cup, rounds).unwrap();
        assert_eq!(draft.rounds[1].round_name, "Final");
        assert_eq!(draft.rounds[1].matches[0].id, "cup-r2-m0");
    }

    #[test]
    fn presettled_walkovers_are_accepted() {
        let cup = tournament("cup", &["A", "B", "C"]);
        let mut rounds = seeded_rounds(&cup);
        rounds[1].matches[0].slot_a = Slot::Team(team("A"));
        assert!(normalize_generated(&cup, rounds).is_ok());
    }
}
