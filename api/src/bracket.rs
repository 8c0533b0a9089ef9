//! Single-elimination bracket geometry.
//!
//! Round 1 holds ⌈N/2⌉ matches and every later round ⌈previous/2⌉ until a
//! single match remains. Match `i` of round `r` feeds slot `i % 2` of match
//! `i / 2` in round `r + 1`; when a round has an odd match count the last
//! match of the next round has no second feeder and gets a bye instead.

use crate::{Match, Round, RoundStatus, SeededTeam, Slot, Tournament};

/// Match count of every round, first round first. Empty for fewer than two teams.
pub fn match_counts(team_count: usize) -> Vec<usize> {
    let mut counts = Vec::new();
    if team_count < 2 {
        return counts;
    }
    let mut matches = team_count.div_ceil(2);
    loop {
        counts.push(matches);
        if matches == 1 {
            break;
        }
        matches = matches.div_ceil(2);
    }
    counts
}

/// ⌈log2 N⌉ for N ≥ 2.
pub fn round_count(team_count: usize) -> usize {
    match_counts(team_count).len()
}

/// Where the winner of `position` plays next: (next position, slot index).
pub fn feeds_into(position: u32) -> (u32, usize) {
    (position / 2, (position % 2) as usize)
}

/// What a later-round slot holds before any result is known.
pub fn expected_slot(
    round_number: u32,
    position: u32,
    slot_index: usize,
    previous_round_matches: usize,
) -> Slot {
    let feeder = position as usize * 2 + slot_index;
    if feeder < previous_round_matches {
        Slot::winner_of(round_number - 1, feeder as u32)
    } else {
        Slot::Bye
    }
}

// Get a generic name for a round based on how far it is from the final.
pub fn round_name(round_number: u32, total_rounds: u32) -> String {
    match total_rounds.saturating_sub(round_number) {
        0 => "Final".to_string(),
        1 => "Semi Final".to_string(),
        2 => "Quarter Final".to_string(),
        _ => format!("Round {round_number}"),
    }
}

pub fn round_id(tournament_id: &str, round_number: u32) -> String {
    format!("{tournament_id}-r{round_number}")
}

pub fn match_id(tournament_id: &str, round_number: u32, position: u32) -> String {
    format!("{tournament_id}-r{round_number}-m{position}")
}

/// First-round pairings from the seed list.
///
/// With an odd team count the best seed gets the bye in position 0; the
/// remaining teams are folded best-against-worst.
pub fn first_round_pairs(teams: &[&SeededTeam]) -> Vec<(Slot, Slot)> {
    let mut pairs = Vec::with_capacity(teams.len().div_ceil(2));
    let rest = if teams.len() % 2 == 1 {
        pairs.push((Slot::Team(teams[0].team.clone()), Slot::Bye));
        &teams[1..]
    } else {
        teams
    };
    for i in 0..rest.len() / 2 {
        let top = rest[i].team.clone();
        let bottom = rest[rest.len() - 1 - i].team.clone();
        pairs.push((Slot::Team(top), Slot::Team(bottom)));
    }
    pairs
}

/// Build the full set of rounds for a tournament. Later rounds only hold
/// placeholders and byes; settling walkovers is left to the caller.
pub fn seeded_rounds(tournament: &Tournament) -> Vec<Round> {
    let teams = tournament.teams_by_seed();
    let counts = match_counts(teams.len());
    let total_rounds = counts.len() as u32;
    let mut rounds = Vec::with_capacity(counts.len());

    for (index, &count) in counts.iter().enumerate() {
        let round_number = index as u32 + 1;
        let matches = if round_number == 1 {
            first_round_pairs(&teams)
                .into_iter()
                .enumerate()
                .map(|(pos, (a, b))| {
                    Match::new(match_id(&tournament.id, 1, pos as u32), pos as u32, a, b)
                })
                .collect()
        } else {
            let previous = counts[index - 1];
            (0..count as u32)
                .map(|pos| {
                    Match::new(
                        match_id(&tournament.id, round_number, pos),
                        pos,
                        expected_slot(round_number, pos, 0, previous),
                        expected_slot(round_number, pos, 1, previous),
                    )
                })
                .collect()
        };

        rounds.push(Round {
            id: round_id(&tournament.id, round_number),
            round_number,
            round_name: round_name(round_number, total_rounds),
            status: RoundStatus::Pending,
            matches,
        });
    }

    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Team, TournamentStatus, TournamentType};

    fn tournament(n: usize) -> Tournament {
        Tournament {
            id: "t".into(),
            name: "Cup".into(),
            status: TournamentStatus::Draft,
            tournament_type: TournamentType::SingleElimination,
            teams: (1..=n)
                .map(|i| SeededTeam {
                    team: Team::new(format!("team-{i}"), format!("Team {i}")),
                    seed: i as u32,
                })
                .collect(),
        }
    }

    #[test]
    fn round_count_is_ceil_log2() {
        for n in 2..=70usize {
            let expected = (n as f64).log2().ceil() as usize;
            assert_eq!(round_count(n), expected, "teams: {n}");
        }
    }

    #[test]
    fn match_counts_halve_down_to_one() {
        for n in 2..=70usize {
            let counts = match_counts(n);
            assert_eq!(counts[0], n.div_ceil(2));
            for pair in counts.windows(2) {
                assert_eq!(pair[1], pair[0].div_ceil(2));
            }
            assert_eq!(counts.last(), Some(&1));
        }
        assert!(match_counts(1).is_empty());
        assert!(match_counts(0).is_empty());
    }

    #[test]
    fn feeding_relationship() {
        assert_eq!(feeds_into(0), (0, 0));
        assert_eq!(feeds_into(1), (0, 1));
        assert_eq!(feeds_into(2), (1, 0));
        assert_eq!(feeds_into(5), (2, 1));
    }

    #[test]
    fn default_round_names() {
        assert_eq!(round_name(3, 3), "Final");
        assert_eq!(round_name(2, 3), "Semi Final");
        assert_eq!(round_name(1, 3), "Quarter Final");
        assert_eq!(round_name(1, 5), "Round 1");
    }

    #[test]
    fn four_teams_pair_best_against_worst() {
        let rounds = seeded_rounds(&tournament(4));
        assert_eq!(rounds.len(), 2);
        let first = &rounds[0].matches;
        assert_eq!(first[0].slot_a.team().map(|t| t.id.as_str()), Some("team-1"));
        assert_eq!(first[0].slot_b.team().map(|t| t.id.as_str()), Some("team-4"));
        assert_eq!(first[1].slot_a.team().map(|t| t.id.as_str()), Some("team-2"));
        assert_eq!(first[1].slot_b.team().map(|t| t.id.as_str()), Some("team-3"));
        let final_match = &rounds[1].matches[0];
        assert_eq!(final_match.slot_a, Slot::winner_of(1, 0));
        assert_eq!(final_match.slot_b, Slot::winner_of(1, 1));
        assert_eq!(rounds[1].round_name, "Final");
    }

    #[test]
    fn odd_team_count_gives_top_seed_a_bye() {
        let rounds = seeded_rounds(&tournament(3));
        assert_eq!(rounds[0].matches.len(), 2);
        assert_eq!(rounds[1].matches.len(), 1);
        let bye_match = &rounds[0].matches[0];
        assert_eq!(bye_match.walkover_team().map(|t| t.id.as_str()), Some("team-1"));
    }

    #[test]
    fn odd_match_count_leaves_a_bye_in_the_next_round() {
        // 5 teams: 3 → 2 → 1 matches.
        let rounds = seeded_rounds(&tournament(5));
        let second = &rounds[1].matches;
        assert_eq!(second[1].slot_a, Slot::winner_of(1, 2));
        assert_eq!(second[1].slot_b, Slot::Bye);
    }

    #[test]
    fn every_team_appears_once_in_round_one() {
        let rounds = seeded_rounds(&tournament(11));
        let mut ids: Vec<&str> = rounds[0]
            .matches
            .iter()
            .flat_map(|m| [&m.slot_a, &m.slot_b])
            .filter_map(|s| s.team())
            .map(|t| t.id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 11);
    }
}
