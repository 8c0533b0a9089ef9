//! Round and match state machine, including winner propagation.

use crate::state::cache::DraftCache;
use crate::state::desk::BracketDesk;
use crate::state::draft::BracketDraft;
use crate::state::error::BracketError;
use bracket_api::bracket::feeds_into;
use bracket_api::{BracketService, Match, MatchStatus, RoundStatus, Slot, Team};
use log::{info, warn};
use std::cmp::Ordering;

/// Result as entered by score keeping. The tiebreak (penalties, extra
/// frames...) only counts when the main scores are level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchScore {
    pub score_a: u32,
    pub score_b: u32,
    pub tiebreak: Option<(u32, u32)>,
}

impl MatchScore {
    pub fn new(score_a: u32, score_b: u32) -> Self {
        Self { score_a, score_b, tiebreak: None }
    }

    pub fn with_tiebreak(mut self, tiebreak_a: u32, tiebreak_b: u32) -> Self {
        self.tiebreak = Some((tiebreak_a, tiebreak_b));
        self
    }

    /// Index of the winning slot, `None` for a draw.
    pub fn winning_slot(&self) -> Option<usize> {
        let decisive = match self.score_a.cmp(&self.score_b) {
            Ordering::Equal => {
                let (a, b) = self.tiebreak?;
                a.cmp(&b)
            }
            other => other,
        };
        match decisive {
            Ordering::Greater => Some(0),
            Ordering::Less => Some(1),
            Ordering::Equal => None,
        }
    }
}

/// What happened downstream of a completed match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Placed {
        team: Team,
        round: u32,
        position: u32,
        slot: usize,
    },
    Walkover {
        team: Team,
        round: u32,
        position: u32,
    },
    Champion(Team),
}

fn transition(m: &mut Match, next: MatchStatus) -> Result<(), BracketError> {
    if !m.status.can_transition_to(next) {
        return Err(BracketError::InvalidTransition { from: m.status, to: next });
    }
    m.status = next;
    Ok(())
}

impl BracketDraft {
    /// Start, postpone, resume or cancel a match. Completion goes through
    /// [`BracketDraft::record_result`].
    pub fn set_match_status(
        &mut self,
        round_number: u32,
        position: u32,
        status: MatchStatus,
    ) -> Result<(), BracketError> {
        let m = self.match_at_mut(round_number, position)?;
        match status {
            MatchStatus::Completed => Err(BracketError::InvalidState(
                "matches are completed by recording a result".to_string(),
            )),
            MatchStatus::Live if !m.is_resolved() => Err(BracketError::InvalidState(format!(
                "round {round_number} match {position} is still waiting for an earlier result"
            ))),
            _ => transition(m, status),
        }
    }

    /// Flip a round from pending to active once every slot is bound.
    pub fn activate_round(&mut self, round_number: u32) -> Result<(), BracketError> {
        let round = self.round_mut(round_number)?;
        let status = round.effective_status();
        if status != RoundStatus::Pending {
            return Err(BracketError::InvalidState(format!(
                "round {round_number} is already {}",
                status.label()
            )));
        }
        if !round.is_ready_for_activation() {
            let unresolved = round.matches.iter().map(Match::unresolved_slots).sum();
            return Err(BracketError::RoundNotReady { round: round_number, unresolved });
        }
        round.status = RoundStatus::Active;
        info!("{}: round {round_number} is active", self.tournament_id);
        Ok(())
    }

    /// Record a final score and move the winner on.
    ///
    /// A draw keeps the scores but leaves the match open. An integrity error
    /// keeps the completed match; only the propagation is abandoned.
    pub fn record_result(
        &mut self,
        round_number: u32,
        position: u32,
        score: MatchScore,
    ) -> Result<Vec<Advance>, BracketError> {
        let m = self.match_at_mut(round_number, position)?;
        if !m.status.can_transition_to(MatchStatus::Completed) {
            return Err(BracketError::InvalidTransition {
                from: m.status,
                to: MatchStatus::Completed,
            });
        }
        let (Some(team_a), Some(team_b)) = (m.slot_a.team().cloned(), m.slot_b.team().cloned())
        else {
            return Err(BracketError::InvalidState(format!(
                "round {round_number} match {position} does not have two teams"
            )));
        };

        m.score_a = Some(score.score_a);
        m.score_b = Some(score.score_b);
        m.tiebreak_a = score.tiebreak.map(|(a, _)| a);
        m.tiebreak_b = score.tiebreak.map(|(_, b)| b);

        let Some(winning_slot) = score.winning_slot() else {
            if m.status == MatchStatus::Scheduled {
                m.status = MatchStatus::Live;
            }
            warn!("round {round_number} match {position} ended level without a tiebreak");
            return Err(BracketError::Draw { round: round_number, position });
        };

        let winner = if winning_slot == 0 { team_a } else { team_b };
        m.status = MatchStatus::Completed;
        m.winner = Some(winner.clone());
        info!("round {round_number} match {position}: {} won", winner.name);

        self.propagate_winner(round_number, position, winner)
    }

    /// Complete every match that has a team facing a bye.
    pub(crate) fn settle_walkovers(&mut self) -> Result<Vec<Advance>, BracketError> {
        let pending: Vec<(u32, u32, Team)> = self
            .rounds
            .iter()
            .flat_map(|r| {
                r.matches
                    .iter()
                    .filter(|m| !m.status.is_terminal())
                    .filter_map(move |m| {
                        m.walkover_team().map(|t| (r.round_number, m.bracket_position, t.clone()))
                    })
            })
            .collect();

        let mut advanced = Vec::new();
        for (round_number, position, team) in pending {
            let m = self.match_at_mut(round_number, position)?;
            if m.status.is_terminal() {
                continue;
            }
            m.status = MatchStatus::Completed;
            m.winner = Some(team.clone());
            advanced.push(Advance::Walkover { team: team.clone(), round: round_number, position });
            advanced.extend(self.propagate_winner(round_number, position, team)?);
        }
        Ok(advanced)
    }

    fn propagate_winner(
        &mut self,
        round_number: u32,
        position: u32,
        winner: Team,
    ) -> Result<Vec<Advance>, BracketError> {
        let mut advanced = Vec::new();
        let (mut round_number, mut position, mut winner) = (round_number, position, winner);

        loop {
            if round_number >= self.total_rounds() {
                info!("{}: {} wins the bracket", self.tournament_id, winner.name);
                advanced.push(Advance::Champion(winner));
                return Ok(advanced);
            }

            let next_round = round_number + 1;
            let (next_position, slot_index) = feeds_into(position);
            let Some(round) = self.rounds.iter_mut().find(|r| r.round_number == next_round) else {
                return Err(BracketError::integrity(
                    round_number,
                    position,
                    format!("round {next_round} is missing"),
                ));
            };
            let Some(target) = round.match_at_mut(next_position) else {
                return Err(BracketError::integrity(
                    round_number,
                    position,
                    format!("round {next_round} has no match {next_position} to receive the winner"),
                ));
            };

            let slot = if slot_index == 0 { &mut target.slot_a } else { &mut target.slot_b };
            match &*slot {
                Slot::Winner { source_round, source_match }
                    if *source_round == round_number && *source_match == position => {}
                Slot::Team(team) if *team == winner => {}
                other => {
                    return Err(BracketError::integrity(
                        round_number,
                        position,
                        format!(
                            "round {next_round} match {next_position} slot {slot_index} holds '{}' instead of this match's winner",
                            other.label()
                        ),
                    ));
                }
            }
            *slot = Slot::Team(winner.clone());
            advanced.push(Advance::Placed {
                team: winner.clone(),
                round: next_round,
                position: next_position,
                slot: slot_index,
            });

            if target.status.is_terminal() {
                return Ok(advanced);
            }
            let Some(team) = target.walkover_team().cloned() else {
                return Ok(advanced);
            };
            target.status = MatchStatus::Completed;
            target.winner = Some(team.clone());
            advanced.push(Advance::Walkover {
                team: team.clone(),
                round: next_round,
                position: next_position,
            });
            (round_number, position, winner) = (next_round, next_position, team);
        }
    }

    pub fn champion(&self) -> Option<&Team> {
        let last = self.rounds.last()?;
        match last.matches.as_slice() {
            [only] if only.is_completed() => only.winner.as_ref(),
            _ => None,
        }
    }
}

impl<S: BracketService, C: DraftCache> BracketDesk<S, C> {
    pub async fn set_match_status(
        &self,
        tournament_id: &str,
        round_number: u32,
        position: u32,
        status: MatchStatus,
    ) -> Result<(), BracketError> {
        self.apply(tournament_id, |draft| {
            draft.require_generated()?;
            draft.set_match_status(round_number, position, status)
        })
        .await
    }

    pub async fn activate_round(&self, tournament_id: &str, round_number: u32) -> Result<(), BracketError> {
        self.apply(tournament_id, |draft| {
            draft.require_generated()?;
            draft.activate_round(round_number)
        })
        .await
    }

    /// Once committed, the completed match is saved even when propagation
    /// stops on an integrity error.
    pub async fn record_result(
        &self,
        tournament_id: &str,
        round_number: u32,
        position: u32,
        score: MatchScore,
    ) -> Result<Vec<Advance>, BracketError> {
        self.apply(tournament_id, |draft| {
            draft.require_generated()?;
            draft.record_result(round_number, position, score)
        })
        .await
    }
}
