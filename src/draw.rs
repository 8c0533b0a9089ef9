use crate::state::draft::{BracketDraft, DraftPhase};
use bracket_api::{Match, Round};
use std::fmt::{self, Write};

pub fn render_draft(draft: &BracketDraft) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = draw(&mut out, draft);
    out
}

fn draw(out: &mut String, draft: &BracketDraft) -> fmt::Result {
    writeln!(out, "{} [{}]", draft.tournament_id, phase_text(draft))?;
    if draft.is_empty() {
        return writeln!(out, "  no bracket yet");
    }

    for round in &draft.rounds {
        draw_round(out, round)?;
    }
    if let Some(champion) = draft.champion() {
        writeln!(out, "Champion: {}", champion.name)?;
    }
    Ok(())
}

fn phase_text(draft: &BracketDraft) -> String {
    let flags = draft.flags();
    match flags.phase() {
        DraftPhase::Empty => "empty".to_string(),
        DraftPhase::Generated => match flags.last_saved().filter(|_| flags.temporarily_saved()) {
            Some(at) => format!("draft, saved locally {}", at.format("%Y-%m-%d %H:%M")),
            None => "draft, not saved".to_string(),
        },
        DraftPhase::Committed if flags.fixtures_created() => "committed, fixtures created".to_string(),
        DraftPhase::Committed => "committed".to_string(),
    }
}

fn draw_round(out: &mut String, round: &Round) -> fmt::Result {
    writeln!(
        out,
        "Round {} - {} [{}] {}/{}",
        round.round_number,
        round.round_name,
        round.effective_status().label(),
        round.completed_matches(),
        round.total_matches()
    )?;
    for m in &round.matches {
        draw_match(out, m)?;
    }
    Ok(())
}

fn draw_match(out: &mut String, m: &Match) -> fmt::Result {
    write!(
        out,
        "  M{:<3} {} vs {}  {}",
        m.bracket_position + 1,
        m.slot_a.label(),
        m.slot_b.label(),
        m.status
    )?;
    if let (Some(a), Some(b)) = (m.score_a, m.score_b) {
        write!(out, "  {a}-{b}")?;
        if let (Some(ta), Some(tb)) = (m.tiebreak_a, m.tiebreak_b) {
            write!(out, " ({ta}-{tb})")?;
        }
    }
    if let Some(winner) = &m.winner {
        write!(out, "  winner {}", winner.name)?;
    }
    if let Some(venue) = &m.venue {
        write!(out, "  @ {venue}")?;
    }
    if let Some(at) = m.scheduled_at {
        write!(out, "  {}", at.format("%Y-%m-%d %H:%M"))?;
    }
    writeln!(out)
}
