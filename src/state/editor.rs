//! Operator edits on an uncommitted draft, temporary saves, commit and the
//! final fixture hand-off.

use crate::state::cache::DraftCache;
use crate::state::desk::BracketDesk;
use crate::state::draft::BracketDraft;
use crate::state::error::BracketError;
use bracket_api::{BracketService, SaveSummary, Slot};
use chrono::{DateTime, Utc};
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureOutcome {
    Created(u32),
    AlreadyCreated,
}

impl BracketDraft {
    fn require_editable(&self) -> Result<(), BracketError> {
        self.require_generated()?;
        if self.flags().committed() {
            return Err(BracketError::AlreadyCommitted);
        }
        Ok(())
    }

    /// Overwrite one side of a match. A team facing a bye walks over at once.
    pub fn set_slot(
        &mut self,
        round_number: u32,
        position: u32,
        slot_index: usize,
        slot: Slot,
    ) -> Result<(), BracketError> {
        self.require_editable()?;
        let m = self.match_at_mut(round_number, position)?;
        if m.status.is_terminal() {
            return Err(BracketError::InvalidState(format!(
                "round {round_number} match {position} is already {}",
                m.status
            )));
        }
        let target = m.slot_mut(slot_index).ok_or(BracketError::InvalidSlotIndex(slot_index))?;
        *target = slot;
        self.settle_walkovers()?;
        Ok(())
    }

    /// `None` leaves the field as it is.
    pub fn set_schedule(
        &mut self,
        round_number: u32,
        position: u32,
        venue: Option<String>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<(), BracketError> {
        self.require_editable()?;
        let m = self.match_at_mut(round_number, position)?;
        if let Some(venue) = venue {
            m.venue = Some(venue);
        }
        if let Some(at) = scheduled_at {
            m.scheduled_at = Some(at);
        }
        Ok(())
    }
}

impl<S: BracketService, C: DraftCache> BracketDesk<S, C> {
    pub async fn set_slot(
        &self,
        tournament_id: &str,
        round_number: u32,
        position: u32,
        slot_index: usize,
        slot: Slot,
    ) -> Result<(), BracketError> {
        self.apply(tournament_id, |draft| draft.set_slot(round_number, position, slot_index, slot))
            .await
    }

    pub async fn set_schedule(
        &self,
        tournament_id: &str,
        round_number: u32,
        position: u32,
        venue: Option<String>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<(), BracketError> {
        self.apply(tournament_id, |draft| {
            draft.set_schedule(round_number, position, venue, scheduled_at)
        })
        .await
    }

    /// Park the draft in the durable cache so it survives a restart.
    pub async fn save_temporarily(&self, tournament_id: &str) -> Result<DateTime<Utc>, BracketError> {
        let lock = self.locks().lock_for(tournament_id);
        let _writer = lock.lock().await;

        if self.reset_pending(tournament_id)? {
            return Err(BracketError::ResetInProgress(tournament_id.to_string()));
        }
        let mut draft = self.draft(tournament_id).await;
        draft.require_editable()?;

        let saved_at = Utc::now();
        draft.mark_temporarily_saved(saved_at);
        self.cache_draft(&draft)?;
        self.replace_draft(draft).await;
        info!("{tournament_id}: draft saved locally");
        Ok(saved_at)
    }

    /// Hand the draft to the service as the system of record.
    pub async fn commit(&self, tournament_id: &str) -> Result<SaveSummary, BracketError> {
        let lock = self.locks().lock_for(tournament_id);
        let _writer = lock.lock().await;

        let mut draft = self.draft(tournament_id).await;
        draft.require_editable()?;

        let summary = self.service().save_brackets(tournament_id, &draft.rounds).await?;
        if summary.touched() == 0 {
            warn!("{tournament_id}: commit saved nothing, draft left uncommitted");
            return Err(BracketError::StaleCommit);
        }

        draft.mark_committed(Utc::now());
        self.replace_draft(draft).await;
        info!(
            "{tournament_id}: bracket committed ({} created, {} updated)",
            summary.created_count, summary.updated_count
        );

        let cleanup = self
            .drop_cached_draft(tournament_id)
            .and_then(|()| self.clear_reset(tournament_id));
        self.bus().publish(tournament_id);
        cleanup?;
        Ok(summary)
    }

    pub async fn create_final_fixtures(&self, tournament_id: &str) -> Result<FixtureOutcome, BracketError> {
        let lock = self.locks().lock_for(tournament_id);
        let _writer = lock.lock().await;

        let mut draft = self.draft(tournament_id).await;
        if !draft.flags().committed() {
            return Err(BracketError::InvalidState(
                "commit the bracket before creating fixtures".to_string(),
            ));
        }
        if draft.flags().fixtures_created() {
            return Ok(FixtureOutcome::AlreadyCreated);
        }

        let summary = self.service().create_fixtures(tournament_id).await?;
        draft.mark_fixtures_created();
        self.replace_draft(draft).await;

        if summary.created_count == 0 {
            info!("{tournament_id}: fixtures already exist");
            return Ok(FixtureOutcome::AlreadyCreated);
        }
        info!("{tournament_id}: created {} fixture(s)", summary.created_count);
        self.bus().publish(tournament_id);
        Ok(FixtureOutcome::Created(summary.created_count))
    }
}
