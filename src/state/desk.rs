//! Per-process entry point to the bracket lifecycle. Owns the collaborators,
//! the live drafts and one writer lock per tournament.

use crate::state::bus::InvalidationBus;
use crate::state::cache::{CacheError, DraftCache, draft_key, reset_key};
use crate::state::draft::BracketDraft;
use crate::state::error::BracketError;
use bracket_api::{BracketService, TournamentId};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;

/// Hands out one async mutex per tournament id.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: std::sync::Mutex<HashMap<TournamentId, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn lock_for(&self, tournament_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(tournament_id.to_string()).or_default().clone()
    }
}

pub struct BracketDesk<S, C> {
    service: S,
    cache: C,
    bus: InvalidationBus,
    locks: LockRegistry,
    drafts: Mutex<HashMap<TournamentId, BracketDraft>>,
}

impl<S: BracketService, C: DraftCache> BracketDesk<S, C> {
    pub fn new(service: S, cache: C, bus: InvalidationBus) -> Self {
        Self {
            service,
            cache,
            bus,
            locks: LockRegistry::default(),
            drafts: Mutex::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    pub(crate) fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Snapshot of the live draft, empty if nothing was generated or loaded.
    pub async fn draft(&self, tournament_id: &str) -> BracketDraft {
        let drafts = self.drafts.lock().await;
        drafts
            .get(tournament_id)
            .cloned()
            .unwrap_or_else(|| BracketDraft::empty(tournament_id))
    }

    pub(crate) async fn replace_draft(&self, draft: BracketDraft) {
        let mut drafts = self.drafts.lock().await;
        drafts.insert(draft.tournament_id.clone(), draft);
    }

    pub(crate) async fn discard_draft(&self, tournament_id: &str) {
        self.drafts.lock().await.remove(tournament_id);
    }

    /// Run `edit` against a copy of the draft under the tournament's writer
    /// lock. The copy replaces the live draft unless the edit failed without
    /// side effects. Committed drafts are saved to the service first and an
    /// invalidation goes out once the save succeeded.
    pub(crate) async fn apply<T>(
        &self,
        tournament_id: &str,
        edit: impl FnOnce(&mut BracketDraft) -> Result<T, BracketError>,
    ) -> Result<T, BracketError> {
        let lock = self.locks.lock_for(tournament_id);
        let _writer = lock.lock().await;

        let mut draft = self.draft(tournament_id).await;
        let outcome = edit(&mut draft);
        if matches!(&outcome, Err(e) if e.nothing_changed()) {
            return outcome;
        }

        if draft.flags().committed() {
            let summary = self.service.save_brackets(tournament_id, &draft.rounds).await?;
            debug!(
                "{tournament_id}: saved ({} created, {} updated)",
                summary.created_count, summary.updated_count
            );
            self.replace_draft(draft).await;
            self.bus.publish(tournament_id);
        } else {
            self.replace_draft(draft).await;
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Durable cache entries
    // -----------------------------------------------------------------------

    pub(crate) fn reset_pending(&self, tournament_id: &str) -> Result<bool, CacheError> {
        Ok(self.cache.get(&reset_key(tournament_id))?.is_some())
    }

    pub(crate) fn raise_reset(&self, tournament_id: &str, at: DateTime<Utc>) -> Result<(), CacheError> {
        self.cache.set(&reset_key(tournament_id), &at.to_rfc3339())
    }

    pub(crate) fn clear_reset(&self, tournament_id: &str) -> Result<(), CacheError> {
        self.cache.delete(&reset_key(tournament_id))
    }

    pub(crate) fn cache_draft(&self, draft: &BracketDraft) -> Result<(), CacheError> {
        let key = draft_key(&draft.tournament_id);
        let json = serde_json::to_string(draft).map_err(|e| CacheError::new(&key, e))?;
        self.cache.set(&key, &json)
    }

    /// The cached draft, if any. Entries that no longer parse, or that hold
    /// another tournament's draft, are dropped.
    pub(crate) fn cached_draft(&self, tournament_id: &str) -> Result<Option<BracketDraft>, CacheError> {
        let key = draft_key(tournament_id);
        let Some(json) = self.cache.get(&key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<BracketDraft>(&json) {
            Ok(draft) if draft.tournament_id == tournament_id => Ok(Some(draft)),
            Ok(draft) => {
                warn!(
                    "{key}: discarding cache entry that belongs to tournament {}",
                    draft.tournament_id
                );
                self.cache.delete(&key)?;
                Ok(None)
            }
            Err(e) => {
                warn!("{key}: discarding unreadable cache entry: {e}");
                self.cache.delete(&key)?;
                Ok(None)
            }
        }
    }

    pub(crate) fn drop_cached_draft(&self, tournament_id: &str) -> Result<(), CacheError> {
        self.cache.delete(&draft_key(tournament_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{desk_with, generated_draft, team, tournament};
    use bracket_api::Slot;
    use bracket_api::memory::Operation;

    #[test]
    fn one_lock_per_tournament() {
        let registry = LockRegistry::default();
        let a = registry.lock_for("cup");
        let b = registry.lock_for("cup");
        let c = registry.lock_for("league");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn unknown_tournaments_have_an_empty_draft() {
        let desk = desk_with(tournament("cup", &["A", "B"]));
        let draft = desk.draft("cup").await;
        assert!(draft.is_empty());
        assert_eq!(draft.tournament_id, "cup");
    }

    #[tokio::test]
    async fn failed_edits_leave_the_draft_alone() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let desk = desk_with(cup.clone());
        desk.replace_draft(generated_draft(&cup)).await;

        let result: Result<(), BracketError> = desk
            .apply("cup", |draft| {
                draft.match_at_mut(1, 0)?.venue = Some("Court 9".into());
                Err(BracketError::InvalidState("rejected".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(desk.draft("cup").await.match_at(1, 0).unwrap().venue, None);
    }

    #[tokio::test]
    async fn committed_edits_are_saved_and_announced() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let desk = desk_with(cup.clone());
        desk.replace_draft(BracketDraft::from_persisted("cup", generated_draft(&cup).rounds))
            .await;
        let mut events = desk.bus().subscribe("cup");

        desk.apply("cup", |draft| {
            draft.match_at_mut(2, 0)?.slot_a = Slot::Team(team("A"));
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(desk.service().call_count(Operation::SaveBrackets), 1);
        assert_eq!(
            desk.service().persisted_rounds("cup")[1].matches[0].slot_a,
            Slot::Team(team("A"))
        );
        assert!(events.try_recv());
    }

    #[tokio::test]
    async fn failed_save_keeps_the_previous_draft() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let desk = desk_with(cup.clone());
        let committed = BracketDraft::from_persisted("cup", generated_draft(&cup).rounds);
        desk.replace_draft(committed.clone()).await;
        desk.service().fail(Operation::SaveBrackets);

        let result = desk
            .apply("cup", |draft| {
                draft.match_at_mut(1, 0)?.venue = Some("Court 9".into());
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(BracketError::Persistence(_))));
        assert_eq!(desk.draft("cup").await, committed);
    }

    #[tokio::test]
    async fn unreadable_cache_entries_are_dropped() {
        let desk = desk_with(tournament("cup", &["A", "B"]));
        desk.cache().set(&draft_key("cup"), "{not json").unwrap();

        assert_eq!(desk.cached_draft("cup").unwrap(), None);
        assert_eq!(desk.cache().get(&draft_key("cup")).unwrap(), None);
    }

    #[tokio::test]
    async fn cache_entries_for_another_tournament_are_dropped() {
        let cup = tournament("a:b", &["A", "B"]);
        let desk = desk_with(cup.clone());
        let json = serde_json::to_string(&generated_draft(&cup)).unwrap();
        desk.cache().set(&draft_key("a_b"), &json).unwrap();

        assert_eq!(desk.cached_draft("a_b").unwrap(), None);
        assert_eq!(desk.cache().get(&draft_key("a_b")).unwrap(), None);
    }

    #[tokio::test]
    async fn reset_marker_round_trip() {
        let desk = desk_with(tournament("cup", &["A", "B"]));
        assert!(!desk.reset_pending("cup").unwrap());
        desk.raise_reset("cup", Utc::now()).unwrap();
        assert!(desk.reset_pending("cup").unwrap());
        assert!(!desk.reset_pending("league").unwrap());
        desk.clear_reset("cup").unwrap();
        assert!(!desk.reset_pending("cup").unwrap());
    }
}
