//! Decides which copy of a bracket is shown: the reset marker, the local
//! cache or the persisted rounds.

use crate::state::bus::Subscription;
use crate::state::cache::DraftCache;
use crate::state::desk::BracketDesk;
use crate::state::draft::BracketDraft;
use bracket_api::{BracketService, Round};
use log::{debug, error, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    ResetSentinel,
    Cache,
    Persisted,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDraft {
    pub draft: BracketDraft,
    pub source: DraftSource,
    /// Set when the persisted rounds could not be read.
    pub warning: Option<String>,
}

pub fn has_resolved_team(rounds: &[Round]) -> bool {
    rounds
        .iter()
        .flat_map(|r| r.matches.iter())
        .any(|m| m.slot_a.team().is_some() || m.slot_b.team().is_some())
}

/// Highest first: reset marker, cache entry, persisted rounds with at least
/// one team placed, nothing.
pub fn authoritative_source(reset_pending: bool, cached: bool, persisted: Option<&[Round]>) -> DraftSource {
    if reset_pending {
        DraftSource::ResetSentinel
    } else if cached {
        DraftSource::Cache
    } else if persisted.is_some_and(has_resolved_team) {
        DraftSource::Persisted
    } else {
        DraftSource::Empty
    }
}

impl<S: BracketService, C: DraftCache> BracketDesk<S, C> {
    /// Rebuild the live draft from the authoritative source. Never fails;
    /// unreadable sources count as absent.
    pub async fn load(&self, tournament_id: &str) -> LoadedDraft {
        let lock = self.locks().lock_for(tournament_id);
        let _writer = lock.lock().await;

        let reset_pending = self.reset_pending(tournament_id).unwrap_or_else(|e| {
            warn!("{tournament_id}: {e}");
            false
        });
        let cached = if reset_pending {
            None
        } else {
            self.cached_draft(tournament_id).unwrap_or_else(|e| {
                warn!("{tournament_id}: {e}");
                None
            })
        };

        let mut warning = None;
        let persisted = if reset_pending || cached.is_some() {
            None
        } else {
            match self.service().fetch_rounds(tournament_id).await {
                Ok(rounds) => Some(rounds),
                Err(e) => {
                    warn!("{tournament_id}: could not read persisted bracket: {e}");
                    warning = Some(format!("showing an empty bracket, the saved one is unavailable ({e})"));
                    None
                }
            }
        };

        let source = authoritative_source(reset_pending, cached.is_some(), persisted.as_deref());
        let draft = match source {
            DraftSource::Cache => cached.unwrap_or_else(|| BracketDraft::empty(tournament_id)),
            DraftSource::Persisted => {
                BracketDraft::from_persisted(tournament_id, persisted.unwrap_or_default())
            }
            DraftSource::ResetSentinel | DraftSource::Empty => BracketDraft::empty(tournament_id),
        };
        debug!("{tournament_id}: loaded draft from {source:?}");

        self.replace_draft(draft.clone()).await;
        LoadedDraft { draft, source, warning }
    }
}

/// Reloads one tournament on start and after every invalidation, sending
/// each view to `views`.
pub struct ReconcileWorker<S, C> {
    desk: Arc<BracketDesk<S, C>>,
    subscription: Subscription,
    views: mpsc::Sender<LoadedDraft>,
}

impl<S: BracketService, C: DraftCache> ReconcileWorker<S, C> {
    pub fn new(
        desk: Arc<BracketDesk<S, C>>,
        tournament_id: &str,
        views: mpsc::Sender<LoadedDraft>,
    ) -> Self {
        let subscription = desk.bus().subscribe(tournament_id);
        Self { desk, subscription, views }
    }

    pub async fn run(mut self) {
        loop {
            let loaded = self.desk.load(self.subscription.tournament_id()).await;
            if let Err(e) = self.views.send(loaded).await {
                error!("Failed to send reconciled draft: {e}");
                break;
            }
            if self.subscription.recv().await.is_none() {
                break;
            }
            // A burst of invalidations needs only one reload.
            self.subscription.try_recv();
        }
        debug!("reconcile worker for {} stopped", self.subscription.tournament_id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cache::draft_key;
    use crate::state::test_support::{desk_with, generated_draft, team, tournament};
    use bracket_api::Slot;
    use bracket_api::memory::Operation;

    #[test]
    fn precedence_order() {
        let cup = tournament("cup", &["A", "B"]);
        let placed = generated_draft(&cup).rounds;
        let mut unplaced = placed.clone();
        unplaced[0].matches[0].slot_a = Slot::Bye;
        unplaced[0].matches[0].slot_b = Slot::Bye;

        let placed = Some(placed.as_slice());
        assert_eq!(authoritative_source(true, true, placed), DraftSource::ResetSentinel);
        assert_eq!(authoritative_source(false, true, placed), DraftSource::Cache);
        assert_eq!(authoritative_source(false, false, placed), DraftSource::Persisted);
        assert_eq!(authoritative_source(false, false, Some(unplaced.as_slice())), DraftSource::Empty);
        assert_eq!(authoritative_source(false, false, Some(Vec::<Round>::new().as_slice())), DraftSource::Empty);
        assert_eq!(authoritative_source(false, false, None), DraftSource::Empty);
    }

    #[tokio::test]
    async fn committed_bracket_comes_back_from_the_service() {
        let cup = tournament("cup", &["A", "B", "C", "D", "E"]);
        let desk = desk_with(cup.clone());
        let generated = desk.generate(&cup).await.unwrap();
        desk.commit("cup").await.unwrap();
        desk.discard_draft("cup").await;

        let loaded = desk.load("cup").await;

        assert_eq!(loaded.source, DraftSource::Persisted);
        assert_eq!(loaded.warning, None);
        assert_eq!(loaded.draft.rounds, generated.rounds);
        assert!(loaded.draft.flags().generated());
        assert!(loaded.draft.flags().committed());
        assert_eq!(desk.draft("cup").await, loaded.draft);
    }

    #[tokio::test]
    async fn local_draft_wins_over_the_service() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let desk = desk_with(cup.clone());
        desk.generate(&cup).await.unwrap();
        desk.set_slot("cup", 1, 0, 1, Slot::Team(team("C"))).await.unwrap();
        desk.set_slot("cup", 1, 1, 1, Slot::Team(team("D"))).await.unwrap();
        desk.save_temporarily("cup").await.unwrap();
        desk.discard_draft("cup").await;

        let loaded = desk.load("cup").await;

        assert_eq!(loaded.source, DraftSource::Cache);
        assert!(loaded.draft.flags().temporarily_saved());
        assert_eq!(loaded.draft.match_at(1, 0).unwrap().slot_b, Slot::Team(team("C")));
        assert_eq!(desk.service().call_count(Operation::FetchRounds), 0);
    }

    #[tokio::test]
    async fn reset_beats_a_stale_cache_entry() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let desk = desk_with(cup.clone());
        desk.generate(&cup).await.unwrap();
        desk.save_temporarily("cup").await.unwrap();
        let stale = desk.cache().get(&draft_key("cup")).unwrap().unwrap();

        desk.reset("cup").await.unwrap();
        // Another tab writes its old draft back.
        desk.cache().set(&draft_key("cup"), &stale).unwrap();

        let loaded = desk.load("cup").await;
        assert_eq!(loaded.source, DraftSource::ResetSentinel);
        assert!(loaded.draft.is_empty());
        assert!(!loaded.draft.flags().generated());
    }

    #[tokio::test]
    async fn unreadable_service_degrades_to_an_empty_draft() {
        let desk = desk_with(tournament("cup", &["A", "B"]));
        desk.service().fail(Operation::FetchRounds);

        let loaded = desk.load("cup").await;

        assert_eq!(loaded.source, DraftSource::Empty);
        assert!(loaded.draft.is_empty());
        assert!(loaded.warning.is_some());
    }

    #[tokio::test]
    async fn nothing_anywhere_is_empty_without_warning() {
        let desk = desk_with(tournament("cup", &["A", "B"]));
        let loaded = desk.load("cup").await;
        assert_eq!(loaded.source, DraftSource::Empty);
        assert_eq!(loaded.warning, None);
    }

    #[tokio::test]
    async fn worker_reloads_after_each_invalidation() {
        let cup = tournament("cup", &["A", "B", "C", "D"]);
        let desk = Arc::new(desk_with(cup.clone()));
        let (views_tx, mut views) = mpsc::channel(8);
        let worker = ReconcileWorker::new(desk.clone(), "cup", views_tx);
        let handle = tokio::spawn(worker.run());

        let mounted = views.recv().await.unwrap();
        assert_eq!(mounted.source, DraftSource::Empty);

        desk.generate(&cup).await.unwrap();
        desk.commit("cup").await.unwrap();

        let refreshed = views.recv().await.unwrap();
        assert_eq!(refreshed.source, DraftSource::Persisted);
        assert!(refreshed.draft.flags().committed());

        drop(views);
        desk.bus().publish("cup");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn look_alike_ids_keep_separate_drafts_on_disk() {
        use crate::state::bus::InvalidationBus;
        use crate::state::cache::FileCache;
        use bracket_api::memory::InMemoryService;

        let dir = tempfile::tempdir().unwrap();
        let colon = tournament("a:b", &["A", "B", "C", "D"]);
        let desk = BracketDesk::new(
            InMemoryService::new()
                .with_tournament(colon.clone())
                .with_tournament(tournament("a_b", &["A", "B"])),
            FileCache::new(dir.path()),
            InvalidationBus::default(),
        );
        desk.generate(&colon).await.unwrap();
        desk.save_temporarily("a:b").await.unwrap();

        let other = desk.load("a_b").await;
        assert_eq!(other.source, DraftSource::Empty);
        assert_eq!(other.draft.tournament_id, "a_b");

        let own = desk.load("a:b").await;
        assert_eq!(own.source, DraftSource::Cache);
        assert_eq!(own.draft.tournament_id, "a:b");
    }
}
