use crate::state::cache::DraftCache;
use crate::state::desk::BracketDesk;
use crate::state::error::BracketError;
use bracket_api::BracketService;
use chrono::Utc;
use log::info;

impl<S: BracketService, C: DraftCache> BracketDesk<S, C> {
    /// Throw the bracket away everywhere. Until the next generation every
    /// reload shows an empty draft, whatever the cache still holds.
    pub async fn reset(&self, tournament_id: &str) -> Result<(), BracketError> {
        let lock = self.locks().lock_for(tournament_id);
        let _writer = lock.lock().await;

        self.service().reset_bracket(tournament_id).await?;
        self.discard_draft(tournament_id).await;

        let marked = self
            .raise_reset(tournament_id, Utc::now())
            .and_then(|()| self.drop_cached_draft(tournament_id));
        self.bus().publish(tournament_id);
        info!("{tournament_id}: bracket reset");
        marked?;
        Ok(())
    }
}
