use bracket_api::TournamentId;
use log::{debug, warn};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Process-wide invalidation notifications, payload is the tournament id.
///
/// Delivery is fire-and-forget: a publish with no subscribers is dropped and
/// nothing survives the process.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    sender: broadcast::Sender<TournamentId>,
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InvalidationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscriptions (for any tournament) saw the event.
    pub fn publish(&self, tournament_id: &str) -> usize {
        let delivered = self.sender.send(tournament_id.to_string()).unwrap_or(0);
        debug!("invalidated {tournament_id} ({delivered} listener(s))");
        delivered
    }

    pub fn subscribe(&self, tournament_id: &str) -> Subscription {
        Subscription {
            tournament_id: tournament_id.to_string(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// Invalidations for a single tournament.
#[derive(Debug)]
pub struct Subscription {
    tournament_id: TournamentId,
    receiver: broadcast::Receiver<TournamentId>,
}

impl Subscription {
    pub fn tournament_id(&self) -> &str {
        &self.tournament_id
    }

    /// Waits for the next invalidation of this tournament. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<()> {
        loop {
            match self.receiver.recv().await {
                Ok(id) if id == self.tournament_id => return Some(()),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed events may have been ours; one reload covers them all.
                    warn!("{}: skipped {skipped} invalidation(s)", self.tournament_id);
                    return Some(());
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drains pending events without waiting; true if any concerned this tournament.
    pub fn try_recv(&mut self) -> bool {
        let mut seen = false;
        loop {
            match self.receiver.try_recv() {
                Ok(id) => seen |= id == self.tournament_id,
                Err(broadcast::error::TryRecvError::Lagged(_)) => seen = true,
                Err(_) => return seen,
            }
        }
    }
}
