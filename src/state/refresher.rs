use crate::state::bus::InvalidationBus;
use bracket_api::TournamentId;
use std::time::Duration;
use tokio::time::interval;

/// Periodic invalidation so a watcher also picks up changes made by other
/// processes, which never reach this process's bus.
pub struct PeriodicRefresher {
    bus: InvalidationBus,
    tournament_id: TournamentId,
    period: Duration,
}

impl PeriodicRefresher {
    pub fn new(bus: InvalidationBus, tournament_id: &str, period: Duration) -> Self {
        Self { bus, tournament_id: tournament_id.to_string(), period }
    }

    pub async fn run(self) {
        let mut refresh_interval = interval(self.period);
        // Skip the immediate first tick so the startup load isn't double-triggered.
        refresh_interval.tick().await;

        loop {
            refresh_interval.tick().await;
            self.bus.publish(&self.tournament_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_after_each_period_but_not_at_start() {
        let bus = InvalidationBus::default();
        let mut events = bus.subscribe("cup");
        let refresher = PeriodicRefresher::new(bus.clone(), "cup", Duration::from_millis(20));
        let task = tokio::spawn(refresher.run());

        tokio::task::yield_now().await;
        assert!(!events.try_recv());

        assert_eq!(events.recv().await, Some(()));
        task.abort();
    }
}
