//! Background housekeeping tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::clock::Clock;
use crate::services::SessionTokenManager;

/// Periodically delete expired session tokens.
///
/// The first sweep runs one `period` after spawning. A failed sweep is logged
/// and the loop carries on. The task ends when `shutdown` changes or its
/// sender is dropped.
pub fn spawn_token_sweeper(
    sessions: Arc<SessionTokenManager>,
    clock: Arc<dyn Clock>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_secs = period.as_secs(), "Token sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = sessions.sweep_expired(clock.now()).await {
                        tracing::error!(error = %err, "Token sweep failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("Token sweeper stopped");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use shopfront_core::{Email, Role};

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::NewPrincipal;
    use crate::services::ServiceSettings;
    use crate::store::PrincipalStore;
    use crate::store::memory::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_waits_one_period() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap());
        let sessions = Arc::new(SessionTokenManager::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            ServiceSettings::default(),
        ));

        let principal = store
            .insert(NewPrincipal {
                name: "Sleepy Shopper".to_owned(),
                email: Email::parse("sleepy@example.com").unwrap(),
                password_hash: "hash".to_owned(),
                role: Role::Customer,
                created_at: clock.now(),
            })
            .await
            .unwrap();
        sessions.issue(&principal).await.unwrap();
        clock.advance(chrono::Duration::days(8));

        let (tx, rx) = watch::channel(false);
        let period = Duration::from_secs(3600);
        let handle = spawn_token_sweeper(Arc::clone(&sessions), Arc::new(clock), period, rx);

        tokio::time::sleep(period / 2).await;
        assert_eq!(store.token_count(), 1);

        tokio::time::sleep(period).await;
        assert_eq!(store.token_count(), 0);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
