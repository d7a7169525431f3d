use cross_matcher::Exchange;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::notifier::UdpNotifier;

/// Periodically drops idle sessions and their notification addresses.
/// Stops once `shutdown` flips to true.
pub fn spawn_session_sweeper(
    exchange: Arc<Exchange>,
    notifier: Arc<UdpNotifier>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_sessions(&exchange, &notifier);
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
    })
}

/// Addresses are unregistered inside the session sweep, so a user who
/// logs back in right after expiring keeps the new registration.
pub fn sweep_sessions(exchange: &Exchange, notifier: &UdpNotifier) -> Vec<String> {
    exchange
        .sessions()
        .expire_idle_with(|user| notifier.unregister(user))
}

/// Periodically writes a book snapshot. The first write happens one full
/// period after startup. A write in progress when `shutdown` flips
/// completes before the task ends, so awaiting the handle guarantees no
/// periodic write overlaps the final one.
pub fn spawn_snapshot_writer(
    exchange: Arc<Exchange>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }

            let exchange = exchange.clone();
            match tokio::task::spawn_blocking(move || exchange.persist()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Periodic snapshot failed: {}", e),
                Err(e) => tracing::error!("Snapshot task panicked: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cross_matcher::clock::{Clock, ManualClock};
    use cross_matcher::session::SessionManager;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn setup(timeout: Duration) -> (Exchange, Arc<UdpNotifier>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let sessions = Arc::new(SessionManager::new(timeout, clock.clone()));
        let (notifier, _rx) = UdpNotifier::with_queue(4);
        let notifier = Arc::new(notifier);
        let exchange = Exchange::new(notifier.clone(), sessions, clock.clone() as Arc<dyn Clock>);
        (exchange, notifier, clock)
    }

    #[test]
    fn test_sweep_unregisters_expired_users() {
        let (exchange, notifier, clock) = setup(Duration::from_secs(10));

        exchange.sessions().login_user("idle");
        notifier.register("idle", "127.0.0.1:5000".parse().unwrap());
        clock.advance(5_000);
        exchange.sessions().login_user("busy");
        notifier.register("busy", "127.0.0.1:5001".parse().unwrap());

        clock.advance(6_000);
        let expired = sweep_sessions(&exchange, &notifier);

        assert_eq!(expired, vec!["idle".to_string()]);
        assert!(notifier.address_of("idle").is_none());
        assert!(notifier.address_of("busy").is_some());
        assert!(exchange.sessions().is_user_logged_in("busy"));
    }

    #[test]
    fn test_relogin_during_sweeps_keeps_registration() {
        let (exchange, notifier, clock) = setup(Duration::ZERO);
        let exchange = Arc::new(exchange);
        let done = Arc::new(AtomicBool::new(false));

        let sweeper = {
            let (exchange, notifier, clock, done) =
                (exchange.clone(), notifier.clone(), clock.clone(), done.clone());
            std::thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    clock.advance(1);
                    sweep_sessions(&exchange, &notifier);
                }
            })
        };

        let address = "127.0.0.1:5000".parse().unwrap();
        for _ in 0..2_000 {
            if exchange.sessions().try_login("carol").is_some() {
                notifier.register("carol", address);
            }
        }
        done.store(true, Ordering::SeqCst);
        sweeper.join().unwrap();

        // A live session always has the address its login registered
        if exchange.sessions().is_user_logged_in("carol") {
            assert_eq!(notifier.address_of("carol"), Some(address));
        }
    }

    #[tokio::test]
    async fn test_snapshot_writer_stops_on_shutdown() {
        let (exchange, _, _) = setup(Duration::from_secs(10));
        let (stop, shutdown) = watch::channel(false);
        let writer = spawn_snapshot_writer(Arc::new(exchange), Duration::from_secs(3600), shutdown);

        stop.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), writer)
            .await
            .unwrap()
            .unwrap();
    }
}
