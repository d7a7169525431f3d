use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::Clock;

/// Last-activity time of every logged-in user.
///
/// The idle sweep takes the same lock as login/logout, so a session that is
/// refreshed or removed concurrently with a sweep is never lost or revived.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, u64>>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        SessionManager {
            sessions: Mutex::new(HashMap::new()),
            timeout,
            clock,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts or restarts a session
    pub fn login_user(&self, username: &str) -> u64 {
        let now = self.clock.now_millis();
        self.sessions().insert(username.to_string(), now);
        tracing::info!(user = username, "session started");
        now
    }

    /// Starts a session only if the user has none. The check and the insert
    /// happen under one lock, so of two racing logins exactly one wins.
    pub fn try_login(&self, username: &str) -> Option<u64> {
        let now = self.clock.now_millis();
        match self.sessions().entry(username.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(now);
                tracing::info!(user = username, "session started");
                Some(now)
            }
        }
    }

    pub fn logout_user(&self, username: &str) -> bool {
        let removed = self.sessions().remove(username).is_some();
        if removed {
            tracing::info!(user = username, "session ended");
        }
        removed
    }

    pub fn is_user_logged_in(&self, username: &str) -> bool {
        self.sessions().contains_key(username)
    }

    /// Refreshes the session of a logged-in user and returns the new
    /// activity time. `None` if the user has no session.
    pub fn update_user_activity(&self, username: &str) -> Option<u64> {
        let now = self.clock.now_millis();
        let mut sessions = self.sessions();
        let last_seen = sessions.get_mut(username)?;
        *last_seen = now;
        Some(now)
    }

    pub fn last_activity(&self, username: &str) -> Option<u64> {
        self.sessions().get(username).copied()
    }

    /// Drops every session idle for longer than the timeout and returns
    /// the expired usernames.
    pub fn expire_idle(&self) -> Vec<String> {
        self.expire_idle_with(|_| {})
    }

    /// Like `expire_idle`, but calls `on_expire` for each expired user while
    /// the session lock is still held. Cleanup tied to a session therefore
    /// finishes before the same user can log in again.
    pub fn expire_idle_with(&self, mut on_expire: impl FnMut(&str)) -> Vec<String> {
        let now = self.clock.now_millis();
        let timeout = self.timeout.as_millis() as u64;

        let mut expired = Vec::new();
        self.sessions().retain(|user, last_seen| {
            let keep = now.saturating_sub(*last_seen) <= timeout;
            if !keep {
                on_expire(user);
                expired.push(user.clone());
            }
            keep
        });

        for user in &expired {
            tracing::info!(user = %user, "session expired after inactivity");
        }
        expired
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn setup() -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let sessions = SessionManager::new(Duration::from_secs(60), clock.clone());
        (sessions, clock)
    }

    #[test]
    fn test_login_logout() {
        let (sessions, _) = setup();
        assert!(!sessions.is_user_logged_in("alice"));

        assert_eq!(sessions.login_user("alice"), 1_000);
        assert!(sessions.is_user_logged_in("alice"));

        assert!(sessions.logout_user("alice"));
        assert!(!sessions.is_user_logged_in("alice"));
        assert!(!sessions.logout_user("alice"));
    }

    #[test]
    fn test_update_activity_only_for_logged_in_users() {
        let (sessions, clock) = setup();
        assert_eq!(sessions.update_user_activity("bob"), None);
        assert!(!sessions.is_user_logged_in("bob"));

        sessions.login_user("bob");
        clock.advance(500);
        assert_eq!(sessions.update_user_activity("bob"), Some(1_500));
        assert_eq!(sessions.last_activity("bob"), Some(1_500));
    }

    #[test]
    fn test_expire_idle() {
        let (sessions, clock) = setup();
        sessions.login_user("idle");
        sessions.login_user("busy");

        clock.advance(59_000);
        sessions.update_user_activity("busy");
        clock.advance(2_000);

        assert_eq!(sessions.expire_idle(), vec!["idle".to_string()]);
        assert!(!sessions.is_user_logged_in("idle"));
        assert!(sessions.is_user_logged_in("busy"));
        assert_eq!(sessions.active_sessions(), 1);
    }

    #[test]
    fn test_session_at_exact_timeout_survives() {
        let (sessions, clock) = setup();
        sessions.login_user("edge");
        clock.advance(60_000);
        assert!(sessions.expire_idle().is_empty());
        clock.advance(1);
        assert_eq!(sessions.expire_idle().len(), 1);
    }

    #[test]
    fn test_try_login_refuses_live_session() {
        let (sessions, clock) = setup();
        assert_eq!(sessions.try_login("dave"), Some(1_000));
        clock.advance(10);
        assert_eq!(sessions.try_login("dave"), None);
        // The refused attempt does not refresh the session
        assert_eq!(sessions.last_activity("dave"), Some(1_000));
    }

    #[test]
    fn test_concurrent_try_login_has_one_winner() {
        let (sessions, _) = setup();
        let sessions = Arc::new(sessions);

        for round in 0..50 {
            let user = format!("user{round}");
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let sessions = sessions.clone();
                    let user = user.clone();
                    std::thread::spawn(move || sessions.try_login(&user).is_some())
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|&won| won)
                .count();
            assert_eq!(winners, 1);
        }
    }

    #[test]
    fn test_expire_idle_with_sees_each_expired_user() {
        let (sessions, clock) = setup();
        sessions.login_user("a");
        sessions.login_user("b");
        clock.advance(61_000);
        sessions.login_user("c");

        let mut seen = Vec::new();
        let mut expired = sessions.expire_idle_with(|user| seen.push(user.to_string()));
        seen.sort();
        expired.sort();
        assert_eq!(seen, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(expired, seen);
        assert!(sessions.is_user_logged_in("c"));
    }

    #[test]
    fn test_relogin_after_expiry() {
        let (sessions, clock) = setup();
        sessions.login_user("carol");
        clock.advance(120_000);
        sessions.expire_idle();
        assert_eq!(sessions.update_user_activity("carol"), None);

        sessions.login_user("carol");
        assert!(sessions.is_user_logged_in("carol"));
    }
}
