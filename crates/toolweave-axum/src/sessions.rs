//! Protocol sessions opened through `POST /mcp`, keyed by `Mcp-Session-Id`.
//!
//! `initialize` needs no credentials, so the store bounds what clients can
//! leave behind: sessions idle longer than `idle_timeout` are closed, and when
//! `max_sessions` are open the least recently used one is evicted to make room.
//! Closing a session releases its hold on the server's liveness.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use toolweave_core::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE_TIMEOUT_SECS, Settings};
use toolweave_mcp::ProtocolSession;

/// Longest pause between two idle sweeps.
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

struct Tracked {
    session: Arc<ProtocolSession>,
    last_used: Instant,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Tracked>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(
            Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
            DEFAULT_MAX_SESSIONS,
        )
    }
}

impl SessionStore {
    pub fn with_limits(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_limits(
            settings.session_idle_timeout(),
            settings.effective_max_sessions(),
        )
    }

    /// Store a session, closing idle ones and evicting the least recently
    /// used while the store is full.
    pub async fn insert(&self, session: Arc<ProtocolSession>) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let idle = Self::drain_idle(&mut sessions, now, self.idle_timeout);

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, tracked)| tracked.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            if let Some(evicted) = sessions.remove(&oldest) {
                tracing::debug!(session = %oldest, "Evicting least recently used protocol session");
                evicted.session.close();
            }
        }

        sessions.insert(
            session.id().to_string(),
            Tracked {
                session,
                last_used: now,
            },
        );
        drop(sessions);

        if idle > 0 {
            tracing::debug!(count = idle, "Closed idle protocol sessions");
        }
    }

    /// Look up a session and mark it used. Idle sessions are closed instead.
    pub async fn get(&self, id: &str) -> Option<Arc<ProtocolSession>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let tracked = sessions.get_mut(id)?;

        if now.duration_since(tracked.last_used) >= self.idle_timeout {
            if let Some(expired) = sessions.remove(id) {
                expired.session.close();
            }
            return None;
        }
        tracked.last_used = now;
        Some(Arc::clone(&tracked.session))
    }

    /// Remove and close a session.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        removed.is_some_and(|tracked| {
            tracked.session.close();
            true
        })
    }

    /// Close every session idle for at least the idle timeout.
    pub async fn prune_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        Self::drain_idle(&mut sessions, Instant::now(), self.idle_timeout)
    }

    fn drain_idle(
        sessions: &mut HashMap<String, Tracked>,
        now: Instant,
        idle_timeout: Duration,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, tracked| {
            let keep = now.duration_since(tracked.last_used) < idle_timeout;
            if !keep {
                tracked.session.close();
            }
            keep
        });
        before - sessions.len()
    }

    /// Periodically close idle sessions until the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        let period = self.idle_timeout.min(MAX_SWEEP_PERIOD);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let closed = store.prune_idle().await;
                if closed > 0 {
                    tracing::debug!(count = closed, "Closed idle protocol sessions");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn close_all(&self) {
        for (_, tracked) in self.sessions.write().await.drain() {
            tracked.session.close();
        }
    }
}
