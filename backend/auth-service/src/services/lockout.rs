/// Per-principal failure tracking and lockout
///
/// Each identifier owns a `FailureWindow` behind its own async mutex. Holding
/// the guard serializes every lockout transition and credential rotation for
/// that identifier without blocking any other identifier.
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that lock the principal
    pub threshold: u32,
    /// Sliding window the failures must fall within
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            window: Duration::minutes(15),
        }
    }
}

/// Recent failed attempts for one identifier
///
/// `locked` is only set for identifiers with no stored principal, so that an
/// unknown identifier locks on the same attempt a real one would.
#[derive(Debug, Default)]
pub struct FailureWindow {
    failures: VecDeque<DateTime<Utc>>,
    locked: bool,
}

impl FailureWindow {
    /// Record a failure at `now`; true once the threshold is reached
    pub fn record_failure(&mut self, now: DateTime<Utc>, policy: &LockoutPolicy) -> bool {
        self.expire(now, policy.window);
        self.failures.push_back(now);
        self.failures.len() >= policy.threshold as usize
    }

    /// Drop failures older than the window
    pub fn expire(&mut self, now: DateTime<Utc>, window: Duration) {
        while let Some(oldest) = self.failures.front() {
            if now - *oldest >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Hold the identifier locked until `reset`
    pub fn lock(&mut self) {
        self.failures.clear();
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn reset(&mut self) {
        self.failures.clear();
        self.locked = false;
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct LockoutTracker {
    policy: LockoutPolicy,
    windows: DashMap<String, Arc<Mutex<FailureWindow>>>,
}

impl LockoutTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            windows: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Exclusive access to an identifier's failure window
    pub async fn acquire(&self, identifier: &str) -> OwnedMutexGuard<FailureWindow> {
        let slot = self
            .windows
            .entry(identifier.to_string())
            .or_default()
            .clone();
        slot.lock_owned().await
    }

    /// Remove windows nobody holds, not locked and with no live failures
    pub fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        let window = self.policy.window;
        self.windows.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(mut failures) => {
                    failures.expire(now, window);
                    failures.is_locked() || !failures.is_empty()
                }
                Err(_) => true,
            }
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    pub fn spawn_pruner(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let pruned = self.prune_idle(Utc::now());
                if pruned > 0 {
                    tracing::debug!(pruned, "Pruned idle lockout windows");
                }
            }
        })
    }
}
