//! Single-flight coordination for token refresh.
//!
//! The first caller that needs a new access token becomes the leader and
//! performs the refresh. Everyone arriving while it runs is parked on a
//! oneshot channel and released with the leader's outcome, in arrival order.
//! Each successful refresh bumps a generation, so a caller whose bearer
//! predates the latest refresh replays with that token instead of leading
//! another one.

use crate::domain_model::AccessToken;
use crate::domain_port::RefreshError;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Outcome = Result<AccessToken, RefreshError>;

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<Outcome>>,
    },
}

#[derive(Debug, Default)]
struct RefreshState {
    phase: Phase,
    generation: u64,
    latest: Option<AccessToken>,
}

#[derive(Debug, Default, Clone)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
}

pub enum RefreshTurn {
    Leader(RefreshLeader),
    Follower(RefreshWaiter),
    /// A refresh finished after the caller's generation; use its token.
    Replay(AccessToken),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        // The critical sections never panic; recover the data if one somehow did.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of refreshes that have succeeded so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Claims the refresh, joins the one in flight, or hands back the token
    /// of a refresh that completed after `seen` was read. The checks and the
    /// state change happen under one lock, so two callers can never both lead
    /// the same cycle.
    pub fn begin_refresh(&self, seen: Option<u64>) -> RefreshTurn {
        let mut state = self.lock();
        let state = &mut *state;
        if let Phase::Refreshing { waiters } = &mut state.phase {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            debug!(queued = waiters.len(), "joined in-flight refresh");
            return RefreshTurn::Follower(RefreshWaiter { rx });
        }
        if let (Some(seen), Some(latest)) = (seen, &state.latest) {
            if state.generation > seen {
                debug!(seen, generation = state.generation, "refresh already done, replaying");
                return RefreshTurn::Replay(latest.clone());
            }
        }
        state.phase = Phase::Refreshing {
            waiters: Vec::new(),
        };
        debug!("refresh started");
        RefreshTurn::Leader(RefreshLeader {
            state: Arc::clone(&self.state),
            settled: false,
        })
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(self.lock().phase, Phase::Refreshing { .. })
    }

    pub fn queued(&self) -> usize {
        match &self.lock().phase {
            Phase::Idle => 0,
            Phase::Refreshing { waiters } => waiters.len(),
        }
    }
}

/// Held by the one caller performing the refresh. Dropping it unsettled
/// releases the waiters with [`RefreshError::Abandoned`].
pub struct RefreshLeader {
    state: Arc<Mutex<RefreshState>>,
    settled: bool,
}

impl RefreshLeader {
    fn settle(&mut self, outcome: Outcome) -> usize {
        self.settled = true;
        let drained = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if let Ok(token) = &outcome {
                state.generation += 1;
                state.latest = Some(token.clone());
            }
            match mem::take(&mut state.phase) {
                Phase::Refreshing { waiters } => waiters,
                Phase::Idle => Vec::new(),
            }
        };
        let released = drained.len();
        for waiter in drained {
            // A waiter whose request was dropped no longer listens.
            let _ = waiter.send(outcome.clone());
        }
        released
    }

    /// Hands the new token to every queued waiter. Returns how many were queued.
    pub fn resolve_all(mut self, token: AccessToken) -> usize {
        let released = self.settle(Ok(token));
        debug!(released, "refresh succeeded");
        released
    }

    /// Fails every queued waiter with the same error. Returns how many were queued.
    pub fn reject_all(mut self, err: RefreshError) -> usize {
        warn!(error = %err, "refresh failed");
        self.settle(Err(err))
    }
}

impl Drop for RefreshLeader {
    fn drop(&mut self) {
        if !self.settled {
            let released = self.settle(Err(RefreshError::Abandoned));
            warn!(released, "refresh leader dropped before settling");
        }
    }
}

pub struct RefreshWaiter {
    rx: oneshot::Receiver<Outcome>,
}

impl RefreshWaiter {
    pub async fn wait(self) -> Outcome {
        self.rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> AccessToken {
        AccessToken(s.to_string())
    }

    fn expect_leader(turn: RefreshTurn) -> RefreshLeader {
        match turn {
            RefreshTurn::Leader(leader) => leader,
            RefreshTurn::Follower(_) | RefreshTurn::Replay(_) => panic!("expected to lead"),
        }
    }

    fn expect_follower(turn: RefreshTurn) -> RefreshWaiter {
        match turn {
            RefreshTurn::Follower(waiter) => waiter,
            RefreshTurn::Leader(_) | RefreshTurn::Replay(_) => panic!("expected to follow"),
        }
    }

    #[tokio::test]
    async fn followers_receive_the_leaders_token() {
        let coordinator = RefreshCoordinator::new();
        let leader = expect_leader(coordinator.begin_refresh(None));
        let a = expect_follower(coordinator.begin_refresh(None));
        let b = expect_follower(coordinator.begin_refresh(None));
        assert_eq!(coordinator.queued(), 2);

        assert_eq!(leader.resolve_all(token("T2")), 2);
        assert_eq!(a.wait().await, Ok(token("T2")));
        assert_eq!(b.wait().await, Ok(token("T2")));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn rejection_reaches_every_waiter() {
        let coordinator = RefreshCoordinator::new();
        let leader = expect_leader(coordinator.begin_refresh(None));
        let waiters: Vec<_> = (0..3)
            .map(|_| expect_follower(coordinator.begin_refresh(None)))
            .collect();

        let err = RefreshError::Rejected { status: 401 };
        assert_eq!(leader.reject_all(err.clone()), 3);
        for waiter in waiters {
            assert_eq!(waiter.wait().await, Err(err.clone()));
        }
    }

    #[tokio::test]
    async fn dropped_leader_abandons_waiters_and_resets() {
        let coordinator = RefreshCoordinator::new();
        let leader = expect_leader(coordinator.begin_refresh(None));
        let waiter = expect_follower(coordinator.begin_refresh(None));
        drop(leader);

        assert_eq!(waiter.wait().await, Err(RefreshError::Abandoned));
        assert!(!coordinator.is_refreshing());
        // The next caller leads a fresh cycle.
        let next = expect_leader(coordinator.begin_refresh(None));
        assert_eq!(next.resolve_all(token("T3")), 0);
    }

    #[tokio::test]
    async fn caller_behind_a_finished_refresh_replays_instead_of_leading() {
        let coordinator = RefreshCoordinator::new();
        // Read before the refresh starts, acted on after it settled.
        let seen = coordinator.generation();
        let leader = expect_leader(coordinator.begin_refresh(Some(seen)));
        leader.resolve_all(token("T2"));

        match coordinator.begin_refresh(Some(seen)) {
            RefreshTurn::Replay(replayed) => assert_eq!(replayed, token("T2")),
            _ => panic!("expected a replay"),
        }
        assert!(!coordinator.is_refreshing());

        // Up to date callers still lead the next cycle.
        let current = coordinator.generation();
        assert_eq!(current, seen + 1);
        let next = expect_leader(coordinator.begin_refresh(Some(current)));
        next.resolve_all(token("T3"));
    }

    #[tokio::test]
    async fn failed_refresh_does_not_advance_the_generation() {
        let coordinator = RefreshCoordinator::new();
        let seen = coordinator.generation();
        let leader = expect_leader(coordinator.begin_refresh(Some(seen)));
        leader.reject_all(RefreshError::Timeout);

        assert_eq!(coordinator.generation(), seen);
        let retry = expect_leader(coordinator.begin_refresh(Some(seen)));
        drop(retry);
    }

    #[tokio::test]
    async fn concurrent_callers_elect_one_leader() {
        let coordinator = RefreshCoordinator::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    match coordinator.begin_refresh(None) {
                        RefreshTurn::Leader(leader) => {
                            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                            leader.resolve_all(token("fresh"));
                            (true, Ok(token("fresh")))
                        }
                        RefreshTurn::Follower(waiter) => (false, waiter.wait().await),
                        RefreshTurn::Replay(token) => (false, Ok(token)),
                    }
                })
            })
            .collect();

        let results = futures_util::future::join_all(handles).await;
        let mut leaders = 0;
        for result in results {
            let (led, outcome) = result.unwrap();
            leaders += led as usize;
            assert_eq!(outcome, Ok(token("fresh")));
        }
        // Late spawns may start a second cycle after the first resolves.
        assert!(leaders >= 1);
    }
}
