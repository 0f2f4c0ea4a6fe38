//! # Fan-out / Join
//!
//! Scatter async tasks on a `JoinSet`, gather every outcome (a barrier),
//! then apply an explicit partial-failure policy.

use crate::error::{GhostwriterError, Result};
use crate::session::StageId;
use std::future::Future;
use tokio::task::JoinSet;

/// What a group of tasks must achieve for the stage to continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Any failure fails the group with that task's error
    RequireAll,
    /// Failures are tolerated while at least `min_successes` tasks succeed
    AllowPartial { min_successes: usize },
}

/// Outcomes of a joined group, ordered by spawn index
#[derive(Debug)]
pub struct JoinOutcome<T> {
    pub successes: Vec<(usize, T)>,
    pub failures: Vec<(usize, GhostwriterError)>,
}

pub struct TaskGroup<T> {
    stage: StageId,
    set: JoinSet<(usize, Result<T>)>,
    spawned: usize,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            set: JoinSet::new(),
            spawned: 0,
        }
    }

    /// Spawn a task; returns its index
    pub fn spawn<F>(&mut self, task: F) -> usize
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let index = self.spawned;
        self.set.spawn(async move { (index, task.await) });
        self.spawned += 1;
        index
    }

    /// Wait for every task, then apply `policy`
    pub async fn join(mut self, policy: JoinPolicy) -> Result<JoinOutcome<T>> {
        let mut successes = Vec::with_capacity(self.spawned);
        let mut failures = Vec::new();
        let mut panicked = 0usize;

        while let Some(joined) = self.set.join_next().await {
            match joined {
                Ok((index, Ok(value))) => successes.push((index, value)),
                Ok((index, Err(e))) => failures.push((index, e)),
                Err(e) => {
                    panicked += 1;
                    tracing::error!(stage = %self.stage, "task panicked: {}", e);
                }
            }
        }

        successes.sort_by_key(|(i, _)| *i);
        failures.sort_by_key(|(i, _)| *i);

        match policy {
            JoinPolicy::RequireAll => {
                if let Some((_, first)) = failures.into_iter().next() {
                    return Err(first);
                }
                if panicked > 0 {
                    return Err(GhostwriterError::StageFailed {
                        stage: self.stage,
                        reason: format!("{} task(s) panicked", panicked),
                    });
                }
                Ok(JoinOutcome {
                    successes,
                    failures: Vec::new(),
                })
            }
            JoinPolicy::AllowPartial { min_successes } => {
                if successes.len() < min_successes {
                    let first = failures
                        .first()
                        .map(|(_, e)| e.to_string())
                        .unwrap_or_else(|| "task panicked".to_string());
                    return Err(GhostwriterError::StageFailed {
                        stage: self.stage,
                        reason: format!(
                            "{} of {} tasks succeeded (need {}); first error: {}",
                            successes.len(),
                            self.spawned,
                            min_successes,
                            first
                        ),
                    });
                }
                Ok(JoinOutcome {
                    successes,
                    failures,
                })
            }
        }
    }
}
