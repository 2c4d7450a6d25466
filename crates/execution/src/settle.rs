//! Fan-out that waits for every branch and keeps each outcome.

use futures::future::join_all;
use std::fmt;
use std::future::Future;
use tracing::warn;

/// Outcome of one branch, tagged with the key it ran for.
#[derive(Debug)]
pub struct Settled<K, T, E> {
    pub key: K,
    pub outcome: Result<T, E>,
}

/// Runs every future concurrently; one failure never cancels the others.
pub async fn settle_all<K, T, E, Fut, I>(branches: I) -> Vec<Settled<K, T, E>>
where
    I: IntoIterator<Item = (K, Fut)>,
    Fut: Future<Output = Result<T, E>>,
{
    join_all(
        branches
            .into_iter()
            .map(|(key, fut)| async move { Settled { key, outcome: fut.await } }),
    )
    .await
}

/// Logs every failed branch at `warn`; returns how many failed.
pub fn log_failures<K, T, E>(context: &str, settled: &[Settled<K, T, E>]) -> usize
where
    K: fmt::Display,
    E: fmt::Display,
{
    let mut failures = 0;
    for branch in settled {
        if let Err(e) = &branch.outcome {
            failures += 1;
            warn!(context, key = %branch.key, error = %e, "Branch failed");
        }
    }
    failures
}
