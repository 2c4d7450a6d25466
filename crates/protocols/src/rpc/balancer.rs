//! Power-of-two-choices endpoint balancer with sequential failover.

use super::{BalancerConfig, EndpointGroups, EndpointHealth};
use crate::retry::{RetryPolicy, retry};
use dashmap::DashMap;
use rand::seq::index::sample;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from [`RpcEndpointBalancer::with_client`].
#[derive(Debug, Error)]
pub enum RpcError<E> {
    #[error("unknown endpoint group: {0}")]
    UnknownGroup(String),

    #[error("endpoint group {0} has no endpoints")]
    EmptyGroup(String),

    /// Single-attempt call failed; the error is passed through as-is.
    #[error("{0}")]
    Call(E),

    /// Every endpoint in the group was tried and failed.
    #[error("all endpoints exhausted for group {group}: {last}")]
    Exhausted { group: String, last: E },
}

impl<E> RpcError<E> {
    /// The underlying callback error, if the failure came from a call.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RpcError::Call(e) | RpcError::Exhausted { last: e, .. } => Some(e),
            RpcError::UnknownGroup(_) | RpcError::EmptyGroup(_) => None,
        }
    }
}

/// One RPC endpoint and the client bound to it.
pub struct Endpoint<C> {
    pub url: String,
    pub client: Arc<C>,
}

impl<C> Clone for Endpoint<C> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            client: self.client.clone(),
        }
    }
}

/// Routes calls across the endpoints of a group.
pub struct RpcEndpointBalancer<C> {
    groups: HashMap<String, Vec<Endpoint<C>>>,
    health: DashMap<String, EndpointHealth>,
    config: BalancerConfig,
}

impl<C> RpcEndpointBalancer<C>
where
    C: Send + Sync,
{
    /// Builds one client per configured URL using `factory`.
    pub fn new<F>(groups: &EndpointGroups, config: BalancerConfig, mut factory: F) -> Self
    where
        F: FnMut(&str) -> C,
    {
        match Self::try_new(groups, config, |url| Ok::<_, Infallible>(factory(url))) {
            Ok(balancer) => balancer,
            Err(never) => match never {},
        }
    }

    /// Like [`Self::new`] for client constructors that can fail.
    pub fn try_new<F, E>(
        groups: &EndpointGroups,
        config: BalancerConfig,
        mut factory: F,
    ) -> Result<Self, E>
    where
        F: FnMut(&str) -> Result<C, E>,
    {
        let mut built = HashMap::new();
        for (name, urls) in groups.iter() {
            let endpoints = urls
                .iter()
                .map(|url| {
                    Ok(Endpoint {
                        url: url.clone(),
                        client: Arc::new(factory(url)?),
                    })
                })
                .collect::<Result<Vec<_>, E>>()?;
            built.insert(name.clone(), endpoints);
        }

        Ok(Self {
            groups: built,
            health: DashMap::new(),
            config,
        })
    }

    pub fn urls(&self, group: &str) -> Option<Vec<&str>> {
        self.groups
            .get(group)
            .map(|endpoints| endpoints.iter().map(|e| e.url.as_str()).collect())
    }

    pub fn group_names(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }

    /// Current health score of `url`; unknown endpoints score as perfectly healthy.
    pub fn score(&self, url: &str) -> f64 {
        self.health
            .get(url)
            .map(|h| h.score(Instant::now(), self.config.health_half_life))
            .unwrap_or(0.0)
    }

    /// Samples two distinct endpoints and returns the index of the healthier one.
    fn select_primary(&self, endpoints: &[Endpoint<C>]) -> usize {
        if endpoints.len() < 2 {
            return 0;
        }
        let picked = sample(&mut rand::rng(), endpoints.len(), 2);
        let (first, second) = (picked.index(0), picked.index(1));
        if self.score(&endpoints[second].url) < self.score(&endpoints[first].url) {
            second
        } else {
            first
        }
    }

    fn record_success(&self, url: &str, started: Instant) {
        let now = Instant::now();
        self.health
            .entry(url.to_string())
            .or_insert_with(|| EndpointHealth::new(now))
            .record_success(
                now.duration_since(started),
                self.config.latency_smoothing,
                now,
                self.config.health_half_life,
            );
    }

    fn record_failure(&self, url: &str) {
        let now = Instant::now();
        self.health
            .entry(url.to_string())
            .or_insert_with(|| EndpointHealth::new(now))
            .record_failure(
                self.config.failure_penalty_ms,
                now,
                self.config.health_half_life,
            );
    }

    async fn call_endpoint<T, E, F, Fut>(
        &self,
        endpoint: &Endpoint<C>,
        callback: &F,
    ) -> Result<T, E>
    where
        F: Fn(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = callback(endpoint.client.clone()).await;
        match &result {
            Ok(_) => self.record_success(&endpoint.url, started),
            Err(_) => self.record_failure(&endpoint.url),
        }
        result
    }

    /// Runs `callback` against a client of `group`.
    ///
    /// With [`RetryPolicy::None`] the callback runs once on the selected primary
    /// and its error is returned as [`RpcError::Call`]. Otherwise the primary is
    /// retried per `policy`, then every other endpoint is tried in configured
    /// order, each with its own retries. When all fail the last error is
    /// returned in [`RpcError::Exhausted`].
    pub async fn with_client<T, E, F, Fut>(
        &self,
        group: &str,
        policy: &RetryPolicy,
        callback: F,
    ) -> Result<T, RpcError<E>>
    where
        F: Fn(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let endpoints = self
            .groups
            .get(group)
            .ok_or_else(|| RpcError::UnknownGroup(group.to_string()))?;
        if endpoints.is_empty() {
            return Err(RpcError::EmptyGroup(group.to_string()));
        }

        let primary = self.select_primary(endpoints);
        debug!(group, url = %endpoints[primary].url, "Selected primary endpoint");

        if policy.is_none() {
            return self
                .call_endpoint(&endpoints[primary], &callback)
                .await
                .map_err(RpcError::Call);
        }

        let primary_call = || self.call_endpoint(&endpoints[primary], &callback);
        let mut last = match retry(policy, primary_call).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        warn!(
            group,
            url = %endpoints[primary].url,
            error = %last,
            "Primary endpoint exhausted, failing over"
        );

        for (index, endpoint) in endpoints.iter().enumerate() {
            if index == primary {
                continue;
            }
            match retry(policy, || self.call_endpoint(endpoint, &callback)).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(group, url = %endpoint.url, error = %e, "Fallback endpoint exhausted");
                    last = e;
                }
            }
        }

        Err(RpcError::Exhausted {
            group: group.to_string(),
            last,
        })
    }
}
