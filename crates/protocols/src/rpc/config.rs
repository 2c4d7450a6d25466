use lpbot_domain::enums::{Chain, Network};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Environment variable prefix for endpoint lists.
pub const ENDPOINTS_ENV_PREFIX: &str = "RPC_ENDPOINTS_";

/// Ordered endpoint URLs per group name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointGroups(BTreeMap<String, Vec<String>>);

impl EndpointGroups {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical group name for a chain/network pair, e.g. `solana-mainnet`.
    pub fn group_name(chain: Chain, network: Network) -> String {
        format!("{chain}-{network}")
    }

    pub fn insert(&mut self, group: impl Into<String>, urls: Vec<String>) {
        self.0.insert(group.into(), urls);
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>, urls: Vec<String>) -> Self {
        self.insert(group, urls);
        self
    }

    pub fn get(&self, group: &str) -> Option<&[String]> {
        self.0.get(group).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads `RPC_ENDPOINTS_<GROUP>=url1,url2` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Parses endpoint groups from key/value pairs.
    ///
    /// `RPC_ENDPOINTS_SOLANA_MAINNET` becomes group `solana-mainnet`. Blank URLs are dropped.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut groups = Self::new();
        for (key, value) in vars {
            let Some(suffix) = key.strip_prefix(ENDPOINTS_ENV_PREFIX) else {
                continue;
            };
            let urls: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from)
                .collect();
            if urls.is_empty() {
                continue;
            }
            groups.insert(suffix.to_ascii_lowercase().replace('_', "-"), urls);
        }
        groups
    }
}

/// Tunables for endpoint health scoring.
#[derive(Debug, Clone)]
pub struct BalancerConfig {
    /// Time for a failure penalty to decay by half.
    pub health_half_life: Duration,
    /// Penalty added to an endpoint's score per failed call, in milliseconds.
    pub failure_penalty_ms: f64,
    /// Weight of the newest latency sample in the moving average.
    pub latency_smoothing: f64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            health_half_life: Duration::from_secs(30),
            failure_penalty_ms: 5_000.0,
            latency_smoothing: 0.3,
        }
    }
}
