use std::env;
use std::time::Duration;

use nostr_sdk::prelude::*;

use crate::events::{KIND_ARTICLE, KIND_COLLAB_POINTER};
use crate::Error;

pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.primal.net",
];

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MIN_ACKS: usize = 1;
const DEFAULT_RELAY_HINTS: usize = 2;

#[derive(Clone)]
pub struct CollabConfig {
    pub relays: Vec<String>,
    /// Hex or `nsec`. Read-only operations work without one.
    pub secret_key: Option<String>,
    pub timeout: Duration,
    pub min_acks: usize,
    pub pointer_kind: u16,
    /// Target kind assumed when a pointer carries no `k` tag.
    pub default_target_kind: u16,
    /// How many relays to embed as hints in produced addresses.
    pub relay_hints: usize,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
            secret_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            min_acks: DEFAULT_MIN_ACKS,
            pointer_kind: KIND_COLLAB_POINTER,
            default_target_kind: KIND_ARTICLE,
            relay_hints: DEFAULT_RELAY_HINTS,
        }
    }
}

const TIMEOUT_ENV: &str = "NOSTR_COLLAB_TIMEOUT_SECS";

impl CollabConfig {
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Ok(value) = env::var("NOSTR_RELAYS") {
            let relays = parse_relays(&value);
            if !relays.is_empty() {
                config.relays = relays;
            }
        }

        config.secret_key = env::var("NOSTR_SECRET_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());

        if let Ok(value) = env::var(TIMEOUT_ENV) {
            config.timeout = parse_timeout_secs(&value)?;
        }

        Ok(config)
    }

    pub fn keys(&self) -> Result<Option<Keys>, Error> {
        match &self.secret_key {
            Some(secret) => Ok(Some(Keys::parse(secret)?)),
            None => Ok(None),
        }
    }

    pub fn hint_relays(&self) -> Vec<String> {
        self.relays.iter().take(self.relay_hints).cloned().collect()
    }
}

fn parse_timeout_secs(value: &str) -> Result<Duration, Error> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::InvalidEnv {
            name: TIMEOUT_ENV,
            value: value.to_string(),
        })
}

pub fn parse_relays(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
