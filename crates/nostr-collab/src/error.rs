use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not authenticated: a signer is required for this operation")]
    Unauthenticated,
    #[error("pubkey {pubkey} is not an authorized author (authorized: {})", authorized.join(", "))]
    Forbidden {
        pubkey: String,
        authorized: Vec<String>,
    },
    #[error("collaborative pointer not found: {kind}:{pubkey}:{identifier}")]
    PointerNotFound {
        kind: u16,
        pubkey: String,
        identifier: String,
    },
    #[error("malformed address: {0}")]
    MalformedAddress(String),
    #[error("wrong address type: expected {expected}, got {actual}")]
    WrongAddressType { expected: String, actual: String },
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("no account found for {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unrecognized identifier format: {0} (expected hex pubkey, npub1..., or name@domain)")]
    UnrecognizedFormat(String),
    #[error("operation timed out")]
    Timeout,
    #[error("nostr client error: {0}")]
    NostrClient(#[from] nostr_sdk::client::Error),
    #[error("nostr key error: {0}")]
    NostrKey(#[from] nostr_sdk::nostr::key::Error),
    #[error("nostr tag error: {0}")]
    NostrTag(#[from] nostr_sdk::nostr::event::tag::Error),
    #[error("signer error: {0}")]
    Signer(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("serde json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid value for env var {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid relay url: {0}")]
    InvalidRelayUrl(String),
    #[error("publish quorum failed: required {required}, got {actual}")]
    Quorum { required: usize, actual: usize },
    #[error("mutex poisoned")]
    MutexPoisoned,
}
