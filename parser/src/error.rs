use thiserror::Error;

use crate::types::SteamId;

/// Errors that abort a whole demo run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read demo: {0}")]
    Io(#[from] std::io::Error),
    #[error("demo header is missing")]
    MissingHeader,
    #[error("demo header is malformed: {0}")]
    MalformedHeader(String),
    #[error("events were requested before the demo header was parsed")]
    HeaderNotParsed,
    #[error("unrecoverable decode error on line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("result for player {steam_id} failed validation: {source}")]
    InvalidResult {
        steam_id: SteamId,
        #[source]
        source: validator::ValidationErrors,
    },
}

/// Per-event identity resolution failures. These never abort a run; the
/// handler that hit one skips the affected statistic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("participant {name} is a bot")]
    BotRejected { name: String },
    #[error("player not found in local match struct {0}")]
    PlayerNotFound(SteamId),
}
