//! Error types for the mint client.

use serde_json::Value;
use std::fmt;

/// Prefix the NEAR runtime puts in front of every contract panic message.
pub const PANIC_PREFIX: &str = "Smart contract panicked: ";

/// Shown when a failed mint carries no recognizable panic message.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Mint client error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration error (bad account id, malformed URL, ...).
    Config(String),
    /// RPC communication error.
    Rpc(String),
    /// Credential store error.
    Credentials(String),
    /// The transaction executed and failed on chain. Holds the serialized failure.
    Execution(Value),
    /// A view result could not be decoded.
    Decode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Credentials(msg) => write!(f, "credentials error: {msg}"),
            Error::Execution(failure) => write!(f, "execution failed: {failure}"),
            Error::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Message suitable for an error notification.
    ///
    /// Only on-chain execution failures have a panic message worth showing;
    /// everything else collapses to [`UNKNOWN_ERROR`].
    pub fn user_message(&self) -> String {
        match self {
            Error::Execution(failure) => {
                panic_message(failure).unwrap_or_else(|| UNKNOWN_ERROR.to_string())
            }
            _ => UNKNOWN_ERROR.to_string(),
        }
    }
}

/// Best-effort extraction of a contract panic message from a failure value.
///
/// Looks for the first `ExecutionError` string anywhere in the structure, so
/// both the runtime shape
/// (`{"ActionError":{"index":0,"kind":{"FunctionCallError":{"ExecutionError":"..."}}}}`)
/// and the flattened wallet shape (`{"index":0,"kind":{"ExecutionError":"..."}}`)
/// are accepted. Returns `None` when the shape is not recognized.
pub fn panic_message(failure: &Value) -> Option<String> {
    match failure {
        Value::Object(map) => {
            if let Some(Value::String(msg)) = map.get("ExecutionError") {
                return Some(msg.strip_prefix(PANIC_PREFIX).unwrap_or(msg).to_string());
            }
            map.values().find_map(panic_message)
        }
        Value::Array(items) => items.iter().find_map(panic_message),
        // Some wallets stringify the failure JSON into the error message.
        Value::String(s) if s.trim_start().starts_with('{') => serde_json::from_str::<Value>(s)
            .ok()
            .as_ref()
            .and_then(panic_message),
        _ => None,
    }
}
