use std::time::Duration;

use shared::domain::{CommandId, EventName};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("event handler for {event} must be callable: its receiving end is closed")]
    InvalidHandler { event: EventName },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no supported host bridge found")]
    Unsupported,
    #[error("failed to serialize {command} command: {source}")]
    Serialize {
        command: CommandId,
        source: serde_json::Error,
    },
    #[error("host bridge rejected {command} command: {source}")]
    Bridge {
        command: CommandId,
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{token} amount {amount} is below the minimum of {minimum}")]
    AmountBelowMinimum {
        token: String,
        amount: f64,
        minimum: f64,
    },
}

/// Failure of an asynchronous command, raised to the caller that awaited it.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("MiniKit not installed")]
    NotInstalled,
    #[error("Command {command} timed out after {}ms", elapsed.as_millis())]
    Timeout {
        command: CommandId,
        elapsed: Duration,
    },
    #[error("command {command} was displaced by a newer call waiting on {event}")]
    Displaced { command: CommandId, event: EventName },
    #[error("command {command} was cancelled by cleanup")]
    Cancelled { command: CommandId },
    #[error("command {command} failed before sending: {source}")]
    Trigger {
        command: CommandId,
        source: TriggerError,
    },
    #[error("malformed {event} payload: {source}")]
    MalformedResponse {
        event: EventName,
        source: serde_json::Error,
    },
}

/// Reason a trigger refused to send its command.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
