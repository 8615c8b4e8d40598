use serde::Serialize;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The record cannot be framed; retrying will not help.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connect,
    BrokenChannel,
    Serialization,
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::Transport(TransportError::Connect { .. }) => ErrorKind::Connect,
            DeliveryError::Transport(TransportError::BrokenChannel(_)) => ErrorKind::BrokenChannel,
            DeliveryError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

impl Serialize for DeliveryError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("DeliveryError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result of delivering one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub accepted: bool,
    pub attempts_made: u32,
    pub error: Option<DeliveryError>,
}

impl DeliveryOutcome {
    pub fn accepted(attempts_made: u32) -> Self {
        Self {
            accepted: true,
            attempts_made,
            error: None,
        }
    }

    pub fn rejected(attempts_made: u32, error: DeliveryError) -> Self {
        Self {
            accepted: false,
            attempts_made,
            error: Some(error),
        }
    }
}

/// Per-record outcomes of a multi-record send, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub sent: usize,
    pub failed: usize,
    /// Number of chunks the records were partitioned into
    pub chunks: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl BatchResult {
    pub fn push(&mut self, outcome: DeliveryOutcome) {
        if outcome.accepted {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Append another chunk's result, keeping order.
    pub fn merge(&mut self, other: BatchResult) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.chunks += other.chunks;
        self.outcomes.extend(other.outcomes);
    }

    /// Indexes of records that were not accepted.
    pub fn failed_indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| !outcome.accepted)
            .map(|(index, _)| index)
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}
