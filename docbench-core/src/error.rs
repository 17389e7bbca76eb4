//! Error types and result types for adapter operations.
//!
//! Two layers of errors live here:
//!
//! - [`StoreError`] is what a collaborator [`StoreClient`](crate::client::StoreClient)
//!   reports back from a driver call.
//! - [`AdapterError`] is the taxonomy surfaced to scripts. The dispatcher in
//!   [`connection`](crate::connection) maps every [`StoreError`] onto it.
//!
//! No operation in this workspace terminates the process on failure; every
//! failure is returned to the caller, which decides whether to abort.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::client::Namespace;
use crate::connection::Operation;

/// Represents all possible errors surfaced to a script by the adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The connection string was malformed or the initial handshake failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Releasing the underlying session failed.
    #[error("Disconnect error: {0}")]
    Disconnect(String),
    /// An identifier could not be parsed from its hex form.
    #[error("Malformed identifier {input:?}: {reason}")]
    MalformedIdentifier {
        /// The text that failed to parse.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
    /// An insert, update, upsert or delete failed at the collaborator layer.
    #[error("Write error during {operation} on {namespace}: {message}")]
    Write {
        operation: Operation,
        namespace: Namespace,
        message: String,
    },
    /// A find failed at the collaborator layer, including decode failures.
    #[error("Read error during {operation} on {namespace}: {message}")]
    Read {
        operation: Operation,
        namespace: Namespace,
        message: String,
    },
    /// A host value could not be converted into a document.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AdapterError {
    pub(crate) fn malformed_identifier(input: &str, reason: impl Into<String>) -> Self {
        AdapterError::MalformedIdentifier {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Wraps a collaborator failure according to the kind of operation that produced it.
    pub(crate) fn from_store(operation: Operation, namespace: Namespace, err: StoreError) -> Self {
        let message = err.to_string();

        if operation.is_write() {
            AdapterError::Write { operation, namespace, message }
        } else {
            AdapterError::Read { operation, namespace, message }
        }
    }
}

/// A specialized `Result` type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

impl From<BsonError> for AdapterError {
    fn from(err: BsonError) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for AdapterError {
    fn from(err: SerdeJsonError) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}

/// Errors reported by a collaborator store client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The client has already been disconnected.
    #[error("client is closed")]
    Closed,
    /// The driver rejected or failed the call (network, validation, write concern).
    #[error("driver error: {0}")]
    Driver(String),
    /// A returned record could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// A specialized `Result` type for collaborator calls.
pub type StoreResult<T> = Result<T, StoreError>;
