//! Core of the docbench document-store adapter.
//!
//! This crate holds everything with decision logic in it:
//!
//! - **Identifiers** ([`identifier`]) - Generation and strict parsing of the store's 12-byte ids
//! - **Values** ([`value`]) - The tagged union used for script documents, and its JSON bridge
//! - **Normalization** ([`normalize`]) - Rewriting of `{"$oid": ...}` markers into identifiers
//! - **Collaborator seam** ([`client`]) - The [`StoreClient`](client::StoreClient) trait implemented by drivers
//! - **Connections** ([`connection`]) - Handles, lifecycle and the uniform CRUD dispatch contract
//! - **Error handling** ([`error`]) - The error taxonomy surfaced to scripts
//!
//! # Example
//!
//! ```ignore
//! use docbench_core::{connection::Connection, normalize::normalize, value::Document};
//!
//! let conn = Connection::open(builder).await?;
//!
//! let doc = Document::from_json(serde_json::json!({
//!     "name": "k6",
//!     "owner": { "$oid": "507f1f77bcf86cd799439011" },
//! }))?;
//!
//! conn.insert("k6", "widgets", normalize(doc)?).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbench_core;

pub mod client;
pub mod connection;
pub mod error;
pub mod identifier;
pub mod normalize;
pub mod value;
