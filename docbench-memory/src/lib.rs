//! In-memory store client for docbench.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! [`StoreClient`](docbench_core::client::StoreClient) trait. It is what
//! `memory://` connection strings resolve to, and it lets the dispatch layer be
//! exercised in tests without a running database.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Implicit namespaces** - Databases and collections appear on first write
//! - **Query subset** - Equality, comparison, membership, `$exists` and logical operators
//! - **Update subset** - `$set`, `$unset` and `$inc`, with upsert support
//!
//! # Quick Start
//!
//! ```ignore
//! use docbench_core::{client::StoreClientBuilder, connection::Connection};
//! use docbench_memory::InMemoryClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = Connection::open(InMemoryClient::builder()).await?;
//!
//!     let mut widget = docbench_core::value::Document::new();
//!     widget.insert("name", "a");
//!     conn.insert("k6", "widgets", widget).await?;
//!
//!     assert_eq!(conn.find_all("k6", "widgets").await?.len(), 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbench_memory;

pub mod store;
pub(crate) mod evaluator;

pub use store::{InMemoryClient, InMemoryClientBuilder};
