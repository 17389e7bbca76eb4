//! Scripted load-test access to document stores.
//!
//! This crate is the entry point a script host embeds. It exposes the
//! `k6/x/mongodb` module, whose connections forward CRUD calls to a store
//! client and translate failures into the typed errors scripts observe.
//!
//! # Features
//!
//! - **Scheme dispatch** - `mongodb://` and `mongodb+srv://` reach the MongoDB driver, `memory://` opens an in-process store
//! - **Blocking surface** - Script threads call [`BlockingConnection`] methods and wait for the round trip
//! - **Identifier markers** - `{"$oid": "<hex>"}` values are rewritten into native identifiers before insertion
//! - **Typed errors** - Every failure is a [`AdapterError`](prelude::AdapterError), never a panic
//!
//! # Quick Start
//!
//! ```ignore
//! use docbench::prelude::*;
//! use serde_json::json;
//!
//! let mut registry = ModuleRegistry::new();
//! registry.register(MongoModule::new(ModuleConfig::default())?)?;
//!
//! let module = registry.get::<MongoModule>(MODULE_NAME).unwrap();
//! let conn = module.connect("memory://")?;
//!
//! let doc = module.transform_doc(json!({
//!     "name": "k6",
//!     "owner": { "$oid": "507f1f77bcf86cd799439011" },
//! }))?;
//!
//! conn.insert("k6", "widgets", doc)?;
//! let widgets = conn.find_all("k6", "widgets")?;
//!
//! conn.close()?;
//! ```
//!
//! # Async Use
//!
//! Hosts that already run inside a tokio runtime should skip the blocking
//! surface and use [`open_connection`](module::open_connection) directly:
//!
//! ```ignore
//! use docbench::{module::open_connection, config::ModuleConfig};
//!
//! let conn = open_connection("mongodb://localhost:27017", &ModuleConfig::default()).await?;
//! let found = conn.find_one("k6", "widgets", filter).await?;
//! ```
//!
//! # Collaborators
//!
//! - [`memory`] - In-process store for development and testing
//! - [`mongodb`] - MongoDB driver (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docbench;

pub mod blocking;
pub mod config;
pub mod error;
pub mod module;
pub mod prelude;
pub mod registry;

pub use blocking::BlockingConnection;

pub use bson;

pub use docbench_core::{client, connection, identifier, normalize, value};

/// Errors surfaced by connections and codecs.
pub mod adapter_error {
    pub use docbench_core::error::*;
}

pub mod memory {
    pub use docbench_memory::{InMemoryClient, InMemoryClientBuilder};
}

#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbench_mongodb::{MongoClient, MongoClientBuilder, DEFAULT_APP_NAME};
}
