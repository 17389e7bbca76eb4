//! MongoDB store client for docbench.
//!
//! This crate implements [`StoreClient`](docbench_core::client::StoreClient)
//! over the official async MongoDB driver. The driver owns the wire protocol,
//! connection pooling, retries and authentication; this crate only resolves
//! namespaces and issues the matching driver call.
//!
//! To use this client through the facade, enable the `mongodb` feature (on by
//! default):
//!
//! ```toml
//! [dependencies]
//! docbench = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docbench_core::connection::Connection;
//! use docbench_mongodb::MongoClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = Connection::open(MongoClient::builder("mongodb://localhost:27017")).await?;
//!
//!     let widgets = conn.find_all("k6", "widgets").await?;
//!     conn.close().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbench_mongodb;

pub mod store;

pub use store::{MongoClient, MongoClientBuilder, DEFAULT_APP_NAME};
