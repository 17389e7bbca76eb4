//! The collaborator store client abstraction.
//!
//! The adapter never talks to the network itself. Every CRUD operation is
//! delegated to a [`StoreClient`], which owns the wire protocol, pooling and
//! query execution. Implementations live in their own crates (MongoDB driver,
//! in-memory store) so the dispatch layer can be exercised without a server.
//!
//! # Traits
//!
//! - [`StoreClient`]: the driver calls issued by the dispatcher
//! - [`StoreClientBuilder`]: factory that parses a connection string and
//!   establishes a session

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{fmt, fmt::Debug, sync::Arc};

use crate::error::StoreResult;

/// A database and collection pair, resolved by name per call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Result of an insert call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    /// `_id` values of the inserted documents, in input order.
    pub inserted: Vec<Bson>,
}

/// Result of an update call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    /// Set when an upsert inserted a new document.
    pub upserted_id: Option<Bson>,
}

/// Result of a delete call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOutcome {
    pub deleted: u64,
}

/// Driver calls issued by the CRUD dispatcher.
///
/// Filters and update specifications are passed through untouched; their
/// meaning is entirely up to the store's query language. An empty filter
/// matches every document in the collection.
///
/// Implementations must be safe to call concurrently from many tasks sharing
/// one client.
#[async_trait]
pub trait StoreClient: Send + Sync + Debug {
    /// Inserts a single document.
    async fn insert_one(&self, ns: &Namespace, document: Document) -> StoreResult<InsertOutcome>;

    /// Inserts a batch of documents. Cross-document atomicity is not guaranteed.
    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> StoreResult<InsertOutcome>;

    /// Returns the first document matching `filter`, or `None`.
    async fn find_one(&self, ns: &Namespace, filter: Document) -> StoreResult<Option<Document>>;

    /// Returns every document matching `filter`.
    async fn find(&self, ns: &Namespace, filter: Document) -> StoreResult<Vec<Document>>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// With `upsert` set, a document is inserted when nothing matches.
    async fn update_one(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome>;

    /// Removes the first document matching `filter`.
    async fn delete_one(&self, ns: &Namespace, filter: Document) -> StoreResult<DeleteOutcome>;

    /// Removes every document matching `filter`.
    async fn delete_many(&self, ns: &Namespace, filter: Document) -> StoreResult<DeleteOutcome>;

    /// Releases the underlying session.
    async fn disconnect(&self) -> StoreResult<()>;
}

/// Factory for [`StoreClient`] instances.
///
/// Builders carry the connection string and any options; `build` performs the
/// handshake so that a returned client is known to be connected.
#[async_trait]
pub trait StoreClientBuilder: Send {
    type Client: StoreClient + 'static;

    async fn build(self) -> StoreResult<Self::Client>;
}

macro_rules! forward_store_client {
    ($($target:ty),+ $(,)?) => {$(
        #[async_trait]
        impl<C: StoreClient + ?Sized> StoreClient for $target {
            async fn insert_one(&self, ns: &Namespace, document: Document) -> StoreResult<InsertOutcome> {
                (**self).insert_one(ns, document).await
            }

            async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> StoreResult<InsertOutcome> {
                (**self).insert_many(ns, documents).await
            }

            async fn find_one(&self, ns: &Namespace, filter: Document) -> StoreResult<Option<Document>> {
                (**self).find_one(ns, filter).await
            }

            async fn find(&self, ns: &Namespace, filter: Document) -> StoreResult<Vec<Document>> {
                (**self).find(ns, filter).await
            }

            async fn update_one(
                &self,
                ns: &Namespace,
                filter: Document,
                update: Document,
                upsert: bool,
            ) -> StoreResult<UpdateOutcome> {
                (**self).update_one(ns, filter, update, upsert).await
            }

            async fn update_many(
                &self,
                ns: &Namespace,
                filter: Document,
                update: Document,
                upsert: bool,
            ) -> StoreResult<UpdateOutcome> {
                (**self).update_many(ns, filter, update, upsert).await
            }

            async fn delete_one(&self, ns: &Namespace, filter: Document) -> StoreResult<DeleteOutcome> {
                (**self).delete_one(ns, filter).await
            }

            async fn delete_many(&self, ns: &Namespace, filter: Document) -> StoreResult<DeleteOutcome> {
                (**self).delete_many(ns, filter).await
            }

            async fn disconnect(&self) -> StoreResult<()> {
                (**self).disconnect().await
            }
        }
    )+};
}

forward_store_client!(Box<C>, Arc<C>);

/// A type-erased client, for collaborators selected at runtime.
pub type DynStoreClient = Box<dyn StoreClient>;
