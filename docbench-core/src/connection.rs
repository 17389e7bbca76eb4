//! Connection handles and the uniform CRUD dispatch contract.
//!
//! A [`Connection`] wraps an established [`StoreClient`]. Every CRUD entry
//! point follows the same shape:
//!
//! 1. refuse to run if the handle has been closed,
//! 2. resolve the target [`Namespace`],
//! 3. delegate to the collaborator,
//! 4. map any [`StoreError`](crate::error::StoreError) onto
//!    [`AdapterError::Write`] or [`AdapterError::Read`] depending on the
//!    operation.
//!
//! Mutating operations only report success. Outcome counts are logged at
//! debug level.
//!
//! # Example
//!
//! ```ignore
//! use docbench_core::{connection::Connection, value::Document};
//!
//! let conn = Connection::open(MongoClientBuilder::new("mongodb://localhost:27017")).await?;
//!
//! let mut widget = Document::new();
//! widget.insert("name", "a");
//! conn.insert("k6", "widgets", widget).await?;
//!
//! let all = conn.find_all("k6", "widgets").await?;
//! conn.close().await?;
//! ```

use bson::Document as NativeDocument;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, warn};

use crate::{
    client::{Namespace, StoreClient, StoreClientBuilder},
    error::{AdapterError, AdapterResult, StoreError, StoreResult},
    identifier::Identifier,
    normalize::normalize,
    value::Document,
};

/// The CRUD entry points, named as scripts call them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InsertOne,
    InsertMany,
    Upsert,
    FindOne,
    Find,
    FindAll,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::InsertOne => "insertOne",
            Operation::InsertMany => "insertMany",
            Operation::Upsert => "upsert",
            Operation::FindOne => "findOne",
            Operation::Find => "find",
            Operation::FindAll => "findAll",
            Operation::UpdateOne => "updateOne",
            Operation::UpdateMany => "updateMany",
            Operation::DeleteOne => "deleteOne",
            Operation::DeleteMany => "deleteMany",
        }
    }

    /// Whether failures of this operation are reported as write errors.
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::FindOne | Operation::Find | Operation::FindAll)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner<C> {
    client: C,
    closed: AtomicBool,
}

/// A live handle to a store connection.
///
/// Cloning is cheap and every clone shares the same session, so one handle
/// can serve many concurrent callers. The handle keeps no per-operation state.
#[derive(Debug)]
pub struct Connection<C: StoreClient> {
    inner: Arc<Inner<C>>,
}

impl<C: StoreClient> Clone for Connection<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: StoreClient> Connection<C> {
    /// Wraps an already connected client.
    pub fn new(client: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Connects through `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Connection`] if the connection string is
    /// malformed or the handshake fails. No handle is returned in that case.
    pub async fn open<B>(builder: B) -> AdapterResult<Self>
    where
        B: StoreClientBuilder<Client = C>,
    {
        match builder.build().await {
            Ok(client) => {
                debug!(target: "docbench::connection", "Connection established");
                Ok(Self::new(client))
            }
            Err(e) => {
                warn!(target: "docbench::connection", error = %e, "Connection failed");
                Err(AdapterError::Connection(e.to_string()))
            }
        }
    }

    pub fn client(&self) -> &C {
        &self.inner.client
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Releases the underlying session.
    ///
    /// Closing an already closed handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Disconnect`] if the collaborator fails to release the session.
    /// The handle then stays open so the close can be retried.
    pub async fn close(&self) -> AdapterResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!(target: "docbench::connection", "Connection already closed");
            return Ok(());
        }

        self.inner
            .client
            .disconnect()
            .await
            .map_err(|e| {
                self.inner.closed.store(false, Ordering::Release);
                warn!(target: "docbench::connection", error = %e, "Disconnect failed");
                AdapterError::Disconnect(e.to_string())
            })?;

        debug!(target: "docbench::connection", "Connection closed");

        Ok(())
    }

    /// Generates a fresh identifier.
    pub fn new_id(&self) -> Identifier {
        Identifier::generate()
    }

    /// Rewrites identifier markers in `doc`. See [`normalize`].
    pub fn transform_doc(&self, doc: Document) -> AdapterResult<Document> {
        normalize(doc)
    }

    /// Resolves the target namespace, refusing to run on a closed handle.
    fn resolve(&self, operation: Operation, db: &str, coll: &str) -> AdapterResult<Namespace> {
        let namespace = Namespace::new(db, coll);

        if self.is_closed() {
            warn!(
                target: "docbench::dispatch",
                op = %operation,
                db = %namespace.database,
                coll = %namespace.collection,
                "Operation on closed connection"
            );
            return Err(AdapterError::from_store(operation, namespace, StoreError::Closed));
        }

        Ok(namespace)
    }

    /// Maps a collaborator result onto the adapter error taxonomy.
    fn settle<T>(operation: Operation, namespace: Namespace, result: StoreResult<T>) -> AdapterResult<T> {
        result.map_err(|e| {
            warn!(
                target: "docbench::dispatch",
                op = %operation,
                db = %namespace.database,
                coll = %namespace.collection,
                error = %e,
                "Operation failed"
            );
            AdapterError::from_store(operation, namespace, e)
        })
    }

    /// Inserts one document.
    pub async fn insert(&self, db: &str, coll: &str, doc: Document) -> AdapterResult<()> {
        let ns = self.resolve(Operation::InsertOne, db, coll)?;
        let result = self.inner.client.insert_one(&ns, doc.into()).await;
        let outcome = Self::settle(Operation::InsertOne, ns, result)?;

        debug!(target: "docbench::dispatch", op = "insertOne", db, coll, inserted = outcome.inserted.len(), "Operation succeeded");

        Ok(())
    }

    /// Inserts several documents. No cross-document atomicity is provided.
    pub async fn insert_many(&self, db: &str, coll: &str, docs: Vec<Document>) -> AdapterResult<()> {
        let ns = self.resolve(Operation::InsertMany, db, coll)?;
        let result = self
            .inner
            .client
            .insert_many(&ns, docs.into_iter().map(NativeDocument::from).collect())
            .await;
        let outcome = Self::settle(Operation::InsertMany, ns, result)?;

        debug!(target: "docbench::dispatch", op = "insertMany", db, coll, inserted = outcome.inserted.len(), "Operation succeeded");

        Ok(())
    }

    /// Normalizes `doc` and inserts it.
    ///
    /// A malformed identifier marker fails the call before anything is sent.
    pub async fn insert_normalized(&self, db: &str, coll: &str, doc: Document) -> AdapterResult<()> {
        self.insert(db, coll, normalize(doc)?).await
    }

    /// Normalizes every document in `docs` and inserts them.
    pub async fn insert_many_normalized(&self, db: &str, coll: &str, docs: Vec<Document>) -> AdapterResult<()> {
        let docs = docs
            .into_iter()
            .map(normalize)
            .collect::<AdapterResult<Vec<_>>>()?;

        self.insert_many(db, coll, docs).await
    }

    /// Updates the first matching document, inserting one if none matches.
    pub async fn upsert(&self, db: &str, coll: &str, filter: Document, update: Document) -> AdapterResult<()> {
        let ns = self.resolve(Operation::Upsert, db, coll)?;
        let result = self.inner.client.update_one(&ns, filter.into(), update.into(), true).await;
        let outcome = Self::settle(Operation::Upsert, ns, result)?;

        debug!(
            target: "docbench::dispatch",
            op = "upsert",
            db,
            coll,
            matched = outcome.matched,
            modified = outcome.modified,
            upserted = outcome.upserted_id.is_some(),
            "Operation succeeded"
        );

        Ok(())
    }

    /// Returns the first matching document, or `None` when nothing matches.
    pub async fn find_one(&self, db: &str, coll: &str, filter: Document) -> AdapterResult<Option<NativeDocument>> {
        let ns = self.resolve(Operation::FindOne, db, coll)?;
        let result = self.inner.client.find_one(&ns, filter.into()).await;
        Self::settle(Operation::FindOne, ns, result)
    }

    /// Returns every matching document.
    pub async fn find(&self, db: &str, coll: &str, filter: Document) -> AdapterResult<Vec<NativeDocument>> {
        let ns = self.resolve(Operation::Find, db, coll)?;
        let result = self.inner.client.find(&ns, filter.into()).await;
        let docs = Self::settle(Operation::Find, ns, result)?;

        debug!(target: "docbench::dispatch", op = "find", db, coll, returned = docs.len(), "Operation succeeded");

        Ok(docs)
    }

    /// Returns every document in the collection.
    pub async fn find_all(&self, db: &str, coll: &str) -> AdapterResult<Vec<NativeDocument>> {
        let ns = self.resolve(Operation::FindAll, db, coll)?;
        let result = self.inner.client.find(&ns, NativeDocument::new()).await;
        let docs = Self::settle(Operation::FindAll, ns, result)?;

        debug!(target: "docbench::dispatch", op = "findAll", db, coll, returned = docs.len(), "Operation succeeded");

        Ok(docs)
    }

    /// Applies `update` to the first matching document.
    pub async fn update_one(&self, db: &str, coll: &str, filter: Document, update: Document) -> AdapterResult<()> {
        let ns = self.resolve(Operation::UpdateOne, db, coll)?;
        let result = self.inner.client.update_one(&ns, filter.into(), update.into(), false).await;
        let outcome = Self::settle(Operation::UpdateOne, ns, result)?;

        debug!(target: "docbench::dispatch", op = "updateOne", db, coll, matched = outcome.matched, modified = outcome.modified, "Operation succeeded");

        Ok(())
    }

    /// Applies `update` to every matching document.
    pub async fn update_many(&self, db: &str, coll: &str, filter: Document, update: Document) -> AdapterResult<()> {
        let ns = self.resolve(Operation::UpdateMany, db, coll)?;
        let result = self.inner.client.update_many(&ns, filter.into(), update.into(), false).await;
        let outcome = Self::settle(Operation::UpdateMany, ns, result)?;

        debug!(target: "docbench::dispatch", op = "updateMany", db, coll, matched = outcome.matched, modified = outcome.modified, "Operation succeeded");

        Ok(())
    }

    /// Removes the first matching document.
    pub async fn delete_one(&self, db: &str, coll: &str, filter: Document) -> AdapterResult<()> {
        let ns = self.resolve(Operation::DeleteOne, db, coll)?;
        let result = self.inner.client.delete_one(&ns, filter.into()).await;
        let outcome = Self::settle(Operation::DeleteOne, ns, result)?;

        debug!(target: "docbench::dispatch", op = "deleteOne", db, coll, deleted = outcome.deleted, "Operation succeeded");

        Ok(())
    }

    /// Removes every matching document.
    pub async fn delete_many(&self, db: &str, coll: &str, filter: Document) -> AdapterResult<()> {
        let ns = self.resolve(Operation::DeleteMany, db, coll)?;
        let result = self.inner.client.delete_many(&ns, filter.into()).await;
        let outcome = Self::settle(Operation::DeleteMany, ns, result)?;

        debug!(target: "docbench::dispatch", op = "deleteMany", db, coll, deleted = outcome.deleted, "Operation succeeded");

        Ok(())
    }
}
