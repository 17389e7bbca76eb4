//! In-memory collaborator implementation.
//!
//! Documents are kept as BSON in per-namespace vectors behind an async-aware
//! read-write lock. Databases and collections are created on first write,
//! matching the implicit creation of the real store.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::debug;

use docbench_core::{
    client::{DeleteOutcome, InsertOutcome, Namespace, StoreClient, StoreClientBuilder, UpdateOutcome},
    error::{StoreError, StoreResult},
};

use crate::evaluator::{DocumentEvaluator, apply_update, upsert_seed};

type StoreMap = HashMap<Namespace, Vec<Document>>;


/// Thread-safe in-memory store client.
///
/// `InMemoryClient` is cloneable and every clone shares the same data, so a
/// test can keep a clone around to inspect what a connection wrote. After
/// [`disconnect`](StoreClient::disconnect) every call fails with
/// [`StoreError::Closed`], on every clone.
///
/// Queries scan the whole collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docbench_memory::InMemoryClient;
/// use docbench_core::client::{Namespace, StoreClient};
/// use bson::doc;
///
/// let client = InMemoryClient::new();
/// let ns = Namespace::new("k6", "widgets");
///
/// client.insert_one(&ns, doc! { "name": "a" }).await?;
/// assert_eq!(client.find(&ns, doc! {}).await?.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryClient {
    store: Arc<RwLock<StoreMap>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryClientBuilder {
        InMemoryClientBuilder::default()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        Ok(())
    }

    /// Assigns an `_id` if missing, placing it first as the driver does.
    fn prepare_document(document: Document) -> (Bson, Document) {
        if let Some(id) = document.get("_id") {
            return (id.clone(), document);
        }

        let id = Bson::ObjectId(ObjectId::new());
        let mut prepared = Document::new();
        prepared.insert("_id", id.clone());
        for (key, value) in document {
            prepared.insert(key, value);
        }

        (id, prepared)
    }

    fn insert_into(collection: &mut Vec<Document>, ns: &Namespace, document: Document) -> StoreResult<Bson> {
        let (id, document) = Self::prepare_document(document);

        if collection.iter().any(|existing| existing.get("_id") == Some(&id)) {
            return Err(StoreError::Driver(format!("E11000 duplicate key error collection: {ns} dup key: {{ _id: {id} }}")));
        }

        collection.push(document);

        Ok(id)
    }

    /// Indexes of the documents in `collection` matching `filter`.
    fn matching(collection: &[Document], filter: &Document, limit: Option<usize>) -> StoreResult<Vec<usize>> {
        let mut indexes = Vec::new();

        for (index, document) in collection.iter().enumerate() {
            if limit.is_some_and(|limit| indexes.len() >= limit) {
                break;
            }

            if DocumentEvaluator::new(document).matches(filter)? {
                indexes.push(index);
            }
        }

        Ok(indexes)
    }

    async fn update(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        upsert: bool,
        limit: Option<usize>,
    ) -> StoreResult<UpdateOutcome> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let collection = store.entry(ns.clone()).or_default();
        let indexes = Self::matching(collection, &filter, limit)?;

        if indexes.is_empty() && upsert {
            let mut seed = upsert_seed(&filter)?;
            apply_update(&mut seed, &update)?;
            let id = Self::insert_into(collection, ns, seed)?;

            return Ok(UpdateOutcome {
                matched: 0,
                modified: 0,
                upserted_id: Some(id),
            });
        }

        let mut modified = 0;
        for index in &indexes {
            let mut candidate = collection[*index].clone();
            if apply_update(&mut candidate, &update)? {
                collection[*index] = candidate;
                modified += 1;
            }
        }

        Ok(UpdateOutcome {
            matched: indexes.len() as u64,
            modified,
            upserted_id: None,
        })
    }

    async fn delete(&self, ns: &Namespace, filter: Document, limit: Option<usize>) -> StoreResult<DeleteOutcome> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let Some(collection) = store.get_mut(ns) else {
            return Ok(DeleteOutcome::default());
        };

        let indexes = Self::matching(collection, &filter, limit)?;
        for index in indexes.iter().rev() {
            collection.remove(*index);
        }

        Ok(DeleteOutcome { deleted: indexes.len() as u64 })
    }
}


#[async_trait]
impl StoreClient for InMemoryClient {
    async fn insert_one(&self, ns: &Namespace, document: Document) -> StoreResult<InsertOutcome> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let id = Self::insert_into(store.entry(ns.clone()).or_default(), ns, document)?;

        Ok(InsertOutcome { inserted: vec![id] })
    }

    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> StoreResult<InsertOutcome> {
        self.ensure_open()?;

        if documents.is_empty() {
            return Err(StoreError::Driver("documents must not be empty".into()));
        }

        let mut store = self.store.write().await;
        let collection = store.entry(ns.clone()).or_default();

        // Ordered insert: documents before a failure stay inserted
        let mut inserted = Vec::with_capacity(documents.len());
        for document in documents {
            inserted.push(Self::insert_into(collection, ns, document)?);
        }

        Ok(InsertOutcome { inserted })
    }

    async fn find_one(&self, ns: &Namespace, filter: Document) -> StoreResult<Option<Document>> {
        self.ensure_open()?;

        let store = self.store.read().await;
        let Some(collection) = store.get(ns) else {
            return Ok(None);
        };

        Ok(
            Self::matching(collection, &filter, Some(1))?
                .first()
                .map(|index| collection[*index].clone())
        )
    }

    async fn find(&self, ns: &Namespace, filter: Document) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;

        let store = self.store.read().await;
        let Some(collection) = store.get(ns) else {
            return Ok(vec![]);
        };

        Ok(
            Self::matching(collection, &filter, None)?
                .into_iter()
                .map(|index| collection[index].clone())
                .collect()
        )
    }

    async fn update_one(&self, ns: &Namespace, filter: Document, update: Document, upsert: bool) -> StoreResult<UpdateOutcome> {
        self.update(ns, filter, update, upsert, Some(1)).await
    }

    async fn update_many(&self, ns: &Namespace, filter: Document, update: Document, upsert: bool) -> StoreResult<UpdateOutcome> {
        self.update(ns, filter, update, upsert, None).await
    }

    async fn delete_one(&self, ns: &Namespace, filter: Document) -> StoreResult<DeleteOutcome> {
        self.delete(ns, filter, Some(1)).await
    }

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> StoreResult<DeleteOutcome> {
        self.delete(ns, filter, None).await
    }

    async fn disconnect(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Closed);
        }

        debug!(target: "docbench::memory", "In-memory client disconnected");

        Ok(())
    }
}


/// Builder for [`InMemoryClient`] instances.
///
/// Each build yields an isolated, empty store unless seeded with documents.
#[derive(Default)]
pub struct InMemoryClientBuilder {
    seed: Vec<(Namespace, Document)>,
}

impl InMemoryClientBuilder {
    /// Preloads a document into `ns`.
    pub fn with_document(mut self, ns: Namespace, document: Document) -> Self {
        self.seed.push((ns, document));
        self
    }
}

#[async_trait]
impl StoreClientBuilder for InMemoryClientBuilder {
    type Client = InMemoryClient;

    async fn build(self) -> StoreResult<Self::Client> {
        let client = InMemoryClient::new();

        {
            let mut store = client.store.write().await;
            for (ns, document) in self.seed {
                InMemoryClient::insert_into(store.entry(ns.clone()).or_default(), &ns, document)?;
            }
        }

        Ok(client)
    }
}
