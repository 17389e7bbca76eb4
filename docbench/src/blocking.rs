//! Synchronous connection surface for script hosts.
//!
//! Script callers block until the collaborator finishes the round trip. Each
//! method drives the async dispatcher to completion on the module's runtime,
//! so it must not be called from inside an async context.

use std::{future::Future, sync::Arc};
use bson::Document as NativeDocument;
use tokio::runtime::Runtime;

use docbench_core::{
    error::AdapterResult,
    identifier::Identifier,
    value::Document,
};

use crate::module::DynConnection;

/// A connection handle whose operations block the calling thread.
///
/// Clones share the same session and may be used from many threads at once.
#[derive(Clone)]
pub struct BlockingConnection {
    conn: DynConnection,
    runtime: Arc<Runtime>,
}

impl BlockingConnection {
    pub(crate) fn new(conn: DynConnection, runtime: Arc<Runtime>) -> Self {
        Self { conn, runtime }
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// The async handle behind this connection.
    pub fn as_async(&self) -> &DynConnection {
        &self.conn
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    pub fn close(&self) -> AdapterResult<()> {
        self.block_on(self.conn.close())
    }

    pub fn new_id(&self) -> Identifier {
        self.conn.new_id()
    }

    pub fn transform_doc(&self, doc: Document) -> AdapterResult<Document> {
        self.conn.transform_doc(doc)
    }

    pub fn insert(&self, db: &str, coll: &str, doc: Document) -> AdapterResult<()> {
        self.block_on(self.conn.insert(db, coll, doc))
    }

    pub fn insert_many(&self, db: &str, coll: &str, docs: Vec<Document>) -> AdapterResult<()> {
        self.block_on(self.conn.insert_many(db, coll, docs))
    }

    pub fn insert_normalized(&self, db: &str, coll: &str, doc: Document) -> AdapterResult<()> {
        self.block_on(self.conn.insert_normalized(db, coll, doc))
    }

    pub fn insert_many_normalized(&self, db: &str, coll: &str, docs: Vec<Document>) -> AdapterResult<()> {
        self.block_on(self.conn.insert_many_normalized(db, coll, docs))
    }

    pub fn upsert(&self, db: &str, coll: &str, filter: Document, update: Document) -> AdapterResult<()> {
        self.block_on(self.conn.upsert(db, coll, filter, update))
    }

    pub fn find_one(&self, db: &str, coll: &str, filter: Document) -> AdapterResult<Option<NativeDocument>> {
        self.block_on(self.conn.find_one(db, coll, filter))
    }

    pub fn find(&self, db: &str, coll: &str, filter: Document) -> AdapterResult<Vec<NativeDocument>> {
        self.block_on(self.conn.find(db, coll, filter))
    }

    pub fn find_all(&self, db: &str, coll: &str) -> AdapterResult<Vec<NativeDocument>> {
        self.block_on(self.conn.find_all(db, coll))
    }

    pub fn update_one(&self, db: &str, coll: &str, filter: Document, update: Document) -> AdapterResult<()> {
        self.block_on(self.conn.update_one(db, coll, filter, update))
    }

    pub fn update_many(&self, db: &str, coll: &str, filter: Document, update: Document) -> AdapterResult<()> {
        self.block_on(self.conn.update_many(db, coll, filter, update))
    }

    pub fn delete_one(&self, db: &str, coll: &str, filter: Document) -> AdapterResult<()> {
        self.block_on(self.conn.delete_one(db, coll, filter))
    }

    pub fn delete_many(&self, db: &str, coll: &str, filter: Document) -> AdapterResult<()> {
        self.block_on(self.conn.delete_many(db, coll, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ModuleConfig, module::MongoModule};
    use docbench_core::error::AdapterError;
    use serde_json::json;
    use std::thread;

    fn connect() -> BlockingConnection {
        MongoModule::new(ModuleConfig { worker_threads: Some(2), ..Default::default() })
            .unwrap()
            .connect("memory://")
            .unwrap()
    }

    fn doc(value: serde_json::Value) -> Document {
        Document::from_json(value).unwrap()
    }

    #[test]
    fn test_insert_then_find_all() {
        let conn = connect();

        conn.insert("k6", "widgets", doc(json!({ "name": "a" }))).unwrap();

        let all = conn.find_all("k6", "widgets").unwrap();
        assert!(all.iter().any(|d| d.get_str("name").ok() == Some("a")));
    }

    #[test]
    fn test_crud_round_trip() {
        let conn = connect();

        conn.insert_many("k6", "w", vec![
            doc(json!({ "name": "k6", "n": 1 })),
            doc(json!({ "name": "k6", "n": 2 })),
            doc(json!({ "name": "other", "n": 3 })),
        ])
        .unwrap();

        assert_eq!(conn.find("k6", "w", doc(json!({ "name": "k6" }))).unwrap().len(), 2);

        conn.update_one("k6", "w", doc(json!({ "n": 1 })), doc(json!({ "$set": { "seen": true } }))).unwrap();
        conn.update_many("k6", "w", doc(json!({ "name": "k6" })), doc(json!({ "$inc": { "n": 10 } }))).unwrap();

        let first = conn.find_one("k6", "w", doc(json!({ "seen": true }))).unwrap().unwrap();
        assert_eq!(first.get_i64("n").unwrap(), 11);

        conn.upsert("k6", "w", doc(json!({ "name": "new" })), doc(json!({ "$set": { "n": 0 } }))).unwrap();
        assert!(conn.find_one("k6", "w", doc(json!({ "name": "new" }))).unwrap().is_some());

        conn.delete_one("k6", "w", doc(json!({ "name": "k6" }))).unwrap();
        conn.delete_many("k6", "w", doc(json!({}))).unwrap();
        assert!(conn.find_all("k6", "w").unwrap().is_empty());
    }

    #[test]
    fn test_find_one_without_match_is_none() {
        let conn = connect();

        assert_eq!(conn.find_one("k6", "w", doc(json!({ "name": "missing" }))).unwrap(), None);
    }

    #[test]
    fn test_identifiers_survive_insert() {
        let conn = connect();
        let id = conn.new_id();

        let mut widget = Document::new();
        widget.insert("ref_id", id);
        conn.insert("k6", "w", widget).unwrap();

        conn.insert_normalized("k6", "w", doc(json!({ "owner": { "$oid": "507f1f77bcf86cd799439011" } }))).unwrap();

        let all = conn.find_all("k6", "w").unwrap();
        assert_eq!(all[0].get_object_id("ref_id").unwrap(), id.as_object_id());
        assert_eq!(all[1].get_object_id("owner").unwrap().to_hex(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn test_insert_after_close_is_write_error() {
        let conn = connect();
        conn.close().unwrap();

        let err = conn.insert("k6", "widgets", doc(json!({ "name": "a" }))).unwrap_err();

        assert!(matches!(err, AdapterError::Write { .. }));
        assert!(conn.is_closed());
        conn.close().unwrap();
    }

    #[test]
    fn test_invalid_update_is_write_error_not_panic() {
        let conn = connect();
        conn.insert("k6", "w", doc(json!({ "n": 1 }))).unwrap();

        let err = conn.update_one("k6", "w", doc(json!({})), doc(json!({ "n": 2 }))).unwrap_err();
        assert!(matches!(err, AdapterError::Write { .. }));

        let err = conn.find("k6", "w", doc(json!({ "n": { "$bogus": 1 } }))).unwrap_err();
        assert!(matches!(err, AdapterError::Read { .. }));
    }

    #[test]
    fn test_shared_handle_across_threads() {
        let conn = connect();

        let handles = (0..4)
            .map(|i| {
                let conn = conn.clone();
                thread::spawn(move || {
                    for j in 0..5 {
                        conn.insert("k6", "w", doc(json!({ "worker": i, "n": j }))).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(conn.find_all("k6", "w").unwrap().len(), 20);
    }
}
