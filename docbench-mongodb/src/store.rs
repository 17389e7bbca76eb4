use std::time::Duration;
use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind},
    options::ClientOptions,
};
use tracing::debug;
use docbench_core::{
    client::{DeleteOutcome, InsertOutcome, Namespace, StoreClient, StoreClientBuilder, UpdateOutcome},
    error::{StoreError, StoreResult},
};

/// Application name reported to the server unless the connection string sets one.
pub const DEFAULT_APP_NAME: &str = "docbench";

fn driver_error(err: MongoError) -> StoreError {
    match *err.kind {
        ErrorKind::BsonDeserialization(_) => StoreError::Decode(err.to_string()),
        _ => StoreError::Driver(err.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct MongoClient {
    client: Client,
}

impl MongoClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn builder(uri: &str) -> MongoClientBuilder {
        MongoClientBuilder::new(uri)
    }

    fn get_collection(&self, ns: &Namespace) -> MongoCollection<Document> {
        self.client
            .database(&ns.database)
            .collection(&ns.collection)
    }
}

#[async_trait]
impl StoreClient for MongoClient {
    async fn insert_one(&self, ns: &Namespace, document: Document) -> StoreResult<InsertOutcome> {
        let result = self.get_collection(ns)
            .insert_one(document)
            .await
            .map_err(driver_error)?;

        Ok(InsertOutcome { inserted: vec![result.inserted_id] })
    }

    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> StoreResult<InsertOutcome> {
        let mut inserted = self.get_collection(ns)
            .insert_many(documents)
            .await
            .map_err(driver_error)?
            .inserted_ids
            .into_iter()
            .collect::<Vec<_>>();

        inserted.sort_by_key(|(index, _)| *index);

        Ok(InsertOutcome {
            inserted: inserted.into_iter().map(|(_, id)| id).collect(),
        })
    }

    async fn find_one(&self, ns: &Namespace, filter: Document) -> StoreResult<Option<Document>> {
        self.get_collection(ns)
            .find_one(filter)
            .await
            .map_err(driver_error)
    }

    async fn find(&self, ns: &Namespace, filter: Document) -> StoreResult<Vec<Document>> {
        self.get_collection(ns)
            .find(filter)
            .await
            .map_err(driver_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(driver_error)
    }

    async fn update_one(&self, ns: &Namespace, filter: Document, update: Document, upsert: bool) -> StoreResult<UpdateOutcome> {
        let result = self.get_collection(ns)
            .update_one(filter, update)
            .upsert(upsert)
            .await
            .map_err(driver_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(&self, ns: &Namespace, filter: Document, update: Document, upsert: bool) -> StoreResult<UpdateOutcome> {
        let result = self.get_collection(ns)
            .update_many(filter, update)
            .upsert(upsert)
            .await
            .map_err(driver_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_one(&self, ns: &Namespace, filter: Document) -> StoreResult<DeleteOutcome> {
        let result = self.get_collection(ns)
            .delete_one(filter)
            .await
            .map_err(driver_error)?;

        Ok(DeleteOutcome { deleted: result.deleted_count })
    }

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> StoreResult<DeleteOutcome> {
        let result = self.get_collection(ns)
            .delete_many(filter)
            .await
            .map_err(driver_error)?;

        Ok(DeleteOutcome { deleted: result.deleted_count })
    }

    async fn disconnect(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Builds a [`MongoClient`] from a connection string.
///
/// Hosts, credentials and driver options (pool sizes, timeouts, TLS) all
/// travel in the connection string. By default `build` pings the server so a
/// returned client is known to be reachable.
pub struct MongoClientBuilder {
    uri: String,
    app_name: Option<String>,
    server_selection_timeout: Option<Duration>,
    handshake: bool,
}

impl MongoClientBuilder {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            app_name: None,
            server_selection_timeout: None,
            handshake: true,
        }
    }

    /// Overrides the application name reported to the server.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Bounds how long the handshake waits for a suitable server.
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }

    /// Skips the initial ping. The driver then connects lazily on first use.
    pub fn handshake(mut self, enabled: bool) -> Self {
        self.handshake = enabled;
        self
    }

    async fn options(&self) -> StoreResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| StoreError::Driver(format!("invalid connection string: {e}")))?;

        if let Some(name) = &self.app_name {
            options.app_name = Some(name.clone());
        } else if options.app_name.is_none() {
            options.app_name = Some(DEFAULT_APP_NAME.to_string());
        }

        if let Some(timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(timeout);
        }

        Ok(options)
    }
}

#[async_trait]
impl StoreClientBuilder for MongoClientBuilder {
    type Client = MongoClient;

    async fn build(self) -> StoreResult<Self::Client> {
        let client = Client::with_options(self.options().await?)
            .map_err(driver_error)?;

        if self.handshake {
            client
                .database("admin")
                .run_command(doc! { "ping": 1 })
                .await
                .map_err(driver_error)?;

            debug!(target: "docbench::mongodb", "Handshake succeeded");
        }

        Ok(MongoClient::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_options_apply_defaults_and_overrides() {
        let options = MongoClient::builder("mongodb://localhost:27017").options().await.unwrap();
        assert_eq!(options.app_name.as_deref(), Some(DEFAULT_APP_NAME));

        let options = MongoClient::builder("mongodb://localhost:27017/?appName=fromuri")
            .options()
            .await
            .unwrap();
        assert_eq!(options.app_name.as_deref(), Some("fromuri"));

        let options = MongoClient::builder("mongodb://localhost:27017/?appName=fromuri")
            .app_name("explicit")
            .server_selection_timeout(Duration::from_millis(250))
            .options()
            .await
            .unwrap();
        assert_eq!(options.app_name.as_deref(), Some("explicit"));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_malformed_uri_fails_to_build() {
        for uri in ["not-a-valid-uri", "mongodb://", "http://localhost:27017"] {
            let err = MongoClient::builder(uri).build().await.unwrap_err();
            assert!(matches!(err, StoreError::Driver(ref msg) if msg.starts_with("invalid connection string")));
        }
    }

    #[tokio::test]
    async fn test_build_without_handshake_is_lazy() {
        let client = MongoClient::builder("mongodb://127.0.0.1:1")
            .handshake(false)
            .build()
            .await;

        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_handshake() {
        let err = MongoClient::builder("mongodb://127.0.0.1:1")
            .server_selection_timeout(Duration::from_millis(200))
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Driver(_)));
    }
}
