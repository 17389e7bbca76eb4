//! The `k6/x/mongodb` host module.
//!
//! [`MongoModule`] is the capability object a host registers. It owns the
//! runtime that drives every blocking call and opens connections by scheme:
//!
//! | Scheme | Collaborator |
//! |---|---|
//! | `mongodb://`, `mongodb+srv://` | MongoDB driver (feature `mongodb`) |
//! | `memory://` | in-memory store, fresh per connection |
//!
//! Any other connection string fails with
//! [`AdapterError::Connection`](docbench_core::error::AdapterError::Connection).

use async_trait::async_trait;
use std::{any::Any, sync::Arc};
use tokio::runtime::Runtime;
use tracing::debug;

use docbench_core::{
    client::{DynStoreClient, StoreClientBuilder},
    connection::Connection,
    error::{AdapterError, AdapterResult, StoreResult},
    identifier::Identifier,
    normalize::normalize,
    value::Document,
};
use docbench_memory::InMemoryClient;

use crate::{
    blocking::BlockingConnection,
    config::ModuleConfig,
    error::ModuleResult,
    registry::HostModule,
};

/// Import path scripts use for this module.
pub const MODULE_NAME: &str = "k6/x/mongodb";

/// Connection string scheme for the in-memory store.
pub const MEMORY_SCHEME: &str = "memory";

/// A type-erased connection, whichever collaborator backs it.
pub type DynConnection = Connection<DynStoreClient>;

/// Opens a connection, selecting the collaborator from the URI scheme.
///
/// # Errors
///
/// Returns [`AdapterError::Connection`] for unknown schemes, malformed
/// connection strings and failed handshakes.
pub async fn open_connection(uri: &str, config: &ModuleConfig) -> AdapterResult<DynConnection> {
    let scheme = uri
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| AdapterError::Connection(format!("missing scheme in connection string {uri:?}")))?;

    let conn = match scheme {
        MEMORY_SCHEME => Connection::open(boxed(InMemoryClient::builder())).await?,
        #[cfg(feature = "mongodb")]
        "mongodb" | "mongodb+srv" => {
            let mut builder = docbench_mongodb::MongoClient::builder(uri);
            if let Some(name) = &config.app_name {
                builder = builder.app_name(name.clone());
            }
            Connection::open(boxed(builder)).await?
        }
        other => {
            return Err(AdapterError::Connection(format!("unsupported connection scheme {other:?}")));
        }
    };

    debug!(target: "docbench::module", scheme, "Connection opened");

    #[cfg(not(feature = "mongodb"))]
    let _ = config;

    Ok(conn)
}

/// Adapts a concrete builder into one producing a [`DynStoreClient`].
fn boxed<B>(builder: B) -> BoxedBuilder<B> {
    BoxedBuilder(builder)
}

struct BoxedBuilder<B>(B);

#[async_trait]
impl<B: StoreClientBuilder> StoreClientBuilder for BoxedBuilder<B> {
    type Client = DynStoreClient;

    async fn build(self) -> StoreResult<Self::Client> {
        let client: DynStoreClient = Box::new(self.0.build().await?);
        Ok(client)
    }
}

/// The capability object registered with the host.
pub struct MongoModule {
    config: ModuleConfig,
    runtime: Arc<Runtime>,
}

impl MongoModule {
    /// Creates the module and starts its runtime.
    pub fn new(config: ModuleConfig) -> ModuleResult<Self> {
        let runtime = Arc::new(config.build_runtime()?);

        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Connects to the store at `uri`, blocking until the handshake completes.
    pub fn connect(&self, uri: &str) -> AdapterResult<BlockingConnection> {
        let conn = self.runtime.block_on(open_connection(uri, &self.config))?;

        Ok(BlockingConnection::new(conn, Arc::clone(&self.runtime)))
    }

    /// Generates a fresh identifier.
    pub fn new_id(&self) -> Identifier {
        Identifier::generate()
    }

    /// Parses an identifier from its hex form.
    pub fn id_from_hex(&self, hex: &str) -> AdapterResult<Identifier> {
        Identifier::parse(hex)
    }

    /// Converts a host value into a document and rewrites identifier markers.
    pub fn transform_doc(&self, value: serde_json::Value) -> AdapterResult<Document> {
        normalize(Document::from_json(value)?)
    }
}

impl HostModule for MongoModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleRegistry;
    use serde_json::json;

    fn module() -> MongoModule {
        MongoModule::new(ModuleConfig { worker_threads: Some(1), ..Default::default() }).unwrap()
    }

    #[test]
    fn test_registers_under_module_name() {
        let mut registry = ModuleRegistry::new();
        registry.register(module()).unwrap();

        assert!(registry.get::<MongoModule>(MODULE_NAME).is_some());
        assert!(registry.register(module()).is_err());
    }

    #[test]
    fn test_invalid_uri_returns_connection_error() {
        let module = module();

        for uri in ["not-a-valid-uri", "postgres://localhost/db", ""] {
            assert!(matches!(module.connect(uri), Err(AdapterError::Connection(_))));
        }
    }

    #[cfg(feature = "mongodb")]
    #[test]
    fn test_malformed_mongodb_uri_returns_connection_error() {
        assert!(matches!(module().connect("mongodb://"), Err(AdapterError::Connection(_))));
    }

    #[test]
    fn test_memory_connections_are_isolated() {
        let module = module();
        let first = module.connect("memory://").unwrap();
        let second = module.connect("memory://").unwrap();

        first.insert("k6", "widgets", Document::from_json(json!({ "name": "a" })).unwrap()).unwrap();

        assert_eq!(first.find_all("k6", "widgets").unwrap().len(), 1);
        assert!(second.find_all("k6", "widgets").unwrap().is_empty());
    }

    #[test]
    fn test_transform_doc_and_ids() {
        let module = module();

        let doc = module
            .transform_doc(json!({ "owner": { "$oid": "507f1f77bcf86cd799439011" } }))
            .unwrap();
        assert_eq!(
            doc.get("owner").and_then(|v| v.as_identifier()).map(Identifier::to_hex).as_deref(),
            Some("507f1f77bcf86cd799439011")
        );

        assert!(matches!(
            module.transform_doc(json!({ "owner": { "$oid": "bad" } })),
            Err(AdapterError::MalformedIdentifier { .. })
        ));
        assert!(matches!(module.transform_doc(json!("text")), Err(AdapterError::Serialization(_))));

        let ordered = module.transform_doc(json!({ "z": 1, "a": 2, "m": 3 })).unwrap();
        assert_eq!(ordered.keys().map(String::as_str).collect::<Vec<_>>(), vec!["z", "a", "m"]);

        let id = module.new_id();
        assert_eq!(module.id_from_hex(&id.to_hex()).unwrap(), id);
    }
}
