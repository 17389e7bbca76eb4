//! Convenient re-exports of commonly used types from docbench.
//!
//! ```ignore
//! use docbench::prelude::*;
//! ```

pub use docbench_core::{
    client::{StoreClient, StoreClientBuilder, DynStoreClient, Namespace},
    connection::{Connection, Operation},
    error::{AdapterError, AdapterResult, StoreError, StoreResult},
    identifier::Identifier,
    normalize::{normalize, normalize_recursive, NormalizeMode},
    value::{Document, Value},
};

pub use crate::{
    blocking::BlockingConnection,
    config::ModuleConfig,
    error::{ModuleError, ModuleResult},
    module::{MongoModule, DynConnection, MODULE_NAME},
    registry::{HostModule, ModuleRegistry},
};
