//! Shared store handle.

use std::sync::Arc;

use crate::config::SchemaConfig;
use crate::store::{RbacStore, StoreResult, StoreTransaction};

/// The store together with the schema every unit of work runs against.
#[derive(Clone)]
pub(crate) struct Backend {
    store: Arc<dyn RbacStore>,
    schema: Arc<SchemaConfig>,
}

impl Backend {
    pub(crate) fn new(store: Arc<dyn RbacStore>, schema: SchemaConfig) -> Self {
        Self {
            store,
            schema: Arc::new(schema),
        }
    }

    /// Open a unit of work.
    pub(crate) async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        self.store.begin(&self.schema).await
    }

    /// Open a unit of work for a mutation.
    pub(crate) async fn begin_write(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        self.store.begin_write(&self.schema).await
    }

    pub(crate) fn schema(&self) -> &SchemaConfig {
        &self.schema
    }
}
