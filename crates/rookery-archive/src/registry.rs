//! Backend selection by connection URI.
//!
//! An explicit table mapping URI schemes to store constructors, resolved at
//! process startup. Hosts register additional backends before opening.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::info;

use crate::error::ArchiveError;
use crate::repository::ArchiveRepository;
use crate::store::{ArchiveStore, LibsqlArchiveStore, MemoryArchiveStore};

/// Builds a store from the URI remainder (everything after `scheme:`).
pub type StoreConstructor =
    fn(String) -> BoxFuture<'static, Result<Arc<dyn ArchiveStore>, ArchiveError>>;

/// Archive section of the hosting server's configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Backend URI, e.g. `memory:` or `file:/var/lib/rookery/archive.db`.
    pub uri: String,
}

pub struct BackendRegistry {
    constructors: HashMap<String, StoreConstructor>,
}

impl BackendRegistry {
    /// An empty registry; callers register every scheme themselves.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// The built-in backends: `memory:` and `file:`/`libsql:`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", open_memory);
        registry.register("file", open_libsql);
        registry.register("libsql", open_libsql);
        registry
    }

    pub fn register(&mut self, scheme: &str, constructor: StoreConstructor) {
        self.constructors.insert(scheme.to_string(), constructor);
    }

    /// Resolve the URI scheme and open a repository over the backend.
    pub async fn open(&self, uri: &str) -> Result<ArchiveRepository, ArchiveError> {
        let (scheme, rest) = uri.split_once(':').ok_or_else(|| {
            ArchiveError::Validation(format!("archive uri has no scheme: {}", uri))
        })?;
        let constructor = self
            .constructors
            .get(scheme)
            .ok_or_else(|| ArchiveError::UnsupportedScheme(scheme.to_string()))?;

        let store = constructor(rest.trim_start_matches("//").to_string()).await?;
        info!(scheme, "archive backend opened");
        Ok(ArchiveRepository::new(store))
    }

    /// Open from configuration using the default backend table.
    pub async fn open_config(config: &ArchiveConfig) -> Result<ArchiveRepository, ArchiveError> {
        Self::with_defaults().open(&config.uri).await
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn open_memory(_rest: String) -> BoxFuture<'static, Result<Arc<dyn ArchiveStore>, ArchiveError>> {
    Box::pin(async { Ok(Arc::new(MemoryArchiveStore::new()) as Arc<dyn ArchiveStore>) })
}

fn open_libsql(rest: String) -> BoxFuture<'static, Result<Arc<dyn ArchiveStore>, ArchiveError>> {
    Box::pin(async move {
        let store = LibsqlArchiveStore::open_local(&rest).await?;
        Ok(Arc::new(store) as Arc<dyn ArchiveStore>)
    })
}
