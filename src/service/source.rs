//! Where codestreams come from.
//!
//! A [`CodestreamSource`] turns a target name into a geometry model and the
//! store that answers byte queries about it. Layouts are read from JSON
//! files on disk or, in tests, held in memory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::codestream::{Codestream, CodestreamLayout};
use crate::error::{GeometryError, ServiceError};
use crate::source::{CodestreamStore, ModelStore, PacketIndex};

/// An opened codestream: its geometry model and the store answering byte
/// queries about it.
pub struct OpenCodestream<T> {
    pub codestream: Arc<Codestream>,
    pub store: Arc<T>,
}

impl<T> Clone for OpenCodestream<T> {
    fn clone(&self) -> Self {
        Self {
            codestream: Arc::clone(&self.codestream),
            store: Arc::clone(&self.store),
        }
    }
}

/// Opens codestreams by target name.
///
/// Keeps the registry independent of where codestream descriptions live.
#[async_trait]
pub trait CodestreamSource: Send + Sync {
    /// Store type this source pairs with each codestream.
    type Store: CodestreamStore + PacketIndex + 'static;

    async fn open(&self, target: &str) -> Result<OpenCodestream<Self::Store>, ServiceError>;
}

fn open_layout(target: &str, layout: &CodestreamLayout) -> Result<OpenCodestream<ModelStore>, ServiceError> {
    let invalid = |e: GeometryError| ServiceError::InvalidLayout {
        target: target.to_string(),
        message: e.to_string(),
    };
    let codestream = Arc::new(Codestream::from_layout(layout).map_err(invalid)?);
    let store = ModelStore::new(Arc::clone(&codestream)).map_err(invalid)?;
    Ok(OpenCodestream {
        store: Arc::new(store),
        codestream,
    })
}

// =============================================================================
// Layout Files
// =============================================================================

/// Reads `<root>/<target>.json` codestream layouts from disk and serves them
/// through the rate model store.
#[derive(Debug, Clone)]
pub struct LayoutSource {
    root: PathBuf,
}

impl LayoutSource {
    /// Serve the layouts found under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a target's layout file. Targets may already name the file.
    pub fn path_for(&self, target: &str) -> PathBuf {
        let path = self.root.join(target);
        if path.extension().is_some_and(|ext| ext == "json") {
            path
        } else {
            self.root.join(format!("{target}.json"))
        }
    }
}

#[async_trait]
impl CodestreamSource for LayoutSource {
    type Store = ModelStore;

    async fn open(&self, target: &str) -> Result<OpenCodestream<ModelStore>, ServiceError> {
        let path = self.path_for(target);
        debug!(target, path = %path.display(), "Reading codestream layout");

        let json = tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ServiceError::CodestreamNotFound {
                target: target.to_string(),
            },
            _ => ServiceError::InvalidLayout {
                target: target.to_string(),
                message: e.to_string(),
            },
        })?;
        let layout = CodestreamLayout::from_json(&json).map_err(|e| ServiceError::InvalidLayout {
            target: target.to_string(),
            message: e.to_string(),
        })?;
        open_layout(target, &layout)
    }
}

// =============================================================================
// In-memory Layouts
// =============================================================================

/// Layouts registered in memory, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    layouts: HashMap<String, CodestreamLayout>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, target: impl Into<String>, layout: CodestreamLayout) -> Self {
        self.layouts.insert(target.into(), layout);
        self
    }

    /// Add or replace a target.
    pub fn insert(&mut self, target: impl Into<String>, layout: CodestreamLayout) {
        self.layouts.insert(target.into(), layout);
    }
}

#[async_trait]
impl CodestreamSource for MemorySource {
    type Store = ModelStore;

    async fn open(&self, target: &str) -> Result<OpenCodestream<ModelStore>, ServiceError> {
        let layout = self
            .layouts
            .get(target)
            .ok_or_else(|| ServiceError::CodestreamNotFound {
                target: target.to_string(),
            })?;
        open_layout(target, layout)
    }
}
