//! Shared handle to the currently published model

use std::sync::{Arc, RwLock};

use crate::model::artifact::{ArtifactStore, TrainedModel};
use crate::{FootyError, Result};

/// Holds the published model; readers get a cheap `Arc` clone
#[derive(Debug)]
pub struct ModelRegistry {
    store: ArtifactStore,
    current: RwLock<Option<Arc<TrainedModel>>>,
}

impl ModelRegistry {
    pub fn new(store: ArtifactStore) -> Self {
        ModelRegistry {
            store,
            current: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// The published model, if any has been loaded or published
    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The published model, loading it from the artifact store on first use
    pub fn get_or_load(&self) -> Result<Arc<TrainedModel>> {
        if let Some(model) = self.current() {
            return Ok(model);
        }

        let trained = match self.store.load(&self.store.handle()) {
            Ok(trained) => trained,
            Err(FootyError::ArtifactNotFound(path)) => {
                log::debug!("No model artifact at {}", path);
                return Err(FootyError::ModelNotLoaded);
            }
            Err(e) => return Err(e),
        };

        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Another caller may have published while we were loading
        if let Some(model) = guard.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(trained);
        *guard = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Swap in a newly trained model
    pub fn publish(&self, trained: TrainedModel) -> Arc<TrainedModel> {
        let model = Arc::new(trained);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Arc::clone(&model));
        model
    }
}
