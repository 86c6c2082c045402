//! Explicit registry for the loaded tagging model.
//!
//! The registry is built once at startup and handed to whatever needs a
//! tagger. Switching models is an explicit [`TaggerRegistry::reload`] call
//! made when the settings change; lookups never swap models on their own.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use image::RgbImage;
use tracing::info;

use super::LabelTable;
use crate::error::MangalabelError;

/// A tagging model: one probability per label of its table.
pub trait Tagger: Send + Sync {
    fn infer(&self, image: &RgbImage) -> Result<Vec<f32>, MangalabelError>;
}

/// Loads a tagging model and its label table by model id.
pub trait TaggerLoader: Send + Sync {
    fn load(&self, model_id: &str) -> Result<LoadedTagger, MangalabelError>;
}

/// A model together with the label table its output is aligned with.
#[derive(Clone)]
pub struct LoadedTagger {
    pub model_id: String,
    pub tagger: Arc<dyn Tagger>,
    pub labels: Arc<LabelTable>,
}

impl fmt::Debug for LoadedTagger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedTagger")
            .field("model_id", &self.model_id)
            .field("labels", &self.labels.len())
            .finish()
    }
}

struct Slot {
    model_id: String,
    loaded: Option<Arc<LoadedTagger>>,
}

/// Holds at most one loaded tagger, loading it on first use.
pub struct TaggerRegistry {
    loader: Box<dyn TaggerLoader>,
    slot: RwLock<Slot>,
}

impl fmt::Debug for TaggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("TaggerRegistry")
            .field("model_id", &slot.model_id)
            .field("loaded", &slot.loaded.is_some())
            .finish()
    }
}

impl TaggerRegistry {
    pub fn new(loader: Box<dyn TaggerLoader>, model_id: impl Into<String>) -> Self {
        Self {
            loader,
            slot: RwLock::new(Slot {
                model_id: model_id.into(),
                loaded: None,
            }),
        }
    }

    /// The configured model id, whether or not it is loaded yet.
    pub fn model_id(&self) -> String {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .model_id
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded
            .is_some()
    }

    /// Returns the configured tagger, loading it if this is the first use.
    pub fn current(&self) -> Result<Arc<LoadedTagger>, MangalabelError> {
        if let Some(loaded) = &self.slot.read().unwrap_or_else(PoisonError::into_inner).loaded {
            return Ok(Arc::clone(loaded));
        }

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(loaded) = &slot.loaded {
            return Ok(Arc::clone(loaded));
        }
        let loaded = Arc::new(self.loader.load(&slot.model_id)?);
        info!(model = %slot.model_id, labels = loaded.labels.len(), "tagger loaded");
        slot.loaded = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Switches to `model_id`, loading it right away.
    ///
    /// Returns `false` without loading when that model is already loaded.
    /// On a load failure the previous tagger stays in place.
    pub fn reload(&self, model_id: &str) -> Result<bool, MangalabelError> {
        {
            let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
            if slot.model_id == model_id && slot.loaded.is_some() {
                return Ok(false);
            }
        }

        let loaded = Arc::new(self.loader.load(model_id)?);
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        info!(from = %slot.model_id, to = %model_id, "tagger reloaded");
        slot.model_id = model_id.to_string();
        slot.loaded = Some(loaded);
        Ok(true)
    }
}
