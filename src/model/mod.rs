//! Model boundary.
//!
//! # Responsibilities
//! - Define the patient feature vector accepted by the API
//! - Define the `Predictor` seam implemented by the trained model
//! - Hold the currently loaded model and publish its availability
//!
//! # Design Decisions
//! - Training and inference live outside this crate; an embedding application
//!   installs a `Predictor` into the `ModelSlot`
//! - The slot is swapped atomically (arc-swap), so in-flight predictions keep
//!   the model they started with
//! - Every availability change updates the `model_loaded` gauge

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

use crate::observability::metrics::MetricsRegistry;

/// Clinical features of one patient (UCI heart-disease schema).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatientFeatures {
    /// Age in years.
    pub age: f64,
    /// 1 = male, 0 = female.
    pub sex: u8,
    /// Chest pain type (0-3).
    pub cp: u8,
    /// Resting blood pressure (mm Hg).
    pub trestbps: f64,
    /// Serum cholesterol (mg/dl).
    pub chol: f64,
    /// Fasting blood sugar > 120 mg/dl.
    pub fbs: u8,
    /// Resting electrocardiographic results (0-2).
    pub restecg: u8,
    /// Maximum heart rate achieved.
    pub thalach: f64,
    /// Exercise induced angina.
    pub exang: u8,
    /// ST depression induced by exercise relative to rest.
    pub oldpeak: f64,
    /// Slope of the peak exercise ST segment (0-2).
    pub slope: u8,
    /// Number of major vessels colored by fluoroscopy (0-4).
    pub ca: u8,
    /// Thalassemia (0-3).
    pub thal: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionLabel {
    #[serde(rename = "Disease Present")]
    DiseasePresent,
    #[serde(rename = "No Disease")]
    NoDisease,
}

impl PredictionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiseasePresent => "Disease Present",
            Self::NoDisease => "No Disease",
        }
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: PredictionLabel,
    /// Model confidence for `label`, expected in [0.0, 1.0].
    pub probability: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model not loaded")]
    NotLoaded,
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A trained model able to score patient features.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &PatientFeatures) -> Result<Prediction, ModelError>;
}

/// A predictor together with the version it was loaded from.
pub struct LoadedModel {
    version: String,
    predictor: Box<dyn Predictor>,
}

impl LoadedModel {
    pub fn new(version: impl Into<String>, predictor: impl Predictor + 'static) -> Self {
        Self {
            version: version.into(),
            predictor: Box::new(predictor),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn predict(&self, features: &PatientFeatures) -> Result<Prediction, ModelError> {
        self.predictor.predict(features)
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Holder of the model currently serving predictions.
pub struct ModelSlot {
    current: ArcSwapOption<LoadedModel>,
    metrics: MetricsRegistry,
}

impl ModelSlot {
    /// Create an empty slot; `model_loaded` reads 0 until a model is installed.
    pub fn new(metrics: MetricsRegistry) -> Self {
        metrics.update_model_status(false);
        Self {
            current: ArcSwapOption::empty(),
            metrics,
        }
    }

    /// Install (or replace) the serving model.
    pub fn install(&self, model: LoadedModel) {
        tracing::info!(version = %model.version(), "Model loaded");
        self.current.store(Some(Arc::new(model)));
        self.metrics.update_model_status(true);
    }

    /// Remove the serving model. Subsequent predictions fail with `NotLoaded`.
    pub fn unload(&self) {
        if let Some(previous) = self.current.swap(None) {
            tracing::warn!(version = %previous.version(), "Model unloaded");
        }
        self.metrics.update_model_status(false);
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.current.load_full()
    }

    /// Score `features` with the current model.
    pub fn predict(&self, features: &PatientFeatures) -> Result<(Prediction, Arc<LoadedModel>), ModelError> {
        let model = self.current().ok_or(ModelError::NotLoaded)?;
        let prediction = model.predict(features)?;
        Ok((prediction, model))
    }
}

impl fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSlot")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}
