//! Model artifacts
//!
//! Two forms of the same classifier are persisted:
//!
//! - `FittedPipeline` (`pipeline.json`): the scaler and solver state, reloaded
//!   by this crate for further scoring.
//! - `PortableModel` (`model_portable.json`): plain arrays that any consumer
//!   can evaluate as `sigmoid(coef . ((x - mean) / scale) + intercept)`.
//!
//! Both score through the same function, so their probabilities agree exactly.

use super::logistic::{affine, sigmoid, LogisticModel};
use super::scaler::StandardScaler;
use crate::error::ComputeError;
use crate::types::{FEATURE_COUNT, FEATURE_NAMES};
use crate::MODEL_TYPE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn score(mean: &[f64], scale: &[f64], coef: &[f64], intercept: f64, x: &[f64]) -> f64 {
    let z: Vec<f64> = x
        .iter()
        .zip(mean.iter().zip(scale))
        .map(|(v, (m, s))| (v - m) / s)
        .collect();
    sigmoid(affine(coef, intercept, &z))
}

/// Language-neutral linear model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableModel {
    #[serde(rename = "type")]
    pub model_type: String,
    pub features: Vec<String>,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    pub coef: Vec<f64>,
    pub intercept: f64,
    pub threshold: f64,
}

impl PortableModel {
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        score(
            &self.scaler_mean,
            &self.scaler_scale,
            &self.coef,
            self.intercept,
            x,
        )
    }

    pub fn predict(&self, x: &[f64]) -> u8 {
        u8::from(self.predict_proba(x) >= self.threshold)
    }

    /// Check that every array matches the feature list
    pub fn validate(&self) -> Result<(), ComputeError> {
        let n = self.features.len();
        if self.model_type != MODEL_TYPE {
            return Err(ComputeError::ModelError(format!(
                "unsupported model type {}",
                self.model_type
            )));
        }
        if self.scaler_mean.len() != n || self.scaler_scale.len() != n || self.coef.len() != n {
            return Err(ComputeError::ModelError(format!(
                "array lengths do not match {n} features"
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), ComputeError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Scaler plus classifier as fitted, with the run that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub producer: String,
    pub version: String,
    pub run_id: String,
    pub trained_at: DateTime<Utc>,
    pub features: Vec<String>,
    pub scaler: StandardScaler,
    pub classifier: LogisticModel,
    pub threshold: f64,
}

impl FittedPipeline {
    pub fn new(
        scaler: StandardScaler,
        classifier: LogisticModel,
        threshold: f64,
        run_id: String,
        trained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            producer: crate::PRODUCER_NAME.to_string(),
            version: crate::STRESS_VERSION.to_string(),
            run_id,
            trained_at,
            features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler,
            classifier,
            threshold,
        }
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        score(
            &self.scaler.mean,
            &self.scaler.scale,
            &self.classifier.coef,
            self.classifier.intercept,
            x,
        )
    }

    pub fn predict(&self, x: &[f64]) -> u8 {
        u8::from(self.predict_proba(x) >= self.threshold)
    }

    pub fn to_portable(&self) -> PortableModel {
        PortableModel {
            model_type: MODEL_TYPE.to_string(),
            features: self.features.clone(),
            scaler_mean: self.scaler.mean.clone(),
            scaler_scale: self.scaler.scale.clone(),
            coef: self.classifier.coef.clone(),
            intercept: self.classifier.intercept,
            threshold: self.threshold,
        }
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let pipeline: Self = serde_json::from_str(json)?;
        if pipeline.features.len() != FEATURE_COUNT
            || pipeline.classifier.coef.len() != FEATURE_COUNT
        {
            return Err(ComputeError::ModelError(
                "pipeline does not match the feature schema".to_string(),
            ));
        }
        Ok(pipeline)
    }

    pub fn save(&self, path: &Path) -> Result<(), ComputeError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
