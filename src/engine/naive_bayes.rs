use crate::engine::classifier::{
    softmax_argmax, unknown_flag, ClassifierKind, IncrementalClassifier, Prediction,
};
use crate::error::{AppError, Result};
use crate::models::Instance;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq)]
pub struct NaiveBayesOptions {
    /// Variance floor (`-V`)
    pub min_variance: f64,
}

impl Default for NaiveBayesOptions {
    fn default() -> Self {
        Self { min_variance: 1e-9 }
    }
}

impl NaiveBayesOptions {
    pub(crate) fn from_flags(flags: &[(char, f64)]) -> Result<Self> {
        let mut options = Self::default();
        for &(flag, value) in flags {
            match flag {
                'V' => options.min_variance = value,
                other => return Err(unknown_flag(ClassifierKind::NaiveBayes, other)),
            }
        }

        if options.min_variance <= 0.0 {
            return Err(AppError::Configuration(
                "naive_bayes -V must be positive".to_string(),
            ));
        }
        Ok(options)
    }
}

/// Running per-feature statistics for one class (Welford)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClassStats {
    count: u64,
    mean: Array1<f64>,
    m2: Array1<f64>,
}

impl ClassStats {
    fn new(dimension: usize) -> Self {
        Self {
            count: 0,
            mean: Array1::zeros(dimension),
            m2: Array1::zeros(dimension),
        }
    }

    fn observe(&mut self, features: &[f64]) {
        self.count += 1;
        let x = ArrayView1::from(features);
        let delta = &x - &self.mean;
        self.mean.scaled_add(1.0 / self.count as f64, &delta);
        self.m2 += &(&delta * &(&x - &self.mean));
    }

    fn variance(&self, floor: f64) -> Array1<f64> {
        if self.count < 2 {
            return Array1::from_elem(self.mean.len(), floor);
        }
        let n = (self.count - 1) as f64;
        self.m2.mapv(|m2| (m2 / n).max(floor))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct NaiveBayesState {
    dimension: Option<usize>,
    total: u64,
    classes: BTreeMap<String, ClassStats>,
}

/// Gaussian naive Bayes updated one instance at a time
pub struct NaiveBayesClassifier {
    options: NaiveBayesOptions,
    state: NaiveBayesState,
}

impl NaiveBayesClassifier {
    pub fn new(options: NaiveBayesOptions) -> Self {
        Self {
            options,
            state: NaiveBayesState::default(),
        }
    }

    pub fn restore(bytes: &[u8], options: NaiveBayesOptions) -> Result<Self> {
        let state: NaiveBayesState = bincode::deserialize(bytes)?;
        Ok(Self { options, state })
    }

    fn log_posterior(&self, stats: &ClassStats, features: &[f64]) -> f64 {
        let prior = (stats.count as f64 / self.state.total as f64).ln();
        let var = stats.variance(self.options.min_variance);
        let diff = &ArrayView1::from(features) - &stats.mean;

        let log_norm = var.mapv(|v| (2.0 * PI * v).ln()).sum();
        let distance = (&diff * &diff / &var.mapv(|v| 2.0 * v)).sum();
        prior - 0.5 * log_norm - distance
    }
}

impl IncrementalClassifier for NaiveBayesClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::NaiveBayes
    }

    fn dimension(&self) -> Option<usize> {
        self.state.dimension
    }

    fn update(&mut self, instance: &Instance) -> Result<()> {
        let label = instance
            .label
            .as_ref()
            .ok_or_else(|| AppError::Validation("training instance has no label".to_string()))?;
        self.check_dimension(&instance.features)?;

        let dimension = instance.dimension();
        self.state.dimension = Some(dimension);
        self.state
            .classes
            .entry(label.clone())
            .or_insert_with(|| ClassStats::new(dimension))
            .observe(&instance.features);
        self.state.total += 1;
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        self.check_dimension(features)?;

        let labels: Vec<&String> = self.state.classes.keys().collect();
        let scores: Vec<f64> = self
            .state
            .classes
            .values()
            .map(|stats| self.log_posterior(stats, features))
            .collect();

        let (best, confidence) = softmax_argmax(&scores)
            .ok_or_else(|| AppError::Internal("naive_bayes model has no classes".to_string()))?;

        Ok(Prediction {
            label: labels[best].clone(),
            confidence,
        })
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.state)?)
    }
}
