use crate::cache::DistributedModelCache;
use crate::engine::classifier::{ClassifierSpec, IncrementalClassifier};
use crate::error::{AppError, Result};
use crate::models::{CombinerResult, Instance};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identity of the model version a training update produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedModel {
    pub model_id: String,
    pub version: u64,
}

/// Trains and scores models of one classifier kind, keeping their state in the cache
///
/// The engine itself is stateless between calls: every `train` restores the
/// classifier from the cached snapshot under the model's lock and writes the new
/// snapshot straight back.
pub struct IncrementalClassifierEngine {
    spec: ClassifierSpec,
    cache: Arc<DistributedModelCache>,
}

impl IncrementalClassifierEngine {
    /// Build an engine; unknown kinds and bad option strings fail here
    pub fn new(kind: &str, options: &str, cache: Arc<DistributedModelCache>) -> Result<Self> {
        let spec = ClassifierSpec::parse(kind, options)?;
        info!(classifier = %spec.kind(), options = spec.options(), "Classifier engine ready");
        Ok(Self { spec, cache })
    }

    pub fn spec(&self) -> &ClassifierSpec {
        &self.spec
    }

    /// Apply one labelled instance to a model, creating the model if needed
    ///
    /// A `Validation` error (missing label, wrong dimension) leaves the stored model
    /// untouched.
    pub async fn train(&self, model_id: &str, instance: &Instance) -> Result<UpdatedModel> {
        let record = self
            .cache
            .update(model_id, |current| {
                let mut classifier = self.classifier_for(current.map(|r| r.state.as_slice()))?;
                classifier.update(instance)?;
                classifier.snapshot()
            })
            .await?;

        debug!(model_id, version = record.version, "Model trained");
        Ok(UpdatedModel {
            model_id: record.id,
            version: record.version,
        })
    }

    /// Score an instance against the current model version
    ///
    /// An unknown model is answered with `ERROR` and an incompatible instance with
    /// `REJECTED`; only infrastructure failures are returned as errors.
    pub async fn predict(&self, model_id: &str, instance: &Instance) -> Result<CombinerResult> {
        let record = match self.cache.get(model_id).await {
            Ok(record) => record,
            Err(AppError::NotFound(msg)) => {
                debug!(model_id, "Prediction requested for unknown model");
                return Ok(CombinerResult::error(model_id, msg));
            }
            Err(e) => return Err(e),
        };

        let classifier = self.spec.restore(&record.state)?;
        match classifier.predict(&instance.features) {
            Ok(prediction) => Ok(CombinerResult::predicted(
                model_id,
                prediction.label,
                prediction.confidence,
                record.version,
            )),
            Err(AppError::Validation(msg)) => {
                warn!(model_id, version = record.version, reason = %msg, "Instance rejected");
                Ok(CombinerResult::rejected(model_id, msg))
            }
            Err(e) => Err(e),
        }
    }

    fn classifier_for(&self, state: Option<&[u8]>) -> Result<Box<dyn IncrementalClassifier>> {
        match state {
            Some(bytes) => self.spec.restore(bytes),
            None => Ok(self.spec.fresh()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RetryPolicy;
    use crate::config::CacheConfig;
    use crate::models::ResultKind;
    use crate::store::{InMemoryModelStore, ModelStore};

    fn engine(kind: &str) -> (IncrementalClassifierEngine, Arc<InMemoryModelStore>) {
        let store = Arc::new(InMemoryModelStore::new());
        let cache = Arc::new(DistributedModelCache::new(
            store.clone(),
            &CacheConfig::default(),
            RetryPolicy::none(),
        ));
        (IncrementalClassifierEngine::new(kind, "", cache).unwrap(), store)
    }

    #[test]
    fn test_bad_options_fail_construction() {
        let store = Arc::new(InMemoryModelStore::new());
        let cache = Arc::new(DistributedModelCache::new(
            store,
            &CacheConfig::default(),
            RetryPolicy::none(),
        ));
        let result = IncrementalClassifierEngine::new("naive_bayes", "-V", cache);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_train_versions_increase() {
        let (engine, store) = engine("naive_bayes");

        let first = engine
            .train("m1", &Instance::labelled(vec![1.0, 2.0], "a"))
            .await
            .unwrap();
        let second = engine
            .train("m1", &Instance::labelled(vec![1.5, 2.5], "b"))
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(store.load("m1").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_predict_unknown_model_is_error_result() {
        let (engine, _) = engine("perceptron");
        let result = engine.predict("ghost", &Instance::new(vec![1.0])).await.unwrap();
        assert_eq!(result.result(), ResultKind::Error);
        assert_eq!(result.model_id(), "ghost");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let (engine, store) = engine("naive_bayes");
        engine
            .train("m1", &Instance::labelled(vec![1.0, 2.0], "a"))
            .await
            .unwrap();

        let result = engine.predict("m1", &Instance::new(vec![1.0])).await.unwrap();
        assert_eq!(result.result(), ResultKind::Rejected);

        let err = engine
            .train("m1", &Instance::labelled(vec![1.0], "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.load("m1").await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_predict_reports_version() {
        let (engine, _) = engine("naive_bayes");
        engine
            .train("m1", &Instance::labelled(vec![0.0], "zero"))
            .await
            .unwrap();

        let result = engine.predict("m1", &Instance::new(vec![0.1])).await.unwrap();
        assert!(result.is_accepted());
        assert_eq!(result.label(), Some("zero"));
        assert_eq!(result.version(), Some(1));
    }
}
