//! Incremental classifiers and the engine that keeps their state in the model cache

pub mod classifier;
pub mod naive_bayes;
pub mod perceptron;
pub mod service;

pub use classifier::{ClassifierKind, ClassifierSpec, IncrementalClassifier, Prediction};
pub use naive_bayes::{NaiveBayesClassifier, NaiveBayesOptions};
pub use perceptron::{PerceptronClassifier, PerceptronOptions};
pub use service::{IncrementalClassifierEngine, UpdatedModel};
