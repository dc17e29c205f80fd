use crate::engine::naive_bayes::{NaiveBayesClassifier, NaiveBayesOptions};
use crate::engine::perceptron::{PerceptronClassifier, PerceptronOptions};
use crate::error::{AppError, Result};
use crate::models::Instance;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

/// A model that learns one instance at a time
pub trait IncrementalClassifier: Send + Sync {
    /// Classifier kind
    fn kind(&self) -> ClassifierKind;

    /// Feature dimension fixed by the first training instance
    fn dimension(&self) -> Option<usize>;

    /// Apply one labelled training instance
    fn update(&mut self, instance: &Instance) -> Result<()>;

    /// Predict the label of a feature row
    fn predict(&self, features: &[f64]) -> Result<Prediction>;

    /// Serialized state for the model cache
    fn snapshot(&self) -> Result<Vec<u8>>;

    /// Reject rows whose dimension differs from the trained one
    fn check_dimension(&self, features: &[f64]) -> Result<()> {
        match self.dimension() {
            Some(expected) if expected != features.len() => Err(AppError::Validation(format!(
                "expected {} features, got {}",
                expected,
                features.len()
            ))),
            _ => Ok(()),
        }
    }
}

/// Predicted label with its posterior probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Built-in classifier kinds, resolvable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ClassifierKind {
    /// Incremental Gaussian naive Bayes
    #[strum(to_string = "naive_bayes", serialize = "NaiveBayesUpdateable")]
    NaiveBayes,

    /// Online multiclass perceptron
    #[strum(to_string = "perceptron", serialize = "SGD")]
    Perceptron,
}

#[derive(Debug, Clone, PartialEq)]
enum KindOptions {
    NaiveBayes(NaiveBayesOptions),
    Perceptron(PerceptronOptions),
}

/// Resolved classifier kind and options
///
/// Built once per flow at startup. Everything that can be wrong with a kind name or an
/// option string is reported here as a `Configuration` error, never at first use.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSpec {
    kind: ClassifierKind,
    options: KindOptions,
    raw_options: String,
}

impl ClassifierSpec {
    /// Resolve a kind name and a `-X value` option string
    pub fn parse(kind: &str, options: &str) -> Result<Self> {
        let kind = ClassifierKind::from_str(kind.trim()).map_err(|_| {
            AppError::Configuration(format!("unknown classifier kind '{}'", kind))
        })?;
        let flags = parse_flags(options)?;

        let options = match kind {
            ClassifierKind::NaiveBayes => KindOptions::NaiveBayes(NaiveBayesOptions::from_flags(&flags)?),
            ClassifierKind::Perceptron => KindOptions::Perceptron(PerceptronOptions::from_flags(&flags)?),
        };

        Ok(Self {
            kind,
            options,
            raw_options: options_string(&flags),
        })
    }

    pub fn kind(&self) -> ClassifierKind {
        self.kind
    }

    /// Normalised option string
    pub fn options(&self) -> &str {
        &self.raw_options
    }

    /// Untrained classifier of this kind
    pub fn fresh(&self) -> Box<dyn IncrementalClassifier> {
        match &self.options {
            KindOptions::NaiveBayes(opts) => Box::new(NaiveBayesClassifier::new(opts.clone())),
            KindOptions::Perceptron(opts) => Box::new(PerceptronClassifier::new(opts.clone())),
        }
    }

    /// Classifier rebuilt from a cached snapshot
    ///
    /// Options come from this spec, so a flow's configuration applies to models
    /// trained before it changed.
    pub fn restore(&self, state: &[u8]) -> Result<Box<dyn IncrementalClassifier>> {
        match &self.options {
            KindOptions::NaiveBayes(opts) => Ok(Box::new(NaiveBayesClassifier::restore(
                state,
                opts.clone(),
            )?)),
            KindOptions::Perceptron(opts) => Ok(Box::new(PerceptronClassifier::restore(
                state,
                opts.clone(),
            )?)),
        }
    }
}

/// Split `-V 1e-6 -L 0.5` into `[('V', 1e-6), ('L', 0.5)]`
pub(crate) fn parse_flags(options: &str) -> Result<Vec<(char, f64)>> {
    let mut flags = Vec::new();
    let mut tokens = options.split_whitespace();

    while let Some(token) = tokens.next() {
        let mut chars = token.chars();
        let flag = match (chars.next(), chars.next(), chars.next()) {
            (Some('-'), Some(flag), None) if flag.is_ascii_alphabetic() => flag,
            _ => {
                return Err(AppError::Configuration(format!(
                    "malformed classifier option '{}'",
                    token
                )))
            }
        };

        let value = tokens.next().ok_or_else(|| {
            AppError::Configuration(format!("classifier option -{} is missing a value", flag))
        })?;
        let value: f64 = value.parse().map_err(|_| {
            AppError::Configuration(format!(
                "classifier option -{} expects a number, got '{}'",
                flag, value
            ))
        })?;
        if !value.is_finite() {
            return Err(AppError::Configuration(format!(
                "classifier option -{} must be finite",
                flag
            )));
        }

        flags.push((flag, value));
    }

    Ok(flags)
}

pub(crate) fn unknown_flag(kind: ClassifierKind, flag: char) -> AppError {
    AppError::Configuration(format!("option -{} is not supported by {}", flag, kind))
}

fn options_string(flags: &[(char, f64)]) -> String {
    flags
        .iter()
        .map(|(flag, value)| format!("-{} {}", flag, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Index and value of the largest score, plus its softmax probability
pub(crate) fn softmax_argmax(scores: &[f64]) -> Option<(usize, f64)> {
    let (best, max) = scores
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    if !max.is_finite() {
        // Overflowed scores carry no ranking; split evenly across the tied best
        let tied = scores.iter().filter(|s| **s == max).count().max(1);
        return Some((best, 1.0 / tied as f64));
    }

    let total: f64 = scores
        .iter()
        .filter(|s| !s.is_nan())
        .map(|s| (s - max).exp())
        .sum();
    Some((best, 1.0 / total))
}
