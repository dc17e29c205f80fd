use crate::engine::classifier::{
    softmax_argmax, unknown_flag, ClassifierKind, IncrementalClassifier, Prediction,
};
use crate::error::{AppError, Result};
use crate::models::Instance;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct PerceptronOptions {
    /// Step size (`-L`)
    pub learning_rate: f64,
    /// Required score lead of the true class (`-M`)
    pub margin: f64,
}

impl Default for PerceptronOptions {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            margin: 0.0,
        }
    }
}

impl PerceptronOptions {
    pub(crate) fn from_flags(flags: &[(char, f64)]) -> Result<Self> {
        let mut options = Self::default();
        for &(flag, value) in flags {
            match flag {
                'L' => options.learning_rate = value,
                'M' => options.margin = value,
                other => return Err(unknown_flag(ClassifierKind::Perceptron, other)),
            }
        }

        if options.learning_rate <= 0.0 {
            return Err(AppError::Configuration(
                "perceptron -L must be positive".to_string(),
            ));
        }
        if options.margin < 0.0 {
            return Err(AppError::Configuration(
                "perceptron -M must not be negative".to_string(),
            ));
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PerceptronState {
    dimension: Option<usize>,
    labels: Vec<String>,
    /// One weight vector per label; the last component is the bias
    weights: Vec<Array1<f64>>,
}

/// Online multiclass perceptron
pub struct PerceptronClassifier {
    options: PerceptronOptions,
    state: PerceptronState,
}

impl PerceptronClassifier {
    pub fn new(options: PerceptronOptions) -> Self {
        Self {
            options,
            state: PerceptronState::default(),
        }
    }

    pub fn restore(bytes: &[u8], options: PerceptronOptions) -> Result<Self> {
        let state: PerceptronState = bincode::deserialize(bytes)?;
        Ok(Self { options, state })
    }

    fn augmented(features: &[f64]) -> Array1<f64> {
        features.iter().copied().chain(std::iter::once(1.0)).collect()
    }

    fn scores(&self, x: ArrayView1<f64>) -> Vec<f64> {
        self.state.weights.iter().map(|w| w.dot(&x)).collect()
    }

    fn label_index(&mut self, label: &str, width: usize) -> usize {
        match self.state.labels.iter().position(|l| l == label) {
            Some(index) => index,
            None => {
                self.state.labels.push(label.to_string());
                self.state.weights.push(Array1::zeros(width));
                self.state.labels.len() - 1
            }
        }
    }
}

impl IncrementalClassifier for PerceptronClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Perceptron
    }

    fn dimension(&self) -> Option<usize> {
        self.state.dimension
    }

    fn update(&mut self, instance: &Instance) -> Result<()> {
        let label = instance
            .label
            .as_deref()
            .ok_or_else(|| AppError::Validation("training instance has no label".to_string()))?;
        self.check_dimension(&instance.features)?;
        self.state.dimension = Some(instance.dimension());

        let x = Self::augmented(&instance.features);
        let truth = self.label_index(label, x.len());
        let scores = self.scores(x.view());

        // Strongest competitor; a lone class has none to push away from
        let rival = scores
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != truth)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, s)| (i, *s));

        if let Some((rival, rival_score)) = rival {
            if scores[truth] - rival_score <= self.options.margin {
                let step = &x * self.options.learning_rate;
                self.state.weights[truth] += &step;
                self.state.weights[rival] -= &step;
            }
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        self.check_dimension(features)?;

        let x = Self::augmented(features);
        let (best, confidence) = softmax_argmax(&self.scores(x.view()))
            .ok_or_else(|| AppError::Internal("perceptron model has no classes".to_string()))?;

        Ok(Prediction {
            label: self.state.labels[best].clone(),
            confidence,
        })
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train_epochs(p: &mut PerceptronClassifier, epochs: usize) {
        let data = [
            (vec![0.0, 1.0], "up"),
            (vec![0.2, 0.9], "up"),
            (vec![1.0, 0.0], "right"),
            (vec![0.9, 0.1], "right"),
        ];
        for _ in 0..epochs {
            for (features, label) in &data {
                p.update(&Instance::labelled(features.clone(), *label)).unwrap();
            }
        }
    }

    #[test]
    fn test_learns_linearly_separable_data() {
        let mut p = PerceptronClassifier::new(PerceptronOptions::default());
        train_epochs(&mut p, 10);

        assert_eq!(p.predict(&[0.1, 1.0]).unwrap().label, "up");
        assert_eq!(p.predict(&[1.0, 0.1]).unwrap().label, "right");
    }

    #[test]
    fn test_single_class_predicts_it() {
        let mut p = PerceptronClassifier::new(PerceptronOptions::default());
        p.update(&Instance::labelled(vec![1.0], "only")).unwrap();

        let prediction = p.predict(&[3.0]).unwrap();
        assert_eq!(prediction.label, "only");
        assert_eq!(prediction.confidence, 1.0);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_weights() {
        let mut p = PerceptronClassifier::new(PerceptronOptions::default());
        train_epochs(&mut p, 3);

        let restored =
            PerceptronClassifier::restore(&p.snapshot().unwrap(), PerceptronOptions::default())
                .unwrap();
        assert_eq!(restored.state, p.state);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut p = PerceptronClassifier::new(PerceptronOptions::default());
        p.update(&Instance::labelled(vec![1.0, 2.0], "a")).unwrap();
        assert!(matches!(p.predict(&[1.0]), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_option_validation() {
        let opts = PerceptronOptions::from_flags(&[('L', 0.5), ('M', 1.0)]).unwrap();
        assert_eq!(opts.learning_rate, 0.5);
        assert_eq!(opts.margin, 1.0);

        assert!(PerceptronOptions::from_flags(&[('L', -1.0)]).is_err());
        assert!(PerceptronOptions::from_flags(&[('V', 1.0)]).is_err());
    }
}
