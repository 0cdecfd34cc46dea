//! Per-line processing shared by every front end.
//!
//! [`GesturePipeline`] owns the stateless stages (parser, conditioner,
//! extractor), a shared read-only classifier, and the single
//! [`DecisionEngine`]. One line in, one [`LineOutcome`] out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use wifi_gesture_core::{
    ensure_arity, ClassProbabilities, ClassifierError, FeatureVector, GestureClassifier, Prediction,
};
use wifi_gesture_signal::{
    sample_amplitude, FeatureExtractor, FilterError, FrameParser, FrameRejection, SignalConditioner,
};

use crate::config::DetectorConfig;
use crate::decision::{Decision, DecisionEngine};

/// Errors raised while assembling a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The classifier cannot consume the extractor's vectors.
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    /// The configured filter cannot be designed.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// A line that made it through classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Features fed to the classifier
    pub features: FeatureVector,
    /// Full class distribution
    pub probabilities: ClassProbabilities,
    /// Arg-max prediction
    pub prediction: Prediction,
    /// What the decision engine made of it
    pub decision: Decision,
}

/// What happened to one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// The frame parser dropped the line.
    Rejected(FrameRejection),
    /// The coefficient list was empty.
    NoAmplitude,
    /// The extractor produced no vector.
    NoFeatures,
    /// The line was classified.
    Classified(Box<Classification>),
}

impl LineOutcome {
    /// The classification, if the line got that far.
    pub fn classification(&self) -> Option<&Classification> {
        match self {
            LineOutcome::Classified(c) => Some(c),
            _ => None,
        }
    }
}

/// Parser, conditioner, extractor, classifier and decision engine in one.
pub struct GesturePipeline {
    parser: FrameParser,
    conditioner: SignalConditioner,
    extractor: FeatureExtractor,
    classifier: Arc<dyn GestureClassifier>,
    engine: DecisionEngine,
}

impl GesturePipeline {
    /// Assemble a pipeline from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Classifier`] if the model's arity differs
    /// from the extractor's, and [`PipelineError::Filter`] if the filter
    /// design is invalid.
    pub fn new(
        config: &DetectorConfig,
        classifier: Arc<dyn GestureClassifier>,
    ) -> Result<Self, PipelineError> {
        let extractor = FeatureExtractor::new();
        ensure_arity(classifier.as_ref(), extractor.feature_count())?;

        if !classifier
            .labels()
            .iter()
            .any(|l| *l == config.no_gesture_label)
        {
            warn!(
                label = %config.no_gesture_label,
                "Model has no no-gesture class; every confident prediction will vote"
            );
        }

        Ok(Self {
            parser: FrameParser::new(config.frame_tag.clone()),
            conditioner: SignalConditioner::new(config.filter_order, config.filter_cutoff)?,
            extractor,
            classifier,
            engine: DecisionEngine::new(config.decision_config()),
        })
    }

    /// The decision engine.
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// The classifier.
    pub fn classifier(&self) -> &Arc<dyn GestureClassifier> {
        &self.classifier
    }

    /// Run one line through every stage, observed at `now`.
    pub fn process_line(&mut self, line: &str, now: DateTime<Utc>) -> LineOutcome {
        let sample = match self.parser.parse(line) {
            Ok(sample) => sample,
            Err(reason) => return LineOutcome::Rejected(reason),
        };
        let Some(magnitudes) = sample_amplitude(&sample) else {
            return LineOutcome::NoAmplitude;
        };
        let conditioned = self.conditioner.condition(magnitudes);
        let Some(features) = self.extractor.extract(&conditioned, sample.signal_strength()) else {
            return LineOutcome::NoFeatures;
        };

        let probabilities = self.classifier.class_probabilities(&features);
        let prediction = probabilities.to_prediction();
        let decision = self.engine.observe(&prediction, now);

        LineOutcome::Classified(Box::new(Classification {
            features,
            probabilities,
            prediction,
            decision,
        }))
    }
}

impl std::fmt::Debug for GesturePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GesturePipeline")
            .field("parser", &self.parser)
            .field("labels", &self.classifier.labels())
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wifi_gesture_core::{Feature, FEATURE_COUNT};

    /// Predicts "wave" when the mean magnitude is above 5, else "no_gesture".
    struct MeanThreshold {
        labels: Vec<String>,
        arity: usize,
    }

    impl MeanThreshold {
        fn new(arity: usize) -> Self {
            Self {
                labels: vec!["no_gesture".into(), "wave".into()],
                arity,
            }
        }
    }

    impl GestureClassifier for MeanThreshold {
        fn n_features(&self) -> usize {
            self.arity
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn class_probabilities(&self, features: &FeatureVector) -> ClassProbabilities {
            let wave = if features[Feature::Mean] > 5.0 { 0.9 } else { 0.1 };
            ClassProbabilities::from_pairs([("no_gesture", 1.0 - wave), ("wave", wave)]).unwrap()
        }
    }

    fn line(magnitude: f64, pairs: usize) -> String {
        let values: Vec<String> = (0..pairs)
            .flat_map(|_| [magnitude.to_string(), "0".to_string()])
            .collect();
        format!("DATA,1,-45,[{}]", values.join(","))
    }

    fn pipeline() -> GesturePipeline {
        GesturePipeline::new(&DetectorConfig::default(), Arc::new(MeanThreshold::new(FEATURE_COUNT)))
            .unwrap()
    }

    #[test]
    fn rejects_arity_mismatch() {
        let err = GesturePipeline::new(&DetectorConfig::default(), Arc::new(MeanThreshold::new(10)))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Classifier(ClassifierError::ArityMismatch { expected: 14, actual: 10 })
        ));
    }

    #[test]
    fn stages_report_where_a_line_stopped() {
        let mut p = pipeline();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        assert_eq!(
            p.process_line("boot: ets Jun  8 2016", now),
            LineOutcome::Rejected(FrameRejection::MissingTag)
        );
        assert_eq!(p.process_line("DATA,1,-45,[]", now), LineOutcome::NoAmplitude);
        // A single subcarrier is too short to filter but still summarised.
        let single = p.process_line("DATA,1,-45,[3,4]", now);
        let c = single.classification().expect("classified");
        assert_eq!(c.features[Feature::Mean], 5.0);
        assert_eq!(c.prediction.label, "no_gesture");
    }

    #[test]
    fn three_strong_lines_fire_wave() {
        let mut p = pipeline();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let mut fired = Vec::new();
        for _ in 0..3 {
            let outcome = p.process_line(&line(8.0, 52), now);
            let c = outcome.classification().expect("classified");
            assert_eq!(c.prediction.label, "wave");
            if let Some(event) = c.decision.event() {
                fired.push(event.clone());
            }
        }
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].label, "wave");
        assert_eq!(p.engine().state().last_event_time(), Some(now));
    }

    #[test]
    fn quiet_lines_never_fire() {
        let mut p = pipeline();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        for _ in 0..10 {
            let outcome = p.process_line(&line(1.0, 52), now);
            assert!(outcome.classification().unwrap().decision.event().is_none());
        }
        assert_eq!(p.engine().state().history_len(), 0);
    }
}
