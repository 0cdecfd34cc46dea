//! Decision Engine
//!
//! Converts a stream of per-sample predictions into de-bounced gesture
//! events. For each prediction, in order:
//!
//! 1. ignore it when `confidence <= threshold` or the label is the
//!    no-gesture label (no state change);
//! 2. ignore it while `now - last_event <= cooldown`;
//! 3. push the label into the bounded history (oldest evicted);
//! 4. fire when the history holds at least `vote_window` labels and at least
//!    `votes_required` of the last `vote_window` equal this label, then
//!    record the event time and clear the history.
//!
//! "Idle" and "cooling" are not explicit modes: both follow from
//! `last_event_time`.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use wifi_gesture_core::{GestureEvent, Prediction, DEFAULT_NO_GESTURE_LABEL};

/// Decision policy.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionConfig {
    /// Predictions must be strictly above this confidence.
    pub confidence_threshold: f64,
    /// Refractory window after an event.
    pub cooldown: Duration,
    /// History capacity.
    pub history_capacity: usize,
    /// Number of most recent labels that vote.
    pub vote_window: usize,
    /// Votes needed to fire.
    pub votes_required: usize,
    /// Label that never fires.
    pub no_gesture_label: String,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            cooldown: Duration::from_secs(3),
            history_capacity: 5,
            vote_window: 3,
            votes_required: 2,
            no_gesture_label: DEFAULT_NO_GESTURE_LABEL.to_string(),
        }
    }
}

/// Why a prediction was not added to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// Confidence at or below the threshold.
    LowConfidence,
    /// The no-gesture label.
    NoGesture,
    /// Inside the refractory window.
    Cooldown,
}

/// Outcome of one [`DecisionEngine::observe`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The prediction left the state untouched.
    Ignored(IgnoreReason),
    /// The label was recorded but agreement is not yet sufficient.
    Pending {
        /// Matching labels among the most recent `vote_window`
        votes: usize,
    },
    /// A gesture event fired.
    Fired(GestureEvent),
}

impl Decision {
    /// The fired event, if any.
    pub fn event(&self) -> Option<&GestureEvent> {
        match self {
            Decision::Fired(event) => Some(event),
            _ => None,
        }
    }
}

/// Mutable state of the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionState {
    recent_labels: VecDeque<String>,
    last_event_time: Option<DateTime<Utc>>,
}

impl DecisionState {
    /// Labels recorded since the last event, oldest first.
    pub fn recent_labels(&self) -> impl Iterator<Item = &str> {
        self.recent_labels.iter().map(String::as_str)
    }

    /// Number of recorded labels.
    pub fn history_len(&self) -> usize {
        self.recent_labels.len()
    }

    /// Time of the last fired event, `None` before the first.
    pub fn last_event_time(&self) -> Option<DateTime<Utc>> {
        self.last_event_time
    }
}

/// De-bouncing state machine over predictions.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
    state: DecisionState,
}

impl DecisionEngine {
    /// Create an engine with empty history.
    pub fn new(config: DecisionConfig) -> Self {
        let state = DecisionState {
            recent_labels: VecDeque::with_capacity(config.history_capacity),
            last_event_time: None,
        };
        Self { config, state }
    }

    /// The policy in use.
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> &DecisionState {
        &self.state
    }

    /// Forget history and the last event time.
    pub fn reset(&mut self) {
        self.state.recent_labels.clear();
        self.state.last_event_time = None;
    }

    /// Feed one prediction observed at `now`.
    pub fn observe(&mut self, prediction: &Prediction, now: DateTime<Utc>) -> Decision {
        if prediction.confidence <= self.config.confidence_threshold {
            return Decision::Ignored(IgnoreReason::LowConfidence);
        }
        if prediction.label == self.config.no_gesture_label {
            return Decision::Ignored(IgnoreReason::NoGesture);
        }
        if self.cooling(now) {
            return Decision::Ignored(IgnoreReason::Cooldown);
        }

        if self.state.recent_labels.len() >= self.config.history_capacity {
            self.state.recent_labels.pop_front();
        }
        self.state.recent_labels.push_back(prediction.label.clone());

        let votes = self
            .state
            .recent_labels
            .iter()
            .rev()
            .take(self.config.vote_window)
            .filter(|l| **l == prediction.label)
            .count();

        if self.state.recent_labels.len() >= self.config.vote_window
            && votes >= self.config.votes_required
        {
            self.state.last_event_time = Some(now);
            self.state.recent_labels.clear();
            return Decision::Fired(GestureEvent {
                label: prediction.label.clone(),
                confidence: prediction.confidence,
                timestamp: now,
            });
        }

        Decision::Pending { votes }
    }

    /// Whether `now` is inside the refractory window. A clock that went
    /// backwards counts as inside.
    fn cooling(&self, now: DateTime<Utc>) -> bool {
        match self.state.last_event_time {
            None => false,
            Some(last) => match (now - last).to_std() {
                Ok(elapsed) => elapsed <= self.config.cooldown,
                Err(_) => true,
            },
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(DecisionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::milliseconds(ms)
    }

    fn p(label: &str, confidence: f64) -> Prediction {
        Prediction::new(label, confidence)
    }

    #[test]
    fn three_agreeing_predictions_fire_once_on_third() {
        let mut engine = DecisionEngine::default();
        assert_eq!(engine.observe(&p("wave", 0.8), t0()), Decision::Pending { votes: 1 });
        assert_eq!(engine.observe(&p("wave", 0.8), t0()), Decision::Pending { votes: 2 });
        let third = engine.observe(&p("wave", 0.8), t0());
        let event = third.event().expect("third prediction fires");
        assert_eq!(event.label, "wave");
        assert_eq!(event.confidence, 0.8);
        assert_eq!(event.timestamp, t0());
        assert_eq!(engine.state().history_len(), 0);
        assert_eq!(engine.state().last_event_time(), Some(t0()));
    }

    #[test]
    fn three_distinct_labels_do_not_fire() {
        let mut engine = DecisionEngine::default();
        for label in ["wave", "circle", "push"] {
            assert!(engine.observe(&p(label, 0.9), t0()).event().is_none());
        }
        assert_eq!(engine.state().history_len(), 3);
    }

    #[test]
    fn split_vote_fires_for_majority_label_only() {
        let mut engine = DecisionEngine::default();
        assert!(engine.observe(&p("wave", 0.9), at(0)).event().is_none());
        assert!(engine.observe(&p("circle", 0.9), at(10)).event().is_none());
        // "circle" is 1 of the last 3; "wave" would be 2 of 3.
        let d = engine.observe(&p("wave", 0.9), at(20));
        assert_eq!(d.event().map(|e| e.label.as_str()), Some("wave"));
    }

    #[test]
    fn low_confidence_and_no_gesture_never_mutate_state() {
        let mut engine = DecisionEngine::default();
        engine.observe(&p("wave", 0.9), at(0));
        let before = engine.state().clone();

        for _ in 0..10 {
            assert_eq!(
                engine.observe(&p("wave", 0.7), at(5)),
                Decision::Ignored(IgnoreReason::LowConfidence)
            );
            assert_eq!(
                engine.observe(&p("no_gesture", 0.99), at(5)),
                Decision::Ignored(IgnoreReason::NoGesture)
            );
        }
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn cooldown_suppresses_second_event() {
        let mut engine = DecisionEngine::default();
        for _ in 0..3 {
            engine.observe(&p("wave", 0.9), at(0));
        }
        assert_eq!(engine.state().last_event_time(), Some(at(0)));

        for ms in [100, 1500, 2999, 3000] {
            assert_eq!(
                engine.observe(&p("wave", 0.9), at(ms)),
                Decision::Ignored(IgnoreReason::Cooldown),
                "{ms}"
            );
        }
        assert_eq!(engine.state().history_len(), 0);

        engine.observe(&p("wave", 0.9), at(3001));
        engine.observe(&p("wave", 0.9), at(3002));
        let d = engine.observe(&p("wave", 0.9), at(3003));
        assert!(d.event().is_some());
    }

    #[test]
    fn clock_going_backwards_stays_cooling() {
        let mut engine = DecisionEngine::default();
        for _ in 0..3 {
            engine.observe(&p("wave", 0.9), at(10_000));
        }
        assert_eq!(
            engine.observe(&p("wave", 0.9), at(0)),
            Decision::Ignored(IgnoreReason::Cooldown)
        );
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let config = DecisionConfig {
            votes_required: 3,
            ..DecisionConfig::default()
        };
        let mut engine = DecisionEngine::new(config);
        for label in ["a", "b", "c", "d", "e", "f", "g"] {
            assert!(engine.observe(&p(label, 0.9), t0()).event().is_none());
        }
        let labels: Vec<&str> = engine.state().recent_labels().collect();
        assert_eq!(labels, vec!["c", "d", "e", "f", "g"]);
    }

    #[test]
    fn votes_count_only_recent_window() {
        let mut engine = DecisionEngine::default();
        engine.observe(&p("wave", 0.9), t0());
        engine.observe(&p("circle", 0.9), t0());
        engine.observe(&p("push", 0.9), t0());
        // Window is circle, push, circle: two votes for "circle", the old
        // "wave" has left the window.
        assert_eq!(
            engine.observe(&p("circle", 0.9), t0()),
            Decision::Fired(GestureEvent {
                label: "circle".into(),
                confidence: 0.9,
                timestamp: t0(),
            })
        );
    }

    #[test]
    fn reset_clears_cooldown() {
        let mut engine = DecisionEngine::default();
        for _ in 0..3 {
            engine.observe(&p("wave", 0.9), at(0));
        }
        engine.reset();
        assert_eq!(engine.state().last_event_time(), None);
        assert_eq!(engine.observe(&p("wave", 0.9), at(1)), Decision::Pending { votes: 1 });
    }
}
