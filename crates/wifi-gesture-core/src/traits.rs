//! Core trait definitions for the WiFi-Gesture system.
//!
//! The real-time pipeline is assembled from three seams:
//!
//! - [`LineSource`]: A line-oriented sensor transport (serial port, replay file)
//! - [`GestureClassifier`]: A trained model mapping a feature vector to class
//!   probabilities
//! - [`EventSink`]: A consumer of de-bounced gesture events
//!
//! Each seam can be replaced by a scripted implementation in tests.

use std::time::Duration;

use crate::error::{ClassifierError, TransportError};
use crate::types::{ClassProbabilities, FeatureVector, GestureEvent, Prediction};

/// Result of a single [`LineSource::read_line`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// One complete line, without its terminator.
    Line(String),
    /// The timeout elapsed with no complete line available.
    Idle,
    /// The source is exhausted and will produce no further lines.
    EndOfStream,
}

/// A blocking, line-oriented sensor transport.
///
/// Implementations must return within roughly `timeout` so the driver can
/// observe stop requests and publish status between reads.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use wifi_gesture_core::{LineRead, LineSource};
///
/// fn drain(source: &mut impl LineSource) -> usize {
///     let mut n = 0;
///     while let Ok(read) = source.read_line(Duration::from_secs(1)) {
///         match read {
///             LineRead::Line(_) => n += 1,
///             LineRead::Idle => continue,
///             LineRead::EndOfStream => break,
///         }
///     }
///     n
/// }
/// ```
pub trait LineSource: Send {
    /// Reads the next line, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport failed. [`TransportError::is_retryable`]
    /// tells the caller whether to keep reading.
    fn read_line(&mut self, timeout: Duration) -> Result<LineRead, TransportError>;

    /// Releases the transport. Calling `close` more than once is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying handle failed to close cleanly.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Human-readable description used in logs.
    fn describe(&self) -> String {
        "line source".to_string()
    }
}

impl<T: LineSource + ?Sized> LineSource for Box<T> {
    fn read_line(&mut self, timeout: Duration) -> Result<LineRead, TransportError> {
        (**self).read_line(timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// A trained gesture model.
///
/// The model is used read-only for the whole session, so implementations
/// are shared between threads.
pub trait GestureClassifier: Send + Sync {
    /// Number of features the model was trained on.
    fn n_features(&self) -> usize;

    /// Class labels in the model's order.
    fn labels(&self) -> &[String];

    /// Per-class probabilities for one feature vector, in [`labels`](Self::labels)
    /// order.
    fn class_probabilities(&self, features: &FeatureVector) -> ClassProbabilities;

    /// The arg-max prediction. Its confidence is the maximum class probability.
    fn classify(&self, features: &FeatureVector) -> Prediction {
        self.class_probabilities(features).to_prediction()
    }
}

/// Checks that `classifier` can be fed vectors of `expected` features.
///
/// # Errors
///
/// Returns [`ClassifierError::NoClasses`] if the model has no labels and
/// [`ClassifierError::ArityMismatch`] if the feature counts differ.
pub fn ensure_arity(
    classifier: &dyn GestureClassifier,
    expected: usize,
) -> Result<(), ClassifierError> {
    if classifier.labels().is_empty() {
        return Err(ClassifierError::NoClasses);
    }
    let actual = classifier.n_features();
    if actual != expected {
        return Err(ClassifierError::ArityMismatch { expected, actual });
    }
    Ok(())
}

/// A consumer of gesture events.
pub trait EventSink: Send {
    /// Delivers one event. Sinks must not block the detection loop.
    fn emit(&mut self, event: &GestureEvent);
}

impl EventSink for std::sync::mpsc::Sender<GestureEvent> {
    fn emit(&mut self, event: &GestureEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

impl<F> EventSink for F
where
    F: FnMut(&GestureEvent) + Send,
{
    fn emit(&mut self, event: &GestureEvent) {
        self(event);
    }
}
