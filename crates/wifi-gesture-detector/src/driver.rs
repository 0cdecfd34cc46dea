//! Stream driver: the blocking read → process → decide loop.
//!
//! The driver reads lines from a [`LineSource`] with a bounded timeout,
//! pushes each through the [`GesturePipeline`], forwards fired events to its
//! sinks and keeps the status snapshot current. It stops when
//!
//! - a [`StopHandle`] is triggered (checked between reads),
//! - the source reports end of stream, or
//! - the source fails with a non-retryable error.
//!
//! The source is always closed before [`StreamDriver::run`] returns, on
//! every path including unwinding.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use wifi_gesture_core::{EventSink, LineRead, LineSource, TransportError};

use crate::config::DetectorConfig;
use crate::decision::Decision;
use crate::pipeline::{GesturePipeline, LineOutcome};
use crate::status::{LatestPrediction, StatusPublisher};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// A stop was requested.
    Stopped,
    /// The source ran out of lines.
    EndOfStream,
    /// The source failed and cannot continue.
    TransportFailed {
        /// Error description
        message: String,
    },
}

impl StopReason {
    /// Whether the session ended because of a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::TransportFailed { .. })
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStats {
    /// Complete lines read from the source
    pub lines_read: u64,
    /// Lines dropped by the frame parser, keyed by reason
    pub frames_rejected: BTreeMap<String, u64>,
    /// Parsed lines that produced no features
    pub samples_skipped: u64,
    /// Lines that reached the classifier
    pub samples_processed: u64,
    /// Events fired
    pub events_fired: u64,
    /// Retryable transport errors seen
    pub transient_errors: u64,
}

impl DriverStats {
    /// Total rejected frames over all reasons.
    pub fn frames_rejected_total(&self) -> u64 {
        self.frames_rejected.values().sum()
    }
}

/// Result of [`StreamDriver::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Why the session ended
    pub reason: StopReason,
    /// Session counters
    pub stats: DriverStats,
}

/// Cooperative stop flag shared with the driver.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// A fresh, untriggered handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the driver to stop after the current read.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Closes the wrapped source when dropped.
struct TransportGuard {
    source: Box<dyn LineSource>,
}

impl TransportGuard {
    fn read_line(&mut self, timeout: Duration) -> Result<LineRead, TransportError> {
        self.source.read_line(timeout)
    }
}

impl Drop for TransportGuard {
    fn drop(&mut self) {
        match self.source.close() {
            Ok(()) => debug!(source = %self.source.describe(), "Closed line source"),
            Err(e) => warn!(source = %self.source.describe(), error = %e, "Failed to close line source"),
        }
    }
}

type Clock = Box<dyn FnMut() -> DateTime<Utc> + Send>;

/// Wall-clock timestamps that advance with [`Instant`], so a system clock
/// step during a session cannot move the decision engine's time backwards.
pub fn monotonic_clock() -> impl FnMut() -> DateTime<Utc> + Send {
    let anchor = Utc::now();
    let origin = Instant::now();
    move || {
        chrono::Duration::from_std(origin.elapsed())
            .ok()
            .and_then(|elapsed| anchor.checked_add_signed(elapsed))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Drives one detection session.
pub struct StreamDriver {
    pipeline: GesturePipeline,
    sinks: Vec<Box<dyn EventSink>>,
    status: Option<StatusPublisher>,
    stop: StopHandle,
    clock: Clock,
    read_timeout: Duration,
    status_interval: Duration,
    stats: DriverStats,
}

impl StreamDriver {
    /// Create a driver using the timing from `config`.
    pub fn new(pipeline: GesturePipeline, config: &DetectorConfig) -> Self {
        Self {
            pipeline,
            sinks: Vec::new(),
            status: None,
            stop: StopHandle::new(),
            clock: Box::new(monotonic_clock()),
            read_timeout: config.read_timeout(),
            status_interval: config.status_interval(),
            stats: DriverStats::default(),
        }
    }

    /// Add an event sink.
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Publish status through `publisher`.
    pub fn with_status(mut self, publisher: StatusPublisher) -> Self {
        self.status = Some(publisher);
        self
    }

    /// Use an externally owned stop flag.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Replace the clock used to timestamp predictions.
    pub fn with_clock(mut self, clock: impl FnMut() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Handle that stops this driver.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run until stopped, end of stream, or transport failure.
    pub fn run(mut self, source: Box<dyn LineSource>) -> SessionReport {
        let description = source.describe();
        let started_at = (self.clock)();
        info!(source = %description, "Detection started");
        self.update_status(|s| {
            s.running = true;
            s.started_at = Some(started_at);
            s.stop_reason = None;
            s.samples_processed = 0;
            s.frames_rejected = 0;
            s.detections = 0;
        });

        let mut guard = TransportGuard { source };
        let mut last_report = Instant::now();

        let reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }
            match guard.read_line(self.read_timeout) {
                Ok(LineRead::Line(line)) => {
                    self.stats.lines_read += 1;
                    self.handle_line(&line);
                }
                Ok(LineRead::Idle) => {}
                Ok(LineRead::EndOfStream) => break StopReason::EndOfStream,
                Err(e) if e.is_retryable() => {
                    self.stats.transient_errors += 1;
                    warn!(error = %e, "Transient read error");
                }
                Err(e) => {
                    error!(source = %description, error = %e, "Line source failed");
                    break StopReason::TransportFailed {
                        message: e.to_string(),
                    };
                }
            }

            if last_report.elapsed() >= self.status_interval {
                self.log_status();
                last_report = Instant::now();
            }
        };
        drop(guard);

        info!(
            ?reason,
            lines = self.stats.lines_read,
            samples = self.stats.samples_processed,
            events = self.stats.events_fired,
            "Detection stopped"
        );
        let stop_reason = reason.clone();
        self.update_status(|s| {
            s.running = false;
            s.stop_reason = Some(stop_reason);
        });

        SessionReport {
            reason,
            stats: self.stats,
        }
    }

    fn handle_line(&mut self, line: &str) {
        let now = (self.clock)();
        match self.pipeline.process_line(line, now) {
            LineOutcome::Rejected(reason) => {
                trace!(%reason, "Rejected line");
                *self
                    .stats
                    .frames_rejected
                    .entry(reason.as_str().to_string())
                    .or_insert(0) += 1;
                self.update_status(|s| s.frames_rejected += 1);
            }
            outcome @ (LineOutcome::NoAmplitude | LineOutcome::NoFeatures) => {
                debug!(?outcome, "Sample produced no features");
                self.stats.samples_skipped += 1;
            }
            LineOutcome::Classified(c) => {
                self.stats.samples_processed += 1;
                let latest = LatestPrediction {
                    label: c.prediction.label.clone(),
                    confidence: c.prediction.confidence,
                    probabilities: c.probabilities.clone(),
                    at: now,
                };
                let event = match &c.decision {
                    Decision::Fired(event) => Some(event.clone()),
                    _ => None,
                };
                if let Some(event) = &event {
                    self.stats.events_fired += 1;
                    info!(
                        gesture = %event.label,
                        confidence = event.confidence,
                        "Gesture detected"
                    );
                    for sink in &mut self.sinks {
                        sink.emit(event);
                    }
                }
                self.update_status(move |s| {
                    s.samples_processed += 1;
                    s.latest = Some(latest);
                    if let Some(event) = event {
                        s.detections += 1;
                        s.last_event = Some(event);
                    }
                });
            }
        }
    }

    fn log_status(&self) {
        info!(
            lines = self.stats.lines_read,
            samples = self.stats.samples_processed,
            rejected = self.stats.frames_rejected_total(),
            events = self.stats.events_fired,
            "Detection status"
        );
    }

    fn update_status(&self, f: impl FnOnce(&mut crate::status::DetectionSnapshot)) {
        if let Some(status) = &self.status {
            status.update(f);
        }
    }
}

impl std::fmt::Debug for StreamDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDriver")
            .field("pipeline", &self.pipeline)
            .field("sinks", &self.sinks.len())
            .field("read_timeout", &self.read_timeout)
            .field("status_interval", &self.status_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use wifi_gesture_core::{ClassProbabilities, FeatureVector, GestureClassifier, FEATURE_COUNT};

    struct Scripted {
        reads: VecDeque<Result<LineRead, TransportError>>,
        closed: Arc<AtomicBool>,
        stop_when_empty: Option<StopHandle>,
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, _timeout: Duration) -> Result<LineRead, TransportError> {
            match self.reads.pop_front() {
                Some(read) => read,
                None => {
                    if let Some(stop) = &self.stop_when_empty {
                        stop.stop();
                    }
                    Ok(LineRead::Idle)
                }
            }
        }

        fn close(&mut self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct AlwaysWave(Vec<String>);

    impl GestureClassifier for AlwaysWave {
        fn n_features(&self) -> usize {
            FEATURE_COUNT
        }
        fn labels(&self) -> &[String] {
            &self.0
        }
        fn class_probabilities(&self, _: &FeatureVector) -> ClassProbabilities {
            ClassProbabilities::from_pairs([("no_gesture", 0.1), ("wave", 0.9)]).unwrap()
        }
    }

    fn driver() -> StreamDriver {
        let config = DetectorConfig::default();
        let classifier = Arc::new(AlwaysWave(vec!["no_gesture".into(), "wave".into()]));
        let pipeline = GesturePipeline::new(&config, classifier).unwrap();
        StreamDriver::new(pipeline, &config)
    }

    fn scripted(reads: Vec<Result<LineRead, TransportError>>) -> (Box<dyn LineSource>, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let source = Scripted {
            reads: reads.into(),
            closed: closed.clone(),
            stop_when_empty: None,
        };
        (Box::new(source), closed)
    }

    fn data() -> Result<LineRead, TransportError> {
        Ok(LineRead::Line("DATA,1,-40,[3,4,6,8]".into()))
    }

    #[test]
    fn end_of_stream_closes_and_reports() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = events.clone();
        let (source, closed) = scripted(vec![
            data(),
            Ok(LineRead::Line("garbage".into())),
            Ok(LineRead::Idle),
            data(),
            data(),
            Ok(LineRead::EndOfStream),
        ]);

        let report = driver()
            .with_sink(move |e: &wifi_gesture_core::GestureEvent| {
                sink_events.lock().unwrap().push(e.label.clone())
            })
            .run(source);

        assert_eq!(report.reason, StopReason::EndOfStream);
        assert_eq!(report.stats.lines_read, 4);
        assert_eq!(report.stats.samples_processed, 3);
        assert_eq!(report.stats.frames_rejected.get("missing_tag"), Some(&1));
        assert_eq!(report.stats.events_fired, 1);
        assert_eq!(*events.lock().unwrap(), vec!["wave".to_string()]);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn transient_errors_are_skipped_and_fatal_errors_stop() {
        let (source, closed) = scripted(vec![
            Err(TransportError::transient("framing")),
            data(),
            Err(TransportError::disconnected("unplugged")),
            data(),
        ]);
        let report = driver().run(source);
        assert!(report.reason.is_failure());
        assert_eq!(report.stats.transient_errors, 1);
        assert_eq!(report.stats.samples_processed, 1);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_handle_ends_session_and_status_follows() {
        let (publisher, reader) = crate::status::status_channel();
        let d = driver().with_status(publisher);
        let stop = d.stop_handle();
        let closed = Arc::new(AtomicBool::new(false));
        let source = Scripted {
            reads: vec![data(), data()].into(),
            closed: closed.clone(),
            stop_when_empty: Some(stop),
        };

        let report = d.run(Box::new(source));
        assert_eq!(report.reason, StopReason::Stopped);
        assert!(closed.load(Ordering::SeqCst));

        let snapshot = reader.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.samples_processed, 2);
        assert_eq!(snapshot.stop_reason, Some(StopReason::Stopped));
        assert_eq!(snapshot.latest.map(|l| l.label), Some("wave".to_string()));
        assert!(snapshot.started_at.is_some());
    }

    #[test]
    fn pre_stopped_driver_reads_nothing() {
        let d = driver();
        d.stop_handle().stop();
        let (source, closed) = scripted(vec![data()]);
        let report = d.run(source);
        assert_eq!(report.reason, StopReason::Stopped);
        assert_eq!(report.stats.lines_read, 0);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn source_is_closed_when_a_sink_panics() {
        let (source, closed) = scripted(vec![data(), data(), data(), data()]);
        let d = driver().with_sink(|_: &wifi_gesture_core::GestureEvent| {
            panic!("sink failed");
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || d.run(source)));

        assert!(result.is_err());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let before = Utc::now();
        let mut clock = monotonic_clock();
        let mut previous = clock();
        assert!(previous >= before);
        for _ in 0..1000 {
            let next = clock();
            assert!(next >= previous);
            previous = next;
        }
    }
}
