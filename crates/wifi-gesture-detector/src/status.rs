//! Detection status published by the driver.
//!
//! The driver owns the only [`StatusPublisher`]; front ends hold any number
//! of [`StatusReader`]s. Both wrap a `tokio::sync::watch` channel, so readers
//! always see the latest complete snapshot and never block the driver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use wifi_gesture_core::{ClassProbabilities, GestureEvent};

use crate::driver::StopReason;

/// Most recent classifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPrediction {
    /// Arg-max label
    pub label: String,
    /// Its probability
    pub confidence: f64,
    /// Full distribution
    pub probabilities: ClassProbabilities,
    /// When it was produced
    pub at: DateTime<Utc>,
}

/// Point-in-time view of a detection session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    /// Whether a driver is currently running
    pub running: bool,
    /// Lines that reached the classifier
    pub samples_processed: u64,
    /// Lines dropped by the frame parser
    pub frames_rejected: u64,
    /// Events fired this session
    pub detections: u64,
    /// Latest prediction, if any
    pub latest: Option<LatestPrediction>,
    /// Latest event, if any
    pub last_event: Option<GestureEvent>,
    /// Why the last session ended
    pub stop_reason: Option<StopReason>,
    /// When the current or last session started
    pub started_at: Option<DateTime<Utc>>,
}

impl DetectionSnapshot {
    /// One-line summary: `label:prob | ... | Samples: N`.
    ///
    /// Only the sample count is shown before the first prediction.
    pub fn status_line(&self) -> String {
        match &self.latest {
            Some(latest) => {
                let classes: Vec<String> = latest
                    .probabilities
                    .iter()
                    .map(|p| format!("{}:{:.2}", p.label, p.probability))
                    .collect();
                format!("{} | Samples: {}", classes.join(" | "), self.samples_processed)
            }
            None => format!("Samples: {}", self.samples_processed),
        }
    }
}

/// Create a publisher/reader pair starting from an idle snapshot.
pub fn status_channel() -> (StatusPublisher, StatusReader) {
    let (tx, rx) = watch::channel(DetectionSnapshot::default());
    (StatusPublisher { tx }, StatusReader { rx })
}

/// Write side of the status channel. Not `Clone`: there is one writer.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<DetectionSnapshot>,
}

impl StatusPublisher {
    /// Replace the snapshot.
    pub fn publish(&self, snapshot: DetectionSnapshot) {
        self.tx.send_replace(snapshot);
    }

    /// Modify the snapshot in place and notify readers.
    pub fn update(&self, f: impl FnOnce(&mut DetectionSnapshot)) {
        self.tx.send_modify(f);
    }

    /// A new reader of this channel.
    pub fn subscribe(&self) -> StatusReader {
        StatusReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the status channel.
#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<DetectionSnapshot>,
}

impl StatusReader {
    /// Copy of the latest snapshot.
    pub fn snapshot(&self) -> DetectionSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait until the snapshot changes.
    ///
    /// Returns `false` once the publisher is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_latest_snapshot() {
        let (publisher, reader) = status_channel();
        let second = reader.clone();
        assert_eq!(reader.snapshot(), DetectionSnapshot::default());

        publisher.update(|s| {
            s.running = true;
            s.samples_processed = 3;
        });
        assert!(second.snapshot().running);
        assert_eq!(reader.snapshot().samples_processed, 3);

        publisher.publish(DetectionSnapshot {
            detections: 1,
            ..DetectionSnapshot::default()
        });
        assert!(!reader.snapshot().running);
        assert_eq!(publisher.subscribe().snapshot().detections, 1);
    }

    #[tokio::test]
    async fn changed_reports_publisher_drop() {
        let (publisher, mut reader) = status_channel();
        publisher.update(|s| s.frames_rejected = 2);
        assert!(reader.changed().await);
        drop(publisher);
        assert!(!reader.changed().await);
        assert_eq!(reader.snapshot().frames_rejected, 2);
    }

    #[test]
    fn status_line_lists_every_class() {
        let mut snapshot = DetectionSnapshot {
            samples_processed: 42,
            ..DetectionSnapshot::default()
        };
        assert_eq!(snapshot.status_line(), "Samples: 42");

        snapshot.latest = Some(LatestPrediction {
            label: "wave".into(),
            confidence: 0.75,
            probabilities: ClassProbabilities::from_pairs([("circle", 0.25), ("wave", 0.75)])
                .unwrap(),
            at: Utc::now(),
        });
        assert_eq!(snapshot.status_line(), "circle:0.25 | wave:0.75 | Samples: 42");
    }

    #[test]
    fn snapshot_serializes_for_the_api() {
        let json = serde_json::to_value(DetectionSnapshot::default()).unwrap();
        assert_eq!(json["running"], false);
        assert!(json["latest"].is_null());
    }
}
