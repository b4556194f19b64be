//! Detection metadata probe
//!
//! Observes every batch leaving the primary inference stage and logs what
//! was detected. Buffers always pass through untouched.

use crate::assembler::Graph;
use crate::error::GraphResult;
use crate::host::PluginHost;
use crate::utils::{BatchDetections, ObjectDetection};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};

/// Pad of the primary inference stage that carries batches downstream
pub const PROBE_PAD: &str = "src";

/// Something worth reporting about one batch
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeEvent {
    /// The buffer carried no batch metadata
    MissingMetadata,
    NoDetections {
        source_id: u32,
        frame_num: i32,
    },
    Object {
        source_id: u32,
        frame_num: i32,
        detection: ObjectDetection,
    },
}

impl ProbeEvent {
    /// Log level the event is reported at
    pub fn level(&self) -> Level {
        match self {
            ProbeEvent::MissingMetadata => Level::WARN,
            ProbeEvent::NoDetections { .. } | ProbeEvent::Object { .. } => Level::INFO,
        }
    }
}

impl fmt::Display for ProbeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeEvent::MissingMetadata => write!(f, "No batch metadata found"),
            ProbeEvent::NoDetections {
                source_id,
                frame_num,
            } => write!(
                f,
                "Source {} frame {}: No detections found",
                source_id, frame_num
            ),
            ProbeEvent::Object {
                source_id,
                frame_num,
                detection,
            } => write!(f, "Source {} frame {}: {}", source_id, frame_num, detection),
        }
    }
}

/// Turn a batch into the events to report, in frame then object order
pub fn inspect_batch(batch: Option<&BatchDetections>) -> Vec<ProbeEvent> {
    let Some(batch) = batch else {
        return vec![ProbeEvent::MissingMetadata];
    };

    let mut events = Vec::new();
    for frame in &batch.frames {
        if frame.objects.is_empty() {
            events.push(ProbeEvent::NoDetections {
                source_id: frame.source_id,
                frame_num: frame.frame_num,
            });
            continue;
        }
        events.extend(frame.objects.iter().map(|detection| ProbeEvent::Object {
            source_id: frame.source_id,
            frame_num: frame.frame_num,
            detection: detection.clone(),
        }));
    }
    events
}

/// Counters updated from the streaming thread
#[derive(Debug, Default)]
pub struct ProbeStats {
    batches: AtomicU64,
    frames: AtomicU64,
    objects: AtomicU64,
    missing_metadata: AtomicU64,
}

/// Point-in-time copy of [`ProbeStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeSnapshot {
    pub batches: u64,
    pub frames: u64,
    pub objects: u64,
    pub missing_metadata: u64,
}

impl ProbeStats {
    pub fn record(&self, batch: Option<&BatchDetections>) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        match batch {
            Some(batch) => {
                self.frames
                    .fetch_add(batch.frames.len() as u64, Ordering::Relaxed);
                self.objects
                    .fetch_add(batch.object_count() as u64, Ordering::Relaxed);
            }
            None => {
                self.missing_metadata.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> ProbeSnapshot {
        ProbeSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            objects: self.objects.load(Ordering::Relaxed),
            missing_metadata: self.missing_metadata.load(Ordering::Relaxed),
        }
    }
}

/// Buffer observer for the primary inference output
#[derive(Debug, Default)]
pub struct MetadataProbe {
    stats: Arc<ProbeStats>,
}

impl MetadataProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<ProbeStats> {
        self.stats.clone()
    }

    /// Record and log one batch
    pub fn observe(&self, batch: Option<&BatchDetections>) {
        self.stats.record(batch);

        for event in inspect_batch(batch) {
            if event.level() == Level::WARN {
                warn!("{}", event);
            } else {
                info!("{}", event);
            }
        }
    }

    /// Register on the primary inference output and hand back the live counters.
    ///
    /// Nothing is registered when the host cannot decode batch metadata; the
    /// counters then stay at zero.
    pub fn attach<H: PluginHost>(self, host: &H, graph: &Graph<H>) -> GraphResult<Arc<ProbeStats>> {
        let stats = self.stats();
        if !host.reads_batch_metadata() {
            warn!("Batch metadata reader not built in, detections will not be logged");
            return Ok(stats);
        }

        let probe = Arc::new(self);
        host.add_batch_probe(
            graph.primary(),
            PROBE_PAD,
            Arc::new(move |batch: Option<&BatchDetections>| probe.observe(batch)),
        )?;
        Ok(stats)
    }
}
