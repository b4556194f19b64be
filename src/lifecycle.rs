//! Running an assembled graph
//!
//! The pipeline is started, the calling thread blocks until an interrupt,
//! end of stream or a pipeline error, and the pipeline is always torn down
//! to NULL before returning.

use crate::assembler::{assemble, Graph};
use crate::config::{CameraList, PipelineSettings};
use crate::error::{GraphError, GraphResult};
use crate::host::{PipelineState, PluginHost, WaitOutcome};
use crate::probe::{MetadataProbe, ProbeSnapshot};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped by the shutdown flag
    Interrupted,
    EndOfStream,
    /// The framework reported a fatal error while running
    PipelineError(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::PipelineError(_))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Interrupted => write!(f, "interrupted"),
            RunOutcome::EndOfStream => write!(f, "end of stream"),
            RunOutcome::PipelineError(msg) => write!(f, "pipeline error: {}", msg),
        }
    }
}

/// Set a shared flag on Ctrl+C. Can be installed once per process.
pub fn install_interrupt_handler() -> GraphResult<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, stopping pipeline");
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| GraphError::Pipeline(format!("Unable to install Ctrl+C handler: {}", e)))?;
    Ok(shutdown)
}

/// Start the graph and block until it stops
pub fn run<H: PluginHost>(
    host: &H,
    graph: &Graph<H>,
    shutdown: &AtomicBool,
) -> GraphResult<RunOutcome> {
    let pipeline = graph.pipeline();

    info!("Starting pipeline");
    if let Err(e) = host.set_state(pipeline, PipelineState::Playing) {
        error!("Unable to set the pipeline to the playing state");
        if let Err(teardown) = host.set_state(pipeline, PipelineState::Null) {
            warn!("Teardown after failed start also failed: {}", teardown);
        }
        return Err(e);
    }

    let waited = host.wait(pipeline, shutdown);

    info!("Stopping pipeline");
    let teardown = host.set_state(pipeline, PipelineState::Null);

    let waited = match waited {
        Ok(waited) => waited,
        Err(e) => {
            if let Err(teardown) = teardown {
                warn!("Teardown after failed wait also failed: {}", teardown);
            }
            return Err(e);
        }
    };
    teardown?;

    let outcome = match waited {
        WaitOutcome::Interrupted => RunOutcome::Interrupted,
        WaitOutcome::EndOfStream => {
            info!("End of stream");
            RunOutcome::EndOfStream
        }
        WaitOutcome::Error(msg) => {
            error!("Pipeline error: {}", msg);
            RunOutcome::PipelineError(msg)
        }
    };
    Ok(outcome)
}

/// Assemble, probe and run the graph for `cameras`
pub fn launch<H: PluginHost>(
    host: &H,
    cameras: &CameraList,
    settings: &PipelineSettings,
    shutdown: &AtomicBool,
) -> GraphResult<(RunOutcome, ProbeSnapshot)> {
    let graph = assemble(host, cameras, settings)?;
    let stats = MetadataProbe::new().attach(host, &graph)?;

    let outcome = run(host, &graph, shutdown)?;
    let snapshot = stats.snapshot();
    info!(
        batches = snapshot.batches,
        objects = snapshot.objects,
        "Pipeline finished: {}",
        outcome
    );
    Ok((outcome, snapshot))
}
