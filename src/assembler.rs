//! Pipeline assembly
//!
//! Builds the full processing graph:
//!
//! ```text
//! source-bin-00 ─┐
//! source-bin-01 ─┼─> stream-muxer -> primary-inference [-> secondary-inference]
//! source-bin-NN ─┘       -> onscreendisplay -> convertor -> video-output
//! ```

use crate::config::{CameraList, ConfigError, PipelineSettings};
use crate::error::GraphResult;
use crate::host::PluginHost;
use crate::source::{build_source, SourceBin, GHOST_PAD};
use tracing::{debug, info, warn};

pub const PIPELINE_NAME: &str = "multi-source-pipeline";
pub const MUXER_NAME: &str = "stream-muxer";
pub const PRIMARY_NAME: &str = "primary-inference";
pub const SECONDARY_NAME: &str = "secondary-inference";
pub const OSD_NAME: &str = "onscreendisplay";
pub const CONVERTER_NAME: &str = "convertor";
pub const SINK_NAME: &str = "video-output";

/// Muxer request pad for the camera at `index`
pub fn muxer_pad_name(index: usize) -> String {
    format!("sink_{}", index)
}

/// An assembled, not yet running, processing graph
pub struct Graph<H: PluginHost> {
    pipeline: H::Element,
    muxer: H::Element,
    primary: H::Element,
    secondary: Option<H::Element>,
    osd: H::Element,
    converter: H::Element,
    sink: H::Element,
    sources: Vec<SourceBin<H>>,
    live: bool,
}

impl<H: PluginHost> Graph<H> {
    pub fn pipeline(&self) -> &H::Element {
        &self.pipeline
    }

    pub fn muxer(&self) -> &H::Element {
        &self.muxer
    }

    /// The primary inference stage, where the metadata probe attaches
    pub fn primary(&self) -> &H::Element {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&H::Element> {
        self.secondary.as_ref()
    }

    pub fn osd(&self) -> &H::Element {
        &self.osd
    }

    pub fn converter(&self) -> &H::Element {
        &self.converter
    }

    pub fn sink(&self) -> &H::Element {
        &self.sink
    }

    pub fn sources(&self) -> &[SourceBin<H>] {
        &self.sources
    }

    /// Whether at least one camera is a live stream
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Elements from the muxer to the sink, in link order
    fn chain(&self) -> Vec<&H::Element> {
        let mut chain = vec![&self.muxer, &self.primary];
        chain.extend(self.secondary.as_ref());
        chain.extend([&self.osd, &self.converter, &self.sink]);
        chain
    }
}

impl<H: PluginHost> std::fmt::Debug for Graph<H>
where
    H::Element: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("pipeline", &self.pipeline)
            .field("muxer", &self.muxer)
            .field("primary", &self.primary)
            .field("secondary", &self.secondary)
            .field("osd", &self.osd)
            .field("converter", &self.converter)
            .field("sink", &self.sink)
            .field("sources", &self.sources.len())
            .field("live", &self.live)
            .finish()
    }
}

fn make_muxer<H: PluginHost>(
    host: &H,
    cameras: &CameraList,
    settings: &PipelineSettings,
) -> GraphResult<H::Element> {
    let muxer = host.make_element("nvstreammux", MUXER_NAME)?;
    host.set_property(&muxer, "batch-size", &cameras.len().into())?;
    host.set_property(&muxer, "width", &settings.muxer.width.into())?;
    host.set_property(&muxer, "height", &settings.muxer.height.into())?;
    host.set_property(
        &muxer,
        "batched-push-timeout",
        &settings.muxer.batched_push_timeout.into(),
    )?;
    Ok(muxer)
}

/// Build the graph for `cameras` with every element added and linked
pub fn assemble<H: PluginHost>(
    host: &H,
    cameras: &CameraList,
    settings: &PipelineSettings,
) -> GraphResult<Graph<H>> {
    if cameras.is_empty() {
        return Err(ConfigError::InvalidValue("at least one camera is required".to_string()).into());
    }
    settings.validate()?;

    info!("Creating pipeline for {} cameras", cameras.len());
    let pipeline = host.create_pipeline(PIPELINE_NAME)?;

    let muxer = make_muxer(host, cameras, settings)?;
    host.add(&pipeline, &muxer)?;

    let mut sources = Vec::with_capacity(cameras.len());
    for camera in cameras {
        let source = build_source(host, camera, &settings.source)?;
        host.add(&pipeline, source.element())?;

        let pad = muxer_pad_name(camera.index);
        host.request_pad(&muxer, &pad)?;
        host.link_pads(source.element(), GHOST_PAD, &muxer, &pad)?;
        debug!("Linked {} to {}:{}", source.name(), MUXER_NAME, pad);

        sources.push(source);
    }

    let live = cameras.any_live();
    if live {
        info!("At least one source is live");
        host.set_property(&muxer, "live-source", &true.into())?;
    }

    info!("Creating inference, display and output elements");
    let primary = host.make_element("nvinfer", PRIMARY_NAME)?;
    host.set_property(
        &primary,
        "config-file-path",
        &settings.inference.primary_config.as_path().into(),
    )?;

    let secondary = match settings.inference.secondary() {
        Some(config) => {
            let secondary = host.make_element("nvinfer", SECONDARY_NAME)?;
            host.set_property(&secondary, "config-file-path", &config.into())?;
            Some(secondary)
        }
        None => {
            info!("Secondary inference disabled");
            None
        }
    };

    let osd = host.make_element("nvdsosd", OSD_NAME)?;
    host.set_property(&osd, "process-mode", &settings.display.process_mode.into())?;
    host.set_property(&osd, "display-text", &settings.display.display_text.into())?;

    let converter = host.make_element("nvvideoconvert", CONVERTER_NAME)?;

    let sink = host.make_element("nveglglessink", SINK_NAME)?;
    host.set_property(&sink, "sync", &settings.display.sync.into())?;

    // The encoder stage these would configure is not part of the graph
    warn!(
        "Output codec {} at {} bps is not applied to any element",
        settings.output.codec, settings.output.bitrate
    );

    let graph = Graph {
        pipeline,
        muxer,
        primary,
        secondary,
        osd,
        converter,
        sink,
        sources,
        live,
    };

    for element in graph.chain().into_iter().skip(1) {
        host.add(&graph.pipeline, element)?;
    }

    info!("Linking elements in the pipeline");
    for pair in graph.chain().windows(2) {
        host.link(pair[0], pair[1])?;
    }

    Ok(graph)
}
