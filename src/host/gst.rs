//! GStreamer plugin host

use super::{
    BatchObserver, ChildAddedHandler, MediaType, PadAddedHandler, PipelineState, PluginHost,
    PropertyValue, WaitOutcome,
};
use crate::error::{GraphError, GraphResult};
use crate::utils::BatchDetections;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// How long the bus is polled before the shutdown flag is checked again
const BUS_POLL_MS: u64 = 100;

/// Plugin host backed by the process-wide GStreamer registry
#[derive(Clone, Debug)]
pub struct GstHost {
    _initialized: (),
}

impl GstHost {
    /// Initialize GStreamer
    pub fn new() -> GraphResult<Self> {
        gst::init().map_err(|e| GraphError::Pipeline(format!("GStreamer init failed: {}", e)))?;
        Ok(Self { _initialized: () })
    }
}

fn as_bin(element: &gst::Element) -> GraphResult<&gst::Bin> {
    element
        .downcast_ref::<gst::Bin>()
        .ok_or_else(|| GraphError::Pipeline(format!("{} is not a bin", element.name())))
}

/// Describe the media carried by a pad's caps
fn media_type(caps: &gst::CapsRef) -> MediaType {
    let name = caps
        .structure(0)
        .map(|s| s.name().to_string())
        .unwrap_or_default();
    let features: Vec<String> = caps
        .features(0)
        .map(|f| f.iter().map(|feature| feature.to_string()).collect())
        .unwrap_or_default();
    MediaType::new(name, features)
}

#[cfg(feature = "deepstream")]
fn read_batch(buffer: &gst::BufferRef) -> Option<BatchDetections> {
    crate::deepstream::read_batch(buffer)
}

// Never reached through `MetadataProbe`, which checks `reads_batch_metadata` first
#[cfg(not(feature = "deepstream"))]
fn read_batch(_buffer: &gst::BufferRef) -> Option<BatchDetections> {
    None
}

impl From<PipelineState> for gst::State {
    fn from(state: PipelineState) -> Self {
        match state {
            PipelineState::Null => gst::State::Null,
            PipelineState::Ready => gst::State::Ready,
            PipelineState::Paused => gst::State::Paused,
            PipelineState::Playing => gst::State::Playing,
        }
    }
}

impl PluginHost for GstHost {
    type Element = gst::Element;
    type Pad = gst::Pad;

    fn create_pipeline(&self, name: &str) -> GraphResult<gst::Element> {
        Ok(gst::Pipeline::builder().name(name).build().upcast())
    }

    fn create_bin(&self, name: &str) -> GraphResult<gst::Element> {
        Ok(gst::Bin::builder().name(name).build().upcast())
    }

    fn make_element(&self, factory: &str, name: &str) -> GraphResult<gst::Element> {
        gst::ElementFactory::make(factory)
            .name(name)
            .build()
            .map_err(|_| GraphError::creation(factory, name))
    }

    fn element_name(&self, element: &gst::Element) -> String {
        element.name().to_string()
    }

    fn has_property(&self, element: &gst::Element, property: &str) -> bool {
        element.find_property(property).is_some()
    }

    fn set_property(
        &self,
        element: &gst::Element,
        property: &str,
        value: &PropertyValue,
    ) -> GraphResult<()> {
        let failure = |reason: String| GraphError::Property {
            element: element.name().to_string(),
            property: property.to_string(),
            reason,
        };

        let pspec = element
            .find_property(property)
            .ok_or_else(|| failure("no such property".to_string()))?;

        // Deserializing against the declared type covers enums and unsigned ints
        let value = glib::Value::deserialize(&value.to_string(), pspec.value_type())
            .map_err(|e| failure(e.to_string()))?;

        element.set_property_from_value(property, &value);
        Ok(())
    }

    fn add(&self, bin: &gst::Element, child: &gst::Element) -> GraphResult<()> {
        as_bin(bin)?.add(child).map_err(|e| {
            GraphError::Pipeline(format!(
                "Unable to add {} to {}: {}",
                child.name(),
                bin.name(),
                e
            ))
        })
    }

    fn add_ghost_pad(&self, bin: &gst::Element, name: &str) -> GraphResult<()> {
        let ghost = gst::GhostPad::builder(gst::PadDirection::Src)
            .name(name)
            .build();
        bin.add_pad(&ghost).map_err(|e| {
            GraphError::Pipeline(format!(
                "Failed to add ghost pad in {}: {}",
                bin.name(),
                e
            ))
        })
    }

    fn set_ghost_target(
        &self,
        bin: &gst::Element,
        name: &str,
        target: &gst::Pad,
    ) -> GraphResult<()> {
        let ghost = bin
            .static_pad(name)
            .and_then(|pad| pad.downcast::<gst::GhostPad>().ok())
            .ok_or_else(|| GraphError::PadBind {
                bin: bin.name().to_string(),
                reason: format!("no ghost pad named {}", name),
            })?;

        ghost
            .set_target(Some(target))
            .map_err(|e| GraphError::PadBind {
                bin: bin.name().to_string(),
                reason: e.to_string(),
            })
    }

    fn request_pad(&self, element: &gst::Element, name: &str) -> GraphResult<()> {
        element
            .request_pad_simple(name)
            .map(|_| ())
            .ok_or_else(|| GraphError::PadRequest {
                element: element.name().to_string(),
                pad: name.to_string(),
            })
    }

    fn link(&self, src: &gst::Element, sink: &gst::Element) -> GraphResult<()> {
        src.link(sink)
            .map_err(|_| GraphError::link(src.name().as_str(), sink.name().as_str()))
    }

    fn link_pads(
        &self,
        src: &gst::Element,
        src_pad: &str,
        sink: &gst::Element,
        sink_pad: &str,
    ) -> GraphResult<()> {
        let from = format!("{}:{}", src.name(), src_pad);
        let to = format!("{}:{}", sink.name(), sink_pad);

        let (Some(src_pad), Some(sink_pad)) = (src.static_pad(src_pad), sink.static_pad(sink_pad))
        else {
            return Err(GraphError::link(from, to));
        };

        src_pad
            .link(&sink_pad)
            .map(|_| ())
            .map_err(|_| GraphError::link(from, to))
    }

    fn connect_pad_added(&self, element: &gst::Element, handler: PadAddedHandler<Self>) {
        element.connect_pad_added(move |_element, pad| {
            let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
            let media = media_type(&caps);
            handler(pad, &media);
        });
    }

    fn connect_child_added(&self, element: &gst::Element, handler: ChildAddedHandler<Self>) {
        if element.dynamic_cast_ref::<gst::ChildProxy>().is_none() {
            warn!(element = %element.name(), "element has no children to watch");
            return;
        }

        element.connect("child-added", false, move |values| {
            let child = values
                .get(1)
                .and_then(|v| v.get::<glib::Object>().ok())
                .and_then(|obj| obj.downcast::<gst::Element>().ok());
            let name = values.get(2).and_then(|v| v.get::<String>().ok());

            if let (Some(child), Some(name)) = (child, name) {
                handler(&child, &name);
            }
            None
        });
    }

    fn reads_batch_metadata(&self) -> bool {
        cfg!(feature = "deepstream")
    }

    fn add_batch_probe(
        &self,
        element: &gst::Element,
        pad: &str,
        observer: BatchObserver,
    ) -> GraphResult<()> {
        let pad = element.static_pad(pad).ok_or_else(|| {
            GraphError::Pipeline(format!(
                "Unable to get {} pad of {}",
                pad,
                element.name()
            ))
        })?;

        pad.add_probe(gst::PadProbeType::BUFFER, move |_pad, info| {
            let batch = info.buffer().and_then(read_batch);
            observer(batch.as_ref());
            gst::PadProbeReturn::Ok
        });

        Ok(())
    }

    fn set_state(&self, pipeline: &gst::Element, state: PipelineState) -> GraphResult<()> {
        pipeline
            .set_state(state.into())
            .map(|_| ())
            .map_err(|_| GraphError::StateChange {
                state: state.to_string(),
            })
    }

    fn wait(&self, pipeline: &gst::Element, shutdown: &AtomicBool) -> GraphResult<WaitOutcome> {
        let bus = pipeline
            .bus()
            .ok_or_else(|| GraphError::Pipeline("pipeline has no bus".to_string()))?;

        loop {
            if shutdown.load(Ordering::SeqCst) {
                return Ok(WaitOutcome::Interrupted);
            }

            let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(BUS_POLL_MS)) else {
                continue;
            };

            match msg.view() {
                gst::MessageView::Eos(..) => return Ok(WaitOutcome::EndOfStream),
                gst::MessageView::Error(err) => {
                    let source = err
                        .src()
                        .map(|s| s.path_string().to_string())
                        .unwrap_or_default();
                    return Ok(WaitOutcome::Error(format!(
                        "{} from {} ({:?})",
                        err.error(),
                        source,
                        err.debug()
                    )));
                }
                gst::MessageView::Warning(w) => {
                    warn!("Pipeline warning: {} ({:?})", w.error(), w.debug());
                }
                gst::MessageView::StateChanged(state_changed) => {
                    if state_changed.src().map(|s| s == pipeline).unwrap_or(false) {
                        debug!(
                            "Pipeline state changed from {:?} to {:?}",
                            state_changed.old(),
                            state_changed.current()
                        );
                    }
                }
                _ => {}
            }
        }
    }
}
