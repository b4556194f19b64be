//! Per-camera source bins
//!
//! A source bin wraps one decoding element behind a `src` ghost pad. The
//! decoder only creates its output pad once it has inspected the stream, so
//! the ghost pad starts without a target and is bound from the decoder's
//! pad-added callback. Binding happens at most once per bin.

use crate::config::{Camera, ConfigError, DecoderStrategy, SourceSettings};
use crate::error::{GraphError, GraphResult};
use crate::host::{MediaType, PluginHost, PropertyValue};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Name of the ghost pad every source bin exposes
pub const GHOST_PAD: &str = "src";

/// Name of the decoding element inside each bin
pub const DECODER_NAME: &str = "uri-decode-bin";

/// `nvurisrcbin` source type used for live network streams
const LIVE_SOURCE_TYPE: u32 = 4;

/// Binding progress of a bin's ghost pad
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    /// Waiting for the decoder to announce a usable pad
    Pending,
    Bound,
    Failed(String),
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingState::Pending => write!(f, "pending"),
            BindingState::Bound => write!(f, "bound"),
            BindingState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// One-shot binding of a ghost pad, shared with the decoder callback
#[derive(Debug)]
pub struct PadBinding {
    state: Mutex<BindingState>,
}

impl Default for PadBinding {
    fn default() -> Self {
        Self {
            state: Mutex::new(BindingState::Pending),
        }
    }
}

impl PadBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BindingState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `bind` and move to `Bound`, or to `Failed` if it errors.
    ///
    /// Only allowed from `Pending`.
    pub fn bind_with<F>(&self, bin: &str, bind: F) -> GraphResult<()>
    where
        F: FnOnce() -> GraphResult<()>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != BindingState::Pending {
            return Err(GraphError::PadBind {
                bin: bin.to_string(),
                reason: format!("output already {}", state),
            });
        }

        match bind() {
            Ok(()) => {
                *state = BindingState::Bound;
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                *state = BindingState::Failed(reason.clone());
                Err(GraphError::PadBind {
                    bin: bin.to_string(),
                    reason,
                })
            }
        }
    }

    /// Move from `Pending` to `Failed`
    pub fn fail(&self, bin: &str, reason: &str) -> GraphResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != BindingState::Pending {
            return Err(GraphError::PadBind {
                bin: bin.to_string(),
                reason: format!("output already {}", state),
            });
        }
        *state = BindingState::Failed(reason.to_string());
        Err(GraphError::PadBind {
            bin: bin.to_string(),
            reason: reason.to_string(),
        })
    }
}

/// What to do with a pad announced by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadDecision {
    /// Video in accelerated memory: bind the ghost pad to it
    Bind,
    /// Video the accelerated decoder did not produce
    WrongMemory,
    /// Not video
    Ignore,
}

pub fn classify_pad(media: &MediaType) -> PadDecision {
    if !media.is_video() {
        PadDecision::Ignore
    } else if media.has_accelerated_memory() {
        PadDecision::Bind
    } else {
        PadDecision::WrongMemory
    }
}

/// Tuning applied to elements the decoder creates internally
#[derive(Debug, Clone, PartialEq)]
pub enum ChildAction {
    /// The child is itself a decode bin; watch its children too
    WatchChildren,
    SetProperty(&'static str, PropertyValue),
    /// Set only if the child exposes the property
    SetIfSupported(&'static str, PropertyValue),
}

/// Decide how to tune a child element from its name
pub fn child_added_actions(name: &str, aarch64: bool, settings: &SourceSettings) -> Vec<ChildAction> {
    let mut actions = Vec::new();

    if name.contains("decodebin") {
        actions.push(ChildAction::WatchChildren);
    }

    // Unified memory keeps decoded frames reachable from the CPU on dGPU hosts
    if !aarch64 && name.contains("nvv4l2decoder") {
        actions.push(ChildAction::SetProperty(
            "cudadec-memtype",
            settings.cudadec_memtype.into(),
        ));
    }

    if name.contains("source") {
        actions.push(ChildAction::SetIfSupported("drop-on-latency", true.into()));
    }

    actions
}

fn is_aarch64() -> bool {
    std::env::consts::ARCH == "aarch64"
}

fn watch_children<H: PluginHost>(host: &H, element: &H::Element, settings: Arc<SourceSettings>) {
    let handler_host = host.clone();
    host.connect_child_added(
        element,
        Arc::new(move |child: &H::Element, name: &str| {
            debug!("Decodebin child added: {}", name);
            for action in child_added_actions(name, is_aarch64(), &settings) {
                let result = match action {
                    ChildAction::WatchChildren => {
                        watch_children(&handler_host, child, settings.clone());
                        Ok(())
                    }
                    ChildAction::SetProperty(property, value) => {
                        handler_host.set_property(child, property, &value)
                    }
                    ChildAction::SetIfSupported(property, value) => {
                        if handler_host.has_property(child, property) {
                            handler_host.set_property(child, property, &value)
                        } else {
                            Ok(())
                        }
                    }
                };
                if let Err(e) = result {
                    warn!("Unable to tune {}: {}", name, e);
                }
            }
        }),
    );
}

fn on_new_pad<H: PluginHost>(
    host: &H,
    bin: &H::Element,
    bin_name: &str,
    binding: &PadBinding,
    pad: &H::Pad,
    media: &MediaType,
    strict_memory: bool,
) -> GraphResult<()> {
    debug!(bin = bin_name, "decoder announced {}", media);

    match classify_pad(media) {
        PadDecision::Ignore => Ok(()),
        PadDecision::Bind => {
            binding.bind_with(bin_name, || host.set_ghost_target(bin, GHOST_PAD, pad))?;
            info!(bin = bin_name, "linked decoder output to source bin");
            Ok(())
        }
        PadDecision::WrongMemory => {
            error!(
                bin = bin_name,
                "Decodebin did not pick nvidia decoder plugin ({})", media
            );
            if strict_memory {
                binding.fail(bin_name, "decoder output is not in accelerated memory")
            } else {
                Ok(())
            }
        }
    }
}

/// One camera's decoding unit
pub struct SourceBin<H: PluginHost> {
    camera: Camera,
    name: String,
    live: bool,
    bin: H::Element,
    decoder: H::Element,
    binding: Arc<PadBinding>,
}

impl<H: PluginHost> SourceBin<H> {
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// The bin to add to the pipeline
    pub fn element(&self) -> &H::Element {
        &self.bin
    }

    pub fn decoder(&self) -> &H::Element {
        &self.decoder
    }

    pub fn binding_state(&self) -> BindingState {
        self.binding.state()
    }
}

impl<H: PluginHost> fmt::Debug for SourceBin<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBin")
            .field("camera", &self.camera)
            .field("name", &self.name)
            .field("live", &self.live)
            .field("binding", &self.binding.state())
            .finish()
    }
}

fn configure_decoder<H: PluginHost>(
    host: &H,
    decoder: &H::Element,
    camera: &Camera,
    live: bool,
    settings: &SourceSettings,
) -> GraphResult<()> {
    if settings.decoder == DecoderStrategy::NvUriSrcBin {
        host.set_property(decoder, "cudadec-memtype", &settings.cudadec_memtype.into())?;
        host.set_property(
            decoder,
            "rtsp-reconnect-interval",
            &settings.rtsp_reconnect_interval.into(),
        )?;
        host.set_property(
            decoder,
            "select-rtp-protocol",
            &settings.select_rtp_protocol.into(),
        )?;
        if live {
            host.set_property(decoder, "type", &LIVE_SOURCE_TYPE.into())?;
        } else if settings.file_loop {
            host.set_property(decoder, "file-loop", &true.into())?;
        }
    }

    host.set_property(decoder, "uri", &camera.uri.as_str().into())
}

/// Build the source bin for one camera
pub fn build_source<H: PluginHost>(
    host: &H,
    camera: &Camera,
    settings: &SourceSettings,
) -> GraphResult<SourceBin<H>> {
    if camera.uri.trim().is_empty() {
        return Err(ConfigError::InvalidValue(format!("{} has an empty URI", camera)).into());
    }

    let name = format!("source-bin-{:02}", camera.index);
    let live = camera.is_live();
    info!(bin = %name, uri = %camera.uri, live, "Creating source bin");

    let bin = host.create_bin(&name)?;
    let decoder = host.make_element(settings.decoder.factory(), DECODER_NAME)?;
    configure_decoder(host, &decoder, camera, live, settings)?;
    host.add(&bin, &decoder)?;
    host.add_ghost_pad(&bin, GHOST_PAD)?;

    let binding = Arc::new(PadBinding::new());
    {
        let host_ref = host.clone();
        let bin = bin.clone();
        let bin_name = name.clone();
        let binding = binding.clone();
        let strict = settings.strict_memory;
        host.connect_pad_added(
            &decoder,
            Arc::new(move |pad: &H::Pad, media: &MediaType| {
                if let Err(e) =
                    on_new_pad(&host_ref, &bin, &bin_name, &binding, pad, media, strict)
                {
                    error!("{}", e);
                }
            }),
        );
    }
    watch_children(host, &decoder, Arc::new(settings.clone()));

    Ok(SourceBin {
        camera: camera.clone(),
        name,
        live,
        bin,
        decoder,
        binding,
    })
}
