//! In-process plugin host
//!
//! Models just enough of a plugin framework to assemble and inspect a graph
//! without native plugins: named elements with `src`/`sink` pads, bins,
//! ghost pads, request pads, one-to-one pad links and state transitions.
//! Asynchronous framework events (pad announcements, child elements,
//! buffers) are injected explicitly.
//!
//! Elements are looked up by name or by a `/`-separated path of names that
//! ends at the element, e.g. `source-bin-00/uri-decode-bin`.

use super::{
    BatchObserver, ChildAddedHandler, PadAddedHandler, PipelineState, PluginHost, PropertyValue,
    WaitOutcome,
};
use crate::error::{GraphError, GraphResult};
use crate::utils::BatchDetections;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to an element owned by a [`MemoryHost`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

/// A pad announced by an element at runtime
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryPad {
    pub element: ElementId,
    pub name: String,
}

/// A recorded pad link
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRecord {
    pub src: String,
    pub src_pad: String,
    pub sink: String,
    pub sink_pad: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeKind {
    Pipeline,
    Bin,
    Element,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PadKind {
    Static,
    Request,
    Ghost,
    Sometimes,
}

struct PadRecord {
    kind: PadKind,
    peer: Option<(ElementId, String)>,
    target: Option<MemoryPad>,
    target_sets: usize,
}

impl PadRecord {
    fn new(kind: PadKind) -> Self {
        Self {
            kind,
            peer: None,
            target: None,
            target_sets: 0,
        }
    }
}

struct Node {
    name: String,
    factory: String,
    kind: NodeKind,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    properties: BTreeMap<String, PropertyValue>,
    property_sets: BTreeMap<String, usize>,
    pads: BTreeMap<String, PadRecord>,
    pad_added: Vec<PadAddedHandler<MemoryHost>>,
    child_added: Vec<ChildAddedHandler<MemoryHost>>,
    probes: Vec<(String, BatchObserver)>,
}

impl Node {
    fn new(name: &str, factory: &str, kind: NodeKind) -> Self {
        let mut pads = BTreeMap::new();
        if kind == NodeKind::Element {
            pads.insert("src".to_string(), PadRecord::new(PadKind::Static));
            pads.insert("sink".to_string(), PadRecord::new(PadKind::Static));
        }
        Self {
            name: name.to_string(),
            factory: factory.to_string(),
            kind,
            parent: None,
            children: Vec::new(),
            properties: BTreeMap::new(),
            property_sets: BTreeMap::new(),
            pads,
            pad_added: Vec::new(),
            child_added: Vec::new(),
            probes: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Registry {
    nodes: Vec<Node>,
    missing_factories: HashSet<String>,
    refused_links: HashSet<(String, String)>,
    unsupported_properties: HashSet<(String, String)>,
    refuse_state_change: bool,
    refuse_teardown: bool,
    wait_failure: Option<String>,
    no_metadata_reader: bool,
    states: Vec<PipelineState>,
    bus: VecDeque<WaitOutcome>,
}

impl Registry {
    fn node(&self, id: ElementId) -> GraphResult<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| GraphError::Pipeline(format!("unknown element {:?}", id)))
    }

    fn node_mut(&mut self, id: ElementId) -> GraphResult<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| GraphError::Pipeline(format!("unknown element {:?}", id)))
    }

    fn insert(&mut self, node: Node) -> ElementId {
        self.nodes.push(node);
        ElementId(self.nodes.len() - 1)
    }

    fn find(&self, path: &str) -> Option<ElementId> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (last, ancestors) = segments.split_last()?;

        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.name == *last)
            .find(|(_, node)| {
                let mut parent = node.parent;
                for expected in ancestors.iter().rev() {
                    match parent.map(|p| &self.nodes[p.0]) {
                        Some(p) if p.name == *expected => parent = p.parent,
                        _ => return false,
                    }
                }
                true
            })
            .map(|(index, _)| ElementId(index))
    }

    fn name(&self, id: ElementId) -> String {
        self.nodes
            .get(id.0)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }
}

/// Plugin host backed by an in-memory element registry
#[derive(Clone, Default)]
pub struct MemoryHost {
    registry: Arc<Mutex<Registry>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every `make_element` call for `factory` fail, as if the plugin
    /// were not installed
    pub fn remove_factory(&self, factory: &str) {
        self.lock().missing_factories.insert(factory.to_string());
    }

    /// Make links from element `src` to element `sink` fail
    pub fn refuse_link(&self, src: &str, sink: &str) {
        self.lock()
            .refused_links
            .insert((src.to_string(), sink.to_string()));
    }

    /// Hide a property on every element created from `factory`
    pub fn unsupported_property(&self, factory: &str, property: &str) {
        self.lock()
            .unsupported_properties
            .insert((factory.to_string(), property.to_string()));
    }

    /// Report that batch metadata cannot be decoded
    pub fn disable_metadata_reader(&self) {
        self.lock().no_metadata_reader = true;
    }

    /// Make the next transition to PLAYING fail
    pub fn refuse_state_change(&self) {
        self.lock().refuse_state_change = true;
    }

    /// Make the next transition to NULL fail
    pub fn refuse_teardown(&self) {
        self.lock().refuse_teardown = true;
    }

    /// Make the next `wait` itself fail, as opposed to reporting a bus error
    pub fn fail_wait(&self, message: impl Into<String>) {
        self.lock().wait_failure = Some(message.into());
    }

    /// Queue an event for the next `wait`
    pub fn post(&self, outcome: WaitOutcome) {
        self.lock().bus.push_back(outcome);
    }

    /// Look up an element by `/`-separated names. A partial path matches the
    /// first element created that fits, so anchor it at the bin when several
    /// bins share child names.
    pub fn find(&self, path: &str) -> Option<ElementId> {
        self.lock().find(path)
    }

    pub fn factory(&self, path: &str) -> Option<String> {
        let registry = self.lock();
        registry
            .find(path)
            .map(|id| registry.nodes[id.0].factory.clone())
    }

    pub fn property(&self, path: &str, property: &str) -> Option<PropertyValue> {
        let registry = self.lock();
        let id = registry.find(path)?;
        registry.nodes[id.0].properties.get(property).cloned()
    }

    /// How many times `property` was set on the element
    pub fn property_set_count(&self, path: &str, property: &str) -> usize {
        let registry = self.lock();
        registry
            .find(path)
            .and_then(|id| registry.nodes[id.0].property_sets.get(property).copied())
            .unwrap_or(0)
    }

    /// Names of the direct children of a pipeline or bin
    pub fn children(&self, path: &str) -> Vec<String> {
        let registry = self.lock();
        registry
            .find(path)
            .map(|id| {
                registry.nodes[id.0]
                    .children
                    .iter()
                    .map(|child| registry.name(*child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of the pads requested on an element, in name order
    pub fn request_pads(&self, path: &str) -> Vec<String> {
        let registry = self.lock();
        registry
            .find(path)
            .map(|id| {
                registry.nodes[id.0]
                    .pads
                    .iter()
                    .filter(|(_, pad)| pad.kind == PadKind::Request)
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every link made so far, in link order of the source element
    pub fn links(&self) -> Vec<LinkRecord> {
        let registry = self.lock();
        let mut links = Vec::new();
        for node in &registry.nodes {
            for (pad_name, pad) in &node.pads {
                let Some((peer, peer_pad)) = &pad.peer else {
                    continue;
                };
                // Each link is stored on both ends; report it from the src side
                if pad_name == "sink" || pad.kind == PadKind::Request {
                    continue;
                }
                links.push(LinkRecord {
                    src: node.name.clone(),
                    src_pad: pad_name.clone(),
                    sink: registry.name(*peer),
                    sink_pad: peer_pad.clone(),
                });
            }
        }
        links
    }

    pub fn ghost_target(&self, path: &str, pad: &str) -> Option<MemoryPad> {
        let registry = self.lock();
        let id = registry.find(path)?;
        registry.nodes[id.0].pads.get(pad)?.target.clone()
    }

    /// How many times a ghost pad's target was set
    pub fn ghost_target_sets(&self, path: &str, pad: &str) -> usize {
        let registry = self.lock();
        registry
            .find(path)
            .and_then(|id| registry.nodes[id.0].pads.get(pad))
            .map(|pad| pad.target_sets)
            .unwrap_or(0)
    }

    pub fn probe_count(&self, path: &str, pad: &str) -> usize {
        let registry = self.lock();
        registry
            .find(path)
            .map(|id| {
                registry.nodes[id.0]
                    .probes
                    .iter()
                    .filter(|(probe_pad, _)| probe_pad == pad)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Every successful state transition, in order
    pub fn states(&self) -> Vec<PipelineState> {
        self.lock().states.clone()
    }

    pub fn element_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Announce a new pad on an element and run its pad-added handlers
    pub fn announce_pad(
        &self,
        path: &str,
        pad: &str,
        media: &super::MediaType,
    ) -> GraphResult<MemoryPad> {
        let (announced, handlers) = {
            let mut registry = self.lock();
            let id = registry
                .find(path)
                .ok_or_else(|| GraphError::Pipeline(format!("no element at {}", path)))?;
            let node = registry.node_mut(id)?;
            node.pads
                .insert(pad.to_string(), PadRecord::new(PadKind::Sometimes));
            let announced = MemoryPad {
                element: id,
                name: pad.to_string(),
            };
            (announced, node.pad_added.clone())
        };

        // Handlers call back into the host, so the lock must be released
        for handler in handlers {
            handler(&announced, media);
        }
        Ok(announced)
    }

    /// Create a child element inside a bin and run the bin's child-added handlers
    pub fn announce_child(&self, path: &str, factory: &str, name: &str) -> GraphResult<ElementId> {
        let parent = self
            .find(path)
            .ok_or_else(|| GraphError::Pipeline(format!("no element at {}", path)))?;
        let child = self.make_element(factory, name)?;

        // Decoders are bins internally even though they are created as elements
        let handlers = {
            let mut registry = self.lock();
            registry.node_mut(child)?.parent = Some(parent);
            let node = registry.node_mut(parent)?;
            node.children.push(child);
            node.child_added.clone()
        };
        for handler in handlers {
            handler(&child, name);
        }
        Ok(child)
    }

    /// Push one buffer through a probed pad, returning how many observers saw it
    pub fn push_batch(&self, path: &str, pad: &str, batch: Option<&BatchDetections>) -> usize {
        let observers: Vec<BatchObserver> = {
            let registry = self.lock();
            let Some(id) = registry.find(path) else {
                return 0;
            };
            registry.nodes[id.0]
                .probes
                .iter()
                .filter(|(probe_pad, _)| probe_pad == pad)
                .map(|(_, observer)| observer.clone())
                .collect()
        };

        for observer in &observers {
            observer(batch);
        }
        observers.len()
    }

    /// Serializable view of the graph
    pub fn describe(&self) -> Value {
        let registry = self.lock();
        let elements: Vec<Value> = registry
            .nodes
            .iter()
            .map(|node| {
                let properties: BTreeMap<&str, String> = node
                    .properties
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.to_string()))
                    .collect();
                json!({
                    "name": node.name,
                    "factory": node.factory,
                    "parent": node.parent.map(|p| registry.name(p)),
                    "properties": properties,
                })
            })
            .collect();

        drop(registry);
        let links: Vec<String> = self
            .links()
            .iter()
            .map(|l| format!("{}:{} -> {}:{}", l.src, l.src_pad, l.sink, l.sink_pad))
            .collect();

        json!({
            "elements": elements,
            "links": links,
        })
    }
}

impl PluginHost for MemoryHost {
    type Element = ElementId;
    type Pad = MemoryPad;

    fn create_pipeline(&self, name: &str) -> GraphResult<ElementId> {
        Ok(self.lock().insert(Node::new(name, "pipeline", NodeKind::Pipeline)))
    }

    fn create_bin(&self, name: &str) -> GraphResult<ElementId> {
        Ok(self.lock().insert(Node::new(name, "bin", NodeKind::Bin)))
    }

    fn make_element(&self, factory: &str, name: &str) -> GraphResult<ElementId> {
        let mut registry = self.lock();
        if registry.missing_factories.contains(factory) {
            return Err(GraphError::creation(factory, name));
        }
        Ok(registry.insert(Node::new(name, factory, NodeKind::Element)))
    }

    fn element_name(&self, element: &ElementId) -> String {
        self.lock().name(*element)
    }

    fn has_property(&self, element: &ElementId, property: &str) -> bool {
        let registry = self.lock();
        registry
            .node(*element)
            .map(|node| {
                !registry
                    .unsupported_properties
                    .contains(&(node.factory.clone(), property.to_string()))
            })
            .unwrap_or(false)
    }

    fn set_property(
        &self,
        element: &ElementId,
        property: &str,
        value: &PropertyValue,
    ) -> GraphResult<()> {
        if !self.has_property(element, property) {
            return Err(GraphError::Property {
                element: self.element_name(element),
                property: property.to_string(),
                reason: "no such property".to_string(),
            });
        }

        let mut registry = self.lock();
        let node = registry.node_mut(*element)?;
        node.properties.insert(property.to_string(), value.clone());
        *node.property_sets.entry(property.to_string()).or_default() += 1;
        Ok(())
    }

    fn add(&self, bin: &ElementId, child: &ElementId) -> GraphResult<()> {
        let mut registry = self.lock();
        let parent = registry.node(*bin)?;
        if parent.kind == NodeKind::Element {
            return Err(GraphError::Pipeline(format!("{} is not a bin", parent.name)));
        }

        let child_node = registry.node(*child)?;
        if let Some(owner) = child_node.parent {
            return Err(GraphError::Pipeline(format!(
                "{} already belongs to {}",
                child_node.name,
                registry.name(owner)
            )));
        }

        let child_name = child_node.name.clone();
        let duplicate = registry.nodes[bin.0]
            .children
            .iter()
            .any(|sibling| registry.nodes[sibling.0].name == child_name);
        if duplicate {
            return Err(GraphError::Pipeline(format!(
                "{} already contains an element named {}",
                registry.name(*bin),
                child_name
            )));
        }

        registry.node_mut(*child)?.parent = Some(*bin);
        registry.node_mut(*bin)?.children.push(*child);
        Ok(())
    }

    fn add_ghost_pad(&self, bin: &ElementId, name: &str) -> GraphResult<()> {
        let mut registry = self.lock();
        let node = registry.node_mut(*bin)?;
        if node.kind == NodeKind::Element || node.pads.contains_key(name) {
            return Err(GraphError::Pipeline(format!(
                "cannot add ghost pad {} to {}",
                name, node.name
            )));
        }
        node.pads
            .insert(name.to_string(), PadRecord::new(PadKind::Ghost));
        Ok(())
    }

    fn set_ghost_target(&self, bin: &ElementId, name: &str, target: &MemoryPad) -> GraphResult<()> {
        let mut registry = self.lock();
        let bin_name = registry.name(*bin);

        let target_exists = registry
            .node(target.element)?
            .pads
            .contains_key(&target.name);
        if !target_exists {
            return Err(GraphError::PadBind {
                bin: bin_name,
                reason: format!("target pad {} does not exist", target.name),
            });
        }

        match registry.node_mut(*bin)?.pads.get_mut(name) {
            Some(pad) if pad.kind == PadKind::Ghost => {
                pad.target = Some(target.clone());
                pad.target_sets += 1;
                Ok(())
            }
            _ => Err(GraphError::PadBind {
                bin: bin_name,
                reason: format!("no ghost pad named {}", name),
            }),
        }
    }

    fn request_pad(&self, element: &ElementId, name: &str) -> GraphResult<()> {
        let mut registry = self.lock();
        let node = registry.node_mut(*element)?;
        if node.pads.contains_key(name) {
            return Err(GraphError::PadRequest {
                element: node.name.clone(),
                pad: name.to_string(),
            });
        }
        node.pads
            .insert(name.to_string(), PadRecord::new(PadKind::Request));
        Ok(())
    }

    fn link(&self, src: &ElementId, sink: &ElementId) -> GraphResult<()> {
        self.link_pads(src, "src", sink, "sink")
    }

    fn link_pads(
        &self,
        src: &ElementId,
        src_pad: &str,
        sink: &ElementId,
        sink_pad: &str,
    ) -> GraphResult<()> {
        let mut registry = self.lock();
        let src_name = registry.name(*src);
        let sink_name = registry.name(*sink);
        let refuse = || {
            GraphError::link(
                format!("{}:{}", src_name, src_pad),
                format!("{}:{}", sink_name, sink_pad),
            )
        };

        if registry
            .refused_links
            .contains(&(src_name.clone(), sink_name.clone()))
        {
            return Err(refuse());
        }

        let src_node = registry.node(*src)?;
        let sink_node = registry.node(*sink)?;
        if src_node.parent.is_none() || src_node.parent != sink_node.parent {
            return Err(refuse());
        }

        let src_free = src_node.pads.get(src_pad).map(|p| p.peer.is_none());
        let sink_free = sink_node.pads.get(sink_pad).map(|p| p.peer.is_none());
        if src_free != Some(true) || sink_free != Some(true) {
            return Err(refuse());
        }

        if let Some(pad) = registry.node_mut(*src)?.pads.get_mut(src_pad) {
            pad.peer = Some((*sink, sink_pad.to_string()));
        }
        if let Some(pad) = registry.node_mut(*sink)?.pads.get_mut(sink_pad) {
            pad.peer = Some((*src, src_pad.to_string()));
        }
        Ok(())
    }

    fn connect_pad_added(&self, element: &ElementId, handler: PadAddedHandler<Self>) {
        if let Ok(node) = self.lock().node_mut(*element) {
            node.pad_added.push(handler);
        }
    }

    fn connect_child_added(&self, element: &ElementId, handler: ChildAddedHandler<Self>) {
        if let Ok(node) = self.lock().node_mut(*element) {
            node.child_added.push(handler);
        }
    }

    fn reads_batch_metadata(&self) -> bool {
        !self.lock().no_metadata_reader
    }

    fn add_batch_probe(
        &self,
        element: &ElementId,
        pad: &str,
        observer: BatchObserver,
    ) -> GraphResult<()> {
        let mut registry = self.lock();
        let node = registry.node_mut(*element)?;
        if !node.pads.contains_key(pad) {
            return Err(GraphError::Pipeline(format!(
                "{} has no pad named {}",
                node.name, pad
            )));
        }
        node.probes.push((pad.to_string(), observer));
        Ok(())
    }

    fn set_state(&self, pipeline: &ElementId, state: PipelineState) -> GraphResult<()> {
        let mut registry = self.lock();
        registry.node(*pipeline)?;

        if state == PipelineState::Playing {
            let unlinked = registry.nodes.iter().any(|node| {
                node.pads
                    .values()
                    .any(|pad| pad.kind == PadKind::Request && pad.peer.is_none())
            });
            if unlinked || registry.refuse_state_change {
                registry.refuse_state_change = false;
                return Err(GraphError::StateChange {
                    state: state.to_string(),
                });
            }
        }

        if state == PipelineState::Null && registry.refuse_teardown {
            registry.refuse_teardown = false;
            return Err(GraphError::StateChange {
                state: state.to_string(),
            });
        }

        registry.states.push(state);
        Ok(())
    }

    fn wait(&self, _pipeline: &ElementId, shutdown: &AtomicBool) -> GraphResult<WaitOutcome> {
        let mut registry = self.lock();
        if let Some(message) = registry.wait_failure.take() {
            return Err(GraphError::Pipeline(message));
        }
        if let Some(outcome) = registry.bus.pop_front() {
            return Ok(outcome);
        }
        drop(registry);
        if shutdown.load(Ordering::SeqCst) {
            Ok(WaitOutcome::Interrupted)
        } else {
            // Nothing produces buffers in memory, so the stream is over
            Ok(WaitOutcome::EndOfStream)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MediaType;
    use std::sync::atomic::AtomicUsize;

    fn pipeline_with(host: &MemoryHost, names: &[&str]) -> (ElementId, Vec<ElementId>) {
        let pipeline = host.create_pipeline("p").unwrap();
        let elements = names
            .iter()
            .map(|name| {
                let el = host.make_element("identity", name).unwrap();
                host.add(&pipeline, &el).unwrap();
                el
            })
            .collect();
        (pipeline, elements)
    }

    #[test]
    fn test_missing_factory() {
        let host = MemoryHost::new();
        host.remove_factory("nvinfer");
        let err = host.make_element("nvinfer", "primary-inference").unwrap_err();
        assert!(matches!(err, GraphError::ElementCreation { .. }));
        assert!(host.make_element("queue", "q").is_ok());
    }

    #[test]
    fn test_link_once() {
        let host = MemoryHost::new();
        let (_, els) = pipeline_with(&host, &["a", "b", "c"]);

        host.link(&els[0], &els[1]).unwrap();
        assert!(host.link(&els[0], &els[2]).is_err());
        assert!(host.link(&els[2], &els[1]).is_err());
        assert_eq!(host.links().len(), 1);
        assert_eq!(host.links()[0].src, "a");
        assert_eq!(host.links()[0].sink, "b");
    }

    #[test]
    fn test_link_requires_common_parent() {
        let host = MemoryHost::new();
        let a = host.make_element("identity", "a").unwrap();
        let b = host.make_element("identity", "b").unwrap();
        assert!(host.link(&a, &b).is_err());
    }

    #[test]
    fn test_refused_link() {
        let host = MemoryHost::new();
        let (_, els) = pipeline_with(&host, &["a", "b"]);
        host.refuse_link("a", "b");
        assert!(matches!(
            host.link(&els[0], &els[1]),
            Err(GraphError::Link { .. })
        ));
    }

    #[test]
    fn test_request_pads_must_be_unique_and_linked() {
        let host = MemoryHost::new();
        let (pipeline, els) = pipeline_with(&host, &["mux", "src"]);

        host.request_pad(&els[0], "sink_0").unwrap();
        assert!(host.request_pad(&els[0], "sink_0").is_err());
        assert_eq!(host.request_pads("mux"), vec!["sink_0"]);

        assert!(host.set_state(&pipeline, PipelineState::Playing).is_err());
        host.link_pads(&els[1], "src", &els[0], "sink_0").unwrap();
        host.set_state(&pipeline, PipelineState::Playing).unwrap();
        assert_eq!(host.states(), vec![PipelineState::Playing]);
    }

    #[test]
    fn test_path_lookup() {
        let host = MemoryHost::new();
        let pipeline = host.create_pipeline("p").unwrap();
        for bin_name in ["bin-0", "bin-1"] {
            let bin = host.create_bin(bin_name).unwrap();
            let dec = host.make_element("uridecodebin", "dec").unwrap();
            host.add(&bin, &dec).unwrap();
            host.add(&pipeline, &bin).unwrap();
        }

        let first = host.find("bin-0/dec").unwrap();
        let second = host.find("bin-1/dec").unwrap();
        assert_ne!(first, second);
        assert!(host.find("bin-2/dec").is_none());
        assert_eq!(host.children("bin-1"), vec!["dec"]);
    }

    #[test]
    fn test_duplicate_child_name() {
        let host = MemoryHost::new();
        let bin = host.create_bin("bin").unwrap();
        let a = host.make_element("identity", "x").unwrap();
        let b = host.make_element("identity", "x").unwrap();
        host.add(&bin, &a).unwrap();
        assert!(host.add(&bin, &b).is_err());
        assert!(host.add(&bin, &a).is_err());
    }

    #[test]
    fn test_pad_announcement_runs_handlers() {
        let host = MemoryHost::new();
        let bin = host.create_bin("bin").unwrap();
        let dec = host.make_element("uridecodebin", "dec").unwrap();
        host.add(&bin, &dec).unwrap();
        host.add_ghost_pad(&bin, "src").unwrap();

        let handler_host = host.clone();
        host.connect_pad_added(
            &dec,
            Arc::new(move |pad: &MemoryPad, _media: &MediaType| {
                handler_host.set_ghost_target(&bin, "src", pad).unwrap();
            }),
        );

        let media = MediaType::new("video/x-raw", ["memory:NVMM"]);
        let pad = host.announce_pad("bin/dec", "src_0", &media).unwrap();
        assert_eq!(host.ghost_target("bin", "src"), Some(pad));
        assert_eq!(host.ghost_target_sets("bin", "src"), 1);
    }

    #[test]
    fn test_properties() {
        let host = MemoryHost::new();
        host.unsupported_property("rtspsrc", "drop-on-latency");
        let src = host.make_element("rtspsrc", "source").unwrap();

        assert!(!host.has_property(&src, "drop-on-latency"));
        assert!(host
            .set_property(&src, "drop-on-latency", &true.into())
            .is_err());

        host.set_property(&src, "latency", &200u32.into()).unwrap();
        host.set_property(&src, "latency", &300u32.into()).unwrap();
        assert_eq!(
            host.property("source", "latency"),
            Some(PropertyValue::UInt(300))
        );
        assert_eq!(host.property_set_count("source", "latency"), 2);
    }

    #[test]
    fn test_probes_and_bus() {
        let host = MemoryHost::new();
        let (pipeline, els) = pipeline_with(&host, &["pgie"]);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        host.add_batch_probe(
            &els[0],
            "src",
            Arc::new(move |_batch: Option<&BatchDetections>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        assert!(host
            .add_batch_probe(&els[0], "missing", Arc::new(|_: Option<&BatchDetections>| {}))
            .is_err());

        assert_eq!(host.push_batch("pgie", "src", None), 1);
        assert_eq!(host.push_batch("pgie", "sink", None), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let shutdown = AtomicBool::new(false);
        host.post(WaitOutcome::Error("boom".to_string()));
        assert_eq!(
            host.wait(&pipeline, &shutdown).unwrap(),
            WaitOutcome::Error("boom".to_string())
        );
        assert_eq!(
            host.wait(&pipeline, &shutdown).unwrap(),
            WaitOutcome::EndOfStream
        );
        shutdown.store(true, Ordering::SeqCst);
        assert_eq!(
            host.wait(&pipeline, &shutdown).unwrap(),
            WaitOutcome::Interrupted
        );
    }
}
