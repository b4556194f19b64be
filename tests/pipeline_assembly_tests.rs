//! Pipeline assembly tests
//!
//! Builds complete graphs against the in-memory host and checks topology,
//! source binding and lifecycle behaviour.

use gstmulticam::assembler::{muxer_pad_name, MUXER_NAME, PIPELINE_NAME, PRIMARY_NAME};
use gstmulticam::config::{CameraList, PipelineSettings};
use gstmulticam::host::memory::MemoryHost;
use gstmulticam::host::{MediaType, PipelineState, PluginHost, PropertyValue, NVMM_FEATURE};
use gstmulticam::lifecycle::{launch, run, RunOutcome};
use gstmulticam::probe::PROBE_PAD;
use gstmulticam::source::GHOST_PAD;
use gstmulticam::{assemble, BatchDetections, BindingState, FrameDetections, GraphError};
use std::sync::atomic::AtomicBool;

fn nvmm_video() -> MediaType {
    MediaType::new("video/x-raw", [NVMM_FEATURE])
}

fn decoder_path(index: usize) -> String {
    format!("source-bin-{:02}/uri-decode-bin", index)
}

#[test]
fn test_one_muxer_pad_per_source() {
    for n in 1..=4 {
        let host = MemoryHost::new();
        let uris: Vec<String> = (0..n).map(|i| format!("file:///videos/cam{}.mp4", i)).collect();
        let cameras = CameraList::from_uris(uris);
        let graph = assemble(&host, &cameras, &PipelineSettings::default()).unwrap();

        let expected: Vec<String> = (0..n).map(muxer_pad_name).collect();
        let mut pads = host.request_pads(MUXER_NAME);
        pads.sort();
        let mut expected_sorted = expected.clone();
        expected_sorted.sort();
        assert_eq!(pads, expected_sorted);

        let source_links: Vec<_> = host
            .links()
            .into_iter()
            .filter(|l| l.sink == MUXER_NAME)
            .collect();
        assert_eq!(source_links.len(), n);
        for pad in &expected {
            assert_eq!(
                source_links.iter().filter(|l| &l.sink_pad == pad).count(),
                1
            );
        }
        assert_eq!(graph.sources().len(), n);
    }
}

#[test]
fn test_source_output_links_only_once() {
    let host = MemoryHost::new();
    let cameras = CameraList::from_uris(["file:///a.mp4"]);
    let graph = assemble(&host, &cameras, &PipelineSettings::default()).unwrap();

    host.request_pad(graph.muxer(), "sink_9").unwrap();
    let err = host
        .link_pads(graph.sources()[0].element(), GHOST_PAD, graph.muxer(), "sink_9")
        .unwrap_err();
    assert!(matches!(err, GraphError::Link { .. }));
}

#[test]
fn test_single_live_source_sets_live_mode_once() {
    let host = MemoryHost::new();
    let cameras = CameraList::from_uris([
        "file:///a.mp4",
        "rtsp://cam/stream",
        "file:///b.mp4",
        "rtsp://cam2/stream",
    ]);
    let graph = assemble(&host, &cameras, &PipelineSettings::default()).unwrap();

    assert!(graph.is_live());
    assert_eq!(host.property_set_count(MUXER_NAME, "live-source"), 1);
    assert_eq!(
        host.property(MUXER_NAME, "live-source"),
        Some(PropertyValue::Bool(true))
    );

    // Only live cameras get the live source type
    assert!(host.property(&decoder_path(0), "type").is_none());
    assert_eq!(
        host.property(&decoder_path(1), "type"),
        Some(PropertyValue::UInt(4))
    );
    assert!(host.property(&decoder_path(2), "type").is_none());
}

#[test]
fn test_missing_plugin_never_starts() {
    for factory in ["nvstreammux", "nvurisrcbin", "nvinfer", "nveglglessink"] {
        let host = MemoryHost::new();
        host.remove_factory(factory);
        let cameras = CameraList::from_uris(["rtsp://cam/stream"]);

        let err = launch(
            &host,
            &cameras,
            &PipelineSettings::default(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, GraphError::ElementCreation { .. }));
        assert!(!host.states().contains(&PipelineState::Playing));
    }
}

#[test]
fn test_probe_reports_without_failing() {
    let host = MemoryHost::new();
    let cameras = CameraList::from_uris(["file:///a.mp4", "file:///b.mp4"]);
    let graph = assemble(&host, &cameras, &PipelineSettings::default()).unwrap();
    let stats = gstmulticam::MetadataProbe::new()
        .attach(&host, &graph)
        .unwrap();

    let empty = BatchDetections::new(vec![
        FrameDetections::new(0, 0, vec![]),
        FrameDetections::new(1, 0, vec![]),
    ]);
    assert_eq!(host.push_batch(PRIMARY_NAME, PROBE_PAD, Some(&empty)), 1);
    assert_eq!(host.push_batch(PRIMARY_NAME, PROBE_PAD, None), 1);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.batches, 2);
    assert_eq!(snapshot.frames, 2);
    assert_eq!(snapshot.objects, 0);
    assert_eq!(snapshot.missing_metadata, 1);
}

#[test]
fn test_live_and_file_cameras_end_to_end() {
    let host = MemoryHost::new();
    let cameras = CameraList::from_uris(["rtsp://cam1/stream", "file:///videos/cam2.mp4"]);
    let graph = assemble(&host, &cameras, &PipelineSettings::default()).unwrap();

    assert_eq!(
        host.property(MUXER_NAME, "live-source"),
        Some(PropertyValue::Bool(true))
    );
    assert_eq!(graph.sources().len(), 2);
    let bins: Vec<String> = host
        .children(PIPELINE_NAME)
        .into_iter()
        .filter(|name| name.starts_with("source-bin"))
        .collect();
    assert_eq!(bins, ["source-bin-00", "source-bin-01"]);

    for source in graph.sources() {
        assert_eq!(source.binding_state(), BindingState::Pending);
    }

    // Decoders announce their accelerated video outputs
    for index in 0..2 {
        host.announce_pad(&decoder_path(index), "src_0", &nvmm_video())
            .unwrap();
    }
    for (index, source) in graph.sources().iter().enumerate() {
        assert_eq!(source.binding_state(), BindingState::Bound);
        assert!(host
            .ghost_target(&format!("source-bin-{:02}", index), GHOST_PAD)
            .is_some());
    }

    let outcome = run(&host, &graph, &AtomicBool::new(false)).unwrap();
    assert_eq!(outcome, RunOutcome::EndOfStream);
    assert_eq!(
        host.states(),
        vec![PipelineState::Playing, PipelineState::Null]
    );
}

#[test]
fn test_dry_run_description() {
    let host = MemoryHost::new();
    let cameras = CameraList::from_uris(["rtsp://cam1/stream"]);
    assemble(&host, &cameras, &PipelineSettings::default()).unwrap();

    let description = host.describe();
    let elements = description["elements"].as_array().unwrap();
    assert!(elements
        .iter()
        .any(|e| e["name"] == "stream-muxer" && e["factory"] == "nvstreammux"));

    let links = description["links"].as_array().unwrap();
    assert!(links
        .iter()
        .any(|l| l == "source-bin-00:src -> stream-muxer:sink_0"));
    assert!(links
        .iter()
        .any(|l| l == "convertor:src -> video-output:sink"));
}
