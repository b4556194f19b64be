//! DeepStream batch metadata reader
//!
//! Only the leading fields of the metadata structs are declared; they are
//! read through pointers handed out by the SDK and never constructed here.
//! Field order follows `nvdsmeta.h` (DeepStream 6.x/7.x).

// Most declared fields only exist to keep the layout
#![allow(dead_code)]

use crate::utils::{BatchDetections, FrameDetections, ObjectDetection};
use gstreamer as gst;
use gstreamer::glib::ffi::GList;
use std::os::raw::{c_int, c_uint, c_void};

#[repr(C)]
struct NvDsBaseMeta {
    batch_meta: *mut NvDsBatchMeta,
    meta_type: c_int,
    u_context: *mut c_void,
    copy_func: *mut c_void,
    release_func: *mut c_void,
}

#[repr(C)]
struct NvDsBatchMeta {
    base_meta: NvDsBaseMeta,
    max_frames_in_batch: c_uint,
    num_frames_in_batch: c_uint,
    frame_meta_pool: *mut c_void,
    obj_meta_pool: *mut c_void,
    classifier_meta_pool: *mut c_void,
    display_meta_pool: *mut c_void,
    user_meta_pool: *mut c_void,
    label_info_meta_pool: *mut c_void,
    frame_meta_list: *mut GList,
}

#[repr(C)]
struct NvDsFrameMeta {
    base_meta: NvDsBaseMeta,
    pad_index: c_uint,
    batch_id: c_uint,
    frame_num: c_int,
    buf_pts: u64,
    ntp_timestamp: u64,
    source_id: c_uint,
    num_surfaces_per_frame: c_int,
    source_frame_width: c_uint,
    source_frame_height: c_uint,
    surface_type: c_uint,
    surface_index: c_uint,
    num_obj_meta: c_uint,
    b_infer_done: c_int,
    obj_meta_list: *mut GList,
}

#[repr(C)]
struct NvBboxCoords {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

#[repr(C)]
struct NvDsObjectMeta {
    base_meta: NvDsBaseMeta,
    parent: *mut NvDsObjectMeta,
    unique_component_id: c_int,
    class_id: c_int,
    object_id: u64,
    detector_bbox_info: NvBboxCoords,
    tracker_bbox_info: NvBboxCoords,
    confidence: f32,
    tracker_confidence: f32,
    // Leading fields of NvOSD_RectParams
    rect_params: NvBboxCoords,
}

extern "C" {
    fn gst_buffer_get_nvds_batch_meta(buffer: *mut gst::ffi::GstBuffer) -> *mut NvDsBatchMeta;
}

/// Walk a GList, yielding its non-null data pointers
///
/// # Safety
/// `list` must be null or the head of a valid GList that outlives the iterator.
unsafe fn list_items<T>(mut list: *mut GList) -> impl Iterator<Item = *const T> {
    std::iter::from_fn(move || {
        while !list.is_null() {
            let node = &*list;
            list = node.next;
            if !node.data.is_null() {
                return Some(node.data as *const T);
            }
        }
        None
    })
}

/// Copy the detections attached to a batch buffer, if any
pub fn read_batch(buffer: &gst::BufferRef) -> Option<BatchDetections> {
    // SAFETY: the SDK only reads the buffer's meta list; the returned
    // metadata lives as long as the buffer, which outlives this call.
    unsafe {
        let batch = gst_buffer_get_nvds_batch_meta(buffer.as_ptr() as *mut gst::ffi::GstBuffer);
        if batch.is_null() {
            return None;
        }

        let frames = list_items::<NvDsFrameMeta>((*batch).frame_meta_list)
            .map(|frame| {
                let frame = &*frame;
                let objects = list_items::<NvDsObjectMeta>(frame.obj_meta_list)
                    .map(|obj| {
                        let obj = &*obj;
                        ObjectDetection::new(
                            obj.class_id,
                            obj.confidence,
                            obj.rect_params.left,
                            obj.rect_params.top,
                            obj.rect_params.width,
                            obj.rect_params.height,
                        )
                    })
                    .collect();
                FrameDetections::new(frame.source_id, frame.frame_num, objects)
            })
            .collect();

        Some(BatchDetections::new(frames))
    }
}
