//! # Frame-Delivery Boundary
//!
//! Interface to the video-track subsystem, which owns the actual capture
//! sources. The subsystem calls [`ProcessingAdapter::deliver`] once per
//! incoming frame; processed frames go out through a [`FrameSink`].
//!
//! Effects state is attached by explicit composition: the track object holds
//! a [`TrackEffects`], the adapter holds an optional wrapper. Nothing is
//! injected into externally owned types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::PipelineController;
use crate::sdk::SdkFrame;
use crate::wrapper::PipelineWrapper;

/// Downstream consumer of processed frames.
pub trait FrameSink: Send + Sync {
    fn emit(&self, frame: Arc<dyn SdkFrame>);
}

/// Routes a track's frames through an optional effects wrapper.
pub struct ProcessingAdapter {
    sink: Arc<dyn FrameSink>,
    wrapper: Mutex<Option<Arc<PipelineWrapper>>>,
    source_is_camera: AtomicBool,
}

impl ProcessingAdapter {
    pub fn new(sink: Arc<dyn FrameSink>, source_is_camera: bool) -> Self {
        Self {
            sink,
            wrapper: Mutex::new(None),
            source_is_camera: AtomicBool::new(source_is_camera),
        }
    }

    pub fn source_is_camera(&self) -> bool {
        self.source_is_camera.load(Ordering::Relaxed)
    }

    /// Update the source flag, propagating it to an attached wrapper.
    pub fn set_source_is_camera(&self, value: bool) {
        self.source_is_camera.store(value, Ordering::Relaxed);
        if let Some(wrapper) = self.wrapper.lock().as_ref() {
            wrapper.set_source_is_camera(value);
        }
    }

    /// Wire an effects wrapper into this track's frame path.
    pub fn attach(&self, wrapper: Arc<PipelineWrapper>) {
        wrapper.set_source_is_camera(self.source_is_camera());
        *self.wrapper.lock() = Some(wrapper);
    }

    /// Unwire the effects wrapper, handing it back for teardown. Frames keep
    /// flowing, unprocessed.
    pub fn detach(&self) -> Option<Arc<PipelineWrapper>> {
        self.wrapper.lock().take()
    }

    /// Entry point called once per incoming frame by the track subsystem.
    pub fn deliver(&self, frame: Arc<dyn SdkFrame>) {
        let wrapper = self.wrapper.lock().clone();
        let out = match wrapper {
            Some(wrapper) => match wrapper.process_frame(Arc::clone(&frame)) {
                Ok(processed) => processed,
                // Contract violation already reported by the wrapper; keep
                // the stream alive.
                Err(_) => frame,
            },
            None => frame,
        };
        self.sink.emit(out);
    }
}

/// Per-track effects association: adapter plus the controller driving it.
///
/// The video-track object owns one of these while effects are active;
/// dropping it through [`TrackEffects::teardown`] unwires the adapter and
/// releases the pipeline.
pub struct TrackEffects {
    adapter: Arc<ProcessingAdapter>,
    controller: PipelineController,
}

impl TrackEffects {
    pub fn new(adapter: Arc<ProcessingAdapter>, controller: PipelineController) -> Self {
        Self {
            adapter,
            controller,
        }
    }

    pub fn controller(&self) -> &PipelineController {
        &self.controller
    }

    pub fn adapter(&self) -> &Arc<ProcessingAdapter> {
        &self.adapter
    }

    /// Detach from the frame path and tear the wrapper down. Blocks until an
    /// in-flight frame callback finishes.
    pub fn teardown(self) {
        if let Some(wrapper) = self.adapter.detach() {
            wrapper.teardown();
        }
    }
}
