//! # Pipeline Wrapper
//!
//! Couples a live SDK pipeline with its frame-factory reference and provides
//! the single serialization point between the UI-triggered parameter path
//! and the frame-delivery path.
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` guards the pipeline and its optional replacement
//! controller. Controller setters and [`PipelineWrapper::process_frame`] both
//! go through [`PipelineWrapper::lock`]; the returned guard releases on every
//! exit path. Critical sections are field assignment plus one opaque SDK
//! call, never I/O.
//!
//! ## Lifecycle
//!
//! Active on construction, terminal after [`PipelineWrapper::teardown`].
//! Using a torn-down wrapper is a contract violation: it panics in debug
//! builds and returns [`EffectsError::TornDown`] in release, so
//! use-after-teardown surfaces early instead of silently no-opping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{error, warn};

use crate::error::EffectsError;
use crate::sdk::{EffectPipeline, FrameFactory, FrameMeta, ReplacementController, SdkError, SdkFrame};

struct WrapperState {
    /// `None` once torn down.
    pipeline: Option<Arc<dyn EffectPipeline>>,
    /// Lazily obtained when replace mode is first enabled.
    replacement: Option<Arc<dyn ReplacementController>>,
}

/// Serializes all access to one SDK pipeline instance.
pub struct PipelineWrapper {
    state: Mutex<WrapperState>,
    frame_factory: Option<Arc<dyn FrameFactory>>,
    /// Pure metadata for the per-frame transform; not under the lock.
    source_is_camera: AtomicBool,
}

impl PipelineWrapper {
    pub fn new(
        pipeline: Arc<dyn EffectPipeline>,
        frame_factory: Option<Arc<dyn FrameFactory>>,
        source_is_camera: bool,
    ) -> Self {
        Self {
            state: Mutex::new(WrapperState {
                pipeline: Some(pipeline),
                replacement: None,
            }),
            frame_factory,
            source_is_camera: AtomicBool::new(source_is_camera),
        }
    }

    /// Acquire the serialization lock.
    ///
    /// Contract: the wrapper must not be torn down.
    pub fn lock(&self) -> Result<PipelineGuard<'_>, EffectsError> {
        let state = self.state.lock();
        if state.pipeline.is_none() {
            debug_assert!(false, "pipeline wrapper used after teardown");
            error!("pipeline wrapper used after teardown");
            return Err(EffectsError::TornDown);
        }
        Ok(PipelineGuard { state })
    }

    pub fn frame_factory(&self) -> Option<&Arc<dyn FrameFactory>> {
        self.frame_factory.as_ref()
    }

    pub fn source_is_camera(&self) -> bool {
        self.source_is_camera.load(Ordering::Relaxed)
    }

    pub fn set_source_is_camera(&self, value: bool) {
        self.source_is_camera.store(value, Ordering::Relaxed);
    }

    /// Apply the configured effects to one incoming frame.
    ///
    /// An SDK transform failure is non-fatal: the original frame is returned
    /// unmodified and the failure logged, so effects degrade to pass-through
    /// instead of dropping frames.
    pub fn process_frame(&self, frame: Arc<dyn SdkFrame>) -> Result<Arc<dyn SdkFrame>, EffectsError> {
        let meta = FrameMeta {
            source_is_camera: self.source_is_camera(),
        };
        let guard = self.lock()?;
        match guard.pipeline().process(&frame, meta) {
            Ok(processed) => Ok(processed),
            Err(err) => {
                warn!(error = %err, "effect transform failed, passing frame through");
                Ok(frame)
            }
        }
    }

    /// Release the pipeline. Blocks until any in-flight frame callback
    /// finishes, so destruction never races processing.
    pub fn teardown(&self) {
        let mut state = self.state.lock();
        state.replacement = None;
        state.pipeline = None;
    }

    pub fn is_torn_down(&self) -> bool {
        self.state.lock().pipeline.is_none()
    }
}

/// Scoped lock over the wrapper's pipeline state. Held only briefly.
pub struct PipelineGuard<'a> {
    state: MutexGuard<'a, WrapperState>,
}

impl PipelineGuard<'_> {
    pub fn pipeline(&self) -> &Arc<dyn EffectPipeline> {
        // A guard only exists while Active; teardown needs the mutex.
        self.state
            .pipeline
            .as_ref()
            .expect("guard exists only while pipeline is bound")
    }

    /// The replacement controller, enabling replace mode on first use.
    pub fn ensure_replacement(&mut self) -> Result<Arc<dyn ReplacementController>, SdkError> {
        if let Some(replacement) = &self.state.replacement {
            return Ok(Arc::clone(replacement));
        }
        let replacement = self.pipeline().enable_replacement()?;
        self.state.replacement = Some(Arc::clone(&replacement));
        Ok(replacement)
    }

    pub fn replacement(&self) -> Option<&Arc<dyn ReplacementController>> {
        self.state.replacement.as_ref()
    }
}
