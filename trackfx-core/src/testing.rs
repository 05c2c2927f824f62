//! # Test Doubles
//!
//! Fakes implementing the [`crate::sdk`] capability set, for this crate's
//! tests and for downstream crates wiring the core without the vendor SDK.
//!
//! [`FakePipeline`] additionally acts as a race detector: every entry point
//! panics if another call is still inside the pipeline, so any hole in the
//! wrapper's lock discipline fails tests loudly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::sdk::{
    AuthCompletion, AuthStatus, ColorFilterMode, EffectPipeline, FrameFactory, FrameMeta,
    ReplacementController, SdkError, SdkFactory, SdkFrame,
};

// ============================================================================
// Frames
// ============================================================================

/// Minimal opaque frame: dimensions only.
#[derive(Debug)]
pub struct FakeSdkFrame {
    width: u32,
    height: u32,
}

impl FakeSdkFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl SdkFrame for FakeSdkFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Frame factory that records how many frames it built.
#[derive(Default)]
pub struct FakeFrameFactory {
    built: AtomicUsize,
    refuse: AtomicBool,
}

impl FakeFrameFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent construction attempts return `None`.
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::Relaxed);
    }

    pub fn frames_built(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }
}

impl FrameFactory for FakeFrameFactory {
    fn frame_from_rgba(&self, data: &[u8], width: u32, height: u32) -> Option<Arc<dyn SdkFrame>> {
        if self.refuse.load(Ordering::Relaxed) {
            return None;
        }
        if data.len() != (width * height * 4) as usize {
            return None;
        }
        self.built.fetch_add(1, Ordering::Relaxed);
        Some(Arc::new(FakeSdkFrame::new(width, height)))
    }
}

// ============================================================================
// Replacement controller
// ============================================================================

#[derive(Default)]
pub struct FakeReplacement {
    background: Mutex<Option<Arc<dyn SdkFrame>>>,
}

impl FakeReplacement {
    pub fn background(&self) -> Option<Arc<dyn SdkFrame>> {
        self.background.lock().clone()
    }
}

impl ReplacementController for FakeReplacement {
    fn set_background(&self, frame: Option<Arc<dyn SdkFrame>>) {
        *self.background.lock() = frame;
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Recording pipeline with single-entry enforcement.
pub struct FakePipeline {
    calls: Mutex<Vec<&'static str>>,
    busy: AtomicBool,
    fail_configuration: AtomicBool,
    fail_call: Mutex<Option<&'static str>>,
    fail_process: AtomicBool,
    processed: AtomicUsize,
    last_meta: Mutex<Option<FrameMeta>>,
    last_beautification_power: Mutex<Option<f32>>,
    beautification_enabled: AtomicBool,
    sharpening_enabled: AtomicBool,
    replacement: Arc<FakeReplacement>,
}

impl FakePipeline {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            fail_configuration: AtomicBool::new(false),
            fail_call: Mutex::new(None),
            fail_process: AtomicBool::new(false),
            processed: AtomicUsize::new(0),
            last_meta: Mutex::new(None),
            last_beautification_power: Mutex::new(None),
            beautification_enabled: AtomicBool::new(false),
            sharpening_enabled: AtomicBool::new(false),
            replacement: Arc::new(FakeReplacement::default()),
        }
    }

    /// Make all fallible configuration calls fail.
    pub fn fail_configuration(&self, fail: bool) {
        self.fail_configuration.store(fail, Ordering::Relaxed);
    }

    /// Make exactly one named configuration call fail, the rest succeed.
    pub fn fail_call(&self, call: &'static str) {
        *self.fail_call.lock() = Some(call);
    }

    /// Make the per-frame transform fail.
    pub fn fail_process(&self, fail: bool) {
        self.fail_process.store(fail, Ordering::Relaxed);
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == name).count()
    }

    pub fn processed_frames(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn last_meta(&self) -> Option<FrameMeta> {
        *self.last_meta.lock()
    }

    pub fn last_beautification_power(&self) -> Option<f32> {
        *self.last_beautification_power.lock()
    }

    pub fn beautification_enabled(&self) -> bool {
        self.beautification_enabled.load(Ordering::Relaxed)
    }

    pub fn sharpening_enabled(&self) -> bool {
        self.sharpening_enabled.load(Ordering::Relaxed)
    }

    pub fn replacement_background(&self) -> Option<Arc<dyn SdkFrame>> {
        self.replacement.background()
    }

    fn enter(&self, call: &'static str) -> EntryToken<'_> {
        assert!(
            !self.busy.swap(true, Ordering::SeqCst),
            "concurrent pipeline access detected in {call}"
        );
        self.calls.lock().push(call);
        // Widen the race window a little.
        std::thread::yield_now();
        EntryToken { busy: &self.busy }
    }

    fn configuration_result(&self, call: &'static str) -> Result<(), SdkError> {
        if self.fail_configuration.load(Ordering::Relaxed) || *self.fail_call.lock() == Some(call) {
            Err(SdkError::new("configuration refused"))
        } else {
            Ok(())
        }
    }
}

impl Default for FakePipeline {
    fn default() -> Self {
        Self::new()
    }
}

struct EntryToken<'a> {
    busy: &'a AtomicBool,
}

impl Drop for EntryToken<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl EffectPipeline for FakePipeline {
    fn enable_blur(&self, _power: f32) -> Result<(), SdkError> {
        let _token = self.enter("enable_blur");
        self.configuration_result("enable_blur")
    }

    fn enable_replacement(&self) -> Result<Arc<dyn ReplacementController>, SdkError> {
        let _token = self.enter("enable_replacement");
        self.configuration_result("enable_replacement")?;
        Ok(Arc::clone(&self.replacement) as Arc<dyn ReplacementController>)
    }

    fn disable_background_effects(&self) {
        let _token = self.enter("disable_background_effects");
    }

    fn set_beautification_enabled(&self, enabled: bool) -> Result<(), SdkError> {
        let _token = self.enter("set_beautification_enabled");
        self.configuration_result("set_beautification_enabled")?;
        self.beautification_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn set_beautification_power(&self, power: f32) -> Result<(), SdkError> {
        let _token = self.enter("set_beautification_power");
        self.configuration_result("set_beautification_power")?;
        *self.last_beautification_power.lock() = Some(power);
        Ok(())
    }

    fn set_sharpening_enabled(&self, enabled: bool) -> Result<(), SdkError> {
        let _token = self.enter("set_sharpening_enabled");
        self.configuration_result("set_sharpening_enabled")?;
        self.sharpening_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn set_sharpening_strength(&self, _strength: f32) -> Result<(), SdkError> {
        let _token = self.enter("set_sharpening_strength");
        self.configuration_result("set_sharpening_strength")
    }

    fn set_zoom_level(&self, _level: f32) -> Result<(), SdkError> {
        let _token = self.enter("set_zoom_level");
        self.configuration_result("set_zoom_level")
    }

    fn set_color_filter(&self, _mode: ColorFilterMode) -> Result<(), SdkError> {
        let _token = self.enter("set_color_filter");
        self.configuration_result("set_color_filter")
    }

    fn set_color_filter_strength(&self, _strength: f32) -> Result<(), SdkError> {
        let _token = self.enter("set_color_filter_strength");
        self.configuration_result("set_color_filter_strength")
    }

    fn set_color_grading_reference(&self, _frame: Option<Arc<dyn SdkFrame>>) {
        let _token = self.enter("set_color_grading_reference");
    }

    fn process(
        &self,
        frame: &Arc<dyn SdkFrame>,
        meta: FrameMeta,
    ) -> Result<Arc<dyn SdkFrame>, SdkError> {
        let _token = self.enter("process");
        *self.last_meta.lock() = Some(meta);
        if self.fail_process.load(Ordering::Relaxed) {
            return Err(SdkError::new("transform refused"));
        }
        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(FakeSdkFrame::new(frame.width(), frame.height())))
    }
}

// ============================================================================
// Factory
// ============================================================================

/// SDK factory whose authorization completions are fired manually by tests.
pub struct FakeSdkFactory {
    pending: Mutex<Vec<AuthCompletion>>,
    pipelines: Mutex<Vec<Arc<FakePipeline>>>,
    frame_factory: Option<Arc<FakeFrameFactory>>,
    fail_new_pipeline: AtomicBool,
}

impl FakeSdkFactory {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            pipelines: Mutex::new(Vec::new()),
            frame_factory: Some(Arc::new(FakeFrameFactory::new())),
            fail_new_pipeline: AtomicBool::new(false),
        }
    }

    pub fn without_frame_factory() -> Self {
        Self {
            frame_factory: None,
            ..Self::new()
        }
    }

    pub fn fail_new_pipeline(&self, fail: bool) {
        self.fail_new_pipeline.store(fail, Ordering::Relaxed);
    }

    /// Number of authorization attempts not yet completed.
    pub fn pending_auths(&self) -> usize {
        self.pending.lock().len()
    }

    /// Fire the oldest pending authorization completion.
    ///
    /// Panics if no attempt is pending (test bug).
    pub fn complete_auth(&self, status: AuthStatus) {
        let completion = {
            let mut pending = self.pending.lock();
            assert!(!pending.is_empty(), "no pending authorization");
            pending.remove(0)
        };
        completion(status);
    }

    /// Pipelines constructed so far, in order.
    pub fn pipelines(&self) -> Vec<Arc<FakePipeline>> {
        self.pipelines.lock().clone()
    }

    /// Concrete handle to the fake frame factory, for steering its behavior.
    pub fn frame_factory_handle(&self) -> Option<Arc<FakeFrameFactory>> {
        self.frame_factory.clone()
    }
}

impl Default for FakeSdkFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SdkFactory for FakeSdkFactory {
    fn auth(&self, _credential: &str, completion: AuthCompletion) {
        self.pending.lock().push(completion);
    }

    fn new_pipeline(&self) -> Result<Arc<dyn EffectPipeline>, SdkError> {
        if self.fail_new_pipeline.load(Ordering::Relaxed) {
            return Err(SdkError::new("pipeline construction refused"));
        }
        let pipeline = Arc::new(FakePipeline::new());
        self.pipelines.lock().push(Arc::clone(&pipeline));
        Ok(pipeline)
    }

    fn frame_factory(&self) -> Option<Arc<dyn FrameFactory>> {
        self.frame_factory
            .as_ref()
            .map(|f| Arc::clone(f) as Arc<dyn FrameFactory>)
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Downstream sink that keeps every emitted frame.
#[derive(Default)]
pub struct FakeSink {
    frames: Mutex<Vec<Arc<dyn SdkFrame>>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn last(&self) -> Option<Arc<dyn SdkFrame>> {
        self.frames.lock().last().cloned()
    }
}

impl crate::adapter::FrameSink for FakeSink {
    fn emit(&self, frame: Arc<dyn SdkFrame>) {
        self.frames.lock().push(frame);
    }
}
