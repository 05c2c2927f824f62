//! # Pipeline Controller
//!
//! Per-track front door for effect parameters. Every setter validates its
//! argument, applies it to the SDK pipeline under the wrapper's lock, and
//! only then updates the cached value: a failure leaves both the SDK and
//! the cache at their prior state.
//!
//! Cached values live in per-field atomics: getters are lock-free, but a
//! multi-field snapshot is NOT consistent without holding the wrapper lock
//! explicitly via [`PipelineController::wrapper`].

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ColorFilterError, EffectsError};
use crate::sdk::{ColorFilterMode, PipelineMode, SdkFrame};
use crate::wrapper::PipelineWrapper;

// ============================================================================
// Documented ranges and defaults
// ============================================================================

/// Valid range for blur/beautification/sharpening/color-filter powers.
pub const POWER_MIN: f32 = 0.0;
pub const POWER_MAX: f32 = 1.0;

/// Zoom bounds supported by the SDK.
pub const ZOOM_MIN: f32 = 1.0;
pub const ZOOM_MAX: f32 = 4.0;

pub const DEFAULT_BLUR_POWER: f32 = 0.6;
pub const DEFAULT_BEAUTIFICATION_POWER: f32 = 0.5;
pub const DEFAULT_SHARPENING_STRENGTH: f32 = 0.5;
pub const DEFAULT_COLOR_FILTER_STRENGTH: f32 = 1.0;
pub const DEFAULT_ZOOM_LEVEL: f32 = 1.0;

/// f32 stored as its bit pattern, for lock-free parameter reads.
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

fn pipeline_mode_to_u8(mode: PipelineMode) -> u8 {
    match mode {
        PipelineMode::None => 0,
        PipelineMode::Blur => 1,
        PipelineMode::Replace => 2,
    }
}

fn pipeline_mode_from_u8(raw: u8) -> PipelineMode {
    match raw {
        1 => PipelineMode::Blur,
        2 => PipelineMode::Replace,
        _ => PipelineMode::None,
    }
}

fn color_mode_to_u8(mode: ColorFilterMode) -> u8 {
    match mode {
        ColorFilterMode::None => 0,
        ColorFilterMode::Correction => 1,
        ColorFilterMode::Grading => 2,
    }
}

fn color_mode_from_u8(raw: u8) -> ColorFilterMode {
    match raw {
        1 => ColorFilterMode::Correction,
        2 => ColorFilterMode::Grading,
        _ => ColorFilterMode::None,
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Validated effect-parameter state for one video track.
pub struct PipelineController {
    wrapper: Arc<PipelineWrapper>,

    mode: AtomicU8,
    color_filter_mode: AtomicU8,
    beautification_enabled: AtomicBool,
    sharpening_enabled: AtomicBool,
    blur_power: AtomicF32,
    beautification_power: AtomicF32,
    sharpening_strength: AtomicF32,
    color_filter_strength: AtomicF32,
    zoom_level: AtomicF32,

    // Shared with the SDK pipeline; replacing never invalidates a frame an
    // in-flight transform still holds.
    background: Mutex<Option<Arc<dyn SdkFrame>>>,
    color_grading_reference: Mutex<Option<Arc<dyn SdkFrame>>>,
}

impl PipelineController {
    pub fn new(wrapper: Arc<PipelineWrapper>) -> Self {
        Self {
            wrapper,
            mode: AtomicU8::new(pipeline_mode_to_u8(PipelineMode::None)),
            color_filter_mode: AtomicU8::new(color_mode_to_u8(ColorFilterMode::None)),
            beautification_enabled: AtomicBool::new(false),
            sharpening_enabled: AtomicBool::new(false),
            blur_power: AtomicF32::new(DEFAULT_BLUR_POWER),
            beautification_power: AtomicF32::new(DEFAULT_BEAUTIFICATION_POWER),
            sharpening_strength: AtomicF32::new(DEFAULT_SHARPENING_STRENGTH),
            color_filter_strength: AtomicF32::new(DEFAULT_COLOR_FILTER_STRENGTH),
            zoom_level: AtomicF32::new(DEFAULT_ZOOM_LEVEL),
            background: Mutex::new(None),
            color_grading_reference: Mutex::new(None),
        }
    }

    /// The wrapper serializing this controller against frame delivery.
    /// Callers needing a consistent multi-field snapshot lock it explicitly.
    pub fn wrapper(&self) -> &Arc<PipelineWrapper> {
        &self.wrapper
    }

    // ------------------------------------------------------------------
    // Pipeline mode
    // ------------------------------------------------------------------

    /// Switch the background-processing mode by name.
    ///
    /// Unknown names fail with [`EffectsError::UnknownMode`] and leave the
    /// previous mode active.
    pub fn set_pipeline_mode(&self, name: &str) -> Result<(), EffectsError> {
        let mode = PipelineMode::from_name(name)
            .ok_or_else(|| EffectsError::UnknownMode(name.to_string()))?;

        let mut guard = self.wrapper.lock()?;
        match mode {
            PipelineMode::None => guard.pipeline().disable_background_effects(),
            PipelineMode::Blur => guard.pipeline().enable_blur(self.blur_power.load())?,
            PipelineMode::Replace => {
                let replacement = guard.ensure_replacement()?;
                replacement.set_background(self.background.lock().clone());
            }
        }
        self.mode.store(pipeline_mode_to_u8(mode), Ordering::Relaxed);
        debug!(mode = mode.name(), "pipeline mode set");
        Ok(())
    }

    pub fn pipeline_mode(&self) -> PipelineMode {
        pipeline_mode_from_u8(self.mode.load(Ordering::Relaxed))
    }

    // ------------------------------------------------------------------
    // Beautification
    // ------------------------------------------------------------------

    pub fn set_beautification_enabled(&self, enabled: bool) -> Result<(), EffectsError> {
        let guard = self.wrapper.lock()?;
        // Cached power goes in first; the enable call is the last fallible
        // step, so a failure never leaves the effect running.
        if enabled {
            guard
                .pipeline()
                .set_beautification_power(self.beautification_power.load())?;
        }
        guard.pipeline().set_beautification_enabled(enabled)?;
        self.beautification_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    pub fn beautification_enabled(&self) -> bool {
        self.beautification_enabled.load(Ordering::Relaxed)
    }

    pub fn set_beautification_power(&self, power: f32) -> Result<(), EffectsError> {
        EffectsError::check_range("beautification power", power, POWER_MIN, POWER_MAX)?;
        let guard = self.wrapper.lock()?;
        guard.pipeline().set_beautification_power(power)?;
        self.beautification_power.store(power);
        Ok(())
    }

    pub fn beautification_power(&self) -> f32 {
        self.beautification_power.load()
    }

    // ------------------------------------------------------------------
    // Blur
    // ------------------------------------------------------------------

    /// Blur power feeds the SDK immediately when blur mode is active,
    /// otherwise it is picked up on the next switch to blur.
    pub fn set_blur_power(&self, power: f32) -> Result<(), EffectsError> {
        EffectsError::check_range("blur power", power, POWER_MIN, POWER_MAX)?;
        let guard = self.wrapper.lock()?;
        if self.pipeline_mode() == PipelineMode::Blur {
            guard.pipeline().enable_blur(power)?;
        }
        self.blur_power.store(power);
        Ok(())
    }

    pub fn blur_power(&self) -> f32 {
        self.blur_power.load()
    }

    // ------------------------------------------------------------------
    // Sharpening
    // ------------------------------------------------------------------

    pub fn set_sharpening_enabled(&self, enabled: bool) -> Result<(), EffectsError> {
        let guard = self.wrapper.lock()?;
        // Same ordering as beautification: strength first, enable last.
        if enabled {
            guard
                .pipeline()
                .set_sharpening_strength(self.sharpening_strength.load())?;
        }
        guard.pipeline().set_sharpening_enabled(enabled)?;
        self.sharpening_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    pub fn sharpening_enabled(&self) -> bool {
        self.sharpening_enabled.load(Ordering::Relaxed)
    }

    pub fn set_sharpening_strength(&self, strength: f32) -> Result<(), EffectsError> {
        EffectsError::check_range("sharpening strength", strength, POWER_MIN, POWER_MAX)?;
        let guard = self.wrapper.lock()?;
        guard.pipeline().set_sharpening_strength(strength)?;
        self.sharpening_strength.store(strength);
        Ok(())
    }

    pub fn sharpening_strength(&self) -> f32 {
        self.sharpening_strength.load()
    }

    // ------------------------------------------------------------------
    // Zoom
    // ------------------------------------------------------------------

    pub fn set_zoom_level(&self, level: f32) -> Result<(), EffectsError> {
        EffectsError::check_range("zoom level", level, ZOOM_MIN, ZOOM_MAX)?;
        let guard = self.wrapper.lock()?;
        guard.pipeline().set_zoom_level(level)?;
        self.zoom_level.store(level);
        Ok(())
    }

    pub fn zoom_level(&self) -> f32 {
        self.zoom_level.load()
    }

    // ------------------------------------------------------------------
    // Color filter
    // ------------------------------------------------------------------

    /// Configure the color filter by mode name.
    ///
    /// Grading requires a reference frame set beforehand; an SDK
    /// initialization failure surfaces without mutating the cached
    /// mode or strength.
    pub fn set_color_filter_mode(&self, name: &str) -> Result<(), ColorFilterError> {
        let mode = ColorFilterMode::from_name(name).ok_or(ColorFilterError::UnknownMode)?;

        let guard = self
            .wrapper
            .lock()
            .map_err(|_| ColorFilterError::InitializationFailed)?;
        if mode.requires_reference() && self.color_grading_reference.lock().is_none() {
            return Err(ColorFilterError::NoGradingReference);
        }
        guard
            .pipeline()
            .set_color_filter(mode)
            .map_err(|_| ColorFilterError::InitializationFailed)?;
        self.color_filter_mode
            .store(color_mode_to_u8(mode), Ordering::Relaxed);
        debug!(mode = mode.name(), "color filter mode set");
        Ok(())
    }

    pub fn color_filter_mode(&self) -> ColorFilterMode {
        color_mode_from_u8(self.color_filter_mode.load(Ordering::Relaxed))
    }

    pub fn set_color_filter_strength(&self, strength: f32) -> Result<(), EffectsError> {
        EffectsError::check_range("color filter strength", strength, POWER_MIN, POWER_MAX)?;
        let guard = self.wrapper.lock()?;
        guard.pipeline().set_color_filter_strength(strength)?;
        self.color_filter_strength.store(strength);
        Ok(())
    }

    pub fn color_filter_strength(&self) -> f32 {
        self.color_filter_strength.load()
    }

    // ------------------------------------------------------------------
    // Shared frames
    // ------------------------------------------------------------------

    /// Set or clear the replacement background. Applied to the SDK
    /// immediately when replace mode is active.
    pub fn set_background(&self, frame: Option<Arc<dyn SdkFrame>>) -> Result<(), EffectsError> {
        let mut guard = self.wrapper.lock()?;
        if self.pipeline_mode() == PipelineMode::Replace {
            let replacement = guard.ensure_replacement()?;
            replacement.set_background(frame.clone());
        }
        *self.background.lock() = frame;
        Ok(())
    }

    pub fn background(&self) -> Option<Arc<dyn SdkFrame>> {
        self.background.lock().clone()
    }

    pub fn set_color_grading_reference(
        &self,
        frame: Option<Arc<dyn SdkFrame>>,
    ) -> Result<(), EffectsError> {
        let guard = self.wrapper.lock()?;
        guard.pipeline().set_color_grading_reference(frame.clone());
        *self.color_grading_reference.lock() = frame;
        Ok(())
    }

    pub fn color_grading_reference(&self) -> Option<Arc<dyn SdkFrame>> {
        self.color_grading_reference.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ColorFilterError;
    use crate::testing::{FakePipeline, FakeSdkFrame};

    fn controller_with(pipeline: Arc<FakePipeline>) -> PipelineController {
        PipelineController::new(Arc::new(PipelineWrapper::new(pipeline, None, false)))
    }

    #[test]
    fn test_defaults_match_documentation() {
        let controller = controller_with(Arc::new(FakePipeline::new()));
        assert_eq!(controller.pipeline_mode(), PipelineMode::None);
        assert_eq!(controller.color_filter_mode(), ColorFilterMode::None);
        assert!(!controller.beautification_enabled());
        assert!(!controller.sharpening_enabled());
        assert_eq!(controller.zoom_level(), DEFAULT_ZOOM_LEVEL);
        assert_eq!(controller.blur_power(), DEFAULT_BLUR_POWER);
        assert!(controller.background().is_none());
        assert!(controller.color_grading_reference().is_none());
    }

    #[test]
    fn test_supported_modes_apply_and_read_back() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));

        for mode in PipelineMode::ALL {
            controller.set_pipeline_mode(mode.name()).unwrap();
            assert_eq!(controller.pipeline_mode(), mode);
        }
        assert_eq!(pipeline.call_count("enable_blur"), 1);
        assert_eq!(pipeline.call_count("enable_replacement"), 1);
    }

    #[test]
    fn test_unknown_mode_leaves_previous_mode_active() {
        let controller = controller_with(Arc::new(FakePipeline::new()));
        controller.set_pipeline_mode("blur").unwrap();

        let err = controller.set_pipeline_mode("sepia").unwrap_err();
        assert_eq!(err, EffectsError::UnknownMode("sepia".to_string()));
        assert_eq!(controller.pipeline_mode(), PipelineMode::Blur);
    }

    #[test]
    fn test_sdk_failure_does_not_mutate_mode() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));

        pipeline.fail_configuration(true);
        assert!(controller.set_pipeline_mode("blur").is_err());
        assert_eq!(controller.pipeline_mode(), PipelineMode::None);
    }

    #[test]
    fn test_set_then_get_returns_exact_value() {
        let controller = controller_with(Arc::new(FakePipeline::new()));

        controller.set_blur_power(0.35).unwrap();
        assert_eq!(controller.blur_power(), 0.35);
        controller.set_beautification_power(0.8).unwrap();
        assert_eq!(controller.beautification_power(), 0.8);
        controller.set_sharpening_strength(0.25).unwrap();
        assert_eq!(controller.sharpening_strength(), 0.25);
        controller.set_color_filter_strength(0.9).unwrap();
        assert_eq!(controller.color_filter_strength(), 0.9);
        controller.set_zoom_level(2.5).unwrap();
        assert_eq!(controller.zoom_level(), 2.5);
    }

    #[test]
    fn test_out_of_range_rejected_without_mutation() {
        let controller = controller_with(Arc::new(FakePipeline::new()));

        assert!(controller.set_blur_power(1.5).is_err());
        assert_eq!(controller.blur_power(), DEFAULT_BLUR_POWER);

        assert!(controller.set_zoom_level(0.5).is_err());
        assert!(controller.set_zoom_level(9.0).is_err());
        assert_eq!(controller.zoom_level(), DEFAULT_ZOOM_LEVEL);

        assert!(controller.set_beautification_power(-0.1).is_err());
        assert_eq!(controller.beautification_power(), DEFAULT_BEAUTIFICATION_POWER);
    }

    #[test]
    fn test_enabling_beautification_applies_cached_power() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));

        controller.set_beautification_power(0.7).unwrap();
        controller.set_beautification_enabled(true).unwrap();
        assert!(controller.beautification_enabled());
        assert_eq!(pipeline.last_beautification_power(), Some(0.7));
    }

    #[test]
    fn test_failed_power_application_leaves_beautification_disabled() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));
        pipeline.fail_call("set_beautification_power");

        assert!(controller.set_beautification_enabled(true).is_err());
        // Cache and pipeline must agree: both still disabled.
        assert!(!controller.beautification_enabled());
        assert!(!pipeline.beautification_enabled());
    }

    #[test]
    fn test_failed_strength_application_leaves_sharpening_disabled() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));
        pipeline.fail_call("set_sharpening_strength");

        assert!(controller.set_sharpening_enabled(true).is_err());
        assert!(!controller.sharpening_enabled());
        assert!(!pipeline.sharpening_enabled());
    }

    #[test]
    fn test_grading_without_reference_fails_and_keeps_state() {
        let controller = controller_with(Arc::new(FakePipeline::new()));
        controller.set_color_filter_strength(0.4).unwrap();

        let err = controller.set_color_filter_mode("grading").unwrap_err();
        assert_eq!(err, ColorFilterError::NoGradingReference);
        assert_eq!(controller.color_filter_mode(), ColorFilterMode::None);
        assert_eq!(controller.color_filter_strength(), 0.4);
    }

    #[test]
    fn test_grading_succeeds_once_reference_is_set() {
        let controller = controller_with(Arc::new(FakePipeline::new()));
        let reference: Arc<dyn SdkFrame> = Arc::new(FakeSdkFrame::new(64, 64));

        controller
            .set_color_grading_reference(Some(reference))
            .unwrap();
        controller.set_color_filter_mode("grading").unwrap();
        assert_eq!(controller.color_filter_mode(), ColorFilterMode::Grading);
    }

    #[test]
    fn test_color_filter_init_failure_keeps_cached_mode() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));

        pipeline.fail_configuration(true);
        let err = controller.set_color_filter_mode("correction").unwrap_err();
        assert_eq!(err, ColorFilterError::InitializationFailed);
        assert_eq!(controller.color_filter_mode(), ColorFilterMode::None);
    }

    #[test]
    fn test_unknown_color_filter_mode() {
        let controller = controller_with(Arc::new(FakePipeline::new()));
        assert_eq!(
            controller.set_color_filter_mode("vivid").unwrap_err(),
            ColorFilterError::UnknownMode
        );
    }

    #[test]
    fn test_background_applied_immediately_in_replace_mode() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));

        controller.set_pipeline_mode("replace").unwrap();
        let frame: Arc<dyn SdkFrame> = Arc::new(FakeSdkFrame::new(16, 16));
        controller.set_background(Some(Arc::clone(&frame))).unwrap();

        let applied = pipeline.replacement_background().unwrap();
        assert!(Arc::ptr_eq(&applied, &frame));
    }

    #[test]
    fn test_background_cached_until_replace_mode() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));

        let frame: Arc<dyn SdkFrame> = Arc::new(FakeSdkFrame::new(16, 16));
        controller.set_background(Some(Arc::clone(&frame))).unwrap();
        assert!(pipeline.replacement_background().is_none());

        controller.set_pipeline_mode("replace").unwrap();
        let applied = pipeline.replacement_background().unwrap();
        assert!(Arc::ptr_eq(&applied, &frame));
    }

    #[test]
    fn test_replacing_background_keeps_in_flight_reference_alive() {
        let pipeline = Arc::new(FakePipeline::new());
        let controller = controller_with(Arc::clone(&pipeline));
        controller.set_pipeline_mode("replace").unwrap();

        let first: Arc<dyn SdkFrame> = Arc::new(FakeSdkFrame::new(16, 16));
        controller.set_background(Some(Arc::clone(&first))).unwrap();
        // Simulates a transform still holding the old frame.
        let in_flight = pipeline.replacement_background().unwrap();

        controller
            .set_background(Some(Arc::new(FakeSdkFrame::new(32, 32))))
            .unwrap();
        assert_eq!(in_flight.width(), 16);
        assert!(Arc::ptr_eq(&in_flight, &first));
    }

    #[test]
    fn test_concurrent_setters_and_frames_never_overlap() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let pipeline = Arc::new(FakePipeline::new());
        let controller = Arc::new(controller_with(Arc::clone(&pipeline)));
        let stop = Arc::new(AtomicBool::new(false));

        let frame_thread = {
            let wrapper = Arc::clone(controller.wrapper());
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut processed = 0u32;
                while !stop.load(Ordering::Relaxed) {
                    let frame: Arc<dyn SdkFrame> = Arc::new(FakeSdkFrame::new(640, 480));
                    wrapper.process_frame(frame).unwrap();
                    processed += 1;
                }
                processed
            })
        };

        // UI thread: interleaved parameter churn.
        for i in 0..200usize {
            let power = (i % 10) as f32 / 10.0;
            controller.set_blur_power(power).unwrap();
            controller.set_sharpening_strength(power).unwrap();
            let mode = PipelineMode::ALL[i % PipelineMode::ALL.len()];
            controller.set_pipeline_mode(mode.name()).unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        let processed = frame_thread.join().unwrap();

        // FakePipeline panics on overlapping entry; reaching here means the
        // lock discipline held.
        assert_eq!(pipeline.processed_frames(), processed as usize);
    }
}
