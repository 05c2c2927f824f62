//! # SDK Capability Surface
//!
//! The vendor effects SDK is only ever consumed polymorphically, so its
//! objects are modeled as object-safe capability traits rather than concrete
//! types. A production build hands in the real SDK bindings; tests substitute
//! the fakes from [`crate::testing`].
//!
//! Every method on [`EffectPipeline`] other than [`EffectPipeline::process`]
//! is a configuration call; callers are expected to hold the
//! [`crate::wrapper::PipelineWrapper`] lock around both.

use std::sync::Arc;

use thiserror::Error;

/// Opaque failure reported by the vendor SDK.
///
/// The SDK's internals are out of scope; all we carry is its message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sdk failure: {0}")]
pub struct SdkError(String);

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Authorization status
// ============================================================================

/// Terminal status of one vendor authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Credential accepted; the factory may construct pipelines.
    Active,
    /// Credential known but currently disabled.
    Inactive,
    /// Credential was valid once and has lapsed.
    Expired,
    /// Validation could not reach the licensing backend.
    NetworkError,
}

/// Stable human-readable name for a vendor authorization status.
///
/// Diagnostics and logging only; never part of the state-machine contract.
pub fn name_of_auth_status(status: AuthStatus) -> &'static str {
    match status {
        AuthStatus::Active => "active",
        AuthStatus::Inactive => "inactive",
        AuthStatus::Expired => "expired",
        AuthStatus::NetworkError => "network-error",
    }
}

// ============================================================================
// Effect modes
// ============================================================================

/// Background-processing mode of a pipeline.
///
/// Mode names form a closed set; unknown names never construct a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// No background effect; frames pass through untouched.
    #[default]
    None,
    /// Blur the background behind the subject.
    Blur,
    /// Replace the background with a configured frame.
    Replace,
}

impl PipelineMode {
    pub const ALL: [PipelineMode; 3] =
        [PipelineMode::None, PipelineMode::Blur, PipelineMode::Replace];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(PipelineMode::None),
            "blur" => Some(PipelineMode::Blur),
            "replace" => Some(PipelineMode::Replace),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineMode::None => "none",
            PipelineMode::Blur => "blur",
            PipelineMode::Replace => "replace",
        }
    }
}

/// Color-filter mode of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFilterMode {
    /// No color filtering.
    #[default]
    None,
    /// Automatic color correction.
    Correction,
    /// Grade towards a reference frame. Requires a reference to be set first.
    Grading,
}

impl ColorFilterMode {
    pub const ALL: [ColorFilterMode; 3] = [
        ColorFilterMode::None,
        ColorFilterMode::Correction,
        ColorFilterMode::Grading,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(ColorFilterMode::None),
            "correction" => Some(ColorFilterMode::Correction),
            "grading" => Some(ColorFilterMode::Grading),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorFilterMode::None => "none",
            ColorFilterMode::Correction => "correction",
            ColorFilterMode::Grading => "grading",
        }
    }

    /// Whether this mode needs a color-grading reference frame before it can
    /// be enabled.
    pub fn requires_reference(&self) -> bool {
        matches!(self, ColorFilterMode::Grading)
    }
}

// ============================================================================
// Frame capabilities
// ============================================================================

/// Per-frame metadata consulted by the vendor transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameMeta {
    /// Frame originates from a live camera; the SDK uses this for
    /// mirroring/orientation handling, opaque to this crate.
    pub source_is_camera: bool,
}

/// An opaque image buffer produced and consumed by the SDK.
///
/// Dimensions are exposed for diagnostics only; pixel access stays inside
/// the SDK.
pub trait SdkFrame: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Frame-construction capability of the SDK.
pub trait FrameFactory: Send + Sync {
    /// Build a frame from tightly packed RGBA bytes.
    ///
    /// Returns `None` if the factory cannot represent the input.
    fn frame_from_rgba(&self, data: &[u8], width: u32, height: u32) -> Option<Arc<dyn SdkFrame>>;
}

/// Background-substitution capability of a pipeline in replace mode.
pub trait ReplacementController: Send + Sync {
    /// Set or clear the substitute background. `None` falls back to the
    /// SDK's default fill.
    fn set_background(&self, frame: Option<Arc<dyn SdkFrame>>);
}

// ============================================================================
// Pipeline and factory
// ============================================================================

/// The vendor SDK's per-track effect-processing object.
///
/// Configuration and [`process`](Self::process) share mutable SDK state and
/// must be serialized externally (the wrapper's lock).
pub trait EffectPipeline: Send + Sync {
    fn enable_blur(&self, power: f32) -> Result<(), SdkError>;
    /// Switch to background replacement, handing back the substitution
    /// capability for this pipeline.
    fn enable_replacement(&self) -> Result<Arc<dyn ReplacementController>, SdkError>;
    fn disable_background_effects(&self);

    fn set_beautification_enabled(&self, enabled: bool) -> Result<(), SdkError>;
    fn set_beautification_power(&self, power: f32) -> Result<(), SdkError>;

    fn set_sharpening_enabled(&self, enabled: bool) -> Result<(), SdkError>;
    fn set_sharpening_strength(&self, strength: f32) -> Result<(), SdkError>;

    fn set_zoom_level(&self, level: f32) -> Result<(), SdkError>;

    fn set_color_filter(&self, mode: ColorFilterMode) -> Result<(), SdkError>;
    fn set_color_filter_strength(&self, strength: f32) -> Result<(), SdkError>;
    fn set_color_grading_reference(&self, frame: Option<Arc<dyn SdkFrame>>);

    /// Apply the currently configured effects to one frame.
    fn process(
        &self,
        frame: &Arc<dyn SdkFrame>,
        meta: FrameMeta,
    ) -> Result<Arc<dyn SdkFrame>, SdkError>;
}

/// Completion callback for asynchronous authorization.
///
/// Fires exactly once, possibly on an arbitrary SDK thread.
pub type AuthCompletion = Box<dyn FnOnce(AuthStatus) + Send>;

/// Entry point into the vendor SDK.
pub trait SdkFactory: Send + Sync {
    /// Begin asynchronous credential validation.
    fn auth(&self, credential: &str, completion: AuthCompletion);

    /// Construct a new per-track pipeline. Only valid after a successful
    /// [`auth`](Self::auth).
    fn new_pipeline(&self) -> Result<Arc<dyn EffectPipeline>, SdkError>;

    /// Frame-construction capability, if this SDK build provides one.
    fn frame_factory(&self) -> Option<Arc<dyn FrameFactory>>;
}
