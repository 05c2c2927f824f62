//! # TrackFX Bridge
//!
//! Synchronous command surface mapping UI plugin-channel calls onto per-track
//! [`PipelineController`]s. The channel transport itself (method marshalling,
//! codecs) lives outside this crate; what crosses the boundary here is a
//! method name plus JSON params in, and a JSON value or a structured
//! `domain`/`code`/`message` error out.
//!
//! ## Command set
//!
//! Per attached track: `setPipelineMode`, `setBeautificationEnabled`,
//! `setZoomLevel`, `setSharpeningEnabled`, `setColorFilterMode`, get/set for
//! `blurPower`, `beautificationPower`, `sharpeningStrength`,
//! `colorFilterStrength`, reads for `zoomLevel`, `beautificationEnabled`,
//! `pipelineMode`, `colorFilterMode`, and background / grading-reference
//! commands built through the SDK's frame factory (frame objects themselves
//! cannot cross a JSON boundary).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use trackfx_core::adapter::{ProcessingAdapter, TrackEffects};
use trackfx_core::context::{solid_frame, SdkContext};
use trackfx_core::controller::PipelineController;
use trackfx_core::error::{ColorFilterError, EffectsError};
use trackfx_core::sdk::{FrameFactory, SdkFrame};

// ============================================================================
// Structured errors
// ============================================================================

/// Error domain reported to the UI layer.
pub const ERROR_DOMAIN: &str = "VideoEffectsSDK";

/// Structured error crossing the plugin boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{domain}/{code}: {message}")]
pub struct BridgeError {
    pub domain: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl BridgeError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            domain: ERROR_DOMAIN,
            code,
            message: message.into(),
        }
    }

    fn unknown_track(track_id: &str) -> Self {
        Self::new("unknown-track", format!("no effects attached to track {track_id:?}"))
    }

    fn bad_args(message: impl Into<String>) -> Self {
        Self::new("bad-args", message)
    }
}

impl From<EffectsError> for BridgeError {
    fn from(err: EffectsError) -> Self {
        let code = match &err {
            EffectsError::NotAuthorized => "not-authorized",
            EffectsError::AuthorizationPending => "auth-pending",
            EffectsError::AuthorizationFailed { .. } => "auth-failed",
            EffectsError::UnknownMode(_) => "unknown-mode",
            EffectsError::OutOfRange { .. } => "out-of-range",
            EffectsError::ColorFilter(inner) => return (*inner).into(),
            EffectsError::TornDown => "torn-down",
            EffectsError::Sdk(_) => "sdk-failure",
        };
        Self::new(code, err.to_string())
    }
}

impl From<ColorFilterError> for BridgeError {
    fn from(err: ColorFilterError) -> Self {
        let code = match err {
            ColorFilterError::UnknownMode => "unknown-color-filter-mode",
            ColorFilterError::NoGradingReference => "no-grading-reference",
            ColorFilterError::InitializationFailed => "color-filter-init-failed",
        };
        Self::new(code, err.to_string())
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Per-track effects registry plus the command dispatcher over it.
pub struct EffectsBridge {
    context: SdkContext,
    tracks: Mutex<HashMap<String, TrackEffects>>,
}

impl EffectsBridge {
    pub fn new(context: SdkContext) -> Self {
        Self {
            context,
            tracks: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &SdkContext {
        &self.context
    }

    /// Wire effects onto a track's frame adapter. Requires an authorized
    /// context.
    pub fn attach_track(
        &self,
        track_id: &str,
        adapter: Arc<ProcessingAdapter>,
    ) -> Result<(), BridgeError> {
        let mut tracks = self.tracks.lock();
        if tracks.contains_key(track_id) {
            return Err(BridgeError::new(
                "track-exists",
                format!("effects already attached to track {track_id:?}"),
            ));
        }
        let controller = self.context.new_pipeline_controller(&adapter)?;
        tracks.insert(track_id.to_string(), TrackEffects::new(adapter, controller));
        debug!(track = track_id, "effects attached");
        Ok(())
    }

    /// Unwire and tear down a track's effects.
    pub fn detach_track(&self, track_id: &str) -> Result<(), BridgeError> {
        let effects = self
            .tracks
            .lock()
            .remove(track_id)
            .ok_or_else(|| BridgeError::unknown_track(track_id))?;
        effects.teardown();
        debug!(track = track_id, "effects detached");
        Ok(())
    }

    pub fn attached_tracks(&self) -> Vec<String> {
        self.tracks.lock().keys().cloned().collect()
    }

    /// Handle one synchronous plugin-channel command for a track.
    pub fn handle(&self, track_id: &str, method: &str, params: &Value) -> Result<Value, BridgeError> {
        let tracks = self.tracks.lock();
        let effects = tracks
            .get(track_id)
            .ok_or_else(|| BridgeError::unknown_track(track_id))?;
        self.dispatch(effects.controller(), method, params)
    }

    fn dispatch(
        &self,
        controller: &PipelineController,
        method: &str,
        params: &Value,
    ) -> Result<Value, BridgeError> {
        match method {
            "setPipelineMode" => {
                controller.set_pipeline_mode(str_param(params, "mode")?)?;
                Ok(Value::Null)
            }
            "getPipelineMode" => Ok(json!(controller.pipeline_mode().name())),

            "setBeautificationEnabled" => {
                controller.set_beautification_enabled(bool_param(params, "enabled")?)?;
                Ok(Value::Null)
            }
            "getBeautificationEnabled" => Ok(json!(controller.beautification_enabled())),

            "setZoomLevel" => {
                controller.set_zoom_level(f32_param(params, "level")?)?;
                Ok(Value::Null)
            }
            "getZoomLevel" => Ok(json!(controller.zoom_level())),

            "setSharpeningEnabled" => {
                controller.set_sharpening_enabled(bool_param(params, "enabled")?)?;
                Ok(Value::Null)
            }
            "getSharpeningEnabled" => Ok(json!(controller.sharpening_enabled())),

            "setColorFilterMode" => {
                controller.set_color_filter_mode(str_param(params, "mode")?)?;
                Ok(Value::Null)
            }
            "getColorFilterMode" => Ok(json!(controller.color_filter_mode().name())),

            "setBlurPower" => {
                controller.set_blur_power(f32_param(params, "power")?)?;
                Ok(Value::Null)
            }
            "getBlurPower" => Ok(json!(controller.blur_power())),

            "setBeautificationPower" => {
                controller.set_beautification_power(f32_param(params, "power")?)?;
                Ok(Value::Null)
            }
            "getBeautificationPower" => Ok(json!(controller.beautification_power())),

            "setSharpeningStrength" => {
                controller.set_sharpening_strength(f32_param(params, "strength")?)?;
                Ok(Value::Null)
            }
            "getSharpeningStrength" => Ok(json!(controller.sharpening_strength())),

            "setColorFilterStrength" => {
                controller.set_color_filter_strength(f32_param(params, "strength")?)?;
                Ok(Value::Null)
            }
            "getColorFilterStrength" => Ok(json!(controller.color_filter_strength())),

            "setBackgroundColor" => {
                let frame = self
                    .solid_background(
                        f32_param(params, "r")?,
                        f32_param(params, "g")?,
                        f32_param(params, "b")?,
                    )?;
                controller.set_background(Some(frame))?;
                Ok(Value::Null)
            }
            "clearBackground" => {
                controller.set_background(None)?;
                Ok(Value::Null)
            }

            "setColorGradingReference" => {
                let (data, width, height) = rgba_param(params)?;
                let factory = self.frame_factory()?;
                let frame = factory
                    .frame_from_rgba(&data, width, height)
                    .ok_or_else(|| {
                        BridgeError::bad_args("frame factory rejected reference image")
                    })?;
                controller.set_color_grading_reference(Some(frame))?;
                Ok(Value::Null)
            }
            "clearColorGradingReference" => {
                controller.set_color_grading_reference(None)?;
                Ok(Value::Null)
            }

            _ => Err(BridgeError::new(
                "unknown-method",
                format!("method not found: {method}"),
            )),
        }
    }

    fn frame_factory(&self) -> Result<Arc<dyn FrameFactory>, BridgeError> {
        self.context
            .frame_factory()
            .ok_or_else(|| BridgeError::new("no-frame-factory", "sdk provides no frame factory"))
    }

    fn solid_background(
        &self,
        r: f32,
        g: f32,
        b: f32,
    ) -> Result<Arc<dyn SdkFrame>, BridgeError> {
        let factory = self.frame_factory()?;
        solid_frame(Some(&factory), r, g, b)
            .ok_or_else(|| BridgeError::bad_args("frame factory rejected background color"))
    }
}

// ============================================================================
// Param extraction
// ============================================================================

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, BridgeError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::bad_args(format!("missing string param {key:?}")))
}

fn bool_param(params: &Value, key: &str) -> Result<bool, BridgeError> {
    params
        .get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| BridgeError::bad_args(format!("missing bool param {key:?}")))
}

fn f32_param(params: &Value, key: &str) -> Result<f32, BridgeError> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .ok_or_else(|| BridgeError::bad_args(format!("missing number param {key:?}")))
}

fn rgba_param(params: &Value) -> Result<(Vec<u8>, u32, u32), BridgeError> {
    let width = params
        .get("width")
        .and_then(Value::as_u64)
        .ok_or_else(|| BridgeError::bad_args("missing number param \"width\""))? as u32;
    let height = params
        .get("height")
        .and_then(Value::as_u64)
        .ok_or_else(|| BridgeError::bad_args("missing number param \"height\""))? as u32;
    let raw = params
        .get("rgba")
        .and_then(Value::as_array)
        .ok_or_else(|| BridgeError::bad_args("missing array param \"rgba\""))?;
    let data = raw
        .iter()
        .map(|v| {
            v.as_u64()
                .filter(|byte| *byte <= u8::MAX as u64)
                .map(|byte| byte as u8)
                .ok_or_else(|| BridgeError::bad_args("rgba bytes must be 0..=255"))
        })
        .collect::<Result<Vec<u8>, _>>()?;
    if data.len() as u64 != u64::from(width) * u64::from(height) * 4 {
        return Err(BridgeError::bad_args(format!(
            "rgba length {} does not match {width}x{height}",
            data.len()
        )));
    }
    Ok((data, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    use trackfx_core::adapter::FrameSink;
    use trackfx_core::sdk::AuthStatus;
    use trackfx_core::testing::{FakeSdkFactory, FakeSdkFrame, FakeSink};

    fn authorized_bridge() -> (EffectsBridge, Arc<FakeSdkFactory>, Arc<FakeSink>) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let factory = Arc::new(FakeSdkFactory::new());
        let context = SdkContext::new(Arc::clone(&factory) as _);
        context.authorize("key", |_| {}).unwrap();
        factory.complete_auth(AuthStatus::Active);

        let bridge = EffectsBridge::new(context);
        let sink = Arc::new(FakeSink::new());
        let adapter = Arc::new(ProcessingAdapter::new(
            Arc::clone(&sink) as Arc<dyn FrameSink>,
            true,
        ));
        bridge.attach_track("track-1", adapter).unwrap();
        (bridge, factory, sink)
    }

    #[test]
    fn test_attach_requires_authorization() {
        let context = SdkContext::new(Arc::new(FakeSdkFactory::new()));
        let bridge = EffectsBridge::new(context);
        let adapter = Arc::new(ProcessingAdapter::new(
            Arc::new(FakeSink::new()) as Arc<dyn FrameSink>,
            false,
        ));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bridge.attach_track("track-1", adapter)
        }));
        // Debug builds assert; release builds report not-authorized.
        match result {
            Ok(outcome) => assert_eq!(outcome.unwrap_err().code, "not-authorized"),
            Err(_) => {}
        }
    }

    #[test]
    fn test_every_command_succeeds_on_live_track() {
        let (bridge, _, _) = authorized_bridge();
        let track = "track-1";

        let commands: Vec<(&str, Value)> = vec![
            ("setPipelineMode", json!({ "mode": "blur" })),
            ("setBeautificationEnabled", json!({ "enabled": true })),
            ("setZoomLevel", json!({ "level": 2.0 })),
            ("setSharpeningEnabled", json!({ "enabled": true })),
            ("setBlurPower", json!({ "power": 0.3 })),
            ("setBeautificationPower", json!({ "power": 0.4 })),
            ("setSharpeningStrength", json!({ "strength": 0.5 })),
            ("setColorFilterStrength", json!({ "strength": 0.6 })),
            ("setColorFilterMode", json!({ "mode": "correction" })),
            ("setBackgroundColor", json!({ "r": 0.0, "g": 1.0, "b": 0.0 })),
            ("clearBackground", json!({})),
            (
                "setColorGradingReference",
                json!({ "rgba": vec![128u8; 16], "width": 2, "height": 2 }),
            ),
            ("setColorFilterMode", json!({ "mode": "grading" })),
            ("clearColorGradingReference", json!({})),
        ];
        for (method, params) in commands {
            bridge
                .handle(track, method, &params)
                .unwrap_or_else(|err| panic!("{method} failed: {err}"));
        }

        assert_eq!(
            bridge.handle(track, "getPipelineMode", &json!({})).unwrap(),
            json!("blur")
        );
        assert_eq!(
            bridge.handle(track, "getZoomLevel", &json!({})).unwrap(),
            json!(2.0)
        );
        assert_eq!(
            bridge
                .handle(track, "getBeautificationEnabled", &json!({}))
                .unwrap(),
            json!(true)
        );
        assert_eq!(
            bridge.handle(track, "getBlurPower", &json!({})).unwrap(),
            json!(0.3f32)
        );
    }

    #[test]
    fn test_unknown_method_and_track_codes() {
        let (bridge, _, _) = authorized_bridge();

        let err = bridge
            .handle("track-1", "selfDestruct", &json!({}))
            .unwrap_err();
        assert_eq!(err.code, "unknown-method");
        assert_eq!(err.domain, ERROR_DOMAIN);

        let err = bridge
            .handle("track-9", "getZoomLevel", &json!({}))
            .unwrap_err();
        assert_eq!(err.code, "unknown-track");
    }

    #[test]
    fn test_validation_failures_map_to_stable_codes() {
        let (bridge, _, _) = authorized_bridge();
        let track = "track-1";

        let err = bridge
            .handle(track, "setPipelineMode", &json!({ "mode": "sepia" }))
            .unwrap_err();
        assert_eq!(err.code, "unknown-mode");

        let err = bridge
            .handle(track, "setZoomLevel", &json!({ "level": 40.0 }))
            .unwrap_err();
        assert_eq!(err.code, "out-of-range");
        assert!(err.message.contains("zoom level"));

        let err = bridge
            .handle(track, "setColorFilterMode", &json!({ "mode": "grading" }))
            .unwrap_err();
        assert_eq!(err.code, "no-grading-reference");

        let err = bridge
            .handle(track, "setZoomLevel", &json!({}))
            .unwrap_err();
        assert_eq!(err.code, "bad-args");
    }

    #[test]
    fn test_failed_validation_leaves_state_unchanged() {
        let (bridge, _, _) = authorized_bridge();
        let track = "track-1";

        bridge
            .handle(track, "setZoomLevel", &json!({ "level": 3.0 }))
            .unwrap();
        let _ = bridge.handle(track, "setZoomLevel", &json!({ "level": 99.0 }));
        assert_eq!(
            bridge.handle(track, "getZoomLevel", &json!({})).unwrap(),
            json!(3.0)
        );
    }

    #[test]
    fn test_rgba_param_validation() {
        let (bridge, _, _) = authorized_bridge();
        let err = bridge
            .handle(
                "track-1",
                "setColorGradingReference",
                &json!({ "rgba": [0, 0, 0], "width": 2, "height": 2 }),
            )
            .unwrap_err();
        assert_eq!(err.code, "bad-args");

        let err = bridge
            .handle(
                "track-1",
                "setColorGradingReference",
                &json!({ "rgba": [300, 0, 0, 0], "width": 1, "height": 1 }),
            )
            .unwrap_err();
        assert_eq!(err.code, "bad-args");
    }

    #[test]
    fn test_refused_background_frame_reports_bad_args() {
        let (bridge, factory, _) = authorized_bridge();
        factory.frame_factory_handle().unwrap().refuse(true);

        let err = bridge
            .handle(
                "track-1",
                "setBackgroundColor",
                &json!({ "r": 1.0, "g": 0.0, "b": 0.0 }),
            )
            .unwrap_err();
        assert_eq!(err.code, "bad-args");
    }

    #[test]
    fn test_duplicate_attach_rejected() {
        let (bridge, _, _) = authorized_bridge();
        let adapter = Arc::new(ProcessingAdapter::new(
            Arc::new(FakeSink::new()) as Arc<dyn FrameSink>,
            false,
        ));
        let err = bridge.attach_track("track-1", adapter).unwrap_err();
        assert_eq!(err.code, "track-exists");
    }

    #[test]
    fn test_detach_tears_down_and_frames_keep_flowing() {
        let (bridge, factory, sink) = authorized_bridge();
        let pipeline = factory.pipelines().pop().unwrap();

        // Keep a handle to the adapter before detaching.
        let adapter = {
            let tracks = bridge.tracks.lock();
            Arc::clone(tracks.get("track-1").unwrap().adapter())
        };

        bridge.detach_track("track-1").unwrap();
        assert!(bridge.attached_tracks().is_empty());
        assert_eq!(
            bridge
                .handle("track-1", "getZoomLevel", &json!({}))
                .unwrap_err()
                .code,
            "unknown-track"
        );

        adapter.deliver(Arc::new(FakeSdkFrame::new(640, 480)));
        assert_eq!(pipeline.processed_frames(), 0);
        assert_eq!(sink.emitted(), 1);
    }

    #[test]
    fn test_bridge_error_serializes_with_domain_and_code() {
        let err = BridgeError::new("unknown-mode", "unknown pipeline mode: \"sepia\"");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["domain"], "VideoEffectsSDK");
        assert_eq!(value["code"], "unknown-mode");
        assert!(value["message"].as_str().unwrap().contains("sepia"));
    }
}
