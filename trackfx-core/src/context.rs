//! # SDK Context
//!
//! Owns the vendor SDK's authorization lifecycle and constructs per-track
//! pipeline controllers once authorized.
//!
//! One context per process, explicitly constructed and passed around (clones
//! share state); there is no hidden global instance.
//!
//! ## Authorization state machine
//!
//! ```text
//! NotAuthorized ──authorize()──► Authorizing ──completion──► Authorized
//!       ▲                            │
//!       └────────── failure ─────────┘
//! ```
//!
//! Progression is monotonic within one attempt; failure returns to
//! `NotAuthorized` and retry is the caller's responsibility.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::adapter::ProcessingAdapter;
use crate::controller::PipelineController;
use crate::error::EffectsError;
use crate::sdk::{name_of_auth_status, AuthStatus, FrameFactory, SdkFactory, SdkFrame};
use crate::wrapper::PipelineWrapper;

/// Authorization lifecycle of the vendor SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    NotAuthorized,
    Authorizing,
    Authorized,
}

impl AuthState {
    pub fn name(&self) -> &'static str {
        match self {
            AuthState::NotAuthorized => "not-authorized",
            AuthState::Authorizing => "authorizing",
            AuthState::Authorized => "authorized",
        }
    }
}

struct ContextInner {
    factory: Arc<dyn SdkFactory>,
    state: Mutex<AuthState>,
    frame_factory: Mutex<Option<Arc<dyn FrameFactory>>>,
}

/// Process-wide handle to the vendor SDK.
#[derive(Clone)]
pub struct SdkContext {
    inner: Arc<ContextInner>,
}

impl SdkContext {
    pub fn new(factory: Arc<dyn SdkFactory>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                factory,
                state: Mutex::new(AuthState::NotAuthorized),
                frame_factory: Mutex::new(None),
            }),
        }
    }

    /// Current authorization state.
    pub fn auth_state(&self) -> AuthState {
        *self.inner.state.lock()
    }

    /// Frame-construction capability, available once authorized.
    pub fn frame_factory(&self) -> Option<Arc<dyn FrameFactory>> {
        self.inner.frame_factory.lock().clone()
    }

    /// Begin asynchronous credential validation.
    ///
    /// Transitions to `Authorizing` immediately; `completion` fires exactly
    /// once with the terminal outcome, possibly on an SDK thread. A failed
    /// attempt returns the context to `NotAuthorized`; retry is the caller's
    /// call. A second `authorize` while one is in flight is rejected with
    /// [`EffectsError::AuthorizationPending`].
    pub fn authorize(
        &self,
        credential: &str,
        completion: impl FnOnce(Result<(), EffectsError>) + Send + 'static,
    ) -> Result<(), EffectsError> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                AuthState::Authorized => {
                    drop(state);
                    completion(Ok(()));
                    return Ok(());
                }
                AuthState::Authorizing => return Err(EffectsError::AuthorizationPending),
                AuthState::NotAuthorized => *state = AuthState::Authorizing,
            }
        }
        debug!("sdk authorization started");

        let inner = Arc::clone(&self.inner);
        self.inner.factory.auth(
            credential,
            Box::new(move |status| {
                if status == AuthStatus::Active {
                    let frame_factory = inner.factory.frame_factory();
                    *inner.frame_factory.lock() = frame_factory;
                    *inner.state.lock() = AuthState::Authorized;
                    info!("sdk authorized");
                    completion(Ok(()));
                } else {
                    *inner.state.lock() = AuthState::NotAuthorized;
                    warn!(
                        status = name_of_auth_status(status),
                        "sdk authorization failed"
                    );
                    completion(Err(EffectsError::AuthorizationFailed {
                        status: name_of_auth_status(status),
                    }));
                }
            }),
        );
        Ok(())
    }

    /// Construct a pipeline controller for one video track and wire its
    /// wrapper into the given adapter.
    ///
    /// Contract: the SDK must be authorized. Calling earlier is a programming
    /// error; panics in debug builds, reported in release.
    pub fn new_pipeline_controller(
        &self,
        adapter: &ProcessingAdapter,
    ) -> Result<PipelineController, EffectsError> {
        let state = self.auth_state();
        if state != AuthState::Authorized {
            debug_assert!(false, "pipeline requested before authorization");
            warn!(state = state.name(), "pipeline requested before authorization");
            return Err(EffectsError::NotAuthorized);
        }

        let pipeline = self.inner.factory.new_pipeline()?;
        let wrapper = Arc::new(PipelineWrapper::new(
            pipeline,
            self.frame_factory(),
            adapter.source_is_camera(),
        ));
        adapter.attach(Arc::clone(&wrapper));
        Ok(PipelineController::new(wrapper))
    }
}

// ============================================================================
// Frame helpers
// ============================================================================

/// Side length of generated solid-color frames.
const SOLID_FRAME_SIZE: u32 = 16;

/// Build a constant-color frame, e.g. a placeholder background.
///
/// Channels are in `[0, 1]` and clamped. Returns `None` when no frame
/// factory is available.
pub fn solid_frame(
    factory: Option<&Arc<dyn FrameFactory>>,
    r: f32,
    g: f32,
    b: f32,
) -> Option<Arc<dyn SdkFrame>> {
    let factory = factory?;
    let pixel = [channel(r), channel(g), channel(b), 0xff];
    let data: Vec<u8> = pixel
        .iter()
        .copied()
        .cycle()
        .take((SOLID_FRAME_SIZE * SOLID_FRAME_SIZE * 4) as usize)
        .collect();
    factory.frame_from_rgba(&data, SOLID_FRAME_SIZE, SOLID_FRAME_SIZE)
}

fn channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
