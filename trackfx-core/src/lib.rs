//! # TrackFX Core
//!
//! State-management core for bridging a real-time video-effects SDK
//! (background replacement, blur, beautification, sharpening, color grading,
//! zoom) onto live video tracks.
//!
//! The vendor SDK is consumed through capability traits only ([`sdk`]); this
//! crate owns the parts worth getting right:
//!
//! - the authorization/lifecycle state machine ([`context`]),
//! - the per-track effect-parameter controller ([`controller`]),
//! - the wrapper serializing parameter mutation against live frame
//!   delivery ([`wrapper`]).
//!
//! ## Architecture
//!
//! ```text
//! UI thread                            frame-delivery thread
//!     │                                        │
//!     ▼                                        ▼
//! ┌────────────────────┐   one lock   ┌───────────────────┐
//! │ PipelineController │◄────────────►│  PipelineWrapper  │
//! │ (validated setters)│              │ (per-frame xform) │
//! └────────────────────┘              └───────────────────┘
//!             │                                │
//!             └────────► vendor pipeline ◄─────┘
//! ```

// ============================================================================
// SDK capability surface
// ============================================================================
pub mod sdk;

// ============================================================================
// Core state machines
// ============================================================================
pub mod context;
pub mod controller;
pub mod wrapper;

// ============================================================================
// Boundaries
// ============================================================================
pub mod adapter;
pub mod error;

// ============================================================================
// Test doubles
// ============================================================================
pub mod testing;

// ============================================================================
// Version
// ============================================================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
