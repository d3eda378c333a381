//! Display-side collaborators: the projection control plane and frame
//! producers.
//!
//! On a device the compositor is told once at startup to mirror the primary
//! display into our capture surface ([`DisplayProjector`]) and afterwards
//! notifies us of each new frame.  The synthetic implementations stand in
//! for the compositor on hosts without one.

pub mod synthetic;

use thiserror::Error;
use vnc_core::DisplayProjection;

pub use synthetic::{LoggingProjector, SyntheticDisplay, TestPatternRenderer};

/// Errors from the projection control plane.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectorError {
    #[error("virtual display {0:?} already exists")]
    AlreadyCreated(String),

    #[error("compositor rejected the projection: {0}")]
    Rejected(String),
}

/// Routes compositor output into the capture surface.
///
/// Used once at startup and once at shutdown.
pub trait DisplayProjector: Send + Sync {
    fn create_virtual_display(&self, name: &str, projection: &DisplayProjection) -> Result<(), ProjectorError>;

    /// Tears the virtual display down.  A no-op if none exists.
    fn destroy_virtual_display(&self);
}
