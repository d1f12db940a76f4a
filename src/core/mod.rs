//! Core generator infrastructure.
//!
//! This module provides the pieces shared by every pipeline stage: the
//! build-fatal error type and the explicit compilation session that carries
//! the temp-label counter and run diagnostics.

pub mod error;
pub mod session;

pub use error::{BuildError, BuildResult};
pub use session::{GenSession, GenStats};
