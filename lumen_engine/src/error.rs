//! Error types for the Lumen engine
//!
//! This module defines the error types used throughout the engine.
//! Swapchain invalidation is deliberately absent: acquire and present report it
//! through [`AcquireOutcome`](crate::graphics_device::AcquireOutcome) and
//! [`PresentOutcome`](crate::graphics_device::PresentOutcome) instead, and registry
//! misses are plain `Option::None`.

use std::fmt;

/// Result type for Lumen engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (device call failed)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource or invalid builder/upload arguments
    InvalidResource(String),

    /// Initialization failed (device, swapchain, sync primitives)
    InitializationFailed(String),

    /// A shader binary could not be read or parsed
    ShaderLoadFailed(String),

    /// A bounded fence wait elapsed before the GPU signaled
    Timeout(String),
}

impl Error {
    /// Whether the engine can keep running after this error.
    ///
    /// Only shader load failures are reportable conditions the caller may
    /// recover from (fallback shader, skip the material). Everything else
    /// terminates the frame loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::ShaderLoadFailed(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ShaderLoadFailed(msg) => write!(f, "Shader load failed: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
