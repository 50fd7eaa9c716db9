//! Engine error taxonomy
//!
//! None of these escape the embedding boundary; they are logged and kept as
//! diagnostics on the engine.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The platform could not provide an adapter, device or surface
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    /// The swapchain was lost and must be reconfigured
    #[error("surface lost")]
    SurfaceLost,

    #[error("out of GPU memory")]
    OutOfMemory,

    #[error("render failed: {0}")]
    Render(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Operation attempted on a torn-down engine
    #[error("engine disposed")]
    Disposed,
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<wgpu::SurfaceError> for EngineError {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => EngineError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => EngineError::OutOfMemory,
            other => EngineError::Render(format!("{other:?}")),
        }
    }
}
