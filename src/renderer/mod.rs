//! Rendering module
//!
//! The star field is shaded entirely in the fragment shader; the road scene
//! draws instanced light tubes over flat road planes, optionally followed by
//! a bloom chain. `cpu` renders the star
//! field in software for previews and tests.

pub mod bloom;
pub mod cpu;
pub mod galaxy_pipeline;
pub mod gpu;
pub mod road_pipeline;
pub mod shapes;
pub mod target;
pub mod vertex;

pub use cpu::CpuRaster;
pub use gpu::GpuContext;
pub use target::GpuTarget;
