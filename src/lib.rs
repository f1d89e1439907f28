// ABOUTME: Library interface for the basinflow hydrology simulation core
// ABOUTME: Exposes the per-cell physics kernels and basin-scale routers to external drivers

pub mod engine;

pub use engine::config::Options;
pub use engine::error::CoreError;
pub use engine::sim::Simulation;
