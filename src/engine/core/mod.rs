// ABOUTME: Core engine foundation - raster storage, calendar, soil/canopy/channel data model
// ABOUTME: Provides the fundamental building blocks physics kernels and routers are assembled from

pub mod calendar;
pub mod canopy_state;
pub mod channel_graph;
pub mod grid;
pub mod rootfind;
pub mod soil_column;

pub use calendar::Calendar;
pub use grid::{CellStatus, FlowDirectionTable, Grid, Mask};
