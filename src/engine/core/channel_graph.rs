// ABOUTME: Channel/road network graph - directed segment forest with precomputed topological order
// ABOUTME: One generic type parameterized by NetworkKind reused for both streams and roads

use crate::engine::error::{CoreError, CoreResult};
use std::collections::HashMap;

/// Dense index into a `ChannelGraph`'s segment vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub u32);

/// Distinguishes a stream-channel graph from a road-network graph using the
/// same underlying struct shape: one generic type parameterized by a
/// NetworkKind tag used only for behavior selection in the router, not
/// duplicated struct definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkKind {
    Stream,
    Road,
}

/// Hydraulic class shared by segments of the same width/friction/capacity
/// (mirrors the soil/vegetation class-table convention).
#[derive(Clone, Debug)]
pub struct HydraulicClass {
    pub id: u32,
    pub width: f32,
    pub friction_manning_n: f32,
    pub max_infiltration: f32,
}

/// A single cell crossing a segment, with its subsegment length and azimuth.
#[derive(Clone, Copy, Debug)]
pub struct CellCrossing {
    pub x: usize,
    pub y: usize,
    pub subsegment_length: f32,
    pub azimuth: f32,
}

/// One segment of the channel (or road) network.
#[derive(Clone, Debug)]
pub struct Segment {
    pub id: SegmentId,
    pub downstream: Option<SegmentId>,
    pub length: f32,
    pub slope: f32,
    pub class: HydraulicClass,
    /// Topological rank; segments are visited in strictly nondecreasing
    /// order.
    pub order: u32,
    pub crossings: Vec<CellCrossing>,
    pub inflow_current: f32,
    pub inflow_previous: f32,
    pub outflow_current: f32,
    pub outflow_previous: f32,
}

/// What happens at a road-network segment with no downstream.
#[derive(Clone, Copy, Debug)]
pub enum RoadOutlet {
    /// Water is discarded and tallied to the basin total.
    Sink,
    /// Water is deposited back onto the raster at a designated downhill cell.
    Return { target_x: usize, target_y: usize },
    /// Water joins a stream segment's lateral inflow.
    Confluence { into: SegmentId },
}

/// Directed segment forest plus the bidirectional cell<->segment crossing
/// map.
#[derive(Clone, Debug)]
pub struct ChannelGraph {
    pub kind: NetworkKind,
    pub segments: Vec<Segment>,
    /// cell (x,y) -> list of segments crossing it (dense lookup keyed by a
    /// flattened (x, y) pair since the raster width is known by the caller).
    pub cell_to_segments: HashMap<(usize, usize), Vec<SegmentId>>,
    pub outlets: HashMap<SegmentId, RoadOutlet>,
}

impl ChannelGraph {
    pub fn new(kind: NetworkKind) -> Self {
        Self {
            kind,
            segments: Vec::new(),
            cell_to_segments: HashMap::new(),
            outlets: HashMap::new(),
        }
    }

    pub fn segment(&self, id: SegmentId) -> &Segment {
        &self.segments[id.0 as usize]
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> &mut Segment {
        &mut self.segments[id.0 as usize]
    }

    pub fn add_segment(&mut self, mut segment: Segment) -> SegmentId {
        let id = SegmentId(self.segments.len() as u32);
        segment.id = id;
        for crossing in &segment.crossings {
            self.cell_to_segments
                .entry((crossing.x, crossing.y))
                .or_default()
                .push(id);
        }
        self.segments.push(segment);
        id
    }

    /// Segments visited in strictly nondecreasing `order`.
    pub fn order_for_routing(&self) -> Vec<SegmentId> {
        let mut ids: Vec<SegmentId> = self.segments.iter().map(|s| s.id).collect();
        ids.sort_by_key(|id| self.segment(*id).order);
        ids
    }

    /// Computes each segment's topological `order` from its `downstream`
    /// links via Kahn's algorithm on the reversed (upstream) graph: a
    /// segment's order is one greater than the maximum order of its
    /// upstream segments (0 for headwaters).
    pub fn assign_orders_from_topology(&mut self) -> CoreResult<()> {
        let n = self.segments.len();
        let mut upstream_count = vec![0u32; n];
        for s in &self.segments {
            if let Some(ds) = s.downstream {
                upstream_count[ds.0 as usize] += 1;
            }
        }
        let mut upstreams_seen = vec![0u32; n];
        let mut order = vec![None; n];
        let mut queue: Vec<usize> = (0..n).filter(|&i| upstream_count[i] == 0).collect();
        let mut rank = 0u32;
        let mut visited = 0usize;

        while !queue.is_empty() {
            let mut next_queue = Vec::new();
            for i in queue {
                order[i] = Some(rank);
                visited += 1;
                if let Some(ds) = self.segments[i].downstream {
                    let d = ds.0 as usize;
                    upstreams_seen[d] += 1;
                    if upstreams_seen[d] == upstream_count[d] {
                        next_queue.push(d);
                    }
                }
            }
            queue = next_queue;
            rank += 1;
        }

        if visited != n {
            return Err(CoreError::FlowDiscontinuity { y: 0, x: 0 });
        }
        for (i, o) in order.into_iter().enumerate() {
            self.segments[i].order = o.unwrap_or(0);
        }
        Ok(())
    }

    pub fn swap_step_buffers(&mut self) {
        for s in &mut self.segments {
            s.inflow_previous = s.inflow_current;
            s.outflow_previous = s.outflow_current;
            s.inflow_current = 0.0;
            s.outflow_current = 0.0;
        }
    }
}
