// ABOUTME: Rectangular raster storage generalized over cell type, plus the flow-direction table
// ABOUTME: Flat-memory raster generalized to any Copy cell type

use crate::engine::error::{CoreError, CoreResult};

/// A rectangular, row-major raster of cells of type `T`.
///
/// Keeps a flat-`Vec` layout and debug-assert bounds checking in favor of
/// unchecked indexing in release builds.
#[derive(Clone, Debug)]
pub struct Grid<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Copy> Grid<T> {
    pub fn new(width: usize, height: usize, default: T) -> Self {
        Self {
            data: vec![default; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        debug_assert!(self.in_bounds(x, y), "Grid index out of bounds: ({x},{y})");
        unsafe { *self.data.get_unchecked(y * self.width + x) }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(self.in_bounds(x, y), "Grid index out of bounds: ({x},{y})");
        unsafe {
            *self.data.get_unchecked_mut(y * self.width + x) = value;
        }
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        debug_assert!(self.in_bounds(x, y), "Grid index out of bounds: ({x},{y})");
        unsafe { self.data.get_unchecked_mut(y * self.width + x) }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter_coords(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| (x, y, self.get(x, y))))
    }
}

/// Per-cell mask value: active basin cell, or the outside-basin sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellStatus {
    Active,
    OutsideBasin,
}

pub type Mask = Grid<CellStatus>;

/// One outgoing edge of the flow-direction graph: neighbor offset and
/// quantized weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowEdge {
    pub dx: i32,
    pub dy: i32,
    pub weight: u8,
}

/// Per-cell outgoing flow-direction edges, plus a precomputed topological
/// order (Kahn's algorithm) over active cells used by the lateral-subsurface
/// sweep.
#[derive(Clone, Debug, Default)]
pub struct FlowDirectionTable {
    width: usize,
    height: usize,
    edges: Vec<Vec<FlowEdge>>,
    /// True when the cell's outgoing weights flow directly to the basin outlet
    /// rather than to another active cell (a sink).
    outlet: Vec<bool>,
}

impl FlowDirectionTable {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            edges: vec![Vec::new(); width * height],
            outlet: vec![false; width * height],
        }
    }

    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn set_edges(&mut self, x: usize, y: usize, edges: Vec<FlowEdge>, is_outlet: bool) {
        let i = self.idx(x, y);
        self.edges[i] = edges;
        self.outlet[i] = is_outlet;
    }

    pub fn edges(&self, x: usize, y: usize) -> &[FlowEdge] {
        &self.edges[self.idx(x, y)]
    }

    pub fn is_outlet(&self, x: usize, y: usize) -> bool {
        self.outlet[self.idx(x, y)]
    }

    /// Computes a topological order (upslope-before-downslope) over the
    /// supplied active cells via Kahn's algorithm on the flow-direction
    /// graph. Fails with `FlowDiscontinuity` if a cycle is found, which can
    /// only happen if the flow-direction grid itself is inconsistent.
    pub fn topological_order(&self, active: &[(usize, usize)]) -> CoreResult<Vec<(usize, usize)>> {
        use std::collections::{HashMap, VecDeque};

        let active_set: std::collections::HashSet<(usize, usize)> =
            active.iter().copied().collect();

        let mut indegree: HashMap<(usize, usize), u32> =
            active.iter().map(|&c| (c, 0u32)).collect();

        for &(x, y) in active {
            for edge in self.edges(x, y) {
                let nx = x as i32 + edge.dx;
                let ny = y as i32 + edge.dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if active_set.contains(&(nx, ny)) {
                    *indegree.entry((nx, ny)).or_insert(0) += 1;
                }
            }
        }

        let mut queue: VecDeque<(usize, usize)> = indegree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&c, _)| c)
            .collect();
        let mut order = Vec::with_capacity(active.len());

        while let Some(cell) = queue.pop_front() {
            order.push(cell);
            let (x, y) = cell;
            for edge in self.edges(x, y) {
                let nx = x as i32 + edge.dx;
                let ny = y as i32 + edge.dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if let Some(d) = indegree.get_mut(&(nx, ny)) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back((nx, ny));
                    }
                }
            }
        }

        if order.len() != active.len() {
            let (y, x) = order
                .iter()
                .find(|c| !active_set.contains(c))
                .copied()
                .unwrap_or((0, 0));
            return Err(CoreError::FlowDiscontinuity { y, x });
        }
        Ok(order)
    }
}
