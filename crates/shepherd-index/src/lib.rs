//! Spatial relation queries for the shepherd simulation.
//!
//! Three building blocks, all rebuilt wholesale when the simulation refreshes
//! its neighbourhoods: a metric radius index over an R-tree, first-shell
//! (Voronoi) topological neighbours derived from a Delaunay triangulation,
//! and a symmetric cache of squared pairwise distances.

pub mod delaunay;

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by the spatial query layer.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates inputs that cannot be used (e.g., mismatched site counts).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Axis-aligned rectangle bounding the planar decomposition. Sites outside
/// the rectangle take no part in the topological relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    #[must_use]
    pub fn new(min_x: f32, min_y: f32, width: f32, height: f32) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn contains(&self, (x, y): (f32, f32)) -> bool {
        x >= self.min_x
            && x <= self.min_x + self.width
            && y >= self.min_y
            && y <= self.min_y + self.height
    }
}

#[derive(Debug, Clone, Copy)]
struct SitePoint {
    idx: usize,
    pos: [f32; 2],
}

impl RTreeObject for SitePoint {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

impl PointDistance for SitePoint {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.pos[0] - point[0];
        let dy = self.pos[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Metric radius index over a set of 2D sites.
#[derive(Debug, Clone)]
pub struct MetricIndex {
    tree: RTree<SitePoint>,
}

impl MetricIndex {
    /// Build the index from scratch. Site indices are positions in the slice.
    #[must_use]
    pub fn build(positions: &[(f32, f32)]) -> Self {
        let sites = positions
            .iter()
            .enumerate()
            .map(|(idx, &(x, y))| SitePoint { idx, pos: [x, y] })
            .collect();
        Self {
            tree: RTree::bulk_load(sites),
        }
    }

    /// Sites strictly within `radius` of `center`, nearest first, with their
    /// distances. `skip` excludes the querying site itself.
    #[must_use]
    pub fn within(&self, center: (f32, f32), radius: f32, skip: Option<usize>) -> Vec<(usize, f32)> {
        let radius_sq = radius * radius;
        let envelope = AABB::from_corners(
            [center.0 - radius, center.1 - radius],
            [center.0 + radius, center.1 + radius],
        );
        let query = [center.0, center.1];
        let mut hits: Vec<(usize, f32)> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter(|site| Some(site.idx) != skip)
            .filter_map(|site| {
                let dist_sq = site.distance_2(&query);
                (dist_sq < radius_sq).then(|| (site.idx, dist_sq.sqrt()))
            })
            .collect();
        hits.sort_by_key(|&(idx, dist)| (OrderedFloat(dist), idx));
        hits
    }
}

/// Symmetric cache of squared pairwise distances, indexed by dense site ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistanceCache {
    n: usize,
    cells: Vec<f32>,
}

impl DistanceCache {
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            n,
            cells: vec![0.0; n * n],
        }
    }

    /// Recompute every pair from current positions. The diagonal stays zero
    /// and `get(i, j) == get(j, i)` by construction.
    pub fn refresh(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        if positions.len() != self.n {
            return Err(IndexError::InvalidConfig(
                "position count does not match cache size",
            ));
        }
        for i in 0..self.n {
            for j in 0..i {
                let dx = positions[i].0 - positions[j].0;
                let dy = positions[i].1 - positions[j].1;
                let dist_sq = dx * dx + dy * dy;
                self.cells[i * self.n + j] = dist_sq;
                self.cells[j * self.n + i] = dist_sq;
            }
        }
        Ok(())
    }

    /// Squared distance between sites `i` and `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.cells[i * self.n + j]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

/// First Voronoi shell for every site: the sites whose cells share an edge,
/// computed via Delaunay adjacency within `bounds`. The relation is
/// symmetric. Degenerate inputs are defined: two sites are mutual
/// neighbours, collinear sites chain in coordinate order, and exact
/// duplicates alias each other's neighbourhoods.
#[must_use]
pub fn first_shell_neighbours(sites: &[(f32, f32)], bounds: Bounds) -> Vec<Vec<usize>> {
    let mut neighbours = vec![Vec::new(); sites.len()];
    let inside: Vec<usize> = (0..sites.len())
        .filter(|&i| bounds.contains(sites[i]))
        .collect();
    if inside.len() < 2 {
        return neighbours;
    }
    let points: Vec<(f64, f64)> = inside
        .iter()
        .map(|&i| (f64::from(sites[i].0), f64::from(sites[i].1)))
        .collect();

    // Collapse exact duplicates; co-located sites share one distinct vertex.
    let mut distinct: Vec<(f64, f64)> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    let mut distinct_of: Vec<usize> = Vec::with_capacity(points.len());
    for (li, &p) in points.iter().enumerate() {
        match distinct.iter().position(|&q| q == p) {
            Some(di) => {
                members[di].push(li);
                distinct_of.push(di);
            }
            None => {
                distinct_of.push(distinct.len());
                members.push(vec![li]);
                distinct.push(p);
            }
        }
    }

    let adjacency = if distinct.len() < 2 {
        vec![Vec::new(); distinct.len()]
    } else {
        let triangulation = delaunay::triangulate(&distinct);
        let mut adjacency = triangulation.adjacency();
        if triangulation.triangles.is_empty() {
            // Two distinct sites, or a fully collinear set: the Voronoi
            // cells form a chain in coordinate order.
            let mut order: Vec<usize> = (0..distinct.len()).collect();
            order.sort_by(|&a, &b| {
                distinct[a]
                    .partial_cmp(&distinct[b])
                    .unwrap_or(Ordering::Equal)
            });
            for pair in order.windows(2) {
                adjacency[pair[0]].push(pair[1]);
                adjacency[pair[1]].push(pair[0]);
            }
        }
        adjacency
    };

    for (li, &site) in inside.iter().enumerate() {
        let di = distinct_of[li];
        let mut list: Vec<usize> = members[di]
            .iter()
            .filter(|&&m| m != li)
            .map(|&m| inside[m])
            .collect();
        for &dj in &adjacency[di] {
            list.extend(members[dj].iter().map(|&m| inside[m]));
        }
        list.sort_unstable();
        neighbours[site] = list;
    }
    neighbours
}
