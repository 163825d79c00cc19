//! Segment-based obstacle geometry: fence panels, tree lines, arena walls.
//!
//! Every obstacle is a line segment. Repulsion terms treat each segment
//! independently (one closest point per panel), while occlusion and arc
//! planning use straight-line intersection queries.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use shepherd_index::Bounds;

use crate::heading_vector;

/// A single obstacle panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    #[must_use]
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    /// Closest point on this segment to `p`.
    #[must_use]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let ab = self.b - self.a;
        let len_sq = ab.length_squared();
        if len_sq <= f32::EPSILON {
            return self.a;
        }
        let t = ((p - self.a).dot(ab) / len_sq).clamp(0.0, 1.0);
        self.a + ab * t
    }
}

/// The set of obstacles an agent can collide with or be occluded by.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSet {
    segments: Vec<Segment>,
}

impl ObstacleSet {
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Four fence panels enclosing a rectangle.
    #[must_use]
    pub fn fenced_rectangle(bounds: Bounds) -> Self {
        let lo = Vec2::new(bounds.min_x, bounds.min_y);
        let hi = Vec2::new(bounds.min_x + bounds.width, bounds.min_y + bounds.height);
        Self::new(vec![
            Segment::new(lo, Vec2::new(hi.x, lo.y)),
            Segment::new(Vec2::new(hi.x, lo.y), hi),
            Segment::new(hi, Vec2::new(lo.x, hi.y)),
            Segment::new(Vec2::new(lo.x, hi.y), lo),
        ])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Nearest point on any obstacle boundary, if the set is non-empty.
    #[must_use]
    pub fn closest_boundary_point(&self, p: Vec2) -> Option<Vec2> {
        self.segments
            .iter()
            .map(|segment| segment.closest_point(p))
            .min_by(|a, b| a.distance_squared(p).total_cmp(&b.distance_squared(p)))
    }

    /// Per-segment closest points within `radius` of `p`. Each panel
    /// contributes its own repulsion term.
    pub fn boundary_points_within(&self, p: Vec2, radius: f32) -> impl Iterator<Item = Vec2> + '_ {
        let radius_sq = radius * radius;
        self.segments
            .iter()
            .map(move |segment| segment.closest_point(p))
            .filter(move |point| point.distance_squared(p) < radius_sq)
    }

    /// Does any obstacle cross the straight line from `from` to `to`?
    #[must_use]
    pub fn blocked(&self, from: Vec2, to: Vec2) -> bool {
        let offset = to - from;
        let length = offset.length();
        if length <= f32::EPSILON {
            return false;
        }
        let dir = offset / length;
        self.segments
            .iter()
            .any(|segment| ray_hit(from, dir, length, segment).is_some())
    }

    /// Distance to the nearest obstacle along `heading_degrees`, if one lies
    /// within `max_dist`.
    #[must_use]
    pub fn raycast(&self, origin: Vec2, heading_degrees: f32, max_dist: f32) -> Option<f32> {
        let dir = heading_vector(heading_degrees);
        self.segments
            .iter()
            .filter_map(|segment| ray_hit(origin, dir, max_dist, segment))
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Parametric ray/segment intersection; returns the hit distance along the
/// unit direction `dir` when it falls within `[0, max_dist]`.
fn ray_hit(origin: Vec2, dir: Vec2, max_dist: f32, segment: &Segment) -> Option<f32> {
    let edge = segment.b - segment.a;
    let denom = dir.perp_dot(edge);
    if denom.abs() <= f32::EPSILON {
        return None;
    }
    let offset = segment.a - origin;
    let t = offset.perp_dot(edge) / denom;
    let s = -dir.perp_dot(offset) / denom;
    (t >= 0.0 && t <= max_dist && (0.0..=1.0).contains(&s)).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> ObstacleSet {
        ObstacleSet::new(vec![Segment::new(Vec2::new(5.0, -10.0), Vec2::new(5.0, 10.0))])
    }

    #[test]
    fn closest_point_projects_onto_segment() {
        let segment = Segment::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        assert_eq!(segment.closest_point(Vec2::new(3.0, 4.0)), Vec2::new(3.0, 0.0));
        assert_eq!(segment.closest_point(Vec2::new(-2.0, 1.0)), Vec2::new(0.0, 0.0));
        assert_eq!(segment.closest_point(Vec2::new(14.0, -1.0)), Vec2::new(10.0, 0.0));
    }

    #[test]
    fn raycast_reports_hit_distance() {
        let hit = wall().raycast(Vec2::ZERO, 0.0, 10.0);
        assert!(hit.is_some());
        assert!((hit.unwrap() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn raycast_misses_behind_and_beyond() {
        assert!(wall().raycast(Vec2::ZERO, 180.0, 10.0).is_none());
        assert!(wall().raycast(Vec2::ZERO, 0.0, 4.0).is_none());
        assert!(wall().raycast(Vec2::ZERO, 90.0, 20.0).is_none());
    }

    #[test]
    fn blocked_detects_crossing_segments() {
        let set = wall();
        assert!(set.blocked(Vec2::ZERO, Vec2::new(8.0, 0.0)));
        assert!(!set.blocked(Vec2::ZERO, Vec2::new(4.0, 0.0)));
        assert!(!set.blocked(Vec2::ZERO, Vec2::new(0.0, 20.0)));
    }

    #[test]
    fn boundary_points_respect_radius() {
        let set = wall();
        let near: Vec<Vec2> = set.boundary_points_within(Vec2::new(3.0, 0.0), 3.0).collect();
        assert_eq!(near, vec![Vec2::new(5.0, 0.0)]);
        assert_eq!(set.boundary_points_within(Vec2::ZERO, 3.0).count(), 0);
    }

    #[test]
    fn fenced_rectangle_encloses_interior() {
        let set = ObstacleSet::fenced_rectangle(Bounds::new(-10.0, -10.0, 20.0, 20.0));
        assert_eq!(set.segments().len(), 4);
        assert!(set.blocked(Vec2::ZERO, Vec2::new(30.0, 0.0)));
        assert!(!set.blocked(Vec2::ZERO, Vec2::new(5.0, 5.0)));
        let closest = set.closest_boundary_point(Vec2::new(8.0, 0.0)).unwrap();
        assert_eq!(closest, Vec2::new(10.0, 0.0));
    }
}
