//! Dog steering strategies.
//!
//! Each strategy turns the dog's perception of the flock into a desired
//! heading and speed. The first three share the same targeting core (drive a
//! compact herd from behind, otherwise collect the highest-priority stray)
//! and differ in how they approach the target; the fourth is a two-dog
//! chase/drive split.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::obstacles::ObstacleSet;
use crate::{
    angle_difference, heading_vector, vector_heading, vector_heading_or, wrap_degrees, AgentView,
    HerdSimulation, MotionLimits, MotionState, SheepModelKind,
};

/// Steering strategy shared by all non-manual dogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DogStrategyKind {
    /// Drive a compact herd from behind, collect strays otherwise.
    #[default]
    CollectAndDrive,
    /// Same targeting, approached along an arc around the herd.
    ArcPath,
    /// Weighted blend of direct pursuit, a circling field, and obstacle
    /// repulsion.
    BlendedField,
    /// Two-dog split: one chases the nearest sheep, one drives the farthest.
    NearestChase,
}

/// Perception and targeting parameters for dog strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Stop distance, as a multiple of the sheep interaction radius.
    pub stop_mult: f32,
    /// Walking band edge, as a multiple of the sheep interaction radius.
    pub walk_mult: f32,
    /// Running band edge, as a multiple of the sheep interaction radius.
    pub run_mult: f32,
    /// Cognitive cap on perceived sheep under local perception.
    pub ns: usize,
    /// When set, perception is limited by the blind cone and `ns`.
    pub local: bool,
    /// When set, sheep hidden behind obstacles are not perceived.
    pub occlusion: bool,
    /// Rear blind cone width, in degrees.
    pub blind_angle: f32,
    /// Blind cone width at full running speed.
    pub running_blind_angle: f32,
    /// When set, the blind cone widens linearly with speed.
    pub dynamic_blind_angle: bool,
    /// When set, dogs keep distance from each other while steering.
    pub dog_repulsion: bool,
    /// Obstacle repulsion weight in the blended strategy.
    pub rho_f: f32,
    /// Obstacle repulsion radius in the blended strategy.
    pub r_f: f32,
    /// Switches the speed schedule to a fixed 6 m walk/run split.
    pub modified_running_distance: bool,
    /// Distance at which the blended strategy is fully direct pursuit.
    pub blend_radius: f32,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            stop_mult: 3.0,
            walk_mult: 9.0,
            run_mult: 18.0,
            ns: 20,
            local: true,
            occlusion: false,
            blind_angle: 60.0,
            running_blind_angle: 180.0,
            dynamic_blind_angle: false,
            dog_repulsion: true,
            rho_f: 0.5,
            r_f: 10.0,
            modified_running_distance: false,
            blend_radius: 22.5,
        }
    }
}

/// Everything a strategy reads for one dog's decision.
struct SteeringContext<'a> {
    dog_id: usize,
    dog_count: usize,
    own: AgentView,
    perceived: &'a [usize],
    sheep_views: &'a [AgentView],
    dog_views: &'a [AgentView],
    params: &'a StrategyParams,
    limits: &'a MotionLimits,
    goal: Vec2,
    /// Active sheep model's agent interaction radius.
    ro: f32,
    /// Active sheep model's strong repulsion radius.
    strong_radius: f32,
    obstacles: &'a ObstacleSet,
}

/// Shared herd geometry, recomputed fresh every tick.
struct HerdTarget {
    target: Vec2,
    driving: bool,
    /// Distance to the nearest perceived sheep.
    md_ds: f32,
    cm: Vec2,
}

impl HerdSimulation {
    pub(crate) fn stage_dogs(&mut self, sheep_views: &[AgentView], dog_views: &[AgentView]) {
        let params = self.config.strategy;
        let limits = self.config.dog_limits;
        let dt = self.config.dt;
        let goal = self.config.goal.center;
        let (ro, strong_radius) = match self.config.sheep_model {
            SheepModelKind::Ginelli => (self.config.ginelli.r_0, self.config.ginelli.r_ss),
            SheepModelKind::Strombom => (self.config.strombom.r_a, self.config.strombom.r_ss),
        };
        let dog_count = self.dogs.len();

        for d in 0..dog_count {
            if self.dogs[d].manual {
                let dog = &mut self.dogs[d];
                dog.state = speed_state(dog.desired_speed, &limits);
                continue;
            }
            let own = dog_views[d];
            let perceived = perceived_sheep(
                &own,
                sheep_views,
                &params,
                &self.config.obstacles,
                limits.running_speed,
            );
            let (desired_heading, desired_speed) = if perceived.is_empty() {
                // Nothing in sight: walk and sweep at the maximum turn rate.
                (
                    wrap_degrees(own.heading - limits.max_turn * dt),
                    limits.walking_speed,
                )
            } else {
                let ctx = SteeringContext {
                    dog_id: d,
                    dog_count,
                    own,
                    perceived: &perceived,
                    sheep_views,
                    dog_views,
                    params: &params,
                    limits: &limits,
                    goal,
                    ro,
                    strong_radius,
                    obstacles: &self.config.obstacles,
                };
                match self.config.dog_strategy {
                    DogStrategyKind::CollectAndDrive => collect_and_drive(&ctx),
                    DogStrategyKind::ArcPath => arc_path(&ctx),
                    DogStrategyKind::BlendedField => blended_field(&ctx),
                    DogStrategyKind::NearestChase => nearest_chase(&ctx),
                }
            };
            let dog = &mut self.dogs[d];
            dog.desired_heading = desired_heading;
            dog.desired_speed = desired_speed;
            dog.state = speed_state(desired_speed, &limits);
        }
    }
}

fn speed_state(speed: f32, limits: &MotionLimits) -> MotionState {
    if speed <= 0.0 {
        MotionState::Idle
    } else if speed <= limits.walking_speed {
        MotionState::Walking
    } else {
        MotionState::Running
    }
}

/// Live sheep this dog perceives, nearest first under local perception.
fn perceived_sheep(
    own: &AgentView,
    sheep_views: &[AgentView],
    params: &StrategyParams,
    obstacles: &ObstacleSet,
    running_speed: f32,
) -> Vec<usize> {
    let mut perceived: Vec<usize> = sheep_views
        .iter()
        .enumerate()
        .filter_map(|(s, sheep)| (!sheep.collected).then_some(s))
        .collect();
    if params.local {
        let blind = effective_blind_angle(params, own.speed, running_speed);
        perceived.retain(|&s| is_visible_cone(own, sheep_views[s].position, blind));
        if params.occlusion {
            perceived.retain(|&s| !obstacles.blocked(own.position, sheep_views[s].position));
        }
        perceived.sort_by(|&a, &b| {
            sheep_views[a]
                .position
                .distance_squared(own.position)
                .total_cmp(&sheep_views[b].position.distance_squared(own.position))
        });
        perceived.truncate(params.ns);
    }
    perceived
}

/// Blind cone width at the given speed; widens toward the running value when
/// the dynamic toggle is set.
fn effective_blind_angle(params: &StrategyParams, speed: f32, running_speed: f32) -> f32 {
    if !params.dynamic_blind_angle {
        return params.blind_angle;
    }
    let ratio = (speed / running_speed).clamp(0.0, 1.0);
    params.blind_angle + (params.running_blind_angle - params.blind_angle) * ratio
}

/// Cone visibility test: the target is hidden inside a rear blind cone of
/// the given total width.
pub(crate) fn is_visible_cone(view: &AgentView, target: Vec2, blind_angle: f32) -> bool {
    if blind_angle <= 0.0 {
        return true;
    }
    let offset = target - view.position;
    if offset == Vec2::ZERO {
        return true;
    }
    angle_difference(view.heading, vector_heading(offset)).abs() <= 180.0 - blind_angle / 2.0
}

/// Centroid, stray priority, and target point shared by the first three
/// strategies. Stray priority favours far-from-centre sheep the dog is
/// already facing.
fn herd_target(ctx: &SteeringContext) -> HerdTarget {
    let n = ctx.perceived.len() as f32;
    let mut cm = Vec2::ZERO;
    for &s in ctx.perceived {
        cm += ctx.sheep_views[s].position;
    }
    cm /= n;

    let mut best_priority = 0.01f32;
    let mut stray: Option<Vec2> = None;
    let mut stray_spread = 0.01f32;
    let mut md_ds = f32::INFINITY;
    for &s in ctx.perceived {
        let pos = ctx.sheep_views[s].position;
        md_ds = md_ds.min(pos.distance(ctx.own.position));
        let bearing = vector_heading_or(pos - ctx.own.position, ctx.own.heading);
        let turn = angle_difference(ctx.own.heading, bearing);
        let spread = pos.distance(cm);
        let priority = spread * (1.0 - turn.abs() / 180.0).powi(2);
        if priority > best_priority {
            best_priority = priority;
            stray = Some(pos);
            stray_spread = spread;
        }
    }

    // Compactness tests the winning stray's raw distance from the centroid;
    // the angular discount only decides which stray gets collected first.
    let compactness = ctx.ro * n.powf(2.0 / 3.0);
    let driving = stray_spread < compactness || (ctx.dog_count > 1 && ctx.dog_id == 0);
    let target = if driving {
        cm + (cm - ctx.goal).normalize_or_zero() * (ctx.ro * n.sqrt())
    } else {
        let stray = stray.unwrap_or(cm);
        stray + (stray - cm).normalize_or_zero() * ctx.ro
    };
    HerdTarget {
        target,
        driving,
        md_ds,
        cm,
    }
}

/// Distance-banded speed schedule. The unmodified schedule deliberately
/// leaves speed unchanged between the walking and running bands.
fn schedule_speed(ctx: &SteeringContext, ht: &HerdTarget) -> f32 {
    let stop = ctx.params.stop_mult * ctx.ro;
    let walk_band = ctx.params.walk_mult * ctx.ro;
    let run_band = ctx.params.run_mult * ctx.ro;
    let mut speed = ctx.own.speed;
    if ctx.params.modified_running_distance {
        speed = if ht.md_ds < stop {
            0.0
        } else if ht.md_ds < 6.0 {
            ctx.limits.walking_speed
        } else {
            ctx.limits.running_speed
        };
    } else if ht.md_ds < stop {
        speed = 0.0;
    } else if ht.md_ds < walk_band {
        speed = ctx.limits.walking_speed;
    } else if ht.md_ds > run_band {
        speed = ctx.limits.running_speed;
    }
    if ht.driving && ht.target.distance(ctx.own.position) > walk_band {
        speed = ctx.limits.running_speed;
    }
    speed
}

/// Summed push away from other dogs inside this dog's personal radius.
fn pack_repulsion(ctx: &SteeringContext) -> Vec2 {
    if !ctx.params.dog_repulsion || ctx.dog_count < 2 {
        return Vec2::ZERO;
    }
    let radius = (ctx.dog_id as f32 + 3.0) * 5.0 / 3.0;
    let mut repulsion = Vec2::ZERO;
    for (j, other) in ctx.dog_views.iter().enumerate() {
        if j == ctx.dog_id {
            continue;
        }
        let offset = ctx.own.position - other.position;
        if offset.length() < radius {
            repulsion += offset;
        }
    }
    repulsion
}

fn collect_and_drive(ctx: &SteeringContext) -> (f32, f32) {
    let ht = herd_target(ctx);
    let steer = ht.target - ctx.own.position + pack_repulsion(ctx);
    (
        vector_heading_or(steer, ctx.own.heading),
        schedule_speed(ctx, &ht),
    )
}

/// Same targeting as [`collect_and_drive`], but when the target lies roughly
/// behind the herd the dog swings wide around the centroid, stepping its
/// heading off obstacles with short lookahead rays.
fn arc_path(ctx: &SteeringContext) -> (f32, f32) {
    let ht = herd_target(ctx);
    let steer = ht.target - ctx.own.position + pack_repulsion(ctx);
    let mut desired = vector_heading_or(steer, ctx.own.heading);

    let cm_offset = ht.cm - ctx.own.position;
    let cm_bearing = vector_heading_or(cm_offset, ctx.own.heading);
    let delta = angle_difference(desired, cm_bearing);
    if delta.abs() < 90.0 {
        let arc_angle = if ht.driving && steer.length() > cm_offset.length() {
            85.0
        } else {
            (3.0 * delta.abs()).min(85.0)
        };
        let mut arc_bearing = if delta < 0.0 {
            wrap_degrees(cm_bearing + arc_angle)
        } else {
            wrap_degrees(cm_bearing - arc_angle)
        };
        let step = if angle_difference(arc_bearing, desired) > 0.0 {
            10.0
        } else {
            -10.0
        };
        for _ in 0..18 {
            if ctx.obstacles.raycast(ctx.own.position, arc_bearing, 10.0).is_some() {
                arc_bearing = wrap_degrees(arc_bearing + step);
            } else {
                desired = arc_bearing;
                break;
            }
        }
    }

    (desired, schedule_speed(ctx, &ht))
}

/// Weighted sum of direct pursuit, a field circling the herd, and obstacle
/// repulsion. Pursuit dominates far from the flock, circling up close.
fn blended_field(ctx: &SteeringContext) -> (f32, f32) {
    let ht = herd_target(ctx);
    let steer = ht.target - ctx.own.position + pack_repulsion(ctx);
    let direct = steer.normalize_or_zero();

    let desired = vector_heading_or(steer, ctx.own.heading);
    let cm_bearing = vector_heading_or(ht.cm - ctx.own.position, ctx.own.heading);
    let side = if angle_difference(desired, cm_bearing) < 0.0 {
        90.0
    } else {
        -90.0
    };
    let mut arc = Vec2::ZERO;
    for &s in ctx.perceived {
        let offset = ctx.sheep_views[s].position - ctx.own.position;
        let dist_sq = offset.length_squared();
        if dist_sq <= f32::EPSILON {
            continue;
        }
        let bearing = vector_heading(offset);
        arc += heading_vector(wrap_degrees(bearing + side)) * (ht.md_ds * ht.md_ds / dist_sq);
    }
    let arc = arc.normalize_or_zero();

    let mut fence = Vec2::ZERO;
    for point in ctx
        .obstacles
        .boundary_points_within(ctx.own.position, ctx.params.r_f)
    {
        let offset = point - ctx.own.position;
        let dist = offset.length();
        if dist > f32::EPSILON {
            fence += 0.0f32.min((dist - ctx.params.r_f) / ctx.params.r_f) * (offset / dist);
        }
    }

    let w_direct = (ht.md_ds / ctx.params.blend_radius).min(1.0);
    let blended = direct * w_direct + arc * (1.0 - w_direct) + fence * ctx.params.rho_f;
    (
        vector_heading_or(blended, ctx.own.heading),
        schedule_speed(ctx, &ht),
    )
}

/// Two-dog split around the strong repulsion radius: the dog farther from
/// the goal chases the sheep nearest itself, the other drives the sheep
/// farthest from the goal among its seven nearest. A lone dog always drives.
fn nearest_chase(ctx: &SteeringContext) -> (f32, f32) {
    let rdd = ctx.strong_radius;
    let other = (0..ctx.dog_count)
        .find(|&j| j != ctx.dog_id)
        .map(|j| ctx.dog_views[j]);

    let mut repulsion = Vec2::ZERO;
    if let Some(other) = other {
        if other.position.distance(ctx.own.position) < rdd {
            repulsion = Vec2::new(rdd, 0.0);
            if (other.position - ctx.own.position).dot(repulsion) > 0.0 {
                repulsion *= -0.75;
            }
        }
    }

    let chasing_nearest = match other {
        Some(other) => {
            ctx.own.position.distance(ctx.goal) > other.position.distance(ctx.goal)
                && repulsion == Vec2::ZERO
        }
        None => false,
    };

    let chased = if chasing_nearest {
        ctx.perceived
            .iter()
            .min_by(|&&a, &&b| {
                ctx.sheep_views[a]
                    .position
                    .distance_squared(ctx.own.position)
                    .total_cmp(&ctx.sheep_views[b].position.distance_squared(ctx.own.position))
            })
            .map(|&s| ctx.sheep_views[s].position)
            .unwrap_or(ctx.own.position)
    } else {
        let mut nearest: Vec<usize> = ctx.perceived.to_vec();
        nearest.sort_by(|&a, &b| {
            ctx.sheep_views[a]
                .position
                .distance_squared(ctx.own.position)
                .total_cmp(&ctx.sheep_views[b].position.distance_squared(ctx.own.position))
        });
        nearest.truncate(7);
        nearest
            .into_iter()
            .max_by(|&a, &b| {
                ctx.sheep_views[a]
                    .position
                    .distance_squared(ctx.goal)
                    .total_cmp(&ctx.sheep_views[b].position.distance_squared(ctx.goal))
            })
            .map(|s| ctx.sheep_views[s].position)
            .unwrap_or(ctx.own.position)
    };

    let target = chased + (chased - ctx.goal).normalize_or_zero() * (rdd - 4.0) + repulsion;
    let steer = target - ctx.own.position;
    let dist = steer.length();
    let speed = if dist < 0.5 {
        0.0
    } else if dist < 2.0 {
        ctx.limits.walking_speed
    } else {
        ctx.limits.running_speed
    };
    (vector_heading_or(steer, ctx.own.heading), speed)
}
