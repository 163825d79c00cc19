//! Core engine for a tick-driven sheep-herding simulation.
//!
//! A flock of sheep agents is driven toward a goal region by one or more dog
//! agents. Sheep follow one of two interchangeable behaviour models (a
//! stochastic state machine or a rule-based proximity model), dogs follow one
//! of four steering strategies, and a shared kinematic integrator advances
//! every agent. All randomness flows through a single seeded RNG, agents are
//! visited in id order, and behaviour stages read start-of-tick snapshots, so
//! identical configurations and seeds produce identical trajectories.

pub mod dogs;
pub mod obstacles;
pub mod sheep;

use glam::Vec2;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shepherd_index::{first_shell_neighbours, Bounds, DistanceCache, MetricIndex};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::dogs::{DogStrategyKind, StrategyParams};
use crate::obstacles::ObstacleSet;
use crate::sheep::{GinelliParams, StrombomParams};

/// Normalize an angle in degrees into the half-open interval `(-180, 180]`.
/// NaN input normalizes to `0.0`.
#[must_use]
pub fn wrap_degrees(mut angle: f32) -> f32 {
    if angle.is_nan() {
        return 0.0;
    }
    while angle <= -180.0 {
        angle += 360.0;
    }
    while angle > 180.0 {
        angle -= 360.0;
    }
    angle
}

/// Signed shortest-path difference from `from` to `to`, in `(-180, 180]`.
#[must_use]
pub fn angle_difference(from: f32, to: f32) -> f32 {
    wrap_degrees(to - from)
}

/// Turn `current` toward `target` by at most `max_delta` degrees along the
/// shorter arc, never overshooting.
#[must_use]
pub fn move_towards_angle(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = angle_difference(current, target);
    if delta.abs() <= max_delta {
        return wrap_degrees(target);
    }
    wrap_degrees(current + max_delta.copysign(delta))
}

/// Move `current` toward `target` by at most `max_delta`.
#[must_use]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + max_delta.copysign(target - current)
    }
}

/// Unit vector pointing along a heading in degrees.
#[must_use]
pub fn heading_vector(heading_degrees: f32) -> Vec2 {
    let radians = heading_degrees.to_radians();
    Vec2::new(radians.cos(), radians.sin())
}

/// Heading in degrees of a non-zero vector, wrapped into `(-180, 180]`.
#[must_use]
pub fn vector_heading(v: Vec2) -> f32 {
    wrap_degrees(v.y.atan2(v.x).to_degrees())
}

/// Heading of `v`, or `fallback` when `v` is the zero vector. Keeps steering
/// code away from `atan2(0, 0)`.
#[must_use]
pub fn vector_heading_or(v: Vec2, fallback: f32) -> f32 {
    if v == Vec2::ZERO {
        wrap_degrees(fallback)
    } else {
        vector_heading(v)
    }
}

/// Monotonic tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Locomotion state shared by sheep and dogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MotionState {
    #[default]
    Idle,
    Walking,
    Running,
}

/// Species-level movement envelope used by the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    /// Cruising speed while walking, in m/s.
    pub walking_speed: f32,
    /// Cruising speed while running, in m/s.
    pub running_speed: f32,
    /// Maximum speed change per second, in m/s².
    pub max_speed_change: f32,
    /// Maximum turn rate, in degrees per second.
    pub max_turn: f32,
    /// Lower speed clamp; negative values allow reversing.
    pub min_speed: f32,
    /// Upper speed clamp, in m/s.
    pub max_speed: f32,
}

impl MotionLimits {
    /// Sheep envelope: forward-only, gentle acceleration.
    #[must_use]
    pub fn sheep() -> Self {
        Self {
            walking_speed: 1.5,
            running_speed: 7.5,
            max_speed_change: 7.5,
            max_turn: 225.0,
            min_speed: 0.0,
            max_speed: 7.5,
        }
    }

    /// Dog envelope: fast turns, hard acceleration, limited reversing.
    #[must_use]
    pub fn dog() -> Self {
        Self {
            walking_speed: 1.5,
            running_speed: 7.5,
            max_speed_change: 62.0,
            max_turn: 360.0,
            min_speed: -3.0,
            max_speed: 10.0,
        }
    }
}

/// Circular region sheep must reach to be collected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalRegion {
    pub center: Vec2,
    pub radius: f32,
}

impl GoalRegion {
    #[must_use]
    pub fn contains(&self, position: Vec2) -> bool {
        position.distance_squared(self.center) <= self.radius * self.radius
    }
}

/// Which sheep behaviour model drives the flock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SheepModelKind {
    /// Stochastic state machine with topological interactions.
    #[default]
    Ginelli,
    /// Rule-based model deriving state from dog proximity each tick.
    Strombom,
}

/// Starting pose for one dog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DogSpawn {
    pub position: Vec2,
    pub heading: f32,
    /// Manually controlled dogs skip strategy steering but still integrate.
    pub manual: bool,
}

/// Errors that can occur when constructing a simulation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a herding run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HerdConfig {
    /// Number of sheep spawned into the flock.
    pub sheep_count: usize,
    /// Rectangle sheep spawn positions are drawn from.
    pub spawn_area: Bounds,
    /// Rectangle bounding the Voronoi decomposition for topological
    /// neighbour queries.
    pub voronoi_bounds: Bounds,
    /// Region sheep are collected into.
    pub goal: GoalRegion,
    /// Sheep movement envelope.
    pub sheep_limits: MotionLimits,
    /// Dog movement envelope.
    pub dog_limits: MotionLimits,
    /// Active sheep behaviour model.
    pub sheep_model: SheepModelKind,
    /// Parameters of the stochastic state-machine model.
    pub ginelli: GinelliParams,
    /// Parameters of the rule-based model.
    pub strombom: StrombomParams,
    /// Steering strategy shared by all dogs.
    pub dog_strategy: DogStrategyKind,
    /// Perception and targeting parameters for dog strategies.
    pub strategy: StrategyParams,
    /// Starting poses of the dogs.
    pub dog_spawns: Vec<DogSpawn>,
    /// Obstacles: fences, tree lines, walls.
    pub obstacles: ObstacleSet,
    /// Fixed timestep in seconds.
    pub dt: f32,
    /// Wall-clock limit for the run, in simulated seconds.
    pub time_limit: f32,
    /// Neighbour relations refresh every this many ticks (1 = every tick).
    pub neighbour_refresh_interval: u32,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for HerdConfig {
    fn default() -> Self {
        Self {
            sheep_count: 50,
            spawn_area: Bounds::new(-50.0, -55.0, 100.0, 85.0),
            voronoi_bounds: Bounds::new(-60.0, -65.0, 120.0, 110.0),
            goal: GoalRegion {
                center: Vec2::new(0.0, 40.0),
                radius: 5.0,
            },
            sheep_limits: MotionLimits::sheep(),
            dog_limits: MotionLimits::dog(),
            sheep_model: SheepModelKind::default(),
            ginelli: GinelliParams::default(),
            strombom: StrombomParams::default(),
            dog_strategy: DogStrategyKind::default(),
            strategy: StrategyParams::default(),
            dog_spawns: vec![DogSpawn {
                position: Vec2::new(0.0, -60.0),
                heading: 90.0,
                manual: false,
            }],
            obstacles: ObstacleSet::default(),
            dt: 0.02,
            time_limit: 150.0,
            neighbour_refresh_interval: 1,
            rng_seed: None,
        }
    }
}

impl HerdConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sheep_count == 0 {
            return Err(ConfigError::InvalidConfig("sheep_count must be non-zero"));
        }
        if self.dt <= 0.0 {
            return Err(ConfigError::InvalidConfig("dt must be positive"));
        }
        if self.time_limit <= 0.0 {
            return Err(ConfigError::InvalidConfig("time_limit must be positive"));
        }
        if self.neighbour_refresh_interval == 0 {
            return Err(ConfigError::InvalidConfig(
                "neighbour_refresh_interval must be at least 1",
            ));
        }
        if self.spawn_area.width <= 0.0 || self.spawn_area.height <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "spawn_area must have positive extent",
            ));
        }
        if self.voronoi_bounds.width <= 0.0 || self.voronoi_bounds.height <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "voronoi_bounds must have positive extent",
            ));
        }
        if self.goal.radius <= 0.0 {
            return Err(ConfigError::InvalidConfig("goal radius must be positive"));
        }
        for limits in [&self.sheep_limits, &self.dog_limits] {
            if limits.walking_speed < 0.0
                || limits.running_speed < limits.walking_speed
                || limits.max_speed < limits.running_speed
                || limits.min_speed > 0.0
                || limits.max_speed_change <= 0.0
                || limits.max_turn <= 0.0
            {
                return Err(ConfigError::InvalidConfig(
                    "motion limits must satisfy min <= 0 <= walk <= run <= max with positive rates",
                ));
            }
        }
        if self.ginelli.r_0 <= 0.0 || self.ginelli.r_e <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "interaction radii must be positive",
            ));
        }
        if !(0.0 < self.ginelli.r_ss && self.ginelli.r_ss < self.ginelli.r_s) {
            return Err(ConfigError::InvalidConfig(
                "strong repulsion radius must satisfy 0 < r_ss < r_s",
            ));
        }
        if !(0.0 < self.strombom.r_ss && self.strombom.r_ss < self.strombom.r_s) {
            return Err(ConfigError::InvalidConfig(
                "strong repulsion radius must satisfy 0 < r_ss < r_s",
            ));
        }
        if self.ginelli.tau_iw <= 0.0 || self.ginelli.tau_wi <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "transition time scales must be positive",
            ));
        }
        if self.strombom.n == 0 {
            return Err(ConfigError::InvalidConfig(
                "cognitive cap n must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy if no seed is set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// One sheep agent. Ids are dense offsets into the flock vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheep {
    pub id: usize,
    pub position: Vec2,
    pub heading: f32,
    pub speed: f32,
    pub desired_heading: f32,
    pub desired_speed: f32,
    pub state: MotionState,
    pub previous_state: MotionState,
    /// Set once the sheep enters the goal region; collected sheep freeze in
    /// place and drop out of behaviour and queries.
    pub collected: bool,
    /// Live sheep within the metric radius, refreshed on cadence.
    pub metric_neighbours: Vec<usize>,
    /// First Voronoi shell, refreshed on cadence.
    pub topological_neighbours: Vec<usize>,
    /// Detected dogs, nearest first, refreshed on cadence.
    pub dog_neighbours: Vec<usize>,
    pub n_idle: f32,
    pub n_walking: f32,
    pub m_idle: f32,
    pub m_toidle: f32,
    pub m_running: f32,
    /// Root-mean-square distance to topological neighbours (0 when none).
    pub shell_distance: f32,
}

impl Sheep {
    fn at(id: usize, position: Vec2, heading: f32) -> Self {
        Self {
            id,
            position,
            heading,
            speed: 0.0,
            desired_heading: heading,
            desired_speed: 0.0,
            state: MotionState::Idle,
            previous_state: MotionState::Idle,
            collected: false,
            metric_neighbours: Vec::new(),
            topological_neighbours: Vec::new(),
            dog_neighbours: Vec::new(),
            n_idle: 0.0,
            n_walking: 0.0,
            m_idle: 0.0,
            m_toidle: 0.0,
            m_running: 0.0,
            shell_distance: 0.0,
        }
    }
}

/// One dog agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dog {
    pub id: usize,
    pub position: Vec2,
    pub heading: f32,
    pub speed: f32,
    pub desired_heading: f32,
    pub desired_speed: f32,
    pub state: MotionState,
    pub manual: bool,
}

impl Dog {
    fn at(id: usize, spawn: &DogSpawn) -> Self {
        Self {
            id,
            position: spawn.position,
            heading: wrap_degrees(spawn.heading),
            speed: 0.0,
            desired_heading: wrap_degrees(spawn.heading),
            desired_speed: 0.0,
            state: MotionState::Idle,
            manual: spawn.manual,
        }
    }
}

/// Start-of-tick pose snapshot behaviour stages read from, so results do not
/// depend on agent iteration order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AgentView {
    pub(crate) position: Vec2,
    pub(crate) heading: f32,
    pub(crate) speed: f32,
    pub(crate) state: MotionState,
    pub(crate) collected: bool,
}

impl AgentView {
    fn of_sheep(sheep: &Sheep) -> Self {
        Self {
            position: sheep.position,
            heading: sheep.heading,
            speed: sheep.speed,
            state: sheep.state,
            collected: sheep.collected,
        }
    }

    fn of_dog(dog: &Dog) -> Self {
        Self {
            position: dog.position,
            heading: dog.heading,
            speed: dog.speed,
            state: dog.state,
            collected: false,
        }
    }

    pub(crate) fn forward(&self) -> Vec2 {
        heading_vector(self.heading)
    }
}

/// Events emitted after processing one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickEvents {
    pub tick: Tick,
    /// Sheep collected into the goal region during this tick.
    pub collected: usize,
    pub finished: bool,
}

/// Per-run outcome record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_sheep: usize,
    pub collected: usize,
    pub elapsed_seconds: f32,
    pub finished: bool,
}

/// Serializable snapshot of all agent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlockSnapshot {
    pub tick: Tick,
    pub elapsed_seconds: f32,
    pub collected: usize,
    pub sheep: Vec<Sheep>,
    pub dogs: Vec<Dog>,
}

/// Full simulation state: flock, dogs, relations, clock, RNG.
#[derive(Debug, Clone)]
pub struct HerdSimulation {
    pub(crate) config: HerdConfig,
    pub(crate) tick: Tick,
    pub(crate) elapsed: f32,
    pub(crate) rng: SmallRng,
    pub(crate) sheep: Vec<Sheep>,
    pub(crate) dogs: Vec<Dog>,
    pub(crate) distances: DistanceCache,
    pub(crate) collected_total: usize,
    pub(crate) finished: bool,
}

struct RelationRefresh {
    sheep_idx: usize,
    metric: Vec<usize>,
    topological: Vec<usize>,
    dog_neighbours: Vec<usize>,
}

impl HerdSimulation {
    /// Build a simulation with sheep placed uniformly in the spawn area.
    pub fn new(config: HerdConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let area = config.spawn_area;
        let sheep = (0..config.sheep_count)
            .map(|id| {
                let x = rng.random_range(area.min_x..area.min_x + area.width);
                let y = rng.random_range(area.min_y..area.min_y + area.height);
                let heading = wrap_degrees(rng.random_range(-180.0..180.0));
                let mut sheep = Sheep::at(id, Vec2::new(x, y), heading);
                // Flocks start half grazing, half on the move.
                if rng.random::<f32>() < 0.5 {
                    sheep.state = MotionState::Walking;
                    sheep.previous_state = MotionState::Walking;
                }
                sheep
            })
            .collect();
        Self::assemble(config, rng, sheep)
    }

    /// Build a simulation with explicit sheep poses, overriding
    /// `sheep_count`. Intended for tests and replays.
    pub fn with_layout(mut config: HerdConfig, layout: &[(Vec2, f32)]) -> Result<Self, ConfigError> {
        config.sheep_count = layout.len();
        config.validate()?;
        let rng = config.seeded_rng();
        let sheep = layout
            .iter()
            .enumerate()
            .map(|(id, &(position, heading))| Sheep::at(id, position, wrap_degrees(heading)))
            .collect();
        Self::assemble(config, rng, sheep)
    }

    /// Rebuild a simulation from a serialized snapshot. The RNG restarts
    /// from the configured seed, so two restores of the same snapshot under
    /// the same configuration tick identically.
    pub fn from_snapshot(
        mut config: HerdConfig,
        snapshot: FlockSnapshot,
    ) -> Result<Self, ConfigError> {
        config.sheep_count = snapshot.sheep.len();
        config.validate()?;
        if snapshot.dogs.len() != config.dog_spawns.len() {
            return Err(ConfigError::InvalidConfig(
                "snapshot dog count does not match the configured spawns",
            ));
        }
        if snapshot.sheep.iter().enumerate().any(|(i, s)| s.id != i) {
            return Err(ConfigError::InvalidConfig(
                "snapshot sheep ids must be dense and in order",
            ));
        }
        let rng = config.seeded_rng();
        let positions: Vec<(f32, f32)> = snapshot
            .sheep
            .iter()
            .map(|s| (s.position.x, s.position.y))
            .collect();
        let mut distances = DistanceCache::new(snapshot.sheep.len());
        distances
            .refresh(&positions)
            .map_err(|_| ConfigError::InvalidConfig("distance cache dimensions"))?;
        let collected_total = snapshot.sheep.iter().filter(|s| s.collected).count();
        let finished = snapshot.elapsed_seconds >= config.time_limit
            || collected_total == snapshot.sheep.len();
        Ok(Self {
            config,
            tick: snapshot.tick,
            elapsed: snapshot.elapsed_seconds,
            rng,
            sheep: snapshot.sheep,
            dogs: snapshot.dogs,
            distances,
            collected_total,
            finished,
        })
    }

    fn assemble(config: HerdConfig, rng: SmallRng, sheep: Vec<Sheep>) -> Result<Self, ConfigError> {
        let dogs = config
            .dog_spawns
            .iter()
            .enumerate()
            .map(|(id, spawn)| Dog::at(id, spawn))
            .collect();
        let mut distances = DistanceCache::new(sheep.len());
        let positions: Vec<(f32, f32)> = sheep.iter().map(|s| (s.position.x, s.position.y)).collect();
        distances
            .refresh(&positions)
            .map_err(|_| ConfigError::InvalidConfig("distance cache dimensions"))?;
        Ok(Self {
            config,
            tick: Tick::zero(),
            elapsed: 0.0,
            rng,
            sheep,
            dogs,
            distances,
            collected_total: 0,
            finished: false,
        })
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) -> TickEvents {
        if self.finished {
            return TickEvents {
                tick: self.tick,
                collected: 0,
                finished: true,
            };
        }

        let interval = u64::from(self.config.neighbour_refresh_interval);
        if self.tick.0.is_multiple_of(interval) {
            self.stage_neighbours();
        }

        let sheep_views: Vec<AgentView> = self.sheep.iter().map(AgentView::of_sheep).collect();
        let dog_views: Vec<AgentView> = self.dogs.iter().map(AgentView::of_dog).collect();

        self.stage_sheep(&sheep_views, &dog_views);
        self.stage_dogs(&sheep_views, &dog_views);
        self.stage_integrate();
        self.stage_distances();
        let collected = self.stage_goal();

        self.elapsed += self.config.dt;
        self.tick = self.tick.next();

        if self.elapsed >= self.config.time_limit || self.collected_total == self.sheep.len() {
            self.finished = true;
            info!(
                tick = self.tick.0,
                collected = self.collected_total,
                total = self.sheep.len(),
                elapsed = self.elapsed,
                "herding run finished"
            );
        }

        TickEvents {
            tick: self.tick,
            collected,
            finished: self.finished,
        }
    }

    /// Rebuild the three relation sets and the state-machine aggregates for
    /// every live sheep.
    fn stage_neighbours(&mut self) {
        let alive: Vec<usize> = (0..self.sheep.len())
            .filter(|&i| !self.sheep[i].collected)
            .collect();
        let positions: Vec<(f32, f32)> = alive
            .iter()
            .map(|&i| (self.sheep[i].position.x, self.sheep[i].position.y))
            .collect();

        let index = MetricIndex::build(&positions);
        let shells = first_shell_neighbours(&positions, self.config.voronoi_bounds);

        let (metric_radius, dog_radius, occlusion, cap) = match self.config.sheep_model {
            SheepModelKind::Ginelli => (self.config.ginelli.r_0, self.config.ginelli.r_s, false, None),
            SheepModelKind::Strombom => (
                self.config.strombom.r_a,
                self.config.strombom.r_s,
                self.config.strombom.occlusion,
                Some(self.config.strombom.n),
            ),
        };

        let mut refreshed = Vec::with_capacity(alive.len());
        for (local, &sheep_idx) in alive.iter().enumerate() {
            let position = self.sheep[sheep_idx].position;
            let metric = index
                .within(positions[local], metric_radius, Some(local))
                .into_iter()
                .map(|(l, _)| alive[l])
                .collect();
            let topological = shells[local].iter().map(|&l| alive[l]).collect();

            let view = AgentView::of_sheep(&self.sheep[sheep_idx]);
            let mut dog_neighbours: Vec<(usize, f32)> = self
                .dogs
                .iter()
                .enumerate()
                .filter_map(|(d, dog)| {
                    let dist = dog.position.distance(position);
                    (dist < dog_radius).then_some((d, dist))
                })
                .collect();
            if occlusion {
                let blind = self.config.strombom.blind_angle;
                dog_neighbours.retain(|&(d, _)| {
                    dogs::is_visible_cone(&view, self.dogs[d].position, blind)
                        && !self.config.obstacles.blocked(position, self.dogs[d].position)
                });
            }
            dog_neighbours.sort_by(|a, b| a.1.total_cmp(&b.1));
            if let Some(cap) = cap {
                dog_neighbours.truncate(cap);
            }

            refreshed.push(RelationRefresh {
                sheep_idx,
                metric,
                topological,
                dog_neighbours: dog_neighbours.into_iter().map(|(d, _)| d).collect(),
            });
        }

        // Aggregates read neighbour states, so relations are applied in two
        // passes: lists first, counts after.
        for item in &refreshed {
            let sheep = &mut self.sheep[item.sheep_idx];
            sheep.metric_neighbours = item.metric.clone();
            sheep.topological_neighbours = item.topological.clone();
            sheep.dog_neighbours = item.dog_neighbours.clone();
        }
        for item in &refreshed {
            let mut n_idle = 0.0;
            let mut n_walking = 0.0;
            for &j in &item.metric {
                match self.sheep[j].state {
                    MotionState::Idle => n_idle += 1.0,
                    MotionState::Walking => n_walking += 1.0,
                    MotionState::Running => {}
                }
            }
            let mut m_idle = 0.0;
            let mut m_running = 0.0;
            let mut m_toidle = 0.0;
            let mut shell_sq_sum = 0.0;
            for &j in &item.topological {
                match self.sheep[j].state {
                    MotionState::Idle => {
                        m_idle += 1.0;
                        if self.sheep[j].previous_state == MotionState::Running {
                            m_toidle += 1.0;
                        }
                    }
                    MotionState::Running => m_running += 1.0,
                    MotionState::Walking => {}
                }
                shell_sq_sum += self.distances.get(item.sheep_idx, j);
            }
            let shell_distance = if item.topological.is_empty() {
                0.0
            } else {
                (shell_sq_sum / item.topological.len() as f32).sqrt()
            };

            let sheep = &mut self.sheep[item.sheep_idx];
            sheep.n_idle = n_idle;
            sheep.n_walking = n_walking;
            sheep.m_idle = m_idle;
            sheep.m_running = m_running;
            sheep.m_toidle = m_toidle;
            sheep.shell_distance = shell_distance;
        }

        debug!(tick = self.tick.0, live = alive.len(), "neighbour relations rebuilt");
    }

    fn stage_integrate(&mut self) {
        let dt = self.config.dt;
        let limits = self.config.sheep_limits;
        for sheep in &mut self.sheep {
            if sheep.collected {
                continue;
            }
            integrate_motion(
                &limits,
                dt,
                &mut sheep.position,
                &mut sheep.heading,
                &mut sheep.speed,
                sheep.desired_heading,
                sheep.desired_speed,
            );
        }
        let limits = self.config.dog_limits;
        for dog in &mut self.dogs {
            integrate_motion(
                &limits,
                dt,
                &mut dog.position,
                &mut dog.heading,
                &mut dog.speed,
                dog.desired_heading,
                dog.desired_speed,
            );
        }
    }

    fn stage_distances(&mut self) {
        let positions: Vec<(f32, f32)> = self
            .sheep
            .iter()
            .map(|s| (s.position.x, s.position.y))
            .collect();
        if let Err(err) = self.distances.refresh(&positions) {
            error!(%err, "distance cache refresh skipped");
        }
    }

    fn stage_goal(&mut self) -> usize {
        let goal = self.config.goal;
        let mut collected = 0;
        for sheep in &mut self.sheep {
            if !sheep.collected && goal.contains(sheep.position) {
                sheep.collected = true;
                sheep.state = MotionState::Idle;
                sheep.speed = 0.0;
                sheep.desired_speed = 0.0;
                collected += 1;
            }
        }
        self.collected_total += collected;
        collected
    }

    /// Hand a desired pose to a manually controlled dog.
    pub fn steer_manual(&mut self, dog_idx: usize, desired_heading: f32, desired_speed: f32) {
        if let Some(dog) = self.dogs.get_mut(dog_idx) {
            if dog.manual {
                dog.desired_heading = wrap_degrees(desired_heading);
                dog.desired_speed = desired_speed;
            }
        }
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &HerdConfig {
        &self.config
    }

    #[must_use]
    pub fn sheep(&self) -> &[Sheep] {
        &self.sheep
    }

    #[must_use]
    pub fn dogs(&self) -> &[Dog] {
        &self.dogs
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed
    }

    #[must_use]
    pub fn distances(&self) -> &DistanceCache {
        &self.distances
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Per-run outcome record: flock size, sheep brought home, time used.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_sheep: self.sheep.len(),
            collected: self.collected_total,
            elapsed_seconds: self.elapsed,
            finished: self.finished,
        }
    }

    /// Snapshot all agent state for serialization or comparison.
    #[must_use]
    pub fn snapshot(&self) -> FlockSnapshot {
        FlockSnapshot {
            tick: self.tick,
            elapsed_seconds: self.elapsed,
            collected: self.collected_total,
            sheep: self.sheep.clone(),
            dogs: self.dogs.clone(),
        }
    }
}

/// Advance one agent kinematically: bounded turn toward the desired heading,
/// bounded speed change toward the desired speed, then displacement.
fn integrate_motion(
    limits: &MotionLimits,
    dt: f32,
    position: &mut Vec2,
    heading: &mut f32,
    speed: &mut f32,
    desired_heading: f32,
    desired_speed: f32,
) {
    *heading = move_towards_angle(*heading, desired_heading, limits.max_turn * dt);
    *speed = move_towards(*speed, desired_speed, limits.max_speed_change * dt)
        .clamp(limits.min_speed, limits.max_speed);
    *position += heading_vector(*heading) * (*speed * dt);
}

/// Cruising speed implied by a locomotion state.
pub(crate) fn state_speed(state: MotionState, limits: &MotionLimits) -> f32 {
    match state {
        MotionState::Idle => 0.0,
        MotionState::Walking => limits.walking_speed,
        MotionState::Running => limits.running_speed,
    }
}
