//! Sheep behaviour models.
//!
//! Two interchangeable models produce a desired heading and speed per sheep
//! per tick. The stochastic model keeps a three-state machine whose
//! transition rates depend on neighbour states and dog proximity; the
//! rule-based model derives the state directly from dog distance and steers
//! by a weighted sum of attraction and repulsion terms.

use glam::Vec2;
use rand::{rngs::SmallRng, Rng};
use serde::{Deserialize, Serialize};

use crate::obstacles::ObstacleSet;
use crate::{
    state_speed, vector_heading_or, wrap_degrees, AgentView, HerdSimulation, MotionState,
    SheepModelKind,
};

/// Parameters of the stochastic state-machine model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GinelliParams {
    /// Metric interaction radius while walking, in metres.
    pub r_0: f32,
    /// Equilibrium distance of the running cohesion term.
    pub r_e: f32,
    /// Angular noise amplitude while walking, as a fraction of a half-turn.
    pub eta: f32,
    /// Weight of the separation/cohesion terms.
    pub beta: f32,
    /// Mimetic amplification of neighbour counts in transition rates.
    pub alpha: f32,
    /// Exponent sharpening the running transition rates.
    pub delta: f32,
    /// Base time scale of the idle to walking transition, in seconds.
    pub tau_iw: f32,
    /// Base time scale of the walking to idle transition, in seconds.
    pub tau_wi: f32,
    /// Shell distance scale at which running starts.
    pub d_r: f32,
    /// Shell distance scale at which running stops.
    pub d_s: f32,
    /// Dog repulsion weight.
    pub rho_s: f32,
    /// Dog detection radius.
    pub r_s: f32,
    /// Strong repulsion radius; dogs closer than this panic the sheep.
    pub r_ss: f32,
    /// Obstacle repulsion weight.
    pub rho_f: f32,
    /// Obstacle repulsion radius.
    pub r_f: f32,
}

impl Default for GinelliParams {
    fn default() -> Self {
        Self {
            r_0: 1.0,
            r_e: 1.0,
            eta: 0.13,
            beta: 3.0,
            alpha: 15.0,
            delta: 4.0,
            tau_iw: 35.0,
            tau_wi: 8.0,
            d_r: 31.6,
            d_s: 6.3,
            rho_s: 3.0,
            r_s: 22.5,
            r_ss: 11.25,
            rho_f: 2.0,
            r_f: 3.0,
        }
    }
}

/// Parameters of the rule-based model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrombomParams {
    /// Agent interaction radius; sheep closer than this repel each other.
    pub r_a: f32,
    /// Sheep/sheep repulsion weight.
    pub rho_a: f32,
    /// Dog repulsion weight.
    pub rho_s: f32,
    /// Attraction weight toward the local centre of mass.
    pub c: f32,
    /// Inertia weight on the current forward direction.
    pub h: f32,
    /// Angular noise amplitude, as a fraction of a half-turn.
    pub e: f32,
    /// Dog detection radius.
    pub r_s: f32,
    /// Strong repulsion radius; a dog this close forces running.
    pub r_ss: f32,
    /// Obstacle repulsion weight.
    pub rho_f: f32,
    /// Obstacle repulsion radius.
    pub r_f: f32,
    /// Cognitive cap on neighbours and detected dogs.
    pub n: usize,
    /// When set, dogs hidden by obstacles or the blind cone are ignored.
    pub occlusion: bool,
    /// Rear blind cone width, in degrees.
    pub blind_angle: f32,
}

impl Default for StrombomParams {
    fn default() -> Self {
        Self {
            r_a: 1.0,
            rho_a: 2.0,
            rho_s: 1.0,
            c: 1.05,
            h: 0.5,
            e: 0.1,
            r_s: 22.5,
            r_ss: 11.25,
            rho_f: 2.0,
            r_f: 3.0,
            n: 20,
            occlusion: false,
            blind_angle: 0.0,
        }
    }
}

/// Start-of-tick inputs for one sheep's behaviour evaluation, owned so the
/// update can borrow the RNG and obstacle set at the same time.
struct GinelliScratch {
    state: MotionState,
    metric: Vec<usize>,
    topological: Vec<usize>,
    dogs_near: Vec<usize>,
    n_idle: f32,
    n_walking: f32,
    m_running: f32,
    m_toidle: f32,
    shell_distance: f32,
}

impl HerdSimulation {
    pub(crate) fn stage_sheep(&mut self, sheep_views: &[AgentView], dog_views: &[AgentView]) {
        match self.config.sheep_model {
            SheepModelKind::Ginelli => self.stage_sheep_ginelli(sheep_views, dog_views),
            SheepModelKind::Strombom => self.stage_sheep_strombom(sheep_views, dog_views),
        }
    }

    fn stage_sheep_ginelli(&mut self, sheep_views: &[AgentView], dog_views: &[AgentView]) {
        let params = self.config.ginelli;
        let limits = self.config.sheep_limits;
        let dt = self.config.dt;
        let flock_size = self.sheep.len() as f32;

        for i in 0..self.sheep.len() {
            if self.sheep[i].collected {
                continue;
            }
            let scratch = {
                let s = &self.sheep[i];
                GinelliScratch {
                    state: s.state,
                    metric: s.metric_neighbours.clone(),
                    topological: s.topological_neighbours.clone(),
                    dogs_near: s.dog_neighbours.clone(),
                    n_idle: s.n_idle,
                    n_walking: s.n_walking,
                    m_running: s.m_running,
                    m_toidle: s.m_toidle,
                    shell_distance: s.shell_distance,
                }
            };
            let own = sheep_views[i];
            let (d_fear, nd) = dog_pressure(own.position, &scratch.dogs_near, dog_views, params.r_ss);
            let state = ginelli_next_state(
                &params,
                dt,
                flock_size,
                &scratch,
                d_fear,
                nd,
                &mut self.rng,
            );

            let desired_heading = match state {
                MotionState::Idle => own.heading,
                MotionState::Walking => {
                    let drive = ginelli_drive(
                        &params,
                        &own,
                        state,
                        &scratch,
                        sheep_views,
                        dog_views,
                        &self.config.obstacles,
                    );
                    let eps = angular_noise(params.eta, &mut self.rng);
                    wrap_degrees(vector_heading_or(drive, own.heading) + eps)
                }
                MotionState::Running => {
                    let drive = ginelli_drive(
                        &params,
                        &own,
                        state,
                        &scratch,
                        sheep_views,
                        dog_views,
                        &self.config.obstacles,
                    );
                    vector_heading_or(drive, own.heading)
                }
            };

            let sheep = &mut self.sheep[i];
            sheep.previous_state = scratch.state;
            sheep.state = state;
            sheep.desired_heading = desired_heading;
            sheep.desired_speed = state_speed(state, &limits);
        }
    }

    fn stage_sheep_strombom(&mut self, sheep_views: &[AgentView], dog_views: &[AgentView]) {
        let params = self.config.strombom;
        let limits = self.config.sheep_limits;

        for i in 0..self.sheep.len() {
            if self.sheep[i].collected {
                continue;
            }
            let own = sheep_views[i];

            // Perception is re-derived every tick rather than read from the
            // cadenced relation lists.
            let mut dogs_near: Vec<(usize, f32)> = dog_views
                .iter()
                .enumerate()
                .filter_map(|(d, dog)| {
                    let dist = dog.position.distance(own.position);
                    (dist < params.r_s).then_some((d, dist))
                })
                .collect();
            if params.occlusion {
                dogs_near.retain(|&(d, _)| {
                    crate::dogs::is_visible_cone(&own, dog_views[d].position, params.blind_angle)
                        && !self
                            .config
                            .obstacles
                            .blocked(own.position, dog_views[d].position)
                });
            }
            dogs_near.sort_by(|a, b| a.1.total_cmp(&b.1));
            dogs_near.truncate(params.n);

            let mut neighbours: Vec<usize> = sheep_views
                .iter()
                .enumerate()
                .filter_map(|(j, other)| (j != i && !other.collected).then_some(j))
                .collect();
            neighbours.sort_by(|&a, &b| self.distances.get(i, a).total_cmp(&self.distances.get(i, b)));
            neighbours.truncate(params.n);

            let old_state = self.sheep[i].state;
            let mut state = if dogs_near.is_empty() {
                if self.rng.random::<f32>() < 0.05 {
                    MotionState::Walking
                } else {
                    MotionState::Idle
                }
            } else if dogs_near[0].1 < params.r_ss {
                MotionState::Running
            } else {
                MotionState::Walking
            };

            let mut desired_heading = own.heading;
            if state != MotionState::Idle {
                let eps = angular_noise(params.e, &mut self.rng);

                let mut dog_repulsion = Vec2::ZERO;
                for &(d, _) in &dogs_near {
                    dog_repulsion += own.position - dog_views[d].position;
                }
                let mut sheep_repulsion = Vec2::ZERO;
                for &j in &neighbours {
                    let offset = own.position - sheep_views[j].position;
                    let dist = offset.length();
                    if dist > f32::EPSILON && dist < params.r_a {
                        sheep_repulsion += offset / dist;
                    }
                }
                let mut local_centre = own.position;
                for &j in &neighbours {
                    local_centre += sheep_views[j].position;
                }
                local_centre /= (neighbours.len() + 1) as f32;

                let mut drive = params.h * own.forward()
                    + params.c * (local_centre - own.position).normalize_or_zero()
                    + params.rho_a * sheep_repulsion.normalize_or_zero()
                    + params.rho_s * dog_repulsion.normalize_or_zero();

                for point in self
                    .config
                    .obstacles
                    .boundary_points_within(own.position, params.r_f)
                {
                    let offset = point - own.position;
                    let dist = offset.length();
                    if dist > f32::EPSILON {
                        drive +=
                            params.rho_f * 0.0f32.min((dist - params.r_f) / params.r_f) * (offset / dist);
                    }
                    // Fences make walking sheep stall and graze instead.
                    if state == MotionState::Walking
                        && self.rng.random::<f32>() < 1.0 - dist / params.r_f
                    {
                        state = MotionState::Idle;
                    }
                }

                desired_heading = wrap_degrees(vector_heading_or(drive, own.heading) + eps);
            }

            let sheep = &mut self.sheep[i];
            sheep.previous_state = old_state;
            sheep.state = state;
            sheep.desired_heading = desired_heading;
            sheep.desired_speed = state_speed(state, &limits);
        }
    }
}

/// Mean squared fear response and nearest distance over detected dogs.
/// Returns `(0, +inf)` when no dog is in range.
fn dog_pressure(
    position: Vec2,
    dogs_near: &[usize],
    dog_views: &[AgentView],
    r_ss: f32,
) -> (f32, f32) {
    if dogs_near.is_empty() {
        return (0.0, f32::INFINITY);
    }
    let mut fear_sum = 0.0;
    let mut nearest = f32::INFINITY;
    for &d in dogs_near {
        let dist = dog_views[d].position.distance(position);
        fear_sum += (1.0 - dist / r_ss).max(0.0).powi(2);
        nearest = nearest.min(dist);
    }
    (fear_sum / dogs_near.len() as f32, nearest)
}

/// Shrink factor applied to the running transition scales as a dog closes
/// in. Piecewise quadratic, 1 outside the detection radius.
fn proximity_scale(nd: f32, r_ss: f32, r_s: f32) -> f32 {
    if nd < r_ss {
        0.25 * (nd / r_ss).powi(2)
    } else if nd < r_s {
        0.25 + 0.25 * ((nd - r_ss) / (r_s - r_ss)).powi(2)
    } else {
        1.0
    }
}

/// Per-tick firing probability of a Poisson rate.
fn tick_probability(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt).exp()
}

/// Uniform angular noise in degrees, spanning `±180·eta`.
fn angular_noise(eta: f32, rng: &mut SmallRng) -> f32 {
    if eta <= 0.0 {
        return 0.0;
    }
    rng.random_range(-180.0 * eta..180.0 * eta)
}

/// One evaluation of the three-state machine. `tau_iwr` and `tau_ri` are the
/// flock size, so running onsets grow rarer as the flock grows.
fn ginelli_next_state(
    params: &GinelliParams,
    dt: f32,
    flock_size: f32,
    scratch: &GinelliScratch,
    d_fear: f32,
    nd: f32,
    rng: &mut SmallRng,
) -> MotionState {
    let scale = proximity_scale(nd, params.r_ss, params.r_s);
    let d_r = params.d_r * scale;
    let d_s = params.d_s * scale;

    let mut state = scratch.state;
    match state {
        MotionState::Idle => {
            let rate = (1.0 + params.alpha * scratch.n_walking) / params.tau_iw;
            if rng.random::<f32>() < tick_probability(rate, dt) {
                state = MotionState::Walking;
            }
        }
        MotionState::Walking => {
            let rate = (1.0 + params.alpha * scratch.n_idle) / params.tau_wi;
            if rng.random::<f32>() < tick_probability(rate, dt) {
                state = MotionState::Idle;
            }
        }
        MotionState::Running => {}
    }

    // Running transitions test against the start-of-tick state. With no
    // topological neighbours the probabilities are used directly; a lone
    // undisturbed runner then stops immediately.
    match scratch.state {
        MotionState::Idle | MotionState::Walking => {
            let p = if scratch.shell_distance > 0.0 {
                let rate = ((scratch.shell_distance / d_r)
                    * (1.0 + params.alpha * (scratch.m_running + d_fear)))
                    .powf(params.delta)
                    / flock_size;
                tick_probability(rate, dt)
            } else {
                0.25 + 0.75 * (1.0 - (nd / params.r_ss).powi(2))
            };
            if rng.random::<f32>() < p {
                state = MotionState::Running;
            }
        }
        MotionState::Running => {
            let p = if scratch.shell_distance > 0.0 {
                let rate = ((d_s / scratch.shell_distance)
                    * (1.0 + params.alpha * scratch.m_toidle))
                    .powf(params.delta)
                    / flock_size;
                tick_probability(rate, dt)
            } else {
                0.75 * (nd / params.r_ss).powi(2)
            };
            if rng.random::<f32>() < p {
                state = MotionState::Idle;
            }
        }
    }

    state
}

/// Drive vector for a walking or running sheep: dog repulsion, obstacle
/// repulsion, and the state's alignment and separation terms.
fn ginelli_drive(
    params: &GinelliParams,
    own: &AgentView,
    state: MotionState,
    scratch: &GinelliScratch,
    sheep_views: &[AgentView],
    dog_views: &[AgentView],
    obstacles: &ObstacleSet,
) -> Vec2 {
    let mut drive = Vec2::ZERO;

    for &d in &scratch.dogs_near {
        let offset = dog_views[d].position - own.position;
        let dist = offset.length();
        if dist > f32::EPSILON {
            let f = 1.0f32.min((dist - params.r_s) / params.r_s);
            drive += params.rho_s * f * (offset / dist);
        }
    }

    for point in obstacles.boundary_points_within(own.position, params.r_f) {
        let offset = point - own.position;
        let dist = offset.length();
        if dist > f32::EPSILON {
            let f = 0.0f32.min((dist - params.r_f) / params.r_f);
            drive += params.rho_f * f * (offset / dist);
        }
    }

    match state {
        MotionState::Walking => {
            for &j in &scratch.metric {
                let other = &sheep_views[j];
                drive += other.forward();
                let offset = other.position - own.position;
                let dist = offset.length();
                if dist > f32::EPSILON {
                    let f = 0.0f32.min((dist - params.r_0) / params.r_0);
                    drive += params.beta * f * (offset / dist);
                }
            }
        }
        MotionState::Running => {
            for &j in &scratch.topological {
                let other = &sheep_views[j];
                if other.state == MotionState::Running {
                    drive += other.forward();
                }
                let offset = other.position - own.position;
                let dist = offset.length();
                if dist > f32::EPSILON {
                    let f = 1.0f32.min((dist - params.r_e) / params.r_e);
                    drive += params.beta * f * (offset / dist);
                }
            }
        }
        MotionState::Idle => {}
    }

    drive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{angle_difference, vector_heading, DogSpawn, HerdConfig};
    use rand::SeedableRng;

    fn view(position: Vec2, heading: f32, state: MotionState) -> AgentView {
        AgentView {
            position,
            heading,
            speed: 0.0,
            state,
            collected: false,
        }
    }

    fn empty_scratch(state: MotionState) -> GinelliScratch {
        GinelliScratch {
            state,
            metric: Vec::new(),
            topological: Vec::new(),
            dogs_near: Vec::new(),
            n_idle: 0.0,
            n_walking: 0.0,
            m_running: 0.0,
            m_toidle: 0.0,
            shell_distance: 0.0,
        }
    }

    #[test]
    fn tick_probability_bounds() {
        assert_eq!(tick_probability(0.0, 0.02), 0.0);
        assert!(tick_probability(1.0, 0.02) < tick_probability(10.0, 0.02));
        assert!((tick_probability(1e6, 0.02) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn proximity_scale_is_piecewise_quadratic() {
        assert_eq!(proximity_scale(0.0, 11.25, 22.5), 0.0);
        assert!((proximity_scale(11.25, 11.25, 22.5) - 0.25).abs() < 1e-6);
        assert!((proximity_scale(22.5, 11.25, 22.5) - 1.0).abs() < 1e-6);
        assert_eq!(proximity_scale(100.0, 11.25, 22.5), 1.0);
        assert_eq!(proximity_scale(f32::INFINITY, 11.25, 22.5), 1.0);
        let mid = proximity_scale(16.875, 11.25, 22.5);
        assert!(mid > 0.25 && mid < 0.5);
    }

    #[test]
    fn angular_noise_is_bounded_and_zero_for_zero_eta() {
        let mut rng = SmallRng::seed_from_u64(7);
        assert_eq!(angular_noise(0.0, &mut rng), 0.0);
        for _ in 0..100 {
            let eps = angular_noise(0.13, &mut rng);
            assert!(eps.abs() < 180.0 * 0.13);
        }
    }

    #[test]
    fn dog_pressure_with_no_dogs_is_calm() {
        let (fear, nd) = dog_pressure(Vec2::ZERO, &[], &[], 11.25);
        assert_eq!(fear, 0.0);
        assert_eq!(nd, f32::INFINITY);
    }

    #[test]
    fn dog_pressure_grows_with_proximity() {
        let near = [view(Vec2::new(2.0, 0.0), 0.0, MotionState::Running)];
        let far = [view(Vec2::new(10.0, 0.0), 0.0, MotionState::Running)];
        let (fear_near, nd_near) = dog_pressure(Vec2::ZERO, &[0], &near, 11.25);
        let (fear_far, nd_far) = dog_pressure(Vec2::ZERO, &[0], &far, 11.25);
        assert!(fear_near > fear_far);
        assert!(nd_near < nd_far);
    }

    #[test]
    fn walking_sheep_flees_directly_away_from_dog() {
        let params = GinelliParams::default();
        let mut scratch = empty_scratch(MotionState::Walking);
        scratch.dogs_near = vec![0];
        let dogs = [view(Vec2::new(10.0, 0.0), 0.0, MotionState::Running)];
        let drive = ginelli_drive(
            &params,
            &view(Vec2::ZERO, 90.0, MotionState::Walking),
            MotionState::Walking,
            &scratch,
            &[],
            &dogs,
            &ObstacleSet::default(),
        );
        // f = (10 - 22.5)/22.5, rho_s = 3, directed at the dog.
        assert!((drive.x - -1.6667).abs() < 1e-3);
        assert!(drive.y.abs() < 1e-6);
        assert!((vector_heading(drive) - 180.0).abs() < 1e-3);
    }

    #[test]
    fn zero_drive_keeps_current_heading() {
        let params = GinelliParams::default();
        let scratch = empty_scratch(MotionState::Walking);
        let drive = ginelli_drive(
            &params,
            &view(Vec2::ZERO, 37.0, MotionState::Walking),
            MotionState::Walking,
            &scratch,
            &[],
            &[],
            &ObstacleSet::default(),
        );
        assert_eq!(drive, Vec2::ZERO);
        assert_eq!(vector_heading_or(drive, 37.0), 37.0);
    }

    #[test]
    fn walking_sheep_aligns_with_metric_neighbours() {
        let params = GinelliParams::default();
        let mut scratch = empty_scratch(MotionState::Walking);
        scratch.metric = vec![0, 1];
        // Both neighbours head along +y, farther than r_0 so no separation.
        let others = [
            view(Vec2::new(0.0, 2.0), 90.0, MotionState::Walking),
            view(Vec2::new(2.0, 0.0), 90.0, MotionState::Walking),
        ];
        let drive = ginelli_drive(
            &params,
            &view(Vec2::ZERO, 0.0, MotionState::Walking),
            MotionState::Walking,
            &scratch,
            &others,
            &[],
            &ObstacleSet::default(),
        );
        assert!(drive.x.abs() < 1e-5);
        assert!((drive.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn running_cohesion_pulls_toward_distant_topological_neighbour() {
        let params = GinelliParams::default();
        let mut scratch = empty_scratch(MotionState::Running);
        scratch.topological = vec![0];
        let others = [view(Vec2::new(10.0, 0.0), 90.0, MotionState::Idle)];
        let drive = ginelli_drive(
            &params,
            &view(Vec2::ZERO, 0.0, MotionState::Running),
            MotionState::Running,
            &scratch,
            &others,
            &[],
            &ObstacleSet::default(),
        );
        // Idle neighbour contributes no forward term, only cohesion capped
        // at beta.
        assert!((drive.x - 3.0).abs() < 1e-5);
        assert!(drive.y.abs() < 1e-6);
    }

    #[test]
    fn isolated_undisturbed_runner_calms_immediately() {
        let params = GinelliParams::default();
        let scratch = empty_scratch(MotionState::Running);
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..20 {
            let state =
                ginelli_next_state(&params, 0.02, 50.0, &scratch, 0.0, f32::INFINITY, &mut rng);
            assert_eq!(state, MotionState::Idle);
        }
    }

    #[test]
    fn isolated_undisturbed_walker_never_panics() {
        let params = GinelliParams::default();
        let scratch = empty_scratch(MotionState::Walking);
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..200 {
            let state =
                ginelli_next_state(&params, 0.02, 50.0, &scratch, 0.0, f32::INFINITY, &mut rng);
            assert_ne!(state, MotionState::Running);
        }
    }

    #[test]
    fn crowded_walking_neighbourhood_forces_idle_transition() {
        let params = GinelliParams::default();
        let mut scratch = empty_scratch(MotionState::Walking);
        scratch.n_idle = 1e6;
        let mut rng = SmallRng::seed_from_u64(11);
        let state = ginelli_next_state(&params, 0.02, 50.0, &scratch, 0.0, f32::INFINITY, &mut rng);
        assert_eq!(state, MotionState::Idle);
    }

    #[test]
    fn walking_wave_spreads_to_idle_sheep() {
        let params = GinelliParams::default();
        let mut scratch = empty_scratch(MotionState::Idle);
        scratch.n_walking = 1e6;
        let mut rng = SmallRng::seed_from_u64(11);
        let state = ginelli_next_state(&params, 0.02, 50.0, &scratch, 0.0, f32::INFINITY, &mut rng);
        assert_eq!(state, MotionState::Walking);
    }

    fn strombom_config() -> HerdConfig {
        HerdConfig {
            sheep_model: SheepModelKind::Strombom,
            strombom: StrombomParams {
                e: 0.0,
                ..StrombomParams::default()
            },
            rng_seed: Some(9),
            ..HerdConfig::default()
        }
    }

    #[test]
    fn close_dog_forces_strombom_sheep_to_run() {
        let mut config = strombom_config();
        config.dog_spawns = vec![DogSpawn {
            position: Vec2::new(5.0, 0.0),
            heading: 180.0,
            manual: true,
        }];
        let layout = [(Vec2::ZERO, 0.0), (Vec2::new(0.0, 1.0), 0.0)];
        let mut sim = HerdSimulation::with_layout(config, &layout).expect("config is valid");
        sim.step();
        let sheep = &sim.sheep()[0];
        assert_eq!(sheep.state, MotionState::Running);
        assert_eq!(sheep.desired_speed, sim.config().sheep_limits.running_speed);
        // h*(1,0) + c*(0,1) + rho_s*(-1,0) = (-0.5, 1.05).
        let expected = vector_heading(Vec2::new(-0.5, 1.05));
        assert!(angle_difference(sheep.desired_heading, expected).abs() < 0.1);
    }

    #[test]
    fn distant_dog_makes_strombom_sheep_walk_away() {
        let mut config = strombom_config();
        config.dog_spawns = vec![DogSpawn {
            position: Vec2::new(15.0, 0.0),
            heading: 180.0,
            manual: true,
        }];
        let layout = [(Vec2::ZERO, 0.0)];
        let mut sim = HerdSimulation::with_layout(config, &layout).expect("config is valid");
        sim.step();
        let sheep = &sim.sheep()[0];
        assert_eq!(sheep.state, MotionState::Walking);
        assert!(sheep.desired_heading.abs() > 90.0);
    }

    #[test]
    fn undisturbed_strombom_sheep_mostly_grazes() {
        let mut config = strombom_config();
        config.dog_spawns = vec![DogSpawn {
            position: Vec2::new(500.0, 500.0),
            heading: 0.0,
            manual: true,
        }];
        let layout = [(Vec2::ZERO, 0.0)];
        let mut sim = HerdSimulation::with_layout(config, &layout).expect("config is valid");
        let mut idle_ticks = 0;
        for _ in 0..100 {
            sim.step();
            let state = sim.sheep()[0].state;
            assert_ne!(state, MotionState::Running);
            if state == MotionState::Idle {
                idle_ticks += 1;
            }
        }
        assert!(idle_ticks > 60, "idle for {idle_ticks} of 100 ticks");
    }
}
