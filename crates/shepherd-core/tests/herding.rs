//! End-to-end runs of the herding pipeline.

use glam::Vec2;
use shepherd_core::dogs::DogStrategyKind;
use shepherd_core::sheep::StrombomParams;
use shepherd_core::{
    DogSpawn, FlockSnapshot, HerdConfig, HerdSimulation, MotionState, SheepModelKind, Tick,
};

fn seeded(seed: u64) -> HerdConfig {
    HerdConfig {
        rng_seed: Some(seed),
        ..HerdConfig::default()
    }
}

#[test]
fn identical_seeds_produce_identical_trajectories() {
    let mut a = HerdSimulation::new(seeded(1234)).expect("config is valid");
    let mut b = HerdSimulation::new(seeded(1234)).expect("config is valid");
    for _ in 0..100 {
        a.step();
        b.step();
    }
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn different_seeds_produce_different_flocks() {
    let a = HerdSimulation::new(seeded(1)).expect("config is valid");
    let b = HerdSimulation::new(seeded(2)).expect("config is valid");
    assert_ne!(a.snapshot(), b.snapshot());
}

#[test]
fn snapshot_round_trips_through_json() {
    let mut sim = HerdSimulation::new(seeded(77)).expect("config is valid");
    for _ in 0..25 {
        sim.step();
    }
    let snapshot = sim.snapshot();
    let json = serde_json::to_string(&snapshot).expect("snapshot serializes");
    let restored = serde_json::from_str(&json).expect("snapshot deserializes");
    assert_eq!(snapshot, restored);

    let config_json = serde_json::to_string(sim.config()).expect("config serializes");
    let _: HerdConfig = serde_json::from_str(&config_json).expect("config deserializes");
}

#[test]
fn restored_snapshots_resume_identically() {
    let mut sim = HerdSimulation::new(seeded(21)).expect("config is valid");
    for _ in 0..30 {
        sim.step();
    }
    let snapshot = sim.snapshot();
    let json = serde_json::to_string(&snapshot).expect("snapshot serializes");
    let restored: FlockSnapshot = serde_json::from_str(&json).expect("snapshot deserializes");

    let mut a = HerdSimulation::from_snapshot(seeded(21), restored.clone()).expect("snapshot restores");
    let mut b = HerdSimulation::from_snapshot(seeded(21), restored).expect("snapshot restores");
    assert_eq!(a.tick(), Tick(30));
    assert_eq!(a.snapshot(), snapshot);
    for _ in 0..25 {
        a.step();
        b.step();
    }
    assert_eq!(a.snapshot(), b.snapshot());
    assert_eq!(a.tick(), Tick(55));
}

#[test]
fn snapshot_restore_rejects_mismatched_dogs() {
    let mut sim = HerdSimulation::new(seeded(21)).expect("config is valid");
    sim.step();
    let snapshot = sim.snapshot();
    let config = HerdConfig {
        dog_spawns: Vec::new(),
        ..seeded(21)
    };
    assert!(HerdSimulation::from_snapshot(config, snapshot).is_err());
}

#[test]
fn dog_pressure_drives_a_sheep_into_the_goal() {
    // One sheep just south of the goal, a dog on its heels: the strong
    // repulsion forces a straight run north into the region.
    let config = HerdConfig {
        sheep_model: SheepModelKind::Strombom,
        strombom: StrombomParams {
            e: 0.0,
            ..StrombomParams::default()
        },
        dog_spawns: vec![DogSpawn {
            position: Vec2::new(0.0, 24.0),
            heading: 90.0,
            manual: true,
        }],
        rng_seed: Some(5),
        ..HerdConfig::default()
    };
    let layout = [(Vec2::new(0.0, 30.0), 90.0)];
    let mut sim = HerdSimulation::with_layout(config, &layout).expect("config is valid");

    let mut finished = false;
    for _ in 0..200 {
        if sim.step().finished {
            finished = true;
            break;
        }
    }
    assert!(finished, "sheep never reached the goal");
    let summary = sim.summary();
    assert_eq!(summary.collected, 1);
    assert!(summary.finished);
    assert!(sim.sheep()[0].collected);
    assert!(sim
        .config()
        .goal
        .contains(sim.sheep()[0].position));
}

#[test]
fn undisturbed_flock_barely_drifts() {
    let config = HerdConfig {
        sheep_count: 4,
        dog_spawns: Vec::new(),
        rng_seed: Some(31),
        ..HerdConfig::default()
    };
    let layout = [
        (Vec2::new(0.0, 0.0), 0.0),
        (Vec2::new(1.0, 0.0), 90.0),
        (Vec2::new(0.0, 1.0), 180.0),
        (Vec2::new(1.0, 1.0), -90.0),
    ];
    let mut sim = HerdSimulation::with_layout(config, &layout).expect("config is valid");
    let start: Vec<Vec2> = sim.sheep().iter().map(|s| s.position).collect();
    for _ in 0..20 {
        sim.step();
        for sheep in sim.sheep() {
            assert_ne!(sheep.state, MotionState::Running);
        }
    }
    for (sheep, origin) in sim.sheep().iter().zip(&start) {
        assert!(sheep.position.distance(*origin) < 1.0);
    }
}

#[test]
fn run_ends_at_the_time_limit() {
    let config = HerdConfig {
        time_limit: 0.1,
        ..seeded(8)
    };
    let mut sim = HerdSimulation::new(config).expect("config is valid");
    let mut steps = 0;
    while !sim.step().finished {
        steps += 1;
        assert!(steps < 100, "run never finished");
    }
    let summary = sim.summary();
    assert!(summary.finished);
    assert!(summary.elapsed_seconds >= 0.1);
    assert_eq!(summary.total_sheep, 50);
}

#[test]
fn default_run_stays_numerically_sane() {
    let mut sim = HerdSimulation::new(seeded(99)).expect("config is valid");
    for _ in 0..250 {
        sim.step();
    }
    assert_eq!(sim.tick(), Tick(250));
    let limits = sim.config().sheep_limits;
    for sheep in sim.sheep() {
        assert!(sheep.position.is_finite());
        assert!(sheep.heading > -180.0 && sheep.heading <= 180.0);
        assert!(sheep.speed >= limits.min_speed && sheep.speed <= limits.max_speed);
    }
    let limits = sim.config().dog_limits;
    for dog in sim.dogs() {
        assert!(dog.position.is_finite());
        assert!(dog.heading > -180.0 && dog.heading <= 180.0);
        assert!(dog.speed >= limits.min_speed && dog.speed <= limits.max_speed);
    }
    assert!(sim.summary().collected <= 50);
}

#[test]
fn every_strategy_and_model_runs_clean() {
    let strategies = [
        DogStrategyKind::CollectAndDrive,
        DogStrategyKind::ArcPath,
        DogStrategyKind::BlendedField,
        DogStrategyKind::NearestChase,
    ];
    let models = [SheepModelKind::Ginelli, SheepModelKind::Strombom];
    for strategy in strategies {
        for model in models {
            let config = HerdConfig {
                sheep_count: 12,
                dog_strategy: strategy,
                sheep_model: model,
                dog_spawns: vec![
                    DogSpawn {
                        position: Vec2::new(0.0, -60.0),
                        heading: 90.0,
                        manual: false,
                    },
                    DogSpawn {
                        position: Vec2::new(10.0, -60.0),
                        heading: 90.0,
                        manual: false,
                    },
                ],
                rng_seed: Some(7),
                ..HerdConfig::default()
            };
            let mut sim = HerdSimulation::new(config).expect("config is valid");
            for _ in 0..50 {
                sim.step();
            }
            for sheep in sim.sheep() {
                assert!(sheep.position.is_finite(), "{strategy:?}/{model:?}");
            }
            for dog in sim.dogs() {
                assert!(dog.position.is_finite(), "{strategy:?}/{model:?}");
            }
        }
    }
}

#[test]
fn sparse_neighbour_refresh_still_advances() {
    let config = HerdConfig {
        sheep_count: 8,
        neighbour_refresh_interval: 5,
        rng_seed: Some(13),
        ..HerdConfig::default()
    };
    let mut sim = HerdSimulation::new(config).expect("config is valid");
    for _ in 0..40 {
        sim.step();
    }
    assert_eq!(sim.tick(), Tick(40));
    for sheep in sim.sheep() {
        assert!(sheep.position.is_finite());
    }
}
