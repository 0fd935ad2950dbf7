//! Configuration errors at startup and file-driven runs against boundaries

use std::io::Write;

use dem_engine::{DemConfig, DemError, DemSolver, ParticleId};
use glam::DVec3;

#[test]
fn test_cadence_mismatch_rejected_before_any_step() {
    let mut config = DemConfig::default();
    config.model.contact_detection_frequency = 3;
    config.model.repartition_frequency = 10;
    let err = DemSolver::new(config).err().unwrap();
    assert!(matches!(err, DemError::Config { .. }), "unexpected error {}", err);
}

#[test]
fn test_unknown_integrator_rejected() {
    let text = r#"
        [model]
        integration_method = "leapfrog"
    "#;
    assert!(matches!(DemConfig::from_toml_str(text), Err(DemError::Parse(_))));
    assert!(matches!(
        "leapfrog".parse::<dem_engine::IntegrationMethod>(),
        Err(DemError::UnknownSelection { .. })
    ));
}

#[test]
fn test_degenerate_face_rejected_by_solver() {
    let text = r#"
        [[boundary.faces]]
        vertices = [[0.0, 0.0, 0.0], [0.01, 0.0, 0.0], [0.02, 0.0, 0.0]]
    "#;
    let config = DemConfig::from_toml_str(text).unwrap();
    assert!(matches!(DemSolver::new(config), Err(DemError::Config { .. })));
}

#[test]
fn test_too_many_subdomains_rejected() {
    let mut config = DemConfig::default();
    config.domain.cells = [2, 2, 1];
    config.domain.subdomains = 5;
    assert!(matches!(DemSolver::new(config), Err(DemError::Config { .. })));
}

#[test]
fn test_particle_dropped_from_file_config_rests_on_floor() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [simulation_control]
        time_step = 1.0e-5
        time_end = 0.1
        log_frequency = 0

        [model]
        contact_detection_frequency = 20
        repartition_frequency = 2000

        [physical_properties]
        diameter = 0.01
        restitution = 0.5
        body_force = [0.0, 0.0, -9.81]

        [insertion]
        total_particles = 1
        particles_per_insertion = 1
        insertion_frequency = 1
        box_min = [-0.01, -0.01, -0.045]
        box_max = [0.01, 0.01, -0.03]

        [domain]
        min = [-0.05, -0.05, -0.05]
        max = [0.05, 0.05, 0.05]
        cells = [4, 4, 4]
        subdomains = 2

        [output]
        timer = "none"
        test_mode = true
        "#
    )
    .unwrap();

    let config = DemConfig::load(file.path()).unwrap();
    let mut solver = DemSolver::new(config).unwrap();
    let mut lowest = f64::INFINITY;
    let mut bounced = false;
    let mut wall_contact_steps = 0;
    while let Some(report) = solver.advance().unwrap() {
        let particle = solver.particle(ParticleId(0)).unwrap();
        lowest = lowest.min(particle.position.z);
        bounced |= particle.velocity.z > 0.0;
        wall_contact_steps += report.contacts.boundary;
    }

    let summary = solver.summary();
    assert_eq!(summary.particles, 1);
    assert!(bounced);
    assert!(wall_contact_steps > 0);
    // The floor at z = -0.05 is never crossed by more than a small fraction of the radius
    assert!(lowest > -0.05 + 0.005 * 0.8, "lowest center at {}", lowest);
    assert_eq!(summary.positions.unwrap().lines().count(), 1);
}

fn feature_config(features: &str) -> DemConfig {
    let text = format!(
        r#"
        [simulation_control]
        time_step = 1.0e-5
        time_end = 0.01
        log_frequency = 0

        [physical_properties]
        diameter = 0.01
        body_force = [0.0, 0.0, 0.0]

        [domain]
        min = [-0.05, -0.05, -0.05]
        max = [0.05, 0.05, 0.05]
        cells = [4, 4, 4]
        walls = false

        {}
        "#,
        features
    );
    DemConfig::from_toml_str(&text).unwrap()
}

fn rebound_speed(config: DemConfig) -> f64 {
    let mut solver = DemSolver::new(config).unwrap();
    let id = solver
        .place_particle(DVec3::new(0.0055, 0.0, 0.0), DVec3::new(-0.5, 0.0, 0.0), DVec3::ZERO)
        .unwrap()
        .unwrap();
    solver.solve().unwrap();
    solver.particle(id).unwrap().velocity.x
}

#[test]
fn test_particle_rebounds_from_line() {
    let config = feature_config(
        r#"
        [[boundary.lines]]
        start = [0.0, -0.02, 0.0]
        end = [0.0, 0.02, 0.0]
        "#,
    );
    let speed = rebound_speed(config);
    assert!(speed > 0.4 && speed < 0.5, "rebound speed {}", speed);
}

#[test]
fn test_particle_rebounds_from_point() {
    let config = feature_config(
        r#"
        [[boundary.points]]
        position = [0.0, 0.0, 0.0]
        "#,
    );
    let speed = rebound_speed(config);
    assert!(speed > 0.4 && speed < 0.5, "rebound speed {}", speed);
}
