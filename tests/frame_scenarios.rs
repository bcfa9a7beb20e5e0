//! Whole-frame scenarios on the CPU backend.

use fieldswarm::field::FIELD_INITIAL_INDEX;
use fieldswarm::particles::PARTICLE_INITIAL_INDEX;
use fieldswarm::scheduler::splat_pass;
use fieldswarm::view::FrameSnapshot;
use fieldswarm::{FrameScheduler, Seeding, SimConfig, SimulationState};
use glam::{UVec3, Vec3, Vec4};

fn point_config(position: [f32; 3]) -> SimConfig {
    SimConfig {
        seeding: Seeding::Point { position },
        ..SimConfig::with_radii(4, 4)
    }
}

#[test]
fn resting_cluster_splats_into_one_texel() {
    let mut state = SimulationState::new(&point_config([0.5, 0.5, 0.625])).unwrap();
    splat_pass(&mut state);

    let layout = *state.layout();
    let texel = layout.texel_of_cell(UVec3::new(2, 2, 2));
    let field = state.field().current();
    assert_eq!(field[texel], Vec4::new(0.0, 0.0, 0.0, 16.0));
    assert_eq!(field.iter().filter(|t| **t != Vec4::ZERO).count(), 1);
}

#[test]
fn resting_cluster_moves_by_external_force_after_one_frame() {
    let config = point_config([0.5, 0.5, 0.625]);
    let mut state = SimulationState::new(&config).unwrap();
    FrameScheduler::step(&mut state);

    // the cluster sits mid-grid, so the diffused weight is symmetric and the
    // sampled gradient vanishes
    let p = Vec3::new(0.5, 0.5, 0.625);
    let expected = p + config.forces.scale * config.forces.at(p, Vec3::ZERO);
    assert!((expected - Vec3::new(0.4999875, 0.4999, 0.625)).abs().max_element() < 1e-7);
    for pos in state.particles().current() {
        assert!((pos.truncate() - expected).abs().max_element() < 1e-6, "{pos:?}");
        assert_eq!(pos.w, 1.0);
    }

    assert_eq!(state.frame(), 1);
    assert_eq!(state.particles().index(), PARTICLE_INITIAL_INDEX + 1);
    assert_eq!(state.field().index(), FIELD_INITIAL_INDEX + 2);
}

#[test]
fn view_exposes_the_last_completed_frame() {
    let mut state = SimulationState::new(&SimConfig::with_radii(8, 16)).unwrap();
    FrameScheduler::run(&mut state, 3);
    let view = state.view();
    assert_eq!(view.current.len(), 64);
    assert_eq!(view.previous.len(), 64);
    assert_eq!(view.field.len(), 16 * 16 * 16);
    assert_eq!(view.particle_index, state.particles().index());
    assert_eq!(view.field_index, state.field().index());
    assert_eq!(view.particle_ids().len(), 64);
    assert_eq!(view.particle_colors().len(), 64);
}

#[test]
fn runs_are_reproducible() {
    let config = SimConfig {
        seeding: Seeding::Volume,
        seed: 7,
        ..SimConfig::with_radii(16, 16)
    };
    let run = || {
        let mut state = SimulationState::new(&config).unwrap();
        FrameScheduler::run(&mut state, 12);
        FrameSnapshot::from(state.view())
    };
    let a = run();
    let b = run();
    assert_eq!(a.current, b.current);
    assert_eq!(a.previous, b.previous);
    assert_eq!(a.field, b.field);
}

#[test]
fn particles_stay_inside_over_many_frames() {
    let config = SimConfig {
        seeding: Seeding::Volume,
        ..SimConfig::with_radii(16, 16)
    };
    let mut state = SimulationState::new(&config).unwrap();
    let (lo, hi) = state.layout().interior();
    for frame in 1..=150u64 {
        FrameScheduler::step(&mut state);
        let inside = state.particles().current().iter().all(|p| {
            let p = p.truncate();
            p.is_finite() && p.cmpge(Vec3::splat(lo)).all() && p.cmple(Vec3::splat(hi)).all()
        });
        assert!(inside, "particle escaped at frame {frame}");
    }
    let stats = state.view().stats(state.frame());
    assert!(stats.contained);
    assert_eq!(stats.frame, 150);
}

#[test]
fn field_weight_stays_bounded() {
    let mut state = SimulationState::new(&SimConfig::with_radii(16, 16)).unwrap();
    let particles = state.particles().len() as f32;
    for _ in 0..20 {
        FrameScheduler::step(&mut state);
        // each frame adds at most P to any texel, then two passes scale the
        // max norm by 0.8 each
        let peak = state.field().current().iter().map(|t| t.w).fold(0.0f32, f32::max);
        assert!(peak <= 2.0 * particles, "peak {peak}");
        assert!(state.field().current().iter().all(|t| t.w >= 0.0));
    }
}
