use figurine::{config::ControllerConfig, controller::RotationController};

fn run(controller: &mut RotationController, frames: usize) {
    for _ in 0..frames {
        controller.advance();
    }
}

fn spin(dx: f32) -> RotationController {
    let mut controller = RotationController::default();
    controller.begin_drag(0.0, 0.0);
    controller.continue_drag(dx, 0.0);
    controller.end_drag();
    controller
}

#[test]
fn should_ignore_moves_without_drag() {
    let mut controller = RotationController::default();
    controller.continue_drag(250.0, -40.0);

    assert!(!controller.is_dragging());
    assert_eq!(controller.velocity(), ControllerConfig::default().initial_velocity);
    assert_eq!(controller.yaw().target, 0.0);
    assert_eq!(controller.pitch().target, 0.0);
}

#[test]
fn should_spin_with_horizontal_drag() {
    let mut controller = RotationController::default();
    controller.begin_drag(10.0, 10.0);
    controller.continue_drag(60.0, 10.0);
    controller.continue_drag(110.0, 10.0);

    assert!(controller.is_dragging());
    assert!((controller.velocity() - 0.5).abs() < 1e-6);
    assert!((controller.yaw().target - 1.0).abs() < 1e-6);
    assert_eq!(controller.pitch().target, 0.0);
}

#[test]
fn should_clamp_tilt() {
    let mut controller = RotationController::default();
    controller.begin_drag(0.0, 0.0);
    controller.continue_drag(0.0, 1000.0);
    assert_eq!(controller.pitch().target, 0.3);

    controller.continue_drag(0.0, -5000.0);
    assert_eq!(controller.pitch().target, -0.3);
}

#[test]
fn should_hold_targets_while_dragging() {
    let mut controller = RotationController::default();
    controller.begin_drag(0.0, 0.0);
    controller.continue_drag(100.0, 20.0);
    let yaw = controller.yaw().target;
    let pitch = controller.pitch().target;

    run(&mut controller, 100);

    assert_eq!(controller.yaw().target, yaw);
    assert_eq!(controller.pitch().target, pitch);
    assert!((controller.yaw().current - yaw).abs() < 1e-3);
    assert!((controller.pitch().current - pitch).abs() < 1e-3);
}

#[test]
fn should_level_out_after_release() {
    let mut controller = RotationController::default();
    controller.begin_drag(0.0, 0.0);
    controller.continue_drag(0.0, 60.0);
    controller.end_drag();

    run(&mut controller, 400);

    assert_eq!(controller.pitch().target, 0.0);
    assert!(controller.pitch().current.abs() < 1e-4);
    assert_eq!(controller.orientation(), controller.group().rotation());
    assert_eq!(controller.orientation().0, controller.pitch().current);
}

#[test]
fn should_tilt_within_a_negative_limit() {
    let mut controller = RotationController::new(ControllerConfig {
        max_tilt: -0.3,
        ..Default::default()
    });
    controller.begin_drag(0.0, 0.0);
    controller.continue_drag(0.0, 10.0);
    assert!((controller.pitch().target - 0.05).abs() < 1e-6);

    controller.continue_drag(0.0, 1000.0);
    assert_eq!(controller.pitch().target, 0.3);
    controller.continue_drag(0.0, -2000.0);
    assert_eq!(controller.pitch().target, -0.3);
}

#[test]
fn should_trail_target_by_smoothing() {
    let mut controller = spin(100.0);
    let before = controller.yaw();
    controller.advance();
    let after = controller.yaw();

    let target = before.target + controller.velocity();
    assert!((after.target - target).abs() < 1e-6);
    let expected = before.current + (after.target - before.current) * 0.1;
    assert!((after.current - expected).abs() < 1e-6);
}

/// Runs until the spin is no faster than the cruise speed.
fn coast(controller: &mut RotationController) {
    for _ in 0..1000 {
        controller.advance();
        if controller.velocity().abs() <= 0.01 {
            return;
        }
    }
    panic!("spin never slowed down");
}

#[test]
fn should_floor_fast_spins_at_cruise_speed() {
    let mut controller = spin(100.0);
    coast(&mut controller);
    assert_eq!(controller.velocity(), 0.01);

    let mut controller = spin(-100.0);
    coast(&mut controller);
    assert_eq!(controller.velocity(), -0.01);
}

#[test]
fn should_stop_after_cruising() {
    let mut controller = spin(100.0);
    coast(&mut controller);

    controller.advance();
    assert!((controller.velocity() - 0.0095).abs() < 1e-7);

    run(&mut controller, 100);
    assert_eq!(controller.velocity(), 0.0);
}

#[test]
fn should_stop_slow_spins() {
    let mut controller = spin(0.5);
    assert!((controller.velocity() - 0.005).abs() < 1e-7);

    run(&mut controller, 100);
    assert_eq!(controller.velocity(), 0.0);

    let yaw = controller.yaw().target;
    run(&mut controller, 10);
    assert_eq!(controller.yaw().target, yaw);
}

#[test]
fn should_apply_custom_tuning() {
    let tuning = ControllerConfig {
        horizontal_gain: 0.02,
        max_tilt: 0.1,
        ..ControllerConfig::default()
    };
    let mut controller = RotationController::new(tuning);
    controller.begin_drag(0.0, 0.0);
    controller.continue_drag(10.0, 100.0);

    assert!((controller.velocity() - 0.2).abs() < 1e-6);
    assert_eq!(controller.pitch().target, 0.1);
}
