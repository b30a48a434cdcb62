use proptest::prelude::*;
use void_physics::prelude::*;

const DT: f32 = 1.0 / 60.0;

fn offset() -> impl Strategy<Value = Vec3> {
    (-50.0f32..50.0, -50.0f32..50.0, -50.0f32..50.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    /// After any update, no segment is longer than `rest_length * max_stretch`
    #[test]
    fn rope_segments_respect_max_stretch(
        segments in 1u32..25,
        max_stretch in 1.0f32..3.0,
        iterations in 1u32..6,
        pull in offset(),
        end_pinned in any::<bool>(),
        steps in 1usize..20,
    ) {
        let cfg = RopeConfig::default()
            .with_segments(segments)
            .with_max_stretch(max_stretch)
            .with_iterations(iterations);
        let mut rope = Rope::new("p", Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), cfg);

        let free = if end_pinned {
            rope.set_start_fixed(false);
            rope.set_end_fixed(true);
            0
        } else {
            segments as usize
        };
        let target = rope.nodes()[free].pos + pull;
        rope.set_node_position(free, target);

        for _ in 0..steps {
            rope.update(DT);
            prop_assert!(rope.tension() <= max_stretch * (1.0 + 1e-4), "tension {}", rope.tension());
        }
    }

    /// Tire forces never leave the friction circle
    #[test]
    fn vehicle_tire_forces_inside_friction_circle(
        throttle in -1.0f32..1.0,
        brake in 0.0f32..1.0,
        steer in -1.0f32..1.0,
        handbrake in any::<bool>(),
        vx in -30.0f32..30.0,
        vy in -10.0f32..10.0,
        yaw_rate in -2.0f32..2.0,
        height in 0.35f32..0.7,
    ) {
        let cfgs = [WheelConfig::steering(), WheelConfig::steering(), WheelConfig::driven(), WheelConfig::driven()];
        let positions = [
            Vec3::new(1.2, -0.8, 0.0),
            Vec3::new(1.2, 0.8, 0.0),
            Vec3::new(-1.2, -0.8, 0.0),
            Vec3::new(-1.2, 0.8, 0.0),
        ];
        let mut vehicle = Vehicle::new(EntityId(1), VehicleConfig::default(), &cfgs, &positions);
        let mut body = RigidBody::dynamic(EntityId(1), 1500.0)
            .with_position(Vec3::new(0.0, 0.0, height))
            .with_velocity(Vec3::new(vx, vy, 0.0))
            .with_angular_velocity(Vec3::new(0.0, 0.0, yaw_rate));
        let ground = GroundPlane::at_height(0.0);

        vehicle.set_throttle(throttle);
        vehicle.set_brake(brake);
        vehicle.set_handbrake(handbrake);
        for _ in 0..5 {
            vehicle.set_steering(steer, DT);
            vehicle.update(&mut body, &ground, DT);

            for wheel in &vehicle.wheels {
                let combined = (wheel.long_force.powi(2) + wheel.lat_force.powi(2)).sqrt();
                prop_assert!(combined <= wheel.max_friction() * (1.0 + 1e-4) + 1e-3);
            }
        }
    }
}
