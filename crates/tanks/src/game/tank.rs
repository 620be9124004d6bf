//! Tank behavior and snapshot payload

use arena_engine::foundation::math::{direction, perp, wrap_angle, Vec2, Vec3};
use arena_engine::net::{Message, MessageError};
use arena_engine::physics::{Motion, Shape};

use super::usercmd::UserCmd;
use super::weapon::Weapon;

/// Half of the hull length
pub const HALF_LENGTH: f32 = 1.0;

/// Half of the hull width
pub const HALF_WIDTH: f32 = 0.7;

/// Forward acceleration at full throttle
pub const ACCELERATION: f32 = 24.0;

/// Top speed of the hull
pub const MAX_SPEED: f32 = 10.0;

/// Hull turn rate at full steer, radians per second
pub const TURN_RATE: f32 = 2.5;

/// Turret slew rate, radians per second
pub const TURRET_SPEED: f32 = 4.0;

/// Fraction of sideways velocity the tracks cancel per second
const TRACK_GRIP: f32 = 8.0;

/// Fraction of speed lost per second without throttle
const DRAG: f32 = 3.0;

/// Distance from the hull center to the muzzle
pub const MUZZLE_DISTANCE: f32 = 1.6;

/// Seconds between destruction and respawn
pub const RESPAWN_DELAY: f32 = 3.0;

/// Hull collision shape
pub fn hull_shape() -> Shape {
    Shape::Box {
        half_extents: Vec2::new(HALF_LENGTH, HALF_WIDTH),
    }
}

/// A player's tank
#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    /// Slot of the controlling player
    pub player_index: u8,

    /// Paint color
    pub color: Vec3,

    /// Selected weapon (server side)
    pub weapon: Weapon,

    /// World-space turret angle
    pub turret_rotation: f32,

    /// Turret angular velocity
    pub turret_velocity: f32,

    /// Turret angle at the previous tick
    pub old_turret_rotation: f32,

    /// Accumulated damage; 1.0 destroys the tank
    pub damage: f32,

    /// World time of the last shot
    pub fire_time: f32,

    /// Latest input (server side)
    pub usercmd: UserCmd,
}

impl Tank {
    /// Create an undamaged tank ready to fire
    pub fn new(player_index: u8, color: Vec3, weapon: Weapon) -> Self {
        Self {
            player_index,
            color,
            weapon,
            turret_rotation: 0.0,
            turret_velocity: 0.0,
            old_turret_rotation: 0.0,
            damage: 0.0,
            fire_time: f32::NEG_INFINITY,
            usercmd: UserCmd::idle(),
        }
    }

    /// Whether the tank has taken lethal damage
    pub fn is_destroyed(&self) -> bool {
        self.damage >= 1.0
    }

    /// Whether the weapon has reloaded at world time `time`
    pub fn can_fire(&self, time: f32) -> bool {
        time - self.fire_time >= self.weapon.refire_delay()
    }

    /// Apply the movement part of the current input to the hull
    pub fn drive(&self, motion: &mut Motion, delta_time: f32) {
        let cmd = &self.usercmd;
        let heading = direction(motion.rotation);
        let side = perp(heading);

        motion.angular_velocity = cmd.move_dir.x * TURN_RATE;

        let mut velocity = motion.linear_velocity + heading * (cmd.move_dir.y * ACCELERATION * delta_time);

        let sideways = velocity.dot(&side);
        velocity -= side * (sideways * (TRACK_GRIP * delta_time).min(1.0));

        if cmd.move_dir.y == 0.0 {
            velocity *= (1.0 - DRAG * delta_time).max(0.0);
        }

        let speed = velocity.norm();
        if speed > MAX_SPEED {
            velocity *= MAX_SPEED / speed;
        }
        motion.linear_velocity = velocity;
    }

    /// Slew the turret toward the look direction
    pub fn aim(&mut self, delta_time: f32) {
        let look = self.usercmd.look;
        self.turret_velocity = if look.norm_squared() > 0.0 && delta_time > 0.0 {
            let target = look.y.atan2(look.x);
            let error = wrap_angle(target - self.turret_rotation);
            (error / delta_time).clamp(-TURRET_SPEED, TURRET_SPEED)
        } else {
            0.0
        };
        self.turret_rotation = wrap_angle(self.turret_rotation + self.turret_velocity * delta_time);
    }

    /// Muzzle position and firing direction
    pub fn muzzle(&self, motion: &Motion) -> (Vec2, Vec2) {
        let aim = direction(self.turret_rotation);
        (motion.world_center() + aim * MUZZLE_DISTANCE, aim)
    }

    /// Encode the tank and its pose
    pub fn write_snapshot(&self, motion: &Motion, message: &mut Message) -> Result<(), MessageError> {
        message.write_u8(self.player_index)?;
        message.write_f32(self.color.x)?;
        message.write_f32(self.color.y)?;
        message.write_f32(self.color.z)?;
        message.write_vec2(motion.position)?;
        message.write_vec2(motion.linear_velocity)?;
        message.write_f32(motion.rotation)?;
        message.write_f32(motion.angular_velocity)?;
        message.write_f32(self.turret_rotation)?;
        message.write_f32(self.turret_velocity)?;
        message.write_f32(self.damage)?;
        message.write_f32(self.fire_time)
    }

    /// Decode into this tank and its pose
    pub fn read_snapshot(&mut self, motion: &mut Motion, message: &mut Message) -> Result<(), MessageError> {
        self.player_index = message.read_u8()?;
        let r = message.read_f32()?;
        let g = message.read_f32()?;
        let b = message.read_f32()?;
        self.color = Vec3::new(r, g, b);
        motion.position = message.read_vec2()?;
        motion.linear_velocity = message.read_vec2()?;
        motion.rotation = message.read_f32()?;
        motion.angular_velocity = message.read_f32()?;
        self.turret_rotation = message.read_f32()?;
        self.turret_velocity = message.read_f32()?;
        self.damage = message.read_f32()?;
        self.fire_time = message.read_f32()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::usercmd::Actions;
    use approx::assert_relative_eq;
    use arena_engine::foundation::math::constants::HALF_PI;
    use std::sync::Arc;

    fn hull() -> Motion {
        Motion::new(Arc::new(hull_shape()))
    }

    #[test]
    fn test_drive_forward_caps_speed() {
        let mut tank = Tank::new(0, Vec3::zeros(), Weapon::Cannon);
        tank.usercmd.move_dir = Vec2::new(0.0, 1.0);
        let mut motion = hull();
        for _ in 0..100 {
            tank.drive(&mut motion, 0.05);
        }
        assert_relative_eq!(motion.linear_velocity.norm(), MAX_SPEED, epsilon = 1e-4);
        assert!(motion.linear_velocity.x > 0.0);
    }

    #[test]
    fn test_tracks_cancel_sideways_slide() {
        let tank = Tank::new(0, Vec3::zeros(), Weapon::Cannon);
        let mut motion = hull().with_velocity(Vec2::new(0.0, 5.0), 0.0);
        tank.drive(&mut motion, 0.05);
        assert!(motion.linear_velocity.y.abs() < 5.0 * 0.7);
    }

    #[test]
    fn test_turret_slews_at_limited_rate() {
        let mut tank = Tank::new(0, Vec3::zeros(), Weapon::Cannon);
        tank.usercmd.look = Vec2::new(0.0, 1.0);
        tank.aim(0.1);
        assert_relative_eq!(tank.turret_velocity, TURRET_SPEED);
        assert_relative_eq!(tank.turret_rotation, 0.4, epsilon = 1e-6);

        for _ in 0..10 {
            tank.aim(0.1);
        }
        assert_relative_eq!(tank.turret_rotation, HALF_PI, epsilon = 1e-5);
    }

    #[test]
    fn test_refire_delay() {
        let mut tank = Tank::new(0, Vec3::zeros(), Weapon::Blaster);
        tank.usercmd.actions = Actions::ATTACK;
        assert!(tank.can_fire(0.0));
        tank.fire_time = 1.0;
        assert!(!tank.can_fire(1.1));
        assert!(tank.can_fire(1.2));
    }
}
