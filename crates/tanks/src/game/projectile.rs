//! Projectiles in flight

use arena_engine::foundation::math::Vec2;
use arena_engine::net::{Message, MessageError};
use arena_engine::physics::{Motion, Shape};

use super::object::SpawnId;
use super::weapon::Weapon;

/// Seconds a projectile lives before it fizzles
pub const LIFETIME: f32 = 5.0;

/// Collision shape for a weapon's rounds
pub fn projectile_shape(weapon: Weapon) -> Shape {
    Shape::Circle {
        radius: weapon.projectile_radius(),
    }
}

/// A fired round
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    /// Weapon that fired it
    pub weapon: Weapon,

    /// Damage dealt on a hit
    pub damage: f32,

    /// World time it was fired
    pub spawn_time: f32,

    /// Player slot of the shooter (server side)
    pub shooter: Option<u8>,
}

impl Projectile {
    /// Create a round for `weapon` fired at `time`
    pub fn new(weapon: Weapon, time: f32, shooter: Option<u8>) -> Self {
        Self {
            weapon,
            damage: weapon.damage(),
            spawn_time: time,
            shooter,
        }
    }

    /// Whether the round has outlived [`LIFETIME`] at `time`
    pub fn expired(&self, time: f32) -> bool {
        time - self.spawn_time >= LIFETIME
    }

    /// Accelerate along the flight direction (missiles only)
    pub fn propel(&self, motion: &mut Motion, delta_time: f32) {
        let acceleration = self.weapon.acceleration();
        if acceleration <= 0.0 {
            return;
        }
        let speed = motion.linear_velocity.norm();
        if speed <= f32::EPSILON {
            return;
        }
        let boosted = (speed + acceleration * delta_time).min(self.weapon.max_speed());
        motion.linear_velocity *= boosted / speed;
    }

    /// Encode the round, its owner and its pose
    pub fn write_snapshot(&self, owner: SpawnId, motion: &Motion, message: &mut Message) -> Result<(), MessageError> {
        message.write_u32(owner)?;
        message.write_f32(self.damage)?;
        message.write_u8(self.weapon.to_byte())?;
        message.write_vec2(motion.position)?;
        message.write_vec2(motion.linear_velocity)
    }

    /// Decode into this round; returns the owner spawn id
    pub fn read_snapshot(&mut self, motion: &mut Motion, message: &mut Message) -> Result<SpawnId, MessageError> {
        let owner = message.read_u32()?;
        self.damage = message.read_f32()?;
        // Unknown weapon bytes fall back to the default; only visuals depend on it
        self.weapon = Weapon::from_byte(message.read_u8()?).unwrap_or_default();
        motion.position = message.read_vec2()?;
        motion.linear_velocity = message.read_vec2()?;
        Ok(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[test]
    fn test_missile_accelerates_to_cap() {
        let round = Projectile::new(Weapon::Missile, 0.0, None);
        let mut motion = Motion::new(Arc::new(projectile_shape(Weapon::Missile)))
            .with_velocity(Vec2::new(0.0, Weapon::Missile.speed()), 0.0);
        round.propel(&mut motion, 0.5);
        assert_relative_eq!(motion.linear_velocity.y, 40.0);
        round.propel(&mut motion, 1.0);
        assert_relative_eq!(motion.linear_velocity.y, Weapon::Missile.max_speed());
        assert_eq!(motion.linear_velocity.x, 0.0);
    }

    #[test]
    fn test_cannon_round_keeps_speed() {
        let round = Projectile::new(Weapon::Cannon, 0.0, Some(1));
        let mut motion = Motion::new(Arc::new(projectile_shape(Weapon::Cannon)))
            .with_velocity(Vec2::new(3.0, 4.0), 0.0);
        round.propel(&mut motion, 1.0);
        assert_eq!(motion.linear_velocity, Vec2::new(3.0, 4.0));
        assert!(!round.expired(4.9));
        assert!(round.expired(LIFETIME));
    }
}
