//! Weapon types and their ballistics

use serde::{Deserialize, Serialize};

/// Weapon a tank fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weapon {
    /// Slow-firing heavy shell
    #[default]
    Cannon,

    /// Self-propelled round that speeds up in flight
    Missile,

    /// Rapid low-damage bolts
    Blaster,
}

impl Weapon {
    /// Every weapon in wire order
    pub const ALL: [Weapon; 3] = [Weapon::Cannon, Weapon::Missile, Weapon::Blaster];

    /// Wire encoding
    pub fn to_byte(self) -> u8 {
        match self {
            Weapon::Cannon => 0,
            Weapon::Missile => 1,
            Weapon::Blaster => 2,
        }
    }

    /// Decode from the wire
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(usize::from(byte)).copied()
    }

    /// Muzzle speed in units per second
    pub fn speed(self) -> f32 {
        match self {
            Weapon::Cannon => 40.0,
            Weapon::Missile => 16.0,
            Weapon::Blaster => 64.0,
        }
    }

    /// Speed a missile accelerates toward; equal to the muzzle speed otherwise
    pub fn max_speed(self) -> f32 {
        match self {
            Weapon::Missile => 56.0,
            other => other.speed(),
        }
    }

    /// Acceleration along the flight direction
    pub fn acceleration(self) -> f32 {
        match self {
            Weapon::Missile => 48.0,
            _ => 0.0,
        }
    }

    /// Damage dealt on a hit, where 1.0 destroys a tank
    pub fn damage(self) -> f32 {
        match self {
            Weapon::Cannon => 0.35,
            Weapon::Missile => 0.6,
            Weapon::Blaster => 0.1,
        }
    }

    /// Seconds between shots
    pub fn refire_delay(self) -> f32 {
        match self {
            Weapon::Cannon => 1.0,
            Weapon::Missile => 1.5,
            Weapon::Blaster => 0.15,
        }
    }

    /// Radius of the projectile body
    pub fn projectile_radius(self) -> f32 {
        match self {
            Weapon::Cannon => 0.2,
            Weapon::Missile => 0.25,
            Weapon::Blaster => 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_encoding() {
        for weapon in Weapon::ALL {
            assert_eq!(Weapon::from_byte(weapon.to_byte()), Some(weapon));
        }
        assert_eq!(Weapon::from_byte(3), None);
    }

    #[test]
    fn test_missile_is_the_only_accelerating_round() {
        assert!(Weapon::Missile.max_speed() > Weapon::Missile.speed());
        assert_eq!(Weapon::Cannon.acceleration(), 0.0);
        assert_eq!(Weapon::Blaster.max_speed(), Weapon::Blaster.speed());
    }
}
