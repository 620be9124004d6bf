//! Surface materials
//!
//! A material is shared read-only by every body made of it.

use serde::{Deserialize, Serialize};

/// Surface response coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Coefficient of restitution (0 = inelastic, 1 = perfectly elastic)
    pub restitution: f32,

    /// Static friction coefficient while the contact is sticking
    pub contact_friction: f32,

    /// Kinetic friction coefficient once the contact slides
    pub sliding_friction: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: 0.5,
            contact_friction: 0.5,
            sliding_friction: 0.3,
        }
    }
}

impl Material {
    /// Create a material from its coefficients
    pub fn new(restitution: f32, contact_friction: f32, sliding_friction: f32) -> Self {
        Self {
            restitution,
            contact_friction,
            sliding_friction,
        }
    }

    /// Perfectly elastic and frictionless
    pub fn elastic() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    /// Coefficients for a contact between two materials
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            restitution: self.restitution * other.restitution,
            contact_friction: (self.contact_friction * other.contact_friction).sqrt(),
            sliding_friction: (self.sliding_friction * other.sliding_friction).sqrt(),
        }
    }
}
