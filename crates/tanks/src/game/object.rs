//! Game objects
//!
//! An [`Object`] is one record with a type-tagged payload. Its rigid body
//! lives in the world's physics container and is reached through a handle;
//! the object keeps the pose from the previous tick for interpolation.

use arena_engine::foundation::collections::BodyHandle;
use arena_engine::foundation::math::{lerp_angle, lerp_vec, Vec2};
use arena_engine::physics::RigidBody;

use super::projectile::Projectile;
use super::tank::Tank;

/// Network identity of an object; increases with every spawn
pub type SpawnId = u32;

/// Spawn id that terminates a snapshot object list and marks walls
pub const NO_SPAWN_ID: SpawnId = 0;

/// Wire tag of an object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// [`Tank`]
    Tank,
    /// [`Projectile`]
    Projectile,
}

impl ObjectType {
    /// Wire encoding
    pub fn to_byte(self) -> u8 {
        match self {
            ObjectType::Tank => 1,
            ObjectType::Projectile => 2,
        }
    }

    /// Decode from the wire
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ObjectType::Tank),
            2 => Some(ObjectType::Projectile),
            _ => None,
        }
    }
}

/// Type-specific state
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// A player's tank
    Tank(Tank),
    /// A round in flight
    Projectile(Projectile),
}

impl ObjectKind {
    /// Wire tag of this payload
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectKind::Tank(_) => ObjectType::Tank,
            ObjectKind::Projectile(_) => ObjectType::Projectile,
        }
    }
}

/// An entity in the game world
#[derive(Debug, Clone)]
pub struct Object {
    /// Network identity
    pub spawn_id: SpawnId,

    /// Object that created this one (the firing tank of a projectile)
    pub owner: Option<SpawnId>,

    /// Type-specific state
    pub kind: ObjectKind,

    /// Rigid body in the world's physics container
    pub body: BodyHandle,

    /// Position at the previous tick
    pub old_position: Vec2,

    /// Rotation at the previous tick
    pub old_rotation: f32,
}

impl Object {
    /// Wire tag
    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    /// Tank payload, if this is a tank
    pub fn as_tank(&self) -> Option<&Tank> {
        match &self.kind {
            ObjectKind::Tank(tank) => Some(tank),
            ObjectKind::Projectile(_) => None,
        }
    }

    /// Mutable tank payload, if this is a tank
    pub fn as_tank_mut(&mut self) -> Option<&mut Tank> {
        match &mut self.kind {
            ObjectKind::Tank(tank) => Some(tank),
            ObjectKind::Projectile(_) => None,
        }
    }

    /// Projectile payload, if this is a projectile
    pub fn as_projectile(&self) -> Option<&Projectile> {
        match &self.kind {
            ObjectKind::Projectile(projectile) => Some(projectile),
            ObjectKind::Tank(_) => None,
        }
    }

    /// Remember the current pose as the previous-tick pose
    pub fn store_old_pose(&mut self, body: &RigidBody) {
        self.old_position = body.motion.position;
        self.old_rotation = body.motion.rotation;
        if let ObjectKind::Tank(tank) = &mut self.kind {
            tank.old_turret_rotation = tank.turret_rotation;
        }
    }

    /// Pose between the previous and current tick, `lerp` in [0, 1]
    pub fn interpolated_pose(&self, body: &RigidBody, lerp: f32) -> (Vec2, f32) {
        let t = lerp.clamp(0.0, 1.0);
        (
            lerp_vec(self.old_position, body.motion.position, t),
            lerp_angle(self.old_rotation, body.motion.rotation, t),
        )
    }
}
