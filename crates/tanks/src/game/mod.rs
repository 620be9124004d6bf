//! Game simulation
//!
//! Everything here runs identically on server and client: the client world
//! is only ever written by [`snapshot::read_snapshot`], the server world by
//! [`World::run_frame`].

pub mod event;
pub mod object;
pub mod projectile;
pub mod snapshot;
pub mod tank;
pub mod usercmd;
pub mod weapon;
pub mod world;

pub use event::{EffectEvent, EffectKind, GameEvent, Sound, SoundEvent};
pub use object::{Object, ObjectKind, ObjectType, SpawnId, NO_SPAWN_ID};
pub use projectile::Projectile;
pub use snapshot::{read_snapshot, write_snapshot, SnapshotError, SnapshotFrame};
pub use tank::Tank;
pub use usercmd::{Actions, UserCmd};
pub use weapon::Weapon;
pub use world::{Kill, World, WorldSettings};
