//! # Arena Engine
//!
//! Game-agnostic core for small networked 2D arena games.
//!
//! ## Features
//!
//! - **Collision**: GJK distance and EPA penetration between convex shapes
//! - **Continuous sweeps**: time of impact for points and rigid bodies
//! - **Rigid bodies**: impulse response with restitution and friction
//! - **Networking**: checked message codec, channels and UDP sockets
//! - **Configuration**: TOML/RON settings files
//!
//! ## Quick Start
//!
//! ```rust
//! use arena_engine::prelude::*;
//! use std::sync::Arc;
//!
//! let shape = Arc::new(Shape::circle(1.0).unwrap());
//! let material = Arc::new(Material::elastic());
//!
//! let mut world = PhysicsWorld::new();
//! let ball = world.add(
//!     RigidBody::new_dynamic(shape, 1.0, material).with_velocity(Vec2::new(1.0, 0.0), 0.0),
//! );
//! world.step(0.05, &mut AcceptAll);
//! assert!(world.get(ball).unwrap().motion.position.x > 0.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod net;
pub mod physics;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        foundation::{
            collections::BodyHandle,
            math::{Transform2, Vec2},
            time::{Clock, TickAccumulator},
        },
        net::{Address, Channel, Message, MessageError, NetError, PacketSocket},
        physics::{
            AcceptAll, Contact, ContactListener, Material, Motion, PhysicsWorld, RigidBody, Shape,
            TraceResult,
        },
    };
}
