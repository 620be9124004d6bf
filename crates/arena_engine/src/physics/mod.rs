//! Physics module for collision detection and response
//!
//! Provides exact narrow-phase queries between convex shapes, continuous
//! sweeps for time of impact, and an impulse-based world stepper that leaves
//! gameplay decisions to a [`ContactListener`].

pub mod bounds;
pub mod collide;
pub mod material;
pub mod motion;
pub mod rigid_body;
pub mod shape;
pub mod trace;
pub mod world;

pub use bounds::Bounds;
pub use collide::{closest, collide, normal_velocity, Collision, Contact};
pub use material::Material;
pub use motion::Motion;
pub use rigid_body::RigidBody;
pub use shape::{ConvexPolygon, MassProperties, Shape, ShapeError};
pub use trace::{trace_bodies, trace_point, TraceResult};
pub use world::{AcceptAll, ContactListener, PhysicsWorld};
