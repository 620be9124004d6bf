//! # Tanks
//!
//! Server-authoritative 2D tank arena on top of `arena_engine`.
//!
//! - [`game`]: tanks, projectiles, the simulated world and its snapshot codec
//! - [`session`]: the connectionless handshake, server, client and frame loop
//! - [`collaborators`]: renderer and sound seams the session drives
//! - [`config`]: `tanks.toml` settings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tanks::config::GameConfig;
//! use tanks::session::Session;
//!
//! let config = GameConfig::default();
//! let mut session = Session::listen(&config).expect("ports available");
//! session.run(Some(30.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod collaborators;
pub mod config;
pub mod game;
pub mod session;
