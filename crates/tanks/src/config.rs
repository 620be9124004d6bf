//! Game configuration
//!
//! Loaded from `tanks.toml` (or the path given with `--config`); every field
//! has a default so a partial file is fine.

use arena_engine::config::{Config, Deserialize, Serialize};
use arena_engine::physics::Material;

use crate::game::Weapon;
use crate::session::protocol::{DEFAULT_PORT, MAX_PLAYERS};

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "tanks.toml";

/// Top-level game configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Server settings
    pub server: ServerConfig,

    /// Client settings
    pub client: ClientConfig,

    /// Physics tuning
    pub physics: PhysicsConfig,
}

impl Config for GameConfig {}

/// Server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name reported to `info` queries
    pub name: String,

    /// UDP port to listen on
    pub port: u16,

    /// Player slots (at most 16)
    pub max_players: usize,

    /// Simulation ticks per second
    pub tick_rate: u32,

    /// Arena width in world units
    pub arena_width: f32,

    /// Arena height in world units
    pub arena_height: f32,

    /// Frags that end a round; 0 disables the limit
    pub frag_limit: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "Tanks Server".to_string(),
            port: DEFAULT_PORT,
            max_players: MAX_PLAYERS,
            tick_rate: 20,
            arena_width: 64.0,
            arena_height: 48.0,
            frag_limit: 10,
        }
    }
}

impl ServerConfig {
    /// Player slots clamped to the protocol limit
    pub fn player_slots(&self) -> usize {
        self.max_players.clamp(1, MAX_PLAYERS)
    }

    /// Seconds per simulation tick
    pub fn tick_duration(&self) -> f64 {
        1.0 / f64::from(self.tick_rate.max(1))
    }
}

/// Client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Player name
    pub name: String,

    /// Weapon selected on join
    pub weapon: Weapon,

    /// Port used when the server address has none
    pub server_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "Player".to_string(),
            weapon: Weapon::Cannon,
            server_port: DEFAULT_PORT,
        }
    }
}

/// Physics tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Tank mass
    pub tank_mass: f32,

    /// Projectile mass
    pub projectile_mass: f32,

    /// Bounciness of every surface
    pub restitution: f32,

    /// Static friction coefficient
    pub contact_friction: f32,

    /// Kinetic friction coefficient
    pub sliding_friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            tank_mass: 10.0,
            projectile_mass: 0.25,
            restitution: 0.4,
            contact_friction: 0.6,
            sliding_friction: 0.4,
        }
    }
}

impl PhysicsConfig {
    /// Surface material built from these settings
    pub fn material(&self) -> Material {
        Material::new(self.restitution, self.contact_friction, self.sliding_friction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = std::env::temp_dir().join(format!("tanks_config_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[server]\nname = \"Arena\"\nmax_players = 40\n\n[client]\nweapon = \"blaster\"\n",
        )
        .unwrap();

        let config = GameConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.name, "Arena");
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.player_slots(), MAX_PLAYERS);
        assert_eq!(config.client.weapon, Weapon::Blaster);
        assert_eq!(config.physics, PhysicsConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("tanks_config_save_{}.ron", std::process::id()));
        let mut config = GameConfig::default();
        config.client.name = "Tester".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = GameConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = GameConfig::load_or_default("/nonexistent/tanks.toml");
        assert_eq!(config, GameConfig::default());
    }
}
