//! Networked game session
//!
//! A [`Session`] owns a server, a client, or both (listen server) and runs
//! them through one frame loop: drain packets, tick, render, flush.

pub mod client;
pub mod player;
pub mod protocol;
pub mod resolver;
pub mod server;

#[cfg(test)]
mod tests;

use std::thread;
use std::time::Duration;

use arena_engine::foundation::time::Clock;
use arena_engine::net::{Address, NetError, PacketSocket, UdpSocket};
use thiserror::Error;

pub use client::{Client, ClientState};
pub use player::{PlayerInfo, ServerPlayer};
pub use protocol::{ClientOp, Request, Response, ServerOp, DEFAULT_PORT, MAX_PLAYERS, PROTOCOL_VERSION};
pub use resolver::Resolver;
pub use server::Server;

use crate::collaborators::{LogSoundSystem, NullRenderer, Renderer, SoundBank, SoundSystem};
use crate::config::GameConfig;

/// Pause between frames of [`Session::run`]
const FRAME_SLEEP: Duration = Duration::from_millis(1);

/// Failures that prevent a session from starting
#[derive(Debug, Error)]
pub enum SessionError {
    /// Socket could not be opened
    #[error(transparent)]
    Net(#[from] NetError),

    /// Settings that cannot run a game
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn validate(config: &GameConfig) -> Result<(), SessionError> {
    let server = &config.server;
    if server.tick_rate == 0 {
        return Err(SessionError::Config("tick_rate must be positive".to_string()));
    }
    if server.max_players == 0 {
        return Err(SessionError::Config("max_players must be positive".to_string()));
    }
    if !(server.arena_width > 0.0 && server.arena_height > 0.0) {
        return Err(SessionError::Config("arena size must be positive".to_string()));
    }
    let physics = &config.physics;
    if !(physics.tank_mass > 0.0 && physics.projectile_mass > 0.0) {
        return Err(SessionError::Config("masses must be positive".to_string()));
    }
    Ok(())
}

/// A running game: server, client, or both
pub struct Session {
    server: Option<Server>,
    client: Option<Client>,
    renderer: Box<dyn Renderer>,
    sounds: Box<dyn SoundSystem>,
    sound_bank: SoundBank,
    clock: Clock,
}

impl Session {
    /// Assemble a session from its parts
    pub fn new(
        server: Option<Server>,
        client: Option<Client>,
        renderer: Box<dyn Renderer>,
        mut sounds: Box<dyn SoundSystem>,
    ) -> Self {
        let sound_bank = SoundBank::load(sounds.as_mut());
        Self {
            server,
            client,
            renderer,
            sounds,
            sound_bank,
            clock: Clock::new(),
        }
    }

    /// Server only, listening on the configured port
    pub fn dedicated(config: &GameConfig) -> Result<Self, SessionError> {
        validate(config)?;
        let socket = UdpSocket::open(config.server.port)?;
        let server = Server::new(config, Box::new(socket), 0.0);
        Ok(Self::new(
            Some(server),
            None,
            Box::new(NullRenderer),
            Box::new(LogSoundSystem::default()),
        ))
    }

    /// Client only, joining `host`
    pub fn connect(config: &GameConfig, host: &str) -> Result<Self, SessionError> {
        validate(config)?;
        let socket = UdpSocket::open(0)?;
        let mut client = Client::new(config, Box::new(socket), 0.0);
        client.connect(host, 0.0);
        Ok(Self::new(
            None,
            Some(client),
            Box::new(NullRenderer),
            Box::new(LogSoundSystem::default()),
        ))
    }

    /// Server plus a local client joined to it
    pub fn listen(config: &GameConfig) -> Result<Self, SessionError> {
        validate(config)?;
        let server_socket = UdpSocket::open(config.server.port)?;
        let port = server_socket.local_address().port();
        let server = Server::new(config, Box::new(server_socket), 0.0);

        let mut client = Client::new(config, Box::new(UdpSocket::open(0)?), 0.0);
        client.connect_to(Address::loopback(port), 0.0);
        Ok(Self::new(
            Some(server),
            Some(client),
            Box::new(NullRenderer),
            Box::new(LogSoundSystem::default()),
        ))
    }

    /// The server, if this session hosts one
    pub fn server(&self) -> Option<&Server> {
        self.server.as_ref()
    }

    /// The server, mutably
    pub fn server_mut(&mut self) -> Option<&mut Server> {
        self.server.as_mut()
    }

    /// The client, if this session plays
    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    /// The client, mutably
    pub fn client_mut(&mut self) -> Option<&mut Client> {
        self.client.as_mut()
    }

    /// Run one frame at wall-clock time `now`
    pub fn frame(&mut self, now: f64) {
        if let Some(server) = self.server.as_mut() {
            server.read_packets(now);
        }
        if let Some(client) = self.client.as_mut() {
            client.read_packets(now);
        }

        if let Some(server) = self.server.as_mut() {
            server.update(now);
        }
        if let Some(client) = self.client.as_mut() {
            client.update(now);
            client.draw(self.renderer.as_mut());
            client.play_events(&self.sound_bank, self.sounds.as_mut(), self.renderer.as_mut());
        }

        if let Some(server) = self.server.as_mut() {
            server.flush(now);
        }
        if let Some(client) = self.client.as_mut() {
            client.flush(now);
        }
    }

    /// Whether a client-only session has lost its server
    pub fn is_finished(&self) -> bool {
        self.server.is_none()
            && self
                .client
                .as_ref()
                .map_or(true, |c| c.state() == ClientState::Disconnected)
    }

    /// Run frames until `duration` seconds pass or the session ends
    pub fn run(&mut self, duration: Option<f64>) {
        loop {
            let now = self.clock.now();
            self.frame(now);
            if duration.is_some_and(|limit| now >= limit) || self.is_finished() {
                break;
            }
            thread::sleep(FRAME_SLEEP);
        }

        let now = self.clock.now();
        if let Some(client) = self.client.as_mut() {
            client.disconnect(now);
        }
        if let Some(server) = self.server.as_mut() {
            server.shutdown();
        }
        log::info!("Session ended after {:.1}s", now);
    }
}
