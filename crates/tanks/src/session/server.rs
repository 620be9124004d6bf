//! Authoritative server
//!
//! One socket serves every player. Connectionless commands handle discovery
//! and joining; after that each player talks through a [`Channel`] keyed by
//! its address and netport. Every tick the server applies the latest input,
//! steps the world and sends each player a full snapshot.

use arena_engine::foundation::math::constants::TAU;
use arena_engine::foundation::math::Vec3;
use arena_engine::foundation::time::TickAccumulator;
use arena_engine::net::{read_header, Address, Channel, Message, MessageError, PacketSocket};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::player::{PlayerInfo, ServerPlayer};
use super::protocol::{read_connectionless, write_connectionless, ClientOp, Request, Response, ServerOp, PROTOCOL_VERSION};
use crate::config::GameConfig;
use crate::game::tank::RESPAWN_DELAY;
use crate::game::{write_snapshot, Kill, UserCmd, Weapon, World, WorldSettings};

/// Colors handed out by slot
const PALETTE: [[f32; 3]; 8] = [
    [0.85, 0.25, 0.2],
    [0.25, 0.45, 0.9],
    [0.3, 0.75, 0.3],
    [0.9, 0.8, 0.2],
    [0.7, 0.35, 0.85],
    [0.2, 0.8, 0.8],
    [0.95, 0.55, 0.15],
    [0.85, 0.85, 0.85],
];

/// Longest chat line relayed
const MAX_SAY_LENGTH: usize = 120;

fn slot_color(index: usize) -> Vec3 {
    let [r, g, b] = PALETTE[index % PALETTE.len()];
    Vec3::new(r, g, b)
}

/// The authoritative game server
pub struct Server {
    name: String,
    frag_limit: i32,
    socket: Box<dyn PacketSocket>,
    world: World,
    players: Vec<Option<ServerPlayer>>,
    ticks: TickAccumulator,
    rng: StdRng,
    packet: Message,
}

impl Server {
    /// Create a server answering on `socket`
    pub fn new(config: &GameConfig, socket: Box<dyn PacketSocket>, now: f64) -> Self {
        let server = &config.server;
        let settings = WorldSettings::from_config(server, &config.physics);
        log::info!(
            "Server '{}' on {} ({} slots, {} Hz)",
            server.name,
            socket.local_address(),
            server.player_slots(),
            server.tick_rate
        );
        Self {
            name: server.name.clone(),
            frag_limit: server.frag_limit,
            socket,
            world: World::new(settings),
            players: (0..server.player_slots()).map(|_| None).collect(),
            ticks: TickAccumulator::new(server.tick_duration(), now),
            rng: StdRng::from_entropy(),
            packet: Message::new(),
        }
    }

    /// Use a fixed random seed (spawn points)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Address the socket is bound to
    pub fn local_address(&self) -> Address {
        self.socket.local_address()
    }

    /// The authoritative world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Connected player in `index`
    pub fn player(&self, index: usize) -> Option<&ServerPlayer> {
        self.players.get(index).and_then(Option::as_ref)
    }

    /// Connected players
    pub fn players(&self) -> impl Iterator<Item = &ServerPlayer> {
        self.players.iter().flatten()
    }

    /// Number of connected players
    pub fn player_count(&self) -> usize {
        self.players().count()
    }

    /// Player slots
    pub fn max_players(&self) -> usize {
        self.players.len()
    }

    /// Run one frame: drain packets, tick, then send
    pub fn frame(&mut self, now: f64) {
        self.read_packets(now);
        self.update(now);
        self.flush(now);
    }

    /// Drain every pending datagram
    pub fn read_packets(&mut self, now: f64) {
        let mut packet = std::mem::take(&mut self.packet);
        while let Some(from) = self.socket.read(&mut packet) {
            match read_header(&mut packet) {
                Ok(Some(netport)) => self.channel_packet(from, netport, &mut packet, now),
                Ok(None) => self.connectionless_packet(from, &mut packet, now),
                Err(error) => log::warn!("Bad packet from {}: {}", from, error),
            }
        }
        self.packet = packet;
    }

    /// Drop silent players and run every tick that is due
    pub fn update(&mut self, now: f64) {
        self.check_timeouts(now);
        let due = self.ticks.advance(now);
        let delta_time = self.ticks.tick_duration() as f32;
        for _ in 0..due {
            self.tick(delta_time);
        }
    }

    /// Send everything queued on the channels
    pub fn flush(&mut self, now: f64) {
        for player in self.players.iter_mut().flatten() {
            if let Err(error) = player.channel.transmit(self.socket.as_mut(), now) {
                log::warn!("Failed to send to {}: {}", player.info.name, error);
            }
        }
    }

    // Connectionless

    fn connectionless_packet(&mut self, from: Address, packet: &mut Message, now: f64) {
        let request = match read_connectionless(packet).map(|line| Request::parse(&line)) {
            Ok(Ok(request)) => request,
            Ok(Err(error)) => {
                log::warn!("Ignoring command from {}: {}", from, error);
                return;
            }
            Err(error) => {
                log::warn!("Unreadable command from {}: {}", from, error);
                return;
            }
        };

        match request {
            Request::Info => {
                let response = Response::Info {
                    name: self.name.clone(),
                    players: self.player_count(),
                    max_players: self.max_players(),
                    version: PROTOCOL_VERSION,
                };
                self.reply(from, &response);
            }
            Request::Connect { version, name, netport } => self.connect(from, version, &name, netport, now),
        }
    }

    fn reply(&mut self, to: Address, response: &Response) {
        let mut message = Message::new();
        match write_connectionless(&mut message, response) {
            Ok(()) => {
                self.socket.write(to, message.as_bytes());
            }
            Err(error) => log::warn!("Failed to encode reply to {}: {}", to, error),
        }
    }

    fn reject(&mut self, to: Address, reason: &str) {
        log::info!("Rejected {}: {}", to, reason);
        self.reply(
            to,
            &Response::Fail {
                reason: reason.to_string(),
            },
        );
    }

    fn find_player(&self, address: Address, netport: u16) -> Option<usize> {
        self.players.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|p| p.channel.address() == address && p.channel.netport() == netport)
        })
    }

    fn connect(&mut self, from: Address, version: u32, name: &str, netport: u16, now: f64) {
        if version != PROTOCOL_VERSION {
            self.reject(from, "Bad protocol version");
            return;
        }

        // A repeated request means our acknowledgement was lost
        if let Some(index) = self.find_player(from, netport) {
            self.acknowledge(from, index);
            return;
        }

        let Some(index) = self.players.iter().position(Option::is_none) else {
            self.reject(from, "Server is full");
            return;
        };

        let name = if name.trim().is_empty() { "Player" } else { name.trim() };
        let info = PlayerInfo {
            index: index as u8,
            active: true,
            name: name.to_owned(),
            color: slot_color(index),
            weapon: Weapon::default(),
        };
        let mut player = ServerPlayer::new(info, Channel::new(from, netport, now));
        player.respawn_time = Some(self.world.time());
        log::info!("{} connected from {} as player {}", name, from, index);

        // The newcomer learns about everyone already here
        for other in self.players.iter().flatten() {
            let message = player.channel.message_mut();
            if let Err(error) = write_info(message, &other.info).and_then(|()| write_score(message, &other.info, other.score)) {
                log::warn!("Failed to queue player list: {}", error);
            }
        }
        self.players[index] = Some(player);
        self.acknowledge(from, index);

        if let Some(info) = self.player(index).map(|p| p.info.clone()) {
            self.broadcast(|message| write_info(message, &info));
        }
        self.broadcast_message(&format!("{name} entered the game"));
    }

    fn acknowledge(&mut self, to: Address, index: usize) {
        let response = Response::Connect {
            client_index: index as u8,
            time: self.world.time(),
        };
        self.reply(to, &response);
    }

    // Channel traffic

    fn channel_packet(&mut self, from: Address, netport: u16, packet: &mut Message, now: f64) {
        let Some(index) = self.find_player(from, netport) else {
            log::debug!("Channel packet from unknown peer {} ({})", from, netport);
            return;
        };
        if let Some(player) = self.players[index].as_mut() {
            player.channel.process(now);
        }

        while packet.remaining() > 0 {
            if let Err(error) = self.client_op(index, packet) {
                log::warn!("Malformed packet from player {}: {}", index, error);
                return;
            }
            if self.players[index].is_none() {
                return;
            }
        }
    }

    fn client_op(&mut self, index: usize, packet: &mut Message) -> Result<(), MessageError> {
        let byte = packet.read_u8()?;
        let Some(op) = ClientOp::from_byte(byte) else {
            log::warn!("Unknown opcode {} from player {}", byte, index);
            // Nothing after an unknown op can be decoded
            packet.read_bytes(packet.remaining())?;
            return Ok(());
        };

        match op {
            ClientOp::Command => {
                let usercmd = UserCmd::read(packet)?;
                if let Some(player) = self.players[index].as_mut() {
                    player.usercmd = usercmd;
                }
            }
            ClientOp::Disconnect => self.drop_player(index, "left the game"),
            ClientOp::Say => {
                let text: String = packet.read_string()?.chars().take(MAX_SAY_LENGTH).collect();
                if let Some(name) = self.player(index).map(|p| p.info.name.clone()) {
                    log::info!("{}: {}", name, text);
                    self.broadcast_message(&format!("{name}: {text}"));
                }
            }
            ClientOp::Upgrade => {
                let byte = packet.read_u8()?;
                match Weapon::from_byte(byte) {
                    Some(weapon) => self.upgrade(index, weapon),
                    None => log::warn!("Player {} asked for unknown weapon {}", index, byte),
                }
            }
        }
        Ok(())
    }

    fn upgrade(&mut self, index: usize, weapon: Weapon) {
        let Some(player) = self.players[index].as_mut() else {
            return;
        };
        player.info.weapon = weapon;
        let info = player.info.clone();
        if let Some(tank) = player.tank.and_then(|id| self.world.object_mut(id)).and_then(|o| o.as_tank_mut()) {
            tank.weapon = weapon;
        }
        log::debug!("Player {} switched to {:?}", index, weapon);
        self.broadcast(|message| write_info(message, &info));
    }

    /// Disconnect a player, telling them and everyone else
    pub fn drop_player(&mut self, index: usize, reason: &str) {
        let Some(mut player) = self.players.get_mut(index).and_then(Option::take) else {
            return;
        };
        log::info!("{} {}", player.info.name, reason);

        if let Some(tank) = player.tank {
            self.world.remove(tank);
        }
        let message = player.channel.message_mut();
        message.clear();
        if message.write_u8(ServerOp::Disconnect as u8).is_ok() {
            let _ = player.channel.transmit(self.socket.as_mut(), 0.0);
        }

        let info = PlayerInfo::inactive(index as u8);
        self.broadcast(|message| write_info(message, &info));
        self.broadcast_message(&format!("{} {}", player.info.name, reason));
    }

    /// Disconnect everyone before going away
    pub fn shutdown(&mut self) {
        for index in 0..self.players.len() {
            self.drop_player(index, "server shut down");
        }
    }

    fn check_timeouts(&mut self, now: f64) {
        let silent: Vec<usize> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(|p| p.channel.timed_out(now)))
            .map(|(index, _)| index)
            .collect();
        for index in silent {
            self.drop_player(index, "timed out");
        }
    }

    fn broadcast<F>(&mut self, mut write: F)
    where
        F: FnMut(&mut Message) -> Result<(), MessageError>,
    {
        for player in self.players.iter_mut().flatten() {
            let message = player.channel.message_mut();
            let mark = message.len();
            if let Err(error) = write(message) {
                // Drop the partial op
                message.truncate(mark);
                log::warn!("Failed to queue message for {}: {}", player.info.name, error);
            }
        }
    }

    /// Send a chat line or notice to every player
    pub fn broadcast_message(&mut self, text: &str) {
        self.broadcast(|message| {
            message.write_u8(ServerOp::Message as u8)?;
            message.write_string(text)
        });
    }

    // Simulation

    fn tick(&mut self, delta_time: f32) {
        self.spawn_players();
        for player in self.players.iter().flatten() {
            if let Some(tank) = player.tank {
                self.world.set_usercmd(tank, player.usercmd);
            }
        }

        self.world.run_frame(delta_time);

        for kill in self.world.take_kills() {
            self.score_kill(kill);
        }

        let leader = self.players().map(|p| p.score).max().unwrap_or(0);
        if self.frag_limit > 0 && leader >= self.frag_limit {
            self.broadcast_message("Frag limit reached");
            self.restart();
            return;
        }

        self.send_snapshots();
    }

    fn spawn_players(&mut self) {
        let time = self.world.time();
        for index in 0..self.players.len() {
            let due = self.players[index]
                .as_ref()
                .is_some_and(|p| p.tank.is_none() && p.respawn_time.is_some_and(|t| time >= t));
            if !due {
                continue;
            }
            let position = self.world.find_spawn_point(&mut self.rng);
            let rotation = self.rng.gen_range(0.0..TAU);
            if let Some(player) = self.players[index].as_mut() {
                let info = &player.info;
                let tank = self.world.spawn_tank(info.index, info.color, info.weapon, position, rotation);
                player.tank = Some(tank);
                player.respawn_time = None;
                log::debug!("Player {} spawned at ({:.1}, {:.1})", index, position.x, position.y);
            }
        }
    }

    fn score_kill(&mut self, kill: Kill) {
        let victim = usize::from(kill.victim);
        let respawn_time = self.world.time() + RESPAWN_DELAY;
        let Some(victim_name) = self.players.get_mut(victim).and_then(Option::as_mut).map(|p| {
            p.tank = None;
            p.respawn_time = Some(respawn_time);
            p.info.name.clone()
        }) else {
            return;
        };

        let credit = match kill.killer.map(usize::from) {
            Some(killer) if killer == victim => Some((victim, -1, format!("{victim_name} self-destructed"))),
            Some(killer) => self
                .player(killer)
                .map(|p| (killer, 1, format!("{} destroyed {}", p.info.name, victim_name))),
            None => None,
        };
        let Some((scorer, delta, notice)) = credit else {
            self.broadcast_message(&format!("{victim_name} was destroyed"));
            return;
        };

        if let Some(player) = self.players[scorer].as_mut() {
            player.score += delta;
            let (info, score) = (player.info.clone(), player.score);
            self.broadcast(|message| write_score(message, &info, score));
        }
        self.broadcast_message(&notice);
    }

    /// Start a new round: clear the world and every score
    pub fn restart(&mut self) {
        log::info!("Restarting round");
        self.world.reset();
        for player in self.players.iter_mut().flatten() {
            player.tank = None;
            player.respawn_time = Some(0.0);
            player.score = 0;
            player.usercmd = UserCmd::idle();
        }
        self.broadcast(|message| message.write_u8(ServerOp::Restart as u8));
        let scores: Vec<(PlayerInfo, i32)> = self.players().map(|p| (p.info.clone(), p.score)).collect();
        for (info, score) in scores {
            self.broadcast(|message| write_score(message, &info, score));
        }
    }

    fn send_snapshots(&mut self) {
        let mut snapshot = Message::new();
        if let Err(error) = write_snapshot(&self.world, &mut snapshot) {
            log::warn!("Failed to encode snapshot: {}", error);
            return;
        }
        log::trace!("Snapshot {} is {} bytes", self.world.frame(), snapshot.len());
        self.broadcast(|message| {
            message.write_u8(ServerOp::Snapshot as u8)?;
            message.write_bytes(snapshot.as_bytes())
        });
    }
}

fn write_info(message: &mut Message, info: &PlayerInfo) -> Result<(), MessageError> {
    message.write_u8(ServerOp::Info as u8)?;
    info.write(message)
}

fn write_score(message: &mut Message, info: &PlayerInfo, score: i32) -> Result<(), MessageError> {
    message.write_u8(ServerOp::Score as u8)?;
    message.write_u8(info.index)?;
    message.write_i32(score)
}
