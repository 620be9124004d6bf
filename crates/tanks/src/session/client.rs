//! Game client
//!
//! The client never simulates: its world is overwritten by every snapshot
//! and only interpolated for drawing. Input goes out once per server tick.

use std::collections::VecDeque;

use arena_engine::foundation::math::{lerp_angle, Vec2, Vec3};
use arena_engine::foundation::time::TickAccumulator;
use arena_engine::net::{generate_netport, read_header, Address, Channel, Message, MessageError, PacketSocket};

use super::player::PlayerInfo;
use super::protocol::{
    read_connectionless, write_connectionless, ClientOp, Request, Response, ServerOp, MAX_PLAYERS, PROTOCOL_VERSION,
};
use super::resolver::Resolver;
use crate::collaborators::{Model, Renderer, SoundBank, SoundSystem};
use crate::config::GameConfig;
use crate::game::{read_snapshot, GameEvent, ObjectKind, Tank, UserCmd, Weapon, World, WorldSettings};

/// Seconds between connect attempts
const CONNECT_RETRY: f64 = 1.0;

/// Connect attempts before giving up
const CONNECT_ATTEMPTS: u32 = 5;

/// Weight of each snapshot in the world time estimate
const WORLDTIME_SMOOTHING: f32 = 0.1;

/// Chat and notice lines kept
const MAX_MESSAGES: usize = 32;

/// Chat lines drawn on screen
const VISIBLE_MESSAGES: usize = 5;

fn text_color() -> Vec3 {
    Vec3::new(1.0, 1.0, 1.0)
}

/// Connection progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected
    Disconnected,
    /// Waiting for the server name to resolve
    Resolving,
    /// Connect request sent
    AwaitingAck,
    /// Receiving snapshots
    Connected,
}

/// A player's view of a remote game
pub struct Client {
    name: String,
    weapon: Weapon,
    server_port: u16,
    socket: Box<dyn PacketSocket>,
    state: ClientState,
    resolver: Option<Resolver>,
    server: Option<Address>,
    netport: u16,
    channel: Option<Channel>,
    connect_time: f64,
    connect_attempts: u32,
    index: Option<u8>,
    players: Vec<PlayerInfo>,
    scores: Vec<i32>,
    world: World,
    tick_duration: f32,
    commands: TickAccumulator,
    worldtime: Option<f32>,
    last_frame: f64,
    usercmd: UserCmd,
    predicted_turret: Option<f32>,
    events: Vec<GameEvent>,
    messages: VecDeque<String>,
    server_info: Option<Response>,
    packet: Message,
}

impl Client {
    /// Create a disconnected client sending from `socket`
    pub fn new(config: &GameConfig, socket: Box<dyn PacketSocket>, now: f64) -> Self {
        let tick_duration = config.server.tick_duration();
        Self {
            name: config.client.name.clone(),
            weapon: config.client.weapon,
            server_port: config.client.server_port,
            socket,
            state: ClientState::Disconnected,
            resolver: None,
            server: None,
            netport: generate_netport(),
            channel: None,
            connect_time: now,
            connect_attempts: 0,
            index: None,
            players: (0..MAX_PLAYERS).map(|i| PlayerInfo::inactive(i as u8)).collect(),
            scores: vec![0; MAX_PLAYERS],
            world: World::new(WorldSettings::from_config(&config.server, &config.physics)),
            tick_duration: tick_duration as f32,
            commands: TickAccumulator::new(tick_duration, now).with_max_ticks_per_frame(1),
            worldtime: None,
            last_frame: now,
            usercmd: UserCmd::idle(),
            predicted_turret: None,
            events: Vec::new(),
            messages: VecDeque::new(),
            server_info: None,
            packet: Message::new(),
        }
    }

    /// Connection progress
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Slot assigned by the server
    pub fn index(&self) -> Option<u8> {
        self.index
    }

    /// Local copy of the server world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Every slot as last described by the server
    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    /// Score of a slot
    pub fn score(&self, index: usize) -> i32 {
        self.scores.get(index).copied().unwrap_or(0)
    }

    /// Recent chat and notice lines, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    /// Smoothed estimate of the server time being displayed
    pub fn worldtime(&self) -> Option<f32> {
        self.worldtime
    }

    /// Last `info` answer received
    pub fn server_info(&self) -> Option<&Response> {
        self.server_info.as_ref()
    }

    /// Address of the server, once known
    pub fn server_address(&self) -> Option<Address> {
        self.server
    }

    fn notice(&mut self, text: String) {
        log::info!("{}", text);
        if self.messages.len() == MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(text);
    }

    // Connecting

    /// Resolve `host` in the background, then connect
    pub fn connect(&mut self, host: &str, now: f64) {
        self.reset_connection();
        self.resolver = Some(Resolver::spawn(host, self.server_port));
        self.state = ClientState::Resolving;
        self.connect_time = now;
    }

    /// Connect to a known address
    pub fn connect_to(&mut self, address: Address, now: f64) {
        self.reset_connection();
        self.server = Some(address);
        self.state = ClientState::AwaitingAck;
        self.notice(format!("Connecting to {address}..."));
        self.send_connect(now);
    }

    fn send_connect(&mut self, now: f64) {
        let Some(server) = self.server else {
            return;
        };
        let request = Request::Connect {
            version: PROTOCOL_VERSION,
            name: self.name.clone(),
            netport: self.netport,
        };
        self.send_connectionless(server, &request);
        self.connect_time = now;
        self.connect_attempts += 1;
    }

    fn send_connectionless(&mut self, to: Address, request: &Request) {
        let mut message = Message::new();
        match write_connectionless(&mut message, request) {
            Ok(()) => {
                self.socket.write(to, message.as_bytes());
            }
            Err(error) => log::warn!("Failed to encode request: {}", error),
        }
    }

    /// Ask a server for its name and player count
    pub fn request_info(&mut self, address: Address) {
        self.send_connectionless(address, &Request::Info);
    }

    /// Leave the game
    pub fn disconnect(&mut self, now: f64) {
        if let Some(mut channel) = self.channel.take() {
            channel.message_mut().clear();
            if channel.message_mut().write_u8(ClientOp::Disconnect as u8).is_ok() {
                let _ = channel.transmit(self.socket.as_mut(), now);
            }
            self.notice("Disconnected".to_string());
        }
        self.reset_connection();
    }

    fn reset_connection(&mut self) {
        self.state = ClientState::Disconnected;
        self.resolver = None;
        self.channel = None;
        self.index = None;
        self.connect_attempts = 0;
        self.worldtime = None;
        self.predicted_turret = None;
        self.world.reset();
        for (i, info) in self.players.iter_mut().enumerate() {
            *info = PlayerInfo::inactive(i as u8);
        }
        self.scores.fill(0);
    }

    fn drop_connection(&mut self, reason: &str) {
        self.notice(reason.to_string());
        self.reset_connection();
    }

    // Input

    /// Input sent with the next command
    pub fn set_usercmd(&mut self, usercmd: UserCmd) {
        self.usercmd = usercmd;
    }

    /// Send a chat line
    pub fn say(&mut self, text: &str) {
        self.queue(|message| {
            message.write_u8(ClientOp::Say as u8)?;
            message.write_string(text)
        });
    }

    /// Ask for a different weapon
    pub fn upgrade(&mut self, weapon: Weapon) {
        self.weapon = weapon;
        self.queue(|message| {
            message.write_u8(ClientOp::Upgrade as u8)?;
            message.write_u8(weapon.to_byte())
        });
    }

    fn queue<F>(&mut self, write: F)
    where
        F: FnOnce(&mut Message) -> Result<(), MessageError>,
    {
        if let Some(channel) = self.channel.as_mut() {
            let message = channel.message_mut();
            let mark = message.len();
            if let Err(error) = write(message) {
                message.truncate(mark);
                log::warn!("Failed to queue message: {}", error);
            }
        }
    }

    // Frame

    /// Run one frame: drain packets, advance, then send
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
                Ok(Some(_)) if Some(from) == self.server => self.channel_packet(&mut packet, now),
                Ok(Some(_)) => log::debug!("Channel packet from stranger {}", from),
                Ok(None) => self.connectionless_packet(from, &mut packet, now),
                Err(error) => log::warn!("Bad packet from {}: {}", from, error),
            }
        }
        self.packet = packet;
    }

    fn connectionless_packet(&mut self, from: Address, packet: &mut Message, now: f64) {
        let response = match read_connectionless(packet).map(|line| Response::parse(&line)) {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                log::warn!("Ignoring reply from {}: {}", from, error);
                return;
            }
            Err(error) => {
                log::warn!("Unreadable reply from {}: {}", from, error);
                return;
            }
        };

        match response {
            Response::Info { .. } => {
                log::info!("Server {}: {}", from, response);
                self.server_info = Some(response);
            }
            Response::Connect { client_index, time } => {
                if self.state != ClientState::AwaitingAck || Some(from) != self.server {
                    return;
                }
                self.channel = Some(Channel::new(from, self.netport, now));
                self.index = Some(client_index);
                self.state = ClientState::Connected;
                self.worldtime = Some(time);
                self.commands.reset(now);
                self.notice(format!("Connected to {from} as player {client_index}"));
                let weapon = self.weapon;
                if weapon != Weapon::default() {
                    self.upgrade(weapon);
                }
            }
            Response::Fail { reason } => {
                if self.state == ClientState::AwaitingAck && Some(from) == self.server {
                    log::warn!("Connection refused: {}", reason);
                    self.drop_connection(&reason);
                }
            }
        }
    }

    fn channel_packet(&mut self, packet: &mut Message, now: f64) {
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        channel.process(now);

        while packet.remaining() > 0 && self.state == ClientState::Connected {
            if let Err(error) = self.server_op(packet) {
                log::warn!("Malformed packet from server: {}", error);
                return;
            }
        }
    }

    fn server_op(&mut self, packet: &mut Message) -> Result<(), MessageError> {
        let byte = packet.read_u8()?;
        let Some(op) = ServerOp::from_byte(byte) else {
            log::warn!("Unknown server opcode {}", byte);
            packet.read_bytes(packet.remaining())?;
            return Ok(());
        };

        match op {
            ServerOp::Disconnect => self.drop_connection("Disconnected by server"),
            ServerOp::Message => {
                let text = packet.read_string()?;
                self.notice(text);
            }
            ServerOp::Score => {
                let index = usize::from(packet.read_u8()?);
                let score = packet.read_i32()?;
                if let Some(slot) = self.scores.get_mut(index) {
                    *slot = score;
                }
            }
            ServerOp::Info => {
                let info = PlayerInfo::read(packet)?;
                if let Some(slot) = self.players.get_mut(usize::from(info.index)) {
                    *slot = info;
                }
            }
            ServerOp::Snapshot => match read_snapshot(&mut self.world, packet) {
                Ok(frame) => {
                    self.events.extend(frame.events);
                    let worldtime = self.worldtime.get_or_insert(frame.time);
                    *worldtime += (frame.time - *worldtime) * WORLDTIME_SMOOTHING;
                    self.apply_turret_prediction();
                }
                Err(error) => {
                    log::warn!("Dropping snapshot: {}", error);
                    // The rest of the packet is unreadable
                    packet.read_bytes(packet.remaining())?;
                }
            },
            ServerOp::Restart => {
                self.world.reset();
                self.predicted_turret = None;
                self.notice("New round".to_string());
            }
        }
        Ok(())
    }

    /// Handle resolution, retries, timeouts and input for this frame
    pub fn update(&mut self, now: f64) {
        let delta_time = (now - self.last_frame).max(0.0) as f32;
        self.last_frame = now;

        if let Some(result) = self.resolver.as_ref().and_then(Resolver::poll) {
            self.resolver = None;
            match result {
                Ok(address) => self.connect_to(address, now),
                Err(error) => self.drop_connection(&format!("Could not connect: {error}")),
            }
        }

        match self.state {
            ClientState::Disconnected | ClientState::Resolving => {}
            ClientState::AwaitingAck => {
                if now - self.connect_time >= CONNECT_RETRY {
                    if self.connect_attempts >= CONNECT_ATTEMPTS {
                        self.drop_connection("No response from server");
                    } else {
                        log::debug!("Retrying connect ({})", self.connect_attempts + 1);
                        self.send_connect(now);
                    }
                }
            }
            ClientState::Connected => {
                if self.channel.as_ref().is_some_and(|c| c.timed_out(now)) {
                    self.drop_connection("Connection timed out");
                    return;
                }
                if let Some(worldtime) = self.worldtime.as_mut() {
                    *worldtime += delta_time;
                }
                self.predict_turret(delta_time);
                if self.commands.advance(now) > 0 {
                    let usercmd = self.usercmd;
                    self.queue(|message| {
                        message.write_u8(ClientOp::Command as u8)?;
                        usercmd.write(message)
                    });
                }
            }
        }
    }

    /// Send everything queued on the channel
    pub fn flush(&mut self, now: f64) {
        if let Some(channel) = self.channel.as_mut() {
            if let Err(error) = channel.transmit(self.socket.as_mut(), now) {
                log::warn!("Failed to send to server: {}", error);
            }
        }
    }

    /// Slew our own turret locally so aiming feels immediate
    fn predict_turret(&mut self, delta_time: f32) {
        let usercmd = self.usercmd;
        let Some(tank) = self.own_tank_mut() else {
            return;
        };
        tank.usercmd = usercmd;
        tank.aim(delta_time);
        tank.old_turret_rotation = tank.turret_rotation;
        let rotation = tank.turret_rotation;
        self.predicted_turret = Some(rotation);
    }

    fn apply_turret_prediction(&mut self) {
        let usercmd = self.usercmd;
        let predicted = self.predicted_turret;
        if let Some(tank) = self.own_tank_mut() {
            tank.usercmd = usercmd;
            if let Some(rotation) = predicted {
                tank.turret_rotation = rotation;
                tank.old_turret_rotation = rotation;
            }
        }
    }

    fn own_tank_mut(&mut self) -> Option<&mut Tank> {
        let id = self.world.tank_of_player(self.index?)?;
        self.world.object_mut(id)?.as_tank_mut()
    }

    // Output

    /// Interpolation factor between the previous and the latest tick
    pub fn lerp(&self) -> f32 {
        let Some(worldtime) = self.worldtime else {
            return 1.0;
        };
        if self.tick_duration <= 0.0 {
            return 1.0;
        }
        let previous_tick = self.world.time() - self.tick_duration;
        ((worldtime - previous_tick) / self.tick_duration).clamp(0.0, 1.0)
    }

    /// Draw the interpolated world, scores and chat
    pub fn draw(&self, renderer: &mut dyn Renderer) {
        if self.state != ClientState::Connected {
            let status = match self.state {
                ClientState::Resolving => "Resolving server...",
                ClientState::AwaitingAck => "Connecting...",
                _ => "Not connected",
            };
            renderer.draw_string(status, Vec2::new(0.0, 0.0), text_color());
            return;
        }

        let arena = self.world.arena();
        renderer.draw_box(arena.min, arena.max, Vec3::new(0.5, 0.5, 0.5));

        let lerp = self.lerp();
        for object in self.world.objects() {
            let Some(body) = self.world.body(object.spawn_id) else {
                continue;
            };
            let (position, rotation) = object.interpolated_pose(body, lerp);
            match &object.kind {
                ObjectKind::Tank(tank) => {
                    renderer.draw_model(Model::TankBody, position, rotation, tank.color);
                    let turret = lerp_angle(tank.old_turret_rotation, tank.turret_rotation, lerp);
                    renderer.draw_model(Model::TankTurret, position, turret, tank.color);
                }
                ObjectKind::Projectile(_) => {
                    let color = object
                        .owner
                        .and_then(|owner| self.world.object(owner))
                        .and_then(|o| o.as_tank())
                        .map_or(text_color(), |t| t.color);
                    renderer.draw_model(Model::Projectile, position, rotation, color);
                }
            }
        }

        let mut line = 0.0;
        for info in self.players.iter().filter(|p| p.active) {
            let text = format!("{:<16} {:>3}", info.name, self.score(usize::from(info.index)));
            renderer.draw_string(&text, Vec2::new(0.0, line), info.color);
            line += 1.0;
        }
        let skip = self.messages.len().saturating_sub(VISIBLE_MESSAGES);
        for text in self.messages.iter().skip(skip) {
            renderer.draw_string(text, Vec2::new(0.0, line), text_color());
            line += 1.0;
        }
    }

    /// Play the sounds and effects received since the last call
    pub fn play_events(&mut self, bank: &SoundBank, sounds: &mut dyn SoundSystem, renderer: &mut dyn Renderer) {
        for event in self.events.drain(..) {
            match event {
                GameEvent::Sound(sound) => bank.play(sounds, sound.sound, sound.position, sound.volume),
                GameEvent::Effect(effect) => renderer.draw_particles(&effect),
            }
        }
    }

    /// Events received but not yet played
    pub fn pending_events(&self) -> &[GameEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use arena_engine::net::LoopbackNetwork;
    use crate::game::write_snapshot;

    fn client(network: &LoopbackNetwork) -> Client {
        let mut client = Client::new(&GameConfig::default(), Box::new(network.bind(5000)), 0.0);
        client.state = ClientState::Connected;
        client
    }

    fn receive_snapshot(client: &mut Client, frame: u32, time: f32) {
        let mut server = World::new(WorldSettings::default());
        server.set_clock(frame, time);
        let mut packet = Message::new();
        packet.write_u8(ServerOp::Snapshot as u8).unwrap();
        write_snapshot(&server, &mut packet).unwrap();
        client.server_op(&mut packet).unwrap();
    }

    #[test]
    fn test_worldtime_follows_snapshots_smoothly() {
        let network = LoopbackNetwork::new();
        let mut client = client(&network);
        assert_eq!(client.worldtime(), None);

        receive_snapshot(&mut client, 1, 0.0);
        assert_eq!(client.worldtime(), Some(0.0));

        receive_snapshot(&mut client, 2, 1.0);
        assert_relative_eq!(client.worldtime().unwrap(), 0.1, epsilon = 1e-6);

        receive_snapshot(&mut client, 3, 1.0);
        assert_relative_eq!(client.worldtime().unwrap(), 0.19, epsilon = 1e-6);
    }

    #[test]
    fn test_lerp_spans_one_tick() {
        let network = LoopbackNetwork::new();
        let mut client = client(&network);
        assert_eq!(client.lerp(), 1.0);

        receive_snapshot(&mut client, 20, 1.0);
        let tick = client.tick_duration;
        assert_relative_eq!(tick, 0.05);

        let cases = [
            (1.0 - tick, 0.0),
            (1.0 - tick * 0.5, 0.5),
            (1.0, 1.0),
            (1.0 + tick, 1.0),
            (0.5, 0.0),
        ];
        for (worldtime, expected) in cases {
            client.worldtime = Some(worldtime);
            assert_relative_eq!(client.lerp(), expected, epsilon = 1e-4);
        }
    }
}
