//! End-to-end scenarios over an in-memory network

use arena_engine::net::{Address, LoopbackNetwork, Message, PacketSocket};

use super::*;
use crate::collaborators::{LogSoundSystem, NullRenderer};
use crate::config::GameConfig;
use crate::game::{UserCmd, Weapon};

const SERVER_PORT: u16 = 28100;
const STEP: f64 = 0.05;

fn config() -> GameConfig {
    let mut config = GameConfig::default();
    config.client.name = "Tester".to_string();
    config
}

fn server(network: &LoopbackNetwork, config: &GameConfig) -> Server {
    Server::new(config, Box::new(network.bind(SERVER_PORT)), 0.0).with_seed(11)
}

fn client(network: &LoopbackNetwork, config: &GameConfig, port: u16) -> Client {
    let mut client = Client::new(config, Box::new(network.bind(port)), 0.0);
    client.connect_to(Address::loopback(SERVER_PORT), 0.0);
    client
}

/// One frame of everything, in session order
fn step(server: &mut Server, clients: &mut [&mut Client], now: f64) {
    server.read_packets(now);
    for client in clients.iter_mut() {
        client.read_packets(now);
    }
    server.update(now);
    for client in clients.iter_mut() {
        client.update(now);
    }
    server.flush(now);
    for client in clients.iter_mut() {
        client.flush(now);
    }
}

fn run(server: &mut Server, clients: &mut [&mut Client], from: f64, frames: usize) -> f64 {
    let mut now = from;
    for _ in 0..frames {
        step(server, clients, now);
        now += STEP;
    }
    now
}

#[test]
fn test_client_joins_and_sees_its_tank() {
    let network = LoopbackNetwork::new();
    let config = config();
    let mut server = server(&network, &config);
    let mut alice = client(&network, &config, 5000);

    run(&mut server, &mut [&mut alice], 0.0, 4);

    assert_eq!(alice.state(), ClientState::Connected);
    assert_eq!(alice.index(), Some(0));
    assert_eq!(server.player_count(), 1);
    assert!(alice.players()[0].active);
    assert_eq!(alice.players()[0].name, "Tester");
    assert!(alice.messages().any(|m| m == "Tester entered the game"));

    let tank = alice.world().tank_of_player(0).expect("tank replicated");
    let server_tank = server.player(0).and_then(|p| p.tank);
    assert_eq!(Some(tank), server_tank);
    let lerp = alice.lerp();
    assert!((0.0..=1.0).contains(&lerp));
}

#[test]
fn test_input_drives_the_authoritative_tank() {
    let network = LoopbackNetwork::new();
    let config = config();
    let mut server = server(&network, &config);
    let mut alice = client(&network, &config, 5000);
    let now = run(&mut server, &mut [&mut alice], 0.0, 3);

    let tank = server.player(0).and_then(|p| p.tank).unwrap();
    let start = server.world().body(tank).unwrap().motion.position;

    alice.set_usercmd(UserCmd {
        move_dir: arena_engine::foundation::math::Vec2::new(0.0, 1.0),
        ..UserCmd::idle()
    });
    run(&mut server, &mut [&mut alice], now, 10);

    let moved = server.world().body(tank).unwrap().motion.position;
    assert!((moved - start).norm() > 0.5);
    // The client's copy follows
    let replica = alice.world().body(tank).unwrap().motion.position;
    assert!((replica - start).norm() > 0.0);
}

#[test]
fn test_silent_client_times_out_after_ten_seconds() {
    let network = LoopbackNetwork::new();
    let config = config();
    let mut server = server(&network, &config);
    let mut alice = client(&network, &config, 5000);

    // Handshake at t = 0, then the client goes quiet
    step(&mut server, &mut [&mut alice], 0.0);
    assert_eq!(server.player_count(), 1);
    alice.read_packets(0.0);
    network.drop_all();

    server.frame(9.99);
    assert_eq!(server.player_count(), 1);

    server.frame(10.0);
    assert_eq!(server.player_count(), 0);

    alice.read_packets(10.0);
    assert_eq!(alice.state(), ClientState::Disconnected);
}

#[test]
fn test_bad_protocol_version_is_rejected() {
    let network = LoopbackNetwork::new();
    let config = config();
    let mut server = server(&network, &config);
    let mut socket = network.bind(6000);

    let mut message = Message::new();
    message.write_string("connect 999 \"Old\" 12").unwrap();
    socket.write(Address::loopback(SERVER_PORT), message.as_bytes());
    server.frame(0.0);

    let mut reply = Message::new();
    assert!(socket.read(&mut reply).is_some());
    assert_eq!(
        Response::parse(&reply.read_string().unwrap()),
        Ok(Response::Fail {
            reason: "Bad protocol version".to_string(),
        })
    );
    assert_eq!(server.player_count(), 0);
}

#[test]
fn test_full_server_turns_players_away() {
    let network = LoopbackNetwork::new();
    let mut config = config();
    config.server.max_players = 1;
    let mut server = server(&network, &config);
    let mut alice = client(&network, &config, 5000);
    let mut bob = client(&network, &config, 5001);

    run(&mut server, &mut [&mut alice, &mut bob], 0.0, 3);

    assert_eq!(alice.state(), ClientState::Connected);
    assert_eq!(bob.state(), ClientState::Disconnected);
    assert!(bob.messages().any(|m| m == "Server is full"));
}

#[test]
fn test_info_query() {
    let network = LoopbackNetwork::new();
    let config = config();
    let mut server = server(&network, &config);
    let mut alice = client(&network, &config, 5000);
    let now = run(&mut server, &mut [&mut alice], 0.0, 2);

    alice.request_info(Address::loopback(SERVER_PORT));
    run(&mut server, &mut [&mut alice], now, 2);

    assert_eq!(
        alice.server_info(),
        Some(&Response::Info {
            name: config.server.name.clone(),
            players: 1,
            max_players: MAX_PLAYERS,
            version: PROTOCOL_VERSION,
        })
    );
}

#[test]
fn test_chat_and_weapon_upgrade_are_relayed() {
    let network = LoopbackNetwork::new();
    let config = config();
    let mut server = server(&network, &config);
    let mut alice = client(&network, &config, 5000);
    let mut bob = client(&network, &config, 5001);
    let now = run(&mut server, &mut [&mut alice, &mut bob], 0.0, 3);

    alice.say("hello");
    alice.upgrade(Weapon::Blaster);
    run(&mut server, &mut [&mut alice, &mut bob], now, 3);

    assert!(bob.messages().any(|m| m == "Tester: hello"));
    assert_eq!(server.player(0).unwrap().info.weapon, Weapon::Blaster);
    assert_eq!(bob.players()[0].weapon, Weapon::Blaster);
    let tank = server.player(0).and_then(|p| p.tank).unwrap();
    let weapon = server.world().object(tank).and_then(|o| o.as_tank()).map(|t| t.weapon);
    assert_eq!(weapon, Some(Weapon::Blaster));
}

#[test]
fn test_disconnect_frees_the_slot() {
    let network = LoopbackNetwork::new();
    let config = config();
    let mut server = server(&network, &config);
    let mut alice = client(&network, &config, 5000);
    let mut bob = client(&network, &config, 5001);
    let now = run(&mut server, &mut [&mut alice, &mut bob], 0.0, 3);
    assert_eq!(server.player_count(), 2);

    alice.disconnect(now);
    run(&mut server, &mut [&mut bob], now, 3);

    assert_eq!(server.player_count(), 1);
    assert!(!bob.players()[0].active);
    assert!(bob.messages().any(|m| m == "Tester left the game"));
    assert!(bob.world().tank_of_player(0).is_none());
}

#[test]
fn test_restart_resets_clients() {
    let network = LoopbackNetwork::new();
    let config = config();
    let mut server = server(&network, &config);
    let mut alice = client(&network, &config, 5000);
    let now = run(&mut server, &mut [&mut alice], 0.0, 20);
    let before = alice.world().time();
    assert!(before > 0.0);

    server.restart();
    run(&mut server, &mut [&mut alice], now, 2);

    assert!(alice.messages().any(|m| m == "New round"));
    assert!(alice.world().time() < before);
    assert_eq!(alice.score(0), 0);
}

#[test]
fn test_session_runs_listen_game_in_order() {
    let network = LoopbackNetwork::new();
    let config = config();
    let server = server(&network, &config);
    let client = client(&network, &config, 5000);
    let mut session = Session::new(
        Some(server),
        Some(client),
        Box::new(NullRenderer),
        Box::new(LogSoundSystem::default()),
    );

    let mut now = 0.0;
    for _ in 0..5 {
        session.frame(now);
        now += STEP;
    }

    let client = session.client().unwrap();
    assert_eq!(client.state(), ClientState::Connected);
    // Events were handed to the collaborators
    assert!(client.pending_events().is_empty());
    assert!(!session.is_finished());
}

#[test]
fn test_listen_session_joins_over_udp() {
    let mut config = config();
    config.server.port = 0;
    let mut session = Session::listen(&config).unwrap();
    let port = session.server().unwrap().local_address().port();
    assert_ne!(port, 0);
    assert_eq!(session.client().unwrap().server_address(), Some(Address::loopback(port)));

    let mut now = 0.0;
    for _ in 0..200 {
        session.frame(now);
        if session.client().is_some_and(|c| c.state() == ClientState::Connected) {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
        now += 0.01;
    }

    assert_eq!(session.client().unwrap().state(), ClientState::Connected);
    assert_eq!(session.server().unwrap().player_count(), 1);
}

#[test]
fn test_invalid_config_is_refused() {
    let mut config = config();
    config.server.tick_rate = 0;
    assert!(matches!(Session::dedicated(&config), Err(SessionError::Config(_))));
}
