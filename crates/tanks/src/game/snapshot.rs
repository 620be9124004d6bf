//! Snapshot encoding and the client-side merge
//!
//! A snapshot is a sequence of typed, length-prefixed blocks ended by a
//! `none` tag:
//!
//! ```text
//! frame  : frame u32, time f32, { spawn_id u32, type u8, payload }*, 0u32
//! sound  : SoundEvent
//! effect : EffectEvent
//! none
//! ```
//!
//! Every snapshot carries the full object list, so a lost packet costs
//! nothing but smoothness. Blocks with an unknown tag are skipped.

use std::sync::Arc;

use arena_engine::foundation::math::{Vec2, Vec3};
use arena_engine::net::{Message, MessageError};
use arena_engine::physics::{Motion, RigidBody, Shape};
use thiserror::Error;

use super::event::{EffectEvent, EventError, GameEvent, SoundEvent};
use super::object::{ObjectKind, ObjectType, SpawnId, NO_SPAWN_ID};
use super::projectile::Projectile;
use super::tank::Tank;
use super::weapon::Weapon;
use super::world::World;

const BLOCK_NONE: u8 = 0;
const BLOCK_FRAME: u8 = 1;
const BLOCK_SOUND: u8 = 2;
const BLOCK_EFFECT: u8 = 3;

/// Snapshot decode failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Packet was short or malformed
    #[error(transparent)]
    Message(#[from] MessageError),

    /// Object entry with an unknown type tag
    #[error("unknown object type {0}")]
    UnknownObjectType(u8),

    /// Spawn ids must strictly increase
    #[error("spawn id {next} follows {previous}")]
    OutOfOrder {
        /// Id of the preceding entry
        previous: SpawnId,
        /// Offending id
        next: SpawnId,
    },

    /// Undecodable event block
    #[error("bad event: {0}")]
    Event(#[from] EventError),

    /// No frame block in the snapshot
    #[error("snapshot has no frame block")]
    MissingFrame,
}

/// Clock and events carried by a decoded snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotFrame {
    /// Server frame number
    pub frame: u32,

    /// Server world time at the end of the frame
    pub time: f32,

    /// Flavor events raised during the frame
    pub events: Vec<GameEvent>,
}

/// Encode the world's objects and the events of its last frame
pub fn write_snapshot(world: &World, message: &mut Message) -> Result<(), MessageError> {
    message.write_u8(BLOCK_FRAME)?;
    let block = message.reserve_block()?;
    message.write_u32(world.frame())?;
    message.write_f32(world.time())?;
    for object in world.objects() {
        let Some(body) = world.physics().get(object.body) else {
            continue;
        };
        message.write_u32(object.spawn_id)?;
        message.write_u8(object.object_type().to_byte())?;
        match &object.kind {
            ObjectKind::Tank(tank) => tank.write_snapshot(&body.motion, message)?,
            ObjectKind::Projectile(projectile) => {
                let owner = object.owner.unwrap_or(NO_SPAWN_ID);
                projectile.write_snapshot(owner, &body.motion, message)?;
            }
        }
    }
    message.write_u32(NO_SPAWN_ID)?;
    message.commit_block(block)?;

    for event in world.events() {
        match event {
            GameEvent::Sound(sound) => {
                message.write_u8(BLOCK_SOUND)?;
                let block = message.reserve_block()?;
                sound.write(message)?;
                message.commit_block(block)?;
            }
            GameEvent::Effect(effect) => {
                message.write_u8(BLOCK_EFFECT)?;
                let block = message.reserve_block()?;
                effect.write(message)?;
                message.commit_block(block)?;
            }
        }
    }

    message.write_u8(BLOCK_NONE)
}

/// One decoded object entry
struct Entry {
    spawn_id: SpawnId,
    owner: Option<SpawnId>,
    kind: ObjectKind,
    body: RigidBody,
}

fn read_entry(world: &World, spawn_id: SpawnId, message: &mut Message) -> Result<Entry, SnapshotError> {
    let tag = message.read_u8()?;
    match ObjectType::from_byte(tag) {
        Some(ObjectType::Tank) => {
            let mut tank = Tank::new(0, Vec3::zeros(), Weapon::default());
            let mut body = world.tank_body(Vec2::zeros(), 0.0);
            tank.read_snapshot(&mut body.motion, message)?;
            tank.old_turret_rotation = tank.turret_rotation;
            Ok(Entry {
                spawn_id,
                owner: None,
                kind: ObjectKind::Tank(tank),
                body,
            })
        }
        Some(ObjectType::Projectile) => {
            let mut projectile = Projectile::new(Weapon::default(), world.time(), None);
            let mut scratch = Motion::new(Arc::new(Shape::point()));
            let owner = projectile.read_snapshot(&mut scratch, message)?;
            let body = world.projectile_body(projectile.weapon, scratch.position, scratch.linear_velocity);
            Ok(Entry {
                spawn_id,
                owner: (owner != NO_SPAWN_ID).then_some(owner),
                kind: ObjectKind::Projectile(projectile),
                body,
            })
        }
        None => Err(SnapshotError::UnknownObjectType(tag)),
    }
}

fn read_frame(world: &World, block: &mut Message) -> Result<(u32, f32, Vec<Entry>), SnapshotError> {
    let frame = block.read_u32()?;
    let time = block.read_f32()?;
    let mut entries: Vec<Entry> = Vec::new();
    loop {
        let spawn_id = block.read_u32()?;
        if spawn_id == NO_SPAWN_ID {
            break;
        }
        if let Some(previous) = entries.last().map(|e| e.spawn_id) {
            if spawn_id <= previous {
                return Err(SnapshotError::OutOfOrder {
                    previous,
                    next: spawn_id,
                });
            }
        }
        entries.push(read_entry(world, spawn_id, block)?);
    }
    Ok((frame, time, entries))
}

/// Decode a snapshot and merge it into the client world
///
/// The whole packet is decoded before the world is touched, so a malformed
/// snapshot leaves the world as it was.
pub fn read_snapshot(world: &mut World, message: &mut Message) -> Result<SnapshotFrame, SnapshotError> {
    let mut decoded = None;
    let mut events = Vec::new();
    loop {
        let tag = message.read_u8()?;
        if tag == BLOCK_NONE {
            break;
        }
        let mut block = message.read_block()?;
        match tag {
            BLOCK_FRAME => decoded = Some(read_frame(world, &mut block)?),
            BLOCK_SOUND => events.push(GameEvent::Sound(SoundEvent::read(&mut block)?)),
            BLOCK_EFFECT => events.push(GameEvent::Effect(EffectEvent::read(&mut block)?)),
            other => log::debug!("Skipping unknown snapshot block {} ({} bytes)", other, block.len()),
        }
    }

    let (frame, time, entries) = decoded.ok_or(SnapshotError::MissingFrame)?;
    merge(world, entries);
    world.set_clock(frame, time);
    Ok(SnapshotFrame { frame, time, events })
}

/// Lock-step merge of two lists sorted by spawn id
fn merge(world: &mut World, entries: Vec<Entry>) {
    let local = world.spawn_ids();
    let mut local = local.into_iter().peekable();

    for entry in entries {
        while let Some(&id) = local.peek() {
            if id >= entry.spawn_id {
                break;
            }
            world.remove_object(id);
            local.next();
        }

        if local.peek() == Some(&entry.spawn_id) {
            local.next();
            update(world, entry);
        } else {
            world.insert_object(entry.spawn_id, entry.owner, entry.kind, entry.body);
        }
    }

    for id in local {
        world.remove_object(id);
    }
}

fn update(world: &mut World, entry: Entry) {
    let spawn_id = entry.spawn_id;
    let same_type = world
        .object(spawn_id)
        .is_some_and(|o| o.object_type() == entry.kind.object_type());
    if !same_type {
        world.remove_object(spawn_id);
        world.insert_object(spawn_id, entry.owner, entry.kind, entry.body);
        return;
    }

    let Some(body) = world.body(spawn_id) else {
        return;
    };
    let (position, rotation) = (body.motion.position, body.motion.rotation);

    if let Some(object) = world.object_mut(spawn_id) {
        let previous_turret = object.as_tank().map(|t| t.turret_rotation);
        object.old_position = position;
        object.old_rotation = rotation;
        object.owner = entry.owner;
        object.kind = entry.kind;
        if let (Some(turret), ObjectKind::Tank(tank)) = (previous_turret, &mut object.kind) {
            tank.old_turret_rotation = turret;
        }
    }

    if let Some(body) = world.body_mut(spawn_id) {
        let incoming = &entry.body.motion;
        body.motion.position = incoming.position;
        body.motion.rotation = incoming.rotation;
        body.motion.linear_velocity = incoming.linear_velocity;
        body.motion.angular_velocity = incoming.angular_velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::event::{EffectKind, Sound};
    use crate::game::world::WorldSettings;

    fn world() -> World {
        World::new(WorldSettings::default())
    }

    fn add_tank(world: &mut World, spawn_id: SpawnId, player_index: u8, position: Vec2) {
        let body = world.tank_body(position, 0.0);
        let tank = Tank::new(player_index, Vec3::new(1.0, 0.0, 0.0), Weapon::Cannon);
        world.insert_object(spawn_id, None, ObjectKind::Tank(tank), body);
    }

    fn add_projectile(world: &mut World, spawn_id: SpawnId, owner: SpawnId, position: Vec2) {
        let body = world.projectile_body(Weapon::Blaster, position, Vec2::new(5.0, 0.0));
        let projectile = Projectile::new(Weapon::Blaster, 0.0, None);
        world.insert_object(spawn_id, Some(owner), ObjectKind::Projectile(projectile), body);
    }

    fn transfer(server: &World, client: &mut World) -> SnapshotFrame {
        let mut message = Message::new();
        write_snapshot(server, &mut message).unwrap();
        read_snapshot(client, &mut message).unwrap()
    }

    #[test]
    fn test_merge_removes_updates_and_inserts_by_spawn_id() {
        let mut server = world();
        add_tank(&mut server, 3, 0, Vec2::new(1.0, 2.0));
        add_projectile(&mut server, 7, 3, Vec2::new(4.0, 2.0));
        add_tank(&mut server, 9, 1, Vec2::new(-6.0, 0.0));

        let mut client = world();
        add_tank(&mut client, 3, 0, Vec2::zeros());
        add_projectile(&mut client, 5, 3, Vec2::zeros());
        add_tank(&mut client, 9, 1, Vec2::new(-5.0, 0.0));
        let tank_handle = client.object(3).unwrap().body;

        transfer(&server, &mut client);

        assert_eq!(client.spawn_ids(), vec![3, 7, 9]);
        // Updated in place, with the previous pose kept for interpolation
        let tank = client.object(3).unwrap();
        assert_eq!(tank.body, tank_handle);
        assert_eq!(tank.old_position, Vec2::zeros());
        assert_eq!(client.body(3).unwrap().motion.position, Vec2::new(1.0, 2.0));
        assert_eq!(client.body(9).unwrap().motion.position, Vec2::new(-6.0, 0.0));

        let shell = client.object(7).unwrap();
        assert_eq!(shell.owner, Some(3));
        assert!(shell.as_projectile().is_some());
        assert_eq!(client.body(7).unwrap().motion.position, Vec2::new(4.0, 2.0));
        assert_eq!(client.physics().len(), 4 + 3);
    }

    #[test]
    fn test_tank_fields_survive_bit_exact() {
        let mut server = world();
        add_tank(&mut server, 1, 5, Vec2::zeros());
        {
            let tank = server.object_mut(1).unwrap().as_tank_mut().unwrap();
            tank.color = Vec3::new(0.1, 0.2, 0.3);
            tank.turret_rotation = -2.5;
            tank.turret_velocity = 0.75;
            tank.damage = 0.35;
            tank.fire_time = 12.125;
        }
        {
            let motion = &mut server.body_mut(1).unwrap().motion;
            motion.position = Vec2::new(3.3, -7.1);
            motion.linear_velocity = Vec2::new(-0.1, 9.9);
            motion.rotation = 1.234_567;
            motion.angular_velocity = -0.5;
        }

        let mut client = world();
        transfer(&server, &mut client);

        let sent = server.object(1).unwrap().as_tank().unwrap();
        let got = client.object(1).unwrap().as_tank().unwrap();
        assert_eq!(got.player_index, 5);
        for (a, b) in [
            (sent.color.x, got.color.x),
            (sent.color.y, got.color.y),
            (sent.color.z, got.color.z),
            (sent.turret_rotation, got.turret_rotation),
            (sent.turret_velocity, got.turret_velocity),
            (sent.damage, got.damage),
            (sent.fire_time, got.fire_time),
        ] {
            assert_eq!(a.to_bits(), b.to_bits());
        }

        let sent = &server.body(1).unwrap().motion;
        let got = &client.body(1).unwrap().motion;
        assert_eq!(sent.position, got.position);
        assert_eq!(sent.linear_velocity, got.linear_velocity);
        assert_eq!(sent.rotation.to_bits(), got.rotation.to_bits());
        assert_eq!(sent.angular_velocity.to_bits(), got.angular_velocity.to_bits());
    }

    #[test]
    fn test_events_and_clock_ride_along() {
        let mut server = world();
        server.set_clock(41, 2.05);
        server.push_event(GameEvent::Sound(SoundEvent {
            sound: Sound::Explosion,
            position: Vec2::new(1.0, 1.0),
            volume: 1.0,
        }));
        server.push_event(GameEvent::Effect(EffectEvent {
            kind: EffectKind::Sparks,
            position: Vec2::zeros(),
            direction: Vec2::new(0.0, 1.0),
            strength: 0.5,
        }));

        let mut client = world();
        let frame = transfer(&server, &mut client);
        assert_eq!(frame.frame, 41);
        assert_eq!(frame.time, 2.05);
        assert_eq!(frame.events, server.events());
        assert_eq!(client.frame(), 41);
    }

    #[test]
    fn test_unknown_block_is_skipped() {
        let server = world();
        let mut message = Message::new();
        message.write_u8(42).unwrap();
        message.write_u16(3).unwrap();
        message.write_bytes(&[1, 2, 3]).unwrap();
        let mut rest = Message::new();
        write_snapshot(&server, &mut rest).unwrap();
        message.write_bytes(rest.as_bytes()).unwrap();

        let mut client = world();
        assert!(read_snapshot(&mut client, &mut message).is_ok());
    }

    #[test]
    fn test_malformed_snapshot_leaves_world_untouched() {
        let mut client = world();
        add_tank(&mut client, 2, 0, Vec2::zeros());

        let mut message = Message::new();
        message.write_u8(BLOCK_FRAME).unwrap();
        let block = message.reserve_block().unwrap();
        message.write_u32(1).unwrap();
        message.write_f32(0.0).unwrap();
        message.write_u32(8).unwrap();
        message.write_u8(9).unwrap();
        message.commit_block(block).unwrap();
        message.write_u8(BLOCK_NONE).unwrap();

        let result = read_snapshot(&mut client, &mut message);
        assert_eq!(result, Err(SnapshotError::UnknownObjectType(9)));
        assert_eq!(client.spawn_ids(), vec![2]);
    }

    #[test]
    fn test_largest_spawn_id_is_accepted() {
        let mut server = world();
        add_tank(&mut server, 4, 0, Vec2::new(2.0, 1.0));
        let mut payload = Message::new();
        server.object(4).unwrap().as_tank().unwrap().write_snapshot(&server.body(4).unwrap().motion, &mut payload).unwrap();

        let mut message = Message::new();
        message.write_u8(BLOCK_FRAME).unwrap();
        let block = message.reserve_block().unwrap();
        message.write_u32(1).unwrap();
        message.write_f32(0.0).unwrap();
        message.write_u32(u32::MAX).unwrap();
        message.write_u8(ObjectType::Tank.to_byte()).unwrap();
        message.write_bytes(payload.as_bytes()).unwrap();
        message.write_u32(NO_SPAWN_ID).unwrap();
        message.commit_block(block).unwrap();
        message.write_u8(BLOCK_NONE).unwrap();

        let mut client = world();
        assert!(read_snapshot(&mut client, &mut message).is_ok());
        assert_eq!(client.spawn_ids(), vec![u32::MAX]);
        assert_eq!(client.body(u32::MAX).unwrap().motion.position, Vec2::new(2.0, 1.0));
    }

    #[test]
    fn test_out_of_order_ids_rejected() {
        let mut server = world();
        add_tank(&mut server, 4, 0, Vec2::zeros());
        let mut payload = Message::new();
        server.object(4).unwrap().as_tank().unwrap().write_snapshot(&server.body(4).unwrap().motion, &mut payload).unwrap();

        let mut message = Message::new();
        message.write_u8(BLOCK_FRAME).unwrap();
        let block = message.reserve_block().unwrap();
        message.write_u32(1).unwrap();
        message.write_f32(0.0).unwrap();
        for _ in 0..2 {
            message.write_u32(4).unwrap();
            message.write_u8(ObjectType::Tank.to_byte()).unwrap();
            message.write_bytes(payload.as_bytes()).unwrap();
        }
        message.write_u32(NO_SPAWN_ID).unwrap();
        message.commit_block(block).unwrap();
        message.write_u8(BLOCK_NONE).unwrap();

        let mut client = world();
        assert_eq!(
            read_snapshot(&mut client, &mut message),
            Err(SnapshotError::OutOfOrder { previous: 4, next: 4 })
        );
    }
}
