//! The game world
//!
//! Owns every [`Object`], the physics container holding their bodies, and
//! the arena walls. Spawns and removals requested while a frame runs are
//! recorded as commands and applied together at the frame boundaries, so
//! nothing is added to or dropped from the object map while it is walked.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use arena_engine::foundation::math::{Vec2, Vec3};
use arena_engine::physics::{
    closest, Bounds, Contact, ContactListener, Material, Motion, PhysicsWorld, RigidBody, Shape,
};
use rand::Rng;

use super::event::{EffectEvent, EffectKind, GameEvent, Sound, SoundEvent};
use super::object::{Object, ObjectKind, SpawnId, NO_SPAWN_ID};
use super::projectile::{projectile_shape, Projectile};
use super::tank::{hull_shape, Tank};
use super::usercmd::{Actions, UserCmd};
use super::weapon::Weapon;
use crate::config::{PhysicsConfig, ServerConfig};

/// Thickness of the arena walls
const WALL_THICKNESS: f32 = 1.0;

/// Clearance a spawn point keeps from every body
const SPAWN_CLEARANCE: f32 = 1.0;

/// Candidate positions tried before settling for a crowded spawn point
const SPAWN_ATTEMPTS: usize = 32;

/// Physical parameters of a world
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSettings {
    /// Arena width
    pub arena_width: f32,

    /// Arena height
    pub arena_height: f32,

    /// Tank mass
    pub tank_mass: f32,

    /// Projectile mass
    pub projectile_mass: f32,

    /// Material of every body
    pub material: Material,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default(), &PhysicsConfig::default())
    }
}

impl WorldSettings {
    /// Build from the configuration sections
    pub fn from_config(server: &ServerConfig, physics: &PhysicsConfig) -> Self {
        Self {
            arena_width: server.arena_width.max(8.0),
            arena_height: server.arena_height.max(8.0),
            tank_mass: physics.tank_mass,
            projectile_mass: physics.projectile_mass,
            material: physics.material(),
        }
    }
}

/// A tank destroyed during a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kill {
    /// Player slot of the destroyed tank
    pub victim: u8,

    /// Player slot of the shooter, if known
    pub killer: Option<u8>,
}

enum WorldCommand {
    Spawn {
        spawn_id: SpawnId,
        owner: Option<SpawnId>,
        kind: ObjectKind,
        body: RigidBody,
    },
    Remove(SpawnId),
}

/// A projectile striking something during the physics step
struct Hit {
    projectile: SpawnId,
    target: SpawnId,
    point: Vec2,
    normal: Vec2,
}

/// Gameplay rules for contacts
struct ContactRules<'a> {
    objects: &'a BTreeMap<SpawnId, Object>,
    consumed: HashSet<SpawnId>,
    hits: Vec<Hit>,
}

impl ContactRules<'_> {
    fn projectile(&self, body: &RigidBody) -> Option<&Object> {
        self.objects
            .get(&body.user_data)
            .filter(|object| object.as_projectile().is_some())
    }

    fn live_tank(&self, body: &RigidBody) -> Option<&Tank> {
        self.objects
            .get(&body.user_data)
            .and_then(Object::as_tank)
            .filter(|tank| !tank.is_destroyed())
    }
}

impl ContactListener for ContactRules<'_> {
    fn filter(&mut self, a: &RigidBody, b: &RigidBody) -> bool {
        let shot_a = self.projectile(a);
        let shot_b = self.projectile(b);
        match (shot_a, shot_b) {
            (Some(_), Some(_)) => false,
            (Some(shot), None) => shot.owner != Some(b.user_data),
            (None, Some(shot)) => shot.owner != Some(a.user_data),
            (None, None) => true,
        }
    }

    fn collide(&mut self, a: &RigidBody, b: &RigidBody, contact: &Contact) -> bool {
        let (shot, target, normal) = if self.projectile(a).is_some() {
            (a, b, -contact.normal)
        } else if self.projectile(b).is_some() {
            (b, a, contact.normal)
        } else {
            return true;
        };

        if self.consumed.contains(&shot.user_data) {
            return false;
        }
        let is_tank = self.objects.get(&target.user_data).and_then(Object::as_tank).is_some();
        if is_tank && self.live_tank(target).is_none() {
            // Wrecks take no further damage
            return false;
        }

        self.consumed.insert(shot.user_data);
        self.hits.push(Hit {
            projectile: shot.user_data,
            target: target.user_data,
            point: contact.point,
            normal,
        });
        log::trace!("Projectile {} hit {}", shot.user_data, target.user_data);
        // Rounds shove tanks but vanish against walls
        is_tank
    }
}

/// Simulation state of one arena
pub struct World {
    settings: WorldSettings,
    objects: BTreeMap<SpawnId, Object>,
    physics: PhysicsWorld,
    commands: Vec<WorldCommand>,
    next_spawn_id: SpawnId,
    frame: u32,
    time: f32,
    arena: Bounds,
    material: Arc<Material>,
    hull: Arc<Shape>,
    rounds: [Arc<Shape>; 3],
    events: Vec<GameEvent>,
    kills: Vec<Kill>,
}

impl World {
    /// Create a world with its walls in place
    pub fn new(settings: WorldSettings) -> Self {
        let half = Vec2::new(settings.arena_width, settings.arena_height) * 0.5;
        let mut world = Self {
            arena: Bounds::new(-half, half),
            material: Arc::new(settings.material),
            hull: Arc::new(hull_shape()),
            rounds: Weapon::ALL.map(|weapon| Arc::new(projectile_shape(weapon))),
            settings,
            objects: BTreeMap::new(),
            physics: PhysicsWorld::new(),
            commands: Vec::new(),
            next_spawn_id: 1,
            frame: 0,
            time: 0.0,
            events: Vec::new(),
            kills: Vec::new(),
        };
        world.reset();
        world
    }

    /// Drop every object and start a new round
    pub fn reset(&mut self) {
        self.objects.clear();
        self.physics.clear();
        self.commands.clear();
        self.events.clear();
        self.kills.clear();
        self.next_spawn_id = 1;
        self.frame = 0;
        self.time = 0.0;

        let half = self.arena.extents();
        let t = WALL_THICKNESS;
        let walls = [
            (Vec2::new(0.0, half.y + t), Vec2::new(half.x + 2.0 * t, t)),
            (Vec2::new(0.0, -half.y - t), Vec2::new(half.x + 2.0 * t, t)),
            (Vec2::new(half.x + t, 0.0), Vec2::new(t, half.y)),
            (Vec2::new(-half.x - t, 0.0), Vec2::new(t, half.y)),
        ];
        for (center, extents) in walls {
            let shape = Arc::new(Shape::Box { half_extents: extents });
            let wall = RigidBody::new_static(shape, self.material.clone())
                .with_pose(center, 0.0)
                .with_user_data(NO_SPAWN_ID);
            self.physics.add(wall);
        }
        log::debug!("World reset, arena {:?} to {:?}", self.arena.min, self.arena.max);
    }

    /// Physical parameters
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Playable area inside the walls
    pub fn arena(&self) -> Bounds {
        self.arena
    }

    /// Frames run since the last reset
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// World time in seconds since the last reset
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Overwrite the clock (clients follow the server's)
    pub fn set_clock(&mut self, frame: u32, time: f32) {
        self.frame = frame;
        self.time = time;
    }

    /// Physics container
    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Objects in ascending spawn id order
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Spawn ids in ascending order
    pub fn spawn_ids(&self) -> Vec<SpawnId> {
        self.objects.keys().copied().collect()
    }

    /// Look up an object
    pub fn object(&self, spawn_id: SpawnId) -> Option<&Object> {
        self.objects.get(&spawn_id)
    }

    /// Look up an object mutably
    pub fn object_mut(&mut self, spawn_id: SpawnId) -> Option<&mut Object> {
        self.objects.get_mut(&spawn_id)
    }

    /// Body of an object
    pub fn body(&self, spawn_id: SpawnId) -> Option<&RigidBody> {
        self.objects.get(&spawn_id).and_then(|o| self.physics.get(o.body))
    }

    /// Body of an object, mutably
    pub fn body_mut(&mut self, spawn_id: SpawnId) -> Option<&mut RigidBody> {
        let handle = self.objects.get(&spawn_id)?.body;
        self.physics.get_mut(handle)
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether there are no live objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Spawn id of the tank driven by `player_index`
    pub fn tank_of_player(&self, player_index: u8) -> Option<SpawnId> {
        self.objects
            .values()
            .find(|o| o.as_tank().is_some_and(|t| t.player_index == player_index))
            .map(|o| o.spawn_id)
    }

    /// Flavor events raised during the last frame
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Tanks destroyed since the last call
    pub fn take_kills(&mut self) -> Vec<Kill> {
        std::mem::take(&mut self.kills)
    }

    // Spawning

    pub(crate) fn tank_body(&self, position: Vec2, rotation: f32) -> RigidBody {
        RigidBody::new_dynamic(self.hull.clone(), self.settings.tank_mass, self.material.clone())
            .with_pose(position, rotation)
    }

    pub(crate) fn projectile_body(&self, weapon: Weapon, position: Vec2, velocity: Vec2) -> RigidBody {
        let shape = self.rounds[usize::from(weapon.to_byte())].clone();
        RigidBody::new_dynamic(shape, self.settings.projectile_mass, self.material.clone())
            .with_pose(position, 0.0)
            .with_velocity(velocity, 0.0)
    }

    fn spawn(&mut self, kind: ObjectKind, owner: Option<SpawnId>, body: RigidBody) -> SpawnId {
        let spawn_id = self.next_spawn_id;
        self.next_spawn_id += 1;
        self.commands.push(WorldCommand::Spawn {
            spawn_id,
            owner,
            kind,
            body,
        });
        spawn_id
    }

    /// Queue a tank; it joins the world at the next frame boundary
    pub fn spawn_tank(&mut self, player_index: u8, color: Vec3, weapon: Weapon, position: Vec2, rotation: f32) -> SpawnId {
        let mut tank = Tank::new(player_index, color, weapon);
        tank.turret_rotation = rotation;
        tank.old_turret_rotation = rotation;
        let body = self.tank_body(position, rotation);
        let spawn_id = self.spawn(ObjectKind::Tank(tank), None, body);
        log::debug!("Spawning tank {} for player {}", spawn_id, player_index);
        spawn_id
    }

    /// Queue a projectile fired by `owner`
    pub fn spawn_projectile(&mut self, owner: SpawnId, shooter: Option<u8>, weapon: Weapon, position: Vec2, velocity: Vec2) -> SpawnId {
        let body = self.projectile_body(weapon, position, velocity);
        let projectile = Projectile::new(weapon, self.time, shooter);
        self.spawn(ObjectKind::Projectile(projectile), Some(owner), body)
    }

    /// Queue removal of an object
    pub fn remove(&mut self, spawn_id: SpawnId) {
        self.commands.push(WorldCommand::Remove(spawn_id));
    }

    /// Apply queued spawns and removals in the order they were requested
    pub fn apply_commands(&mut self) {
        for command in std::mem::take(&mut self.commands) {
            match command {
                WorldCommand::Spawn {
                    spawn_id,
                    owner,
                    kind,
                    body,
                } => self.insert_object(spawn_id, owner, kind, body),
                WorldCommand::Remove(spawn_id) => self.remove_object(spawn_id),
            }
        }
    }

    /// Add an object immediately
    pub(crate) fn insert_object(&mut self, spawn_id: SpawnId, owner: Option<SpawnId>, kind: ObjectKind, body: RigidBody) {
        let old_position = body.motion.position;
        let old_rotation = body.motion.rotation;
        let handle = self.physics.add(body.with_user_data(spawn_id));
        if let Some(previous) = self.objects.insert(
            spawn_id,
            Object {
                spawn_id,
                owner,
                kind,
                body: handle,
                old_position,
                old_rotation,
            },
        ) {
            self.physics.remove(previous.body);
        }
        self.next_spawn_id = self.next_spawn_id.max(spawn_id.saturating_add(1));
    }

    /// Drop an object immediately
    pub(crate) fn remove_object(&mut self, spawn_id: SpawnId) {
        if let Some(object) = self.objects.remove(&spawn_id) {
            self.physics.remove(object.body);
        }
    }

    /// Hand the latest input to a tank
    pub fn set_usercmd(&mut self, spawn_id: SpawnId, usercmd: UserCmd) {
        if let Some(tank) = self.objects.get_mut(&spawn_id).and_then(Object::as_tank_mut) {
            tank.usercmd = usercmd;
        }
    }

    /// Queue a flavor event for this frame
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    // Simulation

    /// Advance one tick: think every object, then step physics
    pub fn run_frame(&mut self, delta_time: f32) {
        self.events.clear();
        self.apply_commands();

        for object in self.objects.values_mut() {
            if let Some(body) = self.physics.get(object.body) {
                object.store_old_pose(body);
            }
        }

        for spawn_id in self.spawn_ids() {
            self.think(spawn_id, delta_time);
        }

        let hits = {
            let mut rules = ContactRules {
                objects: &self.objects,
                consumed: HashSet::new(),
                hits: Vec::new(),
            };
            self.physics.step(delta_time, &mut rules);
            rules.hits
        };
        for hit in hits {
            self.resolve_hit(&hit);
        }

        self.apply_commands();
        self.frame += 1;
        self.time += delta_time;
    }

    fn think(&mut self, spawn_id: SpawnId, delta_time: f32) {
        let time = self.time;
        let arena = self.arena;
        let Some(object) = self.objects.get_mut(&spawn_id) else {
            return;
        };
        let Some(body) = self.physics.get_mut(object.body) else {
            return;
        };

        let mut shot = None;
        let mut expired = false;
        match &mut object.kind {
            ObjectKind::Tank(tank) => {
                tank.drive(&mut body.motion, delta_time);
                tank.aim(delta_time);
                if tank.usercmd.has(Actions::ATTACK) && tank.can_fire(time) {
                    tank.fire_time = time;
                    let (muzzle, aim) = tank.muzzle(&body.motion);
                    shot = Some(Shot {
                        weapon: tank.weapon,
                        shooter: tank.player_index,
                        center: body.motion.world_center(),
                        muzzle,
                        aim,
                        inherited: body.motion.linear_velocity,
                    });
                }
            }
            ObjectKind::Projectile(projectile) => {
                projectile.propel(&mut body.motion, delta_time);
                expired = projectile.expired(time) || !arena.contains_point(body.motion.position);
            }
        }

        if let Some(shot) = shot {
            self.fire(spawn_id, &shot);
        }
        if expired {
            self.remove(spawn_id);
        }
    }

    fn fire(&mut self, owner: SpawnId, shot: &Shot) {
        self.events.push(GameEvent::Sound(SoundEvent {
            sound: Sound::fire(shot.weapon),
            position: shot.muzzle,
            volume: 1.0,
        }));
        self.events.push(GameEvent::Effect(EffectEvent {
            kind: EffectKind::MuzzleFlash,
            position: shot.muzzle,
            direction: shot.aim,
            strength: shot.weapon.damage(),
        }));

        // A muzzle pressed against something hits it point-blank
        let objects = &self.objects;
        let blocked = self.physics.trace_point(shot.center, shot.muzzle, |body| {
            body.user_data != owner && objects.get(&body.user_data).map_or(true, |o| o.owner != Some(owner))
        });
        if let Some((handle, trace)) = blocked {
            let target = self.physics.get(handle).map_or(NO_SPAWN_ID, |b| b.user_data);
            let (point, normal) = trace.contact.map_or((shot.muzzle, -shot.aim), |c| (c.point, c.normal));
            self.impact(point, normal);
            self.damage_tank(target, shot.weapon.damage(), Some(shot.shooter));
            return;
        }

        let velocity = shot.aim * shot.weapon.speed() + shot.inherited;
        self.spawn_projectile(owner, Some(shot.shooter), shot.weapon, shot.muzzle, velocity);
    }

    fn impact(&mut self, point: Vec2, normal: Vec2) {
        self.events.push(GameEvent::Sound(SoundEvent {
            sound: Sound::Impact,
            position: point,
            volume: 0.8,
        }));
        self.events.push(GameEvent::Effect(EffectEvent {
            kind: EffectKind::Sparks,
            position: point,
            direction: normal,
            strength: 1.0,
        }));
    }

    fn resolve_hit(&mut self, hit: &Hit) {
        let Some(projectile) = self.objects.get(&hit.projectile).and_then(Object::as_projectile) else {
            return;
        };
        let damage = projectile.damage;
        let shooter = projectile.shooter;

        self.remove(hit.projectile);
        self.impact(hit.point, hit.normal);
        self.damage_tank(hit.target, damage, shooter);
    }

    /// Add damage to a tank; destroys it once the total reaches 1.0
    pub fn damage_tank(&mut self, spawn_id: SpawnId, amount: f32, attacker: Option<u8>) {
        let Some(object) = self.objects.get_mut(&spawn_id) else {
            return;
        };
        let Some(tank) = object.as_tank_mut() else {
            return;
        };
        if tank.is_destroyed() {
            return;
        }

        tank.damage += amount;
        if !tank.is_destroyed() {
            return;
        }

        let victim = tank.player_index;
        let position = self.physics.get(object.body).map_or(Vec2::zeros(), |b| b.motion.world_center());
        log::debug!("Tank {} (player {}) destroyed by {:?}", spawn_id, victim, attacker);

        self.kills.push(Kill {
            victim,
            killer: attacker,
        });
        self.events.push(GameEvent::Sound(SoundEvent {
            sound: Sound::Explosion,
            position,
            volume: 1.0,
        }));
        self.events.push(GameEvent::Effect(EffectEvent {
            kind: EffectKind::Explosion,
            position,
            direction: Vec2::zeros(),
            strength: 2.0,
        }));
        self.remove(spawn_id);
    }

    /// Pick a random point in the arena clear of every body
    pub fn find_spawn_point<R: Rng>(&self, rng: &mut R) -> Vec2 {
        let margin = tank_reach() + SPAWN_CLEARANCE;
        let min = self.arena.min + Vec2::new(margin, margin);
        let max = self.arena.max - Vec2::new(margin, margin);

        let mut candidate = self.arena.center();
        for _ in 0..SPAWN_ATTEMPTS {
            candidate = Vec2::new(rng.gen_range(min.x..=max.x), rng.gen_range(min.y..=max.y));
            let probe = Motion::new(self.hull.clone()).with_pose(candidate, 0.0);
            let clear = self
                .physics
                .iter()
                .all(|(_, body)| closest(&probe, &body.motion).distance > SPAWN_CLEARANCE);
            if clear {
                return candidate;
            }
        }
        log::warn!("No clear spawn point found, using a crowded one");
        candidate
    }
}

/// Everything needed to fire once the tank borrow is released
struct Shot {
    weapon: Weapon,
    shooter: u8,
    center: Vec2,
    muzzle: Vec2,
    aim: Vec2,
    inherited: Vec2,
}

fn tank_reach() -> f32 {
    hull_shape().bounding_radius()
}
