//! Flavor events
//!
//! Sounds and visual effects raised during a tick. They ride along with the
//! snapshot of that tick, are played once by each client and are never part
//! of the simulated state.

use arena_engine::foundation::math::Vec2;
use arena_engine::net::{Message, MessageError};

use super::weapon::Weapon;

/// Sound triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    /// Cannon shot
    CannonFire,
    /// Missile launch
    MissileFire,
    /// Blaster bolt
    BlasterFire,
    /// Projectile hitting something
    Impact,
    /// Tank destroyed
    Explosion,
}

impl Sound {
    /// Every sound in wire order
    pub const ALL: [Sound; 5] = [
        Sound::CannonFire,
        Sound::MissileFire,
        Sound::BlasterFire,
        Sound::Impact,
        Sound::Explosion,
    ];

    /// Launch sound of a weapon
    pub fn fire(weapon: Weapon) -> Self {
        match weapon {
            Weapon::Cannon => Sound::CannonFire,
            Weapon::Missile => Sound::MissileFire,
            Weapon::Blaster => Sound::BlasterFire,
        }
    }

    /// Asset name handed to the sound system
    pub fn asset_name(self) -> &'static str {
        match self {
            Sound::CannonFire => "cannon_fire",
            Sound::MissileFire => "missile_fire",
            Sound::BlasterFire => "blaster_fire",
            Sound::Impact => "impact",
            Sound::Explosion => "explosion",
        }
    }

    fn to_byte(self) -> u8 {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i as u8)
    }

    fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(usize::from(byte)).copied()
    }
}

/// Visual effect kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Tank destroyed
    Explosion,
    /// Projectile impact
    Sparks,
    /// Muzzle flash
    MuzzleFlash,
}

impl EffectKind {
    const ALL: [EffectKind; 3] = [EffectKind::Explosion, EffectKind::Sparks, EffectKind::MuzzleFlash];

    fn to_byte(self) -> u8 {
        Self::ALL.iter().position(|k| *k == self).map_or(0, |i| i as u8)
    }

    fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(usize::from(byte)).copied()
    }
}

/// A sound to play at a position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundEvent {
    /// Which sound
    pub sound: Sound,
    /// Where it happened
    pub position: Vec2,
    /// Loudness in [0, 1]
    pub volume: f32,
}

/// A particle effect to spawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectEvent {
    /// Which effect
    pub kind: EffectKind,
    /// Where it happened
    pub position: Vec2,
    /// Main direction of the particles
    pub direction: Vec2,
    /// Scale of the effect
    pub strength: f32,
}

/// Either kind of flavor event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    /// Sound trigger
    Sound(SoundEvent),
    /// Visual effect trigger
    Effect(EffectEvent),
}

/// Decode failures for event payloads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// Payload was short
    #[error(transparent)]
    Message(#[from] MessageError),
    /// Unknown sound id
    #[error("unknown sound {0}")]
    UnknownSound(u8),
    /// Unknown effect id
    #[error("unknown effect {0}")]
    UnknownEffect(u8),
}

impl SoundEvent {
    /// Encode the payload
    pub fn write(&self, message: &mut Message) -> Result<(), MessageError> {
        message.write_u8(self.sound.to_byte())?;
        message.write_vec2(self.position)?;
        message.write_f32(self.volume)
    }

    /// Decode the payload
    pub fn read(message: &mut Message) -> Result<Self, EventError> {
        let id = message.read_u8()?;
        let sound = Sound::from_byte(id).ok_or(EventError::UnknownSound(id))?;
        Ok(Self {
            sound,
            position: message.read_vec2()?,
            volume: message.read_f32()?,
        })
    }
}

impl EffectEvent {
    /// Encode the payload
    pub fn write(&self, message: &mut Message) -> Result<(), MessageError> {
        message.write_u8(self.kind.to_byte())?;
        message.write_vec2(self.position)?;
        message.write_vec2(self.direction)?;
        message.write_f32(self.strength)
    }

    /// Decode the payload
    pub fn read(message: &mut Message) -> Result<Self, EventError> {
        let id = message.read_u8()?;
        let kind = EffectKind::from_byte(id).ok_or(EventError::UnknownEffect(id))?;
        Ok(Self {
            kind,
            position: message.read_vec2()?,
            direction: message.read_vec2()?,
            strength: message.read_f32()?,
        })
    }
}
