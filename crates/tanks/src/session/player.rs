//! Player slots

use arena_engine::foundation::math::Vec3;
use arena_engine::net::{Channel, Message, MessageError};

use crate::game::{SpawnId, UserCmd, Weapon};

/// Public description of a player slot, sent as `svc_info`
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    /// Slot index
    pub index: u8,

    /// Whether the slot is occupied
    pub active: bool,

    /// Display name
    pub name: String,

    /// Tank color
    pub color: Vec3,

    /// Selected weapon
    pub weapon: Weapon,
}

impl PlayerInfo {
    /// An empty slot
    pub fn inactive(index: u8) -> Self {
        Self {
            index,
            active: false,
            name: String::new(),
            color: Vec3::new(1.0, 1.0, 1.0),
            weapon: Weapon::default(),
        }
    }

    /// Encode the `svc_info` payload
    pub fn write(&self, message: &mut Message) -> Result<(), MessageError> {
        message.write_u8(self.index)?;
        message.write_u8(u8::from(self.active))?;
        message.write_string(&self.name)?;
        message.write_f32(self.color.x)?;
        message.write_f32(self.color.y)?;
        message.write_f32(self.color.z)?;
        message.write_u8(self.weapon.to_byte())
    }

    /// Decode the `svc_info` payload
    pub fn read(message: &mut Message) -> Result<Self, MessageError> {
        let index = message.read_u8()?;
        let active = message.read_u8()? != 0;
        let name = message.read_string()?;
        let r = message.read_f32()?;
        let g = message.read_f32()?;
        let b = message.read_f32()?;
        let weapon = Weapon::from_byte(message.read_u8()?).unwrap_or_default();
        Ok(Self {
            index,
            active,
            name,
            color: Vec3::new(r, g, b),
            weapon,
        })
    }
}

/// Server-side state of a connected player
#[derive(Debug)]
pub struct ServerPlayer {
    /// Slot description
    pub info: PlayerInfo,

    /// Connection to the client
    pub channel: Channel,

    /// Spawn id of the player's tank while alive
    pub tank: Option<SpawnId>,

    /// Latest input received
    pub usercmd: UserCmd,

    /// Frags
    pub score: i32,

    /// World time at which a destroyed tank comes back
    pub respawn_time: Option<f32>,
}

impl ServerPlayer {
    /// A freshly connected player, spawning as soon as possible
    pub fn new(info: PlayerInfo, channel: Channel) -> Self {
        Self {
            info,
            channel,
            tank: None,
            usercmd: UserCmd::idle(),
            score: 0,
            respawn_time: Some(0.0),
        }
    }
}
