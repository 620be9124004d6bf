//! Player input commands
//!
//! A [`UserCmd`] is what a client sends every tick: how the hull should
//! move, where the turret should point, and which actions are held.

use arena_engine::foundation::math::Vec2;
use arena_engine::net::{Message, MessageError};
use bitflags::bitflags;

bitflags! {
    /// Held action buttons
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Actions: u8 {
        /// Fire the selected weapon
        const ATTACK = 1 << 0;
    }
}

/// One tick of player input
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UserCmd {
    /// `x` turns the hull (positive counter-clockwise), `y` drives forward
    pub move_dir: Vec2,

    /// World-space direction the turret should face; zero holds it still
    pub look: Vec2,

    /// Held actions
    pub actions: Actions,
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

impl UserCmd {
    /// Idle input
    pub fn idle() -> Self {
        Self::default()
    }

    /// Whether `action` is held
    pub fn has(&self, action: Actions) -> bool {
        self.actions.contains(action)
    }

    /// Encode into a message
    pub fn write(&self, message: &mut Message) -> Result<(), MessageError> {
        message.write_vec2(self.move_dir)?;
        message.write_vec2(self.look)?;
        message.write_u8(self.actions.bits())
    }

    /// Decode from a message, clamping values a client could abuse
    pub fn read(message: &mut Message) -> Result<Self, MessageError> {
        let move_dir = message.read_vec2()?;
        let look = message.read_vec2()?;
        let actions = Actions::from_bits_truncate(message.read_u8()?);
        Ok(Self {
            move_dir: Vec2::new(sanitize(move_dir.x), sanitize(move_dir.y)),
            look: Vec2::new(sanitize(look.x), sanitize(look.y)),
            actions,
        })
    }
}
