//! Output collaborators
//!
//! The game core only pushes draw calls and sound triggers outward; nothing
//! it reads back depends on them. Window, renderer and mixer implementations
//! live outside this crate and plug in through these traits.

use std::collections::HashMap;

use arena_engine::foundation::math::{Vec2, Vec3};

use crate::game::event::{EffectEvent, Sound};

/// Models the game knows how to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    /// Tank hull
    TankBody,
    /// Tank turret
    TankTurret,
    /// Projectile in flight
    Projectile,
}

/// Drawing interface
pub trait Renderer {
    /// Draw a model at a pose
    fn draw_model(&mut self, model: Model, position: Vec2, rotation: f32, color: Vec3);

    /// Draw an axis-aligned box outline
    fn draw_box(&mut self, min: Vec2, max: Vec2, color: Vec3);

    /// Draw a line segment
    fn draw_line(&mut self, start: Vec2, end: Vec2, color: Vec3);

    /// Start a particle effect
    fn draw_particles(&mut self, effect: &EffectEvent);

    /// Draw text in screen space
    fn draw_string(&mut self, text: &str, position: Vec2, color: Vec3);
}

/// Renderer that draws nothing (dedicated servers and headless clients)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw_model(&mut self, _model: Model, _position: Vec2, _rotation: f32, _color: Vec3) {}
    fn draw_box(&mut self, _min: Vec2, _max: Vec2, _color: Vec3) {}
    fn draw_line(&mut self, _start: Vec2, _end: Vec2, _color: Vec3) {}
    fn draw_particles(&mut self, _effect: &EffectEvent) {}
    fn draw_string(&mut self, _text: &str, _position: Vec2, _color: Vec3) {}
}

/// Handle to a loaded sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle(pub u32);

/// Handle to a playback channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(pub u32);

/// Sound playback interface
pub trait SoundSystem {
    /// Load a sound by name
    fn load_sound(&mut self, name: &str) -> Option<SoundHandle>;

    /// Reserve a playback channel
    fn allocate_channel(&mut self) -> Option<ChannelHandle>;

    /// Play a loaded sound on a channel
    fn play(&mut self, channel: ChannelHandle, sound: SoundHandle, position: Vec2, volume: f32);
}

/// Sound system that only logs what it would play
#[derive(Debug, Default)]
pub struct LogSoundSystem {
    names: Vec<String>,
    next_channel: u32,
}

impl SoundSystem for LogSoundSystem {
    fn load_sound(&mut self, name: &str) -> Option<SoundHandle> {
        let index = self.names.iter().position(|n| n == name).unwrap_or_else(|| {
            self.names.push(name.to_string());
            self.names.len() - 1
        });
        u32::try_from(index).ok().map(SoundHandle)
    }

    fn allocate_channel(&mut self) -> Option<ChannelHandle> {
        let channel = ChannelHandle(self.next_channel);
        self.next_channel = self.next_channel.wrapping_add(1);
        Some(channel)
    }

    fn play(&mut self, channel: ChannelHandle, sound: SoundHandle, position: Vec2, volume: f32) {
        let name = usize::try_from(sound.0)
            .ok()
            .and_then(|i| self.names.get(i))
            .map_or("<unknown>", String::as_str);
        log::debug!(
            "Sound '{}' on channel {} at ({:.1}, {:.1}) volume {:.2}",
            name,
            channel.0,
            position.x,
            position.y,
            volume
        );
    }
}

/// Sound triggers resolved to loaded handles
#[derive(Debug, Default)]
pub struct SoundBank {
    handles: HashMap<Sound, SoundHandle>,
}

impl SoundBank {
    /// Load every game sound through `sound_system`
    pub fn load(sound_system: &mut dyn SoundSystem) -> Self {
        let mut handles = HashMap::new();
        for sound in Sound::ALL {
            match sound_system.load_sound(sound.asset_name()) {
                Some(handle) => {
                    handles.insert(sound, handle);
                }
                None => log::warn!("Failed to load sound '{}'", sound.asset_name()),
            }
        }
        Self { handles }
    }

    /// Fire a sound trigger; missing sounds or channels are skipped
    pub fn play(&self, sound_system: &mut dyn SoundSystem, sound: Sound, position: Vec2, volume: f32) {
        let Some(&handle) = self.handles.get(&sound) else {
            return;
        };
        if let Some(channel) = sound_system.allocate_channel() {
            sound_system.play(channel, handle, position, volume);
        }
    }
}
