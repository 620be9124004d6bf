//! Specialized collection types

pub use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generation-checked handle to a rigid body registered with a physics world
    pub struct BodyHandle;
}

/// Handle-based map for rigid bodies
pub type BodyMap<T> = SlotMap<BodyHandle, T>;
