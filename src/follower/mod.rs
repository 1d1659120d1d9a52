//! Módulo del seguidor - mascota que persigue al cursor

mod sprite;
mod state;

// Re-exports públicos
pub use sprite::{compose_centered, load_scaled, Interpolation, RotationCache, SpriteHandle};
pub use state::{bob_offset, window_origin, FollowerState};
