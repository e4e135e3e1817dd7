//! Command implementations

pub mod projectile;
pub mod trace;
pub mod vmd;
