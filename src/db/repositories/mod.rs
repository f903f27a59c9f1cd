//! `impl Database` blocks, one file per table family.

pub mod activities;
pub mod holidays;
pub mod sessions;
pub mod tasks;

pub use sessions::SessionSwitch;
