// LogTail - platform/mod.rs
//
// Platform abstraction layer: filesystem collaborator and configuration.
// Dependencies: standard library, directories crate.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
