// LogTail - core/mod.rs
//
// Core tail logic layer: data model, line splitting, rotation detection.
// Pure functions only; no file or OS access.
// Must NOT depend on: platform, app.

pub mod model;
pub mod rotation;
pub mod splitter;
