// LogTail - lib.rs
//
// Library entry point, exposing the tail engine and its collaborators for
// the CLI binary, integration tests and programmatic use.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
