// LogTail - app/mod.rs
//
// Application layer: the tail engine, its change drivers and the event
// consumers shipped with the crate.
// Dependencies: core layer, platform (filesystem seam), util.

pub mod cursor;
pub mod debouncer;
pub mod delta;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod history;
pub mod notifier;
pub mod poller;
pub mod window;
