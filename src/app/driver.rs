// LogTail - app/driver.rs
//
// Change Driver strategy interface. A driver only decides *when* a file
// should be re-examined; it raises a `ChangeNotice` and the engine's single
// consumer (`DeltaReader`) does the rest. Both strategies therefore share
// identical line-extraction semantics.

use crate::core::model::ChangeNotice;
use crate::util::error::TailError;
use std::path::Path;
use std::sync::mpsc;

/// Where drivers send their notices.
pub type NoticeSender = mpsc::Sender<ChangeNotice>;

/// Contract: emit a notice for a watched file whenever its size or existence
/// changes, eventually. Extra notices are harmless; the consumer re-checks.
pub trait ChangeDriver: Send {
    /// Short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Begin issuing notices. Failure here is engine-fatal.
    fn start(&mut self, notices: NoticeSender) -> Result<(), TailError>;

    /// Add a path at runtime.
    fn watch(&mut self, path: &Path) -> Result<(), TailError>;

    /// Remove a path at runtime. Unknown paths are ignored.
    fn unwatch(&mut self, path: &Path);

    /// Stop issuing notices and release OS resources. Idempotent.
    fn stop(&mut self);
}
