// LogTail - core/rotation.rs
//
// Rotation detection by size comparison.
//
// A file that got smaller than its stored cursor was truncated or replaced
// in place; its whole current content is treated as new. Content emitted
// before the rotation is not compared against the new file, it is simply
// superseded. This is the rotation contract for append-only log files.

use crate::core::model::SizeChange;

/// Classify a file by comparing its current size with the stored cursor.
pub fn classify(stored_size: u64, current_size: u64) -> SizeChange {
    use std::cmp::Ordering;
    match current_size.cmp(&stored_size) {
        Ordering::Equal => SizeChange::Unchanged,
        Ordering::Greater => SizeChange::Grown {
            start: stored_size,
            end: current_size,
        },
        Ordering::Less => SizeChange::Truncated {
            start: 0,
            end: current_size,
        },
    }
}
