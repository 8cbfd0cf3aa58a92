// LogTail - app/window.rs
//
// Initial Window Reader: the last N lines of a file, without reading the
// whole file.
//
// The first attempt reads a suffix of `n * avg_line_bytes` bytes. A suffix
// that does not start at byte 0 usually starts mid-line, so everything up to
// the first newline is discarded. To tell "mid-line" from "exactly at a line
// start" the read begins one byte early and that extra byte is checked.
// If the attempt yields fewer than N lines the window doubles, up to
// MAX_INITIAL_WINDOW_BYTES; past that the result is simply shorter.
//
// The unterminated fragment after the last newline (a line still being
// written) is returned as carry-over so the next delta read completes it.

use crate::core::splitter;
use crate::platform::fs::FileSource;
use crate::util::constants::MAX_INITIAL_WINDOW_BYTES;
use crate::util::error::TailError;
use std::path::Path;

/// What the window reader saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// At most N complete lines, oldest first.
    pub lines: Vec<String>,
    /// File size the read reached; the cursor starts here.
    pub size: u64,
    /// Unterminated trailing bytes.
    pub carry_over: Vec<u8>,
}

/// Read the last `n` complete lines of `path`.
///
/// Fails with `NotFound` when the file does not exist. A zero-length file
/// yields an empty window.
pub fn read_last_lines(
    fs: &dyn FileSource,
    path: &Path,
    n: usize,
    avg_line_bytes: u64,
) -> Result<Window, TailError> {
    let size = match fs.stat(path) {
        Ok(Some(stat)) => stat.size,
        Ok(None) => {
            return Err(TailError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(TailError::from_io(path.to_path_buf(), e)),
    };

    if size == 0 {
        return Ok(Window {
            lines: Vec::new(),
            size: 0,
            carry_over: Vec::new(),
        });
    }

    let wanted = n.max(1) as u64;
    let mut window = wanted
        .saturating_mul(avg_line_bytes.max(1))
        .min(MAX_INITIAL_WINDOW_BYTES);

    loop {
        let start = size.saturating_sub(window);
        // One byte of look-behind tells whether `start` is a line start.
        let read_from = start.saturating_sub(1);
        let bytes = fs
            .read_range(path, read_from, size)
            .map_err(|e| TailError::from_io(path.to_path_buf(), e))?;
        let reached = read_from + bytes.len() as u64;

        let body: &[u8] = if read_from == start {
            &bytes
        } else {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(i) => &bytes[i + 1..],
                None => &[],
            }
        };

        let (mut lines, carry_over) = splitter::split(&[], body);

        let exhausted = start == 0 || window >= MAX_INITIAL_WINDOW_BYTES;
        if lines.len() >= n || exhausted {
            if lines.len() > n {
                lines.drain(..lines.len() - n);
            }
            tracing::debug!(
                file = %path.display(),
                lines = lines.len(),
                window_start = start,
                size = reached,
                "Initial window read"
            );
            return Ok(Window {
                lines,
                size: reached,
                carry_over,
            });
        }

        window = window.saturating_mul(2).min(MAX_INITIAL_WINDOW_BYTES);
    }
}
