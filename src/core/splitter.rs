// LogTail - core/splitter.rs
//
// Line splitting across arbitrary read boundaries.
//
// Works on raw bytes rather than decoded text: a chunk boundary may fall in
// the middle of a multi-byte UTF-8 sequence or between '\r' and '\n', and
// neither must corrupt the line. Only complete lines are decoded (lossily).
//
// Policy: lines consisting only of whitespace are dropped. A '\r' directly
// before the '\n' terminator is stripped so CRLF files produce clean lines.

/// Split `carry_over ++ chunk` into complete lines and a new carry-over.
///
/// Every fragment terminated by `'\n'` becomes a line (in order); the final
/// unterminated fragment, possibly empty, is returned as the new carry-over.
/// Pure and deterministic.
pub fn split(carry_over: &[u8], chunk: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut lines = Vec::new();

    let mut buf = Vec::with_capacity(carry_over.len() + chunk.len());
    buf.extend_from_slice(carry_over);
    buf.extend_from_slice(chunk);

    let mut start = 0;
    while let Some(rel) = buf[start..].iter().position(|&b| b == b'\n') {
        let end = start + rel;
        if let Some(line) = decode_line(&buf[start..end]) {
            lines.push(line);
        }
        start = end + 1;
    }

    buf.drain(..start);
    (lines, buf)
}

/// Decode one terminated line, stripping a trailing '\r'.
/// Returns `None` for whitespace-only lines.
fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        None
    } else {
        Some(text.into_owned())
    }
}

/// Outcome of feeding one chunk to a [`LineSplitter`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    /// Complete lines extracted, in file order.
    pub lines: Vec<String>,
    /// Bytes of an oversized line discarded while handling this chunk.
    pub discarded: usize,
}

/// Stateful wrapper around [`split`] that owns one file's carry-over.
///
/// A line whose unterminated part grows past `max_carry` is dropped in
/// full: the buffered bytes are discarded and everything up to and
/// including its eventual `'\n'` is skipped, so no tail fragment of it is
/// ever emitted as a line of its own.
///
/// Must be driven strictly sequentially for a single file.
#[derive(Debug, Clone)]
pub struct LineSplitter {
    carry: Vec<u8>,
    max_carry: usize,
    /// Inside an oversized line; drop bytes through the next newline.
    skipping: bool,
}

impl LineSplitter {
    pub fn new(max_carry: usize) -> Self {
        Self {
            carry: Vec::new(),
            max_carry,
            skipping: false,
        }
    }

    /// Feed the next chunk of the file.
    pub fn push(&mut self, chunk: &[u8]) -> SplitOutcome {
        let mut discarded = 0;
        let mut chunk = chunk;

        if self.skipping {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    discarded += end + 1;
                    chunk = &chunk[end + 1..];
                    self.skipping = false;
                }
                None => {
                    return SplitOutcome {
                        lines: Vec::new(),
                        discarded: chunk.len(),
                    };
                }
            }
        }

        let (lines, carry) = split(&self.carry, chunk);
        self.carry = carry;
        discarded += self.enforce_cap();
        SplitOutcome { lines, discarded }
    }

    /// Replace the carry-over (used when the window reader hands over an
    /// unterminated trailing fragment). Subject to the same cap as `push`;
    /// returns the number of bytes discarded.
    pub fn set_carry(&mut self, carry: Vec<u8>) -> usize {
        self.carry = carry;
        self.skipping = false;
        self.enforce_cap()
    }

    /// Drop any buffered fragment (rotation resets the file).
    pub fn reset(&mut self) {
        self.carry.clear();
        self.skipping = false;
    }

    pub fn carry(&self) -> &[u8] {
        &self.carry
    }

    /// True while the rest of an oversized line is being skipped.
    pub fn is_skipping(&self) -> bool {
        self.skipping
    }

    /// Take the buffered fragment as a final line, if it holds any text.
    pub fn flush(&mut self) -> Option<String> {
        self.skipping = false;
        let carry = std::mem::take(&mut self.carry);
        decode_line(&carry)
    }

    fn enforce_cap(&mut self) -> usize {
        if self.carry.len() <= self.max_carry {
            return 0;
        }
        let dropped = self.carry.len();
        self.carry.clear();
        self.skipping = true;
        dropped
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new(crate::util::constants::MAX_CARRY_OVER_BYTES)
    }
}
