//! Newline-delimited message framing.
//!
//! A TCP read may carry zero, one, or several complete lines plus a partial
//! trailing line; the decoder buffers partials across reads. Oversize lines
//! and JSON parse failures surface as [`DecodeError`] so the caller can
//! count them, but they never abort the stream: the decoder resynchronizes
//! at the next newline.

use thiserror::Error;

use crate::message::Message;

/// A frame the decoder could not turn into a message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line exceeds {limit} bytes")]
    Oversize { limit: usize },

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Incremental line decoder with a per-line size cap.
pub struct LineDecoder {
    buf: Vec<u8>,
    max_line: usize,
    /// Discarding the remainder of an oversize line until its newline.
    skipping: bool,
}

impl LineDecoder {
    pub fn new(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line,
            skipping: false,
        }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pull the next complete frame, if one is buffered.
    ///
    /// Returns `None` when more bytes are needed. Empty lines are skipped
    /// silently.
    pub fn next_frame(&mut self) -> Option<Result<Message, DecodeError>> {
        loop {
            let newline = self.buf.iter().position(|&b| b == b'\n');

            if self.skipping {
                match newline {
                    Some(i) => {
                        self.buf.drain(..=i);
                        self.skipping = false;
                        continue;
                    }
                    None => {
                        self.buf.clear();
                        return None;
                    }
                }
            }

            let Some(i) = newline else {
                if self.buf.len() > self.max_line {
                    // Discard what we have and keep discarding until the
                    // line finally ends.
                    self.buf.clear();
                    self.skipping = true;
                    return Some(Err(DecodeError::Oversize {
                        limit: self.max_line,
                    }));
                }
                return None;
            };

            if i > self.max_line {
                self.buf.drain(..=i);
                return Some(Err(DecodeError::Oversize {
                    limit: self.max_line,
                }));
            }

            let line: Vec<u8> = self.buf.drain(..=i).collect();
            let line = &line[..line.len() - 1];
            let line = if line.last() == Some(&b'\r') {
                &line[..line.len() - 1]
            } else {
                line
            };

            if line.is_empty() {
                continue;
            }

            return Some(serde_json::from_slice::<Message>(line).map_err(DecodeError::from));
        }
    }
}
