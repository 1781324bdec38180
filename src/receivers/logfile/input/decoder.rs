// SPDX-License-Identifier: Apache-2.0

//! Turns raw chunks into complete, decoded lines.
//!
//! Bytes after the last separator in a chunk are held back in a carry-over
//! buffer and prepended to the next chunk, so a line (or a multi-byte
//! character) split across reads is only decoded once it is complete.

use encoding_rs::Encoding;

use crate::receivers::logfile::config::LineSeparator;

/// Longest byte sequence of a single character in the supported encodings
const MAX_CHAR_LEN: usize = 4;

/// Result of feeding one chunk
#[derive(Debug, PartialEq, Eq)]
pub enum Assembled {
    /// No separator in the chunk, everything went to carry-over.
    /// `truncated` is set when the carry-over hit its limit.
    Pending { truncated: bool },
    /// Complete, non-empty lines in file order
    Lines(Vec<String>),
    /// The completed bytes could not be decoded and were dropped
    Undecodable { bytes: usize },
}

#[derive(Debug, Clone)]
pub struct LineAssembler {
    encoding: &'static Encoding,
    separator: LineSeparator,
    max_carry_over: usize,
}

impl LineAssembler {
    pub fn new(
        encoding: &'static Encoding,
        separator: LineSeparator,
        max_carry_over: usize,
    ) -> Self {
        Self {
            encoding,
            separator,
            max_carry_over,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn separator(&self) -> LineSeparator {
        self.separator
    }

    pub fn push(&self, carry_over: &mut Vec<u8>, chunk: &[u8]) -> Assembled {
        let separator = self.separator.byte();

        let cut = match chunk.iter().rposition(|b| *b == separator) {
            Some(idx) => idx + 1,
            None => {
                carry_over.extend_from_slice(chunk);
                let truncated = carry_over.len() > self.max_carry_over;
                if truncated {
                    self.truncate_carry_over(carry_over);
                }
                return Assembled::Pending { truncated };
            }
        };

        let mut unit = std::mem::take(carry_over);
        unit.extend_from_slice(&chunk[..cut]);
        carry_over.extend_from_slice(&chunk[cut..]);

        match self
            .encoding
            .decode_without_bom_handling_and_without_replacement(&unit)
        {
            Some(text) => Assembled::Lines(
                text.split(self.separator.as_str())
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            None => Assembled::Undecodable { bytes: unit.len() },
        }
    }

    /// Cut the carry-over to the limit, then back to the nearest character
    /// boundary so the kept bytes still decode.
    fn truncate_carry_over(&self, carry_over: &mut Vec<u8>) {
        carry_over.truncate(self.max_carry_over);

        let len = carry_over.len();
        let boundary = (len.saturating_sub(MAX_CHAR_LEN - 1)..=len)
            .rev()
            .find(|end| {
                self.encoding
                    .decode_without_bom_handling_and_without_replacement(&carry_over[..*end])
                    .is_some()
            });

        // Invalid bytes earlier in the line are left for the decode step to reject
        if let Some(end) = boundary {
            carry_over.truncate(end);
        }
    }
}
