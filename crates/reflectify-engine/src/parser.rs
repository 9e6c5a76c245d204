//! Reply extraction: free text pass-through and embedded JSON objects.
//!
//! Analysis replies are prose-wrapped more often than not ("Here is the
//! analysis: {...}"), sometimes inside a code fence. The scanner finds every
//! complete top-level `{...}` span and only accepts a reply carrying exactly
//! one of them.

use std::ops::Range;

use serde_json::{Map, Value};

use crate::error::{EngineError, ExtractionError};

/// Default cap on reply size the scanner will look at.
pub const DEFAULT_MAX_SCAN_BYTES: usize = 64 * 1024;
/// Default cap on object nesting inside a candidate.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Turns raw service replies into usable values.
#[derive(Debug, Clone, Copy)]
pub struct ResponseExtractor {
    max_scan_bytes: usize,
    max_depth: usize,
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCAN_BYTES, DEFAULT_MAX_DEPTH)
    }
}

impl ResponseExtractor {
    pub fn new(max_scan_bytes: usize, max_depth: usize) -> Self {
        Self {
            max_scan_bytes,
            max_depth: max_depth.max(1),
        }
    }

    /// Free-text reply, trimmed. An all-whitespace reply is `EmptyReply`.
    pub fn extract_text(&self, raw: &str) -> Result<String, EngineError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyReply);
        }
        Ok(text.to_string())
    }

    /// The single JSON object embedded in `raw`.
    pub fn extract_object(&self, raw: &str) -> Result<Map<String, Value>, ExtractionError> {
        let spans = self.candidate_spans(raw)?;
        let span = match spans.as_slice() {
            [] => return Err(ExtractionError::NoObject),
            [only] => only.clone(),
            many => return Err(ExtractionError::Ambiguous { count: many.len() }),
        };

        serde_json::from_str::<Map<String, Value>>(&raw[span])
            .map_err(|e| ExtractionError::Malformed(e.to_string()))
    }

    /// Byte ranges of every complete top-level `{...}` span.
    ///
    /// Outside a candidate, quotes and closing braces are prose and ignored.
    /// Inside one, string literals (with escapes) are skipped so braces in
    /// them do not count. An unterminated trailing candidate is dropped.
    pub fn candidate_spans(&self, raw: &str) -> Result<Vec<Range<usize>>, ExtractionError> {
        if raw.len() > self.max_scan_bytes {
            return Err(ExtractionError::TooLarge {
                len: raw.len(),
                limit: self.max_scan_bytes,
            });
        }

        let mut spans = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        // Braces and quotes are ASCII, so a byte scan never splits a char
        // that matters.
        for (i, byte) in raw.bytes().enumerate() {
            if depth == 0 {
                if byte == b'{' {
                    start = i;
                    depth = 1;
                }
                continue;
            }

            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => in_string = true,
                b'{' => {
                    depth += 1;
                    if depth > self.max_depth {
                        return Err(ExtractionError::TooDeep {
                            limit: self.max_depth,
                        });
                    }
                }
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(start..i + 1);
                    }
                }
                _ => {}
            }
        }

        Ok(spans)
    }
}
