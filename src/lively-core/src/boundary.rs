//! Safe cut-point detection over streamed text.
//!
//! A scanning buffer collects chunks since the last boundary and is
//! rescanned on every chunk, so punctuation and the whitespace after it may
//! arrive in different chunks.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Sentence end followed by whitespace, or a blank line.
    static ref RE_STRONG: Regex = Regex::new(r#"[.!?]+["'\x{201D}\x{2019})\]]*\s|\n[ \t]*\n"#)
        .expect("strong boundary regex");

    /// Clause punctuation or a dash followed by whitespace.
    static ref RE_WEAK: Regex =
        Regex::new(r"[,;:\x{2013}\x{2014}-]\s").expect("weak boundary regex");
}

/// How clean a cut point is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryStrength {
    /// End of a sentence or paragraph.
    Strong,
    /// End of a clause.
    Weak,
}

pub fn has_strong_boundary(text: &str) -> bool {
    RE_STRONG.is_match(text)
}

pub fn has_weak_boundary(text: &str) -> bool {
    RE_WEAK.is_match(text)
}

fn last_match_end(re: &Regex, text: &str) -> Option<usize> {
    re.find_iter(text).last().map(|m| m.end())
}

/// A boundary reported by [`BoundaryDetector::push`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBoundary {
    pub strength: BoundaryStrength,
    /// Text accumulated since the previous boundary.
    pub content: String,
    /// Byte offset in `content` just past the last cut point.
    pub end: usize,
    pub at_ms: u64,
}

/// Per-turn scanning state.
#[derive(Debug, Clone)]
pub struct BoundaryDetector {
    allow_weak: bool,
    min_gap_ms: u64,
    buffer: String,
    last_boundary_at: Option<u64>,
}

impl BoundaryDetector {
    pub fn new(allow_weak: bool, min_gap_ms: u64) -> Self {
        Self {
            allow_weak,
            min_gap_ms,
            buffer: String::new(),
            last_boundary_at: None,
        }
    }

    /// Append a chunk and report a boundary if one is present and the
    /// minimum gap since the previous boundary has elapsed. A boundary held
    /// back by the gap stays buffered and is reported on a later chunk.
    pub fn push(&mut self, chunk: &str, now_ms: u64) -> Option<DetectedBoundary> {
        self.buffer.push_str(chunk);

        let (strength, end) = if let Some(end) = last_match_end(&RE_STRONG, &self.buffer) {
            (BoundaryStrength::Strong, end)
        } else if self.allow_weak {
            (BoundaryStrength::Weak, last_match_end(&RE_WEAK, &self.buffer)?)
        } else {
            return None;
        };

        if let Some(last) = self.last_boundary_at {
            if now_ms.saturating_sub(last) < self.min_gap_ms {
                return None;
            }
        }

        self.last_boundary_at = Some(now_ms);
        Some(DetectedBoundary {
            strength,
            content: std::mem::take(&mut self.buffer),
            end,
            at_ms: now_ms,
        })
    }

    /// Text scanned since the last boundary.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_boundary_at = None;
    }
}
