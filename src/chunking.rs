//! Fixed-size text chunking with overlap.
//!
//! Page text is split into overlapping character windows by [`chunk_text`].
//! Chunking never crosses a page boundary; the ingestion pipeline calls this
//! once per page.

/// Split `text` into overlapping passages of at most `chunk_size` characters.
///
/// The whole text is trimmed first. If the trimmed text fits in one chunk it
/// is returned as the sole passage; an empty trimmed text yields nothing.
/// Otherwise each window `[start, start + chunk_size)` is trimmed and kept
/// if non-empty, and the next window starts `chunk_size - overlap`
/// characters later.
///
/// The returned iterator is lazy and finite. `overlap >= chunk_size` must be
/// rejected by configuration validation upstream; if it slips through, the
/// iterator stops after the first window instead of looping forever.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> ChunkWindows {
    ChunkWindows {
        chars: text.trim().chars().collect(),
        chunk_size,
        step: chunk_size.saturating_sub(overlap),
        start: 0,
    }
}

/// Lazy window iterator produced by [`chunk_text`].
#[derive(Debug, Clone)]
pub struct ChunkWindows {
    chars: Vec<char>,
    chunk_size: usize,
    step: usize,
    start: usize,
}

impl Iterator for ChunkWindows {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let len = self.chars.len();
        if self.start >= len || self.chunk_size == 0 {
            return None;
        }

        // Short text: one passage covering everything.
        if len <= self.chunk_size {
            self.start = len;
            return Some(self.chars.iter().collect());
        }

        while self.start < len {
            let end = (self.start + self.chunk_size).min(len);
            let window: String = self.chars[self.start..end].iter().collect();
            if self.step == 0 {
                // Non-advancing window, stop rather than iterate forever.
                self.start = len;
            } else {
                self.start += self.step;
            }
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        None
    }
}
