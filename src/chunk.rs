//! Overlapping sliding-window text chunker.
//!
//! Splits document text into windows of `chunk_size` characters with
//! `overlap` characters shared between consecutive windows. Unless a
//! window reaches the end of the text, its end is snapped backward to
//! just after the nearest boundary character (space, newline, tab, `.`,
//! `!`, `?` by default) found within the last `boundary_lookback`
//! characters, so words are not severed mid-window. Windows with no
//! boundary in the lookback are hard-cut at `chunk_size`.
//!
//! Each window is trimmed of surrounding whitespace; windows that trim to
//! nothing are dropped. Text no longer than `chunk_size` yields a single
//! trimmed chunk, and empty input yields no chunks at all.
//!
//! The splitter is pure and deterministic: the same `(text, options)`
//! always produces the same sequence. [`ChunkIter`] yields one window at
//! a time so ingestion never materializes the full chunk list.
//!
//! All offsets and sizes are in characters, not bytes; multi-byte UTF-8
//! input is never sliced mid-character.

/// Tuning knobs for the chunker.
#[derive(Debug, Clone)]
pub struct ChunkerOptions {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows.
    pub overlap: usize,
    /// How far back from the window end to search for a boundary.
    pub boundary_lookback: usize,
    /// Characters treated as word/sentence boundaries.
    pub boundary_chars: String,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            boundary_lookback: 100,
            boundary_chars: " \n\t.!?".to_string(),
        }
    }
}

/// One extracted window.
///
/// `start` and `end` are character offsets of the untrimmed window within
/// the source text; `text` is the trimmed window content.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPiece {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Streaming iterator over chunk windows.
pub struct ChunkIter<'a> {
    text: &'a str,
    opts: ChunkerOptions,
    total_chars: usize,
    start_char: usize,
    start_byte: usize,
    done: bool,
}

impl<'a> ChunkIter<'a> {
    pub fn new(text: &'a str, opts: &ChunkerOptions) -> Self {
        Self {
            text,
            opts: opts.clone(),
            total_chars: text.chars().count(),
            start_char: 0,
            start_byte: 0,
            done: false,
        }
    }
}

/// Byte offset `chars` characters past `byte`, clamped to the text end.
fn advance(text: &str, byte: usize, chars: usize) -> usize {
    if chars == 0 {
        return byte;
    }
    text[byte..]
        .char_indices()
        .nth(chars)
        .map(|(i, _)| byte + i)
        .unwrap_or(text.len())
}

impl Iterator for ChunkIter<'_> {
    type Item = ChunkPiece;

    fn next(&mut self) -> Option<ChunkPiece> {
        if self.done {
            return None;
        }

        // Short input: one trimmed chunk, or nothing at all.
        if self.total_chars <= self.opts.chunk_size {
            self.done = true;
            let trimmed = self.text.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(ChunkPiece {
                start: 0,
                end: self.total_chars,
                text: trimmed.to_string(),
            });
        }

        loop {
            if self.start_char >= self.total_chars {
                self.done = true;
                return None;
            }

            let window_start_char = self.start_char;
            let window_start_byte = self.start_byte;
            let mut end_char = window_start_char + self.opts.chunk_size;
            let mut end_byte;
            let reached_end = end_char >= self.total_chars;

            if reached_end {
                end_char = self.total_chars;
                end_byte = self.text.len();
            } else {
                end_byte = advance(self.text, window_start_byte, self.opts.chunk_size);

                // Snap the window end backward to just after the nearest
                // boundary within the lookback. The scan covers character
                // positions (lower, end], highest position first.
                let lower = window_start_char
                    + self
                        .opts
                        .chunk_size
                        .saturating_sub(self.opts.boundary_lookback);
                if end_char > lower {
                    let scan_lo_byte =
                        advance(self.text, window_start_byte, lower + 1 - window_start_char);
                    let scan_hi_byte = advance(self.text, end_byte, 1);
                    let scan = &self.text[scan_lo_byte..scan_hi_byte];
                    let last_boundary = scan
                        .char_indices()
                        .enumerate()
                        .filter(|(_, (_, c))| self.opts.boundary_chars.contains(*c))
                        .last();
                    if let Some((k, (pos, c))) = last_boundary {
                        // Window ends just after the boundary character.
                        end_char = lower + 1 + k + 1;
                        end_byte = scan_lo_byte + pos + c.len_utf8();
                    }
                }
            }

            let piece = self.text[window_start_byte..end_byte].trim();

            if reached_end {
                self.done = true;
            } else {
                // Forward progress is guaranteed even when overlap >= chunk_size.
                let next_start = end_char
                    .saturating_sub(self.opts.overlap)
                    .max(window_start_char + 1);
                self.start_byte = advance(
                    self.text,
                    window_start_byte,
                    next_start - window_start_char,
                );
                self.start_char = next_start;
            }

            if !piece.is_empty() {
                return Some(ChunkPiece {
                    start: window_start_char,
                    end: end_char,
                    text: piece.to_string(),
                });
            }
            if self.done {
                return None;
            }
        }
    }
}

/// Split `text` into chunk strings, materializing the whole sequence.
pub fn chunk_text(text: &str, opts: &ChunkerOptions) -> Vec<String> {
    ChunkIter::new(text, opts).map(|p| p.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(chunk_size: usize, overlap: usize) -> ChunkerOptions {
        ChunkerOptions {
            chunk_size,
            overlap,
            ..ChunkerOptions::default()
        }
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("The quick brown fox jumps.", &ChunkerOptions::default());
        assert_eq!(chunks, vec!["The quick brown fox jumps.".to_string()]);
    }

    #[test]
    fn test_short_text_is_trimmed() {
        let chunks = chunk_text("  hello world \n", &opts(100, 10));
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(chunk_text("", &ChunkerOptions::default()).is_empty());
        assert!(chunk_text("   \n\t ", &ChunkerOptions::default()).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let text = "one two three four five six seven eight nine ten ".repeat(40);
        let a = chunk_text(&text, &opts(100, 20));
        let b = chunk_text(&text, &opts(100, 20));
        assert_eq!(a, b);
        assert!(a.len() > 1);
    }

    #[test]
    fn test_2500_chars_default_options_three_chunks() {
        let text: String = "lorem ipsum dolor sit amet ".repeat(100).chars().take(2500).collect();
        assert_eq!(text.chars().count(), 2500);

        let pieces: Vec<ChunkPiece> =
            ChunkIter::new(&text, &ChunkerOptions::default()).collect();
        assert_eq!(pieces.len(), 3);

        // Windows cover the whole document with the configured overlap.
        assert_eq!(pieces[0].start, 0);
        assert_eq!(pieces[2].end, 2500);
        for pair in pieces.windows(2) {
            assert!(pair[1].start <= pair[0].end - 200);
            assert!(pair[1].start > pair[0].start);
        }

        // Each chunk body is distinct.
        assert_ne!(pieces[0].text, pieces[1].text);
        assert_ne!(pieces[1].text, pieces[2].text);
    }

    #[test]
    fn test_overlap_invariant() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa ".repeat(10);
        let overlap = 10;
        let pieces: Vec<ChunkPiece> = ChunkIter::new(&text, &opts(50, overlap)).collect();
        assert!(pieces.len() > 2);
        for pair in pieces.windows(2) {
            assert!(pair[1].start <= pair[0].end - overlap);
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn test_no_boundary_hard_cut() {
        let text = "a".repeat(250);
        let pieces: Vec<ChunkPiece> = ChunkIter::new(&text, &opts(100, 0)).collect();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].text.len(), 100);
        assert_eq!(pieces[1].text.len(), 100);
        assert_eq!(pieces[2].text.len(), 50);
        assert_eq!((pieces[0].start, pieces[0].end), (0, 100));
        assert_eq!((pieces[1].start, pieces[1].end), (100, 200));
        assert_eq!((pieces[2].start, pieces[2].end), (200, 250));
    }

    #[test]
    fn test_boundary_snap_avoids_severed_word() {
        let text = "abcde fghij klmno pqrst uvwxy";
        let options = ChunkerOptions {
            chunk_size: 8,
            overlap: 2,
            boundary_lookback: 8,
            ..ChunkerOptions::default()
        };
        let pieces: Vec<ChunkPiece> = ChunkIter::new(text, &options).collect();
        // First window [0, 8) snaps back to the space after "abcde".
        assert_eq!(pieces[0].text, "abcde");
        assert_eq!(pieces[0].end, 6);
    }

    #[test]
    fn test_overlap_ge_chunk_size_makes_progress() {
        let text = "abcdefghij"; // 10 chars, no boundaries
        let pieces: Vec<ChunkPiece> = ChunkIter::new(text, &opts(5, 10)).collect();
        assert!(!pieces.is_empty());
        // Start offsets strictly increase, so iteration terminates.
        for pair in pieces.windows(2) {
            assert!(pair[1].start > pair[0].start);
        }
        assert_eq!(pieces.last().map(|p| p.end), Some(10));
    }

    #[test]
    fn test_multibyte_input_never_panics() {
        let text = "こんにちは世界。これはテストです。".repeat(20);
        let pieces: Vec<ChunkPiece> = ChunkIter::new(&text, &opts(40, 5)).collect();
        assert!(!pieces.is_empty());
        for p in &pieces {
            assert!(!p.text.is_empty());
        }
    }

    #[test]
    fn test_configurable_boundary_set() {
        let text = "aaaa;bbbb;cccc;dddd;eeee";
        let options = ChunkerOptions {
            chunk_size: 10,
            overlap: 0,
            boundary_lookback: 10,
            boundary_chars: ";".to_string(),
        };
        let pieces: Vec<ChunkPiece> = ChunkIter::new(text, &options).collect();
        // Every non-final window ends just after a semicolon.
        for p in &pieces[..pieces.len() - 1] {
            assert!(p.text.ends_with(';'), "window {:?} not snapped", p);
        }
    }
}
