//! Recursive text chunking.
//!
//! Text is split recursively over an ordered separator list: fragments that
//! fit the budget are kept whole, oversize fragments fall through to the
//! next separator, and when all separators are exhausted the fragment is
//! sliced at a fixed stride of `chunk_size − overlap`. Adjacent small
//! fragments are merged back up to the budget, then each chunk (except the
//! first) is extended backwards so consecutive chunks share the last
//! `overlap` characters. Offsets are in characters, not bytes.

use serde::Serialize;

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk length in characters, overlap included.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
    /// Separators tried in order, coarsest first.
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 64,
            separators: vec!["\n\n".into(), "\n".into(), ". ".into(), " ".into()],
        }
    }
}

/// One chunk of a larger text.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// The chunk text, overlap prefix included.
    pub text: String,
    /// Position in the chunk sequence.
    pub index: usize,
    /// Start offset into the original text, in characters.
    pub char_start: usize,
    /// End offset (exclusive) into the original text, in characters.
    pub char_end: usize,
    /// Length in characters (`char_end - char_start`).
    pub char_count: usize,
    /// Whitespace-delimited word count.
    pub word_count: usize,
}

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let chunk_size = config.chunk_size.max(1);
    let overlap = config.overlap.min(chunk_size.saturating_sub(1));
    // Merged spans stay within this budget so the overlap prefix never
    // pushes a chunk past chunk_size.
    let budget = chunk_size - overlap;

    let mut spans: Vec<(usize, usize)> = Vec::new();
    split_spans(&chars, 0, chars.len(), &config.separators, budget, &mut spans);

    // Merge adjacent small fragments back up to the budget
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in spans {
        if let Some(last) = merged.last_mut() {
            if end - last.0 <= budget {
                last.1 = end;
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
        .iter()
        .enumerate()
        .map(|(index, &(start, end))| {
            let overlapped_start = if index == 0 {
                start
            } else {
                start.saturating_sub(overlap).max(merged[index - 1].0)
            };
            let text: String = chars[overlapped_start..end].iter().collect();
            Chunk {
                index,
                char_start: overlapped_start,
                char_end: end,
                char_count: end - overlapped_start,
                word_count: text.split_whitespace().count(),
                text,
            }
        })
        .collect()
}

/// Produce non-overlapping spans, each within `budget`, recursing through
/// the separator list and falling back to fixed-stride slicing.
fn split_spans(
    chars: &[char],
    start: usize,
    end: usize,
    separators: &[String],
    budget: usize,
    out: &mut Vec<(usize, usize)>,
) {
    if end - start <= budget {
        out.push((start, end));
        return;
    }

    let Some((separator, rest)) = separators.split_first() else {
        // All separators exhausted: fixed-stride slices
        let mut cursor = start;
        while cursor < end {
            out.push((cursor, (cursor + budget).min(end)));
            cursor += budget;
        }
        return;
    };

    let sep: Vec<char> = separator.chars().collect();
    let mut pieces: Vec<(usize, usize)> = Vec::new();
    let mut piece_start = start;
    let mut i = start;
    // Split after each separator occurrence, keeping it with the preceding piece
    while i + sep.len() <= end {
        if chars[i..i + sep.len()] == sep[..] {
            pieces.push((piece_start, i + sep.len()));
            i += sep.len();
            piece_start = i;
        } else {
            i += 1;
        }
    }
    if piece_start < end {
        pieces.push((piece_start, end));
    }

    if pieces.len() <= 1 {
        // Separator absent in this fragment: try the next one
        split_spans(chars, start, end, rest, budget, out);
        return;
    }

    for (piece_start, piece_end) in pieces {
        if piece_end - piece_start <= budget {
            out.push((piece_start, piece_end));
        } else {
            split_spans(chars, piece_start, piece_end, rest, budget, out);
        }
    }
}
