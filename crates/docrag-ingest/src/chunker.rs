//! Recursive bounded-length chunker with overlap.
//!
//! Paragraph blocks are split at progressively smaller boundaries
//! (paragraph breaks, lines, sentences, words) before falling back to
//! hard character cuts; table blocks pass through as one atomic chunk
//! each. Every chunk gets a deterministic content-derived identity.

use tracing::debug;

use docrag_core::{Block, Chunk, ChunkType, ChunkingConfig};

/// Separator ladder, tried largest-boundary first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Splits parsed blocks into identity-stable chunks.
pub struct Chunker {
    /// Target chunk length in characters.
    max_size: usize,

    /// Overlap carried between consecutive chunks, in characters.
    overlap: usize,
}

impl Chunker {
    pub fn new(max_size: usize, overlap: usize) -> Self {
        // Overlap must leave room for new content in every chunk.
        let overlap = overlap.min(max_size.saturating_sub(1));
        Self { max_size, overlap }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.max_size, config.overlap)
    }

    /// Chunk all blocks of one file. Paragraph blocks are split with
    /// overlap; tables become one atomic chunk each. `chunk_index` is
    /// assigned in stable order: split paragraph chunks first, then
    /// tables.
    pub fn chunk(&self, blocks: &[Block], source: &str, file_hash: &str) -> Vec<Chunk> {
        let mut pieces: Vec<(String, ChunkType, bool, Option<String>, Option<usize>)> = Vec::new();

        for block in blocks
            .iter()
            .filter(|b| b.block_type == ChunkType::Paragraph)
        {
            for (text, start) in self.split_with_offsets(&block.text) {
                pieces.push((
                    text,
                    ChunkType::Paragraph,
                    false,
                    block.section.clone(),
                    Some(start),
                ));
            }
        }

        for block in blocks.iter().filter(|b| b.block_type == ChunkType::Table) {
            pieces.push((
                block.text.clone(),
                ChunkType::Table,
                true,
                block.section.clone(),
                None,
            ));
        }

        debug!(
            "Chunked {} blocks into {} chunks (source: {})",
            blocks.len(),
            pieces.len(),
            source
        );

        pieces
            .into_iter()
            .enumerate()
            .map(|(idx, (text, chunk_type, is_atomic, section, start))| {
                Chunk::new(
                    &text,
                    chunk_type,
                    is_atomic,
                    section,
                    source,
                    file_hash,
                    idx as u32,
                    start,
                )
            })
            .collect()
    }

    /// Split one block's text, recording each piece's byte offset in the
    /// block. Pieces are exact substrings, so the offset is found by
    /// scanning forward from the previous piece (overlap makes pieces
    /// overlap-adjacent, never out of order).
    fn split_with_offsets(&self, text: &str) -> Vec<(String, usize)> {
        let pieces = self.split_text(text);

        let mut out = Vec::with_capacity(pieces.len());
        let mut search_from = 0;
        for piece in pieces {
            let start = text[search_from..]
                .find(&piece)
                .map(|p| p + search_from)
                .unwrap_or(search_from);
            // Next piece starts within or right after this one.
            search_from = start + 1;
            out.push((piece, start));
        }
        out
    }

    /// Split text into pieces of at most `max_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        if char_len(text) <= self.max_size {
            return vec![text.to_string()];
        }

        let Some((separator, rest)) = separators.split_first() else {
            return self.split_by_chars(text);
        };

        let parts: Vec<&str> = text.split(separator).collect();
        if parts.len() <= 1 {
            return self.split_recursive(text, rest);
        }

        // Oversized parts are broken down by the next separator before
        // the merge pass reassembles bounded windows.
        let mut pieces = Vec::new();
        for part in parts {
            if char_len(part) > self.max_size {
                pieces.extend(self.split_recursive(part, rest));
            } else {
                pieces.push(part.to_string());
            }
        }

        self.merge_pieces(pieces, separator)
    }

    /// Greedily merge pieces into windows of at most `max_size`
    /// characters, seeding each new window with the previous window's
    /// trailing pieces up to `overlap` characters.
    fn merge_pieces(&self, pieces: Vec<String>, separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);

        let mut chunks = Vec::new();
        let mut window: Vec<String> = Vec::new();
        let mut window_len = 0;
        let mut fresh = 0; // pieces added since the last flush

        for piece in pieces {
            let piece_len = char_len(&piece);
            let join_len = if window.is_empty() { 0 } else { sep_len };

            if !window.is_empty() && window_len + join_len + piece_len > self.max_size {
                if fresh > 0 {
                    chunks.push(window.join(separator));
                }

                // Retain the window tail as overlap for the next chunk.
                let mut tail: Vec<String> = Vec::new();
                let mut tail_len = 0;
                for prev in window.iter().rev() {
                    let extra = char_len(prev) + if tail.is_empty() { 0 } else { sep_len };
                    if tail_len + extra > self.overlap {
                        break;
                    }
                    tail_len += extra;
                    tail.push(prev.clone());
                }
                tail.reverse();
                window = tail;
                window_len = tail_len;
                fresh = 0;

                // Drop the tail if even it cannot fit alongside the piece.
                if !window.is_empty() && window_len + sep_len + piece_len > self.max_size {
                    window.clear();
                    window_len = 0;
                }
            }

            if !window.is_empty() {
                window_len += sep_len;
            }
            window_len += piece_len;
            window.push(piece);
            fresh += 1;
        }

        if !window.is_empty() && fresh > 0 {
            chunks.push(window.join(separator));
        }

        chunks
    }

    /// Hard character cuts with overlap, the last resort.
    fn split_by_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let stride = self.max_size.saturating_sub(self.overlap).max(1);

        let mut out = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.max_size).min(chars.len());
            out.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += stride;
        }
        out
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
