//! Greedy window merging with whole-piece overlap.

use super::pieces::Piece;
use super::Chunk;
use std::collections::VecDeque;

/// Merge pieces into chunks of at most `max_size` characters.
///
/// After a window is emitted, pieces are dropped from its front until what
/// remains is no larger than `overlap` and leaves room for the next piece.
/// The remainder becomes the head of the next window.
pub(crate) fn merge_pieces(
    text: &str,
    pieces: &[Piece],
    max_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<Piece> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        if !window.is_empty() && total + piece.chars > max_size {
            chunks.push(window_chunk(text, &window, chunks.len()));

            while let Some(front) = window.front() {
                if total > overlap || total + piece.chars > max_size {
                    total -= front.chars;
                    window.pop_front();
                } else {
                    break;
                }
            }
        }

        window.push_back(*piece);
        total += piece.chars;
    }

    if !window.is_empty() {
        chunks.push(window_chunk(text, &window, chunks.len()));
    }

    chunks
}

fn window_chunk(text: &str, window: &VecDeque<Piece>, position: usize) -> Chunk {
    let start = window.front().map_or(0, |p| p.start);
    let end = window.back().map_or(start, |p| p.end);
    Chunk::new(position as u32, &text[start..end], start, end)
}
