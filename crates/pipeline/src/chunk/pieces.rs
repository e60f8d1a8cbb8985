//! Recursive piece production.

use unicode_segmentation::UnicodeSegmentation;

/// A separator-delimited span of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Piece {
    pub start: usize,
    pub end: usize,
    pub chars: usize,
}

enum Boundary<'a> {
    /// Cut after each occurrence of the separator
    Separator(&'a str),
    /// Cut between grapheme clusters
    Graphemes,
    /// No configured separator applies
    Unsplittable,
}

/// Cut `text` into pieces that concatenate back to it exactly.
///
/// Every piece is at most `max_size` characters unless it is a single token
/// that no configured separator can cut. Trailing separators never push a
/// piece over the limit: they are detached into pieces of their own.
pub(crate) fn split_pieces(text: &str, max_size: usize, separators: &[String]) -> Vec<Piece> {
    let fallback = [String::new()];
    let separators = if separators.is_empty() { &fallback[..] } else { separators };

    let mut pieces = Vec::new();
    collect(text, 0, max_size, separators, separators, &mut pieces);
    pieces
}

fn collect(
    text: &str,
    offset: usize,
    max_size: usize,
    separators: &[String],
    all: &[String],
    pieces: &mut Vec<Piece>,
) {
    let (boundary, remaining) = pick_boundary(text, separators);

    for (start, end) in spans(text, &boundary) {
        let span = &text[start..end];
        let chars = span.chars().count();

        if chars <= max_size {
            pieces.push(Piece {
                start: offset + start,
                end: offset + end,
                chars,
            });
        } else if !remaining.is_empty() {
            collect(span, offset + start, max_size, remaining, all, pieces);
        } else {
            push_oversized(span, offset + start, max_size, all, pieces);
        }
    }
}

/// Emit a span no remaining separator can cut, peeling trailing separators
/// off until the token itself is what is left.
fn push_oversized(span: &str, offset: usize, max_size: usize, all: &[String], pieces: &mut Vec<Piece>) {
    let mut cuts = vec![span.len()];
    let mut body_end = span.len();

    while span[..body_end].chars().count() > max_size {
        let body = &span[..body_end];
        let Some(separator) = all
            .iter()
            .find(|s| !s.is_empty() && s.len() < body.len() && body.ends_with(s.as_str()))
        else {
            break;
        };
        body_end -= separator.len();
        cuts.push(body_end);
    }

    let mut start = 0;
    for &end in cuts.iter().rev() {
        let piece = &span[start..end];
        pieces.push(Piece {
            start: offset + start,
            end: offset + end,
            chars: piece.chars().count(),
        });
        start = end;
    }
}

/// First separator present in `text`, plus the lower-priority ones left for
/// re-splitting oversized pieces.
fn pick_boundary<'a>(text: &str, separators: &'a [String]) -> (Boundary<'a>, &'a [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (Boundary::Graphemes, &[]);
        }
        if text.contains(separator.as_str()) {
            return (Boundary::Separator(separator), &separators[i + 1..]);
        }
    }
    (Boundary::Unsplittable, &[])
}

fn spans(text: &str, boundary: &Boundary<'_>) -> Vec<(usize, usize)> {
    match boundary {
        Boundary::Separator(separator) => {
            let mut spans = Vec::new();
            let mut last = 0;
            for (at, matched) in text.match_indices(separator) {
                let end = at + matched.len();
                spans.push((last, end));
                last = end;
            }
            if last < text.len() {
                spans.push((last, text.len()));
            }
            spans
        }
        Boundary::Graphemes => text
            .grapheme_indices(true)
            .map(|(at, grapheme)| (at, at + grapheme.len()))
            .collect(),
        Boundary::Unsplittable => vec![(0, text.len())],
    }
}
