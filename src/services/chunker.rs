//! Recursive character text splitting and page-aware chunk assembly.
//!
//! Splits on paragraph, then line, then word boundaries, falling back to a
//! hard character cut, and merges pieces into overlapping chunks.

use crate::services::extraction::PageText;

/// Target chunk size in characters.
pub const CHUNK_SIZE: usize = 2000;

/// Overlap carried between consecutive chunks, in characters.
pub const CHUNK_OVERLAP: usize = 150;

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A chunk of text with the page numbers it came from, prior to embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftChunk {
    pub content: String,
    pub pages: Vec<i32>,
}

/// Split text into chunks using the default size and overlap.
pub fn split_text(text: &str) -> Vec<String> {
    split_with(text, CHUNK_SIZE, CHUNK_OVERLAP)
}

/// Split text into chunks of at most `chunk_size` characters with
/// `chunk_overlap` characters of trailing context repeated between them.
pub fn split_with(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    split_recursive(text, chunk_size, chunk_overlap, &SEPARATORS)
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    let Some((&separator, rest)) = separators.split_first() else {
        return hard_cut(text, chunk_size);
    };

    if !text.contains(separator) {
        if text.chars().count() <= chunk_size {
            return vec![text.to_string()];
        }
        return split_recursive(text, chunk_size, chunk_overlap, rest);
    }

    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for piece in text.split(separator) {
        if piece.chars().count() <= chunk_size {
            pending.push(piece.to_string());
        } else {
            if !pending.is_empty() {
                chunks.extend(merge_pieces(&pending, separator, chunk_size, chunk_overlap));
                pending.clear();
            }
            chunks.extend(split_recursive(piece, chunk_size, chunk_overlap, rest));
        }
    }
    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, separator, chunk_size, chunk_overlap));
    }
    chunks
}

/// Greedily join pieces into chunks, retaining trailing pieces as overlap.
fn merge_pieces(
    pieces: &[String],
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let sep_len = separator.chars().count();
    let mut chunks = Vec::new();
    let mut window: std::collections::VecDeque<&String> = std::collections::VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = piece.chars().count();
        let extra = if window.is_empty() { 0 } else { sep_len };

        if total + extra + len > chunk_size && !window.is_empty() {
            chunks.push(join_window(&window, separator));
            while total > chunk_overlap
                || (total + extra + len > chunk_size && total > 0)
            {
                let Some(front) = window.pop_front() else { break };
                total -= front.chars().count();
                if !window.is_empty() {
                    total -= sep_len;
                }
            }
        }

        if !window.is_empty() {
            total += sep_len;
        }
        window.push_back(piece);
        total += len;
    }

    if !window.is_empty() {
        chunks.push(join_window(&window, separator));
    }
    chunks
}

fn join_window(window: &std::collections::VecDeque<&String>, separator: &str) -> String {
    window
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Last-resort split at exact character offsets.
fn hard_cut(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// Assemble chunks for a document's pages.
///
/// Pages in `special_pages` (and all pages when `page_per_chunk` is set)
/// become standalone chunks; everything else goes through the recursive
/// splitter per page, so every chunk carries exact page attribution.
pub fn chunk_pages(pages: &[PageText], page_per_chunk: bool, special_pages: &[i32]) -> Vec<DraftChunk> {
    let mut chunks = Vec::new();

    for page in pages {
        let text = page.text.trim();
        if text.is_empty() {
            continue;
        }

        if page_per_chunk || special_pages.contains(&page.number) {
            chunks.push(DraftChunk {
                content: text.to_string(),
                pages: vec![page.number],
            });
            continue;
        }

        for content in split_text(text) {
            chunks.push(DraftChunk {
                content,
                pages: vec![page.number],
            });
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: i32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_with("hello world", 100, 10);
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_with("", 100, 10).is_empty());
        assert!(split_with("   \n\n  ", 100, 10).is_empty());
    }

    #[test]
    fn paragraphs_split_before_lines() {
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird paragraph here";
        let chunks = split_with(text, 25, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "first paragraph here");
    }

    #[test]
    fn chunks_respect_size_limit() {
        let words = vec!["word"; 200].join(" ");
        for chunk in split_with(&words, 50, 10) {
            assert!(chunk.chars().count() <= 50, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn overlap_repeats_trailing_content() {
        let words: Vec<String> = (0..30).map(|i| format!("w{i:02}")).collect();
        let text = words.join(" ");
        let chunks = split_with(&text, 40, 12);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail_word = pair[0].split(' ').next_back().unwrap();
            assert!(
                pair[1].contains(tail_word),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn unbroken_text_is_hard_cut() {
        let text = "x".repeat(95);
        let chunks = split_with(&text, 30, 5);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
    }

    #[test]
    fn multibyte_text_cuts_on_char_boundaries() {
        let text = "ü".repeat(50);
        let chunks = split_with(&text, 20, 0);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn page_per_chunk_keeps_pages_whole() {
        let pages = vec![page(1, "a b c"), page(2, "d e f")];
        let chunks = chunk_pages(&pages, true, &[]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "a b c");
        assert_eq!(chunks[0].pages, vec![1]);
        assert_eq!(chunks[1].pages, vec![2]);
    }

    #[test]
    fn special_pages_become_standalone_chunks() {
        let long_text = vec!["word"; 1200].join(" ");
        let pages = vec![page(1, &long_text), page(2, &long_text)];
        let chunks = chunk_pages(&pages, false, &[2]);

        let page1_chunks: Vec<_> = chunks.iter().filter(|c| c.pages == vec![1]).collect();
        let page2_chunks: Vec<_> = chunks.iter().filter(|c| c.pages == vec![2]).collect();
        assert!(page1_chunks.len() > 1, "regular page should be split");
        assert_eq!(page2_chunks.len(), 1, "special page should stay whole");
    }

    #[test]
    fn blank_pages_are_skipped() {
        let pages = vec![page(1, "  \n "), page(2, "content")];
        let chunks = chunk_pages(&pages, false, &[]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].pages, vec![2]);
    }
}
