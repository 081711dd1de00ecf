use crate::error::IndexError;
use crate::models::{Chunk, RagOptions};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Separators tried when snapping a chunk boundary, in priority order.
const SEPARATORS: [&str; 5] = [". ", ".\n", "\n\n", "\n", " "];

/// How many characters of content participate in the document id hash.
const DOCUMENT_ID_PREFIX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub const MIN_CHUNK_SIZE: usize = 100;
    pub const MAX_CHUNK_SIZE: usize = 2_000;

    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, IndexError> {
        if !(Self::MIN_CHUNK_SIZE..=Self::MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(IndexError::InvalidChunkConfig(format!(
                "chunk_size {} outside [{}, {}]",
                chunk_size,
                Self::MIN_CHUNK_SIZE,
                Self::MAX_CHUNK_SIZE
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Overlap actually applied when advancing. Clamped below `chunk_size`
    /// so the scan always makes forward progress.
    fn effective_overlap(&self) -> usize {
        self.overlap.min(self.chunk_size - 1)
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 50,
        }
    }
}

impl TryFrom<&RagOptions> for ChunkingConfig {
    type Error = IndexError;

    fn try_from(options: &RagOptions) -> Result<Self, IndexError> {
        Self::new(options.chunk_size, options.chunk_overlap)
    }
}

struct NormalizePatterns {
    disallowed: Regex,
    horizontal_ws: Regex,
    newline_padding: Regex,
    newline_runs: Regex,
}

fn normalize_patterns() -> &'static NormalizePatterns {
    static PATTERNS: OnceLock<NormalizePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| NormalizePatterns {
        disallowed: Regex::new(r#"[^\w\s.,!?;:'"()\-]"#).expect("static pattern"),
        horizontal_ws: Regex::new(r"[^\S\n]+").expect("static pattern"),
        newline_padding: Regex::new(r" *\n *").expect("static pattern"),
        newline_runs: Regex::new(r"\n{3,}").expect("static pattern"),
    })
}

/// Cleans raw text before chunking: drops characters outside the allowed
/// set, collapses horizontal whitespace runs to a single space, and caps
/// consecutive newlines at two so paragraph breaks survive for the
/// boundary search. Idempotent.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let patterns = normalize_patterns();
    let text = patterns.disallowed.replace_all(text, "");
    let text = patterns.horizontal_ws.replace_all(&text, " ");
    let text = patterns.newline_padding.replace_all(&text, "\n");
    let text = patterns.newline_runs.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Splits normalized text into overlapping, boundary-aware chunks.
///
/// Offsets are counted in characters over the normalized text. Chunks are
/// emitted in order with strictly increasing `chunk_index`; consecutive
/// character ranges overlap by roughly `overlap` and their union covers the
/// whole input with no gaps. Same input always yields the same sequence.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let total = chars.len();

    if total <= config.chunk_size {
        return vec![Chunk {
            text: normalized,
            chunk_index: 0,
            start_char: 0,
            end_char: total,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index = 0usize;

    while start < total {
        let mut end = start + config.chunk_size;

        if end < total {
            // Snap to the latest natural break in the window, unless every
            // candidate sits in the first half of it.
            let window = &chars[start..end];
            for separator in SEPARATORS {
                let sep_chars: Vec<char> = separator.chars().collect();
                if let Some(position) = rfind_chars(window, &sep_chars) {
                    if position > config.chunk_size / 2 {
                        end = start + position + sep_chars.len();
                        break;
                    }
                }
            }
        } else {
            end = total;
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                text: trimmed.to_string(),
                chunk_index,
                start_char: start,
                end_char: end,
            });
            chunk_index += 1;
        }

        let next = if end < total {
            end.saturating_sub(config.effective_overlap())
        } else {
            end
        };
        start = next.max(start + 1);
    }

    chunks
}

/// Last occurrence of `needle` in `haystack`, as a character offset.
fn rfind_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&index| &haystack[index..index + needle.len()] == needle)
}

/// Deterministic document id from the source name and a bounded content
/// prefix. Re-indexing the same (source, prefix) pair lands on the same id.
pub fn generate_document_id(source: &str, content: &str) -> String {
    let prefix: String = content.chars().take(DOCUMENT_ID_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(prefix.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig::new(chunk_size, overlap).expect("valid config")
    }

    #[test]
    fn normalize_collapses_whitespace_and_strips_symbols() {
        let input = "Pump \t pressure™   rose\u{00a9} sharply.";
        assert_eq!(normalize_text(input), "Pump pressure rose sharply.");
    }

    #[test]
    fn normalize_preserves_paragraph_breaks() {
        let input = "First paragraph.\n\n\n\nSecond   paragraph.";
        assert_eq!(
            normalize_text(input),
            "First paragraph.\n\nSecond paragraph."
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let input = "A  messy\t text!! with  \n\n\n breaks &&& symbols";
        let once = normalize_text(input);
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", ChunkingConfig::default()).is_empty());
        assert!(chunk_text("   \n \t ", ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn short_text_yields_single_normalized_chunk() {
        let text = "A short  document about   valves.";
        let chunks = chunk_text(text, ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, normalize_text(text));
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, chunks[0].text.chars().count());
    }

    #[test]
    fn long_uniform_text_produces_expected_chunk_grid() {
        let text = "A".repeat(1_000);
        let chunks = chunk_text(&text, config(200, 20));

        // No separators anywhere, so every boundary is a hard boundary:
        // windows of 200 advancing by 180.
        assert_eq!(chunks.len(), 6);
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, position);
            assert!(chunk.end_char - chunk.start_char <= 200);
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].start_char >= pair[0].start_char);
            assert_eq!(pair[0].end_char - pair[1].start_char, 20);
        }
    }

    #[test]
    fn boundaries_snap_to_sentence_ends() {
        let sentence = "The relief valve opens at forty bar. ";
        let text = sentence.repeat(30);
        let chunks = chunk_text(&text, config(200, 20));

        assert!(chunks.len() >= 2);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.text.ends_with('.'),
                "chunk should end on a sentence boundary: {:?}",
                chunk.text
            );
        }
    }

    #[test]
    fn chunk_ranges_cover_text_without_gaps() {
        let text = "word ".repeat(400);
        let chunks = chunk_text(&text, config(150, 30));
        let normalized_len = normalize_text(&text).chars().count();

        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks.last().expect("chunks").end_char, normalized_len);
        for pair in chunks.windows(2) {
            assert!(
                pair[1].start_char <= pair[0].end_char,
                "gap between consecutive chunks"
            );
        }
    }

    #[test]
    fn oversized_overlap_still_terminates() {
        let text = "B".repeat(300);
        let chunks = chunk_text(&text, config(100, 500));
        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert!(pair[1].start_char > pair[0].start_char);
        }
    }

    #[test]
    fn chunk_size_outside_valid_range_is_rejected() {
        assert!(ChunkingConfig::new(50, 10).is_err());
        assert!(ChunkingConfig::new(3_000, 10).is_err());
        assert!(ChunkingConfig::new(100, 0).is_ok());
    }

    #[test]
    fn document_id_is_deterministic_and_source_sensitive() {
        let content = "Shared content body";
        let first = generate_document_id("manual.pdf", content);
        let second = generate_document_id("manual.pdf", content);
        let other = generate_document_id("other.pdf", content);

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn document_id_ignores_content_past_the_prefix() {
        let prefix = "C".repeat(500);
        let first = generate_document_id("doc", &format!("{prefix}tail-one"));
        let second = generate_document_id("doc", &format!("{prefix}tail-two"));
        assert_eq!(first, second);
    }
}
