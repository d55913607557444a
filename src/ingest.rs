//! Plain-text document intake.
//!
//! Reads UTF-8 text files and splits them into overlapping word windows,
//! the chunk shape the index and citations operate on. Rich formats
//! (PDF, Word, HTML) are out of scope; extraction belongs to an upstream
//! collaborator that hands the engine ordered chunk texts.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::ChunkingConfig;

/// A file accepted for ingestion.
#[derive(Debug)]
pub struct SourceFile {
    pub filename: String,
    pub file_type: String,
    pub body: String,
}

/// Read a `.txt` or `.md` file for ingestion.
pub fn read_text_file(path: &Path) -> Result<SourceFile> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("invalid file name: {}", path.display()))?;

    let file_type = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match file_type.as_str() {
        "txt" | "md" => {}
        other => bail!(
            "unsupported file format '{}'. Supported formats: txt, md",
            if other.is_empty() { "(none)" } else { other }
        ),
    }

    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if body.trim().is_empty() {
        bail!("no text content found in {}", path.display());
    }

    Ok(SourceFile {
        filename,
        file_type,
        body,
    })
}

/// Split text into overlapping word windows.
///
/// Windows are `chunk_words` long and consecutive windows share
/// `overlap_words` words, so a sentence cut at a boundary still appears
/// whole in one of the two chunks. Always returns at least one chunk for
/// non-blank text.
pub fn split_chunks(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let stride = config.chunk_words.saturating_sub(config.overlap_words).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + config.chunk_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_words: usize, overlap_words: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_words,
            overlap_words,
        }
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_chunks("one two three", &config(500, 50));
        assert_eq!(chunks, vec!["one two three"]);
    }

    #[test]
    fn test_blank_text_no_chunks() {
        assert!(split_chunks("   \n\t  ", &config(500, 50)).is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        let text = (0..10).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = split_chunks(&text, &config(4, 2));
        assert_eq!(chunks[0], "w0 w1 w2 w3");
        assert_eq!(chunks[1], "w2 w3 w4 w5");
        // Every word appears somewhere.
        for i in 0..10 {
            assert!(chunks.iter().any(|c| c.contains(&format!("w{i}"))));
        }
    }

    #[test]
    fn test_trailing_window_not_dropped() {
        let text = (0..9).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = split_chunks(&text, &config(4, 0));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "w8");
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-").unwrap();
        assert!(read_text_file(&path).is_err());
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, b"  \n").unwrap();
        assert!(read_text_file(&path).is_err());
    }

    #[test]
    fn test_reads_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\nSome content.").unwrap();
        let file = read_text_file(&path).unwrap();
        assert_eq!(file.filename, "notes.md");
        assert_eq!(file.file_type, "md");
    }
}
