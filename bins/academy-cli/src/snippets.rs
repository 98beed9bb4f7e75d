// Lesson code cell extraction

use anyhow::Result;
use regex::Regex;

const CODE_CELL_PATTERN: &str = r#"<CodeCell\s+id="([^"]+)">([\s\S]*?)</CodeCell>"#;

/// Characters of failure output shown per failing cell
pub const FAILURE_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCell {
    pub id: String,
    pub code: String,
}

pub struct CellExtractor {
    pattern: Regex,
}

impl CellExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(CODE_CELL_PATTERN)?,
        })
    }

    /// Every `<CodeCell id="...">` body in the lesson, trimmed, in order
    pub fn extract(&self, lesson: &str) -> Vec<CodeCell> {
        self.pattern
            .captures_iter(lesson)
            .map(|c| CodeCell {
                id: c[1].to_string(),
                code: c[2].trim().to_string(),
            })
            .collect()
    }
}

/// First `FAILURE_PREVIEW_CHARS` characters of `text`, on a char boundary
pub fn preview(text: &str) -> &str {
    match text.char_indices().nth(FAILURE_PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
