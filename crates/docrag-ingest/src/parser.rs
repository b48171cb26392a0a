//! Document parser: splits an office document's text stream into
//! ordered paragraph and table blocks, tracking the active section.

use std::path::Path;

use tracing::{debug, info};

use docrag_core::{Block, DocragError, Result};

/// Parses a document's paragraph stream into semantic blocks.
///
/// Line-by-line scan: markdown pipe tables become one atomic table block
/// each, section headers update the active section (and stay in the text),
/// everything else accumulates into paragraph blocks.
pub struct DocumentParser {
    /// Fixed recurring export artifacts removed before line splitting.
    noise_patterns: Vec<String>,
}

impl DocumentParser {
    pub fn new() -> Self {
        Self {
            noise_patterns: Vec::new(),
        }
    }

    /// Parser with a fixed set of noise substrings to strip.
    pub fn with_noise_patterns(patterns: Vec<String>) -> Self {
        Self {
            noise_patterns: patterns,
        }
    }

    /// Read and parse a document file. Unreadable or non-UTF-8 input is a
    /// fatal parse error; no partial blocks are returned.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Vec<Block>> {
        let path = path.as_ref();
        info!("Parsing document {:?}", path);

        let raw = std::fs::read(path)
            .map_err(|e| DocragError::parse(format!("failed to read {:?}: {}", path, e)))?;
        let text = String::from_utf8(raw)
            .map_err(|_| DocragError::parse(format!("{:?} is not valid UTF-8 text", path)))?;

        Ok(self.parse(&text))
    }

    /// Parse a document text stream into blocks.
    pub fn parse(&self, text: &str) -> Vec<Block> {
        // One logical stream: normalize escaped line breaks, drop known
        // export artifacts, then re-split into lines.
        let mut full = text.replace("\\n", "\n");
        for pattern in &self.noise_patterns {
            full = full.replace(pattern.as_str(), "");
        }
        let lines: Vec<&str> = full.split('\n').collect();

        let mut blocks = Vec::new();
        let mut current_section: Option<String> = None;
        let mut buffer: Vec<&str> = Vec::new();
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx].trim();

            if line.is_empty() {
                idx += 1;
                continue;
            }

            if is_table_start(&lines, idx) {
                flush_paragraph(&mut blocks, &mut buffer, &current_section);

                let (table, next_idx) = extract_table(&lines, idx);
                blocks.push(Block::table(table, current_section.clone()));
                idx = next_idx;
                continue;
            }

            if is_section_header(line) {
                // The buffer belongs to the previous section; flush before
                // switching. The header line itself stays as content.
                flush_paragraph(&mut blocks, &mut buffer, &current_section);
                current_section = Some(line.to_string());
                debug!("New section: {}", line);
            }

            buffer.push(line);
            idx += 1;
        }

        flush_paragraph(&mut blocks, &mut buffer, &current_section);

        info!("Parsed {} blocks", blocks.len());
        blocks
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

fn flush_paragraph(blocks: &mut Vec<Block>, buffer: &mut Vec<&str>, section: &Option<String>) {
    if !buffer.is_empty() {
        blocks.push(Block::paragraph(buffer.join("\n"), section.clone()));
        buffer.clear();
    }
}

/// A section header is a top-level numbered uppercase heading
/// (`1. ПРЕДМЕТ ДОГОВОРА`, never `1.1 ...`), an appendix marker
/// (`Приложение №1`), or a level-1/2 markdown heading.
fn is_section_header(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    is_numbered_heading(line) || is_appendix_marker(line) || is_markdown_heading(line)
}

/// `^\d+\.\s+[UPPER][UPPER\s]+$` with single-level numbering only.
fn is_numbered_heading(line: &str) -> bool {
    let mut chars = line.chars().peekable();

    let mut digits = 0;
    while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
        chars.next();
        digits += 1;
    }
    if digits == 0 || chars.next() != Some('.') {
        return false;
    }

    // A second numbering level (`1.1`) puts a digit here instead of
    // whitespace, so multi-level headings fall through to body text.
    let mut spaces = 0;
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
        spaces += 1;
    }
    if spaces == 0 {
        return false;
    }

    let rest: Vec<char> = chars.collect();
    rest.len() >= 2
        && rest[0].is_uppercase()
        && rest.iter().all(|c| c.is_uppercase() || c.is_whitespace())
}

/// `Приложение № <digits>` prefix, case-insensitive, optional spaces.
fn is_appendix_marker(line: &str) -> bool {
    let lower = line.to_lowercase();
    let Some(rest) = lower.strip_prefix("приложение") else {
        return false;
    };
    let rest = rest.trim_start();
    let Some(rest) = rest.strip_prefix('№') else {
        return false;
    };
    rest.trim_start().starts_with(|c: char| c.is_ascii_digit())
}

/// `^#{1,2}\s+.+$`
fn is_markdown_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if !(1..=2).contains(&hashes) {
        return false;
    }
    let rest = &line[hashes..];
    let trimmed = rest.trim_start();
    trimmed.len() < rest.len() && !trimmed.is_empty()
}

/// Table start: this line and the next both contain the column separator
/// and the next is a separator row (`| --- | --- |`).
fn is_table_start(lines: &[&str], idx: usize) -> bool {
    if idx + 1 >= lines.len() {
        return false;
    }

    let line1 = lines[idx].trim();
    let line2 = lines[idx + 1].trim();

    if !line1.contains('|') || !line2.contains('|') {
        return false;
    }

    is_separator_row(line2)
}

/// `^\|[\s\-:|]+\|$`
fn is_separator_row(line: &str) -> bool {
    if !line.starts_with('|') || !line.ends_with('|') || line.len() < 3 {
        return false;
    }
    let inner = &line[1..line.len() - 1];
    !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_whitespace() || c == '-' || c == ':' || c == '|')
}

/// Capture the full contiguous run of separator-containing lines.
/// Returns the table text and the index of the first line after it.
fn extract_table(lines: &[&str], start_idx: usize) -> (String, usize) {
    let mut table_lines = vec![lines[start_idx].trim()];
    let mut idx = start_idx + 1;

    while idx < lines.len() {
        let line = lines[idx].trim();
        if line.contains('|') {
            table_lines.push(line);
            idx += 1;
        } else {
            break;
        }
    }

    (table_lines.join("\n"), idx)
}
