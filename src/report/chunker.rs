//! Document Chunker
//!
//! Splits ordered section inputs into token-bounded chunks.
//!
//! ## Rules
//!
//! - Greedy and sequential: sections are packed in input order until the next
//!   one would push `reserved + Σ entry cost` over the budget
//! - A section that alone exceeds the budget flushes the current chunk and is
//!   split on paragraph breaks; every part becomes its own chunk
//! - Parts are exact contiguous slices of the section text, so joining them in
//!   order gives the text back byte for byte
//! - A single paragraph larger than the budget stays whole
//! - An empty input yields one empty chunk

use std::borrow::Cow;
use tracing::debug;

use crate::ai::tokenizer::TokenCounter;
use crate::constants::generation::MAX_TOKENS_PER_CHUNK;
use crate::types::SectionInput;

// =============================================================================
// Chunk Types
// =============================================================================

/// Position of a split part within its section (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionPart {
    pub index: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    pub section_id: String,
    pub title: String,
    /// Set when the section was split
    pub part: Option<SectionPart>,
    pub text: String,
}

impl ChunkEntry {
    /// Title as shown to the model, `"{title} (del N)"` for split parts
    pub fn display_title(&self) -> Cow<'_, str> {
        match self.part {
            Some(part) => Cow::Owned(part_title(&self.title, part.index)),
            None => Cow::Borrowed(&self.title),
        }
    }

    fn render(&self) -> String {
        let text = match self.part {
            Some(_) => self.text.trim_end(),
            None => self.text.as_str(),
        };
        format!("{}:\n{}", self.display_title(), text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub entries: Vec<ChunkEntry>,
}

impl Chunk {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries rendered as `"{title}:\n{text}"` separated by blank lines
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(ChunkEntry::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// `reserved + Σ entry cost`
    pub fn estimated_tokens(&self, counter: &TokenCounter, reserved: usize) -> usize {
        reserved
            + self
                .entries
                .iter()
                .map(|e| counter.count(&format!("{}:\n{}", e.display_title(), e.text)))
                .sum::<usize>()
    }
}

fn part_title(title: &str, index: usize) -> String {
    format!("{} (del {})", title, index)
}

// =============================================================================
// Chunker
// =============================================================================

#[derive(Debug, Clone)]
pub struct Chunker {
    counter: TokenCounter,
    max_tokens_per_chunk: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(TokenCounter::fallback(), MAX_TOKENS_PER_CHUNK)
    }
}

impl Chunker {
    pub fn new(counter: TokenCounter, max_tokens_per_chunk: usize) -> Self {
        Self {
            counter,
            max_tokens_per_chunk,
        }
    }

    pub fn max_tokens_per_chunk(&self) -> usize {
        self.max_tokens_per_chunk
    }

    /// Partition `sections` into chunks with `reserved` tokens taken per chunk
    pub fn chunk(&self, sections: &[SectionInput], reserved: usize) -> Vec<Chunk> {
        let max = self.max_tokens_per_chunk;
        let mut chunks = Vec::new();
        let mut current = Chunk::default();
        let mut current_tokens = reserved;

        for section in sections {
            let cost = self
                .counter
                .count(&format!("{}:\n{}", section.title, section.raw_text));

            if reserved + cost > max {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                    current_tokens = reserved;
                }
                let parts = self.split_section(section, max.saturating_sub(reserved));
                debug!(
                    section = %section.title,
                    tokens = cost,
                    parts = parts.len(),
                    "Split oversized section"
                );
                chunks.extend(parts.into_iter().map(|entry| Chunk {
                    entries: vec![entry],
                }));
                continue;
            }

            if current_tokens + cost > max && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_tokens = reserved;
            }

            current.entries.push(ChunkEntry {
                section_id: section.section_id.clone(),
                title: section.title.clone(),
                part: None,
                text: section.raw_text.clone(),
            });
            current_tokens += cost;
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        if chunks.is_empty() {
            chunks.push(Chunk::default());
        }
        chunks
    }

    /// Next-fit packing of paragraph units into parts of at most `budget`
    fn split_section(&self, section: &SectionInput, budget: usize) -> Vec<ChunkEntry> {
        let header_cost =
            |index: usize| self.counter.count(&format!("{}:\n", part_title(&section.title, index)));

        let mut texts: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_tokens = header_cost(1);

        for unit in paragraph_units(&section.raw_text) {
            let unit_tokens = self.counter.count(unit);
            if !current.is_empty() && current_tokens + unit_tokens > budget {
                texts.push(std::mem::take(&mut current));
                current_tokens = header_cost(texts.len() + 1);
            }
            current.push_str(unit);
            current_tokens += unit_tokens;
        }
        if !current.is_empty() || texts.is_empty() {
            texts.push(current);
        }

        let count = texts.len();
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| ChunkEntry {
                section_id: section.section_id.clone(),
                title: section.title.clone(),
                part: Some(SectionPart {
                    index: i + 1,
                    count,
                }),
                text,
            })
            .collect()
    }
}

/// Contiguous slices, each ending after a run of two or more newlines
fn paragraph_units(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut units = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\n' {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < bytes.len() && bytes[i] == b'\n' {
            i += 1;
        }
        if i - run_start >= 2 {
            units.push(&text[start..i]);
            start = i;
        }
    }
    if start < text.len() {
        units.push(&text[start..]);
    }
    units
}

/// Chunk with the fallback counter
pub fn chunk_sections(
    sections: &[SectionInput],
    reserved: usize,
    max_tokens_per_chunk: usize,
) -> Vec<Chunk> {
    Chunker::new(TokenCounter::fallback(), max_tokens_per_chunk).chunk(sections, reserved)
}
