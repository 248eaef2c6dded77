//! Context-preserving chunking of an annotated level tree.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::error::{ChunkError, ParseWarning, WarningKind};
use crate::sources::usc::citations::format_citation;
use crate::types::{Chunk, ContextEntry, Level, RunPosition};

pub const DEFAULT_MAX_TOKENS_PER_CHUNK: usize = 1000;
pub const DEFAULT_OVERLAP_TOKENS: usize = 100;

/// Words ending in a period that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "pub", "stat", "sec", "secs", "no", "nos", "subsec", "subsecs", "par", "pars", "subpar", "cl",
    "ch", "art", "vol", "inc", "co", "corp", "ltd", "jr", "sr", "mr", "ms", "mrs", "dr", "v", "vs",
    "jan", "feb", "mar", "apr", "aug", "sept", "sep", "oct", "nov", "dec", "approx", "dept",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// One unit per level with direct text.
    Leaf,
    /// One unit per section, descendant text inlined.
    Section,
    /// Leaf units with ancestor chapeaus carried in the context path.
    #[default]
    Hierarchical,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Leaf => "leaf",
            ChunkStrategy::Section => "section",
            ChunkStrategy::Hierarchical => "hierarchical",
        }
    }
}

impl FromStr for ChunkStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "leaf" => Ok(ChunkStrategy::Leaf),
            "section" => Ok(ChunkStrategy::Section),
            "hierarchical" => Ok(ChunkStrategy::Hierarchical),
            other => Err(format!("Unknown chunk strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkerConfig {
    pub max_tokens_per_chunk: usize,
    pub overlap_tokens: usize,
    pub strategy: ChunkStrategy,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: DEFAULT_MAX_TOKENS_PER_CHUNK,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            strategy: ChunkStrategy::default(),
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.max_tokens_per_chunk == 0 {
            return Err(ChunkError::InvalidConfig(
                "maxTokensPerChunk must be greater than zero".to_string(),
            ));
        }
        if self.overlap_tokens >= self.max_tokens_per_chunk {
            return Err(ChunkError::InvalidConfig(format!(
                "overlapTokens ({}) must be smaller than maxTokensPerChunk ({})",
                self.overlap_tokens, self.max_tokens_per_chunk
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<ParseWarning>,
}

/// Whitespace word count, the unit `max_tokens_per_chunk` is measured in.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone, Copy)]
struct Word<'a> {
    text: &'a str,
    sentence_end: bool,
    paragraph_end: bool,
}

fn is_sentence_end(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']', '\u{201d}', '\u{2019}']);
    let Some(last) = trimmed.chars().last() else {
        return false;
    };
    if last == '?' || last == '!' {
        return true;
    }
    if last != '.' {
        return false;
    }
    let stem = &trimmed[..trimmed.len() - 1];
    if stem.is_empty() || stem.contains('.') {
        return false;
    }
    if stem.chars().count() == 1 && stem.chars().all(char::is_alphabetic) {
        return false;
    }
    !ABBREVIATIONS.contains(&stem.to_lowercase().as_str())
}

fn words_of(paragraphs: &[String]) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    for paragraph in paragraphs {
        let start = words.len();
        words.extend(paragraph.split_whitespace().map(|text| Word {
            text,
            sentence_end: is_sentence_end(text),
            paragraph_end: false,
        }));
        if words.len() > start {
            if let Some(last) = words.last_mut() {
                last.paragraph_end = true;
            }
        }
    }
    words
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: usize,
    end: usize,
    forced: bool,
}

/// Splits a word stream into windows of at most `max` words. Each window ends
/// at the last paragraph boundary, else the last sentence end, found in its
/// trailing `overlap` words; the next window starts `overlap` words earlier.
fn split_windows(words: &[Word<'_>], max: usize, overlap: usize) -> Vec<Window> {
    let total = words.len();
    if total <= max {
        return vec![Window {
            start: 0,
            end: total,
            forced: false,
        }];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = start + max;
        if hard_end >= total {
            windows.push(Window {
                start,
                end: total,
                forced: false,
            });
            break;
        }

        let floor = hard_end.saturating_sub(overlap).max(start + 1);
        let boundary = (floor..=hard_end)
            .rev()
            .find(|&end| words[end - 1].paragraph_end)
            .or_else(|| (floor..=hard_end).rev().find(|&end| words[end - 1].sentence_end));
        let (end, forced) = match boundary {
            Some(end) => (end, false),
            None => (hard_end, true),
        };
        windows.push(Window { start, end, forced });

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
    windows
}

fn render(words: &[Word<'_>]) -> String {
    let mut out = String::new();
    for (idx, word) in words.iter().enumerate() {
        if idx > 0 {
            out.push_str(if words[idx - 1].paragraph_end { "\n\n" } else { " " });
        }
        out.push_str(word.text);
    }
    out
}

struct Unit<'a> {
    level: &'a Level,
    paragraphs: Vec<String>,
    context: Vec<ContextEntry>,
}

fn own_paragraphs(level: &Level) -> Vec<String> {
    level
        .body_text
        .iter()
        .filter(|run| !run.text.is_empty())
        .map(|run| run.text.clone())
        .collect()
}

/// Flattens a subtree into paragraphs, prefixing nested levels with their label
/// and heading.
fn flatten_subtree(level: &Level, is_unit_root: bool, out: &mut Vec<String>) {
    let mut leading = level
        .body_text
        .iter()
        .filter(|run| run.position == RunPosition::Leading)
        .map(|run| run.text.clone());

    if is_unit_root {
        out.extend(leading);
    } else {
        let label = match &level.heading {
            Some(heading) => format!("{} {}", level.label(), heading),
            None => level.label(),
        };
        match leading.next() {
            Some(first) => out.push(format!("{label} {first}")),
            None => out.push(label),
        }
        out.extend(leading);
    }

    for child in &level.children {
        flatten_subtree(child, false, out);
    }
    out.extend(
        level
            .body_text
            .iter()
            .filter(|run| run.position == RunPosition::Trailing)
            .map(|run| run.text.clone()),
    );
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self, ChunkError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunks an id-annotated tree. The tree is only read.
    pub fn chunk(&self, root: &Level) -> Result<ChunkSet, ChunkError> {
        let mut units = Vec::new();
        let mut ancestors = Vec::new();
        match self.config.strategy {
            ChunkStrategy::Section => collect_section_units(root, &mut ancestors, &mut units),
            ChunkStrategy::Leaf | ChunkStrategy::Hierarchical => {
                self.collect_leaf_units(root, &mut ancestors, &mut units)
            }
        }

        let mut set = ChunkSet::default();
        for unit in units {
            self.emit(unit, &root.designator, &mut set)?;
        }
        debug!(
            "[Ingest] Chunked title {} ({}): {} chunks, {} forced splits",
            root.designator,
            self.config.strategy.as_str(),
            set.chunks.len(),
            set.warnings.len()
        );
        Ok(set)
    }

    fn collect_leaf_units<'a>(
        &self,
        level: &'a Level,
        ancestors: &mut Vec<ContextEntry>,
        units: &mut Vec<Unit<'a>>,
    ) {
        if level.has_text() {
            units.push(Unit {
                level,
                paragraphs: own_paragraphs(level),
                context: ancestors.clone(),
            });
        }

        let mut entry = ContextEntry::of(level);
        if self.config.strategy == ChunkStrategy::Hierarchical {
            entry.chapeau = level.leading_text();
        }
        ancestors.push(entry);
        for child in &level.children {
            self.collect_leaf_units(child, ancestors, units);
        }
        ancestors.pop();
    }

    fn emit(&self, unit: Unit<'_>, title_number: &str, set: &mut ChunkSet) -> Result<(), ChunkError> {
        let canonical_id = unit
            .level
            .canonical_id()
            .ok_or_else(|| ChunkError::MissingCanonicalId {
                kind: unit.level.kind.clone(),
                designator: unit.level.designator.clone(),
            })?
            .to_string();

        let words = words_of(&unit.paragraphs);
        if words.is_empty() {
            return Ok(());
        }

        let windows = split_windows(
            &words,
            self.config.max_tokens_per_chunk,
            self.config.overlap_tokens,
        );
        let split = windows.len() > 1;
        let citation = format_citation(title_number, &canonical_id);
        let level_entry = ContextEntry::of(unit.level);

        for (position, window) in windows.iter().enumerate() {
            if window.forced {
                set.warnings.push(
                    ParseWarning::new(
                        WarningKind::ForcedSplit,
                        format!(
                            "no paragraph or sentence boundary in words {}..{}; split mid-sentence",
                            window.end.saturating_sub(self.config.overlap_tokens),
                            window.end
                        ),
                    )
                    .for_level(canonical_id.clone()),
                );
            }
            let text = render(&words[window.start..window.end]);
            set.chunks.push(Chunk {
                chunk_id: if split {
                    format!("{canonical_id}#{position}")
                } else {
                    canonical_id.clone()
                },
                canonical_id: canonical_id.clone(),
                citation: citation.clone(),
                level: level_entry.clone(),
                token_estimate: estimate_tokens(&text),
                text,
                context_path: unit.context.clone(),
                position,
            });
        }
        Ok(())
    }
}

fn collect_section_units<'a>(
    level: &'a Level,
    ancestors: &mut Vec<ContextEntry>,
    units: &mut Vec<Unit<'a>>,
) {
    if level.kind.is_section() || !level.kind.is_big() {
        let mut paragraphs = Vec::new();
        flatten_subtree(level, true, &mut paragraphs);
        if !paragraphs.is_empty() {
            units.push(Unit {
                level,
                paragraphs,
                context: ancestors.clone(),
            });
        }
        return;
    }

    if level.has_text() {
        units.push(Unit {
            level,
            paragraphs: own_paragraphs(level),
            context: ancestors.clone(),
        });
    }
    ancestors.push(ContextEntry::of(level));
    for child in &level.children {
        collect_section_units(child, ancestors, units);
    }
    ancestors.pop();
}

/// Validates `config` and chunks `root`.
pub fn chunk_tree(root: &Level, config: &ChunkerConfig) -> Result<ChunkSet, ChunkError> {
    Chunker::new(config.clone())?.chunk(root)
}
