use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

use super::identifiers::level_token;
use crate::error::{ParseWarning, WarningKind};
use crate::sources::common::{normalize_dashes, strip_leading_zeros};
use crate::types::{Level, LevelKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationSegment {
    pub kind: LevelKind,
    pub designator: String,
}

impl CitationSegment {
    pub fn new(kind: LevelKind, designator: impl Into<String>) -> Self {
        Self {
            kind,
            designator: designator.into(),
        }
    }
}

/// Parsed form of a free-text citation such as `26 U.S.C. § 280A(a)(1)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CitationQuery {
    pub title_number: Option<String>,
    pub path: Vec<CitationSegment>,
    /// Trailing text that is not part of the path. A bare number here is an
    /// ambiguous designator (section or small level).
    pub fragment: Option<String>,
}

impl CitationQuery {
    pub fn has_section(&self) -> bool {
        self.path.iter().any(|segment| segment.kind.is_section())
    }

    fn small_depth(&self) -> usize {
        self.path
            .iter()
            .skip_while(|segment| !segment.kind.is_section())
            .skip(1)
            .count()
    }

    /// Fragment that could name either a section or the next small level.
    pub fn numeric_fragment(&self) -> Option<&str> {
        self.fragment.as_deref().filter(|fragment| {
            fragment.starts_with(|c: char| c.is_ascii_digit())
                && fragment.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
    }

    /// Builds a query from a USLM reference path (`/us/usc/t42/s1983/a/1`).
    pub fn from_uslm_path(path: &str) -> Option<CitationQuery> {
        let rest = path.trim().strip_prefix("/us/usc/")?;
        let mut segments = rest.split('/').filter(|segment| !segment.is_empty());
        let title = segments.next()?.strip_prefix('t')?;
        if title.is_empty() {
            return None;
        }

        let mut query = CitationQuery {
            title_number: Some(title.to_string()),
            ..CitationQuery::default()
        };
        let mut depth = None;
        for segment in segments {
            if let Some(current) = depth {
                query
                    .path
                    .push(CitationSegment::new(LevelKind::small_at_depth(current), segment));
                depth = Some(current + 1);
                continue;
            }
            if let Some(section) = segment
                .strip_prefix('s')
                .filter(|d| d.starts_with(|c: char| c.is_ascii_digit()))
            {
                query
                    .path
                    .push(CitationSegment::new(LevelKind::Section, normalize_dashes(section)));
                depth = Some(0);
                continue;
            }
            match split_prefixed(segment, USLM_PREFIXES) {
                Some((kind, designator)) => {
                    query.path.push(CitationSegment::new(kind, designator))
                }
                None => break,
            }
        }
        Some(query)
    }
}

impl fmt::Display for CitationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(title) = &self.title_number {
            parts.push(format!("{title} U.S.C."));
        }
        let bigs: Vec<String> = self
            .path
            .iter()
            .take_while(|segment| !segment.kind.is_section() && !segment.kind.is_small())
            .map(|segment| format!("{} {}", segment.kind, segment.designator))
            .collect();
        if !bigs.is_empty() {
            parts.push(bigs.join(", "));
        }
        let mut rest = String::new();
        for segment in &self.path {
            if segment.kind.is_section() {
                rest.push_str(&format!("§ {}", segment.designator));
            } else if !rest.is_empty() {
                rest.push_str(&format!("({})", segment.designator));
            }
        }
        if !rest.is_empty() {
            parts.push(rest);
        }
        if let Some(fragment) = &self.fragment {
            parts.push(fragment.clone());
        }
        f.write_str(&parts.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Usc,
    SectionMark,
    Number(String),
    Designator(String),
    Word(String),
    Slash,
    Comma,
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Usc => "U.S.C.".to_string(),
            Token::SectionMark => "§".to_string(),
            Token::Number(value) | Token::Word(value) => value.clone(),
            Token::Designator(value) => format!("({value})"),
            Token::Slash => "/".to_string(),
            Token::Comma => ",".to_string(),
        }
    }
}

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)U\.?\s?S\.?\s?C(?:\.|\b)|§+|\([A-Za-z0-9]+\)|\d+[A-Za-z0-9]*(?:[-\u{2013}\u{2014}]\d+[A-Za-z0-9]*)*|[A-Za-z]+\.?|/|,",
    )
    .unwrap()
});
static DESIGNATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(([A-Za-z0-9]+)\)$").unwrap());

static SECTION_KEYWORDS: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["section", "sections", "sec", "secs"].into_iter().collect());
static TITLE_KEYWORDS: LazyLock<HashSet<&str>> = LazyLock::new(|| ["title"].into_iter().collect());
static FRAGMENT_WORDS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    ["note", "notes", "et", "seq", "and", "or", "of", "the", "to", "through"]
        .into_iter()
        .collect()
});
static BIG_LEVEL_KEYWORDS: LazyLock<HashMap<&str, LevelKind>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert("subtitle", LevelKind::Subtitle);
    m.insert("subt", LevelKind::Subtitle);
    m.insert("chapter", LevelKind::Chapter);
    m.insert("chap", LevelKind::Chapter);
    m.insert("ch", LevelKind::Chapter);
    m.insert("subchapter", LevelKind::Subchapter);
    m.insert("subch", LevelKind::Subchapter);
    m.insert("part", LevelKind::Part);
    m.insert("pt", LevelKind::Part);
    m.insert("subpart", LevelKind::Subpart);
    m.insert("subpt", LevelKind::Subpart);
    m.insert("division", LevelKind::Division);
    m.insert("div", LevelKind::Division);
    m.insert("subdivision", LevelKind::Subdivision);
    m.insert("subdiv", LevelKind::Subdivision);
    m.insert("article", LevelKind::Article);
    m.insert("art", LevelKind::Article);
    m
});

/// Canonical id prefixes, longest first so `sch` wins over `s`.
const ID_PREFIXES: &[&str] = &["art", "sch", "st", "sd", "sp", "ch", "t", "p", "d", "s"];
const USLM_PREFIXES: &[&str] = &["spt", "sch", "art", "pt", "st", "sd", "ch", "d"];

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for m in TOKEN_RE.find_iter(input) {
        let raw = m.as_str();
        let lower = raw.to_lowercase();
        let token = if raw.starts_with('§') {
            Token::SectionMark
        } else if raw == "/" {
            Token::Slash
        } else if raw == "," {
            Token::Comma
        } else if let Some(caps) = DESIGNATOR_RE.captures(raw) {
            Token::Designator(caps[1].to_string())
        } else if raw.starts_with(|c: char| c.is_ascii_digit()) {
            Token::Number(normalize_dashes(raw))
        } else if lower.replace(['.', ' '], "") == "usc" {
            Token::Usc
        } else {
            let word = raw.trim_end_matches('.');
            if SECTION_KEYWORDS.contains(word.to_lowercase().as_str()) {
                Token::SectionMark
            } else {
                Token::Word(word.to_string())
            }
        };
        tokens.push(token);
    }
    tokens
}

fn big_kind(word: &str) -> Option<LevelKind> {
    BIG_LEVEL_KEYWORDS.get(word.to_lowercase().as_str()).cloned()
}

fn is_designator_word(word: &str) -> bool {
    !word.is_empty()
        && word.len() <= 5
        && word.chars().all(|c| c.is_ascii_alphanumeric())
        && !FRAGMENT_WORDS.contains(word.to_lowercase().as_str())
}

struct BigLevelResult {
    segment: CitationSegment,
    next_index: usize,
}

fn parse_big_level(tokens: &[Token], index: usize) -> Option<BigLevelResult> {
    let Some(Token::Word(word)) = tokens.get(index) else {
        return None;
    };
    let kind = big_kind(word)?;
    let designator = match tokens.get(index + 1)? {
        Token::Number(value) | Token::Designator(value) => value.clone(),
        Token::Word(value) if is_designator_word(value) => value.clone(),
        _ => return None,
    };
    let mut next_index = index + 2;
    while matches!(tokens.get(next_index), Some(Token::Comma)) {
        next_index += 1;
    }
    Some(BigLevelResult {
        segment: CitationSegment::new(kind, designator),
        next_index,
    })
}

/// Parses a citation string. Returns `None` when nothing in it looks like a citation.
pub fn parse_citation(input: &str) -> Option<CitationQuery> {
    let tokens = tokenize(input);
    let mut query = CitationQuery::default();
    let mut index = 0;

    match (tokens.first(), tokens.get(1)) {
        (Some(Token::Word(word)), Some(Token::Number(title)))
            if TITLE_KEYWORDS.contains(word.to_lowercase().as_str()) =>
        {
            query.title_number = Some(title.clone());
            index = 2;
        }
        (Some(Token::Number(title)), Some(next))
            if matches!(next, Token::Usc | Token::SectionMark | Token::Number(_))
                || matches!(next, Token::Word(word) if big_kind(word).is_some()) =>
        {
            query.title_number = Some(title.clone());
            index = 1;
        }
        _ => {}
    }

    while matches!(tokens.get(index), Some(Token::Usc) | Some(Token::Comma)) {
        index += 1;
    }

    while let Some(parsed) = parse_big_level(&tokens, index) {
        query.path.push(parsed.segment);
        index = parsed.next_index;
    }

    let mut marked = false;
    while matches!(tokens.get(index), Some(Token::SectionMark)) {
        marked = true;
        index += 1;
    }
    if let Some(Token::Number(section)) = tokens.get(index) {
        query
            .path
            .push(CitationSegment::new(LevelKind::Section, section.clone()));
        index += 1;
    } else if marked {
        return None;
    }

    if query.has_section() {
        let mut depth = 0;
        while let Some(token) = tokens.get(index) {
            let designator = match token {
                Token::Designator(value) => value.clone(),
                Token::Slash => match tokens.get(index + 1) {
                    Some(Token::Number(value)) | Some(Token::Designator(value)) => {
                        index += 1;
                        value.clone()
                    }
                    Some(Token::Word(value)) if is_designator_word(value) => {
                        index += 1;
                        value.clone()
                    }
                    _ => break,
                },
                // final bare number: section or small level, decided at resolution
                Token::Number(_) if index + 1 == tokens.len() => break,
                Token::Number(value) => value.clone(),
                Token::Word(value) if is_designator_word(value) => value.clone(),
                _ => break,
            };
            query
                .path
                .push(CitationSegment::new(LevelKind::small_at_depth(depth), designator));
            depth += 1;
            index += 1;
        }
    }

    if index < tokens.len() {
        let fragment = tokens[index..]
            .iter()
            .map(Token::text)
            .collect::<Vec<_>>()
            .join(" ");
        query.fragment = Some(fragment);
    }

    if query.title_number.is_none() && query.path.is_empty() {
        return None;
    }
    Some(query)
}

fn split_prefixed(segment: &str, prefixes: &[&str]) -> Option<(LevelKind, String)> {
    prefixes.iter().find_map(|prefix| {
        let rest = segment.strip_prefix(prefix)?;
        if rest.is_empty() || !rest.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return None;
        }
        let kind = match *prefix {
            "pt" => LevelKind::Part,
            "spt" => LevelKind::Subpart,
            other => LevelKind::from_id_prefix(other)?,
        };
        Some((kind, rest.to_string()))
    })
}

/// Renders a canonical id as a citation the lookup grammar accepts:
/// `26 U.S.C. § 280A(a)(1)`, `26 U.S.C. subchapter A, part I`.
pub fn format_citation(title_number: &str, canonical_id: &str) -> String {
    let mut bigs: Vec<String> = Vec::new();
    let mut section: Option<String> = None;
    let mut smalls = String::new();

    for (position, segment) in canonical_id.split('_').enumerate() {
        if section.is_none() && smalls.is_empty() {
            if let Some((kind, designator)) = split_prefixed(segment, ID_PREFIXES) {
                match kind {
                    LevelKind::Section => section = Some(designator),
                    LevelKind::Title if position == 0 => {}
                    kind => bigs.push(format!("{kind} {designator}")),
                }
                continue;
            }
        }
        smalls.push_str(&format!("({segment})"));
    }

    let mut out = format!("{title_number} U.S.C.");
    if !bigs.is_empty() && section.is_none() {
        out.push(' ');
        out.push_str(&bigs.join(", "));
    }
    match section {
        Some(section) => {
            out.push_str(" § ");
            out.push_str(&section);
            out.push_str(&smalls);
        }
        None if !smalls.is_empty() => {
            out.push(' ');
            out.push_str(&smalls);
        }
        None => {}
    }
    out
}

/// Result of resolving a citation against one title.
#[derive(Debug, Clone)]
pub enum CitationLookup<'a> {
    Found(&'a Level),
    /// Both a section and a small level matched; the section won.
    Ambiguous {
        level: &'a Level,
        alternative: &'a Level,
        warning: ParseWarning,
    },
    NotFound,
}

impl<'a> CitationLookup<'a> {
    pub fn level(&self) -> Option<&'a Level> {
        match self {
            CitationLookup::Found(level) => Some(*level),
            CitationLookup::Ambiguous { level, .. } => Some(*level),
            CitationLookup::NotFound => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, CitationLookup::Ambiguous { .. })
    }
}

/// Lookup table from canonical ids to the nodes of one annotated title.
pub struct CitationIndex<'a> {
    root: &'a Level,
    title_number: String,
    by_id: HashMap<&'a str, &'a Level>,
    by_folded: HashMap<String, Vec<&'a Level>>,
    big_paths: Vec<(Vec<String>, &'a Level)>,
}

impl<'a> CitationIndex<'a> {
    pub fn build(root: &'a Level) -> Self {
        let mut index = Self {
            root,
            title_number: root.designator.clone(),
            by_id: HashMap::new(),
            by_folded: HashMap::new(),
            big_paths: Vec::new(),
        };
        for level in root.iter() {
            if let Some(id) = level.canonical_id() {
                index.by_id.insert(id, level);
                index
                    .by_folded
                    .entry(id.to_lowercase())
                    .or_default()
                    .push(level);
            }
        }
        let mut path = Vec::new();
        for child in &root.children {
            index.collect_big_paths(child, &mut path);
        }
        index
    }

    fn collect_big_paths(&mut self, level: &'a Level, path: &mut Vec<String>) {
        if !level.kind.is_big() {
            return;
        }
        path.push(level_token(&level.kind, &level.designator));
        self.big_paths.push((path.clone(), level));
        for child in &level.children {
            self.collect_big_paths(child, path);
        }
        path.pop();
    }

    pub fn title_number(&self) -> &str {
        &self.title_number
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Exact canonical id lookup.
    pub fn get(&self, canonical_id: &str) -> Option<&'a Level> {
        self.by_id.get(canonical_id).copied()
    }

    fn lookup_id(&self, id: &str) -> Option<&'a Level> {
        if let Some(level) = self.get(id) {
            return Some(level);
        }
        match self.by_folded.get(&id.to_lowercase()) {
            Some(levels) if levels.len() == 1 => Some(levels[0]),
            _ => None,
        }
    }

    fn resolve_path(&self, path: &[CitationSegment]) -> Option<&'a Level> {
        if path.is_empty() {
            return Some(self.root);
        }

        if let Some(section_at) = path.iter().position(|segment| segment.kind.is_section()) {
            let id = path[section_at..]
                .iter()
                .map(|segment| level_token(&segment.kind, &segment.designator))
                .collect::<Vec<_>>()
                .join("_");
            return self.lookup_id(&id);
        }

        let tokens: Vec<String> = path
            .iter()
            .map(|segment| level_token(&segment.kind, &segment.designator))
            .collect();
        if let Some(level) = self.lookup_id(&tokens.join("_")) {
            return Some(level);
        }
        let mut matches = self
            .big_paths
            .iter()
            .filter(|(big_path, _)| big_path.ends_with(&tokens));
        match (matches.next(), matches.next()) {
            (Some((_, level)), None) => Some(*level),
            _ => None,
        }
    }

    pub fn resolve(&self, query: &CitationQuery) -> CitationLookup<'a> {
        if let Some(title) = &query.title_number {
            if !strip_leading_zeros(title).eq_ignore_ascii_case(&strip_leading_zeros(&self.title_number)) {
                return CitationLookup::NotFound;
            }
        }

        let base = self.resolve_path(&query.path);
        let Some(base) = base else {
            return CitationLookup::NotFound;
        };
        let Some(fragment) = query.numeric_fragment() else {
            return CitationLookup::Found(base);
        };

        let as_section = self.lookup_id(&level_token(&LevelKind::Section, fragment));
        let as_small = Some(base)
            .filter(|_| query.has_section())
            .and_then(|level| level.canonical_id())
            .and_then(|id| {
                let kind = LevelKind::small_at_depth(query.small_depth());
                self.lookup_id(&format!("{id}_{}", level_token(&kind, fragment)))
            });

        match (as_section, as_small) {
            (Some(section), Some(small)) => {
                let chosen = section.canonical_id().unwrap_or_default();
                let other = small.canonical_id().unwrap_or_default();
                warn!(
                    "[Ingest] Ambiguous citation \"{}\": resolved to {}, also matches {}",
                    query, chosen, other
                );
                CitationLookup::Ambiguous {
                    level: section,
                    alternative: small,
                    warning: ParseWarning::new(
                        WarningKind::AmbiguousCitation,
                        format!("\"{query}\" matches {chosen} and {other}; using {chosen}"),
                    )
                    .for_level(chosen),
                }
            }
            (Some(level), None) | (None, Some(level)) => CitationLookup::Found(level),
            (None, None) => CitationLookup::NotFound,
        }
    }

    /// Parses and resolves a citation string.
    pub fn lookup(&self, citation: &str) -> CitationLookup<'a> {
        match parse_citation(citation) {
            Some(query) => self.resolve(&query),
            None => CitationLookup::NotFound,
        }
    }
}
