use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParseWarning;

/// Kind of a node in the legislative hierarchy.
///
/// `Other` keeps the raw element (or role) name of anomalous structural tags so
/// that unfamiliar markup still yields a node instead of dropped content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Title,
    Subtitle,
    Chapter,
    Subchapter,
    Part,
    Subpart,
    Division,
    Subdivision,
    Article,
    Section,
    Subsection,
    Paragraph,
    Subparagraph,
    Clause,
    Subclause,
    Item,
    Subitem,
    Subsubitem,
    Other(String),
}

impl LevelKind {
    pub fn from_name(name: &str) -> Option<LevelKind> {
        let kind = match name {
            "title" => LevelKind::Title,
            "subtitle" => LevelKind::Subtitle,
            "chapter" => LevelKind::Chapter,
            "subchapter" => LevelKind::Subchapter,
            "part" => LevelKind::Part,
            "subpart" => LevelKind::Subpart,
            "division" => LevelKind::Division,
            "subdivision" => LevelKind::Subdivision,
            "article" => LevelKind::Article,
            "section" => LevelKind::Section,
            "subsection" => LevelKind::Subsection,
            "paragraph" => LevelKind::Paragraph,
            "subparagraph" => LevelKind::Subparagraph,
            "clause" => LevelKind::Clause,
            "subclause" => LevelKind::Subclause,
            "item" => LevelKind::Item,
            "subitem" => LevelKind::Subitem,
            "subsubitem" => LevelKind::Subsubitem,
            _ => return None,
        };
        Some(kind)
    }

    /// Resolves an element to a level kind. A dedicated element (`<chapter>`) and
    /// the generic container with a role (`<level role="chapter">`) resolve to the
    /// same kind; a generic container with an unknown role becomes `Other`.
    pub fn resolve(tag: &str, role: Option<&str>) -> Option<LevelKind> {
        if tag == "level" {
            let role = role.map(str::trim).filter(|r| !r.is_empty());
            return Some(
                role.and_then(LevelKind::from_name)
                    .unwrap_or_else(|| LevelKind::Other(role.unwrap_or("level").to_string())),
            );
        }
        LevelKind::from_name(tag)
    }

    pub fn as_str(&self) -> &str {
        match self {
            LevelKind::Title => "title",
            LevelKind::Subtitle => "subtitle",
            LevelKind::Chapter => "chapter",
            LevelKind::Subchapter => "subchapter",
            LevelKind::Part => "part",
            LevelKind::Subpart => "subpart",
            LevelKind::Division => "division",
            LevelKind::Subdivision => "subdivision",
            LevelKind::Article => "article",
            LevelKind::Section => "section",
            LevelKind::Subsection => "subsection",
            LevelKind::Paragraph => "paragraph",
            LevelKind::Subparagraph => "subparagraph",
            LevelKind::Clause => "clause",
            LevelKind::Subclause => "subclause",
            LevelKind::Item => "item",
            LevelKind::Subitem => "subitem",
            LevelKind::Subsubitem => "subsubitem",
            LevelKind::Other(raw) => raw.as_str(),
        }
    }

    /// Levels above section granularity.
    pub fn is_big(&self) -> bool {
        matches!(
            self,
            LevelKind::Title
                | LevelKind::Subtitle
                | LevelKind::Chapter
                | LevelKind::Subchapter
                | LevelKind::Part
                | LevelKind::Subpart
                | LevelKind::Division
                | LevelKind::Subdivision
                | LevelKind::Article
        )
    }

    /// Levels below section granularity.
    pub fn is_small(&self) -> bool {
        matches!(
            self,
            LevelKind::Subsection
                | LevelKind::Paragraph
                | LevelKind::Subparagraph
                | LevelKind::Clause
                | LevelKind::Subclause
                | LevelKind::Item
                | LevelKind::Subitem
                | LevelKind::Subsubitem
        )
    }

    pub fn is_section(&self) -> bool {
        matches!(self, LevelKind::Section)
    }

    /// Prefix used in canonical id segments. Small levels and `Other` carry none.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            LevelKind::Title => "t",
            LevelKind::Subtitle => "st",
            LevelKind::Chapter => "ch",
            LevelKind::Subchapter => "sch",
            LevelKind::Part => "p",
            LevelKind::Subpart => "sp",
            LevelKind::Division => "d",
            LevelKind::Subdivision => "sd",
            LevelKind::Article => "art",
            LevelKind::Section => "s",
            _ => "",
        }
    }

    /// Prefix the USLM `identifier` attribute uses for this kind.
    pub fn uslm_prefix(&self) -> &'static str {
        match self {
            LevelKind::Part => "pt",
            LevelKind::Subpart => "spt",
            other => other.id_prefix(),
        }
    }

    /// Subparagraph-class levels are lettered in upper case ("(A)", "(I)", "(AA)").
    pub fn uses_upper_case(&self) -> bool {
        matches!(
            self,
            LevelKind::Subparagraph | LevelKind::Subclause | LevelKind::Subitem
        )
    }

    /// Conventional small-level kind at `depth` below a section (0 = subsection).
    pub fn small_at_depth(depth: usize) -> LevelKind {
        match depth {
            0 => LevelKind::Subsection,
            1 => LevelKind::Paragraph,
            2 => LevelKind::Subparagraph,
            3 => LevelKind::Clause,
            4 => LevelKind::Subclause,
            5 => LevelKind::Item,
            6 => LevelKind::Subitem,
            _ => LevelKind::Subsubitem,
        }
    }

    /// Big-level (or section) kind for a canonical id prefix.
    pub fn from_id_prefix(prefix: &str) -> Option<LevelKind> {
        let kind = match prefix {
            "t" => LevelKind::Title,
            "st" => LevelKind::Subtitle,
            "ch" => LevelKind::Chapter,
            "sch" => LevelKind::Subchapter,
            "p" => LevelKind::Part,
            "sp" => LevelKind::Subpart,
            "d" => LevelKind::Division,
            "sd" => LevelKind::Subdivision,
            "art" => LevelKind::Article,
            "s" => LevelKind::Section,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run of a level's own text sits relative to its nested levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPosition {
    /// Chapeau: text before the first nested level.
    Leading,
    /// Continuation: text after a nested level.
    Trailing,
}

/// One paragraph of a level's own text, whitespace-collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub position: RunPosition,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub kind: LevelKind,
    pub designator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body_text: Vec<TextRun>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Level>,
    /// USLM `identifier` attribute, when the markup carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    canonical_id: Option<String>,
}

impl Level {
    pub fn new(kind: LevelKind, designator: impl Into<String>) -> Self {
        Self {
            kind,
            designator: designator.into(),
            heading: None,
            body_text: Vec::new(),
            children: Vec::new(),
            source_identifier: None,
            canonical_id: None,
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_run(mut self, position: RunPosition, text: impl Into<String>) -> Self {
        self.body_text.push(TextRun {
            position,
            text: text.into(),
        });
        self
    }

    pub fn with_child(mut self, child: Level) -> Self {
        self.children.push(child);
        self
    }

    pub fn canonical_id(&self) -> Option<&str> {
        self.canonical_id.as_deref()
    }

    /// Sets the canonical id once. Returns false when an id was already assigned.
    pub(crate) fn assign_canonical_id(&mut self, id: String) -> bool {
        if self.canonical_id.is_some() {
            return false;
        }
        self.canonical_id = Some(id);
        true
    }

    pub fn has_text(&self) -> bool {
        self.body_text.iter().any(|run| !run.text.is_empty())
    }

    /// Chapeau text: the leading runs joined with single spaces.
    pub fn leading_text(&self) -> Option<String> {
        let text = self
            .body_text
            .iter()
            .filter(|run| run.position == RunPosition::Leading)
            .map(|run| run.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        (!text.is_empty()).then_some(text)
    }

    /// Display label: "(a)" for small levels, "§ 280A" for sections, "Chapter 1" otherwise.
    pub fn label(&self) -> String {
        match &self.kind {
            kind if kind.is_small() => format!("({})", self.designator),
            LevelKind::Section => format!("§ {}", self.designator),
            LevelKind::Other(raw) if self.designator.is_empty() => raw.clone(),
            LevelKind::Other(_) => format!("({})", self.designator),
            kind => format!(
                "{} {}",
                crate::sources::common::capitalize_first(kind.as_str()),
                self.designator
            ),
        }
        .trim()
        .to_string()
    }

    /// Pre-order traversal of this level and every descendant.
    pub fn iter(&self) -> LevelIter<'_> {
        LevelIter { stack: vec![self] }
    }

    pub fn find(&self, canonical_id: &str) -> Option<&Level> {
        self.iter()
            .find(|level| level.canonical_id() == Some(canonical_id))
    }
}

pub struct LevelIter<'a> {
    stack: Vec<&'a Level>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = &'a Level;

    fn next(&mut self) -> Option<Self::Item> {
        let level = self.stack.pop()?;
        self.stack.extend(level.children.iter().rev());
        Some(level)
    }
}

/// One ancestor of a chunk's source level, most distant first in a context path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub kind: LevelKind,
    pub designator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Ancestor chapeau, filled by the hierarchical strategy only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapeau: Option<String>,
}

impl ContextEntry {
    pub fn of(level: &Level) -> Self {
        Self {
            kind: level.kind.clone(),
            designator: level.designator.clone(),
            heading: level.heading.clone(),
            chapeau: None,
        }
    }
}

/// Bounded unit of text handed to the embedding collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `canonical_id` when the level produced a single chunk, `<id>#<position>` otherwise.
    pub chunk_id: String,
    pub canonical_id: String,
    /// Human citation for the source level, e.g. `26 U.S.C. § 280A(a)(1)`.
    pub citation: String,
    /// The source level itself.
    pub level: ContextEntry,
    pub text: String,
    pub context_path: Vec<ContextEntry>,
    pub position: usize,
    pub token_estimate: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteType {
    SourceCredit,
    StatutoryNote,
    EditorialNote,
    ChangeNote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub canonical_id: String,
    pub note_type: NoteType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Heading of the cross heading ("Editorial Notes") the note is filed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_heading: Option<String>,
    pub paragraphs: Vec<String>,
    /// Distinct public law citations in the note, in first-seen order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_laws: Vec<String>,
}

impl NoteEntry {
    pub fn text(&self) -> String {
        self.paragraphs.join("\n\n")
    }
}

/// A `<ref>` pointer found inside a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    pub canonical_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portion: Option<String>,
    /// Resolved target path: `href`, or the preceding base reference plus `portion`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub text: String,
}

impl CrossReference {
    /// Citation query for targets inside the United States Code.
    pub fn query(&self) -> Option<crate::sources::usc::citations::CitationQuery> {
        self.target
            .as_deref()
            .and_then(crate::sources::usc::citations::CitationQuery::from_uslm_path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// Everything produced for one title, as handed to a `ChunkSink`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleOutput {
    pub title_number: String,
    pub meta: DocumentMeta,
    pub chunks: Vec<Chunk>,
    pub notes: Vec<NoteEntry>,
    pub cross_references: Vec<CrossReference>,
    pub warnings: Vec<ParseWarning>,
    pub accessed_at: String,
}
