use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::citations::CitationIndex;
use super::identifiers::assign_canonical_ids;
use super::notes::{is_note_tag, NoteCollector, OwnedNote, OwnedReference, ReferenceCollector};
use crate::chunker::{chunk_tree, ChunkSet, ChunkerConfig};
use crate::error::{ChunkError, ParseError, ParseWarning, WarningKind};
use crate::sources::common::{
    collapse_whitespace, extract_designator, normalize_dashes, strip_leading_zeros,
};
use crate::types::{CrossReference, DocumentMeta, Level, LevelKind, NoteEntry, RunPosition, TextRun};

const WRAPPER_TAGS: &[&str] = &["uscDoc", "lawDoc", "main", "component", "appendix"];

/// Elements whose text forms its own paragraph run.
const BLOCK_TAGS: &[&str] = &[
    "content",
    "chapeau",
    "continuation",
    "p",
    "text",
    "proviso",
    "subheading",
    "layout",
    "table",
    "thead",
    "tbody",
    "tr",
    "row",
    "header",
    "list",
    "listItem",
    "block",
];

/// Inline elements that still separate words (table cells, line breaks).
const SPACED_TAGS: &[&str] = &["column", "td", "th", "br", "num", "heading"];

const INLINE_TAGS: &[&str] = &[
    "i",
    "b",
    "u",
    "em",
    "strong",
    "span",
    "inline",
    "sup",
    "sub",
    "date",
    "term",
    "quotedText",
    "shortTitle",
    "del",
    "ins",
    "abbr",
    "marker",
    "fillIn",
    "checkBox",
    "footnoteRef",
    "footnote",
    "img",
    "page",
    "def",
    "center",
];

/// Known non-legislative content that is skipped with a warning.
const EXCLUDED_TAGS: &[&str] = &["toc"];

const LEVEL_WORDS: &[&str] = &[
    "title", "chapter", "part", "division", "article", "section", "paragraph", "clause", "item",
    "level",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaField {
    Title,
    DocNumber,
    ReleasePoint,
    Created,
}

impl MetaField {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "title" => Some(MetaField::Title),
            "docNumber" => Some(MetaField::DocNumber),
            "docPublicationName" => Some(MetaField::ReleasePoint),
            "created" => Some(MetaField::Created),
            _ => None,
        }
    }
}

/// Role of an open element; decides where its text goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Wrapper,
    RootTitle,
    Level,
    Num,
    Heading,
    Block,
    Inline,
    Spaced,
    Quoted,
    Reference,
    NoteGroup,
    Note,
    NoteHeading,
    NoteBlock,
    Meta,
    MetaField(MetaField),
    Excluded,
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Normal,
    Quoted,
    Note,
    Meta,
    Excluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Run,
    Num,
    Heading,
    Note,
    MetaField,
    MetaOther,
    Exclusion,
    Unrecognized,
}

struct OpenLevel {
    ordinal: usize,
    level: Level,
    num_value: Option<String>,
    num_text: String,
    heading_text: String,
    run: String,
    seen_child: bool,
}

impl OpenLevel {
    fn new(ordinal: usize, kind: LevelKind, identifier: Option<String>) -> Self {
        let mut level = Level::new(kind, "");
        level.source_identifier = identifier;
        Self {
            ordinal,
            level,
            num_value: None,
            num_text: String::new(),
            heading_text: String::new(),
            run: String::new(),
            seen_child: false,
        }
    }

    fn flush_run(&mut self) {
        let text = collapse_whitespace(&self.run);
        self.run.clear();
        if text.is_empty() {
            return;
        }
        let position = if self.seen_child {
            RunPosition::Trailing
        } else {
            RunPosition::Leading
        };
        self.level.body_text.push(TextRun { position, text });
    }

    fn finish(mut self) -> Level {
        self.flush_run();
        let designator = self
            .num_value
            .as_deref()
            .map(|value| value.trim().trim_start_matches('§').trim())
            .filter(|value| !value.is_empty())
            .map(normalize_dashes)
            .or_else(|| extract_designator(&self.num_text))
            .or_else(|| {
                self.level
                    .source_identifier
                    .as_deref()
                    .and_then(|id| designator_from_identifier(id, &self.level.kind))
            })
            .unwrap_or_default();
        self.level.designator = designator;
        self.level.heading = clean_heading(&self.num_text, &self.heading_text);
        self.level
    }
}

struct Exclusion {
    tag: String,
    kind: WarningKind,
    text: String,
    offset: u64,
    owner: usize,
}

/// Output of the structural pass, before canonical ids exist.
pub(crate) struct Scan {
    pub root: Level,
    pub meta: DocumentMeta,
    pub notes: Vec<OwnedNote>,
    pub references: Vec<OwnedReference>,
    pub warnings: Vec<ParseWarning>,
}

struct StructureParser {
    document: String,
    frames: Vec<Frame>,
    open_tags: Vec<(String, u64)>,
    root: OpenLevel,
    levels: Vec<OpenLevel>,
    next_ordinal: usize,
    root_bound: bool,
    notes: NoteCollector,
    references: ReferenceCollector,
    exclusion: Option<Exclusion>,
    unrecognized: Vec<Exclusion>,
    meta: DocumentMeta,
    meta_buffer: String,
    meta_other: String,
    warnings: Vec<ParseWarning>,
}

impl StructureParser {
    fn new(document_id: &str) -> Self {
        Self {
            document: document_id.to_string(),
            frames: Vec::new(),
            open_tags: Vec::new(),
            root: OpenLevel::new(0, LevelKind::Title, None),
            levels: Vec::new(),
            next_ordinal: 1,
            root_bound: false,
            notes: NoteCollector::default(),
            references: ReferenceCollector::default(),
            exclusion: None,
            unrecognized: Vec::new(),
            meta: DocumentMeta {
                document_id: document_id.to_string(),
                ..DocumentMeta::default()
            },
            meta_buffer: String::new(),
            meta_other: String::new(),
            warnings: Vec::new(),
        }
    }

    fn top_mut(&mut self) -> &mut OpenLevel {
        self.levels.last_mut().unwrap_or(&mut self.root)
    }

    fn owner(&self) -> usize {
        self.levels.last().map_or(self.root.ordinal, |open| open.ordinal)
    }

    fn context(&self) -> Context {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Excluded => return Context::Excluded,
                Frame::Note | Frame::NoteHeading | Frame::NoteBlock => return Context::Note,
                Frame::Meta | Frame::MetaField(_) => return Context::Meta,
                Frame::Quoted => return Context::Quoted,
                _ => {}
            }
        }
        Context::Normal
    }

    fn start(&mut self, e: &BytesStart<'_>, offset: u64) {
        let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let frame = match self.context() {
            Context::Excluded | Context::Quoted => {
                self.space();
                Frame::Inline
            }
            Context::Meta => match MetaField::from_tag(&tag) {
                Some(field) if self.frames.last() == Some(&Frame::Meta) => {
                    self.meta_buffer.clear();
                    Frame::MetaField(field)
                }
                _ => {
                    self.meta_other.push(' ');
                    Frame::Inline
                }
            },
            Context::Note => self.classify_in_note(&tag, e),
            Context::Normal => self.classify(&tag, e, offset),
        };
        self.frames.push(frame);
        self.open_tags.push((tag, offset));
    }

    fn classify(&mut self, tag: &str, e: &BytesStart<'_>, offset: u64) -> Frame {
        let parent_is_level = matches!(
            self.frames.last(),
            Some(Frame::Level) | Some(Frame::RootTitle)
        );

        match tag {
            t if WRAPPER_TAGS.contains(&t) => {
                if t == "uscDoc" && self.meta.identifier.is_none() {
                    self.meta.identifier = attr(e, "identifier");
                }
                Frame::Wrapper
            }
            "meta" => Frame::Meta,
            "num" if parent_is_level => {
                let value = attr(e, "value");
                let top = self.top_mut();
                if top.num_value.is_none() {
                    top.num_value = value;
                }
                Frame::Num
            }
            "heading" if parent_is_level => Frame::Heading,
            "notes" => {
                self.notes.open_group();
                Frame::NoteGroup
            }
            t if is_note_tag(t) => {
                let owner = self.owner();
                self.notes
                    .open(t, attr(e, "topic"), attr(e, "role"), owner);
                Frame::Note
            }
            "quotedContent" => {
                self.space();
                Frame::Quoted
            }
            "ref" if !self.references.is_open() => {
                let owner = self.owner();
                self.references
                    .open(attr(e, "href"), attr(e, "portion"), owner);
                Frame::Reference
            }
            "ref" => Frame::Inline,
            t if EXCLUDED_TAGS.contains(&t) => self.exclude(t, WarningKind::ExcludedContent, offset),
            t if BLOCK_TAGS.contains(&t) => {
                self.top_mut().flush_run();
                Frame::Block
            }
            t if SPACED_TAGS.contains(&t) => {
                self.space();
                Frame::Spaced
            }
            t if INLINE_TAGS.contains(&t) => Frame::Inline,
            _ => {
                let role = attr(e, "role").or_else(|| attr(e, "class"));
                match LevelKind::resolve(tag, role.as_deref()) {
                    Some(kind) => self.open_level(kind, e, offset),
                    None if looks_level_like(tag, e) => {
                        self.open_level(LevelKind::Other(tag.to_string()), e, offset)
                    }
                    None => {
                        self.unrecognized.push(Exclusion {
                            tag: tag.to_string(),
                            kind: WarningKind::UnrecognizedElement,
                            text: String::new(),
                            offset,
                            owner: self.owner(),
                        });
                        Frame::Unrecognized
                    }
                }
            }
        }
    }

    fn classify_in_note(&mut self, tag: &str, e: &BytesStart<'_>) -> Frame {
        match tag {
            "heading" if self.frames.last() == Some(&Frame::Note) => {
                self.notes.start_heading();
                Frame::NoteHeading
            }
            "ref" if !self.references.is_open() => {
                let owner = self.owner();
                self.references
                    .open(attr(e, "href"), attr(e, "portion"), owner);
                Frame::Reference
            }
            "ref" => Frame::Inline,
            t if INLINE_TAGS.contains(&t) => Frame::Inline,
            t if SPACED_TAGS.contains(&t) => {
                self.notes.space();
                Frame::Spaced
            }
            _ => {
                self.notes.block_boundary();
                Frame::NoteBlock
            }
        }
    }

    fn open_level(&mut self, kind: LevelKind, e: &BytesStart<'_>, offset: u64) -> Frame {
        let identifier = attr(e, "identifier");
        if kind == LevelKind::Title && !self.root_bound && self.levels.is_empty() {
            self.root_bound = true;
            if identifier.is_some() {
                self.root.level.source_identifier = identifier;
            }
            return Frame::RootTitle;
        }

        let parent = self.top_mut();
        parent.flush_run();
        parent.seen_child = true;

        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        if let LevelKind::Other(raw) = &kind {
            self.warnings.push(
                ParseWarning::new(
                    WarningKind::AnomalousLevel,
                    format!("unrecognized structural element <{raw}> kept as an `other` level"),
                )
                .at_offset(offset)
                .owned_by(ordinal),
            );
        }
        self.levels.push(OpenLevel::new(ordinal, kind, identifier));
        Frame::Level
    }

    fn exclude(&mut self, tag: &str, kind: WarningKind, offset: u64) -> Frame {
        self.exclusion = Some(Exclusion {
            tag: tag.to_string(),
            kind,
            text: String::new(),
            offset,
            owner: self.owner(),
        });
        Frame::Excluded
    }

    /// Buffer that receives text at the current position, and whether a
    /// reference is open around it.
    fn sink(&self) -> (Sink, bool) {
        let mut in_reference = false;
        let mut sink = Sink::Run;
        for frame in self.frames.iter().rev() {
            sink = match frame {
                Frame::Reference => {
                    in_reference = true;
                    continue;
                }
                Frame::Excluded => Sink::Exclusion,
                Frame::Unrecognized => Sink::Unrecognized,
                Frame::MetaField(_) => Sink::MetaField,
                Frame::Meta => Sink::MetaOther,
                Frame::Note | Frame::NoteHeading | Frame::NoteBlock => Sink::Note,
                Frame::Num => Sink::Num,
                Frame::Heading => Sink::Heading,
                Frame::Level | Frame::RootTitle => Sink::Run,
                _ => continue,
            };
            break;
        }
        (sink, in_reference)
    }

    /// Word boundary in whatever buffer currently receives text.
    fn space(&mut self) {
        match self.sink().0 {
            Sink::Note => self.notes.space(),
            sink => self.push_to(sink, " "),
        }
    }

    fn text(&mut self, text: &str) {
        let (sink, in_reference) = self.sink();
        if in_reference {
            self.references.push_text(text);
        }
        self.push_to(sink, text);
    }

    fn push_to(&mut self, sink: Sink, text: &str) {
        match sink {
            Sink::Run => self.top_mut().run.push_str(text),
            Sink::Num => self.top_mut().num_text.push_str(text),
            Sink::Heading => self.top_mut().heading_text.push_str(text),
            Sink::Note => self.notes.push_text(text),
            Sink::MetaField => self.meta_buffer.push_str(text),
            Sink::MetaOther => self.meta_other.push_str(text),
            Sink::Exclusion => {
                if let Some(exclusion) = self.exclusion.as_mut() {
                    exclusion.text.push_str(text);
                }
            }
            Sink::Unrecognized => {
                if let Some(element) = self.unrecognized.last_mut() {
                    element.text.push_str(text);
                }
            }
        }
    }

    fn end(&mut self, tag: &str, offset: u64) -> Result<(), ParseError> {
        let Some(frame) = self.frames.pop() else {
            return Err(ParseError::UnexpectedEnd {
                document: self.document.clone(),
                element: tag.to_string(),
                offset,
            });
        };
        self.open_tags.pop();

        match frame {
            Frame::Level => self.close_level(),
            Frame::Block => self.top_mut().flush_run(),
            Frame::Quoted | Frame::Spaced => self.space(),
            Frame::Inline => {
                if matches!(self.context(), Context::Quoted | Context::Excluded) {
                    self.space();
                }
            }
            Frame::Reference => self.references.close(),
            Frame::Note => self.notes.close(),
            Frame::NoteHeading => self.notes.end_heading(),
            Frame::NoteBlock => self.notes.block_boundary(),
            Frame::NoteGroup => self.notes.close_group(),
            Frame::MetaField(field) => self.finish_meta_field(field),
            Frame::Meta => self.finish_meta(offset),
            Frame::Excluded => self.finish_exclusion(),
            Frame::Unrecognized => self.finish_unrecognized(),
            Frame::Num | Frame::Heading | Frame::Wrapper | Frame::RootTitle => {}
        }
        Ok(())
    }

    fn close_level(&mut self) {
        if let Some(open) = self.levels.pop() {
            let level = open.finish();
            self.top_mut().level.children.push(level);
        }
    }

    fn finish_meta_field(&mut self, field: MetaField) {
        let value = collapse_whitespace(&self.meta_buffer);
        self.meta_buffer.clear();
        if value.is_empty() {
            return;
        }
        let slot = match field {
            MetaField::Title => &mut self.meta.title,
            MetaField::DocNumber => &mut self.meta.doc_number,
            MetaField::ReleasePoint => &mut self.meta.release_point,
            MetaField::Created => &mut self.meta.created,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fn finish_meta(&mut self, offset: u64) {
        let other = collapse_whitespace(&self.meta_other);
        self.meta_other.clear();
        if other.is_empty() {
            return;
        }
        self.warnings.push(
            ParseWarning::new(
                WarningKind::ExcludedContent,
                "document metadata kept outside the level tree",
            )
            .at_offset(offset)
            .owned_by(self.root.ordinal)
            .with_excluded_text(other),
        );
    }

    fn finish_exclusion(&mut self) {
        let Some(exclusion) = self.exclusion.take() else {
            return;
        };
        let message = match exclusion.kind {
            WarningKind::ExcludedContent => format!("skipped <{}> content", exclusion.tag),
            _ => format!("skipped unrecognized element <{}>", exclusion.tag),
        };
        self.warnings.push(
            ParseWarning::new(exclusion.kind, message)
                .at_offset(exclusion.offset)
                .owned_by(exclusion.owner)
                .with_excluded_text(collapse_whitespace(&exclusion.text)),
        );
    }

    /// Unrecognized elements are transparent: nested levels stay in the tree
    /// and only the element's own loose text moves into the warning.
    fn finish_unrecognized(&mut self) {
        let Some(element) = self.unrecognized.pop() else {
            return;
        };
        let text = collapse_whitespace(&element.text);
        let mut warning = ParseWarning::new(
            element.kind,
            format!("skipped unrecognized element <{}>", element.tag),
        )
        .at_offset(element.offset)
        .owned_by(element.owner);
        if !text.is_empty() {
            warning = warning.with_excluded_text(text);
        }
        self.warnings.push(warning);
    }

    fn finish(mut self) -> Result<Scan, ParseError> {
        if let Some((element, offset)) = self.open_tags.last() {
            return Err(ParseError::Unterminated {
                document: self.document.clone(),
                element: element.clone(),
                offset: *offset,
            });
        }

        let (notes, unfiled_headings) = self.notes.finish();
        for (owner, heading) in unfiled_headings {
            self.warnings.push(
                ParseWarning::new(
                    WarningKind::ExcludedContent,
                    "note cross heading with no notes under it",
                )
                .owned_by(owner)
                .with_excluded_text(heading),
            );
        }

        let mut root = self.root.finish();
        if root.source_identifier.is_none() {
            root.source_identifier = self.meta.identifier.clone();
        }
        if root.designator.is_empty() {
            root.designator = self
                .meta
                .doc_number
                .as_deref()
                .and_then(extract_designator)
                .or_else(|| {
                    root.source_identifier
                        .as_deref()
                        .and_then(|id| designator_from_identifier(id, &LevelKind::Title))
                })
                .unwrap_or_else(|| title_from_document_id(&self.document));
        }
        root.designator = strip_leading_zeros(&root.designator);

        Ok(Scan {
            root,
            meta: self.meta,
            notes,
            references: self.references.finish(),
            warnings: self.warnings,
        })
    }
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

fn looks_level_like(tag: &str, e: &BytesStart<'_>) -> bool {
    if attr(e, "identifier").is_some() {
        return true;
    }
    let lower = tag.to_ascii_lowercase();
    LEVEL_WORDS.iter().any(|word| lower.contains(word))
}

/// Designator from the last segment of a USLM identifier (`/us/usc/t26/stA/ch1` → `1`).
fn designator_from_identifier(identifier: &str, kind: &LevelKind) -> Option<String> {
    let segment = identifier.trim_end_matches('/').rsplit('/').next()?;
    let prefix = kind.uslm_prefix();
    let value = if prefix.is_empty() {
        segment
    } else {
        segment.strip_prefix(prefix).filter(|rest| !rest.is_empty())?
    };
    (!value.is_empty()).then(|| normalize_dashes(value))
}

fn clean_heading(num_text: &str, heading: &str) -> Option<String> {
    let mut out = collapse_whitespace(heading);
    if collapse_whitespace(num_text).starts_with('[') && out.ends_with(']') {
        out.pop();
        out = out.trim_end().to_string();
    }
    (!out.is_empty()).then_some(out)
}

/// `usc26` / `usc05A.xml` / `26` → `26` / `5A` / `26`.
pub fn title_from_document_id(document_id: &str) -> String {
    let name = document_id.trim();
    let name = name.strip_suffix(".xml").unwrap_or(name);
    let name = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    let name = match name.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("usc") => &name[3..],
        _ => name,
    };
    strip_leading_zeros(name)
}

/// Runs the structural pass over one decoded document.
pub(crate) fn scan_document(xml: &str, document_id: &str) -> Result<Scan, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut parser = StructureParser::new(document_id);
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf);
        let offset = reader.buffer_position() as u64;
        match event {
            Ok(Event::Start(ref e)) => parser.start(e, offset),
            Ok(Event::Empty(ref e)) => {
                parser.start(e, offset);
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                parser.end(&tag, offset)?;
            }
            Ok(Event::End(ref e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                parser.end(&tag, offset)?;
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|err| ParseError::Xml {
                    document: document_id.to_string(),
                    offset,
                    message: err.to_string(),
                })?;
                parser.text(&text);
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                parser.text(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ParseError::Xml {
                    document: document_id.to_string(),
                    offset: reader.error_position() as u64,
                    message: err.to_string(),
                })
            }
        }
        buf.clear();
    }

    parser.finish()
}

/// Parses a document into its level tree without assigning canonical ids.
pub fn parse_structure(xml: &str, document_id: &str) -> Result<(Level, Vec<ParseWarning>), ParseError> {
    let scan = scan_document(xml, document_id)?;
    Ok((scan.root, scan.warnings))
}

#[derive(Debug, Clone)]
pub struct ParseResult {
    pub root: Level,
    pub meta: DocumentMeta,
    pub notes: Vec<NoteEntry>,
    pub cross_references: Vec<CrossReference>,
    pub warnings: Vec<ParseWarning>,
}

impl ParseResult {
    pub fn title_number(&self) -> &str {
        &self.root.designator
    }

    pub fn index(&self) -> CitationIndex<'_> {
        CitationIndex::build(&self.root)
    }

    pub fn chunk(&self, config: &ChunkerConfig) -> Result<ChunkSet, ChunkError> {
        chunk_tree(&self.root, config)
    }

    pub fn notes_for<'a>(&'a self, canonical_id: &'a str) -> impl Iterator<Item = &'a NoteEntry> + 'a {
        self.notes
            .iter()
            .filter(move |note| note.canonical_id == canonical_id)
    }

    pub fn references_for<'a>(
        &'a self,
        canonical_id: &'a str,
    ) -> impl Iterator<Item = &'a CrossReference> + 'a {
        self.cross_references
            .iter()
            .filter(move |reference| reference.canonical_id == canonical_id)
    }
}

/// Full pass over one title: structure, canonical ids, notes and references
/// keyed by id, and every warning.
pub fn parse_usc_xml(xml: &str, document_id: &str) -> Result<ParseResult, ParseError> {
    let Scan {
        mut root,
        meta,
        notes,
        references,
        mut warnings,
    } = scan_document(xml, document_id)?;

    let assignment = assign_canonical_ids(&mut root);
    let id_of = |ordinal: usize| assignment.ids.get(ordinal).cloned().unwrap_or_default();

    for warning in warnings.iter_mut() {
        if warning.canonical_id.is_none() {
            warning.canonical_id = warning.owner.map(id_of).filter(|id| !id.is_empty());
        }
    }
    warnings.extend(assignment.warnings.iter().cloned());

    let notes: Vec<NoteEntry> = notes
        .into_iter()
        .map(|owned| NoteEntry {
            canonical_id: id_of(owned.owner),
            ..owned.entry
        })
        .collect();
    let cross_references: Vec<CrossReference> = references
        .into_iter()
        .map(|owned| CrossReference {
            canonical_id: id_of(owned.owner),
            ..owned.reference
        })
        .collect();

    debug!(
        "[Ingest] Parsed {}: {} levels, {} notes, {} references, {} warnings",
        document_id,
        assignment.ids.len(),
        notes.len(),
        cross_references.len(),
        warnings.len()
    );

    Ok(ParseResult {
        root,
        meta,
        notes,
        cross_references,
        warnings,
    })
}

/// Decodes raw bytes (UTF-8, optional BOM) and parses them.
pub fn parse_usc_bytes(bytes: &[u8], document_id: &str) -> Result<ParseResult, ParseError> {
    let (bom, body) = match bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()) {
        Some(body) => (3u64, body),
        None => (0u64, bytes),
    };
    let xml = std::str::from_utf8(body).map_err(|err| ParseError::Encoding {
        document: document_id.to_string(),
        offset: bom + err.valid_up_to() as u64,
        message: err.to_string(),
    })?;
    parse_usc_xml(xml, document_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn designator_from_identifier_strips_uslm_prefix() {
        assert_eq!(
            designator_from_identifier("/us/usc/t26/stA/ch1/schB/ptVII", &LevelKind::Part).as_deref(),
            Some("VII")
        );
        assert_eq!(
            designator_from_identifier("/us/usc/t26/s280A", &LevelKind::Section).as_deref(),
            Some("280A")
        );
        assert_eq!(
            designator_from_identifier("/us/usc/t26/s280A/a/1", &LevelKind::Paragraph).as_deref(),
            Some("1")
        );
        assert_eq!(designator_from_identifier("/us/usc/t26/s1", &LevelKind::Chapter), None);
    }

    #[test]
    fn bracketed_repealed_heading_is_unwrapped() {
        assert_eq!(
            clean_heading("[§ 280B.", "Repealed. Pub. L. 99–514]").as_deref(),
            Some("Repealed. Pub. L. 99–514")
        );
        assert_eq!(clean_heading("§ 1.", "  "), None);
    }

    #[test]
    fn title_number_from_document_id() {
        assert_eq!(title_from_document_id("usc26"), "26");
        assert_eq!(title_from_document_id("data/usc05A.xml"), "5A");
        assert_eq!(title_from_document_id("42"), "42");
    }
}
