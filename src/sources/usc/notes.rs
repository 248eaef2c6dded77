//! Side metadata gathered during the structural pass: notes, source credits
//! and `<ref>` cross-reference pointers, keyed by the owning level.

use regex::Regex;
use std::sync::LazyLock;

use crate::sources::common::{collapse_whitespace, normalize_dashes};
use crate::types::{CrossReference, NoteEntry, NoteType};

static PUBLIC_LAW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Pub\.\s*L\.\s*(\d+)\s*[-\u{2010}\u{2011}\u{2013}\u{2014}]\s*(\d+)").unwrap()
});

const NOTE_TAGS: &[&str] = &["note", "sourceCredit", "statutoryNote", "editorialNote", "changeNote"];

pub fn is_note_tag(tag: &str) -> bool {
    NOTE_TAGS.contains(&tag)
}

/// Distinct `Pub. L. <congress>-<number>` citations, in first-seen order.
pub fn extract_public_laws(text: &str) -> Vec<String> {
    let mut laws: Vec<String> = Vec::new();
    for caps in PUBLIC_LAW_RE.captures_iter(text) {
        let law = format!("Pub. L. {}-{}", &caps[1], &caps[2]);
        if !laws.contains(&law) {
            laws.push(law);
        }
    }
    laws
}

/// How a note-like element is filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteClass {
    Entry(NoteType),
    /// "Editorial Notes" / "Statutory Notes" divider that retypes the notes after it.
    CrossHeading(Option<NoteType>),
}

/// Classifies a note element. `group` is the type set by the latest cross heading
/// in the enclosing `<notes>` block.
pub fn classify_note(
    tag: &str,
    topic: Option<&str>,
    role: Option<&str>,
    heading: Option<&str>,
    group: Option<NoteType>,
) -> NoteClass {
    if role.is_some_and(|r| r.contains("crossHeading")) {
        let marker = format!("{} {}", topic.unwrap_or(""), heading.unwrap_or("")).to_lowercase();
        let retyped = if marker.contains("editorial") {
            Some(NoteType::EditorialNote)
        } else if marker.contains("statutory") {
            Some(NoteType::StatutoryNote)
        } else {
            None
        };
        return NoteClass::CrossHeading(retyped);
    }

    match tag {
        "sourceCredit" => return NoteClass::Entry(NoteType::SourceCredit),
        "editorialNote" => return NoteClass::Entry(NoteType::EditorialNote),
        "statutoryNote" => return NoteClass::Entry(NoteType::StatutoryNote),
        "changeNote" => return NoteClass::Entry(NoteType::ChangeNote),
        _ => {}
    }

    let topic_lower = topic.unwrap_or("").to_lowercase();
    let heading_lower = heading.unwrap_or("").to_lowercase();
    if topic_lower == "amendments" || heading_lower == "amendments" || topic_lower.contains("change") {
        return NoteClass::Entry(NoteType::ChangeNote);
    }

    NoteClass::Entry(group.unwrap_or(NoteType::StatutoryNote))
}

#[derive(Debug, Default)]
struct NoteBuilder {
    tag: String,
    topic: Option<String>,
    role: Option<String>,
    owner: usize,
    heading: String,
    paragraphs: Vec<String>,
    current: String,
    in_heading: bool,
}

impl NoteBuilder {
    fn flush_paragraph(&mut self) {
        let text = collapse_whitespace(&self.current);
        if !text.is_empty() {
            self.paragraphs.push(text);
        }
        self.current.clear();
    }
}

/// Note with the pre-order ordinal of its owning level.
#[derive(Debug, Clone)]
pub(crate) struct OwnedNote {
    pub owner: usize,
    pub entry: NoteEntry,
}

#[derive(Debug)]
struct CrossHeading {
    owner: usize,
    text: String,
    filed: bool,
}

/// Streaming note builder driven by the structural parser's events.
#[derive(Debug, Default)]
pub(crate) struct NoteCollector {
    group: Option<NoteType>,
    cross_heading: Option<CrossHeading>,
    current: Option<NoteBuilder>,
    notes: Vec<OwnedNote>,
    unfiled_headings: Vec<(usize, String)>,
}

impl NoteCollector {
    pub fn open_group(&mut self) {
        self.reset_group();
    }

    pub fn close_group(&mut self) {
        self.reset_group();
    }

    fn reset_group(&mut self) {
        self.group = None;
        self.retire_cross_heading();
    }

    /// A cross heading with no note filed under it is reported by the parser.
    fn retire_cross_heading(&mut self) {
        if let Some(heading) = self.cross_heading.take() {
            if !heading.filed {
                self.unfiled_headings.push((heading.owner, heading.text));
            }
        }
    }

    pub fn open(&mut self, tag: &str, topic: Option<String>, role: Option<String>, owner: usize) {
        self.current = Some(NoteBuilder {
            tag: tag.to_string(),
            topic,
            role,
            owner,
            ..NoteBuilder::default()
        });
    }

    pub fn push_text(&mut self, text: &str) {
        if let Some(note) = self.current.as_mut() {
            if note.in_heading {
                note.heading.push_str(text);
            } else {
                note.current.push_str(text);
            }
        }
    }

    pub fn start_heading(&mut self) {
        if let Some(note) = self.current.as_mut() {
            note.flush_paragraph();
            note.in_heading = true;
        }
    }

    pub fn end_heading(&mut self) {
        if let Some(note) = self.current.as_mut() {
            note.in_heading = false;
        }
    }

    /// Paragraph boundary inside the open note.
    pub fn block_boundary(&mut self) {
        if let Some(note) = self.current.as_mut() {
            if note.in_heading {
                note.heading.push(' ');
            } else {
                note.flush_paragraph();
            }
        }
    }

    /// Word boundary inside the open note (table cells, quoted blocks).
    pub fn space(&mut self) {
        self.push_text(" ");
    }

    pub fn close(&mut self) {
        let Some(mut note) = self.current.take() else {
            return;
        };
        note.flush_paragraph();
        let heading = collapse_whitespace(&note.heading);
        let heading = (!heading.is_empty()).then_some(heading);

        match classify_note(
            &note.tag,
            note.topic.as_deref(),
            note.role.as_deref(),
            heading.as_deref(),
            self.group,
        ) {
            NoteClass::CrossHeading(retyped) => {
                if retyped.is_some() {
                    self.group = retyped;
                }
                self.retire_cross_heading();
                if let Some(text) = heading {
                    self.cross_heading = Some(CrossHeading {
                        owner: note.owner,
                        text,
                        filed: false,
                    });
                }
            }
            NoteClass::Entry(note_type) => {
                if heading.is_none() && note.paragraphs.is_empty() {
                    return;
                }
                let group_heading = self.cross_heading.as_mut().map(|cross| {
                    cross.filed = true;
                    cross.text.clone()
                });
                let mut haystack = heading.clone().unwrap_or_default();
                for paragraph in &note.paragraphs {
                    haystack.push(' ');
                    haystack.push_str(paragraph);
                }
                self.notes.push(OwnedNote {
                    owner: note.owner,
                    entry: NoteEntry {
                        canonical_id: String::new(),
                        note_type,
                        topic: note.topic,
                        heading,
                        group_heading,
                        paragraphs: note.paragraphs,
                        public_laws: extract_public_laws(&haystack),
                    },
                });
            }
        }
    }

    /// Filed notes, and cross headings that never had a note under them.
    pub fn finish(mut self) -> (Vec<OwnedNote>, Vec<(usize, String)>) {
        self.retire_cross_heading();
        (self.notes, self.unfiled_headings)
    }
}

#[derive(Debug)]
struct ReferenceBuilder {
    owner: usize,
    href: Option<String>,
    portion: Option<String>,
    text: String,
}

#[derive(Debug, Clone)]
pub(crate) struct OwnedReference {
    pub owner: usize,
    pub reference: CrossReference,
}

/// Collects `<ref>` pointers. A `portion` without an `href` extends the latest
/// href-bearing reference of the same level.
#[derive(Debug, Default)]
pub(crate) struct ReferenceCollector {
    current: Option<ReferenceBuilder>,
    last_base: Option<(usize, String)>,
    references: Vec<OwnedReference>,
}

impl ReferenceCollector {
    pub fn open(&mut self, href: Option<String>, portion: Option<String>, owner: usize) {
        self.current = Some(ReferenceBuilder {
            owner,
            href: href.filter(|h| !h.trim().is_empty()),
            portion: portion.filter(|p| !p.trim().is_empty()),
            text: String::new(),
        });
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn push_text(&mut self, text: &str) {
        if let Some(reference) = self.current.as_mut() {
            reference.text.push_str(text);
        }
    }

    pub fn close(&mut self) {
        let Some(builder) = self.current.take() else {
            return;
        };

        let base = match &builder.href {
            Some(href) => Some(href.clone()),
            None => self
                .last_base
                .as_ref()
                .filter(|(owner, _)| *owner == builder.owner)
                .map(|(_, base)| base.clone()),
        };
        let target = match (&base, &builder.portion) {
            (Some(base), Some(portion)) => Some(join_portion(base, portion)),
            (Some(base), None) => Some(base.clone()),
            (None, _) => None,
        };
        if let Some(href) = &builder.href {
            self.last_base = Some((builder.owner, href.clone()));
        }

        self.references.push(OwnedReference {
            owner: builder.owner,
            reference: CrossReference {
                canonical_id: String::new(),
                href: builder.href,
                portion: builder.portion,
                target,
                text: normalize_dashes(&collapse_whitespace(&builder.text)),
            },
        });
    }

    pub fn finish(self) -> Vec<OwnedReference> {
        self.references
    }
}

/// Appends a portion path to a base reference path.
pub fn join_portion(base: &str, portion: &str) -> String {
    let base = base.trim_end_matches('/');
    let portion = portion.trim();
    if portion.starts_with('/') {
        format!("{base}{portion}")
    } else {
        format!("{base}/{portion}")
    }
}
