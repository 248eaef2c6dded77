use std::collections::{HashMap, HashSet};

use crate::error::{ParseWarning, WarningKind};
use crate::sources::common::normalize_dashes;
use crate::types::{Level, LevelKind};

/// Designator as it appears in a canonical id segment.
///
/// Big levels and sections keep their case (`280A`, `VII`); small levels are
/// lower-cased except subparagraph-class levels, which are upper-cased.
pub fn normalize_designator(kind: &LevelKind, designator: &str) -> String {
    let cleaned: String = normalize_dashes(designator)
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '-' || c == '.').to_string();
    if kind.uses_upper_case() {
        cleaned.to_uppercase()
    } else if kind.is_small() || matches!(kind, LevelKind::Other(_)) {
        cleaned.to_lowercase()
    } else {
        cleaned
    }
}

/// One id segment: kind prefix plus normalized designator.
pub fn level_token(kind: &LevelKind, designator: &str) -> String {
    format!("{}{}", kind.id_prefix(), normalize_designator(kind, designator))
}

#[derive(Debug, Clone, Default)]
pub struct IdAssignment {
    /// Canonical ids in pre-order (index 0 is the root).
    pub ids: Vec<String>,
    pub warnings: Vec<ParseWarning>,
}

struct NodeInfo {
    kind: LevelKind,
    token: String,
    parent: Option<usize>,
    in_section: bool,
    /// Tokens of the big levels from the root's child down to this node.
    big_path: Vec<String>,
    missing_designator: bool,
}

fn collect(
    level: &Level,
    parent: Option<usize>,
    in_section: bool,
    parent_path: &[String],
    sibling_position: usize,
    infos: &mut Vec<NodeInfo>,
) {
    let missing_designator = parent.is_some() && normalize_designator(&level.kind, &level.designator).is_empty();
    let token = if missing_designator {
        let prefix = match &level.kind {
            LevelKind::Other(raw) => raw.to_lowercase(),
            kind if kind.id_prefix().is_empty() => kind.as_str().to_string(),
            kind => kind.id_prefix().to_string(),
        };
        format!("{prefix}{sibling_position}")
    } else {
        level_token(&level.kind, &level.designator)
    };

    let mut big_path = parent_path.to_vec();
    if parent.is_some() && level.kind.is_big() && !in_section {
        big_path.push(token.clone());
    }

    let index = infos.len();
    infos.push(NodeInfo {
        kind: level.kind.clone(),
        token,
        parent,
        in_section,
        big_path: big_path.clone(),
        missing_designator,
    });

    let child_in_section = in_section || level.kind.is_section();
    let mut positions: HashMap<&LevelKind, usize> = HashMap::new();
    for child in &level.children {
        let position = positions.entry(&child.kind).or_insert(0);
        *position += 1;
        collect(child, Some(index), child_in_section, &big_path, *position, infos);
    }
}

/// Shortest suffix of `path` that no other big-level path ends with.
fn minimal_suffix(path: &[String], suffix_counts: &HashMap<Vec<String>, usize>) -> String {
    for len in 1..=path.len() {
        let suffix = &path[path.len() - len..];
        if suffix_counts.get(suffix).copied().unwrap_or(0) <= 1 {
            return suffix.join("_");
        }
    }
    path.join("_")
}

/// Assigns a canonical id to every node of the tree in one top-down pass.
///
/// Calling it again on an annotated tree changes nothing and returns the
/// existing ids without warnings.
pub fn assign_canonical_ids(root: &mut Level) -> IdAssignment {
    if root.canonical_id().is_some() {
        return IdAssignment {
            ids: root
                .iter()
                .map(|level| level.canonical_id().unwrap_or_default().to_string())
                .collect(),
            warnings: Vec::new(),
        };
    }

    let mut infos = Vec::new();
    collect(root, None, false, &[], 1, &mut infos);

    let mut suffix_counts: HashMap<Vec<String>, usize> = HashMap::new();
    for info in infos.iter().filter(|info| !info.big_path.is_empty() && info.kind.is_big() && !info.in_section) {
        for len in 1..=info.big_path.len() {
            let suffix = info.big_path[info.big_path.len() - len..].to_vec();
            *suffix_counts.entry(suffix).or_insert(0) += 1;
        }
    }

    let mut ids: Vec<String> = Vec::with_capacity(infos.len());
    let mut used: HashSet<String> = HashSet::new();
    let mut warnings = Vec::new();

    for info in &infos {
        let candidate = match info.parent {
            None => info.token.clone(),
            Some(_) if info.kind.is_section() => info.token.clone(),
            Some(_) if info.kind.is_big() && !info.in_section => {
                minimal_suffix(&info.big_path, &suffix_counts)
            }
            Some(parent) => format!("{}_{}", ids[parent], info.token),
        };

        let mut id = candidate.clone();
        let mut ordinal = 2;
        while used.contains(&id) {
            id = format!("{candidate}-{ordinal}");
            ordinal += 1;
        }
        if id != candidate {
            warnings.push(
                ParseWarning::new(
                    WarningKind::DuplicateDesignator,
                    format!("duplicate {} id {candidate:?}; assigned {id:?}", info.kind),
                )
                .for_level(id.clone()),
            );
        }
        if info.missing_designator {
            warnings.push(
                ParseWarning::new(
                    WarningKind::MissingDesignator,
                    format!("{} without a designator; assigned {id:?}", info.kind),
                )
                .for_level(id.clone()),
            );
        }
        used.insert(id.clone());
        ids.push(id);
    }

    let mut next = ids.iter();
    apply(root, &mut next);

    IdAssignment { ids, warnings }
}

fn apply<'a>(level: &mut Level, ids: &mut impl Iterator<Item = &'a String>) {
    if let Some(id) = ids.next() {
        level.assign_canonical_id(id.clone());
    }
    for child in level.children.iter_mut() {
        apply(child, ids);
    }
}
