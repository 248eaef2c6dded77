mod common;

use common::{parse_excerpt, uslm_document};
use usc_ingest::chunker::{chunk_tree, ChunkStrategy, Chunker, ChunkerConfig};
use usc_ingest::error::{ChunkError, WarningKind};
use usc_ingest::sources::usc::parser::{parse_structure, parse_usc_xml};
use usc_ingest::types::{Chunk, LevelKind};

fn assert_adjacent_overlap(chunks: &[Chunk], overlap: usize) {
    for pair in chunks.windows(2) {
        let left: Vec<&str> = pair[0].text.split_whitespace().collect();
        let right: Vec<&str> = pair[1].text.split_whitespace().collect();
        assert!(left.len() >= overlap && right.len() >= overlap);
        assert_eq!(
            &left[left.len() - overlap..],
            &right[..overlap],
            "{} and {} do not overlap",
            pair[0].chunk_id,
            pair[1].chunk_id
        );
    }
}

fn config(strategy: ChunkStrategy) -> ChunkerConfig {
    ChunkerConfig {
        strategy,
        ..ChunkerConfig::default()
    }
}

#[test]
fn hierarchical_chunks_carry_ancestor_context() {
    let result = parse_excerpt();
    let set = result.chunk(&config(ChunkStrategy::Hierarchical)).unwrap();

    let chunk = set
        .chunks
        .iter()
        .find(|chunk| chunk.canonical_id == "s280A_a_1")
        .expect("chunk for (a)(1)");
    assert_eq!(chunk.chunk_id, "s280A_a_1");
    assert_eq!(chunk.citation, "26 U.S.C. § 280A(a)(1)");
    assert_eq!(chunk.text, "the use is exclusive and regular, or");
    assert_eq!(chunk.level.kind, LevelKind::Paragraph);
    assert_eq!(chunk.position, 0);

    let path = &chunk.context_path;
    assert_eq!(path[0].kind, LevelKind::Title);
    let section = &path[path.len() - 2];
    assert_eq!(section.kind, LevelKind::Section);
    assert_eq!(section.designator, "280A");
    assert!(section.heading.as_deref().unwrap().starts_with("Disallowance of certain expenses"));
    let subsection = &path[path.len() - 1];
    assert_eq!(subsection.kind, LevelKind::Subsection);
    assert_eq!(subsection.designator, "a");
    assert_eq!(subsection.heading, None);
    assert!(subsection.chapeau.as_deref().unwrap().ends_with("unless—"));
}

#[test]
fn leaf_strategy_omits_chapeaus_from_context() {
    let result = parse_excerpt();
    let set = result.chunk(&config(ChunkStrategy::Leaf)).unwrap();
    let chunk = set
        .chunks
        .iter()
        .find(|chunk| chunk.canonical_id == "s280A_c_1_A")
        .unwrap();
    assert!(chunk.context_path.iter().all(|entry| entry.chapeau.is_none()));
    assert_eq!(chunk.context_path.last().unwrap().designator, "1");
}

#[test]
fn levels_with_chapeau_and_continuation_get_their_own_chunk() {
    let result = parse_excerpt();
    let set = result.chunk(&ChunkerConfig::default()).unwrap();
    let chunk = set
        .chunks
        .iter()
        .find(|chunk| chunk.canonical_id == "s280A_a")
        .unwrap();
    let paragraphs: Vec<&str> = chunk.text.split("\n\n").collect();
    assert_eq!(paragraphs.len(), 2);
    assert!(paragraphs[0].starts_with("Except as otherwise provided"));
    assert!(paragraphs[1].starts_with("This subsection shall not apply"));
}

#[test]
fn section_strategy_inlines_descendants() {
    let result = parse_excerpt();
    let set = result.chunk(&config(ChunkStrategy::Section)).unwrap();

    let ids: Vec<&str> = set.chunks.iter().map(|c| c.canonical_id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s63", "s280A"]);

    let chunk = set.chunks.iter().find(|c| c.canonical_id == "s280A").unwrap();
    assert_eq!(chunk.citation, "26 U.S.C. § 280A");
    assert!(chunk.text.contains("(a) Except as otherwise provided"));
    assert!(chunk.text.contains("(1) the use is exclusive and regular, or"));
    assert!(chunk.text.contains("(c) Exceptions for certain business or rental use"));
    assert!(chunk.text.contains("(A) as the principal place of business"));
    let chapeau = chunk.text.find("(a) Except").unwrap();
    let child = chunk.text.find("(1) the use is exclusive").unwrap();
    let continuation = chunk.text.find("This subsection shall not apply").unwrap();
    assert!(chapeau < child && child < continuation);
    assert_eq!(chunk.context_path.last().unwrap().kind, LevelKind::Part);
}

#[test]
fn every_chunk_fits_the_budget() {
    let result = parse_excerpt();
    for strategy in [ChunkStrategy::Leaf, ChunkStrategy::Section, ChunkStrategy::Hierarchical] {
        let config = ChunkerConfig {
            max_tokens_per_chunk: 12,
            overlap_tokens: 3,
            strategy,
        };
        let set = result.chunk(&config).unwrap();
        assert!(!set.chunks.is_empty());
        for chunk in &set.chunks {
            assert!(chunk.token_estimate <= 12, "{} has {} tokens", chunk.chunk_id, chunk.token_estimate);
            assert!(chunk.token_estimate > 0);
        }
    }
}

#[test]
fn long_text_splits_into_overlapping_windows() {
    let words: Vec<String> = (0..3500).map(|i| format!("w{i}")).collect();
    let xml = uslm_document(
        "99",
        &format!(
            r#"<section><num value="1">§ 1.</num><content>{}</content></section>"#,
            words.join(" ")
        ),
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    let set = result.chunk(&ChunkerConfig::default()).unwrap();

    assert_eq!(set.chunks.len(), 4);
    let positions: Vec<usize> = set.chunks.iter().map(|c| c.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
    assert_eq!(set.chunks[0].chunk_id, "s1#0");
    assert_eq!(set.chunks[3].chunk_id, "s1#3");
    assert!(set.chunks.iter().all(|c| c.token_estimate <= 1000));

    assert!(set.chunks[0].text.starts_with("w0 "));
    assert!(set.chunks[0].text.ends_with(" w999"));
    assert!(set.chunks[1].text.starts_with("w900 "));
    assert!(set.chunks[3].text.ends_with(" w3499"));

    let forced = set
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::ForcedSplit)
        .count();
    assert_eq!(forced, 3);
    assert_adjacent_overlap(&set.chunks, 100);
}

#[test]
fn split_prefers_sentence_end() {
    let sentence = "The taxpayer shall file a return for the year.";
    let text = std::iter::repeat(sentence).take(20).collect::<Vec<_>>().join(" ");
    let xml = uslm_document(
        "99",
        &format!(r#"<section><num value="1">§ 1.</num><content>{text}</content></section>"#),
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    let set = result
        .chunk(&ChunkerConfig {
            max_tokens_per_chunk: 50,
            overlap_tokens: 10,
            strategy: ChunkStrategy::Leaf,
        })
        .unwrap();

    assert!(set.chunks.len() > 1);
    assert!(set.warnings.is_empty());
    for chunk in &set.chunks[..set.chunks.len() - 1] {
        assert!(chunk.text.ends_with("year."), "{}", chunk.text);
    }
    assert_adjacent_overlap(&set.chunks, 10);
}

#[test]
fn sentence_split_before_budget_still_overlaps() {
    // seven-word sentences never end exactly on the 50 word budget
    let sentence = "The taxpayer shall keep full adequate records.";
    let text = std::iter::repeat(sentence).take(30).collect::<Vec<_>>().join(" ");
    let xml = uslm_document(
        "99",
        &format!(r#"<section><num value="1">§ 1.</num><content>{text}</content></section>"#),
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    let set = result
        .chunk(&ChunkerConfig {
            max_tokens_per_chunk: 50,
            overlap_tokens: 10,
            strategy: ChunkStrategy::Leaf,
        })
        .unwrap();

    assert!(set.warnings.is_empty());
    assert!(set.chunks.len() > 1);
    assert_eq!(set.chunks[0].token_estimate, 49);
    for chunk in &set.chunks[..set.chunks.len() - 1] {
        assert!(chunk.text.ends_with("records."), "{}", chunk.text);
        assert!(chunk.token_estimate < 50);
    }
    assert_adjacent_overlap(&set.chunks, 10);
}

#[test]
fn unannotated_tree_is_rejected() {
    let xml = common::load_fixture("usc26_excerpt.xml");
    let (root, _) = parse_structure(&xml, "usc26").unwrap();
    let err = chunk_tree(&root, &ChunkerConfig::default()).unwrap_err();
    assert!(matches!(err, ChunkError::MissingCanonicalId { .. }));
}

#[test]
fn invalid_config_is_rejected() {
    let err = Chunker::new(ChunkerConfig {
        max_tokens_per_chunk: 100,
        overlap_tokens: 100,
        strategy: ChunkStrategy::Leaf,
    })
    .err()
    .unwrap();
    assert!(matches!(err, ChunkError::InvalidConfig(_)));
}

#[test]
fn strategy_names_round_trip() {
    for strategy in [ChunkStrategy::Leaf, ChunkStrategy::Section, ChunkStrategy::Hierarchical] {
        assert_eq!(strategy.as_str().parse::<ChunkStrategy>().unwrap(), strategy);
    }
    assert!("sentences".parse::<ChunkStrategy>().is_err());
}
