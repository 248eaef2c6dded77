mod common;

use common::{load_fixture, parse_excerpt, uslm_document};
use std::collections::HashSet;
use usc_ingest::error::{ParseError, WarningKind};
use usc_ingest::sources::usc::parser::{parse_structure, parse_usc_bytes, parse_usc_xml};
use usc_ingest::types::{LevelKind, RunPosition};

#[test]
fn extracts_document_metadata() {
    let result = parse_excerpt();
    assert_eq!(result.title_number(), "26");
    assert_eq!(result.meta.document_id, "usc26");
    assert_eq!(result.meta.identifier.as_deref(), Some("/us/usc/t26"));
    assert_eq!(result.meta.title.as_deref(), Some("Title 26"));
    assert_eq!(result.meta.doc_number.as_deref(), Some("26"));
    assert_eq!(result.meta.release_point.as_deref(), Some("Online@118-78"));
    assert_eq!(result.meta.created.as_deref(), Some("2024-05-01T09:30:00"));
}

#[test]
fn root_is_the_title() {
    let result = parse_excerpt();
    assert_eq!(result.root.kind, LevelKind::Title);
    assert_eq!(result.root.canonical_id(), Some("t26"));
    assert_eq!(result.root.heading.as_deref(), Some("INTERNAL REVENUE CODE"));
    assert_eq!(result.root.children.len(), 1);
    assert_eq!(result.root.children[0].kind, LevelKind::Subtitle);
}

#[test]
fn builds_the_full_hierarchy() {
    let result = parse_excerpt();
    let index = result.index();
    for id in [
        "stA",
        "ch1",
        "schA",
        "schA_pI",
        "schB",
        "schB_pI",
        "pVII",
        "s1",
        "s63",
        "s63_a",
        "s280A",
        "s280A_a",
        "s280A_a_1",
        "s280A_a_2",
        "s280A_b",
        "s280A_c",
        "s280A_c_1",
        "s280A_c_1_A",
        "s280A_c_1_B",
        "s280A_c_1_C",
        "s280B",
    ] {
        assert!(index.get(id).is_some(), "missing level {id}");
    }

    let section = index.get("s280A").unwrap();
    assert_eq!(section.kind, LevelKind::Section);
    assert_eq!(section.designator, "280A");
    assert_eq!(section.source_identifier.as_deref(), Some("/us/usc/t26/s280A"));
    assert_eq!(
        section
            .children
            .iter()
            .map(|child| child.designator.as_str())
            .collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
}

#[test]
fn canonical_ids_are_unique() {
    let result = parse_excerpt();
    let ids: Vec<&str> = result
        .root
        .iter()
        .map(|level| level.canonical_id().expect("every level has an id"))
        .collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());
}

#[test]
fn keeps_chapeau_and_continuation_apart() {
    let result = parse_excerpt();
    let index = result.index();

    let subsection = index.get("s280A_a").unwrap();
    assert_eq!(subsection.heading, None);
    assert_eq!(subsection.body_text.len(), 2);
    assert_eq!(subsection.body_text[0].position, RunPosition::Leading);
    assert!(subsection.body_text[0]
        .text
        .starts_with("Except as otherwise provided in this section"));
    assert!(subsection.body_text[0].text.ends_with("unless—"));
    assert_eq!(subsection.body_text[1].position, RunPosition::Trailing);
    assert!(subsection.body_text[1]
        .text
        .starts_with("This subsection shall not apply"));

    let paragraph = index.get("s280A_a_1").unwrap();
    assert_eq!(paragraph.kind, LevelKind::Paragraph);
    assert_eq!(paragraph.leading_text().as_deref(), Some("the use is exclusive and regular, or"));

    let with_ref = index.get("s280A_a_2").unwrap();
    assert_eq!(
        with_ref.leading_text().as_deref(),
        Some("the use is described in subsection (c).")
    );
}

#[test]
fn small_level_headings_are_kept() {
    let result = parse_excerpt();
    let index = result.index();
    let paragraph = index.get("s280A_c_1").unwrap();
    assert_eq!(paragraph.heading.as_deref(), Some("Certain business use"));
    assert_eq!(paragraph.children.len(), 3);
    assert_eq!(
        paragraph.children[2].kind,
        LevelKind::Subparagraph,
    );
    assert!(paragraph
        .body_text
        .iter()
        .any(|run| run.position == RunPosition::Trailing && run.text.starts_with("In the case of an employee")));
}

#[test]
fn repealed_section_heading_is_unbracketed() {
    let result = parse_excerpt();
    let repealed = result.index().get("s280B").unwrap();
    assert_eq!(repealed.designator, "280B");
    assert_eq!(
        repealed.heading.as_deref(),
        Some("Repealed. Pub. L. 99–514, title II, § 242(a), Oct. 22, 1986, 100 Stat. 2181")
    );
    assert!(!repealed.has_text());
}

#[test]
fn table_of_contents_is_excluded_with_warning() {
    let result = parse_excerpt();
    let toc = result
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::ExcludedContent && w.message.contains("toc"))
        .expect("toc warning");
    assert_eq!(toc.canonical_id.as_deref(), Some("t26"));
    assert!(toc.excluded_text.as_deref().unwrap_or("").contains("Income Taxes"));
    assert!(toc.offset.is_some());

    assert!(!result
        .root
        .iter()
        .flat_map(|level| level.body_text.iter())
        .any(|run| run.text.contains("A. Income Taxes")));
}

#[test]
fn unmapped_metadata_is_reported() {
    let result = parse_excerpt();
    assert!(result.warnings.iter().any(|w| {
        w.kind == WarningKind::ExcludedContent && w.excluded_text.as_deref() == Some("USCTitle")
    }));
}

#[test]
fn unknown_level_like_element_becomes_other_level() {
    let xml = uslm_document(
        "99",
        r#"<section identifier="/us/usc/t99/s1">
             <num value="1">§ 1.</num>
             <heading>Test section</heading>
             <subsection><num value="a">(a)</num><content>First rule.</content></subsection>
             <mysteryLevel><num>(x)</num><content>Odd text.</content></mysteryLevel>
             <subsection><num value="b">(b)</num><content>Second rule.</content></subsection>
           </section>"#,
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    let section = result.index().get("s1").unwrap();

    assert_eq!(section.children.len(), 3);
    assert_eq!(section.children[0].designator, "a");
    assert_eq!(
        section.children[1].kind,
        LevelKind::Other("mysteryLevel".to_string())
    );
    assert_eq!(section.children[1].leading_text().as_deref(), Some("Odd text."));
    assert_eq!(section.children[2].designator, "b");

    let anomalies: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::AnomalousLevel)
        .collect();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].canonical_id.as_deref(), Some("s1_x"));
}

#[test]
fn unrecognized_element_text_moves_into_warning() {
    let xml = uslm_document(
        "99",
        r#"<section identifier="/us/usc/t99/s1">
             <num value="1">§ 1.</num>
             <subsection>
               <num value="a">(a)</num>
               <content>Kept text. <widget>Hidden text</widget> More kept text.</content>
             </subsection>
           </section>"#,
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    let subsection = result.index().get("s1_a").unwrap();
    let text = subsection.leading_text().unwrap_or_default();
    assert!(text.contains("Kept text."));
    assert!(text.contains("More kept text."));
    assert!(!text.contains("Hidden"));

    let warning = result
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::UnrecognizedElement)
        .expect("unrecognized element warning");
    assert_eq!(warning.canonical_id.as_deref(), Some("s1_a"));
    assert_eq!(warning.excluded_text.as_deref(), Some("Hidden text"));
}

#[test]
fn levels_inside_unrecognized_wrapper_stay_in_the_tree() {
    let xml = uslm_document(
        "99",
        r#"<chapter identifier="/us/usc/t99/ch1">
             <num value="1">CHAPTER 1—</num>
             <courtRules>
               <p>Rules loose text.</p>
               <section identifier="/us/usc/t99/s5">
                 <num value="5">§ 5.</num>
                 <content>Rule body.</content>
                 <subsection><num value="a">(a)</num><content>Inner rule.</content></subsection>
               </section>
             </courtRules>
             <section identifier="/us/usc/t99/s6"><num value="6">§ 6.</num><content>After.</content></section>
           </chapter>"#,
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    let index = result.index();

    let section = index.get("s5").expect("section inside wrapper");
    assert_eq!(section.leading_text().as_deref(), Some("Rule body."));
    assert!(index.get("s5_a").is_some());
    assert!(index.get("s6").is_some());
    assert_eq!(
        index
            .get("ch1")
            .unwrap()
            .children
            .iter()
            .map(|child| child.canonical_id().unwrap_or_default())
            .collect::<Vec<_>>(),
        vec!["s5", "s6"]
    );

    let warning = result
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::UnrecognizedElement)
        .expect("wrapper warning");
    assert!(warning.message.contains("courtRules"));
    assert_eq!(warning.canonical_id.as_deref(), Some("ch1"));
    assert_eq!(warning.excluded_text.as_deref(), Some("Rules loose text."));
}

#[test]
fn nested_reference_keeps_the_outer_one() {
    let xml = uslm_document(
        "99",
        r#"<section identifier="/us/usc/t99/s1">
             <num value="1">§ 1.</num>
             <content>See <ref href="/us/usc/t99/s2">section 2 <ref href="/us/usc/t99/s3">and 3</ref></ref> of this title.</content>
           </section>"#,
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    assert_eq!(result.cross_references.len(), 1);
    let reference = &result.cross_references[0];
    assert_eq!(reference.canonical_id, "s1");
    assert_eq!(reference.href.as_deref(), Some("/us/usc/t99/s2"));
    assert_eq!(reference.text, "section 2 and 3");
    assert_eq!(
        result.index().get("s1").unwrap().leading_text().as_deref(),
        Some("See section 2 and 3 of this title.")
    );
}

#[test]
fn generic_level_with_role_maps_to_known_kind() {
    let xml = uslm_document(
        "99",
        r#"<section identifier="/us/usc/t99/s1">
             <num value="1">§ 1.</num>
             <level role="subsection"><num value="a">(a)</num><content>Role based.</content></level>
           </section>"#,
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    let level = result.index().get("s1_a").expect("role-mapped level");
    assert_eq!(level.kind, LevelKind::Subsection);
    assert!(result
        .warnings
        .iter()
        .all(|w| w.kind != WarningKind::AnomalousLevel));
}

#[test]
fn quoted_content_stays_in_the_quoting_level() {
    let xml = uslm_document(
        "99",
        r#"<section identifier="/us/usc/t99/s1">
             <num value="1">§ 1.</num>
             <content>Section 2 is amended to read as follows:<quotedContent><section><num>§ 2.</num><heading>Inner</heading><content>Quoted body.</content></section></quotedContent></content>
           </section>"#,
    );
    let result = parse_usc_xml(&xml, "usc99").unwrap();
    let index = result.index();
    assert!(index.get("s2").is_none());
    let text = index.get("s1").unwrap().leading_text().unwrap_or_default();
    assert!(text.contains("amended to read as follows:"));
    assert!(text.contains("Quoted body."));
}

#[test]
fn structure_pass_leaves_ids_unassigned() {
    let xml = load_fixture("usc26_excerpt.xml");
    let (root, _) = parse_structure(&xml, "usc26").unwrap();
    assert!(root.iter().all(|level| level.canonical_id().is_none()));
    assert_eq!(root.designator, "26");
}

#[test]
fn title_number_falls_back_to_document_id() {
    let xml = r#"<uscDoc><main><title><chapter><num>CHAPTER 1—</num></chapter></title></main></uscDoc>"#;
    let result = parse_usc_xml(xml, "usc05A").unwrap();
    assert_eq!(result.title_number(), "5A");
    assert_eq!(result.root.canonical_id(), Some("t5A"));
    assert!(result.index().get("ch1").is_some());
}

#[test]
fn unterminated_document_is_an_error() {
    let xml = r#"<uscDoc><main><title><section><num>§ 1.</num>"#;
    let err = parse_usc_xml(xml, "usc01").unwrap_err();
    assert_eq!(err.document(), "usc01");
    match err {
        ParseError::Unterminated { element, .. } => assert_eq!(element, "section"),
        ParseError::Xml { .. } => {}
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn mismatched_end_tag_is_an_error() {
    let xml = r#"<uscDoc><main><title></main></title></uscDoc>"#;
    let err = parse_usc_xml(xml, "usc01").unwrap_err();
    assert!(matches!(err, ParseError::Xml { .. }), "got {err:?}");
    assert!(err.offset() > 0);
}

#[test]
fn invalid_utf8_is_an_encoding_error() {
    let err = parse_usc_bytes(b"<uscDoc>\xFF</uscDoc>", "usc01").unwrap_err();
    assert!(matches!(err, ParseError::Encoding { offset: 8, .. }), "got {err:?}");
}

#[test]
fn byte_order_mark_is_accepted() {
    let mut bytes = b"\xEF\xBB\xBF".to_vec();
    bytes.extend_from_slice(uslm_document("7", "").as_bytes());
    let result = parse_usc_bytes(&bytes, "usc07").unwrap();
    assert_eq!(result.title_number(), "7");
}
