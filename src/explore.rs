use serde_json::{json, Value};
use usc_ingest::chunker::ChunkerConfig;
use usc_ingest::sources::usc::citations::CitationLookup;
use usc_ingest::sources::usc::parser::parse_usc_bytes;
use usc_ingest::types::Level;

type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> Result<(), DynError> {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.len() != 2 {
        eprintln!("Usage: explore <xml_file> <citation>");
        std::process::exit(2);
    }

    let xml_path = args.remove(0);
    let citation = args.remove(0);
    let bytes = std::fs::read(&xml_path)?;
    let document_id = std::path::Path::new(&xml_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();

    let result = parse_usc_bytes(&bytes, &document_id)?;
    let index = result.index();

    let lookup = index.lookup(&citation);
    let level = match &lookup {
        CitationLookup::NotFound => {
            println!("matches: []");
            return Ok(());
        }
        CitationLookup::Found(level) => *level,
        CitationLookup::Ambiguous {
            level,
            alternative,
            warning,
        } => {
            println!("ambiguous: {}", warning.message);
            println!("alternative: {}", alternative.canonical_id().unwrap_or_default());
            *level
        }
    };

    let canonical_id = level.canonical_id().unwrap_or_default().to_string();
    println!("matches:");
    print_level(level);

    let notes = result.notes_for(&canonical_id).collect::<Vec<_>>();
    println!("    notes:");
    for note in notes {
        print_indented_json(&serde_json::to_value(note).unwrap_or_else(|_| json!({})), 6);
    }

    println!("    references:");
    for reference in result.references_for(&canonical_id) {
        println!(
            "      - {} -> {}",
            reference.text,
            reference.target.as_deref().unwrap_or("(unresolved)")
        );
    }

    let chunks = result.chunk(&ChunkerConfig::default())?;
    let prefix = format!("{canonical_id}_");
    println!("    chunks:");
    for chunk in chunks
        .chunks
        .iter()
        .filter(|chunk| chunk.canonical_id == canonical_id || chunk.canonical_id.starts_with(&prefix))
    {
        println!("      - chunk_id: {}", chunk.chunk_id);
        println!("        citation: {}", chunk.citation);
        println!("        tokens: {}", chunk.token_estimate);
        println!("        text: |-");
        for line in chunk.text.lines() {
            println!("          {line}");
        }
    }

    Ok(())
}

fn print_level(level: &Level) {
    println!("  - canonical_id: {}", level.canonical_id().unwrap_or_default());
    println!("    label: {}", level.label());
    println!("    kind: {}", level.kind);
    match &level.heading {
        Some(heading) => println!("    heading: {heading}"),
        None => println!("    heading: null"),
    }
    if let Some(identifier) = &level.source_identifier {
        println!("    identifier: {identifier}");
    }
    println!("    children:");
    for child in &level.children {
        println!("      - {} {}", child.canonical_id().unwrap_or_default(), child.label());
    }
}

fn print_indented_json(value: &Value, indent: usize) {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    let pad = " ".repeat(indent);
    for line in pretty.lines() {
        println!("{pad}{line}");
    }
}
