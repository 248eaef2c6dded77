use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Instant;
use usc_ingest::chunker::ChunkerConfig;
use usc_ingest::sources::usc::parser::{parse_usc_xml, title_from_document_id};

fn count_xml_nodes(xml: &str) -> usize {
    let mut reader = Reader::from_str(xml);
    let mut count = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(_) => count += 1,
            Err(e) => panic!("XML error at position {}: {:?}", reader.error_position(), e),
        }
    }
    count
}

fn summarize(label: &str, durations: &[f64]) -> f64 {
    let avg = durations.iter().sum::<f64>() / durations.len() as f64;
    let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
    println!("{label} avg: {avg:.3}s, min: {min:.3}s");
    avg
}

fn main() {
    let path = std::env::args().nth(1).expect("Usage: bench_parser <xml_file>");
    let xml = std::fs::read_to_string(&path).expect("Failed to read XML file");
    let document_id = std::path::Path::new(&path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    println!("Title {}", title_from_document_id(&document_id));

    let iterations = 5;

    // Baseline: just iterate XML events
    let _ = count_xml_nodes(&xml);
    let mut baseline = Vec::new();
    for i in 0..iterations {
        let start = Instant::now();
        let node_count = count_xml_nodes(&xml);
        let elapsed = start.elapsed().as_secs_f64();
        baseline.push(elapsed);
        println!("Baseline {}: {:.3}s ({} XML events)", i + 1, elapsed, node_count);
    }
    let baseline_avg = summarize("Baseline", &baseline);
    println!();

    let config = ChunkerConfig::default();
    let mut parse_times = Vec::new();
    let mut chunk_times = Vec::new();
    for i in 0..iterations {
        let start = Instant::now();
        let result = parse_usc_xml(&xml, &document_id).expect("parse failed");
        let parsed = start.elapsed().as_secs_f64();

        let start = Instant::now();
        let chunks = result.chunk(&config).expect("chunking failed");
        let chunked = start.elapsed().as_secs_f64();

        parse_times.push(parsed);
        chunk_times.push(chunked);
        println!(
            "Iteration {}: parse {:.3}s, chunk {:.3}s ({} levels, {} chunks, {} warnings)",
            i + 1,
            parsed,
            chunked,
            result.root.iter().count(),
            chunks.chunks.len(),
            result.warnings.len() + chunks.warnings.len(),
        );
    }

    println!();
    let parse_avg = summarize("Parser", &parse_times);
    summarize("Chunker", &chunk_times);
    println!("Parser overhead vs baseline: {:.1}x", parse_avg / baseline_avg);
}
