/// Standard bioinformatics format writers for extension outputs
/// Provides contig FASTA, path structure dumps, edge FASTA and GFA exports
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::core::assembly_graph::{AssemblyGraph, EdgeId};
use crate::path_extend::PathContainer;

const FASTA_LINE_WIDTH: usize = 80;

fn create(path: &Path, what: &str) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {} file: {}", what, path.display()))?;
    Ok(BufWriter::new(file))
}

fn write_wrapped<W: Write>(writer: &mut W, sequence: &str) -> Result<()> {
    for chunk in sequence.as_bytes().chunks(FASTA_LINE_WIDTH) {
        writeln!(writer, "{}", std::str::from_utf8(chunk)?)?;
    }
    Ok(())
}

/// GC fraction of a sequence, gaps (`N`) excluded from the denominator.
pub fn calculate_gc_content(sequence: &str) -> f64 {
    let mut gc = 0usize;
    let mut called = 0usize;
    for b in sequence.bytes() {
        match b.to_ascii_uppercase() {
            b'G' | b'C' => {
                gc += 1;
                called += 1;
            }
            b'A' | b'T' => called += 1,
            _ => {}
        }
    }
    if called == 0 {
        0.0
    } else {
        gc as f64 / called as f64
    }
}

/// Write the primary strand of every path as a contig.
pub fn write_contigs_fasta<P: AsRef<Path>>(paths: &PathContainer<'_>, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let mut writer = create(path, "FASTA")?;

    for (i, (contig, _)) in paths.iter().enumerate() {
        let sequence = contig.sequence();
        writeln!(
            writer,
            ">contig_{} length={} coverage={:.2}x gc={:.2}%",
            i + 1,
            sequence.len(),
            contig.coverage(),
            calculate_gc_content(&sequence) * 100.0
        )?;
        write_wrapped(&mut writer, &sequence)?;
    }

    writer.flush()?;
    info!("📝 Wrote {} contigs to FASTA: {}", paths.len(), path.display());
    Ok(())
}

/// Write the edge structure of every path: one line per path with the edge
/// ids, gaps written in parentheses where edges do not touch.
pub fn write_path_edges<P: AsRef<Path>>(paths: &PathContainer<'_>, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let mut writer = create(path, "path")?;

    for (i, (contig, _)) in paths.iter().enumerate() {
        let mut line = String::new();
        for j in 0..contig.len() {
            if j > 0 {
                let gap = contig.gap_at(j);
                if gap.gap == 0 && gap.trash_previous == 0 && gap.trash_current == 0 {
                    line.push(',');
                } else {
                    line.push_str(&format!(",({}:{}:{}),", gap.gap, gap.trash_previous, gap.trash_current));
                }
            }
            line.push_str(&contig.graph().int_id(contig.at(j)).to_string());
        }
        writeln!(writer, "PATH_{}\t{}\t{}", i + 1, contig.length(), line)?;
    }

    writer.flush()?;
    info!("🧭 Wrote {} path structures to: {}", paths.len(), path.display());
    Ok(())
}

/// One edge of each conjugate pair, the lower id first.
fn canonical_edges(graph: &AssemblyGraph) -> Vec<EdgeId> {
    graph.edges().filter(|&e| graph.conjugate(e) >= e).collect()
}

/// Segment name and orientation of an edge.
fn oriented(graph: &AssemblyGraph, e: EdgeId) -> (usize, char) {
    let twin = graph.conjugate(e);
    if twin >= e {
        (graph.int_id(e), '+')
    } else {
        (graph.int_id(twin), '-')
    }
}

/// Write every graph edge (one per conjugate pair) as a FASTA record.
pub fn write_graph_edges<P: AsRef<Path>>(graph: &AssemblyGraph, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let mut writer = create(path, "FASTA")?;
    let edges = canonical_edges(graph);

    for &e in &edges {
        writeln!(
            writer,
            ">EDGE_{}_length_{}_cov_{:.2}",
            graph.int_id(e),
            graph.length(e),
            graph.coverage(e)
        )?;
        write_wrapped(&mut writer, graph.sequence(e))?;
    }

    writer.flush()?;
    info!("📝 Wrote {} edges to FASTA: {}", edges.len(), path.display());
    Ok(())
}

/// Write the graph to GFA 1.0 (Graphical Fragment Assembly), with grown
/// paths as P lines.
pub fn write_gfa<P: AsRef<Path>>(graph: &AssemblyGraph, paths: &PathContainer<'_>, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let mut writer = create(path, "GFA")?;

    writeln!(writer, "H\tVN:Z:1.0")?;

    let edges = canonical_edges(graph);
    for &e in &edges {
        writeln!(
            writer,
            "S\t{}\t{}\tLN:i:{}\tKC:i:{}\tDP:f:{:.2}",
            graph.int_id(e),
            graph.sequence(e),
            graph.sequence(e).len(),
            (graph.coverage(e) * graph.length(e) as f64).round() as u64,
            graph.coverage(e)
        )?;
    }

    // each junction once, whichever strand it was reached from
    let mut links = BTreeSet::new();
    for v in graph.vertices() {
        for &incoming in graph.incoming_edges(v) {
            for &outgoing in graph.outgoing_edges(v) {
                let from = oriented(graph, incoming);
                let to = oriented(graph, outgoing);
                let flip = |(id, o): (usize, char)| (id, if o == '+' { '-' } else { '+' });
                let reverse = (flip(to), flip(from));
                if graph.is_symmetric() && links.contains(&reverse) {
                    continue;
                }
                links.insert((from, to));
            }
        }
    }
    for ((from, from_orient), (to, to_orient)) in &links {
        writeln!(
            writer,
            "L\t{}\t{}\t{}\t{}\t{}M",
            from,
            from_orient,
            to,
            to_orient,
            graph.k()
        )?;
    }

    for (i, (contig, _)) in paths.iter().enumerate() {
        let segments: Vec<String> = contig
            .edges()
            .map(|e| {
                let (id, orientation) = oriented(graph, e);
                format!("{id}{orientation}")
            })
            .collect();
        if !segments.is_empty() {
            writeln!(writer, "P\tpath_{}\t{}\t*", i + 1, segments.join(","))?;
        }
    }

    writer.flush()?;
    info!(
        "📊 Wrote {} segments, {} links and {} paths to GFA: {}",
        edges.len(),
        links.len(),
        paths.len(),
        path.display()
    );
    Ok(())
}
