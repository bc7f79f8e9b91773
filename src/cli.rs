//! Command handler functions for the vscov CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::metadata::{self, JsonMetadataProvider};
use crate::model::{CoverageCounts, CoverageLevel, ReportConfiguration, ViewLevel};
use crate::session::CoverageSession;
use crate::view::{display_name, Column, ColumnPreset, CoverageGrid};

/// Open every file in order, failing on the first one that cannot be read.
pub fn open_session(files: &[PathBuf]) -> Result<CoverageSession> {
    let mut session = CoverageSession::new();
    for file in files {
        session
            .open(file)
            .with_context(|| format!("Failed to open {}", file.display()))?;
    }
    Ok(session)
}

#[derive(Serialize)]
struct FileSummary {
    path: String,
    #[serde(flatten)]
    counts: CoverageCounts,
    line_rate: f64,
    block_rate: f64,
}

impl FileSummary {
    fn new(path: String, counts: CoverageCounts) -> Self {
        Self {
            path,
            counts,
            line_rate: counts.lines_covered_ratio(),
            block_rate: counts.blocks_covered_ratio(),
        }
    }
}

#[derive(Serialize)]
struct SessionSummary {
    files: Vec<FileSummary>,
    total: FileSummary,
}

pub fn cmd_summary(session: &CoverageSession, json: bool) -> Result<String> {
    let files: Vec<FileSummary> = session
        .trees()
        .iter()
        .map(|t| {
            let root = &t[t.root()];
            FileSummary::new(root.name().to_string(), *root.counts())
        })
        .collect();
    let total = FileSummary::new("Total".to_string(), files.iter().map(|f| f.counts).sum());

    if json {
        let summary = SessionSummary { files, total };
        return Ok(serde_json::to_string_pretty(&summary)? + "\n");
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<50} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "FILE", "LINES", "COVERED", "RATE", "BLOCKS", "COVERED", "RATE"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(104)).unwrap();

    for f in files.iter().chain(std::iter::once(&total)) {
        writeln!(
            out,
            "{:<50} {:>8} {:>8} {:>7.1}% {:>8} {:>8} {:>7.1}%",
            f.path,
            f.counts.total_lines(),
            f.counts.lines_covered,
            f.line_rate * 100.0,
            f.counts.total_blocks(),
            f.counts.blocks_covered,
            f.block_rate * 100.0
        )
        .unwrap();
    }
    Ok(out)
}

/// Options for [`cmd_tree`].
pub struct TreeOptions<'a> {
    pub level: ViewLevel,
    pub columns: ColumnPreset,
    pub threshold: f64,
    pub metadata: Option<&'a Path>,
}

/// Print the grid expanded to `level`, one row per visible node, marking
/// line coverage against the threshold.
pub fn cmd_tree(session: &mut CoverageSession, options: &TreeOptions) -> Result<String> {
    if let Some(path) = options.metadata {
        let provider = JsonMetadataProvider::from_path(path)
            .with_context(|| format!("Failed to read metadata from {}", path.display()))?;
        for tree in session.trees_mut() {
            let root = tree.root();
            metadata::load_metadata_for(tree, root, &provider)?;
        }
    }

    let trees = session.trees();
    let mut grid = CoverageGrid::new(trees);
    grid.set_threshold(options.threshold)?;
    grid.expand_to(options.level);

    let columns = options.columns.columns().unwrap_or(&Column::ALL[..]);
    let mut out = String::new();

    let mut header = String::new();
    for column in columns {
        match column {
            Column::Name => write!(header, "{:<50}", column.header()).unwrap(),
            _ => write!(header, "  {}", column.header()).unwrap(),
        }
    }
    writeln!(out, "{}", header.trim_end()).unwrap();
    writeln!(out, "{}", "-".repeat(header.trim_end().chars().count())).unwrap();

    for row in grid.visible_rows() {
        let node = &trees[row.tree_index][row.key.node];
        let marker = grid
            .line_level(trees, row.key)
            .unwrap_or(CoverageLevel::NotCovered)
            .marker();

        let mut line = String::new();
        for column in columns {
            match column {
                Column::Name => {
                    let name = format!("{}{} {}", "  ".repeat(row.depth), marker, display_name(node));
                    write!(line, "{:<50}", name).unwrap();
                }
                _ => write!(
                    line,
                    "  {:>width$}",
                    column.cell(node),
                    width = column.header().len()
                )
                .unwrap(),
            }
        }
        writeln!(out, "{}", line.trim_end()).unwrap();
    }
    Ok(out)
}

/// Remove the named nodes, then merge every open file into `output`.
pub fn cmd_merge(session: &mut CoverageSession, output: &Path, remove: &[String]) -> Result<String> {
    let mut out = String::new();
    for full_name in remove {
        if !session.remove_node(full_name)? {
            anyhow::bail!("No node named '{}'", full_name);
        }
        writeln!(out, "Removed {}", full_name).unwrap();
    }

    session
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    writeln!(
        out,
        "Merged {} coverage file(s) into {}",
        session.len(),
        output.display()
    )
    .unwrap();
    Ok(out)
}

pub fn cmd_report(
    session: &CoverageSession,
    config: &ReportConfiguration,
    data_dir: &Path,
) -> Result<String> {
    session
        .export_report(config, data_dir)
        .context("Failed to generate report")?;
    Ok(format!(
        "Wrote {} report for '{}' to {}\n",
        config.report_format.description(),
        config.project_name,
        config.destination_path.display()
    ))
}
