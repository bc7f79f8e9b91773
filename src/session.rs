//! The ordered set of coverage files a user has open.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::{CoverageError, Result};
use crate::model::ReportConfiguration;
use crate::reader;
use crate::report;
use crate::tree::CoverageTree;
use crate::writer;

#[derive(Debug, Default)]
pub struct CoverageSession {
    trees: Vec<CoverageTree>,
}

impl CoverageSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trees(&self) -> &[CoverageTree] {
        &self.trees
    }

    pub fn trees_mut(&mut self) -> &mut [CoverageTree] {
        &mut self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Whether a file with this path is already open. Paths compare
    /// case-insensitively.
    pub fn is_open(&self, path: &Path) -> bool {
        let wanted = path.to_string_lossy().to_lowercase();
        self.trees
            .iter()
            .any(|t| t[t.root()].name().to_lowercase() == wanted)
    }

    /// Read a coverage file and append it. Opening a file twice is refused.
    pub fn open(&mut self, path: &Path) -> Result<&CoverageTree> {
        if self.is_open(path) {
            return Err(CoverageError::Precondition(format!(
                "'{}' is already open",
                path.display()
            )));
        }

        let tree = reader::read_coverage_file(path)?;
        self.trees.push(tree);
        Ok(&self.trees[self.trees.len() - 1])
    }

    /// Close the file at `index`, returning its tree.
    pub fn close(&mut self, index: usize) -> Result<CoverageTree> {
        if index >= self.trees.len() {
            return Err(CoverageError::Precondition(format!(
                "no open coverage file at index {}",
                index
            )));
        }
        Ok(self.trees.remove(index))
    }

    /// Paths of the open files, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.trees
            .iter()
            .map(|t| PathBuf::from(t[t.root()].name()))
            .collect()
    }

    /// Remove the first node whose full name matches, in any open file, and
    /// re-roll-up the counters above it. Returns whether a node was removed.
    pub fn remove_node(&mut self, full_name: &str) -> Result<bool> {
        for tree in &mut self.trees {
            let Some(id) = tree.find_by_full_name(full_name) else {
                continue;
            };
            let parent = tree[id].parent().ok_or_else(|| {
                CoverageError::Precondition(
                    "a coverage file is closed, not removed as a node".to_string(),
                )
            })?;
            tree.remove(id)?;
            tree.recount_ancestors(parent)?;
            info!("Removed {}", full_name);
            return Ok(true);
        }
        Ok(false)
    }

    /// Merge all open files into one coverage file.
    pub fn save(&self, path: &Path) -> Result<()> {
        writer::write_coverage_xml(&self.trees, path)
    }

    /// Generate an HTML report of all open files.
    pub fn export_report(&self, config: &ReportConfiguration, data_dir: &Path) -> Result<()> {
        report::write_report(&self.trees, config, data_dir)
    }
}
