//! Flattened row projection of the open coverage trees, as shown by a
//! tree-grid: one row per node in depth-first order, with expansion and
//! visibility state plus threshold colouring and column presets.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::DEFAULT_THRESHOLD;
use crate::error::{CoverageError, Result};
use crate::model::{CoverageLevel, ViewLevel};
use crate::tree::{CoverageNode, CoverageTree, NodeId, NodeKind, TreeId};

/// Identifies a node across all open trees. Keys stay valid when trees
/// are closed or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub tree: TreeId,
    pub node: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub key: RowKey,
    /// Position of the row's tree in the slice last projected.
    pub tree_index: usize,
    pub parent: Option<usize>,
    pub depth: usize,
    pub can_expand: bool,
    pub is_expanded: bool,
    pub is_visible: bool,
}

#[derive(Debug)]
pub struct CoverageGrid {
    rows: Vec<GridRow>,
    index: HashMap<RowKey, usize>,
    threshold: f64,
}

impl CoverageGrid {
    /// Project `trees` with every row collapsed.
    pub fn new(trees: &[CoverageTree]) -> Self {
        let mut grid = Self {
            rows: Vec::new(),
            index: HashMap::new(),
            threshold: DEFAULT_THRESHOLD,
        };
        grid.rebuild(trees, &HashSet::new());
        grid
    }

    /// Rebuild rows after the trees changed, keeping the expansion state of
    /// rows that still exist.
    pub fn refresh(&mut self, trees: &[CoverageTree]) {
        let expanded: HashSet<RowKey> = self
            .rows
            .iter()
            .filter(|r| r.is_expanded)
            .map(|r| r.key)
            .collect();
        self.rebuild(trees, &expanded);
    }

    fn rebuild(&mut self, trees: &[CoverageTree], expanded: &HashSet<RowKey>) {
        self.rows.clear();
        self.index.clear();

        for (t, tree) in trees.iter().enumerate() {
            let mut stack: Vec<(NodeId, Option<usize>, usize)> = vec![(tree.root(), None, 0)];
            while let Some((id, parent, depth)) = stack.pop() {
                let Some(node) = tree.get(id) else {
                    continue;
                };
                let key = RowKey {
                    tree: tree.id(),
                    node: id,
                };
                let can_expand = node.has_children();
                let position = self.rows.len();
                self.rows.push(GridRow {
                    key,
                    tree_index: t,
                    parent,
                    depth,
                    can_expand,
                    is_expanded: can_expand && expanded.contains(&key),
                    is_visible: true,
                });
                self.index.insert(key, position);
                for &child in node.children().iter().rev() {
                    stack.push((child, Some(position), depth + 1));
                }
            }
        }

        self.update_visibility();
    }

    /// Rows come in pre-order, so a parent is always settled before its
    /// children.
    fn update_visibility(&mut self) {
        for i in 0..self.rows.len() {
            let visible = match self.rows[i].parent {
                None => true,
                Some(p) => self.rows[p].is_visible && self.rows[p].is_expanded,
            };
            self.rows[i].is_visible = visible;
        }
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &GridRow> {
        self.rows.iter().filter(|r| r.is_visible)
    }

    pub fn row(&self, key: RowKey) -> Option<&GridRow> {
        self.index.get(&key).map(|&i| &self.rows[i])
    }

    /// Index one past the last row of the subtree starting at `start`.
    fn subtree_end(&self, start: usize) -> usize {
        let depth = self.rows[start].depth;
        self.rows[start + 1..]
            .iter()
            .position(|r| r.depth <= depth)
            .map_or(self.rows.len(), |offset| start + 1 + offset)
    }

    /// Expand or collapse one row. Rows without children never expand.
    /// Returns whether anything changed.
    pub fn set_expanded(&mut self, key: RowKey, expanded: bool) -> bool {
        let Some(&i) = self.index.get(&key) else {
            return false;
        };
        let row = &mut self.rows[i];
        if !row.can_expand || row.is_expanded == expanded {
            return false;
        }
        row.is_expanded = expanded;
        self.update_visibility();
        true
    }

    pub fn toggle(&mut self, key: RowKey) -> bool {
        match self.row(key) {
            Some(row) => {
                let expanded = !row.is_expanded;
                self.set_expanded(key, expanded)
            }
            None => false,
        }
    }

    fn set_range_expanded(&mut self, start: usize, end: usize, expanded: bool) {
        for row in &mut self.rows[start..end] {
            row.is_expanded = expanded && row.can_expand;
        }
        self.update_visibility();
    }

    pub fn expand_all(&mut self) {
        self.set_range_expanded(0, self.rows.len(), true);
    }

    pub fn collapse_all(&mut self) {
        self.set_range_expanded(0, self.rows.len(), false);
    }

    /// Expand `key` and everything below it.
    pub fn expand_subtree(&mut self, key: RowKey) {
        if let Some(&i) = self.index.get(&key) {
            let end = self.subtree_end(i);
            self.set_range_expanded(i, end, true);
        }
    }

    /// Collapse `key` and everything below it.
    pub fn collapse_subtree(&mut self, key: RowKey) {
        if let Some(&i) = self.index.get(&key) {
            let end = self.subtree_end(i);
            self.set_range_expanded(i, end, false);
        }
    }

    /// Expand exactly the rows above `level`, so rows down to that level are
    /// visible and nothing deeper is.
    pub fn expand_to(&mut self, level: ViewLevel) {
        let depth = usize::from(level.depth());
        for row in &mut self.rows {
            row.is_expanded = row.can_expand && row.depth + 1 < depth;
        }
        self.update_visibility();
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CoverageError::Precondition(format!(
                "coverage threshold {} is outside 0.0..=1.0",
                threshold
            )));
        }
        self.threshold = threshold;
        Ok(())
    }

    pub fn line_level(&self, trees: &[CoverageTree], key: RowKey) -> Option<CoverageLevel> {
        node_for(trees, key).map(|n| CoverageLevel::for_lines(n.counts(), self.threshold))
    }

    pub fn block_level(&self, trees: &[CoverageTree], key: RowKey) -> Option<CoverageLevel> {
        node_for(trees, key).map(|n| CoverageLevel::for_blocks(n.counts(), self.threshold))
    }
}

fn node_for(trees: &[CoverageTree], key: RowKey) -> Option<&CoverageNode> {
    trees
        .iter()
        .find(|t| t.id() == key.tree)
        .and_then(|t| t.get(key.node))
}

/// Name shown for a node; coverage files show their file stem.
pub fn display_name(node: &CoverageNode) -> String {
    if node.kind() == NodeKind::CoverageFile {
        if let Some(stem) = Path::new(node.name()).file_stem() {
            return stem.to_string_lossy().into_owned();
        }
    }
    node.name().to_string()
}

/// Grid columns in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Name,
    TotalLines,
    LinesCovered,
    LinesCoveredPercent,
    LinesPartiallyCovered,
    LinesPartiallyCoveredPercent,
    LinesNotCovered,
    LinesNotCoveredPercent,
    TotalBlocks,
    BlocksCovered,
    BlocksCoveredPercent,
    BlocksNotCovered,
    BlocksNotCoveredPercent,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::Name,
        Column::TotalLines,
        Column::LinesCovered,
        Column::LinesCoveredPercent,
        Column::LinesPartiallyCovered,
        Column::LinesPartiallyCoveredPercent,
        Column::LinesNotCovered,
        Column::LinesNotCoveredPercent,
        Column::TotalBlocks,
        Column::BlocksCovered,
        Column::BlocksCoveredPercent,
        Column::BlocksNotCovered,
        Column::BlocksNotCoveredPercent,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::Name => "Name",
            Column::TotalLines => "Total Lines",
            Column::LinesCovered => "Lines Covered",
            Column::LinesCoveredPercent => "Lines Covered %",
            Column::LinesPartiallyCovered => "Lines Partially Covered",
            Column::LinesPartiallyCoveredPercent => "Lines Partially Covered %",
            Column::LinesNotCovered => "Lines Not Covered",
            Column::LinesNotCoveredPercent => "Lines Not Covered %",
            Column::TotalBlocks => "Total Blocks",
            Column::BlocksCovered => "Blocks Covered",
            Column::BlocksCoveredPercent => "Blocks Covered %",
            Column::BlocksNotCovered => "Blocks Not Covered",
            Column::BlocksNotCoveredPercent => "Blocks Not Covered %",
        }
    }

    /// Cell text for `node`. Ratios are shown as percentages.
    pub fn cell(&self, node: &CoverageNode) -> String {
        let c = node.counts();
        let percent = |r: f64| format!("{:.1}%", r * 100.0);
        match self {
            Column::Name => display_name(node),
            Column::TotalLines => c.total_lines().to_string(),
            Column::LinesCovered => c.lines_covered.to_string(),
            Column::LinesCoveredPercent => percent(c.lines_covered_ratio()),
            Column::LinesPartiallyCovered => c.lines_partially_covered.to_string(),
            Column::LinesPartiallyCoveredPercent => percent(c.lines_partially_covered_ratio()),
            Column::LinesNotCovered => c.lines_not_covered.to_string(),
            Column::LinesNotCoveredPercent => percent(c.lines_not_covered_ratio()),
            Column::TotalBlocks => c.total_blocks().to_string(),
            Column::BlocksCovered => c.blocks_covered.to_string(),
            Column::BlocksCoveredPercent => percent(c.blocks_covered_ratio()),
            Column::BlocksNotCovered => c.blocks_not_covered.to_string(),
            Column::BlocksNotCoveredPercent => percent(c.blocks_not_covered_ratio()),
        }
    }
}

/// Named column visibility sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColumnPreset {
    #[default]
    All,
    AllTotals,
    AllRatios,
    Lines,
    LineTotals,
    LineRatios,
    Blocks,
    BlockTotals,
    BlockRatios,
    /// Whatever the user picked by hand; has no fixed column list.
    #[value(skip)]
    Custom,
}

impl ColumnPreset {
    pub fn description(&self) -> &'static str {
        match self {
            ColumnPreset::All => "All",
            ColumnPreset::AllTotals => "All (Totals)",
            ColumnPreset::AllRatios => "All (%)",
            ColumnPreset::Lines => "Lines",
            ColumnPreset::LineTotals => "Lines (Totals)",
            ColumnPreset::LineRatios => "Lines (%)",
            ColumnPreset::Blocks => "Blocks",
            ColumnPreset::BlockTotals => "Blocks (Totals)",
            ColumnPreset::BlockRatios => "Block (%)",
            ColumnPreset::Custom => "Custom",
        }
    }

    /// Visible columns, or `None` for [`ColumnPreset::Custom`].
    pub fn columns(&self) -> Option<&'static [Column]> {
        use Column::*;
        let columns: &'static [Column] = match self {
            ColumnPreset::All => &Column::ALL,
            ColumnPreset::AllTotals => &[
                Name,
                TotalLines,
                LinesCovered,
                LinesPartiallyCovered,
                LinesNotCovered,
                TotalBlocks,
                BlocksCovered,
                BlocksNotCovered,
            ],
            ColumnPreset::AllRatios => &[
                Name,
                TotalLines,
                LinesCoveredPercent,
                LinesPartiallyCoveredPercent,
                LinesNotCoveredPercent,
                TotalBlocks,
                BlocksCoveredPercent,
                BlocksNotCoveredPercent,
            ],
            ColumnPreset::Lines => &[
                Name,
                TotalLines,
                LinesCovered,
                LinesPartiallyCovered,
                LinesNotCovered,
                LinesCoveredPercent,
                LinesPartiallyCoveredPercent,
                LinesNotCoveredPercent,
            ],
            ColumnPreset::LineTotals => &[
                Name,
                TotalLines,
                LinesCovered,
                LinesPartiallyCovered,
                LinesNotCovered,
            ],
            ColumnPreset::LineRatios => &[
                Name,
                TotalLines,
                LinesCoveredPercent,
                LinesPartiallyCoveredPercent,
                LinesNotCoveredPercent,
            ],
            ColumnPreset::Blocks => &[
                Name,
                TotalBlocks,
                BlocksCovered,
                BlocksNotCovered,
                BlocksCoveredPercent,
                BlocksNotCoveredPercent,
            ],
            ColumnPreset::BlockTotals => &[Name, TotalBlocks, BlocksCovered, BlocksNotCovered],
            ColumnPreset::BlockRatios => &[
                Name,
                TotalBlocks,
                BlocksCoveredPercent,
                BlocksNotCoveredPercent,
            ],
            ColumnPreset::Custom => return None,
        };
        Some(columns)
    }

    /// The preset whose column list is exactly `columns`, or `Custom`.
    pub fn matching(columns: &[Column]) -> ColumnPreset {
        const PRESETS: [ColumnPreset; 9] = [
            ColumnPreset::All,
            ColumnPreset::AllTotals,
            ColumnPreset::AllRatios,
            ColumnPreset::Lines,
            ColumnPreset::LineTotals,
            ColumnPreset::LineRatios,
            ColumnPreset::Blocks,
            ColumnPreset::BlockTotals,
            ColumnPreset::BlockRatios,
        ];
        PRESETS
            .into_iter()
            .find(|p| p.columns() == Some(columns))
            .unwrap_or(ColumnPreset::Custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoverageCounts;

    /// file -> M -> N -> T -> F
    fn tree() -> (CoverageTree, Vec<NodeId>) {
        let mut tree = CoverageTree::new(CoverageNode::new(NodeKind::CoverageFile, "/tmp/run.coveragexml"));
        let root = tree.root();
        let m = tree.add_child(root, CoverageNode::new(NodeKind::Module, "M")).unwrap();
        let n = tree.add_child(m, CoverageNode::new(NodeKind::Namespace, "N")).unwrap();
        let t = tree.add_child(n, CoverageNode::new(NodeKind::Type, "T")).unwrap();
        let f = tree
            .add_child(
                t,
                CoverageNode::new(NodeKind::Function, "F").with_counts(CoverageCounts {
                    lines_covered: 80,
                    lines_partially_covered: 10,
                    lines_not_covered: 10,
                    blocks_covered: 1,
                    blocks_not_covered: 1,
                }),
            )
            .unwrap();
        tree.recount_all().unwrap();
        (tree, vec![root, m, n, t, f])
    }

    fn keys(tree: &CoverageTree, ids: &[NodeId]) -> Vec<RowKey> {
        ids.iter()
            .map(|&node| RowKey {
                tree: tree.id(),
                node,
            })
            .collect()
    }

    fn visible_depths(grid: &CoverageGrid) -> Vec<usize> {
        grid.visible_rows().map(|r| r.depth).collect()
    }

    #[test]
    fn test_initially_collapsed() {
        let (tree, ids) = tree();
        let k = keys(&tree, &ids);
        let grid = CoverageGrid::new(&[tree]);
        assert_eq!(grid.rows().len(), 5);
        assert_eq!(visible_depths(&grid), vec![0]);
        assert!(grid.row(k[0]).unwrap().can_expand);
        assert!(!grid.row(k[4]).unwrap().can_expand);
    }

    #[test]
    fn test_toggle_reveals_children_only() {
        let (tree, ids) = tree();
        let k = keys(&tree, &ids);
        let mut grid = CoverageGrid::new(&[tree]);
        assert!(grid.toggle(k[0]));
        assert_eq!(visible_depths(&grid), vec![0, 1]);
        assert!(grid.toggle(k[0]));
        assert_eq!(visible_depths(&grid), vec![0]);
    }

    #[test]
    fn test_leaf_never_expands() {
        let (tree, ids) = tree();
        let k = keys(&tree, &ids);
        let mut grid = CoverageGrid::new(&[tree]);
        assert!(!grid.set_expanded(k[4], true));
        assert!(!grid.row(k[4]).unwrap().is_expanded);
    }

    #[test]
    fn test_collapsed_ancestor_hides_expanded_descendants() {
        let (tree, ids) = tree();
        let k = keys(&tree, &ids);
        let mut grid = CoverageGrid::new(&[tree]);
        grid.expand_all();
        assert_eq!(visible_depths(&grid), vec![0, 1, 2, 3, 4]);
        grid.set_expanded(k[1], false);
        assert_eq!(visible_depths(&grid), vec![0, 1]);
        // Namespace keeps its own state.
        assert!(grid.row(k[2]).unwrap().is_expanded);
    }

    #[test]
    fn test_subtree_operations() {
        let (tree, ids) = tree();
        let k = keys(&tree, &ids);
        let mut grid = CoverageGrid::new(&[tree]);
        grid.expand_subtree(k[2]);
        assert!(grid.row(k[3]).unwrap().is_expanded);
        assert!(!grid.row(k[1]).unwrap().is_expanded);
        assert_eq!(visible_depths(&grid), vec![0]);

        grid.expand_all();
        grid.collapse_subtree(k[2]);
        assert_eq!(visible_depths(&grid), vec![0, 1, 2]);
    }

    #[test]
    fn test_expand_to_level() {
        let (tree, _) = tree();
        let mut grid = CoverageGrid::new(&[tree]);
        grid.expand_to(ViewLevel::Totals);
        assert_eq!(visible_depths(&grid), vec![0]);
        grid.expand_to(ViewLevel::Namespaces);
        assert_eq!(visible_depths(&grid), vec![0, 1, 2]);
        grid.expand_to(ViewLevel::Members);
        assert_eq!(visible_depths(&grid), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_refresh_preserves_expansion() {
        let (mut tree, ids) = tree();
        let k = keys(&tree, &ids);
        let mut grid = CoverageGrid::new(std::slice::from_ref(&tree));
        grid.expand_to(ViewLevel::Classes);

        tree.add_child(ids[2], CoverageNode::new(NodeKind::Type, "U")).unwrap();
        let trees = [tree];
        grid.refresh(&trees);

        assert_eq!(grid.rows().len(), 6);
        assert!(grid.row(k[2]).unwrap().is_expanded);
        assert_eq!(grid.visible_rows().count(), 5);
    }

    #[test]
    fn test_threshold_recolor() {
        let (tree, ids) = tree();
        let k = keys(&tree, &ids);
        let trees = [tree];
        let mut grid = CoverageGrid::new(&trees);

        grid.set_threshold(0.75).unwrap();
        assert_eq!(grid.line_level(&trees, k[4]), Some(CoverageLevel::Covered));
        grid.set_threshold(0.85).unwrap();
        assert_eq!(grid.line_level(&trees, k[4]), Some(CoverageLevel::NotCovered));
        assert_eq!(grid.block_level(&trees, k[4]), Some(CoverageLevel::NotCovered));

        assert!(grid.set_threshold(1.01).is_err());
        assert!(grid.set_threshold(f64::NAN).is_err());
        assert_eq!(grid.threshold(), 0.85);
    }

    #[test]
    fn test_display_name_uses_file_stem() {
        let (tree, ids) = tree();
        assert_eq!(display_name(&tree[ids[0]]), "run");
        assert_eq!(display_name(&tree[ids[1]]), "M");
        assert_eq!(Column::LinesCoveredPercent.cell(&tree[ids[4]]), "80.0%");
    }

    #[test]
    fn test_presets() {
        assert_eq!(ColumnPreset::All.columns().unwrap().len(), 13);
        assert_eq!(ColumnPreset::Custom.columns(), None);
        assert_eq!(
            ColumnPreset::matching(&[
                Column::Name,
                Column::TotalBlocks,
                Column::BlocksCovered,
                Column::BlocksNotCovered
            ]),
            ColumnPreset::BlockTotals
        );
        assert_eq!(ColumnPreset::matching(&[Column::Name]), ColumnPreset::Custom);
    }
}
