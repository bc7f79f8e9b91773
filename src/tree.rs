//! The live, editable coverage node tree.
//!
//! Nodes live in an arena owned by [`CoverageTree`] and are addressed by
//! [`NodeId`]. Children are owned through the parent's child list; the parent
//! link is a plain index, so there is nothing to keep alive or break.
//!
//! Observers receive [`TreeEvent`]s over `std::sync::mpsc` channels. Each
//! structural edit (add, insert, remove, replace) produces exactly one
//! `ChildrenChanged` event; property setters produce one `PropertyChanged`
//! event for the property itself followed by one per derived property listed
//! in [`Property::dependents`].

use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::error::{CoverageError, Result};
use crate::model::CoverageCounts;
use crate::schema::{LineRecord, SourceFileRecord};

/// Display name for a namespace record with no name.
pub const GLOBAL_NAMESPACE_NAME: &str = "<Global Namespace>";

/// Display name for a class record with no name (free functions).
pub const GLOBAL_FUNCTIONS_NAME: &str = "<Global Functions>";

/// Arena slot plus the slot's generation. Slots of removed nodes are
/// reused, and the bumped generation keeps old ids from resolving to the
/// new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<CoverageNode>,
}

/// Identifies one tree for the life of the process, wherever it is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(u64);

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(0);

/// Structural level of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    CoverageFile,
    Module,
    Namespace,
    Type,
    Function,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::CoverageFile => "file",
            NodeKind::Module => "module",
            NodeKind::Namespace => "namespace",
            NodeKind::Type => "type",
            NodeKind::Function => "function",
        }
    }

    /// The code element kind a node starts with before any metadata is read.
    pub fn default_code_element(&self) -> CodeElementKind {
        match self {
            NodeKind::CoverageFile => CodeElementKind::CoverageFile,
            NodeKind::Module => CodeElementKind::Module,
            NodeKind::Namespace => CodeElementKind::Namespace,
            NodeKind::Type => CodeElementKind::Class,
            NodeKind::Function => CodeElementKind::Function,
        }
    }
}

/// Display-only classification, refined by metadata enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeElementKind {
    CoverageFile,
    Module,
    Namespace,
    Class,
    Struct,
    Property,
    Function,
}

/// Format-specific fields that are carried through a read/write round trip
/// without being shown.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeDetails {
    File {
        source_files: Vec<SourceFileRecord>,
    },
    Module {
        image_size: u32,
        image_link_time: u32,
    },
    Namespace {
        module_name: Option<String>,
        namespace_key_name: Option<String>,
        /// `NamespaceName` as it appeared on disk.
        recorded_name: Option<String>,
    },
    Type {
        class_key_name: Option<String>,
        namespace_key_name: Option<String>,
        /// `ClassName` as it appeared on disk.
        recorded_name: Option<String>,
    },
    Function {
        method_key_name: Option<String>,
        method_full_name: Option<String>,
        lines: Vec<LineRecord>,
    },
}

impl NodeDetails {
    /// The node kind these details belong to.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeDetails::File { .. } => NodeKind::CoverageFile,
            NodeDetails::Module { .. } => NodeKind::Module,
            NodeDetails::Namespace { .. } => NodeKind::Namespace,
            NodeDetails::Type { .. } => NodeKind::Type,
            NodeDetails::Function { .. } => NodeKind::Function,
        }
    }
}

/// Observable node properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Name,
    FullName,
    CodeElementKind,
    HasReadMetadata,
    LinesCovered,
    LinesPartiallyCovered,
    LinesNotCovered,
    BlocksCovered,
    BlocksNotCovered,
    TotalLines,
    TotalBlocks,
    LinesCoveredRatio,
    LinesPartiallyCoveredRatio,
    LinesNotCoveredRatio,
    BlocksCoveredRatio,
    BlocksNotCoveredRatio,
}

impl Property {
    /// Derived properties whose value changes when `self` changes.
    pub fn dependents(self) -> &'static [Property] {
        const LINE_DERIVED: &[Property] = &[
            Property::TotalLines,
            Property::LinesCoveredRatio,
            Property::LinesPartiallyCoveredRatio,
            Property::LinesNotCoveredRatio,
        ];
        const BLOCK_DERIVED: &[Property] = &[
            Property::TotalBlocks,
            Property::BlocksCoveredRatio,
            Property::BlocksNotCoveredRatio,
        ];

        match self {
            Property::Name => &[Property::FullName],
            Property::LinesCovered
            | Property::LinesPartiallyCovered
            | Property::LinesNotCovered => LINE_DERIVED,
            Property::BlocksCovered | Property::BlocksNotCovered => BLOCK_DERIVED,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    PropertyChanged { node: NodeId, property: Property },
    ChildrenChanged { parent: NodeId },
}

#[derive(Debug, Clone)]
pub struct CoverageNode {
    kind: NodeKind,
    pub(crate) code_element: CodeElementKind,
    pub(crate) name: String,
    pub(crate) counts: CoverageCounts,
    pub(crate) details: Option<NodeDetails>,
    pub(crate) has_read_metadata: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl CoverageNode {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            code_element: kind.default_code_element(),
            name: name.into(),
            counts: CoverageCounts::default(),
            details: None,
            has_read_metadata: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_counts(mut self, counts: CoverageCounts) -> Self {
        self.counts = counts;
        self
    }

    pub fn with_details(mut self, details: NodeDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn code_element(&self) -> CodeElementKind {
        self.code_element
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn counts(&self) -> &CoverageCounts {
        &self.counts
    }

    pub fn details(&self) -> Option<&NodeDetails> {
        self.details.as_ref()
    }

    pub fn has_read_metadata(&self) -> bool {
        self.has_read_metadata
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

fn no_such_node(id: NodeId) -> CoverageError {
    CoverageError::Precondition(format!("no node with id {}", id.index))
}

/// One coverage file's node hierarchy.
#[derive(Debug)]
pub struct CoverageTree {
    id: TreeId,
    nodes: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    observers: Vec<Sender<TreeEvent>>,
}

impl CoverageTree {
    /// Create a tree whose root is `root`. Any links already on the node are
    /// discarded.
    pub fn new(mut root: CoverageNode) -> Self {
        root.parent = None;
        root.children.clear();
        Self {
            id: TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)),
            nodes: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            observers: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: NodeId) -> Option<&CoverageNode> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut CoverageNode> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| no_such_node(id))
    }

    fn node(&self, id: NodeId) -> Result<&CoverageNode> {
        self.get(id).ok_or_else(|| no_such_node(id))
    }

    /// Store `node` in a free slot, or a new one when none is free.
    fn alloc(&mut self, node: CoverageNode) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.nodes.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.nodes.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// Take the node out of its slot and make the slot reusable.
    fn release(&mut self, id: NodeId) -> Option<CoverageNode> {
        let slot = self
            .nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }

    /// Register an observer. Dropped receivers are pruned on the next event.
    pub fn subscribe(&mut self) -> Receiver<TreeEvent> {
        let (tx, rx) = channel();
        self.observers.push(tx);
        rx
    }

    fn emit(&mut self, event: TreeEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn emit_property(&mut self, node: NodeId, property: Property) {
        if self.observers.is_empty() {
            return;
        }
        self.emit(TreeEvent::PropertyChanged { node, property });
        for &dependent in property.dependents() {
            self.emit(TreeEvent::PropertyChanged {
                node,
                property: dependent,
            });
        }
    }

    // ---- structural edits ----

    /// Append a detached node to `parent`'s children.
    pub fn add_child(&mut self, parent: NodeId, node: CoverageNode) -> Result<NodeId> {
        let position = self.node(parent)?.children.len();
        self.insert_child(parent, position, node)
    }

    /// Insert a detached node at `position` in `parent`'s children.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        position: usize,
        mut node: CoverageNode,
    ) -> Result<NodeId> {
        let len = self.node(parent)?.children.len();
        if position > len {
            return Err(CoverageError::Precondition(format!(
                "insert position {} out of range (len {})",
                position, len
            )));
        }

        node.parent = Some(parent);
        node.children.clear();
        let id = self.alloc(node);
        self.get_mut(parent)?.children.insert(position, id);
        self.emit(TreeEvent::ChildrenChanged { parent });
        Ok(id)
    }

    /// Detach `id` (and its subtree) from its parent, returning the removed
    /// node with its parent link cleared. Counters of the former parent are
    /// left alone; call [`CoverageTree::recount_ancestors`] afterwards.
    pub fn remove(&mut self, id: NodeId) -> Result<CoverageNode> {
        let parent = self.node(id)?.parent.ok_or_else(|| {
            CoverageError::Precondition("the root node of a tree cannot be removed".to_string())
        })?;

        self.get_mut(parent)?.children.retain(|&c| c != id);
        for d in self.descendants(id) {
            self.release(d);
        }
        let mut removed = self.release(id).ok_or_else(|| no_such_node(id))?;
        removed.parent = None;
        removed.children.clear();

        self.emit(TreeEvent::ChildrenChanged { parent });
        Ok(removed)
    }

    /// Swap the child `old` for a detached `node`, keeping its position.
    pub fn replace_child(&mut self, old: NodeId, mut node: CoverageNode) -> Result<(NodeId, CoverageNode)> {
        let parent = self.node(old)?.parent.ok_or_else(|| {
            CoverageError::Precondition("the root node of a tree cannot be replaced".to_string())
        })?;

        for d in self.descendants(old) {
            self.release(d);
        }
        let mut previous = self.release(old).ok_or_else(|| no_such_node(old))?;
        previous.parent = None;
        previous.children.clear();

        node.parent = Some(parent);
        node.children.clear();
        let id = self.alloc(node);
        for child in self.get_mut(parent)?.children.iter_mut() {
            if *child == old {
                *child = id;
            }
        }

        self.emit(TreeEvent::ChildrenChanged { parent });
        Ok((id, previous))
    }

    // ---- property setters ----

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let node = self.get_mut(id)?;
        if node.name == name {
            return Ok(());
        }
        node.name = name;
        let kind = node.kind;
        self.emit_property(id, Property::Name);

        // A file's name is not part of the full names below it.
        if kind != NodeKind::CoverageFile {
            for d in self.descendants(id) {
                self.emit(TreeEvent::PropertyChanged {
                    node: d,
                    property: Property::FullName,
                });
            }
        }
        Ok(())
    }

    pub fn set_code_element(&mut self, id: NodeId, kind: CodeElementKind) -> Result<()> {
        let node = self.get_mut(id)?;
        if node.code_element == kind {
            return Ok(());
        }
        node.code_element = kind;
        self.emit_property(id, Property::CodeElementKind);
        Ok(())
    }

    pub fn set_has_read_metadata(&mut self, id: NodeId, value: bool) -> Result<()> {
        let node = self.get_mut(id)?;
        if node.has_read_metadata == value {
            return Ok(());
        }
        node.has_read_metadata = value;
        self.emit_property(id, Property::HasReadMetadata);
        Ok(())
    }

    /// Replace all six raw counters, notifying only the ones that changed.
    pub fn set_counts(&mut self, id: NodeId, counts: CoverageCounts) -> Result<()> {
        let node = self.get_mut(id)?;
        let old = std::mem::replace(&mut node.counts, counts);

        let changed = [
            (old.lines_covered != counts.lines_covered, Property::LinesCovered),
            (
                old.lines_partially_covered != counts.lines_partially_covered,
                Property::LinesPartiallyCovered,
            ),
            (old.lines_not_covered != counts.lines_not_covered, Property::LinesNotCovered),
            (old.blocks_covered != counts.blocks_covered, Property::BlocksCovered),
            (old.blocks_not_covered != counts.blocks_not_covered, Property::BlocksNotCovered),
        ];
        for (did_change, property) in changed {
            if did_change {
                self.emit_property(id, property);
            }
        }
        Ok(())
    }

    pub fn set_details(&mut self, id: NodeId, details: NodeDetails) -> Result<()> {
        self.get_mut(id)?.details = Some(details);
        Ok(())
    }

    // ---- roll-up ----

    /// Set `id`'s counters to the sum of its immediate children's counters.
    /// Leaves are untouched.
    pub fn recount_coverage(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        if node.children.is_empty() {
            return Ok(());
        }
        let total: CoverageCounts = node
            .children
            .iter()
            .filter_map(|&c| self.get(c))
            .map(|c| c.counts)
            .sum();
        self.set_counts(id, total)
    }

    /// Recount every node in the tree, leaves first.
    pub fn recount_all(&mut self) -> Result<()> {
        let mut order = self.preorder(self.root);
        order.reverse();
        for id in order {
            self.recount_coverage(id)?;
        }
        Ok(())
    }

    /// Recount `id` and then each of its ancestors up to the root.
    pub fn recount_ancestors(&mut self, id: NodeId) -> Result<()> {
        let mut current = Some(id);
        while let Some(node) = current {
            self.recount_coverage(node)?;
            current = self.node(node)?.parent;
        }
        Ok(())
    }

    // ---- queries ----

    /// First node of `kind` on the path from `id` (inclusive) to the root.
    pub fn closest_ancestor(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.get(node_id)?;
            if node.kind == kind {
                return Some(node_id);
            }
            current = node.parent;
        }
        None
    }

    /// `[Module]Namespace.Type.Function`; a module's own full name is its
    /// name and a file contributes nothing to its descendants.
    pub fn full_name(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return String::new();
        };
        match node.parent.and_then(|p| self.get(p).map(|n| (p, n))) {
            None => node.name.clone(),
            Some((_, parent)) if parent.kind == NodeKind::CoverageFile => node.name.clone(),
            Some((_, parent)) if parent.kind == NodeKind::Module => {
                format!("[{}]{}", parent.name, node.name)
            }
            Some((parent_id, _)) => format!("{}.{}", self.full_name(parent_id), node.name),
        }
    }

    pub fn find_by_full_name(&self, full_name: &str) -> Option<NodeId> {
        self.preorder(self.root)
            .into_iter()
            .find(|&id| self.full_name(id) == full_name)
    }

    /// `id` followed by its descendants, depth first.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                out.push(current);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut all = self.preorder(id);
        all.retain(|&d| d != id);
        all
    }

    /// Number of edges between `id` and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(p) = current {
            depth += 1;
            current = self.get(p).and_then(|n| n.parent);
        }
        depth
    }
}

impl Index<NodeId> for CoverageTree {
    type Output = CoverageNode;

    fn index(&self, id: NodeId) -> &CoverageNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {} is not part of this tree", id.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(lc: u32, lp: u32, ln: u32, bc: u32, bn: u32) -> CoverageCounts {
        CoverageCounts {
            lines_covered: lc,
            lines_partially_covered: lp,
            lines_not_covered: ln,
            blocks_covered: bc,
            blocks_not_covered: bn,
        }
    }

    /// file -> M -> N -> T -> {F, G}
    fn sample() -> (CoverageTree, Vec<NodeId>) {
        let mut tree = CoverageTree::new(CoverageNode::new(NodeKind::CoverageFile, "a.coveragexml"));
        let root = tree.root();
        let m = tree.add_child(root, CoverageNode::new(NodeKind::Module, "M")).unwrap();
        let n = tree.add_child(m, CoverageNode::new(NodeKind::Namespace, "N")).unwrap();
        let t = tree.add_child(n, CoverageNode::new(NodeKind::Type, "T")).unwrap();
        let f = tree
            .add_child(
                t,
                CoverageNode::new(NodeKind::Function, "F").with_counts(counts(1, 2, 3, 4, 5)),
            )
            .unwrap();
        let g = tree
            .add_child(
                t,
                CoverageNode::new(NodeKind::Function, "G").with_counts(counts(10, 0, 1, 2, 0)),
            )
            .unwrap();
        (tree, vec![root, m, n, t, f, g])
    }

    #[test]
    fn test_parent_links() {
        let (tree, ids) = sample();
        assert_eq!(tree[ids[0]].parent(), None);
        assert_eq!(tree[ids[4]].parent(), Some(ids[3]));
        assert_eq!(tree[ids[3]].children(), &[ids[4], ids[5]]);
    }

    #[test]
    fn test_recount_is_one_level() {
        let (mut tree, ids) = sample();
        tree.recount_coverage(ids[3]).unwrap();
        assert_eq!(*tree[ids[3]].counts(), counts(11, 2, 4, 6, 5));
        // Namespace not touched yet.
        assert_eq!(*tree[ids[2]].counts(), CoverageCounts::default());
    }

    #[test]
    fn test_recount_leaf_is_noop() {
        let (mut tree, ids) = sample();
        tree.recount_coverage(ids[4]).unwrap();
        assert_eq!(*tree[ids[4]].counts(), counts(1, 2, 3, 4, 5));
    }

    #[test]
    fn test_recount_all_satisfies_rollup() {
        let (mut tree, ids) = sample();
        tree.recount_all().unwrap();
        for &id in &ids[..4] {
            let expected: CoverageCounts = tree[id]
                .children()
                .iter()
                .map(|&c| *tree[c].counts())
                .sum();
            assert_eq!(*tree[id].counts(), expected);
        }
        assert_eq!(*tree[ids[0]].counts(), counts(11, 2, 4, 6, 5));
    }

    #[test]
    fn test_full_name() {
        let (tree, ids) = sample();
        assert_eq!(tree.full_name(ids[0]), "a.coveragexml");
        assert_eq!(tree.full_name(ids[1]), "M");
        assert_eq!(tree.full_name(ids[2]), "[M]N");
        assert_eq!(tree.full_name(ids[4]), "[M]N.T.F");
        assert_eq!(tree.find_by_full_name("[M]N.T.G"), Some(ids[5]));
    }

    #[test]
    fn test_full_name_flat() {
        let mut tree = CoverageTree::new(CoverageNode::new(NodeKind::CoverageFile, "x"));
        let m = tree
            .add_child(tree.root(), CoverageNode::new(NodeKind::Module, "M"))
            .unwrap();
        let f = tree
            .add_child(m, CoverageNode::new(NodeKind::Function, "F"))
            .unwrap();
        assert_eq!(tree.full_name(f), "[M]F");
    }

    #[test]
    fn test_closest_ancestor() {
        let (tree, ids) = sample();
        assert_eq!(tree.closest_ancestor(ids[4], NodeKind::Type), Some(ids[3]));
        assert_eq!(tree.closest_ancestor(ids[3], NodeKind::Type), Some(ids[3]));
        assert_eq!(tree.closest_ancestor(ids[4], NodeKind::Module), Some(ids[1]));
        assert_eq!(tree.closest_ancestor(ids[2], NodeKind::Function), None);
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let (mut tree, ids) = sample();
        let before = tree.len();
        let removed = tree.remove(ids[3]).unwrap();
        assert_eq!(removed.name(), "T");
        assert_eq!(removed.parent(), None);
        assert!(tree[ids[2]].children().is_empty());
        assert!(tree.get(ids[4]).is_none());
        assert_eq!(tree.len(), before - 3);
    }

    #[test]
    fn test_remove_root_is_rejected() {
        let (mut tree, ids) = sample();
        assert!(matches!(
            tree.remove(ids[0]),
            Err(CoverageError::Precondition(_))
        ));
    }

    #[test]
    fn test_replace_child_keeps_position() {
        let (mut tree, ids) = sample();
        let (new_id, old) = tree
            .replace_child(ids[4], CoverageNode::new(NodeKind::Function, "H"))
            .unwrap();
        assert_eq!(old.name(), "F");
        assert_eq!(tree[ids[3]].children(), &[new_id, ids[5]]);
        assert_eq!(tree[new_id].parent(), Some(ids[3]));
        assert!(tree.get(ids[4]).is_none());
    }

    #[test]
    fn test_single_event_per_structural_edit() {
        let (mut tree, ids) = sample();
        let rx = tree.subscribe();

        tree.add_child(ids[3], CoverageNode::new(NodeKind::Function, "X")).unwrap();
        tree.remove(ids[4]).unwrap();
        tree.replace_child(ids[5], CoverageNode::new(NodeKind::Function, "Y")).unwrap();

        let events: Vec<TreeEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TreeEvent::ChildrenChanged { parent: ids[3] },
                TreeEvent::ChildrenChanged { parent: ids[3] },
                TreeEvent::ChildrenChanged { parent: ids[3] },
            ]
        );
    }

    #[test]
    fn test_property_events_fan_out() {
        let (mut tree, ids) = sample();
        let rx = tree.subscribe();

        tree.set_name(ids[4], "Renamed").unwrap();
        let mut c = *tree[ids[4]].counts();
        c.blocks_covered += 1;
        tree.set_counts(ids[4], c).unwrap();

        let props: Vec<Property> = rx
            .try_iter()
            .map(|e| match e {
                TreeEvent::PropertyChanged { property, .. } => property,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(
            props,
            vec![
                Property::Name,
                Property::FullName,
                Property::BlocksCovered,
                Property::TotalBlocks,
                Property::BlocksCoveredRatio,
                Property::BlocksNotCoveredRatio,
            ]
        );
    }

    #[test]
    fn test_unchanged_setter_is_silent() {
        let (mut tree, ids) = sample();
        let rx = tree.subscribe();
        tree.set_name(ids[4], "F").unwrap();
        tree.set_counts(ids[4], counts(1, 2, 3, 4, 5)).unwrap();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let (mut tree, ids) = sample();
        drop(tree.subscribe());
        let rx = tree.subscribe();
        tree.set_name(ids[4], "F2").unwrap();
        assert_eq!(rx.try_iter().count(), 2);
        assert_eq!(tree.observers.len(), 1);
    }

    #[test]
    fn test_rename_notifies_descendant_full_names() {
        let (mut tree, ids) = sample();
        let rx = tree.subscribe();

        tree.set_name(ids[2], "N2").unwrap();
        let events: Vec<TreeEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TreeEvent::PropertyChanged { node: ids[2], property: Property::Name },
                TreeEvent::PropertyChanged { node: ids[2], property: Property::FullName },
                TreeEvent::PropertyChanged { node: ids[3], property: Property::FullName },
                TreeEvent::PropertyChanged { node: ids[4], property: Property::FullName },
                TreeEvent::PropertyChanged { node: ids[5], property: Property::FullName },
            ]
        );
        assert_eq!(tree.full_name(ids[5]), "[M]N2.T.G");

        // Renaming the file leaves every full name below it as it was.
        tree.set_name(ids[0], "b.coveragexml").unwrap();
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_removed_slots_are_reused() {
        let (mut tree, ids) = sample();
        let slots = tree.nodes.len();

        tree.remove(ids[4]).unwrap();
        let h = tree
            .add_child(ids[3], CoverageNode::new(NodeKind::Function, "H"))
            .unwrap();

        assert_eq!(tree.nodes.len(), slots);
        assert_eq!(h.index(), ids[4].index());
        assert_ne!(h, ids[4]);
        // The old id does not resolve to the new occupant.
        assert!(tree.get(ids[4]).is_none());
        assert_eq!(tree[h].name(), "H");

        let (replaced, _) = tree
            .replace_child(h, CoverageNode::new(NodeKind::Function, "I"))
            .unwrap();
        assert_eq!(replaced.index(), h.index());
        assert_eq!(tree.nodes.len(), slots);
    }
}
