//! Projection of node trees back to records, merging of several documents,
//! and writing coverage XML to disk.

use std::io::Write;
use std::path::Path;

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::detect;
use crate::error::{CoverageError, Result};
use crate::schema::*;
use crate::tree::{
    CoverageTree, NodeDetails, NodeId, NodeKind, GLOBAL_FUNCTIONS_NAME, GLOBAL_NAMESPACE_NAME,
};

/// Convert one tree back into its on-disk record form.
///
/// Every node must carry the details the reader attached to it; a node
/// without them (or with details for another kind) is a precondition error.
pub fn project(tree: &CoverageTree) -> Result<CoverageDocument> {
    let root = tree.root();
    let source_files = match tree[root].details() {
        Some(NodeDetails::File { source_files }) => source_files.clone(),
        _ => return Err(missing_details(tree, root, NodeKind::CoverageFile)),
    };

    let modules = tree[root]
        .children()
        .iter()
        .map(|&id| project_module(tree, id))
        .collect::<Result<Vec<_>>>()?;

    Ok(CoverageDocument {
        modules,
        source_files,
    })
}

fn missing_details(tree: &CoverageTree, id: NodeId, expected: NodeKind) -> CoverageError {
    CoverageError::Precondition(format!(
        "node '{}' is missing its {} details",
        tree.full_name(id),
        expected.as_str()
    ))
}

/// The name to write for a node that may show a placeholder.
fn recorded_name(shown: &str, placeholder: &str, recorded: &Option<String>) -> Option<String> {
    if shown == placeholder {
        recorded.clone()
    } else {
        Some(shown.to_string())
    }
}

fn project_module(tree: &CoverageTree, id: NodeId) -> Result<ModuleRecord> {
    let node = &tree[id];
    let Some(NodeDetails::Module {
        image_size,
        image_link_time,
    }) = node.details()
    else {
        return Err(missing_details(tree, id, NodeKind::Module));
    };

    Ok(ModuleRecord {
        module_name: Some(node.name().to_string()),
        image_size: *image_size,
        image_link_time: *image_link_time,
        counts: *node.counts(),
        namespaces: node
            .children()
            .iter()
            .map(|&c| project_namespace(tree, c))
            .collect::<Result<_>>()?,
    })
}

fn project_namespace(tree: &CoverageTree, id: NodeId) -> Result<NamespaceRecord> {
    let node = &tree[id];
    let Some(NodeDetails::Namespace {
        module_name,
        namespace_key_name,
        recorded_name: recorded,
    }) = node.details()
    else {
        return Err(missing_details(tree, id, NodeKind::Namespace));
    };

    Ok(NamespaceRecord {
        counts: *node.counts(),
        module_name: module_name.clone(),
        namespace_key_name: namespace_key_name.clone(),
        namespace_name: recorded_name(node.name(), GLOBAL_NAMESPACE_NAME, recorded),
        classes: node
            .children()
            .iter()
            .map(|&c| project_class(tree, c))
            .collect::<Result<_>>()?,
    })
}

fn project_class(tree: &CoverageTree, id: NodeId) -> Result<ClassRecord> {
    let node = &tree[id];
    let Some(NodeDetails::Type {
        class_key_name,
        namespace_key_name,
        recorded_name: recorded,
    }) = node.details()
    else {
        return Err(missing_details(tree, id, NodeKind::Type));
    };

    Ok(ClassRecord {
        class_key_name: class_key_name.clone(),
        class_name: recorded_name(node.name(), GLOBAL_FUNCTIONS_NAME, recorded),
        counts: *node.counts(),
        namespace_key_name: namespace_key_name.clone(),
        methods: node
            .children()
            .iter()
            .map(|&c| project_method(tree, c))
            .collect::<Result<_>>()?,
    })
}

fn project_method(tree: &CoverageTree, id: NodeId) -> Result<MethodRecord> {
    let node = &tree[id];
    let Some(NodeDetails::Function {
        method_key_name,
        method_full_name,
        lines,
    }) = node.details()
    else {
        return Err(missing_details(tree, id, NodeKind::Function));
    };

    Ok(MethodRecord {
        method_key_name: method_key_name.clone(),
        method_name: Some(node.name().to_string()),
        method_full_name: method_full_name.clone(),
        counts: *node.counts(),
        lines: lines.clone(),
    })
}

/// Concatenate documents, renumbering source file IDs into disjoint ranges.
///
/// Inputs are cloned, never modified. The offset applied to a document is
/// the number of source files contributed by all documents before it.
pub fn concatenate(documents: &[CoverageDocument]) -> CoverageDocument {
    let mut merged = CoverageDocument::default();

    for document in documents {
        let offset = merged.source_files.len() as u32;
        debug!(
            "Appending {} modules with source file offset {}",
            document.modules.len(),
            offset
        );

        for module in &document.modules {
            let mut copy = module.clone();
            copy.offset_source_file_ids(offset);
            merged.modules.push(copy);
        }

        for source_file in &document.source_files {
            let mut copy = source_file.clone();
            copy.file_id += offset;
            merged.source_files.push(copy);
        }
    }

    merged
}

/// Project every tree and concatenate the results in order.
pub fn merge_trees(trees: &[CoverageTree]) -> Result<CoverageDocument> {
    let documents = trees.iter().map(project).collect::<Result<Vec<_>>>()?;
    Ok(concatenate(&documents))
}

/// Serialize a document to the bytes written on disk.
pub fn to_bytes(document: &CoverageDocument) -> Result<Vec<u8>> {
    let text = document.to_xml_string()?;
    Ok(detect::encode_utf16le(&text))
}

/// Write a document to `path`.
///
/// The bytes go to a temporary file next to `path` which is then renamed
/// over it, so a failed write leaves any previous file intact.
pub fn write_document(document: &CoverageDocument, path: &Path) -> Result<()> {
    let bytes = to_bytes(document)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| CoverageError::Io(e.error))?;

    info!(
        "Wrote {} modules, {} source files to {}",
        document.modules.len(),
        document.source_files.len(),
        path.display()
    );
    Ok(())
}

/// Merge the given trees and write them as one coverage file.
pub fn write_coverage_xml(trees: &[CoverageTree], path: &Path) -> Result<()> {
    let merged = merge_trees(trees)?;
    write_document(&merged, path)
}
