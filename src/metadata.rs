//! Best-effort enrichment of type and function nodes with names taken from
//! assembly metadata.
//!
//! Coverage files name members by their IL signature (`Add(int32,int32)`,
//! `.ctor()`, `get_Value()`). A [`MetadataProvider`] maps a type, given by
//! its module and namespace-qualified name, to friendlier display names and
//! to the struct/property classification shown in the grid. Reading the
//! assemblies themselves is left to an external tool; [`JsonMetadataProvider`]
//! consumes the JSON such a tool produces:
//!
//! ```json
//! {
//!   "modules": {
//!     "calc.dll": {
//!       "Calc.Point+Builder": {
//!         "display_name": "Point+Builder",
//!         "is_value_type": true,
//!         "members": [
//!           { "coverage_name": ".ctor()", "display_name": "Builder()" },
//!           { "coverage_name": "get_X()", "display_name": "int get_X()",
//!             "is_property_accessor": true }
//!         ]
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, Result};
use crate::tree::{CodeElementKind, CoverageTree, NodeId, NodeKind, GLOBAL_NAMESPACE_NAME};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberMetadata {
    /// Name as it appears in the coverage file, parameters included.
    pub coverage_name: String,
    pub display_name: String,
    #[serde(default)]
    pub is_property_accessor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMetadata {
    pub display_name: String,
    #[serde(default)]
    pub is_value_type: bool,
    #[serde(default)]
    pub members: Vec<MemberMetadata>,
}

/// Source of type metadata.
pub trait MetadataProvider {
    /// Look up a type by module name and namespace-qualified name, with
    /// nested types separated by `+`.
    fn lookup_type(&self, module: &str, qualified_name: &str) -> Option<&TypeMetadata>;
}

/// Metadata read from a JSON document keyed by module, then by type.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JsonMetadataProvider {
    modules: HashMap<String, HashMap<String, TypeMetadata>>,
}

impl JsonMetadataProvider {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CoverageError::NotFound(path.to_path_buf()),
            _ => CoverageError::Io(e),
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl MetadataProvider for JsonMetadataProvider {
    fn lookup_type(&self, module: &str, qualified_name: &str) -> Option<&TypeMetadata> {
        // Module names are file names, which compare case-insensitively on
        // the platform that produces them.
        let types = self.modules.get(module).or_else(|| {
            self.modules
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(module))
                .map(|(_, types)| types)
        })?;
        types.get(qualified_name)
    }
}

/// Apply metadata to `id` and everything below it.
///
/// Files, modules and namespaces have nothing to rename and just recurse. A
/// function first loads its declaring type, which renames the function along
/// with its siblings. Nodes already marked as read are skipped.
pub fn load_metadata_for(
    tree: &mut CoverageTree,
    id: NodeId,
    provider: &dyn MetadataProvider,
) -> Result<()> {
    let node = tree
        .get(id)
        .ok_or_else(|| CoverageError::Precondition(format!("no node with id {}", id.index())))?;
    if node.has_read_metadata() {
        return Ok(());
    }

    match node.kind() {
        NodeKind::CoverageFile | NodeKind::Module | NodeKind::Namespace => {}
        NodeKind::Type => load_type_metadata(tree, id, provider)?,
        NodeKind::Function => {
            if let Some(declaring) = tree.closest_ancestor(id, NodeKind::Type) {
                load_metadata_for(tree, declaring, provider)?;
            }
        }
    }

    let children = tree[id].children().to_vec();
    for child in children {
        load_metadata_for(tree, child, provider)?;
    }
    Ok(())
}

/// `Namespace.Outer+Inner` for a type node; dots inside type names mark
/// nesting.
pub fn namespace_qualified_name(tree: &CoverageTree, id: NodeId) -> String {
    let mut parts = Vec::new();
    let mut current = Some(id);
    while let Some(node_id) = current {
        let Some(node) = tree.get(node_id) else {
            break;
        };
        match node.kind() {
            NodeKind::CoverageFile | NodeKind::Module => break,
            NodeKind::Type => parts.push(node.name().replace('.', "+")),
            NodeKind::Namespace if node.name() == GLOBAL_NAMESPACE_NAME => {}
            _ => parts.push(node.name().to_string()),
        }
        current = node.parent();
    }
    parts.reverse();
    parts.join(".")
}

fn load_type_metadata(
    tree: &mut CoverageTree,
    id: NodeId,
    provider: &dyn MetadataProvider,
) -> Result<()> {
    let Some(module_id) = tree.closest_ancestor(id, NodeKind::Module) else {
        warn!("Type '{}' has no module; skipping metadata", tree.full_name(id));
        return Ok(());
    };
    let module = tree[module_id].name().to_string();
    let qualified = namespace_qualified_name(tree, id);

    // A miss is recorded as read so functions under the type do not repeat
    // the lookup.
    let Some(metadata) = provider.lookup_type(&module, &qualified) else {
        debug!("No metadata for {} in {}", qualified, module);
        return tree.set_has_read_metadata(id, true);
    };

    tree.set_name(id, metadata.display_name.as_str())?;

    for member in &metadata.members {
        let target = tree[id].children().iter().copied().find(|&c| {
            let child = &tree[c];
            child.kind() == NodeKind::Function
                && !child.has_read_metadata()
                && child.name() == member.coverage_name
        });
        let Some(function) = target else {
            continue;
        };

        tree.set_name(function, member.display_name.as_str())?;
        if member.is_property_accessor {
            tree.set_code_element(function, CodeElementKind::Property)?;
        }
        tree.set_has_read_metadata(function, true)?;
    }

    if metadata.is_value_type {
        tree.set_code_element(id, CodeElementKind::Struct)?;
    }
    tree.set_has_read_metadata(id, true)
}
