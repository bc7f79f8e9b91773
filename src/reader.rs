//! Reads Visual Studio coverage XML into a [`CoverageTree`].
//!
//! Parsing is a quick-xml event loop over the decoded text with a stack of
//! open records. Leaf elements (`<LinesCovered>3</LinesCovered>`) are
//! collected as fields of the record on top of the stack; container
//! elements push a new record, which is attached to its owner when the
//! element closes. Anything else directly under the root, such as the
//! embedded `xs:schema`, is skipped.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::detect::{self, ROOT_ELEMENT};
use crate::error::{CoverageError, Result};
use crate::model::CoverageCounts;
use crate::schema::*;
use crate::tree::{
    CoverageNode, CoverageTree, NodeDetails, NodeKind, GLOBAL_FUNCTIONS_NAME,
    GLOBAL_NAMESPACE_NAME,
};

/// Read and parse the coverage file at `path` and build its node tree.
///
/// The root node is named after `path`. A missing file is
/// [`CoverageError::NotFound`]; anything else that stops the file from being
/// read or understood is [`CoverageError::InvalidCoverageFile`].
pub fn read_coverage_file(path: &Path) -> Result<CoverageTree> {
    let document = read_document(path)?;
    build_tree(&document, &path.display().to_string())
}

/// Read and parse the coverage file at `path` into its record form.
pub fn read_document(path: &Path) -> Result<CoverageDocument> {
    info!("Reading coverage file {}", path.display());

    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CoverageError::NotFound(path.to_path_buf()),
        _ => CoverageError::InvalidCoverageFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    if !detect::is_coverage_file(path, &bytes) {
        return Err(CoverageError::InvalidCoverageFile {
            path: path.to_path_buf(),
            reason: format!("not a coverage XML file (no <{}> element)", ROOT_ELEMENT),
        });
    }

    let text = detect::decode(&bytes).map_err(|e| e.with_path(path))?;
    let document = parse_document(&text).map_err(|e| e.with_path(path))?;
    debug!(
        "{}: {} modules, {} source files",
        path.display(),
        document.modules.len(),
        document.source_files.len()
    );
    Ok(document)
}

/// Parse decoded coverage XML text.
pub fn parse_document(text: &str) -> Result<CoverageDocument> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(false);

    let mut stack: Vec<Frame> = Vec::new();
    let mut field: Option<String> = None;
    let mut value = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            CoverageError::invalid(format!("{} at position {}", e, reader.buffer_position()))
        })?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e)?;
                if stack.is_empty() {
                    expect_root(&name)?;
                    stack.push(Frame::Document(CoverageDocument::default()));
                    continue;
                }
                let top = stack
                    .last_mut()
                    .ok_or_else(|| CoverageError::invalid("unbalanced element"))?;

                if field.is_some() {
                    return Err(CoverageError::invalid(format!(
                        "unexpected element <{}> inside a value",
                        name
                    )));
                }

                if let Some(child) = top.open_child(&name) {
                    stack.push(child);
                } else if top.accepts(&name) {
                    field = Some(name);
                    value.clear();
                } else {
                    debug!("Skipping <{}> inside <{}>", name, top.element());
                    reader.read_to_end(e.name()).map_err(|err| {
                        CoverageError::invalid(format!("unterminated <{}>: {}", name, err))
                    })?;
                }
            }
            Event::Empty(e) => {
                let name = local_name(&e)?;
                if stack.is_empty() {
                    expect_root(&name)?;
                    return Ok(CoverageDocument::default());
                }
                let top = stack
                    .last_mut()
                    .ok_or_else(|| CoverageError::invalid("unbalanced element"))?;

                if let Some(child) = top.open_child(&name) {
                    top.attach(child)?;
                } else if top.accepts(&name) {
                    top.set_field(&name, "")?;
                } else {
                    debug!("Ignoring <{}/> inside <{}>", name, top.element());
                }
            }
            Event::Text(e) => {
                if field.is_some() {
                    let text = e
                        .unescape()
                        .map_err(|err| CoverageError::invalid(err.to_string()))?;
                    value.push_str(&text);
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    value.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                if let Some(name) = field.take() {
                    if let Some(top) = stack.last_mut() {
                        top.set_field(&name, &value)?;
                    }
                    continue;
                }

                let closed = stack
                    .pop()
                    .ok_or_else(|| CoverageError::invalid("unbalanced closing tag"))?;
                match stack.last_mut() {
                    Some(owner) => owner.attach(closed)?,
                    None => {
                        return match closed {
                            Frame::Document(doc) => Ok(doc),
                            _ => Err(CoverageError::invalid("unbalanced closing tag")),
                        }
                    }
                }
            }
            Event::Eof => {
                return Err(CoverageError::invalid(if stack.is_empty() {
                    format!("missing <{}> root element", ROOT_ELEMENT)
                } else {
                    "unexpected end of document".to_string()
                }));
            }
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(e.local_name().as_ref())
        .map(str::to_string)
        .map_err(|err| CoverageError::invalid(err.to_string()))
}

fn expect_root(name: &str) -> Result<()> {
    if name == ROOT_ELEMENT {
        Ok(())
    } else {
        Err(CoverageError::invalid(format!(
            "expected <{}> root element, found <{}>",
            ROOT_ELEMENT, name
        )))
    }
}

fn parse_u32(field: &str, value: &str) -> Result<u32> {
    value.trim().parse::<u32>().map_err(|_| {
        CoverageError::invalid(format!("<{}> is not a number: '{}'", field, value))
    })
}

/// A record under construction.
enum Frame {
    Document(CoverageDocument),
    Module(ModuleRecord),
    Namespace(NamespaceRecord),
    Class(ClassRecord),
    Method(MethodRecord),
    Line(LineRecord),
    SourceFile(SourceFileRecord),
}

const COUNT_FIELDS: [&str; 5] = [
    "LinesCovered",
    "LinesPartiallyCovered",
    "LinesNotCovered",
    "BlocksCovered",
    "BlocksNotCovered",
];

impl Frame {
    fn element(&self) -> &'static str {
        match self {
            Frame::Document(_) => ROOT_ELEMENT,
            Frame::Module(_) => "Module",
            Frame::Namespace(_) => "NamespaceTable",
            Frame::Class(_) => "Class",
            Frame::Method(_) => "Method",
            Frame::Line(_) => "Lines",
            Frame::SourceFile(_) => "SourceFileNames",
        }
    }

    /// The record a child element named `name` opens, if it is a container.
    fn open_child(&self, name: &str) -> Option<Frame> {
        match (self, name) {
            (Frame::Document(_), "Module") => Some(Frame::Module(Default::default())),
            (Frame::Document(_), "SourceFileNames") => {
                Some(Frame::SourceFile(Default::default()))
            }
            (Frame::Module(_), "NamespaceTable") => Some(Frame::Namespace(Default::default())),
            (Frame::Namespace(_), "Class") => Some(Frame::Class(Default::default())),
            (Frame::Class(_), "Method") => Some(Frame::Method(Default::default())),
            (Frame::Method(_), "Lines") => Some(Frame::Line(Default::default())),
            _ => None,
        }
    }

    fn accepts(&self, name: &str) -> bool {
        let own: &[&str] = match self {
            Frame::Document(_) => return false,
            Frame::Module(_) => &["ModuleName", "ImageSize", "ImageLinkTime"],
            Frame::Namespace(_) => &["ModuleName", "NamespaceKeyName", "NamespaceName"],
            Frame::Class(_) => &["ClassKeyName", "ClassName", "NamespaceKeyName"],
            Frame::Method(_) => &["MethodKeyName", "MethodName", "MethodFullName"],
            Frame::Line(_) => {
                return [
                    "LnStart",
                    "ColStart",
                    "LnEnd",
                    "ColEnd",
                    "Coverage",
                    "SourceFileID",
                    "LineID",
                ]
                .contains(&name)
            }
            Frame::SourceFile(_) => return ["SourceFileID", "SourceFileName"].contains(&name),
        };
        own.contains(&name) || COUNT_FIELDS.contains(&name)
    }

    fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        let text = || Some(value.to_string());
        match self {
            Frame::Document(_) => {}
            Frame::Module(m) => match name {
                "ModuleName" => m.module_name = text(),
                "ImageSize" => m.image_size = parse_u32(name, value)?,
                "ImageLinkTime" => m.image_link_time = parse_u32(name, value)?,
                _ => set_count(&mut m.counts, name, value)?,
            },
            Frame::Namespace(ns) => match name {
                "ModuleName" => ns.module_name = text(),
                "NamespaceKeyName" => ns.namespace_key_name = text(),
                "NamespaceName" => ns.namespace_name = text(),
                _ => set_count(&mut ns.counts, name, value)?,
            },
            Frame::Class(cls) => match name {
                "ClassKeyName" => cls.class_key_name = text(),
                "ClassName" => cls.class_name = text(),
                "NamespaceKeyName" => cls.namespace_key_name = text(),
                _ => set_count(&mut cls.counts, name, value)?,
            },
            Frame::Method(meth) => match name {
                "MethodKeyName" => meth.method_key_name = text(),
                "MethodName" => meth.method_name = text(),
                "MethodFullName" => meth.method_full_name = text(),
                _ => set_count(&mut meth.counts, name, value)?,
            },
            Frame::Line(line) => match name {
                "LnStart" => line.ln_start = parse_u32(name, value)?,
                "ColStart" => line.col_start = parse_u32(name, value)?,
                "LnEnd" => line.ln_end = parse_u32(name, value)?,
                "ColEnd" => line.col_end = parse_u32(name, value)?,
                "Coverage" => {
                    let code = parse_u32(name, value)?;
                    line.coverage = LineCoverageState::from_code(code).ok_or_else(|| {
                        CoverageError::invalid(format!("unknown line coverage state {}", code))
                    })?;
                }
                "SourceFileID" => line.source_file_id = parse_u32(name, value)?,
                "LineID" => line.line_id = parse_u32(name, value)?,
                _ => {}
            },
            Frame::SourceFile(sf) => match name {
                "SourceFileID" => sf.file_id = parse_u32(name, value)?,
                "SourceFileName" => sf.file_name = text(),
                _ => {}
            },
        }
        Ok(())
    }

    /// Append a finished child record to this one.
    fn attach(&mut self, child: Frame) -> Result<()> {
        match (self, child) {
            (Frame::Document(doc), Frame::Module(m)) => doc.modules.push(m),
            (Frame::Document(doc), Frame::SourceFile(sf)) => doc.source_files.push(sf),
            (Frame::Module(m), Frame::Namespace(ns)) => m.namespaces.push(ns),
            (Frame::Namespace(ns), Frame::Class(cls)) => ns.classes.push(cls),
            (Frame::Class(cls), Frame::Method(meth)) => cls.methods.push(meth),
            (Frame::Method(meth), Frame::Line(line)) => meth.lines.push(line),
            (owner, child) => {
                return Err(CoverageError::invalid(format!(
                    "<{}> cannot contain <{}>",
                    owner.element(),
                    child.element()
                )))
            }
        }
        Ok(())
    }
}

fn set_count(counts: &mut CoverageCounts, name: &str, value: &str) -> Result<()> {
    let slot = match name {
        "LinesCovered" => &mut counts.lines_covered,
        "LinesPartiallyCovered" => &mut counts.lines_partially_covered,
        "LinesNotCovered" => &mut counts.lines_not_covered,
        "BlocksCovered" => &mut counts.blocks_covered,
        "BlocksNotCovered" => &mut counts.blocks_not_covered,
        _ => return Ok(()),
    };
    *slot = parse_u32(name, value)?;
    Ok(())
}

/// Build the node tree for a parsed document.
///
/// Empty namespace and class names are shown as placeholders; the recorded
/// names are kept in the node details for the writer. Every aggregate is
/// recounted from its children once the tree is complete.
pub fn build_tree(document: &CoverageDocument, name: &str) -> Result<CoverageTree> {
    let mut tree = CoverageTree::new(CoverageNode::new(NodeKind::CoverageFile, name).with_details(
        NodeDetails::File {
            source_files: document.source_files.clone(),
        },
    ));
    let root = tree.root();

    for module in &document.modules {
        let module_id = tree.add_child(
            root,
            CoverageNode::new(NodeKind::Module, module.module_name.clone().unwrap_or_default())
                .with_counts(module.counts)
                .with_details(NodeDetails::Module {
                    image_size: module.image_size,
                    image_link_time: module.image_link_time,
                }),
        )?;

        for ns in &module.namespaces {
            let ns_id = tree.add_child(
                module_id,
                CoverageNode::new(
                    NodeKind::Namespace,
                    display_name(&ns.namespace_name, GLOBAL_NAMESPACE_NAME),
                )
                .with_counts(ns.counts)
                .with_details(NodeDetails::Namespace {
                    module_name: ns.module_name.clone(),
                    namespace_key_name: ns.namespace_key_name.clone(),
                    recorded_name: ns.namespace_name.clone(),
                }),
            )?;

            for cls in &ns.classes {
                let cls_id = tree.add_child(
                    ns_id,
                    CoverageNode::new(
                        NodeKind::Type,
                        display_name(&cls.class_name, GLOBAL_FUNCTIONS_NAME),
                    )
                    .with_counts(cls.counts)
                    .with_details(NodeDetails::Type {
                        class_key_name: cls.class_key_name.clone(),
                        namespace_key_name: cls.namespace_key_name.clone(),
                        recorded_name: cls.class_name.clone(),
                    }),
                )?;

                for meth in &cls.methods {
                    tree.add_child(
                        cls_id,
                        CoverageNode::new(
                            NodeKind::Function,
                            meth.method_name.clone().unwrap_or_default(),
                        )
                        .with_counts(meth.counts)
                        .with_details(NodeDetails::Function {
                            method_key_name: meth.method_key_name.clone(),
                            method_full_name: meth.method_full_name.clone(),
                            lines: meth.lines.clone(),
                        }),
                    )?;
                }
            }
        }
    }

    tree.recount_all()?;
    Ok(tree)
}

fn display_name(recorded: &Option<String>, placeholder: &str) -> String {
    match recorded.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => placeholder.to_string(),
    }
}
