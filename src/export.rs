//! Flattened, read-only projection of merged coverage used as input to the
//! report transform. Every level is named `Name`; the root carries totals
//! summed over its modules.
//!
//!   <CovProj>
//!     <Name/> counters...
//!     <Modules>
//!       <ModuleExport> <Name/> counters... <Namespaces>
//!         <NamespaceExport> ... <Classes>
//!           <ClassExport> ... <Methods>
//!             <MethodExport> <Name/> counters... </MethodExport>

use std::io::Write;

use quick_xml::events::{BytesDecl, Event};
use quick_xml::{Result, Writer};
use serde::Serialize;

use crate::model::CoverageCounts;
use crate::schema::*;
use crate::xml::{number_element, text_element, WriteXml};

/// Root element of the export document.
pub const EXPORT_ROOT: &str = "CovProj";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageExport {
    pub name: String,
    #[serde(flatten)]
    pub counts: CoverageCounts,
    pub modules: Vec<ModuleExport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleExport {
    pub name: String,
    #[serde(flatten)]
    pub counts: CoverageCounts,
    pub namespaces: Vec<NamespaceExport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NamespaceExport {
    pub name: String,
    #[serde(flatten)]
    pub counts: CoverageCounts,
    pub classes: Vec<ClassExport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassExport {
    pub name: String,
    #[serde(flatten)]
    pub counts: CoverageCounts,
    pub methods: Vec<MethodExport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MethodExport {
    pub name: String,
    #[serde(flatten)]
    pub counts: CoverageCounts,
}

impl CoverageExport {
    /// Project a (merged) document under the given project name.
    pub fn new(name: impl Into<String>, document: &CoverageDocument) -> Self {
        let modules: Vec<ModuleExport> = document.modules.iter().map(ModuleExport::from).collect();
        let counts = modules.iter().map(|m| m.counts).sum();

        Self {
            name: name.into(),
            counts,
            modules,
        }
    }

    pub fn total_lines(&self) -> u64 {
        self.counts.total_lines()
    }

    pub fn total_blocks(&self) -> u64 {
        self.counts.total_blocks()
    }

    /// Serialize as a standalone UTF-8 XML document.
    pub fn to_xml<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = Writer::new_with_indent(out, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self._write_xml(&mut writer)
    }
}

impl From<&ModuleRecord> for ModuleExport {
    fn from(m: &ModuleRecord) -> Self {
        Self {
            name: m.module_name.clone().unwrap_or_default(),
            counts: m.counts,
            namespaces: m.namespaces.iter().map(NamespaceExport::from).collect(),
        }
    }
}

impl From<&NamespaceRecord> for NamespaceExport {
    fn from(ns: &NamespaceRecord) -> Self {
        Self {
            name: ns.namespace_name.clone().unwrap_or_default(),
            counts: ns.counts,
            classes: ns.classes.iter().map(ClassExport::from).collect(),
        }
    }
}

impl From<&ClassRecord> for ClassExport {
    fn from(cls: &ClassRecord) -> Self {
        Self {
            name: cls.class_name.clone().unwrap_or_default(),
            counts: cls.counts,
            methods: cls.methods.iter().map(MethodExport::from).collect(),
        }
    }
}

impl From<&MethodRecord> for MethodExport {
    fn from(meth: &MethodRecord) -> Self {
        Self {
            name: meth.method_name.clone().unwrap_or_default(),
            counts: meth.counts,
        }
    }
}

fn write_header<W: Write>(w: &mut Writer<W>, name: &str, c: &CoverageCounts) -> Result<()> {
    text_element(w, "Name", name)?;
    number_element(w, "LinesCovered", c.lines_covered.into())?;
    number_element(w, "LinesPartiallyCovered", c.lines_partially_covered.into())?;
    number_element(w, "LinesNotCovered", c.lines_not_covered.into())?;
    number_element(w, "BlocksCovered", c.blocks_covered.into())?;
    number_element(w, "BlocksNotCovered", c.blocks_not_covered.into())
}

/// `<wrapper>items...</wrapper>`; empty lists are written as `<wrapper/>`.
fn write_list<W: Write, T: WriteXml>(w: &mut Writer<W>, wrapper: &str, items: &Vec<T>) -> Result<()> {
    if items.is_empty() {
        w.create_element(wrapper).write_empty()?;
    } else {
        w.create_element(wrapper)
            .write_inner_content(|w| items._write_xml(w))?;
    }
    Ok(())
}

impl WriteXml for CoverageExport {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.create_element(EXPORT_ROOT).write_inner_content(|w| {
            write_header(w, &self.name, &self.counts)?;
            write_list(w, "Modules", &self.modules)
        })?;

        Ok(())
    }
}

impl WriteXml for ModuleExport {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.create_element("ModuleExport").write_inner_content(|w| {
            write_header(w, &self.name, &self.counts)?;
            write_list(w, "Namespaces", &self.namespaces)
        })?;

        Ok(())
    }
}

impl WriteXml for NamespaceExport {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer
            .create_element("NamespaceExport")
            .write_inner_content(|w| {
                write_header(w, &self.name, &self.counts)?;
                write_list(w, "Classes", &self.classes)
            })?;

        Ok(())
    }
}

impl WriteXml for ClassExport {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.create_element("ClassExport").write_inner_content(|w| {
            write_header(w, &self.name, &self.counts)?;
            write_list(w, "Methods", &self.methods)
        })?;

        Ok(())
    }
}

impl WriteXml for MethodExport {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer
            .create_element("MethodExport")
            .write_inner_content(|w| write_header(w, &self.name, &self.counts))?;

        Ok(())
    }
}
