//! Exact-format serialization of the coverage record schema.
//!
//! Output matches what Visual Studio writes: default namespace
//! `urn:Coverage` on the root, four-space indentation, no XML declaration,
//! no `xsi`/`xsd` namespace attributes, and the schema document embedded as
//! the first child of the root. The bytes on disk are UTF-16LE with a BOM.

use std::io::Write;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::{Result, Writer};

use crate::detect::{COVERAGE_NAMESPACE, ROOT_ELEMENT};
use crate::model::CoverageCounts;
use crate::schema::*;

/// Schema fragment spliced in front of the records.
pub const EMBEDDED_SCHEMA: &str = include_str!("schema.xsd");

pub trait WriteXml {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()>;

    fn write_xml<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = Writer::new_with_indent(writer, b' ', 4);
        self._write_xml(&mut writer)
    }
}

// Only write optional fields if present.
impl<T> WriteXml for Option<T>
where
    T: WriteXml,
{
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        if let Some(value) = self {
            value._write_xml(writer)?;
        }

        Ok(())
    }
}

impl<T> WriteXml for Vec<T>
where
    T: WriteXml,
{
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        for value in self {
            value._write_xml(writer)?;
        }

        Ok(())
    }
}

/// `<name>value</name>`, or `<name />` for an empty value.
pub(crate) fn text_element<W: Write>(w: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        // `XmlWriter` puts a space before the slash.
        let tag = BytesStart::from_content(format!("{} ", name), name.len());
        w.write_event(Event::Empty(tag))?;
    } else {
        // Quotes stay literal in element text, as in Visual Studio's output.
        w.create_element(name)
            .write_text_content(BytesText::from_escaped(partial_escape(value)))?;
    }
    Ok(())
}

/// Absent strings are omitted entirely.
fn optional_element<W: Write>(w: &mut Writer<W>, name: &str, value: &Option<String>) -> Result<()> {
    match value {
        Some(v) => text_element(w, name, v),
        None => Ok(()),
    }
}

pub(crate) fn number_element<W: Write>(w: &mut Writer<W>, name: &str, value: u64) -> Result<()> {
    text_element(w, name, &value.to_string())
}

fn write_lines<W: Write>(w: &mut Writer<W>, c: &CoverageCounts) -> Result<()> {
    number_element(w, "LinesCovered", c.lines_covered.into())?;
    number_element(w, "LinesPartiallyCovered", c.lines_partially_covered.into())?;
    number_element(w, "LinesNotCovered", c.lines_not_covered.into())
}

fn write_blocks<W: Write>(w: &mut Writer<W>, c: &CoverageCounts) -> Result<()> {
    number_element(w, "BlocksCovered", c.blocks_covered.into())?;
    number_element(w, "BlocksNotCovered", c.blocks_not_covered.into())
}

/// Re-read the embedded schema and replay its events into `w`, so it picks
/// up the writer's indentation.
fn write_embedded_schema<W: Write>(w: &mut Writer<W>) -> Result<()> {
    let mut reader = Reader::from_str(EMBEDDED_SCHEMA);
    reader.trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            event => w.write_event(event)?,
        }
    }

    Ok(())
}

/// Rewrite every `\r\n`, `\r` and `\n` as `\r\n`, the way `XmlWriter`
/// replaces new lines in both markup and text.
pub(crate) fn crlf_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            _ => out.push(c),
        }
    }
    out
}

impl CoverageDocument {
    /// Serialize to text, without the UTF-16 encoding step. Line breaks
    /// are `\r\n`.
    pub fn to_xml_string(&self) -> crate::error::Result<String> {
        let mut data = Vec::new();
        self.write_xml(&mut data)?;
        let text = String::from_utf8(data).map_err(|e| {
            crate::error::CoverageError::Precondition(format!("serializer produced invalid UTF-8: {}", e))
        })?;
        Ok(crlf_line_breaks(&text))
    }
}

impl WriteXml for CoverageDocument {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer
            .create_element(ROOT_ELEMENT)
            .with_attribute(("xmlns", COVERAGE_NAMESPACE))
            .write_inner_content(|w| {
                write_embedded_schema(w)?;
                self.modules._write_xml(w)?;
                self.source_files._write_xml(w)?;

                Ok::<(), quick_xml::Error>(())
            })?;

        Ok(())
    }
}

impl WriteXml for ModuleRecord {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.create_element("Module").write_inner_content(|w| {
            optional_element(w, "ModuleName", &self.module_name)?;
            number_element(w, "ImageSize", self.image_size.into())?;
            number_element(w, "ImageLinkTime", self.image_link_time.into())?;
            write_lines(w, &self.counts)?;
            write_blocks(w, &self.counts)?;
            self.namespaces._write_xml(w)?;

            Ok::<(), quick_xml::Error>(())
        })?;

        Ok(())
    }
}

impl WriteXml for NamespaceRecord {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let c = &self.counts;
        writer.create_element("NamespaceTable").write_inner_content(|w| {
            write_blocks(w, c)?;
            number_element(w, "LinesCovered", c.lines_covered.into())?;
            number_element(w, "LinesNotCovered", c.lines_not_covered.into())?;
            number_element(w, "LinesPartiallyCovered", c.lines_partially_covered.into())?;
            optional_element(w, "ModuleName", &self.module_name)?;
            optional_element(w, "NamespaceKeyName", &self.namespace_key_name)?;
            optional_element(w, "NamespaceName", &self.namespace_name)?;
            self.classes._write_xml(w)?;

            Ok::<(), quick_xml::Error>(())
        })?;

        Ok(())
    }
}

impl WriteXml for ClassRecord {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let c = &self.counts;
        writer.create_element("Class").write_inner_content(|w| {
            optional_element(w, "ClassKeyName", &self.class_key_name)?;
            optional_element(w, "ClassName", &self.class_name)?;
            number_element(w, "LinesCovered", c.lines_covered.into())?;
            number_element(w, "LinesNotCovered", c.lines_not_covered.into())?;
            number_element(w, "LinesPartiallyCovered", c.lines_partially_covered.into())?;
            write_blocks(w, c)?;
            optional_element(w, "NamespaceKeyName", &self.namespace_key_name)?;
            self.methods._write_xml(w)?;

            Ok::<(), quick_xml::Error>(())
        })?;

        Ok(())
    }
}

impl WriteXml for MethodRecord {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.create_element("Method").write_inner_content(|w| {
            optional_element(w, "MethodKeyName", &self.method_key_name)?;
            optional_element(w, "MethodName", &self.method_name)?;
            optional_element(w, "MethodFullName", &self.method_full_name)?;
            write_lines(w, &self.counts)?;
            write_blocks(w, &self.counts)?;
            self.lines._write_xml(w)?;

            Ok::<(), quick_xml::Error>(())
        })?;

        Ok(())
    }
}

impl WriteXml for LineRecord {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.create_element("Lines").write_inner_content(|w| {
            number_element(w, "LnStart", self.ln_start.into())?;
            number_element(w, "ColStart", self.col_start.into())?;
            number_element(w, "LnEnd", self.ln_end.into())?;
            number_element(w, "ColEnd", self.col_end.into())?;
            number_element(w, "Coverage", self.coverage.code().into())?;
            number_element(w, "SourceFileID", self.source_file_id.into())?;
            number_element(w, "LineID", self.line_id.into())?;

            Ok::<(), quick_xml::Error>(())
        })?;

        Ok(())
    }
}

impl WriteXml for SourceFileRecord {
    fn _write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer
            .create_element("SourceFileNames")
            .write_inner_content(|w| {
                number_element(w, "SourceFileID", self.file_id.into())?;
                optional_element(w, "SourceFileName", &self.file_name)?;

                Ok::<(), quick_xml::Error>(())
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn to_string<T: WriteXml>(value: &T) -> String {
        let mut data = Vec::new();
        value.write_xml(&mut data).unwrap();
        String::from_utf8(data).unwrap()
    }

    #[test]
    fn test_line_element_order() {
        let line = LineRecord {
            ln_start: 10,
            col_start: 5,
            ln_end: 11,
            col_end: 2,
            coverage: LineCoverageState::PartiallyCovered,
            source_file_id: 3,
            line_id: 42,
        };
        assert_eq!(
            to_string(&line),
            "<Lines>\n    <LnStart>10</LnStart>\n    <ColStart>5</ColStart>\n    \
             <LnEnd>11</LnEnd>\n    <ColEnd>2</ColEnd>\n    <Coverage>1</Coverage>\n    \
             <SourceFileID>3</SourceFileID>\n    <LineID>42</LineID>\n</Lines>"
        );
    }

    #[test]
    fn test_empty_and_absent_strings() {
        let sf = SourceFileRecord {
            file_id: 0,
            file_name: None,
        };
        assert_eq!(
            to_string(&sf),
            "<SourceFileNames>\n    <SourceFileID>0</SourceFileID>\n</SourceFileNames>"
        );

        let cls = ClassRecord {
            class_name: Some(String::new()),
            ..Default::default()
        };
        assert!(to_string(&cls).contains("\n    <ClassName />\n"));
        assert!(!to_string(&cls).contains("ClassKeyName"));
    }

    #[test]
    fn test_text_is_escaped() {
        let meth = MethodRecord {
            method_name: Some("operator<(a&b)".to_string()),
            ..Default::default()
        };
        assert!(to_string(&meth).contains("<MethodName>operator&lt;(a&amp;b)</MethodName>"));
    }

    #[test]
    fn test_document_layout() {
        let doc = CoverageDocument {
            modules: vec![ModuleRecord {
                module_name: Some("m.dll".to_string()),
                ..Default::default()
            }],
            source_files: vec![],
        };
        let text = doc.to_xml_string().unwrap();

        assert!(text.starts_with("<CoverageDSPriv xmlns=\"urn:Coverage\">\r\n    <xs:schema"));
        assert!(!text.replace("\r\n", "").contains('\n'));
        assert!(text.contains("<xs:element name=\"ModuleName\" type=\"xs:string\" />\r\n"));
        assert!(!text.contains("<?xml"));
        assert!(!text.contains("xmlns:xsi"));
        assert!(!text.contains("xmlns:xsd="));
        let schema_end = text.find("</xs:schema>").unwrap();
        let module = text.find("<Module>").unwrap();
        assert!(schema_end < module);
        assert!(text.ends_with("</CoverageDSPriv>"));
    }
    #[test]
    fn test_crlf_line_breaks() {
        assert_eq!(crlf_line_breaks("a\nb\r\nc\rd"), "a\r\nb\r\nc\r\nd");
        let once = crlf_line_breaks("x\n\ny");
        assert_eq!(crlf_line_breaks(&once), once);
    }

    #[test]
    fn test_empty_namespace_name_matches_visual_studio() {
        let doc = CoverageDocument {
            modules: vec![ModuleRecord {
                module_name: Some("m.dll".to_string()),
                namespaces: vec![NamespaceRecord {
                    namespace_name: Some(String::new()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            source_files: vec![],
        };
        let text = doc.to_xml_string().unwrap();

        assert!(text.contains("\r\n            <NamespaceName />\r\n"));
        assert!(!text.contains("<NamespaceName/>"));
    }
}
