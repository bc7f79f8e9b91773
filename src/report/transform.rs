//! Template transform from the export document (`CovProj`) to an HTML page.
//!
//! The export XML is loaded into a small element tree and rendered as one
//! table with a row per level (totals, module, namespace, class, member).
//! Rows deeper than the requested default depth start hidden; the script
//! shows and hides descendants when a row is clicked.

use std::io::{BufRead, Write};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::config::DEFAULT_THRESHOLD;
use crate::error::{CoverageError, Result};
use crate::export::EXPORT_ROOT;
use crate::model::{CoverageCounts, CoverageLevel};
use crate::tree::{GLOBAL_FUNCTIONS_NAME, GLOBAL_NAMESPACE_NAME};

pub const PARAM_GEN_DATE: &str = "genDate";
pub const PARAM_TOTAL_LINES: &str = "totalLines";
pub const PARAM_TOTAL_BLOCKS: &str = "totalBlocks";
pub const PARAM_DEPTH: &str = "depth";
pub const PARAM_JQUERY_SOURCE: &str = "jQuerySource";

/// Named inputs to the transform besides the export document.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformParameters {
    pub gen_date: String,
    pub total_lines: u64,
    pub total_blocks: u64,
    /// Default expansion, 1 (totals) to 5 (members).
    pub depth: u8,
    pub jquery_source: String,
}

impl TransformParameters {
    pub fn pairs(&self) -> [(&'static str, String); 5] {
        [
            (PARAM_GEN_DATE, self.gen_date.clone()),
            (PARAM_TOTAL_LINES, self.total_lines.to_string()),
            (PARAM_TOTAL_BLOCKS, self.total_blocks.to_string()),
            (PARAM_DEPTH, self.depth.to_string()),
            (PARAM_JQUERY_SOURCE, self.jquery_source.clone()),
        ]
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn text_of(&self, name: &str) -> &str {
        self.child(name).map(|c| c.text.as_str()).unwrap_or("")
    }

    fn number_of(&self, name: &str) -> Result<u32> {
        let text = self.text_of(name).trim();
        if text.is_empty() {
            return Ok(0);
        }
        text.parse().map_err(|_| {
            CoverageError::invalid(format!("report data: <{}> is not a number: '{}'", name, text))
        })
    }

    fn counts(&self) -> Result<CoverageCounts> {
        Ok(CoverageCounts {
            lines_covered: self.number_of("LinesCovered")?,
            lines_partially_covered: self.number_of("LinesPartiallyCovered")?,
            lines_not_covered: self.number_of("LinesNotCovered")?,
            blocks_covered: self.number_of("BlocksCovered")?,
            blocks_not_covered: self.number_of("BlocksNotCovered")?,
        })
    }

    /// Items of the list element `wrapper`, e.g. `Modules/ModuleExport`.
    fn items<'a>(&'a self, wrapper: &str, item: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.child(wrapper)
            .into_iter()
            .flat_map(move |w| w.children.iter().filter(move |c| c.name == item))
    }
}

fn load<R: BufRead>(input: R) -> Result<Element> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| CoverageError::invalid(format!("report data: {}", e)))?;
        match event {
            Event::Start(ref e) => stack.push(Element {
                name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ..Default::default()
            }),
            Event::Empty(ref e) => {
                let element = Element {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| CoverageError::invalid(format!("report data: {}", err)))?;
                    current.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let done = stack
                    .pop()
                    .ok_or_else(|| CoverageError::invalid("report data: unbalanced tags"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return Ok(done),
                }
            }
            Event::Eof => return Err(CoverageError::invalid("report data: no root element")),
            _ => {}
        }
        buf.clear();
    }
}

struct Row {
    level: u8,
    name: String,
    counts: CoverageCounts,
    has_children: bool,
}

fn collect_rows(root: &Element) -> Result<Vec<Row>> {
    let mut rows = vec![Row {
        level: 1,
        name: root.text_of("Name").to_string(),
        counts: root.counts()?,
        has_children: root.items("Modules", "ModuleExport").next().is_some(),
    }];

    for module in root.items("Modules", "ModuleExport") {
        rows.push(row(module, 2, "Namespaces", "NamespaceExport", "")?);
        for ns in module.items("Namespaces", "NamespaceExport") {
            rows.push(row(ns, 3, "Classes", "ClassExport", GLOBAL_NAMESPACE_NAME)?);
            for cls in ns.items("Classes", "ClassExport") {
                rows.push(row(cls, 4, "Methods", "MethodExport", GLOBAL_FUNCTIONS_NAME)?);
                for meth in cls.items("Methods", "MethodExport") {
                    rows.push(row(meth, 5, "", "", "")?);
                }
            }
        }
    }

    Ok(rows)
}

fn row(e: &Element, level: u8, wrapper: &str, item: &str, placeholder: &str) -> Result<Row> {
    let name = match e.text_of("Name") {
        "" => placeholder.to_string(),
        n => n.to_string(),
    };
    Ok(Row {
        level,
        name,
        counts: e.counts()?,
        has_children: !wrapper.is_empty() && e.items(wrapper, item).next().is_some(),
    })
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

fn level_class(level: CoverageLevel) -> &'static str {
    match level {
        CoverageLevel::Covered => "covered",
        CoverageLevel::PartiallyCovered => "partial",
        CoverageLevel::NotCovered => "not-covered",
    }
}

fn render_row(row: &Row, depth: u8) -> String {
    let c = &row.counts;
    let expanded = row.has_children && row.level < depth;
    let mut classes = vec![format!("level-{}", row.level)];
    if row.has_children {
        classes.push("expandable".to_string());
    }
    if expanded {
        classes.push("expanded".to_string());
    }
    let hidden = if row.level > depth { " hidden" } else { "" };
    let toggle = match (row.has_children, expanded) {
        (false, _) => "",
        (true, true) => "&#9662;",
        (true, false) => "&#9656;",
    };

    format!(
        r#"<tr class="{classes}" data-level="{level}"{hidden}>
<td class="name" style="padding-left:{indent}em"><span class="toggle">{toggle}</span>{name}</td>
<td class="{line_class}">{lc}</td><td>{lp}</td><td>{ln}</td><td>{total_lines}</td>
<td class="{line_class}">{lc_pct}</td><td>{lp_pct}</td><td>{ln_pct}</td>
<td class="{block_class}">{bc}</td><td>{bn}</td><td>{total_blocks}</td>
<td class="{block_class}">{bc_pct}</td><td>{bn_pct}</td>
</tr>
"#,
        classes = classes.join(" "),
        level = row.level,
        indent = f32::from(row.level - 1) * 1.5,
        name = escape(row.name.as_str()),
        line_class = level_class(CoverageLevel::for_lines(c, DEFAULT_THRESHOLD)),
        block_class = level_class(CoverageLevel::for_blocks(c, DEFAULT_THRESHOLD)),
        lc = c.lines_covered,
        lp = c.lines_partially_covered,
        ln = c.lines_not_covered,
        total_lines = c.total_lines(),
        lc_pct = percent(c.lines_covered_ratio()),
        lp_pct = percent(c.lines_partially_covered_ratio()),
        ln_pct = percent(c.lines_not_covered_ratio()),
        bc = c.blocks_covered,
        bn = c.blocks_not_covered,
        total_blocks = c.total_blocks(),
        bc_pct = percent(c.blocks_covered_ratio()),
        bn_pct = percent(c.blocks_not_covered_ratio()),
    )
}

/// Render the export document read from `input` as HTML into `out`.
pub fn transform<R: BufRead, W: Write>(
    input: R,
    params: &TransformParameters,
    mut out: W,
) -> Result<()> {
    let root = load(input)?;
    if root.name != EXPORT_ROOT {
        return Err(CoverageError::invalid(format!(
            "report data: expected <{}>, found <{}>",
            EXPORT_ROOT, root.name
        )));
    }

    let rows = collect_rows(&root)?;
    let project = escape(root.text_of("Name")).into_owned();
    let meta: String = params
        .pairs()
        .iter()
        .map(|(name, value)| {
            format!(
                "    <meta name=\"{}\" content=\"{}\">\n",
                name,
                escape(value.as_str())
            )
        })
        .collect();
    let body: String = rows.iter().map(|r| render_row(r, params.depth)).collect();

    write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
{meta}    <title>Coverage Report - {project}</title>
    <style>{css}</style>
    <script src="{jquery}"></script>
</head>
<body>
    <header>
        <h1>{project}</h1>
        <p class="meta">Generated {gen_date} &middot; {total_lines} lines &middot; {total_blocks} blocks</p>
    </header>
    <table class="coverage">
        <thead>
            <tr>
                <th>Name</th>
                <th>Lines Covered</th><th>Lines Partial</th><th>Lines Not Covered</th><th>Total Lines</th>
                <th>% Lines Covered</th><th>% Lines Partial</th><th>% Lines Not Covered</th>
                <th>Blocks Covered</th><th>Blocks Not Covered</th><th>Total Blocks</th>
                <th>% Blocks Covered</th><th>% Blocks Not Covered</th>
            </tr>
        </thead>
        <tbody>
{body}        </tbody>
    </table>
    <script>{js}</script>
</body>
</html>
"#,
        meta = meta,
        project = project,
        css = inline_css(),
        jquery = escape(params.jquery_source.as_str()),
        gen_date = escape(params.gen_date.as_str()),
        total_lines = params.total_lines,
        total_blocks = params.total_blocks,
        body = body,
        js = inline_javascript(),
    )?;
    out.flush()?;
    Ok(())
}

fn inline_css() -> &'static str {
    r#"
body { font-family: 'Segoe UI', system-ui, sans-serif; font-size: 0.9rem; color: #1f2328; margin: 1.5rem; }
header h1 { font-size: 1.5rem; margin: 0 0 0.25rem 0; }
header .meta { color: #656d76; margin: 0 0 1rem 0; }
table.coverage { border-collapse: collapse; width: 100%; }
table.coverage th { background: #f6f8fa; text-align: right; padding: 0.3rem 0.5rem; border-bottom: 2px solid #d0d7de; }
table.coverage th:first-child { text-align: left; }
table.coverage td { text-align: right; padding: 0.2rem 0.5rem; border-bottom: 1px solid #eaeef2; }
table.coverage td.name { text-align: left; white-space: nowrap; }
tr.expandable { cursor: pointer; }
tr.level-1 { font-weight: 700; }
.toggle { display: inline-block; width: 1em; }
td.covered { background: #dafbe1; }
td.partial { background: #fff8c5; }
td.not-covered { background: #ffebe9; }
"#
}

fn inline_javascript() -> &'static str {
    r#"
$(function () {
    $('tr.expandable').on('click', function () {
        var row = $(this);
        var level = row.data('level');
        var expand = !row.hasClass('expanded');
        row.toggleClass('expanded', expand);
        row.find('.toggle').html(expand ? '&#9662;' : '&#9656;');
        row.nextAll('tr').each(function () {
            var next = $(this);
            var nextLevel = next.data('level');
            if (nextLevel <= level) {
                return false;
            }
            if (!expand) {
                next.attr('hidden', true).removeClass('expanded');
                next.find('.toggle').html(next.hasClass('expandable') ? '&#9656;' : '');
            } else if (nextLevel === level + 1) {
                next.removeAttr('hidden');
            }
        });
    });
});
"#
}
