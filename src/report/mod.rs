//! HTML report generation.
//!
//! The merged coverage is projected to a [`CoverageExport`], written to a
//! temporary file, and run through the template [`transform`] with the
//! generation date, totals, default depth and script location. The
//! [`ReportWriter`] for the configured [`ReportFormat`] decides where the
//! script comes from.

pub mod assets;
pub mod transform;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use crate::error::{CoverageError, Result};
use crate::export::CoverageExport;
use crate::model::{ReportConfiguration, ReportFormat};
use crate::tree::CoverageTree;
use crate::writer;

pub use transform::{transform, TransformParameters};

/// `dd MMM yyyy HH:mm:ss`
pub const GEN_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S";

/// Strategy for producing a report in one output format.
pub trait ReportWriter {
    fn format(&self) -> ReportFormat;

    fn write_report(&self, export: &CoverageExport, config: &ReportConfiguration) -> Result<()>;
}

/// One HTML file; the script is referenced from its CDN.
pub struct HtmlSingleFileReportWriter;

impl ReportWriter for HtmlSingleFileReportWriter {
    fn format(&self) -> ReportFormat {
        ReportFormat::HtmlSingleFile
    }

    fn write_report(&self, export: &CoverageExport, config: &ReportConfiguration) -> Result<()> {
        run_transform(export, config, assets::JQUERY_CDN_LOCATION.to_string())
    }
}

/// An HTML file plus a `<name>_files` folder with a local copy of the
/// script, so the page works offline.
pub struct HtmlMultiFileReportWriter {
    data_dir: PathBuf,
}

impl HtmlMultiFileReportWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

impl ReportWriter for HtmlMultiFileReportWriter {
    fn format(&self) -> ReportFormat {
        ReportFormat::HtmlMultiFile
    }

    /// Deletes any existing `<name>_files` folder next to the destination.
    fn write_report(&self, export: &CoverageExport, config: &ReportConfiguration) -> Result<()> {
        let cached = assets::ensure_cached(&self.data_dir)?;

        let files_dir_name = assets_dir_name(&config.destination_path)?;
        let files_dir = config
            .destination_path
            .parent()
            .map(|p| p.join(&files_dir_name))
            .unwrap_or_else(|| PathBuf::from(&files_dir_name));

        if files_dir.exists() {
            fs::remove_dir_all(&files_dir)?;
        }
        fs::create_dir_all(&files_dir)?;
        fs::copy(&cached, files_dir.join(assets::JQUERY_FILE_NAME))?;

        run_transform(
            export,
            config,
            format!("{}/{}", files_dir_name, assets::JQUERY_FILE_NAME),
        )
    }
}

/// `report.html` -> `report_files`
pub fn assets_dir_name(destination: &Path) -> Result<String> {
    let stem = destination
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            CoverageError::Precondition(format!(
                "report destination '{}' has no file name",
                destination.display()
            ))
        })?;
    Ok(format!("{}_files", stem))
}

/// Pick the report writer for `format`.
pub fn writer_for(format: ReportFormat, data_dir: &Path) -> Box<dyn ReportWriter> {
    match format {
        ReportFormat::HtmlSingleFile => Box::new(HtmlSingleFileReportWriter),
        ReportFormat::HtmlMultiFile => Box::new(HtmlMultiFileReportWriter::new(data_dir)),
    }
}

/// Merge `trees` and write a report as configured.
///
/// Fails with a precondition error, before touching the file system, when
/// there is nothing to report or no destination.
pub fn write_report(
    trees: &[CoverageTree],
    config: &ReportConfiguration,
    data_dir: &Path,
) -> Result<()> {
    if trees.is_empty() {
        return Err(CoverageError::Precondition(
            "a report needs at least one coverage file".to_string(),
        ));
    }
    if config.destination_path.as_os_str().is_empty() {
        return Err(CoverageError::Precondition(
            "report destination path is empty".to_string(),
        ));
    }

    let merged = writer::merge_trees(trees)?;
    let export = CoverageExport::new(config.project_name.clone(), &merged);

    let report_writer = writer_for(config.report_format, data_dir);
    info!(
        "Writing {} report to {}",
        report_writer.format(),
        config.destination_path.display()
    );
    report_writer.write_report(&export, config)
}

fn run_transform(
    export: &CoverageExport,
    config: &ReportConfiguration,
    jquery_source: String,
) -> Result<()> {
    let mut data = tempfile::tempfile()?;
    {
        let mut buffered = BufWriter::new(&mut data);
        export.to_xml(&mut buffered)?;
        buffered.flush()?;
    }
    data.seek(SeekFrom::Start(0))?;

    let params = TransformParameters {
        gen_date: Local::now().format(GEN_DATE_FORMAT).to_string(),
        total_lines: export.total_lines(),
        total_blocks: export.total_blocks(),
        depth: config.default_expansion.depth(),
        jquery_source,
    };

    let out = File::create(&config.destination_path)?;
    transform(BufReader::new(data), &params, BufWriter::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assets_dir_name() {
        assert_eq!(
            assets_dir_name(Path::new("/tmp/out/Report.html")).unwrap(),
            "Report_files"
        );
        assert!(assets_dir_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_writer_selection() {
        let dir = Path::new("/tmp");
        assert_eq!(
            writer_for(ReportFormat::HtmlSingleFile, dir).format(),
            ReportFormat::HtmlSingleFile
        );
        assert_eq!(
            writer_for(ReportFormat::HtmlMultiFile, dir).format(),
            ReportFormat::HtmlMultiFile
        );
    }

    #[test]
    fn test_empty_trees_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfiguration {
            destination_path: dir.path().join("r.html"),
            ..Default::default()
        };
        let err = write_report(&[], &config, dir.path()).unwrap_err();
        assert!(matches!(err, CoverageError::Precondition(_)));
        assert!(!config.destination_path.exists());
    }
}
