mod common;

use std::fs;

use vscov::error::CoverageError;
use vscov::model::{ReportConfiguration, ReportFormat, ViewLevel};
use vscov::report::{self, assets};

fn config(destination: std::path::PathBuf, format: ReportFormat) -> ReportConfiguration {
    ReportConfiguration {
        destination_path: destination,
        project_name: "Calculator".to_string(),
        default_expansion: ViewLevel::Namespaces,
        report_format: format,
        open_when_done: false,
    }
}

#[test]
fn report_without_coverage_files_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.html");

    let err = report::write_report(&[], &config(dest.clone(), ReportFormat::HtmlSingleFile), dir.path())
        .unwrap_err();

    assert!(matches!(err, CoverageError::Precondition(_)));
    assert!(!dest.exists());
}

#[test]
fn report_without_destination_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let tree = common::read_fixture("sample.coveragexml");

    let err = report::write_report(
        &[tree],
        &config(std::path::PathBuf::new(), ReportFormat::HtmlSingleFile),
        dir.path(),
    )
    .unwrap_err();
    assert!(matches!(err, CoverageError::Precondition(_)));
}

#[test]
fn single_file_report_uses_cdn() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.html");
    let tree = common::read_fixture("sample.coveragexml");

    report::write_report(&[tree], &config(dest.clone(), ReportFormat::HtmlSingleFile), dir.path())
        .unwrap();

    let html = fs::read_to_string(&dest).unwrap();
    assert!(html.contains(&format!("<script src=\"{}\"></script>", assets::JQUERY_CDN_LOCATION)));
    assert!(html.contains("<title>Coverage Report - Calculator</title>"));
    assert!(html.contains("<meta name=\"jQuerySource\""));
    assert!(html.contains("calc.dll"));
    assert!(html.contains("Add(int32,int32)"));
    assert!(!dir.path().join("report_files").exists());
}

#[test]
fn multi_file_report_copies_cached_script() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(assets::cached_path(&data_dir), "/* jquery */").unwrap();

    let out_dir = dir.path().join("out");
    let stale = out_dir.join("report_files");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("old.txt"), "stale").unwrap();

    let dest = out_dir.join("report.html");
    let trees = vec![
        common::read_fixture("sample.coveragexml"),
        common::read_fixture("other.coveragexml"),
    ];
    report::write_report(&trees, &config(dest.clone(), ReportFormat::HtmlMultiFile), &data_dir)
        .unwrap();

    assert!(!stale.join("old.txt").exists());
    assert_eq!(
        fs::read_to_string(stale.join(assets::JQUERY_FILE_NAME)).unwrap(),
        "/* jquery */"
    );

    let html = fs::read_to_string(&dest).unwrap();
    assert!(html.contains("<script src=\"report_files/jquery-3.1.1.slim.min.js\"></script>"));
    assert!(html.contains("util.dll"));
    assert!(html.contains("Trim(string)"));
}
