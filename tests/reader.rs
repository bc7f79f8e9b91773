mod common;

use vscov::error::CoverageError;
use vscov::model::CoverageCounts;
use vscov::tree::{NodeDetails, NodeKind, GLOBAL_FUNCTIONS_NAME, GLOBAL_NAMESPACE_NAME};

#[test]
fn read_builds_one_node_per_record() {
    let path = common::fixture("sample.coveragexml");
    let tree = common::read_fixture("sample.coveragexml");
    let root = tree.root();

    assert_eq!(tree[root].kind(), NodeKind::CoverageFile);
    assert_eq!(tree[root].name(), path.display().to_string());
    // file + module + 2 namespaces + 2 types + 3 functions
    assert_eq!(tree.len(), 9);

    let module = tree[root].children()[0];
    assert_eq!(tree[module].name(), "calc.dll");
    assert_eq!(
        tree[module].details(),
        Some(&NodeDetails::Module {
            image_size: 16384,
            image_link_time: 0
        })
    );

    let namespaces = tree[module].children();
    assert_eq!(tree[namespaces[0]].name(), "Calc");
    assert_eq!(tree[namespaces[1]].name(), GLOBAL_NAMESPACE_NAME);
    let global_type = tree[namespaces[1]].children()[0];
    assert_eq!(tree[global_type].name(), GLOBAL_FUNCTIONS_NAME);
}

#[test]
fn read_rolls_up_every_level() {
    let tree = common::read_fixture("sample.coveragexml");

    for id in tree.preorder(tree.root()) {
        let node = &tree[id];
        if node.has_children() {
            let sum: CoverageCounts = node.children().iter().map(|&c| *tree[c].counts()).sum();
            assert_eq!(*node.counts(), sum, "roll-up mismatch at {}", tree.full_name(id));
        }
    }

    let root = &tree[tree.root()];
    assert_eq!(root.counts().lines_covered, 6);
    assert_eq!(root.counts().lines_partially_covered, 1);
    assert_eq!(root.counts().lines_not_covered, 2);
    assert_eq!(root.counts().total_blocks(), 11);
}

#[test]
fn read_keeps_source_files_and_line_spans() {
    let tree = common::read_fixture("sample.coveragexml");

    match tree[tree.root()].details() {
        Some(NodeDetails::File { source_files }) => {
            assert_eq!(source_files.len(), 2);
            assert_eq!(source_files[1].file_name.as_deref(), Some("C:\\src\\calc\\main.cpp"));
        }
        other => panic!("unexpected root details {:?}", other),
    }

    let add = tree.find_by_full_name("[calc.dll]Calc.Adder.Add(int32,int32)").unwrap();
    match tree[add].details() {
        Some(NodeDetails::Function { lines, method_key_name, .. }) => {
            assert_eq!(lines.len(), 2);
            assert_eq!(lines[1].ln_start, 11);
            assert_eq!(method_key_name.as_deref(), Some("Add(int32,int32)!100663297"));
        }
        other => panic!("unexpected function details {:?}", other),
    }
}

#[test]
fn full_names_use_module_brackets() {
    let tree = common::read_fixture("sample.coveragexml");

    assert!(tree.find_by_full_name("calc.dll").is_some());
    assert!(tree.find_by_full_name("[calc.dll]Calc").is_some());
    assert!(tree.find_by_full_name("[calc.dll]Calc.Adder..ctor()").is_some());
    assert!(tree
        .find_by_full_name("[calc.dll]<Global Namespace>.<Global Functions>.main()")
        .is_some());
}

#[test]
fn read_utf16_file() {
    let dir = tempfile::tempdir().unwrap();
    let text = std::fs::read_to_string(common::fixture("sample.coveragexml")).unwrap();
    let path = dir.path().join("utf16.coveragexml");
    std::fs::write(&path, vscov::detect::encode_utf16le(&text)).unwrap();

    let utf8 = vscov::reader::read_document(&common::fixture("sample.coveragexml")).unwrap();
    let utf16 = vscov::reader::read_document(&path).unwrap();
    assert_eq!(utf8, utf16);
}

#[test]
fn missing_file_is_not_found() {
    let err = vscov::reader::read_coverage_file(&common::fixture("nope.coveragexml")).unwrap_err();
    assert!(matches!(err, CoverageError::NotFound(_)));
}

#[test]
fn malformed_file_is_invalid() {
    let dir = tempfile::tempdir().unwrap();

    let truncated = dir.path().join("truncated.coveragexml");
    std::fs::write(&truncated, "<CoverageDSPriv xmlns=\"urn:Coverage\"><Module>").unwrap();
    let err = vscov::reader::read_coverage_file(&truncated).unwrap_err();
    match err {
        CoverageError::InvalidCoverageFile { path, .. } => assert_eq!(path, truncated),
        other => panic!("unexpected error {:?}", other),
    }

    let bad_number = dir.path().join("bad.coveragexml");
    std::fs::write(
        &bad_number,
        "<CoverageDSPriv><Module><ImageSize>big</ImageSize></Module></CoverageDSPriv>",
    )
    .unwrap();
    assert!(matches!(
        vscov::reader::read_coverage_file(&bad_number),
        Err(CoverageError::InvalidCoverageFile { .. })
    ));

    let wrong_root = dir.path().join("cobertura.xml");
    std::fs::write(&wrong_root, "<coverage line-rate=\"1\"></coverage>").unwrap();
    assert!(matches!(
        vscov::reader::read_coverage_file(&wrong_root),
        Err(CoverageError::InvalidCoverageFile { .. })
    ));
}

#[test]
fn read_visual_studio_native_file() {
    let bytes = std::fs::read(common::fixture("visual_studio.coveragexml")).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xFE]);

    let tree = common::read_fixture("visual_studio.coveragexml");
    let root = &tree[tree.root()];
    assert_eq!(root.children().len(), 2);
    assert_eq!(root.counts().lines_covered, 6);
    assert_eq!(root.counts().lines_partially_covered, 1);
    assert_eq!(root.counts().lines_not_covered, 2);
    assert_eq!(root.counts().blocks_covered, 8);
    assert_eq!(root.counts().blocks_not_covered, 3);

    assert!(tree
        .find_by_full_name("[geometry.dll]Geometry.Point.Builder.get_X()")
        .is_some());
    assert!(tree
        .find_by_full_name(
            "[native.dll]<Global Namespace>.<Global Functions>.operator<<(std::ostream &,Point const &)"
        )
        .is_some());
}
