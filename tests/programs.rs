mod common;

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use walkdir::WalkDir;

#[test]
fn fixture_programs_match_expected_output() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/programs");
    let mut checked = 0;

    for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("ipl") {
            continue;
        }
        let expected_path = path.with_extension("out");
        if !expected_path.is_file() {
            // Helper modules imported by the fixtures.
            continue;
        }

        let expected = fs::read_to_string(&expected_path).expect("read expected output");
        let (result, output) = common::run_file(path);
        if let Err(err) = result {
            panic!("{} failed:\n{}", path.display(), err);
        }
        assert_eq!(output, expected, "output of {}", path.display());
        checked += 1;
    }

    assert!(checked >= 5, "only {} fixture programs found", checked);
}
