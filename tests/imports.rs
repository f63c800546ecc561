mod common;

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ipl_lang::{ErrorKind, Interpreter, InterpreterOptions, Value};

fn write(dir: &Path, name: &str, source: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create module directory");
    }
    fs::write(path, source).expect("write module");
}

fn workspace() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

#[test]
fn imported_functions_and_globals_are_merged() {
    let dir = workspace();
    write(
        dir.path(),
        "math.ipl",
        "pi = 3\ndef triple(n)\n    return n * 3\n",
    );
    write(dir.path(), "main.ipl", "import math\nx = triple(pi)\n");

    let (result, _) = common::run_file(&dir.path().join("main.ipl"));
    let module = result.expect("main runs");
    assert_eq!(module.get("x"), Some(Value::Number(9.0)));
    assert_eq!(module.get("pi"), Some(Value::Number(3.0)));
    assert_eq!(module.function_names(), vec!["triple".to_string()]);
}

#[test]
fn imported_function_runs_in_defining_module() {
    let dir = workspace();
    write(
        dir.path(),
        "lib.ipl",
        "def helper(n)\n    return n + 100\ndef api(n)\n    return helper(n)\n",
    );
    // The importer's own `helper` must not capture calls made inside lib.
    write(
        dir.path(),
        "main.ipl",
        "import lib\ndef helper(n)\n    return 0\nx = api(1)\ny = helper(1)\n",
    );

    let (result, _) = common::run_file(&dir.path().join("main.ipl"));
    let module = result.expect("main runs");
    assert_eq!(module.get("x"), Some(Value::Number(101.0)));
    assert_eq!(module.get("y"), Some(Value::Number(0.0)));
}

#[test]
fn later_local_definition_wins_over_import() {
    let dir = workspace();
    write(dir.path(), "lib.ipl", "def greet()\n    return 1\n");
    write(
        dir.path(),
        "main.ipl",
        "import lib\na = greet()\ndef greet()\n    return 2\nb = greet()\n",
    );

    let (result, _) = common::run_file(&dir.path().join("main.ipl"));
    let module = result.expect("main runs");
    assert_eq!(module.get("a"), Some(Value::Number(1.0)));
    assert_eq!(module.get("b"), Some(Value::Number(2.0)));
}

#[test]
fn nested_imports_route_through_the_chain() {
    let dir = workspace();
    write(dir.path(), "pkg/base.ipl", "def base(n)\n    return n * 2\n");
    write(
        dir.path(),
        "pkg/mid.ipl",
        "import base\ndef mid(n)\n    return base(n) + 1\n",
    );
    write(
        dir.path(),
        "main.ipl",
        "import pkg/mid\na = mid(5)\nb = base(5)\n",
    );

    let (result, _) = common::run_file(&dir.path().join("main.ipl"));
    let module = result.expect("main runs");
    assert_eq!(module.get("a"), Some(Value::Number(11.0)));
    assert_eq!(module.get("b"), Some(Value::Number(10.0)));
}

#[test]
fn module_side_effects_run_once_per_import() {
    let dir = workspace();
    write(dir.path(), "noisy.ipl", "out(\"loaded\")\n");
    write(
        dir.path(),
        "main.ipl",
        "out(\"start\")\nimport noisy\nimport \"noisy.ipl\"\nout(\"end\")\n",
    );

    let (result, output) = common::run_file(&dir.path().join("main.ipl"));
    result.expect("main runs");
    assert_eq!(output, "start\nloaded\nloaded\nend\n");
}

#[test]
fn search_paths_are_consulted_after_local_directory() {
    let libs = workspace();
    let dir = workspace();
    write(libs.path(), "shared.ipl", "def answer()\n    return 42\n");
    write(dir.path(), "main.ipl", "import shared\nx = answer()\n");

    let interpreter = Interpreter::with_options(InterpreterOptions {
        search_paths: vec![libs.path().to_path_buf()],
        ..InterpreterOptions::default()
    })
    .with_output(std::io::sink());
    let module = interpreter
        .run_file(&dir.path().join("main.ipl"))
        .expect("main runs");
    assert_eq!(module.get("x"), Some(Value::Number(42.0)));
}

#[test]
fn missing_module_is_reported_at_import_line() {
    let dir = workspace();
    write(dir.path(), "main.ipl", "x = 1\nimport nowhere\n");

    let (result, _) = common::run_file(&dir.path().join("main.ipl"));
    let err = result.expect_err("import fails");
    assert!(matches!(err.kind, ErrorKind::ModuleNotFound(ref name) if name == "nowhere"));
    let location = err.location.expect("location attached");
    assert_eq!(location.line, 2);
    assert_eq!(location.text, "import nowhere");
}

#[test]
fn import_cycle_is_detected() {
    let dir = workspace();
    write(dir.path(), "a.ipl", "import b\n");
    write(dir.path(), "b.ipl", "import a\n");

    let (result, _) = common::run_file(&dir.path().join("a.ipl"));
    let err = result.expect_err("cycle fails");
    assert!(matches!(err.kind, ErrorKind::ImportCycle(_)), "{:?}", err.kind);
}

#[test]
fn failing_module_aborts_importer_with_inner_location() {
    let dir = workspace();
    write(dir.path(), "broken.ipl", "ok = 1\nbad = missing + 1\n");
    write(
        dir.path(),
        "main.ipl",
        "out(\"before\")\nimport broken\nout(\"after\")\n",
    );

    let (result, output) = common::run_file(&dir.path().join("main.ipl"));
    let err = result.expect_err("import fails");
    assert!(matches!(err.kind, ErrorKind::UndefinedVariable(ref name) if name == "missing"));
    let location = err.location.expect("location attached");
    assert_eq!(location.file.file_name().and_then(|f| f.to_str()), Some("broken.ipl"));
    assert_eq!(location.line, 2);
    assert_eq!(output, "before\n");
}

#[test]
fn quit_inside_imported_module_ends_whole_run() {
    let dir = workspace();
    write(dir.path(), "stopper.ipl", "out(\"stopping\")\nquit()\nout(\"never\")\n");
    write(
        dir.path(),
        "main.ipl",
        "out(\"start\")\nimport stopper\nout(\"after\")\n",
    );

    let (result, output) = common::run_file(&dir.path().join("main.ipl"));
    result.expect("quit is a clean end");
    assert_eq!(output, "start\nstopping\n");
}
