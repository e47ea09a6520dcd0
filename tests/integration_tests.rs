//! Integration tests for the refactor-js crate.

use pretty_assertions::assert_eq;
use refactor_js::prelude::*;
use refactor_js::scope::{ReferenceIndex, SearchEngine, TokenMonitor};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn run(ctx: &RefactoringContext, op: &mut dyn RefactoringOperation) -> RefactoringResult {
    RefactoringRunner::new().run(op, ctx).unwrap()
}

fn apply(path: &str, src: &str, selected: &str, op: &mut dyn RefactoringOperation) -> String {
    let ctx = RefactoringContext::for_source(path, src).unwrap().select(selected);
    let change = run(&ctx, op).into_change().unwrap();
    change.new_source(Path::new(path)).unwrap().to_string()
}

fn create_project(dir: &Path) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::create_dir_all(dir.join("node_modules/lib")).unwrap();
    fs::write(
        dir.join("src/point.js"),
        "class Point {\n    constructor(x, y) {\n        this.x = x;\n        this.y = y;\n    }\n}\n",
    )
    .unwrap();
    fs::write(dir.join("src/main.js"), "const origin = new Point(0, 0);\nconst unit = new Point(1, 1);\n").unwrap();
    fs::write(dir.join("node_modules/lib/index.js"), "new Point(5, 5);\n").unwrap();
}

#[test]
fn test_scenario_extract_expression() {
    let src = "function f() {\n    var a = 1, b = 2;\n    return a + b;\n}\n";
    assert_eq!(
        apply("a.js", src, "a + b", &mut ExtractMethod::new("sum")),
        "function f() {\n    var a = 1, b = 2;\n    return sum(a, b);\n}\n\nfunction sum(a, b) {\n    return a + b;\n}\n"
    );
}

#[test]
fn test_scenario_inline_discarded_call() {
    let src = "function g(x, y) {\n    return x + y;\n}\nfunction f() {\n    g(1, 2);\n}\n";
    let ctx = RefactoringContext::for_source("b.js", src).unwrap().select_nth("g", 1);
    let change = run(&ctx, &mut InlineMethod::new()).into_change().unwrap();
    assert_eq!(change.new_source(Path::new("b.js")).unwrap(), "function f() {\n}\n");
}

#[test]
fn test_scenario_extract_constant() {
    assert_eq!(
        apply("c.js", "var c = 1 + 2;\n", "1 + 2", &mut ExtractConstant::new("C")),
        "const C = 1 + 2;\nvar c = C;\n"
    );

    let src = "var c = 1 + 2;\nvar d = 1 + 2;\n";
    let out = apply("c.js", src, "1 + 2", &mut ExtractConstant::new("C").replace_all(true));
    assert_eq!(out, "const C = 1 + 2;\nvar c = C;\nvar d = C;\n");
}

#[test]
fn test_extract_then_inline_restores_source() {
    let src = "function f() {\n    var a = 1, b = 2;\n    return a + b;\n}\n";
    let extracted = apply("r.js", src, "a + b", &mut ExtractMethod::new("sum"));
    let restored = apply("r.js", &extracted, "sum(a, b)", &mut InlineMethod::new());
    assert_eq!(restored, src);
}

#[test]
fn test_ambiguous_return_value_is_refused() {
    let src = "function f() {\n    let a = 0, b = 0;\n    a = 1;\n    b = 2;\n    log(a, b);\n}\n";
    let ctx = RefactoringContext::for_source("amb.js", src).unwrap().select("a = 1;\n    b = 2;");
    let result = run(&ctx, &mut ExtractMethod::new("g"));
    assert_eq!(result.state, RefactoringState::Failed);
    assert!(result.change.is_none());
    assert!(result.into_change().is_err());
}

#[test]
fn test_single_use_argument_is_substituted() {
    let src = "function twice(n) {\n    return n * 2;\n}\nlog(twice(size + 1));\n";
    assert_eq!(
        apply("s.js", src, "twice(size + 1)", &mut InlineMethod::new()),
        "log((size + 1) * 2);\n"
    );
}

#[test]
fn test_duplicates_follow_the_extraction() {
    let src = "function f(a) {\n    log(a * 2);\n}\n\nfunction g(b) {\n    log(b * 2);\n}\n";
    let out = apply("d.js", src, "a * 2", &mut ExtractMethod::new("double").replace_duplicates(true));
    assert!(out.contains("log(double(a));"));
    assert!(out.contains("log(double(b));"));
}

#[test]
fn test_canceled_token_stops_the_run() {
    let src = "function f(n) {\n    return n * 1.2;\n}\nf(1);\n";
    let ctx = RefactoringContext::for_source("x.js", src).unwrap().select("1.2");
    ctx.token.cancel();
    let mut runner = RefactoringRunner::new();
    let result = runner.run(&mut IntroduceParameter::new("rate"), &ctx);
    assert!(matches!(result, Err(RefactorError::Canceled)));
    assert_eq!(runner.state(), RefactoringState::Failed);
}

#[test]
fn test_monitor_cancels_reference_search() {
    let mut workspace = Workspace::new();
    workspace.add_source("a.js", "function f() {}\n").unwrap();
    workspace.add_source("b.js", "f();\n").unwrap();
    workspace.add_source("c.js", "f();\n").unwrap();

    let mut monitor = TokenMonitor::new(CancellationToken::new());
    monitor.cancel_after = Some(1);
    let key = SymbolKey::Function { name: "f".to_string() };
    let result = ReferenceIndex::new(workspace.units()).find_references(&key, &mut monitor);
    assert!(matches!(result, Err(RefactorError::Canceled)));
}

#[test]
fn test_workspace_on_disk() {
    let dir = TempDir::new().unwrap();
    create_project(dir.path());

    let config = RefactorConfig::default();
    let workspace = Workspace::load(dir.path(), &config).unwrap();
    assert_eq!(workspace.units().len(), 2);

    let ctx = RefactoringContext::new(workspace, "src/point.js")
        .with_config(config)
        .select("constructor");
    let result = run(&ctx, &mut IntroduceFactory::new());
    assert!(result.is_success());
    let change = result.into_change().unwrap();
    assert_eq!(change.files_modified(), 2);
    assert!(change.diff().contains("+const origin = Point.createPoint(0, 0);"));

    change.write().unwrap();
    let main = fs::read_to_string(dir.path().join("src/main.js")).unwrap();
    assert_eq!(main, "const origin = Point.createPoint(0, 0);\nconst unit = Point.createPoint(1, 1);\n");
    let point = fs::read_to_string(dir.path().join("src/point.js")).unwrap();
    assert!(point.contains("    static createPoint(x, y) {\n        return new Point(x, y);\n    }\n"));
    let excluded = fs::read_to_string(dir.path().join("node_modules/lib/index.js")).unwrap();
    assert_eq!(excluded, "new Point(5, 5);\n");
}

#[test]
fn test_config_round_trips_through_yaml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("refactor.yaml");
    let config = RefactorConfig {
        indent: "  ".to_string(),
        ..RefactorConfig::default()
    };
    config.to_yaml(&path).unwrap();
    assert_eq!(RefactorConfig::load(&path).unwrap(), config);

    let src = "function f() {\n  var a = 1, b = 2;\n  return a + b;\n}\n";
    let ctx = RefactoringContext::for_source("i.js", src)
        .unwrap()
        .with_config(RefactorConfig::load(&path).unwrap())
        .select("a + b");
    let change = run(&ctx, &mut ExtractMethod::new("sum")).into_change().unwrap();
    assert!(change.new_source(Path::new("i.js")).unwrap().ends_with("function sum(a, b) {\n  return a + b;\n}\n"));
}
