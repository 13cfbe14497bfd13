//! Staleness, idempotence and publication behavior of `BuildOrchestrator`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use kiln_compiler::{
    AssetFamily, BackendKind, CompileError, CompilerBackend, CompilerDescriptor, CompilerError,
    replace_extension,
};
use kiln_core::{BuildError, BuildOrchestrator};
use pretty_assertions::assert_eq;
use tempfile::{TempDir, tempdir};

/// Wraps the source in a rule; fails on sources containing `fail`.
struct Wrap {
    descriptor: CompilerDescriptor,
}

impl Wrap {
    fn new() -> Self {
        Self {
            descriptor: CompilerDescriptor {
                kind: BackendKind::Scss,
                name: "wrap".to_string(),
                version: Some("1.0".to_string()),
                extension: "scss".to_string(),
                family: AssetFamily::Stylesheet,
            },
        }
    }
}

impl CompilerBackend for Wrap {
    fn descriptor(&self) -> &CompilerDescriptor {
        &self.descriptor
    }

    fn compile(&self, source: &Path) -> Result<String, CompilerError> {
        let text = fs::read_to_string(source)?;
        if let Some(index) = text.lines().position(|l| l.contains("fail")) {
            return Err(CompileError::new(source, "failure requested", Some(index + 1)).into());
        }
        Ok(format!(".wrapped {{ {} }}\n", text.trim()))
    }

    fn artifact_name(&self, source_name: &str) -> String {
        replace_extension(source_name, "css")
    }
}

struct Fixture {
    dir: TempDir,
    source: PathBuf,
    orchestrator: BuildOrchestrator,
}

fn fixture(contents: &str) -> Fixture {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src/button.scss");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, contents).unwrap();
    set_mtime(&source, SystemTime::now() - Duration::from_secs(60));

    let orchestrator = BuildOrchestrator::new(Arc::new(Wrap::new()), dir.path().join("build/css"));
    Fixture {
        dir,
        source,
        orchestrator,
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[test]
fn second_call_reuses_artifact() {
    let f = fixture("color: red;");

    let first = f.orchestrator.ensure_built(&f.source, false).unwrap();
    let second = f.orchestrator.ensure_built(&f.source, false).unwrap();

    assert_eq!(first, Some(f.dir.path().join("build/css/button.css")));
    assert_eq!(first, second);
    assert_eq!(f.orchestrator.compile_count(), 1);
}

#[test]
fn newer_source_is_rebuilt() {
    let f = fixture("color: red;");
    let artifact = f.orchestrator.ensure_built(&f.source, false).unwrap().unwrap();

    fs::write(&f.source, "color: blue;").unwrap();
    set_mtime(&f.source, SystemTime::now() + Duration::from_secs(60));
    f.orchestrator.ensure_built(&f.source, false).unwrap();

    assert_eq!(f.orchestrator.compile_count(), 2);
    assert!(fs::read_to_string(artifact).unwrap().contains("color: blue;"));
}

#[test]
fn older_source_is_not_rebuilt() {
    let f = fixture("color: red;");
    f.orchestrator.ensure_built(&f.source, false).unwrap();

    set_mtime(&f.source, SystemTime::now() - Duration::from_secs(3600));
    f.orchestrator.ensure_built(&f.source, false).unwrap();

    assert_eq!(f.orchestrator.compile_count(), 1);
}

#[test]
fn forced_build_always_compiles() {
    let f = fixture("color: red;");

    f.orchestrator.ensure_built(&f.source, false).unwrap();
    f.orchestrator.ensure_built(&f.source, true).unwrap();
    f.orchestrator.ensure_built(&f.source, true).unwrap();

    assert_eq!(f.orchestrator.compile_count(), 3);
}

#[test]
fn artifact_starts_with_banner() {
    let f = fixture("color: red;");

    let artifact = f.orchestrator.ensure_built(&f.source, false).unwrap().unwrap();
    let contents = fs::read_to_string(artifact).unwrap();
    let lines: Vec<&str> = contents.lines().collect();

    assert_eq!(lines[0], "/*");
    assert_eq!(lines[1], " * Compiled with wrap 1.0");
    assert!(lines[2].starts_with(" * Build date: "));
    assert!(lines[3].starts_with(" * Build time: "));
    assert!(lines[4].starts_with(" * Build duration: ") && lines[4].ends_with('s'));
    assert_eq!(lines[5], " */");
    assert_eq!(lines[6], ".wrapped { color: red; }");
}

#[test]
fn stray_temp_file_never_replaces_artifact() {
    let f = fixture("color: red;");
    let build_dir = f.dir.path().join("build/css");
    fs::create_dir_all(&build_dir).unwrap();
    // Left behind by a writer that died mid-write
    let stray = build_dir.join(".tmp-crashed");
    fs::write(&stray, "/* partial").unwrap();

    let artifact = f.orchestrator.ensure_built(&f.source, false).unwrap().unwrap();

    assert!(fs::read_to_string(&artifact).unwrap().ends_with(".wrapped { color: red; }\n"));
    assert_eq!(fs::read_to_string(&stray).unwrap(), "/* partial");
}

#[test]
fn concurrent_builds_publish_complete_artifacts() {
    let f = fixture("color: red;");
    let orchestrator = Arc::new(f.orchestrator);
    let source = Arc::new(f.source);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            let source = Arc::clone(&source);
            thread::spawn(move || orchestrator.ensure_built(&source, true).unwrap())
        })
        .collect();
    let paths: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let artifact = f.dir.path().join("build/css/button.css");
    assert!(paths.iter().all(|p| p.as_deref() == Some(artifact.as_path())));
    assert!(fs::read_to_string(&artifact).unwrap().ends_with(".wrapped { color: red; }\n"));

    let leftovers: Vec<_> = fs::read_dir(f.dir.path().join("build/css"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn compile_error_carries_line() {
    let f = fixture("color: red;\nfail here;\n");

    let err = f.orchestrator.ensure_built(&f.source, false).unwrap_err();

    let compile = err.as_compile_error().expect("compile error");
    assert_eq!(compile.line, Some(2));
    assert_eq!(compile.path, f.source);
    assert!(!f.dir.path().join("build/css/button.css").exists());
}

#[test]
fn unwritable_build_dir_yields_none() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("button.scss");
    fs::write(&source, "color: red;").unwrap();
    // A regular file where the build directory should be
    let blocker = dir.path().join("build");
    fs::write(&blocker, "").unwrap();

    let orchestrator = BuildOrchestrator::new(Arc::new(Wrap::new()), blocker.join("css"));
    let result = orchestrator.ensure_built(&source, false);

    assert!(matches!(result, Ok(None)));
    assert_eq!(orchestrator.compile_count(), 1);
}

#[test]
fn missing_source_is_not_an_error() {
    let f = fixture("color: red;");

    let result = f
        .orchestrator
        .ensure_built(&f.dir.path().join("src/nope.scss"), false);

    assert!(matches!(result, Ok(None)));
    assert_eq!(f.orchestrator.compile_count(), 0);
}

#[test]
fn build_error_from_backend_is_compiler_variant() {
    let f = fixture("fail");

    let err = f.orchestrator.ensure_built(&f.source, false).unwrap_err();

    assert!(matches!(err, BuildError::Compiler(CompilerError::Compile(_))));
}
