//! Runner behavior against a recording engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use libroll_bundler::{
    BundleReport, BundlerEngine, Error, Execution, ExecutionContext, Executor, FormatConfig,
    ProjectGraph, Result, TypeValidator, ValidationRequest, WatchEvent, WatchHandle,
};
use libroll_config::{CompilerKind, Format, RawBuildOptions};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

#[derive(Default)]
struct RecordingEngine {
    fail: Vec<Format>,
    calls: Mutex<Vec<Format>>,
    files: Mutex<Vec<PathBuf>>,
    watched: Mutex<Vec<Format>>,
    sender: Mutex<Option<mpsc::Sender<WatchEvent>>>,
    closes: Arc<AtomicUsize>,
}

impl RecordingEngine {
    fn failing(formats: &[Format]) -> Self {
        Self {
            fail: formats.to_vec(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Format> {
        self.calls.lock().clone()
    }

    fn files(&self) -> Vec<PathBuf> {
        self.files.lock().clone()
    }

    fn sender(&self) -> mpsc::Sender<WatchEvent> {
        self.sender.lock().clone().expect("watch not started")
    }
}

#[async_trait]
impl BundlerEngine for RecordingEngine {
    async fn bundle(&self, config: &FormatConfig) -> Result<BundleReport> {
        self.calls.lock().push(config.format);
        if self.fail.contains(&config.format) {
            return Err(Error::Validation(format!("{} exploded", config.format)));
        }
        // one chunk per named input, like `[name].<ext>` entry file names
        let files: Vec<PathBuf> = config
            .input
            .keys()
            .map(|name| config.dir.join(format!("{}.{}", name, config.format.extension())))
            .collect();
        self.files.lock().extend(files.iter().cloned());
        Ok(BundleReport {
            format: config.format,
            files,
        })
    }

    async fn watch(&self, configs: Vec<FormatConfig>) -> Result<WatchHandle> {
        *self.watched.lock() = configs.iter().map(|c| c.format).collect();
        let (tx, rx) = mpsc::channel(8);
        *self.sender.lock() = Some(tx);
        let closes = Arc::clone(&self.closes);
        Ok(WatchHandle::new(rx, move || {
            closes.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

struct RejectingValidator {
    calls: AtomicUsize,
}

#[async_trait]
impl TypeValidator for RejectingValidator {
    async fn validate(&self, _request: &ValidationRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Validation("TS2322: Type 'string' is not assignable".into()))
    }
}

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let lib = temp.path().join("libs/ui");
    fs::create_dir_all(lib.join("src/widgets")).unwrap();
    fs::write(
        lib.join("package.json"),
        r#"{ "name": "@acme/ui", "version": "1.2.0" }"#,
    )
    .unwrap();
    fs::write(lib.join("tsconfig.lib.json"), "{}").unwrap();
    fs::write(lib.join("src/index.ts"), "export * from './widgets/button';\n").unwrap();
    fs::write(lib.join("src/widgets/button.ts"), "export const button = 1;\n").unwrap();
    temp
}

fn graph() -> Arc<ProjectGraph> {
    let graph: ProjectGraph = serde_json::from_value(json!({
        "nodes": {
            "ui": {
                "name": "ui",
                "type": "lib",
                "data": { "root": "libs/ui", "sourceRoot": "libs/ui/src" }
            }
        },
        "dependencies": { "ui": [] }
    }))
    .unwrap();
    Arc::new(graph)
}

fn raw() -> RawBuildOptions {
    RawBuildOptions {
        project: "libs/ui/package.json".into(),
        main: "libs/ui/src/index.ts".into(),
        output_path: "dist/libs/ui".into(),
        ts_config: "libs/ui/tsconfig.lib.json".into(),
        format: vec![Format::Esm, Format::Cjs],
        compiler: CompilerKind::Tsc,
        generate_exports_field: true,
        ..Default::default()
    }
}

fn manifest_path(ws: &Path) -> PathBuf {
    ws.join("dist/libs/ui/package.json")
}

fn read_manifest(ws: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(manifest_path(ws)).unwrap()).unwrap()
}

#[tokio::test]
async fn test_batch_success_writes_manifest_once() {
    let ws = workspace();
    let engine = Arc::new(RecordingEngine::default());
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());

    let execution = Executor::new(engine.clone()).run(raw(), &ctx).await.unwrap();
    let Execution::Batch(outcome) = execution else {
        panic!("expected a batch run");
    };

    assert!(outcome.success);
    assert_eq!(engine.calls(), vec![Format::Esm, Format::Cjs]);

    let manifest = read_manifest(ws.path());
    assert_eq!(manifest["type"], "module");
    assert_eq!(manifest["main"], "./src/index.cjs");
    assert_eq!(manifest["module"], "./src/index.js");
    assert_eq!(manifest["types"], "./src/index.d.ts");
    assert_eq!(
        manifest["exports"]["./widgets/button"],
        json!({
            "types": "./src/widgets/button.d.ts",
            "import": "./src/widgets/button.js",
            "require": "./src/widgets/button.cjs"
        })
    );
}

#[tokio::test]
async fn test_output_file_name_exports_point_at_written_files() {
    let ws = workspace();
    let engine = Arc::new(RecordingEngine::default());
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());
    let options = RawBuildOptions {
        output_file_name: Some("bundle.js".into()),
        ..raw()
    };

    let execution = Executor::new(engine.clone()).run(options, &ctx).await.unwrap();
    assert!(matches!(execution, Execution::Batch(outcome) if outcome.success));

    let manifest = read_manifest(ws.path());
    let root = &manifest["exports"]["."];
    assert_eq!(root["import"], "./src/bundle.js");
    assert_eq!(root["require"], "./src/bundle.cjs");
    assert_eq!(manifest["main"], "./src/bundle.cjs");

    let out_dir = ws.path().join("dist/libs/ui");
    let files = engine.files();
    for condition in ["import", "require"] {
        let target = root[condition].as_str().unwrap().trim_start_matches("./");
        assert!(files.contains(&out_dir.join(target)), "{target} was not written");
    }
    assert!(!files.contains(&out_dir.join("src/index.js")));
    assert!(manifest["exports"].get("./index").is_none());
}

#[tokio::test]
async fn test_batch_fail_soft_fail_hard() {
    let ws = workspace();
    let engine = Arc::new(RecordingEngine::failing(&[Format::Esm]));
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());

    let execution = Executor::new(engine.clone()).run(raw(), &ctx).await.unwrap();
    let Execution::Batch(outcome) = execution else {
        panic!("expected a batch run");
    };

    assert!(!outcome.success);
    // the second format still ran
    assert_eq!(engine.calls(), vec![Format::Esm, Format::Cjs]);
    assert!(!manifest_path(ws.path()).exists());
}

#[tokio::test]
async fn test_batch_deletes_output_first() {
    let ws = workspace();
    let stale = ws.path().join("dist/libs/ui/stale.js");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "old").unwrap();

    let engine = Arc::new(RecordingEngine::default());
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());
    Executor::new(engine).run(raw(), &ctx).await.unwrap();

    assert!(!stale.exists());
    assert!(manifest_path(ws.path()).exists());
}

#[tokio::test]
async fn test_batch_keeps_output_when_disabled() {
    let ws = workspace();
    let stale = ws.path().join("dist/libs/ui/stale.js");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "old").unwrap();

    let engine = Arc::new(RecordingEngine::default());
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());
    let options = RawBuildOptions {
        delete_output_path: false,
        ..raw()
    };
    Executor::new(engine).run(options, &ctx).await.unwrap();

    assert!(stale.exists());
}

#[tokio::test]
async fn test_unknown_override_is_a_configuration_error() {
    let ws = workspace();
    let engine = Arc::new(RecordingEngine::default());
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());
    let options = RawBuildOptions {
        overrides: vec!["sourcemap".into(), "does-not-exist".into()],
        ..raw()
    };

    let err = Executor::new(engine.clone())
        .run(options, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownOverride(name) if name == "does-not-exist"));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_project() {
    let ws = workspace();
    let ctx = ExecutionContext::new(ws.path(), "missing", graph());
    let err = Executor::new(Arc::new(RecordingEngine::default()))
        .run(raw(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownProject(_)));
}

#[tokio::test]
async fn test_swc_validation_failure_aborts_before_bundling() {
    let ws = workspace();
    let engine = Arc::new(RecordingEngine::default());
    let validator = Arc::new(RejectingValidator {
        calls: AtomicUsize::new(0),
    });
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());
    let options = RawBuildOptions {
        compiler: CompilerKind::Swc,
        ..raw()
    };

    let execution = Executor::new(engine.clone())
        .with_validator(validator.clone())
        .run(options, &ctx)
        .await
        .unwrap();

    assert!(matches!(execution, Execution::Batch(outcome) if !outcome.success));
    assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_watch_cycle_events() {
    let ws = workspace();
    let engine = Arc::new(RecordingEngine::default());
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());
    let options = RawBuildOptions {
        watch: true,
        ..raw()
    };

    let execution = Executor::new(engine.clone()).run(options, &ctx).await.unwrap();
    let Execution::Watch(mut stream) = execution else {
        panic!("expected a watch run");
    };
    assert_eq!(*engine.watched.lock(), vec![Format::Esm, Format::Cjs]);

    let tx = engine.sender();
    tx.send(WatchEvent::Start).await.unwrap();
    tx.send(WatchEvent::End).await.unwrap();
    assert_eq!(stream.next().await.map(|o| o.success), Some(true));
    assert_eq!(read_manifest(ws.path())["module"], "./src/index.js");

    tx.send(WatchEvent::Start).await.unwrap();
    tx.send(WatchEvent::Error(Error::Validation("bad".into())))
        .await
        .unwrap();
    assert_eq!(stream.next().await.map(|o| o.success), Some(false));

    // the loop survives a failed cycle
    tx.send(WatchEvent::End).await.unwrap();
    assert_eq!(stream.next().await.map(|o| o.success), Some(true));

    drop(stream);
    assert_eq!(engine.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_watch_manifest_failure_emits_failure() {
    let ws = workspace();
    // a file where the output directory should be
    let output = ws.path().join("dist/libs/ui");
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    fs::write(&output, "not a directory").unwrap();

    let engine = Arc::new(RecordingEngine::default());
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());
    let options = RawBuildOptions {
        watch: true,
        ..raw()
    };

    let execution = Executor::new(engine.clone()).run(options, &ctx).await.unwrap();
    let Execution::Watch(mut stream) = execution else {
        panic!("expected a watch run");
    };

    engine.sender().send(WatchEvent::End).await.unwrap();
    assert_eq!(stream.next().await.map(|o| o.success), Some(false));
    assert!(!stream.is_closed());
}

#[tokio::test]
async fn test_watch_teardown_closes_once() {
    let ws = workspace();
    let engine = Arc::new(RecordingEngine::default());
    let ctx = ExecutionContext::new(ws.path(), "ui", graph());
    let options = RawBuildOptions {
        watch: true,
        ..raw()
    };

    let execution = Executor::new(engine.clone()).run(options, &ctx).await.unwrap();
    let Execution::Watch(mut stream) = execution else {
        panic!("expected a watch run");
    };

    // no cycle in flight
    stream.close();
    stream.close();
    assert!(stream.is_closed());
    assert!(stream.next().await.is_none());
    drop(stream);

    assert_eq!(engine.closes.load(Ordering::SeqCst), 1);
    assert!(engine.sender().is_closed());
}
