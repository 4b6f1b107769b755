//! Pipeline composition over a workspace on disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use libroll_bundler::pipeline::TranspileOptions;
use libroll_bundler::{
    ExternalPredicate, ExternalSet, OverrideRegistry, PipelineContext, Stage, compose,
};
use libroll_config::{BuildConfiguration, CompilerKind, Format, RawBuildOptions, normalize};
use tempfile::TempDir;

fn workspace(tsconfig: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let lib = temp.path().join("libs/ui");
    fs::create_dir_all(lib.join("src/widgets")).unwrap();
    fs::write(lib.join("package.json"), r#"{ "name": "@acme/ui" }"#).unwrap();
    fs::write(lib.join("tsconfig.lib.json"), tsconfig).unwrap();
    fs::write(lib.join("src/index.ts"), "export {};\n").unwrap();
    fs::write(lib.join("src/widgets/button.tsx"), "export {};\n").unwrap();
    fs::write(lib.join("src/widgets/button.spec.ts"), "test();\n").unwrap();
    fs::write(lib.join("src/types.d.ts"), "declare const x: 1;\n").unwrap();
    temp
}

fn configure(ws: &Path, compiler: CompilerKind, formats: &[Format]) -> BuildConfiguration {
    let raw = RawBuildOptions {
        project: "libs/ui/package.json".into(),
        main: "libs/ui/src/index.ts".into(),
        output_path: "dist/libs/ui".into(),
        ts_config: "libs/ui/tsconfig.lib.json".into(),
        format: formats.to_vec(),
        compiler,
        ..Default::default()
    };
    normalize(&raw, ws, Some(Path::new("libs/ui/src"))).unwrap()
}

fn predicate() -> ExternalPredicate {
    let shared: ExternalSet = ["react", "@acme/core"].into_iter().collect();
    let npm: ExternalSet = ["tslib"].into_iter().collect();
    ExternalPredicate::new(Arc::new(shared), Arc::new(npm))
}

fn context<'a>(
    config: &'a BuildConfiguration,
    overrides: &'a OverrideRegistry,
) -> PipelineContext<'a> {
    PipelineContext {
        config,
        project_name: "ui-kit",
        external: predicate(),
        peer_dependencies: vec!["react-dom".into()],
        dependencies: &[],
        overrides,
    }
}

#[test]
fn test_babel_stage_order() {
    let ws = workspace("{}");
    let config = configure(ws.path(), CompilerKind::Babel, &[Format::Esm, Format::Cjs]);
    let overrides = OverrideRegistry::new();
    let pipeline = compose(&context(&config, &overrides)).unwrap();

    assert_eq!(pipeline.formats.len(), 2);
    assert_eq!(
        pipeline.formats[0].stage_names(),
        vec![
            "copy",
            "image",
            "json",
            "typescript",
            "peer-deps-external",
            "postcss",
            "node-resolve",
            "babel",
            "commonjs",
            "analyze",
        ]
    );

    let async_flag = |index: usize| match pipeline.formats[index].stage("babel") {
        Some(Stage::Transpile(TranspileOptions {
            async_to_promises, ..
        })) => *async_to_promises,
        other => panic!("expected a transpile stage, got {other:?}"),
    };
    assert!(!async_flag(0));
    assert!(async_flag(1));
}

#[test]
fn test_compiler_strategies_are_exclusive() {
    let ws = workspace("{}");
    let overrides = OverrideRegistry::new();

    let swc = configure(ws.path(), CompilerKind::Swc, &[Format::Esm]);
    let names = compose(&context(&swc, &overrides)).unwrap().formats[0].stage_names();
    assert!(names.contains(&"swc"));
    assert!(!names.contains(&"typescript"));
    assert!(!names.contains(&"babel"));

    let tsc = configure(ws.path(), CompilerKind::Tsc, &[Format::Esm]);
    let names = compose(&context(&tsc, &overrides)).unwrap().formats[0].stage_names();
    assert!(names.contains(&"typescript"));
    assert!(!names.contains(&"swc"));
    assert!(!names.contains(&"babel"));
}

#[test]
fn test_output_descriptor_per_format() {
    let ws = workspace("{}");
    let config = configure(ws.path(), CompilerKind::Tsc, &[Format::Esm, Format::Umd]);
    let overrides = OverrideRegistry::new();
    let pipeline = compose(&context(&config, &overrides)).unwrap();

    let esm = &pipeline.formats[0];
    let umd = &pipeline.formats[1];
    assert_eq!(esm.entry_file_names, "[name].js");
    assert_eq!(umd.entry_file_names, "[name].cjs");
    assert_eq!(umd.chunk_file_names, "[name].cjs");
    assert_eq!(umd.name, "UiKit");
    assert_eq!(esm.dir, ws.path().join("dist/libs/ui"));

    assert!(esm.external.shares_set_with(&umd.external));
    assert!(esm.external.is_external("react/jsx-runtime"));
    assert!(esm.external.is_external("tslib"));
    assert!(!esm.external.is_external("reactive"));
}

#[test]
fn test_discovered_entries_become_inputs() {
    let ws = workspace("{}");
    let config = configure(ws.path(), CompilerKind::Tsc, &[Format::Esm, Format::Cjs]);
    let overrides = OverrideRegistry::new();
    let pipeline = compose(&context(&config, &overrides)).unwrap();

    let keys: Vec<&str> = pipeline.entries.keys().collect();
    assert_eq!(keys, vec!["index", "widgets/button"]);

    for format in &pipeline.formats {
        let names: Vec<&str> = format.input.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["src/index", "src/widgets/button"]);
    }
}

#[test]
fn test_overrides_apply_in_order() {
    let ws = workspace("{}");
    let mut config = configure(ws.path(), CompilerKind::Tsc, &[Format::Esm]);
    config.overrides = vec!["sourcemap".into(), "rename".into(), "suffix".into()];

    let mut overrides = OverrideRegistry::new();
    overrides.register("rename", |mut format, _| {
        format.name = "Renamed".into();
        format
    });
    overrides.register("suffix", |mut format, build| {
        format.name = format!("{}{}", format.name, build.formats.len());
        format
    });

    let pipeline = compose(&context(&config, &overrides)).unwrap();
    let esm = &pipeline.formats[0];
    assert!(esm.sourcemap);
    assert!(!esm.minify);
    assert_eq!(esm.name, "Renamed1");
}

#[test]
fn test_commonjs_tsconfig_forces_esnext_declarations() {
    let ws = workspace(r#"{ "compilerOptions": { "module": "commonjs" } }"#);
    let config = configure(ws.path(), CompilerKind::Tsc, &[Format::Esm]);
    let overrides = OverrideRegistry::new();
    let pipeline = compose(&context(&config, &overrides)).unwrap();

    match pipeline.formats[0].stage("typescript") {
        Some(Stage::TypeCheck(check)) => {
            assert_eq!(check.compiler_options.module.as_deref(), Some("ESNext"));
            assert_eq!(check.compiler_options.root_dir, ws.path().join("libs/ui"));
            assert!(check.compiler_options.declaration);
            assert!(!check.compiler_options.allow_js);
        }
        other => panic!("expected a type check stage, got {other:?}"),
    }
}

#[test]
fn test_peer_dependencies_in_stage() {
    let ws = workspace("{}");
    let config = configure(ws.path(), CompilerKind::Tsc, &[Format::Esm]);
    let overrides = OverrideRegistry::new();
    let pipeline = compose(&context(&config, &overrides)).unwrap();

    match pipeline.formats[0].stage("peer-deps-external") {
        Some(Stage::PeerDepsExternal { peers, manifest }) => {
            assert_eq!(peers, &vec!["react-dom".to_string()]);
            assert_eq!(manifest, &ws.path().join("libs/ui/package.json"));
        }
        other => panic!("expected a peer externals stage, got {other:?}"),
    }
}
