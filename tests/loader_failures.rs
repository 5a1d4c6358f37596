// tests/loader_failures.rs

mod common;
use crate::common::builders::{SourceTreeBuilder, counting_loader, linux_config};
use crate::common::{init_tracing, linux, load_root, messages, with_timeout};

use std::path::{Path, PathBuf};

use caravan::errors::{CaravanError, LoadFailure};
use caravan::package::LoadState;
use caravan::source::ScanError;

#[tokio::test]
async fn missing_root_is_a_structural_failure() {
    init_tracing();
    let fs = SourceTreeBuilder::new().package("foo", &[]).build();
    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;

    let ctx = loader.new_context(linux()).unwrap();
    let keys = loader
        .load_directory(ctx, Path::new("/nope"))
        .await
        .unwrap();
    assert_eq!(keys.len(), 1);
    with_timeout(loader.wait(ctx)).await.unwrap();

    let failures = loader.failures(ctx).unwrap();
    assert_eq!(failures.len(), 1);
    let (dir, failure) = &failures[0];
    assert_eq!(dir, &PathBuf::from("/nope"));
    assert!(matches!(
        failure,
        LoadFailure::Structural(ScanError::NotADirectory(_))
    ));

    let pkg = loader.package(ctx, Path::new("/nope")).unwrap().unwrap();
    assert!(pkg.is_terminal());
    assert_eq!(pkg.state(), LoadState::Queued);
    loader.shutdown();
}

#[tokio::test]
async fn failed_dependency_becomes_a_diagnostic_of_its_importer() {
    init_tracing();
    // `empty` exists, so the import resolves, but holds no source files.
    let fs = SourceTreeBuilder::new()
        .package("foo", &["empty"])
        .file("empty/README", "nothing here\n")
        .build();
    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = load_root(loader, linux()).await;

    let failures = loader.failures(ctx).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, PathBuf::from("/ws/empty"));
    assert!(matches!(
        failures[0].1,
        LoadFailure::Structural(ScanError::NoSourceFiles(_))
    ));

    let foo = loader.package(ctx, Path::new("/ws/foo")).unwrap().unwrap();
    assert_eq!(foo.state(), LoadState::Done);
    let msgs = messages(loader, ctx);
    assert_eq!(msgs.len(), 1, "{msgs:?}");
    assert!(msgs[0].starts_with("foo.go: dependency empty failed"));

    // Adding a source file and invalidating it recovers both packages.
    fs.add_file("/ws/empty/empty.go", "package empty\n");
    let reset = loader
        .invalidate(Path::new("/ws/empty/empty.go"))
        .await
        .unwrap();
    assert_eq!(reset.len(), 2);
    with_timeout(loader.wait(ctx)).await.unwrap();

    assert!(loader.failures(ctx).unwrap().is_empty());
    assert!(messages(loader, ctx).is_empty());
    assert_eq!(harness.scanner.scans("/ws/empty"), 2);
    loader.shutdown();
}

#[tokio::test]
async fn import_cycle_fails_one_package_and_settles() {
    init_tracing();
    let fs = SourceTreeBuilder::new()
        .package("a", &["b"])
        .package("b", &["a"])
        .build();
    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = load_root(loader, linux()).await;

    let failures = loader.failures(ctx).unwrap();
    assert_eq!(failures.len(), 1, "{failures:?}");
    let LoadFailure::Cycle { path } = &failures[0].1 else {
        panic!("expected a cycle failure, got {:?}", failures[0].1);
    };
    assert!(path.contains(&PathBuf::from("/ws/a")));
    assert!(path.contains(&PathBuf::from("/ws/b")));
    assert_eq!(path.first(), path.last());

    // Only one strong edge made it into the graph.
    assert_eq!(loader.caravan().strong_edge_count(), 1);

    let msgs = messages(loader, ctx);
    assert_eq!(msgs.len(), 1, "{msgs:?}");
    assert!(msgs[0].contains("failed: internal resolution produced an import cycle"));
    loader.shutdown();
}

#[tokio::test]
async fn malformed_build_constraint_is_reported() {
    init_tracing();
    let fs = SourceTreeBuilder::new()
        .file("odd/odd.go", "//go:build linux &&\n\npackage odd\n")
        .build();
    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = load_root(loader, linux()).await;

    assert!(loader.failures(ctx).unwrap().is_empty());
    let pkg = loader.package(ctx, Path::new("/ws/odd")).unwrap().unwrap();
    assert!(pkg.has_errors());
    assert_eq!(pkg.diagnostics()[Path::new("/ws/odd/odd.go")][0].line, 1);
    loader.shutdown();
}

#[tokio::test]
async fn deeply_nested_build_constraint_is_a_diagnostic() {
    init_tracing();
    let deep = format!("//go:build {}linux\n\npackage deep\n", "!".repeat(200_000));
    let fs = SourceTreeBuilder::new()
        .file("deep/deep.go", &deep)
        .package("fine", &[])
        .build();
    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = load_root(loader, linux()).await;

    assert!(loader.failures(ctx).unwrap().is_empty());
    let deep_pkg = loader.package(ctx, Path::new("/ws/deep")).unwrap().unwrap();
    assert!(deep_pkg.has_errors());
    let diags = &deep_pkg.diagnostics()[Path::new("/ws/deep/deep.go")];
    assert!(diags[0].message.contains("nested deeper"));

    let fine = loader.package(ctx, Path::new("/ws/fine")).unwrap().unwrap();
    assert_eq!(fine.state(), LoadState::Done);
    loader.shutdown();
}

#[tokio::test]
async fn shutdown_rejects_new_work() {
    init_tracing();
    let fs = SourceTreeBuilder::new().package("foo", &[]).build();
    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = loader.new_context(linux()).unwrap();

    loader.shutdown();
    loader.shutdown();
    assert!(loader.is_shut_down());
    assert!(matches!(
        loader.load_directory(ctx, Path::new("/ws")).await,
        Err(CaravanError::ShutDown)
    ));
    assert!(matches!(
        loader.invalidate(Path::new("/ws/foo")).await,
        Err(CaravanError::ShutDown)
    ));
}
