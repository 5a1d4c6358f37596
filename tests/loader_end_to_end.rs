// tests/loader_end_to_end.rs

mod common;
use crate::common::builders::{SourceTreeBuilder, counting_loader, linux_config};
use crate::common::{init_tracing, linux, load_root, messages};

use std::path::Path;

use caravan::package::LoadState;
use caravan::source::PackageSummary;

/// foo -> bar -> baz, every package a root directory of the tree.
fn chain_tree() -> SourceTreeBuilder {
    SourceTreeBuilder::new()
        .package("foo", &["bar"])
        .package("bar", &["baz"])
        .package("baz", &[])
}

#[tokio::test]
async fn chain_loads_every_package_once() {
    init_tracing();
    let tree = chain_tree();
    let foo = tree.path("foo");
    let bar = tree.path("bar");
    let baz = tree.path("baz");
    let fs = tree.build();

    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = load_root(loader, linux()).await;

    let caravan = loader.caravan();
    assert_eq!(caravan.len(), 3);
    assert_eq!(caravan.strong_edge_count(), 2);

    let pkgs = loader.packages(ctx).unwrap();
    assert_eq!(pkgs.len(), 3);
    for pkg in &pkgs {
        assert_eq!(pkg.state(), LoadState::Done, "{}", pkg.abs_path().display());
        assert!(pkg.failure().is_none());
    }

    for (dir, file) in [(&foo, "foo.go"), (&bar, "bar.go"), (&baz, "baz.go")] {
        assert_eq!(harness.scanner.scans(dir), 1, "{}", dir.display());
        assert_eq!(fs.reads(dir.join(file)), 1);
        assert_eq!(harness.analyzer.checks(dir, false), 1);
        // No test files, so the test pass is skipped.
        assert_eq!(harness.analyzer.checks(dir, true), 0);
    }

    let foo_pkg = loader.package(ctx, &foo).unwrap().unwrap();
    let bar_pkg = loader.package(ctx, &bar).unwrap().unwrap();
    assert_eq!(caravan.descendants(foo_pkg.key()), Some(vec![bar_pkg.key()]));
    assert!(caravan.is_root(foo_pkg.key()));
    assert!(!caravan.is_root(bar_pkg.key()));

    let info = foo_pkg.type_info().expect("type info");
    let summary = info.downcast_ref::<PackageSummary>().unwrap();
    assert_eq!(summary.name, "foo");
    assert_eq!(summary.imports, vec![bar.clone()]);

    assert!(messages(loader, ctx).is_empty());
    loader.shutdown();
}

#[tokio::test]
async fn test_imports_are_weak_edges() {
    init_tracing();
    // util's external test imports app, which imports util: a cycle only
    // over the weak edge, which is allowed.
    let fs = SourceTreeBuilder::new()
        .package("util", &[])
        .file(
            "util/util_test.go",
            "package util_test\n\nimport (\n\t\"util\"\n\t\"app\"\n)\n",
        )
        .package("app", &["util"])
        .build();

    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = load_root(loader, linux()).await;

    let caravan = loader.caravan();
    assert_eq!(caravan.strong_edge_count(), 1);
    assert_eq!(caravan.weak_edge_count(), 1);
    assert!(loader.failures(ctx).unwrap().is_empty());
    assert!(messages(loader, ctx).is_empty(), "{:?}", messages(loader, ctx));
    assert_eq!(harness.analyzer.checks("/ws/util", true), 1);
    loader.shutdown();
}

#[tokio::test]
async fn build_constraints_filter_files_per_environment() {
    init_tracing();
    let fs = SourceTreeBuilder::new()
        .package("sys", &[])
        .file("sys/sys_windows.go", "package sys\n\nimport \"missing/win\"\n")
        .file(
            "sys/sys_tagged.go",
            "//go:build linux && cgo\n\npackage sys\n\nimport \"missing/cgo\"\n",
        )
        .build();

    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = load_root(loader, linux()).await;

    let manifest = loader
        .package(ctx, Path::new("/ws/sys"))
        .unwrap()
        .unwrap()
        .manifest()
        .unwrap();
    assert_eq!(manifest.file_names(), vec!["sys.go"]);
    assert!(messages(loader, ctx).is_empty());
    loader.shutdown();
}

#[tokio::test]
async fn unresolved_import_is_a_diagnostic_not_a_failure() {
    init_tracing();
    let fs = SourceTreeBuilder::new()
        .package("foo", &["nowhere"])
        .build();

    let harness = counting_loader(&linux_config(), &fs);
    let loader = &harness.loader;
    let ctx = load_root(loader, linux()).await;

    assert!(loader.failures(ctx).unwrap().is_empty());
    let msgs = messages(loader, ctx);
    assert_eq!(msgs.len(), 1, "{msgs:?}");
    assert!(msgs[0].starts_with("foo.go: cannot find package \"nowhere\""));

    let pkg = loader.package(ctx, Path::new("/ws/foo")).unwrap().unwrap();
    assert_eq!(pkg.state(), LoadState::Done);
    assert!(pkg.has_errors());
    loader.shutdown();
}
