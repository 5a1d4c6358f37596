#![allow(dead_code)]

pub use caravan_test_utils::builders;
pub use caravan_test_utils::{init_tracing, with_timeout};

use std::path::Path;

use caravan::engine::{ContextId, Loader};
use caravan::package::Environment;

use crate::common::builders::ROOT;

pub fn linux() -> Environment {
    Environment::new("linux", "amd64", Vec::<String>::new())
}

/// Open a context, load the whole tree under `ROOT`, and wait for it to
/// settle.
pub async fn load_root(loader: &Loader, env: Environment) -> ContextId {
    let ctx = loader.new_context(env).expect("new context");
    loader
        .load_directory(ctx, Path::new(ROOT))
        .await
        .expect("load directory");
    with_timeout(loader.wait(ctx)).await.expect("wait");
    ctx
}

/// Every diagnostic message of a context, as `file name: message`.
pub fn messages(loader: &Loader, ctx: ContextId) -> Vec<String> {
    let mut out = Vec::new();
    loader
        .errors(ctx, |file, diagnostics| {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            for d in diagnostics {
                out.push(format!("{name}: {}", d.message));
            }
        })
        .expect("errors");
    out
}
