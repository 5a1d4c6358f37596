// src/engine/transitions.rs

//! Bodies of the pipeline steps.
//!
//! - `queued -> unloaded`: read the file manifest.
//! - `unloaded -> loadedGo`: resolve and strongly connect imports of the
//!   non-test files, wait for them, analyze.
//! - `loadedGo -> loadedTest`: the same for test files over weak edges.
//! - `loadedTest -> done`: pass-through.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::engine::loader::Shared;
use crate::engine::{EventReason, LoadEvent};
use crate::errors::{CaravanError, LoadFailure};
use crate::package::distinct::{Ticket, TransitionOutput};
use crate::package::{DistinctPackage, Environment, LoadState};
use crate::source::{AnalysisInput, Manifest, ResolveError, TypeInfo};
use crate::types::Diagnostic;

type Outcome = Result<TransitionOutput, LoadFailure>;

/// Run the transition `ticket` grants, apply its outcome, and re-enqueue the
/// package if it has more to do.
pub(crate) async fn run(shared: Arc<Shared>, pkg: Arc<DistinctPackage>, ticket: Ticket) {
    let outcome = match ticket.from {
        LoadState::Queued => scan(&shared, &pkg).await,
        LoadState::Unloaded => load(&shared, &pkg, false).await,
        LoadState::LoadedGo => load(&shared, &pkg, true).await,
        LoadState::LoadedTest => Ok(TransitionOutput::default()),
        LoadState::Done => Err(LoadFailure::Internal(
            "transition requested for a done package".to_string(),
        )),
    };

    match &outcome {
        Err(failure @ LoadFailure::Cycle { .. }) => {
            error!(
                key = %pkg.key(),
                path = %pkg.abs_path().display(),
                error = %failure,
                "import resolution produced a cycle"
            );
        }
        Err(failure) => {
            warn!(
                key = %pkg.key(),
                path = %pkg.abs_path().display(),
                from = %ticket.from,
                error = %failure,
                "package failed"
            );
        }
        Ok(_) => {}
    }

    let finish = pkg.finish_transition(ticket, outcome);
    if finish.terminal {
        if pkg.failure().is_none() {
            info!(
                key = %pkg.key(),
                path = %pkg.abs_path().display(),
                env = %pkg.environment(),
                "package done"
            );
        }
        shared.package_settled(&pkg);
    }
    if finish.requeue {
        shared
            .enqueue(LoadEvent::new(pkg.key(), EventReason::Advanced))
            .await;
    }
}

async fn blocking<T, F>(f: F) -> Result<T, LoadFailure>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LoadFailure::Internal(format!("blocking task failed: {e}")))
}

async fn read_manifest(shared: &Shared, pkg: &DistinctPackage) -> Result<Manifest, LoadFailure> {
    let scanner = Arc::clone(&shared.collaborators.scanner);
    let dir = pkg.abs_path().to_path_buf();
    let env = Arc::clone(pkg.environment());
    Ok(blocking(move || scanner.scan(&dir, &env)).await??)
}

async fn scan(shared: &Shared, pkg: &DistinctPackage) -> Outcome {
    let manifest = read_manifest(shared, pkg).await?;
    Ok(TransitionOutput {
        manifest: Some(Arc::new(manifest)),
        ..Default::default()
    })
}

/// An import that resolved to a package we are now connected to.
struct Dependency {
    import: String,
    sites: Vec<(PathBuf, u32)>,
    pkg: Arc<DistinctPackage>,
}

fn cycle_failure(shared: &Shared, err: CaravanError) -> LoadFailure {
    match err {
        CaravanError::Cycle { path } => LoadFailure::Cycle {
            path: path
                .into_iter()
                .map(|key| match shared.caravan.find(key) {
                    Some(pkg) => pkg.abs_path().to_path_buf(),
                    None => PathBuf::from(key.to_string()),
                })
                .collect(),
        },
        other => LoadFailure::Internal(other.to_string()),
    }
}

async fn load(shared: &Arc<Shared>, pkg: &Arc<DistinctPackage>, test: bool) -> Outcome {
    let mut output = TransitionOutput::default();

    let manifest = match pkg.manifest() {
        Some(manifest) if test || !pkg.manifest_stale() => manifest,
        _ => {
            debug!(path = %pkg.abs_path().display(), "re-reading manifest");
            let manifest = Arc::new(read_manifest(shared, pkg).await?);
            output.manifest = Some(Arc::clone(&manifest));
            manifest
        }
    };
    if !test {
        output.diagnostics.extend(manifest.problems.iter().cloned());
    }

    let imports = manifest.imports(test);
    let resolved = {
        let resolver = Arc::clone(&shared.collaborators.resolver);
        let from = pkg.abs_path().to_path_buf();
        let env = Arc::clone(pkg.environment());
        let names: Vec<String> = imports.keys().cloned().collect();
        blocking(move || {
            names
                .into_iter()
                .map(|name| {
                    let target = resolver.resolve(&name, &from, &env);
                    (name, target)
                })
                .collect::<Vec<_>>()
        })
        .await?
    };

    // Connect every import before waiting on any of them, so an import cycle
    // is rejected by the caravan instead of leaving two packages waiting on
    // each other.
    let mut dependencies = Vec::new();
    for (import, target) in resolved {
        let sites = imports.get(&import).cloned().unwrap_or_default();
        let target = match target {
            Ok(target) => target,
            Err(err @ ResolveError::NotFound { .. }) => {
                for (file, line) in &sites {
                    output
                        .diagnostics
                        .push(Diagnostic::error(file, *line, err.to_string()));
                }
                continue;
            }
        };
        if target == pkg.abs_path() {
            continue;
        }

        let (dep, _) = shared
            .package_for(&target, pkg.environment(), &pkg.owners())
            .await;
        let connected = if test {
            shared.caravan.weak_connect(pkg.key(), dep.key())
        } else {
            shared.caravan.connect(pkg.key(), dep.key())
        };
        connected.map_err(|e| cycle_failure(shared, e))?;
        // Owners read after the edge exists: a context that joins later
        // reaches `dep` through the edge itself.
        shared.propagate_owners(&[dep.key()], &pkg.owners());

        dependencies.push(Dependency {
            import,
            sites,
            pkg: dep,
        });
    }

    let mut available = BTreeMap::new();
    for dep in dependencies {
        let ready = tokio::select! {
            ready = dep.pkg.wait_until_ready(LoadState::Unloaded) => ready,
            _ = shared.stopped() => Err(LoadFailure::Internal("loader shut down".to_string())),
        };
        match ready {
            Ok(()) => {
                available.insert(dep.import, dep.pkg.abs_path().to_path_buf());
            }
            Err(failure) => {
                for (file, line) in &dep.sites {
                    output.diagnostics.push(Diagnostic::error(
                        file,
                        *line,
                        format!("dependency {} failed: {failure}", dep.import),
                    ));
                }
            }
        }
    }

    let files: Vec<_> = manifest.files(test).cloned().collect();
    if test && files.is_empty() {
        return Ok(output);
    }

    let input = AnalysisInput {
        dir: pkg.abs_path().to_path_buf(),
        files,
        imports: available,
        test,
    };
    let analyzer = Arc::clone(&shared.collaborators.analyzer);
    let lookup = type_info_lookup(Arc::clone(shared), Arc::clone(pkg.environment()));
    let analysis = blocking(move || analyzer.parse_and_check(&input, &lookup)).await?;

    debug!(
        path = %pkg.abs_path().display(),
        test,
        ok = analysis.ok,
        diagnostics = analysis.diagnostics.len(),
        "analysis finished"
    );
    output.diagnostics.extend(analysis.diagnostics);
    if !test {
        output.type_info = analysis.type_info;
    }
    Ok(output)
}

/// The import callback handed to the analyzer: type information of an
/// already-loaded package in the same environment.
fn type_info_lookup(
    shared: Arc<Shared>,
    env: Arc<Environment>,
) -> impl Fn(&Path) -> Option<TypeInfo> + Send + 'static {
    move |dir: &Path| {
        shared
            .caravan
            .find(env.package_key(dir))
            .and_then(|pkg| pkg.type_info())
    }
}
