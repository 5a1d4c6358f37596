// src/source/analyzer.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::source::{Analysis, AnalysisInput, Analyzer, SourceFile, TypeInfo};
use crate::types::Diagnostic;

/// Type information produced by [`PackageClauseAnalyzer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub name: String,
    pub dir: PathBuf,
    pub files: usize,
    /// Directories of the packages this one imports.
    pub imports: Vec<PathBuf>,
}

/// Lightweight analyzer that checks package clauses and import
/// availability. It stands in for a real type checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageClauseAnalyzer;

impl PackageClauseAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

/// First `(file, line)` in `files` importing `import`.
fn import_site<'a>(files: &'a [SourceFile], import: &str) -> Option<(&'a Path, u32)> {
    files.iter().find_map(|f| {
        f.imports
            .iter()
            .find(|i| i.path == import)
            .map(|i| (f.path.as_path(), i.line))
    })
}

impl Analyzer for PackageClauseAnalyzer {
    fn parse_and_check(
        &self,
        input: &AnalysisInput,
        import: &dyn Fn(&Path) -> Option<TypeInfo>,
    ) -> Analysis {
        let mut diagnostics = Vec::new();

        // Test files are checked against the name of the already-loaded
        // non-test package.
        let expected = if input.test {
            import(&input.dir)
                .and_then(|info| info.downcast_ref::<PackageSummary>().map(|s| s.name.clone()))
        } else {
            None
        };
        let mut name: Option<&str> = expected.as_deref();

        for file in &input.files {
            let Some(clause) = &file.package else {
                diagnostics.push(Diagnostic::error(&file.path, 1, "expected 'package' clause"));
                continue;
            };
            match name {
                None => name = Some(&clause.name),
                Some(want) if clause.name == want => {}
                Some(want) if input.test && clause.name == format!("{want}_test") => {}
                Some(want) => diagnostics.push(Diagnostic::error(
                    &file.path,
                    clause.line,
                    format!("found package {} in {}, expected {want}", clause.name, file.name),
                )),
            }
        }

        let mut imports = Vec::with_capacity(input.imports.len());
        for (path, dir) in &input.imports {
            if import(dir).is_some() {
                imports.push(dir.clone());
                continue;
            }
            let (file, line) =
                import_site(&input.files, path).unwrap_or((input.dir.as_path(), 0));
            diagnostics.push(Diagnostic::error(
                file,
                line,
                format!("could not import {path} (no type information)"),
            ));
        }

        let ok = !diagnostics.iter().any(Diagnostic::is_error);
        let type_info = match (input.test, name) {
            (false, Some(name)) => Some(Arc::new(PackageSummary {
                name: name.to_string(),
                dir: input.dir.clone(),
                files: input.files.len(),
                imports,
            }) as TypeInfo),
            _ => None,
        };

        trace!(
            dir = %input.dir.display(),
            test = input.test,
            ok,
            diagnostics = diagnostics.len(),
            "analyzed package"
        );

        Analysis {
            diagnostics,
            ok,
            type_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::source::{Import, PackageClause};

    fn file(name: &str, package: Option<&str>, test: bool, imports: &[&str]) -> SourceFile {
        SourceFile {
            name: name.to_string(),
            path: PathBuf::from("/src/foo").join(name),
            test,
            package: package.map(|p| PackageClause {
                name: p.to_string(),
                line: 1,
            }),
            imports: imports
                .iter()
                .map(|p| Import {
                    path: p.to_string(),
                    line: 3,
                })
                .collect(),
        }
    }

    fn input(files: Vec<SourceFile>, imports: &[(&str, &str)], test: bool) -> AnalysisInput {
        AnalysisInput {
            dir: PathBuf::from("/src/foo"),
            files,
            imports: imports
                .iter()
                .map(|(p, d)| (p.to_string(), PathBuf::from(d)))
                .collect::<BTreeMap<_, _>>(),
            test,
        }
    }

    fn summary(name: &str) -> TypeInfo {
        Arc::new(PackageSummary {
            name: name.to_string(),
            dir: PathBuf::from("/src").join(name),
            files: 1,
            imports: Vec::new(),
        })
    }

    #[test]
    fn consistent_package_produces_summary() {
        let analysis = PackageClauseAnalyzer.parse_and_check(
            &input(
                vec![
                    file("a.go", Some("foo"), false, &["bar"]),
                    file("b.go", Some("foo"), false, &[]),
                ],
                &[("bar", "/src/bar")],
                false,
            ),
            &|_| Some(summary("bar")),
        );

        assert!(analysis.ok);
        assert!(analysis.diagnostics.is_empty());
        let info = analysis.type_info.expect("type info");
        let summary = info.downcast_ref::<PackageSummary>().unwrap();
        assert_eq!(summary.name, "foo");
        assert_eq!(summary.imports, vec![PathBuf::from("/src/bar")]);
    }

    #[test]
    fn mismatched_and_missing_clauses_are_diagnosed() {
        let analysis = PackageClauseAnalyzer.parse_and_check(
            &input(
                vec![
                    file("a.go", Some("foo"), false, &[]),
                    file("b.go", Some("oops"), false, &[]),
                    file("c.go", None, false, &[]),
                ],
                &[],
                false,
            ),
            &|_| None,
        );

        assert!(!analysis.ok);
        let messages: Vec<&str> = analysis
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                "found package oops in b.go, expected foo",
                "expected 'package' clause"
            ]
        );
        // Partial results stay visible.
        assert!(analysis.type_info.is_some());
    }

    #[test]
    fn test_files_may_use_external_test_package() {
        let analysis = PackageClauseAnalyzer.parse_and_check(
            &input(
                vec![
                    file("a_test.go", Some("foo"), true, &[]),
                    file("b_test.go", Some("foo_test"), true, &[]),
                ],
                &[],
                true,
            ),
            &|dir| (dir == Path::new("/src/foo")).then(|| summary("foo")),
        );
        assert!(analysis.ok, "{:?}", analysis.diagnostics);
        assert!(analysis.type_info.is_none());
    }

    #[test]
    fn missing_dependency_type_info_is_an_error_at_import_site() {
        let analysis = PackageClauseAnalyzer.parse_and_check(
            &input(
                vec![file("a.go", Some("foo"), false, &["bar"])],
                &[("bar", "/src/bar")],
                false,
            ),
            &|_| None,
        );
        assert!(!analysis.ok);
        assert_eq!(analysis.diagnostics[0].line, 3);
        assert_eq!(analysis.diagnostics[0].file, PathBuf::from("/src/foo/a.go"));
    }
}
