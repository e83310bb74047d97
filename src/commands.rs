//! CLI commands for docsym: symbols, goto, usages.
//!
//! The main thread is registered as the primary thread; every read action
//! runs on a scoped worker thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use docsym::config::Config;
use docsym::error::Error;
use docsym::factory;
use docsym::navigation::{Location, NavigatableSymbol as _};
use docsym::project;
use docsym::range::TextRange;
use docsym::symbol::Symbol;
use docsym::tree::{LabelRole, NodeKind};
use docsym::usage::{self, SearchScope};
use docsym::workspace::{Cancelled, DocumentId, ReadGuard, Workspace};
use serde::Serialize;

use crate::diagnostics;

/// Exit code for a well-formed request that has nowhere to go.
pub const NOT_POSSIBLE: u8 = 2;

/// One symbol in `symbols --json` output.
#[derive(Serialize)]
struct SymbolReport {
    /// Slug or normalized label.
    anchor: Option<String>,
    /// One-based column of the range start.
    column: usize,
    /// Declares its target.
    declaration: bool,
    /// Header level or label role.
    kind: NodeKind,
    /// One-based line of the range start.
    line: usize,
    /// Byte range of the symbol text.
    range: TextRange,
    /// Where usages may occur.
    scope: SearchScope,
    /// Symbol text.
    text: String,
}

/// One usage in `usages --json` output.
#[derive(Serialize)]
struct UsageReport {
    /// One-based column of the usage.
    column: usize,
    /// The usage is the declaration itself.
    declaration: bool,
    /// One-based line of the usage.
    line: usize,
    /// File the usage is in.
    path: PathBuf,
    /// Byte range of the usage.
    range: TextRange,
}

/// Print where the symbol at `offset` navigates to. Labels resolve to their
/// definition; headers to themselves.
///
/// # Errors
///
/// Returns `Error::FileNotFound`, `Error::InvalidOffset` or
/// `Error::NoSymbolAtOffset` when the request cannot be understood.
pub fn goto(file: &Path, offset: usize) -> Result<ExitCode, Error> {
    let workspace = primary_workspace();
    let id = open_file(&workspace, file)?;

    let outcome = on_worker(|| -> Result<Option<Location>, Error> {
        let read = workspace.read();
        let symbol = symbol_at_offset(&read, id, offset)?;
        let Some(declaration) = usage::find_declaration(&read, &symbol) else {
            eprintln!("no definition for [{}]", symbol.text());
            return Ok(None);
        };
        return Ok(locate(&read, &declaration));
    })?;

    let Some(location) = outcome else {
        return Ok(ExitCode::from(NOT_POSSIBLE));
    };
    println!("{location}");
    return Ok(ExitCode::SUCCESS);
}

/// Short text label for a symbol kind.
fn kind_label(kind: NodeKind) -> String {
    return match kind {
        NodeKind::Header { level } => format!("h{level}"),
        NodeKind::LinkLabel { role } => {
            let role = match role {
                LabelRole::Collapsed => "collapsed",
                LabelRole::Definition => "definition",
                LabelRole::Full => "full",
                LabelRole::Shortcut => "shortcut",
            };
            format!("label:{role}")
        },
    };
}

/// Resolve the first navigation target of `symbol` to a printable location.
pub fn locate(read: &ReadGuard<'_>, symbol: &Symbol) -> Option<Location> {
    let targets = symbol.navigation_targets(read);
    let request = targets.first()?.navigation_request(read)?;
    return request.location(read);
}

/// Run `work` on a scoped worker thread, propagating its panics.
pub fn on_worker<T: Send>(work: impl FnOnce() -> T + Send) -> T {
    return std::thread::scope(|scope| {
        return scope
            .spawn(work)
            .join()
            .unwrap_or_else(|payload| return std::panic::resume_unwind(payload));
    });
}

/// Open `file` under its normalized path so that project loading and explicit
/// arguments share one document.
///
/// # Errors
///
/// Returns `Error::FileNotFound` or `Error::Io` if the file cannot be read.
pub fn open_file(workspace: &Workspace, file: &Path) -> Result<DocumentId, Error> {
    return workspace.open(&project::normalize_path(file));
}

/// A workspace whose primary thread is the calling thread.
pub fn primary_workspace() -> Workspace {
    let workspace = Workspace::new();
    workspace.mark_primary_thread();
    return workspace;
}

/// Print JSON to stdout.
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be serialized.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    return Ok(());
}

/// The innermost symbol at `offset`.
///
/// # Errors
///
/// Returns `Error::InvalidOffset` if `offset` is not a character position of
/// the document, or `Error::NoSymbolAtOffset` if no symbol covers it.
pub fn symbol_at_offset(read: &ReadGuard<'_>, id: DocumentId, offset: usize) -> Result<Symbol, Error> {
    let document = read.document(id).ok_or(Error::DocumentNotFound { id })?;
    if !document.text().is_char_boundary(offset) {
        return Err(Error::InvalidOffset {
            len: document.text().len(),
            offset,
            path: document.path().to_path_buf(),
        });
    }
    return factory::symbol_at(read, id, offset).ok_or_else(|| {
        return Error::NoSymbolAtOffset {
            offset,
            path: document.path().to_path_buf(),
        };
    });
}

/// List every symbol of `file`.
///
/// # Errors
///
/// Returns `Error::FileNotFound` or `Error::Io` if the file cannot be read.
pub fn symbols(file: &Path, json: bool) -> Result<ExitCode, Error> {
    let workspace = primary_workspace();
    let id = open_file(&workspace, file)?;

    let reports = on_worker(|| {
        let read = workspace.read();
        let Some(document) = read.document(id) else {
            return Vec::new();
        };
        return factory::document_symbols(&read, id)
            .into_iter()
            .filter_map(|symbol| {
                let (line, column) = document.line_col(symbol.range().start())?;
                return Some(SymbolReport {
                    anchor: symbol.anchor_text().map(str::to_string),
                    column,
                    declaration: symbol.is_declaration(),
                    kind: symbol.kind(),
                    line,
                    range: symbol.range(),
                    scope: symbol.maximal_search_scope(),
                    text: symbol.text().to_string(),
                });
            })
            .collect::<Vec<_>>();
    });

    if json {
        print_json(&reports)?;
        return Ok(ExitCode::SUCCESS);
    }
    for report in &reports {
        let anchor = report.anchor.as_deref().unwrap_or_default();
        println!(
            "{}:{}\t{}\t{}\t#{anchor}",
            report.line,
            report.column,
            kind_label(report.kind),
            report.text
        );
    }
    return Ok(ExitCode::SUCCESS);
}

/// List the usages of the symbol at `offset`. Header usages are searched
/// across every markdown file under `root`, filtered by `config_path` or by
/// the root's `.docsym.toml`. Files skipped while loading are reported on
/// stderr.
///
/// # Errors
///
/// Returns config, project loading and offset errors.
pub fn usages(
    root: &Path,
    config_path: Option<&Path>,
    file: &Path,
    offset: usize,
    json: bool,
) -> Result<ExitCode, Error> {
    let workspace = primary_workspace();
    let id = workspace.open(&project::path_in_project(root, file)?)?;

    let symbol = on_worker(|| return symbol_at_offset(&workspace.read(), id, offset))?;
    if symbol.maximal_search_scope() == SearchScope::Project {
        let config = match config_path {
            None => Config::load(root)?,
            Some(path) => Config::load_from(path)?,
        };
        let loaded = project::load(&workspace, root, &config)?;
        for skipped in &loaded.skipped {
            diagnostics::print_error(skipped);
        }
    }

    let reports = on_worker(|| {
        return with_retry(&workspace, |read| {
            let found = usage::find_usages(read, &symbol)?;
            return Ok(found
                .into_iter()
                .filter_map(|u| {
                    let document = read.document(u.document)?;
                    let (line, column) = document.line_col(u.range.start())?;
                    return Some(UsageReport {
                        column,
                        declaration: u.is_declaration,
                        line,
                        path: document.path().to_path_buf(),
                        range: u.range,
                    });
                })
                .collect::<Vec<_>>());
        });
    });

    if json {
        print_json(&reports)?;
    } else {
        for report in &reports {
            let marker = if report.declaration { "  (declaration)" } else { "" };
            println!("{}:{}:{}{marker}", report.path.display(), report.line, report.column);
        }
    }
    if reports.is_empty() {
        return Ok(ExitCode::from(NOT_POSSIBLE));
    }
    return Ok(ExitCode::SUCCESS);
}

/// Run a cancellable read action until it completes without interruption.
pub fn with_retry<T>(workspace: &Workspace, mut action: impl FnMut(&ReadGuard<'_>) -> Result<T, Cancelled>) -> T {
    loop {
        let read = workspace.read();
        match action(&read) {
            Err(Cancelled) => {
                drop(read);
                tracing::debug!("read action canceled, retrying");
                std::thread::yield_now();
            },
            Ok(value) => return value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Title\n\nSee [foo].\n\n[foo]: http://x";

    #[test]
    fn kind_labels() {
        assert_eq!(kind_label(NodeKind::Header { level: 3 }), "h3");
        assert_eq!(
            kind_label(NodeKind::LinkLabel {
                role: LabelRole::Definition
            }),
            "label:definition"
        );
    }

    #[test]
    fn offsets_inside_characters_are_invalid() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Café\n");
        let read = workspace.read();
        assert!(matches!(symbol_at_offset(&read, id, 6), Err(Error::InvalidOffset { .. })));
        assert!(matches!(symbol_at_offset(&read, id, 99), Err(Error::InvalidOffset { len: 8, .. })));
    }

    #[test]
    fn blank_line_has_no_symbol() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", SAMPLE);
        let read = workspace.read();
        assert!(matches!(symbol_at_offset(&read, id, 8), Err(Error::NoSymbolAtOffset { offset: 8, .. })));
    }

    #[test]
    fn reference_locates_its_definition_off_the_primary_thread() {
        let workspace = primary_workspace();
        let id = workspace.open_text("docs/a.md", SAMPLE);

        let location = on_worker(|| {
            let read = workspace.read();
            let reference = symbol_at_offset(&read, id, 14).unwrap();
            let definition = usage::find_declaration(&read, &reference).unwrap();
            return locate(&read, &definition);
        });
        assert_eq!(location.unwrap().to_string(), "docs/a.md:5:2");
    }

    #[test]
    fn goto_reports_labels_without_definition() {
        let dir = tempfile::tempdir().unwrap();
        let defined = dir.path().join("defined.md");
        let undefined = dir.path().join("undefined.md");
        std::fs::write(&defined, SAMPLE).unwrap();
        std::fs::write(&undefined, "See [missing].\n").unwrap();

        assert_eq!(goto(&defined, 14).unwrap(), ExitCode::SUCCESS);
        assert_eq!(goto(&undefined, 6).unwrap(), ExitCode::from(NOT_POSSIBLE));
        assert!(matches!(goto(&undefined, 99), Err(Error::InvalidOffset { .. })));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, SAMPLE).unwrap();

        let missing = dir.path().join("missing.toml");
        let outcome = usages(dir.path(), Some(&missing), &file, 3, false);
        assert!(matches!(outcome, Err(Error::ConfigNotFound { path }) if path == missing));
    }

    #[test]
    fn unserializable_json_is_an_error() {
        let keyed_by_pairs = std::collections::BTreeMap::from([((1_u8, 2_u8), "x")]);
        assert!(matches!(print_json(&keyed_by_pairs), Err(Error::Json(_))));
    }

    #[test]
    fn retry_runs_until_not_canceled() {
        let workspace = Workspace::new();
        let mut attempts = 0;
        let value = with_retry(&workspace, |_| {
            attempts += 1;
            if attempts < 3 {
                return Err(Cancelled);
            }
            return Ok(attempts);
        });
        assert_eq!(value, 3);
    }
}
