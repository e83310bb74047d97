//! File watcher: follows one symbol through edits of its file on disk.
//!
//! Every change reloads the document in full, so the pointer is restored by
//! its anchor rather than by range tracking.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use docsym::error::Error;
use docsym::pointer::Pointer;
use docsym::project;
use docsym::symbol::Symbol;
use docsym::workspace::{DocumentId, Workspace};
use notify::{RecursiveMode, Watcher as _};

use crate::commands;

/// Debounce delay between filesystem events and the reload.
const DEBOUNCE_MS: u64 = 100;

/// Create a watcher that signals `tx` for create, modify and remove events
/// touching a file called `file_name`.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(
    file_name: OsString,
    tx: crossbeam_channel::Sender<()>,
) -> Result<notify::RecommendedWatcher, Error> {
    let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        let Ok(event) = res else {
            return;
        };
        let relevant = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
        ) && event.paths.iter().any(|p| return p.file_name() == Some(file_name.as_os_str()));
        if relevant {
            let _ = tx.send(());
        }
    })?;
    return Ok(watcher);
}

/// Print where `symbol` currently is. Returns `false` if it cannot be located.
fn report(workspace: &Workspace, symbol: &Symbol) -> bool {
    let location = commands::on_worker(|| {
        let read = workspace.read();
        return commands::locate(&read, symbol);
    });
    let Some(location) = location else {
        return false;
    };
    println!("{location}\t{}", symbol.text());
    return true;
}

/// Reload the document and restore the pointer off the primary thread.
/// `None` if the file or the symbol is gone.
///
/// # Errors
///
/// Returns `Error::Io` if the file exists but cannot be read.
fn restore_after_change(workspace: &Workspace, id: DocumentId, pointer: &Pointer) -> Result<Option<Symbol>, Error> {
    if !workspace.reload(id)? {
        return Ok(None);
    }
    return Ok(commands::on_worker(|| return pointer.restore(workspace)));
}

/// Entry point for the watch command.
///
/// Prints the symbol's location, then again after every change to the file.
/// Stops with exit code 2 once the symbol or the file is gone.
///
/// # Errors
///
/// Returns errors from opening the file, resolving the offset or setting up
/// the watcher.
pub fn run(file: &Path, offset: usize) -> Result<ExitCode, Error> {
    let workspace = commands::primary_workspace();
    let id = commands::open_file(&workspace, file)?;
    let symbol = commands::on_worker(|| return commands::symbol_at_offset(&workspace.read(), id, offset))?;
    report(&workspace, &symbol);
    let mut pointer = symbol.create_pointer();

    let path = project::normalize_path(file);
    let file_name = path.file_name().map(OsString::from).unwrap_or_default();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(file_name, tx)?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    eprintln!("watch: following `{}` in {}, press Ctrl+C to stop", symbol.text(), path.display());

    while rx.recv().is_ok() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while rx.recv_timeout(debounce).is_ok() {}

        let Some(restored) = restore_after_change(&workspace, id, &pointer)? else {
            println!("removed");
            return Ok(ExitCode::from(commands::NOT_POSSIBLE));
        };
        tracing::debug!(range = %restored.range(), "symbol restored after change");
        if !report(&workspace, &restored) {
            println!("removed");
            return Ok(ExitCode::from(commands::NOT_POSSIBLE));
        }
        pointer = restored.create_pointer();
    }

    return Ok(ExitCode::SUCCESS);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_follows_full_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.md");
        std::fs::write(&path, "# Setup\n\nbody\n").unwrap();

        let workspace = commands::primary_workspace();
        let id = commands::open_file(&workspace, &path).unwrap();
        let symbol = commands::on_worker(|| commands::symbol_at_offset(&workspace.read(), id, 3)).unwrap();

        std::fs::write(&path, "Intro.\n\n# Setup\n\nbody\n").unwrap();
        let restored = restore_after_change(&workspace, id, &symbol.create_pointer()).unwrap().unwrap();
        assert_eq!(restored.range().start(), symbol.range().start() + 8);
        assert_eq!(restored.text(), "Setup");
    }

    #[test]
    fn deleted_file_means_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.md");
        std::fs::write(&path, "# Setup\n").unwrap();

        let workspace = commands::primary_workspace();
        let id = commands::open_file(&workspace, &path).unwrap();
        let symbol = commands::on_worker(|| commands::symbol_at_offset(&workspace.read(), id, 3)).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert_eq!(restore_after_change(&workspace, id, &symbol.create_pointer()).unwrap(), None);
    }

    #[test]
    fn removed_heading_means_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.md");
        std::fs::write(&path, "# Setup\n").unwrap();

        let workspace = commands::primary_workspace();
        let id = commands::open_file(&workspace, &path).unwrap();
        let symbol = commands::on_worker(|| commands::symbol_at_offset(&workspace.read(), id, 3)).unwrap();

        std::fs::write(&path, "# Teardown\n").unwrap();
        assert_eq!(restore_after_change(&workspace, id, &symbol.create_pointer()).unwrap(), None);
    }
}
