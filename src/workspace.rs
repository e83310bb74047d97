//! Document store: revisioned markdown documents behind a reader/writer lock.
//!
//! Every tree-touching operation in this crate takes a [`ReadGuard`] as proof
//! that it runs under read consistency. Writers announce themselves before
//! waiting for the lock so long-running readers can notice, abandon their scan
//! and retry once the write has landed.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::ThreadId;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::error::Error;
use crate::range::TextRange;
use crate::runtime;
use crate::tree::SyntaxTree;

/// Number of edits a document remembers for range tracking.
pub const MAX_TRACKED_EDITS: usize = 1024;

/// A read action gave up because a writer is waiting for the lock.
/// Partial results must be discarded and the action retried from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("read action canceled by a pending write")]
pub struct Cancelled;

/// Opaque, stable identity of an open document. Survives edits, reloads and
/// renames; becomes dangling once the document is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct DocumentId(u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "doc#{}", self.0);
    }
}

/// One text replacement in the edit log.
#[derive(Debug, Clone, Copy)]
struct Edit {
    /// Length of the inserted text.
    inserted: usize,
    /// Replaced range, in the coordinates of the revision before the edit.
    range: TextRange,
    /// Revision the edit produced.
    revision: u64,
}

/// A markdown document at its current revision.
#[derive(Debug)]
pub struct Document {
    /// Content was not valid UTF-8 or contained NUL bytes.
    binary: bool,
    /// Recent edits, oldest first.
    edits: VecDeque<Edit>,
    /// Stable identity.
    id: DocumentId,
    /// Where the document lives; may change through `Workspace::rename`.
    path: PathBuf,
    /// Bumped by every mutation.
    revision: u64,
    /// Current content.
    text: String,
    /// Oldest revision whose successors are all still in `edits`.
    tracked_since: u64,
    /// Parse of the current revision, built on first use.
    tree: Mutex<Option<Arc<SyntaxTree>>>,
}

impl Document {
    /// Replace `range` with `replacement` and record the edit.
    ///
    /// # Errors
    ///
    /// Returns `Error::EditOutOfBounds` if `range` does not lie on character
    /// boundaries inside the text.
    fn apply_edit(&mut self, range: TextRange, replacement: &str) -> Result<(), Error> {
        if range.substring(&self.text).is_none() {
            return Err(Error::EditOutOfBounds {
                len: self.text.len(),
                path: self.path.clone(),
                range,
            });
        }
        self.text.replace_range(range.start()..range.end(), replacement);
        self.revision = self.revision.saturating_add(1);
        self.edits.push_back(Edit {
            inserted: replacement.len(),
            range,
            revision: self.revision,
        });
        if self.edits.len() > MAX_TRACKED_EDITS
            && let Some(dropped) = self.edits.pop_front()
        {
            self.tracked_since = dropped.revision;
        }
        *self.tree.get_mut() = None;
        return Ok(());
    }

    /// Stable identity of this document.
    pub const fn id(&self) -> DocumentId {
        return self.id;
    }

    /// Content is not text that can be shown in an editor.
    pub const fn is_binary(&self) -> bool {
        return self.binary;
    }

    /// One-based line and column (in characters) of a byte offset.
    pub fn line_col(&self, offset: usize) -> Option<(usize, usize)> {
        let before = self.text.get(..offset)?;
        let line_start = before.rfind('\n').map_or(0, |i| return i.saturating_add(1));
        let line = before.matches('\n').count().saturating_add(1);
        let column = before.get(line_start..)?.chars().count().saturating_add(1);
        return Some((line, column));
    }

    /// Map a range expressed at `revision` onto the current text.
    ///
    /// Edits wholly after the range leave it alone and edits wholly before it
    /// shift it. An edit that touches the inside of the range, or a gap in the
    /// edit log, makes the range untrackable.
    pub fn map_range(&self, range: TextRange, revision: u64) -> Option<TextRange> {
        if revision == self.revision {
            return Some(range);
        }
        if revision < self.tracked_since || revision > self.revision {
            return None;
        }

        let mut current = range;
        for edit in self.edits.iter().filter(|e| return e.revision > revision) {
            if edit.range.start() >= current.end() {
                continue;
            }
            if edit.range.end() <= current.start() {
                let delta = length_delta(edit.inserted, edit.range.len())?;
                current = current.shifted(delta)?;
                continue;
            }
            return None;
        }
        return Some(current);
    }

    /// Create a document at revision zero.
    fn new(id: DocumentId, path: PathBuf, text: String, binary: bool) -> Self {
        return Self {
            binary,
            edits: VecDeque::new(),
            id,
            path,
            revision: 0,
            text,
            tracked_since: 0,
            tree: Mutex::new(None),
        };
    }

    /// Path the document was opened from.
    pub fn path(&self) -> &Path {
        return &self.path;
    }

    /// Swap in entirely new content. Range tracking restarts from here.
    fn replace_text(&mut self, text: String, binary: bool) {
        self.text = text;
        self.binary = binary;
        self.revision = self.revision.saturating_add(1);
        self.edits.clear();
        self.tracked_since = self.revision;
        *self.tree.get_mut() = None;
    }

    /// Current revision.
    pub const fn revision(&self) -> u64 {
        return self.revision;
    }

    /// Current content.
    pub fn text(&self) -> &str {
        return &self.text;
    }

    /// Parse of the current revision, reparsing if nothing is cached yet.
    /// Binary documents have an empty tree.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if tree-sitter cannot parse the text.
    pub fn tree(&self) -> Result<Arc<SyntaxTree>, Error> {
        let mut cached = self.tree.lock();
        if let Some(tree) = cached.as_ref() {
            return Ok(Arc::clone(tree));
        }
        let tree = if self.binary {
            Arc::new(SyntaxTree::default())
        } else {
            Arc::new(SyntaxTree::parse(&self.path, &self.text)?)
        };
        *cached = Some(Arc::clone(&tree));
        return Ok(tree);
    }
}

/// Decrements the pending-writer count when a write finishes, even on panic.
struct PendingWrite<'a>(
    /// Counter shared with readers.
    &'a AtomicUsize,
);

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Proof that the holder runs under read consistency. While it is alive no
/// document can change.
pub struct ReadGuard<'a> {
    /// Shared access to all documents.
    state: RwLockReadGuard<'a, WorkspaceState>,
    /// Owner of the lock, for cancellation and thread checks.
    workspace: &'a Workspace,
}

impl ReadGuard<'_> {
    /// Enforce that expensive work is not running on the primary thread.
    ///
    /// # Panics
    ///
    /// Panics when called on the primary thread inside a test run. Outside
    /// tests the violation is logged and execution continues.
    pub fn assert_background_thread(&self) {
        let primary = *self.workspace.primary_thread.lock();
        if primary != Some(std::thread::current().id()) {
            return;
        }
        if runtime::is_running_under_test() {
            panic!("operation must not run on the primary thread");
        }
        tracing::error!("operation must not run on the primary thread");
    }

    /// Fail if a writer is waiting, so the caller can drop the guard and retry.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` while any write is pending.
    pub fn check_canceled(&self) -> Result<(), Cancelled> {
        if self.workspace.pending_writes.load(Ordering::SeqCst) > 0 {
            return Err(Cancelled);
        }
        return Ok(());
    }

    /// Whether `path` names an existing directory. The one filesystem query
    /// available to read actions.
    pub fn directory_exists(&self, path: &Path) -> bool {
        return path.is_dir();
    }

    /// Look a document up. `None` once it has been closed.
    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        return self.state.documents.get(&id);
    }

    /// The open document with this path, if any.
    pub fn document_by_path(&self, path: &Path) -> Option<&Document> {
        return self.state.documents.values().find(|d| return d.path == path);
    }

    /// All open documents, ordered by id.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        return self.state.documents.values();
    }
}

/// Open documents and the locking discipline around them.
#[derive(Default)]
pub struct Workspace {
    /// Writers announced but not yet finished.
    pending_writes: AtomicUsize,
    /// The dispatch thread that must not run tree traversal.
    primary_thread: Mutex<Option<ThreadId>>,
    /// Documents, guarded for many readers or one writer.
    state: RwLock<WorkspaceState>,
}

impl Workspace {
    /// Replace `range` of a document with `replacement`. Returns the new revision.
    ///
    /// Must not be called while the same thread holds a [`ReadGuard`].
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` for a closed document or
    /// `Error::EditOutOfBounds` if `range` does not fit the text.
    pub fn apply_edit(&self, id: DocumentId, range: TextRange, replacement: &str) -> Result<u64, Error> {
        return self.write(|state| {
            let document = state.documents.get_mut(&id).ok_or(Error::DocumentNotFound { id })?;
            document.apply_edit(range, replacement)?;
            return Ok(document.revision);
        });
    }

    /// Close a document. Its id becomes dangling. Returns whether it was open.
    pub fn close(&self, id: DocumentId) -> bool {
        return self.write(|state| return state.documents.remove(&id).is_some());
    }

    /// Register the calling thread as the primary (dispatch) thread.
    pub fn mark_primary_thread(&self) {
        *self.primary_thread.lock() = Some(std::thread::current().id());
    }

    /// An empty workspace.
    pub fn new() -> Self {
        return Self::default();
    }

    /// Open a document from disk. If the path is already open, its content is
    /// replaced and the existing id returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the file does not exist or
    /// `Error::Io` for other read failures.
    pub fn open(&self, path: &Path) -> Result<DocumentId, Error> {
        let (text, binary) = read_document(path)?;
        let id = self.write(|state| {
            if let Some(existing) = state.documents.values_mut().find(|d| return d.path == path) {
                existing.replace_text(text, binary);
                return existing.id;
            }
            return state.insert(path.to_path_buf(), text, binary);
        });
        tracing::debug!(%id, path = %path.display(), binary, "opened document");
        return Ok(id);
    }

    /// Open an in-memory document that has no backing file.
    pub fn open_text(&self, path: impl Into<PathBuf>, text: impl Into<String>) -> DocumentId {
        let path = path.into();
        let text = text.into();
        return self.write(|state| return state.insert(path, text, false));
    }

    /// Acquire read consistency.
    ///
    /// Blocks while a writer holds or is queued for the lock.
    pub fn read(&self) -> ReadGuard<'_> {
        return ReadGuard {
            state: self.state.read(),
            workspace: self,
        };
    }

    /// Re-read a document from disk as a full replacement. If the file has
    /// vanished the document is closed and `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` for a closed document or `Error::Io`
    /// for read failures other than a missing file.
    pub fn reload(&self, id: DocumentId) -> Result<bool, Error> {
        let path = {
            let read = self.read();
            let document = read.document(id).ok_or(Error::DocumentNotFound { id })?;
            document.path.clone()
        };

        let (text, binary) = match read_document(&path) {
            Err(Error::FileNotFound { .. }) => {
                self.close(id);
                tracing::debug!(%id, path = %path.display(), "document deleted on disk");
                return Ok(false);
            },
            Err(e) => return Err(e),
            Ok(content) => content,
        };
        self.replace_text_with(id, text, binary)?;
        return Ok(true);
    }

    /// Move a document to a new path, keeping its id and content.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` for a closed document.
    pub fn rename(&self, id: DocumentId, path: impl Into<PathBuf>) -> Result<(), Error> {
        let path = path.into();
        return self.write(|state| {
            let document = state.documents.get_mut(&id).ok_or(Error::DocumentNotFound { id })?;
            document.path = path;
            return Ok(());
        });
    }

    /// Replace the whole text of a document, as a full reparse would.
    /// Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` for a closed document.
    pub fn replace_text(&self, id: DocumentId, text: impl Into<String>) -> Result<u64, Error> {
        return self.replace_text_with(id, text.into(), false);
    }

    /// Shared body of `replace_text` and `reload`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` for a closed document.
    fn replace_text_with(&self, id: DocumentId, text: String, binary: bool) -> Result<u64, Error> {
        return self.write(|state| {
            let document = state.documents.get_mut(&id).ok_or(Error::DocumentNotFound { id })?;
            document.replace_text(text, binary);
            return Ok(document.revision);
        });
    }

    /// Run `f` with exclusive access, announcing the write to readers first.
    fn write<R>(&self, f: impl FnOnce(&mut WorkspaceState) -> R) -> R {
        self.pending_writes.fetch_add(1, Ordering::SeqCst);
        let _pending = PendingWrite(&self.pending_writes);
        let mut state = self.state.write();
        return f(&mut state);
    }
}

/// Everything behind the workspace lock.
#[derive(Debug, Default)]
struct WorkspaceState {
    /// Open documents by id.
    documents: BTreeMap<DocumentId, Document>,
    /// Next id to hand out; ids are never reused.
    next_id: u32,
}

impl WorkspaceState {
    /// Add a document under a fresh id.
    fn insert(&mut self, path: PathBuf, text: String, binary: bool) -> DocumentId {
        let id = DocumentId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.documents.insert(id, Document::new(id, path, text, binary));
        return id;
    }
}

/// Signed change in length caused by replacing `removed` bytes with `inserted` bytes.
fn length_delta(inserted: usize, removed: usize) -> Option<isize> {
    let inserted = isize::try_from(inserted).ok()?;
    let removed = isize::try_from(removed).ok()?;
    return inserted.checked_sub(removed);
}

/// Read a file as document text. Content that is not UTF-8 or contains NUL
/// bytes is kept lossily and flagged as binary.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the file does not exist or `Error::Io`
/// for other read failures.
fn read_document(path: &Path) -> Result<(String, bool), Error> {
    let bytes = match std::fs::read(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound { path: path.to_path_buf() });
        },
        Err(e) => return Err(Error::Io(e)),
        Ok(b) => b,
    };
    return match String::from_utf8(bytes) {
        Err(e) => Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true)),
        Ok(text) => {
            let binary = text.contains('\0');
            Ok((text, binary))
        },
    };
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn edits_before_a_range_shift_it() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Title\n\nbody\n");
        let body = TextRange::new(9, 13);

        workspace.apply_edit(id, TextRange::new(0, 0), "intro\n").unwrap();

        let read = workspace.read();
        let document = read.document(id).unwrap();
        let mapped = document.map_range(body, 0).unwrap();
        assert_eq!(mapped, TextRange::new(15, 19));
        assert_eq!(mapped.substring(document.text()), Some("body"));
    }

    #[test]
    fn edits_after_a_range_leave_it_alone() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Title\n");
        workspace.apply_edit(id, TextRange::new(8, 8), "more\n").unwrap();

        let read = workspace.read();
        let document = read.document(id).unwrap();
        assert_eq!(document.map_range(TextRange::new(2, 7), 0), Some(TextRange::new(2, 7)));
    }

    #[test]
    fn overlapping_edit_invalidates_tracking() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Title\n");
        workspace.apply_edit(id, TextRange::new(3, 5), "XX").unwrap();

        let read = workspace.read();
        assert_eq!(read.document(id).unwrap().map_range(TextRange::new(2, 7), 0), None);
    }

    #[test]
    fn full_replace_resets_tracking() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Title\n");
        workspace.replace_text(id, "x\n# Title\n").unwrap();

        let read = workspace.read();
        let document = read.document(id).unwrap();
        assert_eq!(document.revision(), 1);
        assert_eq!(document.map_range(TextRange::new(2, 7), 0), None);
    }

    #[test]
    fn out_of_bounds_edit_is_rejected() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "abc");
        let err = workspace.apply_edit(id, TextRange::new(2, 9), "x").unwrap_err();
        assert!(matches!(err, Error::EditOutOfBounds { len: 3, .. }));
    }

    #[test]
    fn closed_documents_disappear() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "abc");
        assert!(workspace.close(id));
        assert!(workspace.read().document(id).is_none());
        assert!(!workspace.close(id));
    }

    #[test]
    fn rename_keeps_identity() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "abc");
        workspace.rename(id, "b.md").unwrap();

        let read = workspace.read();
        assert_eq!(read.document_by_path(Path::new("b.md")).map(Document::id), Some(id));
        assert!(read.document_by_path(Path::new("a.md")).is_none());
    }

    #[test]
    fn line_col_is_one_based() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Title\n\nSee [foo].\n");
        let read = workspace.read();
        let document = read.document(id).unwrap();
        assert_eq!(document.line_col(0), Some((1, 1)));
        assert_eq!(document.line_col(13), Some((3, 5)));
        assert_eq!(document.line_col(999), None);
    }

    #[test]
    fn open_flags_binary_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.md");
        std::fs::write(&path, b"# a\0b\n").unwrap();

        let workspace = Workspace::new();
        let id = workspace.open(&path).unwrap();
        let read = workspace.read();
        assert!(read.document(id).unwrap().is_binary());
    }

    #[test]
    fn reload_closes_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.md");
        std::fs::write(&path, "# Gone\n").unwrap();

        let workspace = Workspace::new();
        let id = workspace.open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(!workspace.reload(id).unwrap());
        assert!(workspace.read().document(id).is_none());
    }

    #[test]
    fn directory_queries_go_through_the_guard() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n").unwrap();

        let workspace = Workspace::new();
        let read = workspace.read();
        assert!(read.directory_exists(dir.path()));
        assert!(!read.directory_exists(&dir.path().join("a.md")));
        assert!(!read.directory_exists(&dir.path().join("missing")));
    }

    #[test]
    fn pending_writer_cancels_readers() {
        let workspace = Arc::new(Workspace::new());
        let id = workspace.open_text("a.md", "abc");
        let read = workspace.read();
        assert_eq!(read.check_canceled(), Ok(()));

        let (done_tx, done_rx) = mpsc::channel();
        let writer = {
            let workspace = Arc::clone(&workspace);
            std::thread::spawn(move || {
                workspace.replace_text(id, "xyz").unwrap();
                done_tx.send(()).unwrap();
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while read.check_canceled().is_ok() {
            assert!(Instant::now() < deadline, "writer never announced itself");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(done_rx.try_recv().is_err(), "writer must wait for the reader");

        drop(read);
        writer.join().unwrap();
        assert_eq!(workspace.read().document(id).unwrap().text(), "xyz");
    }
}
