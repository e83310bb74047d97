//! Loading a directory of markdown files into a [`Workspace`].

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Error;
use crate::workspace::{DocumentId, Workspace};

/// File extensions treated as markdown.
const MARKDOWN_EXTENSIONS: [&str; 2] = ["markdown", "md"];

/// Documents opened by [`load`] and the files it left out.
#[derive(Debug, Default)]
pub struct Loaded {
    /// Opened documents in walk order.
    pub documents: Vec<DocumentId>,
    /// Files skipped, each with the reason. Currently only `Error::FileTooLarge`.
    pub skipped: Vec<Error>,
}

/// Whether `path` has a markdown extension.
pub fn is_markdown(path: &Path) -> bool {
    return path
        .extension()
        .and_then(|ext| return ext.to_str())
        .is_some_and(|ext| return MARKDOWN_EXTENSIONS.iter().any(|m| return ext.eq_ignore_ascii_case(m)));
}

/// Open every markdown file under `root` that the config admits.
/// Files over the size limit are skipped and reported in [`Loaded::skipped`].
///
/// Files are opened as `root` joined with their relative path, the same form
/// [`path_in_project`] gives an explicitly named file.
///
/// # Errors
///
/// Returns `Error::Io` if a file's metadata or content cannot be read.
pub fn load(workspace: &Workspace, root: &Path, config: &Config) -> Result<Loaded, Error> {
    let mut loaded = Loaded::default();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file() && is_markdown(e.path()))
    {
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !config.should_scan(&relative.to_string_lossy()) {
            continue;
        }

        let size_bytes = entry.metadata().map_err(std::io::Error::from)?.len();
        if size_bytes > config.max_file_size() {
            let skipped = Error::FileTooLarge {
                file: relative.to_path_buf(),
                max_bytes: config.max_file_size(),
                size_bytes,
            };
            tracing::warn!(error = %skipped, "skipping file");
            loaded.skipped.push(skipped);
            continue;
        }

        loaded.documents.push(workspace.open(&normalize_path(path))?);
    }

    tracing::debug!(
        root = %root.display(),
        documents = loaded.documents.len(),
        skipped = loaded.skipped.len(),
        "loaded project"
    );
    return Ok(loaded);
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Keeps leading `..` when there is nothing left to pop.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    return components.iter().collect();
}

/// The path `file` is opened under when `root` is loaded as a project.
///
/// A file inside `root` becomes `root` joined with its relative path, whatever
/// form the caller wrote it in, so it shares one document with [`load`]. A
/// file outside `root` keeps its own normalized path.
///
/// # Errors
///
/// Returns `Error::Io` if a relative path needs the current directory and it
/// cannot be determined.
pub fn path_in_project(root: &Path, file: &Path) -> Result<PathBuf, Error> {
    let absolute_root = normalize_path(&std::path::absolute(root)?);
    let absolute_file = normalize_path(&std::path::absolute(file)?);
    let Ok(relative) = absolute_file.strip_prefix(&absolute_root) else {
        return Ok(normalize_path(file));
    };
    return Ok(normalize_path(&root.join(relative)));
}

/// Push one component, resolving `.` and `..` against what came before.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => {
            let can_pop = matches!(components.last(), Some(Component::Normal(_)));
            if can_pop {
                components.pop();
            } else if !matches!(components.last(), Some(Component::RootDir | Component::Prefix(_))) {
                components.push(component);
            }
        },
        other => components.push(other),
    }
}

/// Resolve a link target written in `source` to a normalized path.
/// An empty target refers to `source` itself.
pub fn resolve_link(source: &Path, target: &str) -> PathBuf {
    if target.is_empty() {
        return normalize_path(source);
    }
    let base = source.parent().unwrap_or_else(|| return Path::new(""));
    return normalize_path(&base.join(target));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize_path(Path::new("./docs/../README.md")), PathBuf::from("README.md"));
        assert_eq!(normalize_path(Path::new("docs/./a/b/../c.md")), PathBuf::from("docs/a/c.md"));
        assert_eq!(normalize_path(Path::new("../up.md")), PathBuf::from("../up.md"));
        assert_eq!(normalize_path(Path::new("/../abs.md")), PathBuf::from("/abs.md"));
    }

    #[test]
    fn links_resolve_against_the_source_directory() {
        let source = Path::new("docs/guide.md");
        assert_eq!(resolve_link(source, "api.md"), PathBuf::from("docs/api.md"));
        assert_eq!(resolve_link(source, "../README.md"), PathBuf::from("README.md"));
        assert_eq!(resolve_link(source, ""), PathBuf::from("docs/guide.md"));
        assert_eq!(resolve_link(Path::new("top.md"), "./docs/a.md"), PathBuf::from("docs/a.md"));
    }

    #[test]
    fn markdown_extensions() {
        assert!(is_markdown(Path::new("a.md")));
        assert!(is_markdown(Path::new("b.MARKDOWN")));
        assert!(!is_markdown(Path::new("c.txt")));
        assert!(!is_markdown(Path::new("md")));
    }

    #[test]
    fn load_respects_config_and_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs/drafts")).unwrap();
        std::fs::write(root.join("README.md"), "# Readme\n").unwrap();
        std::fs::write(root.join("docs/guide.md"), "# Guide\n").unwrap();
        std::fs::write(root.join("docs/drafts/wip.md"), "# Wip\n").unwrap();
        std::fs::write(root.join("docs/big.md"), "#".repeat(64)).unwrap();
        std::fs::write(root.join("docs/notes.txt"), "# Not markdown\n").unwrap();
        std::fs::write(
            root.join(crate::config::CONFIG_FILE_NAME),
            "exclude = [\"docs/drafts/\"]\nmax_file_size = 32\n",
        )
        .unwrap();

        let workspace = Workspace::new();
        let config = Config::load(root).unwrap();
        let loaded = load(&workspace, root, &config).unwrap();

        let read = workspace.read();
        let mut names: Vec<String> = loaded
            .documents
            .iter()
            .map(|id| {
                let path = read.document(*id).unwrap().path();
                path.strip_prefix(root).unwrap().to_string_lossy().into_owned()
            })
            .collect();
        names.sort();
        assert_eq!(names, vec!["README.md", "docs/guide.md"]);

        assert_eq!(loaded.skipped.len(), 1);
        assert!(matches!(
            &loaded.skipped[0],
            Error::FileTooLarge { file, max_bytes: 32, size_bytes: 64 } if file == Path::new("docs/big.md")
        ));
    }

    #[test]
    fn named_files_join_the_project_path_form() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let inside = root.join("docs/../docs/guide.md");
        assert_eq!(path_in_project(root, &inside).unwrap(), root.join("docs/guide.md"));

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            path_in_project(Path::new("."), &cwd.join("docs/guide.md")).unwrap(),
            PathBuf::from("docs/guide.md")
        );
        assert_eq!(path_in_project(&cwd, Path::new("./docs/guide.md")).unwrap(), cwd.join("docs/guide.md"));
        assert_eq!(
            path_in_project(root, Path::new("/elsewhere/../other.md")).unwrap(),
            PathBuf::from("/other.md")
        );
    }

    #[test]
    fn named_file_and_project_share_documents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("README.md"), "See [setup](docs/guide.md#setup).\n").unwrap();
        std::fs::write(root.join("docs/guide.md"), "# Guide\n\n## Setup\n").unwrap();

        let workspace = Workspace::new();
        let named = workspace
            .open(&path_in_project(root, &root.join("./docs/guide.md")).unwrap())
            .unwrap();
        let loaded = load(&workspace, root, &Config::default()).unwrap();

        assert_eq!(loaded.documents.len(), 2);
        assert!(loaded.documents.contains(&named));
        assert_eq!(workspace.read().documents().count(), 2);

        let read = workspace.read();
        let setup = crate::factory::symbol_at(&read, named, 12).unwrap();
        let usages = crate::usage::find_usages(&read, &setup).unwrap();
        assert_eq!(usages.len(), 2);
        assert!(usages.iter().any(|u| !u.is_declaration && u.document != named));
    }

    #[test]
    fn reloading_a_project_keeps_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n").unwrap();

        let workspace = Workspace::new();
        let config = Config::default();
        let first = load(&workspace, dir.path(), &config).unwrap();
        let second = load(&workspace, dir.path(), &config).unwrap();
        assert_eq!(first.documents, second.documents);
        assert_eq!(workspace.read().documents().count(), 1);
    }
}
