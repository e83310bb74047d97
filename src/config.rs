use std::path::Path;

use crate::error::Error;

/// File name looked up in the project root.
pub const CONFIG_FILE_NAME: &str = ".docsym.toml";

/// Largest markdown file loaded into the workspace unless configured otherwise.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Project configuration loaded from `.docsym.toml`.
/// Include/exclude patterns are path prefixes relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefixes removed from the scan after `include` has been applied.
    exclude: Vec<String>,
    /// Prefixes to scan. Empty means everything.
    include: Vec<String>,
    /// Files larger than this many bytes are skipped.
    max_file_size: u64,
}

impl Config {
    /// Load `.docsym.toml` from `root`, or defaults when there is no such file.
    ///
    /// A file that exists but does not parse is an error; the defaults are
    /// only used when the user wrote nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        return match Self::load_from(&root.join(CONFIG_FILE_NAME)) {
            Err(Error::ConfigNotFound { .. }) => Ok(Self::default()),
            other => other,
        };
    }

    /// Load a config from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if the file does not exist,
    /// `Error::Io` for other read failures, or `Error::TomlDe` if the TOML is
    /// malformed.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        let raw: DocsymTomlConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        return Ok(Self {
            exclude: raw.exclude,
            include: raw.include,
            max_file_size: raw.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE),
        });
    }

    /// Size limit in bytes for loaded files.
    pub const fn max_file_size(&self) -> u64 {
        return self.max_file_size;
    }

    /// Check whether a markdown file path should be loaded.
    ///
    /// Included when there are no include prefixes or the path starts with
    /// one of them; an included path is dropped again if it starts with any
    /// exclude prefix.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));
        if !included {
            return false;
        }
        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            exclude: Vec::new(),
            include: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        };
    }
}

/// Raw TOML structure for `.docsym.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DocsymTomlConfig {
    /// See [`Config::exclude`].
    #[serde(default)]
    exclude: Vec<String>,
    /// See [`Config::include`].
    #[serde(default)]
    include: Vec<String>,
    /// See [`Config::max_file_size`].
    max_file_size: Option<u64>,
}
