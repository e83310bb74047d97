use std::path::Path;

use docsym::config::CONFIG_FILE_NAME;
use docsym::error::Error;

/// ANSI bold, applied to markdown headings on stderr.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as markdown with bold headings and print it to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render a config error, pointing at the file to fix.
fn render_config_error(e: &toml::de::Error) -> String {
    return format!(
        "\
# Error: Invalid Config

`{CONFIG_FILE_NAME}` could not be read: {e}

## Fix

Supported keys:

    include = [\"docs/\"]
    exclude = [\"docs/drafts/\"]
    max_file_size = 16777216
"
    );
}

/// Render an error as a structured markdown diagnostic: what happened and,
/// where there is one, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::FileTooLarge {
            file,
            max_bytes,
            size_bytes,
        } => render_file_too_large(file, *size_bytes, *max_bytes),
        Error::InvalidOffset { len, offset, path } => render_invalid_offset(path, *offset, *len),
        Error::NoSymbolAtOffset { offset, path } => render_no_symbol(path, *offset),
        Error::TomlDe(inner) => render_config_error(inner),
        _ => render_generic(e),
    };
}

/// Render a file that exceeds the configured size limit.
fn render_file_too_large(file: &Path, size_bytes: u64, max_bytes: u64) -> String {
    return format!(
        "\
# Error: File Too Large

`{}` is {size_bytes} bytes (max {max_bytes}).

## Fix

Raise `max_file_size` in `{CONFIG_FILE_NAME}` or exclude the file.
",
        file.display()
    );
}

/// Render errors that need no fix section.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::ConfigNotFound { path } => format!(
            "\
# Error: Config Not Found

`{}` does not exist.
",
            path.display()
        ),
        Error::FileNotFound { path } => format!(
            "\
# Error: File Not Found

`{}` does not exist.
",
            path.display()
        ),
        Error::Io(inner) => format!(
            "\
# Error: I/O

{inner}
"
        ),
        Error::ParseFailed { file, reason } => format!(
            "\
# Error: Parse Failed

Could not parse `{}`: {reason}
",
            file.display()
        ),
        Error::Watch(inner) => format!(
            "\
# Error: Watch Failed

{inner}
"
        ),
        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

/// Render an offset outside the document or inside a character.
fn render_invalid_offset(path: &Path, offset: usize, len: usize) -> String {
    return format!(
        "\
# Error: Invalid Offset

Offset {offset} is not a character position in `{}` ({len} bytes).

Offsets are UTF-8 byte offsets from the start of the file, at most {len}.
",
        path.display()
    );
}

/// Render an offset that no header or label covers.
fn render_no_symbol(path: &Path, offset: usize) -> String {
    return format!(
        "\
# Error: No Symbol

Nothing at offset {offset} in `{}` is a header or link label.

## Fix

List the symbols and their positions:

    docsym symbols {}
",
        path.display(),
        path.display()
    );
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn no_symbol_suggests_listing() {
        let md = render_error(&Error::NoSymbolAtOffset {
            offset: 8,
            path: PathBuf::from("docs/a.md"),
        });
        assert!(md.starts_with("# Error: No Symbol"));
        assert!(md.contains("docsym symbols docs/a.md"));
    }

    #[test]
    fn invalid_offset_names_the_length() {
        let md = render_error(&Error::InvalidOffset {
            len: 12,
            offset: 40,
            path: PathBuf::from("a.md"),
        });
        assert!(md.contains("Offset 40"));
        assert!(md.contains("12 bytes"));
    }

    #[test]
    fn bad_config_lists_supported_keys() {
        let inner = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let md = render_error(&Error::TomlDe(inner));
        assert!(md.contains(CONFIG_FILE_NAME));
        assert!(md.contains("max_file_size"));
    }

    #[test]
    fn every_error_renders_a_heading() {
        let errors = [
            Error::FileNotFound {
                path: PathBuf::from("missing.md"),
            },
            Error::FileTooLarge {
                file: PathBuf::from("big.md"),
                max_bytes: 10,
                size_bytes: 20,
            },
            Error::Io(std::io::Error::other("disk on fire")),
        ];
        for e in &errors {
            assert!(render_error(e).starts_with("# Error"));
        }
    }
}
