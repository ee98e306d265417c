//! Conversion between native filesystem paths and URL-style module paths.
//!
//! Loader configuration and module addresses always use `/` separators.
//! Windows paths starting with a drive letter gain a `file:///` prefix so
//! the loader treats them as absolute URLs.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

const FILE_SCHEME: &str = "file://";

/// Extensions that suppress the default `.js` suffix.
const KNOWN_EXTENSIONS: &[&str] = &["js", "json", "mjs", "cjs", "css"];

/// Convert a native path to a URL-style path.
///
/// `C:\src\a.js` becomes `file:///C:/src/a.js`; `/src/a.js` is unchanged.
/// Applying it to its own output is a no-op.
#[must_use]
pub fn native_to_url(path: &str) -> String {
    native_to_url_with(path, MAIN_SEPARATOR)
}

/// Convert a URL-style path back to a native path.
///
/// Strips a `file://` prefix and the slash left in front of a drive letter.
#[must_use]
pub fn url_to_native(url: &str) -> String {
    url_to_native_with(url, MAIN_SEPARATOR)
}

fn native_to_url_with(path: &str, sep: char) -> String {
    let url = if sep == '/' {
        path.to_string()
    } else {
        path.replace(sep, "/")
    };

    if starts_with_drive_letter(&url) {
        format!("{FILE_SCHEME}/{url}")
    } else {
        url
    }
}

fn url_to_native_with(url: &str, sep: char) -> String {
    let mut path = url.strip_prefix(FILE_SCHEME).unwrap_or(url);

    if let Some(rest) = path.strip_prefix('/') {
        if starts_with_drive_letter(rest) {
            path = rest;
        }
    }

    if sep == '/' {
        path.to_string()
    } else {
        path.replace('/', &sep.to_string())
    }
}

fn starts_with_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// URL-style rendering of a native path.
#[must_use]
pub fn path_to_url(path: &Path) -> String {
    native_to_url(&path.to_string_lossy())
}

/// Native path for a URL-style address.
#[must_use]
pub fn url_to_path(url: &str) -> PathBuf {
    PathBuf::from(url_to_native(url))
}

/// Resolve `.` and `..` components without touching the filesystem.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// URL-style path of `path` relative to `base`.
///
/// Both paths are normalized lexically first. Returns an empty string when
/// they are the same directory, and walks up with `..` when `path` is not
/// beneath `base`.
#[must_use]
pub fn relative_url(path: &Path, base: &Path) -> String {
    let path = normalize_lexically(path);
    let base = normalize_lexically(base);

    if let Ok(rest) = path.strip_prefix(&base) {
        return join_components(rest);
    }

    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = vec!["..".to_string(); base_parts.len() - common];
    segments.extend(
        path_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    segments.join("/")
}

fn join_components(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Absolute native path of a module address, resolving base-relative
/// addresses against `base`.
#[must_use]
pub fn address_to_path(address: &str, base: &Path) -> PathBuf {
    let native = url_to_path(address);
    if native.is_absolute() {
        normalize_lexically(&native)
    } else {
        normalize_lexically(&base.join(native))
    }
}

/// The path used as importer when a specifier has no importing file,
/// such as an entry point or an explicitly mapped package.
#[must_use]
pub fn project_importer(base: &Path) -> PathBuf {
    base.join("package.json")
}

/// Append `.js` unless the last segment already has a known extension,
/// the way the loader names a module it is asked for.
#[must_use]
pub fn with_default_extension(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    let known = last
        .rsplit_once('.')
        .is_some_and(|(_, ext)| KNOWN_EXTENSIONS.contains(&ext));

    if known || path.is_empty() {
        path.to_string()
    } else {
        format!("{path}.js")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_path_unchanged() {
        assert_eq!(native_to_url_with("/home/dev/src/a.js", '/'), "/home/dev/src/a.js");
        assert_eq!(url_to_native_with("/home/dev/src/a.js", '/'), "/home/dev/src/a.js");
    }

    #[test]
    fn test_windows_drive_letter() {
        let url = native_to_url_with(r"C:\proj\src\a.js", '\\');
        assert_eq!(url, "file:///C:/proj/src/a.js");
        assert_eq!(url_to_native_with(&url, '\\'), r"C:\proj\src\a.js");
    }

    #[test]
    fn test_windows_relative_path() {
        let url = native_to_url_with(r"node_modules\leftpad\index.js", '\\');
        assert_eq!(url, "node_modules/leftpad/index.js");
        assert_eq!(
            url_to_native_with(&url, '\\'),
            r"node_modules\leftpad\index.js"
        );
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            (r"C:\a\b.js", '\\'),
            (r"d:\x", '\\'),
            (r"rel\dir\file.js", '\\'),
            ("/abs/dir/file.js", '/'),
            ("rel/file.js", '/'),
            ("", '/'),
        ];

        for (path, sep) in samples {
            let url = native_to_url_with(path, sep);
            assert_eq!(url_to_native_with(&url, sep), path, "round trip of {path}");
        }
    }

    #[test]
    fn test_native_to_url_idempotent() {
        for (path, sep) in [(r"C:\a\b.js", '\\'), ("/x/y", '/'), (r"a\b", '\\')] {
            let once = native_to_url_with(path, sep);
            let twice = native_to_url_with(&once, sep);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_file_scheme_stripped_on_unix() {
        assert_eq!(url_to_native_with("file:///home/a.js", '/'), "/home/a.js");
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/p/src/./lib/../foo")),
            PathBuf::from("/p/src/foo")
        );
    }

    #[test]
    fn test_relative_url_beneath_base() {
        assert_eq!(
            relative_url(Path::new("/p/node_modules/leftpad"), Path::new("/p")),
            "node_modules/leftpad"
        );
        assert_eq!(relative_url(Path::new("/p"), Path::new("/p")), "");
    }

    #[test]
    fn test_relative_url_outside_base() {
        assert_eq!(
            relative_url(Path::new("/shared/lib/a.js"), Path::new("/p/app")),
            "../../shared/lib/a.js"
        );
    }

    #[test]
    fn test_address_to_path() {
        let base = Path::new("/p");
        assert_eq!(
            address_to_path("src/a.js", base),
            PathBuf::from("/p/src/a.js")
        );
        assert_eq!(
            address_to_path("/other/b.js", base),
            PathBuf::from("/other/b.js")
        );
    }

    #[test]
    fn test_with_default_extension() {
        assert_eq!(with_default_extension("lodash/fp"), "lodash/fp.js");
        assert_eq!(with_default_extension("data.json"), "data.json");
        assert_eq!(with_default_extension("v1.2/x"), "v1.2/x.js");
        assert_eq!(with_default_extension(""), "");
    }
}
