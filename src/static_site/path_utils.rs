use percent_encoding::percent_decode_str;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::router::strip_path_prefix;

/// Turns a raw request target into the cache key: URL prefix, fragment,
/// query string and leading slashes removed, percent-decoded, reduced to
/// normal path components. Empty results map to `default_document`.
/// The prefix is only removed on a segment boundary.
pub fn normalize_request_path(target: &str, url_prefix: &str, default_document: &str) -> String {
    let rest = strip_path_prefix(url_prefix, target).unwrap_or(target);

    let rest = rest.split('#').next().unwrap_or(rest);
    let rest = rest.split('?').next().unwrap_or(rest);
    let rest = rest.trim_start_matches('/');

    let decoded = percent_decode_str(rest).decode_utf8_lossy();

    let cleaned: Vec<String> = Path::new(&*decoded)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if cleaned.is_empty() {
        default_document.to_string()
    } else {
        cleaned.join("/")
    }
}

/// Maps a normalized key onto the document root. Directories resolve to
/// their default document. Returns `None` when nothing servable exists or
/// the target escapes the root through a symlink.
pub fn resolve_file(
    document_root: &Path,
    key: &str,
    default_document: &str,
) -> io::Result<Option<PathBuf>> {
    let canonical_root = fs::canonicalize(document_root)?;

    let mut candidate = canonical_root.join(key);
    if candidate.is_dir() {
        log::debug!("{} is a directory, using {}", candidate.display(), default_document);
        candidate = candidate.join(default_document);
    }

    let resolved = match fs::canonicalize(&candidate) {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("File not found: {}", candidate.display());
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    if !resolved.starts_with(&canonical_root) {
        log::warn!("Path escapes document root: {}", resolved.display());
        return Ok(None);
    }

    if !resolved.is_file() {
        log::warn!("Path exists but is not a regular file: {}", resolved.display());
        return Ok(None);
    }

    Ok(Some(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(target: &str) -> String {
        normalize_request_path(target, "/", "index.html")
    }

    #[test]
    fn strips_query_and_fragment() {
        assert_eq!(key("/index.html"), "index.html");
        assert_eq!(key("/index.html?x=1"), "index.html");
        assert_eq!(key("/index.html#y"), "index.html");
        assert_eq!(key("/index.html?x=1#y"), "index.html");
        assert_eq!(key("/a.css#frag?not-a-query"), "a.css");
    }

    #[test]
    fn root_maps_to_default_document() {
        assert_eq!(key("/"), "index.html");
        assert_eq!(key(""), "index.html");
        assert_eq!(key("/?q=1"), "index.html");
        assert_eq!(normalize_request_path("/", "/", "home.htm"), "home.htm");
    }

    #[test]
    fn strips_url_prefix() {
        assert_eq!(
            normalize_request_path("/static/css/app.css", "/static", "index.html"),
            "css/app.css"
        );
        assert_eq!(
            normalize_request_path("/static/", "/static/", "index.html"),
            "index.html"
        );
        assert_eq!(
            normalize_request_path("/static", "/static", "index.html"),
            "index.html"
        );
        assert_eq!(
            normalize_request_path("/static?v=2", "/static", "index.html"),
            "index.html"
        );
    }

    #[test]
    fn prefix_must_end_on_segment_boundary() {
        assert_eq!(
            normalize_request_path("/staticfoo/x", "/static", "index.html"),
            "staticfoo/x"
        );
        assert_ne!(
            normalize_request_path("/staticfoo/x", "/static", "index.html"),
            normalize_request_path("/static/foo/x", "/static", "index.html")
        );
    }

    #[test]
    fn decodes_and_drops_traversal() {
        assert_eq!(key("/my%20file.txt"), "my file.txt");
        assert_eq!(key("/../../etc/passwd"), "etc/passwd");
        assert_eq!(key("/a/./b//c.js"), "a/b/c.js");
        assert_eq!(key("/%2e%2e/secret"), "secret");
    }

    #[test]
    fn resolves_files_and_directories() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("index.html"), "root").unwrap();
        fs::create_dir(root.path().join("docs")).unwrap();
        fs::write(root.path().join("docs").join("index.html"), "docs").unwrap();

        let found = resolve_file(root.path(), "index.html", "index.html")
            .unwrap()
            .unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "root");

        let found = resolve_file(root.path(), "docs", "index.html").unwrap().unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "docs");

        assert!(resolve_file(root.path(), "missing.txt", "index.html")
            .unwrap()
            .is_none());
    }

    #[test]
    fn directory_without_default_document_is_missing() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("empty")).unwrap();
        assert!(resolve_file(root.path(), "empty", "index.html")
            .unwrap()
            .is_none());
    }
}
