//! Repository URL canonicalization and resolution.
//!
//! Ledger keys and module locations must agree on one canonical string
//! form or lookups silently miss and modules get skipped. The canonical
//! form here is the `url` crate's normalization (lowercased scheme and
//! host, spaces encoded as `%20`) with any trailing slash removed, applied
//! identically on both sides.

use url::Url;

/// Canonical string form of a repository URL.
pub fn canonicalize(raw: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(raw.trim())?;
    // Trailing slashes are empty path segments after parsing; dropping
    // them from the path keeps the authority intact no matter how many
    // there are.
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    let mut s = parsed.to_string();
    if parsed.path() == "/" && s.ends_with('/') {
        // An emptied path serializes back as a lone "/".
        s.pop();
    }
    Ok(s)
}

/// Resolve an evaluated tag destination against a module's repository URL.
///
/// The module URL is treated as a directory, so a relative template like
/// `../tags/trunk` against `http://host/repo/trunk` lands at
/// `http://host/repo/tags/trunk`. An absolute destination replaces the
/// base entirely.
pub fn resolve_destination(module_url: &str, evaluated: &str) -> Result<Url, url::ParseError> {
    let mut base = canonicalize(module_url)?;
    base.push('/');
    Url::parse(&base)?.join(evaluated.trim())
}

/// Path segments of a repository URL, split on `/` with empty segments
/// dropped. `http://host/repo/trunk` yields
/// `["http:", "host", "repo", "trunk"]`, so the last segment is the
/// module's directory name.
pub fn path_segments(url: &str) -> Vec<String> {
    url.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
