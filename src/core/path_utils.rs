//! Pure helpers for POSIX-style string paths.
//!
//! The sandbox filesystem and the embedded engine both speak forward-slash
//! paths regardless of host platform, so these helpers work on plain strings
//! instead of `std::path`. No function here touches the filesystem.

/// Collapse duplicate separators and `.` segments, and resolve `..` where a
/// parent segment is available to consume it. A leading `/` is preserved.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join a base path and a segment, normalizing the result. An absolute
/// segment replaces the base entirely.
pub fn join(base: &str, segment: &str) -> String {
    if segment.starts_with('/') {
        return normalize(segment);
    }
    if base.is_empty() {
        return normalize(segment);
    }
    normalize(&format!("{base}/{segment}"))
}

/// Everything up to the final separator, or `/` / `.` for top-level paths.
pub fn dirname(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// The final path segment, empty only for the root itself.
pub fn basename(path: &str) -> String {
    let normalized = normalize(path);
    if normalized == "/" {
        return String::new();
    }
    match normalized.rfind('/') {
        Some(idx) => normalized[idx + 1..].to_string(),
        None => normalized,
    }
}

/// Re-key `path` relative to `root`. Paths outside the root are returned
/// normalized but otherwise untouched.
pub fn relative(root: &str, path: &str) -> String {
    let root = normalize(root);
    let path = normalize(path);

    if root == "/" || root == "." {
        return path.trim_start_matches('/').to_string();
    }
    if let Some(rest) = path.strip_prefix(&root) {
        return rest.trim_start_matches('/').to_string();
    }
    path
}
