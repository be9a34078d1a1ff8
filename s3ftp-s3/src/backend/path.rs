//! Backend path handling

/// The backend's root directory
pub const ROOT: &str = ".";

/// Lexically clean a path into backend-relative form.
///
/// Leading separators are dropped, `.` and empty segments collapse, and
/// `..` removes the previous segment (or nothing, at the root).
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        ROOT.to_string()
    } else {
        segments.join("/")
    }
}

pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Parent directory of a normalised path, `None` when it is the root
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(dir, _)| dir)
}

/// Last segment of a normalised path
pub fn base_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Ancestors from the top down: `a/b/c` gives `a`, `a/b`, `a/b/c`
pub fn ancestors(dir: &str) -> impl Iterator<Item = &str> {
    dir.match_indices('/')
        .map(move |(idx, _)| &dir[..idx])
        .chain(std::iter::once(dir))
}
