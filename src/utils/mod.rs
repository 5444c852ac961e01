//! Utility functions and helpers

use std::path::{Component, Path, PathBuf};

/// Resolve `segments` against `root` the way JS build tooling does:
/// segments stack left to right, an absolute segment restarts resolution,
/// and `.`/`..` components collapse lexically (no filesystem access).
pub fn resolve<I, S>(root: &Path, segments: I) -> PathBuf
where
    I: IntoIterator<Item = S>,
    S: AsRef<Path>,
{
    let mut out = root.to_path_buf();
    for segment in segments {
        let segment = segment.as_ref();
        if segment.is_absolute() {
            out = segment.to_path_buf();
        } else {
            out.push(segment);
        }
    }
    normalize(&out)
}

/// Collapse `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping at the root is a no-op
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Check if a path is within a directory
pub fn is_subpath(path: &Path, base: &Path) -> bool {
    path.canonicalize()
        .ok()
        .and_then(|p| base.canonicalize().ok().map(|b| p.starts_with(&b)))
        .unwrap_or(false)
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_segments() {
        let root = Path::new("/work/app");
        assert_eq!(
            resolve(root, ["dist", "pkg"]),
            PathBuf::from("/work/app/dist/pkg")
        );
        assert_eq!(
            resolve(root, ["./src/js/entry.js"]),
            PathBuf::from("/work/app/src/js/entry.js")
        );
    }

    #[test]
    fn test_resolve_absolute_segment_restarts() {
        let root = Path::new("/work/app");
        assert_eq!(
            resolve(root, ["ignored", "/elsewhere/out"]),
            PathBuf::from("/elsewhere/out")
        );
    }

    #[test]
    fn test_resolve_parent_components() {
        let root = Path::new("/work/app");
        assert_eq!(resolve(root, ["../sibling"]), PathBuf::from("/work/sibling"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/foo/./bar/../baz")),
            PathBuf::from("/foo/baz")
        );
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("foo/../bar")), PathBuf::from("bar"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_duration() {
        use std::time::Duration;

        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(1.5)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5.00s");
    }
}
