use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn normalize_rel_path(project_root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(project_root).with_context(|| {
        format!(
            "strip prefix {} from {}",
            project_root.display(),
            path.display()
        )
    })?;
    Ok(normalize_path(rel))
}

pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            _ => {}
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Resolves `reference` against the directory of `from`, collapsing `.` and
/// `..` components. Both sides are forward-slash relative paths.
pub fn resolve_relative(from: &str, reference: &str) -> String {
    let mut parts: Vec<&str> = if reference.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = from.split('/').collect();
        dir.pop();
        dir
    };
    for comp in reference.trim_start_matches('/').split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

pub fn line_count(content: &str) -> i64 {
    if content.is_empty() {
        return 0;
    }
    content.lines().count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_relative_paths() {
        assert_eq!(resolve_relative("pages/a.jsp", "b.jsp"), "pages/b.jsp");
        assert_eq!(resolve_relative("pages/a.jsp", "../b.jsp"), "b.jsp");
        assert_eq!(resolve_relative("a.jsp", "sub/b.jsp"), "sub/b.jsp");
        assert_eq!(resolve_relative("pages/a.jsp", "/b.jsp"), "b.jsp");
    }

    #[test]
    fn normalize_strips_curdir() {
        assert_eq!(normalize_path(Path::new("./a/b")), "a/b");
        assert_eq!(normalize_path(Path::new("")), ".");
    }
}
