//! Framework extractors. Each one consumes a project directory and emits
//! raw [`Endpoint`] records; the endpoint database normalizes and indexes
//! them afterwards.

use crate::model::{Endpoint, FrameworkType};
use anyhow::Result;
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

pub mod django;
pub mod dotnet_mvc;
pub mod dotnet_webforms;
pub mod jsp;
pub mod rails;
pub mod spring;
pub mod struts;

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
}

/// Common extractor contract: read-only over the project tree, never
/// fails the run. A missing root or unreadable file is logged and skipped.
pub trait EndpointExtractor {
    fn framework(&self) -> FrameworkType;
    fn extract(&self, root: &Path) -> Vec<Endpoint>;
}

pub fn extractor_for(framework: FrameworkType) -> Option<Box<dyn EndpointExtractor>> {
    let extractor: Box<dyn EndpointExtractor> = match framework {
        FrameworkType::Jsp => Box::new(jsp::JspExtractor),
        FrameworkType::SpringMvc => Box::new(spring::SpringMvcExtractor),
        FrameworkType::Rails => Box::new(rails::RailsExtractor),
        FrameworkType::DotNetMvc => Box::new(dotnet_mvc::DotNetMvcExtractor),
        FrameworkType::DotNetWebForms => Box::new(dotnet_webforms::DotNetWebFormsExtractor),
        FrameworkType::Struts => Box::new(struts::StrutsExtractor),
        FrameworkType::Django => Box::new(django::DjangoExtractor),
        FrameworkType::None | FrameworkType::Detect => return None,
    };
    Some(extractor)
}

/// Runs the extractor selected by `framework` over an already-materialized
/// directory. `Detect` is resolved here; `None` yields an empty catalog.
pub fn extract(root: &Path, framework: FrameworkType) -> Vec<Endpoint> {
    if !root.is_dir() {
        error!(root = %root.display(), "project root is missing or not a directory");
        return Vec::new();
    }
    let resolved = if framework == FrameworkType::Detect {
        crate::detect::detect(root)
    } else {
        framework
    };
    match extractor_for(resolved) {
        Some(extractor) => extractor.extract(root),
        None => {
            warn!(framework = resolved.as_str(), "no extractor for framework");
            Vec::new()
        }
    }
}

/// Walks the project tree in deterministic order, keeping files whose
/// extension is in `extensions` (or every file when `extensions` is None).
pub fn walk_files(root: &Path, extensions: Option<&[&str]>) -> Vec<SourceFile> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .require_git(false)
        .filter_entry(|entry| entry.file_name() != OsStr::new(".git"))
        .build();
    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "walk error");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if let Some(wanted) = extensions {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            let keep = ext
                .as_deref()
                .map(|e| wanted.contains(&e))
                .unwrap_or(false);
            if !keep {
                continue;
            }
        }
        let rel_path = match crate::util::normalize_rel_path(root, path) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "skipping unresolvable path");
                continue;
            }
        };
        files.push(SourceFile {
            rel_path,
            abs_path: path.to_path_buf(),
        });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    files
}

/// Reads one walked file, logging and skipping on failure.
pub(crate) fn read_source(file: &SourceFile) -> Option<String> {
    let result: Result<String> = crate::util::read_to_string(&file.abs_path);
    match result {
        Ok(source) => Some(source),
        Err(err) => {
            warn!(file = file.rel_path, error = %err, "skipping unreadable file");
            None
        }
    }
}

/// Glues two route fragments with exactly one separator between them.
pub(crate) fn join_paths(left: &str, right: &str) -> String {
    let left_trimmed = left.trim_end_matches('/');
    let right_trimmed = right.trim_start_matches('/');
    match (left_trimmed.is_empty(), right_trimmed.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{right_trimmed}"),
        (false, true) => left_trimmed.to_string(),
        (false, false) => format!("{left_trimmed}/{right_trimmed}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_paths_glues_single_separator() {
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("", "users"), "/users");
        assert_eq!(join_paths("/api", ""), "/api");
        assert_eq!(join_paths("", ""), "/");
    }

    #[test]
    fn missing_root_yields_empty_catalog() {
        let endpoints = extract(Path::new("/no/such/dir"), FrameworkType::SpringMvc);
        assert!(endpoints.is_empty());
    }
}
