//! Django extractor. Walks the `urls.py` graph starting from the root
//! URLconf, following `include()` edges with a visited set, then resolves
//! each view function and mines its body for `request.GET` / `request.POST`
//! accesses through the Python expression parser.

use super::{EndpointExtractor, walk_files};
use crate::model::{Endpoint, FrameworkType, ParamDataType, ParamType, RouteParameter};
use crate::pyexpr::{PyExpr, ScopeArena, parse_statement};
use crate::pyexpr::atoms::group_entries;
use crate::scope::ScopeTracker;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub struct DjangoExtractor;

impl EndpointExtractor for DjangoExtractor {
    fn framework(&self) -> FrameworkType {
        FrameworkType::Django
    }

    fn extract(&self, root: &Path) -> Vec<Endpoint> {
        let Some(urlconf) = find_root_urlconf(root) else {
            error!(root = %root.display(), "no urls.py found");
            return Vec::new();
        };
        let mut endpoints = Vec::new();
        let mut visited = HashSet::new();
        collect_urlconf(root, &urlconf, "", &mut visited, &mut endpoints);
        endpoints
    }
}

/// Prefers the `urls.py` sitting next to `settings.py`; falls back to the
/// shallowest `urls.py` in the tree.
fn find_root_urlconf(root: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for file in walk_files(root, Some(&["py"])) {
        if file.rel_path.ends_with("urls.py") {
            candidates.push(PathBuf::from(&file.rel_path));
        }
    }
    candidates.sort_by_key(|p| p.components().count());
    for candidate in &candidates {
        let settings = candidate.with_file_name("settings.py");
        if root.join(&settings).is_file() {
            return Some(candidate.clone());
        }
    }
    candidates.into_iter().next()
}

fn collect_urlconf(
    root: &Path,
    urlconf: &Path,
    prefix: &str,
    visited: &mut HashSet<PathBuf>,
    endpoints: &mut Vec<Endpoint>,
) {
    if !visited.insert(urlconf.to_path_buf()) {
        return;
    }
    let abs = root.join(urlconf);
    let Ok(source) = crate::util::read_to_string(&abs) else {
        return;
    };
    let arena = ScopeArena::parse(&source);
    let rel = crate::util::normalize_path(urlconf);

    for (pattern, view, line) in url_entries(&source) {
        let (path, params) = translate_pattern(&pattern);
        let url = join_prefix(prefix, &path);

        if let Some(target) = view.strip_prefix("include:") {
            let module = arena
                .resolve_import(0, target.split('.').next().unwrap_or(target))
                .map(|resolved| {
                    let tail: Vec<&str> = target.split('.').skip(1).collect();
                    if tail.is_empty() {
                        resolved
                    } else {
                        format!("{resolved}/{}", tail.join("/"))
                    }
                })
                .unwrap_or_else(|| target.replace('.', "/"));
            let child = PathBuf::from(format!("{module}.py"));
            if root.join(&child).is_file() {
                collect_urlconf(root, &child, &url, visited, endpoints);
            } else {
                debug!(module = target, "include target not found");
            }
            continue;
        }

        let resolved = resolve_view(root, &arena, &view);
        let mut endpoint = match &resolved {
            Some(found) => {
                let mut e = Endpoint::new(&url, "GET", &found.file_path);
                e.start_line = found.start_line;
                e.end_line = found.end_line;
                e
            }
            None => {
                debug!(view, line, "view not resolved, recording route only");
                Endpoint::new(&url, "GET", &rel)
            }
        };
        for param in &params {
            endpoint.add_parameter(param.clone());
        }

        let access = resolved
            .as_ref()
            .map(|found| mine_request_access(&found.body, found.start_line))
            .unwrap_or_default();
        for param in &access.query_params {
            endpoint.add_parameter(RouteParameter::query(param.clone()));
        }
        if access.uses_post {
            let mut variant = Endpoint::new(&url, "POST", &endpoint.file_path);
            variant.start_line = endpoint.start_line;
            variant.end_line = endpoint.end_line;
            for param in endpoint.parameters.values() {
                variant.add_parameter(param.clone());
            }
            for param in &access.post_params {
                variant.add_parameter(RouteParameter::new(
                    param.clone(),
                    ParamType::QueryString,
                ));
            }
            endpoint.add_variant(variant);
        }
        endpoints.push(endpoint);
    }
}

/// Extracts `(pattern, view, line)` triples from `url(...)`, `path(...)`
/// and `re_path(...)` entries. An `include('x.urls')` view is returned as
/// `include:x.urls`.
fn url_entries(source: &str) -> Vec<(String, String, i64)> {
    let mut entries = Vec::new();
    for (statement, line) in joined_statements(source) {
        let trimmed = statement.trim();
        // only route declarations, not imports of these names
        if trimmed.starts_with("from ") || trimmed.starts_with("import ") {
            continue;
        }
        // one urlpatterns list joins into a single statement holding many
        // calls, so every occurrence must be scanned
        for call_start in call_positions(trimmed) {
            let Some(group) = balanced_group(&trimmed[call_start..]) else {
                continue;
            };
            let args = group_entries(group);
            if args.len() < 2 {
                continue;
            }
            let Some(pattern) = unquote(&args[0]) else {
                continue;
            };
            let view_arg = args[1].trim();
            let view = if let Some(rest) = view_arg.strip_prefix("include(") {
                match unquote(rest.trim_end_matches(')')) {
                    Some(target) => format!("include:{target}"),
                    None => continue,
                }
            } else {
                unquote(view_arg).unwrap_or_else(|| view_arg.to_string())
            };
            entries.push((pattern, view, line));
        }
    }
    entries
}

/// Byte offsets of the `(` of every top-level `url(` / `path(` /
/// `re_path(` call in the statement.
fn call_positions(statement: &str) -> Vec<usize> {
    let bytes = statement.as_bytes();
    let mut positions = Vec::new();
    for head in ["url(", "path(", "re_path("] {
        let mut from = 0;
        while let Some(found) = statement[from..].find(head) {
            let start = from + found;
            let preceded = start > 0
                && (bytes[start - 1].is_ascii_alphanumeric()
                    || bytes[start - 1] == b'_'
                    || bytes[start - 1] == b'.');
            if !preceded {
                positions.push(start + head.len() - 1);
            }
            from = start + head.len();
        }
    }
    positions.sort_unstable();
    positions.dedup();
    positions
}

/// Joins physical lines into logical statements while parentheses or
/// brackets remain open.
fn joined_statements(source: &str) -> Vec<(String, i64)> {
    let mut statements = Vec::new();
    let mut tracker = ScopeTracker::new();
    let mut current = String::new();
    let mut start_line = 0i64;
    for (idx, line) in source.lines().enumerate() {
        if current.is_empty() {
            start_line = idx as i64;
        }
        for ch in line.chars() {
            tracker.interpret(ch);
        }
        current.push_str(line);
        if tracker.at_top_level() {
            statements.push((std::mem::take(&mut current), start_line));
            tracker = ScopeTracker::new();
        } else {
            current.push(' ');
        }
    }
    if !current.is_empty() {
        statements.push((current, start_line));
    }
    statements
}

/// Returns the contents of the balanced parenthesized group starting at
/// `text[0] == '('`, including the surrounding parens.
fn balanced_group(text: &str) -> Option<&str> {
    let mut tracker = ScopeTracker::new();
    for (idx, ch) in text.char_indices() {
        tracker.interpret(ch);
        if idx > 0 && tracker.at_top_level() {
            return Some(&text[..=idx]);
        }
    }
    None
}

fn unquote(text: &str) -> Option<String> {
    let trimmed = text.trim().trim_start_matches(['r', 'b']);
    let first = trimmed.chars().next()?;
    if first != '\'' && first != '"' {
        return None;
    }
    let inner = trimmed.get(1..trimmed.len().saturating_sub(1))?;
    if trimmed.len() < 2 || !trimmed.ends_with(first) {
        return None;
    }
    Some(inner.to_string())
}

/// Converts a Django pattern to a path and its path parameters. Handles
/// both `path()` converters (`<int:pk>`) and regex named groups
/// (`(?P<pk>[0-9]+)`).
fn translate_pattern(pattern: &str) -> (String, Vec<RouteParameter>) {
    let mut path = String::new();
    let mut params = Vec::new();
    let stripped = pattern.trim_start_matches('^').trim_end_matches('$');

    let mut chars = stripped.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '<' => {
                let spec: String = chars.by_ref().take_while(|c| *c != '>').collect();
                let (converter, name) = match spec.split_once(':') {
                    Some((c, n)) => (c, n),
                    None => ("str", spec.as_str()),
                };
                params.push(
                    RouteParameter::path_variable(name.to_string())
                        .with_data_type(converter_type(converter)),
                );
                path.push('{');
                path.push_str(name);
                path.push('}');
            }
            '(' if chars.peek() == Some(&'?') => {
                let group: String = chars.by_ref().take_while(|c| *c != ')').collect();
                if let Some(rest) = group.strip_prefix("?P<") {
                    if let Some((name, charset)) = rest.split_once('>') {
                        let data_type = if charset.contains("0-9") || charset.contains("\\d") {
                            ParamDataType::Integer
                        } else {
                            ParamDataType::String
                        };
                        params.push(
                            RouteParameter::path_variable(name.to_string())
                                .with_data_type(data_type),
                        );
                        path.push('{');
                        path.push_str(name);
                        path.push('}');
                    }
                }
            }
            _ => path.push(ch),
        }
    }
    (path, params)
}

fn converter_type(converter: &str) -> ParamDataType {
    match converter {
        "int" => ParamDataType::Integer,
        _ => ParamDataType::String,
    }
}

fn join_prefix(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

struct ResolvedView {
    file_path: String,
    start_line: i64,
    end_line: i64,
    body: Vec<String>,
}

/// Resolves a view reference like `views.detail` or `app.views.detail`
/// through the URLconf's imports to a function in a module file.
fn resolve_view(root: &Path, arena: &ScopeArena, view: &str) -> Option<ResolvedView> {
    let mut parts: Vec<&str> = view.split('.').collect();
    let function = parts.pop()?;
    if parts.is_empty() {
        // bare name imported directly: `from app.views import detail`
        let module = arena.resolve_import(0, function)?;
        let (module_path, name) = module.rsplit_once('/')?;
        return load_view(root, module_path, name);
    }
    let head = parts[0];
    let resolved_head = arena
        .resolve_import(0, head)
        .unwrap_or_else(|| head.to_string());
    let mut module_parts = vec![resolved_head];
    module_parts.extend(parts[1..].iter().map(|s| s.to_string()));
    load_view(root, &module_parts.join("/"), function)
}

fn load_view(root: &Path, module_path: &str, function: &str) -> Option<ResolvedView> {
    let rel = format!("{module_path}.py");
    let abs = root.join(&rel);
    let source = crate::util::read_to_string(&abs).ok()?;
    let arena = ScopeArena::parse(&source);
    let idx = arena.find_function(function)?;
    let scope = arena.get(idx);
    let body = source
        .lines()
        .skip(scope.start_line.max(0) as usize)
        .take((scope.end_line - scope.start_line).max(0) as usize)
        .map(str::to_string)
        .collect();
    Some(ResolvedView {
        file_path: crate::util::normalize_path(Path::new(&rel)),
        start_line: scope.start_line,
        end_line: scope.end_line,
        body,
    })
}

#[derive(Default)]
struct RequestAccess {
    query_params: Vec<String>,
    post_params: Vec<String>,
    uses_post: bool,
}

/// Parses every statement in a view body and walks the expression trees
/// looking for `request.GET` / `request.POST` indexing or `.get()` calls.
fn mine_request_access(body: &[String], first_line: i64) -> RequestAccess {
    let mut access = RequestAccess::default();
    for (statement, offset) in joined_statements(&body.join("\n")) {
        let tree = parse_statement(&statement, first_line + offset);
        tree.walk(&mut |node| match node {
            PyExpr::Indexer { subject, index, .. } => {
                if let (Some(path), PyExpr::StringPrimitive { value, .. }) =
                    (subject.member_path(), index.as_ref())
                {
                    record_access(&mut access, &path, value);
                }
            }
            PyExpr::FunctionCall { subject, args, .. } => {
                if let Some(path) = subject.member_path() {
                    if let Some(source) = path.strip_suffix(".get") {
                        if let Some(PyExpr::StringPrimitive { value, .. }) = args.first() {
                            record_access(&mut access, source, value);
                        }
                    } else if path == "request.POST" || path.starts_with("request.POST.") {
                        access.uses_post = true;
                    }
                }
            }
            PyExpr::MemberAccess { .. } => {
                if node.member_path().as_deref() == Some("request.POST") {
                    access.uses_post = true;
                }
            }
            _ => {}
        });
    }
    access
}

fn record_access(access: &mut RequestAccess, source: &str, name: &str) {
    match source {
        "request.GET" | "request.REQUEST" => {
            if !access.query_params.contains(&name.to_string()) {
                access.query_params.push(name.to_string());
            }
        }
        "request.POST" => {
            access.uses_post = true;
            if !access.post_params.contains(&name.to_string()) {
                access.post_params.push(name.to_string());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_converters_become_placeholders() {
        let (path, params) = translate_pattern("articles/<int:year>/<slug:title>/");
        assert_eq!(path, "articles/{year}/{title}/");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "year");
        assert_eq!(params[0].data_type, ParamDataType::Integer);
        assert_eq!(params[1].data_type, ParamDataType::String);
    }

    #[test]
    fn regex_named_groups_become_placeholders() {
        let (path, params) = translate_pattern(r"^posts/(?P<pk>[0-9]+)/$");
        assert_eq!(path, "posts/{pk}/");
        assert_eq!(params[0].name, "pk");
        assert_eq!(params[0].data_type, ParamDataType::Integer);
    }

    #[test]
    fn url_entries_find_routes_and_includes() {
        let source = r#"
from django.urls import path, include
from app import views

urlpatterns = [
    path('users/', views.index),
    path('users/<int:pk>/', views.detail),
    path('blog/', include('blog.urls')),
]
"#;
        let entries = url_entries(source);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "users/");
        assert_eq!(entries[0].1, "views.index");
        assert_eq!(entries[2].1, "include:blog.urls");
    }

    #[test]
    fn multiline_entries_are_joined() {
        let source = "urlpatterns = [\n    url(r'^search/$',\n        views.search),\n]\n";
        let entries = url_entries(source);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "^search/$");
    }

    #[test]
    fn request_access_mining() {
        let body: Vec<String> = [
            "def search(request):",
            "    q = request.GET['q']",
            "    page = request.GET.get('page')",
            "    if request.method == 'POST':",
            "        name = request.POST['name']",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let access = mine_request_access(&body, 10);
        assert_eq!(access.query_params, vec!["q", "page"]);
        assert!(access.uses_post);
        assert_eq!(access.post_params, vec!["name"]);
    }
}
