//! JSP extractor. Every `.jsp` under the web root becomes a GET endpoint
//! with a POST variant. Parameters come from `request.getParameter` and
//! multipart accesses in scriptlets, propagate through the static include
//! graph, and are supplemented by a markup pass over hyperlinks and forms.
//! `web.xml` contributes welcome files and servlet mappings; `@WebServlet`
//! annotated classes contribute their declared patterns.

use super::{EndpointExtractor, read_source, walk_files};
use crate::cleaner;
use crate::database;
use crate::model::{Endpoint, FrameworkType, ParamType, RouteParameter};
use crate::tokenizer::{JAVA_RULES, JSP_RULES, TokenKind, tokenize_all};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

pub struct JspExtractor;

impl EndpointExtractor for JspExtractor {
    fn framework(&self) -> FrameworkType {
        FrameworkType::Jsp
    }

    fn extract(&self, root: &Path) -> Vec<Endpoint> {
        let web_root = find_web_root(root);
        let mut files: HashMap<String, JspFile> = HashMap::new();
        let mut order = Vec::new();

        for file in walk_files(root, Some(&["jsp"])) {
            let Some(url) = url_for(&file.rel_path, &web_root) else {
                continue;
            };
            let Some(source) = read_source(&file) else {
                continue;
            };
            let parsed = JspFile {
                url,
                params: scan_scriptlet_params(&source),
                includes: scan_includes(&source, &file.rel_path),
                markup: strip_scriptlets(&source),
                line_count: crate::util::line_count(&source),
            };
            files.insert(file.rel_path.clone(), parsed);
            order.push(file.rel_path.clone());
        }

        let mut endpoints = Vec::new();
        for rel_path in &order {
            let file = &files[rel_path];
            let mut visited = HashSet::new();
            let mut params = Vec::new();
            collect_params(&files, rel_path, &mut visited, &mut params);

            let mut endpoint = Endpoint::new(&file.url, "GET", rel_path)
                .with_lines(1, file.line_count + 1);
            let mut variant = Endpoint::new(&file.url, "POST", rel_path)
                .with_lines(1, file.line_count + 1);
            for param in &params {
                endpoint.add_parameter(param.clone());
                variant.add_parameter(param.clone());
            }
            endpoint.add_variant(variant);
            endpoints.push(endpoint);
        }

        endpoints.extend(descriptor_endpoints(root, &web_root, &files));
        endpoints.extend(annotated_servlets(root));
        markup_pass(&files, &order, &mut endpoints);
        endpoints
    }
}

struct JspFile {
    url: String,
    params: Vec<RouteParameter>,
    includes: Vec<String>,
    markup: String,
    line_count: i64,
}

/// The directory containing `WEB-INF/web.xml`, relative to the project
/// root. Build output trees are ignored. Falls back to the root itself.
fn find_web_root(root: &Path) -> String {
    for file in walk_files(root, Some(&["xml"])) {
        if !file.rel_path.ends_with("WEB-INF/web.xml") && file.rel_path != "web.xml" {
            continue;
        }
        let in_build_output = file
            .rel_path
            .split('/')
            .any(|seg| seg == "target" || seg == "out" || seg == "build");
        if in_build_output {
            continue;
        }
        let web_root = file
            .rel_path
            .trim_end_matches("web.xml")
            .trim_end_matches('/')
            .trim_end_matches("WEB-INF")
            .trim_end_matches('/')
            .to_string();
        debug!(web_root, "web root located from deployment descriptor");
        return web_root;
    }
    String::new()
}

fn url_for(rel_path: &str, web_root: &str) -> Option<String> {
    if web_root.is_empty() {
        return Some(format!("/{rel_path}"));
    }
    let tail = rel_path.strip_prefix(web_root)?;
    Some(format!("/{}", tail.trim_start_matches('/')))
}

/// `request.getParameter("x")` and multipart part accesses inside
/// scriptlets, with the line each occurs on.
fn scan_scriptlet_params(source: &str) -> Vec<RouteParameter> {
    let tokens = tokenize_all(source, &JSP_RULES);
    let mut params: Vec<RouteParameter> = Vec::new();
    let mut i = 0usize;
    while i + 4 < tokens.len() {
        let window = &tokens[i..];
        let accessor = window[0].is_word("request")
            && window[1].is_punct('.')
            && matches!(window[2].kind, TokenKind::Word)
            && window[3].is_punct('(')
            && matches!(window[4].kind, TokenKind::Str);
        if accessor {
            let param_type = match window[2].text.as_str() {
                "getParameter" | "getParameterValues" => Some(ParamType::QueryString),
                "getPart" => Some(ParamType::Files),
                _ => None,
            };
            if let Some(param_type) = param_type {
                let name = window[4].text.clone();
                if !params.iter().any(|p| p.name == name) {
                    params.push(RouteParameter::new(name, param_type));
                }
                i += 5;
                continue;
            }
        }
        i += 1;
    }
    params
}

/// Static include targets, resolved against the including file.
fn scan_includes(source: &str, rel_path: &str) -> Vec<String> {
    let mut includes = Vec::new();
    for line in source.lines() {
        let reference = directive_include(line).or_else(|| action_include(line));
        if let Some(reference) = reference {
            includes.push(crate::util::resolve_relative(rel_path, &reference));
        }
    }
    includes
}

fn directive_include(line: &str) -> Option<String> {
    let pos = line.find("<%@")?;
    let tail = &line[pos..];
    if !tail.contains("include") {
        return None;
    }
    attr_value(tail, "file")
}

fn action_include(line: &str) -> Option<String> {
    let pos = line.find("<jsp:include")?;
    attr_value(&line[pos..], "page")
}

fn attr_value(text: &str, attr: &str) -> Option<String> {
    let pos = text.find(&format!("{attr}="))? + attr.len() + 1;
    let rest = &text[pos..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = &rest[1..];
    let end = inner.find(quote)?;
    Some(inner[..end].to_string())
}

/// Transitive parameter collection over the include graph. The visited set
/// makes mutual includes terminate; each file contributes once.
fn collect_params(
    files: &HashMap<String, JspFile>,
    rel_path: &str,
    visited: &mut HashSet<String>,
    out: &mut Vec<RouteParameter>,
) {
    if !visited.insert(rel_path.to_string()) {
        return;
    }
    let Some(file) = files.get(rel_path) else {
        return;
    };
    for param in &file.params {
        if !out.iter().any(|p| p.name == param.name) {
            out.push(param.clone());
        }
    }
    for include in &file.includes {
        collect_params(files, include, visited, out);
    }
}

/// Removes `<% ... %>` spans so the markup pass only sees template text.
fn strip_scriptlets(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(open) = rest.find("<%") {
        out.push_str(&rest[..open]);
        match rest[open..].find("%>") {
            Some(close) => rest = &rest[open + close + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Welcome files and servlet mappings from `web.xml`.
fn descriptor_endpoints(
    root: &Path,
    web_root: &str,
    files: &HashMap<String, JspFile>,
) -> Vec<Endpoint> {
    let descriptor = if web_root.is_empty() {
        root.join("WEB-INF").join("web.xml")
    } else {
        root.join(web_root).join("WEB-INF").join("web.xml")
    };
    let Ok(source) = crate::util::read_to_string(&descriptor) else {
        return Vec::new();
    };
    let mut endpoints = Vec::new();

    // servlet-name -> jsp-file or servlet-class
    let mut jsp_servlets = HashMap::new();
    let mut class_servlets = HashMap::new();
    for block in tag_blocks(&source, "servlet") {
        let Some(name) = tag_value(&block, "servlet-name") else {
            continue;
        };
        if let Some(jsp_file) = tag_value(&block, "jsp-file") {
            jsp_servlets.insert(name, jsp_file);
        } else if let Some(class) = tag_value(&block, "servlet-class") {
            class_servlets.insert(name, class);
        }
    }
    for block in tag_blocks(&source, "servlet-mapping") {
        let Some(name) = tag_value(&block, "servlet-name") else {
            continue;
        };
        for pattern in tag_values(&block, "url-pattern") {
            if let Some(jsp_file) = jsp_servlets.get(&name) {
                let target = jsp_rel_path(web_root, jsp_file);
                let lines = files.get(&target).map(|f| f.line_count).unwrap_or(-2);
                let mut endpoint =
                    Endpoint::new(&pattern, "GET", &target).with_lines(1, lines + 1);
                let variant =
                    Endpoint::new(&pattern, "POST", &target).with_lines(1, lines + 1);
                if let Some(file) = files.get(&target) {
                    for param in &file.params {
                        endpoint.add_parameter(param.clone());
                    }
                }
                endpoint.add_variant(variant);
                endpoints.push(endpoint);
            } else if let Some(class) = class_servlets.get(&name) {
                endpoints.push(class_servlet_endpoint(root, &pattern, class));
            }
        }
    }

    for welcome in tag_values(&source, "welcome-file") {
        let target = jsp_rel_path(web_root, &welcome);
        if let Some(file) = files.get(&target) {
            let mut endpoint =
                Endpoint::new("/", "GET", &target).with_lines(1, file.line_count + 1);
            for param in &file.params {
                endpoint.add_parameter(param.clone());
            }
            endpoints.push(endpoint);
            break;
        }
    }
    endpoints
}

/// A `<servlet-class>` backed mapping: the class's source file is located by
/// its package path and scanned for `getParameter` accesses.
fn class_servlet_endpoint(root: &Path, pattern: &str, class: &str) -> Endpoint {
    let class_path = format!("{}.java", class.replace('.', "/"));
    let file = walk_files(root, Some(&["java"])).into_iter().find(|f| {
        f.rel_path == class_path || f.rel_path.ends_with(&format!("/{class_path}"))
    });
    let (file_path, params, line_count) = match file {
        Some(file) => {
            let source = read_source(&file);
            let params = source
                .as_deref()
                .map(|s| servlet_params(&tokenize_all(s, &JAVA_RULES)))
                .unwrap_or_default();
            let count = source
                .as_deref()
                .map(crate::util::line_count)
                .unwrap_or(-2);
            (file.rel_path, params, count)
        }
        None => (class_path, Vec::new(), -2),
    };
    let mut endpoint = Endpoint::new(pattern, "GET", &file_path).with_lines(1, line_count + 1);
    let mut variant = Endpoint::new(pattern, "POST", &file_path).with_lines(1, line_count + 1);
    for param in &params {
        endpoint.add_parameter(param.clone());
        variant.add_parameter(param.clone());
    }
    endpoint.add_variant(variant);
    endpoint
}

fn jsp_rel_path(web_root: &str, jsp_file: &str) -> String {
    let trimmed = jsp_file.trim_start_matches('/');
    if web_root.is_empty() {
        trimmed.to_string()
    } else {
        format!("{web_root}/{trimmed}")
    }
}

fn tag_blocks(source: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut blocks = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find(&open) {
        let body_start = start + open.len();
        let Some(end) = rest[body_start..].find(&close) else {
            break;
        };
        blocks.push(rest[body_start..body_start + end].to_string());
        rest = &rest[body_start + end + close.len()..];
    }
    blocks
}

fn tag_value(source: &str, tag: &str) -> Option<String> {
    tag_values(source, tag).into_iter().next()
}

fn tag_values(source: &str, tag: &str) -> Vec<String> {
    tag_blocks(source, tag)
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Servlet classes annotated with `@WebServlet`. Each declared pattern
/// becomes an endpoint backed by the Java source file.
fn annotated_servlets(root: &Path) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    for file in walk_files(root, Some(&["java"])) {
        let Some(source) = read_source(&file) else {
            continue;
        };
        if !source.contains("@WebServlet") {
            continue;
        }
        let tokens = tokenize_all(&source, &JAVA_RULES);
        let mut i = 0usize;
        while i + 1 < tokens.len() {
            if tokens[i].is_punct('@') && tokens[i + 1].is_word("WebServlet") {
                let mut depth = 0i32;
                let mut patterns = Vec::new();
                let mut j = i + 2;
                while j < tokens.len() {
                    match &tokens[j].kind {
                        TokenKind::Punct('(') | TokenKind::Punct('{') => depth += 1,
                        TokenKind::Punct(')') | TokenKind::Punct('}') => {
                            depth -= 1;
                            if depth <= 0 {
                                break;
                            }
                        }
                        TokenKind::Str => patterns.push(tokens[j].text.clone()),
                        _ => {}
                    }
                    j += 1;
                }
                let params = servlet_params(&tokens);
                for pattern in patterns {
                    let mut endpoint = Endpoint::new(&pattern, "GET", &file.rel_path)
                        .with_lines(1, crate::util::line_count(&source) + 1);
                    let mut variant = Endpoint::new(&pattern, "POST", &file.rel_path)
                        .with_lines(1, crate::util::line_count(&source) + 1);
                    for param in &params {
                        endpoint.add_parameter(param.clone());
                        variant.add_parameter(param.clone());
                    }
                    endpoint.add_variant(variant);
                    endpoints.push(endpoint);
                }
                i = j;
            }
            i += 1;
        }
    }
    endpoints
}

fn servlet_params(tokens: &[crate::tokenizer::Token]) -> Vec<RouteParameter> {
    let mut params: Vec<RouteParameter> = Vec::new();
    for window in tokens.windows(4) {
        let getter = matches!(window[0].kind, TokenKind::Word)
            && window[0].text.starts_with("getParameter")
            && window[1].is_punct('(')
            && matches!(window[2].kind, TokenKind::Str)
            && window[3].is_punct(')');
        if getter && !params.iter().any(|p| p.name == window[2].text) {
            params.push(RouteParameter::query(window[2].text.clone()));
        }
    }
    params
}

/// Second pass over scriptlet-free markup: hyperlink query strings and
/// file-upload form inputs attach parameters to the strictly best-scoring
/// endpoint for each reference.
fn markup_pass(
    files: &HashMap<String, JspFile>,
    order: &[String],
    endpoints: &mut [Endpoint],
) {
    let mut added = 0usize;
    let mut removed = 0usize;
    for rel_path in order {
        let file = &files[rel_path];
        // references resolve in url space, against the page's own url
        for (target, params) in hyperlink_params(&file.markup, file.url.trim_start_matches('/')) {
            let concrete = cleaner::canonicalize(&target);
            let mut best: Option<usize> = None;
            let mut best_score = -1i64;
            for (index, endpoint) in endpoints.iter().enumerate() {
                let template = cleaner::canonicalize(&endpoint.url_path);
                let score = database::relevance_score(&template, &concrete, false);
                if score > best_score {
                    best_score = score;
                    best = Some(index);
                }
            }
            let Some(index) = best else {
                continue;
            };
            let endpoint = &mut endpoints[index];
            for param in &params {
                attach_markup_param(endpoint, param, &mut added, &mut removed);
            }
        }
    }
    if added > 0 || removed > 0 {
        info!(added, removed, "parameters updated from markup references");
    }
}

/// Merges one markup-discovered parameter into an endpoint and its variants.
/// A file input supersedes an earlier query-string detection of the same
/// name, counting as one removal and one addition.
fn attach_markup_param(
    endpoint: &mut Endpoint,
    param: &RouteParameter,
    added: &mut usize,
    removed: &mut usize,
) {
    let key = param.name.to_ascii_lowercase();
    match endpoint.parameters.get_mut(&key) {
        Some(existing) => {
            if param.param_type == ParamType::Files && existing.param_type != ParamType::Files {
                existing.param_type = ParamType::Files;
                *removed += 1;
                *added += 1;
            }
        }
        None => {
            endpoint.add_parameter(param.clone());
            *added += 1;
        }
    }
    for variant in &mut endpoint.variants {
        match variant.parameters.get_mut(&key) {
            Some(existing) => {
                if param.param_type == ParamType::Files {
                    existing.param_type = ParamType::Files;
                }
            }
            None => variant.add_parameter(param.clone()),
        }
    }
}

/// `(target url, parameters)` pairs from `<a href>` query strings and
/// `<form>` blocks with file inputs.
fn hyperlink_params(markup: &str, rel_path: &str) -> Vec<(String, Vec<RouteParameter>)> {
    let mut found = Vec::new();
    let mut rest = markup;
    while let Some(pos) = rest.find("href=") {
        rest = &rest[pos..];
        if let Some(value) = attr_value(rest, "href") {
            if let Some((target, query)) = value.split_once('?') {
                let params: Vec<RouteParameter> = query
                    .split('&')
                    .filter_map(|pair| pair.split('=').next())
                    .filter(|name| !name.is_empty())
                    .map(RouteParameter::query)
                    .collect();
                if !params.is_empty() {
                    let resolved = crate::util::resolve_relative(rel_path, target);
                    found.push((format!("/{resolved}"), params));
                }
            }
        }
        rest = &rest[5..];
    }

    let mut rest = markup;
    while let Some(pos) = rest.find("<form") {
        let tail = &rest[pos..];
        let end = tail.find("</form>").unwrap_or(tail.len());
        let block = &tail[..end];
        if let Some(action) = attr_value(block, "action") {
            let mut params = Vec::new();
            let mut inputs = block;
            while let Some(input_pos) = inputs.find("<input") {
                inputs = &inputs[input_pos + 6..];
                let input_type = attr_value(inputs, "type").unwrap_or_default();
                if input_type == "file" {
                    if let Some(name) = attr_value(inputs, "name") {
                        params.push(RouteParameter::new(name, ParamType::Files));
                    }
                }
            }
            if !params.is_empty() {
                let target = action.split('?').next().unwrap_or(&action);
                let resolved = crate::util::resolve_relative(rel_path, target);
                found.push((format!("/{resolved}"), params));
            }
        }
        rest = &tail[end..];
    }
    found
}
