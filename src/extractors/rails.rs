//! Rails extractor. Two independent parses merged by controller name:
//! `config/routes.rb` through a pluggable router DSL, and each
//! `*_controller.rb` through a class/method/params state machine. Data
//! types come from `db/schema.rb` attribute declarations when a model can
//! be paired with the controller.

use super::{EndpointExtractor, read_source, walk_files};
use crate::model::{Endpoint, FrameworkType, ParamDataType, ParamType, RouteParameter};
use crate::tokenizer::{RUBY_RULES, Token, TokenKind, tokenize_all};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

pub struct RailsExtractor;

impl EndpointExtractor for RailsExtractor {
    fn framework(&self) -> FrameworkType {
        FrameworkType::Rails
    }

    fn extract(&self, root: &Path) -> Vec<Endpoint> {
        let routes_file = root.join("config").join("routes.rb");
        let Ok(routes_source) = crate::util::read_to_string(&routes_file) else {
            error!(root = %root.display(), "config/routes.rb not found");
            return Vec::new();
        };
        let routers = detect_routers(root);
        let routes = parse_routes(&routes_source, &routers);

        let mut controllers: HashMap<String, ControllerInfo> = HashMap::new();
        for file in walk_files(root, Some(&["rb"])) {
            if !file.rel_path.ends_with("_controller.rb") {
                continue;
            }
            let Some(source) = read_source(&file) else {
                continue;
            };
            let info = parse_controller(&source, &file.rel_path);
            controllers.insert(info.qualified_name(), info);
        }

        let models = parse_schema(root);
        build_endpoints(routes, &controllers, &models)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub http_method: String,
    pub url: String,
    pub controller: String,
    pub action: String,
}

impl RouteEntry {
    fn new(method: &str, url: String, controller: String, action: &str) -> Self {
        Self {
            http_method: method.to_string(),
            url,
            controller,
            action: action.to_string(),
        }
    }
}

/// One router understands some subset of the routes DSL. Routers are tried
/// in order; the first one producing entries for a line wins.
pub trait RailsRouter {
    fn parse_line(&self, line: &str, prefix: &str, module_path: &str) -> Option<Vec<RouteEntry>>;
}

/// Reads the Gemfile and assembles the router chain: gem-specific routers
/// first, the default Rails router as the fallback.
fn detect_routers(root: &Path) -> Vec<Box<dyn RailsRouter>> {
    let mut routers: Vec<Box<dyn RailsRouter>> = Vec::new();
    if let Ok(gemfile) = crate::util::read_to_string(&root.join("Gemfile")) {
        if gemfile.contains("devise") {
            routers.push(Box::new(DeviseRouter));
        }
    }
    routers.push(Box::new(DefaultRailsRouter));
    routers
}

pub fn parse_routes(source: &str, routers: &[Box<dyn RailsRouter>]) -> Vec<RouteEntry> {
    let mut entries = Vec::new();
    // (path prefix, module segment or empty) per open block
    let mut stack: Vec<(String, String)> = Vec::new();

    for raw_line in source.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("namespace ") {
            if let Some(name) = first_symbol_or_string(rest) {
                stack.push((name.clone(), name));
                continue;
            }
        }
        if let Some(rest) = line.strip_prefix("scope ") {
            let name = first_symbol_or_string(rest).unwrap_or_default();
            stack.push((name, String::new()));
            continue;
        }
        if line == "end" {
            stack.pop();
            continue;
        }

        let prefix = stack
            .iter()
            .map(|(p, _)| p.as_str())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        let module_path = stack
            .iter()
            .map(|(_, m)| m.as_str())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        for router in routers {
            if let Some(found) = router.parse_line(line, &prefix, &module_path) {
                entries.extend(found);
                break;
            }
        }
        // a trailing `do` on a routing line opens a block we must balance
        if line.ends_with(" do") || line.ends_with(" do |format|") {
            if !line.starts_with("namespace") && !line.starts_with("scope") {
                stack.push((String::new(), String::new()));
            }
        }
    }
    entries
}

pub struct DefaultRailsRouter;

impl RailsRouter for DefaultRailsRouter {
    fn parse_line(&self, line: &str, prefix: &str, module_path: &str) -> Option<Vec<RouteEntry>> {
        let qualify = |name: &str| {
            if module_path.is_empty() {
                name.to_string()
            } else {
                format!("{module_path}/{name}")
            }
        };
        let prefixed = |path: &str| {
            if prefix.is_empty() {
                path.to_string()
            } else {
                format!("{prefix}/{}", path.trim_start_matches('/'))
            }
        };

        if let Some(rest) = line.strip_prefix("root ") {
            let (controller, action) = split_target(&first_string(rest)?)?;
            return Some(vec![RouteEntry::new(
                "GET",
                prefixed("/"),
                qualify(&controller),
                &action,
            )]);
        }

        for verb in ["get", "post", "put", "patch", "delete", "match"] {
            let Some(rest) = line.strip_prefix(&format!("{verb} ")) else {
                continue;
            };
            let path = first_symbol_or_string(rest)?;
            let target = route_target(rest).unwrap_or_else(|| {
                // `get 'users/show'` implies controller#action from the path
                path.clone()
            });
            let (controller, action) = split_target(&target)?;
            let methods: Vec<&str> = if verb == "match" {
                via_methods(rest)
            } else {
                vec![match verb {
                    "get" => "GET",
                    "post" => "POST",
                    "put" => "PUT",
                    "patch" => "PATCH",
                    _ => "DELETE",
                }]
            };
            let url = prefixed(&path);
            return Some(
                methods
                    .iter()
                    .map(|m| RouteEntry::new(m, url.clone(), qualify(&controller), &action))
                    .collect(),
            );
        }

        if let Some(rest) = line.strip_prefix("resources ") {
            let name = first_symbol_or_string(rest)?;
            let allowed = only_filter(rest);
            let base = prefixed(&name);
            let member = format!("{base}/:id");
            let controller = qualify(&name);
            let all = [
                ("index", "GET", base.clone()),
                ("new", "GET", format!("{base}/new")),
                ("create", "POST", base.clone()),
                ("show", "GET", member.clone()),
                ("edit", "GET", format!("{member}/edit")),
                ("update", "PUT", member.clone()),
                ("update", "PATCH", member.clone()),
                ("destroy", "DELETE", member),
            ];
            let entries = all
                .into_iter()
                .filter(|(action, _, _)| {
                    allowed
                        .as_ref()
                        .map(|only| only.iter().any(|a| a == action))
                        .unwrap_or(true)
                })
                .map(|(action, method, url)| {
                    RouteEntry::new(method, url, controller.clone(), action)
                })
                .collect();
            return Some(entries);
        }
        None
    }
}

/// Routes declared by `devise_for`, mapped to the stock Devise session and
/// registration endpoints.
pub struct DeviseRouter;

impl RailsRouter for DeviseRouter {
    fn parse_line(&self, line: &str, prefix: &str, _module_path: &str) -> Option<Vec<RouteEntry>> {
        let rest = line.strip_prefix("devise_for ")?;
        let scope = first_symbol_or_string(rest)?;
        let base = if prefix.is_empty() {
            scope.clone()
        } else {
            format!("{prefix}/{scope}")
        };
        Some(vec![
            RouteEntry::new("GET", format!("{base}/sign_in"), "devise/sessions".into(), "new"),
            RouteEntry::new("POST", format!("{base}/sign_in"), "devise/sessions".into(), "create"),
            RouteEntry::new(
                "DELETE",
                format!("{base}/sign_out"),
                "devise/sessions".into(),
                "destroy",
            ),
            RouteEntry::new(
                "POST",
                base,
                "devise/registrations".into(),
                "create",
            ),
        ])
    }
}

fn first_symbol_or_string(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix(':') {
        let name: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if name.is_empty() {
            return None;
        }
        return Some(name);
    }
    first_string(trimmed)
}

fn first_string(text: &str) -> Option<String> {
    let quote = text.chars().find(|c| *c == '\'' || *c == '"')?;
    let start = text.find(quote)? + 1;
    let end = text[start..].find(quote)? + start;
    Some(text[start..end].to_string())
}

/// Extracts `=> 'users#show'` or `to: 'users#show'` from a routing line.
fn route_target(rest: &str) -> Option<String> {
    if let Some(pos) = rest.find("=>") {
        return first_string(&rest[pos..]);
    }
    if let Some(pos) = rest.find("to:") {
        return first_string(&rest[pos..]);
    }
    None
}

fn split_target(target: &str) -> Option<(String, String)> {
    if let Some((controller, action)) = target.split_once('#') {
        return Some((controller.to_string(), action.to_string()));
    }
    // path-style 'users/show'
    let (controller, action) = target.rsplit_once('/')?;
    Some((controller.to_string(), action.to_string()))
}

fn via_methods(rest: &str) -> Vec<&'static str> {
    let mut methods = Vec::new();
    if let Some(pos) = rest.find("via:") {
        let tail = &rest[pos..];
        for (name, method) in [
            ("get", "GET"),
            ("post", "POST"),
            ("put", "PUT"),
            ("patch", "PATCH"),
            ("delete", "DELETE"),
        ] {
            if tail.contains(name) {
                methods.push(method);
            }
        }
    }
    if methods.is_empty() {
        methods.push("GET");
        methods.push("POST");
    }
    methods
}

fn only_filter(rest: &str) -> Option<Vec<String>> {
    let pos = rest.find("only:")?;
    let tail = &rest[pos..];
    let open = tail.find('[')?;
    let close = tail.find(']')?;
    let actions = tail[open + 1..close]
        .split(',')
        .map(|s| s.trim().trim_start_matches(':').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Some(actions)
}

#[derive(Debug)]
pub struct ActionInfo {
    pub start_line: i64,
    pub end_line: i64,
    /// Parameter names referenced through `params[:x]` / `params[:x][:y]`.
    pub params: Vec<String>,
    /// Model names seen in `<model>.new` / `<model>.create` calls.
    pub model_hints: Vec<String>,
}

#[derive(Debug)]
pub struct ControllerInfo {
    pub module_path: Vec<String>,
    /// Snake-case controller name with the `Controller` suffix stripped.
    pub name: String,
    pub file_path: String,
    pub actions: HashMap<String, ActionInfo>,
}

impl ControllerInfo {
    pub fn qualified_name(&self) -> String {
        let mut parts = self.module_path.clone();
        parts.push(self.name.clone());
        parts.join("/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerState {
    Init,
    InClass,
    InAction,
    Done,
}

/// Parses one controller file. Action discovery stops at `private`.
pub fn parse_controller(source: &str, file_path: &str) -> ControllerInfo {
    let tokens = tokenize_all(source, &RUBY_RULES);
    let last_line = crate::util::line_count(source);

    let mut state = ControllerState::Init;
    let mut module_path = Vec::new();
    let mut name = String::new();
    let mut actions: HashMap<String, ActionInfo> = HashMap::new();
    let mut current_action: Option<String> = None;

    let mut i = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        match state {
            ControllerState::Done => break,
            ControllerState::Init => {
                if token.is_word("module") {
                    if let Some(next) = word_at(&tokens, i + 1) {
                        module_path.push(camel_to_snake(&next));
                        i += 1;
                    }
                } else if token.is_word("class") {
                    // `class Admin::UsersController < ApplicationController`
                    let mut j = i + 1;
                    let mut segments = Vec::new();
                    while j < tokens.len() {
                        match &tokens[j].kind {
                            TokenKind::Word => segments.push(tokens[j].text.clone()),
                            TokenKind::Punct(':') => {}
                            _ => break,
                        }
                        j += 1;
                    }
                    if let Some(class_name) =
                        segments.iter().rfind(|s| s.ends_with("Controller"))
                    {
                        name = camel_to_snake(class_name.trim_end_matches("Controller"));
                        for module in &segments[..segments.len() - 1] {
                            if module.ends_with("Controller") {
                                continue;
                            }
                            module_path.push(camel_to_snake(module));
                        }
                        state = ControllerState::InClass;
                    }
                    i = j;
                    continue;
                }
            }
            ControllerState::InClass | ControllerState::InAction => {
                if token.is_word("private") {
                    close_action(&mut actions, &mut current_action, token.line - 1);
                    state = ControllerState::Done;
                } else if token.is_word("def") {
                    close_action(&mut actions, &mut current_action, token.line - 1);
                    if let Some(action_name) = word_at(&tokens, i + 1) {
                        actions.insert(
                            action_name.clone(),
                            ActionInfo {
                                start_line: token.line,
                                end_line: last_line,
                                params: Vec::new(),
                                model_hints: Vec::new(),
                            },
                        );
                        current_action = Some(action_name);
                        state = ControllerState::InAction;
                        i += 1;
                    }
                } else if state == ControllerState::InAction {
                    if let Some(action_name) = &current_action {
                        if let Some(action) = actions.get_mut(action_name) {
                            if let Some((param, consumed)) = match_params_reference(&tokens, i) {
                                if !action.params.contains(&param) {
                                    action.params.push(param);
                                }
                                i += consumed;
                                continue;
                            }
                            if let Some(model) = match_model_call(&tokens, i) {
                                action.model_hints.push(model);
                            }
                        }
                    }
                }
            }
        }
        i += 1;
    }
    close_action(&mut actions, &mut current_action, last_line);

    ControllerInfo {
        module_path,
        name,
        file_path: file_path.to_string(),
        actions,
    }
}

fn close_action(
    actions: &mut HashMap<String, ActionInfo>,
    current: &mut Option<String>,
    end_line: i64,
) {
    if let Some(name) = current.take() {
        if let Some(action) = actions.get_mut(&name) {
            action.end_line = end_line;
        }
    }
}

fn word_at(tokens: &[Token], index: usize) -> Option<String> {
    tokens.get(index).and_then(|t| match t.kind {
        TokenKind::Word => Some(t.text.clone()),
        _ => None,
    })
}

/// Matches `params [ : x ]` and the nested `params [ : x ] [ : y ]` form,
/// returning the dotted name and the number of tokens consumed.
fn match_params_reference(tokens: &[Token], i: usize) -> Option<(String, usize)> {
    if !tokens.get(i)?.is_word("params") {
        return None;
    }
    let (first, after_first) = bracket_symbol(tokens, i + 1)?;
    if let Some((second, after_second)) = bracket_symbol(tokens, after_first) {
        return Some((format!("{first}.{second}"), after_second - i));
    }
    Some((first, after_first - i))
}

/// Matches `[ : name ]` starting at `i`, returning the name and the index
/// just past the closing bracket.
fn bracket_symbol(tokens: &[Token], i: usize) -> Option<(String, usize)> {
    if !tokens.get(i)?.is_punct('[') || !tokens.get(i + 1)?.is_punct(':') {
        return None;
    }
    let name = word_at(tokens, i + 2)?;
    if !tokens.get(i + 3)?.is_punct(']') {
        return None;
    }
    Some((name, i + 4))
}

/// Matches `<model>.new` / `<model>.create`.
fn match_model_call(tokens: &[Token], i: usize) -> Option<String> {
    let model = match &tokens.get(i)?.kind {
        TokenKind::Word => tokens[i].text.clone(),
        _ => return None,
    };
    if !tokens.get(i + 1)?.is_punct('.') {
        return None;
    }
    let call = word_at(tokens, i + 2)?;
    if call == "new" || call == "create" {
        Some(camel_to_snake(&model))
    } else {
        None
    }
}

pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Table -> attribute -> data type, from `db/schema.rb`.
fn parse_schema(root: &Path) -> HashMap<String, HashMap<String, ParamDataType>> {
    let mut models = HashMap::new();
    let Ok(source) = crate::util::read_to_string(&root.join("db").join("schema.rb")) else {
        return models;
    };
    let mut current: Option<String> = None;
    for raw_line in source.lines() {
        let line = raw_line.trim();
        if let Some(rest) = line.strip_prefix("create_table ") {
            current = first_symbol_or_string(rest);
            if let Some(table) = &current {
                models.entry(table.clone()).or_insert_with(HashMap::new);
            }
            continue;
        }
        if line == "end" {
            current = None;
            continue;
        }
        let Some(table) = &current else { continue };
        let Some(rest) = line.strip_prefix("t.") else {
            continue;
        };
        let Some((type_name, tail)) = rest.split_once(' ') else {
            continue;
        };
        if let Some(attr) = first_symbol_or_string(tail) {
            if let Some(attrs) = models.get_mut(table) {
                attrs.insert(attr, ParamDataType::from_type_name(type_name));
            }
        }
    }
    models
}

fn build_endpoints(
    routes: Vec<RouteEntry>,
    controllers: &HashMap<String, ControllerInfo>,
    models: &HashMap<String, HashMap<String, ParamDataType>>,
) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    for route in routes {
        // module-qualified name first, bare name second
        let controller = controllers.get(&route.controller).or_else(|| {
            let bare = route.controller.rsplit('/').next().unwrap_or("");
            controllers
                .values()
                .find(|c| c.name == bare)
        });
        let Some(controller) = controller else {
            debug!(
                controller = route.controller,
                action = route.action,
                "no controller source found for route"
            );
            let endpoint =
                Endpoint::new(&route.url, &route.http_method, "config/routes.rb");
            endpoints.push(endpoint);
            continue;
        };

        let mut endpoint =
            Endpoint::new(&route.url, &route.http_method, &controller.file_path);
        if let Some(action) = controller.actions.get(&route.action) {
            endpoint.start_line = action.start_line;
            endpoint.end_line = action.end_line;
            for param in &action.params {
                let data_type = infer_param_type(param, controller, action, models);
                endpoint.add_parameter(
                    RouteParameter::new(param.clone(), ParamType::QueryString)
                        .with_data_type(data_type),
                );
            }
        }
        endpoints.push(endpoint);
    }
    endpoints
}

/// Infers a parameter's data type from model attribute declarations: the
/// models named in `<model>.new`/`.create` calls are checked first, then
/// the controller's own (already pluralized) name.
fn infer_param_type(
    param: &str,
    controller: &ControllerInfo,
    action: &ActionInfo,
    models: &HashMap<String, HashMap<String, ParamDataType>>,
) -> ParamDataType {
    let attr = param.rsplit('.').next().unwrap_or(param);
    for hint in &action.model_hints {
        let table = pluralize(hint);
        if let Some(found) = models.get(&table).and_then(|attrs| attrs.get(attr)) {
            return *found;
        }
    }
    if let Some(found) = models.get(&controller.name).and_then(|attrs| attrs.get(attr)) {
        return *found;
    }
    ParamDataType::String
}

fn pluralize(name: &str) -> String {
    if name.ends_with('y') {
        format!("{}ies", &name[..name.len() - 1])
    } else if name.ends_with('s') {
        format!("{name}es")
    } else {
        format!("{name}s")
    }
}
