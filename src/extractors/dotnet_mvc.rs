//! .NET MVC extractor. Route templates come from `MapRoute` /
//! `MapControllerRoute` registrations; controllers contribute either
//! attribute routes (`[Route]`, `[HttpGet("...")]`) or conventional routes
//! produced by substituting controller and action names into the
//! registered templates.

use super::{EndpointExtractor, read_source, walk_files};
use crate::model::{Endpoint, FrameworkType, ParamDataType, ParamType, RouteParameter};
use crate::tokenizer::{CSHARP_RULES, Token, TokenKind, tokenize_all};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub struct DotNetMvcExtractor;

impl EndpointExtractor for DotNetMvcExtractor {
    fn framework(&self) -> FrameworkType {
        FrameworkType::DotNetMvc
    }

    fn extract(&self, root: &Path) -> Vec<Endpoint> {
        let mut templates = Vec::new();
        let mut controllers = Vec::new();
        for file in walk_files(root, Some(&["cs"])) {
            let Some(source) = read_source(&file) else {
                continue;
            };
            if source.contains("MapRoute") || source.contains("MapControllerRoute") {
                templates.extend(parse_route_registrations(&source));
            }
            if file.rel_path.ends_with("Controller.cs") {
                if let Some(controller) = parse_controller(&source, &file.rel_path) {
                    controllers.push(controller);
                }
            }
        }
        if templates.is_empty() {
            // the framework's implicit default when nothing is registered
            templates.push(RouteTemplate {
                template: "{controller}/{action}/{id?}".to_string(),
                defaults: HashMap::new(),
            });
        }
        build_endpoints(&templates, &controllers)
    }
}

#[derive(Debug, Clone)]
pub struct RouteTemplate {
    pub template: String,
    pub defaults: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegState {
    Idle,
    /// Saw the map call name, waiting for `(`.
    AtCall,
    /// Inside the call's argument list.
    InArgs,
    /// Inside the `new { ... }` defaults object.
    InDefaults,
}

/// Parses every `MapRoute` / `MapControllerRoute` call in a source file,
/// tracking paren and comma depth explicitly.
pub fn parse_route_registrations(source: &str) -> Vec<RouteTemplate> {
    let tokens = tokenize_all(source, &CSHARP_RULES);
    let mut templates = Vec::new();
    let mut state = RegState::Idle;
    let mut paren_depth = 0i32;
    let mut strings_seen = 0usize;
    let mut current = RouteTemplate {
        template: String::new(),
        defaults: HashMap::new(),
    };
    let mut default_key: Option<String> = None;

    for (i, token) in tokens.iter().enumerate() {
        match state {
            RegState::Idle => {
                if token.is_word("MapRoute") || token.is_word("MapControllerRoute") {
                    state = RegState::AtCall;
                }
            }
            RegState::AtCall => {
                if token.is_punct('(') {
                    state = RegState::InArgs;
                    paren_depth = 1;
                    strings_seen = 0;
                    current = RouteTemplate {
                        template: String::new(),
                        defaults: HashMap::new(),
                    };
                } else {
                    state = RegState::Idle;
                }
            }
            RegState::InArgs => match &token.kind {
                TokenKind::Punct('(') => paren_depth += 1,
                TokenKind::Punct(')') => {
                    paren_depth -= 1;
                    if paren_depth == 0 {
                        if !current.template.is_empty() {
                            templates.push(current.clone());
                        }
                        state = RegState::Idle;
                    }
                }
                TokenKind::Punct('{') => state = RegState::InDefaults,
                TokenKind::Str if paren_depth == 1 => {
                    strings_seen += 1;
                    // first string is the route name, second the template
                    if strings_seen == 2 {
                        current.template = token.text.clone();
                    } else if strings_seen == 1 && token.text.contains('{') {
                        // single-argument form: the template comes first
                        current.template = token.text.clone();
                        strings_seen = 2;
                    }
                }
                _ => {}
            },
            RegState::InDefaults => match &token.kind {
                TokenKind::Punct('}') => state = RegState::InArgs,
                TokenKind::Word => {
                    if tokens.get(i + 1).map(|t| t.is_punct('=')).unwrap_or(false) {
                        default_key = Some(token.text.clone());
                    } else if token.text == "Optional" {
                        default_key = None;
                    }
                }
                TokenKind::Str => {
                    if let Some(key) = default_key.take() {
                        current.defaults.insert(key, token.text.clone());
                    }
                }
                _ => {}
            },
        }
    }
    templates
}

#[derive(Debug)]
pub struct CsAction {
    pub name: String,
    pub route: Option<String>,
    pub http_methods: Vec<String>,
    /// `(name, declared type)` pairs from the signature.
    pub params: Vec<(String, String)>,
    pub start_line: i64,
    pub end_line: i64,
}

#[derive(Debug)]
pub struct CsController {
    /// Class name with the `Controller` suffix stripped.
    pub name: String,
    pub file_path: String,
    pub route_prefix: Option<String>,
    pub actions: Vec<CsAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CtrlState {
    Idle,
    InClass,
    InSignature,
}

pub fn parse_controller(source: &str, file_path: &str) -> Option<CsController> {
    let tokens = tokenize_all(source, &CSHARP_RULES);
    let mut state = CtrlState::Idle;
    let mut brace_depth = 0i32;
    let mut sig_paren_depth = 0i32;

    let mut name = String::new();
    let mut route_prefix = None;
    let mut actions: Vec<CsAction> = Vec::new();

    // attributes collected since the last declaration
    let mut pending_attrs: Vec<(String, Option<String>)> = Vec::new();
    let mut pending_words: Vec<String> = Vec::new();
    let mut pending_line = 0i64;
    let mut sig_words: Vec<String> = Vec::new();
    let mut sig_params: Vec<(String, String)> = Vec::new();
    let mut skip_default_value = false;

    let mut i = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        match state {
            CtrlState::Idle | CtrlState::InClass => match &token.kind {
                TokenKind::Punct('[') => {
                    let (attr, consumed) = parse_attribute(&tokens, i);
                    if let Some(attr) = attr {
                        if pending_attrs.is_empty() {
                            pending_line = token.line;
                        }
                        pending_attrs.push(attr);
                    }
                    i += consumed;
                    continue;
                }
                TokenKind::Punct('{') => {
                    brace_depth += 1;
                    pending_words.clear();
                    pending_attrs.clear();
                }
                TokenKind::Punct('}') => brace_depth -= 1,
                TokenKind::Punct(';') => {
                    pending_words.clear();
                    pending_attrs.clear();
                }
                TokenKind::Punct('(') if state == CtrlState::InClass && brace_depth == 1 => {
                    let method_name = pending_words.last().cloned().unwrap_or_default();
                    let is_action = pending_words.iter().any(|w| w == "public")
                        && !method_name.is_empty()
                        && method_name != format!("{name}Controller");
                    if is_action {
                        let route = pending_attrs
                            .iter()
                            .find(|(n, v)| attr_declares_route(n) && v.is_some())
                            .and_then(|(_, v)| v.clone());
                        let http_methods = pending_attrs
                            .iter()
                            .filter_map(|(n, _)| http_method_of(n))
                            .collect();
                        actions.push(CsAction {
                            name: method_name,
                            route,
                            http_methods,
                            params: Vec::new(),
                            start_line: if pending_attrs.is_empty() {
                                token.line
                            } else {
                                pending_line
                            },
                            end_line: token.line,
                        });
                        state = CtrlState::InSignature;
                        sig_paren_depth = 1;
                        sig_words.clear();
                        sig_params.clear();
                        skip_default_value = false;
                    }
                    pending_words.clear();
                    pending_attrs.clear();
                }
                TokenKind::Word if token.text == "class" => {
                    if let Some(next) = tokens.get(i + 1) {
                        if next.kind == TokenKind::Word && next.text.ends_with("Controller") {
                            name = next.text.trim_end_matches("Controller").to_string();
                            route_prefix = pending_attrs
                                .iter()
                                .find(|(n, v)| attr_declares_route(n) && v.is_some())
                                .and_then(|(_, v)| v.clone());
                            state = CtrlState::InClass;
                            brace_depth = 0;
                        }
                    }
                    pending_attrs.clear();
                    pending_words.clear();
                    i += 1;
                }
                TokenKind::Word => pending_words.push(token.text.clone()),
                _ => {}
            },
            CtrlState::InSignature => match &token.kind {
                TokenKind::Punct('(') | TokenKind::Punct('[') | TokenKind::Punct('<') => {
                    sig_paren_depth += 1
                }
                TokenKind::Punct(']') | TokenKind::Punct('>') => sig_paren_depth -= 1,
                TokenKind::Punct(')') => {
                    sig_paren_depth -= 1;
                    if sig_paren_depth == 0 {
                        finish_signature_param(&mut sig_words, &mut sig_params);
                        if let Some(action) = actions.last_mut() {
                            action.params = std::mem::take(&mut sig_params);
                        }
                        state = CtrlState::InClass;
                    }
                }
                TokenKind::Punct(',') if sig_paren_depth == 1 => {
                    finish_signature_param(&mut sig_words, &mut sig_params);
                    skip_default_value = false;
                }
                TokenKind::Punct('=') => skip_default_value = true,
                TokenKind::Word if sig_paren_depth == 1 && !skip_default_value => {
                    sig_words.push(token.text.clone())
                }
                _ => {}
            },
        }
        i += 1;
    }

    if name.is_empty() {
        return None;
    }
    let line_count = crate::util::line_count(source);
    for action in &mut actions {
        action.end_line = line_count;
    }
    // close each action at the next action's start
    for i in 1..actions.len() {
        let boundary = actions[i].start_line - 1;
        if boundary > actions[i - 1].start_line {
            actions[i - 1].end_line = boundary;
        }
    }
    Some(CsController {
        name,
        file_path: file_path.to_string(),
        route_prefix,
        actions,
    })
}

/// Parses `[Name]` or `[Name("value")]` starting at the opening bracket,
/// returning the attribute and the token count consumed.
fn parse_attribute(tokens: &[Token], open: usize) -> (Option<(String, Option<String>)>, usize) {
    let Some(name_token) = tokens.get(open + 1) else {
        return (None, 1);
    };
    if name_token.kind != TokenKind::Word {
        return (None, 1);
    }
    let name = name_token.text.clone();
    let mut value = None;
    let mut j = open + 2;
    let mut depth = 1i32;
    while j < tokens.len() && depth > 0 {
        match &tokens[j].kind {
            TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct(']') => depth -= 1,
            TokenKind::Str if value.is_none() => value = Some(tokens[j].text.clone()),
            _ => {}
        }
        j += 1;
    }
    (Some((name, value)), j - open)
}

fn attr_declares_route(name: &str) -> bool {
    name == "Route" || http_method_of(name).is_some()
}

fn http_method_of(attr: &str) -> Option<String> {
    match attr {
        "HttpGet" | "AcceptVerbsGet" => Some("GET".to_string()),
        "HttpPost" => Some("POST".to_string()),
        "HttpPut" => Some("PUT".to_string()),
        "HttpPatch" => Some("PATCH".to_string()),
        "HttpDelete" => Some("DELETE".to_string()),
        _ => None,
    }
}

fn finish_signature_param(words: &mut Vec<String>, params: &mut Vec<(String, String)>) {
    let kept: Vec<String> = words
        .drain(..)
        .filter(|w| !matches!(w.as_str(), "ref" | "out" | "in" | "params" | "this"))
        .collect();
    if kept.len() >= 2 {
        let name = kept[kept.len() - 1].clone();
        let declared = kept[kept.len() - 2].clone();
        params.push((name, declared));
    }
}

/// One segment of a route template: `{x}`, `{x=default}`, `{x:type}`,
/// `{x?}`, or a literal.
fn placeholder_name(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    let name = inner
        .split(|c| c == ':' || c == '=' || c == '?')
        .next()
        .unwrap_or(inner);
    Some(name)
}

fn substitute_template(template: &str, controller: &str, action: &str) -> String {
    template
        .split('/')
        .map(|segment| match placeholder_name(segment) {
            Some("controller") => controller.to_string(),
            Some("action") => action.to_string(),
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn build_endpoints(templates: &[RouteTemplate], controllers: &[CsController]) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    for controller in controllers {
        for action in &controller.actions {
            let urls = action_urls(templates, controller, action);
            if urls.is_empty() {
                debug!(
                    controller = controller.name,
                    action = action.name,
                    "no route produced for action"
                );
            }
            let methods: Vec<String> = if action.http_methods.is_empty() {
                vec!["GET".to_string()]
            } else {
                action.http_methods.clone()
            };
            for url in urls {
                let placeholders: Vec<String> = url
                    .split('/')
                    .filter_map(placeholder_name)
                    .map(str::to_string)
                    .collect();
                let mut primary: Option<Endpoint> = None;
                for method in &methods {
                    let mut endpoint = Endpoint::new(&url, method, &controller.file_path)
                        .with_lines(action.start_line, action.end_line);
                    for (param_name, declared) in &action.params {
                        let param_type = if placeholders.iter().any(|p| p == param_name) {
                            ParamType::PathVariable
                        } else {
                            ParamType::QueryString
                        };
                        endpoint.add_parameter(
                            RouteParameter::new(param_name.clone(), param_type)
                                .with_data_type(ParamDataType::from_type_name(declared)),
                        );
                    }
                    match &mut primary {
                        None => primary = Some(endpoint),
                        Some(first) => first.add_variant(endpoint),
                    }
                }
                if let Some(endpoint) = primary {
                    endpoints.push(endpoint);
                }
            }
        }
    }
    endpoints
}

/// Routes for one action: its attribute route joined to the controller
/// prefix when present, otherwise every registered template with the
/// controller and action substituted.
fn action_urls(
    templates: &[RouteTemplate],
    controller: &CsController,
    action: &CsAction,
) -> Vec<String> {
    let expand = |route: &str| {
        route
            .replace("[controller]", &controller.name)
            .replace("[action]", &action.name)
    };
    if let Some(route) = &action.route {
        let expanded = expand(route);
        if expanded.starts_with('/') || controller.route_prefix.is_none() {
            return vec![expanded];
        }
        let prefix = expand(controller.route_prefix.as_deref().unwrap_or(""));
        return vec![format!("{prefix}/{expanded}")];
    }
    if let Some(prefix) = &controller.route_prefix {
        return vec![format!("{}/{}", expand(prefix), action.name)];
    }
    templates
        .iter()
        .map(|t| substitute_template(&t.template, &controller.name, &action.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_route_registration_parses() {
        let source = r#"
public class RouteConfig
{
    public static void RegisterRoutes(RouteCollection routes)
    {
        routes.MapRoute(
            name: "Default",
            url: "{controller}/{action}/{id}",
            defaults: new { controller = "Home", action = "Index", id = UrlParameter.Optional }
        );
    }
}
"#;
        let templates = parse_route_registrations(source);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].template, "{controller}/{action}/{id}");
        assert_eq!(templates[0].defaults.get("controller").map(String::as_str), Some("Home"));
        assert_eq!(templates[0].defaults.get("action").map(String::as_str), Some("Index"));
    }

    #[test]
    fn conventional_routes_substitute_controller_and_action() {
        let source = r#"
public class ProductsController : Controller
{
    public ActionResult Detail(int id, string tab)
    {
        return View();
    }
}
"#;
        let controller = parse_controller(source, "Controllers/ProductsController.cs").unwrap();
        assert_eq!(controller.name, "Products");
        assert_eq!(controller.actions.len(), 1);
        let templates = vec![RouteTemplate {
            template: "{controller}/{action}/{id}".to_string(),
            defaults: HashMap::new(),
        }];
        let endpoints = build_endpoints(&templates, &[controller]);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url_path, "Products/Detail/{id}");
        let id = &endpoints[0].parameters["id"];
        assert_eq!(id.param_type, ParamType::PathVariable);
        assert_eq!(id.data_type, ParamDataType::Integer);
        let tab = &endpoints[0].parameters["tab"];
        assert_eq!(tab.param_type, ParamType::QueryString);
    }

    #[test]
    fn attribute_routes_join_controller_prefix() {
        let source = r#"
[Route("api/[controller]")]
public class OrdersController : ControllerBase
{
    [HttpGet("{id}")]
    public Order Get(int id)
    {
        return Find(id);
    }

    [HttpPost]
    public void Create(Order order)
    {
    }
}
"#;
        let controller = parse_controller(source, "Controllers/OrdersController.cs").unwrap();
        assert_eq!(controller.route_prefix.as_deref(), Some("api/[controller]"));
        let endpoints = build_endpoints(&[], &[controller]);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].url_path, "api/Orders/{id}");
        assert_eq!(endpoints[0].http_method, "GET");
        assert_eq!(endpoints[1].url_path, "api/Orders/Create");
        assert_eq!(endpoints[1].http_method, "POST");
    }

    #[test]
    fn template_placeholder_forms() {
        assert_eq!(placeholder_name("{id}"), Some("id"));
        assert_eq!(placeholder_name("{id:int}"), Some("id"));
        assert_eq!(placeholder_name("{id=3}"), Some("id"));
        assert_eq!(placeholder_name("{id?}"), Some("id"));
        assert_eq!(placeholder_name("static"), None);
    }

    #[test]
    fn constructors_are_not_actions() {
        let source = r#"
public class HomeController : Controller
{
    public HomeController(IService service)
    {
    }

    public ActionResult Index()
    {
        return View();
    }
}
"#;
        let controller = parse_controller(source, "Controllers/HomeController.cs").unwrap();
        assert_eq!(controller.actions.len(), 1);
        assert_eq!(controller.actions[0].name, "Index");
    }
}
