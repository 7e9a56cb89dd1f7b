//! Spring-style MVC extractor. A three-phase state machine per source
//! file: the annotation phase gathers route templates, HTTP methods,
//! binding-annotation kinds and security expressions; the signature phase
//! resolves bound parameter names and declared types; the method phase
//! only watches for the closing brace of the handler.

use super::{EndpointExtractor, join_paths, read_source, walk_files};
use crate::model::{Endpoint, FrameworkType, ParamDataType, ParamType, RouteParameter};
use crate::tokenizer::{Flow, JAVA_RULES, Token, TokenKind, TokenVisitor, tokenize, tokenize_all};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub struct SpringMvcExtractor;

impl EndpointExtractor for SpringMvcExtractor {
    fn framework(&self) -> FrameworkType {
        FrameworkType::SpringMvc
    }

    fn extract(&self, root: &Path) -> Vec<Endpoint> {
        let mut sources = Vec::new();
        for file in walk_files(root, Some(&["java"])) {
            let Some(source) = read_source(&file) else {
                continue;
            };
            sources.push((source, file.rel_path));
        }

        let mut models = HashMap::new();
        for (source, _) in &sources {
            if let Some((class, fields)) = parse_model_fields(source) {
                models.insert(class, fields);
            }
        }

        let mut endpoints = Vec::new();
        for (source, rel_path) in &sources {
            endpoints.extend(parse_controller_with_models(source, rel_path, &models));
        }
        endpoints
    }
}

/// Parses one Java source for controller handler methods.
pub fn parse_controller(source: &str, file_path: &str) -> Vec<Endpoint> {
    parse_controller_with_models(source, file_path, &HashMap::new())
}

/// Like [`parse_controller`], with a registry of model-bean fields keyed by
/// class name. A handler bound to a model object gains one parameter per
/// registered field.
pub fn parse_controller_with_models(
    source: &str,
    file_path: &str,
    models: &HashMap<String, Vec<RouteParameter>>,
) -> Vec<Endpoint> {
    let mut machine = ControllerMachine::new(file_path, models);
    tokenize(source, &JAVA_RULES, &mut machine);
    machine.endpoints
}

/// Scans a Java source as a candidate model bean: public setters and private
/// field declarations become form-bound parameters typed by the declaration.
pub fn parse_model_fields(source: &str) -> Option<(String, Vec<RouteParameter>)> {
    let tokens = tokenize_all(source, &JAVA_RULES);
    let mut name = None;
    let mut fields: Vec<RouteParameter> = Vec::new();
    let mut push_field = |field_name: String, type_name: &str| {
        if !fields.iter().any(|p| p.name == field_name) {
            fields.push(
                RouteParameter::new(field_name, ParamType::QueryString)
                    .with_data_type(ParamDataType::from_type_name(type_name)),
            );
        }
    };
    let mut i = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.is_word("class") && name.is_none() {
            if let Some(next) = tokens.get(i + 1) {
                if next.kind == TokenKind::Word {
                    name = Some(next.text.clone());
                }
            }
        } else if token.is_word("private") || token.is_word("protected") {
            // private String firstName ; -> firstName
            let field_type = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Word);
            let field_name = tokens.get(i + 2).filter(|t| t.kind == TokenKind::Word);
            let ends = tokens.get(i + 3).map(|t| t.is_punct(';')) == Some(true);
            if ends {
                if let (Some(field_type), Some(field_name)) = (field_type, field_name) {
                    push_field(field_name.text.clone(), &field_type.text);
                    i += 4;
                    continue;
                }
            }
        } else if token.kind == TokenKind::Word && token.text.starts_with("set") {
            // setFirstName(String firstName) -> firstName
            let opens = tokens.get(i + 1).map(|t| t.is_punct('(')) == Some(true);
            let arg_type = tokens.get(i + 2).filter(|t| t.kind == TokenKind::Word);
            let closes = tokens.get(i + 4).map(|t| t.is_punct(')')) == Some(true);
            if opens && closes {
                if let Some(arg_type) = arg_type {
                    let mut chars = token.text[3..].chars();
                    if let Some(first) = chars.next() {
                        let field_name: String = first.to_lowercase().chain(chars).collect();
                        push_field(field_name, &arg_type.text);
                    }
                }
                i += 5;
                continue;
            }
        }
        i += 1;
    }
    Some((name?, fields))
}

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Annotation,
    Signature,
    MethodBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnnState {
    Idle,
    AtSign,
    InMapping,
    InSecurity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MappingExpect {
    Path,
    Method,
    Ignore,
}

#[derive(Debug, Default)]
struct PendingMapping {
    path: Option<String>,
    methods: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SigExpect {
    None,
    AnnotationName,
    RequiredValue,
}

struct ControllerMachine<'a> {
    file_path: String,
    models: &'a HashMap<String, Vec<RouteParameter>>,
    endpoints: Vec<Endpoint>,

    phase: Phase,
    ann_state: AnnState,
    brace_depth: i32,
    in_class: bool,
    has_controller_annotation: bool,
    last_word: Option<String>,

    class_path: String,
    class_methods: Vec<String>,
    class_security: Option<String>,

    mapping: PendingMapping,
    mapping_expect: MappingExpect,
    mapping_paren_depth: i32,
    pending_method_mapping: Option<PendingMapping>,
    method_security: Option<String>,
    pending_start_line: i64,

    sig_paren_depth: i32,
    sig_expect: SigExpect,
    binding: Option<ParamType>,
    binding_explicit_name: Option<String>,
    binding_optional: bool,
    sig_words: Vec<String>,
    params: Vec<RouteParameter>,
    last_param_type: Option<String>,
    model_object: Option<String>,
    next_param_is_model: bool,
}

impl<'a> ControllerMachine<'a> {
    fn new(file_path: &str, models: &'a HashMap<String, Vec<RouteParameter>>) -> Self {
        Self {
            file_path: file_path.to_string(),
            models,
            endpoints: Vec::new(),
            phase: Phase::Annotation,
            ann_state: AnnState::Idle,
            brace_depth: 0,
            in_class: false,
            has_controller_annotation: false,
            last_word: None,
            class_path: String::new(),
            class_methods: Vec::new(),
            class_security: None,
            mapping: PendingMapping::default(),
            mapping_expect: MappingExpect::Path,
            mapping_paren_depth: 0,
            pending_method_mapping: None,
            method_security: None,
            pending_start_line: -1,
            sig_paren_depth: 0,
            sig_expect: SigExpect::None,
            binding: None,
            binding_explicit_name: None,
            binding_optional: false,
            sig_words: Vec::new(),
            params: Vec::new(),
            last_param_type: None,
            model_object: None,
            next_param_is_model: false,
        }
    }

    fn track_braces(&mut self, token: &Token) {
        if token.is_punct('{') {
            self.brace_depth += 1;
        } else if token.is_punct('}') {
            self.brace_depth -= 1;
        }
    }

    fn annotation_token(&mut self, token: &Token) -> Flow {
        match self.ann_state {
            AnnState::Idle => self.idle_token(token),
            AnnState::AtSign => self.at_sign_token(token),
            AnnState::InMapping => self.mapping_token(token),
            AnnState::InSecurity => self.security_token(token),
        }
    }

    fn idle_token(&mut self, token: &Token) -> Flow {
        if token.is_punct('@') {
            self.ann_state = AnnState::AtSign;
            if self.in_class && self.pending_start_line < 0 {
                self.pending_start_line = token.line;
            }
            return Flow::Continue;
        }
        if token.is_word("class") && !self.in_class {
            self.in_class = true;
            // a class with no controller annotation is never a handler source
            if !self.has_controller_annotation {
                return Flow::Stop;
            }
            return Flow::Continue;
        }
        if token.is_punct('(')
            && self.in_class
            && self.brace_depth == 1
            && self.pending_method_mapping.is_some()
            && self.last_word.is_some()
        {
            self.phase = Phase::Signature;
            self.sig_paren_depth = 1;
            self.sig_words.clear();
            self.params.clear();
            self.binding = None;
            self.binding_explicit_name = None;
            self.binding_optional = false;
            self.model_object = None;
            self.next_param_is_model = false;
            return Flow::Continue;
        }
        self.track_braces(token);
        if token.kind == TokenKind::Word {
            self.last_word = Some(token.text.clone());
        }
        Flow::Continue
    }

    fn at_sign_token(&mut self, token: &Token) -> Flow {
        let TokenKind::Word = token.kind else {
            self.ann_state = AnnState::Idle;
            return Flow::Continue;
        };
        match token.text.as_str() {
            "Controller" | "RestController" => {
                self.has_controller_annotation = true;
                self.ann_state = AnnState::Idle;
            }
            "RequestMapping" => {
                self.mapping = PendingMapping::default();
                self.mapping_expect = MappingExpect::Path;
                self.mapping_paren_depth = 0;
                self.ann_state = AnnState::InMapping;
            }
            "GetMapping" | "PostMapping" | "PutMapping" | "DeleteMapping" | "PatchMapping" => {
                let implied = token.text.trim_end_matches("Mapping").to_ascii_uppercase();
                self.mapping = PendingMapping {
                    path: None,
                    methods: vec![implied],
                };
                self.mapping_expect = MappingExpect::Path;
                self.mapping_paren_depth = 0;
                self.ann_state = AnnState::InMapping;
            }
            "PreAuthorize" | "Secured" | "RolesAllowed" => {
                self.mapping_paren_depth = 0;
                self.ann_state = AnnState::InSecurity;
            }
            _ => self.ann_state = AnnState::Idle,
        }
        Flow::Continue
    }

    fn mapping_token(&mut self, token: &Token) -> Flow {
        if token.is_punct('(') {
            self.mapping_paren_depth += 1;
            return Flow::Continue;
        }
        // an annotation with no argument list ends at the next token
        if self.mapping_paren_depth == 0 {
            self.commit_mapping();
            self.ann_state = AnnState::Idle;
            return self.idle_token(token);
        }
        if token.is_punct(')') {
            self.mapping_paren_depth -= 1;
            if self.mapping_paren_depth == 0 {
                self.commit_mapping();
                self.ann_state = AnnState::Idle;
            }
            return Flow::Continue;
        }
        match &token.kind {
            TokenKind::Word => match token.text.as_str() {
                "value" | "path" => self.mapping_expect = MappingExpect::Path,
                "method" => self.mapping_expect = MappingExpect::Method,
                "params" | "headers" | "produces" | "consumes" | "name" => {
                    self.mapping_expect = MappingExpect::Ignore
                }
                "RequestMethod" => {}
                other if self.mapping_expect == MappingExpect::Method => {
                    let upper = other.to_ascii_uppercase();
                    if HTTP_METHODS.contains(&upper.as_str()) {
                        self.mapping.methods.push(upper);
                    }
                }
                _ => {}
            },
            TokenKind::Str => {
                if self.mapping_expect == MappingExpect::Path && self.mapping.path.is_none() {
                    self.mapping.path = Some(token.text.clone());
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn security_token(&mut self, token: &Token) -> Flow {
        if token.is_punct('(') {
            self.mapping_paren_depth += 1;
            return Flow::Continue;
        }
        if token.is_punct(')') {
            self.mapping_paren_depth -= 1;
            if self.mapping_paren_depth == 0 {
                self.ann_state = AnnState::Idle;
            }
            return Flow::Continue;
        }
        if let TokenKind::Str = token.kind {
            let slot = if self.in_class {
                &mut self.method_security
            } else {
                &mut self.class_security
            };
            if slot.is_none() {
                *slot = Some(token.text.clone());
            }
        }
        Flow::Continue
    }

    fn commit_mapping(&mut self) {
        let mapping = std::mem::take(&mut self.mapping);
        if self.in_class {
            self.pending_method_mapping = Some(mapping);
        } else {
            self.class_path = mapping.path.unwrap_or_default();
            self.class_methods = mapping.methods;
        }
    }

    fn signature_token(&mut self, token: &Token) -> Flow {
        if token.is_punct('(') {
            self.sig_paren_depth += 1;
            return Flow::Continue;
        }
        if token.is_punct(')') {
            self.sig_paren_depth -= 1;
            if self.sig_paren_depth == 0 {
                self.finish_parameter();
                self.phase = Phase::MethodBody;
            }
            return Flow::Continue;
        }
        if token.is_punct('@') && self.sig_paren_depth == 1 {
            self.sig_expect = SigExpect::AnnotationName;
            return Flow::Continue;
        }
        if token.is_punct(',') && self.sig_paren_depth == 1 {
            self.finish_parameter();
            return Flow::Continue;
        }
        match &token.kind {
            TokenKind::Word if self.sig_expect == SigExpect::AnnotationName => {
                self.sig_expect = SigExpect::None;
                self.binding = match token.text.as_str() {
                    "RequestParam" => Some(ParamType::QueryString),
                    "PathVariable" => Some(ParamType::PathVariable),
                    "CookieValue" => Some(ParamType::Cookie),
                    "SessionAttribute" => Some(ParamType::Session),
                    "RequestPart" => Some(ParamType::Files),
                    "RequestHeader" => Some(ParamType::Unknown),
                    "ModelAttribute" => {
                        self.next_param_is_model = true;
                        self.binding
                    }
                    _ => self.binding,
                };
            }
            TokenKind::Word if self.sig_paren_depth == 1 => {
                self.sig_words.push(token.text.clone());
            }
            TokenKind::Word if self.sig_paren_depth > 1 => match token.text.as_str() {
                "required" | "defaultValue" => self.sig_expect = SigExpect::RequiredValue,
                "false" if self.sig_expect == SigExpect::RequiredValue => {
                    self.binding_optional = true;
                    self.sig_expect = SigExpect::None;
                }
                _ => {
                    if self.sig_expect == SigExpect::RequiredValue {
                        // defaultValue implies the parameter may be omitted
                        self.binding_optional = true;
                        self.sig_expect = SigExpect::None;
                    }
                }
            },
            TokenKind::Str if self.sig_paren_depth > 1 => {
                if self.sig_expect == SigExpect::RequiredValue {
                    self.binding_optional = true;
                    self.sig_expect = SigExpect::None;
                } else if self.binding_explicit_name.is_none() {
                    self.binding_explicit_name = Some(token.text.clone());
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    /// Closes out one formal parameter at a `,` or the final `)`.
    fn finish_parameter(&mut self) {
        let words = std::mem::take(&mut self.sig_words);
        let binding = self.binding.take();
        let explicit_name = self.binding_explicit_name.take();
        let optional = self.binding_optional;
        self.binding_optional = false;

        if words.iter().any(|w| w == "BindingResult") {
            // the preceding parameter's declared type is the model object
            self.model_object = self.last_param_type.clone();
            return;
        }
        let Some(var_name) = words.last().cloned() else {
            return;
        };
        let declared_type = if words.len() >= 2 {
            words[words.len() - 2].clone()
        } else {
            String::new()
        };
        self.last_param_type = Some(declared_type.clone());
        if std::mem::take(&mut self.next_param_is_model) {
            self.model_object = Some(declared_type);
            return;
        }

        let Some(param_type) = binding else {
            return;
        };
        let name = explicit_name.unwrap_or(var_name);
        let parameter = RouteParameter::new(name, param_type)
            .with_data_type(ParamDataType::from_type_name(&declared_type))
            .with_optional(optional);
        self.params.push(parameter);
    }

    fn method_body_token(&mut self, token: &Token) -> Flow {
        self.track_braces(token);
        if token.is_punct('}') && self.brace_depth == 1 {
            self.commit_endpoint(token.line);
            self.phase = Phase::Annotation;
        }
        Flow::Continue
    }

    fn commit_endpoint(&mut self, end_line: i64) {
        let Some(mapping) = self.pending_method_mapping.take() else {
            return;
        };
        let path = join_paths(&self.class_path, mapping.path.as_deref().unwrap_or(""));
        let mut methods = mapping.methods;
        if methods.is_empty() {
            methods = self.class_methods.clone();
        }
        if methods.is_empty() {
            methods.push("GET".to_string());
        }

        let security = match (&self.class_security, &self.method_security) {
            (Some(class), Some(method)) => Some(format!("{class} and {method}")),
            (Some(class), None) => Some(class.clone()),
            (None, Some(method)) => Some(method.clone()),
            (None, None) => None,
        };
        if let Some(model) = self.model_object.take() {
            match self.models.get(&model) {
                Some(fields) => self.params.extend(fields.iter().cloned()),
                None => debug!(model, file = self.file_path, "unresolved model object"),
            }
        }

        let mut primary = Endpoint::new(&path, &methods[0], &self.file_path)
            .with_lines(self.pending_start_line, end_line);
        primary.authorization_string = security.clone();
        for parameter in &self.params {
            primary.add_parameter(parameter.clone());
        }
        for method in &methods[1..] {
            let mut variant = Endpoint::new(&path, method, &self.file_path)
                .with_lines(self.pending_start_line, end_line);
            variant.authorization_string = security.clone();
            for parameter in &self.params {
                variant.add_parameter(parameter.clone());
            }
            primary.add_variant(variant);
        }
        self.endpoints.push(primary);

        self.method_security = None;
        self.pending_start_line = -1;
        self.params.clear();
        self.model_object = None;
        self.last_param_type = None;
    }
}

impl TokenVisitor for ControllerMachine<'_> {
    fn token(&mut self, token: &Token) -> Flow {
        match self.phase {
            Phase::Annotation => self.annotation_token(token),
            Phase::Signature => self.signature_token(token),
            Phase::MethodBody => self.method_body_token(token),
        }
    }
}
