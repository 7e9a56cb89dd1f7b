use serde::Serialize;
use std::collections::BTreeMap;

/// Inferred data type for a route parameter. Defaults to `String` whenever a
/// declared type cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamDataType {
    String,
    Integer,
    Boolean,
    Decimal,
    LocalDate,
    DateTime,
}

impl ParamDataType {
    /// Maps a source-language type name onto a data type. Unrecognized names
    /// fall back to `String`.
    pub fn from_type_name(name: &str) -> Self {
        let lowered = name.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "int" | "integer" | "long" | "short" | "byte" | "int32" | "int64" => {
                ParamDataType::Integer
            }
            "bool" | "boolean" => ParamDataType::Boolean,
            "float" | "double" | "decimal" | "bigdecimal" | "number" => ParamDataType::Decimal,
            "localdate" | "date" => ParamDataType::LocalDate,
            "datetime" | "localdatetime" | "timestamp" => ParamDataType::DateTime,
            _ => ParamDataType::String,
        }
    }
}

/// How a request binds the parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamType {
    QueryString,
    PathVariable,
    Cookie,
    Session,
    Files,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteParameter {
    pub name: String,
    pub data_type: ParamDataType,
    pub param_type: ParamType,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_values: Option<Vec<String>>,
}

impl RouteParameter {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            data_type: ParamDataType::String,
            param_type,
            optional: false,
            accepted_values: None,
        }
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::QueryString)
    }

    pub fn path_variable(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::PathVariable)
    }

    pub fn with_data_type(mut self, data_type: ParamDataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Folds a second detection of the same logical parameter into this one,
    /// preferring resolved types over defaults.
    pub fn absorb(&mut self, other: &RouteParameter) {
        if self.param_type == ParamType::Unknown && other.param_type != ParamType::Unknown {
            self.param_type = other.param_type;
        }
        if self.data_type == ParamDataType::String && other.data_type != ParamDataType::String {
            self.data_type = other.data_type;
        }
        if other.optional {
            self.optional = true;
        }
        if self.accepted_values.is_none() {
            self.accepted_values = other.accepted_values.clone();
        }
    }
}

/// One reachable request handler. `variants` holds sibling endpoints that
/// share this declaration site but answer a different HTTP method; the
/// holder is the designated primary for the group.
#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    pub url_path: String,
    pub http_method: String,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_string: Option<String>,
    pub parameters: BTreeMap<String, RouteParameter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Endpoint>,
}

impl Endpoint {
    pub fn new(
        url_path: impl Into<String>,
        http_method: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            url_path: url_path.into(),
            http_method: http_method.into().to_ascii_uppercase(),
            file_path: file_path.into(),
            start_line: -1,
            end_line: -1,
            authorization_string: None,
            parameters: BTreeMap::new(),
            variants: Vec::new(),
        }
    }

    pub fn with_lines(mut self, start_line: i64, end_line: i64) -> Self {
        self.start_line = start_line;
        self.end_line = end_line;
        self
    }

    /// Adds a parameter, merging case-insensitively with any existing
    /// parameter of the same name. Keys in the map are lowercased; the
    /// parameter keeps its declared casing in `name`.
    pub fn add_parameter(&mut self, parameter: RouteParameter) {
        let key = parameter.name.to_ascii_lowercase();
        match self.parameters.get_mut(&key) {
            Some(existing) => existing.absorb(&parameter),
            None => {
                self.parameters.insert(key, parameter);
            }
        }
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(&name.to_ascii_lowercase())
    }

    pub fn add_variant(&mut self, variant: Endpoint) {
        self.variants.push(variant);
    }

    /// True when both endpoints come from the same declaration site.
    pub fn same_declaration_site(&self, other: &Endpoint) -> bool {
        self.url_path.eq_ignore_ascii_case(&other.url_path)
            && self.file_path.eq_ignore_ascii_case(&other.file_path)
    }
}

/// User-supplied path correction applied during normalization.
#[derive(Debug, Clone, Serialize)]
pub struct PartialMapping {
    pub search: String,
    pub replacement: String,
}

impl PartialMapping {
    pub fn new(search: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replacement: replacement.into(),
        }
    }
}

/// Which framework's extractor should run over a project root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameworkType {
    Jsp,
    SpringMvc,
    Rails,
    DotNetMvc,
    DotNetWebForms,
    Struts,
    Django,
    None,
    Detect,
}

impl FrameworkType {
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase().replace('-', "_");
        let framework = match lowered.as_str() {
            "jsp" => FrameworkType::Jsp,
            "spring" | "spring_mvc" | "springmvc" => FrameworkType::SpringMvc,
            "rails" => FrameworkType::Rails,
            "dot_net_mvc" | "dotnetmvc" | "mvc" => FrameworkType::DotNetMvc,
            "dot_net_web_forms" | "dotnetwebforms" | "webforms" => FrameworkType::DotNetWebForms,
            "struts" => FrameworkType::Struts,
            "django" | "python" => FrameworkType::Django,
            "none" => FrameworkType::None,
            "detect" => FrameworkType::Detect,
            _ => return None,
        };
        Some(framework)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkType::Jsp => "JSP",
            FrameworkType::SpringMvc => "SPRING_MVC",
            FrameworkType::Rails => "RAILS",
            FrameworkType::DotNetMvc => "DOT_NET_MVC",
            FrameworkType::DotNetWebForms => "DOT_NET_WEB_FORMS",
            FrameworkType::Struts => "STRUTS",
            FrameworkType::Django => "DJANGO",
            FrameworkType::None => "NONE",
            FrameworkType::Detect => "DETECT",
        }
    }

    /// Path matching is case-insensitive for frameworks that conventionally
    /// serve from case-insensitive file systems.
    pub fn case_insensitive_paths(&self) -> bool {
        matches!(self, FrameworkType::DotNetMvc | FrameworkType::DotNetWebForms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_names() {
        assert_eq!(ParamDataType::from_type_name("int"), ParamDataType::Integer);
        assert_eq!(
            ParamDataType::from_type_name("Integer"),
            ParamDataType::Integer
        );
        assert_eq!(
            ParamDataType::from_type_name("boolean"),
            ParamDataType::Boolean
        );
        assert_eq!(
            ParamDataType::from_type_name("LocalDate"),
            ParamDataType::LocalDate
        );
        assert_eq!(
            ParamDataType::from_type_name("DateTime"),
            ParamDataType::DateTime
        );
        assert_eq!(
            ParamDataType::from_type_name("Widget"),
            ParamDataType::String
        );
    }

    #[test]
    fn parameters_merge_case_insensitively() {
        let mut endpoint = Endpoint::new("/items", "GET", "items.rb");
        endpoint.add_parameter(RouteParameter::query("userId"));
        endpoint.add_parameter(
            RouteParameter::new("userid", ParamType::Unknown)
                .with_data_type(ParamDataType::Integer),
        );
        assert_eq!(endpoint.parameters.len(), 1);
        let merged = &endpoint.parameters["userid"];
        assert_eq!(merged.param_type, ParamType::QueryString);
        assert_eq!(merged.data_type, ParamDataType::Integer);
    }

    #[test]
    fn framework_names_parse() {
        assert_eq!(
            FrameworkType::from_name("spring"),
            Some(FrameworkType::SpringMvc)
        );
        assert_eq!(
            FrameworkType::from_name("DOT-NET-MVC"),
            Some(FrameworkType::DotNetMvc)
        );
        assert_eq!(FrameworkType::from_name("fortran"), None);
    }
}
