//! Struts extractor. Action mappings come from `struts.xml` (package
//! namespace + action name + result), supplemented by convention-plugin
//! style `*Action` classes that no mapping references. Parameters are the
//! action class setters.

use super::{EndpointExtractor, read_source, walk_files};
use crate::model::{Endpoint, FrameworkType, ParamDataType, ParamType, RouteParameter};
use crate::tokenizer::{JAVA_RULES, TokenKind, tokenize_all};
use std::collections::HashMap;
use std::path::Path;
use tracing::error;

pub struct StrutsExtractor;

impl EndpointExtractor for StrutsExtractor {
    fn framework(&self) -> FrameworkType {
        FrameworkType::Struts
    }

    fn extract(&self, root: &Path) -> Vec<Endpoint> {
        let Some(config) = find_struts_xml(root) else {
            error!(root = %root.display(), "struts.xml not found");
            return Vec::new();
        };
        let mappings = parse_struts_xml(&config);

        // class simple name -> (file, line count, setter params)
        let mut classes: HashMap<String, ActionClass> = HashMap::new();
        for file in walk_files(root, Some(&["java"])) {
            let Some(source) = read_source(&file) else {
                continue;
            };
            if let Some(parsed) = parse_action_class(&source, &file.rel_path) {
                classes.insert(parsed.name.clone(), parsed);
            }
        }

        let mut endpoints = Vec::new();
        for mapping in &mappings {
            let simple = mapping
                .class
                .rsplit('.')
                .next()
                .unwrap_or(&mapping.class)
                .to_string();
            let class = classes.get(&simple);
            let url = format!(
                "{}/{}.action",
                mapping.namespace.trim_end_matches('/'),
                mapping.name
            );
            endpoints.push(action_endpoint(&url, class, &mapping.class));
        }

        // convention plugin: unmapped *Action classes map by name
        let mapped: Vec<&str> = mappings
            .iter()
            .filter_map(|m| m.class.rsplit('.').next())
            .collect();
        for (name, class) in &classes {
            if mapped.contains(&name.as_str()) {
                continue;
            }
            let base = name.trim_end_matches("Action");
            if base.is_empty() {
                continue;
            }
            let url = format!("/{}.action", hyphenate(base));
            endpoints.push(action_endpoint(&url, Some(class), name));
        }
        endpoints
    }
}

#[derive(Debug, PartialEq)]
pub struct ActionMapping {
    pub namespace: String,
    pub name: String,
    pub class: String,
    pub method: String,
}

struct ActionClass {
    name: String,
    file_path: String,
    line_count: i64,
    params: Vec<RouteParameter>,
}

fn action_endpoint(url: &str, class: Option<&ActionClass>, class_name: &str) -> Endpoint {
    let (file_path, line_count, params) = match class {
        Some(found) => (
            found.file_path.clone(),
            found.line_count,
            found.params.clone(),
        ),
        None => (class_name.to_string(), -2, Vec::new()),
    };
    let mut endpoint = Endpoint::new(url, "GET", &file_path).with_lines(1, line_count + 1);
    let mut variant = Endpoint::new(url, "POST", &file_path).with_lines(1, line_count + 1);
    for param in &params {
        endpoint.add_parameter(param.clone());
        variant.add_parameter(param.clone());
    }
    endpoint.add_variant(variant);
    endpoint
}

fn find_struts_xml(root: &Path) -> Option<String> {
    for file in walk_files(root, Some(&["xml"])) {
        if file.rel_path.ends_with("struts.xml") {
            return crate::util::read_to_string(&file.abs_path).ok();
        }
    }
    None
}

pub fn parse_struts_xml(source: &str) -> Vec<ActionMapping> {
    let mut mappings = Vec::new();
    for package in attr_tag_blocks(source, "package") {
        let namespace = tag_attr(&package.open, "namespace").unwrap_or_default();
        for action in attr_tag_blocks(&package.body, "action") {
            let Some(name) = tag_attr(&action.open, "name") else {
                continue;
            };
            mappings.push(ActionMapping {
                namespace: namespace.clone(),
                name,
                class: tag_attr(&action.open, "class").unwrap_or_default(),
                method: tag_attr(&action.open, "method")
                    .unwrap_or_else(|| "execute".to_string()),
            });
        }
    }
    mappings
}

struct TagBlock {
    /// The opening tag's text, attributes included.
    open: String,
    body: String,
}

/// Blocks for a tag that carries attributes, `<tag ...>body</tag>` and the
/// self-closing `<tag ... />` form.
fn attr_tag_blocks(source: &str, tag: &str) -> Vec<TagBlock> {
    let open_marker = format!("<{tag}");
    let close_marker = format!("</{tag}>");
    let mut blocks = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find(&open_marker) {
        let after = &rest[start..];
        let Some(open_end) = after.find('>') else {
            break;
        };
        let open = after[..open_end + 1].to_string();
        if open.ends_with("/>") {
            blocks.push(TagBlock {
                open,
                body: String::new(),
            });
            rest = &after[open_end + 1..];
            continue;
        }
        let body_start = open_end + 1;
        let Some(end) = after[body_start..].find(&close_marker) else {
            break;
        };
        blocks.push(TagBlock {
            open,
            body: after[body_start..body_start + end].to_string(),
        });
        rest = &after[body_start + end + close_marker.len()..];
    }
    blocks
}

fn tag_attr(open_tag: &str, attr: &str) -> Option<String> {
    let pos = open_tag.find(&format!("{attr}="))? + attr.len() + 1;
    let rest = &open_tag[pos..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = &rest[1..];
    let end = inner.find(quote)?;
    Some(inner[..end].to_string())
}

/// Parses a Java source file as a Struts action class: public setters
/// become request parameters typed by the setter argument.
fn parse_action_class(source: &str, file_path: &str) -> Option<ActionClass> {
    let tokens = tokenize_all(source, &JAVA_RULES);
    let mut name = None;
    let mut params: Vec<RouteParameter> = Vec::new();
    let mut i = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.is_word("class") && name.is_none() {
            if let Some(next) = tokens.get(i + 1) {
                if next.kind == TokenKind::Word {
                    name = Some(next.text.clone());
                }
            }
        } else if token.kind == TokenKind::Word && token.text.starts_with("set") {
            // setFirstName(String firstName) -> firstName
            let opens = tokens.get(i + 1).map(|t| t.is_punct('(')) == Some(true);
            let arg_type = tokens.get(i + 2).filter(|t| t.kind == TokenKind::Word);
            let arg_name = tokens.get(i + 3).filter(|t| t.kind == TokenKind::Word);
            let closes = tokens.get(i + 4).map(|t| t.is_punct(')')) == Some(true);
            if opens && closes {
                if let (Some(arg_type), Some(_)) = (arg_type, arg_name) {
                    let mut chars = token.text[3..].chars();
                    if let Some(first) = chars.next() {
                        let param_name: String =
                            first.to_lowercase().chain(chars).collect();
                        if !params.iter().any(|p| p.name == param_name) {
                            params.push(
                                RouteParameter::new(param_name, ParamType::QueryString)
                                    .with_data_type(ParamDataType::from_type_name(
                                        &arg_type.text,
                                    )),
                            );
                        }
                    }
                }
                i += 5;
                continue;
            }
        }
        i += 1;
    }
    let name = name?;
    if !name.ends_with("Action") {
        return None;
    }
    Some(ActionClass {
        name,
        file_path: file_path.to_string(),
        line_count: crate::util::line_count(source),
        params,
    })
}

fn hyphenate(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struts_xml_mappings_parse() {
        let xml = r#"
<struts>
  <package name="user" namespace="/user" extends="struts-default">
    <action name="login" class="com.example.LoginAction" method="submit">
      <result>/login.jsp</result>
    </action>
    <action name="logout" class="com.example.LogoutAction" />
  </package>
</struts>
"#;
        let mappings = parse_struts_xml(xml);
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].namespace, "/user");
        assert_eq!(mappings[0].name, "login");
        assert_eq!(mappings[0].class, "com.example.LoginAction");
        assert_eq!(mappings[0].method, "submit");
        assert_eq!(mappings[1].method, "execute");
    }

    #[test]
    fn setters_become_parameters() {
        let source = r#"
public class LoginAction extends ActionSupport {
    private String username;
    private int attempts;

    public void setUsername(String username) { this.username = username; }
    public void setAttempts(int attempts) { this.attempts = attempts; }
    public String execute() { return SUCCESS; }
}
"#;
        let class = parse_action_class(source, "src/LoginAction.java").unwrap();
        assert_eq!(class.name, "LoginAction");
        assert_eq!(class.params.len(), 2);
        assert_eq!(class.params[0].name, "username");
        assert_eq!(class.params[1].data_type, ParamDataType::Integer);
    }

    #[test]
    fn hyphenate_splits_camel_case() {
        assert_eq!(hyphenate("UserProfile"), "user-profile");
    }
}
