//! .NET WebForms extractor. Every `.aspx` page is an endpoint (GET with a
//! POST variant); its code-behind `.aspx.cs` is scanned for `Request`
//! collection accesses to recover parameters and their lines.

use super::{EndpointExtractor, SourceFile, read_source, walk_files};
use crate::model::{Endpoint, FrameworkType, ParamType, RouteParameter};
use crate::tokenizer::{CSHARP_RULES, TokenKind, tokenize_all};
use std::path::Path;

pub struct DotNetWebFormsExtractor;

impl EndpointExtractor for DotNetWebFormsExtractor {
    fn framework(&self) -> FrameworkType {
        FrameworkType::DotNetWebForms
    }

    fn extract(&self, root: &Path) -> Vec<Endpoint> {
        let mut endpoints = Vec::new();
        for file in walk_files(root, Some(&["aspx"])) {
            endpoints.push(page_endpoint(root, &file));
        }
        endpoints
    }
}

fn page_endpoint(root: &Path, file: &SourceFile) -> Endpoint {
    let url = format!("/{}", file.rel_path);
    let line_count = read_source(file)
        .map(|source| crate::util::line_count(&source))
        .unwrap_or(-2);

    let code_behind = root.join(format!("{}.cs", file.rel_path));
    let (params, file_path) = match crate::util::read_to_string(&code_behind) {
        Ok(source) => (
            scan_request_accesses(&source),
            format!("{}.cs", file.rel_path),
        ),
        Err(_) => (Vec::new(), file.rel_path.clone()),
    };

    let mut endpoint = Endpoint::new(&url, "GET", &file_path).with_lines(1, line_count + 1);
    let mut variant = Endpoint::new(&url, "POST", &file_path).with_lines(1, line_count + 1);
    for param in &params {
        endpoint.add_parameter(param.clone());
        variant.add_parameter(param.clone());
    }
    endpoint.add_variant(variant);
    endpoint
}

/// `Request["x"]`, `Request.QueryString["x"]`, `Request.Form["x"]` and
/// `Request.Params["x"]` accesses in code-behind source.
pub fn scan_request_accesses(source: &str) -> Vec<RouteParameter> {
    let tokens = tokenize_all(source, &CSHARP_RULES);
    let mut params: Vec<RouteParameter> = Vec::new();
    let mut i = 0usize;
    while i < tokens.len() {
        if !tokens[i].is_word("Request") {
            i += 1;
            continue;
        }
        // direct indexer, or one collection member deep
        let index_at = if tokens.get(i + 1).map(|t| t.is_punct('[')) == Some(true) {
            i + 1
        } else if tokens.get(i + 1).map(|t| t.is_punct('.')) == Some(true)
            && tokens.get(i + 3).map(|t| t.is_punct('[')) == Some(true)
            && matches!(
                tokens.get(i + 2).map(|t| t.text.as_str()),
                Some("QueryString" | "Form" | "Params")
            )
        {
            i + 3
        } else {
            i += 1;
            continue;
        };
        let name_token = tokens.get(index_at + 1);
        let closes = tokens.get(index_at + 2).map(|t| t.is_punct(']')) == Some(true);
        if let Some(name_token) = name_token {
            if name_token.kind == TokenKind::Str && closes {
                let name = name_token.text.clone();
                if !params.iter().any(|p| p.name == name) {
                    params.push(RouteParameter::new(name, ParamType::QueryString));
                }
                i = index_at + 3;
                continue;
            }
        }
        i += 1;
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accesses_found() {
        let source = r#"
public partial class Search : System.Web.UI.Page
{
    protected void Page_Load(object sender, EventArgs e)
    {
        string q = Request["q"];
        string page = Request.QueryString["page"];
        string name = Request.Form["name"];
        string other = Request.Params["other"];
        var headers = Request.Headers["X-Test"];
    }
}
"#;
        let params = scan_request_accesses(source);
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["q", "page", "name", "other"]);
    }

    #[test]
    fn duplicate_accesses_collapse() {
        let source = "var a = Request[\"q\"]; var b = Request[\"q\"];";
        assert_eq!(scan_request_accesses(source).len(), 1);
    }
}
