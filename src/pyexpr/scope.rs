//! Indentation-derived scope tree for one Python source file. Scopes live
//! in an arena and refer to each other by index, so parent and child links
//! never form ownership cycles.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Class,
    Function,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Alias -> slash-separated module path, from `import`/`from` lines.
    pub imports: HashMap<String, String>,
    pub start_line: i64,
    pub end_line: i64,
    pub indent: usize,
}

#[derive(Debug)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn parse(source: &str) -> Self {
        let mut arena = ScopeArena {
            scopes: vec![Scope {
                kind: ScopeKind::Module,
                name: String::new(),
                parent: None,
                children: Vec::new(),
                imports: HashMap::new(),
                start_line: 1,
                end_line: -1,
                indent: 0,
            }],
        };
        // stack of open scope indices; the module scope never pops
        let mut stack: Vec<usize> = vec![0];
        let mut last_line = 0i64;

        for (offset, raw_line) in source.lines().enumerate() {
            let line_no = offset as i64 + 1;
            last_line = line_no;
            let trimmed = raw_line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let indent = indent_width(raw_line);

            while stack.len() > 1 {
                let top = *stack.last().unwrap_or(&0);
                if indent <= arena.scopes[top].indent {
                    arena.scopes[top].end_line = line_no - 1;
                    stack.pop();
                } else {
                    break;
                }
            }
            let current = *stack.last().unwrap_or(&0);

            if let Some(rest) = trimmed.strip_prefix("def ") {
                let name = declaration_name(rest);
                let idx = arena.push_scope(ScopeKind::Function, name, current, line_no, indent);
                stack.push(idx);
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("class ") {
                let name = declaration_name(rest);
                let idx = arena.push_scope(ScopeKind::Class, name, current, line_no, indent);
                stack.push(idx);
                continue;
            }
            if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
                record_import(trimmed, &mut arena.scopes[current].imports);
            }
        }
        for idx in stack {
            if arena.scopes[idx].end_line < 0 {
                arena.scopes[idx].end_line = last_line;
            }
        }
        arena.scopes[0].end_line = last_line;
        arena
    }

    fn push_scope(
        &mut self,
        kind: ScopeKind,
        name: String,
        parent: usize,
        start_line: i64,
        indent: usize,
    ) -> usize {
        let idx = self.scopes.len();
        self.scopes.push(Scope {
            kind,
            name,
            parent: Some(parent),
            children: Vec::new(),
            imports: HashMap::new(),
            start_line,
            end_line: -1,
            indent,
        });
        self.scopes[parent].children.push(idx);
        idx
    }

    pub fn get(&self, idx: usize) -> &Scope {
        &self.scopes[idx]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Dotted name from the module root down to this scope.
    pub fn full_name(&self, idx: usize) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            let scope = &self.scopes[i];
            if !scope.name.is_empty() {
                parts.push(scope.name.clone());
            }
            cursor = scope.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Finds a function by bare name anywhere in the file.
    pub fn find_function(&self, name: &str) -> Option<usize> {
        self.scopes
            .iter()
            .position(|scope| scope.kind == ScopeKind::Function && scope.name == name)
    }

    /// Resolves an import alias, walking from `idx` up through enclosing
    /// scopes. Returns the slash-separated module path.
    pub fn resolve_import(&self, idx: usize, alias: &str) -> Option<String> {
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            let scope = &self.scopes[i];
            if let Some(path) = scope.imports.get(alias) {
                return Some(path.clone());
            }
            cursor = scope.parent;
        }
        None
    }
}

fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

fn declaration_name(rest: &str) -> String {
    rest.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Records aliases from one `import`/`from` line. Dots in module paths
/// become slashes so aliases resolve straight to file paths.
fn record_import(line: &str, imports: &mut HashMap<String, String>) {
    if let Some(rest) = line.strip_prefix("from ") {
        let Some((module, names)) = rest.split_once(" import ") else {
            return;
        };
        let module_path = module.trim().replace('.', "/");
        for entry in names.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (name, alias) = match entry.split_once(" as ") {
                Some((name, alias)) => (name.trim(), alias.trim()),
                None => (entry, entry),
            };
            imports.insert(alias.to_string(), format!("{module_path}/{name}"));
        }
        return;
    }
    if let Some(rest) = line.strip_prefix("import ") {
        for entry in rest.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (module, alias) = match entry.split_once(" as ") {
                Some((module, alias)) => (module.trim(), alias.trim()),
                None => {
                    let first = entry.split('.').next().unwrap_or(entry);
                    (entry, first)
                }
            };
            imports.insert(alias.to_string(), module.replace('.', "/"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
import os, django.http as http
from app import views as v, models

class Handler:
    def get(self, request):
        return request

def index(request):
    x = 1
    return x

def detail(request, pk):
    return pk
";

    #[test]
    fn scopes_and_lines() {
        let arena = ScopeArena::parse(SOURCE);
        let handler = arena
            .scopes
            .iter()
            .position(|s| s.name == "Handler")
            .unwrap();
        assert_eq!(arena.get(handler).kind, ScopeKind::Class);

        let get = arena.find_function("get").unwrap();
        assert_eq!(arena.full_name(get), "Handler.get");
        assert_eq!(arena.get(get).start_line, 5);
        assert_eq!(arena.get(get).end_line, 7);

        let index = arena.find_function("index").unwrap();
        assert_eq!(arena.get(index).start_line, 8);
        assert_eq!(arena.get(index).end_line, 11);

        let detail = arena.find_function("detail").unwrap();
        assert_eq!(arena.get(detail).end_line, 13);
    }

    #[test]
    fn import_aliases_resolve_upward() {
        let arena = ScopeArena::parse(SOURCE);
        let get = arena.find_function("get").unwrap();
        assert_eq!(
            arena.resolve_import(get, "http").as_deref(),
            Some("django/http")
        );
        assert_eq!(arena.resolve_import(get, "v").as_deref(), Some("app/views"));
        assert_eq!(
            arena.resolve_import(get, "models").as_deref(),
            Some("app/models")
        );
        assert_eq!(arena.resolve_import(get, "os").as_deref(), Some("os"));
        assert_eq!(arena.resolve_import(get, "missing"), None);
    }
}
