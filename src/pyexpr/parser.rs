//! Statement-level expression parsing: classify atoms, pick the primary
//! operation, and recursively build the expression tree. Operators are
//! applied strictly left-to-right; arithmetic precedence is deliberately
//! not honored. This engine recovers route and parameter expressions,
//! it does not evaluate arithmetic.

use super::ast::PyExpr;
use super::atoms::{group_entries, split_atoms, strip_comment};

const MAX_DEPTH: usize = 50;

const OPERATOR_CHARS: &[char] = &['%', '+', '-', '/', '*', '=', '<', '>'];

const RESERVED_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "def", "class", "import", "from", "as", "with", "try",
    "except", "finally", "lambda", "yield", "global", "nonlocal", "pass", "break", "continue",
    "in", "is", "not", "and", "or", "del", "raise", "assert",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Unknown,
    Invalid,
    Primitive,
    MemberAccess,
    TupleReference,
    Indexer,
    Return,
    ParameterEntry,
    FunctionCall,
}

fn detect_op_kind(atom: &str) -> OpKind {
    if atom == "return" {
        OpKind::Return
    } else if atom == "." {
        OpKind::MemberAccess
    } else if atom.len() == 1 && OPERATOR_CHARS.contains(&atom.chars().next().unwrap_or(' ')) {
        OpKind::Primitive
    } else if atom.starts_with('(') {
        OpKind::TupleReference
    } else if atom == "," {
        OpKind::ParameterEntry
    } else if atom.starts_with('[') {
        OpKind::Indexer
    } else if RESERVED_KEYWORDS.contains(&atom) {
        OpKind::Invalid
    } else {
        OpKind::Unknown
    }
}

/// Classifies every atom, applying the one-token lookback corrections: a
/// tuple reference directly after a bare symbol or member access is a
/// function call, and an indexer that does not follow a bare symbol indexes
/// nothing and degrades to unknown.
pub fn classify(atoms: &[String]) -> Vec<OpKind> {
    let mut kinds = Vec::with_capacity(atoms.len());
    for (i, atom) in atoms.iter().enumerate() {
        let mut kind = detect_op_kind(atom);
        if i > 0 {
            let last: OpKind = kinds[i - 1];
            if kind == OpKind::TupleReference
                && (last == OpKind::Unknown || last == OpKind::MemberAccess)
            {
                kind = OpKind::FunctionCall;
            }
            if kind == OpKind::Indexer && last != OpKind::Unknown {
                kind = OpKind::Unknown;
            }
        }
        kinds.push(kind);
    }
    kinds
}

/// Parses one statement into an expression tree. Never fails: anything the
/// parser cannot classify becomes an [`PyExpr::Indeterminate`] node.
pub fn parse_statement(text: &str, line: i64) -> PyExpr {
    let stripped = strip_comment(text);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return PyExpr::Indeterminate { line };
    }
    let atoms = split_atoms(trimmed);
    parse_atoms(&atoms, None, line, 0)
}

fn parse_atoms(atoms: &[String], subject: Option<PyExpr>, line: i64, depth: usize) -> PyExpr {
    if depth > MAX_DEPTH || atoms.is_empty() {
        return PyExpr::Indeterminate { line };
    }
    let kinds = classify(atoms);
    if kinds.contains(&OpKind::Invalid) {
        return PyExpr::Indeterminate { line };
    }

    if atoms.len() == 1 && subject.is_none() {
        return parse_single(&atoms[0], line, depth);
    }

    // Primary operation: leftmost eligible classification. Parameter
    // entries, indexers and non-initial tuple references are not eligible
    // on their own; a fallback scan picks them up for partial expressions.
    let mut primary = kinds.iter().position(|kind| {
        matches!(
            kind,
            OpKind::Return | OpKind::Primitive | OpKind::MemberAccess | OpKind::FunctionCall
        )
    });
    if primary.is_none() && kinds.first() == Some(&OpKind::TupleReference) {
        primary = Some(0);
    }
    if primary.is_none() {
        primary = kinds
            .iter()
            .position(|kind| !matches!(kind, OpKind::Unknown | OpKind::Invalid));
    }
    let Some(index) = primary else {
        // a bare multi-atom run with no operation at all
        return PyExpr::Indeterminate { line };
    };

    let mut kind = kinds[index];
    // a grouping that already has a subject is really a call on it
    if kind == OpKind::TupleReference && subject.is_some() {
        kind = OpKind::FunctionCall;
    }

    match kind {
        OpKind::Return => {
            let rest = parse_atoms(&atoms[index + 1..], None, line, depth + 1);
            PyExpr::ReturnStatement {
                subject: Box::new(rest),
                line,
            }
        }
        OpKind::Primitive => parse_primitive(atoms, subject, index, line, depth),
        OpKind::MemberAccess => parse_member_access(atoms, &kinds, subject, index, line, depth),
        OpKind::FunctionCall => parse_function_call(atoms, subject, index, line, depth),
        OpKind::TupleReference => parse_scoping(&atoms[index], line, depth),
        OpKind::Indexer => parse_indexer(atoms, subject, index, line, depth),
        OpKind::ParameterEntry => parse_tuple_listing(atoms, line, depth),
        OpKind::Unknown | OpKind::Invalid => PyExpr::Indeterminate { line },
    }
}

fn parse_single(atom: &str, line: i64, depth: usize) -> PyExpr {
    if atom.starts_with('\'') || atom.starts_with('"') {
        let value = atom
            .trim_matches('\'')
            .trim_matches('"')
            .to_string();
        return PyExpr::StringPrimitive { value, line };
    }
    if atom.starts_with('(') {
        return parse_scoping(atom, line, depth);
    }
    if atom.starts_with('[') || atom.starts_with('{') {
        // a bare collection literal carries no route information
        return PyExpr::Indeterminate { line };
    }
    PyExpr::Variable {
        name: atom.to_string(),
        line,
    }
}

fn parse_primitive(
    atoms: &[String],
    subject: Option<PyExpr>,
    index: usize,
    line: i64,
    depth: usize,
) -> PyExpr {
    let operator = atoms[index].chars().next().unwrap_or('=');
    let left = match subject {
        Some(expr) => expr,
        None => parse_atoms(&atoms[..index], None, line, depth + 1),
    };
    let right = parse_atoms(&atoms[index + 1..], None, line, depth + 1);
    PyExpr::PrimitiveOperation {
        operator,
        subject: Box::new(left),
        operand: Box::new(right),
        line,
    }
}

fn parse_member_access(
    atoms: &[String],
    kinds: &[OpKind],
    subject: Option<PyExpr>,
    index: usize,
    line: i64,
    depth: usize,
) -> PyExpr {
    // consume the run of `.`-separated names starting at the primary dot
    let mut last = index;
    while last + 1 < atoms.len()
        && matches!(kinds[last + 1], OpKind::MemberAccess | OpKind::Unknown)
    {
        last += 1;
    }

    let mut node = match subject {
        Some(expr) => expr,
        None => parse_atoms(&atoms[..index], None, line, depth + 1),
    };
    let mut i = index;
    while i <= last {
        if kinds[i] == OpKind::MemberAccess && i + 1 <= last {
            node = PyExpr::MemberAccess {
                subject: Box::new(node),
                member: atoms[i + 1].clone(),
                line,
            };
            i += 2;
        } else {
            i += 1;
        }
    }

    if last + 1 < atoms.len() {
        return parse_atoms(&atoms[last + 1..], Some(node), line, depth + 1);
    }
    node
}

fn parse_function_call(
    atoms: &[String],
    subject: Option<PyExpr>,
    index: usize,
    line: i64,
    depth: usize,
) -> PyExpr {
    let args = group_entries(&atoms[index])
        .iter()
        .map(|entry| {
            let entry_atoms = split_atoms(entry);
            parse_atoms(&entry_atoms, None, line, depth + 1)
        })
        .collect();
    let callee = match subject {
        Some(expr) => expr,
        None => parse_atoms(&atoms[..index], None, line, depth + 1),
    };
    let call = PyExpr::FunctionCall {
        subject: Box::new(callee),
        args,
        line,
    };
    if index + 1 < atoms.len() {
        // trailing expressions chain off the call result
        return parse_atoms(&atoms[index + 1..], Some(call), line, depth + 1);
    }
    call
}

fn parse_indexer(
    atoms: &[String],
    subject: Option<PyExpr>,
    index: usize,
    line: i64,
    depth: usize,
) -> PyExpr {
    let Some(subject) = subject.or_else(|| {
        if index == 0 {
            None
        } else {
            Some(parse_atoms(&atoms[..index], None, line, depth + 1))
        }
    }) else {
        return PyExpr::Indeterminate { line };
    };
    let entries = group_entries(&atoms[index]);
    let index_expr = match entries.as_slice() {
        [single] => {
            let entry_atoms = split_atoms(single);
            parse_atoms(&entry_atoms, None, line, depth + 1)
        }
        _ => PyExpr::Indeterminate { line },
    };
    let node = PyExpr::Indexer {
        subject: Box::new(subject),
        index: Box::new(index_expr),
        line,
    };
    if index + 1 < atoms.len() {
        return parse_atoms(&atoms[index + 1..], Some(node), line, depth + 1);
    }
    node
}

fn parse_scoping(group: &str, line: i64, depth: usize) -> PyExpr {
    let entries = group_entries(group)
        .iter()
        .map(|entry| {
            let entry_atoms = split_atoms(entry);
            parse_atoms(&entry_atoms, None, line, depth + 1)
        })
        .collect();
    PyExpr::Scoping { entries, line }
}

/// Top-level comma listing: `a, b = 1, 2` style multi-assignment pieces.
fn parse_tuple_listing(atoms: &[String], line: i64, depth: usize) -> PyExpr {
    let mut entries = Vec::new();
    let mut start = 0;
    for (i, atom) in atoms.iter().enumerate() {
        if atom == "," {
            entries.push(parse_atoms(&atoms[start..i], None, line, depth + 1));
            start = i + 1;
        }
    }
    entries.push(parse_atoms(&atoms[start..], None, line, depth + 1));
    PyExpr::Scoping { entries, line }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_of_member_call() {
        let parsed = parse_statement("return foo.bar(1, 2)", 3);
        let PyExpr::ReturnStatement { subject, line } = parsed else {
            panic!("expected return statement");
        };
        assert_eq!(line, 3);
        let PyExpr::FunctionCall { subject, args, .. } = *subject else {
            panic!("expected function call");
        };
        assert_eq!(
            *subject,
            PyExpr::MemberAccess {
                subject: Box::new(PyExpr::Variable {
                    name: "foo".into(),
                    line: 3
                }),
                member: "bar".into(),
                line: 3,
            }
        );
        assert_eq!(
            args,
            vec![
                PyExpr::Variable {
                    name: "1".into(),
                    line: 3
                },
                PyExpr::Variable {
                    name: "2".into(),
                    line: 3
                },
            ]
        );
    }

    #[test]
    fn indexed_member_access() {
        let parsed = parse_statement("request.GET['q']", 1);
        let PyExpr::Indexer { subject, index, .. } = parsed else {
            panic!("expected indexer");
        };
        assert_eq!(subject.member_path().as_deref(), Some("request.GET"));
        assert_eq!(
            *index,
            PyExpr::StringPrimitive {
                value: "q".into(),
                line: 1
            }
        );
    }

    #[test]
    fn operators_apply_left_to_right() {
        let parsed = parse_statement("a = b + c", 1);
        let PyExpr::PrimitiveOperation {
            operator, operand, ..
        } = parsed
        else {
            panic!("expected assignment");
        };
        assert_eq!(operator, '=');
        assert!(matches!(
            *operand,
            PyExpr::PrimitiveOperation { operator: '+', .. }
        ));
    }

    #[test]
    fn reserved_keywords_are_indeterminate() {
        assert!(parse_statement("for x in y", 1).is_indeterminate());
        assert!(parse_statement("import os", 1).is_indeterminate());
        assert!(parse_statement("", 1).is_indeterminate());
    }

    #[test]
    fn call_with_getter() {
        let parsed = parse_statement("request.GET.get('name')", 2);
        let PyExpr::FunctionCall { subject, args, .. } = parsed else {
            panic!("expected call");
        };
        assert_eq!(subject.member_path().as_deref(), Some("request.GET.get"));
        assert_eq!(
            args,
            vec![PyExpr::StringPrimitive {
                value: "name".into(),
                line: 2
            }]
        );
    }

    #[test]
    fn tuple_grouping() {
        let parsed = parse_statement("(a, b)", 1);
        let PyExpr::Scoping { entries, .. } = parsed else {
            panic!("expected scoping");
        };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn classification_lookback() {
        let atoms = split_atoms("foo(1)");
        assert_eq!(
            classify(&atoms),
            vec![OpKind::Unknown, OpKind::FunctionCall]
        );
        let atoms = split_atoms("arr[0]");
        assert_eq!(classify(&atoms), vec![OpKind::Unknown, OpKind::Indexer]);
        // an indexer after a closing group indexes nothing
        let atoms = vec!["(a)".to_string(), "[0]".to_string()];
        assert_eq!(
            classify(&atoms),
            vec![OpKind::TupleReference, OpKind::Unknown]
        );
    }
}
