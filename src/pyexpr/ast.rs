/// One node of a parsed Python expression. Each node owns its children
/// outright; the structure is always a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PyExpr {
    Variable {
        name: String,
        line: i64,
    },
    StringPrimitive {
        value: String,
        line: i64,
    },
    MemberAccess {
        subject: Box<PyExpr>,
        member: String,
        line: i64,
    },
    FunctionCall {
        subject: Box<PyExpr>,
        args: Vec<PyExpr>,
        line: i64,
    },
    Indexer {
        subject: Box<PyExpr>,
        index: Box<PyExpr>,
        line: i64,
    },
    PrimitiveOperation {
        operator: char,
        subject: Box<PyExpr>,
        operand: Box<PyExpr>,
        line: i64,
    },
    ReturnStatement {
        subject: Box<PyExpr>,
        line: i64,
    },
    /// Parenthesized grouping or tuple listing.
    Scoping {
        entries: Vec<PyExpr>,
        line: i64,
    },
    /// Stands in for anything the parser could not classify.
    Indeterminate {
        line: i64,
    },
}

impl PyExpr {
    pub fn line(&self) -> i64 {
        match self {
            PyExpr::Variable { line, .. }
            | PyExpr::StringPrimitive { line, .. }
            | PyExpr::MemberAccess { line, .. }
            | PyExpr::FunctionCall { line, .. }
            | PyExpr::Indexer { line, .. }
            | PyExpr::PrimitiveOperation { line, .. }
            | PyExpr::ReturnStatement { line, .. }
            | PyExpr::Scoping { line, .. }
            | PyExpr::Indeterminate { line } => *line,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, PyExpr::Indeterminate { .. })
    }

    /// Dotted member path when this node is a chain of member accesses over
    /// a variable, e.g. `request.GET` -> `Some("request.GET")`.
    pub fn member_path(&self) -> Option<String> {
        match self {
            PyExpr::Variable { name, .. } => Some(name.clone()),
            PyExpr::MemberAccess { subject, member, .. } => {
                subject.member_path().map(|base| format!("{base}.{member}"))
            }
            _ => None,
        }
    }

    /// Depth-first walk over this node and all children.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a PyExpr)) {
        visit(self);
        match self {
            PyExpr::MemberAccess { subject, .. } => subject.walk(visit),
            PyExpr::FunctionCall { subject, args, .. } => {
                subject.walk(visit);
                for arg in args {
                    arg.walk(visit);
                }
            }
            PyExpr::Indexer { subject, index, .. } => {
                subject.walk(visit);
                index.walk(visit);
            }
            PyExpr::PrimitiveOperation {
                subject, operand, ..
            } => {
                subject.walk(visit);
                operand.walk(visit);
            }
            PyExpr::ReturnStatement { subject, .. } => subject.walk(visit),
            PyExpr::Scoping { entries, .. } => {
                for entry in entries {
                    entry.walk(visit);
                }
            }
            PyExpr::Variable { .. }
            | PyExpr::StringPrimitive { .. }
            | PyExpr::Indeterminate { .. } => {}
        }
    }
}
