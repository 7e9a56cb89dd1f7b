//! Splits one statement into syntactic atoms: maximal identifier/numeric
//! runs, whole quoted strings, whole bracketed groups, and single operator
//! characters from a fixed set. Splitting respects string and bracket
//! nesting so punctuation inside literals never breaks an atom.

use crate::scope::ScopeTracker;

/// Operator/punctuation characters that form their own atoms at top level.
pub const SPECIAL_CHARS: &[char] = &[
    '%', '+', '-', '/', '*', '=', '.', '(', ')', '[', ']', '{', '}', ':', ',', '#',
];

/// Upper bound on produced atoms; pathological statements stop here.
const MAX_ATOMS: usize = 10_000;

pub fn split_atoms(statement: &str) -> Vec<String> {
    let mut atoms: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut tracker = ScopeTracker::new();

    let chars: Vec<char> = statement.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        i += 1;
        if atoms.len() >= MAX_ATOMS {
            break;
        }
        let in_string_before = tracker.in_string();
        let depth_before = tracker.total_depth();
        tracker.interpret(ch);

        if in_string_before {
            current.push(ch);
            if tracker.string_just_closed() && depth_before == 0 {
                flush(&mut atoms, &mut current);
            }
            continue;
        }

        if tracker.in_string() {
            // string opened; at top level it becomes its own atom
            if depth_before == 0 {
                flush(&mut atoms, &mut current);
            }
            current.push(ch);
            // a doubled opener quote marks a multi-line literal; the two
            // extra quotes belong to the opener, not the closer
            if chars.get(i) == Some(&ch) && chars.get(i + 1) == Some(&ch) {
                tracker.promote_to_triple();
                current.push(ch);
                current.push(ch);
                i += 2;
            }
            continue;
        }

        let depth_after = tracker.total_depth();
        if depth_before > 0 || depth_after > 0 {
            if depth_before == 0 && depth_after > 0 {
                // group opens
                flush(&mut atoms, &mut current);
                current.push(ch);
            } else if depth_before > 0 && depth_after == 0 {
                // group closes
                current.push(ch);
                flush(&mut atoms, &mut current);
            } else {
                current.push(ch);
            }
            continue;
        }

        if ch.is_whitespace() {
            flush(&mut atoms, &mut current);
            continue;
        }
        if SPECIAL_CHARS.contains(&ch) {
            flush(&mut atoms, &mut current);
            atoms.push(ch.to_string());
            continue;
        }
        current.push(ch);
    }
    flush(&mut atoms, &mut current);
    fuse_decimals(atoms)
}

fn flush(atoms: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        atoms.push(std::mem::take(current));
    }
}

/// Collapses `12 . 34` atom triples back into one decimal literal.
fn fuse_decimals(atoms: Vec<String>) -> Vec<String> {
    let mut fused: Vec<String> = Vec::with_capacity(atoms.len());
    let mut i = 0;
    while i < atoms.len() {
        let is_decimal = i + 2 < atoms.len()
            && atoms[i + 1] == "."
            && is_all_digits(&atoms[i])
            && is_all_digits(&atoms[i + 2]);
        if is_decimal {
            fused.push(format!("{}.{}", atoms[i], atoms[i + 2]));
            i += 3;
        } else {
            fused.push(atoms[i].clone());
            i += 1;
        }
    }
    fused
}

fn is_all_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Cuts the statement at the first `#` that sits outside any string.
pub fn strip_comment(statement: &str) -> &str {
    let mut tracker = ScopeTracker::new();
    for (offset, ch) in statement.char_indices() {
        if ch == '#' && !tracker.in_string() {
            return &statement[..offset];
        }
        tracker.interpret(ch);
    }
    statement
}

/// Splits the inside of a `(...)` or `[...]` group atom into its top-level
/// comma-separated entries.
pub fn group_entries(group: &str) -> Vec<String> {
    let inner = group
        .trim()
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']']);
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut tracker = ScopeTracker::new();
    for ch in inner.chars() {
        if ch == ',' && tracker.at_top_level() {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                entries.push(trimmed);
            }
            current.clear();
        } else {
            current.push(ch);
        }
        tracker.interpret(ch);
    }
    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        entries.push(trimmed);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_call_splits_into_four_atoms() {
        assert_eq!(
            split_atoms("foo.bar(1, 2)"),
            vec!["foo", ".", "bar", "(1, 2)"]
        );
    }

    #[test]
    fn strings_are_single_atoms() {
        assert_eq!(split_atoms("x = 'a + b'"), vec!["x", "=", "'a + b'"]);
    }

    #[test]
    fn decimals_fuse_back_together() {
        assert_eq!(split_atoms("y = 12.34"), vec!["y", "=", "12.34"]);
        assert_eq!(split_atoms("a.b"), vec!["a", ".", "b"]);
    }

    #[test]
    fn bracket_groups_stay_whole() {
        assert_eq!(
            split_atoms("request.GET['q']"),
            vec!["request", ".", "GET", "['q']"]
        );
        assert_eq!(split_atoms("(a, (b, c))"), vec!["(a, (b, c))"]);
    }

    #[test]
    fn triple_quoted_strings_are_single_atoms() {
        assert_eq!(split_atoms("x = '''a b'''"), vec!["x", "=", "'''a b'''"]);
        assert_eq!(
            split_atoms("doc = \"\"\"line one\nline 'two'\"\"\""),
            vec!["doc", "=", "\"\"\"line one\nline 'two'\"\"\""]
        );
        assert_eq!(split_atoms("e = ''''''"), vec!["e", "=", "''''''"]);
    }

    #[test]
    fn comment_stripping_respects_strings() {
        assert_eq!(strip_comment("x = 1 # note"), "x = 1 ");
        assert_eq!(strip_comment("x = '#'"), "x = '#'");
    }

    #[test]
    fn group_entries_split_top_level_commas() {
        assert_eq!(group_entries("(1, 2)"), vec!["1", "2"]);
        assert_eq!(group_entries("(f(a, b), c)"), vec!["f(a, b)", "c"]);
        assert_eq!(group_entries("['q']"), vec!["'q'"]);
    }
}
