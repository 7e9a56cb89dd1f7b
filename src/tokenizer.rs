//! Event-driven tokenizer shared by every framework extractor.
//!
//! The tokenizer walks a source string once, emitting typed tokens to a
//! visitor. The visitor decides after every token whether tokenization
//! continues, which lets extractors bail out of irrelevant files early.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Number,
    /// Quoted string literal; the token text is the content without quotes.
    Str,
    Punct(char),
    /// Start of a comment; the comment body itself is skipped.
    CommentStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: i64,
    pub text: String,
}

impl Token {
    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punct(ch)
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text == word
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub trait TokenVisitor {
    fn token(&mut self, token: &Token) -> Flow;
}

/// Lexical rules for one source language.
#[derive(Debug, Clone)]
pub struct LanguageRules {
    pub line_comments: &'static [&'static str],
    pub block_comments: &'static [(&'static str, &'static str)],
    /// Python-style triple-quoted multi-line strings.
    pub triple_quotes: bool,
}

pub static JAVA_RULES: LanguageRules = LanguageRules {
    line_comments: &["//"],
    block_comments: &[("/*", "*/")],
    triple_quotes: false,
};

pub static CSHARP_RULES: LanguageRules = LanguageRules {
    line_comments: &["//"],
    block_comments: &[("/*", "*/")],
    triple_quotes: false,
};

pub static RUBY_RULES: LanguageRules = LanguageRules {
    line_comments: &["#"],
    block_comments: &[("=begin", "=end")],
    triple_quotes: false,
};

pub static PYTHON_RULES: LanguageRules = LanguageRules {
    line_comments: &["#"],
    block_comments: &[],
    triple_quotes: true,
};

pub static JSP_RULES: LanguageRules = LanguageRules {
    line_comments: &[],
    block_comments: &[("<%--", "--%>"), ("<!--", "-->"), ("/*", "*/")],
    triple_quotes: false,
};

fn is_word_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn starts_with_at(chars: &[char], index: usize, marker: &str) -> bool {
    marker.chars().enumerate().all(|(offset, expected)| {
        chars
            .get(index + offset)
            .map(|found| *found == expected)
            .unwrap_or(false)
    })
}

/// Tokenizes `source` under `rules`, invoking `visitor` per token until the
/// stream ends or the visitor returns [`Flow::Stop`].
pub fn tokenize(source: &str, rules: &LanguageRules, visitor: &mut dyn TokenVisitor) {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0usize;
    let mut line: i64 = 1;

    'outer: while i < chars.len() {
        let ch = chars[i];

        if ch == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        for marker in rules.line_comments {
            if starts_with_at(&chars, i, marker) {
                let token = Token {
                    kind: TokenKind::CommentStart,
                    line,
                    text: marker.to_string(),
                };
                if visitor.token(&token) == Flow::Stop {
                    return;
                }
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue 'outer;
            }
        }

        for (open, close) in rules.block_comments {
            if starts_with_at(&chars, i, open) {
                let token = Token {
                    kind: TokenKind::CommentStart,
                    line,
                    text: open.to_string(),
                };
                if visitor.token(&token) == Flow::Stop {
                    return;
                }
                i += open.chars().count();
                while i < chars.len() && !starts_with_at(&chars, i, close) {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i = (i + close.chars().count()).min(chars.len());
                continue 'outer;
            }
        }

        if ch == '\'' || ch == '"' {
            let start_line = line;
            let quote = ch;
            let triple = rules.triple_quotes
                && chars.get(i + 1) == Some(&quote)
                && chars.get(i + 2) == Some(&quote);
            let mut text = String::new();
            if triple {
                i += 3;
                while i < chars.len() {
                    if starts_with_at(&chars, i, &quote.to_string().repeat(3)) {
                        i += 3;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    text.push(chars[i]);
                    i += 1;
                }
            } else {
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    if c == '\\' && i + 1 < chars.len() {
                        text.push(c);
                        text.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    if c == quote {
                        i += 1;
                        break;
                    }
                    if c == '\n' {
                        line += 1;
                    }
                    text.push(c);
                    i += 1;
                }
            }
            let token = Token {
                kind: TokenKind::Str,
                line: start_line,
                text,
            };
            if visitor.token(&token) == Flow::Stop {
                return;
            }
            continue;
        }

        if ch.is_ascii_digit() {
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                // a trailing dot belongs to the next token, not the number
                if chars[i] == '.'
                    && !chars
                        .get(i + 1)
                        .map(|c| c.is_ascii_digit())
                        .unwrap_or(false)
                {
                    break;
                }
                text.push(chars[i]);
                i += 1;
            }
            let token = Token {
                kind: TokenKind::Number,
                line,
                text,
            };
            if visitor.token(&token) == Flow::Stop {
                return;
            }
            continue;
        }

        if is_word_start(ch) {
            let mut text = String::new();
            while i < chars.len() && is_word_char(chars[i]) {
                text.push(chars[i]);
                i += 1;
            }
            let token = Token {
                kind: TokenKind::Word,
                line,
                text,
            };
            if visitor.token(&token) == Flow::Stop {
                return;
            }
            continue;
        }

        let token = Token {
            kind: TokenKind::Punct(ch),
            line,
            text: ch.to_string(),
        };
        i += 1;
        if visitor.token(&token) == Flow::Stop {
            return;
        }
    }
}

/// Collects every token into a vector. Extractor unit tests drive their
/// state machines from token sequences produced here.
pub fn tokenize_all(source: &str, rules: &LanguageRules) -> Vec<Token> {
    struct Collector(Vec<Token>);
    impl TokenVisitor for Collector {
        fn token(&mut self, token: &Token) -> Flow {
            self.0.push(token.clone());
            Flow::Continue
        }
    }
    let mut collector = Collector(Vec::new());
    tokenize(source, rules, &mut collector);
    collector.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_numbers_strings_punct() {
        let tokens = tokenize_all("foo = bar(\"x\", 42)", &JAVA_RULES);
        let kinds: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(kinds, vec!["foo", "=", "bar", "(", "x", ",", "42", ")"]);
        assert_eq!(tokens[4].kind, TokenKind::Str);
        assert_eq!(tokens[6].kind, TokenKind::Number);
    }

    #[test]
    fn line_numbers_track_newlines() {
        let tokens = tokenize_all("a\nb\n\nc", &JAVA_RULES);
        let lines: Vec<_> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn comments_are_skipped_after_comment_start() {
        let tokens = tokenize_all("a // hidden\nb /* also\nhidden */ c", &JAVA_RULES);
        let words: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(words, vec!["a", "b", "c"]);
        let comment_count = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::CommentStart)
            .count();
        assert_eq!(comment_count, 2);
        // line counting continues inside block comments
        assert_eq!(tokens.last().map(|t| t.line), Some(3));
    }

    #[test]
    fn triple_quoted_strings_span_lines() {
        let tokens = tokenize_all("x = \"\"\"one\ntwo\"\"\"\ny", &PYTHON_RULES);
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].text, "one\ntwo");
        assert_eq!(tokens[3].text, "y");
        assert_eq!(tokens[3].line, 3);
    }

    #[test]
    fn escaped_quotes_stay_inside_strings() {
        let tokens = tokenize_all(r#""a\"b""#, &JAVA_RULES);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "a\\\"b");
    }

    #[test]
    fn visitor_can_stop_early() {
        struct StopAfterOne(usize);
        impl TokenVisitor for StopAfterOne {
            fn token(&mut self, _token: &Token) -> Flow {
                self.0 += 1;
                Flow::Stop
            }
        }
        let mut visitor = StopAfterOne(0);
        tokenize("a b c d", &JAVA_RULES, &mut visitor);
        assert_eq!(visitor.0, 1);
    }
}
