/// Tracks bracket nesting and string/comment state one character at a time.
/// Every tokenizer-driven parser feeds characters through a tracker so that
/// punctuation inside literals is never mistaken for structure.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    paren_depth: i32,
    bracket_depth: i32,
    brace_depth: i32,
    in_string: bool,
    quote: char,
    escaped: bool,
    consecutive_quotes: u8,
    triple_quoted: bool,
    string_just_closed: bool,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interpret(&mut self, ch: char) {
        self.string_just_closed = false;

        if self.in_string {
            if self.escaped {
                self.escaped = false;
                return;
            }
            match ch {
                '\\' => self.escaped = true,
                c if c == self.quote => {
                    if self.triple_quoted {
                        self.consecutive_quotes += 1;
                        if self.consecutive_quotes == 3 {
                            self.close_string();
                        }
                    } else {
                        self.close_string();
                    }
                }
                _ => self.consecutive_quotes = 0,
            }
            return;
        }

        match ch {
            '\'' | '"' => {
                self.in_string = true;
                self.quote = ch;
                self.consecutive_quotes = 0;
                self.triple_quoted = false;
            }
            '(' => self.paren_depth += 1,
            ')' => self.paren_depth -= 1,
            '[' => self.bracket_depth += 1,
            ']' => self.bracket_depth -= 1,
            '{' => self.brace_depth += 1,
            '}' => self.brace_depth -= 1,
            _ => {}
        }
    }

    /// Marks the string just opened by `interpret` as a triple-quoted
    /// literal, so that single quote characters inside it do not close it.
    pub fn promote_to_triple(&mut self) {
        if self.in_string {
            self.triple_quoted = true;
            self.consecutive_quotes = 0;
        }
    }

    fn close_string(&mut self) {
        self.in_string = false;
        self.triple_quoted = false;
        self.consecutive_quotes = 0;
        self.string_just_closed = true;
    }

    pub fn in_string(&self) -> bool {
        self.in_string
    }

    pub fn string_just_closed(&self) -> bool {
        self.string_just_closed
    }

    pub fn paren_depth(&self) -> i32 {
        self.paren_depth
    }

    pub fn bracket_depth(&self) -> i32 {
        self.bracket_depth
    }

    pub fn brace_depth(&self) -> i32 {
        self.brace_depth
    }

    pub fn total_depth(&self) -> i32 {
        self.paren_depth + self.bracket_depth + self.brace_depth
    }

    pub fn at_top_level(&self) -> bool {
        !self.in_string && self.total_depth() == 0
    }
}
