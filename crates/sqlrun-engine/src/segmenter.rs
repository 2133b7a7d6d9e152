//! Character-scanning statement splitter.
//!
//! Semicolons end a statement only at block depth zero. `BEGIN` and `CASE`
//! open a block and `END` closes one, so trigger bodies with internal
//! statements stay in one piece. Keywords only count on word boundaries and
//! outside quoted literals and comments.

use std::fmt;

/// Words that follow `BEGIN` when it starts a transaction instead of a block.
const TRANSACTION_MODIFIERS: &[&str] = &["TRANSACTION", "DEFERRED", "IMMEDIATE", "EXCLUSIVE"];

/// Output of [`split_statements`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmented {
    /// Complete statements in script order, trimmed, with their closing `;`.
    pub statements: Vec<String>,
    /// Trailing text that never reached a valid statement boundary.
    pub unterminated: Option<Unterminated>,
}

/// A trailing fragment that cannot be executed as a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unterminated {
    /// A `BEGIN`/`CASE` block was still open at end of input.
    Block { fragment: String, depth: usize },
    /// A quoted literal or identifier was still open at end of input.
    Quote { fragment: String, quote: char },
}

impl Unterminated {
    pub fn fragment(&self) -> &str {
        match self {
            Self::Block { fragment, .. } | Self::Quote { fragment, .. } => fragment,
        }
    }
}

impl fmt::Display for Unterminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block { depth, .. } => {
                write!(f, "unterminated BEGIN/END block (open depth {depth})")
            }
            Self::Quote { quote, .. } => write!(f, "unterminated {quote}-quoted literal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Begin,
    Case,
    End,
}

impl Keyword {
    const ALL: [Keyword; 3] = [Keyword::Begin, Keyword::Case, Keyword::End];

    fn text(self) -> &'static str {
        match self {
            Self::Begin => "BEGIN",
            Self::Case => "CASE",
            Self::End => "END",
        }
    }
}

/// Split a comment-stripped script into standalone statements.
///
/// # Examples
///
/// ```
/// use sqlrun_engine::split_statements;
///
/// let out = split_statements(
///     "CREATE TABLE a (id INT);
///      CREATE TRIGGER t AFTER INSERT ON a BEGIN UPDATE a SET id = 1; END;",
/// );
/// assert_eq!(out.statements.len(), 2);
/// assert!(out.unterminated.is_none());
/// ```
pub fn split_statements(script: &str) -> Segmented {
    let chars: Vec<char> = script.chars().collect();
    let mut scanner = Scanner::new(&chars);
    scanner.run();
    scanner.finish()
}

struct Scanner<'a> {
    chars: &'a [char],
    pos: usize,
    current: String,
    has_code: bool,
    depth: usize,
    mode: Mode,
    statements: Vec<String>,
}

impl<'a> Scanner<'a> {
    fn new(chars: &'a [char]) -> Self {
        Self {
            chars,
            pos: 0,
            current: String::new(),
            has_code: false,
            depth: 0,
            mode: Mode::Code,
            statements: Vec::new(),
        }
    }

    fn run(&mut self) {
        while let Some(ch) = self.peek(0) {
            match self.mode {
                Mode::Quoted(quote) => {
                    self.current.push(ch);
                    self.pos += 1;
                    if ch == quote {
                        // doubled quote is an escaped quote
                        if self.peek(0) == Some(quote) {
                            self.current.push(quote);
                            self.pos += 1;
                        } else {
                            self.mode = Mode::Code;
                        }
                    }
                }
                Mode::LineComment => {
                    self.push_trivia(ch);
                    self.pos += 1;
                    if ch == '\n' {
                        self.mode = Mode::Code;
                    }
                }
                Mode::BlockComment => {
                    self.push_trivia(ch);
                    self.pos += 1;
                    if ch == '*' && self.peek(0) == Some('/') {
                        self.push_trivia('/');
                        self.pos += 1;
                        self.mode = Mode::Code;
                    }
                }
                Mode::Code => self.scan_code(ch),
            }
        }
    }

    fn scan_code(&mut self, ch: char) {
        match ch {
            '\'' | '"' | '`' => {
                self.push_code(ch);
                self.pos += 1;
                self.mode = Mode::Quoted(ch);
            }
            '-' if self.peek(1) == Some('-') => {
                self.push_trivia('-');
                self.push_trivia('-');
                self.pos += 2;
                self.mode = Mode::LineComment;
            }
            '/' if self.peek(1) == Some('*') => {
                self.push_trivia('/');
                self.push_trivia('*');
                self.pos += 2;
                self.mode = Mode::BlockComment;
            }
            ';' => {
                self.current.push(';');
                self.pos += 1;
                if self.depth == 0 {
                    self.close();
                }
            }
            c if c.is_whitespace() => {
                self.push_trivia(c);
                self.pos += 1;
            }
            _ => match self.keyword_here() {
                Some(keyword) => self.apply_keyword(keyword),
                None => {
                    self.push_code(ch);
                    self.pos += 1;
                }
            },
        }
    }

    fn keyword_here(&self) -> Option<Keyword> {
        if !self.at_word_start() {
            return None;
        }
        Keyword::ALL
            .into_iter()
            .find(|keyword| self.matches_word(self.pos, keyword.text()))
    }

    fn apply_keyword(&mut self, keyword: Keyword) {
        let len = keyword.text().len();
        self.current.extend(&self.chars[self.pos..self.pos + len]);
        self.has_code = true;
        self.pos += len;

        match keyword {
            Keyword::Begin if self.begins_transaction() => {}
            Keyword::Begin | Keyword::Case => self.depth += 1,
            Keyword::End => self.depth = self.depth.saturating_sub(1),
        }
    }

    /// `BEGIN;` and `BEGIN TRANSACTION` style statements don't open a block.
    fn begins_transaction(&self) -> bool {
        let mut at = self.pos;
        while self.chars.get(at).is_some_and(|c| c.is_whitespace()) {
            at += 1;
        }
        match self.chars.get(at) {
            Some(';') => true,
            Some(_) => TRANSACTION_MODIFIERS
                .iter()
                .any(|modifier| self.matches_word(at, modifier)),
            None => false,
        }
    }

    fn at_word_start(&self) -> bool {
        match self.pos.checked_sub(1).map(|i| self.chars[i]) {
            None => true,
            Some(prev) => !is_ident_char(prev) && prev != '.',
        }
    }

    fn matches_word(&self, at: usize, word: &str) -> bool {
        let len = word.len();
        let Some(candidate) = self.chars.get(at..at + len) else {
            return false;
        };
        let same = candidate
            .iter()
            .zip(word.chars())
            .all(|(a, b)| a.eq_ignore_ascii_case(&b));
        same && !self.chars.get(at + len).is_some_and(|c| is_ident_char(*c))
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push_code(&mut self, ch: char) {
        self.current.push(ch);
        self.has_code = true;
    }

    // Whitespace and comments ahead of a statement's first token are dropped.
    fn push_trivia(&mut self, ch: char) {
        if self.has_code {
            self.current.push(ch);
        }
    }

    fn close(&mut self) {
        let text = std::mem::take(&mut self.current);
        if self.has_code {
            let trimmed = text.trim();
            if !trimmed.is_empty() && trimmed != ";" {
                self.statements.push(trimmed.to_string());
            }
        }
        self.has_code = false;
    }

    fn finish(mut self) -> Segmented {
        let fragment = self.current.trim().to_string();
        let unterminated = if !self.has_code {
            None
        } else if let Mode::Quoted(quote) = self.mode {
            Some(Unterminated::Quote { fragment, quote })
        } else if self.depth > 0 {
            Some(Unterminated::Block {
                fragment,
                depth: self.depth,
            })
        } else {
            self.close();
            None
        };

        Segmented {
            statements: self.statements,
            unterminated,
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
