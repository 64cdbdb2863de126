/// One lexeme of an expression, borrowed from the source text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Token<'a, K> {
    pub kind: K,
    pub text: &'a str,
    /// Byte offset of the first character.
    pub position: usize,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MathTokenKind {
    Number,
    Identifier,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LeftParen,
    RightParen,
    Comma,
    Unknown,
    EndOfInput,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BoolTokenKind {
    True,
    False,
    Identifier,
    And,
    Or,
    Not,
    Equals,
    NotEquals,
    LeftParen,
    RightParen,
    Unknown,
    EndOfInput,
}

/// Character cursor shared by both tokenizers.
#[derive(Clone, Debug)]
struct Scanner<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, offset: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat_while(&mut self, mut accept: impl FnMut(char) -> bool) {
        while self.peek().is_some_and(&mut accept) {
            self.bump();
        }
    }

    fn slice_from(&self, start: usize) -> &'a str {
        &self.source[start..self.offset]
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scans arithmetic expressions.
#[derive(Clone, Debug)]
pub struct MathTokenizer<'a> {
    scanner: Scanner<'a>,
}

impl<'a> MathTokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            scanner: Scanner::new(source),
        }
    }

    /// Produces the next token. Keeps returning [`MathTokenKind::EndOfInput`]
    /// once the source is exhausted.
    pub fn next_token(&mut self) -> Token<'a, MathTokenKind> {
        self.scanner.skip_whitespace();
        let start = self.scanner.offset;
        let Some(c) = self.scanner.bump() else {
            return Token {
                kind: MathTokenKind::EndOfInput,
                text: "",
                position: start,
            };
        };

        let kind = match c {
            '0'..='9' | '.' => {
                let mut seen_point = c == '.';
                self.scanner.eat_while(|c| match c {
                    '0'..='9' => true,
                    '.' if !seen_point => {
                        seen_point = true;
                        true
                    }
                    _ => false,
                });
                MathTokenKind::Number
            }
            c if is_identifier_start(c) => {
                self.scanner.eat_while(is_identifier_continue);
                MathTokenKind::Identifier
            }
            '+' => MathTokenKind::Plus,
            '-' => MathTokenKind::Minus,
            '*' => MathTokenKind::Star,
            '/' => MathTokenKind::Slash,
            '^' => MathTokenKind::Caret,
            '(' => MathTokenKind::LeftParen,
            ')' => MathTokenKind::RightParen,
            ',' => MathTokenKind::Comma,
            _ => MathTokenKind::Unknown,
        };

        Token {
            kind,
            text: self.scanner.slice_from(start),
            position: start,
        }
    }
}

/// Scans boolean expressions.
#[derive(Clone, Debug)]
pub struct BoolTokenizer<'a> {
    scanner: Scanner<'a>,
}

impl<'a> BoolTokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            scanner: Scanner::new(source),
        }
    }

    /// Produces the next token. Keeps returning [`BoolTokenKind::EndOfInput`]
    /// once the source is exhausted.
    pub fn next_token(&mut self) -> Token<'a, BoolTokenKind> {
        self.scanner.skip_whitespace();
        let start = self.scanner.offset;
        let Some(c) = self.scanner.bump() else {
            return Token {
                kind: BoolTokenKind::EndOfInput,
                text: "",
                position: start,
            };
        };

        let kind = match (c, self.scanner.peek()) {
            ('&', Some('&')) => self.pair(BoolTokenKind::And),
            ('|', Some('|')) => self.pair(BoolTokenKind::Or),
            ('=', Some('=')) => self.pair(BoolTokenKind::Equals),
            ('!', Some('=')) => self.pair(BoolTokenKind::NotEquals),
            ('!', _) => BoolTokenKind::Not,
            ('(', _) => BoolTokenKind::LeftParen,
            (')', _) => BoolTokenKind::RightParen,
            (c, _) if is_identifier_start(c) => {
                self.scanner.eat_while(is_identifier_continue);
                keyword_kind(self.scanner.slice_from(start))
            }
            _ => BoolTokenKind::Unknown,
        };

        Token {
            kind,
            text: self.scanner.slice_from(start),
            position: start,
        }
    }

    fn pair(&mut self, kind: BoolTokenKind) -> BoolTokenKind {
        self.scanner.bump();
        kind
    }
}

fn keyword_kind(word: &str) -> BoolTokenKind {
    match word.to_ascii_lowercase().as_str() {
        "and" => BoolTokenKind::And,
        "or" => BoolTokenKind::Or,
        "not" => BoolTokenKind::Not,
        "true" => BoolTokenKind::True,
        "false" => BoolTokenKind::False,
        "equals" => BoolTokenKind::Equals,
        "notequals" | "not_equal" | "neq" => BoolTokenKind::NotEquals,
        _ => BoolTokenKind::Identifier,
    }
}
