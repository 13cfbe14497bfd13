//! Tokenizer for embedded script blocks.

use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Str(String),
    Int(i64),
    Float(f64),
    Ident(String),
    Var(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Assign,
    Arrow,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Int(_) | TokenKind::Float(_) => "number".to_string(),
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Var(name) => format!("'${}'", name),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Assign => "'='".to_string(),
            TokenKind::Arrow => "'=>'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Eof => "end of block".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// 1-based line within the block.
    pub line: usize,
}

pub(crate) struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, EvalError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();
            let line = self.line;
            let Some(c) = self.chars.next() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                });
                return Ok(tokens);
            };

            let kind = match c {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,
                '.' => TokenKind::Dot,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '=' => {
                    if self.chars.next_if_eq(&'>').is_some() {
                        TokenKind::Arrow
                    } else {
                        TokenKind::Assign
                    }
                }
                '\'' | '"' => TokenKind::Str(self.string(c, line)?),
                '$' => {
                    let name = self.identifier();
                    if name.is_empty() {
                        return Err(EvalError::new("expected variable name after '$'", line));
                    }
                    TokenKind::Var(name)
                }
                c if c.is_ascii_digit() => self.number(c, line)?,
                c if c.is_alphabetic() || c == '_' => {
                    let mut name = c.to_string();
                    name.push_str(&self.identifier());
                    TokenKind::Ident(name)
                }
                other => {
                    return Err(EvalError::new(
                        format!("unexpected character '{}'", other),
                        line,
                    ));
                }
            };

            tokens.push(Token { kind, line });
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                self.line += 1;
                self.chars.next();
            } else if c.is_whitespace() {
                self.chars.next();
            } else if c == '#' || (c == '/' && self.comment_follows()) {
                while self.chars.next_if(|&c| c != '\n').is_some() {}
            } else {
                break;
            }
        }
    }

    fn comment_follows(&self) -> bool {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.peek() == Some(&'/')
    }

    fn identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self
            .chars
            .next_if(|c| c.is_alphanumeric() || *c == '_')
        {
            name.push(c);
        }
        name
    }

    fn number(&mut self, first: char, line: usize) -> Result<TokenKind, EvalError> {
        let mut text = first.to_string();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit()) {
            text.push(c);
        }

        // `1.5` is a float, `1 . 'a'` and `1.'a'` are concatenations
        let mut lookahead = self.chars.clone();
        if lookahead.next() == Some('.') && lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.chars.next();
            text.push('.');
            while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit()) {
                text.push(c);
            }
            return text
                .parse()
                .map(TokenKind::Float)
                .map_err(|_| EvalError::new(format!("invalid number '{}'", text), line));
        }

        text.parse()
            .map(TokenKind::Int)
            .map_err(|_| EvalError::new(format!("integer '{}' is too large", text), line))
    }

    fn string(&mut self, quote: char, line: usize) -> Result<String, EvalError> {
        let mut value = String::new();

        loop {
            let Some(c) = self.chars.next() else {
                return Err(EvalError::new("unterminated string literal", line));
            };

            match c {
                c if c == quote => return Ok(value),
                '\\' => match self.chars.next() {
                    Some(escaped) if escaped == quote || escaped == '\\' => value.push(escaped),
                    Some('n') if quote == '"' => value.push('\n'),
                    Some('t') if quote == '"' => value.push('\t'),
                    Some('$') if quote == '"' => value.push('$'),
                    Some(other) => {
                        // Unknown escapes are kept as written
                        value.push('\\');
                        value.push(other);
                        if other == '\n' {
                            self.line += 1;
                        }
                    }
                    None => return Err(EvalError::new("unterminated string literal", line)),
                },
                '\n' => {
                    self.line += 1;
                    value.push(c);
                }
                c => value.push(c),
            }
        }
    }
}
