mod cursor;

use crate::error::DsdlSyntaxError;
use cursor::Cursor;

/// A single lexical token, tagged with its byte offset within the fragment
/// being lexed (a line, or a sub-slice of a line holding one expression).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    UpperIdent,
    Integer,
    Real,
    Str,
    Char,
    True,
    False,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Eq2,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Pipe,
    Amp,
    Caret,
    OrOr,
    AndAnd,
    Bang,
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
}

/// Tokenizes a single line fragment (an expression, a type reference, ...).
///
/// The statement-level grammar (`crate::statement`) is line-oriented and does
/// its own splitting into directive/attribute/marker shapes; this lexer only
/// ever sees the sub-slice of a line that is known to hold an expression or a
/// type-expression, so it does not need to know about `#` comments or
/// newlines at all.
pub(crate) struct Lexer<'a> {
    input: &'a str,
    cursor_offset: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor_offset: 0,
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, DsdlSyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.input.is_empty() {
                break;
            }
            let start = self.cursor_offset;
            let (kind, text) = self.next_token()?;
            tokens.push(Token {
                kind,
                text,
                offset: start,
            });
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.input.trim_start_matches([' ', '\t']);
        self.cursor_offset += self.input.len() - trimmed.len();
        self.input = trimmed;
    }

    fn advance(&mut self, consumed: usize) {
        self.input = &self.input[consumed..];
        self.cursor_offset += consumed;
    }

    fn next_token(&mut self) -> Result<(TokenKind, String), DsdlSyntaxError> {
        let mut cursor = Cursor::new(self.input);
        let first = cursor.bump().expect("checked non-empty above");

        let (kind, text) = match first {
            '"' => self.lex_string(&mut cursor)?,
            '\'' => self.lex_char(&mut cursor)?,
            c if is_ident_start(c) => self.lex_ident(&mut cursor),
            c if c.is_ascii_digit() => self.lex_number(&mut cursor)?,
            '+' => (TokenKind::Plus, "+".to_string()),
            '-' => (TokenKind::Minus, "-".to_string()),
            '*' => {
                if cursor.first() == '*' {
                    cursor.bump();
                    (TokenKind::StarStar, "**".to_string())
                } else {
                    (TokenKind::Star, "*".to_string())
                }
            }
            '/' => {
                if cursor.first() == '/' {
                    cursor.bump();
                    (TokenKind::SlashSlash, "//".to_string())
                } else {
                    (TokenKind::Slash, "/".to_string())
                }
            }
            '%' => (TokenKind::Percent, "%".to_string()),
            '=' => {
                if cursor.first() == '=' {
                    cursor.bump();
                    (TokenKind::Eq2, "==".to_string())
                } else {
                    (TokenKind::Assign, "=".to_string())
                }
            }
            '!' => {
                if cursor.first() == '=' {
                    cursor.bump();
                    (TokenKind::Ne, "!=".to_string())
                } else {
                    (TokenKind::Bang, "!".to_string())
                }
            }
            '<' => {
                if cursor.first() == '=' {
                    cursor.bump();
                    (TokenKind::Le, "<=".to_string())
                } else {
                    (TokenKind::Lt, "<".to_string())
                }
            }
            '>' => {
                if cursor.first() == '=' {
                    cursor.bump();
                    (TokenKind::Ge, ">=".to_string())
                } else {
                    (TokenKind::Gt, ">".to_string())
                }
            }
            '|' => {
                if cursor.first() == '|' {
                    cursor.bump();
                    (TokenKind::OrOr, "||".to_string())
                } else {
                    (TokenKind::Pipe, "|".to_string())
                }
            }
            '&' => {
                if cursor.first() == '&' {
                    cursor.bump();
                    (TokenKind::AndAnd, "&&".to_string())
                } else {
                    (TokenKind::Amp, "&".to_string())
                }
            }
            '^' => (TokenKind::Caret, "^".to_string()),
            '(' => (TokenKind::LParen, "(".to_string()),
            ')' => (TokenKind::RParen, ")".to_string()),
            '[' => (TokenKind::LBracket, "[".to_string()),
            ']' => (TokenKind::RBracket, "]".to_string()),
            '.' => (TokenKind::Dot, ".".to_string()),
            ',' => (TokenKind::Comma, ",".to_string()),
            c => {
                return Err(DsdlSyntaxError::new(format!(
                    "unexpected character {c:?} in expression"
                )))
            }
        };

        let consumed = cursor.len_consumed();
        self.advance(consumed);
        Ok((kind, text))
    }

    fn lex_ident(&mut self, cursor: &mut Cursor<'_>) -> (TokenKind, String) {
        cursor.eat_while(is_ident_continue);
        let text = &self.input[..cursor.len_consumed()];
        let kind = match text {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ if text.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit()) => {
                TokenKind::UpperIdent
            }
            _ => TokenKind::Ident,
        };
        (kind, text.to_string())
    }

    fn lex_number(&mut self, cursor: &mut Cursor<'_>) -> Result<(TokenKind, String), DsdlSyntaxError> {
        // Radix-prefixed integers: 0x.., 0o.., 0b..
        if cursor.len_consumed() == 1 && self.input.starts_with('0') {
            let prefix = cursor.first();
            if matches!(prefix, 'x' | 'X' | 'o' | 'O' | 'b' | 'B') {
                cursor.bump();
                cursor.eat_while(|c| c.is_ascii_alphanumeric());
                let text = &self.input[..cursor.len_consumed()];
                return Ok((TokenKind::Integer, text.to_string()));
            }
        }

        cursor.eat_while(|c| c.is_ascii_digit());
        let mut is_real = false;
        if cursor.first() == '.' && cursor.second().is_ascii_digit() {
            is_real = true;
            cursor.bump();
            cursor.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(cursor.first(), 'e' | 'E') {
            let mut lookahead = cursor.second();
            let exp_has_sign = matches!(lookahead, '+' | '-');
            if exp_has_sign {
                let mut iter = self.input[cursor.len_consumed()..].chars();
                iter.next();
                iter.next();
                lookahead = iter.next().unwrap_or('\0');
            }
            if lookahead.is_ascii_digit() {
                is_real = true;
                cursor.bump();
                if exp_has_sign {
                    cursor.bump();
                }
                cursor.eat_while(|c| c.is_ascii_digit());
            }
        }

        let text = &self.input[..cursor.len_consumed()];
        Ok((
            if is_real {
                TokenKind::Real
            } else {
                TokenKind::Integer
            },
            text.to_string(),
        ))
    }

    fn lex_string(&mut self, cursor: &mut Cursor<'_>) -> Result<(TokenKind, String), DsdlSyntaxError> {
        let mut out = String::new();
        loop {
            match cursor.bump() {
                None => return Err(DsdlSyntaxError::new("unterminated string literal")),
                Some('"') => break,
                Some('\\') => out.push(read_escape(cursor)?),
                Some(c) => out.push(c),
            }
        }
        Ok((TokenKind::Str, out))
    }

    fn lex_char(&mut self, cursor: &mut Cursor<'_>) -> Result<(TokenKind, String), DsdlSyntaxError> {
        let value = match cursor.bump() {
            None => return Err(DsdlSyntaxError::new("unterminated character literal")),
            Some('\\') => read_escape(cursor)?,
            Some(c) => c,
        };
        match cursor.bump() {
            Some('\'') => Ok((TokenKind::Char, value.to_string())),
            _ => Err(DsdlSyntaxError::new(
                "character literal must contain exactly one code point",
            )),
        }
    }
}

fn read_escape(cursor: &mut Cursor<'_>) -> Result<char, DsdlSyntaxError> {
    match cursor.bump() {
        Some('n') => Ok('\n'),
        Some('t') => Ok('\t'),
        Some('r') => Ok('\r'),
        Some('0') => Ok('\0'),
        Some('\\') => Ok('\\'),
        Some('\'') => Ok('\''),
        Some('"') => Ok('"'),
        Some('x') => read_hex_escape(cursor, 2),
        Some('u') => read_hex_escape(cursor, 4),
        _ => Err(DsdlSyntaxError::new("invalid escape sequence")),
    }
}

fn read_hex_escape(cursor: &mut Cursor<'_>, digits: usize) -> Result<char, DsdlSyntaxError> {
    let mut value: u32 = 0;
    for _ in 0..digits {
        let c = cursor
            .bump()
            .ok_or_else(|| DsdlSyntaxError::new("truncated escape sequence"))?;
        let digit = c
            .to_digit(16)
            .ok_or_else(|| DsdlSyntaxError::new("invalid hex digit in escape sequence"))?;
        value = value * 16 + digit;
    }
    char::from_u32(value).ok_or_else(|| DsdlSyntaxError::new("escape sequence is not a valid code point"))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
