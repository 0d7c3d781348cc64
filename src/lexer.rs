// ABOUTME: Lexer turning formula source text into a token stream

use crate::error::LexError;
use crate::token::{Position, Token, TokenKind};

const MAX_IDENTIFIER_LEN: usize = 255;
const MAX_LEXEME_LEN: usize = 1000;

/// Converts a formula source string into a flat `Token` stream terminated by
/// a single `Eof` token. Whitespace is discarded; every other source
/// character must be consumed by exactly one token or lexing fails.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.pos)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Lexes the entire source, returning the token stream or the first
    /// error encountered.
    pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.position();
            let Some(c) = self.peek() else {
                tokens.push(Token::eof(start));
                break;
            };

            let token = if c.is_ascii_digit() || (c == '.' && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()))
            {
                self.lex_number(start)?
            } else if c.is_alphabetic() || c == '_' {
                self.lex_word(start)?
            } else {
                self.lex_operator(start)?
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// True if the char at `self.pos` is `e`/`E` and it is followed by a
    /// valid exponent body (`[+-]? digits`), without consuming anything.
    fn exponent_digits_follow(&self) -> bool {
        let mut offset = 1;
        if matches!(self.peek_at(offset), Some('+') | Some('-')) {
            offset += 1;
        }
        matches!(self.peek_at(offset), Some(d) if d.is_ascii_digit())
    }

    fn lex_number(&mut self, start: Position) -> Result<Token, LexError> {
        let mut lexeme = String::new();
        let mut seen_dot = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                self.advance();
            } else if c == '.' && !seen_dot {
                // Require a digit after the dot so "1." is not a valid number.
                if !matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) {
                    break;
                }
                seen_dot = true;
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if lexeme.ends_with('.') || lexeme.is_empty() {
            return Err(LexError::UnterminatedNumber { position: start });
        }

        if matches!(self.peek(), Some('e') | Some('E')) && self.exponent_digits_follow() {
            lexeme.push(self.advance().expect("checked by exponent_digits_follow"));
            if matches!(self.peek(), Some('+') | Some('-')) {
                lexeme.push(self.advance().expect("checked by exponent_digits_follow"));
            }
            while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                lexeme.push(self.advance().expect("checked above"));
            }
        }

        if lexeme.len() > MAX_LEXEME_LEN {
            return Err(LexError::LexemeTooLong {
                position: start,
                max: MAX_LEXEME_LEN,
            });
        }
        Ok(Token::new(TokenKind::Number, lexeme, start))
    }

    /// Lexes an identifier-shaped word, classifying it as a keyword,
    /// boolean literal, bare identifier, or (via one-token lookahead for an
    /// immediately following `(`) a function-call identifier.
    fn lex_word(&mut self, start: Position) -> Result<Token, LexError> {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if lexeme.len() > MAX_IDENTIFIER_LEN {
            return Err(LexError::IdentifierTooLong {
                position: start,
                max: MAX_IDENTIFIER_LEN,
            });
        }

        let kind = match lexeme.to_ascii_uppercase().as_str() {
            "TRUE" => TokenKind::True,
            "FALSE" => TokenKind::False,
            "IF" => TokenKind::If,
            _ => {
                if self.peek() == Some('(') {
                    TokenKind::Identifier
                } else {
                    TokenKind::Variable
                }
            }
        };
        Ok(Token::new(kind, lexeme, start))
    }

    fn lex_operator(&mut self, start: Position) -> Result<Token, LexError> {
        let c = self.advance().expect("checked by caller");
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '=' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Eq
            }
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Neq
            }
            '!' => TokenKind::Not,
            '<' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Leq
            }
            '<' => TokenKind::Lt,
            '>' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Geq
            }
            '>' => TokenKind::Gt,
            '&' if self.peek() == Some('&') => {
                self.advance();
                TokenKind::And
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::Or
            }
            other => {
                return Err(LexError::UnexpectedChar {
                    ch: other,
                    position: start,
                })
            }
        };
        let lexeme: String = self.chars[start.offset..self.pos].iter().collect();
        Ok(Token::new(kind, lexeme, start))
    }
}

/// Convenience entry point: lex a full source string.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).lex()
}
