//! Token source for the C subset recognised by the scanner.
//!
//! The whole input is lexed up front so that lookahead is a matter of copying
//! a [`Cursor`] and restoring it on mismatch.

use logos::{Filter, Logos};

use crate::source::ByteRange;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Logos)]
pub enum Token<'source> {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Name(&'source str),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| &lex.slice()[1..(lex.slice().len() - 1)])]
    StringLiteral(&'source str),
    #[regex(r"'([^'\\\n]|\\.)*'")]
    CharLiteral(&'source str),
    #[regex(r"[0-9][a-zA-Z0-9_.]*")]
    NumberLiteral(&'source str),

    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("*")]
    Star,
    #[token("#")]
    Hash,
    #[token("=")]
    Equals,

    #[token("/*", block_comment)]
    UnclosedBlockComment,

    #[error]
    #[regex(r"\p{Whitespace}", logos::skip)]
    #[regex(r"//[^\n]*", logos::skip)]
    Error,
}

fn block_comment<'source>(lexer: &mut logos::Lexer<'source, Token<'source>>) -> Filter<()> {
    const CLOSE: &str = "*/";

    match lexer.remainder().find(CLOSE) {
        Some(end) => {
            lexer.bump(end + CLOSE.len());
            Filter::Skip
        }
        None => {
            lexer.bump(lexer.remainder().len());
            Filter::Emit(())
        }
    }
}

/// A position in a [`Tokens`] stream. Copy it to look ahead and hand it back
/// to [`Tokens::restore_cursor`] to undo the reads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(usize);

pub struct Tokens<'source> {
    source: &'source str,
    tokens: Vec<(Token<'source>, ByteRange)>,
    cursor: Cursor,
}

impl<'source> Tokens<'source> {
    pub fn new(source: &'source str) -> Tokens<'source> {
        let tokens = Token::lexer(source)
            .spanned()
            .map(|(token, range)| (token, ByteRange::from_offsets(range.start, range.end)))
            .collect();

        Tokens {
            source,
            tokens,
            cursor: Cursor(0),
        }
    }

    /// Read the next token, returning `None` at the end of the input.
    pub fn next_token(&mut self) -> Option<Token<'source>> {
        let (token, _) = self.tokens.get(self.cursor.0)?;
        self.cursor.0 += 1;
        Some(*token)
    }

    pub fn peek_token(&self) -> Option<Token<'source>> {
        self.tokens.get(self.cursor.0).map(|(token, _)| *token)
    }

    pub fn save_cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn restore_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor.0 >= self.tokens.len()
    }

    /// The number of tokens read so far.
    #[cfg(test)]
    pub fn consumed(&self) -> usize {
        self.cursor.0
    }

    /// The range of the most recently read token.
    pub fn current_range(&self) -> Option<ByteRange> {
        let index = self.cursor.0.checked_sub(1)?;
        self.tokens.get(index).map(|(_, range)| *range)
    }

    /// The source text of the most recently read token.
    pub fn current_text(&self) -> &'source str {
        match self.current_range() {
            Some(range) => &self.source[std::ops::Range::<usize>::from(range)],
            None => "",
        }
    }
}
