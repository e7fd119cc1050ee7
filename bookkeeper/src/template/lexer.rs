//! Splits template text into literal runs, directives and block delimiters.
//!
//! A `$` switches between literal text and directive text. A directive ends
//! at the next `$`, or at a `{` when it is a block header, in which case a
//! `$` directly after the `{` is part of the delimiter. Blocks are closed by
//! a `$}$` directive or by a literal `}` directly before a `$`.

use std::ops::Range;

use crate::template::{Error, ErrorKind};

pub const MARKER: char = '$';
const OPEN: char = '{';
const CLOSE: char = '}';

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Piece<'t> {
    Literal(&'t str),
    Directive(&'t str),
    /// A block header such as `for` or `if CINT`.
    Open(&'t str),
    Close,
}

pub struct Pieces<'t> {
    text: &'t str,
    /// Offset of `text` in the whole template, added to reported ranges.
    base: usize,
    pos: usize,
    depth: usize,
    trim_next: bool,
}

impl<'t> Pieces<'t> {
    /// Scan `text`, skipping its leading whitespace.
    pub fn new(text: &'t str, base: usize) -> Pieces<'t> {
        Pieces {
            text,
            base,
            pos: 0,
            depth: 0,
            trim_next: true,
        }
    }

    /// The number of blocks currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The current position, relative to the whole template.
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    /// The text between two positions relative to the whole template.
    pub fn slice(&self, range: Range<usize>) -> &'t str {
        &self.text[(range.start - self.base)..(range.end - self.base)]
    }

    fn range(&self, start: usize, end: usize) -> Range<usize> {
        (self.base + start)..(self.base + end)
    }

    pub fn next_piece(&mut self) -> Result<Option<(Piece<'t>, Range<usize>)>, Error> {
        if self.trim_next {
            self.trim_next = false;
            let rest = &self.text[self.pos..];
            self.pos += rest.len() - rest.trim_start().len();
        }

        let start = self.pos;
        let rest = &self.text[start..];
        if rest.is_empty() {
            return Ok(None);
        }

        if !rest.starts_with(MARKER) {
            let end = rest.find(MARKER).map_or(self.text.len(), |offset| start + offset);
            let literal = &self.text[start..end];

            if self.depth > 0 && end < self.text.len() && literal.ends_with(CLOSE) {
                let close_start = end - CLOSE.len_utf8();
                if close_start > start {
                    self.pos = close_start;
                    let literal = &self.text[start..close_start];
                    return Ok(Some((Piece::Literal(literal), self.range(start, close_start))));
                }
                self.pos = end + MARKER.len_utf8();
                self.depth -= 1;
                return Ok(Some((Piece::Close, self.range(start, self.pos))));
            }

            self.pos = end;
            return Ok(Some((Piece::Literal(literal), self.range(start, end))));
        }

        let body_start = start + MARKER.len_utf8();
        let body = &self.text[body_start..];
        let offset = match body.find(|c: char| c == MARKER || c == OPEN) {
            Some(offset) => offset,
            None => {
                self.pos = self.text.len();
                return Err(Error::new(
                    ErrorKind::UnterminatedDirective,
                    self.range(start, self.text.len()),
                ));
            }
        };
        let directive = body[..offset].trim();

        if body[offset..].starts_with(OPEN) {
            self.pos = body_start + offset + OPEN.len_utf8();
            if self.text[self.pos..].starts_with(MARKER) {
                self.pos += MARKER.len_utf8();
            }
            self.depth += 1;
            self.trim_next = true;
            return Ok(Some((Piece::Open(directive), self.range(start, self.pos))));
        }

        self.pos = body_start + offset + MARKER.len_utf8();
        let range = self.range(start, self.pos);
        if directive.len() == 1 && directive.starts_with(CLOSE) {
            return match self.depth.checked_sub(1) {
                Some(depth) => {
                    self.depth = depth;
                    Ok(Some((Piece::Close, range)))
                }
                None => Err(Error::new(ErrorKind::MismatchedClose, range)),
            };
        }

        Ok(Some((Piece::Directive(directive), range)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(text: &str) -> Result<Vec<Piece<'_>>, Error> {
        let mut pieces = Pieces::new(text, 0);
        let mut result = Vec::new();
        while let Some((piece, _)) = pieces.next_piece()? {
            result.push(piece);
        }
        Ok(result)
    }

    #[test]
    fn literals_and_directives() {
        assert_eq!(
            pieces("  Hello $ty$: done").unwrap(),
            vec![
                Piece::Literal("Hello "),
                Piece::Directive("ty"),
                Piece::Literal(": done"),
            ],
        );
    }

    #[test]
    fn brace_ends_block_headers() {
        assert_eq!(
            pieces("$for{ $it$ }$").unwrap(),
            vec![
                Piece::Open("for"),
                Piece::Directive("it"),
                Piece::Literal(" "),
                Piece::Close,
            ],
        );
    }

    #[test]
    fn marker_after_brace_is_part_of_the_header() {
        assert_eq!(
            pieces("$if index == 0 {$\n  x$}$").unwrap(),
            vec![Piece::Open("if index == 0"), Piece::Literal("x"), Piece::Close],
        );
    }

    #[test]
    fn closing_brace_outside_blocks_is_literal() {
        assert_eq!(
            pieces("int f() { return 0; }$ty$").unwrap(),
            vec![
                Piece::Literal("int f() { return 0; }"),
                Piece::Directive("ty"),
            ],
        );
    }

    #[test]
    fn mismatched_close() {
        let error = pieces("a $}$").unwrap_err();
        assert_eq!(error.kind, ErrorKind::MismatchedClose);
        assert_eq!(error.range, 2..5);
    }

    #[test]
    fn unterminated_directive() {
        let error = pieces("ok $ty").unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnterminatedDirective);
        assert_eq!(error.range, 3..6);
    }

    #[test]
    fn ranges_include_base() {
        let mut pieces = Pieces::new("$it$", 10);
        let (piece, range) = pieces.next_piece().unwrap().unwrap();
        assert_eq!(piece, Piece::Directive("it"));
        assert_eq!(range, 10..14);
        assert_eq!(pieces.slice(10..14), "$it$");
    }
}
