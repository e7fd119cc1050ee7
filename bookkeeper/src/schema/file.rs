//! Dynamic schema files.
//!
//! A schema file starts with a header naming the schema and its derive
//! attribute. Everything after the header is the template:
//!
//! ```text
//! name: "print", derive: "derive_print"
//! void print_$ty$($ty$* item) { ... }
//! ```

use std::fmt;

use crate::files::FileId;
use crate::lexer::{Token, Tokens};
use crate::schema::DynamicSchema;
use crate::source::{ByteRange, FileRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    ExpectedField {
        field: &'static str,
        range: ByteRange,
    },
    ExpectedComma {
        range: ByteRange,
    },
    UnterminatedString {
        range: ByteRange,
    },
}

impl Error {
    pub fn range(&self) -> ByteRange {
        match self {
            Error::ExpectedField { range, .. }
            | Error::ExpectedComma { range }
            | Error::UnterminatedString { range } => *range,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ExpectedField { field, .. } => write!(f, "expected `{field}` field"),
            Error::ExpectedComma { .. } => write!(f, "expected `,` between header fields"),
            Error::UnterminatedString { .. } => write!(f, "unterminated string"),
        }
    }
}

impl std::error::Error for Error {}

/// Parse the header of a schema file, taking the rest as its template.
pub fn parse(file_id: FileId, source: &str) -> Result<DynamicSchema, Error> {
    let mut tokens = Tokens::new(source);

    let name = header_field(&mut tokens, source, "name")?;
    match next_token(&mut tokens, source) {
        (Some(Token::Comma), _) => {}
        (_, range) => return Err(Error::ExpectedComma { range }),
    }
    let derive_attr = header_field(&mut tokens, source, "derive")?;

    let template_start = tokens.current_range().map_or(0, |range| range.end() as usize);
    let template_range = ByteRange::from_offsets(template_start, source.len());

    Ok(DynamicSchema {
        template_range: Some(FileRange::new(file_id, template_range)),
        ..DynamicSchema::new(name, derive_attr, &source[template_start..])
    })
}

/// `<field>: "<value>"`
fn header_field<'source>(
    tokens: &mut Tokens<'source>,
    source: &str,
    field: &'static str,
) -> Result<&'source str, Error> {
    match next_token(tokens, source) {
        (Some(Token::Name(name)), _) if name == field => {}
        (_, range) => return Err(Error::ExpectedField { field, range }),
    }
    match next_token(tokens, source) {
        (Some(Token::Colon), _) => {}
        (_, range) => return Err(Error::ExpectedField { field, range }),
    }
    match next_token(tokens, source) {
        (Some(Token::StringLiteral(value)), _) => Ok(value),
        (Some(Token::Error), range) if tokens.current_text().starts_with('"') => {
            let start = range.start() as usize;
            let end = source[start..].find('\n').map_or(source.len(), |offset| start + offset);
            Err(Error::UnterminatedString {
                range: ByteRange::from_offsets(start, end),
            })
        }
        (_, range) => Err(Error::ExpectedField { field, range }),
    }
}

/// Read a token along with its range, which is empty at the end of the
/// source.
fn next_token<'source>(
    tokens: &mut Tokens<'source>,
    source: &str,
) -> (Option<Token<'source>>, ByteRange) {
    let end_of_source = ByteRange::from_offsets(source.len(), source.len());
    match tokens.next_token() {
        Some(token) => (Some(token), tokens.current_range().unwrap_or(end_of_source)),
        None => (None, end_of_source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_id() -> FileId {
        FileId::try_from(1).unwrap()
    }

    #[test]
    fn header_and_template() {
        let source = "name: \"names\", derive: \"derive_names\"\n$for {$$it$$}$\n";
        let schema = parse(file_id(), source).unwrap();

        assert_eq!(schema.name, "names");
        assert_eq!(schema.derive_attr, "derive_names");
        assert_eq!(schema.template, "\n$for {$$it$$}$\n");

        let range = schema.template_range.unwrap();
        assert_eq!(range.file_id(), file_id());
        assert_eq!(&source[std::ops::Range::<usize>::from(range)], schema.template);
    }

    #[test]
    fn header_allows_comments_and_whitespace() {
        let source = "// a schema\nname :\"a\" ,\n  derive: \"derive_a\"$ty$";
        let schema = parse(file_id(), source).unwrap();
        assert_eq!(schema.template, "$ty$");
    }

    #[test]
    fn missing_name() {
        assert_eq!(
            parse(file_id(), "derive: \"x\""),
            Err(Error::ExpectedField {
                field: "name",
                range: ByteRange::new(0, 6),
            }),
        );
        assert_eq!(
            parse(file_id(), ""),
            Err(Error::ExpectedField {
                field: "name",
                range: ByteRange::new(0, 0),
            }),
        );
    }

    #[test]
    fn missing_comma() {
        let error = parse(file_id(), "name: \"x\" derive: \"y\"").unwrap_err();
        assert_eq!(error, Error::ExpectedComma { range: ByteRange::new(10, 16) });
    }

    #[test]
    fn missing_derive() {
        let error = parse(file_id(), "name: \"x\", drive: \"y\"").unwrap_err();
        assert!(matches!(error, Error::ExpectedField { field: "derive", .. }));
        assert_eq!(error.to_string(), "expected `derive` field");
    }

    #[test]
    fn unterminated_string() {
        let error = parse(file_id(), "name: \"x\ntemplate").unwrap_err();
        assert!(matches!(error, Error::UnterminatedString { .. }));
        assert_eq!(error.range().start(), 6);
        assert_eq!(error.range().end(), 8);
    }
}
