//! Expansion of dynamic schema templates.
//!
//! A template is expanded once per compound type. Outside of a loop only
//! type level directives are available. A `for` block is captured as text
//! and expanded again for every field, where the field directives `it`,
//! `it.type` and `tag` and `if` blocks become available.
//!
//! ```text
//! void print_$ty$($ty$* item) {
//!     $for {$
//!         $if CINT {$ $fmt$("%d", item->$it$); $}$
//!         $if CEXTERNAL {$ print_$it.type$(&item->$it$); $}$
//!     $}$
//! }
//! ```

use std::fmt;
use std::ops::Range;

use crate::config::FormatConfig;
use crate::emit::guard::{self, Guard};
use crate::emit::Operation;
use crate::model::{CompoundType, Field, FieldType, Primitive, EXTERNAL_TAG};
use crate::schema::DynamicSchema;

mod lexer;

use self::lexer::{Piece, Pieces};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    UnterminatedDirective,
    UnknownDirective(String),
    /// A block directive without its `{`.
    ExpectedBlockOpen(&'static str),
    NestedFor,
    IfOutsideLoop,
    /// A field directive used outside of a `for` block.
    OutsideLoop(&'static str),
    NotExternal { field: String },
    MismatchedClose,
    UnclosedBlock(&'static str),
    /// A guard closed while another guard is innermost, or never opened.
    MismatchedGuard(&'static str),
    UnclosedGuard(&'static str),
    MissingCondition,
    UnknownCondition(String),
    InvalidIndexComparison(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnterminatedDirective => write!(f, "unterminated directive"),
            ErrorKind::UnknownDirective(name) => write!(f, "unknown directive `{name}`"),
            ErrorKind::ExpectedBlockOpen(name) => write!(f, "expected `{{` after `{name}`"),
            ErrorKind::NestedFor => write!(f, "nested for loops aren't supported"),
            ErrorKind::IfOutsideLoop => write!(f, "`if` can only be used inside a for loop"),
            ErrorKind::OutsideLoop(name) => {
                write!(f, "`{name}` can't be used outside of a for loop")
            }
            ErrorKind::NotExternal { field } => {
                write!(f, "`it.type` used on field `{field}`, which isn't an external type")
            }
            ErrorKind::MismatchedClose => write!(f, "`}}` doesn't close any block"),
            ErrorKind::UnclosedBlock(name) => write!(f, "unclosed `{name}` block"),
            ErrorKind::MismatchedGuard(name) => {
                write!(f, "`end{name}` doesn't close the innermost guard")
            }
            ErrorKind::UnclosedGuard(name) => write!(f, "unclosed `{name}`"),
            ErrorKind::MissingCondition => write!(f, "expected a condition after `if`"),
            ErrorKind::UnknownCondition(condition) => {
                write!(f, "unknown condition `{condition}`")
            }
            ErrorKind::InvalidIndexComparison(condition) => write!(
                f,
                "invalid index comparison `{condition}`, expected `index == N` or `index != N`"
            ),
        }
    }
}

/// A structural error in a template, abandoning its expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    /// Byte range in the template text.
    pub range: Range<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind, range: Range<usize>) -> Error {
        Error { kind, range }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum GuardDirective {
    Implementation,
    Operation(Operation),
    CompoundType,
}

impl GuardDirective {
    fn keyword(self) -> &'static str {
        match self {
            GuardDirective::Implementation => "implguard",
            GuardDirective::Operation(Operation::Dump) => "dumpguard",
            GuardDirective::Operation(Operation::Parse) => "parseguard",
            GuardDirective::CompoundType => "typeguard",
        }
    }
}

/// Guards opened by a template and not yet closed, innermost last.
#[derive(Default)]
struct OpenGuards(Vec<(GuardDirective, Range<usize>)>);

impl OpenGuards {
    fn open(&mut self, guard: GuardDirective, range: Range<usize>) {
        self.0.push((guard, range));
    }

    fn close(&mut self, guard: GuardDirective, range: Range<usize>) -> Result<(), Error> {
        match self.0.last() {
            Some((innermost, _)) if *innermost == guard => {
                self.0.pop();
                Ok(())
            }
            _ => Err(Error::new(ErrorKind::MismatchedGuard(guard.keyword()), range)),
        }
    }

    fn finish(mut self) -> Result<(), Error> {
        match self.0.pop() {
            None => Ok(()),
            Some((guard, range)) => {
                Err(Error::new(ErrorKind::UnclosedGuard(guard.keyword()), range))
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FieldDirective {
    Name,
    Type,
    Tag,
}

impl FieldDirective {
    fn keyword(self) -> &'static str {
        match self {
            FieldDirective::Name => "it",
            FieldDirective::Type => "it.type",
            FieldDirective::Tag => "tag",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Directive {
    TypeName,
    Fmt,
    Dst,
    Offset,
    Open(GuardDirective),
    Close(GuardDirective),
    Field(FieldDirective),
}

fn parse_directive(text: &str) -> Result<Directive, ErrorKind> {
    let directive = match text {
        "ty" => Directive::TypeName,
        "fmt" => Directive::Fmt,
        "dst" => Directive::Dst,
        "offset" => Directive::Offset,
        "implguard" => Directive::Open(GuardDirective::Implementation),
        "endimplguard" => Directive::Close(GuardDirective::Implementation),
        "dumpguard" => Directive::Open(GuardDirective::Operation(Operation::Dump)),
        "enddumpguard" => Directive::Close(GuardDirective::Operation(Operation::Dump)),
        "parseguard" => Directive::Open(GuardDirective::Operation(Operation::Parse)),
        "endparseguard" => Directive::Close(GuardDirective::Operation(Operation::Parse)),
        "typeguard" => Directive::Open(GuardDirective::CompoundType),
        "endtypeguard" => Directive::Close(GuardDirective::CompoundType),
        "it" => Directive::Field(FieldDirective::Name),
        "it.type" => Directive::Field(FieldDirective::Type),
        "tag" => Directive::Field(FieldDirective::Tag),
        _ => match block_keyword(text) {
            ("for", _) => return Err(ErrorKind::ExpectedBlockOpen("for")),
            ("if", _) => return Err(ErrorKind::ExpectedBlockOpen("if")),
            _ => return Err(ErrorKind::UnknownDirective(text.to_owned())),
        },
    };
    Ok(directive)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    /// Matches fields whose category tag the condition starts with.
    Category(String),
    Index { equal: bool, index: usize },
}

impl Condition {
    fn matches(&self, index: usize, field: &Field) -> bool {
        match self {
            Condition::Category(condition) => condition.starts_with(field.r#type.tag()),
            Condition::Index { equal, index: n } => (index == *n) == *equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    For,
    If(Condition),
}

fn block_keyword(header: &str) -> (&str, &str) {
    match header.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (header, ""),
    }
}

fn parse_block(header: &str) -> Result<Block, ErrorKind> {
    match block_keyword(header) {
        ("for", "") => Ok(Block::For),
        ("if", "") => Err(ErrorKind::MissingCondition),
        ("if", condition) => parse_condition(condition).map(Block::If),
        _ => Err(ErrorKind::UnknownDirective(header.to_owned())),
    }
}

fn parse_condition(condition: &str) -> Result<Condition, ErrorKind> {
    if let Some(comparison) = condition.strip_prefix("index") {
        let invalid = || ErrorKind::InvalidIndexComparison(condition.to_owned());
        let comparison = comparison.trim_start();
        let (equal, number) = if let Some(number) = comparison.strip_prefix("==") {
            (true, number)
        } else if let Some(number) = comparison.strip_prefix("!=") {
            (false, number)
        } else {
            return Err(invalid());
        };
        let index = number.trim().parse().map_err(|_| invalid())?;
        return Ok(Condition::Index { equal, index });
    }

    let known = (Primitive::ALL.iter().map(|primitive| primitive.tag()))
        .chain(std::iter::once(EXTERNAL_TAG))
        .any(|tag| condition.starts_with(tag));
    if known {
        Ok(Condition::Category(condition.to_owned()))
    } else {
        Err(ErrorKind::UnknownCondition(condition.to_owned()))
    }
}

/// The captured text of a `for` block.
struct LoopBody {
    text: String,
    /// Offset of `text` in the template.
    base: usize,
}

pub struct Interpreter<'a> {
    config: &'a FormatConfig,
}

impl<'a> Interpreter<'a> {
    pub fn new(config: &'a FormatConfig) -> Interpreter<'a> {
        Interpreter { config }
    }

    /// Expand `template` for `ty`. Nothing is produced if the template has
    /// a structural error.
    pub fn expand(&self, ty: &CompoundType, template: &str) -> Result<String, Error> {
        let mut pieces = Pieces::new(template.trim_end(), 0);
        let mut out = String::new();
        let mut guards = OpenGuards::default();

        while let Some((piece, range)) = pieces.next_piece()? {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Directive(text) => {
                    match parse_directive(text).map_err(|kind| Error::new(kind, range.clone()))? {
                        Directive::Field(directive) => {
                            let kind = ErrorKind::OutsideLoop(directive.keyword());
                            return Err(Error::new(kind, range));
                        }
                        directive => {
                            self.type_directive(ty, directive, range, &mut guards, &mut out)?
                        }
                    }
                }
                Piece::Open(header) => match parse_block(header) {
                    Ok(Block::For) => {
                        let body = capture_loop_body(&mut pieces, range)?;
                        for (index, field) in ty.fields.iter().enumerate() {
                            self.expand_loop_body(ty, &body, index, field, &mut out)?;
                        }
                    }
                    Ok(Block::If(_)) => return Err(Error::new(ErrorKind::IfOutsideLoop, range)),
                    Err(kind) => return Err(Error::new(kind, range)),
                },
                Piece::Close => return Err(Error::new(ErrorKind::MismatchedClose, range)),
            }
        }

        guards.finish()?;
        Ok(out)
    }

    fn expand_loop_body(
        &self,
        ty: &CompoundType,
        body: &LoopBody,
        index: usize,
        field: &Field,
        out: &mut String,
    ) -> Result<(), Error> {
        let mut pieces = Pieces::new(&body.text, body.base);
        // Whether each enclosing `if` matched this field
        let mut branches = Vec::new();
        let mut guards = OpenGuards::default();

        while let Some((piece, range)) = pieces.next_piece()? {
            let active = branches.iter().all(|matched| *matched);
            match piece {
                Piece::Literal(text) if active => out.push_str(text),
                Piece::Literal(_) => {}
                Piece::Directive(text) => {
                    let directive =
                        parse_directive(text).map_err(|kind| Error::new(kind, range.clone()))?;
                    if active {
                        self.field_directive(ty, field, directive, range, &mut guards, out)?;
                    }
                }
                Piece::Open(header) => match parse_block(header) {
                    Ok(Block::If(condition)) => branches.push(condition.matches(index, field)),
                    Ok(Block::For) => return Err(Error::new(ErrorKind::NestedFor, range)),
                    Err(kind) => return Err(Error::new(kind, range)),
                },
                Piece::Close => {
                    if branches.pop().is_none() {
                        return Err(Error::new(ErrorKind::MismatchedClose, range));
                    }
                }
            }
        }

        if !branches.is_empty() {
            let end = body.base + body.text.len();
            return Err(Error::new(ErrorKind::UnclosedBlock("if"), end..end));
        }
        guards.finish()
    }

    fn type_directive(
        &self,
        ty: &CompoundType,
        directive: Directive,
        range: Range<usize>,
        guards: &mut OpenGuards,
        out: &mut String,
    ) -> Result<(), Error> {
        let config = self.config;
        match directive {
            Directive::TypeName => out.push_str(&ty.name),
            Directive::Fmt => out.push_str(&config.fmt_macro),
            Directive::Dst => out.push_str(&config.dst_type),
            Directive::Offset => out.push_str(&config.offset_type),
            Directive::Open(guard) | Directive::Close(guard) => {
                // Guards are whole lines
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                let is_open = matches!(directive, Directive::Open(_));
                match is_open {
                    true => guards.open(guard, range),
                    false => guards.close(guard, range)?,
                }
                match guard {
                    GuardDirective::Implementation if is_open => {
                        guard::open_implementation(config, out)
                    }
                    GuardDirective::Implementation => guard::close_implementation(config, out),
                    GuardDirective::Operation(operation) => {
                        let guard = Guard::operation(&ty.name, operation);
                        match is_open {
                            true => guard.open(config, out),
                            false => guard.close(config, out),
                        }
                    }
                    GuardDirective::CompoundType => {
                        let guard = Guard::compound_type(&ty.name);
                        match is_open {
                            true => guard.open(config, out),
                            false => guard.close(config, out),
                        }
                    }
                }
            }
            Directive::Field(_) => {}
        }
        Ok(())
    }

    fn field_directive(
        &self,
        ty: &CompoundType,
        field: &Field,
        directive: Directive,
        range: Range<usize>,
        guards: &mut OpenGuards,
        out: &mut String,
    ) -> Result<(), Error> {
        match directive {
            Directive::Field(FieldDirective::Name) => out.push_str(&field.name),
            Directive::Field(FieldDirective::Tag) => out.push_str(field.key()),
            Directive::Field(FieldDirective::Type) => match &field.r#type {
                FieldType::External(name) => out.push_str(name),
                FieldType::Primitive(_) => {
                    let kind = ErrorKind::NotExternal {
                        field: field.name.clone(),
                    };
                    return Err(Error::new(kind, range));
                }
            },
            directive => return self.type_directive(ty, directive, range, guards, out),
        }
        Ok(())
    }
}

/// Read the rest of a `for` block whose header has just been read, checking
/// its structure without expanding it.
fn capture_loop_body(pieces: &mut Pieces<'_>, open_range: Range<usize>) -> Result<LoopBody, Error> {
    let start = pieces.position();
    let loop_depth = pieces.depth();

    loop {
        match pieces.next_piece()? {
            None => return Err(Error::new(ErrorKind::UnclosedBlock("for"), open_range)),
            Some((Piece::Close, range)) if pieces.depth() < loop_depth => {
                return Ok(LoopBody {
                    text: pieces.slice(start..range.start).to_owned(),
                    base: start,
                });
            }
            Some((Piece::Open(header), range)) => match parse_block(header) {
                Ok(Block::If(_)) => {}
                Ok(Block::For) => return Err(Error::new(ErrorKind::NestedFor, range)),
                Err(kind) => return Err(Error::new(kind, range)),
            },
            Some((Piece::Directive(text), range)) => {
                parse_directive(text).map_err(|kind| Error::new(kind, range))?;
            }
            Some((Piece::Literal(_) | Piece::Close, _)) => {}
        }
    }
}

/// Expand a dynamic schema's template for one compound type.
pub fn expand_dynamic(
    ty: &CompoundType,
    schema: &DynamicSchema,
    config: &FormatConfig,
) -> Result<String, Error> {
    Interpreter::new(config).expand(ty, &schema.template)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> CompoundType {
        CompoundType::new(
            "Point",
            vec![
                Field::new("x", FieldType::Primitive(Primitive::Int)),
                Field::new("y", FieldType::Primitive(Primitive::Int)),
            ],
        )
    }

    fn mixed() -> CompoundType {
        CompoundType::new(
            "Mixed",
            vec![
                Field::new("a", FieldType::Primitive(Primitive::Int)),
                Field::new("b", FieldType::External("Foo".to_owned())).with_tag("B"),
                Field::new("c", FieldType::Primitive(Primitive::String)),
            ],
        )
    }

    fn expand(ty: &CompoundType, template: &str) -> Result<String, Error> {
        let config = FormatConfig {
            fmt_macro: "PRINT".to_owned(),
            ..FormatConfig::default()
        };
        Interpreter::new(&config).expand(ty, template)
    }

    fn error_kind(ty: &CompoundType, template: &str) -> ErrorKind {
        expand(ty, template).unwrap_err().kind
    }

    #[test]
    fn loop_expands_once_per_field() {
        assert_eq!(
            expand(&point(), "Hello $ty$: $for{ $it$=$fmt$(item->$it$); }$").unwrap(),
            "Hello Point: x=PRINT(item->x); y=PRINT(item->y); ",
        );
    }

    #[test]
    fn directive_style_delimiters() {
        assert_eq!(
            expand(&point(), "$for {$$it$;$}$").unwrap(),
            expand(&point(), "$for{ $it$;}$").unwrap(),
        );
        assert_eq!(expand(&point(), "$for {$$it$;$}$").unwrap(), "x;y;");
    }

    #[test]
    fn whole_template_directives() {
        let config = FormatConfig::default();
        let out = Interpreter::new(&config)
            .expand(&point(), "\n  $ty$ $fmt$ $dst$ $offset$\n\n")
            .unwrap();
        assert_eq!(out, "Point BK_FMT BK_FMT_DST_t BK_OFFSET_t");
    }

    #[test]
    fn category_conditions() {
        let template = "$for {$$if CINT {$i:$it$ $}$$if CEXTERNAL {$e:$it.type$ $}$$}$";
        assert_eq!(expand(&mixed(), template).unwrap(), "i:a e:Foo ");
    }

    #[test]
    fn index_conditions() {
        let template = "$for {$$if index != 0 {$, $}$$it$$}$";
        assert_eq!(expand(&mixed(), template).unwrap(), "a, b, c");

        let template = "$for {$$if index == 2 {$last=$it$$}$$}$";
        assert_eq!(expand(&mixed(), template).unwrap(), "last=c");
    }

    #[test]
    fn nested_conditions() {
        let template = "$for {$$if index != 0 {$$if CSTRING {$$tag$$}$$}$$}$";
        assert_eq!(expand(&mixed(), template).unwrap(), "c");
    }

    #[test]
    fn tag_defaults_to_name() {
        assert_eq!(expand(&mixed(), "$for {$$tag$ $}$").unwrap(), "a B c ");
    }

    #[test]
    fn empty_type_skips_loop() {
        let ty = CompoundType::new("Empty", Vec::new());
        assert_eq!(expand(&ty, "A$for {$$it$$}$B").unwrap(), "AB");
    }

    #[test]
    fn guard_directives() {
        let out = expand(&point(), "$dumpguard$void f();$enddumpguard$").unwrap();
        assert_eq!(
            out,
            "#ifndef BK_DISABLE_DUMP\n\
             #ifndef BK_DISABLE_Point_DUMP\n\
             void f();\n\
             #endif // BK_DISABLE_Point_DUMP\n\
             #endif // BK_DISABLE_DUMP\n",
        );

        let out = expand(&point(), "$implguard$$typeguard$x$endtypeguard$$endimplguard$").unwrap();
        assert_eq!(
            out,
            "#ifdef BK_IMPLEMENTATION\n\
             #ifndef BK_DISABLE_Point\n\
             x\n\
             #endif // BK_DISABLE_Point\n\
             #endif // BK_IMPLEMENTATION\n",
        );
    }

    #[test]
    fn guards_must_be_balanced() {
        let error = expand(&point(), "$dumpguard$void f_$ty$();").unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnclosedGuard("dumpguard"));
        assert_eq!(error.range, 0..11);

        let error = expand(&point(), "x\n$endimplguard$").unwrap_err();
        assert_eq!(error.kind, ErrorKind::MismatchedGuard("implguard"));
        assert_eq!(error.range, 2..16);

        assert_eq!(
            error_kind(&point(), "$implguard$$typeguard$$endimplguard$$endtypeguard$"),
            ErrorKind::MismatchedGuard("implguard"),
        );
    }

    #[test]
    fn loop_guards_close_in_the_same_pass() {
        let out = expand(&point(), "$for {$$typeguard$$it$$endtypeguard$$}$").unwrap();
        assert_eq!(guard::nesting_depth(&out), Some(1));
        assert_eq!(out.matches("#ifndef BK_DISABLE_Point\n").count(), 2);

        assert_eq!(
            error_kind(&point(), "$typeguard$$for {$$endtypeguard$$}$"),
            ErrorKind::MismatchedGuard("typeguard"),
        );
        assert_eq!(
            error_kind(&point(), "$for {$$if index == 0 {$$dumpguard$$}$$}$"),
            ErrorKind::UnclosedGuard("dumpguard"),
        );
    }

    #[test]
    fn nested_for_is_an_error() {
        let kind = error_kind(&point(), "$for {$ $for {$ $it$ $}$ $}$");
        assert_eq!(kind, ErrorKind::NestedFor);
    }

    #[test]
    fn nested_for_in_empty_type_is_an_error() {
        let ty = CompoundType::new("Empty", Vec::new());
        assert_eq!(error_kind(&ty, "$for {$$for {$$}$$}$"), ErrorKind::NestedFor);
    }

    #[test]
    fn field_directives_outside_loops() {
        assert_eq!(error_kind(&point(), "$it$"), ErrorKind::OutsideLoop("it"));
        assert_eq!(error_kind(&point(), "$tag$"), ErrorKind::OutsideLoop("tag"));
        assert_eq!(error_kind(&point(), "$it.type$"), ErrorKind::OutsideLoop("it.type"));
    }

    #[test]
    fn it_type_requires_external_field() {
        assert_eq!(
            error_kind(&mixed(), "$for {$$it.type$$}$"),
            ErrorKind::NotExternal {
                field: "a".to_owned()
            },
        );
    }

    #[test]
    fn malformed_blocks() {
        assert_eq!(error_kind(&point(), "$for$"), ErrorKind::ExpectedBlockOpen("for"));
        assert_eq!(error_kind(&point(), "$if CINT$"), ErrorKind::ExpectedBlockOpen("if"));
        assert_eq!(error_kind(&point(), "$for {$ $it$"), ErrorKind::UnclosedBlock("for"));
        assert_eq!(error_kind(&point(), "$if CINT {$x$}$"), ErrorKind::IfOutsideLoop);
        assert_eq!(error_kind(&point(), "x $}$"), ErrorKind::MismatchedClose);
        assert_eq!(
            error_kind(&point(), "$while {$$}$"),
            ErrorKind::UnknownDirective("while".to_owned()),
        );
    }

    #[test]
    fn malformed_conditions() {
        assert_eq!(error_kind(&point(), "$for {$$if {$$}$$}$"), ErrorKind::MissingCondition);
        assert_eq!(
            error_kind(&point(), "$for {$$if CFOO {$$}$$}$"),
            ErrorKind::UnknownCondition("CFOO".to_owned()),
        );
        assert_eq!(
            error_kind(&point(), "$for {$$if index < 2 {$$}$$}$"),
            ErrorKind::InvalidIndexComparison("index < 2".to_owned()),
        );
        assert_eq!(
            error_kind(&point(), "$for {$$if index == x {$$}$$}$"),
            ErrorKind::InvalidIndexComparison("index == x".to_owned()),
        );
    }

    #[test]
    fn unknown_directive_range() {
        let error = expand(&point(), "ok $bogus$").unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnknownDirective("bogus".to_owned()));
        assert_eq!(error.range, 3..10);
    }

    #[test]
    fn errors_in_loop_bodies_point_into_the_template() {
        let error = expand(&point(), "$for {$ $bogus$ $}$").unwrap_err();
        assert_eq!(error.range, 8..15);
    }

    #[test]
    fn expand_dynamic_uses_schema_template() {
        let schema = DynamicSchema::new("names", "derive_names", "$for {$$it$ $}$\n");
        let out = expand_dynamic(&point(), &schema, &FormatConfig::default()).unwrap();
        assert_eq!(out, "x y ");
    }
}
