//! Recognises `typedef struct { ... } Name attr();` declarations.
//!
//! The scanner is deliberately forgiving: anything that isn't a declaration
//! is skipped a token at a time, and a declaration it can't make sense of is
//! dropped. Every step either consumes tokens or stops, so malformed input
//! can't stall it.

use crate::files::FileId;
use crate::lexer::{Token, Tokens};
use crate::model::{CompoundType, Field, FieldType, Primitive};
use crate::reporting::ScanMessage;
use crate::schema::{SchemaRegistry, SchemaSet, DERIVE_ALL, TAG_ATTRIBUTE};
use crate::source::{ByteRange, FileRange};

/// A field alternative, tried against the upcoming tokens.
type FieldShape = fn(&mut Tokens<'_>) -> Option<Field>;

/// Field alternatives in priority order. The last one accepts any pair of
/// names, so it has to come after the primitive spellings.
const FIELD_SHAPES: [FieldShape; 5] = [
    const_char_pointer_field,
    char_pointer_field,
    two_word_primitive_field,
    one_word_primitive_field,
    external_field,
];

pub struct Scanner<'a> {
    registry: &'a SchemaRegistry,
    derive_all: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Scanner<'a> {
        Scanner {
            registry,
            derive_all: false,
        }
    }

    /// Derive every schema for every type, whatever its attributes.
    pub fn derive_all(mut self, derive_all: bool) -> Scanner<'a> {
        self.derive_all = derive_all;
        self
    }

    /// Scan `source` for compound type declarations, in source order.
    pub fn scan(
        &self,
        file_id: FileId,
        source: &str,
        on_message: &mut dyn FnMut(ScanMessage),
    ) -> Vec<CompoundType> {
        let mut tokens = Tokens::new(source);
        let mut types = Vec::new();

        while !tokens.is_at_end() {
            let start = tokens.save_cursor();
            let is_declaration = keyword(&mut tokens, "typedef")
                && keyword(&mut tokens, "struct")
                && token(&mut tokens, Token::OpenBrace);
            if !is_declaration {
                tokens.restore_cursor(start);
                if tokens.next_token() == Some(Token::UnclosedBlockComment) {
                    if let Some(range) = tokens.current_range() {
                        // Only the opening `/*`, the token runs to the end of the file
                        let start = range.start();
                        let range = ByteRange::new(start, start.saturating_add(2));
                        let range = FileRange::new(file_id, range);
                        on_message(ScanMessage::UnclosedBlockComment { range });
                    }
                }
                continue;
            }

            let fields = fields(&mut tokens);
            let name = match probe(&mut tokens, |tokens| {
                token(tokens, Token::CloseBrace).then_some(())?;
                name(tokens)
            }) {
                Some(name) => name,
                // Drop the declaration and carry on from where it stopped
                None => continue,
            };

            let mut ty = CompoundType::new(name, fields);
            if self.derive_all {
                ty.derived_schemas = SchemaSet::ALL;
            }
            self.attributes(file_id, &mut tokens, &mut ty, on_message);
            types.push(ty);
        }

        types
    }

    /// Read the `name()` invocations following a type's name.
    fn attributes(
        &self,
        file_id: FileId,
        tokens: &mut Tokens<'_>,
        ty: &mut CompoundType,
        on_message: &mut dyn FnMut(ScanMessage),
    ) {
        while let Some((attribute, range)) = probe(tokens, |tokens| {
            let attribute = name(tokens)?;
            let range = tokens.current_range()?;
            token(tokens, Token::OpenParen).then_some(())?;
            token(tokens, Token::CloseParen).then_some(())?;
            Some((attribute, range))
        }) {
            if attribute == DERIVE_ALL {
                ty.derived_schemas = SchemaSet::ALL;
            } else if let Some(id) = self.registry.find_derive_attr(attribute) {
                ty.derived_schemas.insert(id);
            } else {
                on_message(ScanMessage::UnknownAttribute {
                    range: FileRange::new(file_id, range),
                    attribute: attribute.to_owned(),
                    type_name: ty.name.clone(),
                    suggestion: self.registry.suggest_derive_attr(attribute).map(str::to_owned),
                });
            }
        }
    }
}

/// Read fields until none of the alternatives match.
fn fields(tokens: &mut Tokens<'_>) -> Vec<Field> {
    let mut fields = Vec::new();

    while tokens.peek_token() != Some(Token::CloseBrace) {
        let field = FIELD_SHAPES.iter().find_map(|shape| probe(tokens, *shape));
        match field {
            Some(field) => match tag_attribute(tokens) {
                Some(tag) => fields.push(field.with_tag(tag)),
                None => fields.push(field),
            },
            None => break,
        }
    }

    fields
}

/// `tag("key")` after a field's `;`.
fn tag_attribute(tokens: &mut Tokens<'_>) -> Option<String> {
    probe(tokens, |tokens| {
        keyword(tokens, TAG_ATTRIBUTE).then_some(())?;
        token(tokens, Token::OpenParen).then_some(())?;
        let tag = match tokens.next_token()? {
            Token::StringLiteral(tag) => tag,
            _ => return None,
        };
        token(tokens, Token::CloseParen).then_some(())?;
        Some(tag.to_owned())
    })
}

fn const_char_pointer_field(tokens: &mut Tokens<'_>) -> Option<Field> {
    keyword(tokens, "const").then_some(())?;
    char_pointer_field(tokens)
}

fn char_pointer_field(tokens: &mut Tokens<'_>) -> Option<Field> {
    keyword(tokens, "char").then_some(())?;
    token(tokens, Token::Star).then_some(())?;
    field_end(tokens, FieldType::Primitive(Primitive::String))
}

fn two_word_primitive_field(tokens: &mut Tokens<'_>) -> Option<Field> {
    let (first, second) = (name(tokens)?, name(tokens)?);
    let primitive = Primitive::from_two_word_spelling(first, second)?;
    field_end(tokens, FieldType::Primitive(primitive))
}

fn one_word_primitive_field(tokens: &mut Tokens<'_>) -> Option<Field> {
    let primitive = Primitive::from_spelling(name(tokens)?)?;
    field_end(tokens, FieldType::Primitive(primitive))
}

fn external_field(tokens: &mut Tokens<'_>) -> Option<Field> {
    let type_name = name(tokens)?;
    field_end(tokens, FieldType::External(type_name.to_owned()))
}

/// The field name and `;` shared by every alternative.
fn field_end(tokens: &mut Tokens<'_>, r#type: FieldType) -> Option<Field> {
    let field_name = name(tokens)?;
    token(tokens, Token::Semicolon).then_some(())?;
    Some(Field::new(field_name, r#type))
}

/// Run `f`, rewinding the tokens it read unless it succeeds.
fn probe<'source, T>(
    tokens: &mut Tokens<'source>,
    f: impl FnOnce(&mut Tokens<'source>) -> Option<T>,
) -> Option<T> {
    let start = tokens.save_cursor();
    let result = f(tokens);
    if result.is_none() {
        tokens.restore_cursor(start);
    }
    result
}

fn name<'source>(tokens: &mut Tokens<'source>) -> Option<&'source str> {
    match tokens.next_token()? {
        Token::Name(name) => Some(name),
        _ => None,
    }
}

fn keyword(tokens: &mut Tokens<'_>, keyword: &str) -> bool {
    name(tokens) == Some(keyword)
}

fn token(tokens: &mut Tokens<'_>, expected: Token<'_>) -> bool {
    tokens.next_token() == Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DynamicSchema;

    fn file_id() -> FileId {
        FileId::try_from(1).unwrap()
    }

    fn scan_with(scanner: &Scanner<'_>, source: &str) -> (Vec<CompoundType>, Vec<ScanMessage>) {
        let mut messages = Vec::new();
        let types = scanner.scan(file_id(), source, &mut |message| messages.push(message));
        (types, messages)
    }

    fn scan(source: &str) -> (Vec<CompoundType>, Vec<ScanMessage>) {
        scan_with(&Scanner::new(&SchemaRegistry::builtin()), source)
    }

    fn primitive(name: &str, primitive: Primitive) -> Field {
        Field::new(name, FieldType::Primitive(primitive))
    }

    #[test]
    fn person() {
        let registry = SchemaRegistry::builtin();
        let (types, messages) = scan_with(
            &Scanner::new(&registry),
            "typedef struct { const char* name; int age; } Person derive_json();",
        );
        let json = registry.find_derive_attr("derive_json").unwrap();

        assert!(messages.is_empty());
        assert_eq!(
            types,
            vec![CompoundType::new(
                "Person",
                vec![
                    primitive("name", Primitive::String),
                    primitive("age", Primitive::Int),
                ],
            )
            .with_schemas(SchemaSet::single(json))],
        );
    }

    #[test]
    fn field_shapes() {
        let (types, _) = scan(
            "typedef struct {
                char* a;
                unsigned int b;
                unsigned long c;
                size_t d;
                double e;
                float f;
                char g;
                bool h;
                long i;
                Person boss;
            } Everything;",
        );

        assert_eq!(
            types[0].fields,
            vec![
                primitive("a", Primitive::String),
                primitive("b", Primitive::UInt),
                primitive("c", Primitive::ULong),
                primitive("d", Primitive::ULong),
                primitive("e", Primitive::Float),
                primitive("f", Primitive::Float),
                primitive("g", Primitive::Char),
                primitive("h", Primitive::Bool),
                primitive("i", Primitive::Long),
                Field::new("boss", FieldType::External("Person".to_owned())),
            ],
        );
        assert!(types[0].derived_schemas.is_empty());
    }

    #[test]
    fn tags() {
        let (types, _) = scan(r#"typedef struct { int age; tag("Age") char* name; } P;"#);
        assert_eq!(
            types[0].fields,
            vec![
                primitive("age", Primitive::Int).with_tag("Age"),
                primitive("name", Primitive::String),
            ],
        );
    }

    #[test]
    fn derive_all_sets_every_bit() {
        for count in [0, 1, 7] {
            let schemas = (0..count)
                .map(|i| DynamicSchema::new(format!("s{i}"), format!("derive_s{i}"), ""))
                .collect();
            let registry = SchemaRegistry::with_dynamic(schemas).unwrap();
            let (types, messages) =
                scan_with(&Scanner::new(&registry), "typedef struct {} T derive_all();");

            assert!(messages.is_empty());
            assert_eq!(registry.selected(types[0].derived_schemas).count(), registry.len());
        }
    }

    #[test]
    fn derive_all_option() {
        let registry = SchemaRegistry::builtin();
        let scanner = Scanner::new(&registry).derive_all(true);
        let (types, _) = scan_with(&scanner, "typedef struct { int x; } A; typedef struct {} B;");

        assert_eq!(types.len(), 2);
        assert!(types.iter().all(|ty| ty.derived_schemas == SchemaSet::ALL));
    }

    #[test]
    fn unknown_attribute_warns_once() {
        let (types, messages) =
            scan("typedef struct { int x; } T derive_jsn(); int after;");

        assert_eq!(types.len(), 1);
        assert!(types[0].derived_schemas.is_empty());
        match messages.as_slice() {
            [ScanMessage::UnknownAttribute {
                range,
                attribute,
                type_name,
                suggestion,
            }] => {
                assert_eq!(attribute, "derive_jsn");
                assert_eq!(type_name, "T");
                assert_eq!(suggestion.as_deref(), Some("derive_json"));
                assert_eq!((range.start(), range.end()), (28, 38));
            }
            messages => panic!("unexpected messages: {messages:?}"),
        }
    }

    #[test]
    fn attributes_after_unknown_ones_still_apply() {
        let registry = SchemaRegistry::builtin();
        let (types, messages) = scan_with(
            &Scanner::new(&registry),
            "typedef struct {} T serialize() derive_debug();",
        );
        let debug = registry.find_derive_attr("derive_debug").unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(types[0].derived_schemas, SchemaSet::single(debug));
    }

    #[test]
    fn malformed_declarations_are_dropped() {
        let (types, _) = scan(
            "typedef struct { int x; } ;
             typedef struct { int* p; } Pointer;
             typedef struct { int y; } Good;",
        );
        let names: Vec<_> = types.iter().map(|ty| ty.name.as_str()).collect();
        assert_eq!(names, ["Good"]);
    }

    #[test]
    fn other_code_is_skipped() {
        let (types, _) = scan(
            "#include <stdio.h>
             struct Raw { int x; };
             int main(void) { return 0; }
             typedef int Number;
             typedef struct { Number n; } Wrapper;",
        );
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "Wrapper");
    }

    #[test]
    fn malformed_input_terminates() {
        let sources = [
            "",
            "typedef",
            "typedef struct",
            "typedef struct {",
            "typedef struct { int x;",
            "typedef struct { int x; }",
            "typedef struct { } typedef struct { } X",
            "} } { { ; typedef typedef struct struct",
            "typedef struct { int x; } T derive_json(",
            "typedef struct { a b; c d; e } T;",
            "typedef struct { int x; tag(\"unterminated) } T;",
            "/* typedef struct { int x; } T;",
        ];
        for source in sources {
            let (types, _) = scan(source);
            assert!(types.len() <= 1, "{source}");
        }
    }

    #[test]
    fn incomplete_attributes_are_left_alone() {
        let (types, messages) = scan("typedef struct { } T derive_json(");
        assert_eq!(types.len(), 1);
        assert!(types[0].derived_schemas.is_empty());
        assert!(messages.is_empty());
    }

    #[test]
    fn unclosed_comment_is_reported() {
        let source = "typedef struct { int x; } A derive_json(); /* oops\n\
                      typedef struct { int y; } B derive_json();";
        let (types, messages) = scan(source);
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "A");
        match messages.as_slice() {
            [ScanMessage::UnclosedBlockComment { range }] => {
                assert_eq!(range.start() as usize, source.find("/*").unwrap());
                assert_eq!(range.end(), range.start() + 2);
            }
            messages => panic!("unexpected messages: {messages:?}"),
        }
    }

    #[test]
    fn unclosed_comment_inside_a_declaration() {
        let (types, messages) = scan("typedef struct { int x; /* never closed");
        assert!(types.is_empty());
        assert!(matches!(messages.as_slice(), [ScanMessage::UnclosedBlockComment { .. }]));
    }
}
