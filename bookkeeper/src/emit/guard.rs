//! Preprocessor guards around generated code.
//!
//! By default code is compiled unless one of the guard's disable macros is
//! defined, giving one nested `#ifndef` per scope. With
//! [`FormatConfig::disabled_by_default`] the same scopes become a single
//! `#if defined(...) || ...` over the enable macros.

use itertools::Itertools;

use crate::config::FormatConfig;
use crate::emit::Operation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    scopes: Vec<String>,
    /// Scopes that also enable the guarded code when guards are disabled by
    /// default. Ignored otherwise.
    alternatives: Vec<String>,
}

impl Guard {
    fn new(scopes: impl IntoIterator<Item = String>) -> Guard {
        Guard {
            scopes: scopes.into_iter().collect(),
            alternatives: Vec::new(),
        }
    }

    /// An operation, then a type, then the operation for that type.
    pub fn phase(ty: &str, operation: Operation) -> Guard {
        let op = operation.upper();
        Guard::new([op.to_owned(), ty.to_owned(), format!("{ty}_{op}")])
    }

    /// The narrow guard around one schema's output for one type.
    pub fn schema(ty: &str, schema: &str, operation: Operation) -> Guard {
        let op = operation.upper();
        Guard::new([
            schema.to_owned(),
            format!("{schema}_{op}"),
            format!("{ty}_{schema}"),
            format!("{ty}_{schema}_{op}"),
        ])
    }

    pub fn operation(ty: &str, operation: Operation) -> Guard {
        let op = operation.upper();
        Guard::new([op.to_owned(), format!("{ty}_{op}")])
    }

    pub fn compound_type(ty: &str) -> Guard {
        Guard::new([ty.to_owned()])
    }

    pub fn dynamic_schema(ty: &str, schema: &str) -> Guard {
        Guard::new([schema.to_owned(), format!("{ty}_{schema}")])
    }

    /// Around a schema's `_Generic` dispatch macro in `generics.h`.
    pub fn generic(schema: &str, operation: Operation) -> Guard {
        let op = operation.upper();
        Guard::new([op.to_owned(), schema.to_owned(), format!("{schema}_{op}")])
    }

    /// Also admit the code when any of `other`'s enable macros is defined.
    pub fn or(mut self, other: &Guard) -> Guard {
        self.alternatives.extend(other.scopes.iter().cloned());
        self.alternatives.extend(other.alternatives.iter().cloned());
        self
    }

    pub fn open(&self, config: &FormatConfig, out: &mut String) {
        if config.disabled_by_default {
            out.push_str(&format!("#if {}\n", self.condition(config)));
        } else {
            for scope in &self.scopes {
                out.push_str(&format!("#ifndef {}{scope}\n", config.disable_prefix));
            }
        }
    }

    pub fn close(&self, config: &FormatConfig, out: &mut String) {
        if config.disabled_by_default {
            out.push_str(&format!("#endif // {}\n", self.condition(config)));
        } else {
            for scope in self.scopes.iter().rev() {
                out.push_str(&format!("#endif // {}{scope}\n", config.disable_prefix));
            }
        }
    }

    fn condition(&self, config: &FormatConfig) -> String {
        (self.scopes.iter().chain(&self.alternatives))
            .unique()
            .map(|scope| format!("defined({}{scope})", config.enable_prefix))
            .join(" || ")
    }
}

/// `#ifdef` around implementations.
pub fn open_implementation(config: &FormatConfig, out: &mut String) {
    out.push_str(&format!("#ifdef {}\n", config.implementation_macro));
}

pub fn close_implementation(config: &FormatConfig, out: &mut String) {
    out.push_str(&format!("#endif // {}\n", config.implementation_macro));
}

/// Check that every `#if*` in `text` is closed by an `#endif` in stack
/// order, returning the greatest nesting depth.
pub fn nesting_depth(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut max_depth = 0;
    for line in text.lines().map(str::trim_start) {
        if line.starts_with("#if") {
            depth += 1;
            max_depth = max_depth.max(depth);
        } else if line.starts_with("#endif") {
            depth = depth.checked_sub(1)?;
        }
    }
    (depth == 0).then_some(max_depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_mode_nests_in_order() {
        let config = FormatConfig::default();
        let guard = Guard::phase("Person", Operation::Dump);
        let mut out = String::new();
        guard.open(&config, &mut out);
        guard.close(&config, &mut out);

        assert_eq!(
            out,
            "#ifndef BK_DISABLE_DUMP\n\
             #ifndef BK_DISABLE_Person\n\
             #ifndef BK_DISABLE_Person_DUMP\n\
             #endif // BK_DISABLE_Person_DUMP\n\
             #endif // BK_DISABLE_Person\n\
             #endif // BK_DISABLE_DUMP\n",
        );
        assert_eq!(nesting_depth(&out), Some(3));
    }

    #[test]
    fn enable_mode_is_one_condition() {
        let config = FormatConfig {
            disabled_by_default: true,
            ..FormatConfig::default()
        };
        let guard = Guard::phase("P", Operation::Parse).or(&Guard::schema("P", "json", Operation::Parse));
        let mut out = String::new();
        guard.open(&config, &mut out);

        assert_eq!(
            out,
            "#if defined(BK_ENABLE_PARSE) || defined(BK_ENABLE_P) || defined(BK_ENABLE_P_PARSE) \
             || defined(BK_ENABLE_json) || defined(BK_ENABLE_json_PARSE) \
             || defined(BK_ENABLE_P_json) || defined(BK_ENABLE_P_json_PARSE)\n",
        );

        guard.close(&config, &mut out);
        assert_eq!(nesting_depth(&out), Some(1));
    }

    #[test]
    fn alternatives_are_ignored_in_disable_mode() {
        let config = FormatConfig::default();
        let plain = Guard::operation("T", Operation::Dump);
        let widened = plain.clone().or(&Guard::compound_type("T"));

        let (mut a, mut b) = (String::new(), String::new());
        plain.open(&config, &mut a);
        widened.open(&config, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn nesting_depth_rejects_unbalanced() {
        assert_eq!(nesting_depth("#endif\n#ifndef A\n"), None);
        assert_eq!(nesting_depth("#ifdef A\n"), None);
        assert_eq!(nesting_depth("int x;\n"), Some(0));
    }
}
