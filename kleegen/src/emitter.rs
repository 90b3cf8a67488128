//! Harness source generation.
//!
//! A harness is a self-contained C translation unit whose `main` declares one
//! variable per parameter, marks it symbolic and calls the function under
//! test. The KLEE specific calls are guarded by `__KLEE__` so the unit also
//! builds as a plain driver.
use std::{collections::BTreeSet, io};

use log::debug;

use crate::{
    config::Config,
    error::{HarnessError, HarnessResult},
    resolver::{ParamKind, ParameterDescriptor},
};

const INDENT: &str = "  ";

/// Integer widths with a `iN` alias in the generated unit.
pub const INTEGER_ALIASES: &[(u32, &str)] = &[
    (8, "int8_t"),
    (16, "int16_t"),
    (32, "int32_t"),
    (64, "int64_t"),
    (128, "__int128"),
];

const HEADER: &[&str] = &[
    "#include <stdint.h>",
    "#include <stdlib.h>",
    "",
    "#ifdef __KLEE__",
    "#include <klee/klee.h>",
    "#endif",
    "",
];

const C_KEYWORDS: &[&str] = &[
    "alignas",
    "alignof",
    "auto",
    "bool",
    "break",
    "case",
    "char",
    "const",
    "constexpr",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extern",
    "false",
    "float",
    "for",
    "goto",
    "if",
    "inline",
    "int",
    "long",
    "nullptr",
    "register",
    "restrict",
    "return",
    "short",
    "signed",
    "sizeof",
    "static",
    "static_assert",
    "struct",
    "switch",
    "thread_local",
    "true",
    "typedef",
    "typeof",
    "union",
    "unsigned",
    "void",
    "volatile",
    "while",
];

/// Names the generated unit defines itself.
const RESERVED: &[&str] = &["main", "argc", "argv", "klee_make_symbolic"];

/// Lines of one generated translation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessSource {
    pub lines: Vec<String>,
}

impl std::fmt::Display for HarnessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn alias_of(width: u32) -> Option<&'static str> {
    INTEGER_ALIASES
        .iter()
        .find(|(bits, _)| *bits == width)
        .map(|(_, alias)| *alias)
}

/// `true` for `i8`, `i16`, ... which the unit `#define`s.
fn alias_of_name(name: &str) -> bool {
    INTEGER_ALIASES
        .iter()
        .any(|(width, _)| name.strip_prefix('i') == Some(width.to_string().as_str()))
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !C_KEYWORDS.contains(&name)
}

pub struct HarnessEmitter<'c> {
    config: &'c Config,
}

impl<'c> HarnessEmitter<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    fn check_function(&self, function: &str) -> HarnessResult<()> {
        let reason = if !is_c_identifier(function) {
            format!("'{}' is not a valid C identifier", function)
        } else if RESERVED.contains(&function) {
            format!("'{}' collides with a name of the harness", function)
        } else if alias_of_name(function) {
            format!("'{}' collides with an integer alias", function)
        } else {
            return Ok(());
        };

        Err(HarnessError::UnsupportedFunctionName {
            function: function.to_string(),
            reason,
        })
    }

    fn check_names(&self, function: &str, params: &[ParameterDescriptor]) -> HarnessResult<()> {
        let mut seen = BTreeSet::new();
        for param in params {
            let reason = if !is_c_identifier(&param.name) {
                Some(format!("'{}' is not a valid C identifier", param.name))
            } else if RESERVED.contains(&param.name.as_str()) || param.name == function {
                Some(format!("'{}' collides with a name of the harness", param.name))
            } else if alias_of_name(&param.name) {
                Some(format!("'{}' collides with an integer alias", param.name))
            } else if !seen.insert(param.name.as_str()) {
                Some(format!("'{}' names more than one parameter", param.name))
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(HarnessError::UnsupportedParameterType {
                    function: function.to_string(),
                    ordinal: param.ordinal,
                    reason,
                });
            }
        }
        Ok(())
    }

    fn declaration(
        &self,
        function: &str,
        param: &ParameterDescriptor,
    ) -> HarnessResult<[String; 2]> {
        let name = &param.name;
        match param.kind {
            ParamKind::Pointer => Ok([
                format!("{INDENT}char {name}[{}];", self.config.buffer_size),
                format!("{INDENT}klee_make_symbolic({name}, sizeof({name}), \"{name}\");"),
            ]),
            ParamKind::Integer(width) => match alias_of(width) {
                Some(_) => Ok([
                    format!("{INDENT}i{width} {name};"),
                    format!("{INDENT}klee_make_symbolic(&{name}, sizeof({name}), \"{name}\");"),
                ]),
                None => Err(HarnessError::UnsupportedParameterType {
                    function: function.to_string(),
                    ordinal: param.ordinal,
                    reason: format!("no integer alias for width {width}"),
                }),
            },
        }
    }

    /// Build the harness for `function`.
    ///
    /// Declarations follow the order of `params`; the call passes the
    /// arguments by ordinal.
    pub fn render(
        &self,
        function: &str,
        params: &[ParameterDescriptor],
    ) -> HarnessResult<HarnessSource> {
        self.check_function(function)?;
        self.check_names(function, params)?;

        let mut lines: Vec<String> = HEADER.iter().map(|line| line.to_string()).collect();
        lines.extend(
            INTEGER_ALIASES
                .iter()
                .map(|(width, alias)| format!("#define i{width} {alias}")),
        );
        lines.push(String::new());
        lines.push("int main(int argc, char** argv) {".to_string());
        lines.push("#ifdef __KLEE__".to_string());

        for param in params {
            lines.extend(self.declaration(function, param)?);
        }

        let mut by_ordinal: Vec<&ParameterDescriptor> = params.iter().collect();
        by_ordinal.sort_by_key(|param| param.ordinal);
        let arguments = by_ordinal
            .iter()
            .map(|param| param.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("{INDENT}{function}({arguments});"));

        lines.push("#endif".to_string());
        lines.push(String::new());
        lines.push(format!("{INDENT}return 0;"));
        lines.push("}".to_string());

        debug!(
            "Rendered harness for '{}' ({} parameter(s), {} line(s))",
            function,
            params.len(),
            lines.len()
        );
        Ok(HarnessSource { lines })
    }

    /// Render the harness for `function` and write it to `out`.
    pub fn emit(
        &self,
        out: &mut impl io::Write,
        function: &str,
        params: &[ParameterDescriptor],
    ) -> HarnessResult<()> {
        let source = self.render(function, params)?;
        write!(out, "{}", source).map_err(|error| HarnessError::Io {
            source_name: "<output>".to_string(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(ordinal: usize, name: &str, kind: ParamKind) -> ParameterDescriptor {
        ParameterDescriptor {
            ordinal,
            name: name.to_string(),
            kind,
        }
    }

    #[test]
    fn test_c_identifiers() {
        assert!(is_c_identifier("buf"));
        assert!(is_c_identifier("_x1"));
        assert!(!is_c_identifier("1x"));
        assert!(!is_c_identifier("a.b"));
        assert!(!is_c_identifier("int"));
        assert!(!is_c_identifier(""));
    }

    #[test]
    fn test_rejects_alias_collision() {
        let config = Config::default();
        let error = HarnessEmitter::new(&config)
            .render("f", &[param(0, "i32", ParamKind::Integer(32))])
            .unwrap_err();
        assert!(error.is_unsupported_parameter_type());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let config = Config::default();
        let error = HarnessEmitter::new(&config)
            .render(
                "f",
                &[
                    param(0, "x", ParamKind::Integer(32)),
                    param(1, "x", ParamKind::Pointer),
                ],
            )
            .unwrap_err();
        assert!(matches!(
            error,
            HarnessError::UnsupportedParameterType { ordinal: 1, .. }
        ));
    }

    #[test]
    fn test_rejects_uncallable_function_names() {
        let config = Config::default();
        let emitter = HarnessEmitter::new(&config);
        for function in ["f.1", "main", "argv", "klee_make_symbolic", "i64", "int"] {
            let error = emitter.render(function, &[]).unwrap_err();
            assert!(
                error.is_unsupported_function_name(),
                "'{function}' should be rejected"
            );
        }
        assert!(emitter.render("i7", &[]).is_ok());
    }

    #[test]
    fn test_rejects_name_of_function() {
        let config = Config::default();
        let error = HarnessEmitter::new(&config)
            .render("f", &[param(0, "f", ParamKind::Pointer)])
            .unwrap_err();
        assert!(error.is_unsupported_parameter_type());
    }
}
