#![forbid(unsafe_code)]

//! The `"key.path(transformerName)"` binding mini-syntax.

use std::str::FromStr;

use kvo_core::KvoError;
use thiserror::Error;

/// Why a binding string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseBindingError {
    #[error("binding string is empty")]
    Empty,

    #[error("binding string `{0}` has no key path")]
    MissingKeyPath(String),

    #[error("unbalanced parenthesis at byte {position} of `{input}`")]
    Unbalanced { input: String, position: usize },
}

impl From<ParseBindingError> for KvoError {
    fn from(err: ParseBindingError) -> Self {
        KvoError::invalid(err.to_string())
    }
}

/// A parsed binding string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub key_path: String,
    /// Name of the transformer to resolve, if one was given.
    pub transformer: Option<String>,
}

impl FromStr for BindingInfo {
    type Err = ParseBindingError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_binding_string(input)
    }
}

/// Split `"key.path(name)"` into its key path and transformer name.
///
/// Surrounding whitespace is ignored. `"path()"` names no transformer.
pub fn parse_binding_string(input: &str) -> Result<BindingInfo, ParseBindingError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseBindingError::Empty);
    }
    let unbalanced = |position: usize| ParseBindingError::Unbalanced {
        input: input.to_owned(),
        position,
    };

    let (key_path, transformer) = match trimmed.find('(') {
        None => {
            if let Some(position) = trimmed.find(')') {
                return Err(unbalanced(position));
            }
            (trimmed, None)
        }
        Some(open) => {
            let Some(inner) = trimmed[open + 1..].strip_suffix(')') else {
                return Err(unbalanced(open));
            };
            if let Some(offset) = inner.find(['(', ')']) {
                return Err(unbalanced(open + 1 + offset));
            }
            let name = inner.trim();
            (trimmed[..open].trim_end(), (!name.is_empty()).then_some(name))
        }
    };

    if key_path.is_empty() {
        return Err(ParseBindingError::MissingKeyPath(input.to_owned()));
    }
    if let Some(position) = key_path.find(')') {
        return Err(unbalanced(position));
    }
    Ok(BindingInfo {
        key_path: key_path.to_owned(),
        transformer: transformer.map(str::to_owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(key_path: &str, transformer: Option<&str>) -> BindingInfo {
        BindingInfo {
            key_path: key_path.to_owned(),
            transformer: transformer.map(str::to_owned),
        }
    }

    #[test]
    fn plain_key_paths() {
        assert_eq!(parse_binding_string("user.email").unwrap(), info("user.email", None));
        assert_eq!(parse_binding_string("  *.title ").unwrap(), info("*.title", None));
    }

    #[test]
    fn transformer_suffix() {
        assert_eq!(
            parse_binding_string("done(not)").unwrap(),
            info("done", Some("not"))
        );
        assert_eq!(
            "items.@count( truncated )".parse::<BindingInfo>().unwrap(),
            info("items.@count", Some("truncated"))
        );
        assert_eq!(parse_binding_string("done()").unwrap(), info("done", None));
    }

    #[test]
    fn malformed_strings() {
        assert_eq!(parse_binding_string(""), Err(ParseBindingError::Empty));
        assert!(matches!(
            parse_binding_string("(not)"),
            Err(ParseBindingError::MissingKeyPath(_))
        ));
        for bad in ["done(not", "done)not(", "done(n(o)t)", "done(not)x", "do)ne"] {
            assert!(
                matches!(parse_binding_string(bad), Err(ParseBindingError::Unbalanced { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn errors_convert_to_invalid_arguments() {
        let err: KvoError = parse_binding_string("").unwrap_err().into();
        assert!(matches!(err, KvoError::InvalidArgument { .. }));
    }
}
