// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! figment reports every deserialization failure of a load at once. Each one
//! becomes a [`ConfigError`]; unknown keys carry the closest valid key and,
//! when the offending file is known, a labelled span pointing into it.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key needs before it is offered as a correction.
const MIN_SIMILARITY: f64 = 0.75;

/// A TOML file that took part in a load, kept for span lookups.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}`{}", in_section(section))]
    #[diagnostic(
        code(chatfleet::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Dotted path of the enclosing table; empty at top level.
        section: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a chatfleet setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}, expected {expected}")]
    #[diagnostic(code(chatfleet::config::invalid_type))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(chatfleet::config::missing_key),
        help("set `{key}` in chatfleet.toml or through CHATFLEET_* variables")
    )]
    MissingKey { key: String },

    #[error("invalid `{field}`: {message}")]
    #[diagnostic(code(chatfleet::config::validation))]
    Validation { field: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(chatfleet::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Split a figment error into one diagnostic per underlying failure.
    pub fn from_figment(err: figment::Error, sources: &[SourceFile]) -> Vec<Self> {
        err.into_iter()
            .map(|error| Self::from_single(&error, sources))
            .collect()
    }

    fn from_single(error: &figment::Error, sources: &[SourceFile]) -> Self {
        use figment::error::Kind;

        let path: Vec<String> = error.path.iter().map(ToString::to_string).collect();
        match &error.kind {
            Kind::UnknownField(key, expected) => {
                let section = path.join(".");
                let located = source_of(error, sources).and_then(|file| {
                    let offset = locate_key(&file.content, path.first().map(String::as_str), key)?;
                    Some((
                        SourceSpan::new(offset.into(), key.len()),
                        NamedSource::new(&file.name, file.content.clone()),
                    ))
                });
                let (span, src) = match located {
                    Some((span, src)) => (Some(span), Some(src)),
                    None => (None, None),
                };
                Self::UnknownKey {
                    key: key.clone(),
                    section,
                    suggestion: closest_key(key, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(key) => Self::MissingKey {
                key: dotted(&path, key),
            },
            Kind::InvalidType(found, expected) => Self::InvalidType {
                key: path.join("."),
                found: found.to_string(),
                expected: expected.clone(),
            },
            _ => Self::Other(error.to_string()),
        }
    }
}

fn in_section(section: &str) -> String {
    if section.is_empty() {
        String::new()
    } else {
        format!(" in [{section}]")
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

fn dotted(path: &[String], key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{key}", path.join("."))
    }
}

fn source_of<'a>(error: &figment::Error, sources: &'a [SourceFile]) -> Option<&'a SourceFile> {
    let figment::Source::File(path) = error.metadata.as_ref()?.source.as_ref()? else {
        return None;
    };
    let name = path.display().to_string();
    sources.iter().find(|file| file.name == name)
}

/// Byte offset of `key` declared inside `[section]` (or at top level when
/// `section` is `None`).
pub fn locate_key(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().map(str::trim);
        } else if current == section {
            if let Some(rest) = trimmed.strip_prefix(key) {
                if rest.trim_start().starts_with('=') {
                    return Some(offset + indent);
                }
            }
        }
        offset += line.len();
    }

    None
}

/// The valid key most similar to `unknown`, if any is similar enough.
pub fn closest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (*key, strsim::jaro_winkler(unknown, key)))
        .filter(|(_, score)| *score > MIN_SIMILARITY)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key.to_string())
}

/// Print every diagnostic to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
    if errors.len() > 1 {
        eprintln!("{} configuration errors", errors.len());
    }
}
