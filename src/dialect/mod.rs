//! Backend SQL dialects.
//!
//! A dialect is a flat table of fragment generators keyed by engine name.
//! Generators are plain functions from column expressions to SQL text, so
//! they can be exercised without a live engine.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{EvalError, EvalResult};

mod duckdb;
mod spark;

pub type SizeArrayIntersectFn = fn(&str, &str) -> String;
pub type DatediffFn = fn(&str, &str, u32, DateMetric) -> String;
pub type RegexExtractFn = fn(&str, &str, &str) -> String;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DateMetric {
    Day,
    Month,
    Year,
}

impl DateMetric {
    pub fn parse(raw: &str) -> EvalResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" | "days" => Ok(Self::Day),
            "month" | "months" => Ok(Self::Month),
            "year" | "years" => Ok(Self::Year),
            other => Err(EvalError::configuration(format!(
                "unsupported date metric '{other}' (expected day, month or year)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// Named operations a comparison can request from a dialect.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    SizeArrayIntersect,
    Datediff,
    RegexExtract,
    JaroWinkler,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Self::SizeArrayIntersect,
        Self::Datediff,
        Self::RegexExtract,
        Self::JaroWinkler,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SizeArrayIntersect => "size_array_intersect",
            Self::Datediff => "datediff",
            Self::RegexExtract => "regex_extract",
            Self::JaroWinkler => "jaro_winkler",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability table for one engine. A `None` entry means the engine cannot
/// express that operation.
#[derive(Debug, Clone)]
pub struct DialectDescriptor {
    pub name: String,
    pub size_array_intersect: Option<SizeArrayIntersectFn>,
    pub datediff: Option<DatediffFn>,
    pub regex_extract: Option<RegexExtractFn>,
    pub jaro_winkler_name: Option<String>,
}

/// Per-run overrides applied when a dialect is resolved.
#[derive(Debug, Clone, Default)]
pub struct DialectParams {
    pub jaro_winkler_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DialectRegistry {
    descriptors: BTreeMap<String, DialectDescriptor>,
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DialectRegistry {
    pub fn empty() -> Self {
        Self {
            descriptors: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(duckdb::descriptor());
        registry.register(spark::descriptor());
        registry
    }

    pub fn register(&mut self, descriptor: DialectDescriptor) {
        self.descriptors
            .insert(normalize_engine_name(&descriptor.name), descriptor);
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }

    pub fn resolve(&self, engine_name: &str, params: &DialectParams) -> EvalResult<Dialect> {
        let key = normalize_engine_name(engine_name);
        let Some(descriptor) = self.descriptors.get(&key) else {
            return Err(EvalError::configuration(format!(
                "unknown dialect '{}' (registered: {})",
                engine_name.trim(),
                self.names().join(", ")
            )));
        };

        let mut resolved = descriptor.clone();
        if let Some(name) = params.jaro_winkler_name.as_deref() {
            resolved.jaro_winkler_name = Some(validate_identifier(name)?.to_string());
        }

        Ok(Dialect {
            descriptor: resolved,
        })
    }
}

/// A descriptor resolved for one evaluation run.
#[derive(Debug, Clone)]
pub struct Dialect {
    descriptor: DialectDescriptor,
}

impl Dialect {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::SizeArrayIntersect => self.descriptor.size_array_intersect.is_some(),
            Operation::Datediff => self.descriptor.datediff.is_some(),
            Operation::RegexExtract => self.descriptor.regex_extract.is_some(),
            Operation::JaroWinkler => self.descriptor.jaro_winkler_name.is_some(),
        }
    }

    pub fn size_array_intersect_sql(&self, col_l: &str, col_r: &str) -> EvalResult<String> {
        let render = self
            .descriptor
            .size_array_intersect
            .ok_or_else(|| self.unresolved(Operation::SizeArrayIntersect))?;
        Ok(render(col_l, col_r))
    }

    pub fn datediff_sql(
        &self,
        col_l: &str,
        col_r: &str,
        threshold: u32,
        metric: DateMetric,
    ) -> EvalResult<String> {
        let render = self
            .descriptor
            .datediff
            .ok_or_else(|| self.unresolved(Operation::Datediff))?;
        Ok(render(col_l, col_r, threshold, metric))
    }

    pub fn regex_extract_sql(&self, col_l: &str, col_r: &str, pattern: &str) -> EvalResult<String> {
        if pattern.is_empty() {
            return Err(EvalError::configuration("regex pattern must not be empty"));
        }
        let render = self
            .descriptor
            .regex_extract
            .ok_or_else(|| self.unresolved(Operation::RegexExtract))?;
        Ok(render(col_l, col_r, pattern))
    }

    pub fn jaro_winkler_name(&self) -> EvalResult<&str> {
        self.descriptor
            .jaro_winkler_name
            .as_deref()
            .ok_or_else(|| self.unresolved(Operation::JaroWinkler))
    }

    fn unresolved(&self, operation: Operation) -> EvalError {
        EvalError::configuration(format!(
            "dialect '{}' has no fragment for operation {operation}",
            self.descriptor.name
        ))
    }
}

fn normalize_engine_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("identifier regex should compile")
});

/// Accepts bare SQL identifiers, optionally dotted (`schema.fn`).
pub fn validate_identifier(raw: &str) -> EvalResult<&str> {
    let trimmed = raw.trim();
    if IDENTIFIER_RE.is_match(trimmed) {
        Ok(trimmed)
    } else {
        Err(EvalError::configuration(format!(
            "'{raw}' is not a valid SQL identifier"
        )))
    }
}
