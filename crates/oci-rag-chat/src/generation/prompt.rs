//! Prompt templates for grounded and plain chat turns

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Template used when retrieved passages ground the answer
pub const GROUNDED_TEMPLATE: &str = "\
Answer the question using the context information retrieved by search wherever possible.

## Context
{context}

## Question
{query}
";

/// Template used when vector search is disabled
pub const PLAIN_TEMPLATE: &str = "\
Answer the following question.

## Question
{query}
";

/// Japanese grounded template, for the multilingual embedding setup
pub const GROUNDED_TEMPLATE_JA: &str = "\
可能な限り、検索によって得られたコンテキスト情報を使って質問に回答してください。

## コンテキスト
{context}

## 質問
{query}
";

/// Japanese plain template
pub const PLAIN_TEMPLATE_JA: &str = "\
以下の質問に回答してください。

## 質問
{query}
";

/// Language of the bundled prompt templates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptLanguage {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ja")]
    Japanese,
}

impl PromptLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            PromptLanguage::English => "en",
            PromptLanguage::Japanese => "ja",
        }
    }
}

impl fmt::Display for PromptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PromptLanguage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "en" => Ok(PromptLanguage::English),
            "ja" => Ok(PromptLanguage::Japanese),
            other => Err(Error::Config(format!(
                "Unknown prompt language '{}', expected en or ja",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Var(String),
}

/// A parsed `{name}` template
///
/// `{{` and `}}` render as literal braces. Substituted values are inserted
/// verbatim and never re-scanned for placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template that must reference exactly the `expected` variables
    pub fn new(template: &str, expected: &[&str]) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(Error::Template("Template is empty".to_string()));
        }

        let segments = parse(template)?;
        let template = Self { segments };

        for name in expected {
            if !template.variables().any(|v| v == *name) {
                return Err(Error::Template(format!(
                    "Template is missing placeholder {{{}}}",
                    name
                )));
            }
        }
        if let Some(unknown) = template.variables().find(|v| !expected.contains(v)) {
            return Err(Error::Template(format!(
                "Template has unknown placeholder {{{}}}",
                unknown
            )));
        }

        Ok(template)
    }

    /// Placeholder names in order of appearance
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(name) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == name.as_str())
                        .map(|(_, v)| *v)
                        .ok_or_else(|| {
                            Error::Template(format!("No value for placeholder {{{}}}", name))
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn parse(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
                        Some(c) => {
                            return Err(Error::Template(format!(
                                "Invalid character {:?} in placeholder",
                                c
                            )))
                        }
                        None => {
                            return Err(Error::Template("Unclosed placeholder".to_string()))
                        }
                    }
                }
                if name.is_empty() {
                    return Err(Error::Template("Empty placeholder {}".to_string()));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Var(name));
            }
            '}' => return Err(Error::Template("Unmatched '}'".to_string())),
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// The grounded and plain templates used by the orchestrator
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    grounded: PromptTemplate,
    plain: PromptTemplate,
}

impl PromptBuilder {
    /// Build from custom template text
    pub fn new(grounded: &str, plain: &str) -> Result<Self> {
        Ok(Self {
            grounded: PromptTemplate::new(grounded, &["context", "query"])?,
            plain: PromptTemplate::new(plain, &["query"])?,
        })
    }

    /// Build from the bundled templates
    pub fn standard() -> Result<Self> {
        Self::for_language(PromptLanguage::English)
    }

    /// Bundled templates in the given language
    pub fn for_language(language: PromptLanguage) -> Result<Self> {
        match language {
            PromptLanguage::English => Self::new(GROUNDED_TEMPLATE, PLAIN_TEMPLATE),
            PromptLanguage::Japanese => Self::new(GROUNDED_TEMPLATE_JA, PLAIN_TEMPLATE_JA),
        }
    }

    /// Prompt carrying retrieved context
    pub fn grounded(&self, query: &str, context: &str) -> Result<String> {
        self.grounded.render(&[("context", context), ("query", query)])
    }

    /// Prompt carrying the question only
    pub fn plain(&self, query: &str) -> Result<String> {
        self.plain.render(&[("query", query)])
    }
}
