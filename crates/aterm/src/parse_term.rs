#![forbid(unsafe_code)]
#![allow(clippy::result_large_err)]

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

use hashcons_utilities::HashconsError;

use crate::ATerm;
use crate::ATermList;
use crate::TermStore;

#[derive(Parser)]
#[grammar = "term_grammar.pest"]
pub struct TermParser;

/// The problems in a term that the grammar itself does not rule out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TermParseError {
    #[error("The integer {0} does not fit in 64 bits")]
    IntegerOutOfRange(String),

    #[error("Invalid escape sequence \\{0} in a quoted name")]
    InvalidEscape(char),
}

impl TermStore {
    /// Parses a term in the text format that terms are displayed in.
    ///
    /// Grammar: `i | [t_1, ..., t_n] | f(t_1, ..., t_n) | f | "f"(t_1, ..., t_n)`
    /// where `i` is a decimal integer and a quoted name may contain the escapes
    /// `\"`, `\\`, `\n`, `\t` and `\r`.
    pub fn parse(&self, text: &str) -> Result<ATerm, HashconsError> {
        let mut result = TermParser::parse(Rule::TermSpec, text)?;
        let term_spec = result.next().ok_or("Could not parse the term")?;
        let term = term_spec.into_inner().next().ok_or("Could not parse the term")?;

        self.parse_term(term)
    }

    fn parse_term(&self, term: Pair<'_, Rule>) -> Result<ATerm, HashconsError> {
        let inner = term.into_inner().next().ok_or("A term should have a single child")?;

        match inner.as_rule() {
            Rule::Int => {
                let text = inner.as_str();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| TermParseError::IntegerOutOfRange(text.to_string()))?;

                Ok(self.int(value))
            }
            Rule::List => {
                let elements = inner
                    .into_inner()
                    .map(|element| self.parse_term(element))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(ATermList::from_terms(self, elements).into())
            }
            Rule::Appl => {
                let mut children = inner.into_inner();
                let name = children.next().ok_or("An application should have a name")?;
                let (name, quoted) = match name.as_rule() {
                    Rule::QuotedName => (unescape(name.into_inner().as_str())?, true),
                    _ => (name.as_str().to_string(), false),
                };

                let arguments = match children.next() {
                    Some(arguments) => arguments
                        .into_inner()
                        .map(|argument| self.parse_term(argument))
                        .collect::<Result<Vec<_>, _>>()?,
                    None => Vec::new(),
                };

                let symbol = self.create_symbol(&name, arguments.len(), quoted);
                Ok(self.application(&symbol, &arguments))
            }
            rule => Err(format!("Unexpected rule {rule:?} in a term").into()),
        }
    }
}

/// Replaces the escape sequences of a quoted name by the characters they stand for.
fn unescape(text: &str) -> Result<String, TermParseError> {
    let mut result = String::with_capacity(text.len());
    let mut characters = text.chars();

    while let Some(character) = characters.next() {
        if character != '\\' {
            result.push(character);
            continue;
        }

        match characters.next() {
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => return Err(TermParseError::InvalidEscape(other)),
            None => return Err(TermParseError::InvalidEscape('\\')),
        }
    }

    Ok(result)
}
