//! Parse schema source into a [`Schema`].
//!
//! A cursor walks the source. At each step the rules of the active state are
//! tried in table order; the first one that matches at the cursor is applied,
//! the cursor moves past the matched text and the scope stack is pushed or
//! popped as the rule asks. Every match consumes at least one character, so
//! the loop ends after at most `source.len()` steps.

use crate::ast::Schema;
use crate::rules::{self, DocBuffer, Frame, Transition};
use tracing::{debug, warn};

/// No rule of the active state matches at the cursor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not parse line {line}: {text}")]
pub struct ParseError {
    /// 1-based line of the first character no rule could consume.
    pub line: usize,
    /// 1-based column of that character.
    pub column: usize,
    /// The offending line, without its line terminator.
    pub text: String,
}

impl ParseError {
    /// Error located at the first non-whitespace character at or after `cursor`.
    fn at(source: &str, cursor: usize) -> Self {
        let rest = &source[cursor..];
        let pos = cursor + (rest.len() - rest.trim_start().len());
        let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[pos..].find('\n').map_or(source.len(), |i| pos + i);
        ParseError {
            line: source[..pos].matches('\n').count() + 1,
            column: source[line_start..pos].chars().count() + 1,
            text: source[line_start..line_end].trim_end_matches('\r').to_string(),
        }
    }
}

/// Parse a complete schema file.
pub fn parse(source: &str) -> Result<Schema, ParseError> {
    let mut schema = Schema::new();
    let mut frame = Frame::Global;
    let mut stack: Vec<Frame> = Vec::new();
    let mut docs = DocBuffer::default();
    let mut cursor = 0;

    while cursor < source.len() {
        let rest = &source[cursor..];
        if rest.trim_start().is_empty() {
            break;
        }
        let Some((kind, pair)) = rules::match_at(frame.state(), rest) else {
            return Err(ParseError::at(source, cursor));
        };
        let consumed = pair.as_str().len();
        let (transition, next_docs) = rules::apply(kind, pair, frame, &mut schema, docs).map_err(|e| {
            debug!(error = %e, cursor, "rule handler rejected match");
            ParseError::at(source, cursor)
        })?;
        docs = next_docs;
        cursor += consumed;

        match transition {
            Transition::Stay => {}
            Transition::Push(child) => {
                debug!(?child, depth = stack.len() + 1, "enter scope");
                stack.push(frame);
                frame = child;
            }
            Transition::Pop => {
                frame = stack.pop().ok_or_else(|| ParseError::at(source, cursor - consumed))?;
                debug!(?frame, depth = stack.len(), "leave scope");
            }
        }
    }

    if !stack.is_empty() {
        warn!(open = stack.len(), innermost = ?frame, "end of input inside an open block");
    }
    debug!(
        messages = schema.all_messages().count(),
        enums = schema.all_enums().count(),
        service = ?schema.service.as_ref().map(|s| &s.name),
        "parsed schema"
    );
    Ok(schema)
}
