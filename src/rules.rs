//! Grammar rule set: one rule per construct, grouped into per-state tables.
//!
//! A rule is a pest rule matched on its own at the cursor plus a handler that
//! updates the [`Schema`] and tells the driver what to do with the scope stack.
//! Tables are tried in a fixed order and the first match wins; the order is
//! what disambiguates overlapping constructs, so it must not be changed.

use crate::ast::*;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use tracing::{trace, warn};

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct IdlGrammar;

/// One syntactic construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleKind {
    SyntaxDecl,
    MessageDecl,
    EnumDecl,
    ServiceDecl,
    FieldDecl,
    FieldOptionDecl,
    OptionDecl,
    CommandDecl,
    EventDecl,
    EnumFieldDecl,
    DocComment,
    LineComment,
    EndOfBlock,
}

impl RuleKind {
    fn grammar_rule(self) -> Rule {
        match self {
            RuleKind::SyntaxDecl => Rule::syntax_decl,
            RuleKind::MessageDecl => Rule::message_decl,
            RuleKind::EnumDecl => Rule::enum_decl,
            RuleKind::ServiceDecl => Rule::service_decl,
            RuleKind::FieldDecl => Rule::field_decl,
            RuleKind::FieldOptionDecl => Rule::field_option_decl,
            RuleKind::OptionDecl => Rule::option_decl,
            RuleKind::CommandDecl => Rule::command_decl,
            RuleKind::EventDecl => Rule::event_decl,
            RuleKind::EnumFieldDecl => Rule::enum_field_decl,
            RuleKind::DocComment => Rule::doc_comment,
            RuleKind::LineComment => Rule::line_comment,
            RuleKind::EndOfBlock => Rule::end_of_block,
        }
    }
}

/// Parser state: selects the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Global,
    Message,
    Service,
    Enum,
    Field,
    Command,
}

impl State {
    pub(crate) fn rules(self) -> &'static [RuleKind] {
        use RuleKind::*;
        match self {
            State::Global => &[SyntaxDecl, MessageDecl, EnumDecl, ServiceDecl, DocComment, LineComment],
            State::Message => &[MessageDecl, EnumDecl, FieldDecl, DocComment, LineComment, EndOfBlock],
            State::Service => &[OptionDecl, CommandDecl, EventDecl, DocComment, LineComment, EndOfBlock],
            State::Enum => &[EnumFieldDecl, DocComment, LineComment, EndOfBlock],
            State::Field => &[FieldOptionDecl, OptionDecl, EndOfBlock],
            State::Command => &[FieldOptionDecl, OptionDecl, EndOfBlock],
        }
    }
}

/// The scope object a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Frame {
    Global,
    Message(MessageId),
    Enum(EnumId),
    Service,
    /// Option list of `fields[index]` of a message.
    Field { message: MessageId, index: usize },
    /// Body of `service.commands[index]`.
    Command(usize),
}

impl Frame {
    pub(crate) fn state(self) -> State {
        match self {
            Frame::Global => State::Global,
            Frame::Message(_) => State::Message,
            Frame::Enum(_) => State::Enum,
            Frame::Service => State::Service,
            Frame::Field { .. } => State::Field,
            Frame::Command(_) => State::Command,
        }
    }

    /// Scope used for type lookups of declarations made in this frame.
    fn scope(self) -> Scope {
        match self {
            Frame::Message(id) => Scope::Message(id),
            _ => Scope::Global,
        }
    }
}

/// What the driver does after a rule has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Stay,
    Push(Frame),
    Pop,
}

/// Documentation waiting for the next declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DocBuffer(Option<String>);

impl DocBuffer {
    fn take(self) -> Option<String> {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RuleError {
    #[error("{0:?} does not apply inside {1:?}")]
    Misplaced(RuleKind, Frame),
    #[error("Malformed {0:?}: {1}")]
    Malformed(RuleKind, String),
}

/// Try the rules of `state` in order against the start of `input`.
pub(crate) fn match_at(state: State, input: &str) -> Option<(RuleKind, Pair<'_, Rule>)> {
    state.rules().iter().find_map(|&kind| {
        IdlGrammar::parse(kind.grammar_rule(), input)
            .ok()
            .and_then(|mut pairs| pairs.next())
            .filter(|pair| !pair.as_str().is_empty())
            .map(|pair| (kind, pair))
    })
}

/// Run the handler of `kind` on a matched `pair` in `frame`.
///
/// Comment rules return the matched text as the new doc buffer. Every other
/// rule consumes the incoming buffer (attaching it to the node it builds, if
/// any) and returns an empty one.
pub(crate) fn apply(
    kind: RuleKind,
    pair: Pair<'_, Rule>,
    frame: Frame,
    schema: &mut Schema,
    docs: DocBuffer,
) -> Result<(Transition, DocBuffer), RuleError> {
    trace!(?kind, ?frame, text = pair.as_str(), "apply rule");
    let doc = docs.take();
    let mut parts = Parts::new(kind, pair);

    let transition = match kind {
        RuleKind::DocComment => {
            return Ok((Transition::Stay, DocBuffer(Some(parts.text(Rule::doc)?))));
        }
        RuleKind::LineComment => {
            return Ok((Transition::Stay, DocBuffer(Some(parts.text(Rule::comment)?))));
        }
        RuleKind::SyntaxDecl => {
            schema.syntax = Some(parts.text(Rule::ident)?);
            Transition::Stay
        }
        RuleKind::MessageDecl => {
            let name = parts.text(Rule::ident)?;
            let scope = container_scope(kind, frame)?;
            Transition::Push(Frame::Message(schema.add_message(scope, name, doc)))
        }
        RuleKind::EnumDecl => {
            let name = parts.text(Rule::ident)?;
            let scope = container_scope(kind, frame)?;
            Transition::Push(Frame::Enum(schema.add_enum(scope, name, doc)))
        }
        RuleKind::ServiceDecl => {
            let name = parts.text(Rule::ident)?;
            if let Some(previous) = &schema.service {
                warn!(previous = %previous.name, replacement = %name, "second service declaration replaces the first");
            }
            schema.service = Some(Service::new(name, doc, frame.scope()));
            Transition::Push(Frame::Service)
        }
        RuleKind::FieldDecl => {
            let Frame::Message(message) = frame else {
                return Err(RuleError::Misplaced(kind, frame));
            };
            let qualifier = parts
                .text(Rule::qualifier)?
                .parse::<Qualifier>()
                .map_err(|e| RuleError::Malformed(kind, e))?;
            let type_name = parts.text(Rule::ident)?;
            let name = parts.text(Rule::ident)?;
            let key = parts.key()?;
            let opens_options = parts.text(Rule::field_end)? == "[";
            let comment = parts.optional_text(Rule::comment);
            let fields = &mut schema.message_mut(message).fields;
            fields.push(Field {
                qualifier,
                type_name,
                name,
                key,
                options: Options::default(),
                doc,
                comment,
                scope: Scope::Message(message),
            });
            if opens_options {
                Transition::Push(Frame::Field { message, index: fields.len() - 1 })
            } else {
                Transition::Stay
            }
        }
        RuleKind::FieldOptionDecl => {
            let option_doc = parts.optional_text(Rule::doc);
            let name = parts.text(Rule::ident)?;
            let raw = parts.value()?;
            let option_doc = option_doc.or_else(|| parts.optional_text(Rule::doc));
            options_of(schema, kind, frame)?.insert(name, OptionValue::new(raw, option_doc));
            Transition::Stay
        }
        RuleKind::OptionDecl => {
            let name = parts.text(Rule::ident)?;
            let raw = parts.value()?;
            options_of(schema, kind, frame)?.insert(name, OptionValue::new(raw, doc));
            Transition::Stay
        }
        RuleKind::CommandDecl => {
            let name = parts.text(Rule::ident)?;
            let request = parts.text(Rule::ident)?;
            let response = parts.text(Rule::ident)?;
            let key = parts.key()?;
            let opens_body = parts.text(Rule::command_end)? == "{";
            let service = service_of(schema, kind, frame)?;
            let scope = service.parent;
            let index = service.push_command(Command {
                name,
                request,
                response,
                key,
                options: Options::default(),
                doc,
                scope,
            });
            if opens_body {
                Transition::Push(Frame::Command(index))
            } else {
                Transition::Stay
            }
        }
        RuleKind::EventDecl => {
            let name = parts.text(Rule::ident)?;
            let response = parts.text(Rule::ident)?;
            let key = parts.key()?;
            let service = service_of(schema, kind, frame)?;
            let scope = service.parent;
            service.push_event(Event {
                name,
                response,
                key,
                doc,
                scope,
            });
            Transition::Stay
        }
        RuleKind::EnumFieldDecl => {
            let Frame::Enum(id) = frame else {
                return Err(RuleError::Misplaced(kind, frame));
            };
            let name = parts.text(Rule::enum_name)?;
            let key = parts.key()?;
            schema.enum_mut(id).fields.push(EnumField { name, key, doc });
            Transition::Stay
        }
        RuleKind::EndOfBlock => Transition::Pop,
    };
    Ok((transition, DocBuffer::default()))
}

/// Scope a nested message or enum declaration attaches to.
fn container_scope(kind: RuleKind, frame: Frame) -> Result<Scope, RuleError> {
    match frame {
        Frame::Global | Frame::Message(_) => Ok(frame.scope()),
        _ => Err(RuleError::Misplaced(kind, frame)),
    }
}

fn service_of(schema: &mut Schema, kind: RuleKind, frame: Frame) -> Result<&mut Service, RuleError> {
    match (frame, schema.service.as_mut()) {
        (Frame::Service, Some(service)) => Ok(service),
        _ => Err(RuleError::Misplaced(kind, frame)),
    }
}

fn options_of(schema: &mut Schema, kind: RuleKind, frame: Frame) -> Result<&mut Options, RuleError> {
    let misplaced = || RuleError::Misplaced(kind, frame);
    match frame {
        Frame::Service => Ok(&mut service_of(schema, kind, frame)?.options),
        Frame::Field { message, index } => schema
            .message_mut(message)
            .fields
            .get_mut(index)
            .map(|f| &mut f.options)
            .ok_or_else(misplaced),
        Frame::Command(index) => schema
            .service
            .as_mut()
            .and_then(|s| s.commands.get_mut(index))
            .map(|c| &mut c.options)
            .ok_or_else(misplaced),
        _ => Err(misplaced()),
    }
}

/// Sequential access to the captured tokens of a matched rule.
struct Parts<'i> {
    kind: RuleKind,
    inner: std::iter::Peekable<pest::iterators::Pairs<'i, Rule>>,
}

impl<'i> Parts<'i> {
    fn new(kind: RuleKind, pair: Pair<'i, Rule>) -> Self {
        Parts {
            kind,
            inner: pair.into_inner().peekable(),
        }
    }

    fn optional_text(&mut self, rule: Rule) -> Option<String> {
        self.inner
            .next_if(|p| p.as_rule() == rule)
            .map(|p| p.as_str().to_string())
    }

    fn text(&mut self, rule: Rule) -> Result<String, RuleError> {
        self.optional_text(rule)
            .ok_or_else(|| RuleError::Malformed(self.kind, format!("expected {:?}", rule)))
    }

    /// Identifier or string literal, as written.
    fn value(&mut self) -> Result<String, RuleError> {
        self.optional_text(Rule::ident)
            .or_else(|| self.optional_text(Rule::string))
            .ok_or_else(|| RuleError::Malformed(self.kind, "expected value".to_string()))
    }

    fn key(&mut self) -> Result<u32, RuleError> {
        let digits = self.text(Rule::number)?;
        digits
            .parse()
            .map_err(|_| RuleError::Malformed(self.kind, format!("key out of range: {}", digits)))
    }
}
