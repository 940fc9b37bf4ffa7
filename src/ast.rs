//! Object model for parsed schema files.
//!
//! The [`Schema`] is the Global scope. It owns every message and enum declared
//! in the file (nested ones included) in arena vectors; nodes point back at the
//! scope they resolve names in through a copyable [`Scope`] handle instead of a
//! parent pointer. Type names on fields, commands and events are kept verbatim
//! and resolved on access, so a dangling name only fails when it is looked at.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Errors raised while reading a parsed schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Type not found: {0}")]
    TypeNotFound(String),
    #[error("Malformed version: {0:?}")]
    MalformedVersion(String),
}

/// Index of a message inside its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub(crate) usize);

/// Index of an enum inside its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub(crate) usize);

/// A name-resolution boundary: the file itself or a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Message(MessageId),
}

/// Which declarations a lookup may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Fields may refer to messages and enums.
    MessagesAndEnums,
    /// Command and event arguments are always messages.
    MessagesOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveClass {
    Number,
    Buffer,
    Boolean,
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int32,
    UInt32,
    Int64,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Double,
    Float,
    Bool,
    String,
    Bytes,
}

impl Primitive {
    pub const ALL: [Primitive; 15] = [
        Primitive::Int32,
        Primitive::UInt32,
        Primitive::Int64,
        Primitive::UInt64,
        Primitive::SInt32,
        Primitive::SInt64,
        Primitive::Fixed32,
        Primitive::Fixed64,
        Primitive::SFixed32,
        Primitive::SFixed64,
        Primitive::Double,
        Primitive::Float,
        Primitive::Bool,
        Primitive::String,
        Primitive::Bytes,
    ];

    pub fn from_name(name: &str) -> Option<Primitive> {
        Primitive::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int32 => "int32",
            Primitive::UInt32 => "uint32",
            Primitive::Int64 => "int64",
            Primitive::UInt64 => "uint64",
            Primitive::SInt32 => "sint32",
            Primitive::SInt64 => "sint64",
            Primitive::Fixed32 => "fixed32",
            Primitive::Fixed64 => "fixed64",
            Primitive::SFixed32 => "sfixed32",
            Primitive::SFixed64 => "sfixed64",
            Primitive::Double => "double",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
        }
    }

    pub fn class(self) -> PrimitiveClass {
        match self {
            Primitive::Bool => PrimitiveClass::Boolean,
            Primitive::String | Primitive::Bytes => PrimitiveClass::Buffer,
            _ => PrimitiveClass::Number,
        }
    }
}

/// A resolved type reference, borrowed from the schema it was resolved in.
#[derive(Debug, Clone, Copy)]
pub enum TypeRef<'s> {
    Primitive(Primitive),
    Message(&'s Message),
    Enum(&'s Enum),
}

impl<'s> TypeRef<'s> {
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive(_))
    }

    pub fn is_message(&self) -> bool {
        matches!(self, TypeRef::Message(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, TypeRef::Enum(_))
    }

    pub fn name(&self) -> &'s str {
        match *self {
            TypeRef::Primitive(p) => p.name(),
            TypeRef::Message(m) => &m.name,
            TypeRef::Enum(e) => &e.name,
        }
    }
}

/// Value of an `option (name) = value` or `name = value` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionValue {
    /// Identifier or string literal as written (string quotes kept).
    pub raw: String,
    pub doc: Option<String>,
}

impl OptionValue {
    pub fn new(raw: impl Into<String>, doc: Option<String>) -> Self {
        OptionValue { raw: raw.into(), doc }
    }

    /// The value with surrounding string quotes removed.
    pub fn value(&self) -> &str {
        let s = self.raw.as_str();
        if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            &s[1..s.len() - 1]
        } else {
            s
        }
    }
}

/// Open option bag. A later entry with the same name replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    entries: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: OptionValue) {
        self.entries.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Required,
    Repeated,
    Optional,
}

impl Qualifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Qualifier::Required => "required",
            Qualifier::Repeated => "repeated",
            Qualifier::Optional => "optional",
        }
    }
}

impl FromStr for Qualifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "required" => Ok(Qualifier::Required),
            "repeated" => Ok(Qualifier::Repeated),
            "optional" => Ok(Qualifier::Optional),
            other => Err(format!("Unknown qualifier: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub qualifier: Qualifier,
    /// Declared type name, primitive or (possibly dotted) message/enum name.
    pub type_name: String,
    pub name: String,
    pub key: u32,
    pub options: Options,
    pub doc: Option<String>,
    /// Trailing `//` comment on the declaration line.
    pub comment: Option<String>,
    pub(crate) scope: Scope,
}

impl Field {
    /// The scope the type name is resolved from (the enclosing message).
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn full_type_name(&self) -> &str {
        &self.type_name
    }

    /// Resolve the declared type name against `schema`.
    pub fn resolve_type<'s>(&self, schema: &'s Schema) -> Result<TypeRef<'s>, SchemaError> {
        if let Some(p) = Primitive::from_name(&self.type_name) {
            return Ok(TypeRef::Primitive(p));
        }
        schema.resolve(self.scope, &self.type_name, Lookup::MessagesAndEnums)
    }

    pub fn default_value(&self) -> Option<&str> {
        self.options.get("default").map(OptionValue::value)
    }

    pub fn doc_lines(&self) -> Vec<String> {
        self.doc.as_deref().map(doc_lines).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub name: String,
    pub doc: Option<String>,
    pub fields: Vec<Field>,
    /// Nested messages, in declaration order.
    pub messages: Vec<MessageId>,
    /// Nested enums, in declaration order.
    pub enums: Vec<EnumId>,
    pub parent: Scope,
}

impl Message {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn doc_lines(&self) -> Vec<String> {
        self.doc.as_deref().map(doc_lines).unwrap_or_default()
    }

    /// Every message reachable through this message's fields, depth first,
    /// each listed once. A message that refers back to itself (directly or
    /// through others) appears in its own list.
    pub fn sub_messages<'s>(&self, schema: &'s Schema) -> Result<Vec<&'s Message>, SchemaError> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        collect_sub_messages(self, schema, &mut out, &mut visited)?;
        Ok(out)
    }
}

fn collect_sub_messages<'s>(
    message: &Message,
    schema: &'s Schema,
    out: &mut Vec<&'s Message>,
    visited: &mut HashSet<MessageId>,
) -> Result<(), SchemaError> {
    for field in &message.fields {
        if let TypeRef::Message(sub) = field.resolve_type(schema)? {
            if visited.insert(sub.id) {
                out.push(sub);
                collect_sub_messages(sub, schema, out, visited)?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumField {
    pub name: String,
    pub key: u32,
    pub doc: Option<String>,
}

impl EnumField {
    pub fn doc_lines(&self) -> Vec<String> {
        self.doc.as_deref().map(doc_lines).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub id: EnumId,
    pub name: String,
    pub doc: Option<String>,
    pub fields: Vec<EnumField>,
    pub parent: Scope,
}

impl Enum {
    pub fn field(&self, name: &str) -> Option<&EnumField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn doc_lines(&self) -> Vec<String> {
        self.doc.as_deref().map(doc_lines).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub request: String,
    pub response: String,
    pub key: u32,
    pub options: Options,
    pub doc: Option<String>,
    /// Scope enclosing the service; arguments resolve from here.
    pub(crate) scope: Scope,
}

impl Command {
    pub fn request_arg<'s>(&self, schema: &'s Schema) -> Result<&'s Message, SchemaError> {
        schema.resolve_message(self.scope, &self.request)
    }

    pub fn response_arg<'s>(&self, schema: &'s Schema) -> Result<&'s Message, SchemaError> {
        schema.resolve_message(self.scope, &self.response)
    }

    pub fn doc_lines(&self) -> Vec<String> {
        self.doc.as_deref().map(doc_lines).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub response: String,
    pub key: u32,
    pub doc: Option<String>,
    pub(crate) scope: Scope,
}

impl Event {
    pub fn response_arg<'s>(&self, schema: &'s Schema) -> Result<&'s Message, SchemaError> {
        schema.resolve_message(self.scope, &self.response)
    }

    pub fn doc_lines(&self) -> Vec<String> {
        self.doc.as_deref().map(doc_lines).unwrap_or_default()
    }
}

/// A command or event found by name on a [`Service`].
#[derive(Debug, Clone, Copy)]
pub enum ServiceMember<'a> {
    Command(&'a Command),
    Event(&'a Event),
}

/// Service version split into numeric components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FromStr for Version {
    type Err = SchemaError;

    /// `"1.2.3"`, `"1.2"` or `"1"`; missing trailing components are 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SchemaError::MalformedVersion(s.to_string());
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 3 {
            return Err(malformed());
        }
        let mut nums = [0u32; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part.trim().parse().map_err(|_| malformed())?;
        }
        Ok(Version {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub doc: Option<String>,
    pub commands: Vec<Command>,
    pub events: Vec<Event>,
    pub options: Options,
    pub parent: Scope,
}

impl Service {
    pub(crate) fn new(name: String, doc: Option<String>, parent: Scope) -> Self {
        Service {
            name,
            doc,
            commands: Vec::new(),
            events: Vec::new(),
            options: Options::default(),
            parent,
        }
    }

    /// Append a command; returns its index.
    pub(crate) fn push_command(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    pub(crate) fn push_event(&mut self, event: Event) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    /// The first command named `name`.
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// The first event named `name`.
    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Look a name up among commands first, then events.
    pub fn member(&self, name: &str) -> Option<ServiceMember<'_>> {
        self.command(name)
            .map(ServiceMember::Command)
            .or_else(|| self.event(name).map(ServiceMember::Event))
    }

    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// The `version` option without quotes, or `""` when absent.
    pub fn version(&self) -> &str {
        self.options.get("version").map(OptionValue::value).unwrap_or("")
    }

    pub fn version_triple(&self) -> Result<Version, SchemaError> {
        self.version().parse()
    }

    pub fn major_version(&self) -> Result<u32, SchemaError> {
        self.version_triple().map(|v| v.major)
    }

    pub fn minor_version(&self) -> Result<u32, SchemaError> {
        self.version_triple().map(|v| v.minor)
    }

    pub fn patch_version(&self) -> Result<u32, SchemaError> {
        self.version_triple().map(|v| v.patch)
    }

    pub fn doc_lines(&self) -> Vec<String> {
        self.doc.as_deref().map(doc_lines).unwrap_or_default()
    }
}

/// Name of the implicit empty message every schema starts with.
pub const DEFAULT_MESSAGE: &str = "Default";

/// Global scope of one parsed schema file.
#[derive(Debug, Clone)]
pub struct Schema {
    pub syntax: Option<String>,
    pub service: Option<Service>,
    pub options: Options,
    messages: Vec<MessageId>,
    enums: Vec<EnumId>,
    message_arena: Vec<Message>,
    enum_arena: Vec<Enum>,
}

impl Schema {
    pub(crate) fn new() -> Self {
        let mut schema = Schema {
            syntax: None,
            service: None,
            options: Options::default(),
            messages: Vec::new(),
            enums: Vec::new(),
            message_arena: Vec::new(),
            enum_arena: Vec::new(),
        };
        schema.add_message(Scope::Global, DEFAULT_MESSAGE.to_string(), None);
        schema
    }

    pub(crate) fn add_message(&mut self, scope: Scope, name: String, doc: Option<String>) -> MessageId {
        let id = MessageId(self.message_arena.len());
        self.message_arena.push(Message {
            id,
            name,
            doc,
            fields: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            parent: scope,
        });
        match scope {
            Scope::Global => self.messages.push(id),
            Scope::Message(parent) => self.message_arena[parent.0].messages.push(id),
        }
        id
    }

    pub(crate) fn add_enum(&mut self, scope: Scope, name: String, doc: Option<String>) -> EnumId {
        let id = EnumId(self.enum_arena.len());
        self.enum_arena.push(Enum {
            id,
            name,
            doc,
            fields: Vec::new(),
            parent: scope,
        });
        match scope {
            Scope::Global => self.enums.push(id),
            Scope::Message(parent) => self.message_arena[parent.0].enums.push(id),
        }
        id
    }

    pub(crate) fn message_mut(&mut self, id: MessageId) -> &mut Message {
        &mut self.message_arena[id.0]
    }

    pub(crate) fn enum_mut(&mut self, id: EnumId) -> &mut Enum {
        &mut self.enum_arena[id.0]
    }

    /// `None` for an id handed out by another schema.
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.message_arena.get(id.0)
    }

    pub fn enumeration(&self, id: EnumId) -> Option<&Enum> {
        self.enum_arena.get(id.0)
    }

    /// Top-level messages in declaration order, starting with `Default`.
    pub fn messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter_map(move |&id| self.message(id))
    }

    /// Top-level enums in declaration order.
    pub fn enums(&self) -> impl Iterator<Item = &Enum> + '_ {
        self.enums.iter().filter_map(move |&id| self.enumeration(id))
    }

    /// Every message in the file, nested ones included, in the order their
    /// declarations were opened.
    pub fn all_messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.message_arena.iter()
    }

    pub fn all_enums(&self) -> impl Iterator<Item = &Enum> + '_ {
        self.enum_arena.iter()
    }

    pub fn message_by_name(&self, name: &str) -> Option<&Message> {
        self.messages().find(|m| m.name == name)
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&Enum> {
        self.enums().find(|e| e.name == name)
    }

    fn scope_messages(&self, scope: Scope) -> &[MessageId] {
        match scope {
            Scope::Global => &self.messages,
            Scope::Message(id) => self.message(id).map_or(&[][..], |m| m.messages.as_slice()),
        }
    }

    fn scope_enums(&self, scope: Scope) -> &[EnumId] {
        match scope {
            Scope::Global => &self.enums,
            Scope::Message(id) => self.message(id).map_or(&[][..], |m| m.enums.as_slice()),
        }
    }

    fn parent_of(&self, scope: Scope) -> Option<Scope> {
        match scope {
            Scope::Global => None,
            Scope::Message(id) => self.message(id).map(|m| m.parent),
        }
    }

    /// Declarations named `name` directly inside `scope`; messages win over enums.
    fn find_in(&self, scope: Scope, name: &str, lookup: Lookup) -> Option<TypeRef<'_>> {
        let mut scope_messages = self.scope_messages(scope).iter().filter_map(|&id| self.message(id));
        if let Some(message) = scope_messages.find(|m| m.name == name) {
            return Some(TypeRef::Message(message));
        }
        if lookup == Lookup::MessagesAndEnums {
            let mut scope_enums = self.scope_enums(scope).iter().filter_map(|&id| self.enumeration(id));
            if let Some(e) = scope_enums.find(|e| e.name == name) {
                return Some(TypeRef::Enum(e));
            }
        }
        None
    }

    /// Resolve a (possibly dotted) type name starting at `scope`.
    ///
    /// The first segment is searched from `scope` outwards to the Global scope,
    /// so inner declarations shadow outer ones. Each further segment is looked
    /// up among the nested declarations of the message found so far.
    pub fn resolve(&self, scope: Scope, name: &str, lookup: Lookup) -> Result<TypeRef<'_>, SchemaError> {
        let not_found = || SchemaError::TypeNotFound(name.to_string());
        let mut segments = name.split('.');
        let first = segments.next().ok_or_else(not_found)?;

        let mut current = None;
        let mut cursor = Some(scope);
        while let Some(s) = cursor {
            if let Some(found) = self.find_in(s, first, lookup) {
                current = Some(found);
                break;
            }
            cursor = self.parent_of(s);
        }
        let mut current = current.ok_or_else(not_found)?;

        for segment in segments {
            let TypeRef::Message(container) = current else {
                return Err(not_found());
            };
            current = self
                .find_in(Scope::Message(container.id), segment, lookup)
                .ok_or_else(not_found)?;
        }
        Ok(current)
    }

    fn resolve_message(&self, scope: Scope, name: &str) -> Result<&Message, SchemaError> {
        match self.resolve(scope, name, Lookup::MessagesOnly)? {
            TypeRef::Message(m) => Ok(m),
            _ => Err(SchemaError::TypeNotFound(name.to_string())),
        }
    }

    /// Resolve every type reference in the file and the service version,
    /// collecting each failure.
    pub fn reference_errors(&self) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        for message in self.all_messages() {
            for field in &message.fields {
                if let Err(e) = field.resolve_type(self) {
                    errors.push(e);
                }
            }
        }
        if let Some(service) = &self.service {
            for command in &service.commands {
                errors.extend(command.request_arg(self).err());
                errors.extend(command.response_arg(self).err());
            }
            for event in &service.events {
                errors.extend(event.response_arg(self).err());
            }
            if service.options.get("version").is_some() {
                errors.extend(service.version_triple().err());
            }
        }
        errors
    }
}

/// Split a stored documentation block into text lines.
///
/// Handles `/** ... */` blocks (comment delimiters and the leading `*` of each
/// line are removed) and `//` line comments. Blank lines at either end are
/// dropped; blank lines in between are kept as paragraph breaks.
pub fn doc_lines(doc: &str) -> Vec<String> {
    let doc = doc.trim();
    let body = if let Some(rest) = doc.strip_prefix("//") {
        rest
    } else if let Some(rest) = doc.strip_prefix("/*") {
        let rest = rest.strip_suffix("*/").unwrap_or(rest);
        rest.trim_start_matches('*').trim_end_matches('*')
    } else {
        doc
    };

    let mut lines: Vec<String> = body
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line).trim_end().to_string()
        })
        .collect();

    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|l| l.is_empty()).count();
    lines.drain(..leading);
    lines
}
