//! # scopeidl: scope service interface definitions
//!
//! Parser and object model for the small interface definition language used
//! to describe a scope service: messages, enums, one service, and the
//! service's commands and events, each with a numeric wire key.
//!
//! ## Schema structure
//!
//! - **syntax**: optional `syntax = scope;` line
//! - **Messages**: `message Name { ... }` with fields, nested messages and enums
//! - **Enums**: `enum Name { VALUE = key; ... }`
//! - **Service**: at most one `service Name { ... }` holding options,
//!   `command` and `event` declarations
//! - `/** ... */` blocks and `//` comments document the next declaration
//!
//! ## Example schema
//!
//! ```text
//! syntax = scope;
//!
//! message RuntimeSelection {
//!   repeated uint32 runtimeList = 1;
//! }
//!
//! message RuntimeInfo {
//!   required uint32 runtimeID = 1;
//!   optional string htmlFramePath = 2;
//! }
//!
//! service EcmascriptDebugger {
//!   option (version) = "6.0";
//!   /** List the runtimes. */
//!   command ListRuntimes(RuntimeSelection) returns (RuntimeInfo) = 1;
//!   event OnRuntimeStarted returns (RuntimeInfo) = 14;
//! }
//! ```
//!
//! Type names are resolved lazily: [`Field::resolve_type`],
//! [`Command::request_arg`] and friends look the name up through the enclosing
//! scopes when called, so an unknown type only fails when it is used.

pub mod ast;
pub mod msgdefs;
pub mod parser;
mod rules;

pub use ast::{
    doc_lines, Command, Enum, EnumField, EnumId, Event, Field, Lookup, Message, MessageId, OptionValue, Options,
    Primitive, PrimitiveClass, Qualifier, Schema, SchemaError, Scope, Service, ServiceMember, TypeRef, Version,
    DEFAULT_MESSAGE,
};
pub use msgdefs::{Definition, DefinitionKind, MsgDefsError};
pub use parser::{parse, ParseError};
