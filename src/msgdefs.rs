//! Message-definition text files: one per command request, command response
//! and event, with nested messages and enums expanded inline.

use crate::ast::{Enum, Field, Message, MessageId, Schema, SchemaError, TypeRef};
use std::path::{Path, PathBuf};
use tracing::debug;

const INDENT: &str = "  ";

#[derive(Debug, thiserror::Error)]
pub enum MsgDefsError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Which side of the service a definition file describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Command,
    Response,
    Event,
}

impl DefinitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DefinitionKind::Command => "commands",
            DefinitionKind::Response => "responses",
            DefinitionKind::Event => "events",
        }
    }
}

/// A rendered definition and the file name it is written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub kind: DefinitionKind,
    /// `Service.version.kind.Name.def`
    pub file_name: String,
    pub body: String,
}

fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

fn push_doc(lines: &mut Vec<String>, doc_lines: &[String], depth: usize) {
    if doc_lines.is_empty() {
        return;
    }
    let pad = indent(depth);
    lines.push(format!("{}/**", pad));
    for line in doc_lines {
        lines.push(format!("{}  * {}", pad, line).trim_end().to_string());
    }
    lines.push(format!("{}  */", pad));
}

fn field_line(field: &Field, depth: usize) -> String {
    let mut line = format!(
        "{}{} {} {} = {}",
        indent(depth),
        field.qualifier.as_str(),
        field.full_type_name(),
        field.name,
        field.key
    );
    if let Some(default) = field.options.get("default") {
        line.push_str(&format!(" [default = {}]", default.raw));
    }
    line.push(';');
    line
}

fn push_enum(lines: &mut Vec<String>, e: &Enum, depth: usize) {
    lines.push(format!("{}{{", indent(depth)));
    for f in &e.fields {
        push_doc(lines, &f.doc_lines(), depth + 1);
        lines.push(format!("{}{} = {};", indent(depth + 1), f.name, f.key));
    }
    lines.push(format!("{}}}", indent(depth)));
}

/// `path` holds the messages being expanded around this one; a field typed as
/// one of them is printed but not expanded again.
fn push_message(
    lines: &mut Vec<String>,
    schema: &Schema,
    msg: &Message,
    include_name: bool,
    depth: usize,
    path: &mut Vec<MessageId>,
) -> Result<(), SchemaError> {
    if include_name {
        lines.push(format!("{}message {}", indent(depth), msg.name));
    }
    lines.push(format!("{}{{", indent(depth)));
    for field in &msg.fields {
        push_doc(lines, &field.doc_lines(), depth + 1);
        lines.push(field_line(field, depth + 1));
        match field.resolve_type(schema)? {
            TypeRef::Message(sub) if !path.contains(&sub.id) => {
                path.push(sub.id);
                push_message(lines, schema, sub, false, depth + 1, path)?;
                path.pop();
            }
            TypeRef::Enum(e) => push_enum(lines, e, depth + 1),
            _ => {}
        }
    }
    lines.push(format!("{}}}", indent(depth)));
    Ok(())
}

/// Render `msg` as definition text.
///
/// Message-typed fields are expanded in place. A message already being
/// expanded further out is not expanded again, so a message that refers to
/// itself shows its own fields once below the top level.
pub fn render_message(schema: &Schema, msg: &Message, include_name: bool) -> Result<String, SchemaError> {
    let mut lines = Vec::new();
    let mut path = Vec::new();
    push_message(&mut lines, schema, msg, include_name, 0, &mut path)?;
    Ok(lines.join("\n") + "\n")
}

/// One definition per command request, command response and event of the
/// schema's service, in declaration order.
///
/// The service version goes into every file name, so it must be a numeric
/// `major[.minor[.patch]]` string.
pub fn definitions(schema: &Schema) -> Result<Vec<Definition>, SchemaError> {
    let Some(service) = &schema.service else {
        return Ok(Vec::new());
    };
    service.version_triple()?;
    let version = service.version();
    let make = |kind: DefinitionKind, name: &str, msg: &Message| -> Result<Definition, SchemaError> {
        Ok(Definition {
            kind,
            file_name: format!("{}.{}.{}.{}.def", service.name, version, kind.as_str(), name),
            body: render_message(schema, msg, true)?,
        })
    };

    let mut out = Vec::new();
    for command in &service.commands {
        out.push(make(DefinitionKind::Command, &command.name, command.request_arg(schema)?)?);
        out.push(make(DefinitionKind::Response, &command.name, command.response_arg(schema)?)?);
    }
    for event in &service.events {
        out.push(make(DefinitionKind::Event, &event.name, event.response_arg(schema)?)?);
    }
    Ok(out)
}

/// Write every definition of `schema` into `dest`, creating it if needed.
/// Returns the written paths.
pub fn write_definitions(schema: &Schema, dest: &Path) -> Result<Vec<PathBuf>, MsgDefsError> {
    let defs = definitions(schema)?;
    std::fs::create_dir_all(dest)?;
    let mut written = Vec::with_capacity(defs.len());
    for def in defs {
        let path = dest.join(&def.file_name);
        std::fs::write(&path, def.body.as_bytes())?;
        debug!(path = %path.display(), "wrote message definition");
        written.push(path);
    }
    Ok(written)
}
