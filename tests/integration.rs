//! Integration tests: parse schemas, resolve types lazily, walk sub-messages,
//! read the service version, and render message definitions.

use scopeidl::msgdefs::{definitions, write_definitions, DefinitionKind, MsgDefsError};
use scopeidl::{parse, Primitive, SchemaError, ServiceMember, TypeRef, Version, DEFAULT_MESSAGE};

const DRAGONFLY: &str = r#"
syntax = "dragonfly";
message A { required int32 x = 1; }
service S { option (version) = "1.2.0"; command Do(A) returns (A) = 1; }
"#;

const DEBUGGER: &str = r#"
syntax = scope;

/**
 * Selects runtimes.
 */
message RuntimeSelection {
  repeated uint32 runtimeList = 1;
  /** Include all runtimes. */
  optional bool allRuntimes = 2;
}

message RuntimeInfo {
  required uint32 runtimeID = 1;
  optional string htmlFramePath = 2;
  optional Position position = 3;
  message Position {
    required uint32 x = 1;
    required uint32 y = 2;
  }
}

message RuntimeList {
  repeated RuntimeInfo runtimeList = 1;
  optional State state = 2;
}

enum State {
  UNDEFINED = 0;
  RUNNING = 1;
}

service EcmascriptDebugger {
  option (version) = "6.0";
  option (cpp_class) = EcmascriptDebugger;

  /** List the runtimes. */
  command ListRuntimes(RuntimeSelection) returns (RuntimeList) = 1;
  command Continue(RuntimeSelection) returns (Default) = 2;
  event OnRuntimeStarted returns (RuntimeInfo) = 14;
  event OnRuntimeStopped returns (RuntimeInfo) = 15;
}
"#;

#[test]
fn test_dragonfly_example() {
    let schema = parse(DRAGONFLY).expect("parse");
    let names: Vec<_> = schema.messages().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec![DEFAULT_MESSAGE, "A"]);
    assert_eq!(schema.syntax.as_deref(), Some("dragonfly"));

    let service = schema.service.as_ref().expect("service");
    assert_eq!(service.name, "S");
    assert_eq!(service.major_version(), Ok(1));
    assert_eq!(service.minor_version(), Ok(2));
    assert_eq!(service.patch_version(), Ok(0));

    assert_eq!(service.commands.len(), 1);
    let command = &service.commands[0];
    assert_eq!(command.request_arg(&schema).expect("request").name, "A");
    assert_eq!(command.response_arg(&schema).expect("response").name, "A");
}

#[test]
fn test_containment_order() {
    let schema = parse(DEBUGGER).expect("parse");
    let top: Vec<_> = schema.messages().map(|m| m.name.as_str()).collect();
    assert_eq!(top, vec![DEFAULT_MESSAGE, "RuntimeSelection", "RuntimeInfo", "RuntimeList"]);

    let info = schema.message_by_name("RuntimeInfo").expect("RuntimeInfo");
    let fields: Vec<_> = info.fields.iter().map(|f| (f.name.as_str(), f.key)).collect();
    assert_eq!(fields, vec![("runtimeID", 1), ("htmlFramePath", 2), ("position", 3)]);

    let state = schema.enum_by_name("State").expect("State");
    let values: Vec<_> = state.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(values, vec!["UNDEFINED", "RUNNING"]);

    let service = schema.service.as_ref().expect("service");
    let commands: Vec<_> = service.commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(commands, vec!["ListRuntimes", "Continue"]);
    let events: Vec<_> = service.events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(events, vec!["OnRuntimeStarted", "OnRuntimeStopped"]);
}

#[test]
fn test_nested_message_attaches_to_enclosing_message() {
    let schema = parse(DEBUGGER).expect("parse");
    assert!(schema.message_by_name("Position").is_none());
    let info = schema.message_by_name("RuntimeInfo").expect("RuntimeInfo");
    assert_eq!(info.messages.len(), 1);
    assert_eq!(schema.message(info.messages[0]).map(|m| m.name.as_str()), Some("Position"));

    // declared after the field that uses it, still found from the field's scope
    let position = info.field("position").expect("position");
    match position.resolve_type(&schema).expect("resolve") {
        TypeRef::Message(m) => assert_eq!(m.name, "Position"),
        other => panic!("expected message, got {:?}", other),
    }
}

#[test]
fn test_field_types_resolve_lazily() {
    let schema = parse(DEBUGGER).expect("parse");
    let list = schema.message_by_name("RuntimeList").expect("RuntimeList");
    let runtimes = list.field("runtimeList").expect("runtimeList").resolve_type(&schema).expect("resolve");
    assert!(runtimes.is_message());
    assert_eq!(runtimes.name(), "RuntimeInfo");
    let state = list.field("state").expect("state").resolve_type(&schema).expect("resolve");
    assert!(state.is_enum());

    let selection = schema.message_by_name("RuntimeSelection").expect("RuntimeSelection");
    let ty = selection.fields[0].resolve_type(&schema).expect("resolve");
    assert!(matches!(ty, TypeRef::Primitive(Primitive::UInt32)));
}

#[test]
fn test_unknown_type_fails_only_on_access() {
    let src = "message M {\n  required int32 x = 1;\n  required Bogus y = 2;\n}\n";
    let schema = parse(src).expect("undeclared types do not fail parsing");
    let m = schema.message_by_name("M").expect("M");
    assert!(m.fields[0].resolve_type(&schema).is_ok());
    assert_eq!(
        m.fields[1].resolve_type(&schema).err(),
        Some(SchemaError::TypeNotFound("Bogus".to_string()))
    );
    assert_eq!(schema.reference_errors(), vec![SchemaError::TypeNotFound("Bogus".to_string())]);
}

#[test]
fn test_inner_declaration_shadows_outer() {
    let src = r#"
enum Kind { GLOBAL = 0; }
message Holder {
  enum Kind { LOCAL = 0; }
  required Kind kind = 1;
}
message Other {
  required Kind kind = 1;
}
"#;
    let schema = parse(src).expect("parse");
    let local = schema.message_by_name("Holder").expect("Holder").fields[0].resolve_type(&schema).expect("resolve");
    let global = schema.message_by_name("Other").expect("Other").fields[0].resolve_type(&schema).expect("resolve");
    match (local, global) {
        (TypeRef::Enum(l), TypeRef::Enum(g)) => {
            assert_eq!(l.fields[0].name, "LOCAL");
            assert_eq!(g.fields[0].name, "GLOBAL");
        }
        other => panic!("expected two enums, got {:?}", other),
    }
}

#[test]
fn test_command_arguments_resolve_from_global_scope() {
    let src = r#"
message Far { required int32 x = 1; }
message Holder {
  message Hidden { required int32 y = 1; }
}
service S {
  command UseFar(Far) returns (Default) = 1;
  command UseHidden(Hidden) returns (Far) = 2;
  event OnFar returns (Far) = 3;
}
"#;
    let schema = parse(src).expect("parse");
    let service = schema.service.as_ref().expect("service");
    let use_far = service.command("UseFar").expect("UseFar");
    assert_eq!(use_far.request_arg(&schema).expect("request").name, "Far");
    assert_eq!(use_far.response_arg(&schema).expect("response").name, DEFAULT_MESSAGE);

    let use_hidden = service.command("UseHidden").expect("UseHidden");
    assert_eq!(
        use_hidden.request_arg(&schema).err(),
        Some(SchemaError::TypeNotFound("Hidden".to_string()))
    );
    assert_eq!(service.event("OnFar").expect("OnFar").response_arg(&schema).expect("resp").name, "Far");
}

#[test]
fn test_command_argument_must_be_message() {
    let src = "enum E { A = 1; }\nservice S { command C(E) returns (Default) = 1; }\n";
    let schema = parse(src).expect("parse");
    let command = &schema.service.as_ref().expect("service").commands[0];
    assert_eq!(command.request_arg(&schema).err(), Some(SchemaError::TypeNotFound("E".to_string())));
}

#[test]
fn test_service_member_lookup() {
    let schema = parse(DEBUGGER).expect("parse");
    let service = schema.service.as_ref().expect("service");
    assert!(matches!(service.member("ListRuntimes"), Some(ServiceMember::Command(c)) if c.key == 1));
    assert!(matches!(service.member("OnRuntimeStopped"), Some(ServiceMember::Event(e)) if e.key == 15));
    assert!(service.member("Nope").is_none());
    assert!(service.command("OnRuntimeStarted").is_none());
    assert_eq!(service.command_names(), vec!["Continue", "ListRuntimes"]);
    assert_eq!(service.event_names(), vec!["OnRuntimeStarted", "OnRuntimeStopped"]);
    let list = service.command("ListRuntimes").expect("ListRuntimes");
    assert_eq!(list.doc_lines(), vec!["List the runtimes."]);
}

#[test]
fn test_service_version() {
    let schema = parse(DEBUGGER).expect("parse");
    let service = schema.service.as_ref().expect("service");
    assert_eq!(service.version(), "6.0");
    assert_eq!(
        service.version_triple(),
        Ok(Version {
            major: 6,
            minor: 0,
            patch: 0
        })
    );

    let schema = parse("service S { option (version) = \"1.beta\"; }").expect("parse");
    let service = schema.service.as_ref().expect("service");
    assert_eq!(service.major_version(), Err(SchemaError::MalformedVersion("1.beta".to_string())));

    let schema = parse("service S { }").expect("parse");
    let service = schema.service.as_ref().expect("service");
    assert_eq!(service.version(), "");
    assert!(service.version_triple().is_err());
}

#[test]
fn test_sub_messages_depth_first_unique() {
    let schema = parse(DEBUGGER).expect("parse");
    let list = schema.message_by_name("RuntimeList").expect("RuntimeList");
    let subs: Vec<_> = list.sub_messages(&schema).expect("subs").iter().map(|m| m.name.as_str()).collect();
    assert_eq!(subs, vec!["RuntimeInfo", "Position"]);
}

#[test]
fn test_sub_messages_self_reference() {
    let src = "message Node {\n  required string name = 1;\n  repeated Node children = 2;\n}\n";
    let schema = parse(src).expect("parse");
    let node = schema.message_by_name("Node").expect("Node");
    let subs = node.sub_messages(&schema).expect("subs");
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].id, node.id);
}

#[test]
fn test_sub_messages_mutual_cycle() {
    let src = r#"
message Ping { optional Pong pong = 1; }
message Pong { optional Ping ping = 1; repeated Pong again = 2; }
"#;
    let schema = parse(src).expect("parse");
    let ping = schema.message_by_name("Ping").expect("Ping");
    let subs: Vec<_> = ping.sub_messages(&schema).expect("subs").iter().map(|m| m.name.as_str()).collect();
    assert_eq!(subs, vec!["Pong", "Ping"]);
}

#[test]
fn test_sub_messages_propagates_type_errors() {
    let src = "message A { optional Missing m = 1; }";
    let schema = parse(src).expect("parse");
    let a = schema.message_by_name("A").expect("A");
    assert_eq!(a.sub_messages(&schema).err(), Some(SchemaError::TypeNotFound("Missing".to_string())));
}

#[test]
fn test_reference_errors_clean_schema() {
    let schema = parse(DEBUGGER).expect("parse");
    assert!(schema.reference_errors().is_empty());
}

#[test]
fn test_message_definitions() {
    let schema = parse(DEBUGGER).expect("parse");
    let defs = definitions(&schema).expect("defs");
    let names: Vec<_> = defs.iter().map(|d| (d.kind, d.file_name.as_str())).collect();
    assert_eq!(
        names,
        vec![
            (DefinitionKind::Command, "EcmascriptDebugger.6.0.commands.ListRuntimes.def"),
            (DefinitionKind::Response, "EcmascriptDebugger.6.0.responses.ListRuntimes.def"),
            (DefinitionKind::Command, "EcmascriptDebugger.6.0.commands.Continue.def"),
            (DefinitionKind::Response, "EcmascriptDebugger.6.0.responses.Continue.def"),
            (DefinitionKind::Event, "EcmascriptDebugger.6.0.events.OnRuntimeStarted.def"),
            (DefinitionKind::Event, "EcmascriptDebugger.6.0.events.OnRuntimeStopped.def"),
        ]
    );

    let expected_request = "\
message RuntimeSelection
{
  repeated uint32 runtimeList = 1;
  /**
    * Include all runtimes.
    */
  optional bool allRuntimes = 2;
}
";
    assert_eq!(defs[0].body, expected_request);

    let expected_response = "\
message RuntimeList
{
  repeated RuntimeInfo runtimeList = 1;
  {
    required uint32 runtimeID = 1;
    optional string htmlFramePath = 2;
    optional Position position = 3;
    {
      required uint32 x = 1;
      required uint32 y = 2;
    }
  }
  optional State state = 2;
  {
    UNDEFINED = 0;
    RUNNING = 1;
  }
}
";
    assert_eq!(defs[1].body, expected_response);
    assert_eq!(defs[3].body, "message Default\n{\n}\n");
}

#[test]
fn test_write_definitions_to_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("msg-defs");
    let schema = parse(DRAGONFLY).expect("parse");
    let written = write_definitions(&schema, &dest).expect("write");
    assert_eq!(written.len(), 2);
    let request = std::fs::read_to_string(dest.join("S.1.2.0.commands.Do.def")).expect("read");
    assert_eq!(request, "message A\n{\n  required int32 x = 1;\n}\n");
    assert!(dest.join("S.1.2.0.responses.Do.def").is_file());
}

#[test]
fn test_definitions_fail_on_unknown_argument() {
    let schema = parse("service S { option (version) = \"1.0\"; command C(Nope) returns (Default) = 1; }").expect("parse");
    assert_eq!(definitions(&schema).err(), Some(SchemaError::TypeNotFound("Nope".to_string())));
}

#[test]
fn test_write_definitions_rejects_path_like_version() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("a").join("b").join("msg-defs");
    let src = "message A {}\nservice S { option (version) = \"/../../x\"; command C(A) returns (A) = 1; }\n";
    let schema = parse(src).expect("parse");
    let err = write_definitions(&schema, &dest).expect_err("malformed version");
    assert!(matches!(err, MsgDefsError::Schema(SchemaError::MalformedVersion(_))));
    assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 0);
}

#[test]
fn test_service_lookup_follows_edited_members() {
    let src = r#"
message A {}
service S {
  command One(A) returns (A) = 1;
  command Two(A) returns (A) = 2;
  event Done returns (A) = 3;
}
"#;
    let schema = parse(src).expect("parse");
    let mut service = schema.service.clone().expect("service");

    service.commands.retain(|c| c.name == "One");
    assert!(service.command("Two").is_none());
    assert_eq!(service.command("One").map(|c| c.key), Some(1));

    service.commands[0].name = "Renamed".to_string();
    assert_eq!(service.command("Renamed").map(|c| c.key), Some(1));
    assert!(service.command("One").is_none());

    service.events.clear();
    assert!(service.event("Done").is_none());
    assert!(service.member("Done").is_none());
}

#[test]
fn test_parse_is_thread_safe() {
    let handles: Vec<_> = (0..4)
        .map(|_| std::thread::spawn(|| parse(DEBUGGER).map(|s| s.all_messages().count())))
        .collect();
    for h in handles {
        assert_eq!(h.join().expect("join"), Ok(5));
    }
}
