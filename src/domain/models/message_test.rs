use anyhow::Result;

use super::Message;
use super::Role;

#[test]
fn it_executes_new() {
    let msg = Message::new(Role::Assistant, "Hi there!");
    assert_eq!(msg.role, Role::Assistant);
    assert_eq!(msg.role.to_string(), "assistant");
    assert_eq!(msg.content, "Hi there!".to_string());
}

#[test]
fn it_executes_append() {
    let mut msg = Message::assistant("Hi there!");
    msg.append(" It's me!");
    assert_eq!(msg.content, "Hi there! It's me!");
}

#[test]
fn it_serializes_to_wire_shape() -> Result<()> {
    let msg = Message::user("hello");
    let res = serde_json::to_string(&msg)?;
    insta::assert_snapshot!(res, @r###"{"role":"user","content":"hello"}"###);

    return Ok(());
}

#[test]
fn it_rejects_unknown_roles() {
    let res = serde_json::from_str::<Message>(r#"{"role":"system","content":"x"}"#);
    assert!(res.is_err());
}
