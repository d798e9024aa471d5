// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use formlink::*;

#[test]
fn serialize_number() -> Result<()> {
    // Check that integer values are serialized without fractional part
    assert_eq!(serde_json::to_string_pretty(&Value::from(1.0))?, "1");
    assert_eq!(serde_json::to_string_pretty(&Value::from(-1.0))?, "-1");

    // Ensure that fractional parts are also serialized.
    assert_eq!(serde_json::to_string_pretty(&Value::from(1.1))?, "1.1");
    assert_eq!(serde_json::to_string_pretty(&Value::from(-1.1))?, "-1.1");

    // Numbers compare by value.
    assert_eq!(Value::from(6.0), Value::from(6u64));
    Ok(())
}

#[test]
fn serialize_string() -> Result<()> {
    assert_eq!(
        Value::String("Hello, World\n".into()).to_json_str()?,
        "\"Hello, World\\n\""
    );
    Ok(())
}

#[test]
fn absent_values() -> Result<()> {
    for json in ["null", "\"\"", "[]"] {
        assert!(Value::from_json_str(json)?.is_absent(), "{json}");
    }
    for json in ["0", "false", "\" \"", "{}", "[null]"] {
        assert!(!Value::from_json_str(json)?.is_absent(), "{json}");
    }
    assert!(Value::Undefined.is_absent());
    Ok(())
}

#[test]
fn lookup() -> Result<()> {
    let data = Value::from_json_str(
        r#"{ "contacts": [ { "type": "work" }, { "type": "home", "phones": [ { "n": 1 } ] } ] }"#,
    )?;

    let at = |path: &str| -> Result<Value> { Ok(data.lookup(&RuntimePath::parse(path)?)) };
    assert_eq!(at("contacts.1.type")?, Value::from("home"));
    assert_eq!(at("contacts.1.phones.0.n")?, Value::from(1u64));
    assert_eq!(at("contacts.2.type")?, Value::Undefined);
    assert_eq!(at("contacts.0.type.x")?, Value::Undefined);
    assert_eq!(at("")?, data);

    // Wildcards pluck from every element.
    assert_eq!(
        at("contacts.*.type")?,
        Value::from(vec![Value::from("work"), Value::from("home")])
    );

    // Flattened joints address the same data as nested ones.
    let form = Value::from_json_str(r#"{ "address": { "city": "Oslo" } }"#)?;
    assert_eq!(
        form.lookup(&RuntimePath::parse("address~~city")?),
        form.lookup(&RuntimePath::parse("address.city")?)
    );
    Ok(())
}

#[test]
fn set_path() -> Result<()> {
    let mut data = Value::new_object();
    data.set_path(&RuntimePath::parse("order.lines.2.qty")?, Value::from(3u64))?;
    assert_eq!(
        data,
        Value::from_json_str(r#"{ "order": { "lines": [null, null, { "qty": 3 }] } }"#)?
    );

    data.set_path(&RuntimePath::parse("order.lines.0")?, Value::from("x"))?;
    assert_eq!(data["order"]["lines"][0], Value::from("x"));

    // Paths through scalars or wildcards cannot be written.
    assert!(data
        .set_path(&RuntimePath::parse("order.lines.0.qty")?, Value::Null)
        .is_err());
    assert!(data
        .set_path(&RuntimePath::parse("order.lines.*.qty")?, Value::Null)
        .is_err());
    Ok(())
}

#[test]
fn api() -> Result<()> {
    assert!(Value::from_json_str("{}")?.as_object()?.is_empty());
    assert_eq!(Value::from_json_str("[1, 2]")?.as_array()?.len(), 2);

    assert!(Value::Undefined.as_object().is_err());
    assert!(Value::String("anc".into()).as_array().is_err());
    assert!(Value::new_object().as_number().is_err());
    assert!(Value::from(5.6).as_bool().is_err());
    Ok(())
}
