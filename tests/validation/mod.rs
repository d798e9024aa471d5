// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use formlink::*;

fn errors(schema: &Schema, json: &str) -> Result<Vec<(String, String)>> {
    Ok(schema
        .validate(&Value::from_json_str(json)?)
        .into_iter()
        .collect())
}

#[test]
fn one_of_with_several_matches() -> Result<()> {
    let schema = Schema::from_json_str(
        r#"{
            "properties": { "email": { "title": "E-mail" }, "phone": { "title": "Phone" } },
            "oneOf": [ { "required": ["email"] }, { "required": ["phone"] } ]
        }"#,
    )?;

    let found = errors(&schema, r#"{ "email": "a@b.c", "phone": "555" }"#)?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, WHOLE_SCHEMA_KEY);

    assert!(errors(&schema, r#"{ "phone": "555" }"#)?.is_empty());
    assert_eq!(
        errors(&schema, "{}")?,
        vec![("email".to_string(), "E-mail is required".to_string())]
    );
    Ok(())
}

#[test]
fn errors_serialize_as_a_map() -> Result<()> {
    let schema = Schema::from_json_str(
        r#"{ "required": ["b", "a"], "properties": { "a": { "title": "A" } } }"#,
    )?;
    let found = schema.validate(&Value::new_object());
    // Errors keep the order they were found in.
    assert_eq!(
        serde_json::to_string(&found)?,
        r#"{"b":"b is required","a":"A is required"}"#
    );
    assert_eq!(found.first(), Some(("b", "b is required")));
    Ok(())
}

#[test]
fn yaml_schemas() -> Result<()> {
    let schema = Schema::from_yaml_str(
        r#"
properties:
  age:
    title: Age
    type: integer
    minimum: 18
    messages:
      minimum: "{title} must be {limit} or more, got {value}"
"#,
    )?;
    assert_eq!(
        errors(&schema, r#"{ "age": 16 }"#)?,
        vec![("age".to_string(), "Age must be 18 or more, got 16".to_string())]
    );
    Ok(())
}

#[test]
fn malformed_schemas_are_rejected() {
    for json in [
        r#"{ "type": "text" }"#,
        r#"{ "pattern": "(" }"#,
        r#"{ "required": "name" }"#,
        r#"{ "if": 3 }"#,
    ] {
        assert!(
            matches!(Schema::from_json_str(json), Err(SchemaError::Parse(_))),
            "{json}"
        );
    }
    assert!(matches!(
        Schema::from_json_file("no/such/schema.json"),
        Err(SchemaError::Read { .. })
    ));
}
