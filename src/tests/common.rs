// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared helpers for the YAML driven test suites.

use crate::*;

use anyhow::{bail, Result};
use serde::Serialize;

/// Interprets the special encodings used in YAML fixtures.
pub fn process_value(v: &Value) -> Result<Value> {
    match v {
        // Undefined is encoded as the string "#undefined".
        Value::String(s) if s.as_ref() == "#undefined" => Ok(Value::Undefined),

        Value::Array(items) => {
            let mut array_value = Value::new_array();
            let array = array_value.as_array_mut()?;
            for item in items.iter() {
                array.push(process_value(item)?);
            }
            Ok(array_value)
        }

        Value::Object(fields) => {
            let mut object_value = Value::new_object();
            let object = object_value.as_object_mut()?;
            for (key, value) in fields.iter() {
                object.insert(key.clone(), process_value(value)?);
            }
            Ok(object_value)
        }

        _ => Ok(v.clone()),
    }
}

/// Converts anything serializable (results, error maps, statistics) into a
/// `Value` for comparison with a fixture.
pub fn to_value<T: Serialize>(t: &T) -> Result<Value> {
    Ok(Value::from(serde_json::to_value(t)?))
}

pub fn match_values(computed: &Value, expected: &Value) -> Result<()> {
    let expected = process_value(expected)?;
    if *computed != expected {
        let expected_yaml = serde_yaml::to_string(&expected)?;
        let computed_yaml = serde_yaml::to_string(computed)?;
        println!(
            "mismatch:\n{}",
            prettydiff::diff_lines(&expected_yaml, &computed_yaml)
        );
        bail!("expected:\n{expected_yaml}computed:\n{computed_yaml}");
    }
    Ok(())
}

/// Checks that an error message mentions `want`.
pub fn match_error(error: &dyn core::fmt::Display, want: &str) -> Result<()> {
    let message = error.to_string();
    if !message.contains(want) {
        bail!("expected error containing `{want}`, got `{message}`");
    }
    Ok(())
}
