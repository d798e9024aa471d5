// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::Path;

use anyhow::{bail, Result};
use formlink::*;
use walkdir::WalkDir;

fn load(dir: &Path, stem: &str) -> Result<(Schema, Value)> {
    let json = dir.join(format!("{stem}.json"));
    let yaml = dir.join(format!("{stem}.yaml"));
    let schema_json = dir.join("schema.json");
    let schema_yaml = dir.join("schema.yaml");

    let schema = if schema_json.is_file() {
        Schema::from_json_file(&schema_json.to_string_lossy())?
    } else {
        Schema::from_yaml_file(&schema_yaml.to_string_lossy())?
    };
    let data = if json.is_file() {
        Value::from_json_file(&json.to_string_lossy())?
    } else {
        Value::from_yaml_file(&yaml.to_string_lossy())?
    };
    Ok((schema, data))
}

// Every form under demos/forms evaluates and validates to its expected.json.
#[test]
fn demo_forms() -> Result<()> {
    let mut checked = 0;
    for entry in WalkDir::new("demos/forms")
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_name() != "expected.json" {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        println!("form {}", dir.display());

        let (schema, data) = load(dir, "data")?;
        let expected: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(entry.path())?)?;

        let mut engine = Engine::new(schema)?;
        let linkage = serde_json::to_value(engine.evaluate(&data, None)?)?;
        if linkage != expected["linkage"] {
            bail!("{}: linkage {linkage:#}", dir.display());
        }

        let errors = serde_json::to_value(engine.validate(&data))?;
        if errors != expected["errors"] {
            bail!("{}: errors {errors:#}", dir.display());
        }
        checked += 1;
    }

    assert_eq!(checked, 2);
    Ok(())
}
