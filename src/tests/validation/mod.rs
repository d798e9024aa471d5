// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::panic, clippy::unwrap_used)] // test harness

use crate::tests::common::{match_error, match_values, to_value};
use crate::*;

use anyhow::{bail, Result};
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    schema: serde_json::Value,
    data: Value,
    // Runtime path to message. An empty map means the data is valid.
    want_errors: Option<Value>,
    // Expected schema load error.
    want_error: Option<String>,
    skip: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    for case in test.cases {
        print!("case {} ", case.note);
        if case.skip == Some(true) {
            println!("skipped");
            continue;
        }

        let schema = match (Schema::from_serde_json_value(case.schema), &case.want_error) {
            (Ok(schema), None) => schema,
            (Ok(_), Some(want)) => bail!("expected schema error `{want}`"),
            (Err(e), Some(want)) => {
                match_error(&e, want)?;
                println!("passed");
                continue;
            }
            (Err(e), None) => return Err(e.into()),
        };

        let errors = SchemaValidator::validate(&schema, &case.data);
        match &case.want_errors {
            Some(want) => match_values(&to_value(&errors)?, want)?,
            None => bail!("case {} has no expectation", case.note),
        }
        println!("passed");
    }

    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test_resources("tests/validation/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
