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
struct Step {
    data: Value,
    changed: Option<Vec<String>>,
    want_results: Option<Value>,
    want_error: Option<String>,
    // Only the members present are compared.
    want_stats: Option<Value>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ExtraRule {
    path: String,
    rule: serde_json::Value,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    schema: serde_json::Value,
    #[serde(default)]
    rules: Vec<ExtraRule>,
    options: Option<EngineOptions>,
    steps: Vec<Step>,
    skip: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn numbers(v: &Value, total: &mut f64) {
    match v {
        Value::Number(n) => *total += n.as_f64(),
        Value::Array(items) => items.iter().for_each(|item| numbers(item, total)),
        _ => (),
    }
}

// Functions available to every case.
fn add_functions(engine: &mut Engine) -> Result<()> {
    engine.add_function("sum", |ctx| {
        let mut total = 0.0;
        for dependency in ctx.dependencies {
            numbers(&ctx.snapshot.lookup(dependency), &mut total);
        }
        Ok(Value::from(total))
    })?;
    engine.add_function("concat", |ctx| {
        let parts: Vec<String> = ctx
            .dependencies
            .iter()
            .filter_map(|d| match ctx.snapshot.lookup(d) {
                Value::String(s) => Some(s.to_string()),
                _ => None,
            })
            .collect();
        Ok(Value::from(parts.join(" ")))
    })?;
    engine.add_function("isLast", |ctx| {
        // True for the last element of the array holding the target.
        let Some(crate::path::Segment::Index(index)) = ctx
            .target
            .segments()
            .iter()
            .rev()
            .find(|s| s.is_index())
        else {
            return Ok(Value::from(false));
        };
        let position = ctx
            .target
            .segments()
            .iter()
            .rposition(|s| s.is_index())
            .unwrap_or(0);
        let array = ctx.snapshot.lookup(&ctx.target.prefix(position));
        Ok(Value::from(array.as_array()?.len() == index + 1))
    })?;
    Ok(())
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

        let schema = Schema::from_serde_json_value(case.schema)?;
        let mut engine = Engine::with_options(schema, case.options.unwrap_or_default())?;
        add_functions(&mut engine)?;
        for extra in case.rules {
            engine.add_rule(&extra.path, LinkageRule::deserialize(extra.rule)?)?;
        }

        for (n, step) in case.steps.into_iter().enumerate() {
            let changed: Option<Vec<&str>> = step
                .changed
                .as_ref()
                .map(|c| c.iter().map(String::as_str).collect());
            let result = engine.evaluate(&step.data, changed.as_deref());

            match (result, &step.want_error) {
                (Ok(results), None) => {
                    if let Some(want) = &step.want_results {
                        match_values(&to_value(&results)?, want)?;
                    }
                }
                (Ok(_), Some(want)) => bail!("step {n}: expected error `{want}`"),
                (Err(e), Some(want)) => match_error(&e, want)?,
                (Err(e), None) => bail!("step {n}: {e}"),
            }

            if let Some(want) = &step.want_stats {
                let stats = to_value(&engine.cache_stats())?;
                for (key, expected) in want.as_object()? {
                    match_values(&stats[key.as_ref()], expected)?;
                }
            }
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

#[test_resources("tests/linkage/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
