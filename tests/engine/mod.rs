// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Result};
use formlink::graph::DependencyGraph;
use formlink::*;

const CONTACTS: &str = r#"{
    "type": "object",
    "properties": {
        "contacts": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "type": { "type": "string" },
                    "companyName": {
                        "type": "string",
                        "linkage": {
                            "kind": "visibility",
                            "when": { "field": "./type", "operator": "==", "value": "work" }
                        }
                    }
                }
            }
        }
    }
}"#;

fn contacts(types: &[&str]) -> Result<Value> {
    let items: Vec<String> = types
        .iter()
        .map(|t| format!(r#"{{ "type": "{t}" }}"#))
        .collect();
    Ok(Value::from_json_str(&format!(
        r#"{{ "contacts": [{}] }}"#,
        items.join(",")
    ))?)
}

#[test]
fn array_elements_are_evaluated_independently() -> Result<()> {
    let mut engine = Engine::new(Schema::from_json_str(CONTACTS)?)?;

    let results = engine.evaluate(&contacts(&["personal", "work"])?, None)?;
    assert_eq!(results.len(), 2);
    assert_eq!(results["contacts.0.companyName"].visible, Some(false));
    assert_eq!(results["contacts.1.companyName"].visible, Some(true));

    // One instantiated rule per element, each reading its own sibling.
    assert_eq!(engine.rules().len(), 2);
    assert!(engine.graph().contains_edge(
        &RuntimePath::parse("contacts.1.companyName")?,
        &RuntimePath::parse("contacts.1.type")?
    ));

    // Only the edited element is re-evaluated.
    let results = engine.evaluate(
        &contacts(&["work", "work"])?,
        Some(&["contacts.0.type"][..]),
    )?;
    assert_eq!(results.len(), 1);
    assert_eq!(results["contacts.0.companyName"].visible, Some(true));

    Ok(())
}

#[test]
fn results_are_cached_by_dependency_values() -> Result<()> {
    let mut engine = Engine::new(Schema::from_json_str(CONTACTS)?)?;
    let data = contacts(&["work", "personal", "work"])?;

    let first = engine.evaluate(&data, None)?;
    let stats = engine.cache_stats();
    // Elements with equal types share an entry.
    assert_eq!((stats.misses, stats.hits, stats.len), (2, 1, 2));

    // Served entirely from the cache, with the same results.
    let second = engine.evaluate(&data, None)?;
    let stats = engine.cache_stats();
    assert_eq!((stats.misses, stats.hits), (2, 4));
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);

    engine.clear_cache();
    assert_eq!(engine.cache_stats().len, 0);

    engine.set_cache_capacity(1);
    engine.evaluate(&data, None)?;
    let stats = engine.cache_stats();
    assert_eq!(stats.capacity, 1);
    assert_eq!(stats.len, 1);
    assert!(stats.evictions >= 1);

    Ok(())
}

#[test]
fn cycles_are_detected() -> Result<()> {
    let mut graph = DependencyGraph::new();
    graph.add_edge("a", "c");
    graph.add_edge("b", "a");
    graph.add_edge("c", "b");
    let Some(cycle) = graph.detect_cycle() else {
        bail!("cycle not detected");
    };
    for node in ["a", "b", "c"] {
        assert!(cycle.contains(&node));
    }
    assert_eq!(cycle.first(), cycle.last());

    let schema = Schema::from_json_str(
        r#"{
            "properties": {
                "a": { "linkage": { "kind": "value", "fulfill": { "valueFrom": "c" } } },
                "b": { "linkage": { "kind": "value", "fulfill": { "valueFrom": "a" } } },
                "c": { "linkage": { "kind": "value", "fulfill": { "valueFrom": "b" } } }
            }
        }"#,
    )?;

    let reported = Rc::new(RefCell::new(vec![]));
    let mut engine = Engine::new(schema)?;
    let sink = reported.clone();
    engine.set_cycle_notifier(move |path| sink.borrow_mut().push(path.join(" -> ")));

    let results = engine.evaluate(&Value::new_object(), None)?;
    assert_eq!(results.len(), 3);
    assert_eq!(*reported.borrow(), vec!["a -> b -> c -> a".to_string()]);

    engine.set_fail_on_cycle(true);
    match engine.evaluate(&Value::new_object(), None) {
        Err(EngineError::Cycle { path }) => assert_eq!(path, ["a", "b", "c", "a"]),
        r => bail!("unexpected {r:?}"),
    }

    Ok(())
}

#[test]
fn functions() -> Result<()> {
    let schema = Schema::from_json_str(
        r#"{
            "properties": {
                "first": {},
                "last": {},
                "full": {
                    "linkage": {
                        "kind": "value",
                        "dependencies": ["first", "last"],
                        "fulfill": { "function": "join" }
                    }
                }
            }
        }"#,
    )?;
    let mut engine = Engine::new(schema)?;

    // Not registered yet.
    let data = Value::from_json_str(r#"{ "first": "Ada", "last": "Lovelace" }"#)?;
    assert!(matches!(
        engine.evaluate(&data, None),
        Err(EngineError::UnknownFunction(name)) if name == "join"
    ));

    engine.add_function("join", |ctx| {
        let mut parts = vec![];
        for dependency in ctx.dependencies {
            if let Value::String(s) = ctx.snapshot.lookup(dependency) {
                parts.push(s.to_string());
            }
        }
        Ok(Value::from(parts.join(" ")))
    })?;
    assert!(matches!(
        engine.add_function("join", |_| Ok(Value::Null)),
        Err(EngineError::DuplicateFunction(_))
    ));

    let results = engine.evaluate(&data, None)?;
    assert_eq!(results["full"].value, Some(Value::from("Ada Lovelace")));

    Ok(())
}

#[test]
fn options_load_from_json() -> Result<()> {
    let options = EngineOptions::from_json_str(r#"{ "cacheCapacity": 0, "failOnCycle": true }"#)?;
    assert_eq!(options.cache_capacity, 0);
    assert!(options.fail_on_cycle);
    assert_eq!(options.max_depth, EngineOptions::default().max_depth);
    assert!(EngineOptions::from_json_str(r#"{ "capacity": 1 }"#).is_err());

    let mut engine = Engine::with_options(Schema::from_json_str(CONTACTS)?, options)?;
    engine.evaluate(&contacts(&["work", "work"])?, None)?;
    assert_eq!(engine.cache_stats().len, 0);

    engine.set_options(EngineOptions::default());
    engine.evaluate(&contacts(&["work", "work"])?, None)?;
    assert_eq!(engine.cache_stats().len, 1);

    Ok(())
}

#[test]
fn schemas_deeper_than_the_limit_are_rejected() -> Result<()> {
    let mut json = r#"{ "type": "string" }"#.to_string();
    for _ in 0..10 {
        json = format!(r#"{{ "properties": {{ "a": {json} }} }}"#);
    }
    let options = EngineOptions {
        max_depth: 4,
        ..EngineOptions::default()
    };
    assert!(matches!(
        Engine::with_options(Schema::from_json_str(&json)?, options),
        Err(EngineError::Format(FormatError::TooDeep { .. }))
    ));
    assert!(Engine::new(Schema::from_json_str(&json)?).is_ok());
    Ok(())
}

#[test]
fn validate_through_the_engine() -> Result<()> {
    let schema = Schema::from_json_str(
        r#"{
            "properties": {
                "country": {},
                "idCard": { "title": "ID card" },
                "ssn": { "title": "SSN" }
            },
            "if": { "field": "country", "operator": "==", "value": "china" },
            "then": { "required": ["idCard"] },
            "else": { "required": ["ssn"] }
        }"#,
    )?;
    let engine = Engine::new(schema)?;

    let errors = engine.validate(&Value::from_json_str(
        r#"{ "country": "china", "idCard": "" }"#,
    )?);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.get("idCard"), Some("ID card is required"));

    let errors = engine.validate(&Value::from_json_str(r#"{ "country": "chile" }"#)?);
    assert_eq!(errors.get("ssn"), Some("SSN is required"));
    Ok(())
}
