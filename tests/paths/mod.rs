// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use formlink::path::codec::{pointer_to_logical, relative_to_absolute, to_runtime_path};
use formlink::*;

fn p(s: &str) -> Result<RuntimePath> {
    Ok(RuntimePath::parse(s)?)
}

#[test]
fn printed_form_round_trips() -> Result<()> {
    for path in ["", "a", "contacts.0.type", "form.address~~city", "a.*.b"] {
        assert_eq!(p(path)?.to_string(), path);
    }
    for bad in ["a..b", ".a", "a.", "a~~", " a"] {
        assert!(matches!(
            RuntimePath::parse(bad),
            Err(FormatError::MalformedPath { .. })
        ));
    }
    Ok(())
}

#[test]
fn templates_drop_indices() -> Result<()> {
    assert_eq!(p("contacts.3.phones.0.n")?.to_template(), p("contacts.phones.n")?);
    assert_eq!(p("a.*.b")?.to_template(), p("a.b")?);
    Ok(())
}

#[test]
fn overlap_is_a_prefix_relation() -> Result<()> {
    assert!(p("contacts.1")?.overlaps(&p("contacts.1.type")?));
    assert!(p("contacts.*.type")?.overlaps(&p("contacts.4.type")?));
    assert!(!p("contacts.1.type")?.overlaps(&p("contacts.2.type")?));
    assert!(!p("contacts.type")?.overlaps(&p("contacts.typeName")?));
    // Flattened and nested forms address the same data.
    assert!(p("address~~city")?.overlaps(&p("address.city")?));
    Ok(())
}

#[test]
fn references_resolve_against_the_site() -> Result<()> {
    let schema = Schema::from_json_str(
        r#"{
            "properties": {
                "country": {},
                "contacts": {
                    "type": "array",
                    "items": {
                        "properties": {
                            "type": {},
                            "phones": {
                                "type": "array",
                                "items": { "properties": { "number": {}, "kind": {} } }
                            }
                        }
                    }
                }
            }
        }"#,
    )?;
    let site = p("contacts.1.phones.0.kind")?;
    let resolve = |declared: &str| -> Result<String> {
        Ok(to_runtime_path(declared, &site, Some(&schema))?.to_string())
    };

    assert_eq!(resolve("./number")?, "contacts.1.phones.0.number");
    assert_eq!(resolve("../type")?, "contacts.1.type");
    assert_eq!(resolve("../../country")?, "country");
    assert_eq!(resolve("#/properties/contacts/items/properties/type")?, "contacts.1.type");
    assert_eq!(resolve("contacts.phones.number")?, "contacts.1.phones.0.number");
    assert_eq!(resolve("contacts.0.type")?, "contacts.0.type");

    assert!(matches!(
        to_runtime_path("./", &site, Some(&schema)),
        Err(FormatError::MalformedReference { .. })
    ));
    Ok(())
}

#[test]
fn pointers_and_relative_references() -> Result<()> {
    assert_eq!(
        pointer_to_logical("#/properties/a/items/properties/b")?,
        p("a.b")?
    );
    assert_eq!(relative_to_absolute("./zip", &p("form.address~~city")?)?, p("form.zip")?);
    assert!(relative_to_absolute("../x", &p("top")?).is_err());
    Ok(())
}
