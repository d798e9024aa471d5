// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use formlink::path::codec::to_runtime_path;
use formlink::{Engine, EngineOptions, RuntimePath, Schema, Value};

fn read_schema(file: &str) -> Result<Schema> {
    Ok(if file.ends_with(".json") {
        Schema::from_json_file(file)?
    } else if file.ends_with(".yaml") {
        Schema::from_yaml_file(file)?
    } else {
        bail!("Unsupported schema file `{file}`. Must be json or yaml.")
    })
}

fn read_data(file: &str) -> Result<Value> {
    if file.ends_with(".json") {
        Value::from_json_file(file)
    } else if file.ends_with(".yaml") {
        Value::from_yaml_file(file)
    } else {
        bail!("Unsupported data file `{file}`. Must be json or yaml.")
    }
}

fn formlink_eval(
    schema: String,
    data: String,
    changed: Vec<String>,
    options: Option<String>,
) -> Result<()> {
    let options = match options {
        Some(file) => EngineOptions::from_file(&file)?,
        None => EngineOptions::default(),
    };
    let mut engine = Engine::with_options(read_schema(&schema)?, options)?;
    let snapshot = read_data(&data)?;

    // Evaluate everything once, then only what the changed paths affect.
    let mut results = engine.evaluate(&snapshot, None)?;
    if !changed.is_empty() {
        let changed: Vec<&str> = changed.iter().map(String::as_str).collect();
        results = engine.evaluate(&snapshot, Some(changed.as_slice()))?;
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    eprintln!("{}", serde_json::to_string_pretty(&engine.cache_stats())?);
    Ok(())
}

fn formlink_validate(schema: String, data: String) -> Result<()> {
    let schema = read_schema(&schema)?;
    let errors = schema.validate(&read_data(&data)?);
    println!("{}", serde_json::to_string_pretty(&errors)?);
    if !errors.is_empty() {
        bail!("{} invalid field(s)", errors.len());
    }
    Ok(())
}

fn formlink_resolve(schema: String, at: String, references: Vec<String>) -> Result<()> {
    let schema = read_schema(&schema)?;
    let site = RuntimePath::parse(&at)?;
    for reference in references {
        let resolved = to_runtime_path(&reference, &site, Some(&schema))?;
        println!("{reference} -> {resolved}");
    }
    Ok(())
}

#[derive(Subcommand)]
enum FormlinkCommand {
    /// Evaluate the linkage rules of a schema against a form snapshot.
    Eval {
        /// Schema file. json or yaml.
        #[arg(long, short, value_name = "schema.json")]
        schema: String,

        /// Form data file. json or yaml.
        #[arg(long, short, value_name = "data.json")]
        data: String,

        /// Changed runtime paths. Re-evaluates only the fields they affect.
        #[arg(long, short)]
        changed: Vec<String>,

        /// Engine options file. json or yaml.
        #[arg(long, short, value_name = "options.json")]
        options: Option<String>,
    },

    /// Validate form data against a schema.
    Validate {
        /// Schema file. json or yaml.
        #[arg(long, short, value_name = "schema.json")]
        schema: String,

        /// Form data file. json or yaml.
        #[arg(long, short, value_name = "data.json")]
        data: String,
    },

    /// Resolve path references for a field.
    Resolve {
        /// Schema file. json or yaml.
        #[arg(long, short, value_name = "schema.json")]
        schema: String,

        /// Runtime path of the field the references are resolved for.
        #[arg(long, short)]
        at: String,

        /// References: `./name`, `../name`, schema pointers or runtime paths.
        #[arg(required(true))]
        references: Vec<String>,
    },
}

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: FormlinkCommand,
}

fn main() -> Result<()> {
    // Parse and dispatch command.
    let cli = Cli::parse();
    match cli.command {
        FormlinkCommand::Eval {
            schema,
            data,
            changed,
            options,
        } => formlink_eval(schema, data, changed, options),
        FormlinkCommand::Validate { schema, data } => formlink_validate(schema, data),
        FormlinkCommand::Resolve {
            schema,
            at,
            references,
        } => formlink_resolve(schema, at, references),
    }
}
