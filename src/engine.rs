// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::cache::{CacheStats, ResultCache};
use crate::error::EngineError;
use crate::graph::DependencyGraph;
use crate::linkage::instantiate::{instantiate, Template};
use crate::linkage::{Effect, InstantiatedRule, LinkageResult, LinkageRule, OptionItem, RuleKind, When};
use crate::options::EngineOptions;
use crate::path::RuntimePath;
use crate::schema::error::ValidationErrors;
use crate::schema::Schema;
use crate::value::Value;

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use log::{debug, info, trace, warn};

/// A named function a rule can call for its condition or its effect.
///
/// As a condition, a `true` result (or any present non-boolean value) means
/// the condition holds. As a `value` effect the result is the computed value;
/// as an `options` effect it is read as a list of options.
pub type Function = Rc<dyn Fn(&FunctionContext<'_>) -> anyhow::Result<Value>>;

/// What a [`Function`] is called with.
pub struct FunctionContext<'a> {
    /// The concrete field the rule is evaluated for.
    pub target: &'a RuntimePath,
    /// The snapshot, including values computed earlier in the same evaluation.
    pub snapshot: &'a Value,
    /// The rule's resolved dependencies.
    pub dependencies: &'a [RuntimePath],
}

type CycleNotifier = Rc<dyn Fn(&[String])>;

/// The linkage evaluation engine.
///
/// An engine is bound to one schema. The linkage rules the schema declares
/// are collected once; every call to [`Engine::evaluate`] instantiates them
/// against the current snapshot, rebuilds the dependency graph and evaluates
/// the affected fields in dependency order.
pub struct Engine {
    schema: Schema,
    templates: Vec<Template>,
    functions: BTreeMap<String, Function>,
    options: EngineOptions,
    cache: ResultCache<LinkageResult>,
    notifier: CycleNotifier,

    // State of the last evaluation.
    rules: Vec<InstantiatedRule>,
    graph: DependencyGraph<RuntimePath>,
    previous_targets: Option<BTreeSet<RuntimePath>>,
}

/// Create a default engine over an empty schema.
impl Default for Engine {
    fn default() -> Self {
        Self::build(Schema::default(), vec![], EngineOptions::default())
    }
}

impl Engine {
    /// Create an engine for `schema` with default options.
    ///
    /// Fails when the schema nests deeper than the depth limit.
    pub fn new(schema: Schema) -> Result<Self, EngineError> {
        Self::with_options(schema, EngineOptions::default())
    }

    /// Create an engine for `schema` configured by `options`.
    pub fn with_options(schema: Schema, options: EngineOptions) -> Result<Self, EngineError> {
        let walker = schema.walker().with_max_depth(options.max_depth);
        walker.check_depth()?;
        let templates = walker
            .collect_linkage()?
            .into_iter()
            .map(|(target, rule)| Template {
                target,
                rule: Rc::new(rule),
            })
            .collect();
        Ok(Self::build(schema, templates, options))
    }

    fn build(schema: Schema, templates: Vec<Template>, options: EngineOptions) -> Self {
        Self {
            schema,
            templates,
            functions: BTreeMap::new(),
            options,
            cache: ResultCache::new(options.cache_capacity),
            notifier: Rc::new(|path: &[String]| {
                warn!("dependency cycle detected: {}", path.join(" -> "));
            }),
            rules: vec![],
            graph: DependencyGraph::new(),
            previous_targets: None,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Replace the engine's options. Changing the cache capacity keeps the
    /// most recently used entries that still fit.
    pub fn set_options(&mut self, options: EngineOptions) {
        info!("engine options: {options:?}");
        self.cache.set_capacity(options.cache_capacity);
        self.options = options;
    }

    pub fn set_fail_on_cycle(&mut self, fail: bool) {
        self.options.fail_on_cycle = fail;
    }

    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.options.cache_capacity = capacity;
        self.cache.set_capacity(capacity);
    }

    /// Replace the callback invoked with the path of a detected cycle.
    /// The default callback logs a warning.
    pub fn set_cycle_notifier(&mut self, notifier: impl Fn(&[String]) + 'static) {
        self.notifier = Rc::new(notifier);
    }

    /// Attach a rule to the field at `path`, in addition to the rules the
    /// schema declares. Indices in `path` are ignored: the rule applies to
    /// every element of the arrays the field sits in.
    ///
    /// ```
    /// # use formlink::*;
    /// # fn main() -> anyhow::Result<()> {
    /// let schema = Schema::from_json_str(r#"{ "properties": { "a": {}, "b": {} } }"#)?;
    /// let mut engine = Engine::new(schema)?;
    /// engine.add_rule(
    ///     "b",
    ///     LinkageRule::from_json_str(
    ///         r#"{ "kind": "disabled", "when": { "field": "a", "operator": "isEmpty" } }"#,
    ///     )?,
    /// )?;
    /// let results = engine.evaluate(&Value::from_json_str(r#"{ "a": "" }"#)?, None)?;
    /// assert_eq!(results["b"].disabled, Some(true));
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_rule(&mut self, path: &str, rule: LinkageRule) -> Result<(), EngineError> {
        let path = RuntimePath::parse(path)?;
        let target = self.schema.walker().canonicalize(&path.to_template());
        self.templates.push(Template {
            target,
            rule: Rc::new(rule),
        });
        // The new rule has to be evaluated on the next call.
        self.previous_targets = None;
        Ok(())
    }

    /// Register a named function. Names are unique per engine.
    pub fn add_function<F>(&mut self, name: &str, function: F) -> Result<(), EngineError>
    where
        F: Fn(&FunctionContext<'_>) -> anyhow::Result<Value> + 'static,
    {
        if self.functions.contains_key(name) {
            return Err(EngineError::DuplicateFunction(name.to_string()));
        }
        self.functions.insert(name.to_string(), Rc::new(function));
        Ok(())
    }

    /// Evaluate the linkage rules against `snapshot`.
    ///
    /// `changed` lists the paths edited since the previous call. With `None`,
    /// and on the first call, every field with a rule is evaluated; otherwise
    /// only the fields whose dependencies overlap a changed path, directly or
    /// transitively, and fields that did not exist on the previous call.
    ///
    /// Returns the state of every evaluated field, keyed by runtime path.
    pub fn evaluate(
        &mut self,
        snapshot: &Value,
        changed: Option<&[&str]>,
    ) -> Result<BTreeMap<String, LinkageResult>, EngineError> {
        self.check_functions()?;
        let changed = match changed {
            Some(paths) => Some(
                paths
                    .iter()
                    .map(|p| RuntimePath::parse(p))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        self.rules = instantiate(&self.templates, &self.schema, snapshot)?;
        self.graph = self.build_graph();
        debug!(
            "rebuilt {} rules over {} nodes and {} edges",
            self.rules.len(),
            self.graph.nodes().count(),
            self.graph.edge_count()
        );

        if let Some(cycle) = self.graph.detect_cycle() {
            let path: Vec<String> = cycle.iter().map(|p| p.to_string()).collect();
            (self.notifier)(&path);
            if self.options.fail_on_cycle {
                return Err(EngineError::Cycle { path });
            }
        }

        let mut by_target: BTreeMap<RuntimePath, Vec<usize>> = BTreeMap::new();
        for (idx, rule) in self.rules.iter().enumerate() {
            by_target.entry(rule.target.clone()).or_default().push(idx);
        }
        let targets: BTreeSet<RuntimePath> = by_target.keys().cloned().collect();

        let affected = self.affected(&targets, changed.as_deref());
        debug!(
            "{} of {} targets affected",
            affected.len(),
            targets.len()
        );
        self.previous_targets = Some(targets);

        let mut working = snapshot.clone();
        let mut results = BTreeMap::new();
        for target in self.graph.order(&affected) {
            let Some(indices) = by_target.get(&target) else {
                continue;
            };
            let mut merged = LinkageResult::default();
            for idx in indices {
                let result = self.evaluate_cached(*idx, &working)?;
                if let Some(value) = &result.value {
                    if let Err(e) = working.set_path(&target, value.clone()) {
                        debug!("computed value not written back: {e}");
                    }
                }
                merged.merge(&result);
            }
            results.insert(target.to_string(), merged);
        }

        Ok(results)
    }

    /// Validate `value` against the engine's schema.
    pub fn validate(&self, value: &Value) -> ValidationErrors {
        self.schema.validate(value)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Rules instantiated by the last evaluation.
    pub fn rules(&self) -> &[InstantiatedRule] {
        &self.rules
    }

    /// Dependency graph built by the last evaluation.
    pub fn graph(&self) -> &DependencyGraph<RuntimePath> {
        &self.graph
    }

    fn check_functions(&self) -> Result<(), EngineError> {
        for template in &self.templates {
            for name in template.rule.functions() {
                if !self.functions.contains_key(name) {
                    return Err(EngineError::UnknownFunction(name.to_string()));
                }
            }
        }
        Ok(())
    }

    fn build_graph(&self) -> DependencyGraph<RuntimePath> {
        let mut graph = DependencyGraph::new();
        for rule in &self.rules {
            graph.add_node(rule.target.clone());
            for dependency in &rule.dependencies {
                graph.add_edge(rule.target.clone(), dependency.clone());
            }
        }

        // A dependency inside (or matching) another rule's target is produced
        // by that rule.
        let targets: BTreeSet<&RuntimePath> = self.rules.iter().map(|r| &r.target).collect();
        let dependencies: BTreeSet<&RuntimePath> =
            self.rules.iter().flat_map(|r| r.dependencies.iter()).collect();
        let mut produced = vec![];
        for dependency in dependencies {
            for target in &targets {
                if dependency != *target && dependency.starts_with(target) {
                    produced.push((dependency.clone(), (*target).clone()));
                }
            }
        }
        for (dependency, target) in produced {
            graph.add_edge(dependency, target);
        }

        // A rule reading a container reads every target inside it. Rules whose
        // own target sits in that container are skipped so that reading the
        // enclosing element does not make a cycle.
        let mut contained = vec![];
        for rule in &self.rules {
            for dependency in &rule.dependencies {
                if rule.target.starts_with(dependency) {
                    continue;
                }
                for target in &targets {
                    if *target != dependency && target.starts_with(dependency) {
                        contained.push((rule.target.clone(), (*target).clone()));
                    }
                }
            }
        }
        for (reader, target) in contained {
            graph.add_edge(reader, target);
        }

        graph
    }

    fn affected(
        &self,
        targets: &BTreeSet<RuntimePath>,
        changed: Option<&[RuntimePath]>,
    ) -> BTreeSet<RuntimePath> {
        let (Some(previous), Some(changed)) = (&self.previous_targets, changed) else {
            return targets.clone();
        };

        let mut affected: BTreeSet<RuntimePath> = targets.difference(previous).cloned().collect();
        for source in self.graph.sources() {
            if changed.iter().any(|c| c.overlaps(source)) {
                affected.extend(self.graph.affected(source));
            }
        }
        affected.retain(|t| targets.contains(t));
        affected
    }

    fn evaluate_cached(&mut self, idx: usize, working: &Value) -> Result<LinkageResult, EngineError> {
        let Some(rule) = self.rules.get(idx) else {
            return Ok(LinkageResult::default());
        };

        let key = cache_key(rule, working);
        if let Some(result) = self.cache.get(&key) {
            trace!("cache hit for {}", rule.target);
            return Ok(result);
        }
        trace!("cache miss for {}", rule.target);

        let result = self.evaluate_rule(rule, working)?;
        self.cache.put(key, result.clone());
        Ok(result)
    }

    fn evaluate_rule(&self, rule: &InstantiatedRule, working: &Value) -> Result<LinkageResult, EngineError> {
        let matched = match (&rule.rule.when, &rule.condition) {
            (None, _) => true,
            (Some(When::Condition(_)), Some(condition)) => condition.evaluate(working),
            (Some(When::Condition(_)), None) => false,
            (Some(When::Function(name)), _) => {
                match self.call(name, rule, working)? {
                    Value::Bool(b) => b,
                    v => !v.is_absent(),
                }
            }
        };

        let fulfill = &rule.rule.fulfill;
        let (effect, from) = if matched {
            (Some(fulfill), &rule.fulfill_from)
        } else {
            (rule.rule.otherwise.as_ref(), &rule.otherwise_from)
        };

        let mut result = LinkageResult::default();
        match rule.rule.kind {
            kind if kind.is_state() => {
                let state = match (matched, effect) {
                    (true, _) => fulfill.state.unwrap_or(true),
                    (false, Some(Effect { state: Some(s), .. })) => *s,
                    (false, _) => !fulfill.state.unwrap_or(true),
                };
                match kind {
                    RuleKind::Visibility => result.visible = Some(state),
                    RuleKind::Disabled => result.disabled = Some(state),
                    _ => result.readonly = Some(state),
                }
            }
            RuleKind::Value => {
                if let Some(effect) = effect {
                    result.value = if let Some(name) = &effect.function {
                        Some(self.call(name, rule, working)?)
                    } else if let Some(from) = from {
                        Some(match working.lookup(from) {
                            Value::Undefined => Value::Null,
                            v => v,
                        })
                    } else {
                        effect.value.clone()
                    };
                }
            }
            _ => {
                if let Some(effect) = effect {
                    result.options = Some(if let Some(name) = &effect.function {
                        OptionItem::list_from_value(&self.call(name, rule, working)?)
                    } else if let Some(from) = from {
                        OptionItem::list_from_value(&working.lookup(from))
                    } else {
                        effect.options.clone()
                    });
                }
            }
        }

        Ok(result)
    }

    fn call(&self, name: &str, rule: &InstantiatedRule, working: &Value) -> Result<Value, EngineError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| EngineError::UnknownFunction(name.to_string()))?;
        let ctx = FunctionContext {
            target: &rule.target,
            snapshot: working,
            dependencies: &rule.dependencies,
        };
        function(&ctx).map_err(|e| EngineError::Function {
            name: name.to_string(),
            path: rule.target.to_string(),
            message: e.to_string(),
        })
    }
}

/// Builds the cache key of `rule` evaluated against `snapshot`.
///
/// Dependencies are keyed by template path, so that elements of the same
/// array whose dependencies hold equal values share an entry. Dependencies
/// the target sits inside keep their indices. Rules calling functions are
/// also keyed by their concrete target, since functions see the location.
fn cache_key(rule: &InstantiatedRule, snapshot: &Value) -> String {
    let mut pairs: Vec<(String, String)> = rule
        .dependencies
        .iter()
        .map(|dependency| {
            let path = if rule.target.starts_with(dependency) {
                dependency.to_string()
            } else {
                dependency.to_template().to_string()
            };
            let value = match snapshot.lookup(dependency) {
                Value::Undefined => "undefined".to_string(),
                v => v.to_string(),
            };
            (path, value)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut key = format!("{}|{}|{}", rule.rule.kind, rule.origin, rule.template);
    if !rule.rule.functions().is_empty() {
        key.push('|');
        key.push_str(&rule.target.to_string());
    }
    for (path, value) in pairs {
        key.push('|');
        key.push_str(&path);
        key.push('=');
        key.push_str(&value);
    }
    key
}
