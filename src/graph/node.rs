//! Defines the `Node` sum type: one typed unit of work per query definition.
//!
//! Nodes are built once per request from their `QueryDefinition` and are
//! immutable afterwards. Each variant knows which ref ids it needs and how to
//! turn the published results of those dependencies into its own results.

use crate::classic::{ClassicConditions, ClassicError};
use crate::compute::engine::RawQueryExecutor;
use crate::compute::expr::{ExprError, Expression};
use crate::compute::ledger::{ComputationError, Number, Results, Value, Vars};
use crate::config::EngineConfig;
use crate::functions::resample::{self, Upsampler};
use crate::functions::FunctionCatalog;
use crate::store::query::{ClassicModel, MathModel, ReduceMode, ReduceModel, ResampleModel};
use crate::store::{QueryDefinition, RefId, TimeRange};
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use smallvec::{smallvec, SmallVec};
use std::fmt;
use thiserror::Error;

/// Construction failures. Every variant names the offending ref id.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("failed to parse model of '{ref_id}': {message}")]
    Model { ref_id: RefId, message: String },
    #[error("expression '{ref_id}' has no type")]
    MissingType { ref_id: RefId },
    #[error("expression type '{kind}' of '{ref_id}' is not recognized")]
    UnknownType { ref_id: RefId, kind: String },
    #[error("failed to parse math expression of '{ref_id}': {source}")]
    Expression {
        ref_id: RefId,
        #[source]
        source: ExprError,
    },
    #[error("'{ref_id}' must name exactly one input query")]
    EmptyInput { ref_id: RefId },
    #[error("'{ref_id}' uses unknown reducer '{name}'")]
    UnknownReducer { ref_id: RefId, name: String },
    #[error("reduce '{ref_id}' uses replaceNN mode without replaceWithValue")]
    MissingReplaceValue { ref_id: RefId },
    #[error("resample '{ref_id}' has invalid window '{window}'")]
    InvalidWindow { ref_id: RefId, window: String },
    #[error("resample '{ref_id}': {message}")]
    InvalidUpsampler { ref_id: RefId, message: String },
    #[error("resample '{ref_id}': {source}")]
    ResampleGrid {
        ref_id: RefId,
        #[source]
        source: ComputationError,
    },
    #[error("classic condition '{ref_id}': {source}")]
    Classic {
        ref_id: RefId,
        #[source]
        source: ClassicError,
    },
    #[error("'{ref_id}' is an expression but expressions are disabled")]
    ExpressionsDisabled { ref_id: RefId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    DataSource,
    Math,
    Reduce,
    Resample,
    ClassicConditions,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::DataSource => "data source query",
            NodeKind::Math => "math expression",
            NodeKind::Reduce => "reduce expression",
            NodeKind::Resample => "resample expression",
            NodeKind::ClassicConditions => "classic condition",
        };
        f.write_str(s)
    }
}

/// What is sent to the raw-query capability. The model is passed through as is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceQuery {
    pub ref_id: RefId,
    pub datasource_uid: String,
    pub model: serde_json::Value,
    pub time_range: Option<TimeRange>,
    pub max_data_points: i64,
    pub interval_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceNode {
    pub query: DataSourceQuery,
}

impl DataSourceNode {
    pub async fn execute(&self, raw: &dyn RawQueryExecutor) -> Result<Results, ComputationError> {
        Ok(raw.execute(&self.query).await?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MathNode {
    pub ref_id: RefId,
    pub expression: Expression,
}

impl MathNode {
    pub fn execute(&self, vars: &Vars) -> Result<Results, ComputationError> {
        self.expression.execute(&self.ref_id, vars)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReduceNode {
    pub ref_id: RefId,
    pub input: RefId,
    pub reducer: String,
    pub mode: ReduceMode,
    pub replace_with: f64,
}

impl ReduceNode {
    pub fn execute(&self, vars: &Vars, catalog: &FunctionCatalog) -> Result<Results, ComputationError> {
        let reduce = catalog
            .reducer(&self.reducer)
            .ok_or_else(|| ComputationError::UnknownReducer(self.reducer.clone()))?;

        let mut values = Vec::new();
        for value in vars.require(&self.input)?.iter() {
            let mut number = match value {
                Value::Series(s) => Number::new(&self.ref_id, s.labels.clone(), reduce(&s.points)),
                // Already a single value: reducing is a no-op.
                Value::Number(n) => Number::new(&self.ref_id, n.labels.clone(), n.value),
                Value::Scalar(_) => return Err(ComputationError::InvalidReduceInput { kind: value.kind() }),
            };
            let is_number = number.value.is_some_and(|v| !v.is_nan());
            match self.mode {
                ReduceMode::Strict => {}
                ReduceMode::DropNonNumbers if !is_number => continue,
                ReduceMode::ReplaceNonNumbers if !is_number => number.value = Some(self.replace_with),
                _ => {}
            }
            values.push(Value::Number(number));
        }
        Ok(Results::new(values))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResampleNode {
    pub ref_id: RefId,
    pub input: RefId,
    pub window: Duration,
    pub downsampler: String,
    pub upsampler: Upsampler,
    pub time_range: Option<TimeRange>,
}

impl ResampleNode {
    pub fn execute(&self, vars: &Vars, catalog: &FunctionCatalog) -> Result<Results, ComputationError> {
        let range = self.time_range.ok_or(ComputationError::MissingTimeRange)?;
        let downsampler = catalog
            .reducer(&self.downsampler)
            .ok_or_else(|| ComputationError::UnknownReducer(self.downsampler.clone()))?;

        let mut values = Vec::new();
        for value in vars.require(&self.input)?.iter() {
            let Value::Series(series) = value else {
                return Err(ComputationError::InvalidResampleInput { kind: value.kind() });
            };
            let out = resample::resample(series, self.window, downsampler, self.upsampler, range)?;
            values.push(Value::Series(out).renamed(&self.ref_id));
        }
        Ok(Results::new(values))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassicConditionNode {
    pub ref_id: RefId,
    pub conditions: ClassicConditions,
}

impl ClassicConditionNode {
    pub fn execute(&self, vars: &Vars, catalog: &FunctionCatalog) -> Result<Results, ComputationError> {
        self.conditions.execute(&self.ref_id, vars, catalog)
    }
}

/// One node of the dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    DataSource(DataSourceNode),
    Math(MathNode),
    Reduce(ReduceNode),
    Resample(ResampleNode),
    ClassicConditions(ClassicConditionNode),
}

impl Node {
    pub fn ref_id(&self) -> &str {
        match self {
            Node::DataSource(n) => &n.query.ref_id,
            Node::Math(n) => &n.ref_id,
            Node::Reduce(n) => &n.ref_id,
            Node::Resample(n) => &n.ref_id,
            Node::ClassicConditions(n) => &n.ref_id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::DataSource(_) => NodeKind::DataSource,
            Node::Math(_) => NodeKind::Math,
            Node::Reduce(_) => NodeKind::Reduce,
            Node::Resample(_) => NodeKind::Resample,
            Node::ClassicConditions(_) => NodeKind::ClassicConditions,
        }
    }

    /// The ref ids this node reads, deduplicated, in order of first mention.
    pub fn needs(&self) -> SmallVec<[RefId; 2]> {
        match self {
            Node::DataSource(_) => SmallVec::new(),
            Node::Math(n) => n.expression.vars().iter().cloned().collect(),
            Node::Reduce(n) => smallvec![n.input.clone()],
            Node::Resample(n) => smallvec![n.input.clone()],
            Node::ClassicConditions(n) => {
                let mut needs: SmallVec<[RefId; 2]> = SmallVec::new();
                for c in &n.conditions.conditions {
                    if !needs.contains(&c.query_ref_id) {
                        needs.push(c.query_ref_id.clone());
                    }
                }
                needs
            }
        }
    }

    /// Runs a node that only reads `Vars`. Data-source nodes go through
    /// [`DataSourceNode::execute`] instead.
    pub fn execute_expression(&self, vars: &Vars, catalog: &FunctionCatalog) -> Result<Results, ComputationError> {
        match self {
            Node::Math(n) => n.execute(vars),
            Node::Reduce(n) => n.execute(vars, catalog),
            Node::Resample(n) => n.execute(vars, catalog),
            Node::ClassicConditions(n) => n.execute(vars, catalog),
            Node::DataSource(n) => Err(ComputationError::NotAnExpression(n.query.ref_id.clone())),
        }
    }
}

/// Turns query definitions into nodes.
pub struct NodeBuilder<'a> {
    catalog: &'a FunctionCatalog,
    config: &'a EngineConfig,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(catalog: &'a FunctionCatalog, config: &'a EngineConfig) -> Self {
        Self { catalog, config }
    }

    pub fn build(&self, def: &QueryDefinition) -> Result<Node, ParseError> {
        let ref_id = &def.ref_id;
        if !def.is_expression() {
            return Ok(Node::DataSource(DataSourceNode {
                query: DataSourceQuery {
                    ref_id: ref_id.clone(),
                    datasource_uid: def.datasource_uid.clone(),
                    model: def.model.clone(),
                    time_range: def.time_range,
                    max_data_points: def.max_data_points.unwrap_or(self.config.default_max_data_points),
                    interval_ms: def.interval_ms.unwrap_or(self.config.default_interval_ms),
                },
            }));
        }

        if !self.config.expressions_enabled {
            return Err(ParseError::ExpressionsDisabled { ref_id: ref_id.clone() });
        }

        match def.expression_type() {
            Some("math") => self.build_math(def),
            Some("reduce") => self.build_reduce(def),
            Some("resample") => self.build_resample(def),
            Some("classic_conditions") => self.build_classic(def),
            Some(other) => Err(ParseError::UnknownType { ref_id: ref_id.clone(), kind: other.to_string() }),
            None => Err(ParseError::MissingType { ref_id: ref_id.clone() }),
        }
    }

    fn build_math(&self, def: &QueryDefinition) -> Result<Node, ParseError> {
        let model: MathModel = parse_model(def)?;
        let expression = Expression::parse(&model.expression)
            .map_err(|source| ParseError::Expression { ref_id: def.ref_id.clone(), source })?;
        Ok(Node::Math(MathNode { ref_id: def.ref_id.clone(), expression }))
    }

    fn build_reduce(&self, def: &QueryDefinition) -> Result<Node, ParseError> {
        let model: ReduceModel = parse_model(def)?;
        let input = input_ref(&def.ref_id, &model.expression)?;
        self.require_reducer(&def.ref_id, &model.reducer)?;

        let (mode, replace) = model.settings.map(|s| (s.mode, s.replace_with_value)).unwrap_or_default();
        let replace_with = match (mode, replace) {
            (ReduceMode::ReplaceNonNumbers, None) => {
                return Err(ParseError::MissingReplaceValue { ref_id: def.ref_id.clone() })
            }
            (_, value) => value.unwrap_or(f64::NAN),
        };

        Ok(Node::Reduce(ReduceNode { ref_id: def.ref_id.clone(), input, reducer: model.reducer, mode, replace_with }))
    }

    fn build_resample(&self, def: &QueryDefinition) -> Result<Node, ParseError> {
        let model: ResampleModel = parse_model(def)?;
        let input = input_ref(&def.ref_id, &model.expression)?;
        let window = resample::parse_window(&model.window)
            .ok_or_else(|| ParseError::InvalidWindow { ref_id: def.ref_id.clone(), window: model.window.clone() })?;
        self.require_reducer(&def.ref_id, &model.downsampler)?;
        let upsampler = model
            .upsampler
            .parse::<Upsampler>()
            .map_err(|message| ParseError::InvalidUpsampler { ref_id: def.ref_id.clone(), message })?;
        if let Some(range) = def.time_range {
            // A range shorter than the window is only reported when the node runs.
            if let Err(source @ ComputationError::ResampleTooManyPoints { .. }) = resample::slot_count(window, range) {
                return Err(ParseError::ResampleGrid { ref_id: def.ref_id.clone(), source });
            }
        }

        Ok(Node::Resample(ResampleNode {
            ref_id: def.ref_id.clone(),
            input,
            window,
            downsampler: model.downsampler,
            upsampler,
            time_range: def.time_range,
        }))
    }

    fn build_classic(&self, def: &QueryDefinition) -> Result<Node, ParseError> {
        let model: ClassicModel = parse_model(def)?;
        let conditions = ClassicConditions::from_model(model, self.catalog)
            .map_err(|source| ParseError::Classic { ref_id: def.ref_id.clone(), source })?;
        Ok(Node::ClassicConditions(ClassicConditionNode { ref_id: def.ref_id.clone(), conditions }))
    }

    fn require_reducer(&self, ref_id: &str, name: &str) -> Result<(), ParseError> {
        if self.catalog.has_reducer(name) {
            Ok(())
        } else {
            Err(ParseError::UnknownReducer { ref_id: ref_id.to_string(), name: name.to_string() })
        }
    }
}

fn parse_model<T: DeserializeOwned>(def: &QueryDefinition) -> Result<T, ParseError> {
    serde_json::from_value(def.model.clone())
        .map_err(|e| ParseError::Model { ref_id: def.ref_id.clone(), message: e.to_string() })
}

/// Accepts `B`, `$B` and `${B}` for the single input of reduce and resample.
fn input_ref(ref_id: &str, expression: &str) -> Result<RefId, ParseError> {
    let trimmed = expression.trim();
    let name = trimmed
        .strip_prefix("${")
        .and_then(|s| s.strip_suffix('}'))
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed)
        .trim();
    if name.is_empty() {
        return Err(ParseError::EmptyInput { ref_id: ref_id.to_string() });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ledger::Series;
    use crate::store::{Labels, Point};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn build(def: QueryDefinition) -> Result<Node, ParseError> {
        let catalog = FunctionCatalog::with_defaults();
        let config = EngineConfig::default();
        NodeBuilder::new(&catalog, &config).build(&def)
    }

    #[test]
    fn test_dispatch_on_datasource_and_type() {
        let ds = build(QueryDefinition::new("A", "prometheus", json!({ "expr": "up" }))).unwrap();
        assert_eq!(ds.kind(), NodeKind::DataSource);
        assert!(ds.needs().is_empty());
        if let Node::DataSource(n) = &ds {
            assert_eq!(n.query.max_data_points, 100);
            assert_eq!(n.query.interval_ms, 1000);
            assert_eq!(n.query.model, json!({ "expr": "up" }));
        }

        let math = build(QueryDefinition::expression("B", json!({ "type": "math", "expression": "$A + ${C D}" }))).unwrap();
        assert_eq!(math.kind(), NodeKind::Math);
        assert_eq!(math.needs().as_slice(), &["A".to_string(), "C D".to_string()]);

        let reduce =
            build(QueryDefinition::expression("R", json!({ "type": "reduce", "expression": "$A", "reducer": "mean" })))
                .unwrap();
        assert_eq!(reduce.needs().as_slice(), &["A".to_string()]);
    }

    #[test]
    fn test_construction_errors_name_ref_id() {
        let err = build(QueryDefinition::expression("A", json!({ "expression": "1" }))).unwrap_err();
        assert_eq!(err, ParseError::MissingType { ref_id: "A".into() });

        let err = build(QueryDefinition::expression("A", json!({ "type": "sql" }))).unwrap_err();
        assert_eq!(err, ParseError::UnknownType { ref_id: "A".into(), kind: "sql".into() });

        let err = build(QueryDefinition::expression("A", json!({ "type": "math" }))).unwrap_err();
        assert!(matches!(err, ParseError::Model { ref ref_id, .. } if ref_id == "A"));

        let err = build(QueryDefinition::expression("A", json!({ "type": "math", "expression": "1 +" }))).unwrap_err();
        assert!(err.to_string().contains("'A'"));

        let err =
            build(QueryDefinition::expression("A", json!({ "type": "reduce", "expression": "B", "reducer": "p42" })))
                .unwrap_err();
        assert_eq!(err, ParseError::UnknownReducer { ref_id: "A".into(), name: "p42".into() });

        let err = build(QueryDefinition::expression(
            "A",
            json!({ "type": "resample", "expression": "B", "window": "soon", "downsampler": "mean", "upsampler": "pad" }),
        ))
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidWindow { .. }));

        let err = build(QueryDefinition::expression(
            "A",
            json!({ "type": "reduce", "expression": "B", "reducer": "mean", "settings": { "mode": "replaceNN" } }),
        ))
        .unwrap_err();
        assert_eq!(err, ParseError::MissingReplaceValue { ref_id: "A".into() });
    }

    #[test]
    fn test_resample_window_bounds() {
        let model = |window: &str| {
            json!({ "type": "resample", "expression": "B", "window": window, "downsampler": "last", "upsampler": "pad" })
        };
        let err = build(QueryDefinition::expression("S", model("9999999999999999s"))).unwrap_err();
        assert_eq!(err, ParseError::InvalidWindow { ref_id: "S".into(), window: "9999999999999999s".into() });

        let decades = TimeRange {
            from: Utc.timestamp_opt(0, 0).unwrap(),
            to: Utc.timestamp_opt(30 * 365 * 24 * 3600, 0).unwrap(),
        };
        let err = build(QueryDefinition::expression("S", model("1ms")).with_time_range(decades)).unwrap_err();
        assert!(matches!(err, ParseError::ResampleGrid { ref ref_id, .. } if ref_id == "S"));

        let hour = TimeRange { from: Utc.timestamp_opt(0, 0).unwrap(), to: Utc.timestamp_opt(3600, 0).unwrap() };
        assert!(build(QueryDefinition::expression("S", model("1m")).with_time_range(hour)).is_ok());
    }

    #[test]
    fn test_expressions_disabled() {
        let catalog = FunctionCatalog::with_defaults();
        let config = EngineConfig { expressions_enabled: false, ..Default::default() };
        let builder = NodeBuilder::new(&catalog, &config);
        let err = builder.build(&QueryDefinition::expression("A", json!({ "type": "math", "expression": "1" })));
        assert_eq!(err.unwrap_err(), ParseError::ExpressionsDisabled { ref_id: "A".into() });
        assert!(builder.build(&QueryDefinition::new("B", "prom", json!({}))).is_ok());
    }

    #[test]
    fn test_input_ref_forms() {
        assert_eq!(input_ref("R", "B").unwrap(), "B");
        assert_eq!(input_ref("R", "$B").unwrap(), "B");
        assert_eq!(input_ref("R", "${B C}").unwrap(), "B C");
        assert!(input_ref("R", " $ ").is_err());
    }

    #[test]
    fn test_reduce_modes() {
        let catalog = FunctionCatalog::with_defaults();
        let t0 = Utc.timestamp_opt(0, 0).unwrap();
        let mut vars = Vars::new();
        vars.publish(
            "A",
            Results::new(vec![
                Value::Series(Series::new("a", Labels::new(), vec![Point::new(t0, Some(4.0))])),
                Value::Series(Series::new("b", Labels::new(), vec![Point::new(t0, None)])),
            ]),
        )
        .unwrap();

        let node = |mode, replace_with| ReduceNode {
            ref_id: "R".into(),
            input: "A".into(),
            reducer: "mean".into(),
            mode,
            replace_with,
        };

        let strict = node(ReduceMode::Strict, f64::NAN).execute(&vars, &catalog).unwrap();
        assert_eq!(strict.len(), 2);
        assert_eq!(strict.values[1].as_number().unwrap().value, None);
        assert_eq!(strict.values[0].name(), "R");

        let dropped = node(ReduceMode::DropNonNumbers, f64::NAN).execute(&vars, &catalog).unwrap();
        assert_eq!(dropped.len(), 1);

        let replaced = node(ReduceMode::ReplaceNonNumbers, -1.0).execute(&vars, &catalog).unwrap();
        assert_eq!(replaced.values[1].as_number().unwrap().value, Some(-1.0));
    }

    #[test]
    fn test_datasource_is_not_evaluated_locally() {
        let node = build(QueryDefinition::new("A", "prom", json!({}))).unwrap();
        let err = node.execute_expression(&Vars::new(), &FunctionCatalog::with_defaults()).unwrap_err();
        assert_eq!(err, ComputationError::NotAnExpression("A".into()));
    }

    #[test]
    fn test_reduce_rejects_scalars() {
        let catalog = FunctionCatalog::with_defaults();
        let mut vars = Vars::new();
        vars.publish("A", Results::single(Value::Scalar(1.0))).unwrap();
        let node = ReduceNode {
            ref_id: "R".into(),
            input: "A".into(),
            reducer: "mean".into(),
            mode: ReduceMode::Strict,
            replace_with: f64::NAN,
        };
        let err = node.execute(&vars, &catalog).unwrap_err();
        assert!(err.to_string().contains("can only reduce type series"));
    }
}
