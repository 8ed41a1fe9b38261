//! Request-level query definitions and the JSON models embedded in them.
//!
//! A definition is either a raw data-source query, whose model is opaque and
//! passed through untouched, or an expression, whose model carries a `type`
//! discriminator and the fields of that expression kind.

use super::types::{RefId, TimeRange};
use serde::{Deserialize, Serialize};

/// The fake datasource uid that marks a definition as an expression.
pub const EXPRESSION_DATASOURCE_UID: &str = "-100";

/// The datasource name that is accepted as an alias of the expression uid.
pub const EXPRESSION_DATASOURCE_NAME: &str = "__expr__";

/// One query or expression of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDefinition {
    pub ref_id: RefId,
    #[serde(rename = "datasourceUid")]
    pub datasource_uid: String,
    #[serde(default)]
    pub model: serde_json::Value,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub max_data_points: Option<i64>,
    #[serde(default)]
    pub interval_ms: Option<i64>,
}

impl QueryDefinition {
    pub fn new(ref_id: impl Into<RefId>, datasource_uid: impl Into<String>, model: serde_json::Value) -> Self {
        Self {
            ref_id: ref_id.into(),
            datasource_uid: datasource_uid.into(),
            model,
            time_range: None,
            max_data_points: None,
            interval_ms: None,
        }
    }

    /// Shorthand for an expression definition.
    pub fn expression(ref_id: impl Into<RefId>, model: serde_json::Value) -> Self {
        Self::new(ref_id, EXPRESSION_DATASOURCE_UID, model)
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn is_expression(&self) -> bool {
        self.datasource_uid == EXPRESSION_DATASOURCE_UID || self.datasource_uid == EXPRESSION_DATASOURCE_NAME
    }

    /// The embedded `type` discriminator, if any.
    pub fn expression_type(&self) -> Option<&str> {
        self.model.get("type").and_then(serde_json::Value::as_str)
    }
}

/// The flat list of definitions submitted for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub queries: Vec<QueryDefinition>,
}

impl Request {
    pub fn new(queries: Vec<QueryDefinition>) -> Self { Self { queries } }
}

// --- Expression models ---

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MathModel {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReduceModel {
    pub expression: String,
    pub reducer: String,
    #[serde(default)]
    pub settings: Option<ReduceSettings>,
}

/// How a reduce node treats results that are absent or NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ReduceMode {
    #[default]
    #[serde(rename = "")]
    Strict,
    #[serde(rename = "dropNN")]
    DropNonNumbers,
    #[serde(rename = "replaceNN")]
    ReplaceNonNumbers,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceSettings {
    #[serde(default)]
    pub mode: ReduceMode,
    #[serde(default)]
    pub replace_with_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResampleModel {
    pub expression: String,
    pub window: String,
    pub downsampler: String,
    pub upsampler: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassicModel {
    pub conditions: Vec<ConditionModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConditionModel {
    pub evaluator: EvaluatorModel,
    #[serde(default)]
    pub operator: Option<TypeTag>,
    pub query: QueryParams,
    pub reducer: TypeTag,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluatorModel {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypeTag {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub params: Vec<String>,
}
