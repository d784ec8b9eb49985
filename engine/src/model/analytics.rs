//! Analytic (window) function descriptors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::aggregation::AggregateFunction;
use super::types::ValueType;

/// Window functions. The aggregate-like ones reuse [`AggregateFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Median,
    StddevPop,
    StddevSamp,
    VarPop,
    VarSamp,
    FirstValue,
    LastValue,
    Lead,
    Lag,
    Rank,
    RatioToReport,
}

/// Shape of computation a window function needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticKind {
    /// Aggregate (or first/last value) over a frame.
    Simple,
    /// Value at a fixed row offset within the ordered partition.
    Offset,
    Rank,
    RatioToReport,
}

impl AnalyticFunction {
    pub fn kind(&self) -> AnalyticKind {
        match self {
            AnalyticFunction::Lead | AnalyticFunction::Lag => AnalyticKind::Offset,
            AnalyticFunction::Rank => AnalyticKind::Rank,
            AnalyticFunction::RatioToReport => AnalyticKind::RatioToReport,
            _ => AnalyticKind::Simple,
        }
    }

    /// Aggregate computed over the frame, if the function is one.
    pub fn aggregate(&self) -> Option<AggregateFunction> {
        Some(match self {
            AnalyticFunction::Count => AggregateFunction::Count,
            AnalyticFunction::Sum => AggregateFunction::Sum,
            AnalyticFunction::Min => AggregateFunction::Min,
            AnalyticFunction::Max => AggregateFunction::Max,
            AnalyticFunction::Avg => AggregateFunction::Avg,
            AnalyticFunction::Median => AggregateFunction::Median,
            AnalyticFunction::StddevPop => AggregateFunction::StddevPop,
            AnalyticFunction::StddevSamp => AggregateFunction::StddevSamp,
            AnalyticFunction::VarPop => AggregateFunction::VarPop,
            AnalyticFunction::VarSamp => AggregateFunction::VarSamp,
            _ => return None,
        })
    }

    /// Result type given the source column type (ignored by `Rank`).
    pub fn result_type(&self, source: &ValueType) -> ValueType {
        match self {
            AnalyticFunction::Rank => ValueType::Int64,
            AnalyticFunction::RatioToReport => ValueType::Float64,
            AnalyticFunction::FirstValue
            | AnalyticFunction::LastValue
            | AnalyticFunction::Lead
            | AnalyticFunction::Lag => source.clone(),
            other => other
                .aggregate()
                .map(|agg| agg.result_type(source))
                .unwrap_or_else(|| source.clone()),
        }
    }
}

impl fmt::Display for AnalyticFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticFunction::FirstValue => write!(f, "first_value"),
            AnalyticFunction::LastValue => write!(f, "last_value"),
            AnalyticFunction::Lead => write!(f, "lead"),
            AnalyticFunction::Lag => write!(f, "lag"),
            AnalyticFunction::Rank => write!(f, "rank"),
            AnalyticFunction::RatioToReport => write!(f, "ratio_to_report"),
            other => match other.aggregate() {
                Some(agg) => write!(f, "{}", agg),
                None => write!(f, "{:?}", other),
            },
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// One end of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "offset", rename_all = "snake_case")]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

impl FrameBound {
    /// Signed distance from the current row; `None` for unbounded.
    pub fn offset(&self) -> Option<i64> {
        match self {
            FrameBound::UnboundedPreceding | FrameBound::UnboundedFollowing => None,
            FrameBound::Preceding(n) => Some(-(*n as i64)),
            FrameBound::CurrentRow => Some(0),
            FrameBound::Following(n) => Some(*n as i64),
        }
    }
}

/// Explicit window frame: by row count, or by distance on the order value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowFrame {
    Rows { lower: FrameBound, upper: FrameBound },
    Range { lower: FrameBound, upper: FrameBound },
}

impl WindowFrame {
    pub fn bounds(&self) -> (FrameBound, FrameBound) {
        match self {
            WindowFrame::Rows { lower, upper } | WindowFrame::Range { lower, upper } => {
                (*lower, *upper)
            }
        }
    }
}

/// Partition, ordering and frame of a window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Window {
    pub partition_by: Vec<String>,
    pub order_by: IndexMap<String, Order>,
    pub frame: Option<WindowFrame>,
}

/// A fully described analytic computation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticSpec {
    pub function: AnalyticFunction,
    /// Source column; absent only for `Rank`.
    pub source: Option<String>,
    /// Row offset for `Lead`/`Lag`.
    pub offset: i64,
    pub window: Window,
}
