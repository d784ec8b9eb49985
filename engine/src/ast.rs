//! Parse-tree contract.
//!
//! The external parser hands the engine one [`Expr`] per language construct.
//! The tree is plain data and deserializes from JSON, for example:
//!
//! ```json
//! {
//!   "type": "clause",
//!   "dataset": { "type": "variable", "name": "ds" },
//!   "clause": { "type": "filter", "condition": {
//!     "type": "comparison", "op": ">",
//!     "left":  { "type": "variable", "name": "long1" },
//!     "right": { "type": "constant", "value": 15 }
//!   }}
//! }
//! ```
//!
//! Spans are optional in JSON and default to `0..0`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::loader::DatasetSource;
use crate::model::{
    AggregateFunction, AnalyticFunction, Component, DataStructure, Order, Role, Span,
    ValidationOutput, Value, ValueType, WindowFrame,
};

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "not")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "<>", alias = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryNumericOp {
    Ceil,
    Floor,
    Abs,
    Exp,
    Ln,
    Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingOp {
    Round,
    Trunc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryNumericOp {
    Mod,
    Power,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Full,
    Cross,
}

// =============================================================================
// Expressions
// =============================================================================

/// A positioned expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExprKind {
    Constant {
        value: Value,
    },
    Variable {
        name: String,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Concat {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Boolean {
        op: BooleanOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `operand in {..}` / `operand not in {..}`.
    In {
        operand: Box<Expr>,
        list: Vec<Expr>,
        #[serde(default)]
        negated: bool,
    },
    UnaryNumeric {
        op: UnaryNumericOp,
        operand: Box<Expr>,
    },
    Rounding {
        op: RoundingOp,
        operand: Box<Expr>,
        #[serde(default)]
        digits: Option<Box<Expr>>,
    },
    BinaryNumeric {
        op: BinaryNumericOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Generic call resolved through the function registry.
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        #[serde(rename = "else")]
        otherwise: Box<Expr>,
    },
    Nvl {
        operand: Box<Expr>,
        default: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        target: ValueType,
    },
    /// `dataset#component`.
    Membership {
        dataset: Box<Expr>,
        component: String,
    },
    /// A dataset followed by one structural clause.
    Clause {
        dataset: Box<Expr>,
        clause: Box<Clause>,
    },
    Join {
        kind: JoinKind,
        operands: Vec<JoinOperand>,
        #[serde(default)]
        using: Option<Vec<String>>,
    },
    Union {
        operands: Vec<Expr>,
    },
    /// Window function; only legal as the body of a `calc` item.
    Analytic {
        function: AnalyticFunction,
        #[serde(default)]
        operand: Option<String>,
        #[serde(default)]
        offset: Option<i64>,
        #[serde(default)]
        partition_by: Vec<String>,
        #[serde(default)]
        order_by: Vec<OrderItem>,
        #[serde(default)]
        frame: Option<WindowFrame>,
    },
    CheckDatapoint {
        dataset: Box<Expr>,
        ruleset: String,
        #[serde(default)]
        output: Option<ValidationOutput>,
    },
    Check {
        operand: Box<Expr>,
        #[serde(default)]
        error_code: Option<Box<Expr>>,
        #[serde(default)]
        error_level: Option<Box<Expr>>,
        #[serde(default)]
        imbalance: Option<Box<Expr>>,
        #[serde(default)]
        output: Option<ValidationOutput>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub column: String,
    #[serde(default)]
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinOperand {
    pub expr: Expr,
    #[serde(default)]
    pub alias: Option<String>,
}

// =============================================================================
// Clauses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Clause {
    Keep {
        columns: Vec<String>,
    },
    Drop {
        columns: Vec<String>,
    },
    Calc {
        items: Vec<CalcItem>,
    },
    Filter {
        condition: Expr,
    },
    Rename {
        items: Vec<RenameItem>,
    },
    Aggregate {
        items: Vec<AggregateItem>,
        #[serde(default)]
        grouping: Option<Grouping>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcItem {
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
    pub expr: Expr,
    /// Script text of `expr`, forwarded to backends that push it down.
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameItem {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateItem {
    pub name: String,
    pub function: AggregateFunction,
    #[serde(default)]
    pub operand: Option<Expr>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grouping {
    GroupBy { columns: Vec<String> },
    GroupExcept { columns: Vec<String> },
}

// =============================================================================
// Statements and programs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    /// `name := expr`.
    Assignment {
        name: String,
        expr: Expr,
    },
    DefineDatapointRuleset {
        name: String,
        variables: Vec<RulesetVariable>,
        rules: Vec<RuleDefinition>,
        #[serde(default)]
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetVariable {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(default)]
    pub name: Option<String>,
    /// Antecedent.
    #[serde(default)]
    pub when: Option<Expr>,
    /// Consequent.
    pub then: Expr,
    #[serde(default)]
    pub error_code: Option<Expr>,
    #[serde(default)]
    pub error_level: Option<Expr>,
    #[serde(default)]
    pub span: Span,
}

/// Input document of the CLI: named dataset sources and statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Program {
    #[serde(default)]
    pub datasets: IndexMap<String, DatasetSource>,
    pub statements: Vec<Statement>,
}

// =============================================================================
// Constructors
// =============================================================================

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::new(ExprKind::Constant {
            value: value.into(),
        })
    }

    pub fn null() -> Self {
        Self::new(ExprKind::Constant { value: Value::Null })
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Variable { name: name.into() })
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn comparison(op: ComparisonOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn boolean(op: BooleanOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Boolean {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            name: name.into(),
            args,
        })
    }

    pub fn clause(dataset: Expr, clause: Clause) -> Self {
        Self::new(ExprKind::Clause {
            dataset: Box::new(dataset),
            clause: Box::new(clause),
        })
    }

    /// Name of the variable this expression reads, if it is a bare reference.
    pub fn as_variable(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Variable { name } => Some(name),
            _ => None,
        }
    }
}

impl Program {
    /// A small program exercising clauses, aggregation and validation.
    ///
    /// ```text
    /// res    := ds1[keep id, long1][filter long1 > 15];
    /// totals := ds1[aggregate total := sum(long1), n := count() group by bool1];
    /// define datapoint ruleset dpr (variable long1 as x) {
    ///     positive: x > 15 errorcode "too small" errorlevel 2
    /// };
    /// checked := check_datapoint(ds1, dpr all);
    /// ```
    pub fn example() -> Self {
        let mut structure = DataStructure::default();
        structure.upsert(Component::identifier("id", ValueType::String));
        structure.upsert(Component::measure("long1", ValueType::Int64));
        structure.upsert(Component::measure("bool1", ValueType::Boolean));
        let rows = [("Toto", 30, true), ("Hadrien", 10, false), ("Nico", 20, false), ("Franck", 100, true)]
            .iter()
            .map(|(id, long1, bool1)| serde_json::json!([id, long1, bool1]))
            .collect();
        let mut datasets = IndexMap::new();
        datasets.insert(
            "ds1".to_string(),
            DatasetSource {
                structure,
                csv: None,
                rows: Some(rows),
            },
        );

        let long1_gt_15 = Expr::comparison(ComparisonOp::Gt, Expr::var("long1"), Expr::constant(15i64));
        let kept = Expr::clause(
            Expr::var("ds1"),
            Clause::Keep {
                columns: vec!["id".to_string(), "long1".to_string()],
            },
        );
        let aggregate = |name: &str, function, operand: Option<Expr>| AggregateItem {
            name: name.to_string(),
            function,
            operand,
            role: None,
            source: None,
            span: Span::default(),
        };

        let statements = vec![
            Statement::Assignment {
                name: "res".to_string(),
                expr: Expr::clause(kept, Clause::Filter { condition: long1_gt_15 }),
            },
            Statement::Assignment {
                name: "totals".to_string(),
                expr: Expr::clause(
                    Expr::var("ds1"),
                    Clause::Aggregate {
                        items: vec![
                            aggregate("total", AggregateFunction::Sum, Some(Expr::var("long1"))),
                            aggregate("n", AggregateFunction::Count, None),
                        ],
                        grouping: Some(Grouping::GroupBy {
                            columns: vec!["bool1".to_string()],
                        }),
                    },
                ),
            },
            Statement::DefineDatapointRuleset {
                name: "dpr".to_string(),
                variables: vec![RulesetVariable {
                    name: "long1".to_string(),
                    alias: Some("x".to_string()),
                }],
                rules: vec![RuleDefinition {
                    name: Some("positive".to_string()),
                    when: None,
                    then: Expr::comparison(ComparisonOp::Gt, Expr::var("x"), Expr::constant(15i64)),
                    error_code: Some(Expr::constant("too small")),
                    error_level: Some(Expr::constant(2i64)),
                    span: Span::default(),
                }],
                span: Span::default(),
            },
            Statement::Assignment {
                name: "checked".to_string(),
                expr: Expr::new(ExprKind::CheckDatapoint {
                    dataset: Box::new(Expr::var("ds1")),
                    ruleset: "dpr".to_string(),
                    output: Some(ValidationOutput::All),
                }),
            },
        ];
        Program {
            datasets,
            statements,
        }
    }
}

// =============================================================================
// Script text
// =============================================================================

fn join_display<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Plus => "+",
            ArithmeticOp::Minus => "-",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinKind::Inner => "inner_join",
            JoinKind::Left => "left_join",
            JoinKind::Full => "full_join",
            JoinKind::Cross => "cross_join",
        };
        write!(f, "{}", name)
    }
}

fn lower_debug<T: fmt::Debug>(value: &T) -> String {
    format!("{:?}", value).to_lowercase()
}

/// Renders the expression back as script text.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant { value } => write!(f, "{}", value),
            ExprKind::Variable { name } => write!(f, "{}", name),
            ExprKind::Arithmetic { op, left, right } => write!(f, "{} {} {}", left, op, right),
            ExprKind::Concat { left, right } => write!(f, "{} || {}", left, right),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Plus => write!(f, "+{}", operand),
                UnaryOp::Minus => write!(f, "-{}", operand),
                UnaryOp::Not => write!(f, "not {}", operand),
            },
            ExprKind::Boolean { op, left, right } => {
                write!(f, "{} {} {}", left, lower_debug(op), right)
            }
            ExprKind::Comparison { op, left, right } => write!(f, "{} {} {}", left, op, right),
            ExprKind::In {
                operand,
                list,
                negated,
            } => {
                let keyword = if *negated { "not in" } else { "in" };
                write!(f, "{} {} {{{}}}", operand, keyword, join_display(list, ", "))
            }
            ExprKind::UnaryNumeric { op, operand } => {
                write!(f, "{}({})", lower_debug(op), operand)
            }
            ExprKind::Rounding {
                op,
                operand,
                digits,
            } => match digits {
                Some(d) => write!(f, "{}({}, {})", lower_debug(op), operand, d),
                None => write!(f, "{}({})", lower_debug(op), operand),
            },
            ExprKind::BinaryNumeric { op, left, right } => {
                write!(f, "{}({}, {})", lower_debug(op), left, right)
            }
            ExprKind::Call { name, args } => write!(f, "{}({})", name, join_display(args, ", ")),
            ExprKind::If {
                condition,
                then,
                otherwise,
            } => write!(f, "if {} then {} else {}", condition, then, otherwise),
            ExprKind::Nvl { operand, default } => write!(f, "nvl({}, {})", operand, default),
            ExprKind::Cast { operand, target } => write!(f, "cast({}, {})", operand, target),
            ExprKind::Membership { dataset, component } => write!(f, "{}#{}", dataset, component),
            ExprKind::Clause { dataset, clause } => write!(f, "{}[{}]", dataset, clause),
            ExprKind::Join {
                kind,
                operands,
                using,
            } => {
                let operands: Vec<String> = operands
                    .iter()
                    .map(|o| match &o.alias {
                        Some(alias) => format!("{} as {}", o.expr, alias),
                        None => o.expr.to_string(),
                    })
                    .collect();
                write!(f, "{}({}", kind, operands.join(", "))?;
                if let Some(using) = using {
                    write!(f, " using {}", using.join(", "))?;
                }
                write!(f, ")")
            }
            ExprKind::Union { operands } => write!(f, "union({})", join_display(operands, ", ")),
            ExprKind::Analytic {
                function,
                operand,
                offset,
                partition_by,
                order_by,
                ..
            } => {
                write!(f, "{}(", function)?;
                if let Some(operand) = operand {
                    write!(f, "{}", operand)?;
                }
                if let Some(offset) = offset {
                    write!(f, ", {}", offset)?;
                }
                write!(f, " over (")?;
                if !partition_by.is_empty() {
                    write!(f, "partition by {}", partition_by.join(", "))?;
                }
                if !order_by.is_empty() {
                    let order: Vec<String> = order_by
                        .iter()
                        .map(|o| format!("{} {}", o.column, lower_debug(&o.order)))
                        .collect();
                    write!(f, " order by {}", order.join(", "))?;
                }
                write!(f, "))")
            }
            ExprKind::CheckDatapoint {
                dataset, ruleset, ..
            } => write!(f, "check_datapoint({}, {})", dataset, ruleset),
            ExprKind::Check { operand, .. } => write!(f, "check({})", operand),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Keep { columns } => write!(f, "keep {}", columns.join(", ")),
            Clause::Drop { columns } => write!(f, "drop {}", columns.join(", ")),
            Clause::Calc { items } => {
                let items: Vec<String> = items
                    .iter()
                    .map(|i| format!("{} := {}", i.name, i.expr))
                    .collect();
                write!(f, "calc {}", items.join(", "))
            }
            Clause::Filter { condition } => write!(f, "filter {}", condition),
            Clause::Rename { items } => {
                let items: Vec<String> = items
                    .iter()
                    .map(|i| format!("{} to {}", i.from, i.to))
                    .collect();
                write!(f, "rename {}", items.join(", "))
            }
            Clause::Aggregate { items, grouping } => {
                let items: Vec<String> = items
                    .iter()
                    .map(|i| match &i.operand {
                        Some(operand) => format!("{} := {}({})", i.name, i.function, operand),
                        None => format!("{} := {}()", i.name, i.function),
                    })
                    .collect();
                write!(f, "aggr {}", items.join(", "))?;
                match grouping {
                    Some(Grouping::GroupBy { columns }) => {
                        write!(f, " group by {}", columns.join(", "))
                    }
                    Some(Grouping::GroupExcept { columns }) => {
                        write!(f, " group except {}", columns.join(", "))
                    }
                    None => Ok(()),
                }
            }
        }
    }
}
