//! Function registry.
//!
//! Generic function calls (and the `if` and `nvl` constructs) are resolved by
//! matching the argument types against registered signatures:
//!
//! | Parameter | Accepts                                              |
//! |-----------|------------------------------------------------------|
//! | `Exact`   | exactly that type                                    |
//! | `Number`  | `Long` or `Double`                                   |
//! | `Generic` | any type, but every `Generic` slot must agree (`T`)  |
//!
//! The `null` literal matches every parameter. No coercion is applied: when no
//! signature matches, the call fails with `FunctionNotFound` naming the
//! attempted signature, e.g. `nvl(Long, String)`.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Mutex;

use crate::error::{EvalError, EvalResult};
use crate::model::{Bindings, ResolvableExpression, Span, Value, ValueType};

// =============================================================================
// Signatures
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Exact(ValueType),
    Number,
    Generic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Returns {
    Exact(ValueType),
    Generic,
}

type StrictFn = fn(&[Value]) -> Result<Value, String>;
type LazyFn = fn(&[ResolvableExpression], &dyn Bindings) -> EvalResult<Value>;
type PatternFn = fn(&str, &Regex) -> Value;

/// How a resolved call computes its value.
#[derive(Clone, Copy)]
pub enum Implementation {
    /// Arguments are evaluated first; with `propagates_null` any null
    /// argument short-circuits to null.
    Strict { f: StrictFn, propagates_null: bool },
    /// The function decides which arguments to evaluate.
    Lazy(LazyFn),
    /// `(subject, pattern)` with the pattern compiled once per call site and
    /// recompiled only when its value changes. Null arguments give null.
    Pattern(PatternFn),
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Strict { propagates_null, .. } => f
                .debug_struct("Strict")
                .field("propagates_null", propagates_null)
                .finish(),
            Implementation::Lazy(_) => write!(f, "Lazy"),
            Implementation::Pattern(_) => write!(f, "Pattern"),
        }
    }
}

/// A typed overload of a registered function.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub params: Vec<Param>,
    /// Leading parameters that must be supplied; the rest are optional.
    pub required: usize,
    pub returns: Returns,
    pub implementation: Implementation,
}

impl FunctionSignature {
    fn strict(name: &'static str, params: Vec<Param>, returns: ValueType, f: StrictFn) -> Self {
        Self {
            name,
            required: params.len(),
            params,
            returns: Returns::Exact(returns),
            implementation: Implementation::Strict {
                f,
                propagates_null: true,
            },
        }
    }

    fn optional(mut self, count: usize) -> Self {
        self.required = self.params.len().saturating_sub(count);
        self
    }

    /// Result type when the arguments match.
    fn matches(&self, args: &[ValueType]) -> Option<ValueType> {
        if args.len() < self.required || args.len() > self.params.len() {
            return None;
        }
        let mut generic: Option<&ValueType> = None;
        for (param, arg) in self.params.iter().zip(args) {
            if arg.is_null() {
                continue;
            }
            match param {
                Param::Exact(expected) if expected == arg => {}
                Param::Number if arg.is_numeric() => {}
                Param::Generic if !arg.is_scalar() => return None,
                Param::Generic => match generic {
                    Some(bound) if bound != arg => return None,
                    _ => generic = Some(arg),
                },
                _ => return None,
            }
        }
        Some(match &self.returns {
            Returns::Exact(t) => t.clone(),
            Returns::Generic => generic.cloned().unwrap_or(ValueType::Null),
        })
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let name = match p {
                    Param::Exact(t) => t.to_string(),
                    Param::Number => "Number".to_string(),
                    Param::Generic => "T".to_string(),
                };
                if i >= self.required {
                    format!("[{}]", name)
                } else {
                    name
                }
            })
            .collect();
        let returns = match &self.returns {
            Returns::Exact(t) => t.to_string(),
            Returns::Generic => "T".to_string(),
        };
        write!(f, "{}({}) -> {}", self.name, params.join(", "), returns)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Function name → overloads.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<&'static str, Vec<FunctionSignature>>,
}

/// Built-in functions.
pub static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::builtin);

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, signature: FunctionSignature) {
        self.functions
            .entry(signature.name)
            .or_default()
            .push(signature);
    }

    pub fn signatures(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values().flatten()
    }

    /// First overload of `name` accepting `args`, with its result type.
    pub fn resolve(&self, name: &str, args: &[ValueType]) -> Option<(&FunctionSignature, ValueType)> {
        self.functions
            .get(name)?
            .iter()
            .find_map(|sig| sig.matches(args).map(|t| (sig, t)))
    }

    /// Resolve and bind a call.
    pub fn call(
        &self,
        name: &str,
        args: Vec<ResolvableExpression>,
        span: Span,
    ) -> EvalResult<ResolvableExpression> {
        let types: Vec<ValueType> = args.iter().map(|a| a.value_type().clone()).collect();
        let (signature, result_type) =
            self.resolve(name, &types)
                .ok_or_else(|| EvalError::FunctionNotFound {
                    signature: format!(
                        "{}({})",
                        name,
                        types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                    ),
                    span,
                })?;
        let implementation = signature.implementation;
        let compiled: Mutex<Option<Regex>> = Mutex::new(None);
        Ok(ResolvableExpression::new(result_type, span, move |bindings| {
            match implementation {
                Implementation::Lazy(f) => f(&args, bindings),
                Implementation::Pattern(f) => {
                    let subject = args[0].evaluate(bindings)?;
                    let pattern = args[1].evaluate(bindings)?;
                    let (Some(subject), Some(pattern)) = (subject.as_str(), pattern.as_str()) else {
                        return Ok(Value::Null);
                    };
                    let full = format!("^(?:{})$", pattern);
                    let mut cached = compiled
                        .lock()
                        .map_err(|_| EvalError::internal("pattern cache poisoned", span))?;
                    let regex = match cached.take() {
                        Some(regex) if regex.as_str() == full => regex,
                        _ => Regex::new(&full).map_err(|e| {
                            EvalError::invalid_argument(format!("invalid pattern: {}", e), span)
                        })?,
                    };
                    let result = f(subject, &regex);
                    *cached = Some(regex);
                    Ok(result)
                }
                Implementation::Strict { f, propagates_null } => {
                    let values = args
                        .iter()
                        .map(|a| a.evaluate(bindings))
                        .collect::<EvalResult<Vec<_>>>()?;
                    if propagates_null && values.iter().any(Value::is_null) {
                        return Ok(Value::Null);
                    }
                    f(&values).map_err(|message| EvalError::invalid_argument(message, span))
                }
            }
        }))
    }

    /// Registry with every built-in function.
    pub fn builtin() -> Self {
        use Param::{Exact, Generic, Number};
        let string = || Exact(ValueType::String);
        let long = || Exact(ValueType::Int64);

        let mut registry = Self::new();

        // Conditionals
        registry.register(FunctionSignature {
            name: "ifThenElse",
            params: vec![Exact(ValueType::Boolean), Generic, Generic],
            required: 3,
            returns: Returns::Generic,
            implementation: Implementation::Lazy(if_then_else),
        });
        registry.register(FunctionSignature {
            name: "nvl",
            params: vec![Generic, Generic],
            required: 2,
            returns: Returns::Generic,
            implementation: Implementation::Lazy(nvl),
        });
        registry.register(FunctionSignature {
            name: "isnull",
            params: vec![Generic],
            required: 1,
            returns: Returns::Exact(ValueType::Boolean),
            implementation: Implementation::Strict {
                f: |v| Ok(Value::Boolean(v[0].is_null())),
                propagates_null: false,
            },
        });

        // Numbers
        registry.register(FunctionSignature::strict(
            "ceil",
            vec![Number],
            ValueType::Float64,
            |v| Ok(Value::Float64(number(&v[0])?.ceil())),
        ));
        registry.register(FunctionSignature::strict(
            "between",
            vec![Number, Number, Number],
            ValueType::Boolean,
            between,
        ));

        // Strings
        registry.register(FunctionSignature {
            name: "match_characters",
            params: vec![string(), string()],
            required: 2,
            returns: Returns::Exact(ValueType::Boolean),
            implementation: Implementation::Pattern(match_characters),
        });
        registry.register(FunctionSignature::strict(
            "levenshtein",
            vec![string(), string()],
            ValueType::Int64,
            |v| Ok(Value::Int64(levenshtein(text(&v[0])?, text(&v[1])?) as i64)),
        ));
        registry.register(FunctionSignature::strict(
            "length",
            vec![string()],
            ValueType::Int64,
            |v| Ok(Value::Int64(text(&v[0])?.chars().count() as i64)),
        ));
        registry.register(FunctionSignature::strict("upper", vec![string()], ValueType::String, |v| {
            Ok(text(&v[0])?.to_uppercase().into())
        }));
        registry.register(FunctionSignature::strict("lower", vec![string()], ValueType::String, |v| {
            Ok(text(&v[0])?.to_lowercase().into())
        }));
        registry.register(FunctionSignature::strict("trim", vec![string()], ValueType::String, |v| {
            Ok(text(&v[0])?.trim().into())
        }));
        registry.register(FunctionSignature::strict("ltrim", vec![string()], ValueType::String, |v| {
            Ok(text(&v[0])?.trim_start().into())
        }));
        registry.register(FunctionSignature::strict("rtrim", vec![string()], ValueType::String, |v| {
            Ok(text(&v[0])?.trim_end().into())
        }));
        registry.register(
            FunctionSignature::strict("substr", vec![string(), long(), long()], ValueType::String, substr)
                .optional(1),
        );
        registry.register(
            FunctionSignature::strict(
                "replace",
                vec![string(), string(), string()],
                ValueType::String,
                |v| {
                    let replacement = v.get(2).and_then(Value::as_str).unwrap_or("");
                    Ok(text(&v[0])?.replace(text(&v[1])?, replacement).into())
                },
            )
            .optional(1),
        );
        registry.register(FunctionSignature::strict(
            "instr",
            vec![string(), string()],
            ValueType::Int64,
            instr,
        ));

        registry
    }
}

// =============================================================================
// Implementations
// =============================================================================

fn number(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("{} is not a number", value))
}

fn text(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("{} is not a string", value))
}

fn if_then_else(args: &[ResolvableExpression], bindings: &dyn Bindings) -> EvalResult<Value> {
    match args[0].evaluate(bindings)?.as_bool() {
        Some(true) => args[1].evaluate(bindings),
        _ => args[2].evaluate(bindings),
    }
}

fn nvl(args: &[ResolvableExpression], bindings: &dyn Bindings) -> EvalResult<Value> {
    match args[0].evaluate(bindings)? {
        Value::Null => args[1].evaluate(bindings),
        value => Ok(value),
    }
}

fn between(v: &[Value]) -> Result<Value, String> {
    let above = v[0].compare(&v[1]).map(Ordering::is_ge);
    let below = v[0].compare(&v[2]).map(Ordering::is_le);
    Ok(match (above, below) {
        (Some(a), Some(b)) => Value::Boolean(a && b),
        _ => Value::Null,
    })
}

fn match_characters(subject: &str, pattern: &Regex) -> Value {
    Value::Boolean(pattern.is_match(subject))
}

/// Edit distance counted in characters.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// 1-based start; a missing length takes the rest of the string.
fn substr(v: &[Value]) -> Result<Value, String> {
    let chars: Vec<char> = text(&v[0])?.chars().collect();
    let start = v[1].as_i64().unwrap_or(1).max(1) as usize - 1;
    let length = match v.get(2).and_then(Value::as_i64) {
        Some(n) if n < 0 => return Err(format!("substr length {} is negative", n)),
        Some(n) => n as usize,
        None => chars.len(),
    };
    Ok(chars.iter().skip(start).take(length).collect::<String>().into())
}

/// 1-based character position of the first occurrence, 0 when absent.
fn instr(v: &[Value]) -> Result<Value, String> {
    let haystack = text(&v[0])?;
    let needle = text(&v[1])?;
    let position = haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count() as i64 + 1)
        .unwrap_or(0);
    Ok(Value::Int64(position))
}
