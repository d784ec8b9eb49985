//! Validation Engine
//!
//! Datapoint rulesets and simple `check` validation, expressed only in terms
//! of [`ProcessingEngine`] primitives so every backend gets them for free.
//!
//! ```text
//!   dataset ── rename (aliases) ──┬─ calc rule 1 ─┐
//!                                 ├─ calc rule 2 ─┼─ stack ── rename back ── [filter + drop]
//!                                 └─ calc rule n ─┘
//! ```
//!
//! Each rule adds `ruleid` (identifier), `bool_var`, `errorlevel` and
//! `errorcode`. The rule holds when its antecedent is false or its
//! consequent is true; a null on one side defers to the other side. Error
//! code and level are only set on rows where the antecedent is true and the
//! consequent is false.

use indexmap::IndexMap;
use log::{debug, warn};

use crate::ast::{RuleDefinition, RulesetVariable};
use crate::engine::ProcessingEngine;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{type_check, Binding, Evaluator};
use crate::model::{
    Bindings, Component, CompiledRule, CompiledRuleset, DataPointRuleset, DataStructure,
    DatasetExpression, ResolvableExpression, Role, Rule, Span, ValidationOutput, Value, ValueType,
};

pub const RULE_ID: &str = "ruleid";
pub const BOOL_VAR: &str = "bool_var";
pub const ERROR_CODE: &str = "errorcode";
pub const ERROR_LEVEL: &str = "errorlevel";
pub const IMBALANCE: &str = "imbalance";

// =============================================================================
// Ruleset definition
// =============================================================================

/// Check a ruleset definition and name its rules.
///
/// Error codes (and separately error levels) of all rules must share one
/// type. Unnamed rules are called `<ruleset>_<n>`, counting from 1.
pub fn define_datapoint_ruleset(
    engine: &dyn ProcessingEngine,
    name: &str,
    variables: &[RulesetVariable],
    rules: &[RuleDefinition],
    span: Span,
) -> EvalResult<DataPointRuleset> {
    let invalid = |message: String, span: Span| EvalError::InvalidRuleset { message, span };
    if rules.is_empty() {
        return Err(invalid(format!("ruleset {} has no rules", name), span));
    }

    let mut alias = IndexMap::new();
    let mut locals = std::collections::HashSet::new();
    for variable in variables {
        let local = variable.alias.clone().unwrap_or_else(|| variable.name.clone());
        if !locals.insert(local.clone()) {
            return Err(invalid(format!("variable {} declared twice in {}", local, name), span));
        }
        if local != variable.name {
            alias.insert(variable.name.clone(), local);
        }
    }

    // Error codes and levels are constants: their types are known now.
    let environment: IndexMap<String, Binding> = IndexMap::new();
    let evaluator = Evaluator::new(engine, &environment);
    let mut code_types = Vec::new();
    let mut level_types = Vec::new();
    let mut compiled = Vec::with_capacity(rules.len());
    let mut names = std::collections::HashSet::new();
    for (index, rule) in rules.iter().enumerate() {
        let rule_name = rule
            .name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", name, index + 1));
        if !names.insert(rule_name.clone()) {
            return Err(invalid(format!("duplicate rule name {}", rule_name), rule.span));
        }
        if let Some(code) = &rule.error_code {
            code_types.push(evaluator.scalar(code)?.value_type().clone());
        }
        if let Some(level) = &rule.error_level {
            level_types.push(evaluator.scalar(level)?.value_type().clone());
        }
        compiled.push(Rule {
            name: rule_name,
            antecedent: rule.when.clone(),
            consequent: rule.then.clone(),
            error_code: rule.error_code.clone(),
            error_level: rule.error_level.clone(),
            span: rule.span,
        });
    }
    let error_code_type = common_type(&code_types, ValueType::String)
        .ok_or_else(|| invalid("Error codes of rules have different types".to_string(), span))?;
    let error_level_type = common_type(&level_types, ValueType::Int64)
        .ok_or_else(|| invalid("Error levels of rules have different types".to_string(), span))?;

    debug!("ruleset {}: {} rule(s)", name, compiled.len());
    Ok(DataPointRuleset {
        name: name.to_string(),
        variables: variables.iter().map(|v| v.name.clone()).collect(),
        alias,
        rules: compiled,
        error_code_type,
        error_level_type,
    })
}

/// The single non-null type of `types`, `default` when there is none.
fn common_type(types: &[ValueType], default: ValueType) -> Option<ValueType> {
    let mut found: Option<&ValueType> = None;
    for t in types.iter().filter(|t| !t.is_null()) {
        match found {
            Some(f) if f != t => return None,
            _ => found = Some(t),
        }
    }
    Some(found.cloned().unwrap_or(default))
}

// =============================================================================
// check_datapoint
// =============================================================================

/// Compile `ruleset` against `dataset` and run it.
pub fn check_datapoint(
    engine: &dyn ProcessingEngine,
    dataset: &DatasetExpression,
    label: &str,
    ruleset: &DataPointRuleset,
    output: ValidationOutput,
    span: Span,
) -> EvalResult<DatasetExpression> {
    let structure = dataset.structure();
    for variable in &ruleset.variables {
        structure.require(variable, label, span)?;
    }
    let aliased = DataStructure::new(structure.components().map(|c| match ruleset.alias.get(&c.name) {
        Some(local) => c.renamed(local.clone()),
        None => c.clone(),
    }))
    .map_err(|e| e.or_span(span))?;

    let evaluator = Evaluator::for_structure(engine, &aliased, label);
    let environment: IndexMap<String, Binding> = IndexMap::new();
    let constants = Evaluator::new(engine, &environment);
    let mut rules = Vec::with_capacity(ruleset.rules.len());
    for rule in &ruleset.rules {
        let antecedent = rule
            .antecedent
            .as_ref()
            .map(|e| evaluator.scalar(e).and_then(type_check::assert_boolean))
            .transpose()?;
        let consequent = type_check::assert_boolean(evaluator.scalar(&rule.consequent)?)?;
        let error_code = rule
            .error_code
            .as_ref()
            .map(|e| constants.scalar(e).map(|c| c.retyped(ruleset.error_code_type.clone())))
            .transpose()?;
        let error_level = rule
            .error_level
            .as_ref()
            .map(|e| constants.scalar(e).map(|c| c.retyped(ruleset.error_level_type.clone())))
            .transpose()?;
        rules.push(CompiledRule {
            name: rule.name.clone(),
            antecedent,
            consequent,
            error_code,
            error_level,
        });
    }

    let compiled = CompiledRuleset {
        alias: ruleset.alias.clone(),
        rules,
        error_code_type: ruleset.error_code_type.clone(),
        error_level_type: ruleset.error_level_type.clone(),
    };
    debug!("check_datapoint {} on {}", ruleset.name, label);
    engine
        .execute_validate_dp_ruleset(dataset, &compiled, output)
        .map(|d| d.at(span))
}

// =============================================================================
// check
// =============================================================================

/// Simple validation of a dataset with a single Boolean measure.
pub fn check(
    engine: &dyn ProcessingEngine,
    dataset: &DatasetExpression,
    error_code: Option<ResolvableExpression>,
    error_level: Option<ResolvableExpression>,
    imbalance: Option<DatasetExpression>,
    output: ValidationOutput,
    span: Span,
) -> EvalResult<DatasetExpression> {
    let measure = single_measure(dataset.structure(), "check", span)?;
    if measure.value_type != ValueType::Boolean {
        return Err(EvalError::invalid_type(&measure.value_type, "Boolean", span));
    }
    let dataset = if measure.name == BOOL_VAR {
        dataset.clone()
    } else {
        let mut from_to = IndexMap::new();
        from_to.insert(measure.name.clone(), BOOL_VAR.to_string());
        engine.execute_rename(dataset, &from_to)?
    };

    let imbalance = match imbalance {
        Some(imbalance) => {
            let measure = single_measure(imbalance.structure(), "imbalance", span)?;
            if !measure.value_type.is_numeric() {
                return Err(EvalError::invalid_type(&measure.value_type, "Number", span));
            }
            let mut columns = imbalance.structure().identifier_names();
            columns.push(measure.name.clone());
            let projected = engine.execute_project(&imbalance, &columns)?;
            if measure.name == IMBALANCE {
                Some(projected)
            } else {
                let mut from_to = IndexMap::new();
                from_to.insert(measure.name.clone(), IMBALANCE.to_string());
                Some(engine.execute_rename(&projected, &from_to)?)
            }
        }
        None => None,
    };

    engine
        .execute_validation_simple(
            &dataset,
            error_code.as_ref(),
            error_level.as_ref(),
            imbalance.as_ref(),
            output,
        )
        .map(|d| d.at(span))
}

fn single_measure(structure: &DataStructure, what: &str, span: Span) -> EvalResult<Component> {
    let mut measures = structure.measures();
    match (measures.next(), measures.next()) {
        (Some(measure), None) => Ok(measure.clone()),
        _ => Err(EvalError::invalid_argument(
            format!("{} operand must have exactly one measure", what),
            span,
        )),
    }
}

// =============================================================================
// Engine-side implementations
// =============================================================================

fn boolean(expr: &ResolvableExpression, bindings: &dyn Bindings) -> EvalResult<Option<bool>> {
    Ok(expr.evaluate(bindings)?.as_bool())
}

/// Rule validity: null on one side defers to the other side.
fn validity(rule: &CompiledRule) -> ResolvableExpression {
    let antecedent = rule.antecedent.clone();
    let consequent = rule.consequent.clone();
    ResolvableExpression::new(ValueType::Boolean, consequent.span(), move |bindings| {
        let then = boolean(&consequent, bindings)?;
        let when = match &antecedent {
            Some(antecedent) => boolean(antecedent, bindings)?,
            None => return Ok(then.into()),
        };
        Ok(match (when, then) {
            (None, then) => then,
            (when, None) => when,
            (Some(when), Some(then)) => Some(!when || then),
        }
        .into())
    })
}

/// `value` on rows where the rule is broken (antecedent true, consequent
/// false), null elsewhere.
fn when_broken(
    rule: &CompiledRule,
    value: Option<&ResolvableExpression>,
    value_type: &ValueType,
) -> ResolvableExpression {
    let antecedent = rule.antecedent.clone();
    let consequent = rule.consequent.clone();
    let value = value.cloned();
    ResolvableExpression::new(value_type.clone(), consequent.span(), move |bindings| {
        let Some(value) = &value else {
            return Ok(Value::Null);
        };
        let when = match &antecedent {
            Some(antecedent) => boolean(antecedent, bindings)?,
            None => Some(true),
        };
        if when == Some(true) && boolean(&consequent, bindings)? == Some(false) {
            value.evaluate(bindings)
        } else {
            Ok(Value::Null)
        }
    })
}

fn constant(value: impl Into<Value>, value_type: ValueType) -> ResolvableExpression {
    ResolvableExpression::constant(value.into(), value_type, Span::default())
}

/// Rows whose `bool_var` is false, without `bool_var`.
fn invalid_rows<E: ProcessingEngine + ?Sized>(
    engine: &E,
    dataset: &DatasetExpression,
) -> EvalResult<DatasetExpression> {
    let failed = ResolvableExpression::new(ValueType::Boolean, Span::default(), |bindings| {
        Ok(Value::Boolean(bindings.get(BOOL_VAR) == Some(&Value::Boolean(false))))
    });
    let filtered = engine.execute_filter(dataset, &failed, &format!("{} = false", BOOL_VAR))?;
    let kept: Vec<String> = filtered
        .structure()
        .names()
        .filter(|name| *name != BOOL_VAR)
        .map(str::to_string)
        .collect();
    engine.execute_project(&filtered, &kept)
}

/// Validate `dataset` against a compiled ruleset using only contract
/// primitives.
pub fn validate_dp_ruleset<E: ProcessingEngine + ?Sized>(
    engine: &E,
    dataset: &DatasetExpression,
    ruleset: &CompiledRuleset,
    output: ValidationOutput,
) -> EvalResult<DatasetExpression> {
    let aliased = if ruleset.alias.is_empty() {
        dataset.clone()
    } else {
        engine.execute_rename(dataset, &ruleset.alias)?
    };

    let mut per_rule = Vec::with_capacity(ruleset.rules.len());
    for rule in &ruleset.rules {
        let mut expressions = IndexMap::new();
        let mut roles = IndexMap::new();
        let mut sources = IndexMap::new();

        expressions.insert(RULE_ID.to_string(), constant(rule.name.as_str(), ValueType::String));
        roles.insert(RULE_ID.to_string(), Role::Identifier);
        sources.insert(RULE_ID.to_string(), format!("\"{}\"", rule.name));

        expressions.insert(BOOL_VAR.to_string(), validity(rule));
        roles.insert(BOOL_VAR.to_string(), Role::Measure);
        sources.insert(BOOL_VAR.to_string(), format!("validity of {}", rule.name));

        expressions.insert(
            ERROR_LEVEL.to_string(),
            when_broken(rule, rule.error_level.as_ref(), &ruleset.error_level_type),
        );
        roles.insert(ERROR_LEVEL.to_string(), Role::Measure);
        sources.insert(ERROR_LEVEL.to_string(), format!("errorlevel of {}", rule.name));

        expressions.insert(
            ERROR_CODE.to_string(),
            when_broken(rule, rule.error_code.as_ref(), &ruleset.error_code_type),
        );
        roles.insert(ERROR_CODE.to_string(), Role::Measure);
        sources.insert(ERROR_CODE.to_string(), format!("errorcode of {}", rule.name));

        per_rule.push(engine.execute_calc(&aliased, &expressions, &roles, &sources)?);
    }

    let stacked = engine.execute_stack(&per_rule)?;
    let restored = if ruleset.alias.is_empty() {
        stacked
    } else {
        let back: IndexMap<String, String> = ruleset
            .alias
            .iter()
            .map(|(name, local)| (local.clone(), name.clone()))
            .collect();
        engine.execute_rename(&stacked, &back)?
    };

    match output {
        ValidationOutput::All => Ok(restored),
        ValidationOutput::Invalid => invalid_rows(engine, &restored),
    }
}

/// Simple validation: `dataset` carries `bool_var`; `imbalance`, when
/// given, is left-joined on the identifiers of `dataset`.
pub fn validation_simple<E: ProcessingEngine + ?Sized>(
    engine: &E,
    dataset: &DatasetExpression,
    error_code: Option<&ResolvableExpression>,
    error_level: Option<&ResolvableExpression>,
    imbalance: Option<&DatasetExpression>,
    output: ValidationOutput,
) -> EvalResult<DatasetExpression> {
    let joined = match imbalance {
        Some(imbalance) => {
            let keys = dataset.structure().identifier_names();
            if keys.is_empty() {
                warn!("check: no identifiers to join the imbalance on; imbalance ignored");
                dataset.clone()
            } else {
                let mut operands = IndexMap::new();
                operands.insert("dataset".to_string(), dataset.clone());
                operands.insert(IMBALANCE.to_string(), imbalance.clone());
                engine.execute_left_join(&operands, &keys)?
            }
        }
        None => dataset.clone(),
    };

    let broken = |value: Option<&ResolvableExpression>, default: ValueType| {
        let value_type = value.map(|v| v.value_type().clone()).unwrap_or(default);
        let value = value.cloned();
        ResolvableExpression::new(value_type, Span::default(), move |bindings| {
            match (&value, bindings.get(BOOL_VAR)) {
                (Some(value), Some(Value::Boolean(false))) => value.evaluate(bindings),
                _ => Ok(Value::Null),
            }
        })
    };
    let mut expressions = IndexMap::new();
    expressions.insert(ERROR_CODE.to_string(), broken(error_code, ValueType::String));
    expressions.insert(ERROR_LEVEL.to_string(), broken(error_level, ValueType::Int64));
    let roles = expressions.keys().map(|k| (k.clone(), Role::Measure)).collect();
    let sources = expressions.keys().map(|k| (k.clone(), k.clone())).collect();
    let annotated = engine.execute_calc(&joined, &expressions, &roles, &sources)?;

    match output {
        ValidationOutput::All => Ok(annotated),
        ValidationOutput::Invalid => invalid_rows(engine, &annotated),
    }
}
