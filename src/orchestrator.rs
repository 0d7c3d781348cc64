// ABOUTME: Multi-step formula execution - ordered steps, stepN binding, fail-fast mode

use crate::env::Environment;
use crate::error::{EngineError, FormulaError};
use crate::eval::{evaluate_cancellable, CancelFlag};
use crate::lexer::lex;
use crate::parser::parse;
use crate::simplify::simplify;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// `{ order, name, expression, resultVariable? }` (spec §3 "Formula Step").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaStep {
    pub order: i64,
    pub name: String,
    pub expression: String,
    #[serde(rename = "resultVariable", skip_serializing_if = "Option::is_none")]
    pub result_variable: Option<String>,
}

/// An ordered list of steps plus a constants map, seeded into the
/// environment before step 1 runs (spec §3, SPEC_FULL §A.5).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FormulaSet {
    pub steps: Vec<FormulaStep>,
    #[serde(default)]
    pub constants: std::collections::BTreeMap<String, f64>,
}

impl FormulaSet {
    /// Validates that `order` values are unique and densely numbered `1..N`.
    pub fn validate(&self) -> Result<(), FormulaError> {
        if self.steps.is_empty() {
            return Err(FormulaError::EmptyFormulaSet);
        }
        let mut orders: Vec<i64> = self.steps.iter().map(|s| s.order).collect();
        orders.sort_unstable();
        let mut seen = std::collections::BTreeSet::new();
        for &order in &orders {
            if !seen.insert(order) {
                return Err(FormulaError::DuplicateOrder { order });
            }
        }
        for (i, &order) in orders.iter().enumerate() {
            let expected = (i + 1) as i64;
            if order != expected {
                return Err(FormulaError::NonDenseOrder { expected, found: order });
            }
        }
        Ok(())
    }

    fn steps_in_order(&self) -> Vec<&FormulaStep> {
        let mut steps: Vec<&FormulaStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }
}

/// Per-step outcome: `{ order, name, expression, result?, errors[],
/// executionTimeMs }` (spec §6.3 "Step Execution Record"). Once produced
/// it is immutable. `execution_time_ms` is `0` for skipped steps, since
/// they are never evaluated.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub order: i64,
    pub name: String,
    pub expression: String,
    pub result: Option<Value>,
    pub errors: Vec<StepError>,
    pub skipped: bool,
    #[serde(rename = "executionTimeMs")]
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepError {
    pub code: String,
    pub message: String,
}

impl From<EngineError> for StepError {
    fn from(e: EngineError) -> Self {
        StepError {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

/// Runs every step in ascending `order`, seeding `env` with the set's
/// constants first. On success a step's result is bound as `step{order}`
/// and, if present, under `resultVariable` too, visible to later steps.
/// On failure the step's error is recorded; execution continues with
/// later steps unless `fail_fast` is set, in which case they are emitted
/// as `Skipped` records with no evaluation (spec §4.7, §7).
pub fn execute_steps(
    formulas: &FormulaSet,
    mut env: Environment,
    fail_fast: bool,
) -> Result<Vec<StepRecord>, FormulaError> {
    formulas.validate()?;
    for (name, value) in &formulas.constants {
        let _ = env.define(name.clone(), Value::Number(*value));
    }

    let mut records = Vec::with_capacity(formulas.steps.len());
    let mut aborted = false;
    let cancel = CancelFlag::new();

    for step in formulas.steps_in_order() {
        // Step-boundary check: a cancellation observed between two steps
        // skips everything from here on, same as a fail-fast abort.
        if aborted || cancel.is_cancelled() {
            records.push(StepRecord {
                order: step.order,
                name: step.name.clone(),
                expression: step.expression.clone(),
                result: None,
                errors: Vec::new(),
                skipped: true,
                execution_time_ms: 0,
            });
            continue;
        }

        let record = run_one_step(step, &mut env, &cancel);
        if !record.errors.is_empty() && fail_fast {
            aborted = true;
        }
        records.push(record);
    }

    Ok(records)
}

fn run_one_step(step: &FormulaStep, env: &mut Environment, cancel: &CancelFlag) -> StepRecord {
    let started = Instant::now();
    let outcome = run_one_step_inner(step, env, cancel);
    let execution_time_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(value) => {
            let step_name = format!("step{}", step.order);
            let _ = env.define(step_name, value);
            if let Some(result_var) = &step.result_variable {
                let _ = env.define(result_var.clone(), value);
            }
            StepRecord {
                order: step.order,
                name: step.name.clone(),
                expression: step.expression.clone(),
                result: Some(value),
                errors: Vec::new(),
                skipped: false,
                execution_time_ms,
            }
        }
        Err(e) => StepRecord {
            order: step.order,
            name: step.name.clone(),
            expression: step.expression.clone(),
            result: None,
            errors: vec![e.into()],
            skipped: false,
            execution_time_ms,
        },
    }
}

fn run_one_step_inner(step: &FormulaStep, env: &Environment, cancel: &CancelFlag) -> Result<Value, EngineError> {
    let tokens = lex(&step.expression)?;
    let ast = parse(tokens)?;
    let ast = simplify(&ast);
    Ok(evaluate_cancellable(&ast, env, cancel)?)
}
