// ABOUTME: Visitor-based evaluator - AST reduction with type policy and security enforcement

use crate::ast::{AstNode, AstVisitor, BinaryOp, UnaryOp};
use crate::env::Environment;
use crate::error::EvalError;
use crate::functions;
use crate::value::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cheaply cloneable cooperative-cancellation flag, shared between the
/// caller driving an evaluation (or a chain of steps) and the evaluator
/// itself. Checked at every node visit alongside the deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Evaluates `ast` against `env`, enforcing the depth/node/variable
/// security policy and the type policy of spec §4.6. A single typed error
/// aborts the whole evaluation; no partial value is ever returned. Runs
/// with a fresh, never-cancelled flag; use [`evaluate_cancellable`] to
/// share a cancellation flag across a chain of evaluations.
pub fn evaluate(ast: &AstNode, env: &Environment) -> Result<Value, EvalError> {
    evaluate_cancellable(ast, env, &CancelFlag::new())
}

/// Like [`evaluate`], but checks `cancel` (in addition to a deadline
/// derived from `env.limits.max_time_ms`) at every node visit, raising
/// `Cancelled` or `Timeout` respectively (spec §5 "Cancellation & timeouts").
pub fn evaluate_cancellable(ast: &AstNode, env: &Environment, cancel: &CancelFlag) -> Result<Value, EvalError> {
    if ast.node_count() > env.limits.max_nodes {
        return Err(EvalError::NodeLimitExceeded);
    }
    let deadline = Instant::now() + Duration::from_millis(env.limits.max_time_ms);
    let mut evaluator = Evaluator {
        env,
        depth: 0,
        max_depth: env.limits.max_depth,
        deadline,
        cancel,
    };
    evaluator.check_budget()?;
    evaluator.visit(ast)
}

struct Evaluator<'a> {
    env: &'a Environment,
    depth: usize,
    max_depth: usize,
    deadline: Instant,
    cancel: &'a CancelFlag,
}

impl<'a> Evaluator<'a> {
    fn check_budget(&self) -> Result<(), EvalError> {
        if self.cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        if Instant::now() > self.deadline {
            return Err(EvalError::Timeout);
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(EvalError::DepthExceeded);
        }
        self.check_budget()
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn eval_node(&mut self, node: &AstNode) -> Result<Value, EvalError> {
        self.enter()?;
        let result = self.visit(node);
        self.leave();
        result
    }

    fn numeric(&mut self, node: &AstNode, op: &str) -> Result<f64, EvalError> {
        let value = self.eval_node(node)?;
        value.as_number().ok_or_else(|| EvalError::TypeMismatch {
            op: op.to_string(),
            kinds: value.kind_name().to_string(),
        })
    }
}

impl<'a> AstVisitor<Result<Value, EvalError>> for Evaluator<'a> {
    fn visit_number(&mut self, n: f64) -> Result<Value, EvalError> {
        Ok(Value::Number(n))
    }

    fn visit_bool(&mut self, b: bool) -> Result<Value, EvalError> {
        Ok(Value::Bool(b))
    }

    fn visit_variable(&mut self, name: &str) -> Result<Value, EvalError> {
        self.env
            .get(name)
            .ok_or_else(|| EvalError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn visit_unary(&mut self, op: UnaryOp, operand: &AstNode) -> Result<Value, EvalError> {
        match op {
            UnaryOp::Neg => Ok(Value::Number(-self.numeric(operand, "-")?)),
            UnaryOp::Not => {
                let value = self.eval_node(operand)?;
                Ok(Value::Bool(!value.as_bool()))
            }
        }
    }

    fn visit_binary(&mut self, op: BinaryOp, left: &AstNode, right: &AstNode) -> Result<Value, EvalError> {
        use BinaryOp::*;
        match op {
            And => {
                let l = self.eval_node(left)?;
                if !l.as_bool() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval_node(right)?.as_bool()))
            }
            Or => {
                let l = self.eval_node(left)?;
                if l.as_bool() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval_node(right)?.as_bool()))
            }
            Eq | Neq => {
                let l = self.eval_node(left)?;
                let r = self.eval_node(right)?;
                let equal = values_equal(&l, &r, &op.to_string())?;
                Ok(Value::Bool(if op == Eq { equal } else { !equal }))
            }
            Lt | Leq | Gt | Geq => {
                let l = self.numeric(left, &op.to_string())?;
                let r = self.numeric(right, &op.to_string())?;
                Ok(Value::Bool(match op {
                    Lt => l < r,
                    Leq => l <= r,
                    Gt => l > r,
                    Geq => l >= r,
                    _ => unreachable!(),
                }))
            }
            Add | Sub | Mul | Div | Mod | Pow => {
                let l = self.numeric(left, &op.to_string())?;
                let r = self.numeric(right, &op.to_string())?;
                Ok(Value::Number(match op {
                    Add => l + r,
                    Sub => l - r,
                    Mul => l * r,
                    Div => {
                        if r == 0.0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        l / r
                    }
                    Mod => {
                        if r == 0.0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        l % r
                    }
                    Pow => l.powf(r),
                    _ => unreachable!(),
                }))
            }
        }
    }

    fn visit_call(&mut self, name: &str, args: &[AstNode]) -> Result<Value, EvalError> {
        if !functions::is_known(name) {
            return Err(EvalError::UnknownFunction {
                name: name.to_string(),
            });
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.numeric(arg, name)?);
        }
        functions::call(name, &values).map(Value::Number)
    }

    fn visit_if(&mut self, cond: &AstNode, then_branch: &AstNode, else_branch: &AstNode) -> Result<Value, EvalError> {
        let cond = self.eval_node(cond)?;
        if cond.as_bool() {
            self.eval_node(then_branch)
        } else {
            self.eval_node(else_branch)
        }
    }
}

fn values_equal(l: &Value, r: &Value, op: &str) -> Result<bool, EvalError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        _ => Err(EvalError::TypeMismatch {
            op: op.to_string(),
            kinds: format!("{}/{}", l.kind_name(), r.kind_name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use crate::simplify::simplify;

    fn eval_str(src: &str, env: &Environment) -> Result<Value, EvalError> {
        let ast = parse(lex(src).unwrap()).unwrap();
        evaluate(&ast, env)
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        let env = Environment::new();
        assert_eq!(eval_str("2 + 3 * 4", &env).unwrap(), Value::Number(14.0));
    }

    #[test]
    fn evaluates_if_with_variable_lookup() {
        let mut env = Environment::new();
        env.define("score", Value::Number(85.0)).unwrap();
        assert_eq!(
            eval_str("IF(score > 80, 1, 0)", &env).unwrap(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let env = Environment::new();
        let err = eval_str("x + 1", &env).unwrap_err();
        assert_eq!(err.code(), "EVAL001");
    }

    #[test]
    fn division_by_zero_is_not_simplified_away() {
        let env = Environment::new();
        let err = eval_str("1 / 0", &env).unwrap_err();
        assert_eq!(err.code(), "EVAL005");
    }

    #[test]
    fn and_short_circuits_without_evaluating_the_right_operand() {
        let env = Environment::new();
        // If short-circuiting didn't happen, the undefined variable would
        // surface an UndefinedVariable error instead of Bool(false).
        assert_eq!(
            eval_str("FALSE && undefined_var", &env).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn or_short_circuits_without_evaluating_the_right_operand() {
        let env = Environment::new();
        assert_eq!(
            eval_str("TRUE || undefined_var", &env).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn unknown_function_is_rejected_even_with_valid_arguments() {
        let env = Environment::new();
        let err = eval_str("FROBNICATE(1)", &env).unwrap_err();
        assert_eq!(err.code(), "EVAL002");
    }

    #[test]
    fn type_mismatch_on_relational_operator_with_bool_operand() {
        let env = Environment::new();
        let err = eval_str("TRUE < 1", &env).unwrap_err();
        assert_eq!(err.code(), "EVAL004");
    }

    #[test]
    fn depth_exceeded_is_raised_for_a_deeply_nested_expression() {
        let mut env = Environment::new();
        env.limits.max_depth = 3;
        let expr = "-".repeat(5) + "1";
        let err = eval_str(&expr, &env).unwrap_err();
        assert_eq!(err.code(), "EVAL008");
    }

    #[test]
    fn cancelled_flag_is_observed_before_evaluation_starts() {
        let env = Environment::new();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let ast = parse(lex("1 + 1").unwrap()).unwrap();
        let err = evaluate_cancellable(&ast, &env, &cancel).unwrap_err();
        assert_eq!(err.code(), "EVAL012");
    }

    #[test]
    fn expired_deadline_raises_timeout() {
        let mut env = Environment::new();
        env.limits.max_time_ms = 0;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let err = eval_str("1 + (1 + (1 + 1))", &env).unwrap_err();
        assert_eq!(err.code(), "EVAL011");
    }

    #[test]
    fn simplify_does_not_change_the_evaluated_result() {
        let env = Environment::new();
        let ast = parse(lex("2 + 3 * 4").unwrap()).unwrap();
        let simplified = simplify(&ast);
        assert_eq!(evaluate(&ast, &env), evaluate(&simplified, &env));
    }
}
