// ABOUTME: End-to-end coverage of lex -> parse -> simplify -> evaluate and the step orchestrator

use formula_engine::env::Environment;
use formula_engine::eval::evaluate;
use formula_engine::lexer::lex;
use formula_engine::orchestrator::{execute_steps, FormulaSet, FormulaStep};
use formula_engine::parser::parse;
use formula_engine::simplify::simplify;
use formula_engine::value::Value;

fn run(expr: &str, env: &Environment) -> Value {
    let ast = parse(lex(expr).unwrap()).unwrap();
    let ast = simplify(&ast);
    evaluate(&ast, env).unwrap()
}

#[test]
fn scenario_1_precedence() {
    let env = Environment::new();
    assert_eq!(run("2 + 3 * 4", &env), Value::Number(14.0));
}

#[test]
fn scenario_2_parentheses_override_precedence() {
    let env = Environment::new();
    assert_eq!(run("(2 + 3) * 4", &env), Value::Number(20.0));
}

#[test]
fn scenario_3_if_with_comparison() {
    let mut env = Environment::new();
    env.define("score", Value::Number(85.0)).unwrap();
    assert_eq!(run("IF(score > 80, 1, 0)", &env), Value::Number(1.0));
}

#[test]
fn scenario_4_nested_if() {
    let mut env = Environment::new();
    env.define("days", Value::Number(3.0)).unwrap();
    assert_eq!(
        run("IF(days >= 5, 10, IF(days >= 3, 12, IF(days >= 1, 14, 15)))", &env),
        Value::Number(12.0)
    );
}

#[test]
fn scenario_5_step_chain_through_orchestrator() {
    let set = FormulaSet {
        steps: vec![
            FormulaStep {
                order: 1,
                name: "average".to_string(),
                expression: "(k + s + h + m + sc + t + e) / 7".to_string(),
                result_variable: None,
            },
            FormulaStep {
                order: 2,
                name: "scaled".to_string(),
                expression: "8 * step1".to_string(),
                result_variable: None,
            },
            FormulaStep {
                order: 3,
                name: "final".to_string(),
                expression: "step2 * 1.75".to_string(),
                result_variable: Some("finalScore".to_string()),
            },
        ],
        constants: Default::default(),
    };
    let mut env = Environment::new();
    for (name, value) in [
        ("k", 4.0),
        ("s", 3.0),
        ("h", 4.0),
        ("m", 5.0),
        ("sc", 4.0),
        ("t", 3.0),
        ("e", 4.0),
    ] {
        env.define(name, Value::Number(value)).unwrap();
    }

    let records = execute_steps(&set, env, false).unwrap();
    match records[2].result {
        Some(Value::Number(n)) => assert!((n - 54.0).abs() < 1e-9, "got {n}"),
        other => panic!("expected Number(54.0), got {other:?}"),
    }
}

#[test]
fn scenario_6_undefined_variable() {
    let env = Environment::new();
    let ast = parse(lex("undef + 1").unwrap()).unwrap();
    let err = evaluate(&ast, &env).unwrap_err();
    assert_eq!(err.code(), "EVAL001");
}

#[test]
fn scenario_7_unknown_function() {
    let env = Environment::new();
    let ast = parse(lex("eval(1)").unwrap()).unwrap();
    let err = evaluate(&ast, &env).unwrap_err();
    assert_eq!(err.code(), "EVAL002");
}

#[test]
fn empty_source_lexes_to_a_single_eof_token() {
    let tokens = lex("").unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, formula_engine::token::TokenKind::Eof);
}

#[test]
fn parser_rejects_input_with_no_tokens_but_eof() {
    let tokens = lex("").unwrap();
    let err = parse(tokens).unwrap_err();
    assert_eq!(err.code(), "PARSE002");
}

#[test]
fn division_by_zero_is_not_folded_away_by_the_simplifier() {
    let env = Environment::new();
    let ast = parse(lex("1 / 0").unwrap()).unwrap();
    let simplified = simplify(&ast);
    assert_eq!(ast, simplified);
    let err = evaluate(&simplified, &env).unwrap_err();
    assert_eq!(err.code(), "EVAL005");
}

#[test]
fn simplify_before_evaluate_matches_evaluate_directly() {
    let mut env = Environment::new();
    env.define("x", Value::Number(3.0)).unwrap();
    let expr = "(x + 0) * 1 + 2 * 5";
    let ast = parse(lex(expr).unwrap()).unwrap();
    let simplified = simplify(&ast);
    assert_eq!(evaluate(&ast, &env), evaluate(&simplified, &env));
}

#[test]
fn variable_count_and_ast_shape_invariants_hold() {
    let ast = parse(lex("IF(a > b, a + b, a - b)").unwrap()).unwrap();
    assert!(ast.depth() <= ast.node_count());
    let vars = ast.variables();
    assert_eq!(vars.len(), 2);
    assert!(vars.contains("a") && vars.contains("b"));
}

#[test]
fn whitelisted_function_library_covers_common_operations() {
    let env = Environment::new();
    assert_eq!(run("MAX(1, 5, 2)", &env), Value::Number(5.0));
    assert_eq!(run("ROUND(2.6)", &env), Value::Number(3.0));
    assert_eq!(run("SQRT(16)", &env), Value::Number(4.0));
}

#[test]
fn depth_exceeded_fails_beyond_the_configured_limit() {
    let mut env = Environment::new();
    env.limits.max_depth = 2;
    let ast = parse(lex("-(-(-1))").unwrap()).unwrap();
    let err = evaluate(&ast, &env).unwrap_err();
    assert_eq!(err.code(), "EVAL008");
}

#[test]
fn fail_fast_formula_set_skips_remaining_steps_after_a_failure() {
    let set = FormulaSet {
        steps: vec![
            FormulaStep {
                order: 1,
                name: "broken".to_string(),
                expression: "undefined_var + 1".to_string(),
                result_variable: None,
            },
            FormulaStep {
                order: 2,
                name: "never runs".to_string(),
                expression: "1 + 1".to_string(),
                result_variable: None,
            },
        ],
        constants: Default::default(),
    };
    let records = execute_steps(&set, Environment::new(), true).unwrap();
    assert!(!records[0].errors.is_empty());
    assert!(records[1].skipped);
}
