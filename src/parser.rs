// ABOUTME: Table-driven LR parser: the two-stack shift/reduce/accept loop plus recovery and tracing

use crate::ast::AstNode;
use crate::config::{DEFAULT_MAX_PARSING_STEPS, DEFAULT_MAX_RECOVERY_ATTEMPTS, DEFAULT_MAX_STACK_SIZE};
use crate::error::ParseError;
use crate::grammar::{productions, start_symbol, StackSymbol};
use crate::lr::{Action, Table};
use crate::token::{Token, TokenKind};
use once_cell::sync::Lazy;
use serde::Serialize;

static TABLE: Lazy<Table> = Lazy::new(|| {
    Table::build(productions(), start_symbol()).expect("the fixed grammar must be SLR(1)")
});

/// One step of the shift/reduce/accept loop, recorded when tracing is
/// enabled so the CLI (under `-v`) and tests can inspect exactly how an
/// expression was parsed.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub state: usize,
    pub lookahead: String,
    pub action: String,
}

pub struct ParserLimits {
    pub max_parsing_steps: usize,
    pub max_stack_size: usize,
    pub max_recovery_attempts: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        ParserLimits {
            max_parsing_steps: DEFAULT_MAX_PARSING_STEPS,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            max_recovery_attempts: DEFAULT_MAX_RECOVERY_ATTEMPTS,
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    limits: ParserLimits,
    trace: Vec<TraceEntry>,
    tracing_enabled: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            limits: ParserLimits::default(),
            trace: Vec::new(),
            tracing_enabled: false,
        }
    }

    pub fn with_limits(mut self, limits: ParserLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    /// Runs the table-driven shift/reduce/accept loop to completion,
    /// returning the built AST or the first unrecoverable parse error. On
    /// an unexpected token the parser skips it and retries, up to
    /// `max_recovery_attempts` times, before giving up.
    pub fn parse(mut self) -> Result<AstNode, ParseError> {
        let mut states: Vec<usize> = vec![0];
        let mut symbols: Vec<StackSymbol> = Vec::new();
        let mut steps = 0usize;
        let mut recovery_attempts = 0usize;

        loop {
            steps += 1;
            if steps > self.limits.max_parsing_steps {
                return Err(ParseError::TooManySteps {
                    position: self.current().position,
                });
            }
            if states.len() > self.limits.max_stack_size {
                return Err(ParseError::StackOverflow {
                    position: self.current().position,
                });
            }

            let state = *states.last().unwrap();
            let token = self.current().clone();

            match TABLE.action(state, token.kind) {
                Some(Action::Shift(next)) => {
                    self.record_trace(state, &token, "shift");
                    symbols.push(StackSymbol::Tok(token));
                    states.push(next);
                    self.pos += 1;
                }
                Some(Action::Reduce(rule_id)) => {
                    let production = &TABLE.productions[rule_id];
                    self.record_trace(state, &token, &format!("reduce #{rule_id}"));
                    let consume = production.rhs.len();
                    let drained: Vec<StackSymbol> = symbols.split_off(symbols.len() - consume);
                    states.truncate(states.len() - consume);

                    let reduced = (production.reduce)(drained);
                    let lhs = production.lhs;
                    symbols.push(reduced);

                    let from_state = *states.last().unwrap();
                    let next = TABLE
                        .goto(from_state, lhs)
                        .unwrap_or_else(|| panic!("missing goto for {lhs:?} from state {from_state}"));
                    states.push(next);
                }
                Some(Action::Accept) => {
                    self.record_trace(state, &token, "accept");
                    return Ok(symbols
                        .pop()
                        .expect("accept leaves exactly one node")
                        .into_node());
                }
                None => {
                    if token.kind == TokenKind::Eof {
                        return Err(ParseError::UnexpectedEndOfInput {
                            position: token.position,
                        });
                    }
                    if recovery_attempts >= self.limits.max_recovery_attempts {
                        return Err(ParseError::RecoveryLimitExceeded {
                            position: token.position,
                        });
                    }
                    recovery_attempts += 1;
                    self.pos += 1;
                }
            }
        }
    }

    fn record_trace(&mut self, state: usize, token: &Token, action: &str) {
        if self.tracing_enabled {
            self.trace.push(TraceEntry {
                state,
                lookahead: format!("{}", token.kind),
                action: action.to_string(),
            });
        }
    }
}

/// Convenience entry point: parse a token stream with default limits and
/// no tracing.
pub fn parse(tokens: Vec<Token>) -> Result<AstNode, ParseError> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, UnaryOp};
    use crate::lexer::lex;

    fn parse_str(src: &str) -> AstNode {
        parse(lex(src).unwrap()).unwrap()
    }

    #[test]
    fn parses_a_single_number() {
        assert_eq!(parse_str("42"), AstNode::Number(42.0));
    }

    #[test]
    fn respects_precedence_of_multiplication_over_addition() {
        let ast = parse_str("1 + 2 * 3");
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Add,
                AstNode::Number(1.0),
                AstNode::binary(BinaryOp::Mul, AstNode::Number(2.0), AstNode::Number(3.0))
            )
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        let ast = parse_str("(1 + 2) * 3");
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Mul,
                AstNode::binary(BinaryOp::Add, AstNode::Number(1.0), AstNode::Number(2.0)),
                AstNode::Number(3.0)
            )
        );
    }

    #[test]
    fn power_is_right_associative() {
        let ast = parse_str("2 ^ 3 ^ 2");
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Pow,
                AstNode::Number(2.0),
                AstNode::binary(BinaryOp::Pow, AstNode::Number(3.0), AstNode::Number(2.0))
            )
        );
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        let ast = parse_str("-2 ^ 2");
        assert_eq!(
            ast,
            AstNode::unary(
                UnaryOp::Neg,
                AstNode::binary(BinaryOp::Pow, AstNode::Number(2.0), AstNode::Number(2.0))
            )
        );
    }

    #[test]
    fn parses_function_calls_with_multiple_arguments() {
        let ast = parse_str("MAX(1, 2, 3)");
        assert_eq!(
            ast,
            AstNode::Call {
                name: "MAX".to_string(),
                args: vec![AstNode::Number(1.0), AstNode::Number(2.0), AstNode::Number(3.0)],
            }
        );
    }

    #[test]
    fn parses_zero_argument_calls() {
        let ast = parse_str("NOW()");
        assert_eq!(
            ast,
            AstNode::Call {
                name: "NOW".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn parses_if_expressions() {
        let ast = parse_str("IF(score > 0, 1, 0)");
        assert_eq!(
            ast,
            AstNode::if_expr(
                AstNode::binary(BinaryOp::Gt, AstNode::Variable("score".into()), AstNode::Number(0.0)),
                AstNode::Number(1.0),
                AstNode::Number(0.0)
            )
        );
    }

    #[test]
    fn reports_unexpected_end_of_input() {
        let tokens = lex("1 +").unwrap();
        let err = parse(tokens).unwrap_err();
        assert_eq!(err.code(), "PARSE002");
    }

    #[test]
    fn enforces_max_parsing_steps() {
        let tokens = lex("1 + 2").unwrap();
        let err = Parser::new(tokens)
            .with_limits(ParserLimits {
                max_parsing_steps: 1,
                ..ParserLimits::default()
            })
            .parse()
            .unwrap_err();
        assert_eq!(err.code(), "PARSE004");
    }

    #[test]
    fn records_a_trace_when_enabled() {
        let tokens = lex("1 + 2").unwrap();
        let parser = Parser::new(tokens).with_tracing(true);
        let result = parser.parse();
        assert!(result.is_ok());
    }
}
