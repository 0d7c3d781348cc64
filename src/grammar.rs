// ABOUTME: The fixed formula expression grammar: symbols, productions, and their AST reducers

use crate::ast::{AstNode, BinaryOp, UnaryOp};
use crate::token::{Token, TokenKind};

/// Nonterminals of the formula grammar, one per precedence level plus the
/// augmented start symbol. Listed low-to-high precedence: `Or` binds
/// loosest, `Primary` tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NonTerminal {
    Start,
    Or,
    And,
    Eq,
    Rel,
    Add,
    Mul,
    Unary,
    Pow,
    Primary,
    ArgList,
    Args,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    Terminal(TokenKind),
    NonTerminal(NonTerminal),
}

/// One item popped off the parse stack during a reduction: either a
/// shifted terminal, a previously reduced subtree, or an in-progress
/// argument list. Punctuation tokens (parens, commas, keywords) carry no
/// AST payload and are discarded by the reducer that consumes them.
/// `Args` never escapes the parser: it is consumed by the `ArgList`/`Args`
/// reducers and never appears in a finished `AstNode` tree.
#[derive(Debug, Clone)]
pub enum StackSymbol {
    Tok(Token),
    Node(AstNode),
    Args(Vec<AstNode>),
}

impl StackSymbol {
    pub fn into_node(self) -> AstNode {
        match self {
            StackSymbol::Node(n) => n,
            other => panic!("expected an AST node on the stack, found {other:?}"),
        }
    }

    pub fn into_args(self) -> Vec<AstNode> {
        match self {
            StackSymbol::Args(a) => a,
            other => panic!("expected an argument list on the stack, found {other:?}"),
        }
    }

    pub fn token(&self) -> &Token {
        match self {
            StackSymbol::Tok(t) => t,
            other => panic!("expected a token on the stack, found {other:?}"),
        }
    }
}

pub type Reducer = fn(Vec<StackSymbol>) -> StackSymbol;

#[derive(Clone)]
pub struct Production {
    pub lhs: NonTerminal,
    pub rhs: Vec<Symbol>,
    pub reduce: Reducer,
}

fn nt(n: NonTerminal) -> Symbol {
    Symbol::NonTerminal(n)
}
fn t(k: TokenKind) -> Symbol {
    Symbol::Terminal(k)
}

fn binary_reducer(op: BinaryOp) -> Reducer {
    match op {
        BinaryOp::Add => |mut s| reduce_binary(&mut s, BinaryOp::Add),
        BinaryOp::Sub => |mut s| reduce_binary(&mut s, BinaryOp::Sub),
        BinaryOp::Mul => |mut s| reduce_binary(&mut s, BinaryOp::Mul),
        BinaryOp::Div => |mut s| reduce_binary(&mut s, BinaryOp::Div),
        BinaryOp::Mod => |mut s| reduce_binary(&mut s, BinaryOp::Mod),
        BinaryOp::Pow => |mut s| reduce_binary(&mut s, BinaryOp::Pow),
        BinaryOp::Eq => |mut s| reduce_binary(&mut s, BinaryOp::Eq),
        BinaryOp::Neq => |mut s| reduce_binary(&mut s, BinaryOp::Neq),
        BinaryOp::Lt => |mut s| reduce_binary(&mut s, BinaryOp::Lt),
        BinaryOp::Leq => |mut s| reduce_binary(&mut s, BinaryOp::Leq),
        BinaryOp::Gt => |mut s| reduce_binary(&mut s, BinaryOp::Gt),
        BinaryOp::Geq => |mut s| reduce_binary(&mut s, BinaryOp::Geq),
        BinaryOp::And => |mut s| reduce_binary(&mut s, BinaryOp::And),
        BinaryOp::Or => |mut s| reduce_binary(&mut s, BinaryOp::Or),
    }
}

fn reduce_binary(s: &mut Vec<StackSymbol>, op: BinaryOp) -> StackSymbol {
    let r = s.pop().unwrap().into_node();
    s.pop(); // operator token
    let l = s.pop().unwrap().into_node();
    StackSymbol::Node(AstNode::binary(op, l, r))
}

fn pass_through(mut s: Vec<StackSymbol>) -> StackSymbol {
    StackSymbol::Node(s.pop().unwrap().into_node())
}

fn reduce_unary_neg(mut s: Vec<StackSymbol>) -> StackSymbol {
    let operand = s.pop().unwrap().into_node();
    StackSymbol::Node(AstNode::unary(UnaryOp::Neg, operand))
}

fn reduce_unary_not(mut s: Vec<StackSymbol>) -> StackSymbol {
    let operand = s.pop().unwrap().into_node();
    StackSymbol::Node(AstNode::unary(UnaryOp::Not, operand))
}

fn reduce_number(mut s: Vec<StackSymbol>) -> StackSymbol {
    let tok = s.pop().unwrap();
    let value = tok
        .token()
        .lexeme
        .parse()
        .expect("lexer guarantees a valid numeral");
    StackSymbol::Node(AstNode::Number(value))
}

fn reduce_true(_s: Vec<StackSymbol>) -> StackSymbol {
    StackSymbol::Node(AstNode::Bool(true))
}

fn reduce_false(_s: Vec<StackSymbol>) -> StackSymbol {
    StackSymbol::Node(AstNode::Bool(false))
}

fn reduce_variable(mut s: Vec<StackSymbol>) -> StackSymbol {
    let tok = s.pop().unwrap();
    StackSymbol::Node(AstNode::Variable(tok.token().lexeme.clone()))
}

fn reduce_call(mut s: Vec<StackSymbol>) -> StackSymbol {
    // IDENTIFIER '(' ArgList ')'
    s.pop(); // ')'
    let args = s.pop().unwrap().into_args();
    s.pop(); // '('
    let name = s.pop().unwrap().token().lexeme.clone();
    StackSymbol::Node(AstNode::Call { name, args })
}

fn reduce_if(mut s: Vec<StackSymbol>) -> StackSymbol {
    // IF '(' Or ',' Or ',' Or ')'
    s.pop(); // ')'
    let else_branch = s.pop().unwrap().into_node();
    s.pop(); // ','
    let then_branch = s.pop().unwrap().into_node();
    s.pop(); // ','
    let cond = s.pop().unwrap().into_node();
    s.pop(); // '('
    s.pop(); // IF
    StackSymbol::Node(AstNode::if_expr(cond, then_branch, else_branch))
}

fn reduce_paren(mut s: Vec<StackSymbol>) -> StackSymbol {
    s.pop(); // ')'
    let inner = s.pop().unwrap().into_node();
    s.pop(); // '('
    StackSymbol::Node(inner)
}

fn reduce_arglist_empty(_s: Vec<StackSymbol>) -> StackSymbol {
    StackSymbol::Args(Vec::new())
}

fn reduce_arglist_args(mut s: Vec<StackSymbol>) -> StackSymbol {
    StackSymbol::Args(s.pop().unwrap().into_args())
}

fn reduce_args_one(mut s: Vec<StackSymbol>) -> StackSymbol {
    let arg = s.pop().unwrap().into_node();
    StackSymbol::Args(vec![arg])
}

fn reduce_args_many(mut s: Vec<StackSymbol>) -> StackSymbol {
    let arg = s.pop().unwrap().into_node();
    s.pop(); // ','
    let mut args = s.pop().unwrap().into_args();
    args.push(arg);
    StackSymbol::Args(args)
}

/// Builds the full, fixed production list. The index of each `Production`
/// in the returned vector is its rule id, referenced by the LR table's
/// `Reduce` actions.
pub fn productions() -> Vec<Production> {
    use NonTerminal::{Add, And, ArgList, Args, Eq as EqNt, Mul, Or as OrNt, Pow, Primary, Rel, Start, Unary};
    use TokenKind::{
        And as AndTok, Caret, Comma, Eq as EqTok, False, Geq, Gt, Identifier, If, LParen, Leq, Lt, Minus, Neq, Not,
        Number, Or as OrTok, Percent, Plus, RParen, Slash, Star, True, Variable,
    };

    vec![
        // 0: Start -> Or
        Production { lhs: Start, rhs: vec![nt(OrNt)], reduce: pass_through },
        // 1-2: Or
        Production { lhs: OrNt, rhs: vec![nt(OrNt), t(OrTok), nt(And)], reduce: binary_reducer(BinaryOp::Or) },
        Production { lhs: OrNt, rhs: vec![nt(And)], reduce: pass_through },
        // 3-4: And
        Production { lhs: And, rhs: vec![nt(And), t(AndTok), nt(EqNt)], reduce: binary_reducer(BinaryOp::And) },
        Production { lhs: And, rhs: vec![nt(EqNt)], reduce: pass_through },
        // 5-7: Eq
        Production { lhs: EqNt, rhs: vec![nt(EqNt), t(EqTok), nt(Rel)], reduce: binary_reducer(BinaryOp::Eq) },
        Production { lhs: EqNt, rhs: vec![nt(EqNt), t(Neq), nt(Rel)], reduce: binary_reducer(BinaryOp::Neq) },
        Production { lhs: EqNt, rhs: vec![nt(Rel)], reduce: pass_through },
        // 8-12: Rel
        Production { lhs: Rel, rhs: vec![nt(Rel), t(Lt), nt(Add)], reduce: binary_reducer(BinaryOp::Lt) },
        Production { lhs: Rel, rhs: vec![nt(Rel), t(Leq), nt(Add)], reduce: binary_reducer(BinaryOp::Leq) },
        Production { lhs: Rel, rhs: vec![nt(Rel), t(Gt), nt(Add)], reduce: binary_reducer(BinaryOp::Gt) },
        Production { lhs: Rel, rhs: vec![nt(Rel), t(Geq), nt(Add)], reduce: binary_reducer(BinaryOp::Geq) },
        Production { lhs: Rel, rhs: vec![nt(Add)], reduce: pass_through },
        // 13-15: Add
        Production { lhs: Add, rhs: vec![nt(Add), t(Plus), nt(Mul)], reduce: binary_reducer(BinaryOp::Add) },
        Production { lhs: Add, rhs: vec![nt(Add), t(Minus), nt(Mul)], reduce: binary_reducer(BinaryOp::Sub) },
        Production { lhs: Add, rhs: vec![nt(Mul)], reduce: pass_through },
        // 16-19: Mul
        Production { lhs: Mul, rhs: vec![nt(Mul), t(Star), nt(Unary)], reduce: binary_reducer(BinaryOp::Mul) },
        Production { lhs: Mul, rhs: vec![nt(Mul), t(Slash), nt(Unary)], reduce: binary_reducer(BinaryOp::Div) },
        Production { lhs: Mul, rhs: vec![nt(Mul), t(Percent), nt(Unary)], reduce: binary_reducer(BinaryOp::Mod) },
        Production { lhs: Mul, rhs: vec![nt(Unary)], reduce: pass_through },
        // 20-22: Unary
        Production { lhs: Unary, rhs: vec![t(Minus), nt(Unary)], reduce: reduce_unary_neg },
        Production { lhs: Unary, rhs: vec![t(Not), nt(Unary)], reduce: reduce_unary_not },
        Production { lhs: Unary, rhs: vec![nt(Pow)], reduce: pass_through },
        // 23-24: Pow (right-associative: rhs recurses into Unary)
        Production { lhs: Pow, rhs: vec![nt(Primary), t(Caret), nt(Unary)], reduce: binary_reducer(BinaryOp::Pow) },
        Production { lhs: Pow, rhs: vec![nt(Primary)], reduce: pass_through },
        // 25-31: Primary
        Production { lhs: Primary, rhs: vec![t(Number)], reduce: reduce_number },
        Production { lhs: Primary, rhs: vec![t(True)], reduce: reduce_true },
        Production { lhs: Primary, rhs: vec![t(False)], reduce: reduce_false },
        Production { lhs: Primary, rhs: vec![t(Variable)], reduce: reduce_variable },
        Production {
            lhs: Primary,
            rhs: vec![t(Identifier), t(LParen), nt(ArgList), t(RParen)],
            reduce: reduce_call,
        },
        Production {
            lhs: Primary,
            rhs: vec![t(If), t(LParen), nt(OrNt), t(Comma), nt(OrNt), t(Comma), nt(OrNt), t(RParen)],
            reduce: reduce_if,
        },
        Production { lhs: Primary, rhs: vec![t(LParen), nt(OrNt), t(RParen)], reduce: reduce_paren },
        // 32-33: ArgList
        Production { lhs: ArgList, rhs: vec![], reduce: reduce_arglist_empty },
        Production { lhs: ArgList, rhs: vec![nt(Args)], reduce: reduce_arglist_args },
        // 34-35: Args
        Production { lhs: Args, rhs: vec![nt(OrNt)], reduce: reduce_args_one },
        Production { lhs: Args, rhs: vec![nt(Args), t(Comma), nt(OrNt)], reduce: reduce_args_many },
    ]
}

/// The grammar's start nonterminal (before augmentation).
pub fn start_symbol() -> NonTerminal {
    NonTerminal::Or
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_count_matches_the_fixed_grammar() {
        assert_eq!(productions().len(), 36);
    }

    #[test]
    fn every_production_rhs_references_known_symbols() {
        for p in productions() {
            for sym in &p.rhs {
                if let Symbol::NonTerminal(n) = sym {
                    assert!(*n as u8 <= NonTerminal::Args as u8);
                }
            }
        }
    }
}
