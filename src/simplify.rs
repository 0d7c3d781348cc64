// ABOUTME: Pure, idempotent constant-folding and algebraic-identity simplifier

use crate::ast::{AstNode, BinaryOp, UnaryOp};

/// Bottom-up simplification: children are simplified first, then the parent
/// node is folded if the result is a provable constant or a recognized
/// algebraic identity. Division and modulo by a literal zero are left
/// unfolded so the original error surfaces at evaluation time, not here.
pub fn simplify(node: &AstNode) -> AstNode {
    match node {
        AstNode::Number(_) | AstNode::Bool(_) | AstNode::Variable(_) => node.clone(),
        AstNode::Unary { op, operand } => simplify_unary(*op, simplify(operand)),
        AstNode::Binary { op, left, right } => {
            simplify_binary(*op, simplify(left), simplify(right))
        }
        AstNode::Call { name, args } => AstNode::Call {
            name: name.clone(),
            args: args.iter().map(simplify).collect(),
        },
        AstNode::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond = simplify(cond);
            let then_branch = simplify(then_branch);
            let else_branch = simplify(else_branch);
            match cond {
                AstNode::Bool(true) => then_branch,
                AstNode::Bool(false) => else_branch,
                _ => AstNode::if_expr(cond, then_branch, else_branch),
            }
        }
    }
}

fn simplify_unary(op: UnaryOp, operand: AstNode) -> AstNode {
    match (op, &operand) {
        (UnaryOp::Neg, AstNode::Number(n)) => AstNode::Number(-n),
        (UnaryOp::Not, AstNode::Bool(b)) => AstNode::Bool(!b),
        // --x -> x
        (UnaryOp::Neg, AstNode::Unary { op: UnaryOp::Neg, operand: inner }) => (**inner).clone(),
        // !!x -> x
        (UnaryOp::Not, AstNode::Unary { op: UnaryOp::Not, operand: inner }) => (**inner).clone(),
        _ => AstNode::unary(op, operand),
    }
}

fn simplify_binary(op: BinaryOp, left: AstNode, right: AstNode) -> AstNode {
    use AstNode::{Bool, Number};
    use BinaryOp::*;

    if let (Number(l), Number(r)) = (&left, &right) {
        let (l, r) = (*l, *r);
        match op {
            Add => return Number(l + r),
            Sub => return Number(l - r),
            Mul => return Number(l * r),
            Div if r != 0.0 => return Number(l / r),
            Mod if r != 0.0 => return Number(l % r),
            Pow => return Number(l.powf(r)),
            Eq => return Bool(l == r),
            Neq => return Bool(l != r),
            Lt => return Bool(l < r),
            Leq => return Bool(l <= r),
            Gt => return Bool(l > r),
            Geq => return Bool(l >= r),
            _ => {}
        }
    }

    if let (Bool(l), Bool(r)) = (&left, &right) {
        let (l, r) = (*l, *r);
        match op {
            And => return Bool(l && r),
            Or => return Bool(l || r),
            Eq => return Bool(l == r),
            Neq => return Bool(l != r),
            _ => {}
        }
    }

    // Algebraic identities that hold regardless of the other operand's value.
    match (op, &left, &right) {
        (Add, _, Number(n)) | (Add, Number(n), _) if *n == 0.0 => {
            return if matches!(left, Number(_)) { right } else { left }
        }
        (Sub, _, Number(n)) if *n == 0.0 => return left,
        (Sub, Number(n), _) if *n == 0.0 => return AstNode::unary(UnaryOp::Neg, right),
        (Mul, _, Number(n)) | (Mul, Number(n), _) if *n == 1.0 => {
            return if matches!(left, Number(_)) { right } else { left }
        }
        (Mul, _, Number(n)) | (Mul, Number(n), _) if *n == 0.0 => return Number(0.0),
        (Mul, _, Number(n)) if *n == -1.0 => return AstNode::unary(UnaryOp::Neg, left),
        (Mul, Number(n), _) if *n == -1.0 => return AstNode::unary(UnaryOp::Neg, right),
        (Div, _, Number(n)) if *n == 1.0 => return left,
        (Div, _, Number(n)) if *n == -1.0 => return AstNode::unary(UnaryOp::Neg, left),
        (Pow, _, Number(n)) if *n == 0.0 => return Number(1.0),
        (Pow, _, Number(n)) if *n == 1.0 => return left,
        (Pow, Number(n), _) if *n == 1.0 => return Number(1.0),
        (Pow, Number(n), _) if *n == 0.0 => return Number(0.0),
        (And, _, Bool(true)) | (And, Bool(true), _) => {
            return if matches!(left, Bool(_)) { right } else { left }
        }
        (And, _, Bool(false)) | (And, Bool(false), _) => return Bool(false),
        (Or, _, Bool(false)) | (Or, Bool(false), _) => {
            return if matches!(left, Bool(_)) { right } else { left }
        }
        (Or, _, Bool(true)) | (Or, Bool(true), _) => return Bool(true),
        _ => {}
    }

    // Identities that hold whenever both operands are the same expression,
    // regardless of what that expression is.
    if left == right {
        match op {
            Sub => return Number(0.0),
            Mod => return Number(0.0),
            Lt => return Bool(false),
            Gt => return Bool(false),
            Div => return Number(1.0),
            Leq => return Bool(true),
            Geq => return Bool(true),
            Eq => return Bool(true),
            Neq => return Bool(false),
            _ => {}
        }
    }

    AstNode::binary(op, left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode::{Bool, Number, Variable};

    #[test]
    fn folds_constant_arithmetic() {
        let tree = AstNode::binary(BinaryOp::Add, Number(1.0), Number(2.0));
        assert_eq!(simplify(&tree), Number(3.0));
    }

    #[test]
    fn leaves_division_by_zero_unfolded() {
        let tree = AstNode::binary(BinaryOp::Div, Number(1.0), Number(0.0));
        assert_eq!(simplify(&tree), tree);
    }

    #[test]
    fn applies_additive_identity() {
        let tree = AstNode::binary(BinaryOp::Add, Variable("x".into()), Number(0.0));
        assert_eq!(simplify(&tree), Variable("x".into()));
    }

    #[test]
    fn applies_multiplicative_zero() {
        let tree = AstNode::binary(BinaryOp::Mul, Variable("x".into()), Number(0.0));
        assert_eq!(simplify(&tree), Number(0.0));
    }

    #[test]
    fn collapses_double_negation() {
        let tree = AstNode::unary(UnaryOp::Neg, AstNode::unary(UnaryOp::Neg, Variable("x".into())));
        assert_eq!(simplify(&tree), Variable("x".into()));
    }

    #[test]
    fn folds_constant_if_branch() {
        let tree = AstNode::if_expr(Bool(true), Number(1.0), Number(2.0));
        assert_eq!(simplify(&tree), Number(1.0));
    }

    #[test]
    fn zero_minus_x_negates() {
        let tree = AstNode::binary(BinaryOp::Sub, Number(0.0), Variable("x".into()));
        assert_eq!(simplify(&tree), AstNode::unary(UnaryOp::Neg, Variable("x".into())));
    }

    #[test]
    fn multiplying_by_negative_one_negates() {
        let tree = AstNode::binary(BinaryOp::Mul, Variable("x".into()), Number(-1.0));
        assert_eq!(simplify(&tree), AstNode::unary(UnaryOp::Neg, Variable("x".into())));
        let tree = AstNode::binary(BinaryOp::Div, Variable("x".into()), Number(-1.0));
        assert_eq!(simplify(&tree), AstNode::unary(UnaryOp::Neg, Variable("x".into())));
    }

    #[test]
    fn power_identities() {
        let x = || Variable("x".into());
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Pow, x(), Number(0.0))), Number(1.0));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Pow, x(), Number(1.0))), x());
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Pow, Number(1.0), x())), Number(1.0));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Pow, Number(0.0), x())), Number(0.0));
    }

    #[test]
    fn same_expression_identities_fold() {
        let x = Variable("x".into());
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Sub, x.clone(), x.clone())), Number(0.0));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Mod, x.clone(), x.clone())), Number(0.0));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Lt, x.clone(), x.clone())), Bool(false));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Gt, x.clone(), x.clone())), Bool(false));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Div, x.clone(), x.clone())), Number(1.0));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Leq, x.clone(), x.clone())), Bool(true));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Geq, x.clone(), x.clone())), Bool(true));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Eq, x.clone(), x.clone())), Bool(true));
        assert_eq!(simplify(&AstNode::binary(BinaryOp::Neq, x.clone(), x.clone())), Bool(false));
    }

    #[test]
    fn same_expression_identities_are_idempotent() {
        let tree = AstNode::binary(BinaryOp::Sub, Variable("x".into()), Variable("x".into()));
        let once = simplify(&tree);
        let twice = simplify(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn simplification_is_idempotent() {
        let tree = AstNode::binary(
            BinaryOp::Add,
            AstNode::binary(BinaryOp::Mul, Variable("x".into()), Number(1.0)),
            Number(0.0),
        );
        let once = simplify(&tree);
        let twice = simplify(&once);
        assert_eq!(once, twice);
    }
}
