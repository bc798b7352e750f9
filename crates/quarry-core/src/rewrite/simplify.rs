use crate::{
    expr::{ArithOp, BinaryOp, Expr, ExprKind, UnaryOp},
    value::{Value, ValueType},
};
use std::cmp::Ordering;

/// Bottom-up normalization of one expression. Nested queries are left as
/// they are; `simplify_deep` covers those.
#[must_use]
pub fn simplify(expr: &Expr) -> Expr {
    let children = expr.children().into_iter().map(simplify).collect();
    let node = expr.with_children(children);

    simplify_node(&node)
}

/// Normalize one node whose children are already normalized.
pub(crate) fn simplify_node(expr: &Expr) -> Expr {
    match expr.kind() {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => negate(operand),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match operand.as_constant() {
            Some(Value::Int(i)) => i
                .checked_neg()
                .map_or_else(|| expr.clone(), |n| typed(Value::Int(n), expr)),
            Some(Value::Double(d)) => typed(Value::Double(-d), expr),
            _ => expr.clone(),
        },

        ExprKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => match (left.as_bool(), right.as_bool()) {
            (Some(false), _) | (_, Some(false)) => Expr::bool(false),
            (Some(true), _) => right.clone(),
            (_, Some(true)) => left.clone(),
            _ => expr.clone(),
        },
        ExprKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => match (left.as_bool(), right.as_bool()) {
            (Some(true), _) | (_, Some(true)) => Expr::bool(true),
            (Some(false), _) => right.clone(),
            (_, Some(false)) => left.clone(),
            _ => expr.clone(),
        },
        ExprKind::Binary {
            op: BinaryOp::Compare(op),
            left,
            right,
        } => match (left.as_constant(), right.as_constant()) {
            (Some(l), Some(r)) => compare_constants(l, r)
                .map_or_else(|| expr.clone(), |ordering| Expr::bool(op.holds(ordering))),
            _ => expr.clone(),
        },
        ExprKind::Binary {
            op: BinaryOp::Arith(op),
            left,
            right,
        } => match (left.as_constant(), right.as_constant()) {
            (Some(l), Some(r)) => {
                fold_arith(*op, l, r).map_or_else(|| expr.clone(), |value| typed(value, expr))
            }
            _ => expr.clone(),
        },
        ExprKind::Binary {
            op: BinaryOp::Concat,
            left,
            right,
        } => match (left.as_constant(), right.as_constant()) {
            (Some(Value::Text(l)), Some(Value::Text(r))) => Expr::constant(format!("{l}{r}")),
            _ => expr.clone(),
        },

        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => match cond.as_bool() {
            Some(true) => then.clone(),
            Some(false) => otherwise.clone(),
            None if then == otherwise => then.clone(),
            None if expr.ty == ValueType::Bool => {
                // (then AND cond) OR (otherwise AND NOT cond)
                let guarded = simplify_node(&Expr::and(then.clone(), cond.clone()));
                let negated = negate(cond);
                let fallback = simplify_node(&Expr::and(otherwise.clone(), negated));

                simplify_node(&Expr::or(guarded, fallback))
            }
            None => expr.clone(),
        },

        ExprKind::TupleGet { base, index } => match base.kind() {
            ExprKind::Tuple(items) => items.get(*index).cloned().unwrap_or_else(|| expr.clone()),
            _ => expr.clone(),
        },

        _ => expr.clone(),
    }
}

// Logical complement of an already-normalized operand.
fn negate(operand: &Expr) -> Expr {
    if let Some(b) = operand.as_bool() {
        return Expr::bool(!b);
    }

    match operand.kind() {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand: inner,
        } => inner.clone(),
        ExprKind::Binary {
            op: BinaryOp::Compare(op),
            left,
            right,
        } => Expr::compare(op.negate(), left.clone(), right.clone()),
        ExprKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => simplify_node(&Expr::or(negate(left), negate(right))),
        ExprKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => simplify_node(&Expr::and(negate(left), negate(right))),
        _ => Expr::not(operand.clone()),
    }
}

fn typed(value: Value, like: &Expr) -> Expr {
    Expr::constant(value).with_type(like.ty.clone())
}

#[expect(clippy::cast_precision_loss)]
fn compare_constants(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Double(l), Value::Double(r)) => l.partial_cmp(r),
        (Value::Int(l), Value::Double(r)) => (*l as f64).partial_cmp(r),
        (Value::Double(l), Value::Int(r)) => l.partial_cmp(&(*r as f64)),
        (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

#[expect(clippy::cast_precision_loss)]
fn fold_arith(op: ArithOp, left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            let value = match op {
                ArithOp::Add => l.checked_add(*r),
                ArithOp::Sub => l.checked_sub(*r),
                ArithOp::Mul => l.checked_mul(*r),
                ArithOp::Div => l.checked_div(*r),
                ArithOp::Rem => l.checked_rem(*r),
            };
            value.map(Value::Int)
        }
        (Value::Int(l), Value::Double(r)) => fold_double(op, *l as f64, *r),
        (Value::Double(l), Value::Int(r)) => fold_double(op, *l, *r as f64),
        (Value::Double(l), Value::Double(r)) => fold_double(op, *l, *r),
        _ => None,
    }
}

fn fold_double(op: ArithOp, left: f64, right: f64) -> Option<Value> {
    let value = match op {
        ArithOp::Add => left + right,
        ArithOp::Sub => left - right,
        ArithOp::Mul => left * right,
        ArithOp::Div => left / right,
        ArithOp::Rem => left % right,
    };

    value.is_finite().then_some(Value::Double(value))
}
