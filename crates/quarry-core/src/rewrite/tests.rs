use super::*;
use crate::{
    closure::{CaptureCell, ClosureId},
    expr::{
        AggregateFn, ArithOp, BinaryOp, BindingRef, CompareOp, ElementScope, ExprKind, SourceId,
        UnaryOp,
    },
    model::FieldRef,
    value::{Value, ValueType},
};
use proptest::prelude::*;
use std::sync::LazyLock;

const FLAGS: usize = 3;
const COUNTER_SLOT: usize = 9;

// One cell per slot so rebuilt params compare equal.
static FLAG_CELLS: LazyLock<Vec<CaptureCell>> =
    LazyLock::new(|| (0..FLAGS).map(|_| CaptureCell::literal(false)).collect());
static COUNTER_CELL: LazyLock<CaptureCell> = LazyLock::new(|| CaptureCell::literal(0));

fn flag(slot: usize) -> Expr {
    Expr::param(BindingRef {
        closure: ClosureId(1),
        slot,
        ty: ValueType::Bool,
        cell: FLAG_CELLS[slot].clone(),
    })
}

fn counter() -> Expr {
    Expr::param(BindingRef {
        closure: ClosureId(1),
        slot: COUNTER_SLOT,
        ty: ValueType::Int,
        cell: COUNTER_CELL.clone(),
    })
}

fn debt() -> Expr {
    Expr::path(
        Expr::row(SourceId(0), ValueType::entity("Customer")),
        FieldRef::new("Customer", "debt", ValueType::Int),
    )
}

//
// Reference evaluation
//

fn eval_int(expr: &Expr, counter: i64) -> i64 {
    match expr.kind() {
        ExprKind::Constant(Value::Int(i)) => *i,
        ExprKind::Param(binding) if binding.slot == COUNTER_SLOT => counter,
        other => panic!("not an integer operand: {other:?}"),
    }
}

fn eval_bool(expr: &Expr, flags: &[bool], counter: i64) -> bool {
    match expr.kind() {
        ExprKind::Constant(Value::Bool(b)) => *b,
        ExprKind::Param(binding) => flags[binding.slot],
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => !eval_bool(operand, flags, counter),
        ExprKind::Binary { op, left, right } => match op {
            BinaryOp::And => eval_bool(left, flags, counter) && eval_bool(right, flags, counter),
            BinaryOp::Or => eval_bool(left, flags, counter) || eval_bool(right, flags, counter),
            BinaryOp::Compare(op) => {
                op.holds(eval_int(left, counter).cmp(&eval_int(right, counter)))
            }
            other => panic!("not a boolean operator: {other:?}"),
        },
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if eval_bool(cond, flags, counter) {
                eval_bool(then, flags, counter)
            } else {
                eval_bool(otherwise, flags, counter)
            }
        }
        other => panic!("not a boolean expression: {other:?}"),
    }
}

//
// Strategies
//

fn arb_compare_op() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Lt),
        Just(CompareOp::Le),
        Just(CompareOp::Gt),
        Just(CompareOp::Ge),
    ]
}

fn arb_predicate() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Expr::bool),
        (0..FLAGS).prop_map(flag),
        (arb_compare_op(), -3i64..3)
            .prop_map(|(op, c)| Expr::compare(op, counter(), Expr::constant(c))),
        (arb_compare_op(), -3i64..3, -3i64..3)
            .prop_map(|(op, a, b)| Expr::compare(op, Expr::constant(a), Expr::constant(b))),
    ];

    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(Expr::not),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::and(a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::or(a, b)),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(c, a, b)| Expr::conditional(c, a, b)),
        ]
    })
}

proptest! {
    #[test]
    fn simplify_preserves_truth_table(predicate in arb_predicate()) {
        let simplified = simplify(&predicate);

        for bits in 0..(1u8 << FLAGS) {
            let flags: Vec<bool> = (0..FLAGS).map(|i| bits & (1 << i) != 0).collect();
            for c in -4..4 {
                prop_assert_eq!(
                    eval_bool(&predicate, &flags, c),
                    eval_bool(&simplified, &flags, c)
                );
            }
        }
    }

    #[test]
    fn simplify_is_idempotent(predicate in arb_predicate()) {
        let once = simplify(&predicate);
        let twice = simplify(&once);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn simplified_predicates_negate_only_atoms(predicate in arb_predicate()) {
        let mut stray = None;
        simplify(&predicate).visit(&mut |node| {
            if let ExprKind::Unary { op: UnaryOp::Not, operand } = node.kind()
                && !matches!(operand.kind(), ExprKind::Param(_))
            {
                stray = Some(node.clone());
            }
        });

        prop_assert!(stray.is_none(), "negation over a compound: {:?}", stray);
    }
}

#[test]
fn de_morgan_pushes_negation_to_comparisons() {
    let small = Expr::compare(CompareOp::Lt, debt(), Expr::constant(5));
    let expr = Expr::not(Expr::and(flag(0), small));

    assert_eq!(
        simplify(&expr),
        Expr::or(
            Expr::not(flag(0)),
            Expr::compare(CompareOp::Ge, debt(), Expr::constant(5))
        )
    );
}

#[test]
fn literal_arithmetic_folds() {
    let expr = Expr::binary(
        ArithOp::Mul.into(),
        Expr::binary(ArithOp::Add.into(), Expr::constant(2), Expr::constant(3)),
        Expr::constant(4),
    );
    let cmp = Expr::compare(CompareOp::Lt, Expr::constant(3), Expr::constant(5.5));

    assert_eq!(simplify(&expr), Expr::constant(20));
    assert_eq!(simplify(&cmp), Expr::bool(true));
}

#[test]
fn division_by_zero_is_left_for_the_database() {
    let expr = Expr::binary(ArithOp::Div.into(), Expr::constant(1), Expr::constant(0));

    assert!(simplify(&expr).ptr_eq(&expr));
}

#[test]
fn literal_concatenation_folds() {
    let expr = Expr::binary(BinaryOp::Concat, Expr::constant("ab"), Expr::constant("cd"));

    assert_eq!(simplify(&expr), Expr::constant("abcd"));
}

#[test]
fn numeric_conditional_is_kept() {
    let expr = Expr::conditional(flag(0), debt(), Expr::constant(0));

    assert!(simplify(&expr).ptr_eq(&expr));
    assert_eq!(
        simplify(&Expr::conditional(Expr::bool(false), debt(), Expr::constant(0))),
        Expr::constant(0)
    );
}

#[test]
fn tuple_components_fold_to_their_source() {
    let pair = Expr::tuple(vec![debt(), Expr::constant("x")]);

    assert_eq!(simplify(&Expr::tuple_get(pair, 0)), debt());
}

#[test]
fn untouched_subtrees_keep_identity() {
    let cmp = Expr::compare(CompareOp::Gt, debt(), Expr::constant(1));
    let expr = Expr::and(cmp.clone(), Expr::bool(true));

    assert!(simplify(&expr).ptr_eq(&cmp));
}

#[test]
fn inline_element_replaces_only_its_scope() {
    let mine = Expr::element(ElementScope(1), ValueType::Int);
    let other = Expr::element(ElementScope(2), ValueType::Int);
    let expr = Expr::binary(ArithOp::Add.into(), mine, other.clone());

    let inlined = inline_element(&expr, ElementScope(1), &debt());

    assert_eq!(inlined, Expr::binary(ArithOp::Add.into(), debt(), other));
}

#[test]
fn nested_tuples_flatten_in_order() {
    let a = Expr::constant(1);
    let b = Expr::constant(2);
    let c = debt();
    let nested = Expr::tuple(vec![Expr::tuple(vec![a.clone(), b.clone()]), c.clone()]);

    assert_eq!(flatten_tuple(&nested), vec![a, b, c]);
}

#[test]
fn deep_simplify_reaches_nested_queries() {
    let over = QueryAlgebra::entity("Customer")
        .filtered(Expr::not(Expr::not(flag(0))), SourceId(1))
        .unwrap();
    let count = Expr::aggregate(AggregateFn::Count, None, over);

    let shallow = simplify(&count);
    let deep = simplify_deep(&count);

    assert!(shallow.ptr_eq(&count));
    let Some(query) = deep.nested_query() else {
        panic!("expected an aggregate, got {deep:?}");
    };
    assert_eq!(query.filters, vec![flag(0)]);
}

#[test]
fn map_expr_stops_at_replaced_nodes() {
    let expr = Expr::and(flag(0), flag(1));
    let mut visited = 0;

    let mapped = map_expr(&expr, &mut |node| {
        visited += 1;
        match node.kind() {
            ExprKind::Binary { .. } => Some(Expr::bool(true)),
            _ => None,
        }
    });

    assert_eq!(mapped, Expr::bool(true));
    assert_eq!(visited, 1);
}
