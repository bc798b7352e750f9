use super::*;
use crate::{
    algebra::{SortDirection, StreamOp},
    closure::{ArgRef, Closure, ClosureBuilder},
    error::ErrorClass,
    expr::{CompareOp, ElementScope},
    test_fixtures::{
        account, customer, customer_getter, customer_int_compare, lambda, metamodel, translator,
    },
    translator::Translator,
};
use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

fn fold_all(translator: &Translator, ops: Vec<StreamOp>) -> QueryAlgebra {
    let all = translator.stream_all("Customer").unwrap();

    ops.iter()
        .fold(all, |query, op| translator.fold(&query, op).unwrap())
}

fn text_of(translator: &Translator, ops: Vec<StreamOp>) -> String {
    translator
        .debug_query_string(&fold_all(translator, ops))
        .unwrap()
}

fn debt_below_capture(id: u64, cell: CaptureCell) -> Closure {
    lambda(
        ClosureBuilder::new(id)
            .param(customer())
            .capture(ValueType::Int)
            .returns(ValueType::Bool),
        vec![cell],
        |b| {
            b.load_param(0)
                .getter("Customer", "getDebt")
                .load_capture(0)
                .compare(CompareOp::Lt)
                .ret();
        },
    )
}

fn name_equals_capture(id: u64, name: &str) -> Closure {
    lambda(
        ClosureBuilder::new(id)
            .param(customer())
            .capture(ValueType::Text)
            .returns(ValueType::Bool),
        vec![CaptureCell::literal(name)],
        |b| {
            b.load_param(0)
                .getter("Customer", "getName")
                .load_capture(0)
                .call("String", "equals", 1)
                .ret();
        },
    )
}

#[test]
fn aliases_are_bijective_base_26() {
    let names: Vec<_> = [0, 1, 25, 26, 27, 701, 702]
        .into_iter()
        .map(alias_name)
        .collect();

    assert_eq!(names, ["A", "B", "Z", "AA", "AB", "ZZ", "AAA"]);
}

#[test]
fn plain_stream_selects_the_row() {
    assert_eq!(text_of(&translator(), Vec::new()), "SELECT A FROM Customer A");
}

#[test]
fn literal_filter_renders_inline() {
    let text = text_of(
        &translator(),
        vec![StreamOp::Where(customer_int_compare(
            1,
            "getDebt",
            CompareOp::Lt,
            90,
        ))],
    );

    assert_eq!(text, "SELECT A FROM Customer A WHERE ((A.debt) < 90)");
}

#[test]
fn captures_become_ordered_deduplicated_parameters() {
    let t = translator();
    let below = debt_below_capture(3, CaptureCell::literal(90));
    let query = fold_all(
        &t,
        vec![
            StreamOp::Where(below.clone()),
            StreamOp::Where(name_equals_capture(4, "Alice")),
            StreamOp::Where(below),
        ],
    );

    let rendered = t.explain(&query).unwrap();

    assert_eq!(
        rendered.text,
        "SELECT A FROM Customer A WHERE ((((A.debt) < :param0) AND ((A.name) = :param1)) AND ((A.debt) < :param0))"
    );
    let names: Vec<_> = rendered.bindings.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["param0", "param1"]);
    assert_eq!(rendered.bindings[0].value(), Value::Int(90));
    assert_eq!(rendered.bindings[1].value(), Value::from("Alice"));
    assert_eq!(rendered.bindings[1].closure, ClosureId(4));
}

#[test]
fn one_body_captured_twice_binds_each_value() {
    let t = translator();
    let query = fold_all(
        &t,
        vec![
            StreamOp::Where(debt_below_capture(3, CaptureCell::literal(90))),
            StreamOp::Where(debt_below_capture(3, CaptureCell::literal(10))),
        ],
    );

    let rendered = t.explain(&query).unwrap();

    assert_eq!(
        rendered.text,
        "SELECT A FROM Customer A WHERE (((A.debt) < :param0) AND ((A.debt) < :param1))"
    );
    let values: Vec<_> = rendered.bindings.iter().map(Binding::value).collect();
    assert_eq!(values, [Value::Int(90), Value::Int(10)]);
}

#[test]
fn binding_values_are_read_when_asked() {
    let t = translator();
    let limit = Arc::new(AtomicI64::new(10));
    let reader = Arc::clone(&limit);
    let cell = CaptureCell::deferred(move || Value::Int(reader.load(Ordering::SeqCst)));
    let query = fold_all(&t, vec![StreamOp::Where(debt_below_capture(5, cell))]);

    let rendered = t.explain(&query).unwrap();
    limit.store(75, Ordering::SeqCst);

    assert_eq!(rendered.bindings[0].value(), Value::Int(75));
}

#[test]
fn parameter_prefix_comes_from_config() {
    let config = TranslatorConfig::from_toml_str("param_prefix = \"p\"").unwrap();
    let t = Translator::with_config(metamodel(), config);

    let text = text_of(
        &t,
        vec![StreamOp::Where(debt_below_capture(
            6,
            CaptureCell::literal(1),
        ))],
    );

    assert_eq!(text, "SELECT A FROM Customer A WHERE ((A.debt) < :p0)");
}

#[test]
fn aggregates_over_the_rendered_scope_are_inline() {
    let t = translator();

    assert_eq!(
        text_of(&t, vec![StreamOp::Count]),
        "SELECT COUNT(A) FROM Customer A"
    );
    assert_eq!(
        text_of(
            &t,
            vec![
                StreamOp::Where(customer_int_compare(7, "getDebt", CompareOp::Gt, 0)),
                StreamOp::Sum(customer_getter(8, "getDebt", ValueType::Int)),
            ]
        ),
        "SELECT SUM((A.debt)) FROM Customer A WHERE ((A.debt) > 0)"
    );
}

#[test]
fn aggregate_after_sort_renders_without_order_by() {
    let text = text_of(
        &translator(),
        vec![
            StreamOp::SortedBy {
                key: customer_getter(24, "getName", ValueType::Text),
                direction: SortDirection::Asc,
            },
            StreamOp::Sum(customer_getter(25, "getDebt", ValueType::Int)),
        ],
    );

    assert_eq!(text, "SELECT SUM((A.debt)) FROM Customer A");
}

#[test]
fn correlated_stream_renders_as_scalar_sub_select() {
    let positive = {
        let mut b = ClosureBuilder::new(11)
            .param(account())
            .capture(customer())
            .returns(ValueType::Bool);
        b.load_param(0)
            .getter("Account", "getBalance")
            .load_capture(0)
            .getter("Customer", "getDebt")
            .compare(CompareOp::Gt)
            .ret();
        b.build().unwrap()
    };
    let has_covering_account = lambda(
        ClosureBuilder::new(10)
            .param(customer())
            .returns(ValueType::Bool),
        Vec::new(),
        |b| {
            b.load_param(0)
                .getter("Customer", "getAccounts")
                .call_static("JinqStream", "from", 1)
                .make_closure(positive, vec![ArgRef::Param(0)])
                .call("JinqStream", "where", 1)
                .call("JinqStream", "count", 0)
                .constant(0)
                .compare(CompareOp::Gt)
                .ret();
        },
    );

    let text = text_of(&translator(), vec![StreamOp::Where(has_covering_account)]);

    assert_eq!(
        text,
        "SELECT A FROM Customer A WHERE ((SELECT COUNT(B) FROM A.accounts B WHERE ((B.balance) > (A.debt))) > 0)"
    );
}

#[test]
fn value_conditional_renders_as_case() {
    let debt_if_vip = lambda(
        ClosureBuilder::new(12).param(customer()).returns(ValueType::Int),
        Vec::new(),
        |b| {
            let otherwise = b.new_label();
            let end = b.new_label();
            b.load_param(0)
                .getter("Customer", "isVip")
                .if_zero(CompareOp::Eq, otherwise)
                .load_param(0)
                .getter("Customer", "getDebt")
                .goto(end);
            b.bind(otherwise).unwrap().constant(0);
            b.bind(end).unwrap().ret();
        },
    );

    assert_eq!(
        text_of(&translator(), vec![StreamOp::Select(debt_if_vip)]),
        "SELECT (CASE WHEN (NOT (A.vip)) THEN 0 ELSE (A.debt) END) FROM Customer A"
    );
}

#[test]
fn remainder_renders_as_mod() {
    let rem = lambda(
        ClosureBuilder::new(13).param(customer()).returns(ValueType::Int),
        Vec::new(),
        |b| {
            b.load_param(0)
                .getter("Customer", "getDebt")
                .constant(7)
                .arith(ArithOp::Rem)
                .ret();
        },
    );

    assert_eq!(
        text_of(&translator(), vec![StreamOp::Select(rem)]),
        "SELECT MOD((A.debt), 7) FROM Customer A"
    );
}

#[test]
fn string_methods_map_to_functions_and_like() {
    let prefix = lambda(
        ClosureBuilder::new(14).param(customer()).returns(ValueType::Bool),
        Vec::new(),
        |b| {
            b.load_param(0)
                .getter("Customer", "getName")
                .call("String", "toLowerCase", 0)
                .constant("al")
                .call("String", "startsWith", 1)
                .ret();
        },
    );

    assert_eq!(
        text_of(&translator(), vec![StreamOp::Where(prefix)]),
        "SELECT A FROM Customer A WHERE (LOWER((A.name)) LIKE 'al%')"
    );
}

#[test]
fn distinct_ordering_and_paging() {
    let t = translator();
    let identity = lambda(
        ClosureBuilder::new(15).param(ValueType::Text).returns(ValueType::Text),
        Vec::new(),
        |b| {
            b.load_param(0).ret();
        },
    );
    let query = fold_all(
        &t,
        vec![
            StreamOp::Select(customer_getter(16, "getCountry", ValueType::Text)),
            StreamOp::Distinct,
            StreamOp::SortedBy {
                key: identity,
                direction: SortDirection::Asc,
            },
            StreamOp::Skip(10),
            StreamOp::Limit(5),
        ],
    );

    let rendered = t.explain(&query).unwrap();

    assert_eq!(
        rendered.text,
        "SELECT DISTINCT (A.country) FROM Customer A ORDER BY (A.country) ASC"
    );
    assert_eq!(rendered.first_result, Some(10));
    assert_eq!(rendered.max_results, Some(5));
}

#[test]
fn grouping_renders_group_by_and_having() {
    let count = lambda(
        ClosureBuilder::new(17)
            .param(ValueType::Text)
            .param(ValueType::stream(customer()))
            .returns(ValueType::Long),
        Vec::new(),
        |b| {
            b.load_param(1).call("JinqStream", "count", 0).ret();
        },
    );
    let crowded = lambda(
        ClosureBuilder::new(18)
            .param(ValueType::Tuple(vec![ValueType::Text, ValueType::Long]))
            .returns(ValueType::Bool),
        Vec::new(),
        |b| {
            b.load_param(0)
                .call("Pair", "getTwo", 0)
                .constant(1)
                .compare(CompareOp::Gt)
                .ret();
        },
    );

    let text = text_of(
        &translator(),
        vec![
            StreamOp::Group {
                key: customer_getter(19, "getCountry", ValueType::Text),
                value: count,
            },
            StreamOp::Where(crowded),
        ],
    );

    assert_eq!(
        text,
        "SELECT (A.country), COUNT(A) FROM Customer A GROUP BY (A.country) HAVING (COUNT(A) > 1)"
    );
}

#[test]
fn joins_render_both_sources() {
    let t = translator();
    let navigation = lambda(
        ClosureBuilder::new(20)
            .param(customer())
            .returns(ValueType::stream(account())),
        Vec::new(),
        |b| {
            b.load_param(0)
                .getter("Customer", "getAccounts")
                .call_static("JinqStream", "from", 1)
                .ret();
        },
    );
    let cross = lambda(
        ClosureBuilder::new(21)
            .param(customer())
            .param(ValueType::StreamSource)
            .returns(ValueType::stream(account())),
        Vec::new(),
        |b| {
            b.load_param(1)
                .constant("Account")
                .call("InQueryStreamSource", "stream", 1)
                .ret();
        },
    );

    assert_eq!(
        text_of(&t, vec![StreamOp::Join(navigation)]),
        "SELECT A, B FROM Customer A JOIN A.accounts B"
    );
    assert_eq!(
        text_of(&t, vec![StreamOp::Join(cross)]),
        "SELECT A, B FROM Customer A, Account B"
    );
}

#[test]
fn rendering_is_deterministic() {
    let t = translator();
    let query = fold_all(
        &t,
        vec![
            StreamOp::Where(debt_below_capture(22, CaptureCell::literal(5))),
            StreamOp::Where(name_equals_capture(23, "Bob")),
        ],
    );

    assert_eq!(t.explain(&query).unwrap(), t.explain(&query).unwrap());
}

#[test]
fn leftover_placeholder_is_an_invariant_violation() {
    let broken = QueryAlgebra::entity("Customer")
        .filtered(
            Expr::compare(
                CompareOp::Eq,
                Expr::element(ElementScope(3), ValueType::Text),
                Expr::constant("x"),
            ),
            SourceId(1),
        )
        .unwrap();

    let err = render(&broken, &TranslatorConfig::default()).unwrap_err();

    assert!(matches!(err, QueryError::Render(_)));
    assert_eq!(err.class(), ErrorClass::InvariantViolation);
}
