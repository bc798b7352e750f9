use super::*;
use crate::{
    closure::{Closure, ClosureBuilder},
    expr::{AggregateFn, ArithOp, CompareOp},
    model::FieldRef,
    test_fixtures::{
        account, customer, customer_getter, customer_int_compare, customer_text_equals, lambda,
        translator,
    },
    translator::Translator,
};

fn customers(translator: &Translator) -> QueryAlgebra {
    translator.stream_all("Customer").unwrap()
}

fn customer_field(name: &str, ty: ValueType) -> Expr {
    Expr::path(
        Expr::row(SourceId(0), customer()),
        FieldRef::new("Customer", name, ty),
    )
}

fn count_per_group() -> Closure {
    lambda(
        ClosureBuilder::new(40)
            .param(ValueType::Text)
            .param(ValueType::stream(customer()))
            .returns(ValueType::Long),
        Vec::new(),
        |b| {
            b.load_param(1).call("JinqStream", "count", 0).ret();
        },
    )
}

fn grouped_by_country(translator: &Translator) -> QueryAlgebra {
    translator
        .fold(
            &customers(translator),
            &StreamOp::Group {
                key: customer_getter(41, "getCountry", ValueType::Text),
                value: count_per_group(),
            },
        )
        .unwrap()
}

fn unsupported_operation(err: &QueryError) -> Option<&'static str> {
    match err {
        QueryError::UnsupportedOperation { operation, .. } => Some(*operation),
        _ => None,
    }
}

#[test]
fn unknown_entity_cannot_be_streamed() {
    let err = translator().stream_all("Invoice").unwrap_err();

    assert!(matches!(err, QueryError::UnknownEntity(name) if name == "Invoice"));
}

#[test]
fn chained_filters_conjoin_without_touching_ancestors() {
    let t = translator();
    let all = customers(&t);
    let cheap = t
        .fold(&all, &StreamOp::Where(customer_int_compare(1, "getDebt", CompareOp::Lt, 90)))
        .unwrap();
    let cheap_uk = t
        .fold(&cheap, &StreamOp::Where(customer_text_equals(2, "getCountry", "UK")))
        .unwrap();

    assert!(all.filters.is_empty());
    assert_eq!(cheap.filters.len(), 1);
    assert_eq!(cheap_uk.filters.len(), 2);
    assert!(cheap_uk.upstream.as_ref().is_some_and(|up| up.ptr_eq(&cheap)));
    assert_eq!(cheap_uk.depth(), 3);
    assert_eq!(
        cheap_uk.filters[0],
        Expr::compare(
            CompareOp::Lt,
            customer_field("debt", ValueType::Int),
            Expr::constant(90)
        )
    );
}

#[test]
fn branching_from_one_ancestor_leaves_it_unchanged() {
    let t = translator();
    let filtered = t
        .fold(
            &customers(&t),
            &StreamOp::Where(customer_int_compare(1, "getDebt", CompareOp::Gt, 0)),
        )
        .unwrap();

    let limited = t.fold(&filtered, &StreamOp::Limit(5)).unwrap();
    let sorted = t
        .fold(
            &filtered,
            &StreamOp::SortedBy {
                key: customer_getter(2, "getName", ValueType::Text),
                direction: SortDirection::Asc,
            },
        )
        .unwrap();

    assert_eq!(filtered.limit, None);
    assert!(filtered.order_by.is_empty());
    assert_eq!(limited.limit, Some(5));
    assert!(limited.order_by.is_empty());
    assert_eq!(sorted.limit, None);
    assert_eq!(sorted.order_by.len(), 1);
    assert!(limited.upstream.as_ref().is_some_and(|up| up.ptr_eq(&filtered)));
    assert!(sorted.upstream.as_ref().is_some_and(|up| up.ptr_eq(&filtered)));
}

#[test]
fn select_after_select_composes_projections() {
    let t = translator();
    let debts = t
        .fold(
            &customers(&t),
            &StreamOp::Select(customer_getter(1, "getDebt", ValueType::Int)),
        )
        .unwrap();
    let doubled = lambda(
        ClosureBuilder::new(2).param(ValueType::Int).returns(ValueType::Int),
        Vec::new(),
        |b| {
            b.load_param(0).constant(2).arith(ArithOp::Mul).ret();
        },
    );

    let query = t.fold(&debts, &StreamOp::Select(doubled)).unwrap();

    assert_eq!(
        query.projection,
        Some(Expr::binary(
            ArithOp::Mul.into(),
            customer_field("debt", ValueType::Int),
            Expr::constant(2)
        ))
    );
    assert_eq!(query.row_type(), ValueType::Int);
}

#[test]
fn grouping_projects_key_and_value() {
    let t = translator();
    let all = customers(&t);
    let grouped = grouped_by_country(&t);

    let country = customer_field("country", ValueType::Text);
    let count = Expr::aggregate(AggregateFn::Count, None, all);

    assert_eq!(grouped.shape, QueryShape::Grouped);
    assert_eq!(grouped.group_by, vec![country.clone()]);
    assert_eq!(grouped.projection, Some(Expr::tuple(vec![country, count])));
}

#[test]
fn select_after_group_is_rejected() {
    let t = translator();
    let grouped = grouped_by_country(&t);

    let err = t
        .fold(
            &grouped,
            &StreamOp::Select(lambda(
                ClosureBuilder::new(3)
                    .param(ValueType::Tuple(vec![ValueType::Text, ValueType::Long]))
                    .returns(ValueType::Text),
                Vec::new(),
                |b| {
                    b.load_param(0).call("Pair", "getOne", 0).ret();
                },
            )),
        )
        .unwrap_err();

    assert_eq!(unsupported_operation(&err), Some("select"));
}

#[test]
fn where_after_group_constrains_groups() {
    let t = translator();
    let grouped = grouped_by_country(&t);
    let busy = lambda(
        ClosureBuilder::new(4)
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

    let query = t.fold(&grouped, &StreamOp::Where(busy)).unwrap();

    assert!(query.filters.is_empty());
    assert_eq!(query.having.len(), 1);
    let ExprKind::Binary { left, .. } = query.having[0].kind() else {
        panic!("expected a comparison, got {:?}", query.having[0]);
    };
    assert!(matches!(
        left.kind(),
        ExprKind::Aggregate {
            func: AggregateFn::Count,
            ..
        }
    ));
}

#[test]
fn later_sort_becomes_most_significant() {
    let t = translator();
    let by_debt = t
        .fold(
            &customers(&t),
            &StreamOp::SortedBy {
                key: customer_getter(1, "getDebt", ValueType::Int),
                direction: SortDirection::Desc,
            },
        )
        .unwrap();
    let by_name = t
        .fold(
            &by_debt,
            &StreamOp::SortedBy {
                key: customer_getter(2, "getName", ValueType::Text),
                direction: SortDirection::Asc,
            },
        )
        .unwrap();

    let keys: Vec<_> = by_name
        .order_by
        .iter()
        .map(|key| (key.expr.clone(), key.direction))
        .collect();
    assert_eq!(
        keys,
        vec![
            (customer_field("name", ValueType::Text), SortDirection::Asc),
            (customer_field("debt", ValueType::Int), SortDirection::Desc),
        ]
    );
}

#[test]
fn sorting_by_an_entity_is_rejected() {
    let t = translator();
    let identity = lambda(
        ClosureBuilder::new(5).param(customer()).returns(customer()),
        Vec::new(),
        |b| {
            b.load_param(0).ret();
        },
    );

    let err = t
        .fold(
            &customers(&t),
            &StreamOp::SortedBy {
                key: identity,
                direction: SortDirection::Asc,
            },
        )
        .unwrap_err();

    assert_eq!(unsupported_operation(&err), Some("sorted_by"));
}

#[test]
fn paging_accumulates_until_limited() {
    let t = translator();
    let all = customers(&t);

    let skipped = t.fold(&all, &StreamOp::Skip(2)).unwrap();
    let skipped = t.fold(&skipped, &StreamOp::Skip(3)).unwrap();
    let limited = t.fold(&skipped, &StreamOp::Limit(10)).unwrap();
    let limited = t.fold(&limited, &StreamOp::Limit(4)).unwrap();

    assert_eq!(limited.skip, Some(5));
    assert_eq!(limited.limit, Some(4));

    let err = t.fold(&limited, &StreamOp::Skip(1)).unwrap_err();
    assert_eq!(unsupported_operation(&err), Some("skip"));

    let err = t
        .fold(
            &limited,
            &StreamOp::Where(customer_int_compare(6, "getDebt", CompareOp::Gt, 0)),
        )
        .unwrap_err();
    assert_eq!(unsupported_operation(&err), Some("where"));
}

#[test]
fn navigational_join_pairs_rows_with_collection_elements() {
    let t = translator();
    let accounts = lambda(
        ClosureBuilder::new(7)
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

    let query = t.fold(&customers(&t), &StreamOp::Join(accounts)).unwrap();

    assert_eq!(query.sources.len(), 2);
    assert_eq!(query.sources[1].id, SourceId(1));
    assert_eq!(
        query.sources[1].kind,
        SourceKind::Navigation(Expr::path(
            Expr::row(SourceId(0), customer()),
            FieldRef::new(
                "Customer",
                "accounts",
                ValueType::Collection(Box::new(account()))
            ),
        ))
    );
    assert_eq!(
        query.row_type(),
        ValueType::Tuple(vec![customer(), account()])
    );
    assert_eq!(query.next_source, SourceId(2));
}

#[test]
fn entity_join_adds_a_fresh_source() {
    let t = translator();
    let accounts = lambda(
        ClosureBuilder::new(8)
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

    let query = t.fold(&customers(&t), &StreamOp::Join(accounts)).unwrap();

    assert_eq!(query.sources[1], Source::entity(SourceId(1), "Account"));
    assert_eq!(
        query.projection,
        Some(Expr::tuple(vec![
            Expr::row(SourceId(0), customer()),
            Expr::row(SourceId(1), account()),
        ]))
    );
}

#[test]
fn sum_requires_numeric_values() {
    let t = translator();

    let err = t
        .fold(
            &customers(&t),
            &StreamOp::Sum(customer_getter(9, "getName", ValueType::Text)),
        )
        .unwrap_err();
    assert_eq!(unsupported_operation(&err), Some("aggregate"));

    let total = t
        .fold(
            &customers(&t),
            &StreamOp::Sum(customer_getter(10, "getSalary", ValueType::Int)),
        )
        .unwrap();
    assert_eq!(total.shape, QueryShape::Aggregated);
    assert_eq!(total.row_type(), ValueType::Long);
}

#[test]
fn aggregated_stream_accepts_no_further_rows_operations() {
    let t = translator();
    let counted = t.fold(&customers(&t), &StreamOp::Count).unwrap();

    let err = t.fold(&counted, &StreamOp::Distinct).unwrap_err();

    assert_eq!(counted.row_type(), ValueType::Long);
    assert_eq!(unsupported_operation(&err), Some("distinct"));
}

#[test]
fn aggregating_distinct_rows_is_rejected() {
    let t = translator();
    let countries = t
        .fold(
            &customers(&t),
            &StreamOp::Select(customer_getter(11, "getCountry", ValueType::Text)),
        )
        .unwrap();
    let distinct = t.fold(&countries, &StreamOp::Distinct).unwrap();

    let count = t.fold(&distinct, &StreamOp::Count).unwrap_err();
    let max = t
        .fold(
            &distinct,
            &StreamOp::Max(lambda(
                ClosureBuilder::new(12).param(ValueType::Text).returns(ValueType::Text),
                Vec::new(),
                |b| {
                    b.load_param(0).ret();
                },
            )),
        )
        .unwrap_err();

    assert_eq!(unsupported_operation(&count), Some("aggregate"));
    assert_eq!(unsupported_operation(&max), Some("aggregate"));
    assert!(t.fold(&countries, &StreamOp::Count).is_ok());
}

#[test]
fn aggregating_drops_row_ordering() {
    let t = translator();
    let sorted = t
        .fold(
            &customers(&t),
            &StreamOp::SortedBy {
                key: customer_getter(13, "getName", ValueType::Text),
                direction: SortDirection::Asc,
            },
        )
        .unwrap();

    let total = t
        .fold(
            &sorted,
            &StreamOp::Sum(customer_getter(14, "getDebt", ValueType::Int)),
        )
        .unwrap();

    assert_eq!(sorted.order_by.len(), 1);
    assert!(total.order_by.is_empty());
}

#[test]
fn map_expressions_keeps_identity_when_nothing_changes() {
    let t = translator();
    let query = t
        .fold(
            &customers(&t),
            &StreamOp::Where(customer_int_compare(1, "getDebt", CompareOp::Lt, 90)),
        )
        .unwrap();

    let same = query.map_expressions(&mut Expr::clone);

    assert!(same.ptr_eq(&query));
}
