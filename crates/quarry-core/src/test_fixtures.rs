//! Shared fixture metamodel: customers with accounts.

use crate::{
    closure::{CaptureCell, Closure, ClosureBuilder},
    expr::CompareOp,
    model::{EntityModel, FieldKind, FieldModel, Metamodel},
    translator::Translator,
    value::ValueType,
};

pub(crate) static CUSTOMER_FIELDS: [FieldModel; 6] = [
    FieldModel::new("name", "getName", FieldKind::Text),
    FieldModel::new("country", "getCountry", FieldKind::Text),
    FieldModel::new("debt", "getDebt", FieldKind::Int),
    FieldModel::new("salary", "getSalary", FieldKind::Int),
    FieldModel::new("vip", "isVip", FieldKind::Bool),
    FieldModel::new("accounts", "getAccounts", FieldKind::Collection("Account")),
];

pub(crate) static CUSTOMER: EntityModel = EntityModel::new("Customer", &CUSTOMER_FIELDS);

pub(crate) static ACCOUNT_FIELDS: [FieldModel; 3] = [
    FieldModel::new("number", "getNumber", FieldKind::Text),
    FieldModel::new("balance", "getBalance", FieldKind::Long),
    FieldModel::new("owner", "getOwner", FieldKind::Entity("Customer")),
];

pub(crate) static ACCOUNT: EntityModel = EntityModel::new("Account", &ACCOUNT_FIELDS);

pub(crate) fn metamodel() -> Metamodel {
    Metamodel::new().with(&CUSTOMER).with(&ACCOUNT)
}

pub(crate) fn translator() -> Translator {
    Translator::new(metamodel())
}

//
// Closure helpers
//

pub(crate) fn customer() -> ValueType {
    ValueType::entity("Customer")
}

pub(crate) fn account() -> ValueType {
    ValueType::entity("Account")
}

/// Assemble a closure body with `emit` and pair it with `captured`.
pub(crate) fn lambda(
    builder: ClosureBuilder,
    captured: Vec<CaptureCell>,
    emit: impl FnOnce(&mut ClosureBuilder),
) -> Closure {
    let mut builder = builder;
    emit(&mut builder);

    Closure::capturing(builder.build().unwrap(), captured)
}

/// `c -> c.<getter>()` over a customer.
pub(crate) fn customer_getter(id: u64, getter: &str, returns: ValueType) -> Closure {
    lambda(
        ClosureBuilder::new(id).param(customer()).returns(returns),
        Vec::new(),
        |b| {
            b.load_param(0).getter("Customer", getter).ret();
        },
    )
}

/// `c -> c.<getter>().equals(<literal>)` over a customer.
pub(crate) fn customer_text_equals(id: u64, getter: &str, literal: &str) -> Closure {
    lambda(
        ClosureBuilder::new(id).param(customer()).returns(ValueType::Bool),
        Vec::new(),
        |b| {
            b.load_param(0)
                .getter("Customer", getter)
                .constant(literal)
                .call("String", "equals", 1)
                .ret();
        },
    )
}

/// `c -> c.<getter>() <op> <literal>` compiled as a branch over 0/1.
pub(crate) fn customer_int_compare(id: u64, getter: &str, op: CompareOp, literal: i64) -> Closure {
    lambda(
        ClosureBuilder::new(id).param(customer()).returns(ValueType::Bool),
        Vec::new(),
        |b| {
            let otherwise = b.new_label();
            let end = b.new_label();
            b.load_param(0)
                .getter("Customer", getter)
                .constant(literal)
                .if_cmp(op.negate(), otherwise)
                .constant(1)
                .goto(end);
            b.bind(otherwise).unwrap().constant(0);
            b.bind(end).unwrap().ret();
        },
    )
}
