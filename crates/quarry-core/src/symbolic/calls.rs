use super::{Evaluator, StackItem};
use crate::{
    algebra::{QueryAlgebra, Source},
    closure::MethodRef,
    error::TranslateError,
    expr::{AggregateFn, BinaryOp, CompareOp, Expr, ExprKind, ScalarFn},
    value::{Value, ValueType},
};

const STREAM: &str = "JinqStream";
const STREAM_SOURCE: &str = "InQueryStreamSource";
const TUPLES: [&str; 4] = ["Pair", "Tuple3", "Tuple4", "Tuple5"];
const TUPLE_GETTERS: [&str; 5] = ["getOne", "getTwo", "getThree", "getFour", "getFive"];

fn tuple_getter(method: &MethodRef) -> Option<usize> {
    if method.is_static || method.argc != 0 || !TUPLES.contains(&method.owner.as_str()) {
        return None;
    }

    TUPLE_GETTERS.iter().position(|name| *name == method.name)
}

fn boxed_type(owner: &str) -> Option<ValueType> {
    match owner {
        "Integer" => Some(ValueType::Int),
        "Long" => Some(ValueType::Long),
        "Double" => Some(ValueType::Double),
        "Boolean" => Some(ValueType::Bool),
        _ => None,
    }
}

// `Integer.valueOf(x)` boxes, `x.intValue()` unboxes; both only re-type.
fn boxing_target(method: &MethodRef) -> Option<ValueType> {
    let boxed = boxed_type(&method.owner)?;

    match (method.name.as_str(), method.is_static, method.argc) {
        ("valueOf", true, 1) => Some(boxed),
        ("intValue", false, 0) => Some(ValueType::Int),
        ("longValue", false, 0) => Some(ValueType::Long),
        ("doubleValue", false, 0) => Some(ValueType::Double),
        ("booleanValue", false, 0) => Some(ValueType::Bool),
        _ => None,
    }
}

impl<'b> Evaluator<'b, '_, '_> {
    /// Map one call onto the expression or stream it stands for.
    pub(super) fn invoke(
        &mut self,
        pc: usize,
        method: &MethodRef,
        args: Vec<StackItem<'b>>,
    ) -> Result<StackItem<'b>, TranslateError> {
        if method.owner == STREAM {
            return self.stream_call(pc, method, &args).map(StackItem::Value);
        }

        let values = self.values(pc, args)?;
        let owner = method.owner.as_str();
        let name = method.name.as_str();

        if let Some(index) = tuple_getter(method) {
            let [tuple] = values.as_slice() else {
                return Err(self.underflow(pc));
            };
            return self.tuple_get(pc, tuple, index).map(StackItem::Value);
        }
        if let (Some(ty), [value]) = (boxing_target(method), values.as_slice()) {
            return self.convert(pc, value.clone(), &ty).map(StackItem::Value);
        }
        if !method.is_static && self.env.metadata.is_queryable_entity(owner) {
            return self.entity_call(pc, method, &values).map(StackItem::Value);
        }

        let expr = match (owner, name, method.is_static, values.as_slice()) {
            (STREAM_SOURCE, "stream", false, [source, entity]) => {
                self.entity_stream(pc, source, entity)?
            }

            (
                "String" | "Object" | "Integer" | "Long" | "Double" | "Boolean",
                "equals",
                false,
                [left, right],
            ) => self.comparison(pc, CompareOp::Eq, left.clone(), right.clone())?,

            ("String", "concat", false, [left, right]) => {
                self.expect_text(pc, right)?;
                Expr::binary(BinaryOp::Concat, left.clone(), right.clone())
            }
            ("String", "toLowerCase", false, [text]) => {
                Expr::call(ScalarFn::Lower, vec![text.clone()])
            }
            ("String", "toUpperCase", false, [text]) => {
                Expr::call(ScalarFn::Upper, vec![text.clone()])
            }
            ("String", "trim", false, [text]) => Expr::call(ScalarFn::Trim, vec![text.clone()]),
            ("String", "length", false, [text]) => {
                Expr::call(ScalarFn::Length, vec![text.clone()])
            }
            ("String", "startsWith" | "endsWith" | "contains", false, [text, pattern]) => {
                self.like(pc, name, text, pattern)?
            }

            ("Math", "abs", true, [value]) if value.ty.is_numeric() => {
                Expr::call(ScalarFn::Abs, vec![value.clone()])
            }
            ("Math", "sqrt", true, [value]) if value.ty.is_numeric() => {
                Expr::call(ScalarFn::Sqrt, vec![value.clone()])
            }

            _ => return Err(self.unsupported(pc, format!("no query equivalent for {method}"))),
        };

        Ok(StackItem::Value(expr))
    }

    fn tuple_get(&self, pc: usize, tuple: &Expr, index: usize) -> Result<Expr, TranslateError> {
        if let ValueType::Tuple(items) = &tuple.ty
            && index >= items.len()
        {
            return Err(self.unsupported(
                pc,
                format!("component {index} of a {}-tuple", items.len()),
            ));
        }

        Ok(Expr::tuple_get(tuple.clone(), index))
    }

    fn entity_call(
        &self,
        pc: usize,
        method: &MethodRef,
        values: &[Expr],
    ) -> Result<Expr, TranslateError> {
        match (method.name.as_str(), values) {
            ("equals", [left, right]) => {
                self.comparison(pc, CompareOp::Eq, left.clone(), right.clone())
            }
            (accessor, [receiver]) => {
                let field = self
                    .env
                    .metadata
                    .resolve_field(&method.owner, accessor)
                    .ok_or_else(|| TranslateError::UnresolvedField {
                        closure: self.body.id,
                        entity: method.owner.clone(),
                        accessor: accessor.to_string(),
                    })?;

                Ok(Expr::path(receiver.clone(), field))
            }
            _ => Err(self.unsupported(pc, format!("no query equivalent for {method}"))),
        }
    }

    fn like(
        &self,
        pc: usize,
        name: &str,
        text: &Expr,
        pattern: &Expr,
    ) -> Result<Expr, TranslateError> {
        let literal = pattern
            .as_constant()
            .and_then(Value::as_text)
            .ok_or_else(|| self.unsupported(pc, format!("String.{name} needs a literal argument")))?;
        if literal.contains(['%', '_']) {
            return Err(self.unsupported(
                pc,
                format!("String.{name} argument contains a wildcard character"),
            ));
        }

        let pattern = match name {
            "startsWith" => format!("{literal}%"),
            "endsWith" => format!("%{literal}"),
            _ => format!("%{literal}%"),
        };

        Ok(Expr::binary(BinaryOp::Like, text.clone(), Expr::constant(pattern)))
    }

    fn expect_text(&self, pc: usize, value: &Expr) -> Result<(), TranslateError> {
        if value.ty.accepts(&ValueType::Text) {
            Ok(())
        } else {
            Err(self.unsupported(pc, format!("text operation on {}", value.ty)))
        }
    }

    // `source.stream("Entity")` inside a join closure.
    fn entity_stream(
        &mut self,
        pc: usize,
        source: &Expr,
        entity: &Expr,
    ) -> Result<Expr, TranslateError> {
        if source.ty != ValueType::StreamSource {
            return Err(self.unsupported(pc, "stream() called on a value that is not a stream source"));
        }
        let Some(name) = entity.as_constant().and_then(Value::as_text) else {
            return Err(self.unsupported(pc, "stream() needs a literal entity name"));
        };
        if !self.env.metadata.is_queryable_entity(name) {
            return Err(self.unsupported(pc, format!("entity '{name}' is not queryable")));
        }

        let id = self.allocate_source();

        Ok(Expr::sub_query(QueryAlgebra::rooted(Source::entity(id, name))))
    }

    //
    // Streams inside closures
    //

    fn stream_call(
        &mut self,
        pc: usize,
        method: &MethodRef,
        args: &[StackItem<'b>],
    ) -> Result<Expr, TranslateError> {
        match (method.name.as_str(), method.is_static, args) {
            ("from", true, [StackItem::Value(path)]) => {
                if !matches!(path.ty, ValueType::Collection(_)) {
                    return Err(self.unsupported(
                        pc,
                        format!("JinqStream.from over {}", path.ty),
                    ));
                }
                let id = self.allocate_source();

                Ok(Expr::sub_query(QueryAlgebra::rooted(Source::navigation(
                    id,
                    path.clone(),
                ))))
            }

            ("count", false, [StackItem::Value(stream)]) => {
                let query = self.stream_receiver(pc, stream)?;
                Ok(Expr::aggregate(AggregateFn::Count, None, query))
            }

            ("where", false, [StackItem::Value(stream), StackItem::Closure(pending)]) => {
                let query = self.stream_receiver(pc, stream)?;
                let predicate = self.translate_over(pc, *pending, &query)?;
                let filtered = query
                    .filtered(predicate, *self.next_source)
                    .map_err(|err| self.unsupported(pc, err.to_string()))?;

                Ok(Expr::sub_query(filtered))
            }

            ("select", false, [StackItem::Value(stream), StackItem::Closure(pending)]) => {
                let query = self.stream_receiver(pc, stream)?;
                let projection = self.translate_over(pc, *pending, &query)?;
                let projected = query
                    .projected(projection, *self.next_source)
                    .map_err(|err| self.unsupported(pc, err.to_string()))?;

                Ok(Expr::sub_query(projected))
            }

            (name, false, [StackItem::Value(stream), StackItem::Closure(pending)]) => {
                let func = match name {
                    "sumInteger" | "sumLong" | "sumDouble" => AggregateFn::Sum,
                    "max" => AggregateFn::Max,
                    "min" => AggregateFn::Min,
                    "avg" => AggregateFn::Avg,
                    _ => {
                        return Err(
                            self.unsupported(pc, format!("no query equivalent for {method}"))
                        );
                    }
                };
                let query = self.stream_receiver(pc, stream)?;
                let arg = self.translate_over(pc, *pending, &query)?;
                if matches!(func, AggregateFn::Sum | AggregateFn::Avg) && !arg.ty.is_numeric() {
                    return Err(self.unsupported(pc, format!("{func} over {}", arg.ty)));
                }

                Ok(Expr::aggregate(func, Some(arg), query))
            }

            _ => Err(self.unsupported(pc, format!("no query equivalent for {method}"))),
        }
    }

    fn stream_receiver(&self, pc: usize, stream: &Expr) -> Result<QueryAlgebra, TranslateError> {
        match stream.kind() {
            ExprKind::SubQuery(query) => Ok(query.clone()),
            _ => Err(self.unsupported(
                pc,
                format!("stream operation on {}", stream.ty),
            )),
        }
    }
}
