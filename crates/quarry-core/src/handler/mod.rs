//! Argument handler chains.
//!
//! When a closure body reads a parameter or a captured slot, the reference
//! is offered to a chain of handlers, innermost first. Handlers live in a
//! flat arena and point at their parent by index, so nested closures share
//! one chain without reference cycles.


use crate::{
    algebra::QueryAlgebra,
    closure::{ArgRef, CaptureCell, Closure, ClosureId},
    expr::{BindingRef, ElementScope, Expr},
    value::ValueType,
};
use derive_more::Display;
use thiserror::Error as ThisError;

///
/// HandlerError
///

#[remain::sorted]
#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum HandlerError {
    #[error("capture slot {0} has no runtime value")]
    CaptureMissing(usize),

    #[error("no handler resolves {0}")]
    Exhausted(ArgRef),

    #[error("nested closure parameter {0} escaped its own closure")]
    ParamEscaped(usize),

    #[error("no stream is bound to parameter {0}")]
    StreamUnbound(usize),

    #[error("{arg} resolves to {found}, expected {expected}")]
    TypeMismatch {
        arg: ArgRef,
        expected: ValueType,
        found: ValueType,
    },

    #[error("capture slot {slot} of type {ty} cannot become a query parameter")]
    UnsupportedCapture { slot: usize, ty: ValueType },
}

///
/// HandlerId
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[display("h{_0}")]
pub struct HandlerId(usize);

impl HandlerId {
    /// Placeholder scope owned by a stream-element handler.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub const fn scope(self) -> ElementScope {
        ElementScope(self.0 as u32)
    }
}

///
/// ArgumentHandler
///
/// The closed set of resolution strategies.
///

#[derive(Clone, Debug)]
pub enum ArgumentHandler {
    /// Parameter 0 is the current stream element.
    StreamElement { row: Expr },

    /// Captured slots become bound query parameters.
    Parameter {
        closure: ClosureId,
        slots: Vec<(ValueType, Option<CaptureCell>)>,
    },

    /// A nested closure's captures are references into the closure that
    /// created it.
    OuterLambda { forwards: Vec<ArgRef> },

    /// Stream-typed parameters resolve to an existing algebra.
    SubQuery { query: QueryAlgebra },
}

///
/// Step
/// Outcome of offering a reference to one handler.
///

enum Step {
    Resolved(Expr),
    Forward(ArgRef),
    Pass,
}

impl ArgumentHandler {
    /// Parameter handler for a closure's declared captures and runtime cells.
    #[must_use]
    pub fn parameters(closure: &Closure) -> Self {
        let mut cells = closure.captured.iter().cloned();
        let slots = closure
            .body
            .captures
            .iter()
            .map(|ty| (ty.clone(), cells.next()))
            .collect();

        Self::Parameter {
            closure: closure.id(),
            slots,
        }
    }

    fn handle(&self, arg: ArgRef, expected: &ValueType) -> Result<Step, HandlerError> {
        match (self, arg) {
            (Self::StreamElement { row }, ArgRef::Param(0)) => {
                if row.ty.accepts(expected) {
                    Ok(Step::Resolved(row.clone()))
                } else {
                    Err(HandlerError::TypeMismatch {
                        arg,
                        expected: expected.clone(),
                        found: row.ty.clone(),
                    })
                }
            }

            (Self::Parameter { closure, slots }, ArgRef::Capture(slot)) => {
                let Some((ty, cell)) = slots.get(slot) else {
                    return Err(HandlerError::CaptureMissing(slot));
                };
                if !is_bindable(ty) {
                    return Err(HandlerError::UnsupportedCapture {
                        slot,
                        ty: ty.clone(),
                    });
                }
                let cell = cell.clone().ok_or(HandlerError::CaptureMissing(slot))?;

                Ok(Step::Resolved(Expr::param(BindingRef {
                    closure: *closure,
                    slot,
                    ty: ty.clone(),
                    cell,
                })))
            }

            (Self::OuterLambda { forwards }, ArgRef::Capture(slot)) => forwards
                .get(slot)
                .copied()
                .map(Step::Forward)
                .ok_or(HandlerError::CaptureMissing(slot)),
            (Self::OuterLambda { .. }, ArgRef::Param(index)) => {
                Err(HandlerError::ParamEscaped(index))
            }

            _ => Ok(Step::Pass),
        }
    }

    /// Resolve a stream-typed parameter to an algebra. Sub-query handlers
    /// answer with their algebra unchanged, whatever the index.
    #[must_use]
    pub fn handle_sub_query_arg(&self, _index: usize, _ty: &ValueType) -> Option<QueryAlgebra> {
        match self {
            Self::SubQuery { query } => Some(query.clone()),
            _ => None,
        }
    }
}

// Only scalars can travel as bound parameters.
const fn is_bindable(ty: &ValueType) -> bool {
    matches!(
        ty,
        ValueType::Bool | ValueType::Int | ValueType::Long | ValueType::Double | ValueType::Text
    )
}

///
/// HandlerChain
///

#[derive(Debug, Default)]
pub struct HandlerChain {
    records: Vec<HandlerRecord>,
}

#[derive(Debug)]
struct HandlerRecord {
    handler: ArgumentHandler,
    parent: Option<HandlerId>,
}

impl HandlerChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: ArgumentHandler, parent: Option<HandlerId>) -> HandlerId {
        self.records.push(HandlerRecord { handler, parent });

        HandlerId(self.records.len() - 1)
    }

    /// Push a stream-element handler whose row is a fresh placeholder scoped
    /// to the new handler.
    pub fn push_stream_element(&mut self, ty: ValueType, parent: Option<HandlerId>) -> HandlerId {
        let id = HandlerId(self.records.len());
        let row = Expr::element(id.scope(), ty);

        self.push(ArgumentHandler::StreamElement { row }, parent)
    }

    #[must_use]
    pub fn get(&self, id: HandlerId) -> Option<&ArgumentHandler> {
        self.records.get(id.0).map(|record| &record.handler)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Offer `arg` to the chain starting at `from`. Crossing an outer-lambda
    /// handler rewrites the reference into the enclosing closure's terms.
    pub fn resolve(
        &self,
        from: HandlerId,
        arg: ArgRef,
        expected: &ValueType,
    ) -> Result<Expr, HandlerError> {
        let mut cursor = Some(from);
        let mut current = arg;

        while let Some(id) = cursor {
            let Some(record) = self.records.get(id.0) else {
                break;
            };
            match record.handler.handle(current, expected)? {
                Step::Resolved(expr) => return Ok(expr),
                Step::Forward(next) => current = next,
                Step::Pass => {}
            }
            cursor = record.parent;
        }

        Err(HandlerError::Exhausted(current))
    }

    /// Resolve a stream-typed parameter to the algebra it stands for.
    pub fn resolve_sub_query(
        &self,
        from: HandlerId,
        index: usize,
        ty: &ValueType,
    ) -> Result<QueryAlgebra, HandlerError> {
        let mut cursor = Some(from);

        while let Some(id) = cursor {
            let Some(record) = self.records.get(id.0) else {
                break;
            };
            if let Some(query) = record.handler.handle_sub_query_arg(index, ty) {
                return Ok(query);
            }
            cursor = record.parent;
        }

        Err(HandlerError::StreamUnbound(index))
    }
}
