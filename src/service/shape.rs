//! Method shape validation.
//!
//! A callable method must look like `fn(Context, Req) -> (Reply, Error)` where `Req` and
//! `Reply` are pointer shaped messages: values the runtime allocates on the heap and hands
//! around behind a [`Box<dyn Message>`](crate::serde::Message). Typed methods get a valid
//! signature for free, dynamic methods declare theirs and are checked at registration.

use crate::context::Context;
use crate::errors::HandlerError;
use crate::serde::Message;
use std::any::type_name;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    /// The per-call [`Context`].
    Context,
    /// A message allocated by the runtime and passed by reference.
    Pointer,
    /// A plain value the runtime cannot allocate or decode into.
    Value,
    /// An error value.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc {
    name: Cow<'static, str>,
    shape: TypeShape,
}

impl TypeDesc {
    pub fn new(name: impl Into<Cow<'static, str>>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    pub fn context() -> Self {
        Self::new(type_name::<Context>(), TypeShape::Context)
    }

    pub fn pointer<T: Message>() -> Self {
        Self::new(type_name::<T>(), TypeShape::Pointer)
    }

    pub fn value<T>() -> Self {
        Self::new(type_name::<T>(), TypeShape::Value)
    }

    pub fn error<E>() -> Self {
        Self::new(type_name::<E>(), TypeShape::Error)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> TypeShape {
        self.shape
    }
}

/// Declared parameters and return values of a method.
#[derive(Debug, Clone)]
pub struct MethodSignature {
    name: String,
    params: Vec<TypeDesc>,
    returns: Vec<TypeDesc>,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: Vec::new(),
        }
    }

    /// The signature of a well formed unary method from `Req` to `Reply`.
    pub fn unary<Req: Message, Reply: Message>(name: impl Into<String>) -> Self {
        Self::new(name)
            .param(TypeDesc::context())
            .param(TypeDesc::pointer::<Req>())
            .returns(TypeDesc::pointer::<Reply>())
            .returns(TypeDesc::error::<HandlerError>())
    }

    pub fn param(mut self, ty: TypeDesc) -> Self {
        self.params.push(ty);
        self
    }

    pub fn returns(mut self, ty: TypeDesc) -> Self {
        self.returns.push(ty);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    pub fn return_values(&self) -> &[TypeDesc] {
        &self.returns
    }
}

/// The rule a method signature broke.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeViolation {
    #[error("the number of params is {0}, expected 2")]
    ParamCount(usize),
    #[error("the number of return values is {0}, expected 2")]
    ReturnCount(usize),
    #[error("first param is not context")]
    ContextType,
    #[error("req type is not a pointer")]
    RequestNotPointer,
    #[error("reply type is not a pointer")]
    ReplyNotPointer,
    #[error("returns {0}, not error")]
    NotError(String),
}

/// Check `signature` against the `fn(Context, Req) -> (Reply, Error)` contract.
pub fn check_method(signature: &MethodSignature) -> Result<(), ShapeViolation> {
    let (params, returns) = (&signature.params, &signature.returns);

    if params.len() != 2 {
        return Err(ShapeViolation::ParamCount(params.len()));
    }
    if returns.len() != 2 {
        return Err(ShapeViolation::ReturnCount(returns.len()));
    }
    if params[0].shape != TypeShape::Context {
        return Err(ShapeViolation::ContextType);
    }
    if params[1].shape != TypeShape::Pointer {
        return Err(ShapeViolation::RequestNotPointer);
    }
    if returns[0].shape != TypeShape::Pointer {
        return Err(ShapeViolation::ReplyNotPointer);
    }
    if returns[1].shape != TypeShape::Error {
        return Err(ShapeViolation::NotError(returns[1].name.to_string()));
    }
    Ok(())
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[TypeDesc]| {
            types
                .iter()
                .map(TypeDesc::name)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "{}({}) -> ({})",
            self.name,
            join(&self.params),
            join(&self.returns)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unary_signatures_are_valid() {
        let sig = MethodSignature::unary::<String, String>("Say");

        assert_eq!(check_method(&sig), Ok(()));
        assert_eq!(sig.params().len(), 2);
    }

    #[test]
    fn rules_are_checked_in_order() {
        let cases = [
            (
                MethodSignature::new("A").param(TypeDesc::context()),
                ShapeViolation::ParamCount(1),
            ),
            (
                MethodSignature::new("B")
                    .param(TypeDesc::context())
                    .param(TypeDesc::pointer::<String>())
                    .returns(TypeDesc::pointer::<String>()),
                ShapeViolation::ReturnCount(1),
            ),
            (
                MethodSignature::new("C")
                    .param(TypeDesc::pointer::<String>())
                    .param(TypeDesc::pointer::<String>())
                    .returns(TypeDesc::pointer::<String>())
                    .returns(TypeDesc::error::<HandlerError>()),
                ShapeViolation::ContextType,
            ),
            (
                MethodSignature::new("D")
                    .param(TypeDesc::context())
                    .param(TypeDesc::value::<u8>())
                    .returns(TypeDesc::pointer::<String>())
                    .returns(TypeDesc::error::<HandlerError>()),
                ShapeViolation::RequestNotPointer,
            ),
            (
                MethodSignature::new("E")
                    .param(TypeDesc::context())
                    .param(TypeDesc::pointer::<String>())
                    .returns(TypeDesc::value::<u8>())
                    .returns(TypeDesc::error::<HandlerError>()),
                ShapeViolation::ReplyNotPointer,
            ),
            (
                MethodSignature::new("F")
                    .param(TypeDesc::context())
                    .param(TypeDesc::pointer::<String>())
                    .returns(TypeDesc::pointer::<String>())
                    .returns(TypeDesc::new("bool", TypeShape::Value)),
                ShapeViolation::NotError("bool".to_owned()),
            ),
        ];

        for (sig, expected) in cases {
            assert_eq!(check_method(&sig), Err(expected), "{sig}");
        }
    }
}
