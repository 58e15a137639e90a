//! Graph members: functions, properties and variables declared on the unit.
//!
//! A [`GraphFunction`] is metadata only; its body lives as nodes placed in the
//! function's container. Properties and variables become fields/properties of
//! the generated type.

use serde::{Deserialize, Serialize};

use crate::id::{ContainerId, MemberId, NodeId};
use crate::types::{LiteralValue, TypeRef};

/// A named, typed function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Parameter {
            name: name.into(),
            ty,
        }
    }
}

/// A function declared on the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphFunction {
    pub name: String,
    /// Parameters in declaration order.
    pub params: Vec<Parameter>,
    /// `None` for `void`.
    pub return_type: Option<TypeRef>,
    pub is_static: bool,
    /// Container holding the body nodes.
    pub container: ContainerId,
    /// The `FunctionEntry` node. `None` until the body has been started.
    pub entry: Option<NodeId>,
}

/// A property declared on the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphProperty {
    pub name: String,
    pub ty: TypeRef,
    pub is_static: bool,
    /// Variable backing the accessors. `None` makes this an auto property.
    pub backing: Option<MemberId>,
}

impl GraphProperty {
    pub fn is_auto(&self) -> bool {
        self.backing.is_none()
    }
}

/// A variable (field) declared on the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphVariable {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<LiteralValue>,
    pub read_only: bool,
    pub is_static: bool,
}

impl GraphVariable {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        GraphVariable {
            name: name.into(),
            ty,
            default: None,
            read_only: false,
            is_static: false,
        }
    }
}

/// Any member of the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Function(GraphFunction),
    Property(GraphProperty),
    Variable(GraphVariable),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Function(f) => &f.name,
            Member::Property(p) => &p.name,
            Member::Variable(v) => &v.name,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            Member::Function(f) => f.is_static,
            Member::Property(p) => p.is_static,
            Member::Variable(v) => v.is_static,
        }
    }

    /// Value type of a property or variable; return type of a function.
    pub fn value_type(&self) -> Option<&TypeRef> {
        match self {
            Member::Function(f) => f.return_type.as_ref(),
            Member::Property(p) => Some(&p.ty),
            Member::Variable(v) => Some(&v.ty),
        }
    }

    pub fn as_function(&self) -> Option<&GraphFunction> {
        match self {
            Member::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&GraphProperty> {
        match self {
            Member::Property(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&GraphVariable> {
        match self {
            Member::Variable(v) => Some(v),
            _ => None,
        }
    }
}
