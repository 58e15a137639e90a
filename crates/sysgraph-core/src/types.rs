//! Type references and literal values carried by ports.
//!
//! The compiler never resolves types itself: a [`TypeRef`] is the textual name
//! the target language knows the type by, tagged with a [`TypeClass`] so the
//! analyzers can answer questions like "is this a component?" or "is this a
//! value type?" without a type system of their own.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad classification of a referenced type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeClass {
    /// Built-in scalar (`int`, `float`, `bool`, ...).
    Primitive,
    /// Plain value type that is not a component.
    Struct,
    /// Unmanaged component data (`IComponentData` struct).
    Component,
    /// Shared component data (`ISharedComponentData`).
    SharedComponent,
    /// Managed component (class implementing `IComponentData`).
    ManagedComponent,
    /// Aspect (`IAspect` struct).
    Aspect,
    /// The entity handle type.
    Entity,
    /// Any reference type.
    Reference,
}

/// A named reference to a type in the target language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// The name as written in generated code, e.g. `float3` or `LocalTransform`.
    pub name: String,
    /// Classification used by analyzers and code generation.
    pub class: TypeClass,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, class: TypeClass) -> Self {
        TypeRef {
            name: name.into(),
            class,
        }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(name, TypeClass::Primitive)
    }

    pub fn value_struct(name: impl Into<String>) -> Self {
        Self::new(name, TypeClass::Struct)
    }

    pub fn component(name: impl Into<String>) -> Self {
        Self::new(name, TypeClass::Component)
    }

    pub fn shared_component(name: impl Into<String>) -> Self {
        Self::new(name, TypeClass::SharedComponent)
    }

    pub fn aspect(name: impl Into<String>) -> Self {
        Self::new(name, TypeClass::Aspect)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, TypeClass::Reference)
    }

    pub fn entity() -> Self {
        Self::new("Entity", TypeClass::Entity)
    }

    pub fn int() -> Self {
        Self::primitive("int")
    }

    pub fn float() -> Self {
        Self::primitive("float")
    }

    pub fn double() -> Self {
        Self::primitive("double")
    }

    pub fn bool() -> Self {
        Self::primitive("bool")
    }

    /// Returns `true` for types with value semantics (structs, primitives,
    /// unmanaged and shared components, entities, aspects).
    pub fn is_value_type(&self) -> bool {
        !matches!(
            self.class,
            TypeClass::Reference | TypeClass::ManagedComponent
        )
    }

    /// Returns `true` for any kind of component type.
    pub fn is_component(&self) -> bool {
        matches!(
            self.class,
            TypeClass::Component | TypeClass::SharedComponent | TypeClass::ManagedComponent
        )
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A constant value attached to a literal node or used as a variable default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Double(f64),
    String(String),
    /// `default` of the given type.
    Default(TypeRef),
}

impl LiteralValue {
    /// The type a literal of this value evaluates to.
    pub fn type_ref(&self) -> TypeRef {
        match self {
            LiteralValue::Bool(_) => TypeRef::bool(),
            LiteralValue::Int(_) => TypeRef::int(),
            LiteralValue::Float(_) => TypeRef::float(),
            LiteralValue::Double(_) => TypeRef::double(),
            LiteralValue::String(_) => TypeRef::reference("string"),
            LiteralValue::Default(ty) => ty.clone(),
        }
    }
}
