//! Per-unit settings read by the compiler.

use serde::{Deserialize, Serialize};

use crate::types::TypeRef;

/// Namespaces imported by every new graph.
pub const DEFAULT_USINGS: [&str; 4] = [
    "Unity.Burst",
    "Unity.Entities",
    "Unity.Transforms",
    "Unity.Mathematics",
];

/// Which kind of type the graph compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitFlavor {
    /// `partial struct : ISystem`, lifecycle methods take `ref SystemState state`.
    UnmanagedSystem,
    /// `partial class : SystemBase`, lifecycle methods are overrides.
    ManagedSystem,
    /// `readonly partial struct : IAspect`.
    Aspect,
}

/// Declared modifiers of the generated type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeModifier {
    pub is_struct: bool,
    pub read_only: bool,
    pub partial: bool,
}

impl Default for TypeModifier {
    fn default() -> Self {
        TypeModifier {
            is_struct: true,
            read_only: false,
            partial: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Name of the generated type.
    pub name: String,
    pub namespace: Option<String>,
    /// `using` directives, emitted in order.
    pub usings: Vec<String>,
    pub flavor: UnitFlavor,
    pub modifier: TypeModifier,
    /// Emit `[BurstCompile]` on the type, lifecycle methods and jobs.
    pub burst_compile: bool,
    /// Types passed to `RequireForUpdate<T>()` in `OnCreate`.
    pub required_for_update: Vec<TypeRef>,
}

impl GraphSettings {
    pub fn new(name: impl Into<String>) -> Self {
        GraphSettings {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(
            self.flavor,
            UnitFlavor::UnmanagedSystem | UnitFlavor::ManagedSystem
        )
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        GraphSettings {
            name: "NewSystem".into(),
            namespace: None,
            usings: DEFAULT_USINGS.iter().map(|u| u.to_string()).collect(),
            flavor: UnitFlavor::UnmanagedSystem,
            modifier: TypeModifier::default(),
            burst_compile: true,
            required_for_update: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = GraphSettings::new("MoveSystem");
        assert_eq!(settings.name, "MoveSystem");
        assert_eq!(settings.usings.len(), 4);
        assert_eq!(settings.usings[1], "Unity.Entities");
        assert!(settings.burst_compile);
        assert!(settings.is_system());
    }

    #[test]
    fn aspect_is_not_a_system() {
        let settings = GraphSettings {
            flavor: UnitFlavor::Aspect,
            ..GraphSettings::new("MoveAspect")
        };
        assert!(!settings.is_system());
    }

    #[test]
    fn serde_roundtrip() {
        let settings = GraphSettings {
            namespace: Some("Game".into()),
            required_for_update: vec![TypeRef::component("Config")],
            ..GraphSettings::new("Spawner")
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: GraphSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.namespace.as_deref(), Some("Game"));
        assert_eq!(back.required_for_update, settings.required_for_update);
    }
}
