//! Container tree for node ownership scopes.
//!
//! Every node lives in exactly one container. Containers form a tree rooted
//! at the graph container and function bodies hang off the root. The tree is
//! stored as parent index + child list rather than mutual references.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{ContainerId, MemberId};

/// What a container represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    /// The root scope of the graph (event handlers live here).
    Graph,
    /// Body of a graph function.
    Function(MemberId),
}

/// A single container in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerDef {
    pub id: ContainerId,
    pub kind: ContainerKind,
    /// `None` only for the root.
    pub parent: Option<ContainerId>,
    pub children: Vec<ContainerId>,
}

/// Manages the container hierarchy. IDs are dense indices into `containers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerTree {
    containers: Vec<ContainerDef>,
}

impl ContainerTree {
    /// Creates a tree holding only the root graph container (`ContainerId(0)`).
    pub fn new() -> Self {
        ContainerTree {
            containers: vec![ContainerDef {
                id: ContainerId(0),
                kind: ContainerKind::Graph,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root_id(&self) -> ContainerId {
        ContainerId(0)
    }

    /// Adds a child container under `parent`.
    ///
    /// Returns [`CoreError::ContainerNotFound`] if the parent does not exist.
    pub fn add_container(
        &mut self,
        kind: ContainerKind,
        parent: ContainerId,
    ) -> Result<ContainerId, CoreError> {
        if self.get(parent).is_none() {
            return Err(CoreError::ContainerNotFound { id: parent });
        }
        let id = ContainerId(self.containers.len() as u32);
        self.containers.push(ContainerDef {
            id,
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.containers[parent.0 as usize].children.push(id);
        Ok(id)
    }

    pub fn get(&self, id: ContainerId) -> Option<&ContainerDef> {
        self.containers.get(id.0 as usize)
    }

    pub fn contains(&self, id: ContainerId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the parent of a container, or `None` for the root.
    pub fn parent(&self, id: ContainerId) -> Option<ContainerId> {
        self.get(id).and_then(|c| c.parent)
    }

    pub fn children(&self, id: ContainerId) -> &[ContainerId] {
        self.get(id).map_or(&[], |c| c.children.as_slice())
    }

    /// Walks from `id` to the root, yielding `id` first.
    pub fn ancestors(&self, id: ContainerId) -> Vec<ContainerId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            if !self.contains(c) {
                break;
            }
            chain.push(c);
            current = self.parent(c);
        }
        chain
    }

    /// The nearest enclosing function of a container, if any.
    pub fn enclosing_function(&self, id: ContainerId) -> Option<MemberId> {
        self.ancestors(id)
            .into_iter()
            .find_map(|c| match self.get(c).map(|def| def.kind) {
                Some(ContainerKind::Function(member)) => Some(member),
                _ => None,
            })
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerDef> {
        self.containers.iter()
    }
}

impl Default for ContainerTree {
    fn default() -> Self {
        Self::new()
    }
}
