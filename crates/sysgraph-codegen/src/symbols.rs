//! Per-compilation symbol table.
//!
//! Every generated identifier is registered under a [`SymbolKey`] naming the
//! thing it stands for. A key is bound once; registering it again returns
//! the name it already has. Names are unique across the whole unit and
//! never collide with C# keywords.

use indexmap::{IndexMap, IndexSet};
use sysgraph_core::{MemberId, NodeId, PortRef};

/// C# keywords plus the contextual words the generator never wants to
/// shadow.
const RESERVED: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while", "var", "value",
];

/// Identity of a generated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    /// The variable a port's value lives in.
    Port(PortRef),
    /// A name a node owns in some role, e.g. its synthesized type.
    Node { node: NodeId, role: &'static str },
    /// A graph member (field, property or method).
    Member(MemberId),
    /// Parameter `index` of a graph function.
    Param(MemberId, u16),
    /// A field on a synthesized job capturing `source`.
    Capture { boundary: NodeId, source: PortRef },
    /// Unit-wide names: handles, the state parameter.
    Unit(&'static str),
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    names: IndexMap<SymbolKey, String>,
    taken: IndexSet<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to a fresh name derived from `hint`, or returns the name
    /// it is already bound to.
    pub fn register(&mut self, key: SymbolKey, hint: &str) -> String {
        if let Some(existing) = self.names.get(&key) {
            return existing.clone();
        }
        let name = self.generate_new_name(hint);
        self.names.insert(key, name.clone());
        name
    }

    pub fn get(&self, key: &SymbolKey) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &SymbolKey) -> bool {
        self.names.contains_key(key)
    }

    /// Mints a unique name without binding it to a key.
    pub fn generate_new_name(&mut self, hint: &str) -> String {
        let base = sanitize(hint);
        if self.is_free(&base) {
            self.taken.insert(base.clone());
            return base;
        }
        let mut counter = 1usize;
        loop {
            let candidate = format!("{base}{counter}");
            if self.is_free(&candidate) {
                self.taken.insert(candidate.clone());
                return candidate;
            }
            counter += 1;
        }
    }

    /// Marks `name` as used so nothing else is given it.
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Bound names in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&SymbolKey, &str)> {
        self.names.iter().map(|(k, v)| (k, v.as_str()))
    }

    fn is_free(&self, name: &str) -> bool {
        !self.taken.contains(name) && !RESERVED.contains(&name)
    }
}

/// Turns an arbitrary display name into an identifier. Separators start a
/// new word; a leading digit is prefixed with `_`.
pub fn sanitize(hint: &str) -> String {
    let mut out = String::with_capacity(hint.len());
    let mut upper_next = false;
    for ch in hint.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if upper_next && !out.is_empty() {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    if out.is_empty() {
        out.push_str("item");
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// `camelCase` identifier for locals, fields and parameters.
pub fn variable_name(hint: &str) -> String {
    let mut name = sanitize(hint);
    if let Some(first) = name.get(0..1) {
        let lower = first.to_ascii_lowercase();
        name.replace_range(0..1, &lower);
    }
    name
}

/// `PascalCase` identifier for types and methods.
pub fn type_name(hint: &str) -> String {
    let mut name = sanitize(hint);
    if let Some(first) = name.get(0..1) {
        let upper = first.to_ascii_uppercase();
        name.replace_range(0..1, &upper);
    }
    name
}
