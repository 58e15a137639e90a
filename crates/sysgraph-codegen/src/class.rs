//! Declarations assembled during generation and rendered to text at the end.
//!
//! Lifecycle and function methods are filled incrementally: nodes append
//! code blocks with a priority, and [`MethodData::body`] orders them by
//! priority and then by insertion. Handles and prologue statements use
//! negative priorities so they precede the graph-driven code at 0.

use crate::emit;

/// Parameter passing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    None,
    In,
    Ref,
    Out,
}

impl RefKind {
    fn prefix(self) -> &'static str {
        match self {
            RefKind::None => "",
            RefKind::In => "in ",
            RefKind::Ref => "ref ",
            RefKind::Out => "out ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamData {
    pub name: String,
    pub ty: String,
    pub ref_kind: RefKind,
    pub attributes: Vec<String>,
}

impl ParamData {
    pub fn new(name: impl Into<String>, ty: impl Into<String>, ref_kind: RefKind) -> Self {
        ParamData {
            name: name.into(),
            ty: ty.into(),
            ref_kind,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for attr in &self.attributes {
            out.push_str(&format!("[{attr}] "));
        }
        out.push_str(self.ref_kind.prefix());
        out.push_str(&self.ty);
        out.push(' ');
        out.push_str(&self.name);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldData {
    pub name: String,
    pub ty: String,
    pub modifiers: String,
    pub attributes: Vec<String>,
    pub initializer: Option<String>,
}

impl FieldData {
    pub fn public(name: impl Into<String>, ty: impl Into<String>) -> Self {
        FieldData {
            name: name.into(),
            ty: ty.into(),
            modifiers: "public".into(),
            attributes: Vec::new(),
            initializer: None,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for attr in &self.attributes {
            out.push_str(&format!("[{attr}] "));
        }
        out.push_str(&format!("{} {} {}", self.modifiers, self.ty, self.name));
        if let Some(init) = &self.initializer {
            out.push_str(&format!(" = {init}"));
        }
        out.push(';');
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyBody {
    /// `{ get; set; }`
    Auto,
    /// Accessors forwarding to a backing field.
    Backed { field: String, read_only: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyData {
    pub name: String,
    pub ty: String,
    pub modifiers: String,
    pub body: PropertyBody,
}

impl PropertyData {
    pub fn render(&self) -> String {
        let accessors = match &self.body {
            PropertyBody::Auto => "{ get; set; }".to_string(),
            PropertyBody::Backed {
                field,
                read_only: true,
            } => format!("{{ get => {field}; }}"),
            PropertyBody::Backed { field, .. } => {
                format!("{{ get => {field}; set => {field} = value; }}")
            }
        };
        format!("{} {} {} {}", self.modifiers, self.ty, self.name, accessors)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CodeBlock {
    priority: i32,
    seq: usize,
    code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodData {
    pub name: String,
    pub modifiers: String,
    pub return_type: String,
    pub params: Vec<ParamData>,
    pub attributes: Vec<String>,
    blocks: Vec<CodeBlock>,
}

impl MethodData {
    pub fn new(
        name: impl Into<String>,
        modifiers: impl Into<String>,
        return_type: impl Into<String>,
    ) -> Self {
        MethodData {
            name: name.into(),
            modifiers: modifiers.into(),
            return_type: return_type.into(),
            params: Vec::new(),
            attributes: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Appends `code` to the body. Lower priorities come first; equal
    /// priorities keep insertion order.
    pub fn add_code(&mut self, priority: i32, code: impl Into<String>) {
        let code = code.into();
        if code.is_empty() {
            return;
        }
        let seq = self.blocks.len();
        self.blocks.push(CodeBlock {
            priority,
            seq,
            code,
        });
    }

    pub fn has_code(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn body(&self) -> String {
        let mut blocks: Vec<&CodeBlock> = self.blocks.iter().collect();
        blocks.sort_by_key(|b| (b.priority, b.seq));
        blocks
            .iter()
            .map(|b| b.code.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ParamData::render).collect();
        format!(
            "{} {} {}({})",
            self.modifiers,
            self.return_type,
            self.name,
            params.join(", ")
        )
    }

    pub fn render(&self, unit: &str) -> String {
        let mut out = String::new();
        for attr in &self.attributes {
            out.push_str(&format!("[{attr}]\n"));
        }
        out.push_str(&emit::block(&self.signature(), &self.body(), unit));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Struct,
    Class,
}

/// A type declaration: the compiled unit itself or a synthesized job.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassData {
    pub name: String,
    pub kind: TypeKind,
    /// e.g. `public partial` or `public readonly partial`.
    pub modifiers: String,
    pub attributes: Vec<String>,
    pub bases: Vec<String>,
    pub fields: Vec<FieldData>,
    pub properties: Vec<PropertyData>,
    pub methods: Vec<MethodData>,
    /// Already rendered nested declarations, emitted last.
    pub nested: Vec<String>,
}

impl ClassData {
    pub fn new(name: impl Into<String>, kind: TypeKind, modifiers: impl Into<String>) -> Self {
        ClassData {
            name: name.into(),
            kind,
            modifiers: modifiers.into(),
            attributes: Vec::new(),
            bases: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn header(&self) -> String {
        let keyword = match self.kind {
            TypeKind::Struct => "struct",
            TypeKind::Class => "class",
        };
        let mut header = format!("{} {} {}", self.modifiers, keyword, self.name);
        if !self.bases.is_empty() {
            header.push_str(" : ");
            header.push_str(&self.bases.join(", "));
        }
        header
    }

    pub fn render(&self, unit: &str) -> String {
        let mut sections: Vec<String> = Vec::new();
        if !self.fields.is_empty() {
            let lines: Vec<String> = self.fields.iter().map(FieldData::render).collect();
            sections.push(lines.join("\n"));
        }
        if !self.properties.is_empty() {
            let lines: Vec<String> = self.properties.iter().map(PropertyData::render).collect();
            sections.push(lines.join("\n"));
        }
        sections.extend(self.methods.iter().map(|m| m.render(unit)));
        sections.extend(self.nested.iter().cloned());

        let mut out = String::new();
        for attr in &self.attributes {
            out.push_str(&format!("[{attr}]\n"));
        }
        out.push_str(&emit::block(&self.header(), &sections.join("\n\n"), unit));
        out
    }
}
