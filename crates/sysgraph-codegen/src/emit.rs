//! Text helpers for C# statements and expressions.

use sysgraph_core::{LiteralValue, NodeId};

/// Prefixes every non-empty line of `text` with `unit`.
pub fn indent(text: &str, unit: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{unit}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `header {` + indented body + `}`.
pub fn block(header: &str, body: &str, unit: &str) -> String {
    if body.is_empty() {
        format!("{header} {{\n}}")
    } else {
        format!("{header} {{\n{}\n}}", indent(body, unit))
    }
}

/// Joins statements with newlines, dropping empty ones.
pub fn join_statements<I>(parts: I) -> String
where
    I: IntoIterator<Item = String>,
{
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `var name = value;`, `T name = value;` or `T name;`.
pub fn declare_variable(ty: Option<&str>, name: &str, value: Option<&str>) -> String {
    match (ty, value) {
        (None, Some(value)) => format!("var {name} = {value};"),
        (Some(ty), Some(value)) => format!("{ty} {name} = {value};"),
        (Some(ty), None) => format!("{ty} {name};"),
        (None, None) => format!("var {name} = default;"),
    }
}

pub fn assign(target: &str, value: &str) -> String {
    format!("{target} = {value};")
}

pub fn statement(expression: &str) -> String {
    format!("{expression};")
}

/// `Name<A, B>`, or `Name` without arguments.
pub fn generic(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{name}<{}>", args.join(", "))
    }
}

/// `target.Method<G>(args)` or `Method<G>(args)`.
pub fn invoke(target: Option<&str>, method: &str, generics: &[String], args: &[String]) -> String {
    let call = format!("{}({})", generic(method, generics), args.join(", "));
    match target {
        Some(target) => format!("{target}.{call}"),
        None => call,
    }
}

/// Object construction; uses an initializer list when fields are set.
pub fn new_object(ty: &str, fields: &[(String, String)]) -> String {
    if fields.is_empty() {
        return format!("new {ty}()");
    }
    let inits: Vec<String> = fields.iter().map(|(f, v)| format!("{f} = {v}")).collect();
    format!("new {ty} {{ {} }}", inits.join(", "))
}

/// `typeof(A), typeof(B)`.
pub fn type_of_list(types: &[String]) -> String {
    types
        .iter()
        .map(|t| format!("typeof({t})"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn if_else(condition: &str, then: &str, otherwise: &str, unit: &str) -> String {
    let head = block(&format!("if ({condition})"), then, unit);
    if otherwise.is_empty() {
        head
    } else {
        format!("{} {}", head, block("else", otherwise, unit))
    }
}

/// Wraps generated text with comments pointing back to its node.
pub fn wrap_with_information(text: &str, node: NodeId, title: &str) -> String {
    format!("// node {node} begin: {title}\n{text}\n// node {node} end")
}

/// Marker emitted where a value could not be produced.
pub fn placeholder(port: &str) -> String {
    format!("default /* unresolved: {port} */")
}

pub fn literal(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Bool(b) => b.to_string(),
        LiteralValue::Int(i) => i.to_string(),
        LiteralValue::Float(f) => format!("{f:?}f"),
        LiteralValue::Double(d) => format!("{d:?}"),
        LiteralValue::String(s) => {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            format!("\"{escaped}\"")
        }
        LiteralValue::Default(ty) => format!("default({})", ty.name),
    }
}
