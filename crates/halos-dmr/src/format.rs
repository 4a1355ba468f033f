//! DMR text form of the value tree

use std::fmt;

use crate::model::{ModelNode, ModelValue};

const TAB: &str = "  ";

impl fmt::Display for ModelNode {
    /// Multi-line DMR text form. `{:#}` renders on a single line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out, 0, !f.alternate());
        f.write_str(&out)
    }
}

impl ModelNode {
    /// DMR text form on a single line
    pub fn to_compact_string(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out, 0, false);
        out
    }

    fn write_to(&self, out: &mut String, indent: usize, multiline: bool) {
        match self.value() {
            ModelValue::Undefined => out.push_str("undefined"),
            ModelValue::Boolean(b) => out.push_str(&b.to_string()),
            ModelValue::Int(i) => out.push_str(&i.to_string()),
            ModelValue::Long(l) => out.push_str(&format!("{l}L")),
            ModelValue::Double(d) => out.push_str(&format!("{d:?}")),
            ModelValue::BigInteger(b) => out.push_str(&format!("big integer {b}")),
            ModelValue::BigDecimal(d) => out.push_str(&format!("big decimal {d}")),
            ModelValue::Bytes(bytes) => {
                out.push_str("bytes {");
                let hex: Vec<String> = bytes.iter().map(|b| format!("0x{b:02x}")).collect();
                if !hex.is_empty() {
                    out.push(' ');
                    out.push_str(&hex.join(", "));
                    out.push(' ');
                }
                out.push('}');
            }
            ModelValue::String(s) => quote(s, out),
            ModelValue::Expression(s) => {
                out.push_str("expression ");
                quote(s, out);
            }
            ModelValue::Type(t) => out.push_str(t.name()),
            ModelValue::List(list) => {
                let items = list.iter().map(|item| (None, item));
                write_container(out, ('[', ']'), items, indent, multiline);
            }
            ModelValue::Object(map) => {
                let entries = map.iter().map(|(k, v)| (Some(k.as_str()), v));
                write_container(out, ('{', '}'), entries, indent, multiline);
            }
            ModelValue::Property(p) => {
                out.push('(');
                quote(p.name(), out);
                out.push_str(" => ");
                p.value().write_to(out, indent, multiline);
                out.push(')');
            }
        }
    }
}

/// Lists and objects break onto several lines only with more than one element.
fn write_container<'a, I>(
    out: &mut String,
    (open, close): (char, char),
    entries: I,
    indent: usize,
    multiline: bool,
) where
    I: ExactSizeIterator<Item = (Option<&'a str>, &'a ModelNode)>,
{
    let break_lines = multiline && entries.len() > 1;
    out.push(open);
    for (i, (key, value)) in entries.enumerate() {
        if i > 0 {
            out.push(',');
            if !break_lines {
                out.push(' ');
            }
        }
        if break_lines {
            newline(out, indent + 1);
        }
        if let Some(key) = key {
            quote(key, out);
            out.push_str(" => ");
        }
        value.write_to(out, indent + 1, multiline);
    }
    if break_lines {
        newline(out, indent);
    }
    out.push(close);
}

fn newline(out: &mut String, indent: usize) {
    out.push('\n');
    for _ in 0..indent {
        out.push_str(TAB);
    }
}

fn quote(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}
