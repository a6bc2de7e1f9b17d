//! Attribute interning
//!
//! Attributes are immutable constant values attached to operations. Like
//! types they are interned, so equal attributes share one [`Attr`] handle.

use crate::types::{Type, TypeInterner};
use std::collections::HashMap;
use std::fmt;

/// Handle to an interned attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attr(u32);

impl Attr {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// Integer literal, stored already truncated to the width of `ty`
    Int { value: i128, ty: Type },
    /// Floating literal keyed by its `f64` bit pattern
    Float { bits: u64, ty: Type },
    Bool(bool),
    /// All-zero value of an aggregate or scalar type
    Zero(Type),
    ConstArray { elems: Vec<Attr>, ty: Type },
    ConstRecord { fields: Vec<Attr>, ty: Type },
    /// Reference to a function or global by name
    Symbol(String),
    Str(String),
    Type(Type),
    Array(Vec<Attr>),
    GlobalCtor { name: String, priority: u32 },
}

/// Arena of interned attributes for one context
#[derive(Debug, Default)]
pub struct AttrInterner {
    kinds: Vec<AttrKind>,
    lookup: HashMap<AttrKind, Attr>,
}

impl AttrInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, kind: AttrKind) -> Attr {
        if let Some(&attr) = self.lookup.get(&kind) {
            return attr;
        }
        let attr = Attr(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.lookup.insert(kind, attr);
        attr
    }

    pub fn kind(&self, attr: Attr) -> &AttrKind {
        &self.kinds[attr.index()]
    }

    /// Integer attribute; `value` is wrapped to the width and signedness of `ty`
    pub fn int(&mut self, types: &TypeInterner, value: i128, ty: Type) -> Attr {
        let value = match types.int_info(ty) {
            Some((width, signed)) => wrap_int(value, width, signed),
            None => value,
        };
        self.intern(AttrKind::Int { value, ty })
    }

    pub fn float(&mut self, value: f64, ty: Type) -> Attr {
        self.intern(AttrKind::Float {
            bits: value.to_bits(),
            ty,
        })
    }

    pub fn bool(&mut self, value: bool) -> Attr {
        self.intern(AttrKind::Bool(value))
    }

    pub fn zero(&mut self, ty: Type) -> Attr {
        self.intern(AttrKind::Zero(ty))
    }

    pub fn symbol(&mut self, name: &str) -> Attr {
        self.intern(AttrKind::Symbol(name.to_string()))
    }

    pub fn string(&mut self, value: &str) -> Attr {
        self.intern(AttrKind::Str(value.to_string()))
    }

    pub fn type_attr(&mut self, ty: Type) -> Attr {
        self.intern(AttrKind::Type(ty))
    }

    pub fn array(&mut self, elems: Vec<Attr>) -> Attr {
        self.intern(AttrKind::Array(elems))
    }

    pub fn global_ctor(&mut self, name: &str, priority: u32) -> Attr {
        self.intern(AttrKind::GlobalCtor {
            name: name.to_string(),
            priority,
        })
    }

    pub fn as_int(&self, attr: Attr) -> Option<i128> {
        match self.kind(attr) {
            AttrKind::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self, attr: Attr) -> Option<bool> {
        match self.kind(attr) {
            AttrKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self, attr: Attr) -> Option<f64> {
        match self.kind(attr) {
            AttrKind::Float { bits, .. } => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    pub fn as_global_ctor(&self, attr: Attr) -> Option<(&str, u32)> {
        match self.kind(attr) {
            AttrKind::GlobalCtor { name, priority } => Some((name, *priority)),
            _ => None,
        }
    }

    pub fn as_symbol(&self, attr: Attr) -> Option<&str> {
        match self.kind(attr) {
            AttrKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_str(&self, attr: Attr) -> Option<&str> {
        match self.kind(attr) {
            AttrKind::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self, attr: Attr) -> Option<Type> {
        match self.kind(attr) {
            AttrKind::Type(ty) => Some(*ty),
            _ => None,
        }
    }

    pub fn as_array(&self, attr: Attr) -> Option<&[Attr]> {
        match self.kind(attr) {
            AttrKind::Array(elems) => Some(elems),
            _ => None,
        }
    }

    /// Type carried by a typed constant, if any
    pub fn typed_value_type(&self, attr: Attr) -> Option<Type> {
        match self.kind(attr) {
            AttrKind::Int { ty, .. }
            | AttrKind::Float { ty, .. }
            | AttrKind::ConstArray { ty, .. }
            | AttrKind::ConstRecord { ty, .. }
            | AttrKind::Zero(ty) => Some(*ty),
            _ => None,
        }
    }

    /// Textual form of an attribute
    pub fn display<'a>(&'a self, types: &'a TypeInterner, attr: Attr) -> AttrDisplay<'a> {
        AttrDisplay {
            attrs: self,
            types,
            attr,
        }
    }
}

/// Wrap `value` into the range of an integer type of `width` bits
pub fn wrap_int(value: i128, width: u32, signed: bool) -> i128 {
    if width >= 128 || width == 0 {
        return value;
    }
    let mask = (1i128 << width) - 1;
    let truncated = value & mask;
    if signed && (truncated >> (width - 1)) & 1 == 1 {
        truncated - (1i128 << width)
    } else {
        truncated
    }
}

pub struct AttrDisplay<'a> {
    attrs: &'a AttrInterner,
    types: &'a TypeInterner,
    attr: Attr,
}

fn write_symbol(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'));
    if plain {
        write!(f, "@{}", name)
    } else {
        write!(f, "@")?;
        write_string(f, name)
    }
}

/// Write a quoted, escaped string literal
pub fn write_string(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in value.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

impl AttrDisplay<'_> {
    fn list(&self, f: &mut fmt::Formatter<'_>, elems: &[Attr]) -> fmt::Result {
        for (i, elem) in elems.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.attrs.display(self.types, *elem))?;
        }
        Ok(())
    }
}

impl fmt::Display for AttrDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = self.types;
        match self.attrs.kind(self.attr) {
            AttrKind::Int { value, ty } => write!(f, "#cir.int<{}> : {}", value, types.display(*ty)),
            AttrKind::Float { bits, ty } => write!(
                f,
                "#cir.fp<{:?}> : {}",
                f64::from_bits(*bits),
                types.display(*ty)
            ),
            AttrKind::Bool(true) => write!(f, "#true"),
            AttrKind::Bool(false) => write!(f, "#false"),
            AttrKind::Zero(ty) => write!(f, "#cir.zero : {}", types.display(*ty)),
            AttrKind::ConstArray { elems, ty } => {
                write!(f, "#cir.const_array<[")?;
                self.list(f, elems)?;
                write!(f, "]> : {}", types.display(*ty))
            }
            AttrKind::ConstRecord { fields, ty } => {
                write!(f, "#cir.const_record<{{")?;
                self.list(f, fields)?;
                write!(f, "}}> : {}", types.display(*ty))
            }
            AttrKind::Symbol(name) => write_symbol(f, name),
            AttrKind::Str(s) => write_string(f, s),
            AttrKind::Type(ty) => write!(f, "{}", types.display(*ty)),
            AttrKind::Array(elems) => {
                write!(f, "[")?;
                self.list(f, elems)?;
                write!(f, "]")
            }
            AttrKind::GlobalCtor { name, priority } => {
                write!(f, "#cir.global_ctor<")?;
                write_string(f, name)?;
                write!(f, ", {}>", priority)
            }
        }
    }
}
