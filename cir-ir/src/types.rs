//! Type interning
//!
//! Every type lives in one arena owned by the [`TypeInterner`] and is referred
//! to through a [`Type`] handle. Structurally equal types share a handle, so
//! comparing two types is comparing two integers.
//!
//! Named records cannot be hash-consed on construction because their body may
//! mention the record itself. They follow a two step protocol instead:
//! [`TypeInterner::declare_record`] reserves the identity, and
//! [`TypeInterner::complete_record`] fills in the body exactly once.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strum::{Display, EnumString};

/// Handle to an interned type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(u32);

impl Type {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatKind {
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum RecordKind {
    Struct,
    Union,
    Class,
}

/// Identity of a record type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Unified by name; body supplied through `complete_record`
    Named(String),
    /// Unified by structure
    Anonymous {
        kind: RecordKind,
        fields: Vec<Type>,
        packed: bool,
    },
}

/// Structural description of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Bool,
    Int { width: u32, signed: bool },
    Float(FloatKind),
    Ptr(Type),
    Array { elem: Type, len: u64 },
    Func {
        params: Vec<Type>,
        ret: Type,
        variadic: bool,
    },
    Record(RecordKey),
}

#[derive(Debug, Clone)]
struct NamedRecord {
    name: String,
    kind: RecordKind,
    body: Option<RecordBody>,
}

#[derive(Debug, Clone)]
struct RecordBody {
    fields: Vec<Type>,
    packed: bool,
}

/// Arena of interned types for one context
#[derive(Debug, Default)]
pub struct TypeInterner {
    kinds: Vec<TypeKind>,
    lookup: HashMap<TypeKind, Type>,
    named: HashMap<Type, NamedRecord>,
    named_order: Vec<Type>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical handle for `kind`, creating it if needed
    pub fn intern(&mut self, kind: TypeKind) -> Type {
        if let Some(&ty) = self.lookup.get(&kind) {
            return ty;
        }
        assert!(
            !matches!(kind, TypeKind::Record(RecordKey::Named(_))),
            "named records must be created with declare_record"
        );
        self.push(kind)
    }

    fn push(&mut self, kind: TypeKind) -> Type {
        let ty = Type(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.lookup.insert(kind, ty);
        ty
    }

    pub fn kind(&self, ty: Type) -> &TypeKind {
        &self.kinds[ty.index()]
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn void(&mut self) -> Type {
        self.intern(TypeKind::Void)
    }

    pub fn bool(&mut self) -> Type {
        self.intern(TypeKind::Bool)
    }

    pub fn int(&mut self, width: u32, signed: bool) -> Type {
        self.intern(TypeKind::Int { width, signed })
    }

    pub fn s32(&mut self) -> Type {
        self.int(32, true)
    }

    pub fn s64(&mut self) -> Type {
        self.int(64, true)
    }

    pub fn u8(&mut self) -> Type {
        self.int(8, false)
    }

    pub fn u64(&mut self) -> Type {
        self.int(64, false)
    }

    pub fn float(&mut self) -> Type {
        self.intern(TypeKind::Float(FloatKind::F32))
    }

    pub fn double(&mut self) -> Type {
        self.intern(TypeKind::Float(FloatKind::F64))
    }

    pub fn ptr(&mut self, pointee: Type) -> Type {
        self.intern(TypeKind::Ptr(pointee))
    }

    pub fn array(&mut self, elem: Type, len: u64) -> Type {
        self.intern(TypeKind::Array { elem, len })
    }

    pub fn func(&mut self, params: Vec<Type>, ret: Type, variadic: bool) -> Type {
        self.intern(TypeKind::Func {
            params,
            ret,
            variadic,
        })
    }

    pub fn anon_record(&mut self, kind: RecordKind, fields: Vec<Type>, packed: bool) -> Type {
        self.intern(TypeKind::Record(RecordKey::Anonymous {
            kind,
            fields,
            packed,
        }))
    }

    /// Reserve the identity of a named record. Declaring an existing name
    /// returns the existing handle.
    pub fn declare_record(&mut self, kind: RecordKind, name: &str) -> Type {
        let key = TypeKind::Record(RecordKey::Named(name.to_string()));
        if let Some(&ty) = self.lookup.get(&key) {
            return ty;
        }
        let ty = self.push(key);
        self.named.insert(
            ty,
            NamedRecord {
                name: name.to_string(),
                kind,
                body: None,
            },
        );
        self.named_order.push(ty);
        ty
    }

    /// Fill in the body of a declared record. Completing twice is a bug.
    pub fn complete_record(&mut self, ty: Type, fields: Vec<Type>, packed: bool) {
        let record = self
            .named
            .get_mut(&ty)
            .unwrap_or_else(|| panic!("type #{} is not a named record", ty.0));
        assert!(
            record.body.is_none(),
            "record '{}' completed twice",
            record.name
        );
        record.body = Some(RecordBody { fields, packed });
    }

    pub fn is_record(&self, ty: Type) -> bool {
        matches!(self.kind(ty), TypeKind::Record(_))
    }

    /// Whether a record's body is available. Non-record types are complete.
    pub fn is_complete(&self, ty: Type) -> bool {
        match self.named.get(&ty) {
            Some(record) => record.body.is_some(),
            None => true,
        }
    }

    pub fn record_name(&self, ty: Type) -> Option<&str> {
        self.named.get(&ty).map(|r| r.name.as_str())
    }

    pub fn record_kind(&self, ty: Type) -> Option<RecordKind> {
        match self.kind(ty) {
            TypeKind::Record(RecordKey::Named(_)) => self.named.get(&ty).map(|r| r.kind),
            TypeKind::Record(RecordKey::Anonymous { kind, .. }) => Some(*kind),
            _ => None,
        }
    }

    /// Field types of a record. Reading an incomplete body is a bug.
    pub fn record_fields(&self, ty: Type) -> &[Type] {
        match self.kind(ty) {
            TypeKind::Record(RecordKey::Anonymous { fields, .. }) => fields,
            TypeKind::Record(RecordKey::Named(name)) => match &self.named[&ty].body {
                Some(body) => &body.fields,
                None => panic!("body of incomplete record '{}' accessed", name),
            },
            _ => panic!("type {} is not a record", self.display(ty)),
        }
    }

    pub fn record_packed(&self, ty: Type) -> bool {
        match self.kind(ty) {
            TypeKind::Record(RecordKey::Anonymous { packed, .. }) => *packed,
            TypeKind::Record(RecordKey::Named(name)) => match &self.named[&ty].body {
                Some(body) => body.packed,
                None => panic!("body of incomplete record '{}' accessed", name),
            },
            _ => false,
        }
    }

    /// Named records in declaration order
    pub fn named_records(&self) -> &[Type] {
        &self.named_order
    }

    pub fn pointee(&self, ty: Type) -> Option<Type> {
        match self.kind(ty) {
            TypeKind::Ptr(pointee) => Some(*pointee),
            _ => None,
        }
    }

    pub fn array_info(&self, ty: Type) -> Option<(Type, u64)> {
        match self.kind(ty) {
            TypeKind::Array { elem, len } => Some((*elem, *len)),
            _ => None,
        }
    }

    pub fn int_info(&self, ty: Type) -> Option<(u32, bool)> {
        match self.kind(ty) {
            TypeKind::Int { width, signed } => Some((*width, *signed)),
            _ => None,
        }
    }

    pub fn func_info(&self, ty: Type) -> Option<(&[Type], Type, bool)> {
        match self.kind(ty) {
            TypeKind::Func {
                params,
                ret,
                variadic,
            } => Some((params, *ret, *variadic)),
            _ => None,
        }
    }

    pub fn is_int(&self, ty: Type) -> bool {
        matches!(self.kind(ty), TypeKind::Int { .. })
    }

    pub fn is_bool(&self, ty: Type) -> bool {
        matches!(self.kind(ty), TypeKind::Bool)
    }

    pub fn is_float(&self, ty: Type) -> bool {
        matches!(self.kind(ty), TypeKind::Float(_))
    }

    pub fn is_ptr(&self, ty: Type) -> bool {
        matches!(self.kind(ty), TypeKind::Ptr(_))
    }

    pub fn is_void(&self, ty: Type) -> bool {
        matches!(self.kind(ty), TypeKind::Void)
    }

    /// Textual form of a type; named records print as their alias
    pub fn display(&self, ty: Type) -> TypeDisplay<'_> {
        TypeDisplay { types: self, ty }
    }

    /// Alias used for a named record in textual IR
    pub fn record_alias(&self, ty: Type) -> Option<String> {
        self.record_name(ty).map(|name| {
            let plain = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if plain {
                return format!("rec_{}", name);
            }
            // Disambiguate with the handle so `a::b` and `a__b` stay distinct
            let sanitized: String = name
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                .collect();
            format!("rec_{}.{}", sanitized, ty.0)
        })
    }
}

pub struct TypeDisplay<'a> {
    types: &'a TypeInterner,
    ty: Type,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = self.types;
        match types.kind(self.ty) {
            TypeKind::Void => write!(f, "!cir.void"),
            TypeKind::Bool => write!(f, "!cir.bool"),
            TypeKind::Int { width, signed } => {
                write!(f, "!{}{}i", if *signed { "s" } else { "u" }, width)
            }
            TypeKind::Float(FloatKind::F32) => write!(f, "!cir.float"),
            TypeKind::Float(FloatKind::F64) => write!(f, "!cir.double"),
            TypeKind::Ptr(pointee) => write!(f, "!cir.ptr<{}>", types.display(*pointee)),
            TypeKind::Array { elem, len } => {
                write!(f, "!cir.array<{} x {}>", types.display(*elem), len)
            }
            TypeKind::Func {
                params,
                ret,
                variadic,
            } => {
                write!(f, "!cir.func<(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", types.display(*param))?;
                }
                if *variadic {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ") -> {}>", types.display(*ret))
            }
            TypeKind::Record(RecordKey::Named(_)) => match types.record_alias(self.ty) {
                Some(alias) => write!(f, "!{}", alias),
                None => write!(f, "!<unknown record>"),
            },
            TypeKind::Record(RecordKey::Anonymous {
                kind,
                fields,
                packed,
            }) => {
                write!(f, "!cir.record<{}", kind)?;
                if *packed {
                    write!(f, " packed")?;
                }
                write!(f, " {{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", types.display(*field))?;
                }
                write!(f, "}}>")
            }
        }
    }
}
