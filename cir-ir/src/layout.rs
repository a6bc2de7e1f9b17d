//! Target data layout
//!
//! Natural C layout rules: scalars are sized by width, pointers by the
//! configured pointer size, structs place every field at its natural
//! alignment and pad the tail, unions take the largest member.

use crate::types::{FloatKind, RecordKind, Type, TypeInterner, TypeKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLayout {
    pub pointer_size: u64,
    pub pointer_align: u64,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self {
            pointer_size: 8,
            pointer_align: 8,
        }
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    offset.div_ceil(align) * align
}

impl DataLayout {
    /// Size in bytes; `None` for void, functions and incomplete records
    pub fn size_of(&self, types: &TypeInterner, ty: Type) -> Option<u64> {
        match types.kind(ty) {
            TypeKind::Void | TypeKind::Func { .. } => None,
            TypeKind::Bool => Some(1),
            TypeKind::Int { width, .. } => Some(u64::from(width.div_ceil(8)).next_power_of_two()),
            TypeKind::Float(FloatKind::F32) => Some(4),
            TypeKind::Float(FloatKind::F64) => Some(8),
            TypeKind::Ptr(_) => Some(self.pointer_size),
            TypeKind::Array { elem, len } => Some(self.size_of(types, *elem)? * len),
            TypeKind::Record(_) => self.record_layout(types, ty).map(|l| l.size),
        }
    }

    pub fn align_of(&self, types: &TypeInterner, ty: Type) -> Option<u64> {
        match types.kind(ty) {
            TypeKind::Void | TypeKind::Func { .. } => None,
            TypeKind::Array { elem, .. } => self.align_of(types, *elem),
            TypeKind::Ptr(_) => Some(self.pointer_align),
            TypeKind::Record(_) => self.record_layout(types, ty).map(|l| l.align),
            _ => self.size_of(types, ty),
        }
    }

    /// Byte offset of field `index` within a record
    pub fn field_offset(&self, types: &TypeInterner, ty: Type, index: usize) -> Option<u64> {
        self.record_layout(types, ty)?.offsets.get(index).copied()
    }

    fn record_layout(&self, types: &TypeInterner, ty: Type) -> Option<RecordLayout> {
        if !types.is_complete(ty) {
            return None;
        }
        let kind = types.record_kind(ty)?;
        let packed = types.record_packed(ty);
        let mut offsets = Vec::new();
        let mut size = 0u64;
        let mut align = 1u64;

        for &field in types.record_fields(ty) {
            let field_size = self.size_of(types, field)?;
            let field_align = if packed { 1 } else { self.align_of(types, field)? };
            align = align.max(field_align);
            match kind {
                RecordKind::Union => {
                    offsets.push(0);
                    size = size.max(field_size);
                }
                RecordKind::Struct | RecordKind::Class => {
                    let offset = align_to(size, field_align);
                    offsets.push(offset);
                    size = offset + field_size;
                }
            }
        }

        // Empty records still occupy one byte
        let size = align_to(size.max(1), align);
        Some(RecordLayout {
            size,
            align,
            offsets,
        })
    }
}

struct RecordLayout {
    size: u64,
    align: u64,
    offsets: Vec<u64>,
}
