use std::fmt;

use crate::cursor::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::primitive::PrimitiveKind;

const KIND_PRIMITIVE: u8 = 0;
const KIND_POINTER: u8 = 1;
const KIND_STRUCT: u8 = 2;
const KIND_RECURSIVE_BACK: u8 = 3;
const KIND_ENUM: u8 = 4;

/// A node in the recursive FIP type tree (`spec.md` §3.1).
///
/// Every node carries `is_mutable` independently of its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub is_mutable: bool,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Pointer(Box<Type>),
    Struct(Vec<Type>),
    /// References the enclosing struct `levels` steps outward. Valid only
    /// inside a `Struct` at depth >= `levels + 1`; carries no allocation.
    RecursiveBack(u8),
    Enum {
        bit_width: u8,
        is_signed: bool,
        /// Raw bit patterns, interpreted per `bit_width`/`is_signed` only
        /// when rendered.
        values: Vec<u64>,
    },
}

impl Type {
    pub fn primitive(kind: PrimitiveKind, is_mutable: bool) -> Self {
        Self {
            is_mutable,
            kind: TypeKind::Primitive(kind),
        }
    }

    pub fn pointer(base: Type, is_mutable: bool) -> Self {
        Self {
            is_mutable,
            kind: TypeKind::Pointer(Box::new(base)),
        }
    }

    pub fn struct_of(fields: Vec<Type>, is_mutable: bool) -> Result<Self, EncodeError> {
        if fields.len() > 255 {
            return Err(EncodeError::TooManyElements);
        }
        Ok(Self {
            is_mutable,
            kind: TypeKind::Struct(fields),
        })
    }

    pub fn recursive_back(levels: u8, is_mutable: bool) -> Self {
        Self {
            is_mutable,
            kind: TypeKind::RecursiveBack(levels),
        }
    }

    pub fn enum_of(
        bit_width: u8,
        is_signed: bool,
        values: Vec<u64>,
        is_mutable: bool,
    ) -> Result<Self, EncodeError> {
        if !(1..=64).contains(&bit_width) || values.len() > 255 {
            return Err(EncodeError::TooManyElements);
        }
        Ok(Self {
            is_mutable,
            kind: TypeKind::Enum {
                bit_width,
                is_signed,
                values,
            },
        })
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match &self.kind {
            TypeKind::Primitive(p) => {
                w.write_u8(KIND_PRIMITIVE)?;
                w.write_bool(self.is_mutable)?;
                w.write_u8(p.as_u8())
            }
            TypeKind::Pointer(base) => {
                w.write_u8(KIND_POINTER)?;
                w.write_bool(self.is_mutable)?;
                base.encode(w)
            }
            TypeKind::Struct(fields) => {
                w.write_u8(KIND_STRUCT)?;
                w.write_bool(self.is_mutable)?;
                if fields.len() > 255 {
                    return Err(EncodeError::TooManyElements);
                }
                w.write_u8(fields.len() as u8)?;
                for field in fields {
                    field.encode(w)?;
                }
                Ok(())
            }
            TypeKind::RecursiveBack(levels) => {
                w.write_u8(KIND_RECURSIVE_BACK)?;
                w.write_bool(self.is_mutable)?;
                w.write_u8(*levels)
            }
            TypeKind::Enum {
                bit_width,
                is_signed,
                values,
            } => {
                w.write_u8(KIND_ENUM)?;
                w.write_bool(self.is_mutable)?;
                w.write_u8(*bit_width)?;
                w.write_bool(*is_signed)?;
                if values.len() > 255 {
                    return Err(EncodeError::TooManyElements);
                }
                w.write_u8(values.len() as u8)?;
                w.pad_to_8()?;
                for v in values {
                    w.write_u64_le(*v)?;
                }
                Ok(())
            }
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let kind_tag = r.read_u8()?;
        let is_mutable = r.read_bool()?;
        let kind = match kind_tag {
            KIND_PRIMITIVE => {
                let p = PrimitiveKind::from_u8(r.read_u8()?).ok_or(DecodeError::Malformed)?;
                TypeKind::Primitive(p)
            }
            KIND_POINTER => TypeKind::Pointer(Box::new(Type::decode(r)?)),
            KIND_STRUCT => {
                let field_count = r.read_u8()? as usize;
                let mut fields = Vec::with_capacity(field_count);
                for _ in 0..field_count {
                    fields.push(Type::decode(r)?);
                }
                TypeKind::Struct(fields)
            }
            KIND_RECURSIVE_BACK => TypeKind::RecursiveBack(r.read_u8()?),
            KIND_ENUM => {
                let bit_width = r.read_u8()?;
                if !(1..=64).contains(&bit_width) {
                    return Err(DecodeError::Malformed);
                }
                let is_signed = r.read_bool()?;
                let value_count = r.read_u8()? as usize;
                r.skip_pad_to_8()?;
                let mut values = Vec::with_capacity(value_count);
                for _ in 0..value_count {
                    values.push(r.read_u64_le()?);
                }
                TypeKind::Enum {
                    bit_width,
                    is_signed,
                    values,
                }
            }
            _ => return Err(DecodeError::Malformed),
        };
        Ok(Type { is_mutable, kind })
    }

    /// Structural equality used by fingerprint matching (`spec.md` §4.3):
    /// includes `is_mutable`, struct field order, and `RecursiveBack` level.
    pub fn matches(&self, other: &Type) -> bool {
        self == other
    }
}

/// Masks `raw` to `bit_width` bits and sign-extends to `i64` if `is_signed`.
fn render_enum_value(raw: u64, bit_width: u8, is_signed: bool) -> i64 {
    let masked = if bit_width >= 64 {
        raw
    } else {
        raw & ((1u64 << bit_width) - 1)
    };
    if is_signed && bit_width < 64 {
        let sign_bit = 1u64 << (bit_width - 1);
        if masked & sign_bit != 0 {
            return (masked as i64) - (1i64 << bit_width);
        }
    }
    masked as i64
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Primitive(p) => write!(f, "{p}"),
            TypeKind::Pointer(base) => write!(f, "{base}*"),
            TypeKind::Struct(fields) => {
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, " }}")
            }
            TypeKind::RecursiveBack(levels) => write!(f, "{{REC:{levels}}}"),
            TypeKind::Enum {
                bit_width,
                is_signed,
                values,
            } => {
                let prefix = if *is_signed { "i" } else { "u" };
                write!(f, "enum({prefix}{bit_width}){{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", render_enum_value(*v, *bit_width, *is_signed))?;
                }
                write!(f, "}}")
            }
        }
    }
}
