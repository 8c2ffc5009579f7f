use fip_types::{DecodeError, EncodeError, Reader, Type, Writer};

use crate::constants::FIP_SIGNATURE_NAME_LEN;

/// Discriminates which signature kind a `SymbolRequest`/`SymbolResponse`/
/// `TagSymbolResponse` carries (`spec.md` §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    Function = 0,
    Data = 1,
    Enum = 2,
}

impl SymbolType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Function,
            1 => Self::Data,
            2 => Self::Enum,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A function signature, struct-of-arrays-free carrier for args/rets.
#[derive(Debug, Clone, PartialEq)]
pub struct FnSig {
    pub name: String,
    pub args: Vec<Type>,
    pub rets: Vec<Type>,
}

/// A named, typed value exposed by a `DataSig`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSig {
    pub name: String,
    pub values: Vec<DataValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSig {
    pub name: String,
    pub ty: fip_types::PrimitiveKind,
    pub tags: Vec<String>,
    pub values: Vec<u64>,
}

/// One of the three signature kinds, tagged on the wire by [`SymbolType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    Function(FnSig),
    Data(DataSig),
    Enum(EnumSig),
}

impl Signature {
    pub fn symbol_type(&self) -> SymbolType {
        match self {
            Signature::Function(_) => SymbolType::Function,
            Signature::Data(_) => SymbolType::Data,
            Signature::Enum(_) => SymbolType::Enum,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Signature::Function(sig) => sig.encode(w),
            Signature::Data(sig) => sig.encode(w),
            Signature::Enum(sig) => sig.encode(w),
        }
    }

    pub fn decode(sym_type: SymbolType, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(match sym_type {
            SymbolType::Function => Signature::Function(FnSig::decode(r)?),
            SymbolType::Data => Signature::Data(DataSig::decode(r)?),
            SymbolType::Enum => Signature::Enum(EnumSig::decode(r)?),
        })
    }
}

impl FnSig {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_fixed_str(&self.name, FIP_SIGNATURE_NAME_LEN)?;
        encode_typed_list(w, &self.args)?;
        encode_typed_list(w, &self.rets)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let name = r.read_fixed_str(FIP_SIGNATURE_NAME_LEN)?;
        let args = decode_typed_list(r)?;
        let rets = decode_typed_list(r)?;
        Ok(FnSig { name, args, rets })
    }

    /// Fingerprint equality used for symbol-table lookup (`spec.md` §4.3):
    /// exact name match and structurally-equal arg/ret types, including
    /// `is_mutable`. Reflexive and symmetric because it is plain `PartialEq`.
    pub fn fingerprint_eq(&self, other: &FnSig) -> bool {
        self.name == other.name && self.args == other.args && self.rets == other.rets
    }
}

/// Writes `len: u8` followed by each type, preceded by a duplicate
/// `is_mutable` byte.
///
/// This redundancy — `is_mutable` once immediately before the `Type`, and
/// again inside the `Type`'s own header — matches the wire layout recorded
/// in `spec.md` §9 and must not be collapsed: decoders on the wire expect
/// both bytes.
fn encode_typed_list(w: &mut Writer<'_>, types: &[Type]) -> Result<(), EncodeError> {
    if types.len() > 255 {
        return Err(EncodeError::TooManyElements);
    }
    w.write_u8(types.len() as u8)?;
    for ty in types {
        w.write_bool(ty.is_mutable)?;
        ty.encode(w)?;
    }
    Ok(())
}

fn decode_typed_list(r: &mut Reader<'_>) -> Result<Vec<Type>, DecodeError> {
    let len = r.read_u8()? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let _duplicate_is_mutable = r.read_bool()?;
        out.push(Type::decode(r)?);
    }
    Ok(out)
}

impl DataSig {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_fixed_str(&self.name, FIP_SIGNATURE_NAME_LEN)?;
        if self.values.len() > 255 {
            return Err(EncodeError::TooManyElements);
        }
        w.write_u8(self.values.len() as u8)?;
        for value in &self.values {
            write_short_string(w, &value.name)?;
        }
        for value in &self.values {
            value.ty.encode(w)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let name = r.read_fixed_str(FIP_SIGNATURE_NAME_LEN)?;
        let value_count = r.read_u8()? as usize;
        let mut names = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            names.push(read_short_string(r)?);
        }
        let mut values = Vec::with_capacity(value_count);
        for name in names {
            values.push(DataValue {
                name,
                ty: Type::decode(r)?,
            });
        }
        Ok(DataSig { name, values })
    }
}

impl EnumSig {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if self.tags.len() != self.values.len() || self.tags.len() > 255 {
            return Err(EncodeError::TooManyElements);
        }
        w.write_fixed_str(&self.name, FIP_SIGNATURE_NAME_LEN)?;
        w.write_u8(self.ty.as_u8())?;
        w.write_u8(self.tags.len() as u8)?;
        for tag in &self.tags {
            write_short_string(w, tag)?;
        }
        w.pad_to_8()?;
        for v in &self.values {
            w.write_u64_le(*v)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let name = r.read_fixed_str(FIP_SIGNATURE_NAME_LEN)?;
        let ty = fip_types::PrimitiveKind::from_u8(r.read_u8()?).ok_or(DecodeError::Malformed)?;
        let value_count = r.read_u8()? as usize;
        let mut tags = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            tags.push(read_short_string(r)?);
        }
        r.skip_pad_to_8()?;
        let mut values = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            values.push(r.read_u64_le()?);
        }
        Ok(EnumSig {
            name,
            ty,
            tags,
            values,
        })
    }
}

fn write_short_string(w: &mut Writer<'_>, s: &str) -> Result<(), EncodeError> {
    if s.len() > 255 {
        return Err(EncodeError::TooManyElements);
    }
    w.write_u8(s.len() as u8)?;
    w.write_bytes(s.as_bytes())
}

fn read_short_string(r: &mut Reader<'_>) -> Result<String, DecodeError> {
    let len = r.read_u8()? as usize;
    let bytes = r.read_bytes(len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fip_types::PrimitiveKind;

    fn roundtrip_sig(sig: &Signature) -> Signature {
        let mut buf = [0u8; 1024];
        let mut w = Writer::new(&mut buf);
        sig.encode(&mut w).unwrap();
        let end = w.position();
        let mut r = Reader::new(&buf[..end]);
        Signature::decode(sig.symbol_type(), &mut r).unwrap()
    }

    #[test]
    fn roundtrip_fn_sig() {
        let sig = Signature::Function(FnSig {
            name: "add".to_string(),
            args: vec![
                Type::pointer(Type::primitive(PrimitiveKind::I32, true), true),
                Type::primitive(PrimitiveKind::I32, false),
            ],
            rets: vec![],
        });
        assert_eq!(roundtrip_sig(&sig), sig);
    }

    #[test]
    fn roundtrip_data_sig() {
        let sig = Signature::Data(DataSig {
            name: "globals".to_string(),
            values: vec![
                DataValue {
                    name: "counter".to_string(),
                    ty: Type::primitive(PrimitiveKind::U64, true),
                },
                DataValue {
                    name: "flag".to_string(),
                    ty: Type::primitive(PrimitiveKind::Bool, false),
                },
            ],
        });
        assert_eq!(roundtrip_sig(&sig), sig);
    }

    #[test]
    fn roundtrip_enum_sig() {
        let sig = Signature::Enum(EnumSig {
            name: "Color".to_string(),
            ty: PrimitiveKind::U16,
            tags: vec!["Red".to_string(), "Green".to_string(), "Blue".to_string()],
            values: vec![0, 1, 2],
        });
        assert_eq!(roundtrip_sig(&sig), sig);
    }

    #[test]
    fn fn_sig_mutability_breaks_fingerprint() {
        let a = FnSig {
            name: "f".to_string(),
            args: vec![Type::primitive(PrimitiveKind::I32, true)],
            rets: vec![],
        };
        let b = FnSig {
            name: "f".to_string(),
            args: vec![Type::primitive(PrimitiveKind::I32, false)],
            rets: vec![],
        };
        assert!(!a.fingerprint_eq(&b));
        assert!(a.fingerprint_eq(&a.clone()));
    }

    #[test]
    fn name_field_is_zero_padded_to_128() {
        let sig = FnSig {
            name: "short".to_string(),
            args: vec![],
            rets: vec![],
        };
        let mut buf = [0u8; 1024];
        let mut w = Writer::new(&mut buf);
        sig.encode(&mut w).unwrap();
        assert_eq!(&buf[5..FIP_SIGNATURE_NAME_LEN], &[0u8; FIP_SIGNATURE_NAME_LEN - 5][..]);
    }

    #[test]
    fn enum_sig_values_8_aligned() {
        let sig = EnumSig {
            name: "E".to_string(),
            ty: PrimitiveKind::U8,
            tags: vec!["A".to_string()],
            values: vec![7],
        };
        let mut buf = [0u8; 1024];
        let mut w = Writer::new(&mut buf);
        sig.encode(&mut w).unwrap();
        // name(128) + type(1) + count(1) + tag_len(1) + "A"(1) = 132, pad to 136
        assert_eq!(132usize.div_ceil(8) * 8, 136);
        assert_eq!(buf[136..144], 7u64.to_le_bytes());
    }
}
