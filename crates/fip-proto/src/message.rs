use fip_types::{DecodeError, EncodeError, Reader, Writer};

use crate::constants::{FIP_MAX_MODULE_NAME_LEN, FIP_PATHS_SIZE, FIP_PATH_SIZE, FIP_MAX_TAG_LEN};
use crate::signature::{Signature, SymbolType};

const TYPE_UNKNOWN: u8 = 0;
const TYPE_CONNECT_REQUEST: u8 = 1;
const TYPE_SYMBOL_REQUEST: u8 = 2;
const TYPE_SYMBOL_RESPONSE: u8 = 3;
const TYPE_COMPILE_REQUEST: u8 = 4;
const TYPE_OBJECT_RESPONSE: u8 = 5;
const TYPE_TAG_REQUEST: u8 = 6;
const TYPE_TAG_PRESENT_RESPONSE: u8 = 7;
const TYPE_TAG_SYMBOL_RESPONSE: u8 = 8;
const TYPE_KILL: u8 = 9;

/// Why the master is telling a child to exit (`spec.md` §3.3, tag 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    Finish = 0,
    VersionMismatch = 1,
}

impl KillReason {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Finish,
            1 => Self::VersionMismatch,
            _ => return None,
        })
    }

    fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A compile target triple, each field a fixed 16-byte wire string
/// (`spec.md` §3.3, tag 4).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetTriple {
    pub arch: String,
    pub sub: String,
    pub vendor: String,
    pub sys: String,
    pub abi: String,
}

impl TargetTriple {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        for field in [&self.arch, &self.sub, &self.vendor, &self.sys, &self.abi] {
            w.write_fixed_str(field, FIP_MAX_MODULE_NAME_LEN)?;
        }
        Ok(())
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(TargetTriple {
            arch: r.read_fixed_str(FIP_MAX_MODULE_NAME_LEN)?,
            sub: r.read_fixed_str(FIP_MAX_MODULE_NAME_LEN)?,
            vendor: r.read_fixed_str(FIP_MAX_MODULE_NAME_LEN)?,
            sys: r.read_fixed_str(FIP_MAX_MODULE_NAME_LEN)?,
            abi: r.read_fixed_str(FIP_MAX_MODULE_NAME_LEN)?,
        })
    }
}

/// The nine message kinds exchanged over FIP, plus the `Unknown` sentinel
/// produced by a malformed decode (`spec.md` §3.3).
///
/// `Unknown` carries no owned data, which is what keeps freeing a `Message`
/// idempotent regardless of how many placeholder `Unknown`s accumulate
/// during a faulty round (`spec.md` §3.4, §9).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Unknown,
    ConnectRequest {
        setup_ok: bool,
        version: (u8, u8, u8),
        module_name: String,
    },
    SymbolRequest {
        signature: Signature,
    },
    SymbolResponse {
        found: bool,
        module_name: String,
        signature: Signature,
    },
    CompileRequest {
        target: TargetTriple,
    },
    ObjectResponse {
        has_obj: bool,
        compilation_failed: bool,
        module_name: String,
        /// Each entry is an 8-character path hash (`spec.md` §4.7).
        paths: Vec<String>,
    },
    TagRequest {
        tag: String,
    },
    TagPresentResponse {
        is_present: bool,
    },
    TagSymbolResponse {
        signature: Option<Signature>,
    },
    Kill {
        reason: KillReason,
    },
}

impl Message {
    fn type_tag(&self) -> u8 {
        match self {
            Message::Unknown => TYPE_UNKNOWN,
            Message::ConnectRequest { .. } => TYPE_CONNECT_REQUEST,
            Message::SymbolRequest { .. } => TYPE_SYMBOL_REQUEST,
            Message::SymbolResponse { .. } => TYPE_SYMBOL_RESPONSE,
            Message::CompileRequest { .. } => TYPE_COMPILE_REQUEST,
            Message::ObjectResponse { .. } => TYPE_OBJECT_RESPONSE,
            Message::TagRequest { .. } => TYPE_TAG_REQUEST,
            Message::TagPresentResponse { .. } => TYPE_TAG_PRESENT_RESPONSE,
            Message::TagSymbolResponse { .. } => TYPE_TAG_SYMBOL_RESPONSE,
            Message::Kill { .. } => TYPE_KILL,
        }
    }

    /// Encodes `message_type` followed by the variant body. Does not write
    /// the 4-byte frame length prefix; that is [`crate::frame::encode_frame`]'s
    /// job, since it must back-patch the length after this call returns.
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(self.type_tag())?;
        match self {
            Message::Unknown => Ok(()),
            Message::ConnectRequest {
                setup_ok,
                version,
                module_name,
            } => {
                w.write_bool(*setup_ok)?;
                w.write_u8(version.0)?;
                w.write_u8(version.1)?;
                w.write_u8(version.2)?;
                w.write_fixed_str(module_name, FIP_MAX_MODULE_NAME_LEN)
            }
            Message::SymbolRequest { signature } => {
                w.write_u8(signature.symbol_type().as_u8())?;
                signature.encode(w)
            }
            Message::SymbolResponse {
                found,
                module_name,
                signature,
            } => {
                w.write_bool(*found)?;
                w.write_fixed_str(module_name, FIP_MAX_MODULE_NAME_LEN)?;
                w.write_u8(signature.symbol_type().as_u8())?;
                signature.encode(w)
            }
            Message::CompileRequest { target } => target.encode(w),
            Message::ObjectResponse {
                has_obj,
                compilation_failed,
                module_name,
                paths,
            } => {
                if paths.len() > 255 || paths.len() * FIP_PATH_SIZE > FIP_PATHS_SIZE {
                    return Err(EncodeError::TooManyElements);
                }
                w.write_bool(*has_obj)?;
                w.write_bool(*compilation_failed)?;
                w.write_fixed_str(module_name, FIP_MAX_MODULE_NAME_LEN)?;
                w.write_u8(paths.len() as u8)?;
                for path in paths {
                    w.write_fixed_str(path, FIP_PATH_SIZE)?;
                }
                Ok(())
            }
            Message::TagRequest { tag } => {
                if tag.len() > FIP_MAX_TAG_LEN {
                    return Err(EncodeError::TooManyElements);
                }
                w.write_u8(tag.len() as u8)?;
                w.write_bytes(tag.as_bytes())
            }
            Message::TagPresentResponse { is_present } => w.write_bool(*is_present),
            Message::TagSymbolResponse { signature } => match signature {
                None => w.write_bool(true),
                Some(sig) => {
                    w.write_bool(false)?;
                    w.write_u8(sig.symbol_type().as_u8())?;
                    sig.encode(w)
                }
            },
            Message::Kill { reason } => w.write_u8(reason.as_u8()),
        }
    }

    /// Decodes a message body after its `message_type` byte has already
    /// been read. A structurally-invalid variant (closed-set field outside
    /// its range, and similar) is reported as [`DecodeError::Malformed`];
    /// callers (see [`crate::frame::decode_frame`]) turn that into
    /// [`Message::Unknown`] rather than propagating a decode failure.
    fn decode_body(type_tag: u8, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(match type_tag {
            TYPE_UNKNOWN => Message::Unknown,
            TYPE_CONNECT_REQUEST => {
                let setup_ok = r.read_bool()?;
                let version = (r.read_u8()?, r.read_u8()?, r.read_u8()?);
                let module_name = r.read_fixed_str(FIP_MAX_MODULE_NAME_LEN)?;
                Message::ConnectRequest {
                    setup_ok,
                    version,
                    module_name,
                }
            }
            TYPE_SYMBOL_REQUEST => {
                let sym_type = SymbolType::from_u8(r.read_u8()?).ok_or(DecodeError::Malformed)?;
                let signature = Signature::decode(sym_type, r)?;
                Message::SymbolRequest { signature }
            }
            TYPE_SYMBOL_RESPONSE => {
                let found = r.read_bool()?;
                let module_name = r.read_fixed_str(FIP_MAX_MODULE_NAME_LEN)?;
                let sym_type = SymbolType::from_u8(r.read_u8()?).ok_or(DecodeError::Malformed)?;
                let signature = Signature::decode(sym_type, r)?;
                Message::SymbolResponse {
                    found,
                    module_name,
                    signature,
                }
            }
            TYPE_COMPILE_REQUEST => Message::CompileRequest {
                target: TargetTriple::decode(r)?,
            },
            TYPE_OBJECT_RESPONSE => {
                let has_obj = r.read_bool()?;
                let compilation_failed = r.read_bool()?;
                let module_name = r.read_fixed_str(FIP_MAX_MODULE_NAME_LEN)?;
                let path_count = r.read_u8()? as usize;
                if path_count * FIP_PATH_SIZE > FIP_PATHS_SIZE {
                    return Err(DecodeError::Malformed);
                }
                let mut paths = Vec::with_capacity(path_count);
                for _ in 0..path_count {
                    paths.push(r.read_fixed_str(FIP_PATH_SIZE)?);
                }
                Message::ObjectResponse {
                    has_obj,
                    compilation_failed,
                    module_name,
                    paths,
                }
            }
            TYPE_TAG_REQUEST => {
                let tag_len = r.read_u8()? as usize;
                if tag_len > FIP_MAX_TAG_LEN {
                    return Err(DecodeError::Malformed);
                }
                let tag = String::from_utf8_lossy(r.read_bytes(tag_len)?).into_owned();
                Message::TagRequest { tag }
            }
            TYPE_TAG_PRESENT_RESPONSE => Message::TagPresentResponse {
                is_present: r.read_bool()?,
            },
            TYPE_TAG_SYMBOL_RESPONSE => {
                let is_empty = r.read_bool()?;
                let signature = if is_empty {
                    None
                } else {
                    let sym_type =
                        SymbolType::from_u8(r.read_u8()?).ok_or(DecodeError::Malformed)?;
                    Some(Signature::decode(sym_type, r)?)
                };
                Message::TagSymbolResponse { signature }
            }
            TYPE_KILL => {
                let reason = KillReason::from_u8(r.read_u8()?).ok_or(DecodeError::Malformed)?;
                Message::Kill { reason }
            }
            _ => return Err(DecodeError::Malformed),
        })
    }

    /// Decodes a message body, degrading any structural error to
    /// [`Message::Unknown`] per the decoder contract in `spec.md` §4.3.
    pub fn decode(type_tag: u8, r: &mut Reader<'_>) -> Self {
        Self::decode_body(type_tag, r).unwrap_or(Message::Unknown)
    }

    /// The message type tag, exposed so callers can check "is this the
    /// type I expected for this round" without matching on the payload.
    pub fn kind(&self) -> u8 {
        self.type_tag()
    }
}
