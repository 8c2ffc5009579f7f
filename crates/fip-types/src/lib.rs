//! Recursive type tree for the Flint Interop Protocol (FIP) wire format.
//!
//! This crate owns component C1 from the protocol design: `Type`, its
//! encode/decode, and the byte cursor both the type tree and the higher
//! signature/message layers (`fip-proto`) build their framing on top of.

mod cursor;
mod error;
mod primitive;
mod ty;

pub use cursor::{Reader, Writer};
pub use error::{DecodeError, EncodeError};
pub use primitive::PrimitiveKind;
pub use ty::{Type, TypeKind};
