use crate::error::{DecodeError, EncodeError};

/// A cursor over a fixed-size frame buffer, writing forward from its start.
///
/// `position()` is always relative to the start of the buffer this `Writer`
/// was created over — including any length-prefix header already written by
/// the caller. That is what makes the enum-value 8-byte alignment described
/// in `spec.md` §4.1/§9 well defined: callers encoding a full message pass a
/// `Writer` anchored at the frame buffer's byte 0, not at the start of the
/// `Type`/`EnumSig` field being encoded.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), EncodeError> {
        let byte = self
            .buf
            .get_mut(self.pos)
            .ok_or(EncodeError::BufferTooSmall)?;
        *byte = v;
        self.pos += 1;
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<(), EncodeError> {
        self.write_u8(v as u8)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let end = self.pos + bytes.len();
        let dst = self
            .buf
            .get_mut(self.pos..end)
            .ok_or(EncodeError::BufferTooSmall)?;
        dst.copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    pub fn write_u64_le(&mut self, v: u64) -> Result<(), EncodeError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32_le(&mut self, v: u32) -> Result<(), EncodeError> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Writes zero bytes until `position()` is a multiple of 8.
    pub fn pad_to_8(&mut self) -> Result<(), EncodeError> {
        while self.pos % 8 != 0 {
            self.write_u8(0)?;
        }
        Ok(())
    }

    /// Writes `fixed_len` bytes: `s` truncated/zero-padded to that width.
    /// `s` must already be ASCII; callers validate this before encoding.
    pub fn write_fixed_str(&mut self, s: &str, fixed_len: usize) -> Result<(), EncodeError> {
        let bytes = s.as_bytes();
        let end = self.pos + fixed_len;
        let dst = self
            .buf
            .get_mut(self.pos..end)
            .ok_or(EncodeError::BufferTooSmall)?;
        dst.fill(0);
        let n = bytes.len().min(fixed_len);
        dst[..n].copy_from_slice(&bytes[..n]);
        self.pos = end;
        Ok(())
    }
}

/// The read-side counterpart of [`Writer`]; see its docs for the alignment
/// note on `position()`.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let v = *self.buf.get(self.pos).ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + len;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads `fixed_len` bytes and trims trailing NUL padding.
    pub fn read_fixed_str(&mut self, fixed_len: usize) -> Result<String, DecodeError> {
        let bytes = self.read_bytes(fixed_len)?;
        let nul = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..nul]).into_owned())
    }

    /// Skips bytes until `position()` is a multiple of 8.
    pub fn skip_pad_to_8(&mut self) -> Result<(), DecodeError> {
        while self.pos % 8 != 0 {
            self.read_u8()?;
        }
        Ok(())
    }
}
