use std::collections::VecDeque;

use crate::codec::write_varint;

/// Growable byte buffer that accepts writes at either end.
///
/// Backed by a ring buffer so both `append` and `prepend` are amortized
/// linear in the bytes written.
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    inner: VecDeque<u8>,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: VecDeque::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.extend(bytes.iter().copied());
        self
    }

    pub fn prepend(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.reserve(bytes.len());
        for &b in bytes.iter().rev() {
            self.inner.push_front(b);
        }
        self
    }

    pub fn append_u8(&mut self, byte: u8) -> &mut Self {
        self.inner.push_back(byte);
        self
    }

    pub fn append_u32_le(&mut self, n: u32) -> &mut Self {
        self.append(&n.to_le_bytes())
    }

    pub fn append_u64_le(&mut self, n: u64) -> &mut Self {
        self.append(&n.to_le_bytes())
    }

    pub fn append_varint(&mut self, n: u64) -> &mut Self {
        let mut tmp = Vec::with_capacity(9);
        write_varint(&mut tmp, n);
        self.append(&tmp)
    }

    /// Append `bytes` prefixed by their CompactSize length.
    pub fn append_var_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.append_varint(bytes.len() as u64).append(bytes)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The buffered bytes, front to back.
    pub fn raw(&self) -> Vec<u8> {
        let (front, back) = self.inner.as_slices();
        let mut out = Vec::with_capacity(self.inner.len());
        out.extend_from_slice(front);
        out.extend_from_slice(back);
        out
    }

    pub fn into_raw(self) -> Vec<u8> {
        Vec::from(self.inner)
    }
}
