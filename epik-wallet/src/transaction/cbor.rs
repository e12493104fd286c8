//! Minimal canonical CBOR writer for the message encoding

use ethers_core::types::U256;

const MAJOR_UINT: u8 = 0;
const MAJOR_NEGINT: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_ARRAY: u8 = 4;

/// Appends CBOR items to a buffer using the shortest header for each length
#[derive(Debug, Default)]
pub struct CborWriter {
    buf: Vec<u8>,
}

impl CborWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn header(&mut self, major: u8, value: u64) {
        let major = major << 5;
        if value < 24 {
            self.buf.push(major | value as u8);
        } else if value <= u64::from(u8::MAX) {
            self.buf.push(major | 24);
            self.buf.push(value as u8);
        } else if value <= u64::from(u16::MAX) {
            self.buf.push(major | 25);
            self.buf.extend_from_slice(&(value as u16).to_be_bytes());
        } else if value <= u64::from(u32::MAX) {
            self.buf.push(major | 26);
            self.buf.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buf.push(major | 27);
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
    }

    pub fn uint(&mut self, value: u64) {
        self.header(MAJOR_UINT, value);
    }

    pub fn int(&mut self, value: i64) {
        if value >= 0 {
            self.header(MAJOR_UINT, value as u64);
        } else {
            // -1 - n, computed without overflow for i64::MIN
            self.header(MAJOR_NEGINT, !(value as u64));
        }
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.header(MAJOR_BYTES, data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    pub fn array(&mut self, len: u64) {
        self.header(MAJOR_ARRAY, len);
    }

    /// Big integers: empty for zero, else a sign byte followed by the
    /// big-endian magnitude
    pub fn big_int(&mut self, value: &U256) {
        if value.is_zero() {
            self.bytes(&[]);
            return;
        }
        let mut be = [0u8; 32];
        value.to_big_endian(&mut be);
        let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        let mut out = Vec::with_capacity(33 - start);
        out.push(0);
        out.extend_from_slice(&be[start..]);
        self.bytes(&out);
    }

    /// Append an already encoded item
    pub fn raw(&mut self, encoded: &[u8]) {
        self.buf.extend_from_slice(encoded);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
