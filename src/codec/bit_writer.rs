use bytes::{BufMut, Bytes, BytesMut};

/// MSB-first bit writer with packet-header bit stuffing.
///
/// After a `0xFF` byte only seven bits go into the next byte, whose most
/// significant bit stays zero, so no marker code can appear inside a
/// packet header.
pub struct HeaderBitWriter {
    data: BytesMut,
    buffer: u8,
    /// Bits still free in `buffer`
    free: u8,
}

impl Default for HeaderBitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderBitWriter {
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            buffer: 0,
            free: 8,
        }
    }

    /// Append one bit. After a `0xFF` byte the next byte carries only seven
    /// bits.
    pub fn write_bit(&mut self, bit: bool) {
        self.buffer = (self.buffer << 1) | bit as u8;
        self.free -= 1;
        if self.free == 0 {
            self.emit();
        }
    }

    /// Write the low `count` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, count: u8) {
        for shift in (0..count).rev() {
            self.write_bit((value >> shift) & 1 == 1);
        }
    }

    fn emit(&mut self) {
        let byte = self.buffer;
        self.data.put_u8(byte);
        self.buffer = 0;
        self.free = if byte == 0xFF { 7 } else { 8 };
    }

    /// Bits written so far, counting stuffed positions.
    pub fn bit_len(&self) -> usize {
        let capacity = if self.data.last() == Some(&0xFF) { 7 } else { 8 };
        self.data.len() * 8 + (capacity - self.free) as usize
    }

    /// Pad the last byte with zeros and return the header bytes. A header
    /// ending in `0xFF` gets a trailing zero byte.
    pub fn finish(mut self) -> Bytes {
        let capacity = if self.data.last() == Some(&0xFF) { 7 } else { 8 };
        if self.free < capacity {
            self.buffer <<= self.free;
            self.free = 0;
            self.emit();
        }
        if self.data.last() == Some(&0xFF) {
            self.data.put_u8(0x00);
        }
        self.data.freeze()
    }
}
