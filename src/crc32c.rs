//! CRC32C (Castagnoli) checksum for archive entries
//!
//! Entries are checksummed while they stream through the archive, so the
//! hasher is incremental: feed it any number of chunks, then finalize.

/// CRC32C polynomial (Castagnoli, reflected)
const POLYNOMIAL: u32 = 0x82F6_3B78;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut index = 0;
    while index < 256 {
        let mut crc = index as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[index] = crc;
        index += 1;
    }
    table
}

/// Incremental CRC32C hasher
#[derive(Debug, Clone, Copy)]
pub struct Crc32c {
    state: u32,
}

impl Default for Crc32c {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32c {
    /// Start a new checksum
    #[inline]
    pub const fn new() -> Self {
        Self { state: !0 }
    }

    /// Feed more bytes
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.state;
        for &byte in data {
            crc = (crc >> 8) ^ TABLE[((crc ^ byte as u32) & 0xFF) as usize];
        }
        self.state = crc;
    }

    /// Checksum of everything fed so far
    #[inline]
    pub const fn value(&self) -> u32 {
        !self.state
    }
}

/// One-shot checksum of `data`
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Crc32c::new();
    hasher.update(data);
    hasher.value()
}
