use {
    sha2::{Digest, Sha256},
    std::sync::Arc,
    thiserror::Error,
};

/// Maximum number of data bits an ordinary cell can hold.
pub const MAX_BITS: usize = 1023;
/// Maximum number of references an ordinary cell can hold.
pub const MAX_REFS: usize = 4;
/// Maximum depth of a cell tree.
pub const MAX_DEPTH: u16 = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CellError {
    #[error("cell data capacity exceeded ({0} bits > {MAX_BITS})")]
    DataOverflow(usize),
    #[error("cell reference capacity exceeded (> {MAX_REFS})")]
    RefOverflow,
    #[error("cell depth limit exceeded (> {MAX_DEPTH})")]
    DepthOverflow,
    #[error("value {value} does not fit into {bits} bits")]
    ValueOverflow { value: u64, bits: usize },
}

/// An ordinary cell: up to 1023 data bits and 4 references to other cells.
///
/// Cells are immutable; their representation hash and depth are fixed at
/// construction so that hashing shared subtrees never recurses twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    hash: [u8; 32],
    depth: u16,
}

impl Cell {
    pub(crate) fn new(
        data: Vec<u8>,
        bit_len: usize,
        references: Vec<Arc<Cell>>,
    ) -> Result<Self, CellError> {
        if bit_len > MAX_BITS {
            return Err(CellError::DataOverflow(bit_len));
        }
        if references.len() > MAX_REFS {
            return Err(CellError::RefOverflow);
        }
        debug_assert_eq!(data.len(), bit_len.div_ceil(8));
        let depth = match references.iter().map(|cell| cell.depth).max() {
            Some(max) if max >= MAX_DEPTH => return Err(CellError::DepthOverflow),
            Some(max) => max + 1,
            None => 0,
        };
        let hash = representation_hash(&data, bit_len, &references);
        Ok(Self {
            data,
            bit_len,
            references,
            hash,
            depth,
        })
    }

    /// Data bits, zero padded to the byte boundary.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    /// The standard representation hash, which also identifies the cell.
    pub fn repr_hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// First descriptor byte: the reference count.
    pub(crate) fn d1(&self) -> u8 {
        self.references.len() as u8
    }

    /// Second descriptor byte: encodes the data bit length.
    pub(crate) fn d2(&self) -> u8 {
        (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8
    }

    /// Data bytes with the completion tag set when the bit length is not a
    /// multiple of eight.
    pub(crate) fn padded_data(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        if self.bit_len % 8 != 0 {
            data[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        data
    }
}

fn representation_hash(data: &[u8], bit_len: usize, references: &[Arc<Cell>]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([
        references.len() as u8,
        (bit_len / 8 + bit_len.div_ceil(8)) as u8,
    ]);
    if bit_len % 8 == 0 {
        hasher.update(data);
    } else {
        let mut padded = data.to_vec();
        padded[bit_len / 8] |= 0x80 >> (bit_len % 8);
        hasher.update(&padded);
    }
    for reference in references {
        hasher.update(reference.depth.to_be_bytes());
    }
    for reference in references {
        hasher.update(reference.hash);
    }
    hasher.finalize().into()
}

/// Bit-level writer assembling a single [`Cell`].
#[derive(Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.ensure_capacity(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Stores the `bits` least significant bits of `value`, most significant
    /// bit first.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self, CellError> {
        if bits < 64 && value >> bits != 0 {
            return Err(CellError::ValueOverflow { value, bits });
        }
        self.ensure_capacity(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        self.store_raw(bytes, bytes.len() * 8)
    }

    /// Stores the first `bits` bits of `data`, most significant bit first.
    pub fn store_raw(&mut self, data: &[u8], bits: usize) -> Result<&mut Self, CellError> {
        self.ensure_capacity(bits)?;
        for i in 0..bits {
            self.push_bit(data[i / 8] & (0x80 >> (i % 8)) != 0);
        }
        Ok(self)
    }

    /// Stores an amount of nanoton as a `VarUInteger 16`.
    pub fn store_coins(&mut self, amount: u64) -> Result<&mut Self, CellError> {
        if amount == 0 {
            return self.store_uint(0, 4);
        }
        let len = (64 - amount.leading_zeros() as usize).div_ceil(8);
        self.store_uint(len as u64, 4)?;
        self.store_uint(amount, len * 8)
    }

    pub fn store_reference(&mut self, cell: Arc<Cell>) -> Result<&mut Self, CellError> {
        if self.references.len() == MAX_REFS {
            return Err(CellError::RefOverflow);
        }
        self.references.push(cell);
        Ok(self)
    }

    /// Appends another cell's data bits and references in place.
    pub fn store_cell(&mut self, cell: &Cell) -> Result<&mut Self, CellError> {
        self.store_raw(cell.data(), cell.bit_len())?;
        for reference in cell.references() {
            self.store_reference(reference.clone())?;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Cell, CellError> {
        Cell::new(self.data, self.bit_len, self.references)
    }

    fn ensure_capacity(&self, bits: usize) -> Result<(), CellError> {
        if self.bit_len + bits > MAX_BITS {
            return Err(CellError::DataOverflow(self.bit_len + bits));
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        let byte = self.bit_len / 8;
        if byte == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_bits_across_byte_boundaries() {
        let mut builder = CellBuilder::new();
        builder.store_uint(0b10_1011, 6).unwrap();
        builder.store_uint(0b001_1001, 7).unwrap();
        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 13);
        assert_eq!(cell.data(), [0xac, 0xc8]);
        // Completion tag only appears in the hashed representation.
        assert_eq!(cell.padded_data(), [0xac, 0xcc]);
        assert_eq!(cell.d2(), 3);
    }

    #[test]
    fn rejects_oversized_values() {
        let mut builder = CellBuilder::new();
        assert_eq!(
            builder.store_uint(4, 2).unwrap_err(),
            CellError::ValueOverflow { value: 4, bits: 2 }
        );
    }

    #[test]
    fn enforces_data_capacity() {
        let mut builder = CellBuilder::new();
        builder.store_raw(&[0xff; 127], 1016).unwrap();
        builder.store_uint(0, 7).unwrap();
        assert!(matches!(
            builder.store_bit(true).unwrap_err(),
            CellError::DataOverflow(_)
        ));
    }

    #[test]
    fn enforces_reference_capacity() {
        let empty = Arc::new(CellBuilder::new().build().unwrap());
        let mut builder = CellBuilder::new();
        for _ in 0..MAX_REFS {
            builder.store_reference(empty.clone()).unwrap();
        }
        assert_eq!(
            builder.store_reference(empty).unwrap_err(),
            CellError::RefOverflow
        );
    }

    #[test]
    fn encodes_coins_as_var_uint() {
        let mut builder = CellBuilder::new();
        builder.store_coins(0).unwrap();
        assert_eq!(builder.bit_len, 4);
        builder.store_coins(1_000_000_000).unwrap();
        // 4 bits length prefix plus four value bytes.
        assert_eq!(builder.bit_len, 4 + 4 + 32);
    }

    #[test]
    fn identical_content_hashes_identically() {
        let build = || {
            let mut builder = CellBuilder::new();
            builder.store_uint(42, 32).unwrap();
            builder.build().unwrap()
        };
        assert_eq!(build().repr_hash(), build().repr_hash());
    }
}
