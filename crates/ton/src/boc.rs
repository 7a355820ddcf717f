//! Bag-of-cells serialization, the interchange format for cell trees.
//!
//! Reading understands the optional index and CRC sections found in build
//! artifacts; writing emits the minimal form (single root, no index, no
//! checksum), which every node accepts.

use {
    crate::cell::{Cell, CellError},
    std::{
        collections::{HashMap, VecDeque},
        sync::Arc,
    },
    thiserror::Error,
};

const MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BocError {
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("bad magic {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("exotic and leveled cells are not supported")]
    ExoticCell,
    #[error("malformed bag of cells: {0}")]
    Malformed(&'static str),
    #[error("cell {0} references a cell that does not come after it")]
    InvalidReference(usize),
    #[error(transparent)]
    Cell(#[from] CellError),
}

/// Parses a bag of cells and returns its first root.
pub fn read(bytes: &[u8]) -> Result<Arc<Cell>, BocError> {
    let mut reader = Reader { bytes, pos: 0 };
    let magic = reader.take(4)?;
    if magic != MAGIC {
        return Err(BocError::BadMagic([magic[0], magic[1], magic[2], magic[3]]));
    }
    let flags = reader.u8()?;
    let has_index = flags & 0x80 != 0;
    let ref_size = usize::from(flags & 0x07);
    if !(1..=4).contains(&ref_size) {
        return Err(BocError::Malformed("reference size out of range"));
    }
    let offset_size = usize::from(reader.u8()?);
    if !(1..=8).contains(&offset_size) {
        return Err(BocError::Malformed("offset size out of range"));
    }
    let cell_count = reader.uint(ref_size)?;
    let root_count = reader.uint(ref_size)?;
    let absent_count = reader.uint(ref_size)?;
    let _total_size = reader.uint(offset_size)?;
    if cell_count * 2 > bytes.len() {
        return Err(BocError::Malformed("cell count exceeds input size"));
    }
    if root_count == 0 {
        return Err(BocError::Malformed("no root cells"));
    }
    if absent_count != 0 {
        return Err(BocError::Malformed("absent cells are not supported"));
    }
    let root_index = reader.uint(ref_size)?;
    for _ in 1..root_count {
        reader.uint(ref_size)?;
    }
    if has_index {
        reader.take(cell_count * offset_size)?;
    }

    let mut raw_cells = Vec::with_capacity(cell_count);
    for index in 0..cell_count {
        raw_cells.push(RawCell::read(&mut reader, index, cell_count, ref_size)?);
    }

    // References only point forward, so cells assemble back to front.
    let mut cells: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for (index, raw) in raw_cells.into_iter().enumerate().rev() {
        let references = raw
            .references
            .iter()
            .map(|&target| cells[target].clone().ok_or(BocError::InvalidReference(index)))
            .collect::<Result<Vec<_>, _>>()?;
        cells[index] = Some(Arc::new(Cell::new(raw.data, raw.bit_len, references)?));
    }
    cells
        .get(root_index)
        .cloned()
        .flatten()
        .ok_or(BocError::Malformed("root index out of range"))
}

/// Serializes a cell tree rooted at `root`.
pub fn write(root: &Cell) -> Vec<u8> {
    // Order cells by their maximal distance from the root so that every
    // reference points to a later cell, deduplicating shared subtrees.
    let mut depths: HashMap<[u8; 32], (usize, usize)> = HashMap::new();
    let mut unique: Vec<&Cell> = Vec::new();
    let mut queue: VecDeque<(&Cell, usize)> = VecDeque::from([(root, 0)]);
    while let Some((cell, depth)) = queue.pop_front() {
        match depths.get_mut(&cell.repr_hash()) {
            None => {
                depths.insert(cell.repr_hash(), (unique.len(), depth));
                unique.push(cell);
            }
            Some((_, known)) if *known < depth => *known = depth,
            Some(_) => continue,
        }
        for reference in cell.references() {
            queue.push_back((reference.as_ref(), depth + 1));
        }
    }
    let mut order: Vec<&Cell> = unique.clone();
    order.sort_by_key(|cell| {
        let (first_seen, depth) = depths[&cell.repr_hash()];
        (depth, first_seen)
    });
    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(position, cell)| (cell.repr_hash(), position))
        .collect();

    let ref_size = minimal_size(order.len() as u64);
    let mut payload = Vec::new();
    for cell in &order {
        payload.push(cell.d1());
        payload.push(cell.d2());
        payload.extend_from_slice(&cell.padded_data());
        for reference in cell.references() {
            let target = index[&reference.repr_hash()] as u64;
            payload.extend_from_slice(&target.to_be_bytes()[8 - ref_size..]);
        }
    }
    let offset_size = minimal_size(payload.len() as u64);

    let mut out = Vec::with_capacity(payload.len() + 16);
    out.extend_from_slice(&MAGIC);
    out.push(ref_size as u8);
    out.push(offset_size as u8);
    out.extend_from_slice(&(order.len() as u64).to_be_bytes()[8 - ref_size..]);
    out.extend_from_slice(&1u64.to_be_bytes()[8 - ref_size..]);
    out.extend_from_slice(&0u64.to_be_bytes()[8 - ref_size..]);
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes()[8 - offset_size..]);
    out.extend_from_slice(&0u64.to_be_bytes()[8 - ref_size..]);
    out.extend_from_slice(&payload);
    out
}

fn minimal_size(value: u64) -> usize {
    let mut size = 1;
    while size < 8 && value >= 1 << (8 * size) {
        size += 1;
    }
    size
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<usize>,
}

impl RawCell {
    fn read(
        reader: &mut Reader,
        index: usize,
        cell_count: usize,
        ref_size: usize,
    ) -> Result<Self, BocError> {
        let d1 = reader.u8()?;
        if d1 & 0x08 != 0 || d1 >> 5 != 0 {
            return Err(BocError::ExoticCell);
        }
        let ref_count = usize::from(d1 & 0x07);
        if ref_count > 4 {
            return Err(BocError::Malformed("too many references"));
        }
        let d2 = usize::from(reader.u8()?);
        let mut data = reader.take(d2.div_ceil(2))?.to_vec();
        let bit_len = if d2 % 2 == 0 {
            d2 / 2 * 8
        } else {
            let last = data
                .last_mut()
                .ok_or(BocError::Malformed("empty partial byte"))?;
            let trailing = last.trailing_zeros() as usize;
            if trailing > 7 {
                return Err(BocError::Malformed("missing completion tag"));
            }
            // Drop the completion tag; `Cell` keeps data zero padded.
            *last &= *last - 1;
            d2 / 2 * 8 + 7 - trailing
        };
        let mut references = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let target = reader.uint(ref_size)?;
            if target <= index || target >= cell_count {
                return Err(BocError::InvalidReference(index));
            }
            references.push(target);
        }
        Ok(Self {
            data,
            bit_len,
            references,
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], BocError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or(BocError::UnexpectedEof)?;
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, BocError> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, len: usize) -> Result<usize, BocError> {
        let mut value = 0usize;
        for &byte in self.take(len)? {
            value = value << 8 | usize::from(byte);
        }
        Ok(value)
    }
}
