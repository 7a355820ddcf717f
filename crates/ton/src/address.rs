use {
    crate::cell::{CellBuilder, CellError},
    base64::{
        Engine,
        engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    },
    std::{fmt, str::FromStr},
    thiserror::Error,
};

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("'{0}' is not a valid address")]
    BadFormat(String),
    #[error("address checksum mismatch")]
    BadChecksum,
    #[error("unknown address tag {0:#04x}")]
    BadTag(u8),
}

/// A contract account address: workchain plus the 256-bit hash part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub workchain: i32,
    pub hash_part: [u8; 32],
}

impl Address {
    pub fn new(workchain: i32, hash_part: [u8; 32]) -> Self {
        Self {
            workchain,
            hash_part,
        }
    }

    /// The user-friendly base64 form with tag byte and CRC16 checksum.
    pub fn to_friendly(&self, bounceable: bool) -> String {
        let mut data = [0u8; 36];
        data[0] = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        data[1] = self.workchain.to_be_bytes()[3];
        data[2..34].copy_from_slice(&self.hash_part);
        let checksum = crc16(&data[..34]);
        data[34..].copy_from_slice(&checksum.to_be_bytes());
        URL_SAFE_NO_PAD.encode(data)
    }

    /// The raw `workchain:hex` form understood by every RPC endpoint.
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash_part))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_friendly(true))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((workchain, hash)) = s.split_once(':') {
            let workchain = workchain
                .parse()
                .map_err(|_| AddressError::BadFormat(s.into()))?;
            let hash = hex::decode(hash).map_err(|_| AddressError::BadFormat(s.into()))?;
            let hash_part = hash
                .try_into()
                .map_err(|_| AddressError::BadFormat(s.into()))?;
            return Ok(Self::new(workchain, hash_part));
        }

        let data = URL_SAFE_NO_PAD
            .decode(s)
            .or_else(|_| STANDARD_NO_PAD.decode(s))
            .map_err(|_| AddressError::BadFormat(s.into()))?;
        let data: [u8; 36] = data
            .try_into()
            .map_err(|_| AddressError::BadFormat(s.into()))?;
        let checksum = u16::from_be_bytes([data[34], data[35]]);
        if checksum != crc16(&data[..34]) {
            return Err(AddressError::BadChecksum);
        }
        if data[0] != TAG_BOUNCEABLE && data[0] != TAG_NON_BOUNCEABLE {
            return Err(AddressError::BadTag(data[0]));
        }
        let mut hash_part = [0u8; 32];
        hash_part.copy_from_slice(&data[2..34]);
        Ok(Self::new(
            i32::from(i8::from_be_bytes([data[1]])),
            hash_part,
        ))
    }
}

impl CellBuilder {
    /// Stores an internal address (`addr_std`, no anycast).
    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self, CellError> {
        self.store_uint(0b100, 3)?;
        self.store_uint(u64::from(address.workchain.to_be_bytes()[3]), 8)?;
        self.store_bytes(&address.hash_part)?;
        Ok(self)
    }
}

/// CRC16-XMODEM, the checksum used by the friendly address format.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                crc << 1 ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
