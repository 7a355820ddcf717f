//! The deployer wallet: a standard wallet v3 r2 contract.
//!
//! Key material is derived from a 24-word mnemonic the same way every TON
//! wallet does it (HMAC-SHA512 over the phrase, then PBKDF2-SHA512 with the
//! "TON default seed" salt), and transfers are signed externally submitted
//! messages whose payload the wallet contract replays on chain.

use {
    crate::{
        address::Address,
        boc::{self, BocError},
        cell::{Cell, CellBuilder, CellError},
        coins::Nano,
        state_init::contract_address,
    },
    base64::{Engine, engine::general_purpose::STANDARD},
    ed25519_dalek::{Signer, SigningKey},
    hmac::{Hmac, Mac},
    sha2::Sha512,
    std::sync::Arc,
    thiserror::Error,
};

/// Default subwallet id baked into every v3 wallet's initial data.
pub const WALLET_ID: u32 = 698_983_191;

/// Pay transfer fees separately from the message value.
pub const SEND_MODE_PAY_GAS_SEPARATELY: u8 = 1;
/// Ignore errors arising while processing the message.
pub const SEND_MODE_IGNORE_ERRORS: u8 = 2;

/// The wallet v3 r2 code cell, as published with the reference wallet
/// sources. Its representation hash is pinned by a test.
const WALLET_V3R2_CODE: &str = "te6cckEBAQEAcQAA3v8AIN0gggFMl7ohggEznLqxn3Gw7UTQ0x/THzHXC//jBOCk8mCDCNcYINMf0x/TH/gjE7vyY+1E0NMf0x/T/9FRMrryoVFEuvKiBPkBVBBV+RDyo/gAkyDXSpbTB9QC+wDo0QGkyMsfyx/L/8ntVBC9ba0=";

const MNEMONIC_WORDS: usize = 24;
const PBKDF2_ROUNDS: u32 = 100_000;
const PBKDF2_SALT: &[u8] = b"TON default seed";

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("mnemonic must contain {MNEMONIC_WORDS} words, got {0}")]
    BadMnemonic(usize),
    #[error("embedded wallet code is corrupted")]
    BadEmbeddedCode,
    #[error(transparent)]
    Cell(#[from] CellError),
    #[error(transparent)]
    Boc(#[from] BocError),
}

/// Ed25519 key material derived from a mnemonic phrase.
#[derive(Debug)]
pub struct KeyPair {
    secret: SigningKey,
}

impl KeyPair {
    pub fn public_key(&self) -> [u8; 32] {
        self.secret.verifying_key().to_bytes()
    }
}

/// Derives the wallet key pair from a 24-word mnemonic phrase.
pub fn derive_keypair(mnemonic: &str) -> Result<KeyPair, WalletError> {
    let words: Vec<&str> = mnemonic.split_whitespace().collect();
    if words.len() != MNEMONIC_WORDS {
        return Err(WalletError::BadMnemonic(words.len()));
    }
    let phrase = words.join(" ");
    let mut mac = Hmac::<Sha512>::new_from_slice(phrase.as_bytes())
        .map_err(|_| WalletError::BadMnemonic(words.len()))?;
    mac.update(b"");
    let entropy = mac.finalize().into_bytes();
    let mut seed = [0u8; 64];
    pbkdf2::pbkdf2_hmac::<Sha512>(&entropy, PBKDF2_SALT, PBKDF2_ROUNDS, &mut seed);
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&seed[..32]);
    Ok(KeyPair {
        secret: SigningKey::from_bytes(&secret),
    })
}

/// A transfer order carried by one signed external message.
pub struct Transfer {
    pub seqno: u32,
    pub valid_until: u32,
    pub send_mode: u8,
    pub dest: Address,
    pub value: Nano,
    pub bounce: bool,
    pub state_init: Option<Arc<Cell>>,
    pub body: Option<Arc<Cell>>,
}

/// A wallet v3 r2 contract owned by the key pair derived from a mnemonic.
pub struct Wallet {
    keypair: KeyPair,
    address: Address,
}

impl Wallet {
    pub fn from_mnemonic(mnemonic: &str, workchain: i32) -> Result<Self, WalletError> {
        let keypair = derive_keypair(mnemonic)?;
        let code = wallet_code()?;
        let data = initial_data(&keypair)?;
        let address = contract_address(workchain, &code, &Arc::new(data))?;
        Ok(Self { keypair, address })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public_key()
    }

    /// Builds the signed external message submitting one transfer.
    ///
    /// The signature covers (subwallet id, expiry, seqno, mode, order), so a
    /// message can neither be replayed nor have its order swapped out.
    pub fn create_transfer(&self, transfer: &Transfer) -> Result<Cell, WalletError> {
        let mut signing = CellBuilder::new();
        signing.store_uint(WALLET_ID.into(), 32)?;
        signing.store_uint(transfer.valid_until.into(), 32)?;
        signing.store_uint(transfer.seqno.into(), 32)?;
        signing.store_uint(transfer.send_mode.into(), 8)?;
        signing.store_reference(Arc::new(internal_message(transfer)?))?;
        let signing = signing.build()?;
        let signature = self.keypair.secret.sign(&signing.repr_hash());

        let mut body = CellBuilder::new();
        body.store_bytes(&signature.to_bytes())?;
        body.store_cell(&signing)?;
        let body = body.build()?;

        let mut message = CellBuilder::new();
        message.store_uint(0b10, 2)?; // ext_in_msg_info$10
        message.store_uint(0, 2)?; // src: addr_none
        message.store_address(&self.address)?;
        message.store_coins(0)?; // import fee
        message.store_bit(false)?; // wallet itself is already deployed
        message.store_bit(true)?; // body in a reference
        message.store_reference(Arc::new(body))?;
        Ok(message.build()?)
    }
}

/// The order relayed by the wallet: an internal message carrying value,
/// the contract's initial state, and the optional init payload.
fn internal_message(transfer: &Transfer) -> Result<Cell, CellError> {
    let mut message = CellBuilder::new();
    message.store_bit(false)?; // int_msg_info$0
    message.store_bit(true)?; // ihr_disabled
    message.store_bit(transfer.bounce)?;
    message.store_bit(false)?; // bounced
    message.store_uint(0, 2)?; // src: addr_none
    message.store_address(&transfer.dest)?;
    message.store_coins(transfer.value.0)?;
    message.store_bit(false)?; // no extra currencies
    message.store_coins(0)?; // ihr fee
    message.store_coins(0)?; // forward fee
    message.store_uint(0, 64)?; // created_lt
    message.store_uint(0, 32)?; // created_at
    match &transfer.state_init {
        Some(init) => {
            message.store_bit(true)?;
            message.store_bit(true)?; // as a reference
            message.store_reference(init.clone())?;
        }
        None => {
            message.store_bit(false)?;
        }
    }
    match &transfer.body {
        Some(body) => {
            message.store_bit(true)?; // as a reference
            message.store_reference(body.clone())?;
        }
        None => {
            message.store_bit(false)?;
        }
    }
    message.build()
}

/// The published wallet v3 r2 code cell.
pub fn wallet_code() -> Result<Arc<Cell>, WalletError> {
    let bytes = STANDARD
        .decode(WALLET_V3R2_CODE)
        .map_err(|_| WalletError::BadEmbeddedCode)?;
    Ok(boc::read(&bytes)?)
}

/// Initial wallet data: seqno 0, the subwallet id, and the public key.
fn initial_data(keypair: &KeyPair) -> Result<Cell, CellError> {
    let mut builder = CellBuilder::new();
    builder.store_uint(0, 32)?;
    builder.store_uint(WALLET_ID.into(), 32)?;
    builder.store_bytes(&keypair.public_key())?;
    builder.build()
}
