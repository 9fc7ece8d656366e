use std::ops::RangeInclusive;

use hmac::{Hmac, Mac};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;
use crate::symbols::{Column, SymbolId, ROWS};

pub type HmacSha256 = Hmac<Sha256>;

/// Source of uniform floats in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;
}

impl<T: RandomSource + ?Sized> RandomSource for Box<T> {
    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }
}

/// General purpose PRNG, seeded from the OS or from a fixed `u64`.
#[derive(Debug, Clone)]
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seed_from_u64(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

pub fn derive_hash_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// Map successive big-endian u32 chunks to floats in `[0, 1)`.
pub fn derive_floats(bytes: &[u8], count: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(count);
    let mut buffer = bytes.to_vec();
    let mut i = 0usize;
    while out.len() < count {
        if i + 4 > buffer.len() {
            buffer = Sha256::digest(&buffer).to_vec();
            i = 0;
            continue;
        }
        out.push(chunk_to_unit(&buffer[i..i + 4]));
        i += 4;
    }
    out
}

fn chunk_to_unit(chunk: &[u8]) -> f64 {
    let v = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    (v as f64) / (u32::MAX as f64 + 1.0)
}

/// Reproducible stream: HMAC-SHA256(server_seed, "client_seed:nonce"), then
/// re-hashed whenever the buffer runs dry. Publishing the SHA-256 of the
/// server seed ahead of play lets anyone replay the stream afterwards.
#[derive(Debug, Clone)]
pub struct ProvablyFairRng {
    pub server_seed: String, // secret
    pub client_seed: String,
    pub nonce: u64,
    buffer: Vec<u8>,
    cursor: usize,
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        let mut rng = Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
            buffer: Vec::new(),
            cursor: 0,
        };
        rng.buffer = rng.hmac_bytes().to_vec();
        rng
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn hmac_bytes(&self) -> [u8; 32] {
        // HMAC takes keys of any length
        let mut mac = HmacSha256::new_from_slice(self.server_seed.as_bytes()).expect("HMAC key");
        let msg = format!("{}:{}", self.client_seed, self.nonce);
        mac.update(msg.as_bytes());
        let res = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&res);
        out
    }

    /// First `count` floats of the stream, independent of how much was consumed.
    pub fn next_floats(&self, count: usize) -> Vec<f64> {
        derive_floats(&self.hmac_bytes(), count)
    }
}

impl RandomSource for ProvablyFairRng {
    fn next_f64(&mut self) -> f64 {
        if self.cursor + 4 > self.buffer.len() {
            self.buffer = Sha256::digest(&self.buffer).to_vec();
            self.cursor = 0;
        }
        let f = chunk_to_unit(&self.buffer[self.cursor..self.cursor + 4]);
        self.cursor += 4;
        f
    }
}

/// Draws symbol identifiers uniformly over `[0, K)`.
pub struct SymbolRng {
    alphabet: u8,
    source: Box<dyn RandomSource>,
}

impl SymbolRng {
    pub fn new(alphabet: u8, source: impl RandomSource + 'static) -> Result<Self, ConfigError> {
        if alphabet == 0 {
            return Err(ConfigError::EmptyAlphabet);
        }
        Ok(Self {
            alphabet,
            source: Box::new(source),
        })
    }

    pub fn alphabet(&self) -> u8 {
        self.alphabet
    }

    pub fn next(&mut self) -> SymbolId {
        let k = self.alphabet as f64;
        // clamp guards sources that return exactly 1.0
        ((self.source.next_f64() * k).floor() as u8).min(self.alphabet - 1)
    }

    pub fn column(&mut self) -> Column {
        let mut column = [0; ROWS];
        for slot in column.iter_mut() {
            *slot = self.next();
        }
        column
    }

    /// Uniform draw from a closed integer range.
    pub fn in_range(&mut self, range: &RangeInclusive<u32>) -> u32 {
        let (lo, hi) = (*range.start(), *range.end());
        if hi <= lo {
            return lo;
        }
        let width = (hi - lo) as f64 + 1.0;
        lo + ((self.source.next_f64() * width).floor() as u32).min(hi - lo)
    }
}

impl std::fmt::Debug for SymbolRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolRng")
            .field("alphabet", &self.alphabet)
            .finish_non_exhaustive()
    }
}
