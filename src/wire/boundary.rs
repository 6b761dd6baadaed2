//! Boundary tokens and the randomness they are drawn from.

use heapless::String;

use crate::error::Error;

/// Length of every boundary token.
pub const BOUNDARY_LEN: usize = 22;

/// The 62 symbols a boundary character is drawn from.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A multipart boundary token.
pub type Boundary = String<BOUNDARY_LEN>;

/// A source of random numbers for boundary generation.
///
/// Platforms plug in their hardware RNG here; tests plug in a seeded PRNG so
/// encoded bodies are reproducible.
pub trait RandomSource {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Returns the next random value.
    fn next_u32(&mut self) -> Result<u32, Self::Error>;
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    type Error = R::Error;

    fn next_u32(&mut self) -> Result<u32, Self::Error> {
        (**self).next_u32()
    }
}

/// Draws a fresh boundary token.
///
/// Each character is picked independently. If the source fails part way the
/// partial token is discarded and [`Error::RandomSource`] is returned.
pub fn generate<R: RandomSource + ?Sized>(rng: &mut R) -> Result<Boundary, Error> {
    let mut token = Boundary::new();
    for _ in 0..BOUNDARY_LEN {
        let value = rng.next_u32().map_err(|_| Error::RandomSource)?;
        let symbol = ALPHABET[(value % ALPHABET.len() as u32) as usize];
        token.push(symbol as char).map_err(|_| Error::Internal)?;
    }
    Ok(token)
}

/// Returns `true` if `token` has the shape of a boundary.
pub fn is_valid(token: &str) -> bool {
    token.len() == BOUNDARY_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
}
