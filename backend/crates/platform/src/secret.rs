//! Secret Generation
//!
//! Reset tokens and one-time codes drawn from the OS CSPRNG.
//!
//! One-time codes use a 32-symbol alphabet with the visually ambiguous
//! characters (`0`, `O`, `1`, `I`, `l`) removed, so they survive being read
//! aloud or copied from an SMS. Because 32 divides 256, mapping a random byte
//! with `byte % 32` is unbiased; any future alphabet must keep that property
//! or switch to rejection sampling.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{EntropyError, fill_random, to_hex};

/// Alphabet for one-time codes
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Shortest accepted code length
pub const MIN_CODE_LENGTH: usize = 4;

/// Longest accepted code length
pub const MAX_CODE_LENGTH: usize = 12;

/// Length used when a requested length is out of range
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Random bytes behind a reset token (hex-encoded to 64 characters)
pub const TOKEN_BYTES: usize = 32;

const _: () = assert!(256 % CODE_ALPHABET.len() == 0);

/// Cryptographically secure token and code generator
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretGenerator;

impl SecretGenerator {
    pub const fn new() -> Self {
        Self
    }

    /// 32 random bytes as 64 lowercase hex characters.
    pub fn generate_token(&self) -> Result<String, EntropyError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        fill_random(&mut bytes)?;
        Ok(to_hex(&bytes))
    }

    /// Human-friendly code of `length` symbols from [`CODE_ALPHABET`].
    ///
    /// Lengths outside `MIN_CODE_LENGTH..=MAX_CODE_LENGTH` fall back to
    /// [`DEFAULT_CODE_LENGTH`].
    pub fn generate_code(&self, length: usize) -> Result<String, EntropyError> {
        let length = clamp_code_length(length);

        let mut bytes = [0u8; MAX_CODE_LENGTH];
        let bytes = &mut bytes[..length];
        fill_random(bytes)?;

        let code: String = bytes
            .iter()
            .map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char)
            .collect();
        Ok(code)
    }

    /// Insert a hyphen every `group_size` characters for display
    /// (`ABCDEF` → `ABC-DEF`). A group size of zero means 3.
    pub fn format_code(&self, code: &str, group_size: usize) -> String {
        let group_size = if group_size == 0 { 3 } else { group_size };

        let mut formatted = String::with_capacity(code.len() + code.len() / group_size);
        for (i, ch) in code.chars().enumerate() {
            if i > 0 && i % group_size == 0 {
                formatted.push('-');
            }
            formatted.push(ch);
        }
        formatted
    }

    /// Undo display formatting: drop hyphens and whitespace, upper-case.
    pub fn normalize_code(&self, input: &str) -> String {
        input
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }
}

/// Plaintext secret on its way to a delivery channel
///
/// Zeroized on drop; `Debug` is redacted. Read it with [`SecretString::expose`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

fn clamp_code_length(length: usize) -> usize {
    if (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
        length
    } else {
        DEFAULT_CODE_LENGTH
    }
}
