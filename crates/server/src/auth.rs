//! Session auth tokens.
//!
//! Each session gets a fresh 32-character alphanumeric token. It is only ever
//! written to the session's lockfile; peers prove they read it by sending it
//! back in an `authenticate` request.

use std::fmt;

use ring::rand::{SecureRandom, SystemRandom};

pub const TOKEN_LEN: usize = 32;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
// Largest multiple of the alphabet size that fits in a byte; bytes at or
// above it are rejected so every character is equally likely.
const REJECT_FROM: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn generate() -> Result<Self, ring::error::Unspecified> {
        let rng = SystemRandom::new();
        let mut token = String::with_capacity(TOKEN_LEN);
        let mut buf = [0u8; 64];

        while token.len() < TOKEN_LEN {
            rng.fill(&mut buf)?;
            for byte in buf.iter().copied().filter(|b| *b < REJECT_FROM) {
                if token.len() == TOKEN_LEN {
                    break;
                }
                token.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
            }
        }

        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare a candidate against this token without early exit.
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

#[cfg(test)]
impl From<&str> for AuthToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Length is not secret (tokens are fixed-size); content is compared in full.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
