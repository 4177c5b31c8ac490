//! # Payload
//!
//! Random byte sequences uploaded by the scenarios

use rand::RngCore;

use crate::types::Mismatch;

/// Immutable random bytes generated for a single scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
}

impl Payload {
    /// Generate `len` bytes from the thread-local cryptographically secure generator
    pub fn random(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes a retrieve starting at `offset` must return.
    /// Returns `None` if `offset` lies past the end of the payload
    pub fn tail(&self, offset: usize) -> Option<&[u8]> {
        self.bytes.get(offset..)
    }

    /// Compare `received` with the bytes expected from a retrieve starting at `offset`
    pub fn verify(&self, offset: usize, received: &[u8]) -> Result<(), Mismatch> {
        let expected = self.tail(offset).unwrap_or_default();
        if expected == received {
            return Ok(());
        }
        Err(Mismatch {
            expected_len: expected.len(),
            actual_len: received.len(),
            first_difference: expected
                .iter()
                .zip(received.iter())
                .position(|(expected, actual)| expected != actual),
        })
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}
