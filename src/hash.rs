//! Object id: a 20-byte SHA-1 hash that doubles as the loose-object storage key.
//!
//! The coverage-repository format (`spec.md` §3) is pinned to SHA-1, so `Oid`
//! stays a fixed-width hash rather than a selectable-algorithm abstraction.

use std::fmt::{self, Display};
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};

use crate::errors::CovError;

pub const OID_BYTES: usize = 20;
pub const OID_HEX_LEN: usize = 40;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid([u8; OID_BYTES]);

impl Default for Oid {
    fn default() -> Self {
        Oid::zero()
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Oid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Serializes as its 40-char hex string, matching `Display`/`FromStr`.
impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Oid {
    type Err = CovError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != OID_HEX_LEN {
            return Err(CovError::InvalidName(format!(
                "`{s}` is not a {OID_HEX_LEN}-char hex oid"
            )));
        }
        let bytes =
            hex::decode(s).map_err(|e| CovError::InvalidName(format!("`{s}`: {e}")))?;
        let mut buf = [0u8; OID_BYTES];
        buf.copy_from_slice(&bytes);
        Ok(Oid(buf))
    }
}

impl Oid {
    /// The all-zero oid, used to denote "absent" (e.g. a report with no parent).
    pub const fn zero() -> Self {
        Oid([0u8; OID_BYTES])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; OID_BYTES]
    }

    /// Compute the SHA-1 of the given bytes directly (used for loose-object
    /// addressing, where the stored bytes themselves, not a `type len\0` header,
    /// are hashed -- unlike Git's blob hashing).
    pub fn of(data: &[u8]) -> Oid {
        let digest = Sha1::digest(data);
        let mut buf = [0u8; OID_BYTES];
        buf.copy_from_slice(&digest);
        Oid(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Oid, CovError> {
        if bytes.len() != OID_BYTES {
            return Err(CovError::InvalidName(format!(
                "expected {OID_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = [0u8; OID_BYTES];
        buf.copy_from_slice(bytes);
        Ok(Oid(buf))
    }

    pub fn from_stream(r: &mut impl io::Read) -> io::Result<Oid> {
        let mut buf = [0u8; OID_BYTES];
        r.read_exact(&mut buf)?;
        Ok(Oid(buf))
    }

    /// Two-level fan-out directory name (first byte, hex) and filename (remaining
    /// 19 bytes, hex) used by the loose-object backend (`spec.md` §4.C).
    pub fn fanout(&self) -> (String, String) {
        let hex = hex::encode(self.0);
        (hex[..2].to_string(), hex[2..].to_string())
    }

    /// Running SHA-1 accumulator, used by the safe-stream writer to compute the
    /// final oid while the object is still being written to a temp file.
    pub fn hasher() -> Sha1 {
        Sha1::new()
    }

    pub fn from_hasher(hasher: Sha1) -> Oid {
        let digest = hasher.finalize();
        let mut buf = [0u8; OID_BYTES];
        buf.copy_from_slice(&digest);
        Oid(buf)
    }
}
