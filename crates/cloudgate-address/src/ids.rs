//! Exposed identifier translation
//!
//! The exposed API names resources with typed strings like
//! `eipalloc-0000a1b2`: a kind prefix, a dash, and the durable id in
//! lowercase hex (at least 8 digits). Allocation and association ids share
//! the same durable id and differ only in the prefix.

use std::fmt;
use thiserror::Error;

/// Resource kind prefix of an exposed identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Allocation,
    Association,
    NetworkInterface,
    Instance,
}

impl Kind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Kind::Allocation => "eipalloc",
            Kind::Association => "eipassoc",
            Kind::NetworkInterface => "eni",
            Kind::Instance => "i",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "eipalloc" => Some(Kind::Allocation),
            "eipassoc" => Some(Kind::Association),
            "eni" => Some(Kind::NetworkInterface),
            "i" => Some(Kind::Instance),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Malformed identifier: {0}")]
    Malformed(String),

    #[error("Identifier {id} is not of kind {expected}")]
    WrongKind { id: String, expected: Kind },
}

/// Encode a durable id as an exposed identifier of the given kind
pub fn encode(id: u64, kind: Kind) -> String {
    format!("{}-{:08x}", kind.prefix(), id)
}

/// Split an exposed identifier into its kind and durable id
pub fn parse(exposed: &str) -> Result<(Kind, u64), IdError> {
    let malformed = || IdError::Malformed(exposed.to_string());

    let (prefix, hex) = exposed.split_once('-').ok_or_else(malformed)?;
    let kind = Kind::from_prefix(prefix).ok_or_else(malformed)?;

    if hex.is_empty() || hex.len() > 16 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    let id = u64::from_str_radix(hex, 16).map_err(|_| malformed())?;

    Ok((kind, id))
}

/// Decode an exposed identifier that must be of the given kind
pub fn decode_as(exposed: &str, kind: Kind) -> Result<u64, IdError> {
    let (actual, id) = parse(exposed)?;
    if actual != kind {
        return Err(IdError::WrongKind {
            id: exposed.to_string(),
            expected: kind,
        });
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode(1, Kind::Allocation), "eipalloc-00000001");
        assert_eq!(encode(0xdeadbeef, Kind::NetworkInterface), "eni-deadbeef");
        assert_eq!(encode(0x2a, Kind::Instance), "i-0000002a");
    }

    #[test]
    fn test_decode_short_form() {
        assert_eq!(parse("eipalloc-1").unwrap(), (Kind::Allocation, 1));
        assert_eq!(decode_as("eipassoc-ff", Kind::Association).unwrap(), 255);
    }

    #[test]
    fn test_decode_roundtrip() {
        let exposed = encode(0x1234abcd, Kind::Allocation);
        assert_eq!(decode_as(&exposed, Kind::Allocation).unwrap(), 0x1234abcd);
    }

    #[test]
    fn test_decode_malformed() {
        for bad in ["", "eipalloc", "eipalloc-", "eipalloc-xyz", "bogus-0001", "-0001"] {
            assert!(
                matches!(parse(bad), Err(IdError::Malformed(_))),
                "{} should be malformed",
                bad
            );
        }
        assert!(parse("eipalloc-00000000000000001").is_err());
    }

    #[test]
    fn test_decode_wrong_kind() {
        let err = decode_as("eipalloc-00000001", Kind::Association).unwrap_err();
        assert!(matches!(err, IdError::WrongKind { .. }));
    }

    #[test]
    fn test_association_shares_durable_id() {
        let allocation_id = encode(77, Kind::Allocation);
        let id = decode_as(&allocation_id, Kind::Allocation).unwrap();
        let association_id = encode(id, Kind::Association);

        assert_eq!(association_id, "eipassoc-0000004d");
        assert_eq!(parse(&association_id).unwrap(), (Kind::Association, 77));
    }
}
