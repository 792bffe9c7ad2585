#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod abi;
pub mod calls;

use alloy_primitives::{Address, B256, U256};
use num_bigint::BigUint;
use thiserror::Error;
use zap_common::{errors::ZapError, Bytes};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid length for {kind}: expected {expected} bytes, got {actual}")]
    InvalidLength { kind: &'static str, expected: usize, actual: usize },
    #[error("Value {0} does not fit into 256 bits")]
    Overflow(BigUint),
    #[error("Amount must be positive: {0}")]
    NonPositiveAmount(String),
    #[error("Unsupported call: {0}")]
    Unsupported(String),
}

impl From<EncodingError> for ZapError {
    fn from(err: EncodingError) -> Self {
        ZapError::Encoding(err.to_string())
    }
}

/// A trait for converting types to and from `Bytes`.
///
/// Unlike a plain `From` conversion this never panics on malformed input, lengths are checked
/// and reported as `EncodingError`.
pub trait BytesCodec: Sized {
    /// Converts the current type into `Bytes`.
    fn to_bytes(self) -> Bytes;

    /// Converts `Bytes` into the current type.
    fn from_bytes(bytes: &Bytes) -> Result<Self, EncodingError>;
}

impl BytesCodec for Address {
    fn to_bytes(self) -> Bytes {
        Bytes::from(self.0.to_vec())
    }

    /// Accepts exactly 20 bytes.
    fn from_bytes(bytes: &Bytes) -> Result<Self, EncodingError> {
        if bytes.len() != 20 {
            return Err(EncodingError::InvalidLength {
                kind: "address",
                expected: 20,
                actual: bytes.len(),
            });
        }
        Ok(Address::from_slice(bytes.as_ref()))
    }
}

impl BytesCodec for B256 {
    fn to_bytes(self) -> Bytes {
        Bytes::from(self.0.to_vec())
    }

    /// Accepts up to 32 bytes, left padded with zeros.
    fn from_bytes(bytes: &Bytes) -> Result<Self, EncodingError> {
        if bytes.len() > 32 {
            return Err(EncodingError::InvalidLength {
                kind: "bytes32",
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; 32];
        buf[32 - bytes.len()..].copy_from_slice(bytes.as_ref());
        Ok(B256::from(buf))
    }
}

impl BytesCodec for U256 {
    fn to_bytes(self) -> Bytes {
        let buf = self.to_be_bytes::<32>();
        Bytes::from(buf.to_vec())
    }

    /// Big-endian, up to 32 bytes.
    fn from_bytes(bytes: &Bytes) -> Result<Self, EncodingError> {
        U256::try_from_be_slice(bytes.as_ref()).ok_or(EncodingError::InvalidLength {
            kind: "uint256",
            expected: 32,
            actual: bytes.len(),
        })
    }
}

pub fn biguint_to_u256(value: &BigUint) -> Result<U256, EncodingError> {
    U256::try_from_be_slice(&value.to_bytes_be()).ok_or_else(|| EncodingError::Overflow(value.clone()))
}

pub fn u256_to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

/// Left pads an address into a `bytes32` word, as used for CCTP recipients.
pub fn address_to_b256(address: &Address) -> B256 {
    address.into_word()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_address_codec() {
        let bytes = Bytes::from_str("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2").unwrap();

        let address = Address::from_bytes(&bytes).unwrap();

        assert_eq!(address.to_bytes(), bytes);
        assert!(Address::from_bytes(&Bytes::zero(32)).is_err());
    }

    #[test]
    fn test_u256_codec() {
        let value = U256::from(1_000_000u64);

        let bytes = value.to_bytes();

        assert_eq!(bytes.len(), 32);
        assert_eq!(U256::from_bytes(&bytes).unwrap(), value);
        assert_eq!(U256::from_bytes(&Bytes::from(vec![1u8, 0])).unwrap(), U256::from(256u64));
        let mut too_large = vec![0u8; 33];
        too_large[0] = 1;
        assert!(U256::from_bytes(&Bytes::from(too_large)).is_err());
    }

    #[test]
    fn test_biguint_conversion() {
        let value = BigUint::from(10u64).pow(30);

        let converted = biguint_to_u256(&value).unwrap();

        assert_eq!(u256_to_biguint(converted), value);
        assert!(biguint_to_u256(&(BigUint::from(1u32) << 256)).is_err());
    }
}
