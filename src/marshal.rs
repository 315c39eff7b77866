//! Marshaller submodule.
//!
//! `serde` is paired with `bincode` and exposed as an explicit trait so an
//! embedding can swap in its own wire format wherever `Task` would
//! otherwise need to know a concrete encoding.
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::RuntimeError;

/// Transports values across isolated `Interpreter` states.
///
/// `decode(encode(v))` must produce a value semantically equivalent to `v`
/// for any `T: Serialize + DeserializeOwned`. Nontransferable values are
/// simply values whose `Serialize` impl itself refuses to encode them —
/// that constraint lives on `T`, not here.
pub trait Marshaller<T> {
    fn encode(value: &T) -> Result<Vec<u8>, RuntimeError>;
    fn decode(bytes: &[u8]) -> Result<T, RuntimeError>;
}

/// The default marshaller: plain `bincode` over `serde`.
///
/// This is what `Task` uses unless an embedding crate supplies its own
/// `Marshaller` (for example to special-case large buffers with a shared
/// memory region instead of copying them through `bincode`).
pub struct BincodeMarshaller;

impl<T: Serialize + DeserializeOwned> Marshaller<T> for BincodeMarshaller {
    fn encode(value: &T) -> Result<Vec<u8>, RuntimeError> {
        bincode::serialize(value).map_err(|err| RuntimeError::Marshal(err.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<T, RuntimeError> {
        bincode::deserialize(bytes).map_err(|err| RuntimeError::Marshal(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn round_trips_through_bytes() {
        let value = Point { x: 4, y: -9 };
        let bytes = BincodeMarshaller::encode(&value).unwrap();
        let decoded: Point = BincodeMarshaller::decode(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn rejects_garbage_bytes() {
        let result: Result<Point, _> = BincodeMarshaller::decode(&[0xff, 0x00]);
        assert!(result.is_err());
    }
}
