//! State codec: structured game state <-> compact, text-safe [`StateKey`].
//!
//! A state is first lowered to a `serde_json::Value`, whose maps are ordered,
//! so field and map-entry order in the source type never changes the key.
//! The compact JSON text is then raw-deflated and wrapped in URL-safe base64
//! without padding.
//!
//! JSON cannot spell NaN or the infinities, so states holding them are
//! rejected rather than lowered to `null`. Negative zero is written as `0.0`,
//! since it compares equal to positive zero.

use std::{
    fmt,
    io::{Read, Write},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use flate2::{Compression, read::DeflateDecoder, write::DeflateEncoder};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, DeserializeOwned, MapAccess, SeqAccess, Visitor},
    ser::Error as _,
};
use serde_json::Value;

use crate::{error::CodecError, types::StateKey};

/// Fixed so that keys stay byte-identical across runs.
const COMPRESSION_LEVEL: u32 = 6;

/// Encode a state into its canonical key.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if the state cannot be represented as
/// JSON (for example a map with non-string keys), and
/// [`CodecError::NonFiniteState`] if it holds NaN or an infinity.
pub fn encode<S: Serialize + ?Sized>(state: &S) -> Result<StateKey, CodecError> {
    let mut canonical = serde_json::to_value(state).map_err(CodecError::Serialize)?;
    ensure_finite(state)?;
    normalize_zeros(&mut canonical);
    let json = serde_json::to_vec(&canonical).map_err(CodecError::Serialize)?;

    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(json.len() / 2),
        Compression::new(COMPRESSION_LEVEL),
    );
    encoder.write_all(&json).map_err(CodecError::Compress)?;
    let compressed = encoder.finish().map_err(CodecError::Compress)?;

    Ok(StateKey::from(URL_SAFE_NO_PAD.encode(compressed)))
}

/// Decode a key back into a state.
///
/// # Errors
///
/// Fails if the key is empty, not valid base64, truncated, or if the
/// decompressed bytes are not valid JSON for `S`.
pub fn decode<S: DeserializeOwned>(key: &StateKey) -> Result<S, CodecError> {
    let json = inflate(key)?;
    serde_json::from_slice(&json).map_err(CodecError::Malformed)
}

/// Check that a key decodes to well-formed structured data.
pub fn validate(key: &StateKey) -> Result<(), CodecError> {
    decode::<serde_json::Value>(key).map(|_| ())
}

fn ensure_finite<S: Serialize + ?Sized>(state: &S) -> Result<(), CodecError> {
    let packed = rmp_serde::to_vec(state)
        .map_err(|err| CodecError::Serialize(serde_json::Error::custom(err)))?;
    let Finite(finite) = rmp_serde::from_slice(&packed)
        .map_err(|err| CodecError::Serialize(serde_json::Error::custom(err)))?;
    if finite {
        Ok(())
    } else {
        Err(CodecError::NonFiniteState)
    }
}

fn normalize_zeros(value: &mut Value) {
    if value.is_f64() && value.as_f64() == Some(0.0) {
        *value = Value::from(0.0);
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(normalize_zeros),
        Value::Object(map) => map.values_mut().for_each(normalize_zeros),
        _ => {}
    }
}

/// Whether every float in a serialized value is finite.
struct Finite(bool);

impl<'de> Deserialize<'de> for Finite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FiniteVisitor)
    }
}

struct FiniteVisitor;

impl<'de> Visitor<'de> for FiniteVisitor {
    type Value = Finite;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a serialized state")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Finite, E> {
        Ok(Finite(v.is_finite()))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Finite, E> {
        Ok(Finite(true))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Finite, E> {
        Ok(Finite(true))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Finite, E> {
        Ok(Finite(true))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Finite, E> {
        Ok(Finite(true))
    }

    fn visit_bytes<E: de::Error>(self, _: &[u8]) -> Result<Finite, E> {
        Ok(Finite(true))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Finite, E> {
        Ok(Finite(true))
    }

    fn visit_none<E: de::Error>(self) -> Result<Finite, E> {
        Ok(Finite(true))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Finite, D::Error> {
        Finite::deserialize(deserializer)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<Finite, D::Error> {
        Finite::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Finite, A::Error> {
        let mut finite = true;
        while let Some(Finite(item)) = seq.next_element()? {
            finite &= item;
        }
        Ok(Finite(finite))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Finite, A::Error> {
        let mut finite = true;
        while let Some((Finite(key), Finite(value))) = map.next_entry()? {
            finite &= key && value;
        }
        Ok(Finite(finite))
    }
}

fn inflate(key: &StateKey) -> Result<Vec<u8>, CodecError> {
    if key.is_empty() {
        return Err(CodecError::Empty);
    }
    let compressed = URL_SAFE_NO_PAD.decode(key.as_str())?;
    let mut json = Vec::with_capacity(compressed.len() * 2);
    DeflateDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(CodecError::Decompress)?;
    Ok(json)
}
