//! Non-finite float detection for metadata.
//!
//! `serde_json` writes NaN and infinities as `null`. Metadata is walked with
//! a no-output serializer first so those values surface as an error instead.

use std::fmt;

use serde::ser::{self, Serialize};

/// Returns the first NaN or infinite float found in `value`, if any.
///
/// Serialization failures other than non-finite floats are left for
/// `serde_json` to report.
pub(crate) fn first_non_finite<T: Serialize + ?Sized>(value: &T) -> Option<f64> {
    match value.serialize(Probe) {
        Err(ProbeError::NonFinite(v)) => Some(v),
        Ok(()) | Err(ProbeError::Custom) => None,
    }
}

#[derive(Debug)]
enum ProbeError {
    NonFinite(f64),
    Custom,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::NonFinite(v) => write!(f, "non-finite float {v}"),
            ProbeError::Custom => f.write_str("serialization failed"),
        }
    }
}

impl std::error::Error for ProbeError {}

impl ser::Error for ProbeError {
    fn custom<T: fmt::Display>(_msg: T) -> Self {
        ProbeError::Custom
    }
}

type ProbeResult = Result<(), ProbeError>;

fn check(v: f64) -> ProbeResult {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ProbeError::NonFinite(v))
    }
}

struct Probe;

impl ser::Serializer for Probe {
    type Ok = ();
    type Error = ProbeError;
    type SerializeSeq = Probe;
    type SerializeTuple = Probe;
    type SerializeTupleStruct = Probe;
    type SerializeTupleVariant = Probe;
    type SerializeMap = Probe;
    type SerializeStruct = Probe;
    type SerializeStructVariant = Probe;

    fn serialize_bool(self, _: bool) -> ProbeResult {
        Ok(())
    }
    fn serialize_i8(self, _: i8) -> ProbeResult {
        Ok(())
    }
    fn serialize_i16(self, _: i16) -> ProbeResult {
        Ok(())
    }
    fn serialize_i32(self, _: i32) -> ProbeResult {
        Ok(())
    }
    fn serialize_i64(self, _: i64) -> ProbeResult {
        Ok(())
    }
    fn serialize_i128(self, _: i128) -> ProbeResult {
        Ok(())
    }
    fn serialize_u8(self, _: u8) -> ProbeResult {
        Ok(())
    }
    fn serialize_u16(self, _: u16) -> ProbeResult {
        Ok(())
    }
    fn serialize_u32(self, _: u32) -> ProbeResult {
        Ok(())
    }
    fn serialize_u64(self, _: u64) -> ProbeResult {
        Ok(())
    }
    fn serialize_u128(self, _: u128) -> ProbeResult {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> ProbeResult {
        check(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> ProbeResult {
        check(v)
    }

    fn serialize_char(self, _: char) -> ProbeResult {
        Ok(())
    }
    fn serialize_str(self, _: &str) -> ProbeResult {
        Ok(())
    }
    fn serialize_bytes(self, _: &[u8]) -> ProbeResult {
        Ok(())
    }
    fn serialize_none(self) -> ProbeResult {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> ProbeResult {
        value.serialize(Probe)
    }

    fn serialize_unit(self) -> ProbeResult {
        Ok(())
    }
    fn serialize_unit_struct(self, _: &'static str) -> ProbeResult {
        Ok(())
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> ProbeResult {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> ProbeResult {
        value.serialize(Probe)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> ProbeResult {
        value.serialize(Probe)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Probe, ProbeError> {
        Ok(Probe)
    }
    fn serialize_tuple(self, _: usize) -> Result<Probe, ProbeError> {
        Ok(Probe)
    }
    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Probe, ProbeError> {
        Ok(Probe)
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Probe, ProbeError> {
        Ok(Probe)
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Probe, ProbeError> {
        Ok(Probe)
    }
    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Probe, ProbeError> {
        Ok(Probe)
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Probe, ProbeError> {
        Ok(Probe)
    }
}

impl ser::SerializeSeq for Probe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> ProbeResult {
        value.serialize(Probe)
    }
    fn end(self) -> ProbeResult {
        Ok(())
    }
}

impl ser::SerializeTuple for Probe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> ProbeResult {
        value.serialize(Probe)
    }
    fn end(self) -> ProbeResult {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for Probe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> ProbeResult {
        value.serialize(Probe)
    }
    fn end(self) -> ProbeResult {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for Probe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> ProbeResult {
        value.serialize(Probe)
    }
    fn end(self) -> ProbeResult {
        Ok(())
    }
}

impl ser::SerializeMap for Probe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> ProbeResult {
        key.serialize(Probe)
    }
    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> ProbeResult {
        value.serialize(Probe)
    }
    fn end(self) -> ProbeResult {
        Ok(())
    }
}

impl ser::SerializeStruct for Probe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> ProbeResult {
        value.serialize(Probe)
    }
    fn end(self) -> ProbeResult {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Probe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> ProbeResult {
        value.serialize(Probe)
    }
    fn end(self) -> ProbeResult {
        Ok(())
    }
}
