//! gobwire is a self-describing binary encoding for Rust values.
//!
//! A stream carries the shape of every type it uses. The first time a type
//! goes out, the [`Encoder`] sends its descriptor ahead of the value; the
//! [`Decoder`] records descriptors as they arrive and pairs remote struct
//! fields with local ones by name. Sender and receiver do not have to agree
//! on a schema up front, only on compatible shapes.
//!
//! # Quickstart
//!
//! Derive [`Gob`] on your structs. Integers, floats, strings, byte vectors,
//! arrays, `Vec`, maps, `Option` and `Box` are supported out of the box.
//!
//! ```
//! # use gobwire::Gob;
//! #[derive(Gob, Debug, Default, PartialEq)]
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//!
//! let bytes = gobwire::serialize(&Point { x: 3, y: 0 }).unwrap();
//! let point: Point = gobwire::deserialize(&bytes).unwrap();
//! assert_eq!(point, Point { x: 3, y: 0 });
//! ```
//!
//! # Evolving types
//!
//! Fields are matched by name, so a receiver may reorder, drop or add fields.
//! Fields it does not know are skipped; fields missing from the stream keep
//! their current value. Integer widths may differ on each side as long as the
//! value fits.
//!
//! ```
//! # use gobwire::Gob;
//! #[derive(Gob)]
//! struct V1 {
//!     name: String,
//!     age: u8,
//! }
//!
//! #[derive(Gob, Debug, Default, PartialEq)]
//! #[gob(name = "V1")]
//! struct V2 {
//!     email: String,
//!     age: u32,
//! }
//!
//! let bytes = gobwire::serialize(&V1 { name: "ann".into(), age: 30 }).unwrap();
//! let v2: V2 = gobwire::deserialize(&bytes).unwrap();
//! assert_eq!(v2, V2 { email: String::new(), age: 30 });
//! ```
//!
//! # Dynamic values
//!
//! [`Interface`] holds any registered [`Gob`] type. Each value on the wire
//! carries the name it was registered under, see [`Registry::register_name`].
//! Types with their own byte representation implement [`GobCodec`] and
//! [`custom_gob!`].
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
extern crate self as gobwire;

pub mod compat;
mod config;
mod dec;
mod decoder;
mod enc;
mod encoder;
pub mod error;
pub mod io;
mod registry;
mod schema;
pub mod types;
pub mod varint;

pub use {
    config::{Config, DEFAULT_MAX_MESSAGE_SIZE},
    decoder::Decoder,
    encoder::Encoder,
    error::{Error, Result},
    gobwire_derive::Gob,
    registry::Registry,
    schema::*,
    types::{GobType, TypeId},
};

/// Encode `value` as a complete stream: its type descriptors followed by the value.
///
/// Uses the global [`Registry`].
pub fn serialize<T: Gob>(value: &T) -> Result<Vec<u8>> {
    let mut enc = Encoder::new(Vec::new());
    enc.encode(value)?;
    Ok(enc.into_inner())
}

/// Decode the first value of a stream produced by [`serialize`].
///
/// Uses the global [`Registry`].
pub fn deserialize<T: Gob>(bytes: &[u8]) -> Result<T> {
    Decoder::new(bytes).decode_value()
}

#[cfg(test)]
mod proptest_config {
    use proptest::test_runner::Config;

    /// Keep property tests quick under miri and in debug builds.
    pub fn proptest_cfg() -> Config {
        Config {
            cases: if cfg!(miri) { 8 } else { 256 },
            failure_persistence: None,
            ..Config::default()
        }
    }
}
