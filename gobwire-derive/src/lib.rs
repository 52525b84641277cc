//! Derive macro for `Gob`.
//!
//! Refer to the `gobwire` crate for examples.
use {
    proc_macro::TokenStream,
    syn::{parse_macro_input, DeriveInput},
};

mod common;
mod gob;

/// Implement `Gob` for a struct with named fields.
///
/// Container attributes:
/// - `#[gob(name = "...")]` sets the type name sent in descriptors.
/// - `#[gob(crate = "path")]` points at the gobwire crate when it is re-exported.
///
/// Field attributes:
/// - `#[gob(rename = "...")]` sets the field name used on the wire.
/// - `#[gob(skip)]` keeps the field local; it decodes as `Default::default()`.
#[proc_macro_derive(Gob, attributes(gob))]
pub fn derive_gob(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match gob::generate(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.write_errors().into(),
    }
}
