//! `#[derive(Diffable)]` for fielddiff
//!
//! Structs get an `Object` impl declaring one member per field, in field
//! order. Enums, and structs marked `#[diff(scalar)]`, are compared as a
//! single value and must also derive `Clone`, `PartialEq` and `Debug`.
//!
//! Field attributes:
//! - `#[diff(skip)]`: not declared at all
//! - `#[diff(field)]`: compared only when field comparison is enabled
//! - `#[diff(rename = "Name")]`: name used in difference paths

extern crate proc_macro;
use proc_macro::TokenStream;

mod diffable;

#[proc_macro_derive(Diffable, attributes(diff))]
pub fn derive_diffable(input: TokenStream) -> TokenStream {
    diffable::derive(input)
}
