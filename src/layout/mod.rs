//! PDF layout analysis.
//!
//! Talks to an llmsherpa-style layout service that turns a PDF into a flat
//! list of tagged blocks, then rebuilds the section hierarchy from heading
//! levels. Downstream code only ever sees [`ParsedDocument`].

mod client;
mod parse;

pub use client::LayoutClient;
pub use parse::{Chunk, ParentRef, ParsedDocument, Section, Table, parse_layout_json};
