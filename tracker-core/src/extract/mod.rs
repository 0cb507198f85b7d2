//! The extractor RPC boundary: trait, pooled/timeout-guarded client, and
//! the wire-format splitter.

pub mod client;

pub use client::{
    parse_wire_format, ExtractionResult, ExtractorClient, NullExtractorClient, PooledExtractorClient,
};
