//! # Lineage
//!
//! An image transformation and lineage engine. Upload a PNG or JPEG, get a
//! thumbnail, apply actions (crop, flip, rotate, blur, detect) to produce
//! derived *Generations*, and optionally *elevate* a Generation into a new
//! first-class Image.
//!
//! # Architecture
//!
//! ```text
//! upload  bytes ──decode──> thumbnail ──> Blob Store + Image record
//! apply   Image ──decode──> Transform ──encode──> Blob Store + Generation record
//! elevate Generation ──copy bytes──> thumbnail ──> new Image record
//! ```
//!
//! Storage sits behind two traits, [`store::BlobStore`] for bytes and
//! [`store::RecordStore`] for records. The engine never assumes where either
//! lives; the crate ships in-memory and local-filesystem implementations.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Crop/target geometry, PNG/JPEG codec, thumbnail generation |
//! | [`transform`] | Action registry, parameter validation, pixel executors |
//! | [`models`] | `Image`, `Generation` and id types |
//! | [`store`] | Blob and record store traits, local implementations |
//! | [`engine`] | [`Engine`](engine::Engine): upload, lookup, rename, delete |
//! | [`pipeline`] | Generation pipeline: `Engine::apply`, `Engine::apply_batch` |
//! | [`elevate`] | `Engine::elevate` |
//! | [`error`] | `EngineError` taxonomy |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Closed Action Set
//!
//! Actions are an enum, not a name-to-handler table. The registry only maps
//! request strings onto enum variants; after that every dispatch is an
//! exhaustive `match`, so adding an action is a compile error until every
//! executor handles it.
//!
//! ## Lineage Is One Hop
//!
//! A Generation always points at the Image it came from. Elevation copies
//! bytes into a brand-new Image with no back-reference, so history never
//! chains and deleting an Image only ever cascades one level.
//!
//! ## Each Blob Has One Owner
//!
//! No two records share a blob. Elevation copies rather than aliasing, and
//! every path that writes a blob before its record exists removes the blob
//! again on failure. Deleting a record deletes its blobs through the record
//! store's [`OnDelete`](store::OnDelete) hook.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resizing and filtering use the `image` and `imageproc` crates.
//! No system libraries are needed.

pub mod config;
pub mod elevate;
pub mod engine;
pub mod error;
pub mod imaging;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
