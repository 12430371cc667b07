//! Converter for legacy game resource archives.
//!
//! Archives are scanned by [`containers::ArchiveParser`], which writes raw records, registers
//! them in a [`catalog::ResourceCatalog`] and queues sprite and media conversions on a
//! [`pipeline::TaskQueue`].

pub mod binary_utils;
pub mod catalog;
pub mod containers;
pub mod graphics;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod registry;
