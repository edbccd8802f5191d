//! Input source resolution for labelling pipelines.
//!
//! This crate turns a descriptor string (a path, URL, stream URI, screen
//! token or glob expression) into a typed `Source` that yields frames.
//!
//! # Architecture
//!
//! Resolution runs in three steps:
//!
//! 1. **Fetch**: `http(s)://` descriptors are downloaded once into a
//!    content-addressed cache; everything else is used as given.
//! 2. **Classify**: the local reference gets exactly one `SourceKind`, checked
//!    in a fixed precedence order.
//! 3. **Build**: `SourceFactory` maps the kind onto one `Source` variant.
//!
//! Sources come in three families. Static sources hold a single data unit.
//! Enumerable sources (directories, CSV listings, globs) lazily produce child
//! sources through the same factory. Streaming sources (video files, network
//! streams, screens) own one capture handle, released exactly once.
//!
//! # Module Structure
//!
//! - `classify`: string and file-content predicates
//! - `resolve`: descriptor resolution and the download cache
//! - `source`: the factory plus static and enumerable sources
//! - `ingest`: streaming sources and capture backends
//! - `frame`: the decoded frame container
//! - `config`, `error`: settings and the error taxonomy

pub mod classify;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod resolve;
pub mod source;

pub use config::SourceConfig;
pub use error::{Result, SourceError};
pub use frame::Frame;
pub use ingest::{
    CaptureDevice, CaptureStats, Frames, Interval, PixelFormat, ScreenshotSource, StreamSource,
    StreamState, SyntheticCapture, VideoFileSource, VideoStreamSource,
};
pub use resolve::{ResolvedInput, Resolver, SourceDescriptor, SourceKind};
pub use source::{
    Children, CsvSource, DirectorySource, GlobSource, ImageFileSource, PointCloudFileSource,
    Source, SourceFactory,
};
