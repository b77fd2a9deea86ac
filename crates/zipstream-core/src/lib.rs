//! zipstream-core — on-demand streamed archives of resource directories.
//!
//! # Components
//!
//! - **`resolver`** — maps an untrusted handle to a directory under the
//!   resource root
//! - **`archiver`** — subprocess abstraction and the `zip` implementation
//! - **`sink`** — the incrementally written, force-closable response
//! - **`proxy`** — the chunked read/write/pace loop and its cleanup paths

pub mod archiver;
pub mod config;
pub mod error;
pub mod proxy;
pub mod resolver;
pub mod sink;

pub use archiver::{Archiver, ArchiverProcess, ExitReport, ZipArchiver};
pub use config::{CHUNK_SIZE, PacingConfig};
pub use error::{ResolveError, SinkError, StreamError};
pub use proxy::{ArchiveProxy, StreamSummary};
pub use resolver::{SourceDirectory, resolve};
pub use sink::{AttachmentHeaders, ResponseSink};
