//! Streaming FIT (Flexible and Interoperable Data Transfer) binary
//! container decoder.
//!
//! Parses the record stream directly off a `Read`, installing per-local-type
//! schemas from definition records and decoding data records against them,
//! with sub-field resolution, component bit-unpacking, compressed-timestamp
//! accumulation, developer-field support and CRC verification.

pub mod accumulate;
pub mod basetype;
pub mod byteio;
pub mod crc;
pub mod data;
pub mod definition;
pub mod developer;
pub mod error;
pub mod header;
pub mod processor;
pub mod profile;
pub mod recordheader;
pub mod structcodec;
pub mod stream;

pub use data::{DataMessage, FieldData, FieldValue, RawFieldValue, ResolvedField};
pub use definition::DefinitionMessage;
pub use developer::{DeveloperField, DeveloperFieldRegistry};
pub use error::{FitError, FitResult};
pub use header::FileHeader;
pub use processor::{NoopProcessor, Processor};
pub use recordheader::RecordHeader;
pub use stream::{FitFile, MesgSelector, ParserOptions, Record};
