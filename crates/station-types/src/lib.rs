//! Record types shared by the cta-stations producers and stream agent.
//!
//! # Modules
//!
//! - [`station`] - the `Station` input record and its `TransformedStation` projection
//! - [`schema`] - fixed-field schema descriptors and JSON validation against them
//! - [`codec`] - schema-registry framing (magic byte + schema id + JSON body)
//! - [`error`] - error types for decoding and validation
//!
//! # Wire Format
//!
//! ```text
//! framed:   [0x00][schema id: u32 BE][JSON body]
//! plain:    [JSON body]            (schemaless JSON from the capture service)
//! ```

pub mod codec;
pub mod error;
pub mod schema;
pub mod station;

pub use codec::{decode_record, encode_framed, split_frame, MAGIC_BYTE};
pub use error::{RecordParseError, SchemaViolation};
pub use schema::{FieldSchema, FieldType, RecordSchema, SchemaBound};
pub use station::{Line, Station, TransformedStation};
