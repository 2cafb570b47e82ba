//! # Core Protocol Components
//!
//! Low-level packet handling and stream framing.
//!
//! ## Components
//! - **Packet**: 20-byte header, template region and field records
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Length(4)] [Attrs(1)] [..] [Service(2)] [..] [Correlation(4)] [Template len(2)] [Req/Resp id(2)]
//! [Template(T)] [Field(L) [Id(2)] Value(L-6)]*
//! ```
//!
//! ## Security
//! - Maximum packet size: 16MB (prevents memory exhaustion)
//! - Field scans stop at malformed records instead of reading past the buffer
//! - Length validation before allocation

pub mod codec;
pub mod packet;
