//! GME market data: remote client, payload decoding, and typed records.

pub mod catalog;
pub mod client;
/// Base64 + zip payload decoding.
pub mod decode;
pub mod normalize;
pub mod records;
pub mod table;
