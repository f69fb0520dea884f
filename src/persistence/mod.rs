//! Persistence layer: binary codec and index files.

pub mod codec;
pub mod file;

pub use codec::{decode, encode, IndexHeader, FORMAT_VERSION, MAGIC};
pub use file::read_header;
