pub mod archive;
pub mod checksum;
pub mod error;
pub mod template;
