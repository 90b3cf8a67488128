//! Reader for the textual form of LLVM IR, limited to what harness synthesis
//! needs: signatures, entry blocks, debug markers and the metadata table.
pub mod lexer;
pub mod metadata;
pub mod module;
pub mod parser;
pub mod types;
pub mod utils;
