//! Shared vocabulary for the Avro syntax toolkit: tokens, positions, CST
//! nodes and error types.

pub mod cst;
pub mod error;
pub mod position;
pub mod token;

pub use cst::*;
pub use error::*;
pub use position::*;
pub use token::*;
