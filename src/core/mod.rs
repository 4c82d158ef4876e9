//! Data model, collaborator contracts and codecs shared by token handling, credential resolution
//! and presentation packaging.

pub mod claims;
pub mod credential;
pub mod criterion;
pub mod error;
pub mod jws;
pub mod keys;
pub mod participant;
pub mod store;

pub use error::{Error, ErrorKind, Result};
