#[macro_use]
mod macros;

pub mod alert;
pub mod cipher;
pub mod cipher_suite;
pub mod cookie;
pub mod crypto;
mod error;
pub mod extensions;
pub mod flight;
pub mod handshake;
pub mod key_schedule;
pub mod options;
pub mod parsing;
pub mod reassembly;
pub mod record;
pub mod server;
pub mod session;
pub mod transcript;

pub use error::{Error, Result};
pub use options::ServerOptions;
pub use server::ServerHandshake;

// Big-endian network order

// https://tools.ietf.org/html/rfc6347
