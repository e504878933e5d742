//! # Loon JSON
//!
//! Arena-aware JSON engine for the Loon chat server: an incremental,
//! buffer-boundary-safe parser, a value tree whose containers share a
//! swappable storage provider, an insertion-ordered object, exact decimal
//! numbers, and the JSON-RPC request/response shapes spoken on the wire.
//!
//! ```
//! use loon_json::{parse_str, RpcRequest};
//!
//! let doc = parse_str(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
//! let req = RpcRequest::extract(doc).unwrap();
//! assert_eq!(req.method, "ping");
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod array;
pub mod error;
pub mod exchange;
pub mod number;
pub mod object;
pub mod parser;
mod raw;
pub mod rpc;
pub mod storage;
pub mod string;
pub mod value;

pub use array::Array;
pub use error::{Error, ParseError, Result};
pub use exchange::{FromValue, ToValue};
pub use number::Number;
pub use object::Object;
pub use parser::{
    DEFAULT_MAX_DEPTH, Handler, Parser, Scanner, parse, parse_str, parse_with_storage,
};
pub use rpc::{RpcError, RpcRequest, result_value};
pub use storage::{BoundedStorage, HeapStorage, Storage, StoragePtr, default_storage};
pub use string::Str;
pub use value::{Kind, Value};
