//! mum Protocol - HTTP wire types for the relay
//!
//! This crate provides the request parameter shapes, response bodies and
//! error reasons exchanged between browser clients and the daemon, plus
//! the encoding of the `/update` stream.

pub mod message;
pub mod params;

pub use message::{
    update_line, EmptyResponse, ErrorReason, ErrorResponse, JoinResponse, RecvResponse,
    WhoResponse,
};
pub use params::{parse_since, JoinParams, PartParams, RecvParams, SendParams};
