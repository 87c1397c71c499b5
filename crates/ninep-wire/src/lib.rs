#![forbid(unsafe_code)]
//! 9P2000 wire codec for Rust, with the `.u` and `.e` dialect extensions.
//!
//! This crate implements the message model and framing of the 9P2000 file
//! service protocol: the closed set of request/response variants with their
//! bit-exact binary encodings, the 9P2000.u ("Unix") replacements carrying
//! numeric identities, the 9P2000.e ("Erlang") session-restore and
//! read/write shorthands, and a streamable framing layer that works on top
//! of any ordered byte transport.
//!
//! # Overview
//!
//! The crate is deliberately transport- and policy-free: you bring a
//! [`std::io::Read`]/[`std::io::Write`] pair (a TCP stream, a pipe, an
//! in-memory buffer) and this crate moves [`Msg`] values across it. Fid and
//! tag management, authentication content and filesystem semantics are the
//! caller's business.
//!
//! * [`fcall`] — the message variants ([`Fcall`]), supporting structures
//!   ([`Qid`], [`Stat`], [`StatDotu`]) and protocol constants.
//! * [`serialize`] — binary encode/decode for every variant.
//! * [`protocol`] — the per-dialect tables translating between type codes
//!   and variants, composed by fall-through.
//! * [`transport`] — framing: one-shot [`read_msg`]/[`write_msg`], the
//!   thread-safe [`Encoder`] and the buffered [`Decoder`].
//!
//! # Example
//!
//! ```no_run
//! use ninep_wire::{Decoder, Encoder, Fcall, Msg, NINE_P2000, NOTAG, P92000};
//!
//! # fn main() -> ninep_wire::Result<()> {
//! let stream = std::net::TcpStream::connect("127.0.0.1:564")?;
//! let enc = Encoder::new(stream.try_clone()?, &NINE_P2000, 8192);
//! let mut dec = Decoder::greedy(stream, &NINE_P2000, 8192);
//!
//! enc.write_msg(&Msg {
//!     tag: NOTAG,
//!     body: Fcall::TVersion {
//!         msize: 8192,
//!         version: P92000.to_owned(),
//!     },
//! })?;
//!
//! let reply = dec.read_msg()?;
//! println!("negotiated: {:?}", reply);
//! # Ok(())
//! # }
//! ```
//!
//! # Dialects
//!
//! A dialect is a [`Protocol`] table. The `.u` and `.e` tables override or
//! extend the base table and inherit the rest, so a connection switches
//! dialect after version negotiation by swapping the table reference:
//! [`Encoder::set_protocol`] is serialised against in-flight writes, and
//! [`Decoder::set_protocol`] is legal whenever the decoder is drained
//! (right after the `RVersion` arrives is the natural point).
//!
//! # Concurrency
//!
//! The [`Encoder`] may be shared between threads; its mutex guarantees
//! frames never interleave. The [`Decoder`] is single-threaded and owns its
//! read buffer; decoded messages copy their payloads out of it, so they are
//! free of the decoder's lifetime.

pub mod error;
pub mod fcall;
pub mod protocol;
pub mod serialize;
pub mod transport;

pub use crate::error::{Error, Result};
pub use crate::fcall::*;
pub use crate::protocol::{Protocol, NINE_P2000, NINE_P2000_DOTE, NINE_P2000_DOTU};
pub use crate::transport::{read_msg, write_msg, Decoder, Encoder};
