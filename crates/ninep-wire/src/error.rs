//! Error type shared by the message codecs and the framed transport.

use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

/// Errors produced while encoding or decoding 9P messages.
///
/// Every decode-side error is fatal for the decode step that produced it: the
/// input cannot be resynchronised, so a streaming decoder that returns one of
/// these should be discarded or [`reset`](crate::transport::Decoder::reset).
/// The encode-side rejections (`MessageTooBig`, `UnknownMessageType` and the
/// `*TooLong` family) are checked before any byte reaches the transport, so an
/// encoder remains usable after reporting them.
#[derive(Debug, Error)]
pub enum Error {
    /// The payload was not complete for the field layout being decoded.
    #[error("payload too short")]
    PayloadTooShort,

    /// A frame exceeds the negotiated maximum message size, or a received
    /// header announces more bytes than the decoder's buffer can hold.
    #[error("message size larger than buffer")]
    MessageTooBig,

    /// The message type does not resolve in the active protocol table.
    #[error("unknown message type")]
    UnknownMessageType,

    /// A string field is longer than its 16-bit length prefix can express.
    #[error("string of {0} bytes does not fit a 16-bit length field")]
    StringTooLong(usize),

    /// A byte payload is longer than its 32-bit count prefix can express.
    #[error("payload of {0} bytes does not fit a 32-bit count field")]
    DataTooLong(usize),

    /// A name or qid vector has more elements than its 16-bit count prefix
    /// can express.
    #[error("vector of {0} elements does not fit a 16-bit count field")]
    VectorTooLong(usize),

    /// An encoded directory entry outgrew its own 16-bit size field.
    #[error("stat entry of {0} bytes does not fit a 16-bit size field")]
    StatTooLong(usize),

    /// Transport failure, propagated verbatim from the underlying reader or
    /// writer.
    #[error(transparent)]
    Io(#[from] ::std::io::Error),
}
