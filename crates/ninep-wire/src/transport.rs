//! Framed message transport on top of byte-oriented streams.
//!
//! A frame is `size[4] type[1] body[size-5]`, little-endian, with `size`
//! covering all five header bytes as well as the body. The body starts with
//! the 2-byte tag and is otherwise variant-specific.
//!
//! [`read_msg`] and [`write_msg`] are the one-shot forms: no state survives
//! the call. [`Encoder`] wraps a writer with a mutex so concurrent producers
//! cannot interleave frames, and [`Decoder`] adds the buffered greedy
//! strategy that amortises transport reads across pipelined messages.

use std::io::{self, Read, Write};
use std::mem;
use std::sync::{Mutex, MutexGuard};

use byteorder::{LittleEndian, WriteBytesExt};
use log::trace;

use crate::error::{Error, Result};
use crate::fcall::{Fcall, Msg, HEADER_SIZE};
use crate::protocol::Protocol;
use crate::serialize::Encodable;

/// Compact the greedy buffer when the free tail shrinks below this many
/// bytes, so transport reads stay reasonably sized.
const MIN_READ: usize = 1024;

/// Encode `msg` and write it to `w` as a single frame.
///
/// The whole frame, including the negotiated-size check, is assembled before
/// the first byte reaches the writer, so any rejection leaves the transport
/// untouched. Short writes are retried until the frame is complete.
pub fn write_msg<W: Write>(p: &Protocol, w: &mut W, msize: u32, msg: &Msg) -> Result<usize> {
    let mt = p.type_of(&msg.body)?;
    let size = HEADER_SIZE + msg.wire_len();
    if size as u64 > u64::from(msize) {
        return Err(Error::MessageTooBig);
    }

    let mut frame = Vec::with_capacity(size);
    frame.write_u32::<LittleEndian>(size as u32)?;
    frame.write_u8(mt as u8)?;
    msg.encode(&mut frame)?;
    debug_assert_eq!(frame.len(), size);

    w.write_all(&frame)?;
    trace!("→ {:?} tag={} ({} bytes)", mt, msg.tag, size);
    Ok(size)
}

/// Read a single frame from `r` and decode it with the table `p`.
///
/// The message type is resolved before the body is read, so an unknown code
/// fails without consuming the body bytes that follow the header.
pub fn read_msg<R: Read>(p: &Protocol, r: &mut R, msize: u32) -> Result<Msg> {
    read_one(p, r, msize, false)
}

fn read_one<R: Read>(p: &Protocol, r: &mut R, msize: u32, relaxed: bool) -> Result<Msg> {
    let mut header = [0u8; HEADER_SIZE];
    r.read_exact(&mut header)?;

    let size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if size < HEADER_SIZE {
        return Err(Error::PayloadTooShort);
    }
    if !relaxed && size as u64 > u64::from(msize) {
        return Err(Error::MessageTooBig);
    }
    let empty = p.message_of(header[4])?;

    let mut body = vec![0u8; size - HEADER_SIZE];
    r.read_exact(&mut body)?;
    let msg = Msg::decode(empty, &body)?;
    trace!("← tag={} ({} bytes)", msg.tag, size);
    Ok(msg)
}

/// A thread-safe streaming message encoder.
///
/// All state, including the writer itself, lives behind one mutex which is
/// held from before the first header byte until after the last body byte, so
/// frames from concurrent callers never interleave on the wire. The order of
/// frames is some serialisation of the `write_msg` calls; fairness is
/// unspecified.
///
/// After a `MessageTooBig` or `UnknownMessageType` rejection the encoder is
/// still usable: nothing was written. After a transport error the current
/// frame may have partially reached the peer and the connection should be
/// treated as broken.
pub struct Encoder<W> {
    state: Mutex<EncoderState<W>>,
}

struct EncoderState<W> {
    writer: W,
    protocol: &'static Protocol,
    msize: u32,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W, protocol: &'static Protocol, msize: u32) -> Encoder<W> {
        Encoder {
            state: Mutex::new(EncoderState {
                writer,
                protocol,
                msize,
            }),
        }
    }

    /// Encode `msg` and write it as one atomic frame.
    pub fn write_msg(&self, msg: &Msg) -> Result<usize> {
        let mut state = self.lock();
        let state = &mut *state;
        write_msg(state.protocol, &mut state.writer, state.msize, msg)
    }

    /// Switch the dialect table, serialised against in-flight writes.
    pub fn set_protocol(&self, protocol: &'static Protocol) {
        self.lock().protocol = protocol;
    }

    /// Set the negotiated maximum message size.
    pub fn set_msize(&self, msize: u32) {
        self.lock().msize = msize;
    }

    /// Swap the underlying writer, returning the old one. The exchange is
    /// serialised through the same mutex as `write_msg`, so it never lands
    /// in the middle of a frame.
    pub fn replace_writer(&self, writer: W) -> W {
        mem::replace(&mut self.lock().writer, writer)
    }

    /// Consume the encoder and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .writer
    }

    fn lock(&self) -> MutexGuard<'_, EncoderState<W>> {
        // A writer that panicked poisons the lock but not the state; the
        // stream is no worse off than after any other aborted frame.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A pull-model streaming message decoder.
///
/// Two strategies sit behind [`read_msg`](Decoder::read_msg):
///
/// * **simple** ([`Decoder::new`]): two exact reads per message, one for the
///   header and one for the body. No state survives between calls, which
///   makes reader and protocol replacement trivially safe.
/// * **greedy** ([`Decoder::greedy`]): one lazily-allocated buffer of
///   `msize` bytes; each transport read grabs as much as the transport will
///   give, and every complete message already buffered is handed out without
///   touching the transport again.
///
/// The decoder is single-threaded by design; it owns its buffer and its
/// reader. Frames come out strictly in wire order. All decode errors are
/// fatal to the instance, which should then be dropped or [`reset`].
///
/// [`reset`]: Decoder::reset
pub struct Decoder<R> {
    reader: R,
    protocol: &'static Protocol,
    msize: u32,
    greedy: bool,
    relaxed: bool,

    // Greedy state. `needed` is the signed count of bytes still missing for
    // the current parse step: it is only ever incremented or decremented, so
    // an over-full read keeps it negative across several buffered messages
    // and the inner loop drains them all before the next transport read.
    buf: Vec<u8>,
    total: usize,
    ptr: usize,
    needed: isize,
    size: usize,
    pending: Option<Fcall>,
    deferred: Option<io::Error>,
}

impl<R: Read> Decoder<R> {
    /// A decoder in simple mode.
    pub fn new(reader: R, protocol: &'static Protocol, msize: u32) -> Decoder<R> {
        Decoder {
            reader,
            protocol,
            msize,
            greedy: false,
            relaxed: false,
            buf: Vec::new(),
            total: 0,
            ptr: 0,
            needed: HEADER_SIZE as isize,
            size: 0,
            pending: None,
            deferred: None,
        }
    }

    /// A decoder in greedy mode.
    pub fn greedy(reader: R, protocol: &'static Protocol, msize: u32) -> Decoder<R> {
        Decoder {
            greedy: true,
            ..Decoder::new(reader, protocol, msize)
        }
    }

    /// Allow frames larger than the negotiated maximum. The greedy buffer
    /// doubles until an oversized frame fits instead of failing with
    /// `MessageTooBig`. The other party is supposed to obey the negotiated
    /// size, so this is off by default.
    pub fn relax_limit(&mut self) {
        self.relaxed = true;
    }

    /// Read the next message from the stream.
    pub fn read_msg(&mut self) -> Result<Msg> {
        if self.greedy {
            self.read_greedy()
        } else {
            read_one(self.protocol, &mut self.reader, self.msize, self.relaxed)
        }
    }

    /// Whether no partial frame is sitting in the buffer. Replacing the
    /// reader or the protocol is only well-defined while this holds.
    pub fn is_drained(&self) -> bool {
        self.ptr == self.total && self.pending.is_none()
    }

    /// Switch the dialect table for subsequent messages.
    ///
    /// Only well-defined when the decoder [`is_drained`](Decoder::is_drained):
    /// the caller must know that no message of the old dialect is still
    /// buffered, e.g. by swapping directly after the `RVersion` that
    /// negotiated the new dialect.
    pub fn set_protocol(&mut self, protocol: &'static Protocol) {
        debug_assert!(self.is_drained(), "protocol swapped mid-message");
        self.protocol = protocol;
    }

    /// Set the maximum message size. Lowering it soft-limits subsequent
    /// frames without shrinking an already-allocated buffer; raising it
    /// takes full effect at the next [`reset`](Decoder::reset).
    pub fn set_msize(&mut self, msize: u32) {
        self.msize = msize;
    }

    /// Swap the underlying reader, returning the old one. The same drained
    /// contract as [`set_protocol`](Decoder::set_protocol) applies: bytes
    /// already buffered from the old reader would otherwise be decoded as if
    /// the new reader had produced them.
    pub fn replace_reader(&mut self, reader: R) -> R {
        debug_assert!(self.is_drained(), "reader swapped mid-message");
        mem::replace(&mut self.reader, reader)
    }

    /// Discard all buffered state and release the buffer; the next greedy
    /// read allocates afresh from the current `msize`.
    pub fn reset(&mut self) {
        debug_assert!(self.is_drained(), "reset with a partial frame buffered");
        self.buf = Vec::new();
        self.total = 0;
        self.ptr = 0;
        self.needed = HEADER_SIZE as isize;
        self.size = 0;
        self.pending = None;
        self.deferred = None;
    }

    /// Consume the decoder and return the underlying reader. Buffered bytes
    /// are dropped.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_greedy(&mut self) -> Result<Msg> {
        if self.buf.is_empty() {
            self.buf = vec![0; self.msize as usize];
        }

        loop {
            // Drain whatever the buffer already holds.
            while self.needed <= 0 {
                match self.pending.take() {
                    None => {
                        let h = &self.buf[self.ptr..self.ptr + HEADER_SIZE];
                        let size = u32::from_le_bytes([h[0], h[1], h[2], h[3]]) as usize;
                        if size < HEADER_SIZE {
                            return Err(Error::PayloadTooShort);
                        }
                        if !self.relaxed
                            && (size as u64 > u64::from(self.msize) || size > self.buf.len())
                        {
                            return Err(Error::MessageTooBig);
                        }
                        let typ = h[4];
                        self.size = size - HEADER_SIZE;
                        self.needed += self.size as isize;
                        self.ptr += HEADER_SIZE;
                        // Resolve the type right away; better to fail early
                        // than after the body has been buffered.
                        self.pending = Some(self.protocol.message_of(typ)?);
                    }
                    Some(empty) => {
                        let body = &self.buf[self.ptr..self.ptr + self.size];
                        let msg = Msg::decode(empty, body)?;
                        self.ptr += self.size;
                        self.size = 0;
                        self.needed += HEADER_SIZE as isize;
                        trace!("← tag={} (greedy)", msg.tag);
                        return Ok(msg);
                    }
                }
            }

            // A read failure from the previous iteration is reported only
            // once the buffered frames before it have been delivered.
            if let Some(err) = self.deferred.take() {
                return Err(err.into());
            }

            // Compact when the tail cannot hold what the current step still
            // needs, or has shrunk below the minimum read hint.
            let tail = self.buf.len() - self.total;
            if self.needed as usize > tail || tail < MIN_READ {
                self.buf.copy_within(self.ptr..self.total, 0);
                self.total -= self.ptr;
                self.ptr = 0;
            }

            // Grow only under the relaxation flag; an oversized frame is
            // otherwise already rejected at the header.
            let span = self.total + self.needed as usize;
            if span > self.buf.len() {
                if !self.relaxed {
                    return Err(Error::MessageTooBig);
                }
                let mut len = self.buf.len().max(1);
                while len < span {
                    len *= 2;
                }
                self.buf.resize(len, 0);
            }

            match self.reader.read(&mut self.buf[self.total..]) {
                Ok(0) => {
                    self.deferred = Some(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed",
                    ));
                }
                Ok(n) => {
                    self.total += n;
                    self.needed -= n as isize;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => self.deferred = Some(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fcall::*;
    use crate::protocol::{NINE_P2000, NINE_P2000_DOTE, NINE_P2000_DOTU};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// A reader that only hands out a single byte at a time, the worst
    /// possible transport fragmentation.
    struct ByteReader<R>(R);

    impl<R: Read> Read for ByteReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.0.read(&mut buf[..1])
        }
    }

    /// A reader that delivers each chunk in exactly one `read` call.
    struct ChunkReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkReader {
        fn new<I: IntoIterator<Item = Vec<u8>>>(chunks: I) -> ChunkReader {
            ChunkReader {
                chunks: chunks.into_iter().collect(),
            }
        }
    }

    impl Read for ChunkReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.front_mut() {
                None => Ok(0),
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    chunk.drain(..n);
                    if chunk.is_empty() {
                        self.chunks.pop_front();
                    }
                    Ok(n)
                }
            }
        }
    }

    struct CountingReader<R> {
        inner: R,
        reads: usize,
    }

    impl<R: Read> Read for CountingReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            self.inner.read(buf)
        }
    }

    /// Append-only shared sink that accepts one byte per `write` call, to
    /// give concurrent writers every chance to interleave.
    #[derive(Clone)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match buf.first() {
                Some(b) => {
                    self.0.lock().unwrap().push(*b);
                    Ok(1)
                }
                None => Ok(0),
            }
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn qid() -> Qid {
        Qid {
            typ: QidType::DIR,
            version: 0x1234_0987,
            path: 0x10_2938_74FF_FFFF,
        }
    }

    fn stat() -> Stat {
        Stat {
            typ: 0xDEAD,
            dev: 0xABCD_EF08,
            qid: qid(),
            mode: FileMode::DMAPPEND | FileMode::DMWRITE,
            atime: 90_870_987,
            mtime: 1_234_124,
            length: 0x23AB_DDF8,
            name: "hello".to_owned(),
            uid: "someone".to_owned(),
            gid: "over the".to_owned(),
            muid: "rainbow".to_owned(),
        }
    }

    fn stat_dotu() -> StatDotu {
        StatDotu {
            typ: 0xDEAD,
            dev: 0xABCD_EF08,
            qid: qid(),
            mode: FileMode::DMSYMLINK,
            atime: 90_870_987,
            mtime: 1_234_124,
            length: 0x23AB_DDF8,
            name: "hello".to_owned(),
            uid: "someone".to_owned(),
            gid: "over the".to_owned(),
            muid: "rainbow".to_owned(),
            extensions: "l target".to_owned(),
            n_uid: 23_452_345,
            n_gid: 34_652,
            n_muid: 2_363_457,
        }
    }

    fn base_messages() -> Vec<Msg> {
        use crate::Fcall::*;

        let bodies = vec![
            TVersion {
                msize: 9384,
                version: P92000.to_owned(),
            },
            RVersion {
                msize: 9384,
                version: P92000.to_owned(),
            },
            TAuth {
                afid: 1234,
                uname: "someone".to_owned(),
                aname: "something".to_owned(),
            },
            RAuth { aqid: qid() },
            TAttach {
                fid: 35243,
                afid: 90_872_354,
                uname: String::new(),
                aname: "weee".to_owned(),
            },
            RAttach { qid: qid() },
            RError {
                ename: "something something something".to_owned(),
            },
            TFlush { oldtag: 23453 },
            RFlush,
            TWalk {
                fid: 1234,
                newfid: 3_452_345,
                wnames: vec![
                    "ongo".to_owned(),
                    "bongo".to_owned(),
                    "filliyonko".to_owned(),
                    "megatronko".to_owned(),
                ],
            },
            RWalk {
                wqids: vec![qid(), qid(), qid()],
            },
            TOpen {
                fid: 21343,
                mode: OpenMode::OWRITE | OpenMode::OTRUNC,
            },
            ROpen {
                qid: qid(),
                iounit: 1_234_123,
            },
            TCreate {
                fid: 12343,
                name: "wakakaaka".to_owned(),
                perm: FileMode::DMDIR,
                mode: OpenMode::OREAD,
            },
            RCreate {
                qid: qid(),
                iounit: 433_535,
            },
            TRead {
                fid: 5343,
                offset: 359_842_382_234,
                count: 23423,
            },
            RRead {
                data: Data(b"ooooh nooo it's full of data".to_vec()),
            },
            TWrite {
                fid: 254_334,
                offset: 21_304_978_234,
                data: Data(b"something to write".to_vec()),
            },
            RWrite { count: 12 },
            TClunk { fid: 23123 },
            RClunk,
            TRemove { fid: 1234 },
            RRemove,
            TStat { fid: 12_341_234 },
            RStat { stat: stat() },
            TWStat {
                fid: 12_342_134,
                stat: stat(),
            },
            RWStat,
        ];

        bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                let tag = match body {
                    TVersion { .. } | RVersion { .. } => NOTAG,
                    _ => i as u16,
                };
                Msg { tag, body }
            })
            .collect()
    }

    fn dotu_messages() -> Vec<Msg> {
        use crate::Fcall::*;

        let bodies = vec![
            TAuthDotu {
                afid: 1234,
                uname: "someone".to_owned(),
                aname: "something".to_owned(),
                n_uname: 3_546_298,
            },
            TAttachDotu {
                fid: 35243,
                afid: 90_872_354,
                uname: String::new(),
                aname: "weee".to_owned(),
                n_uname: 2_563_457,
            },
            RErrorDotu {
                ename: "something something something".to_owned(),
                errno: 345_324,
            },
            TCreateDotu {
                fid: 12343,
                name: "wakakaaka".to_owned(),
                perm: FileMode::DMDIR,
                mode: OpenMode::OREAD,
                extension: "qefdasiuh".to_owned(),
            },
            RStatDotu { stat: stat_dotu() },
            TWStatDotu {
                fid: 12_342_134,
                stat: stat_dotu(),
            },
            // Inherited from the base table by fall-through.
            TWalk {
                fid: 9,
                newfid: 10,
                wnames: vec!["etc".to_owned(), "hosts".to_owned()],
            },
            RClunk,
        ];

        bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| Msg {
                tag: i as u16,
                body,
            })
            .collect()
    }

    fn dote_messages() -> Vec<Msg> {
        use crate::Fcall::*;

        let bodies = vec![
            TSession {
                key: [1, 2, 3, 4, 5, 6, 7, 8],
            },
            RSession,
            TSRead {
                fid: 42,
                wnames: vec!["var".to_owned(), "log".to_owned(), "motd".to_owned()],
            },
            RSRead {
                data: Data(b"all quiet".to_vec()),
            },
            TSWrite {
                fid: 42,
                wnames: vec!["tmp".to_owned(), "scratch".to_owned()],
                data: Data(b"noted".to_vec()),
            },
            RSWrite { count: 5 },
            // Inherited from the base table by fall-through.
            TRead {
                fid: 7,
                offset: 0,
                count: 512,
            },
        ];

        bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                let tag = match body {
                    TSession { .. } => NOTAG,
                    _ => i as u16,
                };
                Msg { tag, body }
            })
            .collect()
    }

    fn stream_of(p: &'static Protocol, msgs: &[Msg]) -> Vec<u8> {
        let mut stream = Vec::new();
        for msg in msgs {
            write_msg(p, &mut stream, u32::MAX, msg).unwrap();
        }
        stream
    }

    fn assert_roundtrip(p: &'static Protocol, msgs: &[Msg]) {
        for msg in msgs {
            let mut frame = Vec::new();
            let written = write_msg(p, &mut frame, u32::MAX, msg).unwrap();
            assert_eq!(written, frame.len(), "write_msg return disagrees");
            assert_eq!(
                written,
                HEADER_SIZE + msg.wire_len(),
                "wire_len disagrees for {:?}",
                msg
            );
            let size = u32::from_le_bytes(frame[..4].try_into().unwrap());
            assert_eq!(size as usize, frame.len(), "size field disagrees");

            let got = read_msg(p, &mut frame.as_slice(), u32::MAX).unwrap();
            assert_eq!(&got, msg);
        }
    }

    #[test]
    fn roundtrip_9p2000() {
        assert_roundtrip(&NINE_P2000, &base_messages());
    }

    #[test]
    fn roundtrip_9p2000_dotu() {
        assert_roundtrip(&NINE_P2000_DOTU, &dotu_messages());
    }

    #[test]
    fn roundtrip_9p2000_dote() {
        assert_roundtrip(&NINE_P2000_DOTE, &dote_messages());
    }

    #[test]
    fn version_frame_reference_bytes() {
        let msg = Msg {
            tag: NOTAG,
            body: Fcall::TVersion {
                msize: 8192,
                version: P92000.to_owned(),
            },
        };
        let mut frame = Vec::new();
        write_msg(&NINE_P2000, &mut frame, 8192, &msg).unwrap();
        assert_eq!(
            frame,
            [
                0x13, 0x00, 0x00, 0x00, // size = 19
                0x64, // Tversion = 100
                0xFF, 0xFF, // NOTAG
                0x00, 0x20, 0x00, 0x00, // msize = 8192
                0x06, 0x00, // len("9P2000")
                0x39, 0x50, 0x32, 0x30, 0x30, 0x30, // "9P2000"
            ]
        );

        let got = read_msg(&NINE_P2000, &mut frame.as_slice(), 8192).unwrap();
        assert_eq!(got, msg);
    }

    #[test]
    fn walk_frame_layout() {
        let msg = Msg {
            tag: 45,
            body: Fcall::TWalk {
                fid: 1234,
                newfid: 3_452_345,
                wnames: vec![
                    "ongo".to_owned(),
                    "bongo".to_owned(),
                    "filliyonko".to_owned(),
                    "megatronko".to_owned(),
                ],
            },
        };
        // Body: tag[2] fid[4] newfid[4] nwname[2] plus (2+4)+(2+5)+(2+10)+(2+10).
        assert_eq!(msg.wire_len(), 12 + 37);
        let mut frame = Vec::new();
        write_msg(&NINE_P2000, &mut frame, 1024, &msg).unwrap();
        assert_eq!(frame.len(), 54);
        assert_eq!(&frame[..4], &[0x36, 0x00, 0x00, 0x00]);
        assert_eq!(frame[4], 0x6E); // Twalk = 110
        assert_eq!(&frame[5..7], &[45, 0]);

        let got = read_msg(&NINE_P2000, &mut frame.as_slice(), 1024).unwrap();
        assert_eq!(got, msg);
    }

    #[test]
    fn greedy_pipelined_messages_one_read() {
        let msgs = vec![
            Msg {
                tag: NOTAG,
                body: Fcall::TVersion {
                    msize: 8192,
                    version: P92000.to_owned(),
                },
            },
            Msg {
                tag: 45,
                body: Fcall::TWalk {
                    fid: 1234,
                    newfid: 3_452_345,
                    wnames: vec!["ongo".to_owned(), "bongo".to_owned()],
                },
            },
        ];
        let stream = stream_of(&NINE_P2000, &msgs);
        let reader = CountingReader {
            inner: stream.as_slice(),
            reads: 0,
        };
        let mut dec = Decoder::greedy(reader, &NINE_P2000, 1024);

        assert_eq!(dec.read_msg().unwrap(), msgs[0]);
        assert_eq!(dec.read_msg().unwrap(), msgs[1]);
        // The whole pipeline was served by the initial transport read.
        assert_eq!(dec.into_inner().reads, 1);
    }

    #[test]
    fn fragmented_stream_decodes_identically() {
        let msgs = base_messages();
        let stream = stream_of(&NINE_P2000, &msgs);

        let mut greedy = Decoder::greedy(ByteReader(stream.as_slice()), &NINE_P2000, 1024);
        let mut simple = Decoder::new(ByteReader(stream.as_slice()), &NINE_P2000, 1024);
        for msg in &msgs {
            assert_eq!(&greedy.read_msg().unwrap(), msg);
            assert_eq!(&simple.read_msg().unwrap(), msg);
        }
    }

    #[test]
    fn greedy_and_simple_agree_across_dialects() {
        for (p, msgs) in [
            (&NINE_P2000, base_messages()),
            (&NINE_P2000_DOTU, dotu_messages()),
            (&NINE_P2000_DOTE, dote_messages()),
        ] {
            let stream = stream_of(p, &msgs);
            let mut greedy = Decoder::greedy(stream.as_slice(), p, 4096);
            let mut simple = Decoder::new(stream.as_slice(), p, 4096);
            for msg in &msgs {
                assert_eq!(&greedy.read_msg().unwrap(), msg);
                assert_eq!(&simple.read_msg().unwrap(), msg);
            }
        }
    }

    #[test]
    fn oversize_frame_is_rejected() {
        // A frame declaring 64 bytes against a 32-byte limit. The body must
        // never be consumed as a message.
        let mut stream = vec![0x40, 0x00, 0x00, 0x00, 0x64];
        stream.extend_from_slice(&[0u8; 59]);

        let mut dec = Decoder::greedy(stream.as_slice(), &NINE_P2000, 32);
        assert!(matches!(dec.read_msg(), Err(Error::MessageTooBig)));

        let mut rest = stream.as_slice();
        assert!(matches!(
            read_msg(&NINE_P2000, &mut rest, 32),
            Err(Error::MessageTooBig)
        ));
        // Simple mode stopped right after the header.
        assert_eq!(rest.len(), 59);
    }

    #[test]
    fn relaxed_decoder_grows_past_the_limit() {
        let msg = Msg {
            tag: 1,
            body: Fcall::RRead {
                data: Data(vec![0xAB; 100]),
            },
        };
        let stream = stream_of(&NINE_P2000, &[msg.clone()]);
        assert!(stream.len() > 32);

        let mut dec = Decoder::greedy(stream.as_slice(), &NINE_P2000, 32);
        dec.relax_limit();
        assert_eq!(dec.read_msg().unwrap(), msg);

        let mut dec = Decoder::new(stream.as_slice(), &NINE_P2000, 32);
        dec.relax_limit();
        assert_eq!(dec.read_msg().unwrap(), msg);
    }

    #[test]
    fn unknown_type_code_is_fatal() {
        let stream = [0x0A, 0x00, 0x00, 0x00, 99, 0, 0, 0, 0, 0];
        let mut dec = Decoder::greedy(&stream[..], &NINE_P2000, 1024);
        assert!(matches!(dec.read_msg(), Err(Error::UnknownMessageType)));
    }

    #[test]
    fn truncated_body_is_payload_too_short() {
        // Declares a Tversion with only two body bytes past the tag.
        let stream = [0x09, 0x00, 0x00, 0x00, 0x64, 0xFF, 0xFF, 0x00, 0x20];
        assert!(matches!(
            read_msg(&NINE_P2000, &mut &stream[..], 1024),
            Err(Error::PayloadTooShort)
        ));
    }

    #[test]
    fn size_below_header_is_rejected() {
        let stream = [0x03, 0x00, 0x00, 0x00, 0x64];
        assert!(matches!(
            read_msg(&NINE_P2000, &mut &stream[..], 1024),
            Err(Error::PayloadTooShort)
        ));
    }

    #[test]
    fn dialect_swap_after_version_simple() {
        let rversion = Msg {
            tag: NOTAG,
            body: Fcall::RVersion {
                msize: 8192,
                version: P92000U.to_owned(),
            },
        };
        let attach = Msg {
            tag: 1,
            body: Fcall::TAttachDotu {
                fid: 1,
                afid: NOFID,
                uname: "glenda".to_owned(),
                aname: String::new(),
                n_uname: 501,
            },
        };
        let mut stream = stream_of(&NINE_P2000, &[rversion.clone()]);
        stream.extend(stream_of(&NINE_P2000_DOTU, &[attach.clone()]));

        let mut dec = Decoder::new(stream.as_slice(), &NINE_P2000, 8192);
        let first = dec.read_msg().unwrap();
        assert_eq!(first, rversion);
        match first.body {
            Fcall::RVersion { ref version, .. } => assert_eq!(version, P92000U),
            _ => unreachable!(),
        }

        dec.set_protocol(&NINE_P2000_DOTU);
        assert_eq!(dec.read_msg().unwrap(), attach);
    }

    #[test]
    fn dialect_swap_after_version_greedy() {
        let rversion = Msg {
            tag: NOTAG,
            body: Fcall::RVersion {
                msize: 8192,
                version: P92000U.to_owned(),
            },
        };
        let attach = Msg {
            tag: 1,
            body: Fcall::TAttachDotu {
                fid: 1,
                afid: NOFID,
                uname: "glenda".to_owned(),
                aname: String::new(),
                n_uname: 501,
            },
        };
        // One frame per transport read, so the buffer drains between the
        // RVersion and the swap.
        let reader = ChunkReader::new([
            stream_of(&NINE_P2000, &[rversion.clone()]),
            stream_of(&NINE_P2000_DOTU, &[attach.clone()]),
        ]);
        let mut dec = Decoder::greedy(reader, &NINE_P2000, 8192);

        assert_eq!(dec.read_msg().unwrap(), rversion);
        assert!(dec.is_drained());
        dec.set_protocol(&NINE_P2000_DOTU);
        assert_eq!(dec.read_msg().unwrap(), attach);
    }

    #[test]
    fn buffered_frames_beat_the_eof() {
        // The stream ends exactly at a frame boundary: both messages must
        // come out before the end-of-stream error does.
        let msgs = dote_messages();
        let stream = stream_of(&NINE_P2000_DOTE, &msgs);
        let mut dec = Decoder::greedy(stream.as_slice(), &NINE_P2000_DOTE, 4096);
        for msg in &msgs {
            assert_eq!(&dec.read_msg().unwrap(), msg);
        }
        match dec.read_msg() {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected eof, got {:?}", other),
        }
    }

    #[test]
    fn encoder_rejects_without_writing() {
        let enc = Encoder::new(Vec::new(), &NINE_P2000, 16);
        let big = Msg {
            tag: 1,
            body: Fcall::RRead {
                data: Data(vec![0; 64]),
            },
        };
        assert!(matches!(enc.write_msg(&big), Err(Error::MessageTooBig)));

        // Still usable, and the rejected frame left no bytes behind.
        let small = Msg {
            tag: 2,
            body: Fcall::RClunk,
        };
        let n = enc.write_msg(&small).unwrap();
        let out = enc.into_inner();
        assert_eq!(out.len(), n);
        let got = read_msg(&NINE_P2000, &mut out.as_slice(), 16).unwrap();
        assert_eq!(got, small);
    }

    #[test]
    fn encoder_rejects_foreign_dialect_variants() {
        let enc = Encoder::new(Vec::new(), &NINE_P2000, 1024);
        let dotu = Msg {
            tag: 1,
            body: Fcall::RErrorDotu {
                ename: "nope".to_owned(),
                errno: 5,
            },
        };
        assert!(matches!(
            enc.write_msg(&dotu),
            Err(Error::UnknownMessageType)
        ));
        assert!(enc.into_inner().is_empty());
    }

    #[test]
    fn encoder_swaps_protocol_for_dialect_variants() {
        let enc = Encoder::new(Vec::new(), &NINE_P2000, 1024);
        let version = Msg {
            tag: NOTAG,
            body: Fcall::TVersion {
                msize: 1024,
                version: P92000E.to_owned(),
            },
        };
        enc.write_msg(&version).unwrap();
        enc.set_protocol(&NINE_P2000_DOTE);
        let session = Msg {
            tag: NOTAG,
            body: Fcall::TSession {
                key: [9, 9, 9, 9, 9, 9, 9, 9],
            },
        };
        enc.write_msg(&session).unwrap();

        let out = enc.into_inner();
        let mut dec = Decoder::greedy(out.as_slice(), &NINE_P2000_DOTE, 1024);
        assert_eq!(dec.read_msg().unwrap(), version);
        assert_eq!(dec.read_msg().unwrap(), session);
    }

    #[test]
    fn concurrent_writers_never_interleave_frames() {
        let sink = SharedWriter(Arc::new(Mutex::new(Vec::new())));
        let enc = Arc::new(Encoder::new(sink.clone(), &NINE_P2000, 4096));

        let mut handles = Vec::new();
        for t in 0..2u8 {
            let enc = Arc::clone(&enc);
            handles.push(std::thread::spawn(move || {
                for i in 0..50u16 {
                    let msg = Msg {
                        tag: (u16::from(t) << 8) | i,
                        body: Fcall::RRead {
                            data: Data(vec![t; 33]),
                        },
                    };
                    enc.write_msg(&msg).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let bytes = sink.0.lock().unwrap().clone();
        let mut dec = Decoder::greedy(bytes.as_slice(), &NINE_P2000, 4096);
        let mut seen: [Vec<u16>; 2] = [Vec::new(), Vec::new()];
        for _ in 0..100 {
            let msg = dec.read_msg().unwrap();
            let t = (msg.tag >> 8) as usize;
            match msg.body {
                Fcall::RRead { data } => assert_eq!(data.0, vec![t as u8; 33]),
                other => panic!("frame interleaved into {:?}", other),
            }
            seen[t].push(msg.tag & 0xFF);
        }
        // Per-thread ordering survives the serialisation.
        for lane in &seen {
            assert_eq!(*lane, (0..50).collect::<Vec<u16>>());
        }
    }

    #[test]
    fn wstat_outer_size_mismatch_is_tolerated() {
        let msg = Msg {
            tag: 3,
            body: Fcall::TWStat {
                fid: 77,
                stat: stat(),
            },
        };
        let mut frame = Vec::new();
        write_msg(&NINE_P2000, &mut frame, 4096, &msg).unwrap();
        // Corrupt the outer stat length (body offset 6 after the frame
        // header and tag+fid); the inner layout is authoritative.
        frame[HEADER_SIZE + 6] = frame[HEADER_SIZE + 6].wrapping_add(1);
        let got = read_msg(&NINE_P2000, &mut frame.as_slice(), 4096).unwrap();
        assert_eq!(got, msg);
    }

    #[test]
    fn reset_reallocates_for_a_new_msize() {
        let msgs = base_messages();
        let stream = stream_of(&NINE_P2000, &msgs);
        let mut dec = Decoder::greedy(stream.as_slice(), &NINE_P2000, 4096);
        for msg in &msgs {
            assert_eq!(&dec.read_msg().unwrap(), msg);
        }
        assert!(dec.is_drained());

        // Lower the limit, reset, and confirm the soft limit now bites.
        dec.set_msize(16);
        dec.reset();
        let tail = stream_of(&NINE_P2000, &[msgs[9].clone()]);
        let _ = dec.replace_reader(tail.as_slice());
        assert!(matches!(dec.read_msg(), Err(Error::MessageTooBig)));
    }
}
