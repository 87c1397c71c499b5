//! Serialize/deserialize 9P messages into/from binary.

use crate::error::{Error, Result};
use crate::fcall::*;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::mem;
use std::ops::Shl;

macro_rules! decode {
    ($decoder:expr) => {
        Decodable::decode(&mut $decoder)?
    };
}

/// Split `n` bytes off the front of `b`, failing instead of panicking when
/// the slice is shorter.
fn take<'a>(b: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if b.len() < n {
        return Err(Error::PayloadTooShort);
    }
    let (head, rest) = b.split_at(n);
    *b = rest;
    Ok(head)
}

/// A serializing specific result to overload operators on `Result`
///
/// # Overloaded operators
/// <<, ?
pub struct SResult<T>(Result<T>);

/// A wrapper class of WriteBytesExt to provide operator overloads
/// for serializing
///
/// Operator '<<' serializes the right hand side argument into
/// the left hand side encoder
#[derive(Debug)]
pub struct Encoder<W> {
    writer: W,
    bytes: usize,
}

impl<W: WriteBytesExt> Encoder<W> {
    pub fn new(writer: W) -> Encoder<W> {
        Encoder { writer, bytes: 0 }
    }

    /// Return total bytes written
    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    /// Encode data, equivalent to: encoder << data
    pub fn encode<T: Encodable>(&mut self, data: &T) -> Result<usize> {
        let bytes = data.encode(&mut self.writer)?;
        self.bytes += bytes;
        Ok(bytes)
    }

    /// Get inner writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<'a, T: Encodable, W: WriteBytesExt> Shl<&'a T> for Encoder<W> {
    type Output = SResult<Encoder<W>>;
    fn shl(mut self, rhs: &'a T) -> Self::Output {
        match self.encode(rhs) {
            Ok(_) => SResult(Ok(self)),
            Err(e) => SResult(Err(e)),
        }
    }
}

impl<'a, T: Encodable, W: WriteBytesExt> Shl<&'a T> for SResult<Encoder<W>> {
    type Output = Self;
    fn shl(self, rhs: &'a T) -> Self::Output {
        match self.0 {
            Ok(mut encoder) => match encoder.encode(rhs) {
                Ok(_) => SResult(Ok(encoder)),
                Err(e) => SResult(Err(e)),
            },
            Err(e) => SResult(Err(e)),
        }
    }
}

/// Trait representing a type which can be serialized into binary
pub trait Encodable {
    /// The exact number of bytes `encode` will produce, without performing
    /// the serialisation
    fn wire_len(&self) -> usize;

    /// Encode self to w and returns the number of bytes encoded
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize>;
}

impl Encodable for u8 {
    fn wire_len(&self) -> usize {
        mem::size_of::<Self>()
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u8(*self)?;
        Ok(mem::size_of::<Self>())
    }
}

impl Encodable for u16 {
    fn wire_len(&self) -> usize {
        mem::size_of::<Self>()
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u16::<LittleEndian>(*self)?;
        Ok(mem::size_of::<Self>())
    }
}

impl Encodable for u32 {
    fn wire_len(&self) -> usize {
        mem::size_of::<Self>()
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u32::<LittleEndian>(*self)?;
        Ok(mem::size_of::<Self>())
    }
}

impl Encodable for u64 {
    fn wire_len(&self) -> usize {
        mem::size_of::<Self>()
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u64::<LittleEndian>(*self)?;
        Ok(mem::size_of::<Self>())
    }
}

impl Encodable for String {
    fn wire_len(&self) -> usize {
        2 + self.len()
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        if self.len() > u16::MAX as usize {
            return Err(Error::StringTooLong(self.len()));
        }
        let mut bytes = (self.len() as u16).encode(w)?;
        w.write_all(self.as_bytes())?;
        bytes += self.len();
        Ok(bytes)
    }
}

impl Encodable for Data {
    fn wire_len(&self) -> usize {
        4 + self.0.len()
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        if self.0.len() as u64 > u32::MAX as u64 {
            return Err(Error::DataTooLong(self.0.len()));
        }
        let mut bytes = (self.0.len() as u32).encode(w)?;
        w.write_all(&self.0)?;
        bytes += self.0.len();
        Ok(bytes)
    }
}

impl Encodable for [u8; 8] {
    fn wire_len(&self) -> usize {
        8
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_all(self)?;
        Ok(8)
    }
}

impl<T: Encodable> Encodable for Vec<T> {
    fn wire_len(&self) -> usize {
        self.iter().fold(2, |acc, e| acc + e.wire_len())
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        if self.len() > u16::MAX as usize {
            return Err(Error::VectorTooLong(self.len()));
        }
        match self
            .iter()
            .fold(Encoder::new(w) << &(self.len() as u16), |acc, e| acc << e)
        {
            SResult(Ok(enc)) => Ok(enc.bytes_written()),
            SResult(Err(e)) => Err(e),
        }
    }
}

impl Encodable for QidType {
    fn wire_len(&self) -> usize {
        1
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        self.bits().encode(w)
    }
}

impl Encodable for OpenMode {
    fn wire_len(&self) -> usize {
        1
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        self.bits().encode(w)
    }
}

impl Encodable for FileMode {
    fn wire_len(&self) -> usize {
        4
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        self.bits().encode(w)
    }
}

impl Encodable for Qid {
    fn wire_len(&self) -> usize {
        Qid::SIZE
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        match Encoder::new(w) << &self.typ << &self.version << &self.path {
            SResult(Ok(enc)) => Ok(enc.bytes_written()),
            SResult(Err(e)) => Err(e),
        }
    }
}

// Fixed portion of a Stat: size[2] type[2] dev[4] qid[13] mode[4] atime[4]
// mtime[4] length[8].
const STAT_FIXED: usize = 2 + 2 + 4 + Qid::SIZE + 4 + 4 + 4 + 8;

impl Encodable for Stat {
    fn wire_len(&self) -> usize {
        STAT_FIXED
            + self.name.wire_len()
            + self.uid.wire_len()
            + self.gid.wire_len()
            + self.muid.wire_len()
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        // The leading size field excludes its own two bytes.
        let size = self.wire_len() - 2;
        if size > u16::MAX as usize {
            return Err(Error::StatTooLong(size));
        }
        match Encoder::new(w)
            << &(size as u16)
            << &self.typ
            << &self.dev
            << &self.qid
            << &self.mode
            << &self.atime
            << &self.mtime
            << &self.length
            << &self.name
            << &self.uid
            << &self.gid
            << &self.muid
        {
            SResult(Ok(enc)) => Ok(enc.bytes_written()),
            SResult(Err(e)) => Err(e),
        }
    }
}

impl Encodable for StatDotu {
    fn wire_len(&self) -> usize {
        STAT_FIXED
            + self.name.wire_len()
            + self.uid.wire_len()
            + self.gid.wire_len()
            + self.muid.wire_len()
            + self.extensions.wire_len()
            + 4
            + 4
            + 4
    }
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        let size = self.wire_len() - 2;
        if size > u16::MAX as usize {
            return Err(Error::StatTooLong(size));
        }
        match Encoder::new(w)
            << &(size as u16)
            << &self.typ
            << &self.dev
            << &self.qid
            << &self.mode
            << &self.atime
            << &self.mtime
            << &self.length
            << &self.name
            << &self.uid
            << &self.gid
            << &self.muid
            << &self.extensions
            << &self.n_uid
            << &self.n_gid
            << &self.n_muid
        {
            SResult(Ok(enc)) => Ok(enc.bytes_written()),
            SResult(Err(e)) => Err(e),
        }
    }
}

/// Trait representing a type which can be deserialized from binary
///
/// Decoding advances the slice cursor past the consumed bytes; a slice
/// shorter than the field layout yields `PayloadTooShort`, never a panic.
pub trait Decodable: Sized {
    fn decode(b: &mut &[u8]) -> Result<Self>;
}

impl Decodable for u8 {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        b.read_u8().map_err(|_| Error::PayloadTooShort)
    }
}

impl Decodable for u16 {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        b.read_u16::<LittleEndian>()
            .map_err(|_| Error::PayloadTooShort)
    }
}

impl Decodable for u32 {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        b.read_u32::<LittleEndian>()
            .map_err(|_| Error::PayloadTooShort)
    }
}

impl Decodable for u64 {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        b.read_u64::<LittleEndian>()
            .map_err(|_| Error::PayloadTooShort)
    }
}

impl Decodable for String {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        let len: u16 = Decodable::decode(b)?;
        let raw = take(b, len as usize)?;
        // Wire strings are opaque bytes; invalid UTF-8 is carried through
        // lossily rather than rejected.
        Ok(String::from_utf8_lossy(raw).into_owned())
    }
}

impl Decodable for Data {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        let len: u32 = Decodable::decode(b)?;
        Ok(Data(take(b, len as usize)?.to_vec()))
    }
}

impl Decodable for [u8; 8] {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        let mut key = [0; 8];
        key.copy_from_slice(take(b, 8)?);
        Ok(key)
    }
}

impl<T: Decodable> Decodable for Vec<T> {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        let len: u16 = Decodable::decode(b)?;
        let mut buf = Vec::new();
        for _ in 0..len {
            buf.push(Decodable::decode(b)?);
        }
        Ok(buf)
    }
}

impl Decodable for QidType {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        // Unknown bits pass through untouched.
        Ok(QidType::from_bits_retain(Decodable::decode(b)?))
    }
}

impl Decodable for OpenMode {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        Ok(OpenMode::from_bits_retain(Decodable::decode(b)?))
    }
}

impl Decodable for FileMode {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        Ok(FileMode::from_bits_retain(Decodable::decode(b)?))
    }
}

impl Decodable for Qid {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        Ok(Qid {
            typ: Decodable::decode(b)?,
            version: Decodable::decode(b)?,
            path: Decodable::decode(b)?,
        })
    }
}

impl Decodable for Stat {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        // The leading size is redundant; the fields delimit themselves.
        let _size: u16 = Decodable::decode(b)?;
        Ok(Stat {
            typ: Decodable::decode(b)?,
            dev: Decodable::decode(b)?,
            qid: Decodable::decode(b)?,
            mode: Decodable::decode(b)?,
            atime: Decodable::decode(b)?,
            mtime: Decodable::decode(b)?,
            length: Decodable::decode(b)?,
            name: Decodable::decode(b)?,
            uid: Decodable::decode(b)?,
            gid: Decodable::decode(b)?,
            muid: Decodable::decode(b)?,
        })
    }
}

impl Decodable for StatDotu {
    fn decode(b: &mut &[u8]) -> Result<Self> {
        let _size: u16 = Decodable::decode(b)?;
        Ok(StatDotu {
            typ: Decodable::decode(b)?,
            dev: Decodable::decode(b)?,
            qid: Decodable::decode(b)?,
            mode: Decodable::decode(b)?,
            atime: Decodable::decode(b)?,
            mtime: Decodable::decode(b)?,
            length: Decodable::decode(b)?,
            name: Decodable::decode(b)?,
            uid: Decodable::decode(b)?,
            gid: Decodable::decode(b)?,
            muid: Decodable::decode(b)?,
            extensions: Decodable::decode(b)?,
            n_uid: Decodable::decode(b)?,
            n_gid: Decodable::decode(b)?,
            n_muid: Decodable::decode(b)?,
        })
    }
}

impl Fcall {
    /// The exact encoded length of the message body, excluding the leading
    /// tag and the frame header
    pub fn wire_len(&self) -> usize {
        use crate::Fcall::*;

        match self {
            TVersion { version, .. } | RVersion { version, .. } => 4 + version.wire_len(),
            TAuth { uname, aname, .. } => 4 + uname.wire_len() + aname.wire_len(),
            RAuth { .. } | RAttach { .. } => Qid::SIZE,
            TAttach { uname, aname, .. } => 4 + 4 + uname.wire_len() + aname.wire_len(),
            RError { ename } => ename.wire_len(),
            TFlush { .. } => 2,
            RFlush | RClunk | RRemove | RWStat | RSession => 0,
            TWalk { wnames, .. } => 4 + 4 + wnames.wire_len(),
            RWalk { wqids } => wqids.wire_len(),
            TOpen { .. } => 4 + 1,
            ROpen { .. } | RCreate { .. } => Qid::SIZE + 4,
            TCreate { name, .. } => 4 + name.wire_len() + 4 + 1,
            TRead { .. } => 4 + 8 + 4,
            RRead { data } | RSRead { data } => data.wire_len(),
            TWrite { data, .. } => 4 + 8 + data.wire_len(),
            RWrite { .. } | RSWrite { .. } => 4,
            TClunk { .. } | TRemove { .. } | TStat { .. } => 4,
            RStat { stat } => 2 + stat.wire_len(),
            TWStat { stat, .. } => 4 + 2 + stat.wire_len(),

            // 9P2000.u
            TAuthDotu { uname, aname, .. } => 4 + uname.wire_len() + aname.wire_len() + 4,
            TAttachDotu { uname, aname, .. } => 4 + 4 + uname.wire_len() + aname.wire_len() + 4,
            RErrorDotu { ename, .. } => ename.wire_len() + 4,
            TCreateDotu {
                name, extension, ..
            } => 4 + name.wire_len() + 4 + 1 + extension.wire_len(),
            RStatDotu { stat } => 2 + stat.wire_len(),
            TWStatDotu { stat, .. } => 4 + 2 + stat.wire_len(),

            // 9P2000.e
            TSession { .. } => 8,
            TSRead { wnames, .. } => 4 + wnames.wire_len(),
            TSWrite { wnames, data, .. } => 4 + wnames.wire_len() + data.wire_len(),
        }
    }
}

impl Encodable for Msg {
    fn wire_len(&self) -> usize {
        2 + self.body.wire_len()
    }

    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        use crate::Fcall::*;

        let buf = Encoder::new(w) << &self.tag;

        let buf = match self.body {
            // 9P2000
            TVersion {
                ref msize,
                ref version,
            } => buf << msize << version,
            RVersion {
                ref msize,
                ref version,
            } => buf << msize << version,
            TAuth {
                ref afid,
                ref uname,
                ref aname,
            } => buf << afid << uname << aname,
            RAuth { ref aqid } => buf << aqid,
            TAttach {
                ref fid,
                ref afid,
                ref uname,
                ref aname,
            } => buf << fid << afid << uname << aname,
            RAttach { ref qid } => buf << qid,
            RError { ref ename } => buf << ename,
            TFlush { ref oldtag } => buf << oldtag,
            RFlush => buf,
            TWalk {
                ref fid,
                ref newfid,
                ref wnames,
            } => buf << fid << newfid << wnames,
            RWalk { ref wqids } => buf << wqids,
            TOpen { ref fid, ref mode } => buf << fid << mode,
            ROpen {
                ref qid,
                ref iounit,
            } => buf << qid << iounit,
            TCreate {
                ref fid,
                ref name,
                ref perm,
                ref mode,
            } => buf << fid << name << perm << mode,
            RCreate {
                ref qid,
                ref iounit,
            } => buf << qid << iounit,
            TRead {
                ref fid,
                ref offset,
                ref count,
            } => buf << fid << offset << count,
            RRead { ref data } => buf << data,
            TWrite {
                ref fid,
                ref offset,
                ref data,
            } => buf << fid << offset << data,
            RWrite { ref count } => buf << count,
            TClunk { ref fid } => buf << fid,
            RClunk => buf,
            TRemove { ref fid } => buf << fid,
            RRemove => buf,
            TStat { ref fid } => buf << fid,
            RStat { ref stat } => {
                // The embedded stat carries an extra outer length so it can
                // be skipped without recursing.
                buf << &(stat.wire_len() as u16) << stat
            }
            TWStat { ref fid, ref stat } => buf << fid << &(stat.wire_len() as u16) << stat,
            RWStat => buf,

            // 9P2000.u
            TAuthDotu {
                ref afid,
                ref uname,
                ref aname,
                ref n_uname,
            } => buf << afid << uname << aname << n_uname,
            TAttachDotu {
                ref fid,
                ref afid,
                ref uname,
                ref aname,
                ref n_uname,
            } => buf << fid << afid << uname << aname << n_uname,
            RErrorDotu {
                ref ename,
                ref errno,
            } => buf << ename << errno,
            TCreateDotu {
                ref fid,
                ref name,
                ref perm,
                ref mode,
                ref extension,
            } => buf << fid << name << perm << mode << extension,
            RStatDotu { ref stat } => buf << &(stat.wire_len() as u16) << stat,
            TWStatDotu { ref fid, ref stat } => buf << fid << &(stat.wire_len() as u16) << stat,

            // 9P2000.e
            TSession { ref key } => buf << key,
            RSession => buf,
            TSRead {
                ref fid,
                ref wnames,
            } => buf << fid << wnames,
            RSRead { ref data } => buf << data,
            TSWrite {
                ref fid,
                ref wnames,
                ref data,
            } => buf << fid << wnames << data,
            RSWrite { ref count } => buf << count,
        };

        match buf {
            SResult(Ok(b)) => Ok(b.bytes_written()),
            SResult(Err(e)) => Err(e),
        }
    }
}

impl Msg {
    /// Decode a message body (tag and variant fields) into the shape of
    /// `empty`, an unpopulated variant as produced by a protocol table
    /// lookup.
    ///
    /// `body` is the frame minus its 5-byte header. All variable-length
    /// fields are copied out of `body`, so the returned message does not
    /// borrow from the input.
    pub fn decode(empty: Fcall, body: &[u8]) -> Result<Msg> {
        use crate::Fcall::*;

        let mut b = body;
        let tag = decode!(b);

        let body = match empty {
            // 9P2000
            TVersion { .. } => TVersion {
                msize: decode!(b),
                version: decode!(b),
            },
            RVersion { .. } => RVersion {
                msize: decode!(b),
                version: decode!(b),
            },
            TAuth { .. } => TAuth {
                afid: decode!(b),
                uname: decode!(b),
                aname: decode!(b),
            },
            RAuth { .. } => RAuth { aqid: decode!(b) },
            TAttach { .. } => TAttach {
                fid: decode!(b),
                afid: decode!(b),
                uname: decode!(b),
                aname: decode!(b),
            },
            RAttach { .. } => RAttach { qid: decode!(b) },
            RError { .. } => RError { ename: decode!(b) },
            TFlush { .. } => TFlush { oldtag: decode!(b) },
            RFlush => RFlush,
            TWalk { .. } => TWalk {
                fid: decode!(b),
                newfid: decode!(b),
                wnames: decode!(b),
            },
            RWalk { .. } => RWalk { wqids: decode!(b) },
            TOpen { .. } => TOpen {
                fid: decode!(b),
                mode: decode!(b),
            },
            ROpen { .. } => ROpen {
                qid: decode!(b),
                iounit: decode!(b),
            },
            TCreate { .. } => TCreate {
                fid: decode!(b),
                name: decode!(b),
                perm: decode!(b),
                mode: decode!(b),
            },
            RCreate { .. } => RCreate {
                qid: decode!(b),
                iounit: decode!(b),
            },
            TRead { .. } => TRead {
                fid: decode!(b),
                offset: decode!(b),
                count: decode!(b),
            },
            RRead { .. } => RRead { data: decode!(b) },
            TWrite { .. } => TWrite {
                fid: decode!(b),
                offset: decode!(b),
                data: decode!(b),
            },
            RWrite { .. } => RWrite { count: decode!(b) },
            TClunk { .. } => TClunk { fid: decode!(b) },
            RClunk => RClunk,
            TRemove { .. } => TRemove { fid: decode!(b) },
            RRemove => RRemove,
            TStat { .. } => TStat { fid: decode!(b) },
            RStat { .. } => {
                // The outer length may disagree with the inner one; the
                // self-delimiting stat layout is authoritative.
                let _n: u16 = decode!(b);
                RStat { stat: decode!(b) }
            }
            TWStat { .. } => {
                let fid = decode!(b);
                let _n: u16 = decode!(b);
                TWStat {
                    fid,
                    stat: decode!(b),
                }
            }
            RWStat => RWStat,

            // 9P2000.u
            TAuthDotu { .. } => TAuthDotu {
                afid: decode!(b),
                uname: decode!(b),
                aname: decode!(b),
                n_uname: decode!(b),
            },
            TAttachDotu { .. } => TAttachDotu {
                fid: decode!(b),
                afid: decode!(b),
                uname: decode!(b),
                aname: decode!(b),
                n_uname: decode!(b),
            },
            RErrorDotu { .. } => RErrorDotu {
                ename: decode!(b),
                errno: decode!(b),
            },
            TCreateDotu { .. } => TCreateDotu {
                fid: decode!(b),
                name: decode!(b),
                perm: decode!(b),
                mode: decode!(b),
                extension: decode!(b),
            },
            RStatDotu { .. } => {
                let _n: u16 = decode!(b);
                RStatDotu { stat: decode!(b) }
            }
            TWStatDotu { .. } => {
                let fid = decode!(b);
                let _n: u16 = decode!(b);
                TWStatDotu {
                    fid,
                    stat: decode!(b),
                }
            }

            // 9P2000.e
            TSession { .. } => TSession { key: decode!(b) },
            RSession => RSession,
            TSRead { .. } => TSRead {
                fid: decode!(b),
                wnames: decode!(b),
            },
            RSRead { .. } => RSRead { data: decode!(b) },
            TSWrite { .. } => TSWrite {
                fid: decode!(b),
                wnames: decode!(b),
                data: decode!(b),
            },
            RSWrite { .. } => RSWrite { count: decode!(b) },
        };

        Ok(Msg { tag, body })
    }
}

#[test]
fn qid_codec() {
    let qid = Qid {
        typ: QidType::DIR | QidType::TMP,
        version: 0x1234_0987,
        path: 0x10_2938_74FF_FFFF,
    };
    let mut buf = Vec::new();
    let n = qid.encode(&mut buf).unwrap();
    assert_eq!(n, Qid::SIZE);
    assert_eq!(n, buf.len());
    assert_eq!(buf[0], 0x84);
    assert_eq!(&buf[1..5], &[0x87, 0x09, 0x34, 0x12]);

    let mut b = &buf[..];
    assert_eq!(Qid::decode(&mut b).unwrap(), qid);
    assert!(b.is_empty());
}

#[test]
fn qid_truncated() {
    let mut b = &[0u8; 5][..];
    assert!(matches!(Qid::decode(&mut b), Err(Error::PayloadTooShort)));
}

#[test]
fn stat_inner_size_excludes_itself() {
    let stat = Stat {
        typ: 0xDEAD,
        dev: 0xABCD_EF08,
        qid: Qid::default(),
        mode: FileMode::DMDIR | FileMode::DMREAD,
        atime: 90_870_987,
        mtime: 1_234_124,
        length: 0x23AB_DDF8,
        name: "hello".to_owned(),
        uid: "someone".to_owned(),
        gid: "over the".to_owned(),
        muid: "rainbow".to_owned(),
    };
    let mut buf = Vec::new();
    let n = stat.encode(&mut buf).unwrap();
    assert_eq!(n, stat.wire_len());
    assert_eq!(n, buf.len());
    let inner = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    assert_eq!(inner, buf.len() - 2);

    let mut b = &buf[..];
    assert_eq!(Stat::decode(&mut b).unwrap(), stat);
}

#[test]
fn stat_dotu_codec() {
    let stat = StatDotu {
        name: "hello".to_owned(),
        uid: "someone".to_owned(),
        extensions: "l target".to_owned(),
        n_uid: 23_452_345,
        n_gid: 34_652,
        n_muid: 2_363_457,
        ..StatDotu::default()
    };
    let mut buf = Vec::new();
    let n = stat.encode(&mut buf).unwrap();
    assert_eq!(n, stat.wire_len());
    let inner = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    assert_eq!(inner, buf.len() - 2);

    let mut b = &buf[..];
    assert_eq!(StatDotu::decode(&mut b).unwrap(), stat);
}

#[test]
fn string_too_long_is_rejected() {
    let s = "x".repeat(u16::MAX as usize + 1);
    let mut buf = Vec::new();
    assert!(matches!(
        s.encode(&mut buf),
        Err(Error::StringTooLong(len)) if len == s.len()
    ));
}

#[test]
fn string_is_not_utf8_validated() {
    // 0xFE 0xFF is not valid UTF-8; decoding must not fail.
    let mut b = &[0x02, 0x00, 0xFE, 0xFF][..];
    let s = String::decode(&mut b).unwrap();
    assert!(b.is_empty());
    assert_eq!(s.chars().count(), 2);
}

#[test]
fn empty_string_is_two_zero_bytes() {
    let mut buf = Vec::new();
    String::new().encode(&mut buf).unwrap();
    assert_eq!(buf, [0, 0]);
}
