//! 9P protocol data types and constants.
//!
//! # Protocol
//! 9P2000, 9P2000.u, 9P2000.e

use bitflags::bitflags;
use enum_primitive::*;

/// 9P2000 version string
pub const P92000: &str = "9P2000";

/// 9P2000.u version string
pub const P92000U: &str = "9P2000.u";

/// 9P2000.e version string
pub const P92000E: &str = "9P2000.e";

/// The version string that comes with `RVersion` when the server does not
/// understand the client's version string
pub const VERSION_UNKNOWN: &str = "unknown";

/*
 * 9P magic numbers
 */
/// Special tag which `TVersion`/`RVersion` and the 9P2000.e `TSession` must
/// use as `tag`
pub const NOTAG: u16 = !0;

/// Special value which `TAttach` with no auth must use as `afid`
///
/// If the client does not wish to authenticate the connection, or knows that
/// authentication is not required, the afid field in the attach message
/// should be set to `NOFID`
pub const NOFID: u32 = !0;

/// Special uid which the 9P2000.u `TAuthDotu`/`TAttachDotu` use as `n_uname`
/// to indicate no uid is specified
pub const NONUNAME: u32 = !0;

/// Overhead of the size and type fields of a framed message
///
/// size[4] type[1]
pub const HEADER_SIZE: usize = 4 + 1;

/// Ample room for `TWrite`/`RRead` header
///
/// size[4] TRead/TWrite[2] tag[2] fid[4] offset[8] count[4]
pub const IOHDRSZ: u32 = 24;

bitflags! {
    /// The type of I/O carried by `TOpen`/`TCreate`
    ///
    /// Open mode to be checked against the permissions for the file. `OTRUNC`,
    /// `OCEXEC` and `ORCLOSE` are or'ed into the low access bits.
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub struct OpenMode: u8 {
        #[doc = "Open for read"]
        const OREAD     = 0;
        #[doc = "Write"]
        const OWRITE    = 1;
        #[doc = "Read and write"]
        const ORDWR     = 2;
        #[doc = "Execute, == read but check execute permission"]
        const OEXEC     = 3;
        #[doc = "Or'ed in (except for exec), truncate file first"]
        const OTRUNC    = 0x10;
        #[doc = "Or'ed in, close on exec"]
        const OCEXEC    = 0x20;
        #[doc = "Or'ed in, remove on close"]
        const ORCLOSE   = 0x40;
    }
}

bitflags! {
    /// Bits in `Stat.mode`
    ///
    /// The high bits describe the file class, the low bits are rwx
    /// permissions in the usual three triplets. The `DMSYMLINK..DMSETGID`
    /// range belongs to 9P2000.u.
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub struct FileMode: u32 {
        #[doc = "Mode bit for directories"]
        const DMDIR         = 0x8000_0000;
        #[doc = "Mode bit for append only files"]
        const DMAPPEND      = 0x4000_0000;
        #[doc = "Mode bit for exclusive use files"]
        const DMEXCL        = 0x2000_0000;
        #[doc = "Mode bit for mounted channel"]
        const DMMOUNT       = 0x1000_0000;
        #[doc = "Mode bit for authentication file"]
        const DMAUTH        = 0x0800_0000;
        #[doc = "Mode bit for non-backed-up files"]
        const DMTMP         = 0x0400_0000;
        #[doc = "Mode bit for symbolic links (9P2000.u)"]
        const DMSYMLINK     = 0x0200_0000;
        #[doc = "Mode bit for hard links (9P2000.u)"]
        const DMLINK        = 0x0100_0000;
        #[doc = "Mode bit for device files (9P2000.u)"]
        const DMDEVICE      = 0x0080_0000;
        #[doc = "Mode bit for named pipes (9P2000.u)"]
        const DMNAMEDPIPE   = 0x0020_0000;
        #[doc = "Mode bit for sockets (9P2000.u)"]
        const DMSOCKET      = 0x0010_0000;
        #[doc = "Mode bit for setuid (9P2000.u)"]
        const DMSETUID      = 0x0008_0000;
        #[doc = "Mode bit for setgid (9P2000.u)"]
        const DMSETGID      = 0x0004_0000;
        #[doc = "Mode bit for read permission"]
        const DMREAD        = 0x4;
        #[doc = "Mode bit for write permission"]
        const DMWRITE       = 0x2;
        #[doc = "Mode bit for execute permission"]
        const DMEXEC        = 0x1;
    }
}

bitflags! {
    /// Bits in `Qid.typ`
    ///
    /// # Protocol
    /// 9P2000/9P2000.u
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub struct QidType: u8 {
        #[doc = "Type bit for directories"]
        const DIR       = 0x80;
        #[doc = "Type bit for append only files"]
        const APPEND    = 0x40;
        #[doc = "Type bit for exclusive use files"]
        const EXCL      = 0x20;
        #[doc = "Type bit for mounted channel"]
        const MOUNT     = 0x10;
        #[doc = "Type bit for authentication file"]
        const AUTH      = 0x08;
        #[doc = "Type bit for not-backed-up file"]
        const TMP       = 0x04;
        #[doc = "Type bit for symbolic links (9P2000.u)"]
        const SYMLINK   = 0x02;
        #[doc = "Type bit for hard-link (9P2000.u)"]
        const LINK      = 0x01;
        #[doc = "Plain file"]
        const FILE      = 0x00;
    }
}

/// Server side data type for path tracking
///
/// The server's unique identification for the file being accessed. Exactly
/// 13 bytes on the wire; a `Qid` never carries its own length prefix.
///
/// # Protocol
/// 9P2000/9P2000.u/9P2000.e
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Qid {
    /// Specify whether the file is a directory, append-only file, etc.
    pub typ: QidType,
    /// Version number for a file; typically, it is incremented every time
    /// the file is modified
    pub version: u32,
    /// An integer which is unique among all files in the hierarchy
    pub path: u64,
}

impl Qid {
    /// Wire size of a `Qid`
    pub const SIZE: usize = 1 + 4 + 8;
}

/// A directory entry, providing detailed information of a file
///
/// Called "Dir" in many other implementations. Self-sized on the wire: the
/// leading 2-byte size covers everything after itself.
///
/// # Protocol
/// 9P2000
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stat {
    /// Reserved for kernel use
    pub typ: u16,
    /// Reserved for kernel use
    pub dev: u32,
    /// Unique id from server
    pub qid: Qid,
    /// Permissions and mode of the file
    pub mode: FileMode,
    /// Last access time of the file
    pub atime: u32,
    /// Last modification time of the file
    pub mtime: u32,
    /// Length of the file, commonly 0 for directories
    pub length: u64,
    /// Name of the file
    pub name: String,
    /// Username of the owning user
    pub uid: String,
    /// Group name of the owning group
    pub gid: String,
    /// User who last modified the file
    pub muid: String,
}

/// The 9P2000.u version of [`Stat`]
///
/// Adds `extensions` and numeric identities in an attempt to improve
/// compatibility with platforms using special files and numeric user IDs.
/// `n_uid`, `n_gid` and `n_muid` take precedence over `uid`, `gid` and
/// `muid`. The numeric IDs are highly platform dependent and not portable.
///
/// # Protocol
/// 9P2000.u
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatDotu {
    /// Reserved for kernel use
    pub typ: u16,
    /// Reserved for kernel use
    pub dev: u32,
    /// Unique id from server
    pub qid: Qid,
    /// Permissions and mode of the file
    pub mode: FileMode,
    /// Last access time of the file
    pub atime: u32,
    /// Last modification time of the file
    pub mtime: u32,
    /// Length of the file, commonly 0 for directories
    pub length: u64,
    /// Name of the file
    pub name: String,
    /// Username of the owning user
    pub uid: String,
    /// Group name of the owning group
    pub gid: String,
    /// User who last modified the file
    pub muid: String,
    /// Data about special files
    pub extensions: String,
    /// UID number for platforms using numeric user IDs
    pub n_uid: u32,
    /// GID number for platforms using numeric user IDs
    pub n_gid: u32,
    /// MUID number for platforms using numeric user IDs
    pub n_muid: u32,
}

/// Data type used in `RRead`, `TWrite` and the 9P2000.e I/O shorthands
///
/// Carried on the wire with a 4-byte length prefix, unlike strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Data(pub Vec<u8>);

// 106 is Terror, which is illegal on the wire and deliberately absent so
// that it never resolves.
enum_from_primitive! {
    #[doc = "Message type, 9P operations"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum MsgType {
        // 9P2000
        TVersion        = 100,
        RVersion,
        TAuth           = 102,
        RAuth,
        TAttach         = 104,
        RAttach,
        //TError        = 106,  // Illegal, never used
        RError          = 107,
        TFlush          = 108,
        RFlush,
        TWalk           = 110,
        RWalk,
        TOpen           = 112,
        ROpen,
        TCreate         = 114,
        RCreate,
        TRead           = 116,
        RRead,
        TWrite          = 118,
        RWrite,
        TClunk          = 120,
        RClunk,
        TRemove         = 122,
        RRemove,
        TStat           = 124,
        RStat,
        TWStat          = 126,
        RWStat,

        // 9P2000.e
        TSession        = 150,
        RSession,
        TSRead          = 152,
        RSRead,
        TSWrite         = 154,
        RSWrite,
    }
}

impl MsgType {
    /// If the message type is a T-message (request)
    pub fn is_request(&self) -> bool {
        (*self as u8) & 1 == 0
    }

    /// If the message type is an R-message (response)
    pub fn is_response(&self) -> bool {
        !self.is_request()
    }
}

/// A data type encapsulating the various 9P messages
///
/// The base 9P2000 variants come first; the `*Dotu` variants are the six
/// 9P2000.u replacements (longer bodies under the same type codes), and the
/// session/shorthand variants at the end belong to 9P2000.e. Which variant a
/// type code maps to is decided by the active [`Protocol`] table.
///
/// [`Protocol`]: crate::protocol::Protocol
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fcall {
    // 9P2000
    /// Suggest the maximum message size and protocol version for the
    /// connection. Must be tagged `NOTAG`.
    TVersion {
        msize: u32,
        version: String,
    },
    /// Negotiated maximum message size and version, taking the client's
    /// `TVersion` into consideration; `version` is `"unknown"` if
    /// negotiation failed.
    RVersion {
        msize: u32,
        version: String,
    },
    /// Request an authentication protocol connection. The protocol spoken
    /// over the auth fid is not part of 9P2000.
    TAuth {
        afid: u32,
        uname: String,
        aname: String,
    },
    RAuth {
        aqid: Qid,
    },
    /// Establish a connection to a service as a user, and attach `fid` to
    /// the root of the service.
    TAttach {
        fid: u32,
        afid: u32,
        uname: String,
        aname: String,
    },
    RAttach {
        qid: Qid,
    },
    /// Report an error with a request. There is no `TError`, as such a
    /// thing would not make sense.
    RError {
        ename: String,
    },
    /// Cancel a pending request. The flushed tag can be reused after the
    /// response arrives.
    TFlush {
        oldtag: u16,
    },
    RFlush,
    /// Walk into directories, starting from `fid`. All but the last name
    /// must be directories. On success the file is assigned to `newfid`.
    TWalk {
        fid: u32,
        newfid: u32,
        wnames: Vec<String>,
    },
    /// Qids for each successfully walked element; a full-length reply means
    /// the walk succeeded.
    RWalk {
        wqids: Vec<Qid>,
    },
    /// Open a fid for reading/writing/executing.
    TOpen {
        fid: u32,
        mode: OpenMode,
    },
    ROpen {
        qid: Qid,
        iounit: u32,
    },
    /// Create a file in the directory `fid` with the provided permissions,
    /// then open it as `TOpen` would. A directory is created by setting
    /// `DMDIR` in `perm`.
    TCreate {
        fid: u32,
        name: String,
        perm: FileMode,
        mode: OpenMode,
    },
    RCreate {
        qid: Qid,
        iounit: u32,
    },
    /// Read `count` bytes at `offset` from an open file.
    TRead {
        fid: u32,
        offset: u64,
        count: u32,
    },
    RRead {
        data: Data,
    },
    /// Write data at `offset` to an open file.
    TWrite {
        fid: u32,
        offset: u64,
        data: Data,
    },
    RWrite {
        count: u32,
    },
    /// Release a fid, allowing it to be reused.
    TClunk {
        fid: u32,
    },
    RClunk,
    /// Clunk a fid and remove the file if permitted.
    TRemove {
        fid: u32,
    },
    /// Indicates a successful clunk, but not necessarily a successful
    /// remove.
    RRemove,
    /// Retrieve the `Stat` struct of a file.
    TStat {
        fid: u32,
    },
    RStat {
        stat: Stat,
    },
    /// Apply a `Stat` struct to a file. Fields can be set to "no change"
    /// values: empty strings, or the maximum unsigned value for integral
    /// fields. The application is all-or-nothing.
    TWStat {
        fid: u32,
        stat: Stat,
    },
    RWStat,

    // 9P2000.u
    /// The 9P2000.u `TAuth`; `n_uname` takes precedence over `uname`.
    TAuthDotu {
        afid: u32,
        uname: String,
        aname: String,
        n_uname: u32,
    },
    /// The 9P2000.u `TAttach`; `n_uname` takes precedence over `uname`.
    TAttachDotu {
        fid: u32,
        afid: u32,
        uname: String,
        aname: String,
        n_uname: u32,
    },
    /// The 9P2000.u `RError`; `errno` takes precedence over `ename`.
    RErrorDotu {
        ename: String,
        errno: u32,
    },
    /// The 9P2000.u `TCreate`; `extension` describes special files.
    TCreateDotu {
        fid: u32,
        name: String,
        perm: FileMode,
        mode: OpenMode,
        extension: String,
    },
    /// The 9P2000.u `RStat`, carrying a [`StatDotu`].
    RStatDotu {
        stat: StatDotu,
    },
    /// The 9P2000.u `TWStat`, carrying a [`StatDotu`].
    TWStatDotu {
        fid: u32,
        stat: StatDotu,
    },

    // 9P2000.e
    /// Restore a previous session. Must be the first request after
    /// `TVersion` and must be tagged `NOTAG`. The key was obtained in the
    /// previous session through other means, such as an authentication
    /// scheme.
    TSession {
        key: [u8; 8],
    },
    RSession,
    /// Shorthand for walk + open + read + clunk of many small files.
    TSRead {
        fid: u32,
        wnames: Vec<String>,
    },
    RSRead {
        data: Data,
    },
    /// Shorthand for walk + create-or-truncate + write + clunk.
    TSWrite {
        fid: u32,
        wnames: Vec<String>,
        data: Data,
    },
    RSWrite {
        count: u32,
    },
}

/// Envelope for 9P messages
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Msg {
    /// Chosen and used by the client to identify the message.
    /// The reply to the message will have the same tag
    pub tag: u16,
    /// Message body encapsulating the various 9P messages
    pub body: Fcall,
}

#[test]
fn msg_type_parity() {
    assert!(MsgType::TVersion.is_request());
    assert!(MsgType::RVersion.is_response());
    assert!(MsgType::TSWrite.is_request());
    assert!(MsgType::RSWrite.is_response());
}

#[test]
fn terror_never_resolves() {
    use num_traits::FromPrimitive;
    assert_eq!(MsgType::from_u8(106), None);
    assert_eq!(MsgType::from_u8(100), Some(MsgType::TVersion));
    assert_eq!(MsgType::from_u8(127), Some(MsgType::RWStat));
    assert_eq!(MsgType::from_u8(155), Some(MsgType::RSWrite));
    assert_eq!(MsgType::from_u8(156), None);
}
