//! Protocol tables translating between message-type codes and message
//! variants.
//!
//! Each dialect is a static [`Protocol`] value. A dialect consults its own
//! overrides first and falls through to the base 9P2000 table for everything
//! else, so the `.u` table replaces six variants and inherits the rest, and
//! the `.e` table adds its six session/shorthand variants on top of the base.
//!
//! Tables are immutable and freely shared; switching dialect mid-connection
//! (the post-`TVersion` transition) is done by swapping the `&'static
//! Protocol` reference on the encoder or decoder.

use crate::error::{Error, Result};
use crate::fcall::*;
use num_traits::FromPrimitive;

/// A protocol table: message-type classification one way, empty-variant
/// construction the other.
pub struct Protocol {
    /// The version string this dialect negotiates under
    pub name: &'static str,
    type_of: fn(&Fcall) -> Option<MsgType>,
    message_of: fn(MsgType) -> Option<Fcall>,
}

impl Protocol {
    /// Classify a message body to its wire type code.
    ///
    /// Fails with `UnknownMessageType` when the dialect does not carry the
    /// variant, e.g. a `*Dotu` variant under plain 9P2000.
    pub fn type_of(&self, body: &Fcall) -> Result<MsgType> {
        (self.type_of)(body).ok_or(Error::UnknownMessageType)
    }

    /// Produce an unpopulated message variant for a wire type code, ready to
    /// be filled by [`Msg::decode`](crate::fcall::Msg::decode).
    ///
    /// Code 106 (`Terror`) is reserved and resolves in no dialect.
    pub fn message_of(&self, code: u8) -> Result<Fcall> {
        let mt = MsgType::from_u8(code).ok_or(Error::UnknownMessageType)?;
        (self.message_of)(mt).ok_or(Error::UnknownMessageType)
    }
}

/// The base 9P2000 protocol
pub static NINE_P2000: Protocol = Protocol {
    name: P92000,
    type_of: base_type_of,
    message_of: base_message_of,
};

/// The 9P2000.u ("Unix") protocol
///
/// Replaces `TAuth`, `TAttach`, `RError`, `TCreate`, `RStat` and `TWStat`
/// with their longer `*Dotu` variants under the same type codes.
pub static NINE_P2000_DOTU: Protocol = Protocol {
    name: P92000U,
    type_of: dotu_type_of,
    message_of: dotu_message_of,
};

/// The 9P2000.e ("Erlang") protocol
///
/// Adds session restore and combined walk/open/io/clunk shorthands in the
/// 150..=155 code range.
pub static NINE_P2000_DOTE: Protocol = Protocol {
    name: P92000E,
    type_of: dote_type_of,
    message_of: dote_message_of,
};

fn base_type_of(body: &Fcall) -> Option<MsgType> {
    use crate::Fcall::*;

    let mt = match body {
        TVersion { .. } => MsgType::TVersion,
        RVersion { .. } => MsgType::RVersion,
        TAuth { .. } => MsgType::TAuth,
        RAuth { .. } => MsgType::RAuth,
        TAttach { .. } => MsgType::TAttach,
        RAttach { .. } => MsgType::RAttach,
        RError { .. } => MsgType::RError,
        TFlush { .. } => MsgType::TFlush,
        RFlush => MsgType::RFlush,
        TWalk { .. } => MsgType::TWalk,
        RWalk { .. } => MsgType::RWalk,
        TOpen { .. } => MsgType::TOpen,
        ROpen { .. } => MsgType::ROpen,
        TCreate { .. } => MsgType::TCreate,
        RCreate { .. } => MsgType::RCreate,
        TRead { .. } => MsgType::TRead,
        RRead { .. } => MsgType::RRead,
        TWrite { .. } => MsgType::TWrite,
        RWrite { .. } => MsgType::RWrite,
        TClunk { .. } => MsgType::TClunk,
        RClunk => MsgType::RClunk,
        TRemove { .. } => MsgType::TRemove,
        RRemove => MsgType::RRemove,
        TStat { .. } => MsgType::TStat,
        RStat { .. } => MsgType::RStat,
        TWStat { .. } => MsgType::TWStat,
        RWStat => MsgType::RWStat,
        _ => return None,
    };
    Some(mt)
}

fn base_message_of(mt: MsgType) -> Option<Fcall> {
    use crate::Fcall::*;

    let body = match mt {
        MsgType::TVersion => TVersion {
            msize: 0,
            version: String::new(),
        },
        MsgType::RVersion => RVersion {
            msize: 0,
            version: String::new(),
        },
        MsgType::TAuth => TAuth {
            afid: 0,
            uname: String::new(),
            aname: String::new(),
        },
        MsgType::RAuth => RAuth {
            aqid: Qid::default(),
        },
        MsgType::TAttach => TAttach {
            fid: 0,
            afid: 0,
            uname: String::new(),
            aname: String::new(),
        },
        MsgType::RAttach => RAttach {
            qid: Qid::default(),
        },
        MsgType::RError => RError {
            ename: String::new(),
        },
        MsgType::TFlush => TFlush { oldtag: 0 },
        MsgType::RFlush => RFlush,
        MsgType::TWalk => TWalk {
            fid: 0,
            newfid: 0,
            wnames: Vec::new(),
        },
        MsgType::RWalk => RWalk { wqids: Vec::new() },
        MsgType::TOpen => TOpen {
            fid: 0,
            mode: OpenMode::default(),
        },
        MsgType::ROpen => ROpen {
            qid: Qid::default(),
            iounit: 0,
        },
        MsgType::TCreate => TCreate {
            fid: 0,
            name: String::new(),
            perm: FileMode::default(),
            mode: OpenMode::default(),
        },
        MsgType::RCreate => RCreate {
            qid: Qid::default(),
            iounit: 0,
        },
        MsgType::TRead => TRead {
            fid: 0,
            offset: 0,
            count: 0,
        },
        MsgType::RRead => RRead {
            data: Data::default(),
        },
        MsgType::TWrite => TWrite {
            fid: 0,
            offset: 0,
            data: Data::default(),
        },
        MsgType::RWrite => RWrite { count: 0 },
        MsgType::TClunk => TClunk { fid: 0 },
        MsgType::RClunk => RClunk,
        MsgType::TRemove => TRemove { fid: 0 },
        MsgType::RRemove => RRemove,
        MsgType::TStat => TStat { fid: 0 },
        MsgType::RStat => RStat {
            stat: Stat::default(),
        },
        MsgType::TWStat => TWStat {
            fid: 0,
            stat: Stat::default(),
        },
        MsgType::RWStat => RWStat,
        _ => return None,
    };
    Some(body)
}

fn dotu_type_of(body: &Fcall) -> Option<MsgType> {
    use crate::Fcall::*;

    let mt = match body {
        TAuthDotu { .. } => MsgType::TAuth,
        TAttachDotu { .. } => MsgType::TAttach,
        RErrorDotu { .. } => MsgType::RError,
        TCreateDotu { .. } => MsgType::TCreate,
        RStatDotu { .. } => MsgType::RStat,
        TWStatDotu { .. } => MsgType::TWStat,
        _ => return base_type_of(body),
    };
    Some(mt)
}

fn dotu_message_of(mt: MsgType) -> Option<Fcall> {
    use crate::Fcall::*;

    let body = match mt {
        MsgType::TAuth => TAuthDotu {
            afid: 0,
            uname: String::new(),
            aname: String::new(),
            n_uname: 0,
        },
        MsgType::TAttach => TAttachDotu {
            fid: 0,
            afid: 0,
            uname: String::new(),
            aname: String::new(),
            n_uname: 0,
        },
        MsgType::RError => RErrorDotu {
            ename: String::new(),
            errno: 0,
        },
        MsgType::TCreate => TCreateDotu {
            fid: 0,
            name: String::new(),
            perm: FileMode::default(),
            mode: OpenMode::default(),
            extension: String::new(),
        },
        MsgType::RStat => RStatDotu {
            stat: StatDotu::default(),
        },
        MsgType::TWStat => TWStatDotu {
            fid: 0,
            stat: StatDotu::default(),
        },
        _ => return base_message_of(mt),
    };
    Some(body)
}

fn dote_type_of(body: &Fcall) -> Option<MsgType> {
    use crate::Fcall::*;

    let mt = match body {
        TSession { .. } => MsgType::TSession,
        RSession => MsgType::RSession,
        TSRead { .. } => MsgType::TSRead,
        RSRead { .. } => MsgType::RSRead,
        TSWrite { .. } => MsgType::TSWrite,
        RSWrite { .. } => MsgType::RSWrite,
        _ => return base_type_of(body),
    };
    Some(mt)
}

fn dote_message_of(mt: MsgType) -> Option<Fcall> {
    use crate::Fcall::*;

    let body = match mt {
        MsgType::TSession => TSession { key: [0; 8] },
        MsgType::RSession => RSession,
        MsgType::TSRead => TSRead {
            fid: 0,
            wnames: Vec::new(),
        },
        MsgType::RSRead => RSRead {
            data: Data::default(),
        },
        MsgType::TSWrite => TSWrite {
            fid: 0,
            wnames: Vec::new(),
            data: Data::default(),
        },
        MsgType::RSWrite => RSWrite { count: 0 },
        _ => return base_message_of(mt),
    };
    Some(body)
}
