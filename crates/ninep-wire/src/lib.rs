// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! 9P2000 wire types and the frame codec shared between the FeedDoor
//! dispatcher and its transports. The dispatcher works purely in terms of
//! [`Request`] and [`Response`]; only this crate touches wire bytes.

use std::fmt;
use std::io::{Cursor, Read};

/// Maximum message size offered to clients that do not propose one.
pub const MAX_MSIZE: u32 = 8192;

/// Protocol version string accepted and echoed by the server.
pub const VERSION: &str = "9P2000";

/// Maximum number of path components in a single walk message.
pub const MAXWELEM: usize = 16;

/// Fid value meaning "no fid" (the afid of an unauthenticated attach).
pub const NOFID: u32 = u32::MAX;

/// Tag value used for version negotiation.
pub const NOTAG: u16 = u16::MAX;

/// Directory bit in the `mode` field of a [`Stat`].
pub const DMDIR: u32 = 0x8000_0000;

/// Possible errors produced while encoding or decoding 9P messages.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input buffer was shorter than the declared frame length.
    #[error("truncated frame")]
    Truncated,
    /// Encountered an unknown message type.
    #[error("unsupported message type {0}")]
    Unsupported(u8),
    /// Encountered malformed UTF-8 data.
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
    /// Declared message size does not match the actual payload length.
    #[error("length mismatch: declared {declared} actual {actual}")]
    LengthMismatch {
        /// Message length declared in the frame header.
        declared: u32,
        /// Actual byte length observed in the payload.
        actual: usize,
    },
    /// Detected an invalid path component or walk depth beyond [`MAXWELEM`].
    #[error("invalid path component")]
    InvalidPath,
    /// Invalid open mode flags were provided.
    #[error("invalid open mode {0}")]
    InvalidOpenMode(u8),
}

/// 9P2000 message opcodes understood by this codec.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageType {
    Tversion = 100,
    Rversion = 101,
    Tattach = 104,
    Rattach = 105,
    Rerror = 107,
    Twalk = 110,
    Rwalk = 111,
    Topen = 112,
    Ropen = 113,
    Tread = 116,
    Rread = 117,
    Tclunk = 120,
    Rclunk = 121,
    Tstat = 124,
    Rstat = 125,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match value {
            100 => Tversion,
            101 => Rversion,
            104 => Tattach,
            105 => Rattach,
            107 => Rerror,
            110 => Twalk,
            111 => Rwalk,
            112 => Topen,
            113 => Ropen,
            116 => Tread,
            117 => Rread,
            120 => Tclunk,
            121 => Rclunk,
            124 => Tstat,
            125 => Rstat,
            other => return Err(CodecError::Unsupported(other)),
        })
    }
}

/// Qid type bits per the 9P2000 specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QidType(u8);

impl QidType {
    /// Directory bit.
    pub const DIRECTORY: Self = Self(0x80);
    /// Regular file.
    pub const FILE: Self = Self(0x00);

    fn as_u8(self) -> u8 {
        self.0
    }

    /// Check whether the Qid represents a directory.
    #[must_use]
    pub fn is_directory(self) -> bool {
        self.0 & Self::DIRECTORY.0 != 0
    }
}

impl From<QidType> for u8 {
    fn from(value: QidType) -> Self {
        value.as_u8()
    }
}

/// 9P Qid descriptor: the server-unique identity of a file tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qid {
    ty: QidType,
    version: u32,
    path: u64,
}

impl Qid {
    /// Construct a new Qid.
    #[must_use]
    pub fn new(ty: QidType, version: u32, path: u64) -> Self {
        Self { ty, version, path }
    }

    /// Return the Qid type flags.
    #[must_use]
    pub fn ty(&self) -> QidType {
        self.ty
    }

    /// Return the Qid version field.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Return the Qid path field.
    #[must_use]
    pub fn path(&self) -> u64 {
        self.path
    }
}

/// Machine-independent stat record returned by `Rstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Identity of the described node.
    pub qid: Qid,
    /// Permission bits, with [`DMDIR`] set for directories.
    pub mode: u32,
    /// Last access time, seconds since the Unix epoch.
    pub atime: u32,
    /// Last modification time, seconds since the Unix epoch.
    pub mtime: u32,
    /// Content length in bytes; 0 for directories.
    pub length: u64,
    /// Display name (the last path element).
    pub name: String,
    /// Owner name.
    pub uid: String,
    /// Group name.
    pub gid: String,
    /// Name of the user who last modified the file.
    pub muid: String,
}

/// Base access mode encoded in the low bits of the open mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpenModeBase {
    /// Open for reading.
    ReadOnly = 0,
    /// Open for writing.
    WriteOnly = 1,
    /// Open for reading and writing.
    ReadWrite = 2,
    /// Execute traversal.
    Execute = 3,
}

/// 9P open mode flags as a structured representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    base: OpenModeBase,
    truncate: bool,
    remove_on_close: bool,
}

impl OpenMode {
    const KNOWN_BITS: u8 = 0x03 | 0x10 | 0x40;

    /// Construct a read-only mode descriptor.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            base: OpenModeBase::ReadOnly,
            truncate: false,
            remove_on_close: false,
        }
    }

    /// Construct a write-only mode descriptor (rejected by read-only servers).
    #[must_use]
    pub fn write_only() -> Self {
        Self {
            base: OpenModeBase::WriteOnly,
            truncate: false,
            remove_on_close: false,
        }
    }

    fn from_bits(value: u8) -> Result<Self, CodecError> {
        if value & !Self::KNOWN_BITS != 0 {
            return Err(CodecError::InvalidOpenMode(value));
        }
        let base = match value & 0x03 {
            0 => OpenModeBase::ReadOnly,
            1 => OpenModeBase::WriteOnly,
            2 => OpenModeBase::ReadWrite,
            _ => OpenModeBase::Execute,
        };
        Ok(Self {
            base,
            truncate: value & 0x10 != 0,
            remove_on_close: value & 0x40 != 0,
        })
    }

    /// Determine if the mode permits reading.
    #[must_use]
    pub fn allows_read(self) -> bool {
        matches!(
            self.base,
            OpenModeBase::ReadOnly | OpenModeBase::ReadWrite | OpenModeBase::Execute
        )
    }

    /// Determine if the mode requests any mutation of the file.
    #[must_use]
    pub fn allows_write(self) -> bool {
        matches!(self.base, OpenModeBase::WriteOnly | OpenModeBase::ReadWrite)
            || self.truncate
            || self.remove_on_close
    }

    /// Expose the raw flag representation used on the wire.
    #[must_use]
    pub fn raw(self) -> u8 {
        let mut bits = self.base as u8;
        if self.truncate {
            bits |= 0x10;
        }
        if self.remove_on_close {
            bits |= 0x40;
        }
        bits
    }
}

impl From<OpenMode> for u8 {
    fn from(value: OpenMode) -> Self {
        value.raw()
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.raw())
    }
}

/// Request envelope containing a tag and message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request identifier, echoed back by responses.
    pub tag: u16,
    /// The concrete request payload.
    pub body: RequestBody,
}

/// Response envelope containing a tag and message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response identifier (mirrors the request tag).
    pub tag: u16,
    /// The concrete response payload.
    pub body: ResponseBody,
}

/// Request variants served by FeedDoor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `Tversion` negotiates the message size and version string.
    Version {
        /// Requested maximum message size.
        msize: u32,
        /// Protocol version string supplied by the client.
        version: String,
    },
    /// `Tattach` binds a fid to the tree root.
    Attach {
        /// Fid the client chose for the root.
        fid: u32,
        /// Authentication fid ([`NOFID`] when unused).
        afid: u32,
        /// User name string provided by the client.
        uname: String,
        /// Attachment name supplied by the client.
        aname: String,
    },
    /// `Twalk` traverses the tree to produce a new fid.
    Walk {
        /// Source fid for the walk operation.
        fid: u32,
        /// Destination fid receiving the walk result.
        newfid: u32,
        /// Path components to traverse.
        wnames: Vec<String>,
    },
    /// `Topen` opens an existing fid.
    Open {
        /// Fid to open.
        fid: u32,
        /// Requested open mode flags.
        mode: OpenMode,
    },
    /// `Tread` reads bytes from an opened fid.
    Read {
        /// Fid to read from.
        fid: u32,
        /// Byte offset provided by the client.
        offset: u64,
        /// Number of bytes requested by the client.
        count: u32,
    },
    /// `Tclunk` closes and releases a fid.
    Clunk {
        /// Fid to release.
        fid: u32,
    },
    /// `Tstat` requests the metadata snapshot of a fid.
    Stat {
        /// Fid to describe.
        fid: u32,
    },
}

/// Response variants served by FeedDoor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// `Rversion` returning negotiated parameters.
    Version {
        /// Negotiated message size.
        msize: u32,
        /// Protocol version accepted by the server.
        version: String,
    },
    /// `Rattach` acknowledging the attach with the root Qid.
    Attach {
        /// Qid associated with the attached fid.
        qid: Qid,
    },
    /// `Rwalk` returning the Qids of the resolved components.
    Walk {
        /// Qids for each traversed path component.
        qids: Vec<Qid>,
    },
    /// `Ropen` confirming an opened fid.
    Open {
        /// Qid describing the opened node.
        qid: Qid,
        /// Server-selected I/O unit size (0: no preference).
        iounit: u32,
    },
    /// `Rread` returning the requested bytes.
    Read {
        /// Bytes read from the fid.
        data: Vec<u8>,
    },
    /// `Rclunk` acknowledging fid release.
    Clunk,
    /// `Rstat` returning the metadata snapshot.
    Stat {
        /// Stat record of the described node.
        stat: Stat,
    },
    /// `Rerror` describing the failure condition.
    Error {
        /// Error string surfaced to the client.
        ename: String,
    },
}

/// Codec responsible for encoding and decoding 9P2000 frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct Codec;

impl Codec {
    /// Encode a request into its wire representation.
    pub fn encode_request(&self, request: &Request) -> Result<Vec<u8>, CodecError> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&request.tag.to_le_bytes());
        match &request.body {
            RequestBody::Version { msize, version } => {
                payload.extend_from_slice(&msize.to_le_bytes());
                put_string(&mut payload, version);
                Ok(finish(MessageType::Tversion, &payload))
            }
            RequestBody::Attach {
                fid,
                afid,
                uname,
                aname,
            } => {
                payload.extend_from_slice(&fid.to_le_bytes());
                payload.extend_from_slice(&afid.to_le_bytes());
                put_string(&mut payload, uname);
                put_string(&mut payload, aname);
                Ok(finish(MessageType::Tattach, &payload))
            }
            RequestBody::Walk {
                fid,
                newfid,
                wnames,
            } => {
                payload.extend_from_slice(&fid.to_le_bytes());
                payload.extend_from_slice(&newfid.to_le_bytes());
                if wnames.len() > MAXWELEM {
                    return Err(CodecError::InvalidPath);
                }
                payload.extend_from_slice(&(wnames.len() as u16).to_le_bytes());
                for name in wnames {
                    validate_component(name)?;
                    put_string(&mut payload, name);
                }
                Ok(finish(MessageType::Twalk, &payload))
            }
            RequestBody::Open { fid, mode } => {
                payload.extend_from_slice(&fid.to_le_bytes());
                payload.push((*mode).into());
                Ok(finish(MessageType::Topen, &payload))
            }
            RequestBody::Read { fid, offset, count } => {
                payload.extend_from_slice(&fid.to_le_bytes());
                payload.extend_from_slice(&offset.to_le_bytes());
                payload.extend_from_slice(&count.to_le_bytes());
                Ok(finish(MessageType::Tread, &payload))
            }
            RequestBody::Clunk { fid } => {
                payload.extend_from_slice(&fid.to_le_bytes());
                Ok(finish(MessageType::Tclunk, &payload))
            }
            RequestBody::Stat { fid } => {
                payload.extend_from_slice(&fid.to_le_bytes());
                Ok(finish(MessageType::Tstat, &payload))
            }
        }
    }

    /// Encode a response into its wire representation.
    pub fn encode_response(&self, response: &Response) -> Result<Vec<u8>, CodecError> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&response.tag.to_le_bytes());
        match &response.body {
            ResponseBody::Version { msize, version } => {
                payload.extend_from_slice(&msize.to_le_bytes());
                put_string(&mut payload, version);
                Ok(finish(MessageType::Rversion, &payload))
            }
            ResponseBody::Attach { qid } => {
                put_qid(&mut payload, qid);
                Ok(finish(MessageType::Rattach, &payload))
            }
            ResponseBody::Walk { qids } => {
                if qids.len() > MAXWELEM {
                    return Err(CodecError::InvalidPath);
                }
                payload.extend_from_slice(&(qids.len() as u16).to_le_bytes());
                for qid in qids {
                    put_qid(&mut payload, qid);
                }
                Ok(finish(MessageType::Rwalk, &payload))
            }
            ResponseBody::Open { qid, iounit } => {
                put_qid(&mut payload, qid);
                payload.extend_from_slice(&iounit.to_le_bytes());
                Ok(finish(MessageType::Ropen, &payload))
            }
            ResponseBody::Read { data } => {
                let count: u32 = data
                    .len()
                    .try_into()
                    .map_err(|_| CodecError::LengthMismatch {
                        declared: u32::MAX,
                        actual: data.len(),
                    })?;
                payload.extend_from_slice(&count.to_le_bytes());
                payload.extend_from_slice(data);
                Ok(finish(MessageType::Rread, &payload))
            }
            ResponseBody::Clunk => Ok(finish(MessageType::Rclunk, &payload)),
            ResponseBody::Stat { stat } => {
                // Rstat carries the stat record behind its own length prefix.
                let encoded = encode_stat(stat);
                payload.extend_from_slice(&(encoded.len() as u16).to_le_bytes());
                payload.extend_from_slice(&encoded);
                Ok(finish(MessageType::Rstat, &payload))
            }
            ResponseBody::Error { ename } => {
                put_string(&mut payload, ename);
                Ok(finish(MessageType::Rerror, &payload))
            }
        }
    }

    /// Decode a request from the wire representation.
    pub fn decode_request(&self, bytes: &[u8]) -> Result<Request, CodecError> {
        let (ty, payload) = decode_message(bytes)?;
        let mut cursor = Cursor::new(payload);
        let tag = read_u16(&mut cursor)?;
        let body = match ty {
            MessageType::Tversion => {
                let msize = read_u32(&mut cursor)?;
                let version = read_string(&mut cursor)?;
                RequestBody::Version { msize, version }
            }
            MessageType::Tattach => {
                let fid = read_u32(&mut cursor)?;
                let afid = read_u32(&mut cursor)?;
                let uname = read_string(&mut cursor)?;
                let aname = read_string(&mut cursor)?;
                RequestBody::Attach {
                    fid,
                    afid,
                    uname,
                    aname,
                }
            }
            MessageType::Twalk => {
                let fid = read_u32(&mut cursor)?;
                let newfid = read_u32(&mut cursor)?;
                let nwname = read_u16(&mut cursor)? as usize;
                if nwname > MAXWELEM {
                    return Err(CodecError::InvalidPath);
                }
                let mut wnames = Vec::with_capacity(nwname);
                for _ in 0..nwname {
                    let name = read_string(&mut cursor)?;
                    validate_component(&name)?;
                    wnames.push(name);
                }
                RequestBody::Walk {
                    fid,
                    newfid,
                    wnames,
                }
            }
            MessageType::Topen => {
                let fid = read_u32(&mut cursor)?;
                let raw_mode = read_u8(&mut cursor)?;
                let mode = OpenMode::from_bits(raw_mode)?;
                RequestBody::Open { fid, mode }
            }
            MessageType::Tread => {
                let fid = read_u32(&mut cursor)?;
                let offset = read_u64(&mut cursor)?;
                let count = read_u32(&mut cursor)?;
                RequestBody::Read { fid, offset, count }
            }
            MessageType::Tclunk => {
                let fid = read_u32(&mut cursor)?;
                RequestBody::Clunk { fid }
            }
            MessageType::Tstat => {
                let fid = read_u32(&mut cursor)?;
                RequestBody::Stat { fid }
            }
            other => return Err(CodecError::Unsupported(other as u8)),
        };
        Ok(Request { tag, body })
    }

    /// Decode a response from the wire representation.
    pub fn decode_response(&self, bytes: &[u8]) -> Result<Response, CodecError> {
        let (ty, payload) = decode_message(bytes)?;
        let mut cursor = Cursor::new(payload);
        let tag = read_u16(&mut cursor)?;
        let body = match ty {
            MessageType::Rversion => {
                let msize = read_u32(&mut cursor)?;
                let version = read_string(&mut cursor)?;
                ResponseBody::Version { msize, version }
            }
            MessageType::Rattach => {
                let qid = read_qid(&mut cursor)?;
                ResponseBody::Attach { qid }
            }
            MessageType::Rwalk => {
                let count = read_u16(&mut cursor)? as usize;
                if count > MAXWELEM {
                    return Err(CodecError::InvalidPath);
                }
                let mut qids = Vec::with_capacity(count);
                for _ in 0..count {
                    qids.push(read_qid(&mut cursor)?);
                }
                ResponseBody::Walk { qids }
            }
            MessageType::Ropen => {
                let qid = read_qid(&mut cursor)?;
                let iounit = read_u32(&mut cursor)?;
                ResponseBody::Open { qid, iounit }
            }
            MessageType::Rread => {
                let count = read_u32(&mut cursor)? as usize;
                let mut data = vec![0u8; count];
                cursor
                    .read_exact(&mut data)
                    .map_err(|_| CodecError::Truncated)?;
                ResponseBody::Read { data }
            }
            MessageType::Rclunk => ResponseBody::Clunk,
            MessageType::Rstat => {
                let _nstat = read_u16(&mut cursor)?;
                let stat = decode_stat(&mut cursor)?;
                ResponseBody::Stat { stat }
            }
            MessageType::Rerror => {
                let ename = read_string(&mut cursor)?;
                ResponseBody::Error { ename }
            }
            other => return Err(CodecError::Unsupported(other as u8)),
        };
        Ok(Response { tag, body })
    }
}

fn finish(ty: MessageType, payload: &[u8]) -> Vec<u8> {
    let size = payload
        .len()
        .checked_add(5)
        .expect("payload length overflow");
    let mut buffer = Vec::with_capacity(size);
    buffer.extend_from_slice(&(size as u32).to_le_bytes());
    buffer.push(ty as u8);
    buffer.extend_from_slice(payload);
    buffer
}

fn decode_message(bytes: &[u8]) -> Result<(MessageType, &[u8]), CodecError> {
    if bytes.len() < 5 {
        return Err(CodecError::Truncated);
    }
    let declared = u32::from_le_bytes(bytes[0..4].try_into().expect("sized slice"));
    if declared as usize != bytes.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let ty = MessageType::try_from(bytes[4])?;
    Ok((ty, &bytes[5..]))
}

fn encode_stat(stat: &Stat) -> Vec<u8> {
    // size[2] type[2] dev[4] qid[13] mode[4] atime[4] mtime[4] length[8]
    // name[s] uid[s] gid[s] muid[s]; size excludes its own two bytes.
    let mut body = Vec::new();
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    put_qid(&mut body, &stat.qid);
    body.extend_from_slice(&stat.mode.to_le_bytes());
    body.extend_from_slice(&stat.atime.to_le_bytes());
    body.extend_from_slice(&stat.mtime.to_le_bytes());
    body.extend_from_slice(&stat.length.to_le_bytes());
    put_string(&mut body, &stat.name);
    put_string(&mut body, &stat.uid);
    put_string(&mut body, &stat.gid);
    put_string(&mut body, &stat.muid);
    let mut encoded = Vec::with_capacity(body.len() + 2);
    encoded.extend_from_slice(&(body.len() as u16).to_le_bytes());
    encoded.extend_from_slice(&body);
    encoded
}

fn decode_stat(cursor: &mut Cursor<&[u8]>) -> Result<Stat, CodecError> {
    let _size = read_u16(cursor)?;
    let _ty = read_u16(cursor)?;
    let _dev = read_u32(cursor)?;
    let qid = read_qid(cursor)?;
    let mode = read_u32(cursor)?;
    let atime = read_u32(cursor)?;
    let mtime = read_u32(cursor)?;
    let length = read_u64(cursor)?;
    let name = read_string(cursor)?;
    let uid = read_string(cursor)?;
    let gid = read_string(cursor)?;
    let muid = read_string(cursor)?;
    Ok(Stat {
        qid,
        mode,
        atime,
        mtime,
        length,
        name,
        uid,
        gid,
        muid,
    })
}

fn put_string(buffer: &mut Vec<u8>, value: &str) {
    let len = value.len() as u16;
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
}

fn put_qid(buffer: &mut Vec<u8>, qid: &Qid) {
    buffer.push(qid.ty.as_u8());
    buffer.extend_from_slice(&qid.version.to_le_bytes());
    buffer.extend_from_slice(&qid.path.to_le_bytes());
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::Truncated)?;
    Ok(buf[0])
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, CodecError> {
    let mut buf = [0u8; 2];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::Truncated)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::Truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, CodecError> {
    let mut buf = [0u8; 8];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::Truncated)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, CodecError> {
    let len = read_u16(cursor)? as usize;
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::Truncated)?;
    String::from_utf8(buf).map_err(|_| CodecError::InvalidUtf8)
}

fn read_qid(cursor: &mut Cursor<&[u8]>) -> Result<Qid, CodecError> {
    let ty = QidType(read_u8(cursor)?);
    let version = read_u32(cursor)?;
    let path = read_u64(cursor)?;
    Ok(Qid { ty, version, path })
}

fn validate_component(component: &str) -> Result<(), CodecError> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.as_bytes().contains(&0)
    {
        return Err(CodecError::InvalidPath);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stat() -> Stat {
        Stat {
            qid: Qid::new(QidType::FILE, 7, 0xfeed),
            mode: 0o555,
            atime: 1_700_000_000,
            mtime: 1_700_000_000,
            length: 42,
            name: "title".to_owned(),
            uid: "nobody".to_owned(),
            gid: "nogroup".to_owned(),
            muid: "nobody".to_owned(),
        }
    }

    #[test]
    fn encode_decode_version_round_trip() {
        let codec = Codec;
        let request = Request {
            tag: NOTAG,
            body: RequestBody::Version {
                msize: MAX_MSIZE,
                version: VERSION.to_string(),
            },
        };
        let encoded = codec.encode_request(&request).unwrap();
        let decoded = codec.decode_request(&encoded).unwrap();
        assert_eq!(request, decoded);
    }

    #[test]
    fn encode_decode_walk_round_trip() {
        let codec = Codec;
        let request = Request {
            tag: 3,
            body: RequestBody::Walk {
                fid: 0,
                newfid: 1,
                wnames: vec!["Feed".to_owned(), "Item".to_owned(), "title".to_owned()],
            },
        };
        let encoded = codec.encode_request(&request).unwrap();
        assert_eq!(request, codec.decode_request(&encoded).unwrap());
    }

    #[test]
    fn encode_decode_stat_round_trip() {
        let codec = Codec;
        let response = Response {
            tag: 9,
            body: ResponseBody::Stat {
                stat: sample_stat(),
            },
        };
        let encoded = codec.encode_response(&response).unwrap();
        assert_eq!(response, codec.decode_response(&encoded).unwrap());
    }

    #[test]
    fn encode_decode_error_round_trip() {
        let codec = Codec;
        let response = Response {
            tag: 4,
            body: ResponseBody::Error {
                ename: "'missing' not found".to_owned(),
            },
        };
        let encoded = codec.encode_response(&response).unwrap();
        assert_eq!(response, codec.decode_response(&encoded).unwrap());
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let codec = Codec;
        let request = Request {
            tag: 2,
            body: RequestBody::Clunk { fid: 1 },
        };
        let mut encoded = codec.encode_request(&request).unwrap();
        encoded[0..4].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            codec.decode_request(&encoded),
            Err(CodecError::LengthMismatch {
                declared: 0,
                actual: encoded.len(),
            })
        );
    }

    #[test]
    fn decode_rejects_dot_dot_component() {
        let codec = Codec;
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0u8; 4]);
        frame.push(110); // Twalk opcode
        frame.extend_from_slice(&7u16.to_le_bytes());
        frame.extend_from_slice(&1u32.to_le_bytes());
        frame.extend_from_slice(&2u32.to_le_bytes());
        frame.extend_from_slice(&1u16.to_le_bytes());
        frame.extend_from_slice(&2u16.to_le_bytes());
        frame.extend_from_slice(b"..");
        let size = frame.len() as u32;
        frame[0..4].copy_from_slice(&size.to_le_bytes());
        assert_eq!(codec.decode_request(&frame), Err(CodecError::InvalidPath));
    }

    #[test]
    fn walk_depth_is_bounded() {
        let codec = Codec;
        let request = Request {
            tag: 1,
            body: RequestBody::Walk {
                fid: 0,
                newfid: 1,
                wnames: (0..MAXWELEM + 1).map(|i| format!("c{i}")).collect(),
            },
        };
        assert_eq!(
            codec.encode_request(&request),
            Err(CodecError::InvalidPath)
        );
    }

    #[test]
    fn decode_request_reports_truncated_payload() {
        let codec = Codec;
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0u8; 4]);
        frame.push(116); // Tread opcode
        frame.extend_from_slice(&1u16.to_le_bytes()); // tag
        frame.extend_from_slice(&1u32.to_le_bytes()); // fid
        frame.extend_from_slice(&0u32.to_le_bytes()); // half of the offset
        let size = frame.len() as u32;
        frame[0..4].copy_from_slice(&size.to_le_bytes());
        assert_eq!(codec.decode_request(&frame), Err(CodecError::Truncated));
    }

    #[test]
    fn open_mode_write_detection() {
        assert!(!OpenMode::read_only().allows_write());
        assert!(OpenMode::write_only().allows_write());
        assert!(OpenMode::from_bits(0x10).unwrap().allows_write());
        assert_eq!(
            OpenMode::from_bits(0x20),
            Err(CodecError::InvalidOpenMode(0x20))
        );
    }
}
