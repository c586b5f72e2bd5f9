//! ecoNET wire constants

/// Frame start delimiter
pub const START_BYTE: u8 = 0x68;
/// Frame stop delimiter
pub const STOP_BYTE: u8 = 0x16;

/// Read parameter request
pub const FUNC_READ: u8 = 0x43;
/// Write (force) parameter request
pub const FUNC_WRITE: u8 = 0x29;
/// Set on the function code of every response
pub const RESPONSE_FLAG: u8 = 0x80;

/// dest(2) + src(2) + func(1)
pub const HEADER_LEN: usize = 5;
/// start(1) + length(2) + crc(2) + stop(1)
pub const FRAME_OVERHEAD: usize = 6;
/// Largest plausible frame on the wire, start to stop byte
pub const MAX_FRAME_LEN: usize = 1024;
/// Largest payload that still fits in `MAX_FRAME_LEN`
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - FRAME_OVERHEAD - HEADER_LEN;

/// Default TCP port of the ecoNET module
pub const DEFAULT_PORT: u16 = 8899;
/// Controller address
pub const DEFAULT_DEST_ADDRESS: u16 = 1;
/// Our address on the bus
pub const DEFAULT_SOURCE_ADDRESS: u16 = 100;

/// Offset of the value inside a read response payload
pub const READ_DATA_OFFSET: usize = 7;
/// Marker byte preceding the parameter id in write requests
pub const FORCE_WRITE_MARKER: u8 = 0x01;

pub const SESSION_INITIAL: u16 = 10;
pub const SESSION_MODULUS: u16 = 65000;
/// Response session accepted for any request
pub const SESSION_WILDCARD: u16 = 0;

/// Socket read slice size
pub const RECV_CHUNK_SIZE: usize = 1024;

/// Placeholder the controller reports for absent sensors
pub const SENTINEL_VALUE: f64 = 999.0;
