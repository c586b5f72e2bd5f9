//! Stream reassembler
//!
//! Turns arbitrary TCP chunks into complete, CRC-valid frames. The bridge
//! delivers fragments, merged frames and bus noise, so the parser resyncs on
//! the start byte and drops a single byte whenever a candidate fails.
//! A corrupted length field never stalls the stream: lengths above
//! `MAX_FRAME_LEN` are rejected outright, and an incomplete candidate is
//! abandoned as soon as a complete valid frame is buffered behind it.
//!
//! ```ignore
//! let mut reassembler = Reassembler::new();
//! for frame in reassembler.push(&chunk) {
//!     handle(frame);
//! }
//! ```

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::constants::{FRAME_OVERHEAD, HEADER_LEN, MAX_FRAME_LEN, START_BYTE, STOP_BYTE};
use crate::crc::crc16;
use crate::frame::{self, Frame};

/// Parser state between pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for 0x68
    SeekStart,
    /// Start byte and length seen, waiting for `total_len` bytes
    HaveHeader { total_len: usize },
}

/// Diagnostic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    pub frames: u64,
    /// Bytes skipped while seeking a start byte
    pub noise_bytes: u64,
    /// Candidates dropped for bad CRC, stop byte or length
    pub rejected: u64,
}

/// Stateful frame extractor
#[derive(Debug)]
pub struct Reassembler {
    buffer: BytesMut,
    state: State,
    stats: ReassemblerStats,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(2048),
            state: State::SeekStart,
            stats: ReassemblerStats::default(),
        }
    }

    /// Append a chunk and return every frame that is now complete
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one() {
            frames.push(frame);
        }
        frames
    }

    fn try_extract_one(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                State::SeekStart => {
                    match self.buffer.iter().position(|&b| b == START_BYTE) {
                        None => {
                            self.stats.noise_bytes += self.buffer.len() as u64;
                            self.buffer.clear();
                            return None;
                        },
                        Some(offset) if offset > 0 => {
                            self.stats.noise_bytes += offset as u64;
                            self.buffer.advance(offset);
                        },
                        Some(_) => {},
                    }

                    if self.buffer.len() < 3 {
                        return None;
                    }
                    let Some(total_len) = Self::candidate_len(&self.buffer) else {
                        trace!("Implausible length field, resync");
                        self.stats.rejected += 1;
                        self.buffer.advance(1);
                        continue;
                    };
                    self.state = State::HaveHeader { total_len };
                },
                State::HaveHeader { total_len } => {
                    if self.buffer.len() < total_len {
                        match self.complete_frame_behind() {
                            Some(offset) => {
                                trace!("Incomplete candidate superseded at +{}", offset);
                                self.stats.rejected += 1;
                                self.buffer.advance(offset);
                                self.state = State::SeekStart;
                                continue;
                            },
                            None => return None,
                        }
                    }
                    self.state = State::SeekStart;

                    match Self::validate(&self.buffer[..total_len]) {
                        Some(frame) => {
                            self.buffer.advance(total_len);
                            self.stats.frames += 1;
                            return Some(frame);
                        },
                        None => {
                            trace!("Frame candidate rejected, resync");
                            self.stats.rejected += 1;
                            self.buffer.advance(1);
                        },
                    }
                },
            }
        }
    }

    /// Total frame length announced at the head of `buf`, if plausible
    fn candidate_len(buf: &[u8]) -> Option<usize> {
        let length = usize::from(u16::from_le_bytes([buf[1], buf[2]]));
        let total_len = length + FRAME_OVERHEAD;
        (total_len <= MAX_FRAME_LEN).then_some(total_len)
    }

    /// Offset of a later start byte that opens a complete, valid frame
    fn complete_frame_behind(&self) -> Option<usize> {
        let buf = &self.buffer[..];
        (1..buf.len()).find(|&offset| {
            let rest = &buf[offset..];
            rest[0] == START_BYTE
                && rest.len() >= 3
                && Self::candidate_len(rest)
                    .is_some_and(|len| rest.len() >= len && Self::validate(&rest[..len]).is_some())
        })
    }

    /// Check CRC, stop byte and minimum length of a candidate
    fn validate(candidate: &[u8]) -> Option<Frame> {
        let total_len = candidate.len();
        if total_len < HEADER_LEN + FRAME_OVERHEAD {
            return None;
        }
        if candidate[total_len - 1] != STOP_BYTE {
            return None;
        }
        let crc_pos = total_len - 3;
        let received = u16::from_be_bytes([candidate[crc_pos], candidate[crc_pos + 1]]);
        if crc16(&candidate[1..crc_pos]) != received {
            return None;
        }
        frame::decode(&candidate[3..crc_pos]).ok()
    }

    /// Drop buffered bytes and reset state
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::SeekStart;
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }
}
