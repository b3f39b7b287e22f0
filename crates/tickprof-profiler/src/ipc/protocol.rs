//! Wire protocol for report IPC.
//!
//! Every message is a little-endian `u32` length followed by that many bytes
//! of `bincode`.

use std::io::{self, Read};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::events::ProfileReport;

/// Bumped whenever a message layout changes.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest frame a reader accepts.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Sent by the report server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// First frame on every connection.
    Hello { version: u8 },
    /// A finalized profile.
    Report(Box<ProfileReport>),
    /// The server is going away.
    Goodbye,
}

/// Sent by a listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    Hello,
    /// The listener is leaving; the server drops the connection.
    Goodbye,
}

/// Serialize `msg` into a complete frame, header included.
///
/// Payloads larger than [`MAX_FRAME_LEN`] are refused, since no reader
/// would accept them.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, bincode::Error> {
    let mut frame = vec![0u8; HEADER_LEN];
    bincode::serialize_into(&mut frame, msg)?;
    let header = frame_header(frame.len() - HEADER_LEN)?;
    frame[..HEADER_LEN].copy_from_slice(&header);
    Ok(frame)
}

fn frame_header(payload_len: usize) -> Result<[u8; HEADER_LEN], bincode::Error> {
    if payload_len > MAX_FRAME_LEN {
        return Err(Box::new(bincode::ErrorKind::SizeLimit));
    }
    let len = u32::try_from(payload_len).map_err(|_| Box::new(bincode::ErrorKind::SizeLimit))?;
    Ok(len.to_le_bytes())
}

/// Deserialize a frame payload, header already stripped.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(payload)
}

/// Read the header of the next frame and return its payload length.
pub fn read_header<R: Read>(reader: &mut R) -> io::Result<usize> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        ));
    }
    Ok(len)
}

/// Read one complete frame payload, blocking until it arrives.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = read_header(reader)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use tickprof_core::{ProfilerMode, Timestamp};

    use super::*;
    use crate::events::CallSite;
    use crate::tracker::FrameTracker;

    #[test]
    fn header_counts_payload_bytes() {
        let frame = encode(&ClientMessage::Goodbye).unwrap();
        let len = u32::from_le_bytes(frame[..4].try_into().unwrap()) as usize;
        assert_eq!(len, frame.len() - 4);
        assert!(matches!(
            decode::<ClientMessage>(&frame[4..]).unwrap(),
            ClientMessage::Goodbye
        ));
    }

    #[test]
    fn report_survives_the_wire() {
        let mut tracker = FrameTracker::new(true, 4);
        let site = CallSite::method("Repo", "find").with_args(vec!["7".into()]);
        tracker.tick(Timestamp::from_nanos(1), &[CallSite::function("main"), site]);
        tracker.close_last(Timestamp::from_nanos(9));

        let report = ProfileReport {
            mode: ProfilerMode::Trace,
            startup: Timestamp::from_nanos(0),
            shutdown: Timestamp::from_nanos(10),
            execution_time_ns: 10,
            func_execution_time_ns: Some(tracker.total_ns()),
            frames: tracker.into_frames(),
        };

        let encoded = encode(&ServerMessage::Report(Box::new(report.clone()))).unwrap();
        let frame = read_frame(&mut encoded.as_slice()).unwrap();
        match decode::<ServerMessage>(&frame).unwrap() {
            ServerMessage::Report(decoded) => assert_eq!(*decoded, report),
            other => panic!("Wrong message type: {other:?}"),
        }
    }

    #[test]
    fn writer_and_reader_share_the_limit() {
        assert_eq!(frame_header(MAX_FRAME_LEN).unwrap(), (MAX_FRAME_LEN as u32).to_le_bytes());
        assert!(matches!(
            *frame_header(MAX_FRAME_LEN + 1).unwrap_err(),
            bincode::ErrorKind::SizeLimit
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut data = u32::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(&[0; 8]);
        let err = read_frame(&mut data.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
