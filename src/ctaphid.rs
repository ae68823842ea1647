//! CTAPHID transport framing.
//!
//! Reassembles 64-byte HID report frames into CTAPHID messages and splits
//! outbound messages back into frames. A [`Framer`] owns the channel
//! allocation table and the single in-progress reassembly. Framing errors
//! never surface as Rust errors: they are converted to on-the-wire
//! CTAPHID_ERROR messages and the state machine resets to idle, so the
//! framer survives arbitrary inbound garbage.

use alloc::vec::Vec;

use bitflags::bitflags;
use rand_core::{CryptoRng, RngCore};

use crate::sizes::{
    CONT_PAYLOAD_SIZE, INIT_PAYLOAD_SIZE, PACKET_SIZE, THEORETICAL_MAX_MESSAGE_SIZE,
};

/// Inter-packet timeout for an in-progress reassembly.
pub const MESSAGE_TIMEOUT_MILLIS: u64 = 250;

/// CTAPHID protocol version reported in INIT responses.
pub const PROTOCOL_VERSION: u8 = 2;

/// Nonce length of an INIT request, and therefore its exact `bcnt`.
pub const INIT_NONCE_SIZE: usize = 8;

const FRAME_INIT: u8 = 0x80;

/// A logical conversation identifier, big-endian on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelId(pub [u8; 4]);

impl ChannelId {
    /// The broadcast channel, only ever used to request an allocation.
    pub const BROADCAST: Self = Self([0xff; 4]);
    /// Reserved by the transport, never allocated.
    const RESERVED: Self = Self([0; 4]);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

/// CTAPHID commands (the low 7 bits of byte 4 of an initialization
/// packet).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Ping,
    Msg,
    Lock,
    Init,
    Wink,
    Cbor,
    Cancel,
    /// Outbound only.
    Keepalive,
    /// Outbound only; 1-byte payload carries an [`ErrorCode`].
    Error,
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        use Command::*;
        match command {
            Ping => 0x01,
            Msg => 0x03,
            Lock => 0x04,
            Init => 0x06,
            Wink => 0x08,
            Cbor => 0x10,
            Cancel => 0x11,
            Keepalive => 0x3b,
            Error => 0x3f,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ();

    fn try_from(from: u8) -> Result<Command, ()> {
        use Command::*;
        Ok(match from {
            0x01 => Ping,
            0x03 => Msg,
            0x04 => Lock,
            0x06 => Init,
            0x08 => Wink,
            0x10 => Cbor,
            0x11 => Cancel,
            0x3b => Keepalive,
            0x3f => Error,
            _ => return Err(()),
        })
    }
}

/// CTAPHID error bytes, carried as the single payload byte of an ERROR
/// message.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    InvalidCmd = 0x01,
    InvalidPar = 0x02,
    InvalidLen = 0x03,
    InvalidSeq = 0x04,
    MsgTimeout = 0x05,
    ChannelBusy = 0x06,
    LockRequired = 0x0A,
    InvalidChannel = 0x0B,
    Other = 0x7F,
}

bitflags! {
    /// Capability byte of an INIT response.
    pub struct Capabilities: u8 {
        const WINK = 1 << 0;
        const CBOR = 1 << 2;
        /// Set when the device does not support CTAP1 MSG.
        const NMSG = 1 << 3;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::WINK | Capabilities::CBOR | Capabilities::NMSG
    }
}

/// Device version triple reported in INIT responses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeviceVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
}

impl Default for DeviceVersion {
    fn default() -> Self {
        Self {
            major: 0xCA,
            minor: 0xFE,
            build: 0x01,
        }
    }
}

/// Keepalive status byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeepaliveStatus {
    Processing = 1,
    UserPresenceNeeded = 2,
}

/// Time source for the reassembly timeout.
///
/// Injected so tests can drive timeout scenarios without sleeping. Any
/// monotonic millisecond counter will do; the framer only ever computes
/// differences.
pub trait Clock {
    fn uptime_millis(&mut self) -> u64;
}

impl<F: FnMut() -> u64> Clock for F {
    fn uptime_millis(&mut self) -> u64 {
        self()
    }
}

#[cfg(feature = "std")]
pub struct SystemClock(std::time::Instant);

#[cfg(feature = "std")]
impl SystemClock {
    pub fn new() -> Self {
        Self(std::time::Instant::now())
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn uptime_millis(&mut self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

/// A fully reassembled CTAPHID message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub cid: ChannelId,
    pub cmd: Command,
    pub payload: Vec<u8>,
}

/// Outcome of feeding one inbound packet to [`Framer::handle`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Handled {
    /// More continuation packets are needed.
    InProgress,
    /// A message completed. Framing errors are delivered here too, as
    /// messages with `cmd == Command::Error` ready for emission.
    Complete(Message),
}

struct Assembly {
    cid: ChannelId,
    cmd: u8,
    bcnt: usize,
    received: Vec<u8>,
    seq_last: Option<u8>,
    begin: u64,
}

/// The CTAPHID reassembly state machine.
///
/// Not thread-safe; one instance per HID interface, accessed by one
/// thread at a time. Allocated channels live for the instance lifetime.
pub struct Framer<C, R> {
    clock: C,
    rng: R,
    version: DeviceVersion,
    capabilities: Capabilities,
    channels: Vec<ChannelId>,
    assembly: Option<Assembly>,
}

impl<C: Clock, R: RngCore + CryptoRng> Framer<C, R> {
    pub fn new(clock: C, rng: R) -> Self {
        Self {
            clock,
            rng,
            version: DeviceVersion::default(),
            capabilities: Capabilities::default(),
            channels: Vec::new(),
            assembly: None,
        }
    }

    pub fn set_device_version(&mut self, version: DeviceVersion) {
        self.version = version;
    }

    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    /// Whether `cid` has been allocated on this instance.
    pub fn is_valid(&self, cid: ChannelId) -> bool {
        self.channels.contains(&cid)
    }

    pub fn is_broadcast(cid: ChannelId) -> bool {
        cid.is_broadcast()
    }

    /// Feed one inbound 64-byte report frame.
    pub fn handle(&mut self, packet: &[u8]) -> Handled {
        let now = self.clock.uptime_millis();
        if let Some(assembly) = &self.assembly {
            if now.saturating_sub(assembly.begin) > MESSAGE_TIMEOUT_MILLIS {
                debug_now!("reassembly on {:?} timed out", assembly.cid);
                self.assembly = None;
            }
        }
        match self.assembly.take() {
            None => self.handle_initial(packet, now),
            Some(assembly) => self.handle_continuation(assembly, packet),
        }
    }

    fn handle_initial(&mut self, packet: &[u8], now: u64) -> Handled {
        if packet.len() < 7 {
            return self.error(ChannelId::BROADCAST, ErrorCode::Other);
        }
        let cid = ChannelId([packet[0], packet[1], packet[2], packet[3]]);
        if packet[4] & FRAME_INIT == 0 {
            // continuation packet with nothing to continue
            return self.error(cid, ErrorCode::InvalidCmd);
        }
        let cmd = packet[4] & !FRAME_INIT;
        let bcnt = u16::from_be_bytes([packet[5], packet[6]]) as usize;
        if !cid.is_broadcast() && !self.is_valid(cid) {
            return self.error(cid, ErrorCode::InvalidChannel);
        }
        if bcnt > THEORETICAL_MAX_MESSAGE_SIZE {
            // can never complete within 128 continuations
            return self.error(cid, ErrorCode::InvalidLen);
        }
        let tail = &packet[7..];
        let mut received = Vec::with_capacity(bcnt);
        received.extend_from_slice(&tail[..tail.len().min(bcnt)]);
        if received.len() >= bcnt {
            return self.finish(cid, cmd, received);
        }
        self.assembly = Some(Assembly {
            cid,
            cmd,
            bcnt,
            received,
            seq_last: None,
            begin: now,
        });
        Handled::InProgress
    }

    fn handle_continuation(&mut self, mut assembly: Assembly, packet: &[u8]) -> Handled {
        if packet.len() < 5 {
            return self.error(assembly.cid, ErrorCode::Other);
        }
        if packet[4] & FRAME_INIT != 0 {
            return self.error(assembly.cid, ErrorCode::InvalidCmd);
        }
        if packet[..4] != assembly.cid.0 {
            return self.error(assembly.cid, ErrorCode::ChannelBusy);
        }
        let seq = packet[4];
        let expected = assembly.seq_last.map_or(0, |last| last + 1);
        if seq != expected {
            return self.error(assembly.cid, ErrorCode::InvalidSeq);
        }
        assembly.seq_last = Some(seq);
        // surplus bytes in the final frame are padding
        let missing = assembly.bcnt - assembly.received.len();
        let tail = &packet[5..];
        assembly
            .received
            .extend_from_slice(&tail[..tail.len().min(missing)]);
        if assembly.received.len() >= assembly.bcnt {
            let Assembly {
                cid, cmd, received, ..
            } = assembly;
            return self.finish(cid, cmd, received);
        }
        self.assembly = Some(assembly);
        Handled::InProgress
    }

    fn finish(&mut self, cid: ChannelId, cmd: u8, payload: Vec<u8>) -> Handled {
        self.assembly = None;
        let cmd = match Command::try_from(cmd) {
            Ok(cmd) => cmd,
            Err(()) => return self.error(cid, ErrorCode::InvalidCmd),
        };
        match cmd {
            Command::Init => self.init(cid, &payload),
            // outbound-only commands are invalid inbound
            Command::Keepalive | Command::Error => self.error(cid, ErrorCode::InvalidCmd),
            _ => {
                if cid.is_broadcast() || !self.is_valid(cid) {
                    return self.error(cid, ErrorCode::InvalidChannel);
                }
                debug_now!("completed {:?} on {:?}, {} bytes", cmd, cid, payload.len());
                Handled::Complete(Message { cid, cmd, payload })
            }
        }
    }

    /// Build the 17-byte INIT response: nonce echo, channel id, protocol
    /// version, device version, capability flags.
    fn init(&mut self, cid: ChannelId, payload: &[u8]) -> Handled {
        if payload.len() != INIT_NONCE_SIZE {
            return self.error(cid, ErrorCode::InvalidLen);
        }
        let channel = if cid.is_broadcast() {
            self.allocate_channel()
        } else {
            cid
        };
        let mut response = Vec::with_capacity(INIT_NONCE_SIZE + 9);
        response.extend_from_slice(payload);
        response.extend_from_slice(&channel.0);
        response.push(PROTOCOL_VERSION);
        response.push(self.version.major);
        response.push(self.version.minor);
        response.push(self.version.build);
        response.push(self.capabilities.bits());
        Handled::Complete(Message {
            cid,
            cmd: Command::Init,
            payload: response,
        })
    }

    fn allocate_channel(&mut self) -> ChannelId {
        loop {
            let mut cid = [0u8; 4];
            self.rng.fill_bytes(&mut cid);
            let cid = ChannelId(cid);
            if cid.is_broadcast() || cid == ChannelId::RESERVED || self.is_valid(cid) {
                continue;
            }
            info!("allocated channel {:?}", cid);
            self.channels.push(cid);
            return cid;
        }
    }

    /// Convert a framing error into a deliverable ERROR message and
    /// reset to idle. Every error path funnels through here so no path
    /// can forget the reset.
    fn error(&mut self, cid: ChannelId, code: ErrorCode) -> Handled {
        debug_now!("framing error {:?} on {:?}", code, cid);
        self.assembly = None;
        Handled::Complete(Message {
            cid,
            cmd: Command::Error,
            payload: alloc::vec![code as u8],
        })
    }
}

/// Split an outbound message into 64-byte frames: one initialization
/// packet, then continuations in ascending sequence order. Always yields
/// at least one frame, each exactly [`PACKET_SIZE`] bytes, zero-padded.
pub fn emit(cmd: Command, cid: ChannelId, payload: &[u8]) -> Packets<'_> {
    debug_assert!(payload.len() <= THEORETICAL_MAX_MESSAGE_SIZE);
    Packets {
        cmd,
        cid,
        payload,
        offset: 0,
        seq: 0,
        started: false,
    }
}

/// Build the single outbound KEEPALIVE frame for a long-running request.
pub fn keepalive(cid: ChannelId, status: KeepaliveStatus) -> [u8; PACKET_SIZE] {
    let mut frame = [0u8; PACKET_SIZE];
    frame[..4].copy_from_slice(&cid.0);
    frame[4] = FRAME_INIT | u8::from(Command::Keepalive);
    frame[5..7].copy_from_slice(&1u16.to_be_bytes());
    frame[7] = status as u8;
    frame
}

/// Iterator over the frames of one outbound message. See [`emit`].
pub struct Packets<'a> {
    cmd: Command,
    cid: ChannelId,
    payload: &'a [u8],
    offset: usize,
    seq: u8,
    started: bool,
}

impl Iterator for Packets<'_> {
    type Item = [u8; PACKET_SIZE];

    fn next(&mut self) -> Option<[u8; PACKET_SIZE]> {
        let mut frame = [0u8; PACKET_SIZE];
        frame[..4].copy_from_slice(&self.cid.0);
        if !self.started {
            self.started = true;
            frame[4] = FRAME_INIT | u8::from(self.cmd);
            frame[5..7].copy_from_slice(&(self.payload.len() as u16).to_be_bytes());
            let chunk = self.payload.len().min(INIT_PAYLOAD_SIZE);
            frame[7..7 + chunk].copy_from_slice(&self.payload[..chunk]);
            self.offset = chunk;
            Some(frame)
        } else if self.offset < self.payload.len() {
            frame[4] = self.seq;
            let chunk = (self.payload.len() - self.offset).min(CONT_PAYLOAD_SIZE);
            frame[5..5 + chunk]
                .copy_from_slice(&self.payload[self.offset..self.offset + chunk]);
            self.offset += chunk;
            self.seq += 1;
            Some(frame)
        } else {
            None
        }
    }
}
