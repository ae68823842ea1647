pub const PACKET_SIZE: usize = 64;

/// Payload bytes carried by an initialization packet (4-byte cid, command
/// byte, 2-byte bcnt).
pub const INIT_PAYLOAD_SIZE: usize = PACKET_SIZE - 7;

/// Payload bytes carried by a continuation packet (4-byte cid, sequence
/// byte).
pub const CONT_PAYLOAD_SIZE: usize = PACKET_SIZE - 5;

// 7609 bytes
/// The theoretical maximal message size: one initialization packet plus
/// 128 continuation packets (sequence numbers 0..=127).
pub const THEORETICAL_MAX_MESSAGE_SIZE: usize = INIT_PAYLOAD_SIZE + 128 * CONT_PAYLOAD_SIZE;
