#![no_main]

use ctap_core::ctaphid::Framer;
use ctap_core::sizes::PACKET_SIZE;
use libfuzzer_sys::fuzz_target;
use rand_core::{CryptoRng, RngCore};

struct XorShiftRng(u64);

impl RngCore for XorShiftRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

// not cryptographically strong; the fuzz harness only exercises state
// transitions
impl CryptoRng for XorShiftRng {}

fuzz_target!(|data: &[u8]| {
    let mut now = 0u64;
    let clock = move || {
        now += 1;
        now
    };
    let mut framer = Framer::new(clock, XorShiftRng(0x9E3779B97F4A7C15));
    for packet in data.chunks(PACKET_SIZE) {
        framer.handle(packet);
    }
});
