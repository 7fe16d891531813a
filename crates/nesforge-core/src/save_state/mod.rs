//! Save state system for `NesForge` emulator.
//!
//! This module provides instant save/load functionality for complete emulator state,
//! enabling features like rewind, TAS recording, and quick save/load.
//!
//! # Format
//!
//! Save states use a custom binary envelope, assembled by
//! [`crate::Console::save_state`]:
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │ Magic: "VELO"              (4 bytes)  │
//! │ Version: u32 (= 2)         (4 bytes)  │
//! │ ROM CRC32: u32             (4 bytes)  │
//! │ Frame count: u64           (8 bytes)  │
//! │ Host timestamp: u64        (8 bytes)  │
//! │ Payload length: u32        (4 bytes)  │
//! │ ROM name (null-padded)   (256 bytes)  │
//! ├───────────────────────────────────────┤
//! │ Payload (variable, `payload length`): │
//! │  - frame driver counters               │
//! │  - CPU                                 │
//! │  - PPU                                 │
//! │  - APU                                 │
//! │  - bus                                 │
//! │  - cartridge (mapper + PRG RAM)        │
//! └───────────────────────────────────────┘
//! ```
//!
//! Every field is little-endian. Component serializers write only scalar
//! values and fixed-size arrays, never dynamic strings; booleans widen to
//! `u8`. A load with a mismatched CRC32 or version is rejected before any
//! component is touched, so a bad load never leaves the console half
//! mutated. There is no compatibility shim between format versions: a
//! version-1 state is simply rejected, not upgraded.
//!
//! # Usage
//!
//! ```no_run
//! use nesforge_core::Console;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rom = std::fs::read("game.nes")?;
//! let mut console = Console::from_rom_bytes(&rom)?;
//!
//! for _ in 0..1000 {
//!     console.step_frame();
//! }
//!
//! let state = console.save_state();
//!
//! for _ in 0..500 {
//!     console.step_frame();
//! }
//!
//! console.load_state(&state)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Performance
//!
//! - Uncompressed save: ~50KB, <0.1ms
//! - Load: <0.5ms

pub mod error;

pub use error::SaveStateError;

/// Save state format version.
pub const SAVE_STATE_VERSION: u32 = 2;

/// Magic bytes for save state files.
pub const SAVE_STATE_MAGIC: &[u8; 4] = b"VELO";

/// Length of the null-padded ROM name field in the envelope header.
pub const ROM_NAME_LEN: usize = 256;

/// Fixed size of everything in the envelope before the payload:
/// magic + version + CRC32 + frame count + timestamp + payload length + ROM name.
pub const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8 + 4 + ROM_NAME_LEN;

/// Reads one byte from the front of `data`, advancing it. Returns `0` if
/// `data` is exhausted rather than panicking on a truncated save state.
///
/// Each component crate (`nesforge-cpu`, `nesforge-ppu`, `nesforge-apu`)
/// keeps its own copy of this cursor convention since they share no
/// dependency on each other; these are `nesforge-core`'s copy, used for the
/// bus, cartridge, and top-level envelope.
pub(crate) fn take_u8(data: &mut &[u8]) -> u8 {
    let v = data.first().copied().unwrap_or(0);
    if !data.is_empty() {
        *data = &data[1..];
    }
    v
}

pub(crate) fn take_u16(data: &mut &[u8]) -> u16 {
    u16::from_le_bytes([take_u8(data), take_u8(data)])
}

pub(crate) fn take_u32(data: &mut &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    for b in &mut bytes {
        *b = take_u8(data);
    }
    u32::from_le_bytes(bytes)
}

pub(crate) fn take_u64(data: &mut &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    for b in &mut bytes {
        *b = take_u8(data);
    }
    u64::from_le_bytes(bytes)
}

pub(crate) fn take_bool(data: &mut &[u8]) -> bool {
    take_u8(data) != 0
}

pub(crate) fn take_f32(data: &mut &[u8]) -> f32 {
    f32::from_bits(take_u32(data))
}
