//! Mapper Trait Definition.
//!
//! This module defines the core `Mapper` trait that all NES cartridge mappers
//! must implement. Mappers handle memory banking for PRG-ROM, CHR-ROM/RAM,
//! and provide mirroring control.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Nametable mirroring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mirroring {
    /// Horizontal mirroring (vertical arrangement).
    #[default]
    Horizontal,
    /// Vertical mirroring (horizontal arrangement).
    Vertical,
    /// Single-screen, lower bank.
    SingleScreenLower,
    /// Single-screen, upper bank.
    SingleScreenUpper,
    /// Four-screen (uses extra VRAM).
    FourScreen,
}

impl Mirroring {
    /// Reconstructs a `Mirroring` from the discriminant byte written by
    /// `as u8` in a mapper's `save_state`.
    #[must_use]
    pub(crate) fn from_index(v: u8) -> Self {
        match v {
            1 => Mirroring::Vertical,
            2 => Mirroring::SingleScreenLower,
            3 => Mirroring::SingleScreenUpper,
            4 => Mirroring::FourScreen,
            _ => Mirroring::Horizontal,
        }
    }
}

/// Reads one byte from the front of `data`, advancing it. Returns `0` if
/// `data` is exhausted rather than panicking on a truncated save state.
///
/// Shared by every mapper's `save_state`/`load_state` implementation,
/// since they all live in this crate and serialize the same way.
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

pub(crate) fn take_bool(data: &mut &[u8]) -> bool {
    take_u8(data) != 0
}

/// Mapper trait.
///
/// All NES cartridge mappers must implement this trait. The mapper handles:
/// - PRG-ROM/RAM memory access (CPU $8000-$FFFF, optionally $6000-$7FFF)
/// - CHR-ROM/RAM memory access (PPU $0000-$1FFF)
/// - Nametable mirroring control
/// - Optional IRQ generation
/// - Optional scanline counting
pub trait Mapper: Send + Sync {
    /// Read a byte from PRG memory (CPU address space).
    ///
    /// Address range: $6000-$FFFF
    /// - $6000-$7FFF: PRG-RAM (battery-backed or work RAM)
    /// - $8000-$FFFF: PRG-ROM (banked)
    fn read_prg(&self, addr: u16) -> u8;

    /// Write a byte to PRG memory (CPU address space).
    ///
    /// Address range: $6000-$FFFF
    /// - $6000-$7FFF: PRG-RAM writes (if present)
    /// - $8000-$FFFF: Mapper register writes
    fn write_prg(&mut self, addr: u16, val: u8);

    /// Read a byte from CHR memory (PPU address space).
    ///
    /// Address range: $0000-$1FFF
    fn read_chr(&self, addr: u16) -> u8;

    /// Write a byte to CHR memory (PPU address space).
    ///
    /// Only works if the cartridge has CHR-RAM instead of CHR-ROM.
    fn write_chr(&mut self, addr: u16, val: u8);

    /// Get the current nametable mirroring mode.
    fn mirroring(&self) -> Mirroring;

    /// Check if the mapper has a pending IRQ.
    fn irq_pending(&self) -> bool {
        false
    }

    /// Acknowledge/clear the IRQ.
    fn irq_acknowledge(&mut self) {}

    /// Clock the mapper (called every CPU cycle).
    ///
    /// Some mappers (like MMC3) count CPU cycles for IRQ timing.
    fn clock(&mut self, _cycles: u8) {}

    /// Notify the mapper of a scanline (called every PPU scanline).
    ///
    /// Some mappers (like MMC3) count scanlines for IRQ timing.
    fn scanline(&mut self) {}

    /// Notify the mapper of PPU A12 rising edge.
    ///
    /// MMC3 uses A12 for IRQ timing.
    fn ppu_a12_rising(&mut self) {}

    /// Get the mapper number (iNES mapper ID).
    fn mapper_number(&self) -> u16;

    /// Get the mapper name.
    fn mapper_name(&self) -> &'static str;

    /// Check if the mapper has battery-backed RAM.
    fn has_battery(&self) -> bool {
        false
    }

    /// Get a reference to the battery-backed RAM for saving.
    fn battery_ram(&self) -> Option<&[u8]> {
        None
    }

    /// Set the battery-backed RAM content (for loading saves).
    fn set_battery_ram(&mut self, _data: &[u8]) {}

    /// Reset the mapper to its initial state.
    fn reset(&mut self) {}

    /// Batched CPU-cycle notification.
    ///
    /// Mappers with CPU-cycle-driven counters (FME-7, VRC, Namco 163,
    /// Bandai FCG) process all `count` cycles in one call instead of
    /// being ticked one at a time.
    fn cpu_cycles(&mut self, _count: u32) {}

    /// Notify the mapper of a PPU address bus value.
    ///
    /// Called on every PPU memory read. This is the primary A12 signal
    /// for MMC3 and the nametable-repetition signal MMC5 uses for its
    /// scanline counter.
    fn notify_ppu_address_bus(&mut self, _addr: u16) {}

    /// Notify the mapper that the PPU wrapped from one frame to the next.
    fn notify_frame_start(&mut self) {}

    /// Sample the mapper's expansion audio output, in `[-1.0, 1.0]`.
    ///
    /// Mappers with no expansion audio hardware return 0.0.
    fn get_audio_output(&self) -> f32 {
        0.0
    }

    /// Check whether the mapper owns non-PRG-RAM save data (e.g. an
    /// I2C EEPROM).
    fn has_mapper_save_data(&self) -> bool {
        false
    }

    /// Get the mapper's own save data, distinct from PRG RAM.
    fn get_mapper_save_data(&self) -> Option<&[u8]> {
        None
    }

    /// Load the mapper's own save data, distinct from PRG RAM.
    fn set_mapper_save_data(&mut self, _data: &[u8]) {}

    /// Append this mapper's internal register/IRQ-counter state to a
    /// save-state buffer.
    ///
    /// Distinct from [`Mapper::get_mapper_save_data`]: that hook is for
    /// persistent non-volatile storage (EEPROM, etc) saved alongside the
    /// ROM; this one is transient emulator state (bank registers, IRQ
    /// counters, shift registers, CHR-RAM content) that only needs to
    /// survive a save state, not a power cycle. Every mapper in this
    /// crate overrides this; the default exists only as a fallback for
    /// a future mapper that genuinely has nothing to save.
    fn save_state(&self, _buf: &mut Vec<u8>) {}

    /// Restore state written by [`Mapper::save_state`].
    ///
    /// `data` is advanced past whatever bytes this mapper consumes;
    /// implementations should tolerate a truncated slice by defaulting
    /// rather than panicking, matching every other component's
    /// `load_state`.
    fn load_state(&mut self, _data: &mut &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirroring_default() {
        let mirroring = Mirroring::default();
        assert_eq!(mirroring, Mirroring::Horizontal);
    }
}
