//! CNROM Mapper (Mapper 3).
//!
//! A simple mapper with switchable CHR-ROM banking. Used by games like
//! Gradius, Solomon's Key, and Arkanoid.
//!
//! Memory layout:
//! - PRG-ROM: 16KB or 32KB, not switchable
//! - CHR-ROM: 8KB banks, switchable via writes to $8000-$FFFF
//! - No PRG-RAM
//!
//! Bank selection: Write to $8000-$FFFF selects CHR bank

use crate::mapper::{Mapper, Mirroring};
use crate::rom::Rom;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// CNROM mapper implementation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cnrom {
    /// PRG-ROM data.
    prg_rom: Vec<u8>,
    /// CHR-ROM data.
    chr_rom: Vec<u8>,
    /// PRG-ROM size.
    prg_size: usize,
    /// Number of CHR-ROM banks (8KB each).
    chr_banks: usize,
    /// Currently selected CHR bank.
    chr_bank: u8,
    /// Nametable mirroring mode.
    mirroring: Mirroring,
}

impl Cnrom {
    /// Create a new CNROM mapper from ROM data.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let prg_size = rom.prg_rom.len();
        let chr_banks = (rom.chr_rom.len() / 8192).max(1);

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_rom: if rom.chr_rom.is_empty() {
                vec![0u8; 8192] // CHR-RAM fallback
            } else {
                rom.chr_rom.clone()
            },
            prg_size,
            chr_banks,
            chr_bank: 0,
            mirroring: rom.header.mirroring,
        }
    }
}

impl Mapper for Cnrom {
    fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => {
                // No PRG-RAM on CNROM
                0
            }
            0x8000..=0xFFFF => {
                // Mirror 16KB PRG-ROM if only 16KB
                let offset = (addr - 0x8000) as usize;
                let masked = if self.prg_size <= 16384 {
                    offset & 0x3FFF // Mirror 16KB
                } else {
                    offset // Full 32KB
                };
                self.prg_rom.get(masked).copied().unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn write_prg(&mut self, addr: u16, val: u8) {
        if (0x8000..=0xFFFF).contains(&addr) {
            // CHR bank select - uses bits 0-1 (or more for larger CHR)
            self.chr_bank = val & 0x03;
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        let bank = (self.chr_bank as usize) % self.chr_banks;
        let offset = (addr & 0x1FFF) as usize;
        self.chr_rom.get(bank * 8192 + offset).copied().unwrap_or(0)
    }

    fn write_chr(&mut self, _addr: u16, _val: u8) {
        // CNROM has CHR-ROM, not writable
        // (Unless it has CHR-RAM, but standard CNROM doesn't)
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        3
    }

    fn mapper_name(&self) -> &'static str {
        "CNROM"
    }

    fn reset(&mut self) {
        self.chr_bank = 0;
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        buf.push(self.chr_bank);
        buf.push(self.mirroring as u8);
    }

    fn load_state(&mut self, data: &mut &[u8]) {
        self.chr_bank = crate::mapper::take_u8(data);
        self.mirroring = Mirroring::from_index(crate::mapper::take_u8(data));
    }
}
