//! BNROM Mapper (Mapper 34).
//!
//! A simple mapper with 32KB PRG-ROM banking.
//! Used by Deadly Towers, Impossible Mission II, and others.
//!
//! Memory layout:
//! - PRG-ROM: 32KB switchable bank at $8000-$FFFF
//! - CHR-RAM: 8KB at PPU $0000-$1FFF
//! - No PRG-RAM
//!
//! Bank selection: Write to $8000-$FFFF
//! - Bits 0-1: Select 32KB PRG bank

use crate::mapper::{Mapper, Mirroring};
use crate::rom::Rom;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// BNROM mapper implementation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bnrom {
    /// PRG-ROM data.
    prg_rom: Vec<u8>,
    /// CHR-RAM data (8KB).
    chr_ram: Vec<u8>,
    /// Number of PRG-ROM banks (32KB each).
    prg_banks: usize,
    /// Currently selected PRG bank.
    prg_bank: u8,
    /// Nametable mirroring mode.
    mirroring: Mirroring,
}

impl Bnrom {
    /// Create a new BNROM mapper from ROM data.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let prg_banks = rom.prg_rom.len() / 32768;
        let chr_ram = if rom.chr_rom.is_empty() {
            vec![0u8; 8192]
        } else {
            // BNROM typically uses CHR-RAM, but handle CHR-ROM case
            rom.chr_rom.clone()
        };

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_ram,
            prg_banks: prg_banks.max(1),
            prg_bank: 0,
            mirroring: rom.header.mirroring,
        }
    }
}

impl Mapper for Bnrom {
    fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => {
                // No PRG-RAM on BNROM
                0
            }
            0x8000..=0xFFFF => {
                // 32KB switchable bank
                let bank = (self.prg_bank as usize) % self.prg_banks;
                let offset = (addr - 0x8000) as usize;
                self.prg_rom
                    .get(bank * 32768 + offset)
                    .copied()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn write_prg(&mut self, addr: u16, val: u8) {
        if (0x8000..=0xFFFF).contains(&addr) {
            // Standard BNROM uses bits 0-1 for bank select
            // Some variants may use more bits
            self.prg_bank = val & 0x03;
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        let offset = (addr & 0x1FFF) as usize;
        self.chr_ram.get(offset).copied().unwrap_or(0)
    }

    fn write_chr(&mut self, addr: u16, val: u8) {
        // BNROM uses CHR-RAM, always writable
        let offset = (addr & 0x1FFF) as usize;
        if let Some(byte) = self.chr_ram.get_mut(offset) {
            *byte = val;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        34
    }

    fn mapper_name(&self) -> &'static str {
        "BNROM"
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        buf.push(self.prg_bank);
        buf.extend_from_slice(&self.chr_ram);
    }

    fn load_state(&mut self, data: &mut &[u8]) {
        self.prg_bank = crate::mapper::take_u8(data);
        let len = self.chr_ram.len();
        let take = len.min(data.len());
        self.chr_ram[..take].copy_from_slice(&data[..take]);
        for byte in self.chr_ram[take..].iter_mut() {
            *byte = 0;
        }
        *data = &data[take..];
    }
}
