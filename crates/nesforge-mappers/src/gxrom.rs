//! GxROM Mapper (Mapper 66).
//!
//! A simple mapper with PRG-ROM and CHR-ROM banking.
//! Used by games like Super Mario Bros. + Duck Hunt, Gumshoe, and Dragon Power.
//!
//! Memory layout:
//! - PRG-ROM: 32KB switchable bank at $8000-$FFFF
//! - CHR-ROM: 8KB switchable bank at PPU $0000-$1FFF
//! - No PRG-RAM
//!
//! Bank selection: Write to $8000-$FFFF
//! - Bits 0-1: Select 8KB CHR bank
//! - Bits 4-5: Select 32KB PRG bank

use crate::mapper::{Mapper, Mirroring};
use crate::rom::Rom;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// GxROM mapper implementation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gxrom {
    /// PRG-ROM data.
    prg_rom: Vec<u8>,
    /// CHR-ROM/RAM data.
    chr: Vec<u8>,
    /// Whether CHR is RAM (writable).
    chr_is_ram: bool,
    /// Number of PRG-ROM banks (32KB each).
    prg_banks: usize,
    /// Number of CHR banks (8KB each).
    chr_banks: usize,
    /// Currently selected PRG bank.
    prg_bank: u8,
    /// Currently selected CHR bank.
    chr_bank: u8,
    /// Nametable mirroring mode.
    mirroring: Mirroring,
}

impl Gxrom {
    /// Create a new GxROM mapper from ROM data.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let prg_banks = rom.prg_rom.len() / 32768;
        let chr_is_ram = rom.chr_rom.is_empty();
        let chr = if chr_is_ram {
            vec![0u8; 8192]
        } else {
            rom.chr_rom.clone()
        };
        let chr_banks = if chr_is_ram { 1 } else { chr.len() / 8192 };

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr,
            chr_is_ram,
            prg_banks: prg_banks.max(1),
            chr_banks: chr_banks.max(1),
            prg_bank: 0,
            chr_bank: 0,
            mirroring: rom.header.mirroring,
        }
    }
}

impl Mapper for Gxrom {
    fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => {
                // No PRG-RAM
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
            // Bits 0-1: CHR bank select
            self.chr_bank = val & 0x03;
            // Bits 4-5: PRG bank select
            self.prg_bank = (val >> 4) & 0x03;
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        let bank = (self.chr_bank as usize) % self.chr_banks;
        let offset = (addr & 0x1FFF) as usize;
        self.chr.get(bank * 8192 + offset).copied().unwrap_or(0)
    }

    fn write_chr(&mut self, addr: u16, val: u8) {
        if self.chr_is_ram {
            let offset = (addr & 0x1FFF) as usize;
            if let Some(byte) = self.chr.get_mut(offset) {
                *byte = val;
            }
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        66
    }

    fn mapper_name(&self) -> &'static str {
        "GxROM"
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_bank = 0;
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        buf.push(self.prg_bank);
        buf.push(self.chr_bank);
        if self.chr_is_ram {
            buf.extend_from_slice(&self.chr);
        }
    }

    fn load_state(&mut self, data: &mut &[u8]) {
        self.prg_bank = crate::mapper::take_u8(data);
        self.chr_bank = crate::mapper::take_u8(data);
        if self.chr_is_ram {
            let len = self.chr.len();
            let take = len.min(data.len());
            self.chr[..take].copy_from_slice(&data[..take]);
            for byte in self.chr[take..].iter_mut() {
                *byte = 0;
            }
            *data = &data[take..];
        }
    }
}
