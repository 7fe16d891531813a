//! Mappers 9 (MMC2) and 10 (MMC4)
//!
//! Nintendo's latched-CHR mapper family, built for *Punch-Out!!* (MMC2)
//! and *Fire Emblem* / *Famicom Wars* (MMC4). Each 4KB CHR half has two
//! banks; the active one is selected by a one-bit latch that flips
//! whenever the PPU fetches tile `$FD` or `$FE` from that half. The
//! latch flip happens on the *read*, so `read_chr` must mutate state
//! even though the `Mapper` trait exposes it as `&self` — the latches
//! are `AtomicU8` for that reason.
//!
//! # Hardware Details
//!
//! - **PRG-ROM** (MMC2): one switchable 8KB bank at $8000-$9FFF, three
//!   banks fixed to the last three 8KB banks.
//! - **PRG-ROM** (MMC4): one switchable 16KB bank at $8000-$BFFF, one
//!   bank fixed to the last 16KB bank at $C000-$FFFF.
//! - **CHR-ROM**: two 4KB halves, each latch-switched between two 4KB
//!   banks.
//! - **PRG-RAM**: 8KB, MMC2 only.

use crate::mapper::take_u8;
use crate::{Mapper, Mirroring, Rom};
use core::sync::atomic::{AtomicU8, Ordering};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Which latch-driven board variant this instance emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Mmc2,
    Mmc4,
}

/// MMC2/MMC4 mapper implementation (Mappers 9 and 10).
pub struct Mmc2 {
    variant: Variant,
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    mirroring: Mirroring,

    prg_bank: u8,
    chr_bank_fd0: u8,
    chr_bank_fe0: u8,
    chr_bank_fd1: u8,
    chr_bank_fe1: u8,

    latch0: AtomicU8,
    latch1: AtomicU8,

    prg_banks_8k: usize,
    chr_banks_4k: usize,
}

const LATCH_FD: u8 = 0;
const LATCH_FE: u8 = 1;

impl Mmc2 {
    fn new_variant(rom: &Rom, variant: Variant) -> Self {
        let prg_banks_8k = (rom.prg_rom.len() / 8192).max(1);
        let chr_banks_4k = (rom.chr_rom.len() / 4096).max(2);

        Self {
            variant,
            prg_rom: rom.prg_rom.clone(),
            chr_rom: rom.chr_rom.clone(),
            prg_ram: vec![0; 8192],
            mirroring: rom.header.mirroring,
            prg_bank: 0,
            chr_bank_fd0: 0,
            chr_bank_fe0: 0,
            chr_bank_fd1: 0,
            chr_bank_fe1: 0,
            latch0: AtomicU8::new(LATCH_FE),
            latch1: AtomicU8::new(LATCH_FE),
            prg_banks_8k,
            chr_banks_4k,
        }
    }

    /// Create a new MMC2 mapper (mapper 9) from a ROM.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        Self::new_variant(rom, Variant::Mmc2)
    }

    /// Create a new MMC4 mapper (mapper 10) from a ROM.
    #[must_use]
    pub fn new_mmc4(rom: &Rom) -> Self {
        Self::new_variant(rom, Variant::Mmc4)
    }

    fn update_latch(&self, addr: u16) {
        let tile = addr & 0x0FF8;
        match addr {
            0x0000..=0x0FFF if tile == 0x0FD8 => self.latch0.store(LATCH_FD, Ordering::Relaxed),
            0x0000..=0x0FFF if tile == 0x0FE8 => self.latch0.store(LATCH_FE, Ordering::Relaxed),
            0x1000..=0x1FFF if tile == 0x1FD8 => self.latch1.store(LATCH_FD, Ordering::Relaxed),
            0x1000..=0x1FFF if tile == 0x1FE8 => self.latch1.store(LATCH_FE, Ordering::Relaxed),
            _ => {}
        }
    }

    fn chr_bank(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x0FFF => {
                if self.latch0.load(Ordering::Relaxed) == LATCH_FD {
                    self.chr_bank_fd0
                } else {
                    self.chr_bank_fe0
                }
            }
            _ => {
                if self.latch1.load(Ordering::Relaxed) == LATCH_FD {
                    self.chr_bank_fd1
                } else {
                    self.chr_bank_fe1
                }
            }
        }
    }
}

impl Mapper for Mmc2 {
    fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF if self.variant == Variant::Mmc2 => {
                self.prg_ram[(addr - 0x6000) as usize]
            }
            0x8000..=0xFFFF => match self.variant {
                Variant::Mmc2 => {
                    let slot = ((addr - 0x8000) / 0x2000) as usize;
                    let bank = if slot == 0 {
                        (self.prg_bank as usize) % self.prg_banks_8k
                    } else {
                        (self.prg_banks_8k - (4 - slot)) % self.prg_banks_8k
                    };
                    self.prg_rom[bank * 8192 + (addr as usize % 8192)]
                }
                Variant::Mmc4 => {
                    let switchable = addr < 0xC000;
                    let banks_16k = self.prg_banks_8k / 2;
                    let bank = if switchable {
                        (self.prg_bank as usize) % banks_16k.max(1)
                    } else {
                        banks_16k.saturating_sub(1)
                    };
                    self.prg_rom[bank * 16384 + (addr as usize % 16384)]
                }
            },
            _ => 0,
        }
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF if self.variant == Variant::Mmc2 => {
                self.prg_ram[(addr - 0x6000) as usize] = value;
            }
            0xA000..=0xAFFF => self.prg_bank = value & 0x0F,
            0xB000..=0xBFFF => self.chr_bank_fd0 = value & 0x1F,
            0xC000..=0xCFFF => self.chr_bank_fe0 = value & 0x1F,
            0xD000..=0xDFFF => self.chr_bank_fd1 = value & 0x1F,
            0xE000..=0xEFFF => self.chr_bank_fe1 = value & 0x1F,
            0xF000..=0xFFFF => {
                self.mirroring = if value & 0x01 != 0 {
                    Mirroring::Horizontal
                } else {
                    Mirroring::Vertical
                };
            }
            _ => {}
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        debug_assert!(addr <= 0x1FFF, "Invalid CHR address: ${addr:04X}");
        let bank = self.chr_bank(addr) as usize % self.chr_banks_4k;
        let offset = (addr as usize) % 4096;
        let value = self.chr_rom[bank * 4096 + offset];
        self.update_latch(addr);
        value
    }

    fn write_chr(&mut self, _addr: u16, _value: u8) {}

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        match self.variant {
            Variant::Mmc2 => 9,
            Variant::Mmc4 => 10,
        }
    }

    fn mapper_name(&self) -> &'static str {
        match self.variant {
            Variant::Mmc2 => "MMC2",
            Variant::Mmc4 => "MMC4",
        }
    }

    fn has_battery(&self) -> bool {
        false
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_bank_fd0 = 0;
        self.chr_bank_fe0 = 0;
        self.chr_bank_fd1 = 0;
        self.chr_bank_fe1 = 0;
        self.latch0 = AtomicU8::new(LATCH_FE);
        self.latch1 = AtomicU8::new(LATCH_FE);
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        buf.push(self.mirroring as u8);
        buf.push(self.prg_bank);
        buf.push(self.chr_bank_fd0);
        buf.push(self.chr_bank_fe0);
        buf.push(self.chr_bank_fd1);
        buf.push(self.chr_bank_fe1);
        buf.push(self.latch0.load(Ordering::Relaxed));
        buf.push(self.latch1.load(Ordering::Relaxed));
        if self.variant == Variant::Mmc2 {
            buf.extend_from_slice(&self.prg_ram);
        }
    }

    fn load_state(&mut self, data: &mut &[u8]) {
        self.mirroring = Mirroring::from_index(take_u8(data));
        self.prg_bank = take_u8(data);
        self.chr_bank_fd0 = take_u8(data);
        self.chr_bank_fe0 = take_u8(data);
        self.chr_bank_fd1 = take_u8(data);
        self.chr_bank_fe1 = take_u8(data);
        self.latch0 = AtomicU8::new(take_u8(data));
        self.latch1 = AtomicU8::new(take_u8(data));
        if self.variant == Variant::Mmc2 {
            for byte in &mut self.prg_ram {
                *byte = take_u8(data);
            }
        }
    }
}
