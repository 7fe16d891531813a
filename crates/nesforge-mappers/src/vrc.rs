//! Mappers 21, 22, 23, 25: Konami VRC2/VRC4
//!
//! Konami's workhorse expansion chip family. VRC2 and VRC4 share the
//! same register layout but the physical address lines carrying the
//! two CHR/PRG sub-register select bits are wired differently on each
//! board revision, so every variant needs its own address translation
//! before the shared register logic runs. VRC4 adds a scanline/cycle
//! selectable IRQ counter with a 341-cycle prescaler; VRC2 has none.
//!
//! # Hardware Details
//!
//! - **PRG-ROM**: two switchable 8KB banks, one swap mode selects
//!   whether $8000 or $C000 is the second-to-last fixed bank
//! - **CHR**: eight switchable 1KB banks (VRC2: 7 or 8-bit; VRC4: 8-bit
//!   built from separate low/high nibble writes)
//! - **IRQ** (VRC4 only): 8-bit up-counter, cycle mode uses a 341-cycle
//!   prescaler, scanline mode increments directly
//!
//! # Games
//!
//! - Contra (VRC2)
//! - Gradius II (VRC4)
//! - Ganbare Goemon (VRC4)

use crate::mapper::{take_bool, take_u16, take_u8};
use crate::{Mapper, Mirroring, Rom};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

const IRQ_PRESCALER_RELOAD: u16 = 341;

/// Which VRC2/VRC4 board revision this instance emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Mapper 22.
    Vrc2a,
    /// Mapper 23.
    Vrc2b,
    /// Mapper 25.
    Vrc2c,
    /// Mapper 21.
    Vrc4a,
    /// Mapper 25.
    Vrc4b,
    /// Mapper 21.
    Vrc4c,
    /// Mapper 25.
    Vrc4d,
    /// Mapper 23.
    Vrc4e,
    /// Mapper 23.
    Vrc4f,
}

impl Variant {
    fn is_vrc4(self) -> bool {
        matches!(
            self,
            Variant::Vrc4a
                | Variant::Vrc4b
                | Variant::Vrc4c
                | Variant::Vrc4d
                | Variant::Vrc4e
                | Variant::Vrc4f
        )
    }

    fn mapper_number(self) -> u16 {
        match self {
            Variant::Vrc4a | Variant::Vrc4c => 21,
            Variant::Vrc2a => 22,
            Variant::Vrc2b | Variant::Vrc4e | Variant::Vrc4f => 23,
            Variant::Vrc2c | Variant::Vrc4b | Variant::Vrc4d => 25,
        }
    }

    fn mapper_name(self) -> &'static str {
        match self {
            Variant::Vrc4a | Variant::Vrc4c => "VRC4",
            Variant::Vrc2a => "VRC2",
            Variant::Vrc2b | Variant::Vrc4e | Variant::Vrc4f => "VRC2/VRC4",
            Variant::Vrc2c | Variant::Vrc4b | Variant::Vrc4d => "VRC2/VRC4",
        }
    }
}

/// Konami VRC2/VRC4 mapper implementation (Mappers 21, 22, 23, 25).
pub struct Vrc {
    variant: Variant,
    is_vrc4: bool,

    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    chr_ram: Vec<u8>,
    has_chr_ram: bool,
    prg_ram: Vec<u8>,
    mirroring: Mirroring,

    prg_bank_0: u8,
    prg_bank_1: u8,
    prg_swap_mode: bool,

    chr_bank_lo: [u8; 8],
    chr_bank_hi: [u8; 8],

    irq_latch: u8,
    irq_counter: u8,
    irq_enabled: bool,
    irq_enabled_after_ack: bool,
    irq_pending: bool,
    irq_mode_cycle: bool,
    irq_prescaler: u16,

    prg_banks_8k: usize,
    chr_banks_1k: usize,
}

impl Vrc {
    fn new_variant(rom: &Rom, variant: Variant) -> Self {
        let has_chr_ram = rom.chr_rom.is_empty();
        let prg_banks_8k = (rom.prg_rom.len() / 8192).max(2);
        let chr_banks_1k = if has_chr_ram {
            8
        } else {
            (rom.chr_rom.len() / 1024).max(1)
        };

        let mut chr_bank_lo = [0u8; 8];
        for (i, b) in chr_bank_lo.iter_mut().enumerate() {
            *b = i as u8;
        }

        Self {
            variant,
            is_vrc4: variant.is_vrc4(),
            prg_rom: rom.prg_rom.clone(),
            chr_rom: rom.chr_rom.clone(),
            chr_ram: if has_chr_ram { vec![0; 8192] } else { Vec::new() },
            has_chr_ram,
            prg_ram: vec![0; 8192],
            mirroring: rom.header.mirroring,
            prg_bank_0: 0,
            prg_bank_1: 0,
            prg_swap_mode: false,
            chr_bank_lo,
            chr_bank_hi: [0; 8],
            irq_latch: 0,
            irq_counter: 0,
            irq_enabled: false,
            irq_enabled_after_ack: false,
            irq_pending: false,
            irq_mode_cycle: false,
            irq_prescaler: 0,
            prg_banks_8k,
            chr_banks_1k,
        }
    }

    /// Create a Mapper 21 (VRC4a) instance.
    #[must_use]
    pub fn new_021(rom: &Rom) -> Self {
        Self::new_variant(rom, Variant::Vrc4a)
    }

    /// Create a Mapper 22 (VRC2a) instance.
    #[must_use]
    pub fn new_022(rom: &Rom) -> Self {
        Self::new_variant(rom, Variant::Vrc2a)
    }

    /// Create a Mapper 23 (VRC4e) instance.
    #[must_use]
    pub fn new_023(rom: &Rom) -> Self {
        Self::new_variant(rom, Variant::Vrc4e)
    }

    /// Create a Mapper 25 (VRC4b) instance.
    #[must_use]
    pub fn new_025(rom: &Rom) -> Self {
        Self::new_variant(rom, Variant::Vrc4b)
    }

    fn translate_address(&self, addr: u16) -> u16 {
        let base = addr & 0xF000;
        let (a0, a1) = match self.variant {
            Variant::Vrc2a => ((addr >> 1) & 1, addr & 1),
            Variant::Vrc2b | Variant::Vrc4e | Variant::Vrc4f => (addr & 1, (addr >> 1) & 1),
            Variant::Vrc2c | Variant::Vrc4b | Variant::Vrc4d => ((addr >> 1) & 1, addr & 1),
            Variant::Vrc4a => ((addr >> 1) & 1, (addr >> 2) & 1),
            Variant::Vrc4c => ((addr >> 6) & 1, (addr >> 7) & 1),
        };
        base | (a1 << 1) | a0
    }

    fn chr_bank(&self, slot: usize) -> u8 {
        if self.is_vrc4 {
            self.chr_bank_lo[slot] | (self.chr_bank_hi[slot] << 4)
        } else if self.variant == Variant::Vrc2a {
            self.chr_bank_lo[slot] >> 1
        } else {
            self.chr_bank_lo[slot]
        }
    }

    fn write_chr_bank(&mut self, bank: usize, value: u8, high_nibble: bool) {
        if bank >= 8 {
            return;
        }
        if high_nibble {
            self.chr_bank_hi[bank] = value & 0x0F;
        } else {
            self.chr_bank_lo[bank] = value;
        }
    }

    fn prg_bank_for_slot(&self, slot: usize) -> usize {
        let bank0 = self.prg_bank_0 as usize % self.prg_banks_8k;
        let bank1 = self.prg_bank_1 as usize % self.prg_banks_8k;
        let second_last = (self.prg_banks_8k - 2) % self.prg_banks_8k;
        let last = (self.prg_banks_8k - 1) % self.prg_banks_8k;

        if self.prg_swap_mode {
            match slot {
                0 => second_last,
                1 => bank1,
                2 => bank0,
                _ => last,
            }
        } else {
            match slot {
                0 => bank0,
                1 => bank1,
                2 => second_last,
                _ => last,
            }
        }
    }
}

impl Mapper for Vrc {
    fn read_prg(&self, addr: u16) -> u8 {
        if (0x6000..0x8000).contains(&addr) {
            return self.prg_ram[(addr - 0x6000) as usize];
        }
        if addr >= 0x8000 {
            let slot = ((addr - 0x8000) / 0x2000) as usize;
            let bank = self.prg_bank_for_slot(slot);
            return self.prg_rom[bank * 8192 + (addr as usize & 0x1FFF)];
        }
        0
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if (0x6000..0x8000).contains(&addr) {
            self.prg_ram[(addr - 0x6000) as usize] = value;
            return;
        }
        if addr < 0x8000 {
            return;
        }

        let translated = self.translate_address(addr);

        if translated & 0xF000 == 0x8000 {
            self.prg_bank_0 = value & 0x1F;
            return;
        }

        if translated & 0xF000 == 0x9000 {
            match translated & 0x0003 {
                0 | 1 => {
                    self.mirroring = match value & 0x03 {
                        0 => Mirroring::Vertical,
                        1 => Mirroring::Horizontal,
                        2 => Mirroring::SingleScreenLower,
                        _ => Mirroring::SingleScreenUpper,
                    };
                }
                _ => {
                    if self.is_vrc4 {
                        self.prg_swap_mode = value & 0x02 != 0;
                    }
                }
            }
            return;
        }

        if translated & 0xF000 == 0xA000 {
            self.prg_bank_1 = value & 0x1F;
            return;
        }

        if (0xB000..0xF000).contains(&translated) {
            let base_bank = (((translated & 0xF000) - 0xB000) / 0x1000) as usize * 2;
            let sub_reg = translated & 0x0003;
            let chr_bank = base_bank + (sub_reg / 2) as usize;
            let high_nibble = sub_reg & 1 != 0;

            if self.is_vrc4 {
                self.write_chr_bank(chr_bank, value, high_nibble);
            } else if !high_nibble {
                self.chr_bank_lo[chr_bank] = value;
            }
            return;
        }

        if self.is_vrc4 && translated & 0xF000 == 0xF000 {
            match translated & 0x0003 {
                0 => self.irq_latch = (self.irq_latch & 0xF0) | (value & 0x0F),
                1 => self.irq_latch = (self.irq_latch & 0x0F) | ((value & 0x0F) << 4),
                2 => {
                    self.irq_enabled_after_ack = value & 0x01 != 0;
                    self.irq_enabled = value & 0x02 != 0;
                    self.irq_mode_cycle = value & 0x04 != 0;
                    if self.irq_enabled {
                        self.irq_counter = self.irq_latch;
                        self.irq_prescaler = 0;
                    }
                    self.irq_pending = false;
                }
                _ => {
                    self.irq_pending = false;
                    self.irq_enabled = self.irq_enabled_after_ack;
                }
            }
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        debug_assert!(addr <= 0x1FFF, "Invalid CHR address: ${addr:04X}");
        if self.has_chr_ram {
            self.chr_ram[addr as usize]
        } else {
            let slot = (addr / 1024) as usize;
            let bank = self.chr_bank(slot) as usize % self.chr_banks_1k;
            self.chr_rom[bank * 1024 + (addr as usize % 1024)]
        }
    }

    fn write_chr(&mut self, addr: u16, value: u8) {
        if self.has_chr_ram {
            self.chr_ram[addr as usize] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn irq_acknowledge(&mut self) {
        self.irq_pending = false;
    }

    fn scanline(&mut self) {
        if self.is_vrc4 && !self.irq_mode_cycle && self.irq_enabled {
            if self.irq_counter == 0xFF {
                self.irq_counter = self.irq_latch;
                self.irq_pending = true;
            } else {
                self.irq_counter += 1;
            }
        }
    }

    fn cpu_cycles(&mut self, count: u32) {
        if !(self.is_vrc4 && self.irq_mode_cycle && self.irq_enabled) {
            return;
        }

        let mut remaining = count;
        while remaining > 0 {
            if u32::from(self.irq_prescaler) >= remaining {
                self.irq_prescaler -= remaining as u16;
                remaining = 0;
            } else {
                remaining -= u32::from(self.irq_prescaler) + 1;
                self.irq_prescaler = IRQ_PRESCALER_RELOAD - 1;

                if self.irq_counter == 0xFF {
                    self.irq_counter = self.irq_latch;
                    self.irq_pending = true;
                } else {
                    self.irq_counter += 1;
                }
            }
        }
    }

    fn mapper_number(&self) -> u16 {
        self.variant.mapper_number()
    }

    fn mapper_name(&self) -> &'static str {
        self.variant.mapper_name()
    }

    fn reset(&mut self) {
        self.prg_bank_0 = 0;
        self.prg_bank_1 = 0;
        self.prg_swap_mode = false;
        for (i, b) in self.chr_bank_lo.iter_mut().enumerate() {
            *b = i as u8;
        }
        self.chr_bank_hi = [0; 8];
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_enabled = false;
        self.irq_enabled_after_ack = false;
        self.irq_pending = false;
        self.irq_mode_cycle = false;
        self.irq_prescaler = 0;
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        if self.has_chr_ram {
            buf.extend_from_slice(&self.chr_ram);
        }
        buf.extend_from_slice(&self.prg_ram);
        buf.push(self.mirroring as u8);

        buf.push(self.prg_bank_0);
        buf.push(self.prg_bank_1);
        buf.push(u8::from(self.prg_swap_mode));
        buf.extend_from_slice(&self.chr_bank_lo);
        buf.extend_from_slice(&self.chr_bank_hi);

        buf.push(self.irq_latch);
        buf.push(self.irq_counter);
        buf.push(u8::from(self.irq_enabled));
        buf.push(u8::from(self.irq_enabled_after_ack));
        buf.push(u8::from(self.irq_pending));
        buf.push(u8::from(self.irq_mode_cycle));
        buf.extend_from_slice(&self.irq_prescaler.to_le_bytes());
    }

    fn load_state(&mut self, data: &mut &[u8]) {
        if self.has_chr_ram {
            for byte in &mut self.chr_ram {
                *byte = take_u8(data);
            }
        }
        for byte in &mut self.prg_ram {
            *byte = take_u8(data);
        }
        self.mirroring = Mirroring::from_index(take_u8(data));

        self.prg_bank_0 = take_u8(data);
        self.prg_bank_1 = take_u8(data);
        self.prg_swap_mode = take_bool(data);
        for b in &mut self.chr_bank_lo {
            *b = take_u8(data);
        }
        for b in &mut self.chr_bank_hi {
            *b = take_u8(data);
        }

        self.irq_latch = take_u8(data);
        self.irq_counter = take_u8(data);
        self.irq_enabled = take_bool(data);
        self.irq_enabled_after_ack = take_bool(data);
        self.irq_pending = take_bool(data);
        self.irq_mode_cycle = take_bool(data);
        self.irq_prescaler = take_u16(data);
    }
}
