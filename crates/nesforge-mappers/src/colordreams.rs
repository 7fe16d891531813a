//! Mapper 11: Color Dreams
//!
//! A simple discrete-logic mapper used by the unlicensed Color Dreams
//! and Wisdom Tree catalogs. One register selects both the PRG bank and
//! the CHR bank from a single write.
//!
//! # Hardware Details
//!
//! - **PRG-ROM**: switchable 32KB bank at $8000-$FFFF
//! - **CHR**: switchable 8KB bank
//! - **Mirroring**: fixed horizontal or vertical (hardware)
//! - **Bus Conflicts**: no
//!
//! # Games
//!
//! - Crystal Mines
//! - Metal Fighter
//! - Baby Boomer

use crate::{Mapper, Mirroring, Rom};

/// Color Dreams mapper implementation (Mapper 11).
pub struct ColorDreams {
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    chr_ram: Vec<u8>,
    has_chr_ram: bool,
    mirroring: Mirroring,
    prg_bank: u8,
    chr_bank: u8,
    prg_banks: usize,
    chr_banks: usize,
}

impl ColorDreams {
    /// Create a new Color Dreams mapper from a ROM.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let prg_banks = rom.prg_rom.len() / 32768;
        let has_chr_ram = rom.chr_rom.is_empty();
        let chr_banks = if has_chr_ram {
            1
        } else {
            rom.chr_rom.len() / 8192
        };

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_rom: rom.chr_rom.clone(),
            chr_ram: if has_chr_ram { vec![0; 8192] } else { Vec::new() },
            has_chr_ram,
            mirroring: rom.header.mirroring,
            prg_bank: 0,
            chr_bank: 0,
            prg_banks: prg_banks.max(1),
            chr_banks: chr_banks.max(1),
        }
    }
}

impl Mapper for ColorDreams {
    fn read_prg(&self, addr: u16) -> u8 {
        debug_assert!(addr >= 0x8000, "Invalid PRG address: ${addr:04X}");
        let bank = (self.prg_bank as usize) % self.prg_banks;
        let offset = (addr & 0x7FFF) as usize;
        self.prg_rom[bank * 32768 + offset]
    }

    fn write_prg(&mut self, _addr: u16, value: u8) {
        self.prg_bank = value & 0x03;
        self.chr_bank = (value >> 4) & 0x0F;
    }

    fn read_chr(&self, addr: u16) -> u8 {
        debug_assert!(addr <= 0x1FFF, "Invalid CHR address: ${addr:04X}");
        if self.has_chr_ram {
            self.chr_ram[addr as usize]
        } else {
            let bank = (self.chr_bank as usize) % self.chr_banks;
            self.chr_rom[bank * 8192 + addr as usize]
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

    fn mapper_number(&self) -> u16 {
        11
    }

    fn mapper_name(&self) -> &'static str {
        "Color Dreams"
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_bank = 0;
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        buf.push(self.prg_bank);
        buf.push(self.chr_bank);
        if self.has_chr_ram {
            buf.extend_from_slice(&self.chr_ram);
        }
    }

    fn load_state(&mut self, data: &mut &[u8]) {
        self.prg_bank = crate::mapper::take_u8(data);
        self.chr_bank = crate::mapper::take_u8(data);
        if self.has_chr_ram {
            let len = self.chr_ram.len();
            let take = len.min(data.len());
            self.chr_ram[..take].copy_from_slice(&data[..take]);
            for byte in self.chr_ram[take..].iter_mut() {
                *byte = 0;
            }
            *data = &data[take..];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::RomHeader;

    fn create_test_rom(prg_banks: u8, chr_banks: u8) -> Rom {
        let prg_size = prg_banks as usize * 32768;
        let chr_size = chr_banks as usize * 8192;

        let mut prg_rom = vec![0u8; prg_size];
        for bank in 0..prg_banks as usize {
            for i in 0..32768 {
                prg_rom[bank * 32768 + i] = bank as u8;
            }
        }

        let mut chr_rom = vec![0u8; chr_size];
        for bank in 0..chr_banks as usize {
            for i in 0..8192 {
                chr_rom[bank * 8192 + i] = bank as u8;
            }
        }

        Rom {
            header: RomHeader {
                prg_rom_size: prg_size,
                chr_rom_size: chr_size,
                mapper_number: 11,
                submapper: 0,
                prg_ram_size: 0,
                chr_ram_size: if chr_banks == 0 { 8192 } else { 0 },
                mirroring: Mirroring::Horizontal,
                has_battery: false,
                has_trainer: false,
                nes2_format: false,
                prg_nvram_size: 0,
                chr_nvram_size: 0,
            },
            prg_rom,
            chr_rom,
            trainer: None,
        }
    }

    #[test]
    fn test_initial_state() {
        let rom = create_test_rom(4, 4);
        let mapper = ColorDreams::new(&rom);
        assert_eq!(mapper.read_prg(0x8000), 0);
        assert_eq!(mapper.read_chr(0x0000), 0);
    }

    #[test]
    fn test_bank_switching() {
        let rom = create_test_rom(4, 4);
        let mut mapper = ColorDreams::new(&rom);

        mapper.write_prg(0x8000, 0x32); // prg bank 2, chr bank 3
        assert_eq!(mapper.read_prg(0x8000), 2);
        assert_eq!(mapper.read_chr(0x0000), 3);
    }

    #[test]
    fn test_chr_ram_fallback() {
        let rom = create_test_rom(2, 0);
        let mut mapper = ColorDreams::new(&rom);

        mapper.write_chr(0x0000, 0x42);
        assert_eq!(mapper.read_chr(0x0000), 0x42);
    }

    #[test]
    fn save_state_round_trip_preserves_banks_and_chr_ram() {
        let rom = create_test_rom(2, 0);
        let mut mapper = ColorDreams::new(&rom);
        mapper.write_prg(0x8000, 0x32);
        mapper.write_chr(0x0000, 0x42);

        let mut buf = Vec::new();
        mapper.save_state(&mut buf);

        let mut restored = ColorDreams::new(&rom);
        let mut cursor: &[u8] = &buf;
        restored.load_state(&mut cursor);

        assert!(cursor.is_empty());
        assert_eq!(restored.read_prg(0x8000), 2);
        assert_eq!(restored.read_chr(0x0000), 0x42);
    }

    #[test]
    fn test_reset() {
        let rom = create_test_rom(4, 4);
        let mut mapper = ColorDreams::new(&rom);

        mapper.write_prg(0x8000, 0x32);
        mapper.reset();
        assert_eq!(mapper.read_prg(0x8000), 0);
        assert_eq!(mapper.read_chr(0x0000), 0);
    }
}
