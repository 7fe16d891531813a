//! Mapper 79: NINA-03/NINA-06
//!
//! American Video Entertainment / AVE discrete-logic board. A single
//! register, mirrored across $4100-$5FFF and $8000-$FFFF, selects both
//! the 32KB PRG bank and the 8KB CHR bank.
//!
//! # Hardware Details
//!
//! - **PRG-ROM**: switchable 32KB bank
//! - **CHR**: switchable 8KB bank
//! - **Mirroring**: fixed (hardware)
//!
//! # Games
//!
//! - Krazy Kreatures
//! - F-15 City War
//! - Deathbots

use crate::{Mapper, Mirroring, Rom};

/// NINA-03/06 mapper implementation (Mapper 79).
pub struct Nina {
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    mirroring: Mirroring,
    prg_bank: u8,
    chr_bank: u8,
    prg_banks: usize,
    chr_banks: usize,
}

impl Nina {
    /// Create a new NINA-03/06 mapper from a ROM.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let prg_banks = (rom.prg_rom.len() / 32768).max(1);
        let chr_banks = (rom.chr_rom.len() / 8192).max(1);

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_rom: rom.chr_rom.clone(),
            mirroring: rom.header.mirroring,
            prg_bank: 0,
            chr_bank: 0,
            prg_banks,
            chr_banks,
        }
    }
}

impl Mapper for Nina {
    fn read_prg(&self, addr: u16) -> u8 {
        if addr < 0x8000 {
            return 0;
        }
        let bank = (self.prg_bank as usize) % self.prg_banks;
        let offset = (addr & 0x7FFF) as usize;
        self.prg_rom[bank * 32768 + offset]
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        // The register is mirrored across $4100-$5FFF and $8000-$FFFF;
        // bit 3 selects the CHR bank, bit 4 the PRG bank.
        if (0x4100..=0x5FFF).contains(&addr) || addr >= 0x8000 {
            self.chr_bank = value & 0x07;
            self.prg_bank = (value >> 4) & 0x01;
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        debug_assert!(addr <= 0x1FFF, "Invalid CHR address: ${addr:04X}");
        let bank = (self.chr_bank as usize) % self.chr_banks;
        self.chr_rom[bank * 8192 + addr as usize]
    }

    fn write_chr(&mut self, _addr: u16, _value: u8) {}

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        79
    }

    fn mapper_name(&self) -> &'static str {
        "NINA-03/06"
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_bank = 0;
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        buf.push(self.prg_bank);
        buf.push(self.chr_bank);
    }

    fn load_state(&mut self, data: &mut &[u8]) {
        self.prg_bank = crate::mapper::take_u8(data);
        self.chr_bank = crate::mapper::take_u8(data);
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
                mapper_number: 79,
                submapper: 0,
                prg_ram_size: 0,
                chr_ram_size: 0,
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
    fn test_bank_switching() {
        let rom = create_test_rom(2, 8);
        let mut mapper = Nina::new(&rom);

        mapper.write_prg(0x8000, 0x15); // prg bank 1, chr bank 5
        assert_eq!(mapper.read_prg(0x8000), 1);
        assert_eq!(mapper.read_chr(0x0000), 5);
    }

    #[test]
    fn save_state_round_trip_preserves_banks() {
        let rom = create_test_rom(2, 8);
        let mut mapper = Nina::new(&rom);
        mapper.write_prg(0x8000, 0x15);

        let mut buf = Vec::new();
        mapper.save_state(&mut buf);

        let mut restored = Nina::new(&rom);
        let mut cursor: &[u8] = &buf;
        restored.load_state(&mut cursor);

        assert!(cursor.is_empty());
        assert_eq!(restored.read_prg(0x8000), 1);
        assert_eq!(restored.read_chr(0x0000), 5);
    }

    #[test]
    fn test_low_register_mirror() {
        let rom = create_test_rom(2, 8);
        let mut mapper = Nina::new(&rom);

        mapper.write_prg(0x4100, 0x03);
        assert_eq!(mapper.read_chr(0x0000), 3);
    }
}
