//! Mapper 16: Bandai FCG (FCG-1, FCG-2, LZ93D50)
//!
//! Used by Dragon Ball Z, SD Gundam, and the Famicom Jump series. The
//! LZ93D50 variant drives a 24C01 or 24C02 I2C EEPROM over two bits of
//! a control register for in-cartridge save data, bit-banged the same
//! way the CPU would talk to a real EEPROM chip: start/stop conditions
//! on SDA while SCL is held high, data bits shifted in/out on SCL's
//! rising edge.
//!
//! # Hardware Details
//!
//! - **PRG-ROM**: one switchable 16KB bank at $8000-$BFFF, fixed last
//!   bank at $C000-$FFFF
//! - **CHR**: eight switchable 1KB banks
//! - **IRQ**: 16-bit down-counter, clocked every CPU cycle
//! - **EEPROM**: optional 24C01 (128 bytes) or 24C02 (256 bytes)

use crate::mapper::{take_bool, take_u16, take_u8};
use crate::{Mapper, Mirroring, Rom};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Which save-data chip, if any, this board carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromType {
    /// FCG-1/FCG-2: no EEPROM.
    None,
    /// 128 bytes.
    Eeprom24C01,
    /// 256 bytes.
    Eeprom24C02,
}

impl EepromType {
    fn size(self) -> usize {
        match self {
            EepromType::None => 0,
            EepromType::Eeprom24C01 => 128,
            EepromType::Eeprom24C02 => 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum I2cState {
    Idle,
    DeviceAddress,
    WordAddress,
    Data,
}

impl I2cState {
    fn from_index(v: u8) -> Self {
        match v {
            1 => I2cState::DeviceAddress,
            2 => I2cState::WordAddress,
            3 => I2cState::Data,
            _ => I2cState::Idle,
        }
    }
}

/// Bandai FCG mapper implementation (Mapper 16).
pub struct Bandai {
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    chr_ram: Vec<u8>,
    has_chr_ram: bool,
    mirroring: Mirroring,

    prg_bank: u8,
    chr_bank: [u8; 8],

    irq_counter: u16,
    irq_latch: u16,
    irq_enabled: bool,
    irq_pending: bool,

    eeprom_type: EepromType,
    eeprom_data: Vec<u8>,

    i2c_state: I2cState,
    i2c_scl: bool,
    i2c_sda: bool,
    i2c_sda_in: bool,
    i2c_shift_reg: u8,
    i2c_bit_count: u8,
    i2c_read_mode: bool,
    i2c_word_addr: u8,

    prg_banks_16k: usize,
    chr_banks_1k: usize,
}

impl Bandai {
    /// Create a new Bandai FCG mapper from a ROM, defaulting to a 256-byte
    /// 24C02 EEPROM (the LZ93D50's most common configuration).
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        Self::new_with_eeprom(rom, EepromType::Eeprom24C02)
    }

    /// Create a new Bandai FCG mapper with an explicit EEPROM configuration.
    #[must_use]
    pub fn new_with_eeprom(rom: &Rom, eeprom_type: EepromType) -> Self {
        let has_chr_ram = rom.chr_rom.is_empty();
        let prg_banks_16k = (rom.prg_rom.len() / 16384).max(1);
        let chr_banks_1k = if has_chr_ram {
            8
        } else {
            (rom.chr_rom.len() / 1024).max(1)
        };

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_rom: rom.chr_rom.clone(),
            chr_ram: if has_chr_ram { vec![0; 8192] } else { Vec::new() },
            has_chr_ram,
            mirroring: rom.header.mirroring,
            prg_bank: 0,
            chr_bank: [0; 8],
            irq_counter: 0,
            irq_latch: 0,
            irq_enabled: false,
            irq_pending: false,
            eeprom_data: vec![0xFF; eeprom_type.size()],
            eeprom_type,
            i2c_state: I2cState::Idle,
            i2c_scl: true,
            i2c_sda: true,
            i2c_sda_in: true,
            i2c_shift_reg: 0,
            i2c_bit_count: 0,
            i2c_read_mode: false,
            i2c_word_addr: 0,
            prg_banks_16k,
            chr_banks_1k,
        }
    }

    fn eeprom_start_condition(&mut self) {
        self.i2c_state = I2cState::DeviceAddress;
        self.i2c_shift_reg = 0;
        self.i2c_bit_count = 0;
    }

    fn eeprom_stop_condition(&mut self) {
        self.i2c_state = I2cState::Idle;
        self.i2c_sda_in = true;
    }

    fn eeprom_process_byte(&mut self) {
        match self.i2c_state {
            I2cState::DeviceAddress => {
                self.i2c_read_mode = self.i2c_shift_reg & 0x01 != 0;
                self.i2c_sda_in = false;
                self.i2c_state = if self.i2c_read_mode {
                    I2cState::Data
                } else {
                    I2cState::WordAddress
                };
            }
            I2cState::WordAddress => {
                self.i2c_word_addr = self.i2c_shift_reg;
                self.i2c_sda_in = false;
                self.i2c_state = I2cState::Data;
            }
            I2cState::Data => {
                if !self.i2c_read_mode {
                    let size = self.eeprom_data.len();
                    if size > 0 {
                        self.eeprom_data[self.i2c_word_addr as usize % size] = self.i2c_shift_reg;
                    }
                    self.i2c_word_addr = self.i2c_word_addr.wrapping_add(1);
                    self.i2c_sda_in = false;
                }
            }
            I2cState::Idle => {}
        }
        self.i2c_shift_reg = 0;
        self.i2c_bit_count = 0;
    }

    fn eeprom_clock_rise(&mut self, sda_in_bit: bool) {
        if self.i2c_state == I2cState::Idle {
            return;
        }

        if self.i2c_state == I2cState::Data && self.i2c_read_mode {
            if self.i2c_bit_count < 8 {
                let size = self.eeprom_data.len();
                let byte = if size > 0 {
                    self.eeprom_data[self.i2c_word_addr as usize % size]
                } else {
                    0xFF
                };
                let bit = (byte >> (7 - self.i2c_bit_count)) & 1;
                self.i2c_sda_in = bit != 0;
                self.i2c_bit_count += 1;
                if self.i2c_bit_count == 8 {
                    self.i2c_word_addr = self.i2c_word_addr.wrapping_add(1);
                    self.i2c_bit_count = 0;
                }
            }
            return;
        }

        self.i2c_shift_reg = (self.i2c_shift_reg << 1) | u8::from(sda_in_bit);
        self.i2c_bit_count += 1;
        if self.i2c_bit_count == 8 {
            self.eeprom_process_byte();
        }
    }

    fn eeprom_write(&mut self, value: u8) {
        if self.eeprom_type == EepromType::None {
            return;
        }

        let scl = value & 0x20 != 0;
        let sda = value & 0x40 != 0;

        if scl && self.i2c_scl {
            if self.i2c_sda && !sda {
                self.eeprom_start_condition();
            } else if !self.i2c_sda && sda {
                self.eeprom_stop_condition();
            }
        } else if scl && !self.i2c_scl {
            self.eeprom_clock_rise(sda);
        }

        self.i2c_scl = scl;
        self.i2c_sda = sda;
    }

    fn eeprom_read(&self) -> u8 {
        if self.i2c_sda_in { 0x10 } else { 0x00 }
    }
}

impl Mapper for Bandai {
    fn read_prg(&self, addr: u16) -> u8 {
        if (0x6000..0x8000).contains(&addr) {
            return self.eeprom_read();
        }

        if addr >= 0x8000 {
            let bank = if addr < 0xC000 {
                self.prg_bank as usize % self.prg_banks_16k
            } else {
                self.prg_banks_16k - 1
            };
            return self.prg_rom[bank * 16384 + (addr as usize & 0x3FFF)];
        }

        0
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if (0x6000..0x8000).contains(&addr) {
            self.eeprom_write(value);
            return;
        }

        if addr < 0x8000 {
            return;
        }

        match addr & 0x000F {
            0x0..=0x7 => self.chr_bank[(addr & 0x0F) as usize] = value,
            0x8 => self.prg_bank = value & 0x0F,
            0x9 => {
                self.mirroring = match value & 0x03 {
                    0 => Mirroring::Vertical,
                    1 => Mirroring::Horizontal,
                    2 => Mirroring::SingleScreenLower,
                    _ => Mirroring::SingleScreenUpper,
                };
            }
            0xA => {
                self.irq_enabled = value & 0x01 != 0;
                self.irq_pending = false;
                self.irq_counter = self.irq_latch;
            }
            0xB => self.irq_latch = (self.irq_latch & 0xFF00) | u16::from(value),
            0xC => self.irq_latch = (self.irq_latch & 0x00FF) | (u16::from(value) << 8),
            0xD => self.eeprom_write(value),
            _ => {}
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        debug_assert!(addr <= 0x1FFF, "Invalid CHR address: ${addr:04X}");
        if self.has_chr_ram {
            self.chr_ram[addr as usize]
        } else {
            let bank = self.chr_bank[(addr / 1024) as usize] as usize % self.chr_banks_1k;
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

    fn cpu_cycles(&mut self, count: u32) {
        if self.irq_enabled && self.irq_counter > 0 {
            let counter = u32::from(self.irq_counter);
            if count >= counter {
                self.irq_counter = 0;
                self.irq_pending = true;
            } else {
                self.irq_counter -= count as u16;
            }
        }
    }

    fn mapper_number(&self) -> u16 {
        16
    }

    fn mapper_name(&self) -> &'static str {
        "Bandai FCG"
    }

    fn has_mapper_save_data(&self) -> bool {
        self.eeprom_type != EepromType::None
    }

    fn get_mapper_save_data(&self) -> Option<&[u8]> {
        if self.eeprom_type == EepromType::None {
            None
        } else {
            Some(&self.eeprom_data)
        }
    }

    fn set_mapper_save_data(&mut self, data: &[u8]) {
        if self.eeprom_type == EepromType::None {
            return;
        }
        let len = data.len().min(self.eeprom_data.len());
        self.eeprom_data[..len].copy_from_slice(&data[..len]);
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_bank = [0; 8];
        self.irq_counter = 0;
        self.irq_latch = 0;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.i2c_state = I2cState::Idle;
        self.i2c_scl = true;
        self.i2c_sda = true;
        self.i2c_sda_in = true;
        self.i2c_shift_reg = 0;
        self.i2c_bit_count = 0;
        self.i2c_read_mode = false;
        self.i2c_word_addr = 0;
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        if self.has_chr_ram {
            buf.extend_from_slice(&self.chr_ram);
        }
        buf.push(self.mirroring as u8);

        buf.push(self.prg_bank);
        buf.extend_from_slice(&self.chr_bank);

        buf.extend_from_slice(&self.irq_counter.to_le_bytes());
        buf.extend_from_slice(&self.irq_latch.to_le_bytes());
        buf.push(u8::from(self.irq_enabled));
        buf.push(u8::from(self.irq_pending));

        buf.extend_from_slice(&self.eeprom_data);

        buf.push(self.i2c_state as u8);
        buf.push(u8::from(self.i2c_scl));
        buf.push(u8::from(self.i2c_sda));
        buf.push(u8::from(self.i2c_sda_in));
        buf.push(self.i2c_shift_reg);
        buf.push(self.i2c_bit_count);
        buf.push(u8::from(self.i2c_read_mode));
        buf.push(self.i2c_word_addr);
    }

    fn load_state(&mut self, data: &mut &[u8]) {
        if self.has_chr_ram {
            for byte in &mut self.chr_ram {
                *byte = take_u8(data);
            }
        }
        self.mirroring = Mirroring::from_index(take_u8(data));

        self.prg_bank = take_u8(data);
        for b in &mut self.chr_bank {
            *b = take_u8(data);
        }

        self.irq_counter = take_u16(data);
        self.irq_latch = take_u16(data);
        self.irq_enabled = take_bool(data);
        self.irq_pending = take_bool(data);

        for byte in &mut self.eeprom_data {
            *byte = take_u8(data);
        }

        self.i2c_state = I2cState::from_index(take_u8(data));
        self.i2c_scl = take_bool(data);
        self.i2c_sda = take_bool(data);
        self.i2c_sda_in = take_bool(data);
        self.i2c_shift_reg = take_u8(data);
        self.i2c_bit_count = take_u8(data);
        self.i2c_read_mode = take_bool(data);
        self.i2c_word_addr = take_u8(data);
    }
}
