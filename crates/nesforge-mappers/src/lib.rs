//! NES Cartridge Mapper Implementations.
//!
//! This crate provides mapper implementations for NES cartridge emulation.
//! Mappers handle memory banking for PRG-ROM, CHR-ROM/RAM, and provide
//! various hardware features like IRQ generation.
//!
//! # Supported Mappers
//!
//! | Mapper | Name | Description |
//! |--------|------|-------------|
//! | 0 | NROM | No banking, simplest mapper |
//! | 1 | MMC1 | Nintendo's first bank-switching mapper |
//! | 2 | UxROM | PRG-ROM banking only |
//! | 3 | CNROM | CHR-ROM banking only |
//! | 4 | MMC3 | Most popular, fine-grained banking + IRQ |
//! | 5 | MMC5 | Flexible banking, ExRAM, scanline IRQ, pulse + PCM audio |
//! | 7 | AxROM | 32KB PRG banking + single-screen mirroring |
//! | 9 | MMC2 | Latched CHR banks for `Punch-Out!!` |
//! | 10 | MMC4 | MMC2's latch, MMC1-style PRG banking |
//! | 11 | Color Dreams | PRG + CHR banking in one register |
//! | 16 | Bandai FCG | 16-bit IRQ counter, optional I2C EEPROM |
//! | 19 | Namco 163 | Up-counting IRQ, 8-channel wavetable audio |
//! | 20 | FDS | Famicom Disk System, wavetable + FM audio |
//! | 21 | VRC4a/VRC4c | Konami, scanline/cycle IRQ |
//! | 22 | VRC2a | Konami, no IRQ |
//! | 23 | VRC2b/VRC4e/VRC4f | Konami, scanline/cycle IRQ |
//! | 24 | VRC6a | Konami, 2 pulse + sawtooth audio |
//! | 25 | VRC2c/VRC4b/VRC4d | Konami, scanline/cycle IRQ |
//! | 26 | VRC6b | VRC6a with swapped address lines |
//! | 34 | BNROM | 32KB PRG banking, no mirroring control |
//! | 66 | GxROM | PRG + CHR banking in one register |
//! | 69 | FME-7 | Sunsoft's flexible board, optional 5B audio |
//! | 71 | Camerica/Codemasters | UxROM-like, some boards control mirroring |
//! | 79 | NINA-03/06 | PRG + CHR banking, mirrored register |
//! | 85 | VRC7 | Konami, 6-channel OPLL-derived FM audio |
//! | 206 | Namcot 108 | MMC3 bank layout without the IRQ counter |
//!
//! # Example
//!
//! ```no_run
//! use nesforge_mappers::{Rom, create_mapper};
//!
//! // Load ROM from file
//! let rom_data = std::fs::read("game.nes").expect("Failed to read ROM");
//! let rom = Rom::load(&rom_data).expect("Failed to parse ROM");
//!
//! // Create appropriate mapper
//! let mut mapper = create_mapper(&rom).expect("Unsupported mapper");
//!
//! // Use mapper for memory access
//! let opcode = mapper.read_prg(0x8000);
//! let tile = mapper.read_chr(0x0000);
//! ```
//!
//! # no_std Support
//!
//! This crate supports `no_std` environments with the `alloc` feature.
//! Disable the default `std` feature for embedded use.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

pub mod mapper;
pub mod rom;

mod axrom;
mod bandai;
mod bnrom;
mod camerica;
mod cnrom;
mod colordreams;
mod fds;
mod fme7;
mod gxrom;
mod mmc1;
mod mmc2;
mod mmc3;
mod mmc5;
mod namco163;
mod namcot108;
mod nina;
mod nrom;
mod uxrom;
mod vrc;
mod vrc6;
mod vrc7;

pub use axrom::Axrom;
pub use bandai::Bandai;
pub use bnrom::Bnrom;
pub use camerica::Camerica;
pub use cnrom::Cnrom;
pub use colordreams::ColorDreams;
pub use fds::Fds;
pub use fme7::Fme7;
pub use gxrom::Gxrom;
pub use mapper::{Mapper, Mirroring};
pub use mmc1::Mmc1;
pub use mmc2::Mmc2;
pub use mmc3::Mmc3;
pub use mmc5::Mmc5;
pub use namco163::Namco163;
pub use namcot108::Namcot108;
pub use nina::Nina;
pub use nrom::Nrom;
pub use rom::{Rom, RomError, RomHeader};
pub use uxrom::Uxrom;
pub use vrc::Vrc;
pub use vrc6::Vrc6;
pub use vrc7::Vrc7;

/// Create a mapper instance from ROM data.
///
/// Returns the appropriate mapper implementation based on the ROM header's
/// mapper number. Returns an error if the mapper is not supported.
///
/// # Errors
///
/// Returns `RomError::UnsupportedMapper` if the mapper number is not
/// implemented in this crate.
///
/// # Example
///
/// ```no_run
/// use nesforge_mappers::{Rom, create_mapper};
///
/// let rom_data = std::fs::read("game.nes").expect("Failed to read ROM");
/// let rom = Rom::load(&rom_data).expect("Failed to parse ROM");
/// let mapper = create_mapper(&rom).expect("Unsupported mapper");
///
/// println!("Mapper: {} ({})", mapper.mapper_name(), mapper.mapper_number());
/// ```
pub fn create_mapper(rom: &Rom) -> Result<Box<dyn Mapper>, RomError> {
    match rom.header.mapper_number {
        0 => Ok(Box::new(Nrom::new(rom))),
        1 => Ok(Box::new(Mmc1::new(rom))),
        2 => Ok(Box::new(Uxrom::new(rom))),
        3 => Ok(Box::new(Cnrom::new(rom))),
        4 => Ok(Box::new(Mmc3::new(rom))),
        5 => Ok(Box::new(Mmc5::new(rom))),
        7 => Ok(Box::new(Axrom::new(rom))),
        9 => Ok(Box::new(Mmc2::new(rom))),
        10 => Ok(Box::new(Mmc2::new_mmc4(rom))),
        11 => Ok(Box::new(ColorDreams::new(rom))),
        16 => Ok(Box::new(Bandai::new(rom))),
        19 => Ok(Box::new(Namco163::new(rom))),
        20 => Ok(Box::new(Fds::new(rom))),
        21 => Ok(Box::new(Vrc::new_021(rom))),
        22 => Ok(Box::new(Vrc::new_022(rom))),
        23 => Ok(Box::new(Vrc::new_023(rom))),
        24 => Ok(Box::new(Vrc6::new_024(rom))),
        25 => Ok(Box::new(Vrc::new_025(rom))),
        26 => Ok(Box::new(Vrc6::new_026(rom))),
        34 => Ok(Box::new(Bnrom::new(rom))),
        66 => Ok(Box::new(Gxrom::new(rom))),
        69 => Ok(Box::new(Fme7::new(rom))),
        71 => Ok(Box::new(Camerica::new(rom))),
        79 => Ok(Box::new(Nina::new(rom))),
        85 => Ok(Box::new(Vrc7::new(rom))),
        206 => Ok(Box::new(Namcot108::new(rom))),
        n => Err(RomError::UnsupportedMapper(n)),
    }
}

/// Get a list of supported mapper numbers.
#[must_use]
pub fn supported_mappers() -> &'static [u16] {
    &[
        0, 1, 2, 3, 4, 5, 7, 9, 10, 11, 16, 19, 20, 21, 22, 23, 24, 25, 26, 34, 66, 69, 71, 79,
        85, 206,
    ]
}

/// Check if a mapper number is supported.
#[must_use]
pub fn is_mapper_supported(mapper: u16) -> bool {
    supported_mappers().contains(&mapper)
}

/// Get the name of a mapper by number.
#[must_use]
pub fn mapper_name(mapper: u16) -> Option<&'static str> {
    match mapper {
        0 => Some("NROM"),
        1 => Some("MMC1"),
        2 => Some("UxROM"),
        3 => Some("CNROM"),
        4 => Some("MMC3"),
        5 => Some("MMC5"),
        7 => Some("AxROM"),
        9 => Some("MMC2"),
        10 => Some("MMC4"),
        11 => Some("Color Dreams"),
        16 => Some("Bandai FCG"),
        19 => Some("Namco 163"),
        20 => Some("FDS"),
        21 => Some("VRC4"),
        22 => Some("VRC2"),
        23 => Some("VRC2/VRC4"),
        24 => Some("VRC6a"),
        25 => Some("VRC2/VRC4"),
        26 => Some("VRC6b"),
        34 => Some("BNROM"),
        66 => Some("GxROM"),
        69 => Some("FME-7"),
        71 => Some("Camerica/Codemasters"),
        79 => Some("NINA-03/06"),
        85 => Some("VRC7"),
        206 => Some("Namcot 108"),
        _ => None,
    }
}
