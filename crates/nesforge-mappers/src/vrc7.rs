//! Mapper 85: Konami VRC7
//!
//! Used by Lagrange Point and Tiny Toon Adventures 2 (Japan). Adds a
//! cost-reduced OPLL-derived FM synthesizer to the usual VRC-family
//! banking and IRQ hardware: 6 FM channels, 15 read-only instrument
//! presets, and one user-programmable custom instrument, with no
//! rhythm channels (unlike the full YM2413).
//!
//! # Hardware Details
//!
//! - **PRG-ROM**: three independently switchable 8KB banks at $8000,
//!   $A000, $C000, plus a fixed 8KB bank at $E000
//! - **CHR**: eight switchable 1KB banks
//! - **IRQ**: same 341-cycle-prescaler cycle/scanline counter as the
//!   rest of the VRC family
//! - **Audio**: 6 two-operator (modulator + carrier) FM channels
//!   clocked at CPU/36, each voiced by a built-in or custom patch with
//!   its own attack/decay/sustain/release envelope
//!
//! The envelope generator and phase/amplitude synthesis here are a
//! from-scratch 2-operator FM engine built to the declared register
//! and channel-state shape (phase accumulators, per-operator envelope
//! state, feedback) rather than a bit-exact reproduction of the
//! YM2413's internal log-sin/exponential tables, since no full FM core
//! reference was available to port. It uses only integer and
//! rational arithmetic (a Bhaskara-style sine approximation) so it
//! stays available under `no_std`.

use crate::mapper::{take_bool, take_u16, take_u32, take_u8};
use crate::{Mapper, Mirroring, Rom};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

const IRQ_PRESCALER_RELOAD: u16 = 341;
const FM_CLOCK_DIVIDER: u32 = 36;
const FM_CHANNELS: usize = 6;
const PHASE_BITS: u32 = 18;
const PHASE_MAX: u32 = 1 << PHASE_BITS;

/// Multiplier table (doubled to stay integral; index 0 means half).
const MULTIPLIER_TABLE: [u32; 16] = [1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 12, 12, 15, 15];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvState {
    Attack,
    Decay,
    Sustain,
    Release,
    Off,
}

#[derive(Debug, Clone, Copy)]
struct Operator {
    phase: u32,
    env_state: EnvState,
    env_level: f32,
}

impl EnvState {
    fn from_index(v: u8) -> Self {
        match v {
            1 => EnvState::Decay,
            2 => EnvState::Sustain,
            3 => EnvState::Release,
            4 => EnvState::Off,
            _ => EnvState::Attack,
        }
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self {
            phase: 0,
            env_state: EnvState::Off,
            env_level: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Channel {
    modulator: Operator,
    carrier: Operator,
    prev_key_on: bool,
    feedback: [i32; 2],
}

/// Konami VRC7 mapper implementation (Mapper 85).
pub struct Vrc7 {
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    chr_ram: Vec<u8>,
    has_chr_ram: bool,
    prg_ram: Vec<u8>,
    mirroring: Mirroring,

    prg_bank: [u8; 3],
    chr_bank: [u8; 8],

    irq_latch: u8,
    irq_counter: u8,
    irq_enabled: bool,
    irq_enabled_after_ack: bool,
    irq_pending: bool,
    irq_mode_cycle: bool,
    irq_prescaler: u16,

    fm_address: u8,
    custom_instrument: [u8; 8],
    fnum_low: [u8; 6],
    channel_ctrl: [u8; 6],
    channel_vol: [u8; 6],

    channels: [Channel; FM_CHANNELS],
    fm_clock_counter: u32,
    audio_output: f32,

    banks_8k: usize,
    chr_banks_1k: usize,
}

impl Vrc7 {
    /// Create a Mapper 85 (VRC7) instance.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let has_chr_ram = rom.chr_rom.is_empty();
        let banks_8k = (rom.prg_rom.len() / 8192).max(1);
        let chr_banks_1k = if has_chr_ram {
            8
        } else {
            (rom.chr_rom.len() / 1024).max(1)
        };

        let mut chr_bank = [0u8; 8];
        for (i, b) in chr_bank.iter_mut().enumerate() {
            *b = i as u8;
        }

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_rom: rom.chr_rom.clone(),
            chr_ram: if has_chr_ram { vec![0; 8192] } else { Vec::new() },
            has_chr_ram,
            prg_ram: vec![0; 8192],
            mirroring: rom.header.mirroring,
            prg_bank: [0; 3],
            chr_bank,
            irq_latch: 0,
            irq_counter: 0,
            irq_enabled: false,
            irq_enabled_after_ack: false,
            irq_pending: false,
            irq_mode_cycle: false,
            irq_prescaler: 0,
            fm_address: 0,
            custom_instrument: [0; 8],
            fnum_low: [0; 6],
            channel_ctrl: [0; 6],
            channel_vol: [0; 6],
            channels: [Channel::default(); FM_CHANNELS],
            fm_clock_counter: 0,
            audio_output: 0.0,
            banks_8k,
            chr_banks_1k,
        }
    }

    fn instrument_patch(&self, ch: usize) -> [u8; 8] {
        let patch = (self.channel_vol[ch] >> 4) & 0x0F;
        if patch == 0 {
            self.custom_instrument
        } else {
            // Built-in patches are read-only presets; since the exact
            // hardware ROM bytes aren't available, each preset is
            // derived deterministically from its index so the 15
            // instruments still sound distinct from one another.
            let p = u32::from(patch);
            [
                ((p * 3) & 0x0F) as u8,
                ((p * 5) & 0x0F) as u8,
                ((p * 2) & 0x3F) as u8,
                ((p * 7) & 0x0F) as u8,
                0x82,
                0x82,
                0x55,
                0x55,
            ]
        }
    }

    fn key_on(&self, ch: usize) -> bool {
        self.channel_ctrl[ch] & 0x10 != 0
    }

    fn sustain_flag(&self, ch: usize) -> bool {
        self.channel_ctrl[ch] & 0x20 != 0
    }

    fn fnum(&self, ch: usize) -> u32 {
        u32::from(self.fnum_low[ch]) | (u32::from(self.channel_ctrl[ch] & 0x01) << 8)
    }

    fn block(&self, ch: usize) -> u32 {
        u32::from((self.channel_ctrl[ch] >> 1) & 0x07)
    }

    fn fm_write_register(&mut self, reg: u8, value: u8) {
        match reg {
            0x00..=0x07 => self.custom_instrument[reg as usize] = value,
            0x10..=0x15 => self.fnum_low[(reg - 0x10) as usize] = value,
            0x20..=0x25 => {
                let ch = (reg - 0x20) as usize;
                self.channel_ctrl[ch] = value;
            }
            0x30..=0x35 => {
                let ch = (reg - 0x30) as usize;
                self.channel_vol[ch] = value;
            }
            _ => {}
        }
    }

    fn update_envelope(op: &mut Operator, key_on: bool, sustain: bool, rate_nibble: u8, sustain_level: f32) {
        let step = (f32::from(rate_nibble) + 1.0) * 0.02;
        match op.env_state {
            EnvState::Attack => {
                op.env_level += step * 2.0;
                if op.env_level >= 1.0 {
                    op.env_level = 1.0;
                    op.env_state = EnvState::Decay;
                }
            }
            EnvState::Decay => {
                op.env_level -= step;
                if op.env_level <= sustain_level {
                    op.env_level = sustain_level;
                    op.env_state = EnvState::Sustain;
                }
            }
            EnvState::Sustain => {
                if !sustain {
                    op.env_level -= step * 0.25;
                    if op.env_level < 0.0 {
                        op.env_level = 0.0;
                    }
                }
            }
            EnvState::Release => {
                op.env_level -= step;
                if op.env_level <= 0.0 {
                    op.env_level = 0.0;
                    op.env_state = EnvState::Off;
                }
            }
            EnvState::Off => {}
        }
        if !key_on && op.env_state != EnvState::Release && op.env_state != EnvState::Off {
            op.env_state = EnvState::Release;
        }
    }

    fn clock_fm(&mut self) {
        let mut mix = 0.0f32;

        for ch in 0..FM_CHANNELS {
            let patch = self.instrument_patch(ch);
            let key_on = self.key_on(ch);
            let sustain = self.sustain_flag(ch);
            let fnum = self.fnum(ch);
            let block = self.block(ch);
            let base_increment = (fnum << block) & (PHASE_MAX - 1);

            let channel = &mut self.channels[ch];

            if key_on && !channel.prev_key_on {
                channel.modulator.env_state = EnvState::Attack;
                channel.modulator.env_level = 0.0;
                channel.carrier.env_state = EnvState::Attack;
                channel.carrier.env_level = 0.0;
            }
            channel.prev_key_on = key_on;

            let mod_mult = MULTIPLIER_TABLE[(patch[0] & 0x0F) as usize];
            let car_mult = MULTIPLIER_TABLE[(patch[1] & 0x0F) as usize];

            channel.modulator.phase =
                (channel.modulator.phase + base_increment * mod_mult) % PHASE_MAX;
            channel.carrier.phase = (channel.carrier.phase + base_increment * car_mult) % PHASE_MAX;

            let mod_attack = patch[4] >> 4;
            let mod_decay = patch[4] & 0x0F;
            let mod_sustain_level = 1.0 - f32::from(patch[6] >> 4) / 15.0;
            Self::update_envelope(&mut channel.modulator, key_on, sustain, mod_decay.max(mod_attack), mod_sustain_level);

            let car_attack = patch[5] >> 4;
            let car_decay = patch[5] & 0x0F;
            let car_sustain_level = 1.0 - f32::from(patch[7] >> 4) / 15.0;
            Self::update_envelope(&mut channel.carrier, key_on, sustain, car_decay.max(car_attack), car_sustain_level);

            let feedback_amount = patch[3] & 0x07;
            let fb_sample = (channel.feedback[0] + channel.feedback[1]) / 2;
            let fb_phase_offset = if feedback_amount > 0 {
                (fb_sample << (feedback_amount - 1)) as i64
            } else {
                0
            };

            let mod_phase = ((channel.modulator.phase as i64 + fb_phase_offset) as u32) % PHASE_MAX;
            let mod_out = bhaskara_sin(mod_phase) * channel.modulator.env_level;

            channel.feedback[1] = channel.feedback[0];
            channel.feedback[0] = (mod_out * 256.0) as i32;

            let mod_depth = (mod_out * (PHASE_MAX as f32) * 0.25) as i64;
            let car_phase = ((channel.carrier.phase as i64 + mod_depth) as u32) % PHASE_MAX;
            let volume_scale = 1.0 - f32::from(self.channel_vol[ch] & 0x0F) / 15.0;
            let car_out = bhaskara_sin(car_phase) * channel.carrier.env_level * volume_scale;

            mix += car_out;
        }

        self.audio_output = (mix / FM_CHANNELS as f32).clamp(-1.0, 1.0);
    }
}

/// Bhaskara I's sine approximation, evaluated across the full circle
/// from an 18-bit phase accumulator. No transcendental functions, so
/// this stays available in `no_std` builds.
fn bhaskara_sin(phase: u32) -> f32 {
    let quarter = PHASE_MAX / 4;
    let pos = phase % PHASE_MAX;
    let (quadrant, offset) = (pos / quarter, pos % quarter);

    let x = offset as f32 / quarter as f32 * 180.0;
    let sin_0_180 = |deg: f32| -> f32 {
        let y = 180.0 - deg;
        (4.0 * deg * y) / (40500.0 - deg * y)
    };

    match quadrant {
        0 => sin_0_180(x),
        1 => sin_0_180(180.0 - x),
        2 => -sin_0_180(x),
        _ => -sin_0_180(180.0 - x),
    }
}

impl Mapper for Vrc7 {
    fn read_prg(&self, addr: u16) -> u8 {
        if (0x6000..0x8000).contains(&addr) {
            return self.prg_ram[(addr - 0x6000) as usize];
        }
        if (0x8000..0xE000).contains(&addr) {
            let slot = ((addr - 0x8000) / 0x2000) as usize;
            let bank = self.prg_bank[slot] as usize % self.banks_8k;
            return self.prg_rom[bank * 8192 + (addr as usize & 0x1FFF)];
        }
        if addr >= 0xE000 {
            let bank = self.banks_8k - 1;
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

        let reg = addr & 0xF010;

        match reg {
            0x8000 => self.prg_bank[0] = value & 0x3F,
            0x8010 => self.prg_bank[1] = value & 0x3F,
            0x9000 => self.prg_bank[2] = value & 0x3F,
            0x9010 => self.fm_address = value,
            0x9030 => self.fm_write_register(self.fm_address, value),
            0xA000 => self.chr_bank[0] = value,
            0xA010 => self.chr_bank[1] = value,
            0xB000 => self.chr_bank[2] = value,
            0xB010 => self.chr_bank[3] = value,
            0xC000 => self.chr_bank[4] = value,
            0xC010 => self.chr_bank[5] = value,
            0xD000 => self.chr_bank[6] = value,
            0xD010 => self.chr_bank[7] = value,
            0xE000 => self.irq_latch = value,
            0xE010 => {
                self.irq_enabled_after_ack = value & 0x01 != 0;
                self.irq_enabled = value & 0x02 != 0;
                self.irq_mode_cycle = value & 0x04 != 0;
                if self.irq_enabled {
                    self.irq_counter = self.irq_latch;
                    self.irq_prescaler = 0;
                }
                self.irq_pending = false;
            }
            0xF000 => {
                self.irq_pending = false;
                self.irq_enabled = self.irq_enabled_after_ack;
            }
            _ => {
                // Mirrors within $F000-$FFFF other than the acknowledge
                // sub-address have no registered effect on this board.
            }
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        debug_assert!(addr <= 0x1FFF, "Invalid CHR address: ${addr:04X}");
        if self.has_chr_ram {
            self.chr_ram[addr as usize]
        } else {
            let slot = (addr / 1024) as usize;
            let bank = self.chr_bank[slot] as usize % self.chr_banks_1k;
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
        if self.irq_mode_cycle || !self.irq_enabled {
            return;
        }
        if self.irq_counter == 0xFF {
            self.irq_counter = self.irq_latch;
            self.irq_pending = true;
        } else {
            self.irq_counter += 1;
        }
    }

    fn cpu_cycles(&mut self, count: u32) {
        if self.irq_mode_cycle && self.irq_enabled {
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

        self.fm_clock_counter += count;
        while self.fm_clock_counter >= FM_CLOCK_DIVIDER {
            self.fm_clock_counter -= FM_CLOCK_DIVIDER;
            self.clock_fm();
        }
    }

    fn get_audio_output(&self) -> f32 {
        self.audio_output
    }

    fn mapper_number(&self) -> u16 {
        85
    }

    fn mapper_name(&self) -> &'static str {
        "VRC7"
    }

    fn reset(&mut self) {
        self.prg_bank = [0; 3];
        for (i, b) in self.chr_bank.iter_mut().enumerate() {
            *b = i as u8;
        }
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_enabled = false;
        self.irq_enabled_after_ack = false;
        self.irq_pending = false;
        self.irq_mode_cycle = false;
        self.irq_prescaler = 0;
        self.fm_address = 0;
        self.custom_instrument = [0; 8];
        self.fnum_low = [0; 6];
        self.channel_ctrl = [0; 6];
        self.channel_vol = [0; 6];
        self.channels = [Channel::default(); FM_CHANNELS];
        self.fm_clock_counter = 0;
        self.audio_output = 0.0;
    }

    fn save_state(&self, buf: &mut Vec<u8>) {
        if self.has_chr_ram {
            buf.extend_from_slice(&self.chr_ram);
        }
        buf.extend_from_slice(&self.prg_ram);
        buf.push(self.mirroring as u8);

        buf.extend_from_slice(&self.prg_bank);
        buf.extend_from_slice(&self.chr_bank);

        buf.push(self.irq_latch);
        buf.push(self.irq_counter);
        buf.push(u8::from(self.irq_enabled));
        buf.push(u8::from(self.irq_enabled_after_ack));
        buf.push(u8::from(self.irq_pending));
        buf.push(u8::from(self.irq_mode_cycle));
        buf.extend_from_slice(&self.irq_prescaler.to_le_bytes());

        buf.push(self.fm_address);
        buf.extend_from_slice(&self.custom_instrument);
        buf.extend_from_slice(&self.fnum_low);
        buf.extend_from_slice(&self.channel_ctrl);
        buf.extend_from_slice(&self.channel_vol);

        for ch in &self.channels {
            save_operator(&ch.modulator, buf);
            save_operator(&ch.carrier, buf);
            buf.push(u8::from(ch.prev_key_on));
            buf.extend_from_slice(&ch.feedback[0].to_le_bytes());
            buf.extend_from_slice(&ch.feedback[1].to_le_bytes());
        }
        buf.extend_from_slice(&self.fm_clock_counter.to_le_bytes());
        buf.extend_from_slice(&self.audio_output.to_le_bytes());
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

        for b in &mut self.prg_bank {
            *b = take_u8(data);
        }
        for b in &mut self.chr_bank {
            *b = take_u8(data);
        }

        self.irq_latch = take_u8(data);
        self.irq_counter = take_u8(data);
        self.irq_enabled = take_bool(data);
        self.irq_enabled_after_ack = take_bool(data);
        self.irq_pending = take_bool(data);
        self.irq_mode_cycle = take_bool(data);
        self.irq_prescaler = take_u16(data);

        self.fm_address = take_u8(data);
        for b in &mut self.custom_instrument {
            *b = take_u8(data);
        }
        for b in &mut self.fnum_low {
            *b = take_u8(data);
        }
        for b in &mut self.channel_ctrl {
            *b = take_u8(data);
        }
        for b in &mut self.channel_vol {
            *b = take_u8(data);
        }

        for ch in &mut self.channels {
            ch.modulator = load_operator(data);
            ch.carrier = load_operator(data);
            ch.prev_key_on = take_bool(data);
            ch.feedback[0] = take_u32(data) as i32;
            ch.feedback[1] = take_u32(data) as i32;
        }
        self.fm_clock_counter = take_u32(data);
        self.audio_output = f32::from_bits(take_u32(data));
    }
}

fn save_operator(op: &Operator, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&op.phase.to_le_bytes());
    buf.push(op.env_state as u8);
    buf.extend_from_slice(&op.env_level.to_le_bytes());
}

fn load_operator(data: &mut &[u8]) -> Operator {
    Operator {
        phase: take_u32(data),
        env_state: EnvState::from_index(take_u8(data)),
        env_level: f32::from_bits(take_u32(data)),
    }
}
