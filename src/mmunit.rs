// Address routing. Every address in 0000-FFFF belongs to exactly one arm below:
//
// 0000-3FFF   16 KiB rom bank 00 (cartridge, fixed)
// 4000-7FFF   16 KiB rom bank NN (cartridge, switched by the MBC)
// 8000-9FFF   8 KiB video ram
// A000-BFFF   8 KiB external ram or RTC (cartridge, if any)
// C000-DFFF   8 KiB work ram
// E000-FDFF   Echo of C000-DDFF
// FE00-FE9F   Sprite attribute table (OAM)
// FEA0-FEFF   Not usable
// FF00-FF7F   I/O ports
// FF80-FFFE   High ram
// FFFF        Interrupt enable register
//
// Unmapped reads return 0xFF and log; unmapped writes are dropped and log. Nothing here is fatal.
use super::apu::Apu;
use super::cartridge::Cartridge;
use super::gpu::Gpu;
use super::intf::Intf;
use super::joypad::Joypad;
use super::memory::Memory;
use super::serial::Serial;
use super::timer::Timer;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Mmunit {
    pub cartridge: Box<dyn Cartridge>,
    pub apu: Apu,
    pub gpu: Gpu,
    pub joypad: Joypad,
    pub serial: Serial,
    pub timer: Timer,
    pub intf: Rc<RefCell<Intf>>,
    inte: u8,
    wram: [u8; 0x2000],
    hram: [u8; 0x7f],
}

impl Mmunit {
    pub fn power_up(cartridge: Box<dyn Cartridge>) -> Self {
        let intf = Rc::new(RefCell::new(Intf::power_up()));
        let mut r = Self {
            cartridge,
            apu: Apu::power_up(48000),
            gpu: Gpu::power_up(intf.clone()),
            joypad: Joypad::power_up(intf.clone()),
            serial: Serial::power_up(intf.clone()),
            timer: Timer::power_up(intf.clone()),
            intf,
            inte: 0x00,
            wram: [0x00; 0x2000],
            hram: [0x00; 0x7f],
        };
        // I/O register contents after the boot rom hands over.
        r.set(0xff05, 0x00);
        r.set(0xff06, 0x00);
        r.set(0xff07, 0x00);
        r.set(0xff10, 0x80);
        r.set(0xff11, 0xbf);
        r.set(0xff12, 0xf3);
        r.set(0xff14, 0xbf);
        r.set(0xff16, 0x3f);
        r.set(0xff17, 0x00);
        r.set(0xff19, 0xbf);
        r.set(0xff1a, 0x7f);
        r.set(0xff1b, 0xff);
        r.set(0xff1c, 0x9f);
        r.set(0xff1e, 0xff);
        r.set(0xff20, 0xff);
        r.set(0xff21, 0x00);
        r.set(0xff22, 0x00);
        r.set(0xff23, 0xbf);
        r.set(0xff24, 0x77);
        r.set(0xff25, 0xf3);
        r.set(0xff26, 0xf1);
        r.set(0xff40, 0x91);
        r.set(0xff42, 0x00);
        r.set(0xff43, 0x00);
        r.set(0xff45, 0x00);
        r.set(0xff47, 0xfc);
        r.set(0xff48, 0xff);
        r.set(0xff49, 0xff);
        r.set(0xff4a, 0x00);
        r.set(0xff4b, 0x00);
        r
    }

    // Advance every clocked device by the cycles the last instruction took.
    pub fn next(&mut self, cycles: u32) {
        self.timer.next(cycles);
        self.gpu.next(cycles);
        self.apu.next(cycles);
    }

    // FF46: copy the 160 byte page at N << 8 into OAM. The copy itself is synchronous; the bus stays blocked for
    // 640 cycles, which the gpu enforces.
    fn run_dma(&mut self, v: u8) {
        let base = u16::from(v) << 8;
        let mut page = [0x00; 0xa0];
        for (i, b) in page.iter_mut().enumerate() {
            *b = self.get(base + i as u16);
        }
        self.gpu.dma(&page);
    }
}

impl Memory for Mmunit {
    fn get(&self, a: u16) -> u8 {
        match a {
            0x0000..=0x7fff => self.cartridge.get(a),
            0x8000..=0x9fff => self.gpu.get(a),
            0xa000..=0xbfff => self.cartridge.get(a),
            0xc000..=0xdfff => self.wram[a as usize - 0xc000],
            0xe000..=0xfdff => self.wram[a as usize - 0xe000],
            0xfe00..=0xfe9f => self.gpu.get(a),
            0xfea0..=0xfeff => 0xff,
            0xff00 => self.joypad.get(a),
            0xff01..=0xff02 => self.serial.get(a),
            0xff04..=0xff07 => self.timer.get(a),
            0xff0f => self.intf.borrow().data,
            0xff10..=0xff3f => self.apu.get(a),
            0xff40..=0xff4b => self.gpu.get(a),
            0xff80..=0xfffe => self.hram[a as usize - 0xff80],
            0xffff => self.inte,
            _ => {
                rog::debugln!("Read from unmapped address 0x{:04x}", a);
                0xff
            }
        }
    }

    fn set(&mut self, a: u16, v: u8) {
        match a {
            0x0000..=0x7fff => self.cartridge.set(a, v),
            0x8000..=0x9fff => self.gpu.set(a, v),
            0xa000..=0xbfff => self.cartridge.set(a, v),
            0xc000..=0xdfff => self.wram[a as usize - 0xc000] = v,
            0xe000..=0xfdff => self.wram[a as usize - 0xe000] = v,
            0xfe00..=0xfe9f => self.gpu.set(a, v),
            0xfea0..=0xfeff => {}
            0xff00 => self.joypad.set(a, v),
            0xff01..=0xff02 => self.serial.set(a, v),
            0xff04..=0xff07 => self.timer.set(a, v),
            0xff0f => self.intf.borrow_mut().data = v,
            0xff10..=0xff3f => self.apu.set(a, v),
            0xff46 => self.run_dma(v),
            0xff40..=0xff4b => self.gpu.set(a, v),
            0xff80..=0xfffe => self.hram[a as usize - 0xff80] = v,
            0xffff => self.inte = v,
            _ => rog::debugln!("Write of 0x{:02x} to unmapped address 0x{:04x}", v, a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge;

    fn mmu() -> Mmunit {
        let mut rom = vec![0x00; 0x8000];
        rom[0x0147] = 0x00;
        Mmunit::power_up(cartridge::power_up(rom).unwrap())
    }

    #[test]
    fn wram_round_trips_and_echoes() {
        let mut m = mmu();
        for a in [0xc000u16, 0xcfff, 0xd000, 0xdfff] {
            m.set(a, 0x5a);
            assert_eq!(m.get(a), 0x5a);
        }
        m.set(0xe000, 0x77);
        assert_eq!(m.get(0xc000), 0x77);
        m.set(0xc123, 0x88);
        assert_eq!(m.get(0xe123), 0x88);
    }

    #[test]
    fn unusable_area_reads_ff_and_ignores_writes() {
        let mut m = mmu();
        m.set(0xfea0, 0x12);
        assert_eq!(m.get(0xfea0), 0xff);
        assert_eq!(m.get(0xfeff), 0xff);
    }

    #[test]
    fn hram_and_interrupt_registers() {
        let mut m = mmu();
        m.set(0xff80, 0x42);
        m.set(0xfffe, 0x24);
        assert_eq!(m.get(0xff80), 0x42);
        assert_eq!(m.get(0xfffe), 0x24);
        m.set(0xffff, 0x1f);
        assert_eq!(m.get(0xffff), 0x1f);
        m.set(0xff0f, 0x05);
        assert_eq!(m.get(0xff0f), 0x05);
    }

    #[test]
    fn word_access_is_little_endian() {
        let mut m = mmu();
        m.set_word(0xc000, 0xbeef);
        assert_eq!(m.get(0xc000), 0xef);
        assert_eq!(m.get(0xc001), 0xbe);
        assert_eq!(m.get_word(0xc000), 0xbeef);
    }

    #[test]
    fn dma_copies_a_page_and_blocks_oam() {
        let mut m = mmu();
        m.set(0xff40, 0x00); // lcd off so only the dma window gates oam
        for i in 0..0xa0 {
            m.set(0xc000 + i, i as u8);
        }
        m.set(0xff46, 0xc0);
        assert_eq!(m.get(0xfe00), 0xff);
        assert_eq!(m.get(0xfe9f), 0xff);
        m.next(640);
        assert_eq!(m.get(0xfe00), 0x00);
        assert_eq!(m.get(0xfe42), 0x42);
        assert_eq!(m.get(0xfe9f), 0x9f);
    }

    #[test]
    fn post_boot_io_state() {
        let m = mmu();
        assert_eq!(m.get(0xff40), 0x91);
        assert_eq!(m.get(0xff47), 0xfc);
        assert_eq!(m.get(0xff26), 0xf1);
    }
}
