// FF04 - DIV: incremented at 16384 Hz, which is once every 256 cycles of the 4194304 Hz clock. Writing any value
// resets it to 0x00.
// FF05 - TIMA: incremented at the rate selected by TAC. On overflow it is reloaded from TMA and a timer interrupt is
// requested.
// FF06 - TMA: the reload value.
// FF07 - TAC: bit 2 enables TIMA, bits 1-0 select the rate:
//   00: 4096 Hz (1024 cycles)   01: 262144 Hz (16 cycles)
//   10: 65536 Hz (64 cycles)    11: 16384 Hz (256 cycles)
use super::clock::Clock;
use super::intf::{Flag, Intf};
use super::memory::Memory;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Timer {
    intf: Rc<RefCell<Intf>>,
    div: u8,
    tima: u8,
    tma: u8,
    tac: u8,
    div_clock: Clock,
    tima_clock: Clock,
}

impl Timer {
    pub fn power_up(intf: Rc<RefCell<Intf>>) -> Self {
        Self {
            intf,
            div: 0x00,
            tima: 0x00,
            tma: 0x00,
            tac: 0x00,
            div_clock: Clock::power_up(256),
            tima_clock: Clock::power_up(1024),
        }
    }

    pub fn next(&mut self, cycles: u32) {
        let n = self.div_clock.next(cycles);
        self.div = self.div.wrapping_add(n as u8);

        if self.tac & 0x04 != 0x00 {
            for _ in 0..self.tima_clock.next(cycles) {
                self.tima = self.tima.wrapping_add(1);
                if self.tima == 0x00 {
                    self.tima = self.tma;
                    self.intf.borrow_mut().hi(Flag::Timer);
                }
            }
        }
    }
}

impl Memory for Timer {
    fn get(&self, a: u16) -> u8 {
        match a {
            0xff04 => self.div,
            0xff05 => self.tima,
            0xff06 => self.tma,
            0xff07 => self.tac,
            _ => 0xff,
        }
    }

    fn set(&mut self, a: u16, v: u8) {
        match a {
            0xff04 => {
                self.div = 0x00;
                self.div_clock.n = 0x00;
            }
            0xff05 => self.tima = v,
            0xff06 => self.tma = v,
            0xff07 => {
                self.tac = v;
                self.tima_clock.period = match v & 0x03 {
                    0x00 => 1024,
                    0x01 => 16,
                    0x02 => 64,
                    _ => 256,
                };
            }
            _ => {}
        }
    }
}
