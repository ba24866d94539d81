// The eight buttons are wired as a 2x4 matrix behind a single register.
//
// FF00 - P1/JOYP - Joypad (R/W)
//
// Bit 5 - P15 Select Button Keys      (0=Select)
// Bit 4 - P14 Select Direction Keys   (0=Select)
// Bit 3 - P13 Input Down  or Start    (0=Pressed) (Read Only)
// Bit 2 - P12 Input Up    or Select   (0=Pressed) (Read Only)
// Bit 1 - P11 Input Left  or Button B (0=Pressed) (Read Only)
// Bit 0 - P10 Input Right or Button A (0=Pressed) (Read Only)
use super::intf::{Flag, Intf};
use super::memory::Memory;
use std::cell::RefCell;
use std::rc::Rc;

#[rustfmt::skip]
#[derive(Clone, Copy)]
pub enum JoypadKey {
    Right  = 0b0000_0001,
    Left   = 0b0000_0010,
    Up     = 0b0000_0100,
    Down   = 0b0000_1000,
    A      = 0b0001_0000,
    B      = 0b0010_0000,
    Select = 0b0100_0000,
    Start  = 0b1000_0000,
}

// The host-facing input sink: one of the eight keys going down or up.
#[derive(Clone, Copy)]
pub enum InputEvent {
    Pressed(JoypadKey),
    Released(JoypadKey),
}

pub struct Joypad {
    intf: Rc<RefCell<Intf>>,
    // All eight keys, 0 = pressed. Directions in the low nibble, buttons in the high nibble.
    matrix: u8,
    select: u8,
}

impl Joypad {
    pub fn power_up(intf: Rc<RefCell<Intf>>) -> Self {
        Self { intf, matrix: 0xff, select: 0x00 }
    }

    pub fn keydown(&mut self, key: JoypadKey) {
        self.matrix &= !(key as u8);
        self.intf.borrow_mut().hi(Flag::Joypad);
    }

    pub fn keyup(&mut self, key: JoypadKey) {
        self.matrix |= key as u8;
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::Pressed(key) => self.keydown(key),
            InputEvent::Released(key) => self.keyup(key),
        }
    }
}

impl Memory for Joypad {
    fn get(&self, a: u16) -> u8 {
        if a != 0xff00 {
            return 0xff;
        }
        if self.select & 0b0001_0000 == 0x00 {
            return self.select | (self.matrix & 0x0f);
        }
        if self.select & 0b0010_0000 == 0x00 {
            return self.select | (self.matrix >> 4);
        }
        self.select
    }

    fn set(&mut self, a: u16, v: u8) {
        if a == 0xff00 {
            // Only the two select lines are writable.
            self.select = v & 0b0011_0000;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joypad() -> (Joypad, Rc<RefCell<Intf>>) {
        let intf = Rc::new(RefCell::new(Intf::power_up()));
        (Joypad::power_up(intf.clone()), intf)
    }

    #[test]
    fn direction_row_reads_pressed_bits_low() {
        let (mut j, _) = joypad();
        j.handle_input(InputEvent::Pressed(JoypadKey::Left));
        j.set(0xff00, 0b0010_0000); // select directions
        assert_eq!(j.get(0xff00) & 0x0f, 0b1101);
        j.handle_input(InputEvent::Released(JoypadKey::Left));
        assert_eq!(j.get(0xff00) & 0x0f, 0b1111);
    }

    #[test]
    fn button_row_is_independent_of_directions() {
        let (mut j, _) = joypad();
        j.keydown(JoypadKey::Start);
        j.keydown(JoypadKey::Right);
        j.set(0xff00, 0b0001_0000); // select buttons
        assert_eq!(j.get(0xff00) & 0x0f, 0b0111);
    }

    #[test]
    fn keydown_requests_joypad_interrupt() {
        let (mut j, intf) = joypad();
        j.keydown(JoypadKey::A);
        assert_eq!(intf.borrow().data, 1 << Flag::Joypad as u8);
    }
}
