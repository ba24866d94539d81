// The orchestrator. One step is at most one interrupt service plus one instruction, after which every clocked device
// is advanced by the same number of cycles. Interrupt requests raised during that advance sit in IF until the next
// step services them. A frame is 70224 clock cycles; step_frame keeps whatever it overshoots as a head start on the
// next frame rather than re-aligning to the top of the screen.
use super::cartridge::{self, Cartridge};
use super::cpu::Cpu;
use super::error::Error;
use super::gpu::{SCREEN_H, SCREEN_W};
use super::joypad::InputEvent;
use super::mmunit::Mmunit;

pub const CYCLES_PER_FRAME: u32 = 70224;

// One finished frame: the RGBA picture and the audio accumulated while it was drawn.
pub struct Frame {
    pub video: Vec<u8>,
    pub audio: Vec<f32>,
}

pub struct MotherBoard {
    pub cpu: Cpu,
    pub mmu: Option<Mmunit>,
    clock: u32,
}

impl MotherBoard {
    pub fn power_up() -> Self {
        Self { cpu: Cpu::power_up(), mmu: None, clock: 0 }
    }

    // Builds a cartridge from the raw image and wires a fresh machine around it. On error the previous state is
    // kept untouched.
    pub fn load_rom(&mut self, rom: Vec<u8>) -> Result<(), Error> {
        let cart = cartridge::power_up(rom)?;
        self.mmu = Some(Mmunit::power_up(cart));
        self.cpu = Cpu::power_up();
        self.clock = 0;
        Ok(())
    }

    pub fn load_ram(&mut self, data: &[u8]) -> Result<(), Error> {
        self.mmu.as_mut().ok_or(Error::NoCartridge)?.cartridge.load_ram(data)
    }

    pub fn save_ram(&self) -> Result<Vec<u8>, Error> {
        self.mmu.as_ref().ok_or(Error::NoCartridge)?.cartridge.dump_ram()
    }

    pub fn game_title(&self) -> Result<String, Error> {
        Ok(self.mmu.as_ref().ok_or(Error::NoCartridge)?.cartridge.title())
    }

    pub fn input_event(&mut self, event: InputEvent) {
        if let Some(mmu) = &mut self.mmu {
            mmu.joypad.handle_input(event);
        }
    }

    // Execute a single instruction and drag the rest of the machine along. Returns the clock cycles spent.
    pub fn step(&mut self) -> Result<u32, Error> {
        let mmu = self.mmu.as_mut().ok_or(Error::NoCartridge)?;
        let cycles = self.cpu.next(mmu)? * 4;
        mmu.next(cycles);
        Ok(cycles)
    }

    pub fn step_frame(&mut self) -> Result<Frame, Error> {
        while self.clock < CYCLES_PER_FRAME {
            let mmu = self.mmu.as_mut().ok_or(Error::NoCartridge)?;
            let cycles = self.cpu.next(mmu)? * 4;
            mmu.next(cycles);
            self.clock += cycles;
        }
        self.clock -= CYCLES_PER_FRAME;

        let mmu = self.mmu.as_mut().ok_or(Error::NoCartridge)?;
        let mut video = Vec::with_capacity(SCREEN_W * SCREEN_H * 4);
        for line in mmu.gpu.data.iter() {
            for pixel in line.iter() {
                video.extend_from_slice(pixel);
            }
        }
        Ok(Frame { video, audio: mmu.apu.take_samples() })
    }

    // Bytes the running program has pushed through the serial debug path so far.
    pub fn serial_output(&mut self) -> Vec<u8> {
        match &mut self.mmu {
            Some(mmu) => std::mem::take(&mut mmu.serial.buffer),
            None => vec![],
        }
    }
}
