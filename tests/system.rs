//! Whole-machine scenarios driven through the public MotherBoard api.

#[cfg(test)]
mod tests {
    use dotmatrix::error::Error;
    use dotmatrix::memory::Memory;
    use dotmatrix::motherboard::{MotherBoard, CYCLES_PER_FRAME};

    // A 32 KiB no-MBC image with the usual entry point (NOP; JP 0x0150) and `program` at 0x0150, padded with a
    // jump-to-self.
    fn rom_with(program: &[u8]) -> Vec<u8> {
        let mut rom = vec![0x00; 0x8000];
        rom[0x0100] = 0x00;
        rom[0x0101] = 0xc3;
        rom[0x0102] = 0x50;
        rom[0x0103] = 0x01;
        rom[0x0150..0x0150 + program.len()].copy_from_slice(program);
        let loop_at = 0x0150 + program.len();
        rom[loop_at] = 0xc3;
        rom[loop_at + 1] = (loop_at & 0xff) as u8;
        rom[loop_at + 2] = (loop_at >> 8) as u8;
        for (i, b) in b"SYSTEMTEST".iter().enumerate() {
            rom[0x0134 + i] = *b;
        }
        rom
    }

    fn machine(program: &[u8]) -> MotherBoard {
        let mut mb = MotherBoard::power_up();
        mb.load_rom(rom_with(program)).unwrap();
        mb
    }

    #[test]
    fn frame_model_constants() {
        assert_eq!(CYCLES_PER_FRAME, 70224);
    }

    #[test]
    fn ten_frames_of_an_idle_rom_are_identical() {
        let mut mb = machine(&[]);
        let first = mb.step_frame().unwrap().video;
        assert_eq!(first.len(), 160 * 144 * 4);
        for _ in 0..9 {
            let frame = mb.step_frame().unwrap();
            assert_eq!(frame.video, first);
        }
        // Zeroed tiles through the boot palette render the lightest shade.
        assert!(first.iter().all(|b| *b == 0xff));
    }

    #[test]
    fn rejects_undersized_rom_and_stays_usable() {
        let mut mb = machine(&[]);
        match mb.load_rom(vec![0x00; 0x8000 - 1]) {
            Err(Error::RomSize(n)) => assert_eq!(n, 0x8000 - 1),
            r => panic!("expected a size rejection, got {:?}", r.map(|_| ())),
        }
        assert_eq!(mb.game_title().unwrap(), "SYSTEMTEST");
    }

    #[test]
    fn serial_debug_protocol_collects_blargg_output() {
        // For each byte: LD A, b; LDH (0x01), A; LD A, 0x81; LDH (0x02), A
        let mut program = vec![];
        for b in b"Passed\n" {
            program.extend_from_slice(&[0x3e, *b, 0xe0, 0x01, 0x3e, 0x81, 0xe0, 0x02]);
        }
        let mut mb = machine(&program);
        mb.step_frame().unwrap();
        assert_eq!(mb.serial_output(), b"Passed\n");
        assert!(mb.serial_output().is_empty());
    }

    #[test]
    fn lcd_off_blanks_the_screen_and_parks_ly() {
        let mut mb = machine(&[]);
        {
            let mmu = mb.mmu.as_mut().unwrap();
            mmu.set(0xff40, 0x00);
            assert_eq!(mmu.get(0xff44), 153);
            mmu.set(0xff44, 0x99);
            assert_eq!(mmu.get(0xff44), 0);
        }
        let frame = mb.step_frame().unwrap();
        assert!(frame.video.iter().all(|b| *b == 0xff));
        assert_eq!(mb.mmu.as_ref().unwrap().get(0xff44), 0);
    }

    #[test]
    fn oam_dma_blocks_for_640_cycles_then_exposes_the_page() {
        // LD A, 0xc0; LDH (0x46), A
        let mut mb = machine(&[0x3e, 0xc0, 0xe0, 0x46]);
        {
            let mmu = mb.mmu.as_mut().unwrap();
            mmu.set(0xff40, 0x00); // keep mode gating out of the way
            for i in 0..0xa0u16 {
                mmu.set(0xc000 + i, i as u8);
            }
        }
        mb.step().unwrap(); // NOP
        mb.step().unwrap(); // JP 0x0150
        mb.step().unwrap(); // LD A
        mb.step().unwrap(); // LDH launches the transfer
        let mut waited = 0;
        {
            let mmu = mb.mmu.as_ref().unwrap();
            assert_eq!(mmu.get(0xfe00), 0xff);
            assert_eq!(mmu.get(0xfe42), 0xff);
        }
        while waited < 640 {
            waited += mb.step().unwrap();
        }
        let mmu = mb.mmu.as_ref().unwrap();
        assert_eq!(mmu.get(0xfe00), 0x00);
        assert_eq!(mmu.get(0xfe42), 0x42);
        assert_eq!(mmu.get(0xfe9f), 0x9f);
    }

    #[test]
    fn vblank_interrupt_fires_once_per_frame() {
        // EI; loop. Enable only VBLANK. The handler at 0x40 is RETI (0xd9).
        let mut rom = rom_with(&[0xfb]);
        rom[0x0040] = 0xd9;
        let mut mb = MotherBoard::power_up();
        mb.load_rom(rom).unwrap();
        mb.mmu.as_mut().unwrap().set(0xffff, 0x01);
        // Count how many times the request bit is consumed over three frames by watching the handler run: every
        // service pushes the loop address, so track IF directly instead.
        let mut services = 0;
        let mut cycles = 0u64;
        while cycles < 3 * u64::from(CYCLES_PER_FRAME) {
            let pc_before = mb.cpu.reg.pc;
            cycles += u64::from(mb.step().unwrap());
            if mb.cpu.reg.pc == 0x0040 && pc_before != 0x0040 {
                services += 1;
            }
        }
        assert_eq!(services, 3);
    }

    #[test]
    fn ei_di_back_to_back_never_enables_interrupts() {
        // EI; DI; then idle. Once the pair has run, arm an enabled VBLANK request: it must never be serviced.
        let mut rom = rom_with(&[0xfb, 0xf3]);
        rom[0x0040] = 0xd9;
        let mut mb = MotherBoard::power_up();
        mb.load_rom(rom).unwrap();
        mb.step().unwrap(); // NOP
        mb.step().unwrap(); // JP 0x0150
        mb.step().unwrap(); // EI
        mb.step().unwrap(); // DI runs before the enable lands
        mb.mmu.as_mut().unwrap().set(0xffff, 0x01);
        mb.mmu.as_mut().unwrap().set(0xff0f, 0x01);
        for _ in 0..1000 {
            mb.step().unwrap();
            assert_ne!(mb.cpu.reg.pc, 0x0040);
        }
        // The request is still sitting there, unserviced.
        assert_eq!(mb.mmu.as_ref().unwrap().get(0xff0f) & 0x01, 0x01);
    }

    #[test]
    fn timer_interrupt_reaches_the_cpu() {
        // EI; enable the timer at 262144 Hz with TMA = 0xff, then idle. Handler at 0x50 is RETI.
        let mut rom = rom_with(&[
            0x3e, 0xff, // LD A, 0xff
            0xe0, 0x06, // LDH (0x06), A    TMA
            0x3e, 0x05, // LD A, 0x05
            0xe0, 0x07, // LDH (0x07), A    TAC: enabled, 16 cycles per tick
            0xfb, // EI
        ]);
        rom[0x0050] = 0xd9;
        let mut mb = MotherBoard::power_up();
        mb.load_rom(rom).unwrap();
        mb.mmu.as_mut().unwrap().set(0xffff, 0x04);
        let mut serviced = false;
        for _ in 0..20000 {
            let pc_before = mb.cpu.reg.pc;
            mb.step().unwrap();
            if mb.cpu.reg.pc == 0x0050 && pc_before != 0x0050 {
                serviced = true;
                break;
            }
        }
        assert!(serviced);
    }

    #[test]
    fn battery_save_round_trip_through_the_core() {
        // MBC1+RAM+BATTERY with 8 KiB of ram.
        let mut rom = vec![0x00; 0x8000];
        rom[0x0147] = 0x03;
        rom[0x0149] = 0x02;
        for (i, b) in b"SAVETEST".iter().enumerate() {
            rom[0x0134 + i] = *b;
        }
        rom[0x0100] = 0xc3;
        rom[0x0101] = 0x00;
        rom[0x0102] = 0x01;
        let mut mb = MotherBoard::power_up();
        mb.load_rom(rom.clone()).unwrap();
        {
            let mmu = mb.mmu.as_mut().unwrap();
            mmu.set(0x0000, 0x0a); // ram enable
            mmu.set(0xa000, 0x99);
        }
        let save = mb.save_ram().unwrap();
        assert_eq!(save.len(), 8192);
        assert_eq!(save[0], 0x99);

        let mut mb2 = MotherBoard::power_up();
        mb2.load_rom(rom).unwrap();
        mb2.load_ram(&save).unwrap();
        assert!(matches!(
            mb2.load_ram(&save[1..]),
            Err(Error::SaveSizeMismatch { want: 8192, got: 8191 })
        ));
        let mmu = mb2.mmu.as_mut().unwrap();
        mmu.set(0x0000, 0x0a);
        assert_eq!(mmu.get(0xa000), 0x99);
    }
}
