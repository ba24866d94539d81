// Note: Game BoyTM and Game Boy PocketTM are registered trademarks of Nintendo CO., LTD. © 1989 to 1999 by
// Nintendo CO., LTD.

#[cfg(feature = "gui")]
fn main() {
    use dotmatrix::gpu::{SCREEN_H, SCREEN_W};
    use dotmatrix::joypad::{InputEvent, JoypadKey};
    use dotmatrix::motherboard::MotherBoard;

    rog::reg("dotmatrix");
    rog::reg("dotmatrix::cartridge");

    let mut rom = String::from("");
    let mut c_scale = 2;
    {
        let mut ap = argparse::ArgumentParser::new();
        ap.set_description("Game Boy emulator");
        ap.refer(&mut c_scale).add_option(
            &["-x", "--scale-factor"],
            argparse::Store,
            "Scale the video by a factor of 1, 2, 4, or 8",
        );
        ap.refer(&mut rom).add_argument("rom", argparse::Store, "Rom name");
        ap.parse_args_or_exit();
    }

    let mut mbrd = MotherBoard::power_up();
    mbrd.load_rom(std::fs::read(&rom).unwrap()).unwrap();
    let title = mbrd.game_title().unwrap();
    let sav_path = std::path::Path::new("./saves").join(format!("{}.sav", title));
    if let Ok(ram) = std::fs::read(&sav_path) {
        if let Err(e) = mbrd.load_ram(&ram) {
            rog::debugln!("Ignoring save file: {}", e);
        }
    }

    let mut option = minifb::WindowOptions::default();
    option.resize = true;
    option.scale = match c_scale {
        1 => minifb::Scale::X1,
        2 => minifb::Scale::X2,
        4 => minifb::Scale::X4,
        8 => minifb::Scale::X8,
        _ => panic!("Supported scale: 1, 2, 4 or 8"),
    };
    let mut window =
        minifb::Window::new(format!("Game Boy - {}", title).as_str(), SCREEN_W, SCREEN_H, option).unwrap();
    let mut window_buffer = vec![0x00u32; SCREEN_W * SCREEN_H];
    window.update_with_buffer(window_buffer.as_slice()).unwrap();

    let keys = [
        (minifb::Key::Right, JoypadKey::Right),
        (minifb::Key::Up, JoypadKey::Up),
        (minifb::Key::Left, JoypadKey::Left),
        (minifb::Key::Down, JoypadKey::Down),
        (minifb::Key::Z, JoypadKey::A),
        (minifb::Key::X, JoypadKey::B),
        (minifb::Key::Space, JoypadKey::Select),
        (minifb::Key::Enter, JoypadKey::Start),
    ];
    loop {
        if !window.is_open() || window.is_key_down(minifb::Key::Escape) {
            break;
        }

        let frame = match mbrd.step_frame() {
            Ok(frame) => frame,
            Err(e) => {
                rog::println!("Fatal: {}", e);
                break;
            }
        };
        for (i, w) in window_buffer.iter_mut().enumerate() {
            let r = u32::from(frame.video[i * 4]);
            let g = u32::from(frame.video[i * 4 + 1]);
            let b = u32::from(frame.video[i * 4 + 2]);
            *w = 0xff00_0000 | (r << 16) | (g << 8) | b;
        }
        window.update_with_buffer(window_buffer.as_slice()).unwrap();

        for (rk, vk) in &keys {
            if window.is_key_down(*rk) {
                mbrd.input_event(InputEvent::Pressed(*vk));
            } else {
                mbrd.input_event(InputEvent::Released(*vk));
            }
        }
    }

    if let Ok(ram) = mbrd.save_ram() {
        std::fs::create_dir_all("./saves").unwrap();
        std::fs::write(&sav_path, ram).unwrap();
    }
}

#[cfg(not(feature = "gui"))]
fn main() {
    rog::println!("Built without the gui feature; nothing to run");
}
