use thiserror::Error;

// Load failures leave the core in its previous state. Forbidden or unmapped accesses are not errors at all: they are
// logged and recovered on the spot. The only fatal condition is an opcode the CPU cannot decode, which a well-formed
// rom never reaches.
#[derive(Debug, Error)]
pub enum Error {
    #[error("rom image is {0} bytes; expected a power of two of at least 32 KiB")]
    RomSize(usize),
    #[error("rom image is missing the header area at 0x0100-0x014f")]
    RomTruncated,
    #[error("unsupported cartridge type 0x{0:02x}")]
    UnsupportedCartridgeType(u8),
    #[error("unsupported rom size code 0x{0:02x}")]
    UnsupportedRomSize(u8),
    #[error("unsupported ram size code 0x{0:02x}")]
    UnsupportedRamSize(u8),
    #[error("cartridge has no battery backed ram")]
    NoBatteryRam,
    #[error("save data is {got} bytes but cartridge ram is {want} bytes")]
    SaveSizeMismatch { want: usize, got: usize },
    #[error("no cartridge loaded")]
    NoCartridge,
    #[error("unknown opcode 0x{opcode:02x} at 0x{pc:04x}")]
    UnknownOpcode { opcode: u8, pc: u16 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
