/// An emulated register-addressed I2C peripheral.
///
/// Follows the near-universal convention: the first byte written after
/// addressing latches the register pointer, any further written bytes
/// store at the auto-incrementing pointer, and reads stream from it.
pub struct RegisterDevice {
    registers: [u8; 256],
    pointer: u8,
    pointer_latched: bool,
}

impl RegisterDevice {
    pub const fn new() -> Self {
        Self {
            registers: [0; 256],
            pointer: 0,
            pointer_latched: false,
        }
    }

    /// Create a device with some registers pre-loaded.
    pub fn with_registers(values: &[(u8, u8)]) -> Self {
        let mut device = Self::new();
        for &(register, value) in values {
            device.registers[register as usize] = value;
        }
        device
    }

    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    pub fn set_register(&mut self, register: u8, value: u8) {
        self.registers[register as usize] = value;
    }

    /// A new write burst is starting; the next written byte is the pointer.
    pub(crate) fn begin_write(&mut self) {
        self.pointer_latched = false;
    }

    pub(crate) fn write_byte(&mut self, byte: u8) {
        if self.pointer_latched {
            self.registers[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        } else {
            self.pointer = byte;
            self.pointer_latched = true;
        }
    }

    pub(crate) fn read_byte(&mut self) -> u8 {
        let byte = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

impl Default for RegisterDevice {
    fn default() -> Self {
        Self::new()
    }
}
