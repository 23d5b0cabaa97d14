//! CRC16 variants used by the line protocol.
//!
//! Both are bit-serial implementations over polynomial x^16 + x^12 + x^5 + 1:
//! - XMODEM: MSB-first, init `0x0000`, no final xor. This is the protocol checksum.
//! - CCITT: LSB-first (reflected, `0x8408`), init `0xFFFF`, no final xor. This
//!   matches the AVR libc `_crc_ccitt_update` routine and is offered as a utility.

/// A selectable CRC16 variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crc16 {
    Xmodem,
    Ccitt,
}

impl Crc16 {
    /// Register value before the first byte.
    pub const fn initial(self) -> u16 {
        match self {
            Crc16::Xmodem => 0x0000,
            Crc16::Ccitt => 0xFFFF,
        }
    }

    /// Fold one byte into a running checksum.
    pub fn update(self, crc: u16, byte: u8) -> u16 {
        match self {
            Crc16::Xmodem => xmodem_update(crc, byte),
            Crc16::Ccitt => ccitt_update(crc, byte),
        }
    }

    /// Checksum of `bytes`.
    pub fn compute(self, bytes: &[u8]) -> u16 {
        bytes
            .iter()
            .fold(self.initial(), |crc, &byte| self.update(crc, byte))
    }

    pub fn name(self) -> &'static str {
        match self {
            Crc16::Xmodem => "crc16-xmodem",
            Crc16::Ccitt => "crc16-ccitt",
        }
    }
}

/// One byte of CRC16-XMODEM (poly `0x1021`, MSB first).
pub fn xmodem_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ ((byte as u16) << 8);
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ 0x1021
        } else {
            crc << 1
        };
    }
    crc
}

/// One byte of reflected CRC16-CCITT (poly `0x8408`, LSB first).
pub fn ccitt_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ byte as u16;
    for _ in 0..8 {
        crc = if crc & 0x0001 != 0 {
            (crc >> 1) ^ 0x8408
        } else {
            crc >> 1
        };
    }
    crc
}

pub fn crc16_xmodem(bytes: &[u8]) -> u16 {
    Crc16::Xmodem.compute(bytes)
}

pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    Crc16::Ccitt.compute(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xmodem_check_value() {
        assert_eq!(crc16_xmodem(b"123456789"), 0x31C3);
    }

    #[test]
    fn ccitt_check_value() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x6F91);
    }

    #[test]
    fn empty_input_is_initial_register() {
        assert_eq!(crc16_xmodem(b""), 0x0000);
        assert_eq!(crc16_ccitt(b""), 0xFFFF);
    }

    #[test]
    fn known_payload_checksums() {
        assert_eq!(crc16_xmodem(b"A"), 22757);
        assert_eq!(crc16_xmodem(b"hello"), 50018);
        assert_eq!(crc16_xmodem(b"CMD=1"), 15478);
        assert_eq!(crc16_ccitt(b"A"), 0x5C0A);
    }

    #[test]
    fn incremental_update_matches_compute() {
        let data = b"STATUS=ok";
        let mut crc = Crc16::Xmodem.initial();
        for &b in data {
            crc = Crc16::Xmodem.update(crc, b);
        }
        assert_eq!(crc, crc16_xmodem(data));
    }

    #[test]
    fn single_bit_flip_changes_checksum() {
        assert_ne!(crc16_xmodem(b"CMD=1"), crc16_xmodem(b"CMD=0"));
        assert_ne!(crc16_ccitt(b"CMD=1"), crc16_ccitt(b"CMD=0"));
    }
}
