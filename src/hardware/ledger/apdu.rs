//! APDU (Application Protocol Data Unit) command handling.
//!
//! Framing for the request/response exchanges a Ledger app speaks. The
//! transport itself (USB/HID, BLE, TCP proxy) is caller-supplied; this
//! module only owns the byte layout.

use tracing::debug;

use crate::core::errors::SignerError;
use crate::crypto::path::DerivationPath;

/// APDU command.
#[derive(Debug, Clone)]
pub struct ApduCommand {
    /// Class byte (per vendor app).
    pub cla: u8,
    /// Instruction byte.
    pub ins: u8,
    /// Parameter 1.
    pub p1: u8,
    /// Parameter 2.
    pub p2: u8,
    /// Payload (≤ 255 bytes; callers chunk larger messages).
    pub data: Vec<u8>,
}

impl ApduCommand {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
        }
    }

    /// Serialize to the wire shape: header, length, payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(5 + self.data.len());
        bytes.push(self.cla);
        bytes.push(self.ins);
        bytes.push(self.p1);
        bytes.push(self.p2);
        bytes.push(self.data.len() as u8);
        bytes.extend_from_slice(&self.data);

        debug!(
            "APDU command: CLA={:02X} INS={:02X} P1={:02X} P2={:02X} Len={}",
            self.cla,
            self.ins,
            self.p1,
            self.p2,
            self.data.len()
        );

        bytes
    }
}

/// APDU response: payload plus the two status words.
#[derive(Debug, Clone)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl ApduResponse {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        if bytes.len() < 2 {
            return Err(SignerError::HardwareUnavailable(
                "APDU response too short".to_string(),
            ));
        }

        let len = bytes.len();
        let sw1 = bytes[len - 2];
        let sw2 = bytes[len - 1];
        let data = bytes[..len - 2].to_vec();

        debug!("APDU response: SW1={sw1:02X} SW2={sw2:02X} DataLen={}", data.len());

        Ok(Self { data, sw1, sw2 })
    }

    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    pub fn status_code(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    pub fn error_description(&self) -> String {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "success".to_string(),
            (0x69, 0x82) => "security status not satisfied".to_string(),
            (0x69, 0x85) => "conditions of use not satisfied (user rejected?)".to_string(),
            (0x6A, 0x80) => "incorrect data field".to_string(),
            (0x6A, 0x82) => "file not found".to_string(),
            (0x6D, 0x00) => "instruction not supported (wrong app open?)".to_string(),
            (0x6E, 0x00) => "class not supported (wrong app open?)".to_string(),
            (0x67, 0x00) => "incorrect data length".to_string(),
            (0x6B, 0x00) => "incorrect parameters".to_string(),
            (0x6F, 0x00) => "unknown error".to_string(),
            _ => format!("unexpected status: {:04X}", self.status_code()),
        }
    }
}

/// Serialize a derivation path the way every Ledger app expects it:
/// depth byte followed by big-endian child numbers.
pub fn serialize_path(path: &DerivationPath) -> Vec<u8> {
    let numbers = path.child_numbers();
    let mut bytes = Vec::with_capacity(1 + numbers.len() * 4);
    bytes.push(numbers.len() as u8);
    for number in numbers {
        bytes.extend_from_slice(&number.to_be_bytes());
    }
    bytes
}
