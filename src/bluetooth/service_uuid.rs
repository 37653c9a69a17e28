// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Service UUID parsing.
//!
//! Accepts the three forms a service record can carry:
//!
//! - `"1101"`: reserved 16-bit UUID
//! - `"00001101"`: reserved 32-bit UUID
//! - `"00001101-0000-1000-8000-00805f9b34fb"`: full 128-bit UUID

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ServerError;

/// Bluetooth base UUID; reserved UUIDs occupy its first 32 bits.
const BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;

/// Dash positions in the canonical 128-bit form.
const DASHES: [usize; 4] = [8, 13, 18, 23];

/// A service UUID in its advertised width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceUuid {
    Uuid16(u16),
    Uuid32(u32),
    Uuid128(Uuid),
}

impl ServiceUuid {
    /// Parse a UUID string.
    pub fn parse(s: &str) -> Result<Self, ServerError> {
        let invalid = || ServerError::InvalidUuid(s.to_string());

        match s.len() {
            4 if is_hex(s) => u16::from_str_radix(s, 16)
                .map(ServiceUuid::Uuid16)
                .map_err(|_| invalid()),
            8 if is_hex(s) => u32::from_str_radix(s, 16)
                .map(ServiceUuid::Uuid32)
                .map_err(|_| invalid()),
            36 => {
                let bytes = s.as_bytes();
                let mut digits = String::with_capacity(32);
                for (i, &b) in bytes.iter().enumerate() {
                    if DASHES.contains(&i) {
                        if b != b'-' {
                            return Err(invalid());
                        }
                    } else {
                        digits.push(b as char);
                    }
                }

                // hex::decode rejects any stray dash or non-hex digit
                let raw = hex::decode(&digits).map_err(|_| invalid())?;
                let raw: [u8; 16] = raw.try_into().map_err(|_| invalid())?;
                Ok(ServiceUuid::Uuid128(Uuid::from_bytes(raw)))
            }
            _ => Err(invalid()),
        }
    }

    /// Expand to the full 128-bit UUID.
    pub fn to_uuid128(&self) -> Uuid {
        match *self {
            ServiceUuid::Uuid16(v) => Uuid::from_u128(BASE_UUID | ((v as u128) << 96)),
            ServiceUuid::Uuid32(v) => Uuid::from_u128(BASE_UUID | ((v as u128) << 96)),
            ServiceUuid::Uuid128(uuid) => uuid,
        }
    }

    /// Width in bits.
    pub fn bits(&self) -> u16 {
        match self {
            ServiceUuid::Uuid16(_) => 16,
            ServiceUuid::Uuid32(_) => 32,
            ServiceUuid::Uuid128(_) => 128,
        }
    }
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

impl FromStr for ServiceUuid {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ServiceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceUuid::Uuid16(v) => write!(f, "0x{:04x}", v),
            ServiceUuid::Uuid32(v) => write!(f, "0x{:08x}", v),
            ServiceUuid::Uuid128(uuid) => write!(f, "{}", uuid.hyphenated()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_forms() {
        assert_eq!(ServiceUuid::parse("1101").unwrap(), ServiceUuid::Uuid16(0x1101));
        assert_eq!(
            ServiceUuid::parse("0000110A").unwrap(),
            ServiceUuid::Uuid32(0x110a)
        );
    }

    #[test]
    fn test_full_form() {
        let parsed = ServiceUuid::parse("a1b2c3d4-e5f6-7890-abcd-ef1234567890").unwrap();
        assert_eq!(
            parsed,
            ServiceUuid::Uuid128(Uuid::from_u128(0xa1b2c3d4_e5f6_7890_abcd_ef1234567890))
        );
        assert_eq!(parsed.to_string(), "a1b2c3d4-e5f6-7890-abcd-ef1234567890");
    }

    #[test]
    fn test_random_full_form() {
        let uuid = Uuid::new_v4();
        let text = uuid.hyphenated().to_string().to_uppercase();
        assert_eq!(ServiceUuid::parse(&text).unwrap(), ServiceUuid::Uuid128(uuid));
    }

    #[test]
    fn test_invalid_lengths() {
        for s in ["", "110", "11011", "1101000", "000011010", "not-a-uuid"] {
            assert!(
                matches!(ServiceUuid::parse(s), Err(ServerError::InvalidUuid(ref v)) if v == s),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_hex() {
        assert!(ServiceUuid::parse("11g1").is_err());
        assert!(ServiceUuid::parse("+101").is_err());
        assert!(ServiceUuid::parse("0000110z").is_err());
        assert!(ServiceUuid::parse("a1b2c3d4-e5f6-7890-abcd-ef123456789x").is_err());
    }

    #[test]
    fn test_misplaced_dash() {
        // 36 characters, dash shifted by one
        let s = "a1b2c3d-4e5f6-7890-abcd-ef1234567890";
        assert_eq!(s.len(), 36);
        assert!(ServiceUuid::parse(s).is_err());

        // dash where a digit belongs, digit where a dash belongs
        let s = "a1b2c3d4-e5f6-7890-abcd0ef123456789-";
        assert_eq!(s.len(), 36);
        assert!(ServiceUuid::parse(s).is_err());
    }

    #[test]
    fn test_expand_reserved() {
        // Serial Port Profile
        assert_eq!(
            ServiceUuid::Uuid16(0x1101).to_uuid128(),
            Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB)
        );
        assert_eq!(
            ServiceUuid::Uuid32(0xdeadbeef).to_uuid128(),
            Uuid::from_u128(0xdeadbeef_0000_1000_8000_00805F9B34FB)
        );
    }
}
