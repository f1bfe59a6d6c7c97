//! GATT weight characteristic schemes and payload decoding.
//!
//! Two layouts exist in the field and a deployment pins exactly one:
//!
//! - `vendor`: custom service `00001234-…` / characteristic `00005678-…`,
//!   payload is a little-endian `f32` in kilograms with no flags byte.
//! - `weight-scale`: Bluetooth SIG Weight Scale service (`0x181D`) and Weight
//!   Measurement characteristic (`0x2A9D`). Byte 0 is a flags byte whose low
//!   bit selects imperial units; bytes 1-2 are a little-endian `u16` magnitude
//!   with a resolution of 0.005 kg (SI) or 0.01 lb (imperial).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const VENDOR_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1234_0000_1000_8000_0080_5f9b_34fb);
const VENDOR_WEIGHT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_5678_0000_1000_8000_0080_5f9b_34fb);
const SIG_WEIGHT_SCALE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_181d_0000_1000_8000_0080_5f9b_34fb);
const SIG_WEIGHT_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a9d_0000_1000_8000_0080_5f9b_34fb);

const SIG_FLAG_IMPERIAL: u8 = 0x01;
const SIG_SI_DIVISOR: f64 = 200.0;
const SIG_IMPERIAL_DIVISOR: f64 = 100.0;
const KILOGRAMS_PER_POUND: f64 = 0.453_592_37;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GattScheme {
    #[default]
    Vendor,
    WeightScale,
}

impl GattScheme {
    #[must_use]
    pub const fn service_uuid(self) -> Uuid {
        match self {
            Self::Vendor => VENDOR_SERVICE_UUID,
            Self::WeightScale => SIG_WEIGHT_SCALE_SERVICE_UUID,
        }
    }

    #[must_use]
    pub const fn characteristic_uuid(self) -> Uuid {
        match self {
            Self::Vendor => VENDOR_WEIGHT_CHARACTERISTIC_UUID,
            Self::WeightScale => SIG_WEIGHT_MEASUREMENT_UUID,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::WeightScale => "weight-scale",
        }
    }
}

impl fmt::Display for GattScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GattScheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vendor" => Ok(Self::Vendor),
            "weight-scale" | "sig" => Ok(Self::WeightScale),
            other => Err(format!(
                "unknown GATT scheme '{other}' (expected 'vendor' or 'weight-scale')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightUnit {
    Kilograms,
    Pounds,
}

impl WeightUnit {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Kilograms => "kg",
            Self::Pounds => "lb",
        }
    }
}

/// A decoded notification in the unit the scale reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GattReading {
    pub value: f64,
    pub unit: WeightUnit,
}

impl GattReading {
    #[must_use]
    pub fn kilograms(self) -> f64 {
        match self.unit {
            WeightUnit::Kilograms => self.value,
            WeightUnit::Pounds => self.value * KILOGRAMS_PER_POUND,
        }
    }
}

impl fmt::Display for GattReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload too short for {scheme} scheme: expected {expected} bytes, got {actual}")]
    TooShort {
        scheme: GattScheme,
        expected: usize,
        actual: usize,
    },
    #[error("payload does not encode a finite weight")]
    NonFinite,
}

/// Decode one notification payload under the pinned scheme.
pub fn decode_weight_payload(
    scheme: GattScheme,
    payload: &[u8],
) -> Result<GattReading, DecodeError> {
    match scheme {
        GattScheme::Vendor => {
            let Some(bytes) = payload.get(..4) else {
                return Err(too_short(scheme, 4, payload.len()));
            };
            let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if !value.is_finite() {
                return Err(DecodeError::NonFinite);
            }
            Ok(GattReading {
                value: f64::from(value),
                unit: WeightUnit::Kilograms,
            })
        }
        GattScheme::WeightScale => {
            let Some(bytes) = payload.get(..3) else {
                return Err(too_short(scheme, 3, payload.len()));
            };
            let magnitude = f64::from(u16::from_le_bytes([bytes[1], bytes[2]]));
            if bytes[0] & SIG_FLAG_IMPERIAL == 0 {
                Ok(GattReading {
                    value: magnitude / SIG_SI_DIVISOR,
                    unit: WeightUnit::Kilograms,
                })
            } else {
                Ok(GattReading {
                    value: magnitude / SIG_IMPERIAL_DIVISOR,
                    unit: WeightUnit::Pounds,
                })
            }
        }
    }
}

const fn too_short(scheme: GattScheme, expected: usize, actual: usize) -> DecodeError {
    DecodeError::TooShort {
        scheme,
        expected,
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn sig_si_payload_decodes_to_kilograms() {
        let reading = decode_weight_payload(GattScheme::WeightScale, &[0x00, 0xD0, 0x07]).unwrap();
        assert_eq!(reading.unit, WeightUnit::Kilograms);
        assert_close(reading.value, 10.0);
        assert_eq!(reading.to_string(), "10.00 kg");
    }

    #[test]
    fn sig_imperial_payload_decodes_to_pounds() {
        let reading = decode_weight_payload(GattScheme::WeightScale, &[0x01, 0xD0, 0x07]).unwrap();
        assert_eq!(reading.unit, WeightUnit::Pounds);
        assert_close(reading.value, 20.0);
        assert_eq!(reading.to_string(), "20.00 lb");
        assert_close(reading.kilograms(), 20.0 * KILOGRAMS_PER_POUND);
    }

    #[test]
    fn sig_ignores_trailing_optional_fields() {
        // flags with timestamp bit set, followed by 7 timestamp bytes
        let payload = [0x02, 0x10, 0x27, 0xE8, 0x07, 0x01, 0x01, 0x00, 0x00, 0x00];
        let reading = decode_weight_payload(GattScheme::WeightScale, &payload).unwrap();
        assert_close(reading.value, 50.0);
    }

    #[test]
    fn vendor_payload_is_little_endian_f32() {
        let payload = 42.5_f32.to_le_bytes();
        let reading = decode_weight_payload(GattScheme::Vendor, &payload).unwrap();
        assert_eq!(reading.unit, WeightUnit::Kilograms);
        assert_close(reading.value, 42.5);
    }

    #[test]
    fn short_payloads_are_rejected() {
        assert_eq!(
            decode_weight_payload(GattScheme::Vendor, &[0x00, 0x00]),
            Err(DecodeError::TooShort {
                scheme: GattScheme::Vendor,
                expected: 4,
                actual: 2,
            })
        );
        assert!(decode_weight_payload(GattScheme::WeightScale, &[0x00]).is_err());
    }

    #[test]
    fn vendor_nan_is_rejected() {
        let payload = f32::NAN.to_le_bytes();
        assert_eq!(
            decode_weight_payload(GattScheme::Vendor, &payload),
            Err(DecodeError::NonFinite)
        );
    }

    #[test]
    fn scheme_parses_and_pins_uuids() {
        assert_eq!("vendor".parse::<GattScheme>(), Ok(GattScheme::Vendor));
        assert_eq!(
            " Weight-Scale ".parse::<GattScheme>(),
            Ok(GattScheme::WeightScale)
        );
        assert!("auto".parse::<GattScheme>().is_err());
        assert_eq!(
            GattScheme::WeightScale.service_uuid().to_string(),
            "0000181d-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            GattScheme::Vendor.characteristic_uuid().to_string(),
            "00005678-0000-1000-8000-00805f9b34fb"
        );
    }
}
