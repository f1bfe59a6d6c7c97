use weighstation_core::transport::{decode_weight_payload, GattScheme};
use weighstation_core::util::format_weight;

use crate::commands::common::parse_hex_payload;
use crate::error::CliError;

pub fn run_decode(payload: &str, scheme: GattScheme) -> Result<(), CliError> {
    let bytes = parse_hex_payload(payload)?;
    let reading = decode_weight_payload(scheme, &bytes)?;

    println!("scheme:         {}", scheme.as_str());
    println!("service:        {}", scheme.service_uuid());
    println!("characteristic: {}", scheme.characteristic_uuid());
    println!("reading:        {reading}");
    println!("kilograms:      {}", format_weight(reading.kilograms()));
    Ok(())
}
