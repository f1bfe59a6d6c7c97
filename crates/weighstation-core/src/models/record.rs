//! Weight records and shift events

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{format_weight, normalize_text_option};

/// Who is weighing what, on which machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorContext {
    pub machine_name: String,
    pub operator_name: String,
    pub product_type: String,
}

impl OperatorContext {
    /// Build a context from operator-entered values, trimming each field.
    pub fn new(
        machine_name: impl Into<String>,
        operator_name: impl Into<String>,
        product_type: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            machine_name: required(machine_name.into(), "machine name")?,
            operator_name: required(operator_name.into(), "operator name")?,
            product_type: required(product_type.into(), "product type")?,
        })
    }
}

fn required(value: String, field: &str) -> Result<String> {
    normalize_text_option(Some(value))
        .ok_or_else(|| Error::InvalidInput(format!("{field} must not be empty")))
}

/// A weight captured by the operator. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRecord {
    /// Capture instant
    pub timestamp: DateTime<Utc>,
    pub machine_name: String,
    pub operator_name: String,
    pub product_type: String,
    /// Weight in kilograms
    pub weight: f64,
}

impl WeightRecord {
    #[must_use]
    pub fn capture(context: &OperatorContext, weight: f64) -> Self {
        Self::at(Utc::now(), context, weight)
    }

    #[must_use]
    pub fn at(timestamp: DateTime<Utc>, context: &OperatorContext, weight: f64) -> Self {
        Self {
            timestamp,
            machine_name: context.machine_name.clone(),
            operator_name: context.operator_name.clone(),
            product_type: context.product_type.clone(),
            weight,
        }
    }

    /// Flat spreadsheet row: timestamp, machine, operator, product, weight.
    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        vec![
            iso_timestamp(self.timestamp),
            self.machine_name.clone(),
            self.operator_name.clone(),
            self.product_type.clone(),
            format_weight(self.weight),
        ]
    }
}

/// Shift boundary marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftAction {
    Start,
    End,
}

impl ShiftAction {
    /// Upper-cased label written to the sheet
    #[must_use]
    pub const fn row_label(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::End => "END",
        }
    }
}

impl fmt::Display for ShiftAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::End => f.write_str("end"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftEvent {
    pub timestamp: DateTime<Utc>,
    pub machine_name: String,
    pub operator_name: String,
    pub product_type: String,
    pub action: ShiftAction,
}

impl ShiftEvent {
    #[must_use]
    pub fn now(context: &OperatorContext, action: ShiftAction) -> Self {
        Self {
            timestamp: Utc::now(),
            machine_name: context.machine_name.clone(),
            operator_name: context.operator_name.clone(),
            product_type: context.product_type.clone(),
            action,
        }
    }

    /// Flat spreadsheet row: timestamp, machine, operator, product, ACTION.
    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        vec![
            iso_timestamp(self.timestamp),
            self.machine_name.clone(),
            self.operator_name.clone(),
            self.product_type.clone(),
            self.action.row_label().to_string(),
        ]
    }
}

fn iso_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn context() -> OperatorContext {
        OperatorContext::new("SCALE 1", "Alice", "Flour-25kg").unwrap()
    }

    #[test]
    fn operator_context_trims_and_rejects_empty_fields() {
        let trimmed = OperatorContext::new(" SCALE 1 ", " Alice ", " Flour-25kg ").unwrap();
        assert_eq!(trimmed, context());

        let error = OperatorContext::new("SCALE 1", "   ", "Flour").unwrap_err();
        assert!(error.to_string().contains("operator name"));
    }

    #[test]
    fn weight_record_row_formats_weight_as_text() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let record = WeightRecord::at(timestamp, &context(), 42.5);
        assert_eq!(
            record.to_row(),
            vec![
                "2024-03-01T08:30:00.000Z".to_string(),
                "SCALE 1".to_string(),
                "Alice".to_string(),
                "Flour-25kg".to_string(),
                "42.50".to_string(),
            ]
        );
    }

    #[test]
    fn shift_event_row_uppercases_action() {
        let event = ShiftEvent::now(&context(), ShiftAction::End);
        let row = event.to_row();
        assert_eq!(row.len(), 5);
        assert_eq!(row[4], "END");
        assert_eq!(event.action.to_string(), "end");
    }

    #[test]
    fn weight_record_serializes_camel_case() {
        let record = WeightRecord::capture(&context(), 1.0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["machineName"], "SCALE 1");
        assert_eq!(json["productType"], "Flour-25kg");
    }
}
