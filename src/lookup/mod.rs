//! External record lookup.
//!
//! The dispatcher only sees [`RecordLookup`]; [`HttpLookup`] is the production
//! implementation and tests substitute a stub.

pub mod http;

pub use http::HttpLookup;

use crate::errors::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A source of vehicle records.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Fetches the record for a normalised registration number.
    async fn fetch(&self, query: &str) -> Result<VehicleRecord>;
}

/// One upstream record, kept as the raw JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    query: String,
    fields: Map<String, Value>,
}

fn no_match() -> Error {
    Error::Lookup {
        reason: "No vehicle data found or invalid registration number".to_string(),
    }
}

impl VehicleRecord {
    /// Builds a record from an upstream payload.
    ///
    /// Accepts an object or a non-empty array whose first element is an object.
    /// Payloads carrying an `error` key or no owner name count as "no match".
    pub fn from_json(query: &str, payload: Value) -> Result<Self> {
        let payload = match payload {
            Value::Array(items) => items.into_iter().next().ok_or_else(no_match)?,
            other => other,
        };
        let Value::Object(fields) = payload else {
            return Err(Error::Lookup {
                reason: "Unexpected API response format".to_string(),
            });
        };

        let has_error = fields
            .get("error")
            .is_some_and(|e| !e.is_null() && *e != Value::Bool(false));
        if fields.is_empty() || has_error || blank(fields.get("owner_name")) {
            return Err(no_match());
        }

        Ok(Self {
            query: query.to_string(),
            fields,
        })
    }

    /// Registration number the record was fetched for
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Display value of `key`, or `default` when missing or blank.
    #[must_use]
    pub fn field(&self, key: &str, default: &str) -> String {
        let value = self.fields.get(key);
        if blank(value) {
            return default.to_string();
        }
        match value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }

    /// Multi-section text card shown to the user.
    #[must_use]
    pub fn render_card(&self) -> String {
        let na = |key: &str| self.field(key, "NA");
        let insurance_valid = if blank(self.fields.get("insurance_upto")) {
            self.field("insurance_expiry", "None")
        } else {
            self.field("insurance_upto", "None")
        };

        format!(
            "🚗 Vehicle Details for {query}\n\n\
             👤 Owner Information\n\
             • Name: {owner}\n\
             • Father's Name: {father}\n\
             • Address: {address}\n\
             • Phone: {phone}\n\
             • RTO: {rto}\n\n\
             🚘 Vehicle Details\n\
             • Model: {model}\n\
             • Variant: {variant}\n\
             • Class: {class}\n\
             • Fuel: {fuel}\n\
             • Reg Date: {reg_date}\n\n\
             📄 Insurance Details\n\
             • Company: {ins_company}\n\
             • Policy No: {ins_no}\n\
             • Valid Until: {insurance_valid}\n\n\
             📑 Other Documents\n\
             • Fitness Valid Until: {fitness}\n\
             • Tax Paid Until: {tax}\n\
             • PUC Valid Until: {puc}",
            query = self.query,
            owner = na("owner_name"),
            father = na("father_name"),
            address = na("address"),
            phone = na("phone"),
            rto = na("rto"),
            model = na("model_name"),
            variant = na("maker_model"),
            class = na("vehicle_class"),
            fuel = na("fuel_type"),
            reg_date = na("registration_date"),
            ins_company = self.field("insurance_company", "None"),
            ins_no = na("insurance_no"),
            fitness = na("fitness_upto"),
            tax = na("tax_upto"),
            puc = na("puc_upto"),
        )
    }
}

fn blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => {
            let s = s.trim();
            s.is_empty() || s.eq_ignore_ascii_case("null")
        }
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_accepts_object_and_array() {
        let object = json!({"owner_name": "A KUMAR", "fuel_type": "PETROL"});
        let record = VehicleRecord::from_json("BR29AB7794", object.clone()).unwrap();
        assert_eq!(record.field("owner_name", "NA"), "A KUMAR");

        let array = VehicleRecord::from_json("BR29AB7794", json!([object])).unwrap();
        assert_eq!(array, record);
    }

    #[test]
    fn test_from_json_no_match() {
        for payload in [
            json!({}),
            json!([]),
            json!({"error": "not found"}),
            json!({"owner_name": ""}),
            json!({"owner_name": "null"}),
            json!({"owner_name": "X", "error": true}),
        ] {
            assert!(
                matches!(
                    VehicleRecord::from_json("Q", payload.clone()),
                    Err(Error::Lookup { .. })
                ),
                "{payload} should be rejected"
            );
        }
        assert!(matches!(
            VehicleRecord::from_json("Q", json!("text")),
            Err(Error::Lookup { reason }) if reason.contains("format")
        ));
    }

    #[test]
    fn test_render_card_defaults() {
        let record = VehicleRecord::from_json(
            "BR29AB7794",
            json!({
                "owner_name": "A KUMAR",
                "phone": null,
                "insurance_expiry": "2030-01-01",
                "tax_upto": 2031
            }),
        )
        .unwrap();
        let card = record.render_card();

        assert!(card.starts_with("🚗 Vehicle Details for BR29AB7794"));
        assert!(card.contains("• Name: A KUMAR"));
        assert!(card.contains("• Phone: NA"));
        assert!(card.contains("• Company: None"));
        assert!(card.contains("• Valid Until: 2030-01-01"));
        assert!(card.contains("• Tax Paid Until: 2031"));
    }
}
