//! Customer records and the structured fields extracted from their addresses.

use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;

/// One row of customer data processed by the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable, opaque identifier. Numeric ids are accepted and kept in their textual form.
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    /// Customer first name.
    pub first_name: String,
    /// Customer last name.
    pub last_name: String,
    /// Free-text address; never modified by the pipeline.
    pub address: String,
    /// Extracted city, empty until filled.
    #[serde(default)]
    pub city: String,
    /// Extracted state, empty until filled.
    #[serde(default)]
    pub state: String,
    /// Extracted postal code, empty until filled.
    #[serde(default)]
    pub pin_code: String,
}

impl Record {
    /// Create a record with empty extracted fields.
    pub fn new(id: &str, first_name: &str, last_name: &str, address: &str) -> Self {
        Self {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            address: address.to_string(),
            city: String::new(),
            state: String::new(),
            pin_code: String::new(),
        }
    }

    /// First and last name joined by a space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Overwrite the extracted fields with a pipeline result.
    pub fn merge(&mut self, fields: AddressFields) {
        let AddressFields {
            city,
            state,
            pin_code,
        } = fields;
        self.city = city;
        self.state = state;
        self.pin_code = pin_code;
    }

    /// Apply a manual edit to one extracted field.
    pub fn set_field(&mut self, field: AddressField, value: impl Into<String>) {
        let value = value.into();
        match field {
            AddressField::City => self.city = value,
            AddressField::State => self.state = value,
            AddressField::PinCode => self.pin_code = value,
        }
    }

    /// Whether every extracted field is still empty.
    pub fn is_unprocessed(&self) -> bool {
        self.city.is_empty() && self.state.is_empty() && self.pin_code.is_empty()
    }
}

/// Structured result of one extraction request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressFields {
    /// City name.
    #[serde(default)]
    pub city: String,
    /// Full state name.
    #[serde(default)]
    pub state: String,
    /// Six-digit PIN code.
    #[serde(default)]
    pub pin_code: String,
}

/// Names of the editable extracted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    /// `city`
    City,
    /// `state`
    State,
    /// `pinCode`
    PinCode,
}

/// Raised when a host names a field that is not editable.
#[derive(Debug, Error)]
#[error("unknown address field '{0}'")]
pub struct UnknownField(pub String);

impl std::str::FromStr for AddressField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "city" => Ok(Self::City),
            "state" => Ok(Self::State),
            "pinCode" | "pin_code" => Ok(Self::PinCode),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

/// The seven sample customers shipped with the extractor.
pub fn sample_records() -> Vec<Record> {
    vec![
        Record::new(
            "1",
            "Rajesh",
            "Kumar",
            "Flat 302, Sunrise Apartments, Sector 5, Noida, Uttar Pradesh 201301",
        ),
        Record::new(
            "2",
            "Priya",
            "Sharma",
            "House No. 45, MG Road, Koramangala, Bangalore, Karnataka 560095",
        ),
        Record::new(
            "3",
            "Amit",
            "Patel",
            "Shop No. 12, Commercial Complex, Vastrapur, Ahmedabad, Gujarat 380015",
        ),
        Record::new(
            "4",
            "Sneha",
            "Desai",
            "B-204, Green Valley Society, Andheri West, Mumbai, Maharashtra 400053",
        ),
        Record::new(
            "5",
            "Vikram",
            "Singh",
            "Plot 78, Model Town, Ludhiana, Punjab 141002",
        ),
        Record::new(
            "6",
            "Anjali",
            "Reddy",
            "Flat 5B, Tech Park Residency, Hitech City, Hyderabad, Telangana 500081",
        ),
        Record::new(
            "7",
            "Rahul",
            "Mehta",
            "A-12, Shanti Nagar, Civil Lines, Jaipur, Rajasthan 302006",
        ),
    ]
}

fn opaque_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(id) => Ok(id),
        serde_json::Value::Number(id) => Ok(id.to_string()),
        other => Err(de::Error::custom(format!(
            "record id must be a string or a number, got {other}"
        ))),
    }
}
