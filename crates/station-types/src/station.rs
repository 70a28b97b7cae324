//! Station reference records.

use crate::codec::decode_record;
use crate::error::Result;
use crate::schema::{FieldSchema, FieldType, RecordSchema, SchemaBound};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One transit stop as captured from the `stations` source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub stop_id: i64,
    pub direction_id: String,
    pub stop_name: String,
    pub station_name: String,
    pub station_descriptive_name: String,
    /// Logical grouping key; several stops share one station.
    pub station_id: i64,
    pub order: i32,
    pub red: bool,
    pub blue: bool,
    pub green: bool,
}

impl Station {
    /// Decode a framed or schemaless JSON payload from the input topic.
    pub fn from_payload(bytes: &[u8]) -> Result<Self> {
        decode_record(bytes, &Self::schema())
    }
}

impl SchemaBound for Station {
    fn schema() -> RecordSchema {
        RecordSchema::record(
            "station",
            vec![
                FieldSchema::new("stop_id", FieldType::Long),
                FieldSchema::new("direction_id", FieldType::String),
                FieldSchema::new("stop_name", FieldType::String),
                FieldSchema::new("station_name", FieldType::String),
                FieldSchema::new("station_descriptive_name", FieldType::String),
                FieldSchema::new("station_id", FieldType::Long),
                FieldSchema::new("order", FieldType::Int),
                FieldSchema::new("red", FieldType::Boolean),
                FieldSchema::new("blue", FieldType::Boolean),
                FieldSchema::new("green", FieldType::Boolean),
            ],
        )
    }
}

/// Train line a station is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Line {
    Red,
    Green,
    Blue,
}

impl Line {
    pub fn as_str(&self) -> &'static str {
        match self {
            Line::Red => "red",
            Line::Green => "green",
            Line::Blue => "blue",
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized projection of a [`Station`], keyed by `station_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformedStation {
    pub station_id: i64,
    pub station_name: String,
    pub order: i32,
    pub line: Line,
}

impl TransformedStation {
    pub fn from_payload(bytes: &[u8]) -> Result<Self> {
        decode_record(bytes, &Self::schema())
    }
}

impl SchemaBound for TransformedStation {
    fn schema() -> RecordSchema {
        RecordSchema::record(
            "transformed_station",
            vec![
                FieldSchema::new("station_id", FieldType::Long),
                FieldSchema::new("station_name", FieldType::String),
                FieldSchema::new("order", FieldType::Int),
                FieldSchema::new("line", FieldType::String),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_framed;
    use crate::error::RecordParseError;
    use serde_json::json;

    fn station_json() -> serde_json::Value {
        json!({
            "stop_id": 30001,
            "direction_id": "E",
            "stop_name": "Austin (O'Hare-bound)",
            "station_name": "Austin",
            "station_descriptive_name": "Austin (Blue Line)",
            "station_id": 40010,
            "order": 29,
            "red": false,
            "blue": true,
            "green": false
        })
    }

    #[test]
    fn test_station_from_plain_json() {
        let bytes = serde_json::to_vec(&station_json()).unwrap();
        let station = Station::from_payload(&bytes).unwrap();
        assert_eq!(station.stop_id, 30001);
        assert_eq!(station.station_id, 40010);
        assert_eq!(station.order, 29);
        assert!(station.blue);
        assert!(!station.red && !station.green);
    }

    #[test]
    fn test_station_from_framed_json() {
        let bytes = encode_framed(3, &station_json()).unwrap();
        let station = Station::from_payload(&bytes).unwrap();
        assert_eq!(station.station_name, "Austin");
    }

    #[test]
    fn test_station_rejects_wrong_flag_type() {
        let mut value = station_json();
        value["red"] = json!("t");
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            Station::from_payload(&bytes),
            Err(RecordParseError::Schema(_))
        ));
    }

    #[test]
    fn test_station_rejects_missing_field() {
        let mut value = station_json();
        value.as_object_mut().unwrap().remove("station_id");
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(Station::from_payload(&bytes).is_err());
    }

    #[test]
    fn test_transformed_station_matches_its_schema() {
        let transformed = TransformedStation {
            station_id: 40010,
            station_name: "Austin".to_string(),
            order: 29,
            line: Line::Blue,
        };
        let value = serde_json::to_value(&transformed).unwrap();
        assert_eq!(value["line"], "blue");
        assert!(TransformedStation::schema().validate(&value).is_ok());

        let bytes = encode_framed(9, &value).unwrap();
        assert_eq!(TransformedStation::from_payload(&bytes).unwrap(), transformed);
    }

    #[test]
    fn test_unknown_line_is_rejected() {
        let bytes = br#"{"station_id":1,"station_name":"X","order":1,"line":"purple"}"#;
        assert!(matches!(
            TransformedStation::from_payload(bytes),
            Err(RecordParseError::Json(_))
        ));
    }
}
