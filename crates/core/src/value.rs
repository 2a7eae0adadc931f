//! Typed values placed into save requests
//!
//! Every value the server applies is tagged `{"#t": <type>, "#v": <value>}`.
//! Composite types (PickerData, Dictionary, date ranges) carry their own keys
//! instead of a flat `#v`.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Document already uploaded to the server's document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub id: i64,
    pub name: String,
    pub extension: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub signature: Option<String>,
}

impl UploadedDocument {
    fn collaboration_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("#t".into(), json!("CollaborationDocument"));
        doc.insert("id".into(), json!(self.id));
        if let Some(signature) = &self.signature {
            doc.insert("signature".into(), json!(signature));
        }
        Value::Object(doc)
    }

    fn file_metadata(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("clientUuid".into(), json!("0"));
        meta.insert("loadedBytes".into(), json!(0));
        meta.insert("name".into(), json!(self.name));
        meta.insert("fileSizeBytes".into(), json!(self.size_bytes));
        meta.insert(
            "documentId".into(),
            json!({"#t": "CollaborationDocument", "id": self.id}),
        );
        meta.insert("extension".into(), json!(self.extension));
        if let Some(signature) = &self.signature {
            meta.insert("signature".into(), json!(signature));
        }
        Value::Object(meta)
    }
}

/// A value in the server's wire encoding
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    Integer(i64),
    /// Serialised as `null` when empty
    IntegerList(Vec<i64>),
    TextList(Vec<String>),
    VariantList(Vec<Value>),
    Date(NaiveDate),
    /// Seconds are always zeroed on the wire
    DateTime(NaiveDateTime),
    DateRange { start: NaiveDate, end: NaiveDate },
    Dictionary(Map<String, Value>),
    PickerText(String),
    PickerSelection(Vec<Value>),
    Document(UploadedDocument),
    Documents(Vec<UploadedDocument>),
    /// Expression editor contents
    Expression(String),
    /// Already-encoded value, sent as is
    Raw(Value),
}

impl TypedValue {
    /// Date range with `start <= end`
    pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidArgument(format!(
                "start date {} must not be after end date {}",
                start, end
            )));
        }
        Ok(TypedValue::DateRange { start, end })
    }

    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Text(s) => tagged("Text", json!(s)),
            TypedValue::Integer(i) => tagged("Integer", json!(i)),
            TypedValue::IntegerList(items) if items.is_empty() => tagged("Integer?list", Value::Null),
            TypedValue::IntegerList(items) => tagged("Integer?list", json!(items)),
            TypedValue::TextList(items) => tagged("Text?list", json!(items)),
            TypedValue::VariantList(items) => tagged("Variant?list", Value::Array(items.clone())),
            TypedValue::Date(d) => date_json(d),
            TypedValue::DateTime(dt) => {
                let dt = dt.with_second(0).unwrap_or(*dt).with_nanosecond(0).unwrap_or(*dt);
                tagged("dateTime", json!(format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S"))))
            }
            TypedValue::DateRange { start, end } => json!({
                "startDate": date_json(start),
                "endDate": date_json(end),
            }),
            TypedValue::Dictionary(map) => tagged("Dictionary", Value::Object(map.clone())),
            TypedValue::PickerText(text) => json!({"#t": "PickerData", "typedText": text}),
            TypedValue::PickerSelection(ids) => json!({"#t": "PickerData", "identifiers": ids}),
            TypedValue::Document(doc) => doc.collaboration_document(),
            TypedValue::Documents(docs) => tagged(
                "FileMetadata?list",
                Value::Array(docs.iter().map(UploadedDocument::file_metadata).collect()),
            ),
            TypedValue::Expression(expr) => tagged(
                "Dictionary",
                json!({
                    "value": {"#t": "Text", "#v": expr},
                    "usageMetricsKeys": {"#t": "Text?list", "#v": []},
                }),
            ),
            TypedValue::Raw(v) => v.clone(),
        }
    }
}

impl From<TypedValue> for Value {
    fn from(value: TypedValue) -> Self {
        value.to_json()
    }
}

fn tagged(type_name: &str, value: Value) -> Value {
    json!({"#t": type_name, "#v": value})
}

fn date_json(date: &NaiveDate) -> Value {
    tagged("date", json!(format!("{}Z", date.format("%Y-%m-%d"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_tags() {
        assert_eq!(TypedValue::Text("x".into()).to_json(), json!({"#t": "Text", "#v": "x"}));
        assert_eq!(TypedValue::Integer(2).to_json(), json!({"#t": "Integer", "#v": 2}));
        assert_eq!(
            TypedValue::IntegerList(vec![]).to_json(),
            json!({"#t": "Integer?list", "#v": null})
        );
    }

    #[test]
    fn test_dates_drop_seconds() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(TypedValue::Date(d).to_json(), json!({"#t": "date", "#v": "2024-03-09Z"}));

        let dt = d.and_hms_opt(14, 5, 37).unwrap();
        assert_eq!(
            TypedValue::DateTime(dt).to_json(),
            json!({"#t": "dateTime", "#v": "2024-03-09T14:05:00Z"})
        );
    }

    #[test]
    fn test_date_range_order_enforced() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(TypedValue::date_range(b, a).is_err());
        let v = TypedValue::date_range(a, b).unwrap().to_json();
        assert_eq!(v["endDate"]["#v"], "2024-02-01Z");
    }

    #[test]
    fn test_documents() {
        let doc = UploadedDocument {
            id: 42,
            name: "report".into(),
            extension: "pdf".into(),
            size_bytes: 1024,
            signature: None,
        };
        assert_eq!(
            TypedValue::Document(doc.clone()).to_json(),
            json!({"#t": "CollaborationDocument", "id": 42})
        );
        let multi = TypedValue::Documents(vec![doc]).to_json();
        assert_eq!(multi["#t"], "FileMetadata?list");
        assert_eq!(multi["#v"][0]["documentId"]["id"], 42);
        assert_eq!(multi["#v"][0]["clientUuid"], "0");
    }

    #[test]
    fn test_picker_shapes() {
        assert_eq!(
            TypedValue::PickerText("ann".into()).to_json(),
            json!({"#t": "PickerData", "typedText": "ann"})
        );
        assert_eq!(
            TypedValue::PickerSelection(vec![json!("u1")]).to_json(),
            json!({"#t": "PickerData", "identifiers": ["u1"]})
        );
    }
}
