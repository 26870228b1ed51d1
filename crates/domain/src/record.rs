//! Measurement record — the current named-quantity readings of a device.
//!
//! A record is a snapshot: [`MeasurementRecord::overwrite`] replaces the
//! values of every quantity present in the new readings. Variants that
//! model a whole trace store it as a single [`MeasurementValue::Trace`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// A single typed reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Trace(Vec<f64>),
}

impl MeasurementValue {
    /// Numeric view of scalar readings.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for MeasurementValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for MeasurementValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for MeasurementValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<f64>> for MeasurementValue {
    fn from(value: Vec<f64>) -> Self {
        Self::Trace(value)
    }
}

impl std::fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Trace(v) => write!(f, "<trace: {} points>", v.len()),
        }
    }
}

/// Mapping from quantity name to its current value(s).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementRecord {
    quantities: BTreeMap<String, Vec<MeasurementValue>>,
}

impl MeasurementRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(
        mut self,
        quantity: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<MeasurementValue>>,
    ) -> Self {
        self.set(quantity, values);
        self
    }

    /// Replace the values stored for `quantity`.
    pub fn set(
        &mut self,
        quantity: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<MeasurementValue>>,
    ) {
        self.quantities
            .insert(quantity.into(), values.into_iter().map(Into::into).collect());
    }

    /// Overwrite every quantity present in `readings`; other quantities are kept.
    pub fn overwrite(&mut self, readings: MeasurementRecord) {
        self.quantities.extend(readings.quantities);
    }

    /// Values currently stored for `quantity`.
    #[must_use]
    pub fn get(&self, quantity: &str) -> Option<&[MeasurementValue]> {
        self.quantities.get(quantity).map(Vec::as_slice)
    }

    /// First value of `quantity`, the primary scalar of most devices.
    #[must_use]
    pub fn scalar(&self, quantity: &str) -> Option<&MeasurementValue> {
        self.get(quantity).and_then(<[MeasurementValue]>::first)
    }

    /// Whether the record holds no quantity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    /// Number of quantities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    /// Iterate quantities in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MeasurementValue])> {
        self.quantities
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Plain-text table of the record, one quantity per row.
    #[must_use]
    pub fn render_table(&self) -> String {
        let width = self
            .quantities
            .keys()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max("quantity".len());
        let mut out = format!("{:<width$} | values\n", "quantity");
        let _ = writeln!(out, "{}-+-{}", "-".repeat(width), "-".repeat(6));
        for (name, values) in &self.quantities {
            let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "{name:<width$} | {}", rendered.join(", "));
        }
        out
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<MeasurementValue>)> for MeasurementRecord {
    fn from_iter<I: IntoIterator<Item = (K, Vec<MeasurementValue>)>>(iter: I) -> Self {
        Self {
            quantities: iter
                .into_iter()
                .map(|(name, values)| (name.into(), values))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_float_values_as_numbers() {
        let record = MeasurementRecord::new().with("counts", [5.0]);
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"counts":[5.0]}"#);
    }

    #[test]
    fn should_keep_integers_distinct_from_floats() {
        let record: MeasurementRecord = serde_json::from_str(r#"{"x":[1],"y":[2.0]}"#).unwrap();
        assert_eq!(record.scalar("x"), Some(&MeasurementValue::Int(1)));
        assert_eq!(record.scalar("y"), Some(&MeasurementValue::Float(2.0)));
    }

    #[test]
    fn should_deserialize_nested_array_as_trace() {
        let record: MeasurementRecord =
            serde_json::from_str(r#"{"voltage (mV)":[[0.5,1.5]]}"#).unwrap();
        assert_eq!(
            record.scalar("voltage (mV)"),
            Some(&MeasurementValue::Trace(vec![0.5, 1.5]))
        );
    }

    #[test]
    fn should_overwrite_instead_of_append() {
        let mut record = MeasurementRecord::new().with("counts", [1.0]);
        record.overwrite(MeasurementRecord::new().with("counts", [2.0]));
        assert_eq!(record.get("counts"), Some(&[MeasurementValue::Float(2.0)][..]));
    }

    #[test]
    fn should_keep_quantities_absent_from_new_readings() {
        let mut record = MeasurementRecord::new()
            .with("counts", [1.0])
            .with("current (mA)", [3.0]);
        record.overwrite(MeasurementRecord::new().with("counts", [2.0]));
        assert_eq!(record.len(), 2);
        assert_eq!(
            record.scalar("current (mA)"),
            Some(&MeasurementValue::Float(3.0))
        );
    }

    #[test]
    fn should_report_numeric_view_of_scalars() {
        assert_eq!(MeasurementValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(MeasurementValue::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(MeasurementValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn should_render_one_row_per_quantity() {
        let record = MeasurementRecord::new()
            .with("counts", [1.0, 2.0])
            .with("total counts", [3.0]);
        let table = record.render_table();
        assert!(table.contains("counts       | 1, 2"));
        assert!(table.contains("total counts | 3"));
        assert_eq!(table.lines().count(), 4);
    }
}
