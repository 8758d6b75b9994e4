//! Keypoint label files.
//!
//! A label is a JSON object whose keypoint field (`hand_pts` by default)
//! holds either a flat list of numbers read as `(x, y, z)` triplets or a list
//! of `[x, y]` / `[x, y, z]` rows. Records always have [`NUM_KEYPOINTS`]
//! entries: missing trailing points are zero-filled so indices keep matching
//! the joint order.

use std::{fs, path::Path};

use augkit_pipeline::Keypoint;
use serde_json::Value;

use crate::error::{DatasetError, DatasetResult};

/// Joints per hand.
pub const NUM_KEYPOINTS: usize = 21;

/// Fixed-length keypoint set parsed from one label file.
pub type KeypointRecord = [Keypoint; NUM_KEYPOINTS];

/// Reads and parses the keypoint field of a label file.
pub fn load_keypoints(path: &Path, field: &str) -> DatasetResult<KeypointRecord> {
    let text = fs::read_to_string(path).map_err(|e| DatasetError::LabelOpenFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|e| DatasetError::LabelParseFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_keypoints(&value, field).map_err(|reason| match reason {
        ParseFailure::MissingField => DatasetError::FieldNotFound {
            path: path.to_path_buf(),
            field: field.to_string(),
        },
        ParseFailure::Invalid(reason) => DatasetError::InvalidKeypoints {
            path: path.to_path_buf(),
            reason,
        },
    })
}

#[derive(Debug, PartialEq)]
enum ParseFailure {
    MissingField,
    Invalid(String),
}

fn parse_keypoints(label: &Value, field: &str) -> Result<KeypointRecord, ParseFailure> {
    let entries = label
        .get(field)
        .ok_or(ParseFailure::MissingField)?
        .as_array()
        .ok_or_else(|| ParseFailure::Invalid(format!("'{field}' is not an array")))?;

    let number = |v: &Value| {
        v.as_f64()
            .map(|n| n as f32)
            .ok_or_else(|| ParseFailure::Invalid(format!("{v} is not a number")))
    };

    let points: Vec<Keypoint> = if entries.iter().all(Value::is_number) {
        if entries.len() % 3 != 0 {
            return Err(ParseFailure::Invalid(format!(
                "flat list of {} values is not a multiple of 3",
                entries.len()
            )));
        }
        entries
            .chunks_exact(3)
            .map(|c| Ok(Keypoint::new(number(&c[0])?, number(&c[1])?, number(&c[2])?)))
            .collect::<Result<_, _>>()?
    } else {
        entries
            .iter()
            .map(|row| match row.as_array().map(Vec::as_slice) {
                Some([x, y]) => Ok(Keypoint::new(number(x)?, number(y)?, 0.0)),
                Some([x, y, z]) => Ok(Keypoint::new(number(x)?, number(y)?, number(z)?)),
                _ => Err(ParseFailure::Invalid(format!(
                    "{row} is not an [x, y] or [x, y, z] row"
                ))),
            })
            .collect::<Result<_, _>>()?
    };

    if points.len() > NUM_KEYPOINTS {
        return Err(ParseFailure::Invalid(format!(
            "expected at most {NUM_KEYPOINTS} points, found {}",
            points.len()
        )));
    }

    let mut record = [Keypoint::default(); NUM_KEYPOINTS];
    record[..points.len()].copy_from_slice(&points);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_rows_and_zero_fills() {
        let label = json!({ "hand_pts": [[1.0, 2.0, 1.0], [3.5, 4.5, 0.0], [5, 6]] });
        let record = parse_keypoints(&label, "hand_pts").unwrap();
        assert_eq!(record.len(), NUM_KEYPOINTS);
        assert_eq!(record[0], Keypoint::new(1.0, 2.0, 1.0));
        assert_eq!(record[1], Keypoint::new(3.5, 4.5, 0.0));
        assert_eq!(record[2], Keypoint::new(5.0, 6.0, 0.0));
        assert!(record[3..].iter().all(|k| *k == Keypoint::default()));
    }

    #[test]
    fn parses_flat_triplets() {
        let flat: Vec<f64> = (0..63).map(f64::from).collect();
        let record = parse_keypoints(&json!({ "pts": flat }), "pts").unwrap();
        assert_eq!(record[20], Keypoint::new(60.0, 61.0, 62.0));
    }

    #[rstest]
    #[case(json!({ "hand_pts": "nope" }))]
    #[case(json!({ "hand_pts": [1.0, 2.0] }))]
    #[case(json!({ "hand_pts": [[1.0]] }))]
    #[case(json!({ "hand_pts": [[1.0, "x", 0.0]] }))]
    #[case(json!({ "hand_pts": vec![[0.0, 0.0, 0.0]; 22] }))]
    fn rejects_malformed_fields(#[case] label: Value) {
        assert!(matches!(
            parse_keypoints(&label, "hand_pts"),
            Err(ParseFailure::Invalid(_))
        ));
    }

    #[test]
    fn missing_field_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, r#"{ "other": [] }"#).unwrap();
        match load_keypoints(&path, "hand_pts").unwrap_err() {
            DatasetError::FieldNotFound { path: p, field } => {
                assert_eq!(p, path);
                assert_eq!(field, "hand_pts");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_keypoints(&path, "hand_pts").unwrap_err(),
            DatasetError::LabelParseFailed { .. }
        ));
        assert!(matches!(
            load_keypoints(&dir.path().join("missing.json"), "hand_pts").unwrap_err(),
            DatasetError::LabelOpenFailed { .. }
        ));
    }
}
