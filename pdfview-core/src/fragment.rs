//! Deep-link encoding of the view state.
//!
//! A fragment is the base64 form of the JSON array
//! `[version, document_name, page_index, selection?]`.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{json, Value};

use crate::SelectionRange;

pub const FRAGMENT_VERSION: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLocation {
    pub document_name: String,
    pub page_index: usize,
    pub selection: Option<SelectionRange>,
}

#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("fragment is empty")]
    Empty,
    #[error("fragment is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("fragment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported fragment version {0}")]
    UnsupportedVersion(u64),
    #[error("malformed fragment: {0}")]
    Malformed(&'static str),
}

pub fn encode_fragment(location: &ViewLocation) -> String {
    let mut fields = vec![
        json!(FRAGMENT_VERSION),
        json!(location.document_name),
        json!(location.page_index),
    ];
    if let Some(selection) = location.selection {
        fields.push(json!(selection.as_array()));
    }
    URL_SAFE_NO_PAD.encode(Value::Array(fields).to_string())
}

pub fn decode_fragment(fragment: &str) -> Result<ViewLocation, FragmentError> {
    let trimmed = fragment.trim().trim_start_matches('#');
    if trimmed.is_empty() {
        return Err(FragmentError::Empty);
    }

    let bytes = match URL_SAFE_NO_PAD.decode(trimmed.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(_) => STANDARD.decode(trimmed)?,
    };
    let value: Value = serde_json::from_slice(&bytes)?;
    let fields = value
        .as_array()
        .ok_or(FragmentError::Malformed("expected a JSON array"))?;
    if fields.len() < 3 || fields.len() > 4 {
        return Err(FragmentError::Malformed("expected three or four fields"));
    }

    let version = fields[0]
        .as_u64()
        .ok_or(FragmentError::Malformed("version must be a number"))?;
    if version != FRAGMENT_VERSION {
        return Err(FragmentError::UnsupportedVersion(version));
    }

    let document_name = fields[1]
        .as_str()
        .ok_or(FragmentError::Malformed("document name must be a string"))?
        .to_string();
    let page_index = as_index(&fields[2])
        .ok_or(FragmentError::Malformed("page index must be a non-negative integer"))?;

    let selection = match fields.get(3) {
        None | Some(Value::Null) => None,
        Some(Value::Array(parts)) if parts.len() == 4 => {
            let mut indices = [0usize; 4];
            for (slot, part) in indices.iter_mut().zip(parts) {
                *slot = as_index(part)
                    .ok_or(FragmentError::Malformed("selection must hold integers"))?;
            }
            Some(SelectionRange::new(
                indices[0], indices[1], indices[2], indices[3],
            ))
        }
        Some(_) => return Err(FragmentError::Malformed("selection must be a 4-tuple")),
    };

    Ok(ViewLocation {
        document_name,
        page_index,
        selection,
    })
}

fn as_index(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|v| usize::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_fragment(json: &str) -> String {
        STANDARD.encode(json)
    }

    #[test]
    fn round_trips_with_and_without_selection() {
        let locations = [
            ViewLocation {
                document_name: "amd64volume2.pdf".into(),
                page_index: 3,
                selection: Some(SelectionRange::new(2, 10, 3, 15)),
            },
            ViewLocation {
                document_name: "manuel d'utilisation, été.pdf".into(),
                page_index: 0,
                selection: None,
            },
            ViewLocation {
                document_name: String::new(),
                page_index: usize::MAX >> 12,
                selection: Some(SelectionRange::new(0, 0, 0, 0)),
            },
        ];

        for location in locations {
            let encoded = encode_fragment(&location);
            assert!(encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
            assert_eq!(decode_fragment(&encoded).unwrap(), location);
        }
    }

    #[test]
    fn decodes_standard_base64_with_hash_prefix() {
        let fragment = format!(
            "#{}",
            standard_fragment(r#"[0,"amd64volume2.pdf",3,[2,10,3,15]]"#)
        );
        let location = decode_fragment(&fragment).unwrap();
        assert_eq!(location.document_name, "amd64volume2.pdf");
        assert_eq!(location.page_index, 3);
        assert_eq!(location.selection, Some(SelectionRange::new(2, 10, 3, 15)));
    }

    #[test]
    fn null_selection_decodes_as_absent() {
        let fragment = standard_fragment(r#"[0,"a.pdf",1,null]"#);
        assert_eq!(decode_fragment(&fragment).unwrap().selection, None);
    }

    #[test]
    fn rejects_malformed_fragments() {
        assert!(matches!(decode_fragment(""), Err(FragmentError::Empty)));
        assert!(matches!(
            decode_fragment("%%%"),
            Err(FragmentError::Base64(_))
        ));
        assert!(matches!(
            decode_fragment(&standard_fragment("not json")),
            Err(FragmentError::Json(_))
        ));
        assert!(matches!(
            decode_fragment(&standard_fragment(r#"[1,"a.pdf",0]"#)),
            Err(FragmentError::UnsupportedVersion(1))
        ));
        assert!(matches!(
            decode_fragment(&standard_fragment(r#"[0,"a.pdf",-1]"#)),
            Err(FragmentError::Malformed(_))
        ));
        assert!(matches!(
            decode_fragment(&standard_fragment(r#"[0,"a.pdf",0,[1,2,3]]"#)),
            Err(FragmentError::Malformed(_))
        ));
        assert!(matches!(
            decode_fragment(&standard_fragment(r#"{"name":"a.pdf"}"#)),
            Err(FragmentError::Malformed(_))
        ));
    }
}
