//! Decoding declaration-record batches produced by the header parser.
//!
//! A batch is either `{"namespaces": [...], "headers": [...], "decls": [...]}`
//! or a bare array of records. Records and members are positional JSON
//! arrays; trailing elements may be omitted.

use serde_json::Value;

use crate::errors::{DeclbindError, DeclbindResult};
use crate::models::{DeclBatch, DeclMember, DeclRecord};

pub fn parse_batch(text: &str, origin: &str) -> DeclbindResult<DeclBatch> {
    let payload: Value = serde_json::from_str(text)
        .map_err(|e| DeclbindError::Input(format!("{origin}: {e}")))?;
    batch_from_value(&payload, origin)
}

pub fn batch_from_value(payload: &Value, origin: &str) -> DeclbindResult<DeclBatch> {
    let (namespaces, headers, decls) = match payload {
        Value::Array(decls) => (Vec::new(), Vec::new(), decls.as_slice()),
        Value::Object(map) => {
            let decls: &[Value] = match map.get("decls") {
                Some(Value::Array(arr)) => arr.as_slice(),
                Some(_) => {
                    return Err(DeclbindError::Input(format!("{origin}: \"decls\" must be an array")))
                }
                None => &[],
            };
            (
                string_list(map.get("namespaces"), origin, "namespaces")?,
                string_list(map.get("headers"), origin, "headers")?,
                decls,
            )
        }
        _ => {
            return Err(DeclbindError::Input(format!(
                "{origin}: expected an object or an array of records"
            )))
        }
    };

    let decls = decls
        .iter()
        .enumerate()
        .map(|(i, raw)| record_from_value(raw).map_err(|e| located(e, origin, i)))
        .collect::<DeclbindResult<Vec<_>>>()?;

    Ok(DeclBatch {
        namespaces,
        headers,
        decls,
    })
}

fn located(err: DeclbindError, origin: &str, index: usize) -> DeclbindError {
    match err {
        DeclbindError::Input(msg) => DeclbindError::Input(format!("{origin}: record {index}: {msg}")),
        other => other,
    }
}

fn string_list(value: Option<&Value>, origin: &str, field: &str) -> DeclbindResult<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    DeclbindError::Input(format!("{origin}: \"{field}\" must hold strings"))
                })
            })
            .collect(),
        Some(_) => Err(DeclbindError::Input(format!(
            "{origin}: \"{field}\" must be an array"
        ))),
    }
}

fn string_at(fields: &[Value], idx: usize, what: &str) -> DeclbindResult<String> {
    match fields.get(idx) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(DeclbindError::Input(format!(
            "{what} must be a string, got {other}"
        ))),
    }
}

fn modifiers_at(fields: &[Value], idx: usize) -> DeclbindResult<Vec<String>> {
    match fields.get(idx) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|m| {
                m.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| DeclbindError::Input(format!("modifier must be a string, got {m}")))
            })
            .collect(),
        Some(other) => Err(DeclbindError::Input(format!(
            "modifier list must be an array, got {other}"
        ))),
    }
}

pub fn member_from_value(raw: &Value) -> DeclbindResult<DeclMember> {
    let fields = raw
        .as_array()
        .ok_or_else(|| DeclbindError::Input(format!("member must be an array, got {raw}")))?;
    Ok(DeclMember {
        ty: string_at(fields, 0, "member type")?,
        name: string_at(fields, 1, "member name")?,
        default_value: string_at(fields, 2, "member default")?,
        modifiers: modifiers_at(fields, 3)?,
    })
}

pub fn record_from_value(raw: &Value) -> DeclbindResult<DeclRecord> {
    let fields = raw
        .as_array()
        .ok_or_else(|| DeclbindError::Input(format!("record must be an array, got {raw}")))?;
    let name = string_at(fields, 0, "record name")?;
    if name.trim().is_empty() {
        return Err(DeclbindError::Input("record has no name".to_string()));
    }
    let members = match fields.get(3) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(member_from_value)
            .collect::<DeclbindResult<Vec<_>>>()?,
        Some(other) => {
            return Err(DeclbindError::Input(format!(
                "member list must be an array, got {other}"
            )))
        }
    };
    let rettype = string_at(fields, 4, "return type")?;

    Ok(DeclRecord {
        name,
        base: string_at(fields, 1, "record base")?,
        modifiers: modifiers_at(fields, 2)?,
        members,
        rettype: (!rettype.is_empty()).then_some(rettype),
        docstring: string_at(fields, 5, "docstring")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_batch() {
        let text = r#"{
            "namespaces": ["cv", "cv.ml"],
            "headers": ["/inc/opencv2/ml.hpp"],
            "decls": [
                ["class cv.ml.SVM", ": cv::ml::StatModel", [], [["int", "degree", "", ["/RW"]]], null, "Support vectors."],
                ["cv.ml.SVM.create", "Ptr_SVM", ["/S"], [], "", ""],
                ["const cv.ml.SVM.LINEAR", "0", [], []]
            ]
        }"#;
        let batch = parse_batch(text, "ml.json").unwrap();
        assert_eq!(batch.namespaces, vec!["cv", "cv.ml"]);
        assert_eq!(batch.headers.len(), 1);
        assert_eq!(batch.decls.len(), 3);

        let class = &batch.decls[0];
        assert_eq!(class.name, "class cv.ml.SVM");
        assert_eq!(class.members[0].modifiers, vec!["/RW"]);
        assert_eq!(class.rettype, None);
        assert_eq!(class.docstring, "Support vectors.");

        let constant = &batch.decls[2];
        assert_eq!(constant.base, "0");
        assert!(constant.docstring.is_empty());
    }

    #[test]
    fn test_bare_array_and_short_members() {
        let text = r#"[["cv.add", "void", [], [["Mat", "src1"], ["Mat", "dst", "", ["/O"]]], "void"]]"#;
        let batch = parse_batch(text, "inline").unwrap();
        assert!(batch.namespaces.is_empty());
        let rec = &batch.decls[0];
        assert_eq!(rec.members[0].default_value, "");
        assert!(rec.members[0].modifiers.is_empty());
        assert_eq!(rec.rettype.as_deref(), Some("void"));
    }

    #[test]
    fn test_malformed_inputs_are_located() {
        let err = parse_batch(r#"{"decls": [["cv.f", 3]]}"#, "bad.json").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad.json"));
        assert!(msg.contains("record 0"));

        assert!(parse_batch("not json", "x").is_err());
        assert!(parse_batch(r#"{"decls": {}}"#, "x").is_err());
        assert!(parse_batch(r#"{"namespaces": [1]}"#, "x").is_err());
        assert!(parse_batch(r#"[[""]]"#, "x").is_err());
        assert!(parse_batch("42", "x").is_err());
    }
}
