//! 형식별 파싱 - 텍스트를 레코드(키-값 매핑) 목록으로 변환

use serde_json::{Map, Value};

use super::path::find_items;
use super::xml::parse_xml;
use super::{DataFormat, LoadError};

/// 레코드 하나 (키 순서 유지)
pub type Record = Map<String, Value>;

/// 텍스트를 형식에 맞게 파싱하여 레코드 목록 반환
///
/// JSON/XML은 `root_key` 경로를 따라 레코드 목록을 찾습니다.
/// CSV는 평면 구조이므로 `root_key`를 사용하지 않습니다.
pub fn parse_records(
    text: &str,
    format: DataFormat,
    root_key: Option<&str>,
) -> Result<Vec<Record>, LoadError> {
    match format {
        DataFormat::Csv => {
            if root_key.is_some_and(|k| !k.trim().is_empty()) {
                tracing::debug!("root_key is ignored for CSV sources");
            }
            parse_csv(text)
        }
        DataFormat::Json => Ok(find_items(parse_json(text)?, root_key)),
        DataFormat::Xml => Ok(find_items(parse_xml(text)?, root_key)),
        DataFormat::Text => {
            let mut record = Record::new();
            record.insert("content".to_string(), Value::String(text.to_string()));
            Ok(vec![record])
        }
    }
}

/// CSV 파싱 (첫 행이 헤더)
///
/// 칸 수가 헤더와 달라도 허용합니다. 모자란 칸은 키가 없고, 남는 칸은 버립니다.
pub fn parse_csv(text: &str) -> Result<Vec<Record>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| csv_error(&e))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut records = Vec::new();
    for (row_num, result) in reader.records().enumerate() {
        let row = result.map_err(|e| LoadError::Parse {
            format: DataFormat::Csv,
            message: format!("row {}: {}", row_num + 1, e),
        })?;

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.clone(), Value::String(value.to_string())))
            .collect();

        records.push(record);
    }

    Ok(records)
}

/// JSON 파싱
pub fn parse_json(text: &str) -> Result<Value, LoadError> {
    serde_json::from_str(text).map_err(|e| LoadError::Parse {
        format: DataFormat::Json,
        message: e.to_string(),
    })
}

fn csv_error(e: &csv::Error) -> LoadError {
    LoadError::Parse {
        format: DataFormat::Csv,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_csv_keeps_header_order() {
        let records = parse_csv("시설명,주소,운영시간\n해운대,부산,09:00-18:00\n").unwrap();
        assert_eq!(records.len(), 1);

        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["시설명", "주소", "운영시간"]);
        assert_eq!(records[0]["주소"], json!("부산"));
    }

    #[test]
    fn test_parse_csv_ragged_rows() {
        let records = parse_csv("a,b,c\n1,2\n1,2,3,4\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].len(), 2);
        assert!(!records[0].contains_key("c"));
        assert_eq!(records[1].len(), 3);
    }

    #[test]
    fn test_parse_csv_quoted_fields() {
        let records = parse_csv("name,intro\n\"캠핑장\",\"바다, 숲 전망\"\n").unwrap();
        assert_eq!(records[0]["intro"], json!("바다, 숲 전망"));
    }

    #[test]
    fn test_parse_csv_header_only() {
        let records = parse_csv("a,b\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_records_json_root_key() {
        let text = r#"{"data":{"rows":[{"id":1},{"id":2}]}}"#;
        let records = parse_records(text, DataFormat::Json, Some("data.rows")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["id"], json!(2));
    }

    #[test]
    fn test_parse_records_json_without_root_key() {
        let records = parse_records(r#"[{"a":1},{"b":2}]"#, DataFormat::Json, None).unwrap();
        assert_eq!(records.len(), 2);

        let records = parse_records(r#"{"a":1}"#, DataFormat::Json, None).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_records_text() {
        let records = parse_records("hello", DataFormat::Text, None).unwrap();
        assert_eq!(records[0]["content"], json!("hello"));
    }

    #[test]
    fn test_parse_json_error() {
        let err = parse_json("[1,").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse json"));
    }
}
