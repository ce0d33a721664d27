//! Document - 레코드를 검색용 텍스트 + 메타데이터로 변환

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::parse::Record;
use super::DataFormat;

/// 검색/임베딩 단위 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// 검색에 사용할 본문
    pub page_content: String,
    /// 출처 등 메타데이터
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// 메타데이터의 `source` 값
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// 레코드 변환 옵션
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordOptions<'a> {
    /// 메타데이터로 복사할 키 (예: `facltNm`)
    pub metadata_fields: &'a [String],
    /// 값이 비어 있으면 레코드를 건너뛸 키 (예: `시설명`)
    pub required_fields: &'a [String],
    /// 모든 문서에 붙일 고정 메타데이터 (예: `category`)
    pub static_metadata: Option<&'a Map<String, Value>>,
}

/// 레코드 목록을 Document 목록으로 변환
///
/// 본문은 값이 있는 항목만 `key: value` 형태로 줄바꿈 연결합니다.
/// 텍스트 형식은 `content` 값을 그대로 본문으로 사용합니다.
pub fn to_documents(
    items: Vec<Record>,
    source: &str,
    format: DataFormat,
    options: &RecordOptions<'_>,
) -> Vec<Document> {
    let mut documents = Vec::with_capacity(items.len());
    let mut skipped = 0usize;

    for item in items {
        let has_required = options
            .required_fields
            .iter()
            .all(|field| item.get(field).is_some_and(is_truthy));
        if !has_required {
            skipped += 1;
            continue;
        }

        let page_content = match format {
            DataFormat::Text => item
                .get("content")
                .map(render_value)
                .unwrap_or_default(),
            _ => record_to_text(&item),
        };

        if page_content.trim().is_empty() {
            skipped += 1;
            continue;
        }

        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String(source.to_string()));
        metadata.insert("format".to_string(), Value::String(format.to_string()));

        // source/format은 덮어쓰지 않음
        if let Some(fixed) = options.static_metadata {
            for (key, value) in fixed {
                metadata.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        for field in options.metadata_fields {
            if let Some(value) = item.get(field).filter(|v| is_truthy(v)) {
                metadata.insert(field.clone(), value.clone());
            }
        }

        documents.push(Document::new(page_content, metadata));
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} empty or incomplete records from {}", skipped, source);
    }

    documents
}

/// 레코드를 `key: value` 줄 목록으로 직렬화 (빈 값 제외)
pub fn record_to_text(record: &Record) -> String {
    record
        .iter()
        .filter(|(_, value)| is_truthy(value))
        .map(|(key, value)| format!("{}: {}", key, render_value(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 값이 "있는" 값인지 판단
///
/// null, 빈 문자열, false, 0, 빈 배열/객체는 값이 없는 것으로 봅니다.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// 값을 본문용 텍스트로 변환
///
/// 문자열은 그대로, 숫자/불리언은 기본 표기, 배열/객체는 JSON
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    #[test]
    fn test_record_to_text_skips_empty_values() {
        let item = record(json!({
            "facltNm": "해운대 캠핑장",
            "intro": "",
            "tel": null,
            "sites": 0,
            "pets": false,
            "price": 30000,
            "open": true
        }));

        assert_eq!(
            record_to_text(&item),
            "facltNm: 해운대 캠핑장\nprice: 30000\nopen: true"
        );
    }

    #[test]
    fn test_render_nested_values() {
        assert_eq!(render_value(&json!(["a", "b"])), r#"["a","b"]"#);
        assert_eq!(render_value(&json!({"@lang": "ko"})), r#"{"@lang":"ko"}"#);
        assert_eq!(render_value(&json!(1.5)), "1.5");
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0.0)));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!(" ")));
    }

    #[test]
    fn test_to_documents_metadata() {
        let items = vec![record(json!({"facltNm": "A", "addr1": "부산"}))];
        let docs = to_documents(items, "data/a.json", DataFormat::Json, &RecordOptions::default());

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content, "facltNm: A\naddr1: 부산");
        assert_eq!(docs[0].source(), Some("data/a.json"));
        assert_eq!(docs[0].metadata["format"], json!("json"));
        assert_eq!(docs[0].metadata.len(), 2);
    }

    #[test]
    fn test_metadata_and_required_fields() {
        let items = vec![
            record(json!({"시설명": "가평 캠핑장", "주소": "경기"})),
            record(json!({"시설명": "", "주소": "강원"})),
            record(json!({"주소": "제주"})),
        ];
        let metadata_fields = vec!["시설명".to_string()];
        let required_fields = vec!["시설명".to_string()];
        let options = RecordOptions {
            metadata_fields: &metadata_fields,
            required_fields: &required_fields,
            ..Default::default()
        };

        let docs = to_documents(items, "a.csv", DataFormat::Csv, &options);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["시설명"], json!("가평 캠핑장"));
    }

    #[test]
    fn test_static_metadata() {
        let items = vec![record(json!({"시설명": "송정 캠핑장", "category": "레코드 값"}))];
        let fixed = record(json!({"category": "숙박/캠핑", "source": "public_data_csv"}));
        let metadata_fields = vec!["시설명".to_string()];
        let options = RecordOptions {
            metadata_fields: &metadata_fields,
            static_metadata: Some(&fixed),
            ..Default::default()
        };

        let docs = to_documents(items, "a.csv", DataFormat::Csv, &options);
        assert_eq!(docs[0].metadata["category"], json!("숙박/캠핑"));
        assert_eq!(docs[0].metadata["시설명"], json!("송정 캠핑장"));
        assert_eq!(docs[0].source(), Some("a.csv"));
    }

    #[test]
    fn test_all_empty_record_is_skipped() {
        let items = vec![record(json!({"a": "", "b": null}))];
        let docs = to_documents(items, "x", DataFormat::Json, &RecordOptions::default());
        assert!(docs.is_empty());
    }

    #[test]
    fn test_text_format_uses_raw_content() {
        let items = vec![record(json!({"content": "첫 줄\n둘째 줄"}))];
        let docs = to_documents(items, "a.txt", DataFormat::Text, &RecordOptions::default());
        assert_eq!(docs[0].page_content, "첫 줄\n둘째 줄");
        assert_eq!(docs[0].metadata["format"], json!("text"));
    }
}
