//! 키 경로 탐색 - 중첩 구조에서 레코드 목록 추출
//!
//! 공공데이터 API 응답은 `response.body.items.item`처럼
//! 실제 레코드 목록이 깊이 중첩되어 있습니다.

use serde_json::Value;

use super::parse::Record;

/// 점(`.`)으로 구분된 키 경로를 따라 레코드 목록을 찾습니다.
///
/// - 경로가 없으면 전체 값을 사용 (배열이면 원소들, 객체면 단일 레코드)
/// - 최종 값이 객체 하나면 한 개짜리 목록으로 감쌉니다 (XML 항목이 1개인 경우)
/// - 배열 구간에서는 숫자 세그먼트를 인덱스로 사용합니다
/// - 경로를 찾지 못하면 경고를 남기고 빈 목록을 반환합니다 (에러 아님)
pub fn find_items(data: Value, root_key: Option<&str>) -> Vec<Record> {
    let key_path = root_key.map(str::trim).filter(|k| !k.is_empty());

    let Some(key_path) = key_path else {
        return into_records(data, "<root>");
    };

    match resolve(data, key_path) {
        Some(value) => into_records(value, key_path),
        None => {
            tracing::warn!("Key path not found: {}", key_path);
            Vec::new()
        }
    }
}

fn resolve(data: Value, key_path: &str) -> Option<Value> {
    let mut current = data;

    for segment in key_path.split('.') {
        current = match current {
            Value::Object(mut map) => map.remove(segment)?,
            Value::Array(mut items) => {
                let index: usize = segment.parse().ok()?;
                if index >= items.len() {
                    return None;
                }
                items.swap_remove(index)
            }
            _ => return None,
        };
    }

    Some(current)
}

fn into_records(value: Value, key_path: &str) -> Vec<Record> {
    match value {
        Value::Object(map) => vec![map],
        Value::Array(items) => {
            let total = items.len();
            let records: Vec<Record> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();

            if records.len() < total {
                tracing::warn!(
                    "Skipped {} non-object items at {}",
                    total - records.len(),
                    key_path
                );
            }
            records
        }
        Value::Null => {
            tracing::warn!("No records at {} (empty value)", key_path);
            Vec::new()
        }
        _ => {
            tracing::warn!("Value at {} is not a record list", key_path);
            Vec::new()
        }
    }
}
