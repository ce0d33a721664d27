//! Vector Index - 호스팅 벡터 인덱스 트레이트 및 레코드 변환
//!
//! 문서 본문은 메타데이터 `text` 키에 함께 저장하여
//! 검색 결과를 다시 Document로 복원할 수 있게 합니다.

mod pinecone;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::loader::Document;

pub use pinecone::PineconeIndex;

/// 본문을 담는 메타데이터 키
pub const TEXT_KEY: &str = "text";

// ============================================================================
// Types
// ============================================================================

/// 업로드할 벡터 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    /// 유사도 스코어 (인덱스 metric 기준, 높을수록 유사)
    pub score: f32,
    pub metadata: Map<String, Value>,
}

impl ScoredRecord {
    /// 메타데이터에서 Document 복원
    pub fn to_document(&self) -> Document {
        let mut metadata = self.metadata.clone();
        let text = match metadata.remove(TEXT_KEY) {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Document::new(text, metadata)
    }
}

/// 인덱스 통계
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    pub dimension: Option<usize>,
    pub total_vector_count: usize,
    /// 설정된 네임스페이스의 벡터 수
    pub namespace_vector_count: Option<usize>,
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// 벡터 인덱스 트레이트 (async)
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 레코드 업서트 (같은 id는 덮어씀)
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// 유사 벡터 검색
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>>;

    /// 인덱스 통계
    async fn stats(&self) -> Result<IndexStats>;

    /// 네임스페이스의 모든 벡터 삭제
    async fn delete_all(&self) -> Result<()>;
}

// ============================================================================
// Record Helpers
// ============================================================================

/// Document + 임베딩 → 업로드 레코드
///
/// `position`은 같은 소스 안에서 문서 순서입니다.
pub fn document_to_record(doc: &Document, position: usize, values: Vec<f32>) -> VectorRecord {
    let mut metadata = sanitize_metadata(&doc.metadata);
    metadata.insert(TEXT_KEY.to_string(), Value::String(doc.page_content.clone()));

    VectorRecord {
        id: record_id(doc, position),
        values,
        metadata,
    }
}

/// 결정적 벡터 ID: sha256(source, position, content)
///
/// 같은 데이터를 다시 업로드하면 중복 대신 덮어씁니다.
pub fn record_id(doc: &Document, position: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc.source().unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(position.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(doc.page_content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 인덱스가 저장할 수 있는 메타데이터로 변환
///
/// 문자열/숫자/불리언/문자열 배열만 허용: null은 제거,
/// 객체와 혼합 배열은 JSON 문자열로 변환합니다.
pub fn sanitize_metadata(metadata: &Map<String, Value>) -> Map<String, Value> {
    metadata
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(_) | Value::Number(_) | Value::Bool(_) => value.clone(),
                Value::Array(items) if items.iter().all(Value::is_string) => value.clone(),
                Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
            };
            Some((key.clone(), value))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
