//! Pinecone 벡터 인덱스 - REST API 클라이언트
//!
//! - 컨트롤 플레인: `GET /indexes/{name}` 으로 데이터 플레인 host 조회
//! - 데이터 플레인: upsert / query / describe_index_stats / delete
//!
//! source: https://docs.pinecone.io/reference/api/introduction

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PineconeConfig;
use crate::retry::RetryPolicy;

use super::{IndexStats, ScoredRecord, VectorIndex, VectorRecord};

/// API 버전 헤더 값
const API_VERSION: &str = "2024-07";
/// upsert 요청당 최대 벡터 수
const UPSERT_BATCH_SIZE: usize = 100;

/// Pinecone 인덱스 클라이언트
#[derive(Debug)]
pub struct PineconeIndex {
    api_key: String,
    /// `https://{index-host}`
    host_url: String,
    namespace: Option<String>,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl PineconeIndex {
    /// host를 알고 있을 때 직접 생성
    ///
    /// `host`에 스킴이 없으면 `https://`를 붙입니다.
    pub fn new(api_key: String, host: &str, namespace: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            host_url: normalize_host(host),
            namespace,
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// 설정에서 연결 (host 미설정 시 컨트롤 플레인 조회)
    pub async fn connect(config: &PineconeConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            anyhow::anyhow!("PINECONE_API_KEY not set.\nSet: export PINECONE_API_KEY=your-api-key")
        })?;

        let host = match config.index_host.as_deref() {
            Some(host) => host.to_string(),
            None => {
                let index_name = config.index_name.as_deref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "PINECONE_INDEX_NAME not set.\nSet: export PINECONE_INDEX_NAME=your-index"
                    )
                })?;
                describe_index_host(&api_key, &config.control_url, index_name).await?
            }
        };

        tracing::info!("Using Pinecone index host {}", host);
        Self::new(api_key, &host, config.namespace.clone())
    }

    /// 재시도 정책 변경
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn host_url(&self) -> &str {
        &self.host_url
    }

    async fn post<T: Serialize + ?Sized>(&self, label: &str, path: &str, body: &T) -> Result<String> {
        let url = format!("{}{}", self.host_url, path);
        self.retry
            .send(label, || {
                self.client
                    .post(&url)
                    .header("Api-Key", &self.api_key)
                    .header("X-Pinecone-API-Version", API_VERSION)
                    .json(body)
            })
            .await
    }
}

/// 컨트롤 플레인에서 인덱스 host 조회
async fn describe_index_host(api_key: &str, control_url: &str, index_name: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;
    let url = format!("{}/indexes/{}", control_url.trim_end_matches('/'), index_name);

    let body = RetryPolicy::default()
        .send("Pinecone describe index", || {
            client
                .get(&url)
                .header("Api-Key", api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
        })
        .await
        .with_context(|| format!("Failed to describe Pinecone index '{}'", index_name))?;

    let description: IndexDescription =
        serde_json::from_str(&body).context("Failed to parse index description")?;

    if let Some(dimension) = description.dimension {
        tracing::debug!("Index {} dimension: {}", index_name, dimension);
    }
    Ok(description.host)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
struct WireVector<'a> {
    id: &'a str,
    values: &'a [f32],
    #[serde(skip_serializing_if = "is_empty_metadata")]
    metadata: &'a Map<String, Value>,
}

fn is_empty_metadata(metadata: &&Map<String, Value>) -> bool {
    metadata.is_empty()
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<WireVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: usize,
    #[serde(default)]
    namespaces: HashMap<String, NamespaceSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAllRequest<'a> {
    delete_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

// ============================================================================
// VectorIndex
// ============================================================================

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut upserted = 0;

        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|r| WireVector {
                        id: &r.id,
                        values: &r.values,
                        metadata: &r.metadata,
                    })
                    .collect(),
                namespace: self.namespace.as_deref(),
            };

            let body = self
                .post("Pinecone upsert", "/vectors/upsert", &request)
                .await?;
            let response: UpsertResponse =
                serde_json::from_str(&body).context("Failed to parse upsert response")?;

            tracing::debug!("Upserted {} vectors", response.upserted_count);
            upserted += response.upserted_count;
        }

        Ok(upserted)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };

        let body = self.post("Pinecone query", "/query", &request).await?;
        let response: QueryResponse =
            serde_json::from_str(&body).context("Failed to parse query response")?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| ScoredRecord {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let body = self
            .post("Pinecone stats", "/describe_index_stats", &serde_json::json!({}))
            .await?;
        let response: StatsResponse =
            serde_json::from_str(&body).context("Failed to parse index stats")?;

        // 기본 네임스페이스는 빈 문자열 키
        let namespace = self.namespace.as_deref().unwrap_or("");
        let namespace_vector_count = response
            .namespaces
            .get(namespace)
            .map(|ns| ns.vector_count);

        Ok(IndexStats {
            dimension: response.dimension,
            total_vector_count: response.total_vector_count,
            namespace_vector_count,
        })
    }

    async fn delete_all(&self) -> Result<()> {
        let request = DeleteAllRequest {
            delete_all: true,
            namespace: self.namespace.as_deref(),
        };
        self.post("Pinecone delete", "/vectors/delete", &request)
            .await?;

        tracing::info!(
            "Deleted all vectors in namespace '{}'",
            self.namespace.as_deref().unwrap_or("")
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
