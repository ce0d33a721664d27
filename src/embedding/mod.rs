//! 임베딩 모듈 - OpenAI API를 통한 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 OpenAI 임베딩 프로바이더입니다.
//! 문서 업로드와 질문 검색 모두 같은 모델을 사용해야 합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::from_config(&config.openai)?;
//! let embedding = embedder.embed("부산 오션뷰 캠핑장").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::retry::RetryPolicy;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results.pop().context("No embedding returned")
    }

    /// 배치 임베딩 (입력 순서 유지)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// 요청당 최대 입력 수
const BATCH_SIZE: usize = 64;

/// OpenAI 임베딩 구현체
///
/// source: https://platform.openai.com/docs/api-reference/embeddings
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiEmbedding {
    /// 새 OpenAI 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API 키
    /// * `base_url` - API 베이스 URL (예: `https://api.openai.com`)
    /// * `model` - 임베딩 모델 이름
    /// * `dimension` - 임베딩 차원
    pub fn new(api_key: String, base_url: String, model: String, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Invalid embedding dimension: 0");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimension,
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// 설정에서 생성
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            anyhow::anyhow!("OPENAI_API_KEY not set.\nSet: export OPENAI_API_KEY=your-api-key")
        })?;

        let embedder = Self::new(
            api_key,
            config.base_url.clone(),
            config.embedding_model.clone(),
            config.embedding_dim,
        )?;

        tracing::info!(
            "Using OpenAI embedding {} (dimension: {})",
            embedder.model,
            embedder.dimension
        );
        Ok(embedder)
    }

    /// 재시도 정책 변경
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `text-embedding-3-*` 모델만 차원 축소 파라미터를 지원
    fn dimensions_param(&self) -> Option<usize> {
        let native = match self.model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => return None,
        };
        (self.dimension != native).then_some(self.dimension)
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions_param(),
        };
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = self
            .retry
            .send("OpenAI embeddings", || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
            })
            .await?;

        let response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        if response.data.len() != texts.len() {
            anyhow::bail!(
                "Embedding count mismatch: sent {}, received {}",
                texts.len(),
                response.data.len()
            );
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// OpenAI API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// OpenAI API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // OpenAI는 빈 문자열 입력을 거부함
        if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
            anyhow::bail!("Cannot embed empty text (input #{})", i);
        }

        let mut results = Vec::with_capacity(texts.len());
        let total_batches = texts.len().div_ceil(BATCH_SIZE);

        for (i, chunk) in texts.chunks(BATCH_SIZE).enumerate() {
            tracing::debug!("Embedding batch {}/{}", i + 1, total_batches);
            results.extend(self.embed_chunk(chunk).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
