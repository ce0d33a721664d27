//! RAG 파이프라인 - 업로드(Ingestor)와 질의응답(RagChain)
//!
//! - Ingestor: Document → 분할 → 임베딩 → 벡터 인덱스 업서트
//! - RagChain: 질문 임베딩 → top-k 검색 → 프롬프트 → 채팅 모델

mod prompt;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;

use crate::chat::ChatModel;
use crate::embedding::EmbeddingProvider;
use crate::index::{document_to_record, VectorIndex};
use crate::loader::Document;
use crate::splitter::TextSplitter;

pub use prompt::{PromptTemplate, DEFAULT_TEMPLATE};

/// 한 번에 임베딩/업서트할 문서 수
const INGEST_BATCH_SIZE: usize = 100;

/// 기본 검색 문서 수
pub const DEFAULT_TOP_K: usize = 2;

// ============================================================================
// Ingestor
// ============================================================================

/// 업로드 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// 입력 문서 수
    pub documents: usize,
    /// 분할 후 청크 수
    pub chunks: usize,
    /// 인덱스에 업서트된 벡터 수
    pub upserted: usize,
}

/// 문서 업로드기
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    splitter: Box<dyn TextSplitter>,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        splitter: Box<dyn TextSplitter>,
    ) -> Self {
        Self {
            embedder,
            index,
            splitter,
        }
    }

    /// 문서 업로드 (자동 분할 + 임베딩)
    pub async fn ingest(&self, documents: Vec<Document>) -> Result<IngestReport> {
        let mut report = IngestReport {
            documents: documents.len(),
            ..Default::default()
        };

        let chunks = self.splitter.split_documents(documents);
        report.chunks = chunks.len();
        if chunks.is_empty() {
            tracing::warn!("No documents to ingest");
            return Ok(report);
        }

        let ingested_at = Utc::now().to_rfc3339();
        // 소스별 문서 순번 (벡터 ID 생성용)
        let mut positions: HashMap<String, usize> = HashMap::new();
        let total_batches = chunks.len().div_ceil(INGEST_BATCH_SIZE);

        for (batch_no, batch) in chunks.chunks(INGEST_BATCH_SIZE).enumerate() {
            tracing::info!(
                "Embedding batch {}/{} ({} chunks) with {}",
                batch_no + 1,
                total_batches,
                batch.len(),
                self.embedder.name()
            );

            let texts: Vec<String> = batch.iter().map(|d| d.page_content.clone()).collect();
            let embeddings = self
                .embedder
                .embed_batch(&texts)
                .await
                .context("Failed to embed documents")?;

            if embeddings.len() != batch.len() {
                anyhow::bail!(
                    "Embedding count mismatch: expected {}, got {}",
                    batch.len(),
                    embeddings.len()
                );
            }

            let records: Vec<_> = batch
                .iter()
                .zip(embeddings)
                .map(|(doc, values)| {
                    let source = doc.source().unwrap_or_default().to_string();
                    let position = positions.entry(source).or_insert(0);
                    let mut record = document_to_record(doc, *position, values);
                    *position += 1;
                    record
                        .metadata
                        .insert("ingested_at".to_string(), Value::String(ingested_at.clone()));
                    record
                })
                .collect();

            report.upserted += self
                .index
                .upsert(&records)
                .await
                .context("Failed to upsert vectors")?;
        }

        tracing::info!(
            "Ingested {} documents ({} chunks, {} vectors)",
            report.documents,
            report.chunks,
            report.upserted
        );
        Ok(report)
    }
}

// ============================================================================
// RagChain
// ============================================================================

/// 검색된 문서
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub document: Document,
    pub score: f32,
}

/// 질의응답 결과
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<RetrievedDocument>,
}

/// 검색 → 프롬프트 → 채팅 모델 체인
pub struct RagChain {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    chat: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
    top_k: usize,
}

impl RagChain {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            embedder,
            index,
            chat,
            prompt: PromptTemplate::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// 질문과 가장 유사한 문서 top-k 검색
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedDocument>> {
        let query = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;

        let matches = self
            .index
            .query(&query, self.top_k)
            .await
            .context("Failed to query vector index")?;

        tracing::debug!("Retrieved {} documents", matches.len());

        Ok(matches
            .iter()
            .map(|m| RetrievedDocument {
                document: m.to_document(),
                score: m.score,
            })
            .collect())
    }

    /// 질문에 대한 답변 생성
    pub async fn ask(&self, question: &str) -> Result<RagAnswer> {
        let question = question.trim();
        if question.is_empty() {
            anyhow::bail!("Question is empty");
        }

        let sources = self.retrieve(question).await?;
        let context = format_context(&sources);
        let prompt = self.prompt.render(&context, question);

        tracing::info!(
            "Asking {} with {} context documents",
            self.chat.name(),
            sources.len()
        );
        let answer = self
            .chat
            .complete(&prompt)
            .await
            .context("Failed to generate answer")?;

        Ok(RagAnswer { answer, sources })
    }
}

/// 검색 문서 본문을 빈 줄로 연결
pub fn format_context(sources: &[RetrievedDocument]) -> String {
    sources
        .iter()
        .map(|s| s.document.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// Tests
// ============================================================================
