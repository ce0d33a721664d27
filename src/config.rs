//! 설정 - 환경변수 (+ `.env`) 기반
//!
//! | 변수 | 기본값 |
//! |------|--------|
//! | `OPENAI_API_KEY` | - |
//! | `OPENAI_BASE_URL` | `https://api.openai.com` |
//! | `RAG_EMBEDDING_MODEL` | `text-embedding-3-small` |
//! | `RAG_EMBEDDING_DIM` | `1536` |
//! | `RAG_CHAT_MODEL` | `gpt-4o-mini` |
//! | `RAG_TOP_K` | `2` |
//! | `RAG_CHUNK_SIZE` / `RAG_CHUNK_OVERLAP` | `500` / `50` |
//! | `PINECONE_API_KEY` | - |
//! | `PINECONE_INDEX_NAME` | - |
//! | `PINECONE_INDEX_HOST` | 컨트롤 플레인에서 조회 |
//! | `PINECONE_CONTROL_URL` | `https://api.pinecone.io` |
//! | `PINECONE_NAMESPACE` | 기본 네임스페이스 |

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::splitter::SplitterConfig;

/// OpenAI 설정
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub chat_model: String,
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dim: 1536,
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
        }
    }
}

/// Pinecone 설정
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: Option<String>,
    pub index_name: Option<String>,
    /// 데이터 플레인 호스트 (없으면 컨트롤 플레인에서 조회)
    pub index_host: Option<String>,
    pub control_url: String,
    pub namespace: Option<String>,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            index_name: None,
            index_host: None,
            control_url: "https://api.pinecone.io".to_string(),
            namespace: None,
        }
    }
}

/// 전체 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub pinecone: PineconeConfig,
    /// 검색할 문서 수
    pub top_k: usize,
    pub splitter: SplitterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            pinecone: PineconeConfig::default(),
            top_k: 2,
            splitter: SplitterConfig::default(),
        }
    }
}

impl Config {
    /// `.env` 로드 후 환경변수에서 설정 구성
    pub fn load() -> Self {
        report_dotenv(&load_dotenv());
        Self::from_env()
    }

    /// 환경변수에서 설정 구성 (파싱 불가한 숫자는 기본값 유지)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 구성
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        // OpenAI
        config.openai.api_key = get("OPENAI_API_KEY");
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.openai.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("RAG_EMBEDDING_MODEL") {
            config.openai.embedding_model = model;
        }
        if let Some(dim) = get("RAG_EMBEDDING_DIM").and_then(|v| v.parse().ok()) {
            config.openai.embedding_dim = dim;
        }
        if let Some(model) = get("RAG_CHAT_MODEL") {
            config.openai.chat_model = model;
        }

        // Pinecone
        config.pinecone.api_key = get("PINECONE_API_KEY");
        config.pinecone.index_name = get("PINECONE_INDEX_NAME");
        config.pinecone.index_host = get("PINECONE_INDEX_HOST");
        if let Some(url) = get("PINECONE_CONTROL_URL") {
            config.pinecone.control_url = url.trim_end_matches('/').to_string();
        }
        config.pinecone.namespace = get("PINECONE_NAMESPACE");

        // RAG
        if let Some(k) = get("RAG_TOP_K").and_then(|v| v.parse().ok()) {
            config.top_k = k;
        }
        if let Some(size) = get("RAG_CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            config.splitter.chunk_size = size;
        }
        if let Some(overlap) = get("RAG_CHUNK_OVERLAP").and_then(|v| v.parse().ok()) {
            config.splitter.chunk_overlap = overlap;
        }

        config
    }

    /// OpenAI API 키 (없으면 설정 방법 안내 에러)
    pub fn require_openai_key(&self) -> Result<&str> {
        match self.openai.api_key.as_deref() {
            Some(key) => Ok(key),
            None => anyhow::bail!(
                "OpenAI API key not found.\n\
                 Set: export OPENAI_API_KEY=your-api-key (or add it to .env)"
            ),
        }
    }

    /// Pinecone API 키와 인덱스 이름
    pub fn require_pinecone(&self) -> Result<(&str, &str)> {
        let key = self.pinecone.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Pinecone API key not found.\n\
                 Set: export PINECONE_API_KEY=your-api-key (or add it to .env)"
            )
        })?;
        let index = self.pinecone.index_name.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Pinecone index name not set.\n\
                 Set: export PINECONE_INDEX_NAME=your-index"
            )
        })?;
        Ok((key, index))
    }

    pub fn has_openai_key(&self) -> bool {
        self.openai.api_key.is_some()
    }

    pub fn has_pinecone(&self) -> bool {
        self.pinecone.api_key.is_some() && self.pinecone.index_name.is_some()
    }
}

// ============================================================================
// .env
// ============================================================================

/// 현재 디렉토리(또는 상위)의 `.env` 로드
///
/// 이미 설정된 환경변수는 덮어쓰지 않습니다. 파일이 없으면 `Ok(None)`.
/// 로깅 초기화 전에 호출할 수 있도록 결과만 돌려주고 로그는 남기지 않습니다.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    found(dotenvy::dotenv())
}

/// 지정한 `.env` 파일 로드
pub fn load_dotenv_from(path: &Path) -> Result<Option<PathBuf>, dotenvy::Error> {
    found(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn found(result: dotenvy::Result<PathBuf>) -> Result<Option<PathBuf>, dotenvy::Error> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// `.env` 로드 결과 로깅
pub fn report_dotenv(result: &Result<Option<PathBuf>, dotenvy::Error>) {
    match result {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {:?}", path),
        Ok(None) => {}
        Err(e) => tracing::warn!("Failed to load .env: {}", e),
    }
}
