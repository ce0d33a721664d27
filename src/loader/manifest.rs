//! 소스 매니페스트 - 여러 소스를 한 번에 로드
//!
//! ```json
//! { "sources": [
//!   { "source": "data/sample_data.csv", "format": "csv" },
//!   { "source": "http://apis.data.go.kr/...", "type": "api", "format": "xml",
//!     "root_key": "response.body.items.item",
//!     "metadata": { "category": "숙박/캠핑" } }
//! ] }
//! ```
//!
//! 파일 소스의 상대 경로는 매니페스트 파일이 있는 디렉토리 기준입니다.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{Document, LoadRequest, SourceType, UniversalDataLoader};

/// 매니페스트 파일 구조
#[derive(Debug, Clone, Deserialize)]
pub struct SourceManifest {
    pub sources: Vec<LoadRequest>,
}

impl SourceManifest {
    /// JSON 매니페스트 파일 읽기 (상대 파일 경로는 매니페스트 기준으로 변환)
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        let mut manifest =
            Self::from_json(&text).with_context(|| format!("Invalid manifest: {:?}", path))?;

        if let Some(base) = path.parent() {
            manifest.resolve_relative_to(base);
        }
        Ok(manifest)
    }

    /// 상대 경로 파일 소스를 `base` 기준 경로로 변환
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for request in &mut self.sources {
            if request.resolved_source_type() != SourceType::File {
                continue;
            }
            let source = Path::new(&request.source);
            if source.is_relative() {
                request.source = base.join(source).to_string_lossy().into_owned();
            }
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(text).context("Failed to parse manifest JSON")?;
        if manifest.sources.is_empty() {
            anyhow::bail!("Manifest has no sources");
        }
        Ok(manifest)
    }
}

/// 실패한 소스
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// 여러 소스 로드 결과
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub succeeded: usize,
    pub failed: Vec<SourceFailure>,
}

impl UniversalDataLoader {
    /// 여러 소스를 순서대로 로드
    ///
    /// 실패한 소스는 기록 후 건너뜁니다 (전체 작업을 중단하지 않음).
    pub async fn load_all(&self, requests: &[LoadRequest]) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();

        for request in requests {
            match self.load(request).await {
                Ok(docs) => {
                    outcome.documents.extend(docs);
                    outcome.succeeded += 1;
                }
                Err(e) => {
                    let error = error_chain(&e);
                    tracing::warn!("Failed to load {}: {}", request.source, error);
                    outcome.failed.push(SourceFailure {
                        source: request.source.clone(),
                        error,
                    });
                }
            }
        }

        outcome
    }
}

/// 에러와 원인을 한 줄로 연결
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
