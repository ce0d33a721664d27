//! 범용 데이터 로더 - 공공데이터 파일/API를 Document로 정규화
//!
//! CSV / JSON / XML (또는 API 응답)을 가져와서 공통 레코드 목록으로 파싱하고,
//! 각 레코드를 `key: value` 텍스트와 메타데이터로 변환합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let loader = UniversalDataLoader::new()?;
//! let request = LoadRequest::new("http://apis.data.go.kr/...")
//!     .with_format(DataFormat::Xml)
//!     .with_root_key("response.body.items.item");
//! let docs = loader.load(&request).await?;
//! ```

mod document;
mod fetch;
mod manifest;
mod parse;
mod path;
mod xml;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

pub use document::{is_truthy, record_to_text, render_value, to_documents, Document, RecordOptions};
pub use fetch::{decode_text, RawData, BROWSER_USER_AGENT};
pub use manifest::{LoadOutcome, SourceFailure, SourceManifest};
pub use parse::{parse_csv, parse_json, parse_records, Record};
pub use path::find_items;
pub use xml::parse_xml;

// ============================================================================
// Errors
// ============================================================================

/// 로더 에러
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API request failed: {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("Failed to decode text as UTF-8 or CP949")]
    Decode,

    #[error("Failed to parse {format}: {message}")]
    Parse { format: DataFormat, message: String },
}

// ============================================================================
// Source Type / Data Format
// ============================================================================

/// 데이터 출처 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// 로컬 파일
    File,
    /// HTTP API 엔드포인트
    Api,
}

impl SourceType {
    /// 출처 문자열로 종류 추정 (http/https URL이면 API)
    pub fn detect(source: &str) -> Self {
        match url::Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => SourceType::Api,
            _ => SourceType::File,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::File => "file",
            SourceType::Api => "api",
        }
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(SourceType::File),
            "api" => Ok(SourceType::Api),
            other => Err(format!("unknown source type '{}' (expected file or api)", other)),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 데이터 직렬화 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Json,
    Xml,
    Csv,
    /// 일반 텍스트 (파일 전체가 하나의 문서)
    Text,
}

impl DataFormat {
    /// 확장자로 형식 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(DataFormat::Json),
            "xml" => Some(DataFormat::Xml),
            "csv" => Some(DataFormat::Csv),
            "txt" | "md" | "text" => Some(DataFormat::Text),
            _ => None,
        }
    }

    /// 출처 문자열(파일 경로 또는 URL 경로)의 확장자로 형식 결정
    pub fn from_source(source: &str) -> Option<Self> {
        let path = match url::Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url.path().to_string(),
            _ => source.to_string(),
        };

        Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::Xml => "xml",
            DataFormat::Csv => "csv",
            DataFormat::Text => "text",
        }
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DataFormat::Json),
            "xml" => Ok(DataFormat::Xml),
            "csv" => Ok(DataFormat::Csv),
            "text" | "txt" => Ok(DataFormat::Text),
            other => Err(format!(
                "unknown data format '{}' (expected json, xml, csv or text)",
                other
            )),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Load Request
// ============================================================================

/// 단일 소스 로드 요청
///
/// 매니페스트 파일의 `sources` 항목과 같은 구조입니다.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadRequest {
    /// 파일 경로 또는 API URL
    pub source: String,
    /// 출처 종류 (없으면 `source`로 추정)
    #[serde(rename = "type", default)]
    pub source_type: Option<SourceType>,
    /// 데이터 형식 (없으면 확장자로 추정, 기본 json)
    #[serde(default)]
    pub format: Option<DataFormat>,
    /// 레코드 목록이 위치한 키 경로 (예: `response.body.items.item`)
    #[serde(default)]
    pub root_key: Option<String>,
    /// 메타데이터로 복사할 레코드 키
    #[serde(default)]
    pub metadata_fields: Vec<String>,
    /// 값이 비어 있으면 레코드를 건너뛸 키
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// 이 소스의 모든 문서에 붙일 고정 메타데이터
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl LoadRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_type: None,
            format: None,
            root_key: None,
            metadata_fields: Vec::new(),
            required_fields: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_root_key(mut self, root_key: impl Into<String>) -> Self {
        self.root_key = Some(root_key.into());
        self
    }

    pub fn with_metadata_fields(mut self, fields: Vec<String>) -> Self {
        self.metadata_fields = fields;
        self
    }

    pub fn with_required_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = fields;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 실제 사용할 출처 종류
    pub fn resolved_source_type(&self) -> SourceType {
        self.source_type
            .unwrap_or_else(|| SourceType::detect(&self.source))
    }

    /// 실제 사용할 데이터 형식
    ///
    /// 우선순위: 명시값 > 확장자 > json
    pub fn resolved_format(&self) -> DataFormat {
        self.format
            .or_else(|| DataFormat::from_source(&self.source))
            .unwrap_or(DataFormat::Json)
    }

    fn record_options(&self) -> RecordOptions<'_> {
        RecordOptions {
            metadata_fields: &self.metadata_fields,
            required_fields: &self.required_fields,
            static_metadata: Some(&self.metadata),
        }
    }
}

// ============================================================================
// UniversalDataLoader
// ============================================================================

/// 범용 데이터 로더
///
/// fetch → decode → parse → key path 탐색 → Document 변환
pub struct UniversalDataLoader {
    client: reqwest::Client,
}

impl UniversalDataLoader {
    /// 새 로더 생성
    pub fn new() -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(LoadError::Client)?;

        Ok(Self { client })
    }

    /// 단일 소스 로드
    pub async fn load(&self, request: &LoadRequest) -> Result<Vec<Document>, LoadError> {
        let source_type = request.resolved_source_type();
        let format = request.resolved_format();

        let raw = match source_type {
            SourceType::Api => {
                tracing::info!("[API request] {}", request.source);
                fetch::fetch_api(&self.client, &request.source).await?
            }
            SourceType::File => {
                tracing::info!("[file load] {}", request.source);
                fetch::fetch_file(Path::new(&request.source)).await?
            }
        };

        let text = decode_text(&raw.bytes, raw.charset.as_deref())?;
        let items = parse_records(&text, format, request.root_key.as_deref())?;
        let documents = to_documents(items, &request.source, format, &request.record_options());

        tracing::info!("[{}] {} documents", request.source, documents.len());
        Ok(documents)
    }
}

// ============================================================================
// Tests
// ============================================================================
