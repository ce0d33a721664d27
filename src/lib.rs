//! publicdata-rag - 공공데이터 RAG 파이프라인
//!
//! CSV/JSON/XML 공공데이터(파일 또는 API)를 Document로 변환하고
//! OpenAI 임베딩 + Pinecone 벡터 인덱스 + OpenAI 채팅 모델로
//! 질의응답을 수행합니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod index;
pub mod loader;
pub mod rag;
pub mod retry;
pub mod splitter;

// Re-exports
pub use chat::{ChatModel, OpenAiChat};
pub use config::{Config, OpenAiConfig, PineconeConfig};
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use index::{IndexStats, PineconeIndex, ScoredRecord, VectorIndex, VectorRecord};
pub use loader::{
    DataFormat, Document, LoadError, LoadOutcome, LoadRequest, SourceManifest, SourceType,
    UniversalDataLoader,
};
pub use rag::{IngestReport, Ingestor, PromptTemplate, RagAnswer, RagChain, RetrievedDocument};
pub use retry::RetryPolicy;
pub use splitter::{
    default_splitter, splitter_with, RecursiveCharacterSplitter, SplitterConfig, TextSplitter,
};
