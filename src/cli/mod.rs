//! CLI 모듈
//!
//! publicdata-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::chat::OpenAiChat;
use crate::config::Config;
use crate::embedding::OpenAiEmbedding;
use crate::index::{PineconeIndex, VectorIndex};
use crate::loader::{DataFormat, Document, LoadRequest, SourceManifest, SourceType, UniversalDataLoader};
use crate::rag::{Ingestor, PromptTemplate, RagChain};
use crate::splitter::splitter_with;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "publicdata-rag")]
#[command(version, about = "공공데이터 RAG 파이프라인", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 데이터를 로드하여 Document 미리보기 (API 키 불필요)
    Load {
        #[command(flatten)]
        source: SourceArgs,

        /// 출력할 문서 수
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// 데이터를 로드하여 벡터 인덱스에 업로드
    Ingest {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// 질문에 답변 (검색 + 생성)
    Ask {
        /// 질문
        question: String,

        /// 검색할 문서 수 (기본: RAG_TOP_K 또는 2)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 참고한 문서 출력
        #[arg(long)]
        show_sources: bool,

        /// 사용자 정의 프롬프트 템플릿 파일 ({context}, {question} 포함)
        #[arg(long)]
        prompt_file: Option<PathBuf>,
    },

    /// 설정 및 인덱스 상태 확인
    Status,

    /// 네임스페이스의 모든 벡터 삭제
    Reset {
        /// 삭제 확인
        #[arg(long)]
        yes: bool,
    },
}

/// 로드 대상 지정 옵션
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// 파일 경로 또는 API URL
    #[arg(short, long)]
    pub source: Option<String>,

    /// 출처 종류
    #[arg(short = 't', long = "type", value_enum, default_value = "auto")]
    pub source_type: SourceTypeArg,

    /// 데이터 형식 (json, xml, csv, text)
    #[arg(short, long)]
    pub format: Option<DataFormat>,

    /// 레코드 목록 키 경로 (예: response.body.items.item)
    #[arg(short, long)]
    pub root_key: Option<String>,

    /// 메타데이터로 복사할 필드 (반복 가능)
    #[arg(long = "meta-field")]
    pub meta_fields: Vec<String>,

    /// 비어 있으면 레코드를 건너뛸 필드 (반복 가능)
    #[arg(long = "require-field")]
    pub require_fields: Vec<String>,

    /// 모든 문서에 붙일 고정 메타데이터 KEY=VALUE (반복 가능)
    #[arg(long = "tag", value_parser = parse_key_value)]
    pub tags: Vec<(String, String)>,

    /// 여러 소스를 정의한 JSON 매니페스트
    #[arg(short, long, conflicts_with = "source")]
    pub manifest: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTypeArg {
    /// URL이면 api, 아니면 file
    Auto,
    File,
    Api,
}

impl SourceTypeArg {
    fn resolve(self) -> Option<SourceType> {
        match self {
            Self::Auto => None,
            Self::File => Some(SourceType::File),
            Self::Api => Some(SourceType::Api),
        }
    }
}

impl SourceArgs {
    /// 옵션 → 로드 요청 목록
    pub fn requests(&self) -> Result<Vec<LoadRequest>> {
        if let Some(ref manifest) = self.manifest {
            return Ok(SourceManifest::from_path(manifest)?.sources);
        }

        let Some(ref source) = self.source else {
            bail!("--source 또는 --manifest 중 하나를 지정하세요.");
        };

        let mut request = LoadRequest::new(source.clone())
            .with_metadata_fields(self.meta_fields.clone())
            .with_required_fields(self.require_fields.clone());
        request.source_type = self.source_type.resolve();
        request.format = self.format;
        request.root_key = self.root_key.clone();
        for (key, value) in &self.tags {
            request = request.with_metadata(key.clone(), value.clone());
        }

        Ok(vec![request])
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Load { source, limit } => cmd_load(&source, limit).await,
        Commands::Ingest { source } => cmd_ingest(&config, &source).await,
        Commands::Ask {
            question,
            top_k,
            show_sources,
            prompt_file,
        } => cmd_ask(&config, &question, top_k, show_sources, prompt_file).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Reset { yes } => cmd_reset(&config, yes).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 소스 로드 (공통)
///
/// 단일 소스는 실패 시 에러, 매니페스트는 실패한 소스만 건너뜁니다.
async fn load_documents(args: &SourceArgs) -> Result<Vec<Document>> {
    let requests = args.requests()?;
    let loader = UniversalDataLoader::new().context("로더 생성 실패")?;

    if let [request] = requests.as_slice() {
        println!("[*] 로드 중: {}", request.source);
        return loader
            .load(request)
            .await
            .with_context(|| format!("로드 실패: {}", request.source));
    }

    println!("[*] {} 개 소스 로드 중...", requests.len());
    let outcome = loader.load_all(&requests).await;

    for failure in &outcome.failed {
        println!("[!] 로드 실패: {} ({})", failure.source, failure.error);
    }
    if outcome.succeeded == 0 {
        bail!("모든 소스 로드에 실패했습니다.");
    }
    println!(
        "[OK] {} / {} 개 소스 로드 완료",
        outcome.succeeded,
        requests.len()
    );

    Ok(outcome.documents)
}

/// 로드 미리보기 명령어 (load)
async fn cmd_load(args: &SourceArgs, limit: usize) -> Result<()> {
    let documents = load_documents(args).await?;

    if documents.is_empty() {
        println!("[!] 로드된 문서가 없습니다.");
        return Ok(());
    }

    let total_size: usize = documents.iter().map(|d| d.page_content.len()).sum();
    println!(
        "[OK] 로드된 문서: {} 건 ({})\n",
        documents.len(),
        format_bytes(total_size)
    );

    for (i, doc) in documents.iter().take(limit).enumerate() {
        println!("{}. [{}]", i + 1, doc.source().unwrap_or("-"));
        println!("   내용: {}", truncate_text(&doc.page_content, 200));

        let extra: Vec<String> = doc
            .metadata
            .iter()
            .filter(|(key, _)| key.as_str() != "source" && key.as_str() != "format")
            .map(|(key, value)| format!("{}={}", key, crate::loader::render_value(value)))
            .collect();
        if !extra.is_empty() {
            println!("   메타데이터: {}", extra.join(", "));
        }
        println!();
    }

    if documents.len() > limit {
        println!("... 외 {} 건", documents.len() - limit);
    }

    Ok(())
}

/// 업로드 명령어 (ingest)
///
/// 로드 → 분할 → 임베딩 → Pinecone 업서트
async fn cmd_ingest(config: &Config, args: &SourceArgs) -> Result<()> {
    // 키 확인 (로드 전)
    config.require_openai_key()?;
    config.require_pinecone()?;
    config.splitter.validate()?;

    let documents = load_documents(args).await?;
    if documents.is_empty() {
        println!("[!] 업로드할 문서가 없습니다.");
        return Ok(());
    }
    println!("[OK] 로드된 문서: {} 건", documents.len());

    let embedder = OpenAiEmbedding::from_config(&config.openai)?;
    let index = PineconeIndex::connect(&config.pinecone)
        .await
        .context("Pinecone 연결 실패")?;

    println!("[*] 임베딩 생성 및 업로드 중...");
    let ingestor = Ingestor::new(
        Arc::new(embedder),
        Arc::new(index),
        splitter_with(config.splitter),
    );
    let report = ingestor.ingest(documents).await?;

    println!();
    println!(
        "[OK] 업로드 완료: 문서 {} 건, 청크 {} 개, 벡터 {} 개",
        report.documents, report.chunks, report.upserted
    );

    Ok(())
}

/// 질의응답 명령어 (ask)
async fn cmd_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    show_sources: bool,
    prompt_file: Option<PathBuf>,
) -> Result<()> {
    config.require_openai_key()?;
    config.require_pinecone()?;

    let top_k = top_k.unwrap_or(config.top_k);
    if top_k == 0 {
        bail!("--top-k는 1 이상이어야 합니다.");
    }

    let prompt = match prompt_file {
        Some(ref path) => PromptTemplate::from_path(path)?,
        None => PromptTemplate::default(),
    };

    let embedder = OpenAiEmbedding::from_config(&config.openai)?;
    let chat = OpenAiChat::from_config(&config.openai)?;
    let index = PineconeIndex::connect(&config.pinecone)
        .await
        .context("Pinecone 연결 실패")?;

    let chain = RagChain::new(Arc::new(embedder), Arc::new(index), Arc::new(chat))
        .with_prompt(prompt)
        .with_top_k(top_k);

    println!("[*] 질문: {}", question);
    let answer = chain.ask(question).await?;

    println!();
    println!("[답변]");
    println!("{}", answer.answer);

    if show_sources {
        println!();
        if answer.sources.is_empty() {
            println!("[!] 검색된 문서가 없습니다.");
        }
        for (i, source) in answer.sources.iter().enumerate() {
            println!(
                "{}. [{}] (score: {:.4})",
                i + 1,
                source.document.source().unwrap_or("-"),
                source.score
            );
            println!("   {}", truncate_text(&source.document.page_content, 200));
        }
    }

    Ok(())
}

/// 상태 확인 명령어 (status)
async fn cmd_status(config: &Config) -> Result<()> {
    println!("publicdata-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if config.has_openai_key() {
        println!("[OK] OpenAI API 키: 설정됨");
    } else {
        println!("[!] OpenAI API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }
    println!(
        "    임베딩: {} ({}차원) / 채팅: {}",
        config.openai.embedding_model, config.openai.embedding_dim, config.openai.chat_model
    );

    if config.has_pinecone() {
        println!(
            "[OK] Pinecone 인덱스: {}",
            config.pinecone.index_name.as_deref().unwrap_or_default()
        );
    } else {
        println!("[!] Pinecone: 미설정");
        println!("    설정: export PINECONE_API_KEY=your-key PINECONE_INDEX_NAME=your-index");
    }
    println!(
        "    네임스페이스: {}",
        config.pinecone.namespace.as_deref().unwrap_or("(default)")
    );
    println!(
        "    top_k: {} / 청크: {} (overlap {})",
        config.top_k, config.splitter.chunk_size, config.splitter.chunk_overlap
    );

    // 인덱스 통계
    if config.has_pinecone() {
        match PineconeIndex::connect(&config.pinecone).await {
            Ok(index) => match index.stats().await {
                Ok(stats) => {
                    println!("[OK] 저장된 벡터: {} 개", stats.total_vector_count);
                    if let Some(count) = stats.namespace_vector_count {
                        println!("    네임스페이스 벡터: {} 개", count);
                    }
                    if let Some(dimension) = stats.dimension {
                        println!("    차원: {}", dimension);
                        if dimension != config.openai.embedding_dim {
                            println!(
                                "[!] 인덱스 차원({})과 임베딩 차원({})이 다릅니다.",
                                dimension, config.openai.embedding_dim
                            );
                        }
                    }
                }
                Err(e) => {
                    println!("[!] 통계 조회 실패: {}", e);
                }
            },
            Err(e) => {
                println!("[!] Pinecone 연결 실패: {}", e);
            }
        }
    }

    Ok(())
}

/// 초기화 명령어 (reset)
async fn cmd_reset(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        bail!("모든 벡터가 삭제됩니다. 계속하려면 --yes 를 지정하세요.");
    }
    config.require_pinecone()?;

    let index = PineconeIndex::connect(&config.pinecone)
        .await
        .context("Pinecone 연결 실패")?;
    index.delete_all().await?;

    println!(
        "[OK] 네임스페이스 {} 의 벡터를 모두 삭제했습니다.",
        config.pinecone.namespace.as_deref().unwrap_or("(default)")
    );
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `KEY=VALUE` 파싱
fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
