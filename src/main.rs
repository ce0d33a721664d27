//! publicdata-rag CLI 진입점

use anyhow::Result;
use clap::Parser;

use publicdata_rag::config::{load_dotenv, report_dotenv};

fn main() -> Result<()> {
    // .env 먼저 로드 (RUST_LOG 포함)
    let dotenv = load_dotenv();

    // 로깅 초기화
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
    report_dotenv(&dotenv);

    // CLI 실행
    let cli = publicdata_rag::cli::Cli::parse();
    let config = publicdata_rag::Config::from_env();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(publicdata_rag::cli::run(cli, config))
}
