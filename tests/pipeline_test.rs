//! 로드 → 업로드 → 질의응답 전체 흐름 테스트 (OpenAI/Pinecone 모의 서버)

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use publicdata_rag::{
    default_splitter, Config, DataFormat, Ingestor, LoadRequest, OpenAiChat, OpenAiEmbedding,
    PineconeIndex, RagChain, RetryPolicy, SourceManifest, UniversalDataLoader,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// 입력 개수만큼 임베딩을 돌려주는 응답기
struct EmbeddingResponder;

impl Respond for EmbeddingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let data: Vec<Value> = body["input"]
            .as_array()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, _)| json!({"object": "embedding", "index": i, "embedding": [0.1, 0.2, i as f32]}))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({"object": "list", "data": data}))
    }
}

/// 받은 벡터 수를 upsertedCount로 돌려주는 응답기
struct UpsertResponder;

impl Respond for UpsertResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let count = body["vectors"].as_array().map(Vec::len).unwrap_or(0);
        ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": count}))
    }
}

fn config_for(server: &MockServer) -> Config {
    let uri = server.uri();
    Config::from_lookup(|key| match key {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "OPENAI_BASE_URL" => Some(uri.clone()),
        "PINECONE_API_KEY" => Some("pc-test".to_string()),
        "PINECONE_INDEX_NAME" => Some("public-data".to_string()),
        "PINECONE_INDEX_HOST" => Some(uri.clone()),
        "PINECONE_NAMESPACE" => Some("camping".to_string()),
        _ => None,
    })
}

async fn received_json(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_csv_to_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(EmbeddingResponder)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(UpsertResponder)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {"id": "a", "score": 0.91, "metadata": {
                    "text": "시설명: 송정 캠핑장\n주소: 부산 해운대구",
                    "source": "camping.csv", "format": "csv", "시설명": "송정 캠핑장"
                }},
                {"id": "b", "score": 0.72, "metadata": {
                    "text": "시설명: 다대포 캠핑장\n주소: 부산 사하구",
                    "source": "camping.csv", "format": "csv"
                }}
            ],
            "namespace": "camping"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "송정 캠핑장을 추천합니다."}}]
        })))
        .mount(&server)
        .await;

    // 1. 로드 (시설명이 없는 행은 제외)
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    write!(
        file,
        "시설명,주소\n송정 캠핑장,부산 해운대구\n,이름 없음\n다대포 캠핑장,부산 사하구\n"
    )
    .unwrap();

    let request = LoadRequest::new(file.path().to_str().unwrap())
        .with_metadata_fields(vec!["시설명".to_string()])
        .with_required_fields(vec!["시설명".to_string()]);
    assert_eq!(request.resolved_format(), DataFormat::Csv);

    let documents = UniversalDataLoader::new().unwrap().load(&request).await.unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].page_content, "시설명: 송정 캠핑장\n주소: 부산 해운대구");

    // 2. 업로드
    let config = config_for(&server);
    let embedder = Arc::new(
        OpenAiEmbedding::from_config(&config.openai)
            .unwrap()
            .with_retry(RetryPolicy::none()),
    );
    let index = Arc::new(
        PineconeIndex::connect(&config.pinecone)
            .await
            .unwrap()
            .with_retry(RetryPolicy::none()),
    );

    let report = Ingestor::new(embedder.clone(), index.clone(), default_splitter())
        .ingest(documents)
        .await
        .unwrap();
    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.upserted, 2);

    let upserts = received_json(&server, "/vectors/upsert").await;
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0]["namespace"], json!("camping"));
    let vector = &upserts[0]["vectors"][0];
    assert_eq!(vector["metadata"]["text"], json!("시설명: 송정 캠핑장\n주소: 부산 해운대구"));
    assert_eq!(vector["metadata"]["시설명"], json!("송정 캠핑장"));
    assert_eq!(vector["id"].as_str().unwrap().len(), 64);

    // 3. 질의응답
    let chat = Arc::new(
        OpenAiChat::from_config(&config.openai)
            .unwrap()
            .with_retry(RetryPolicy::none()),
    );
    let chain = RagChain::new(embedder, index, chat).with_top_k(config.top_k);

    let answer = chain.ask("부산 캠핑장 추천해줘").await.unwrap();
    assert_eq!(answer.answer, "송정 캠핑장을 추천합니다.");
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.sources[0].document.metadata["시설명"], json!("송정 캠핑장"));

    let queries = received_json(&server, "/query").await;
    assert_eq!(queries[0]["topK"], json!(2));
    assert_eq!(queries[0]["includeMetadata"], json!(true));

    let chats = received_json(&server, "/v1/chat/completions").await;
    assert_eq!(chats[0]["model"], json!("gpt-4o-mini"));
    let prompt = chats[0]["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains(
        "[Context]\n시설명: 송정 캠핑장\n주소: 부산 해운대구\n\n시설명: 다대포 캠핑장\n주소: 부산 사하구\n"
    ));
    assert!(prompt.contains("질문: 부산 캠핑장 추천해줘"));
}

#[tokio::test]
async fn test_ingest_stops_on_embedding_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let embedder = Arc::new(OpenAiEmbedding::from_config(&config.openai).unwrap());
    let index = Arc::new(PineconeIndex::connect(&config.pinecone).await.unwrap());

    let documents = vec![publicdata_rag::Document::new("시설명: A", Default::default())];
    let err = Ingestor::new(embedder, index, default_splitter())
        .ingest(documents)
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Incorrect API key"));
    assert!(received_json(&server, "/vectors/upsert").await.is_empty());
}

#[tokio::test]
async fn test_demo_manifest_loads() {
    let manifest_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/sources.json");
    let manifest = SourceManifest::from_path(&manifest_path).unwrap();
    let outcome = UniversalDataLoader::new()
        .unwrap()
        .load_all(&manifest.sources)
        .await;

    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.succeeded, 2);
    // CSV 3건 (시설명 없는 행 제외) + JSON 2건
    assert_eq!(outcome.documents.len(), 5);

    assert_eq!(outcome.documents[0].metadata["category"], json!("숙박/캠핑"));
    assert!(outcome.documents[0]
        .source()
        .unwrap()
        .ends_with("sample_data.csv"));

    let json_doc = &outcome.documents[3];
    assert!(!json_doc.metadata.contains_key("category"));
    assert_eq!(json_doc.metadata["format"], json!("json"));
    assert_eq!(json_doc.metadata["facltNm"], json!("송정 오토캠핑장"));
    assert!(!json_doc.page_content.contains("tel"));
}
