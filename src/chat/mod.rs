//! 채팅 모델 - OpenAI Chat Completions
//!
//! 완성된 프롬프트 하나를 user 메시지로 보내고 답변 텍스트를 받습니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::retry::RetryPolicy;

/// 채팅 모델 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 프롬프트에 대한 답변 생성
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

/// OpenAI 채팅 모델
///
/// source: https://platform.openai.com/docs/api-reference/chat
#[derive(Debug)]
pub struct OpenAiChat {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiChat {
    pub fn new(api_key: String, base_url: String, model: String, temperature: f32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// 설정에서 생성
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            anyhow::anyhow!("OPENAI_API_KEY not set.\nSet: export OPENAI_API_KEY=your-api-key")
        })?;

        Self::new(
            api_key,
            config.base_url.clone(),
            config.chat_model.clone(),
            config.temperature,
        )
    }

    /// 재시도 정책 변경
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = self
            .retry
            .send("OpenAI chat", || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
            })
            .await?;

        let response: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse chat response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .context("Chat response has no content")
    }

    fn name(&self) -> &str {
        &self.model
    }
}
