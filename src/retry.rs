//! 호스팅 API 호출 재시도
//!
//! 429 (Rate Limit), 5xx, 전송 실패는 지수 백오프로 재시도하고
//! 그 외 에러는 즉시 실패합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// 재시도 없이 한 번만 호출
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// n번째 시도(0부터) 실패 후 대기 시간
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// 요청 전송 후 성공 응답 본문 반환
    ///
    /// `build`는 시도마다 새 요청을 만듭니다.
    pub async fn send<F>(&self, label: &str, build: F) -> Result<String>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=self.max_retries {
            let response = match build().send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send {} request: {}", label, e));
                    if attempt < self.max_retries {
                        let backoff = self.backoff(attempt);
                        tracing::warn!(
                            "{} request failed, retrying in {:?} (attempt {}/{})",
                            label,
                            backoff,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return Ok(body);
            }

            let message = api_error_message(&body);

            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(anyhow::anyhow!("{} API error ({}): {}", label, status, message));

                if attempt < self.max_retries {
                    let backoff = self.backoff(attempt);
                    tracing::warn!(
                        "{} API returned {}, backing off {:?} (attempt {}/{})",
                        label,
                        status,
                        backoff,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                anyhow::bail!("{} API error ({}): {}", label, status, message);
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("{} request failed after {} retries", label, self.max_retries)
        }))
    }
}

/// OpenAI / Pinecone 에러 응답
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiError {
    /// `{"error": {"message": "..."}}`
    Nested { error: ApiErrorDetail },
    /// `{"message": "..."}`
    Flat { message: String },
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// 에러 응답 본문에서 메시지 추출
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError::Nested { error }) => error.message,
        Ok(ApiError::Flat { message }) => message,
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.chars().count() > 300 {
                format!("{}...", trimmed.chars().take(300).collect::<String>())
            } else {
                trimmed.to_string()
            }
        }
    }
}
