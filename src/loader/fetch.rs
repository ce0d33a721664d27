//! 원본 데이터 가져오기 (파일 / HTTP API) 및 텍스트 디코딩
//!
//! 공공데이터 파일은 UTF-8(BOM 포함) 또는 CP949로 저장된 경우가 많아
//! UTF-8 디코딩 실패 시 CP949(EUC-KR)로 재시도합니다.

use std::path::Path;

use encoding_rs::{Encoding, EUC_KR, UTF_8};

use super::LoadError;

/// API 호출 시 차단 방지용 User-Agent
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// 가져온 원본 바이트
#[derive(Debug, Clone)]
pub struct RawData {
    pub bytes: Vec<u8>,
    /// Content-Type 헤더의 charset (API 응답만)
    pub charset: Option<String>,
}

/// 로컬 파일 읽기
pub(crate) async fn fetch_file(path: &Path) -> Result<RawData, LoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(RawData {
        bytes,
        charset: None,
    })
}

/// HTTP GET으로 API 응답 가져오기
pub(crate) async fn fetch_api(client: &reqwest::Client, url: &str) -> Result<RawData, LoadError> {
    let http_error = |source| LoadError::Http {
        url: url.to_string(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(http_error)?
        .error_for_status()
        .map_err(http_error)?;

    let charset = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(charset_from_content_type);

    let bytes = response.bytes().await.map_err(http_error)?;
    tracing::debug!("Fetched {} bytes from {}", bytes.len(), url);

    Ok(RawData {
        bytes: bytes.to_vec(),
        charset,
    })
}

/// 바이트를 텍스트로 디코딩
///
/// 순서: charset 힌트 > UTF-8 (BOM 제거) > CP949
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<String, LoadError> {
    if let Some(encoding) = charset.and_then(|label| Encoding::for_label(label.trim().as_bytes())) {
        if encoding != UTF_8 {
            let (text, _, had_errors) = encoding.decode(bytes);
            if !had_errors {
                return Ok(text.into_owned());
            }
            tracing::warn!(
                "Response is not valid {}, falling back to UTF-8/CP949",
                encoding.name()
            );
        }
    }

    let without_bom = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(without_bom) {
        return Ok(text.to_string());
    }

    tracing::debug!("UTF-8 decoding failed, retrying with CP949");
    let (text, had_errors) = EUC_KR.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(LoadError::Decode);
    }

    Ok(text.into_owned())
}

/// `text/xml; charset=EUC-KR` → `EUC-KR`
fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("시설명,주소".as_bytes());
        assert_eq!(decode_text(&bytes, None).unwrap(), "시설명,주소");
    }

    #[test]
    fn test_decode_cp949_fallback() {
        let (bytes, _, _) = EUC_KR.encode("부산 해운대구");
        assert!(std::str::from_utf8(&bytes).is_err());
        assert_eq!(decode_text(&bytes, None).unwrap(), "부산 해운대구");
    }

    #[test]
    fn test_decode_with_charset_hint() {
        let (bytes, _, _) = EUC_KR.encode("<name>캠핑</name>");
        assert_eq!(
            decode_text(&bytes, Some("euc-kr")).unwrap(),
            "<name>캠핑</name>"
        );
        // 잘못된 힌트는 무시
        assert_eq!(decode_text("abc".as_bytes(), Some("x-unknown")).unwrap(), "abc");
    }

    #[test]
    fn test_decode_garbage_fails() {
        let bytes = [0xFF, 0xFF, 0xFF];
        assert!(matches!(decode_text(&bytes, None), Err(LoadError::Decode)));
    }

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(
            charset_from_content_type("text/xml; charset=EUC-KR"),
            Some("EUC-KR".to_string())
        );
        assert_eq!(
            charset_from_content_type("application/json;Charset=\"utf-8\""),
            Some("utf-8".to_string())
        );
        assert_eq!(charset_from_content_type("application/json"), None);
    }
}
