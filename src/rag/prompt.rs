//! 프롬프트 템플릿 - `{context}`, `{question}` 치환

use std::path::Path;

use anyhow::{Context, Result};

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";

/// 기본 시스템 프롬프트 (공공데이터 안내원)
pub const DEFAULT_TEMPLATE: &str = "당신은 공공데이터 기반의 친절한 안내원입니다.
아래의 [Context]를 바탕으로 사용자의 질문에 답변하세요.
정보가 없다면 \"제공된 데이터에는 해당 정보가 없습니다\"라고 정중히 말하세요.

[Context]
{context}

질문: {question}
";

/// 프롬프트 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// 템플릿 생성 (두 자리표시자가 모두 있어야 함)
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();

        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                anyhow::bail!("Prompt template must contain {}", placeholder);
            }
        }

        Ok(Self { template })
    }

    /// 파일에서 템플릿 읽기
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt template: {:?}", path))?;
        Self::new(text).with_context(|| format!("Invalid prompt template: {:?}", path))
    }

    /// 자리표시자 치환
    ///
    /// 치환된 context 안의 `{question}` 문자열은 다시 치환하지 않습니다.
    pub fn render(&self, context: &str, question: &str) -> String {
        self.template
            .split(CONTEXT_PLACEHOLDER)
            .map(|part| part.replace(QUESTION_PLACEHOLDER, question))
            .collect::<Vec<_>>()
            .join(context)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_renders() {
        let prompt = PromptTemplate::default().render("시설명: 송정 캠핑장", "부산 캠핑장 추천해줘");
        assert!(prompt.starts_with("당신은 공공데이터 기반의 친절한 안내원입니다."));
        assert!(prompt.contains("[Context]\n시설명: 송정 캠핑장\n"));
        assert!(prompt.ends_with("질문: 부산 캠핑장 추천해줘\n"));
    }

    #[test]
    fn test_default_template_is_valid() {
        assert!(PromptTemplate::new(DEFAULT_TEMPLATE).is_ok());
    }

    #[test]
    fn test_missing_placeholder() {
        let err = PromptTemplate::new("Context: {context}").unwrap_err();
        assert!(err.to_string().contains("{question}"));
    }

    #[test]
    fn test_context_is_not_re_substituted() {
        let template = PromptTemplate::new("{context} | {question}").unwrap();
        assert_eq!(template.render("a {question} b", "q"), "a {question} b | q");
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "문맥만 사용: {context}\n질문: {question}").unwrap();

        let template = PromptTemplate::from_path(&path).unwrap();
        assert_eq!(template.render("C", "Q"), "문맥만 사용: C\n질문: Q");
    }
}
