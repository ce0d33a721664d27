//! Text Splitter Module
//!
//! 긴 문서를 임베딩하기 좋은 크기로 나눕니다.
//! 문단 → 줄 → 단어 → 문자 순서로 구분자를 낮춰 가며 재귀적으로 분할하고,
//! 인접 청크는 `chunk_overlap` 문자만큼 겹치게 합니다.

use std::collections::VecDeque;

use serde_json::Value;

use crate::loader::Document;

/// 기본 구분자 (문단, 줄, 단어, 문자)
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Splitter Configuration
// ============================================================================

/// 분할 설정 (길이는 모두 문자 수)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    /// 최대 청크 크기
    pub chunk_size: usize,
    /// 청크 간 중첩 크기
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl SplitterConfig {
    /// 설정 검증
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

// ============================================================================
// TextSplitter Trait
// ============================================================================

/// 텍스트 분할 전략 트레이트
pub trait TextSplitter: Send + Sync {
    /// 텍스트를 청크로 분할
    fn split_text(&self, text: &str) -> Vec<String>;

    /// 분할기 이름
    fn name(&self) -> &'static str;

    /// 문서 목록 분할
    ///
    /// 분할된 문서는 원본 메타데이터를 공유하고 `chunk` 인덱스를 추가로 가집니다.
    fn split_documents(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut result = Vec::with_capacity(documents.len());

        for doc in documents {
            let chunks = self.split_text(&doc.page_content);
            if chunks.len() <= 1 {
                result.push(doc);
                continue;
            }

            for (i, chunk) in chunks.into_iter().enumerate() {
                let mut metadata = doc.metadata.clone();
                metadata.insert("chunk".to_string(), Value::from(i));
                result.push(Document::new(chunk, metadata));
            }
        }

        result
    }
}

// ============================================================================
// RecursiveCharacterSplitter
// ============================================================================

/// 재귀 문자 분할기
pub struct RecursiveCharacterSplitter {
    config: SplitterConfig,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    /// 설정으로 생성
    pub fn new(config: SplitterConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 기본 설정으로 생성 (500자, 50자 중첩)
    pub fn with_defaults() -> Self {
        Self::new(SplitterConfig::default())
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // 텍스트에 존재하는 첫 구분자 선택 ("" 는 항상 선택 가능)
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for split in splits {
            if char_len(split) <= self.config.chunk_size {
                fitting.push(split);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_splits(&fitting, separator));
                fitting.clear();
            }

            if remaining.is_empty() {
                chunks.push(split.to_string());
            } else {
                chunks.extend(self.split_recursive(split, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_splits(&fitting, separator));
        }

        chunks
    }

    /// 작은 조각들을 chunk_size 이하로 합치고, 다음 청크는 overlap만큼 이어받음
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joined_len = |current: &VecDeque<&str>| {
                if current.is_empty() {
                    0
                } else {
                    separator_len
                }
            };

            if total + len + joined_len(&current) > self.config.chunk_size && !current.is_empty() {
                if let Some(chunk) = join_splits(&current, separator) {
                    chunks.push(chunk);
                }

                while total > self.config.chunk_overlap
                    || (total > 0 && total + len + joined_len(&current) > self.config.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    let sep = if current.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(char_len(first) + sep);
                }
            }

            current.push_back(split);
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(chunk) = join_splits(&current, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl TextSplitter for RecursiveCharacterSplitter {
    fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        if char_len(text) <= self.config.chunk_size {
            return vec![text.to_string()];
        }

        self.split_recursive(text, &self.separators)
    }

    fn name(&self) -> &'static str {
        "RecursiveCharacterSplitter"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_splits(splits: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = splits
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 분할기 생성
pub fn default_splitter() -> Box<dyn TextSplitter> {
    Box::new(RecursiveCharacterSplitter::with_defaults())
}

/// 설정 지정 분할기 생성
pub fn splitter_with(config: SplitterConfig) -> Box<dyn TextSplitter> {
    Box::new(RecursiveCharacterSplitter::new(config))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn small(chunk_size: usize, chunk_overlap: usize) -> RecursiveCharacterSplitter {
        RecursiveCharacterSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
        })
    }

    #[test]
    fn test_empty_text() {
        assert!(RecursiveCharacterSplitter::with_defaults()
            .split_text("  \n ")
            .is_empty());
    }

    #[test]
    fn test_short_text_unchanged() {
        let text = "시설명: 해운대 캠핑장\n주소: 부산";
        let chunks = RecursiveCharacterSplitter::with_defaults().split_text(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_splits_on_paragraphs_first() {
        let splitter = small(12, 0);
        let chunks = splitter.split_text("aaaa bbbb\n\ncccc dddd\n\neeee");
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd", "eeee"]);
    }

    #[test]
    fn test_word_overlap() {
        let splitter = small(10, 4);
        let chunks = splitter.split_text("a b c d e f g h i j");
        // 다음 청크는 이전 청크의 끝부분 (4자 이하)으로 시작
        assert_eq!(chunks, vec!["a b c d e", "d e f g h", "g h i j"]);
    }

    #[test]
    fn test_character_fallback_is_utf8_safe() {
        let splitter = small(3, 0);
        let chunks = splitter.split_text("가나다라마바사");
        assert_eq!(chunks, vec!["가나다", "라마바", "사"]);
    }

    #[test]
    fn test_config_validation() {
        assert!(SplitterConfig::default().validate().is_ok());
        assert!(SplitterConfig {
            chunk_size: 10,
            chunk_overlap: 10
        }
        .validate()
        .is_err());
        assert!(SplitterConfig {
            chunk_size: 0,
            chunk_overlap: 0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_split_documents_adds_chunk_index() {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), json!("a.txt"));

        let docs = vec![
            Document::new("short", metadata.clone()),
            Document::new("one two three four five six", metadata),
        ];

        let split = small(10, 0).split_documents(docs);
        assert_eq!(split[0].page_content, "short");
        assert!(!split[0].metadata.contains_key("chunk"));
        assert!(split.len() > 2);
        assert_eq!(split[1].metadata["chunk"], json!(0));
        assert_eq!(split[2].metadata["chunk"], json!(1));
        assert_eq!(split[2].metadata["source"], json!("a.txt"));
    }
}
