//! XML → JSON 값 변환 (xmltodict 규칙)
//!
//! - 루트 요소가 최상위 키가 됩니다.
//! - 텍스트만 있는 요소는 문자열, 빈 요소는 null
//! - 속성은 `@name`, 속성/자식과 함께 있는 텍스트는 `#text`
//! - 같은 이름의 형제 요소가 반복되면 배열
//! - 텍스트 조각(CDATA 포함)은 그대로 이어 붙인 뒤 한 번만 trim
//! - 네임스페이스 접두사는 키에 그대로 유지 (`ns:tag`)

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use super::{DataFormat, LoadError};

/// 변환 중인 요소
struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            attributes: Map::new(),
            children: Map::new(),
            text: String::new(),
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, LoadError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut frame = Self::new(name);

        for attr in start.attributes() {
            let attr = attr.map_err(|e| xml_error(e.to_string()))?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr
                .unescape_value()
                .map_err(|e| xml_error(e.to_string()))?;
            frame
                .attributes
                .insert(key, Value::String(value.into_owned()));
        }

        Ok(frame)
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();

        if self.attributes.is_empty() && self.children.is_empty() {
            return if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            };
        }

        let mut map = self.attributes;
        map.extend(self.children);
        if !text.is_empty() {
            map.insert("#text".to_string(), Value::String(text.to_string()));
        }
        Value::Object(map)
    }
}

/// XML 문서를 JSON 값으로 변환
pub fn parse_xml(text: &str) -> Result<Value, LoadError> {
    let mut reader = Reader::from_str(text);

    // stack[0]은 문서 루트를 담는 가상 요소
    let mut stack = vec![Frame::new(String::new())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                ensure_single_root(&stack)?;
                stack.push(Frame::from_start(&start)?);
            }
            Ok(Event::Empty(start)) => {
                ensure_single_root(&stack)?;
                let frame = Frame::from_start(&start)?;
                let parent = current(&mut stack)?;
                let name = frame.name.clone();
                push_child(&mut parent.children, name, frame.into_value());
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(xml_error("unexpected closing tag".to_string()));
                }
                let frame = stack.pop().ok_or_else(|| xml_error("empty stack".to_string()))?;
                let name = frame.name.clone();
                let parent = current(&mut stack)?;
                push_child(&mut parent.children, name, frame.into_value());
            }
            Ok(Event::Text(text)) => {
                let unescaped = text.unescape().map_err(|e| xml_error(e.to_string()))?;
                if stack.len() == 1 {
                    // 루트 바깥은 공백만 허용
                    if !unescaped.trim().is_empty() {
                        return Err(xml_error("text outside root element".to_string()));
                    }
                    continue;
                }
                current(&mut stack)?.text.push_str(&unescaped);
            }
            Ok(Event::CData(cdata)) => {
                if stack.len() == 1 {
                    return Err(xml_error("CDATA outside root element".to_string()));
                }
                let raw = cdata.into_inner();
                current(&mut stack)?
                    .text
                    .push_str(&String::from_utf8_lossy(&raw));
            }
            Ok(Event::Eof) => break,
            // 선언, 주석, 처리 명령, DOCTYPE은 무시
            Ok(_) => {}
            Err(e) => {
                return Err(xml_error(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if stack.len() != 1 {
        return Err(xml_error("unclosed element at end of document".to_string()));
    }

    let root = stack
        .pop()
        .ok_or_else(|| xml_error("empty stack".to_string()))?;
    if root.children.is_empty() {
        return Err(xml_error("document has no root element".to_string()));
    }

    Ok(Value::Object(root.children))
}

/// 루트 요소가 이미 닫혔는데 새 요소가 시작되면 에러
fn ensure_single_root(stack: &[Frame]) -> Result<(), LoadError> {
    match stack {
        [document] if !document.children.is_empty() => {
            Err(xml_error("junk after document element".to_string()))
        }
        _ => Ok(()),
    }
}

fn current(stack: &mut [Frame]) -> Result<&mut Frame, LoadError> {
    stack
        .last_mut()
        .ok_or_else(|| xml_error("empty stack".to_string()))
}

/// 자식 추가 (같은 이름이 이미 있으면 배열로 승격)
fn push_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

fn xml_error(message: String) -> LoadError {
    LoadError::Parse {
        format: DataFormat::Xml,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_public_data_response() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <header><resultCode>00</resultCode><resultMsg>NORMAL SERVICE.</resultMsg></header>
  <body>
    <items>
      <item><facltNm>A</facltNm><addr1>부산</addr1></item>
      <item><facltNm>B</facltNm><addr1>제주</addr1></item>
    </items>
    <totalCount>2</totalCount>
  </body>
</response>"#;

        let value = parse_xml(xml).unwrap();
        assert_eq!(value["response"]["header"]["resultCode"], json!("00"));
        assert_eq!(value["response"]["body"]["totalCount"], json!("2"));
        assert_eq!(
            value["response"]["body"]["items"]["item"],
            json!([
                {"facltNm": "A", "addr1": "부산"},
                {"facltNm": "B", "addr1": "제주"}
            ])
        );
    }

    #[test]
    fn test_single_item_is_not_a_list() {
        let value = parse_xml("<items><item><id>1</id></item></items>").unwrap();
        assert_eq!(value, json!({"items": {"item": {"id": "1"}}}));
    }

    #[test]
    fn test_attributes_and_text() {
        let value = parse_xml(r#"<root><price currency="KRW">1000</price><tag a="1"/></root>"#)
            .unwrap();
        assert_eq!(
            value,
            json!({"root": {
                "price": {"@currency": "KRW", "#text": "1000"},
                "tag": {"@a": "1"}
            }})
        );
    }

    #[test]
    fn test_empty_elements_are_null() {
        let value = parse_xml("<root><a></a><b/></root>").unwrap();
        assert_eq!(value, json!({"root": {"a": null, "b": null}}));
    }

    #[test]
    fn test_entities_and_cdata() {
        let value =
            parse_xml("<root><a>R&amp;D</a><b><![CDATA[<오션뷰>]]></b></root>").unwrap();
        assert_eq!(value["root"]["a"], json!("R&D"));
        assert_eq!(value["root"]["b"], json!("<오션뷰>"));
    }

    #[test]
    fn test_text_and_cdata_keep_inner_whitespace() {
        let value = parse_xml("<r><a>Hello <![CDATA[world]]></a><c>  양쪽 공백  </c></r>").unwrap();
        assert_eq!(value["r"]["a"], json!("Hello world"));
        assert_eq!(value["r"]["c"], json!("양쪽 공백"));
    }

    #[test]
    fn test_mixed_content() {
        let value = parse_xml("<r><b>바다 <i>뷰</i> 캠핑</b></r>").unwrap();
        assert_eq!(value["r"]["b"]["i"], json!("뷰"));
        // 조각은 그대로 연결되고 양 끝만 trim
        assert_eq!(value["r"]["b"]["#text"], json!("바다  캠핑"));
    }

    #[test]
    fn test_indentation_is_not_text() {
        let value = parse_xml("<r>\n  <a>1</a>\n  <b x=\"y\">\n  </b>\n</r>\n").unwrap();
        assert_eq!(value, json!({"r": {"a": "1", "b": {"@x": "y"}}}));
    }

    #[test]
    fn test_namespace_prefix_is_kept() {
        let value = parse_xml(r#"<ns:r xmlns:ns="urn:x"><ns:a>1</ns:a></ns:r>"#).unwrap();
        assert_eq!(
            value,
            json!({"ns:r": {"@xmlns:ns": "urn:x", "ns:a": "1"}})
        );
    }

    #[test]
    fn test_multiple_root_elements() {
        assert!(parse_xml("<a>1</a><b>2</b>").is_err());
        assert!(parse_xml("<a>1</a><b/>").is_err());
        assert!(parse_xml("<a>1</a>junk").is_err());
        assert!(parse_xml("<?xml version=\"1.0\"?>\n<a>1</a>\n<!-- end -->\n").is_ok());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse_xml("<root><a></root>").is_err());
        assert!(parse_xml("<root>").is_err());
        assert!(parse_xml("").is_err());
    }
}
