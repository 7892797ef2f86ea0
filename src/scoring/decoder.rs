use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;

/// 分类标签
///
/// 显式枚举而不是裸查表：未知类别是合法的可报告结果而非错误，
/// Error表示响应无法解析。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Organic,
    Recyclable,
    Unknown,
    Error,
}

impl Label {
    /// 类别索引到标签的固定映射
    pub fn from_index(index: i64) -> Self {
        match index {
            0 => Label::Organic,
            1 => Label::Recyclable,
            _ => Label::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Organic => "Organic",
            Label::Recyclable => "Recyclable",
            Label::Unknown => "Unknown",
            Label::Error => "Error",
        }
    }
}

/// 归一化的分类结果，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub raw_value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ClassificationResult {
    fn from_index(index: i64) -> Self {
        Self {
            label: Label::from_index(index),
            raw_value: index,
            detail: None,
        }
    }

    fn error(detail: String) -> Self {
        Self {
            label: Label::Error,
            raw_value: -1,
            detail: Some(detail),
        }
    }
}

/// 解码阶段的内部失败分类，每种失败模式对应一个命名错误
#[derive(Debug)]
enum DecodeFailure {
    /// 响应不是合法JSON
    Parse(String),
    /// JSON合法但形状不符合预期
    Structure(String),
}

impl DecodeFailure {
    fn describe(&self) -> String {
        match self {
            DecodeFailure::Parse(msg) => format!("Response is not valid JSON: {}", msg),
            DecodeFailure::Structure(msg) => format!("Unexpected response shape: {}", msg),
        }
    }
}

/// 远程打分响应解码器
///
/// 纯函数，无状态。契约：永远返回ClassificationResult，绝不向
/// 调用方抛出错误；解析失败以 label = Error 的结果上报。
pub struct ResponseDecoder;

impl ResponseDecoder {
    /// 解码远程端点返回的原始字节
    pub fn decode(raw: &[u8]) -> ClassificationResult {
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => {
                return ClassificationResult::error(format!(
                    "Response is not valid UTF-8: {}",
                    e
                ));
            }
        };

        Self::decode_text(text)
    }

    /// 解码远程端点返回的文本
    pub fn decode_text(text: &str) -> ClassificationResult {
        match Self::parse_index(text) {
            Ok(index) => ClassificationResult::from_index(index),
            Err(failure) => {
                tracing::warn!("Failed to decode scoring response: {}", failure.describe());
                ClassificationResult::error(failure.describe())
            }
        }
    }

    /// 两段式归一化：解包可能的双重编码 -> 解析 -> 强制转换
    fn parse_index(text: &str) -> std::result::Result<i64, DecodeFailure> {
        let unwrapped = Self::unwrap_quoted(text);

        let value: Value = serde_json::from_str(&unwrapped)
            .map_err(|e| DecodeFailure::Parse(e.to_string()))?;

        let result = value
            .get("result")
            .ok_or_else(|| DecodeFailure::Structure("missing 'result' key".to_string()))?;

        let sequence = result
            .as_array()
            .ok_or_else(|| DecodeFailure::Structure("'result' is not an array".to_string()))?;

        let first = sequence
            .first()
            .ok_or_else(|| DecodeFailure::Structure("'result' array is empty".to_string()))?;

        Self::coerce_index(first)
    }

    /// 剥离外层引号并还原转义的内嵌JSON
    ///
    /// 部分部署会把整个JSON响应再包一层字符串字面量，
    /// 例如 "{\"result\": [1]}"。
    fn unwrap_quoted(text: &str) -> Cow<'_, str> {
        let trimmed = text.trim();

        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            if let Ok(inner) = serde_json::from_str::<String>(trimmed) {
                return Cow::Owned(inner);
            }
        }

        Cow::Borrowed(text)
    }

    /// 类别索引强制转换：先f64再i64
    ///
    /// 远程模型可能以浮点格式的字符串返回索引（例如"1.0"），
    /// 所以必须走两步转换。
    fn coerce_index(value: &Value) -> std::result::Result<i64, DecodeFailure> {
        let float = match value {
            Value::Number(n) => n.as_f64().ok_or_else(|| {
                DecodeFailure::Structure(format!("class index {} is not representable", n))
            })?,
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
                DecodeFailure::Structure(format!("class index '{}' is not numeric", s))
            })?,
            other => {
                return Err(DecodeFailure::Structure(format!(
                    "class index has unexpected type: {}",
                    other
                )));
            }
        };

        if !float.is_finite() {
            return Err(DecodeFailure::Structure(format!(
                "class index {} is not finite",
                float
            )));
        }

        Ok(float as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_organic() {
        let result = ResponseDecoder::decode_text(r#"{"result": [0]}"#);
        assert_eq!(result.label, Label::Organic);
        assert_eq!(result.raw_value, 0);
        assert_eq!(result.detail, None);
    }

    #[test]
    fn decodes_recyclable_from_float() {
        let result = ResponseDecoder::decode_text(r#"{"result": [1.0]}"#);
        assert_eq!(result.label, Label::Recyclable);
        assert_eq!(result.raw_value, 1);
    }

    #[test]
    fn decodes_index_from_float_string() {
        let result = ResponseDecoder::decode_text(r#"{"result": ["1.0"]}"#);
        assert_eq!(result.label, Label::Recyclable);
        assert_eq!(result.raw_value, 1);
    }

    #[test]
    fn unwraps_double_encoded_response() {
        let result = ResponseDecoder::decode_text(r#""{\"result\": [1]}""#);
        assert_eq!(result.label, Label::Recyclable);
        assert_eq!(result.raw_value, 1);
    }

    #[test]
    fn unknown_index_is_reportable_not_an_error() {
        let result = ResponseDecoder::decode_text(r#"{"result": [5]}"#);
        assert_eq!(result.label, Label::Unknown);
        assert_eq!(result.raw_value, 5);
        assert_eq!(result.detail, None);

        let negative = ResponseDecoder::decode_text(r#"{"result": [-3]}"#);
        assert_eq!(negative.label, Label::Unknown);
        assert_eq!(negative.raw_value, -3);
    }

    #[test]
    fn invalid_json_yields_error_result() {
        let result = ResponseDecoder::decode_text("not json");
        assert_eq!(result.label, Label::Error);
        assert!(result.detail.as_deref().is_some_and(|d| !d.is_empty()));
    }

    #[test]
    fn missing_result_key_yields_error_result() {
        let result = ResponseDecoder::decode_text(r#"{"prediction": [1]}"#);
        assert_eq!(result.label, Label::Error);
        assert!(result.detail.as_deref().unwrap().contains("result"));
    }

    #[test]
    fn empty_result_array_yields_error_result() {
        let result = ResponseDecoder::decode_text(r#"{"result": []}"#);
        assert_eq!(result.label, Label::Error);
    }

    #[test]
    fn non_numeric_index_yields_error_result() {
        let result = ResponseDecoder::decode_text(r#"{"result": ["organic"]}"#);
        assert_eq!(result.label, Label::Error);
    }

    #[test]
    fn decode_is_idempotent() {
        let raw = br#"{"result": [1]}"#;
        assert_eq!(ResponseDecoder::decode(raw), ResponseDecoder::decode(raw));

        let bad = b"not json";
        assert_eq!(ResponseDecoder::decode(bad), ResponseDecoder::decode(bad));
    }

    #[test]
    fn non_utf8_yields_error_result() {
        let result = ResponseDecoder::decode(&[0xff, 0xfe, 0x80]);
        assert_eq!(result.label, Label::Error);
        assert!(result.detail.is_some());
    }

    #[test]
    fn labels_serialize_as_strings() {
        let result = ResponseDecoder::decode_text(r#"{"result": [0]}"#);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["label"], "Organic");
        assert_eq!(json["raw_value"], 0);
    }
}
