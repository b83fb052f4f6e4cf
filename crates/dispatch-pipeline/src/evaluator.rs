//! Response evaluator: classifies an HTTP response as success or a
//! structured provider-level error via a configurable status/body check.

use std::collections::HashMap;

use regex::Regex;

use dispatch_core::SendResult;

use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalBodyType {
    #[default]
    None,
    Json,
    Xml,
    Text,
    Raw,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Eq,
    Contains,
    Regex,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Per-provider response-handling rules. Every HTTP provider transformer
/// ships an explicit instance of this rather than relying on a status-only
/// default, since some providers return HTTP 200 with an in-body error.
#[derive(Debug, Clone, Default)]
pub struct ResponseEvaluatorConfig {
    pub accept_status: Vec<u16>,
    pub check_body: bool,
    pub body_type: EvalBodyType,
    pub path: String,
    pub expect: String,
    pub mode: Mode,
    pub code_path: String,
    pub msg_path: String,
    pub code_map: HashMap<String, String>,
}

enum Step {
    Key(String),
    Index(usize),
}

fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'.') {
            current.push('.');
            chars.next();
        } else if c == '.' {
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    segments.push(current);
    segments
}

fn parse_segment(seg: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    let bracket_start = seg.find('[');
    let key_part = match bracket_start {
        Some(pos) => &seg[..pos],
        None => seg,
    };
    if !key_part.is_empty() {
        match key_part.parse::<usize>() {
            Ok(n) => steps.push(Step::Index(n)),
            Err(_) => steps.push(Step::Key(key_part.to_string())),
        }
    }
    if let Some(start) = bracket_start {
        let bytes = seg.as_bytes();
        let mut pos = start;
        while pos < seg.len() && bytes[pos] == b'[' {
            match seg[pos..].find(']') {
                Some(rel_end) => {
                    let end = pos + rel_end;
                    if let Ok(n) = seg[pos + 1..end].parse::<usize>() {
                        steps.push(Step::Index(n));
                    }
                    pos = end + 1;
                }
                None => break,
            }
        }
    }
    steps
}

fn json_extract<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for seg in split_path(path) {
        for step in parse_segment(&seg) {
            current = match step {
                Step::Key(k) => current.get(k.as_str())?,
                Step::Index(i) => current.get(i)?,
            };
        }
    }
    Some(current)
}

fn value_to_compare_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn find_nth_element(xml: &str, tag: &str, n: usize) -> Option<String> {
    let pattern = format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>", tag = regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    re.captures_iter(xml).nth(n).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

fn xml_extract(body: &str, path: &str) -> Option<String> {
    if path.is_empty() {
        return Some(body.to_string());
    }
    let mut current = body.to_string();
    for seg in split_path(path) {
        let (key, idx) = match seg.find('[') {
            Some(bracket) => {
                let key = seg[..bracket].to_string();
                let idx = seg[bracket..]
                    .find(']')
                    .and_then(|rel_end| seg[bracket + 1..bracket + rel_end].parse::<usize>().ok())
                    .unwrap_or(0);
                (key, idx)
            }
            None => (seg.clone(), 0),
        };
        current = find_nth_element(&current, &key, idx)?;
    }
    Some(current)
}

fn text_extract(text: &str, path: &str) -> String {
    if path.is_empty() {
        return text.to_string();
    }
    match Regex::new(path) {
        Ok(re) => match re.captures(text) {
            Some(caps) => caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str().to_string()).unwrap_or_default(),
            None => String::new(),
        },
        Err(_) => String::new(),
    }
}

fn compare(actual: &str, expect: &str, mode: Mode) -> bool {
    match mode {
        Mode::Eq => actual == expect,
        Mode::Contains => actual.contains(expect),
        Mode::Regex => Regex::new(expect).map(|re| re.is_match(actual)).unwrap_or(false),
        Mode::Gt | Mode::Gte | Mode::Lt | Mode::Lte => match (actual.parse::<f64>(), expect.parse::<f64>()) {
            (Ok(a), Ok(b)) => match mode {
                Mode::Gt => a > b,
                Mode::Gte => a >= b,
                Mode::Lt => a < b,
                Mode::Lte => a <= b,
                _ => unreachable!(),
            },
            _ => false,
        },
    }
}

fn status_acceptable(config: &ResponseEvaluatorConfig, status: u16) -> bool {
    if !config.accept_status.is_empty() {
        config.accept_status.contains(&status)
    } else {
        (200..400).contains(&status)
    }
}

fn detect_body_type(config: &ResponseEvaluatorConfig, result: &SendResult) -> EvalBodyType {
    if config.body_type != EvalBodyType::None {
        return config.body_type;
    }
    let content_type = result
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.to_lowercase())
        .unwrap_or_default();
    if content_type.contains("json") {
        EvalBodyType::Json
    } else if content_type.contains("xml") {
        EvalBodyType::Xml
    } else if content_type.contains("form") {
        EvalBodyType::Form
    } else {
        EvalBodyType::Text
    }
}

fn extract(body_type: EvalBodyType, body: &str, path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    match body_type {
        EvalBodyType::Json => {
            serde_json::from_str::<serde_json::Value>(body).ok().and_then(|v| json_extract(&v, path).map(value_to_compare_string))
        }
        EvalBodyType::Xml => xml_extract(body, path),
        EvalBodyType::Text | EvalBodyType::Form | EvalBodyType::Raw | EvalBodyType::None => {
            Some(text_extract(body, path))
        }
    }
}

fn build_failure(config: &ResponseEvaluatorConfig, result: &SendResult) -> DispatchError {
    let body_type = detect_body_type(config, result);
    let body = result.body_as_str();
    let code = extract(body_type, &body, &config.code_path).unwrap_or_else(|| result.status_code.to_string());
    let msg = extract(body_type, &body, &config.msg_path);
    let msg = config.code_map.get(&code).cloned().or(msg);
    DispatchError::api_error(msg, code)
}

/// Evaluate `result` against `config`, returning `Ok(())` on success or a
/// structured `api error: <msg> (code=<code>)` on failure.
pub fn evaluate(config: &ResponseEvaluatorConfig, result: &SendResult) -> Result<(), DispatchError> {
    if !status_acceptable(config, result.status_code) {
        return Err(build_failure(config, result));
    }
    if !config.check_body {
        return Ok(());
    }

    let body_type = detect_body_type(config, result);
    let body = result.body_as_str();
    let actual = match extract(body_type, &body, &config.path) {
        Some(v) => v,
        None => body.to_string(),
    };

    if compare(&actual, &config.expect, config.mode) {
        Ok(())
    } else {
        Err(build_failure(config, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn result(status: u16, headers: &[(&str, &str)], body: &str) -> SendResult {
        SendResult {
            config: dispatch_core::HttpRequestSpec::new(http::Method::POST, "https://example.com"),
            status_code: status,
            headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn status_only_mode_ignores_body() {
        let config = ResponseEvaluatorConfig { check_body: false, ..Default::default() };
        let ok = result(200, &[], "garbage {{{");
        assert!(evaluate(&config, &ok).is_ok());

        let bad = result(503, &[], "");
        assert!(evaluate(&config, &bad).is_err());
    }

    #[test]
    fn json_path_eq_mode_aliyun_style() {
        let config = ResponseEvaluatorConfig {
            check_body: true,
            path: "Code".to_string(),
            expect: "OK".to_string(),
            mode: Mode::Eq,
            code_path: "Code".to_string(),
            msg_path: "Message".to_string(),
            ..Default::default()
        };
        let ok = result(200, &[("Content-Type", "application/json")], r#"{"Code":"OK","Message":"OK","BizId":"abc"}"#);
        assert!(evaluate(&config, &ok).is_ok());

        let err = result(200, &[("Content-Type", "application/json")], r#"{"Code":"isv.SMS_SIGNATURE_ILLEGAL","Message":"bad sig"}"#);
        let failure = evaluate(&config, &err).unwrap_err();
        assert_eq!(failure.to_string(), "api error: bad sig (code=isv.SMS_SIGNATURE_ILLEGAL)");
    }

    #[test]
    fn lark_sign_mismatch_uses_numeric_code() {
        let config = ResponseEvaluatorConfig {
            check_body: true,
            path: "code".to_string(),
            expect: "0".to_string(),
            mode: Mode::Eq,
            code_path: "code".to_string(),
            msg_path: "msg".to_string(),
            ..Default::default()
        };
        let failure_body = r#"{"code":9499,"msg":"sign match fail"}"#;
        let resp = result(200, &[("Content-Type", "application/json")], failure_body);
        let err = evaluate(&config, &resp).unwrap_err();
        assert!(err.to_string().contains("sign match fail"));
        assert!(err.to_string().contains("9499"));
    }

    #[test]
    fn code_map_overrides_extracted_message() {
        let mut code_map = StdHashMap::new();
        code_map.insert("42".to_string(), "rate limited upstream".to_string());
        let config = ResponseEvaluatorConfig {
            check_body: true,
            path: "ok".to_string(),
            expect: "true".to_string(),
            code_path: "code".to_string(),
            msg_path: "msg".to_string(),
            code_map,
            ..Default::default()
        };
        let resp = result(200, &[("Content-Type", "application/json")], r#"{"ok":false,"code":"42","msg":"raw message"}"#);
        let err = evaluate(&config, &resp).unwrap_err();
        assert!(err.to_string().contains("rate limited upstream"));
    }

    #[test]
    fn array_index_path_segment() {
        let config = ResponseEvaluatorConfig {
            check_body: true,
            path: "items[1].status".to_string(),
            expect: "ready".to_string(),
            ..Default::default()
        };
        let resp = result(
            200,
            &[("Content-Type", "application/json")],
            r#"{"items":[{"status":"pending"},{"status":"ready"}]}"#,
        );
        assert!(evaluate(&config, &resp).is_ok());
    }

    #[test]
    fn xml_path_extraction() {
        let config = ResponseEvaluatorConfig {
            check_body: true,
            body_type: EvalBodyType::Xml,
            path: "response.status".to_string(),
            expect: "ok".to_string(),
            ..Default::default()
        };
        let resp = result(200, &[], "<response><status>ok</status></response>");
        assert!(evaluate(&config, &resp).is_ok());
    }

    #[test]
    fn text_mode_uses_regex_capture_group() {
        let config = ResponseEvaluatorConfig {
            check_body: true,
            body_type: EvalBodyType::Text,
            path: r"status=(\w+)".to_string(),
            expect: "ok".to_string(),
            ..Default::default()
        };
        let resp = result(200, &[], "status=ok;latency=12ms");
        assert!(evaluate(&config, &resp).is_ok());
    }

    #[test]
    fn numeric_gte_mode() {
        let config = ResponseEvaluatorConfig {
            check_body: true,
            path: "score".to_string(),
            expect: "10".to_string(),
            mode: Mode::Gte,
            ..Default::default()
        };
        let resp = result(200, &[("Content-Type", "application/json")], r#"{"score": 15}"#);
        assert!(evaluate(&config, &resp).is_ok());
    }

    #[test]
    fn escaped_dot_in_path_is_a_literal_key_character() {
        let config = ResponseEvaluatorConfig {
            check_body: true,
            path: r"a\.b.c".to_string(),
            expect: "x".to_string(),
            ..Default::default()
        };
        let resp = result(200, &[("Content-Type", "application/json")], r#"{"a.b":{"c":"x"}}"#);
        assert!(evaluate(&config, &resp).is_ok());
    }
}
