//! Search rendering and export-stream decoding.

use chronobloom_types::{HistoryFilter, Observation, QueryError};
use serde_json::Value;

/// Render the search for `filter`.
///
/// The status clause also matches `phenophase_status`, the field name
/// older events were indexed with.
pub(crate) fn render_search(filter: &HistoryFilter) -> String {
    let mut search = format!(
        "search index={} sourcetype={}",
        filter.partition, filter.sourcetype
    );
    if let Some(status) = filter.status {
        let code = u8::from(status);
        search.push_str(&format!(" (status={code} OR phenophase_status={code})"));
    }
    search
}

/// Decode an export response body (one JSON object per line).
///
/// Lines without a `result` are progress or message lines and are skipped,
/// except that a `FATAL` or `ERROR` message fails the whole query. A result is read from its `_raw` event body when present, otherwise from
/// the extracted field map. Results that do not decode as observations are
/// skipped and counted in the log.
pub(crate) fn parse_export(body: &str) -> Result<Vec<Observation>, QueryError> {
    let mut observations = Vec::new();
    let mut json_lines = 0usize;
    let mut skipped = 0usize;

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        json_lines += 1;

        if let Some(messages) = value.get("messages").and_then(Value::as_array) {
            for message in messages {
                let kind = message.get("type").and_then(Value::as_str).unwrap_or("");
                if matches!(kind.to_ascii_uppercase().as_str(), "FATAL" | "ERROR") {
                    let text = message.get("text").and_then(Value::as_str).unwrap_or("");
                    return Err(QueryError::SearchFailed(format!("{kind}: {text}")));
                }
                tracing::warn!(message = %message, "search message");
            }
        }

        let Some(result) = value.get("result") else {
            continue;
        };
        match decode_result(result) {
            Some(observation) => observations.push(observation),
            None => skipped += 1,
        }
    }

    if json_lines == 0 && !body.trim().is_empty() {
        let snippet: String = body.chars().take(200).collect();
        return Err(QueryError::Malformed(format!("no JSON lines in export: {snippet}")));
    }
    if skipped > 0 {
        tracing::warn!(skipped, kept = observations.len(), "skipped undecodable search results");
    }
    Ok(observations)
}

fn decode_result(result: &Value) -> Option<Observation> {
    if let Some(raw) = result.get("_raw").and_then(Value::as_str) {
        if let Ok(observation) = serde_json::from_str::<Observation>(raw) {
            return Some(observation);
        }
    }
    serde_json::from_value::<Observation>(result.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronobloom_types::test_utils::sample_observation;
    use serde_json::json;

    #[test]
    fn renders_default_search() {
        assert_eq!(
            render_search(&HistoryFilter::default()),
            "search index=main sourcetype=chronobloom (status=1 OR phenophase_status=1)"
        );
    }

    #[test]
    fn renders_without_status_clause() {
        let filter = HistoryFilter {
            status: None,
            ..HistoryFilter::default()
        };
        assert_eq!(render_search(&filter), "search index=main sourcetype=chronobloom");
    }

    #[test]
    fn decodes_raw_and_skips_noise() {
        let raw = serde_json::to_string(&sample_observation("a")).unwrap();
        let body = [
            json!({"preview": false, "offset": 0, "result": {"_raw": raw, "_time": "2024-04-28"}})
                .to_string(),
            json!({"preview": false, "messages": [{"type": "INFO", "text": "ok"}]}).to_string(),
            json!({"preview": false, "offset": 1, "result": {"_raw": "not json", "foo": "bar"}})
                .to_string(),
            json!({"preview": false, "lastrow": true}).to_string(),
        ]
        .join("\n");
        let observations = parse_export(&body).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].id, "a");
    }

    #[test]
    fn decodes_extracted_fields_when_raw_missing() {
        let mut fields = serde_json::to_value(sample_observation("b")).unwrap();
        // Extracted fields come back as strings.
        fields["species_id"] = json!("52");
        fields["status"] = json!("1");
        let body = json!({"result": fields}).to_string();
        let observations = parse_export(&body).unwrap();
        assert_eq!(observations[0].species_id, 52);
    }

    #[test]
    fn fatal_message_fails_the_query() {
        let body = [
            json!({"preview": false, "messages": [{"type": "INFO", "text": "starting"}]})
                .to_string(),
            json!({"preview": false, "messages": [{"type": "FATAL", "text": "Unknown index 'mian'"}]})
                .to_string(),
        ]
        .join("\n");
        let err = parse_export(&body).unwrap_err();
        assert!(!err.is_retryable());
        match err {
            QueryError::SearchFailed(msg) => assert_eq!(msg, "FATAL: Unknown index 'mian'"),
            other => panic!("expected SearchFailed, got {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = parse_export("<response><messages/></response>").unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn empty_body_is_no_results() {
        assert!(parse_export("").unwrap().is_empty());
    }
}
