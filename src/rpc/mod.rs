//! Line-oriented JSON RPC over a pair of streams.
//!
//! Each request is one JSON object per line:
//!
//! ```text
//! {"function": "model_output", "model": {...}, "time": 0.0, "state": [], "input": [...]}
//! ```
//!
//! `model_output` answers with one JSON line holding the model output, any
//! other function answers `[]`. A malformed request is answered with a line
//! starting with `ERROR: ` and ends the session.

use log::{debug, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("expected a JSON object describing the RPC, but got {0}")]
    NotAnObject(String),
    #[error("expected JSON RPC object to have keys [function, model, time, state, input], but got {0}")]
    MissingKeys(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model failed: {0}")]
    Model(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// One decoded request line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcRequest {
    pub function: String,
    pub model: Value,
    pub time: Value,
    pub state: Value,
    pub input: Value,
}

impl RpcRequest {
    pub fn parse(line: &str) -> Result<Self, RpcError> {
        let value: Value = serde_json::from_str(line)?;
        let Some(object) = value.as_object() else {
            return Err(RpcError::NotAnObject(line.to_string()));
        };
        let required = ["function", "model", "time", "state", "input"];
        if !required.iter().all(|key| object.contains_key(*key)) {
            return Err(RpcError::MissingKeys(line.to_string()));
        }
        serde_json::from_value(value).map_err(|_| RpcError::MissingKeys(line.to_string()))
    }
}

/// A model reachable through `model_output`
pub trait RpcModel {
    fn model_output(&self, model: &Value, time: &Value, state: &Value, input: &Value) -> Result<Value, RpcError>;
}

/// Inverted pendulum LQR law: `u = r - K x`, with the gain row `K` under
/// `model.xform` and the input laid out as `[x.., r]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LqrController;

fn numbers(value: &Value, what: &str) -> Result<Vec<f64>, RpcError> {
    value
        .as_array()
        .and_then(|items| items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>())
        .ok_or_else(|| RpcError::Model(format!("{} must be an array of numbers, got {}", what, value)))
}

impl RpcModel for LqrController {
    fn model_output(&self, model: &Value, _time: &Value, _state: &Value, input: &Value) -> Result<Value, RpcError> {
        let gains = numbers(&model["xform"], "model.xform")?;
        let input = numbers(input, "input")?;
        let Some((reference, plant)) = input.split_last() else {
            return Err(RpcError::Model("input is empty".to_string()));
        };
        if gains.len() != plant.len() {
            debug!(
                "Gain length {} does not match plant output length {}, using the overlap",
                gains.len(),
                plant.len()
            );
        }
        let feedback: f64 = gains.iter().zip(plant).map(|(k, x)| k * x).sum();
        Ok(json!([reference - feedback]))
    }
}

/// Answer one request line
pub fn handle_line<M: RpcModel>(model: &M, line: &str) -> Result<Value, RpcError> {
    let request = RpcRequest::parse(line)?;
    match request.function.as_str() {
        "model_output" => model.model_output(&request.model, &request.time, &request.state, &request.input),
        other => {
            debug!("Unknown RPC function '{}'", other);
            Ok(json!([]))
        }
    }
}

/// Serve requests until EOF. The first failing request is answered with an
/// `ERROR: ` line and returned as the error.
pub fn serve<M, R, W>(model: &M, reader: R, mut writer: W) -> Result<u64, RpcError>
where
    M: RpcModel,
    R: BufRead,
    W: Write,
{
    let mut served = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        match handle_line(model, line) {
            Ok(reply) => {
                writeln!(writer, "{}", serde_json::to_string(&reply)?)?;
                writer.flush()?;
                served += 1;
            }
            Err(e) => {
                writeln!(writer, "ERROR: {}", e)?;
                writer.flush()?;
                return Err(e);
            }
        }
    }
    info!("RPC input closed after {} request(s)", served);
    Ok(served)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> (Result<u64, RpcError>, String) {
        let mut out = Vec::new();
        let result = serve(&LqrController, input.as_bytes(), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_model_output() {
        let line = r#"{"function":"model_output","model":{"xform":[1.0,2.0]},"time":0.0,"state":[],"input":[1.0,1.0,5.0]}"#;
        let (result, out) = run(&format!("{}\n", line));
        assert_eq!(result.unwrap(), 1);
        assert_eq!(out, "[2.0]\n");
    }

    #[test]
    fn test_unknown_function_answers_empty_list() {
        let line = r#"{"function":"state_update","model":{},"time":0,"state":[],"input":[]}"#;
        let (result, out) = run(&format!("{}\n", line));
        assert_eq!(result.unwrap(), 1);
        assert_eq!(out, "[]\n");
    }

    #[test]
    fn test_missing_keys_is_an_error_line() {
        let (result, out) = run("{\"function\":\"model_output\"}\n{\"never\":\"read\"}\n");
        assert!(matches!(result, Err(RpcError::MissingKeys(_))));
        assert!(out.starts_with("ERROR: expected JSON RPC object to have keys"));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_non_object_and_garbage() {
        let (result, out) = run("[1,2,3]\n");
        assert!(matches!(result, Err(RpcError::NotAnObject(_))));
        assert!(out.starts_with("ERROR: "));

        let (result, out) = run("not json\n");
        assert!(matches!(result, Err(RpcError::Json(_))));
        assert!(out.starts_with("ERROR: "));
    }

    #[test]
    fn test_eof_is_clean() {
        let (result, out) = run("");
        assert_eq!(result.unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_non_numeric_input_fails_the_model() {
        let line = r#"{"function":"model_output","model":{"xform":[1.0]},"time":0,"state":[],"input":["a",1.0]}"#;
        assert!(matches!(handle_line(&LqrController, line), Err(RpcError::Model(_))));
    }

    #[test]
    fn test_pendulum_request_with_reference_slot() {
        let line = r#"{"function":"model_output","model":{"xform":[1,0,0,0]},"time":0.0,"state":[],"input":[0,0,0,0]}"#;
        let (result, out) = run(&format!("{}\n", line));
        assert_eq!(result.unwrap(), 1);
        assert_eq!(out, "[0.0]\n");

        // Four gains against three plant values: only the overlap counts
        let out = handle_line(
            &LqrController,
            r#"{"function":"model_output","model":{"xform":[1,0,0,9]},"time":0.0,"state":[],"input":[2,0,0,5]}"#,
        )
        .unwrap();
        assert_eq!(out, json!([3.0]));
    }

    #[test]
    fn test_error_line_ends_the_session() {
        let good = r#"{"function":"model_output","model":{"xform":[1.0]},"time":0,"state":[],"input":[1.0,0.0]}"#;
        let input = format!("{good}\nnot-json\n{good}\n");
        let (result, out) = run(&input);
        assert!(matches!(result, Err(RpcError::Json(_))));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[-1.0]");
        assert!(lines[1].starts_with("ERROR: "));
    }

    #[test]
    fn test_gain_shorter_than_plant_uses_overlap() {
        let model = json!({"xform": [2.0]});
        let out = LqrController
            .model_output(&model, &json!(0), &json!([]), &json!([1.0, 7.0, 3.0]))
            .unwrap();
        assert_eq!(out, json!([1.0]));
    }
}
