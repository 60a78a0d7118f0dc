//! Locates a tool call embedded in free-form model output.
//!
//! Models are asked to emit `{"tool_call": {"name": ..., "args": {...}}}` but
//! usually wrap it in narration, code fences or stray braces. Every `{` that
//! precedes the last `"tool_call"` marker is tried as the start of a JSON
//! value; the incremental parser consumes exactly one balanced value from
//! there, so trailing prose and further objects never leak into the decode.

use serde_json::{Map, Value};
use tracing::debug;

use crate::message::ToolCallRequest;

pub const TOOL_CALL_KEY: &str = "tool_call";

const MARKER: &str = "\"tool_call\"";

/// Returns the first decodable object carrying a `tool_call` key, if any.
pub fn extract_tool_call(reply: &str) -> Option<ToolCallRequest> {
    let last_marker = reply.rfind(MARKER)?;

    for (start, _) in reply.match_indices('{') {
        if start > last_marker {
            break;
        }
        let Some(mut object) = decode_object_at(&reply[start..]) else {
            continue;
        };
        if let Some(call) = object.remove(TOOL_CALL_KEY) {
            let request = into_request(call);
            if request.is_none() {
                debug!(offset = start, "tool_call marker present but not an object");
            }
            return request;
        }
    }

    debug!("tool_call marker present but no decodable object");
    None
}

fn decode_object_at(text: &str) -> Option<Map<String, Value>> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(object))) => Some(object),
        _ => None,
    }
}

fn into_request(call: Value) -> Option<ToolCallRequest> {
    let Value::Object(mut call) = call else {
        return None;
    };
    let name = match call.remove("name") {
        Some(Value::String(name)) => name,
        _ => String::new(),
    };
    let args = match call.remove("args") {
        Some(Value::Object(args)) => args,
        _ => Map::new(),
    };
    Some(ToolCallRequest { name, args })
}
