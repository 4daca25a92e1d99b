//! Wire handling for the realtime event stream.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServerEvent {
    pub(crate) name: String,
    pub(crate) data: String,
}

/// Incremental `text/event-stream` parser fed with raw response chunks.
#[derive(Debug, Default)]
pub(crate) struct EventStreamParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl EventStreamParser {
    /// Consume a chunk and return every event it completes.
    ///
    /// Chunks may split lines or multi-byte characters anywhere; incomplete
    /// input stays buffered until the next call.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');

            if line.is_empty() {
                events.extend(self.dispatch());
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        events
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        let name = self.event.take();
        let data = std::mem::take(&mut self.data);
        if name.is_none() && data.is_empty() {
            return None;
        }
        Some(ServerEvent {
            name: name.unwrap_or_else(|| "message".to_string()),
            data: data.join("\n"),
        })
    }
}

/// Body of `put` and `patch` events.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamPayload {
    pub(crate) path: String,
    #[serde(default)]
    pub(crate) data: Value,
}

/// Local mirror of the subscribed node, rebuilt from stream events.
#[derive(Debug, Default)]
pub(crate) struct StreamTree {
    root: Value,
}

impl StreamTree {
    pub(crate) fn root(&self) -> &Value {
        &self.root
    }

    /// Replace the node at `path` with `data`; `null` removes it.
    pub(crate) fn put(&mut self, path: &str, data: Value) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        set_at(&mut self.root, &segments, data);
    }

    /// Put each child of `data` below `path`.
    pub(crate) fn patch(&mut self, path: &str, data: Value) {
        let Value::Object(children) = data else {
            return;
        };
        let base = path.trim_end_matches('/');
        for (key, value) in children {
            self.put(&format!("{base}/{key}"), value);
        }
    }
}

fn set_at(node: &mut Value, segments: &[&str], data: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = data;
        return;
    };
    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(children) = node else {
        return;
    };

    if rest.is_empty() {
        if data.is_null() {
            children.remove(*head);
        } else {
            children.insert((*head).to_string(), data);
        }
        return;
    }

    let child = children.entry((*head).to_string()).or_insert(Value::Null);
    set_at(child, rest, data);
    let vacant = match child {
        Value::Null => true,
        Value::Object(grandchildren) => grandchildren.is_empty(),
        _ => false,
    };
    if vacant {
        children.remove(*head);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_events_split_across_chunks() {
        let mut parser = EventStreamParser::default();
        assert!(parser.feed(b"event: put\nda").is_empty());
        let events = parser.feed(b"ta: {\"path\":\"/\",\"data\":null}\r\n\r\n: comment\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            events,
            vec![
                ServerEvent {
                    name: "put".to_string(),
                    data: "{\"path\":\"/\",\"data\":null}".to_string(),
                },
                ServerEvent {
                    name: "keep-alive".to_string(),
                    data: "null".to_string(),
                },
            ]
        );
    }

    #[test]
    fn keeps_split_utf8_intact() {
        let mut parser = EventStreamParser::default();
        let bytes = "event: put\ndata: \"Pokémon\"\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(parser.feed(&bytes[..split]).is_empty());
        let events = parser.feed(&bytes[split..]);
        assert_eq!(events[0].data, "\"Pokémon\"");
    }

    #[test]
    fn put_replaces_and_removes_nodes() {
        let mut tree = StreamTree::default();
        tree.put("/", json!({ "-a": { "name": "Chess" }, "-b": { "name": "Go" } }));
        tree.put("/-c", json!({ "name": "Checkers" }));
        tree.put("/-a", Value::Null);
        tree.put("/-b/name", json!("Go (19x19)"));
        assert_eq!(
            tree.root(),
            &json!({ "-b": { "name": "Go (19x19)" }, "-c": { "name": "Checkers" } })
        );

        tree.put("/-c/name", Value::Null);
        assert_eq!(tree.root(), &json!({ "-b": { "name": "Go (19x19)" } }));
    }

    #[test]
    fn patch_merges_children() {
        let mut tree = StreamTree::default();
        tree.put("/", json!({ "-a": { "name": "Chess", "platform": "Board" } }));
        tree.patch(
            "/-a",
            json!({ "platform": "PC", "description": null, "imageUrl": "file:///c.png" }),
        );
        assert_eq!(
            tree.root(),
            &json!({ "-a": { "name": "Chess", "platform": "PC", "imageUrl": "file:///c.png" } })
        );
    }

    #[test]
    fn initial_null_put_is_empty_tree() {
        let mut tree = StreamTree::default();
        tree.put("/", Value::Null);
        assert!(tree.root().is_null());
        tree.put("/-a", json!({ "name": "Go" }));
        assert_eq!(tree.root(), &json!({ "-a": { "name": "Go" } }));
    }
}
