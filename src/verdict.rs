use serde_json::Value;

pub const ACTION_ADD_HEADER: &str = "add header";
pub const ACTION_REJECT: &str = "reject";

/// A rule the scanner matched, with its weight contribution.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SymbolMatch {
    pub name: String,
    pub score: f64,
    pub description: Option<String>,
    pub options: Vec<String>,
}

/// The scanner's structured opinion on a message.
///
/// `symbols` keeps the wire order of the response document, which is an
/// observable contract of the rendered report. `action` may be any string;
/// unrecognized values are simply not actionable.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub action: String,
    pub symbols: Vec<SymbolMatch>,
}

impl Verdict {
    pub fn symbol(&self, name: &str) -> Option<&SymbolMatch> {
        self.symbols.iter().find(|s| s.name == name)
    }
}

/// Decode a raw scanner response into a verdict.
///
/// The scanner is an independently-operated external process, so anything
/// short of a usable document (empty payload, invalid JSON, the empty object)
/// degrades to `None` and the pipeline falls back to its default disposition.
pub fn parse_response(raw: &str) -> Option<Verdict> {
    if raw.trim().is_empty() {
        return None;
    }

    let document: Value = match serde_json::from_str(raw) {
        Ok(document) => document,
        Err(e) => {
            log::warn!("unparseable scanner response: {e}");
            return None;
        }
    };

    let fields = document.as_object()?;
    if fields.is_empty() {
        return None;
    }

    let mut verdict = Verdict {
        score: fields.get("score").and_then(Value::as_f64).unwrap_or(0.0),
        action: fields
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        symbols: Vec::new(),
    };

    if let Some(symbols) = fields.get("symbols").and_then(Value::as_object) {
        for (name, entry) in symbols {
            verdict.symbols.push(parse_symbol(name, entry));
        }
    }

    Some(verdict)
}

fn parse_symbol(name: &str, entry: &Value) -> SymbolMatch {
    let mut symbol = SymbolMatch {
        name: name.to_string(),
        ..Default::default()
    };

    if let Some(fields) = entry.as_object() {
        symbol.score = fields.get("score").and_then(Value::as_f64).unwrap_or(0.0);
        symbol.description = fields
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(options) = fields.get("options").and_then(Value::as_array) {
            symbol.options = options
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
    }

    symbol
}
