use crate::config::{AddHeadersMode, Config};
use crate::verdict::{Verdict, ACTION_ADD_HEADER};

/// Ordered append-only multi-map of annotation headers.
///
/// Names are canonically lower-cased; repeated appends under one name
/// accumulate as repeated header lines, never overwrite.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HeaderSet {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderSet {
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Header lines in append order, one `(name, value)` pair per line.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(n, values)| values.iter().map(move |v| (n.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether the configured annotation mode asks for headers on this verdict.
pub fn wants_headers_added(verdict: &Verdict, cfg: &Config) -> bool {
    match cfg.main.add_headers {
        AddHeadersMode::Never => false,
        AddHeadersMode::Always => true,
        AddHeadersMode::Sometimes => verdict.action == ACTION_ADD_HEADER,
    }
}

/// Render the verdict into `x-rspamd-*` annotation headers.
///
/// One call appends exactly one value per header; callers that annotate twice
/// get repeated lines.
pub fn add_headers(headers: &mut HeaderSet, cfg: &Config, verdict: &Verdict) {
    headers.append("x-rspamd-score", format_score(verdict.score));

    if cfg.header.bar {
        // Only a strictly positive score earns the spam bar
        let bar = if verdict.score > 0.0 { "+" } else { "-" };
        headers.append("x-rspamd-bar", bar);
    }

    let report = verdict
        .symbols
        .iter()
        .map(|s| format!("{}({})", s.name, format_score(s.score)))
        .collect::<Vec<_>>()
        .join(" ");
    headers.append("x-rspamd-report", report);
}

/// Natural decimal rendering: integral scores drop the fractional part
/// (`1.0` renders as `1`), everything else keeps its shortest form.
fn format_score(score: f64) -> String {
    format!("{score}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::SymbolMatch;

    fn verdict_with_symbols(score: f64, action: &str) -> Verdict {
        Verdict {
            score,
            action: action.to_string(),
            symbols: vec![
                SymbolMatch {
                    name: "FOO".to_string(),
                    score: 0.1,
                    ..Default::default()
                },
                SymbolMatch {
                    name: "BAR".to_string(),
                    score: 1.0,
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_wants_headers_modes() {
        let mut cfg = Config::default();

        cfg.main.add_headers = AddHeadersMode::Never;
        for action in ["add header", "reject", "no action", "greylist"] {
            assert!(!wants_headers_added(&verdict_with_symbols(1.0, action), &cfg));
        }

        cfg.main.add_headers = AddHeadersMode::Always;
        for action in ["add header", "reject", "no action", "greylist"] {
            assert!(wants_headers_added(&verdict_with_symbols(1.0, action), &cfg));
        }

        cfg.main.add_headers = AddHeadersMode::Sometimes;
        assert!(wants_headers_added(
            &verdict_with_symbols(1.0, "add header"),
            &cfg
        ));
        for action in ["reject", "no action", "rewrite subject", ""] {
            assert!(!wants_headers_added(&verdict_with_symbols(1.0, action), &cfg));
        }
    }

    #[test]
    fn test_add_headers_positive_score() {
        let cfg = Config::default();
        let verdict = verdict_with_symbols(1.1, "add header");

        let mut headers = HeaderSet::default();
        add_headers(&mut headers, &cfg, &verdict);

        assert_eq!(headers.get("x-rspamd-score"), Some(&["1.1".to_string()][..]));
        assert_eq!(headers.get("x-rspamd-bar"), Some(&["+".to_string()][..]));
        assert_eq!(
            headers.get("x-rspamd-report"),
            Some(&["FOO(0.1) BAR(1)".to_string()][..])
        );
    }

    #[test]
    fn test_add_headers_negative_score() {
        let cfg = Config::default();
        let verdict = Verdict {
            score: -1.0,
            ..Default::default()
        };

        let mut headers = HeaderSet::default();
        add_headers(&mut headers, &cfg, &verdict);

        assert_eq!(headers.get("x-rspamd-score"), Some(&["-1".to_string()][..]));
        assert_eq!(headers.get("x-rspamd-bar"), Some(&["-".to_string()][..]));
    }

    #[test]
    fn test_zero_score_bar_is_negative() {
        let cfg = Config::default();
        let verdict = Verdict::default();

        let mut headers = HeaderSet::default();
        add_headers(&mut headers, &cfg, &verdict);

        assert_eq!(headers.get("x-rspamd-score"), Some(&["0".to_string()][..]));
        assert_eq!(headers.get("x-rspamd-bar"), Some(&["-".to_string()][..]));
    }

    #[test]
    fn test_bar_disabled() {
        let mut cfg = Config::default();
        cfg.header.bar = false;

        let mut headers = HeaderSet::default();
        add_headers(&mut headers, &cfg, &verdict_with_symbols(2.0, "add header"));

        assert_eq!(headers.get("x-rspamd-bar"), None);
        assert!(headers.get("x-rspamd-score").is_some());
        assert!(headers.get("x-rspamd-report").is_some());
    }

    #[test]
    fn test_report_preserves_symbol_order() {
        let cfg = Config::default();
        let verdict = Verdict {
            score: 3.0,
            action: "add header".to_string(),
            symbols: vec![
                SymbolMatch {
                    name: "ZULU".to_string(),
                    score: 2.5,
                    ..Default::default()
                },
                SymbolMatch {
                    name: "ALPHA".to_string(),
                    score: 0.5,
                    ..Default::default()
                },
            ],
        };

        let mut headers = HeaderSet::default();
        add_headers(&mut headers, &cfg, &verdict);

        assert_eq!(
            headers.get("x-rspamd-report"),
            Some(&["ZULU(2.5) ALPHA(0.5)".to_string()][..])
        );
    }

    #[test]
    fn test_repeated_calls_accumulate() {
        let cfg = Config::default();
        let verdict = verdict_with_symbols(1.1, "add header");

        let mut headers = HeaderSet::default();
        add_headers(&mut headers, &cfg, &verdict);
        add_headers(&mut headers, &cfg, &verdict);

        assert_eq!(
            headers.get("x-rspamd-score"),
            Some(&["1.1".to_string(), "1.1".to_string()][..])
        );
    }

    #[test]
    fn test_header_set_case_insensitive_append_order() {
        let mut headers = HeaderSet::default();
        headers.append("X-Rspamd-Score", "1");
        headers.append("x-rspamd-score", "2");

        assert_eq!(
            headers.get("X-RSPAMD-SCORE"),
            Some(&["1".to_string(), "2".to_string()][..])
        );

        let lines: Vec<(&str, &str)> = headers.iter().collect();
        assert_eq!(
            lines,
            vec![("x-rspamd-score", "1"), ("x-rspamd-score", "2")]
        );
    }
}
