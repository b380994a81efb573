//! Parse adapter: raw payload to `(trade_date, rows)`
//!
//! This is a collaborator boundary. The pipeline only cares about the
//! [`ParseAdapter`] trait: give it one raw response body, get back the trade
//! date the endpoint actually reported plus the table rows, or nothing when
//! the payload carries no extractable table. Strategies and tests swap in
//! their own adapters; [`OpenPositionsParser`] is the production
//! implementation for the MOEX open-positions response.
//!
//! The trade date in the response is authoritative: a request for a weekend
//! key comes back stamped with the preceding trading day, and the merge store
//! is keyed by that reported date, never by the requested key.

use crate::dates::DateKey;
use chrono::NaiveDate;
use regex::Regex;

/// One parsed response: the reported trade date and the table rows under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// The trade date the endpoint stamped on the payload
    pub trade_date: DateKey,
    /// Table rows in document order, one cell vector per row
    pub rows: Vec<Vec<String>>,
}

/// Boundary trait between the pipeline and response parsing
///
/// Implementations must be cheap to share across worker threads.
pub trait ParseAdapter: Send + Sync {
    /// Extract the trade date and data rows from one raw payload
    ///
    /// Returns `None` when the payload has no recognizable trade date or no
    /// data rows (a "parse miss"); the caller drops the date for the run.
    fn parse(&self, raw: &str) -> Option<ParsedRecord>;
}

/// Parser for the MOEX derivatives open-positions response
///
/// The endpoint answers with an HTML fragment: a caption carrying the trade
/// date in `dd.mm.yyyy` form and a table whose `<td>` cells hold the data.
/// Header rows (`<th>`) are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPositionsParser;

impl OpenPositionsParser {
    fn extract_trade_date(&self, raw: &str) -> Option<DateKey> {
        let date_re = Regex::new(r"\b(\d{2})\.(\d{2})\.(\d{4})\b").ok()?;
        let caps = date_re.captures(raw)?;
        let parsed = NaiveDate::parse_from_str(&caps[0], "%d.%m.%Y").ok()?;
        DateKey::parse(&parsed.format("%Y%m%d").to_string()).ok()
    }

    fn extract_rows(&self, raw: &str) -> Vec<Vec<String>> {
        let row_re = match Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>") {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };
        let cell_re = match Regex::new(r"(?is)<td[^>]*>(.*?)</td>") {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };
        let tag_re = match Regex::new(r"(?s)<[^>]+>") {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };

        row_re
            .captures_iter(raw)
            .filter_map(|row| {
                let inner = row.get(1)?.as_str();
                let cells: Vec<String> = cell_re
                    .captures_iter(inner)
                    .filter_map(|cell| {
                        let text = tag_re.replace_all(cell.get(1)?.as_str(), "");
                        Some(text.trim().to_string())
                    })
                    .collect();
                // header rows have <th> cells only and produce no <td> matches
                if cells.is_empty() || cells.iter().all(|c| c.is_empty()) {
                    None
                } else {
                    Some(cells)
                }
            })
            .collect()
    }
}

impl ParseAdapter for OpenPositionsParser {
    fn parse(&self, raw: &str) -> Option<ParsedRecord> {
        let trade_date = self.extract_trade_date(raw)?;
        let rows = self.extract_rows(raw);
        if rows.is_empty() {
            tracing::debug!(trade_date = %trade_date, "payload has no data rows");
            return None;
        }
        Some(ParsedRecord { trade_date, rows })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <div class="caption">Открытые позиции на 08.04.2025</div>
        <table>
            <tr><th>Contract</th><th>Long</th><th>Short</th></tr>
            <tr><td>MIX-6.25</td><td>1000</td><td>900</td></tr>
            <tr><td>MIX-9.25</td><td><b>250</b></td><td>300</td></tr>
        </table>
    "#;

    #[test]
    fn test_parse_extracts_trade_date_and_rows() {
        let record = OpenPositionsParser.parse(SAMPLE).unwrap();
        assert_eq!(record.trade_date.to_string(), "20250408");
        assert_eq!(
            record.rows,
            vec![
                vec!["MIX-6.25", "1000", "900"],
                vec!["MIX-9.25", "250", "300"],
            ]
            .into_iter()
            .map(|r| r.into_iter().map(String::from).collect::<Vec<_>>())
            .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_header_only_table_is_a_miss() {
        let raw = r#"
            <div>Данные на 08.04.2025</div>
            <table><tr><th>Contract</th><th>Long</th></tr></table>
        "#;
        assert!(OpenPositionsParser.parse(raw).is_none());
    }

    #[test]
    fn test_payload_without_date_is_a_miss() {
        let raw = "<table><tr><td>MIX-6.25</td></tr></table>";
        assert!(OpenPositionsParser.parse(raw).is_none());
    }

    #[test]
    fn test_weekend_request_carries_preceding_trading_date() {
        // a Saturday request echoed back with Friday's date
        let raw = SAMPLE.replace("08.04.2025", "04.04.2025");
        let record = OpenPositionsParser.parse(&raw).unwrap();
        assert_eq!(record.trade_date.to_string(), "20250404");
    }
}
