use super::normalizer::clean_header;
use std::collections::HashMap;
use std::io::Read;

/// One data row of a roster feed, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedRow {
    fields: HashMap<String, String>,
}

impl FeedRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self { fields }
    }

    /// Raw value of a column, `None` when the feed has no such column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Trimmed value of a column. Present-but-empty columns yield `Some("")`.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim)
    }

    /// First non-blank value among `aliases`, checked in order.
    pub fn first_present(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .filter_map(|alias| self.text(alias))
            .find(|value| !value.is_empty())
    }
}

pub fn parse_feed<R: Read>(reader: R) -> Result<Vec<FeedRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(clean_header)
        .collect();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        // Short rows leave trailing columns empty rather than absent.
        let fields = headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let value = record.get(index).unwrap_or_default();
                (header.clone(), value.to_string())
            })
            .collect();
        rows.push(FeedRow { fields });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rows_are_keyed_by_cleaned_headers() {
        let rows = parse_feed(Cursor::new(
            "\u{feff}Talent Name, Talent ID ,Unused\nJane Doe,T1,x\n",
        ))
        .expect("parse");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("Talent Name"), Some("Jane Doe"));
        assert_eq!(rows[0].text("Talent ID"), Some("T1"));
        assert!(rows[0].get("Mobile").is_none());
    }

    #[test]
    fn short_rows_fill_missing_columns_with_blanks() {
        let rows = parse_feed(Cursor::new("Talent Name,Talent ID,Mobile\nJane Doe,T1\n"))
            .expect("parse");

        assert_eq!(rows[0].text("Mobile"), Some(""));
    }

    #[test]
    fn first_present_skips_blank_aliases() {
        let row = FeedRow::from_pairs([("Spread Amount", " "), ("Weekly Spread", "$20")]);
        assert_eq!(
            row.first_present(&["Spread Amount", "Weekly Spread", "Spread"]),
            Some("$20")
        );
        assert_eq!(row.first_present(&["Spread"]), None);
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let bytes: &[u8] = b"Talent Name\n\xff\xfe\n";
        assert!(parse_feed(bytes).is_err());
    }
}
