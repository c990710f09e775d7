use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

struct DateLayout {
    format: &'static str,
    separator: char,
    year_position: usize,
}

// Order matters: "03/04/2024" must resolve to March 4.
const DATE_LAYOUTS: &[DateLayout] = &[
    DateLayout {
        format: "%m/%d/%Y",
        separator: '/',
        year_position: 2,
    },
    DateLayout {
        format: "%Y-%m-%d",
        separator: '-',
        year_position: 0,
    },
    DateLayout {
        format: "%d-%m-%Y",
        separator: '-',
        year_position: 2,
    },
    DateLayout {
        format: "%m-%d-%Y",
        separator: '-',
        year_position: 2,
    },
];

impl DateLayout {
    fn parse(&self, value: &str) -> Option<NaiveDate> {
        if !self.has_four_digit_year(value) {
            return None;
        }
        NaiveDate::parse_from_str(value, self.format).ok()
    }

    fn has_four_digit_year(&self, value: &str) -> bool {
        value
            .split(self.separator)
            .nth(self.year_position)
            .is_some_and(|year| year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Parses a feed date using the first layout that accepts it.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATE_LAYOUTS.iter().find_map(|layout| layout.parse(trimmed))
}

/// Parses an amount such as `$1,234.50`. Negative values are returned as-is.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(cleaned).ok()
}

/// Accepts only a plain non-negative integer literal.
pub fn parse_service_days(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

pub(crate) fn parse_opt_out(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

pub(crate) fn clean_header(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

/// Reduces an uploaded filename to a safe basename for the audit trail.
pub fn sanitize_filename(value: &str) -> String {
    let basename = value.rsplit(['/', '\\']).next().unwrap_or_default();
    let collapsed = basename.split_whitespace().collect::<Vec<_>>().join("_");
    let safe: String = collapsed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_start_matches(['.', '_']);

    if safe.is_empty() {
        "upload".to_string()
    } else {
        safe.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_dates_resolve_month_first() {
        let date = parse_date("03/04/2024").expect("slash date parses");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn dash_dates_fall_through_layouts_in_order() {
        assert_eq!(
            parse_date("2024-03-04"),
            NaiveDate::from_ymd_opt(2024, 3, 4)
        );
        // day-month-year wins over month-day-year
        assert_eq!(
            parse_date("03-04-2024"),
            NaiveDate::from_ymd_opt(2024, 4, 3)
        );
        // only month-day-year can accept a 13+ second field
        assert_eq!(
            parse_date("12-25-2024"),
            NaiveDate::from_ymd_opt(2024, 12, 25)
        );
    }

    #[test]
    fn unparseable_dates_are_absent() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("3/4/24"), None);
        assert_eq!(parse_date("02/30/2024"), None);
    }

    #[test]
    fn decimals_strip_currency_and_grouping() {
        assert_eq!(parse_decimal("$1,234.50"), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_decimal(" 500 "), Some(Decimal::new(500, 0)));
        assert_eq!(parse_decimal("-$12.5"), Some(Decimal::new(-125, 1)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("$"), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn service_days_require_integer_literals() {
        assert_eq!(parse_service_days("42"), Some(42));
        assert_eq!(parse_service_days(" 7 "), Some(7));
        assert_eq!(parse_service_days("-3"), None);
        assert_eq!(parse_service_days("4.5"), None);
        assert_eq!(parse_service_days(""), None);
    }

    #[test]
    fn headers_lose_byte_order_marks() {
        assert_eq!(clean_header("\u{feff}Talent Name "), "Talent Name");
    }

    #[test]
    fn filenames_are_reduced_to_safe_basenames() {
        assert_eq!(sanitize_filename("roster.csv"), "roster.csv");
        assert_eq!(
            sanitize_filename("../../etc/weekly roster (v2).csv"),
            "weekly_roster__v2_.csv"
        );
        assert_eq!(sanitize_filename("C:\\exports\\May.csv"), "May.csv");
        assert_eq!(sanitize_filename(".."), "upload");
    }
}
