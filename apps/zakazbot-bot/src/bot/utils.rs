/// Minimal HTML escaping for user-supplied fragments interpolated into
/// ParseMode::Html messages.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// "1234567" -> "1 234 567 so'm"
pub fn format_som(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 6);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    if negative {
        format!("-{} so'm", grouped)
    } else {
        format!("{} so'm", grouped)
    }
}

/// Parses a user-entered so'm amount. Accepts digit grouping with spaces;
/// anything non-positive or non-numeric is None.
pub fn parse_amount(text: &str) -> Option<i64> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let amount = cleaned.parse::<i64>().ok()?;
    (amount > 0).then_some(amount)
}

/// Extracts the numeric suffix of callback data like "approve_order_42".
pub fn callback_id_suffix(data: &str, prefix: &str) -> Option<i64> {
    data.strip_prefix(prefix)?.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_thousand_groups() {
        assert_eq!(format_som(0), "0 so'm");
        assert_eq!(format_som(500), "500 so'm");
        assert_eq!(format_som(10_000), "10 000 so'm");
        assert_eq!(format_som(1_234_567), "1 234 567 so'm");
    }

    #[test]
    fn parses_grouped_and_plain_amounts() {
        assert_eq!(parse_amount("10000"), Some(10_000));
        assert_eq!(parse_amount(" 10 000 "), Some(10_000));
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("-500"), None);
        assert_eq!(parse_amount("ten"), None);
        assert_eq!(parse_amount("10.5"), None);
    }

    #[test]
    fn extracts_callback_ids() {
        assert_eq!(callback_id_suffix("approve_order_42", "approve_order_"), Some(42));
        assert_eq!(callback_id_suffix("approve_order_x", "approve_order_"), None);
        assert_eq!(callback_id_suffix("reject_order_42", "approve_order_"), None);
    }

    #[test]
    fn escapes_html_fragments() {
        assert_eq!(escape_html("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }
}
