//! Display formatting shared by insights and reports. Non-finite input renders as `0`.

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// At most one fractional digit, thousands separated, trailing `.0` dropped.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let rounded = format!("{:.1}", value.abs());
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), "0"));

    let mut out = String::new();
    if value < 0.0 && rounded != "0.0" {
        out.push('-');
    }
    out.push_str(&group_thousands(whole));
    if fraction != "0" {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

pub fn format_percent(ratio: f64) -> String {
    let ratio = if ratio.is_finite() { ratio } else { 0.0 };
    format!("{}%", format_number(ratio * 100.0))
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
