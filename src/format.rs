//! Display formatting shared by the tables, search results and booking pages.

/// Converts a 24h `HH:MM` string into `h:MM AM|PM`.
///
/// Minutes are passed through untouched. Input without a parsable hour is
/// returned as is.
pub fn format_time(time: &str) -> String {
    let (hours, minutes) = time.split_once(':').unwrap_or((time, ""));
    let Ok(hour) = hours.trim().parse::<u32>() else {
        return time.to_string();
    };
    let ampm = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    format!("{display_hour}:{minutes} {ampm}")
}

/// Formats an amount as US dollars, e.g. `1234.5` → `$1,234.50`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{sign}${}.{:02}",
        group_thousands(cents / 100),
        cents % 100
    )
}

/// en-US digit grouping for whole numbers, e.g. `1024` → `1,024`.
pub fn format_count(value: i64) -> String {
    let grouped = group_thousands(value.unsigned_abs());
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, chr) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(chr);
    }
    out
}

pub fn stops_text(stops: u32) -> String {
    match stops {
        0 => "Nonstop".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{n} stops"),
    }
}

/// `"<n> <noun>"` with a trailing `s` unless `n == 1`.
pub fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}
