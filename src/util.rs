use chrono::TimeDelta;

/// 解析 Go 风格的时长字符串，例如 `1h2m3.5s`、`-150ms`、`0`。
///
/// 支持的单位：`ns`, `us` (`µs`), `ms`, `s`, `m`, `h`, `d`, `w`
pub(crate) fn parse_duration(s: &str) -> Option<TimeDelta> {
    let (negative, mut rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    if rest == "0" {
        return Some(TimeDelta::zero());
    }

    if rest.is_empty() {
        return None;
    }

    let mut total_ns = 0i128;

    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }

        let number = rest[..number_end].parse::<f64>().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "d" => 86_400e9,
            "w" => 604_800e9,
            _ => return None,
        };
        rest = &rest[unit_end..];

        let ns = (number * scale).round();
        if !ns.is_finite() || ns > i64::MAX as f64 {
            return None;
        }
        total_ns = total_ns.checked_add(ns as i128)?;
    }

    let ns = i64::try_from(total_ns).ok()?;

    Some(TimeDelta::nanoseconds(if negative { -ns } else { ns }))
}
