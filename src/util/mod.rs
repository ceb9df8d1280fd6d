pub const MIN_LEVEL: f64 = 0.1;
pub const MAX_LEVEL: f64 = 1.0;

/// Clamps a requested brightness into the range accepted by `set`.
/// NaN maps to full brightness.
pub fn clamp_level(value: f64) -> f64 {
    if value.is_nan() {
        return MAX_LEVEL;
    }
    value.clamp(MIN_LEVEL, MAX_LEVEL)
}

/// Clamps a stored or queried brightness into `[0.0, 1.0]`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return MAX_LEVEL;
    }
    value.clamp(0.0, 1.0)
}

pub fn format_percent(level: f64) -> String {
    format!("{:.0}%", level * 100.0)
}

/// `HDMI-1` -> `Hdmi 1`
pub fn title_case(name: &str) -> String {
    name.replace('-', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
