use dimlabel_config::MeasurementMode;

/// 常用施工尺寸，比最近整数更接近时优先采用。顺序决定并列时的取舍。
pub const PALETTE: [f64; 12] = [
    10.50, 10.06, 3.05, 4.57, 6.10, 15.24, 30.18, 30.48, 36.58, 18.29, 9.14, 7.62,
];

/// 测量值及其显示文字。
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionValue {
    pub value: f64,
    pub rendered: String,
}

impl DimensionValue {
    pub fn render(value: f64, mode: MeasurementMode) -> Self {
        let rendered = match mode {
            MeasurementMode::Plain => format_dim(value),
            MeasurementMode::Palette => round_dim_leader(value),
        };
        Self { value, rendered }
    }
}

/// 最多两位小数，去除末尾零（`3.5`、`4`）。
pub fn format_dim(value: f64) -> String {
    let mut rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        // 避免输出 "-0"
        rounded = 0.0;
    }
    let text = format!("{rounded:.2}");
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// 取最近整数（四舍五入远离零），若调色板中有更近的值则采用之；固定两位小数。
///
/// 比较使用严格小于，距离相同时保留先得到的候选。
pub fn round_dim_leader(value: f64) -> String {
    format!("{:.2}", snap_to_palette(value))
}

fn snap_to_palette(value: f64) -> f64 {
    let mut best = value.round();
    let mut best_diff = (value - best).abs();
    for candidate in PALETTE {
        let diff = (value - candidate).abs();
        if diff < best_diff {
            best = candidate;
            best_diff = diff;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_dim_trims_trailing_zeros() {
        assert_eq!(format_dim(4.0), "4");
        assert_eq!(format_dim(3.5), "3.5");
        assert_eq!(format_dim(3.14159), "3.14");
        assert_eq!(format_dim(100.0), "100");
        assert_eq!(format_dim(12.3), "12.3");
        assert_eq!(format_dim(-0.001), "0");
        assert_eq!(format_dim(-2.25), "-2.25");
    }

    #[test]
    fn palette_values_are_fixed_points() {
        for value in PALETTE {
            assert_eq!(round_dim_leader(value), format!("{value:.2}"));
        }
        assert_eq!(round_dim_leader(10.50), "10.50");
    }

    #[test]
    fn closer_palette_value_beats_integer() {
        // 10 相差 0.3，10.06 相差 0.24，10.50 相差 0.2
        assert_eq!(round_dim_leader(10.3), "10.50");
        assert_eq!(round_dim_leader(3.1), "3.05");
        assert_eq!(round_dim_leader(30.3), "30.18");
        assert_eq!(round_dim_leader(30.4), "30.48");
    }

    #[test]
    fn integer_wins_when_closer_or_exact() {
        assert_eq!(round_dim_leader(5.0), "5.00");
        assert_eq!(round_dim_leader(12.3), "12.00");
        assert_eq!(round_dim_leader(0.2), "0.00");
        assert_eq!(round_dim_leader(99.6), "100.00");
    }

    #[test]
    fn integer_rounding_is_half_away_from_zero() {
        assert_eq!(round_dim_leader(2.5), "3.00");
        assert_eq!(round_dim_leader(-2.5), "-3.00");
    }

    #[test]
    fn ties_keep_the_earlier_candidate() {
        // 10.28 距离 10.06 与 10.50 均为 0.22，先出现的 10.50 保留
        let value = (10.50 + 10.06) / 2.0;
        let left = (value - 10.50_f64).abs();
        let right = (value - 10.06_f64).abs();
        let expected = if right < left { "10.06" } else { "10.50" };
        assert_eq!(round_dim_leader(value), expected);
    }

    #[test]
    fn rendering_mode_selects_formatter() {
        let plain = DimensionValue::render(12.3, MeasurementMode::Plain);
        assert_eq!(plain.rendered, "12.3");
        let palette = DimensionValue::render(12.3, MeasurementMode::Palette);
        assert_eq!(palette.rendered, "12.00");
        assert!((palette.value - 12.3).abs() < f64::EPSILON);
    }
}
