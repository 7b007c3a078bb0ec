use once_cell::sync::Lazy;
use regex::Regex;

static DISPLAY_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{3})([0-9]+)").expect("display number pattern is valid")
});

/// 将形如 `LOC123456` 的编号格式化为 `LOC 123456`。
///
/// 仅改写开头匹配的三字母加数字部分（字母转为大写），其后的字符原样保留；不匹配时返回原值。
pub fn insert_space(identifier: &str) -> String {
    let Some(captures) = DISPLAY_NUMBER.captures(identifier) else {
        return identifier.to_string();
    };
    let letters = &captures[1];
    let digits = &captures[2];
    let rest = &identifier[captures[0].len()..];
    format!("{} {}{}", letters.to_ascii_uppercase(), digits, rest)
}
