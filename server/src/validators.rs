// /server/src/validators.rs
//
// Все проверки полей собраны здесь в виде чистых функций: их можно
// вызывать и тестировать независимо от персистентности.
use once_cell::sync::Lazy;
use regex::Regex;

pub const ADDRESS_HOUSE_MAX_VAL: i16 = 999;
pub const ADDRESS_ENTRANCE_MAX_VAL: i16 = 50;
pub const ADDRESS_FLOOR_MAX_VAL: i16 = 150;
pub const ADDRESS_APARTMENT_MAX_VAL: i16 = 9999;
pub const ADDRESS_INDEX_MAX_VAL: i32 = 999_999;

pub const APPEAL_TOPIC_MAX_LEN: usize = 50;
pub const APPEAL_TEXT_MAX_LEN: usize = 2048;
pub const APPEAL_RATING_MAX_VAL: i16 = 10;

pub const NEWS_TEXT_MAX_LEN: usize = 2048;
pub const NEWS_COMMENT_MAX_LEN: usize = 128;

pub const QUIZ_TITLE_MAX_LEN: usize = 50;
pub const QUIZ_ANSWER_MAX_LEN: usize = 100;

pub const USER_NAME_MAX_LEN: usize = 30;
pub const PASS_MIN_LEN: usize = 5;
pub const PASS_MAX_LEN: usize = 512;
pub const PASS_SPECIAL_CHARS: &str = "!_@#$%^&+=";

static BUILDING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,4}[А-Я]{0,1}$").unwrap());
// Первый символ не точка, всего до 50 символов до @.
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z][0-9A-Za-z\.]{0,49}@[A-Za-z]+\.[A-Za-z]+$").unwrap());
static LAT_LON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}.\d{0,6}$").unwrap());
static FIRST_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[А-ЯЁа-яё]{1,28}$").unwrap());
static LAST_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[А-ЯЁа-яё][А-ЯЁа-яё\s\-]{1,28}[А-ЯЁа-яё]$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+7\d{10}$").unwrap());

pub fn validate_building(value: &str) -> Result<(), String> {
    if BUILDING_RE.is_match(value) {
        return Ok(());
    }
    Err("Введите корректный номер корпуса вида 123 или 123А.".to_string())
}

pub fn validate_email(value: &str) -> Result<(), String> {
    if EMAIL_RE.is_match(value) {
        return Ok(());
    }
    Err("Введите корректный email (например: example@example.ru)".to_string())
}

pub fn validate_first_name(value: &str) -> Result<(), String> {
    if FIRST_NAME_RE.is_match(value) {
        return Ok(());
    }
    Err("Укажите корректное имя (например: Иван)".to_string())
}

pub fn validate_mid_name(value: Option<&str>) -> Result<(), String> {
    match value {
        None => Ok(()),
        Some(v) if FIRST_NAME_RE.is_match(v) => Ok(()),
        Some(_) => Err("Укажите корректное отчество (например: Ивановна)".to_string()),
    }
}

pub fn validate_last_name(value: &str) -> Result<(), String> {
    if LAST_NAME_RE.is_match(value) {
        return Ok(());
    }
    Err("Укажите корректную фамилию (например: Иванов или Иванова-Петрова)".to_string())
}

pub fn validate_lat(value: f64) -> Result<(), String> {
    if LAT_LON_RE.is_match(&format_coordinate(value)) {
        return Ok(());
    }
    Err("Укажите корректные координаты широты вида XX.XXXXXX.".to_string())
}

pub fn validate_lon(value: f64) -> Result<(), String> {
    if LAT_LON_RE.is_match(&format_coordinate(value)) {
        return Ok(());
    }
    Err("Укажите корректные координаты долготы вида XX.XXXXXX.".to_string())
}

// Проверка силы пароля. Исторически это была регулярка с look-ahead
// группами; regex их не поддерживает, критерии те же.
pub fn validate_password(value: &str) -> Result<(), String> {
    let len = value.chars().count();
    let strong = (PASS_MIN_LEN..=PASS_MAX_LEN).contains(&len)
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| PASS_SPECIAL_CHARS.contains(c));
    if strong {
        return Ok(());
    }
    Err(concat!(
        "Введите пароль, который удовлетворяет критериям: ",
        "- длина от 5 до 512 символов; ",
        "- включает хотя бы одну цифру (0-9); ",
        "- включает хотя бы одну прописную букву (a-z); ",
        "- включает хотя бы одну заглавную букву (A-Z); ",
        "- включает хотя бы один специальный символ (!_@#$%^&+=)."
    )
    .to_string())
}

pub fn validate_phone(value: &str) -> Result<(), String> {
    if PHONE_RE.is_match(value) {
        return Ok(());
    }
    Err("Укажите корректный номер телефона вида +79991234567.".to_string())
}

pub fn validate_max_len(value: &str, max: usize, message: &str) -> Result<(), String> {
    if value.is_empty() || value.chars().count() > max {
        return Err(message.to_string());
    }
    Ok(())
}

// Координаты валидируются по текстовому представлению, поэтому
// целые значения приводим к виду с десятичной частью.
fn format_coordinate(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn building_accepts_digits_and_single_capital() {
        assert!(validate_building("123").is_ok());
        assert!(validate_building("123А").is_ok());
        assert!(validate_building("1").is_ok());
    }

    #[test]
    fn building_rejects_garbage() {
        assert!(validate_building("12345").is_err());
        assert!(validate_building("123АБ").is_err());
        assert!(validate_building("А123").is_err());
        assert!(validate_building("").is_err());
    }

    #[test]
    fn email_accepts_plain_address() {
        assert!(validate_email("example@example.ru").is_ok());
        assert!(validate_email("ivan.petrov@mail.com").is_ok());
    }

    #[test]
    fn email_rejects_leading_dot_and_bad_domain() {
        assert!(validate_email(".ivan@mail.ru").is_err());
        assert!(validate_email("ivan@mail").is_err());
        assert!(validate_email("ivan@ma1l.ru").is_err());
        assert!(validate_email("@mail.ru").is_err());
    }

    #[test]
    fn first_name_is_cyrillic_only() {
        assert!(validate_first_name("Иван").is_ok());
        assert!(validate_first_name("Ёжик").is_ok());
        assert!(validate_first_name("Ivan").is_err());
        assert!(validate_first_name("").is_err());
    }

    #[test]
    fn mid_name_is_optional() {
        assert!(validate_mid_name(None).is_ok());
        assert!(validate_mid_name(Some("Ивановна")).is_ok());
        assert!(validate_mid_name(Some("Ivanovna")).is_err());
    }

    #[test]
    fn last_name_permits_composite_surnames() {
        assert!(validate_last_name("Иванов").is_ok());
        assert!(validate_last_name("Иванова-Петрова").is_ok());
        assert!(validate_last_name("-Иванов").is_err());
        assert!(validate_last_name("Иванов-").is_err());
        assert!(validate_last_name("Ив").is_err());
    }

    #[test]
    fn coordinates_follow_decimal_degree_shape() {
        assert!(validate_lat(55.7558).is_ok());
        assert!(validate_lon(37.6176).is_ok());
        assert!(validate_lat(55.0).is_ok());
        assert!(validate_lat(5.7558).is_err());
        assert!(validate_lon(-37.6176).is_err());
    }

    #[test]
    fn password_requires_all_character_classes() {
        assert!(validate_password("aB1!x").is_ok());
        assert!(validate_password("ab1!x").is_err()); // нет заглавной
        assert!(validate_password("AB1!X").is_err()); // нет строчной
        assert!(validate_password("aBc!x").is_err()); // нет цифры
        assert!(validate_password("aBc1x").is_err()); // нет спецсимвола
        assert!(validate_password("aB1!").is_err()); // короче 5
    }

    #[test]
    fn phone_is_russian_mobile_format() {
        assert!(validate_phone("+79991234567").is_ok());
        assert!(validate_phone("89991234567").is_err());
        assert!(validate_phone("+7999123456").is_err());
        assert!(validate_phone("+799912345678").is_err());
    }

    #[test]
    fn max_len_rejects_empty_and_overlong() {
        assert!(validate_max_len("тема", APPEAL_TOPIC_MAX_LEN, "err").is_ok());
        assert!(validate_max_len("", APPEAL_TOPIC_MAX_LEN, "err").is_err());
        let long = "а".repeat(APPEAL_TOPIC_MAX_LEN + 1);
        assert!(validate_max_len(&long, APPEAL_TOPIC_MAX_LEN, "err").is_err());
    }
}
