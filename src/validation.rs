use once_cell::sync::Lazy;
use regex::Regex;

pub fn is_ascii_no_spaces(username: &str) -> Result<(), String> {
    match username.chars().all(|c| c.is_ascii() && !c.is_whitespace()) {
        true => Ok(()),
        false => Err("should be an ascii string without spaces".to_string()),
    }
}

pub fn is_valid_email(string: &str) -> Result<(), String> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
        r#"(?:[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21\x23-\x5b\x5d-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")@(?:(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?|\[(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?|[a-z0-9-]*[a-z0-9]:(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21-\x5a\x53-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])+)\])"#
    ).unwrap()
    });
    match RE.is_match(string) {
        true => Ok(()),
        false => Err("invalid email".to_string()),
    }
}

/// Mobile numbers are exactly ten ASCII digits.
pub fn is_valid_mobile(string: &str) -> Result<(), String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").unwrap());
    match RE.is_match(string) {
        true => Ok(()),
        false => Err("Mobile must be 10 digits".to_string()),
    }
}

/// Returns the trimmed value, or `None` if nothing but whitespace was given.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[test]
fn test_email() {
    assert!(is_valid_email("hello@example.com").is_ok())
}

#[cfg(test)]
#[test]
fn test_mobile() {
    assert!(is_valid_mobile("9876543210").is_ok());
    assert!(is_valid_mobile("98765 43210").is_err());
    assert!(is_valid_mobile("987654321").is_err());
    assert!(is_valid_mobile("98765432100").is_err());
}
