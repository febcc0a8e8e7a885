//! Askama template filters for printed reports

/// Arabic-Indic digits for numbers shown in RTL documents.
///
/// Usage in templates:
/// ```html
/// <td>{{ row.page|arabic_digits }}</td>
/// ```
#[askama::filter_fn]
pub fn arabic_digits(value: impl std::fmt::Display, _: &dyn askama::Values) -> askama::Result<String> {
    Ok(to_arabic_digits(&value.to_string()))
}

pub fn to_arabic_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_u32(0x0660 + d).unwrap_or(c),
            None => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_arabic_digits() {
        assert_eq!(to_arabic_digits("604"), "٦٠٤");
        assert_eq!(to_arabic_digits("75.5%"), "٧٥.٥%");
        assert_eq!(to_arabic_digits("-"), "-");
    }
}
