//! Value formatting for the inspector list

use super::element::DataFormat;

/// Renders a value as text or as `01-AB-3F` style hex.
pub fn format_value(value: &[u8], format: DataFormat) -> String {
    match format {
        DataFormat::Text => String::from_utf8_lossy(value).into_owned(),
        DataFormat::Hex => value
            .iter()
            .map(|byte| format!("{:02X}", byte))
            .collect::<Vec<_>>()
            .join("-"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_groups_one_pair_per_byte() {
        assert_eq!(format_value(&[0x01, 0xAB, 0x3F], DataFormat::Hex), "01-AB-3F");
        assert_eq!(format_value(&[0x00], DataFormat::Hex), "00");
        assert_eq!(format_value(&[], DataFormat::Hex), "");

        let long: Vec<u8> = (0..=255).collect();
        let formatted = format_value(&long, DataFormat::Hex);
        assert_eq!(formatted.split('-').count(), long.len());
        assert!(formatted.split('-').all(|pair| pair.len() == 2));
    }

    #[test]
    fn text_is_lossy_utf8() {
        assert_eq!(format_value(b"Bluefruit", DataFormat::Text), "Bluefruit");
        assert_eq!(format_value(&[0x68, 0x69, 0xFF], DataFormat::Text), "hi\u{FFFD}");
    }
}
