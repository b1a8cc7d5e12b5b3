//! Helvetica advance widths and line wrapping in millimetres.

/// Points per millimetre.
pub(crate) const PT_PER_MM: f32 = 72.0 / 25.4;

/// Advance widths for printable ASCII (32..=126), in thousandths of an em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];
const FALLBACK_WIDTH: u16 = 556;
const BOLD_WIDTH_FACTOR: f32 = 1.05;

fn char_width_units(ch: char) -> u16 {
    u32::from(ch)
        .checked_sub(32)
        .and_then(|index| usize::try_from(index).ok())
        .and_then(|index| HELVETICA_WIDTHS.get(index).copied())
        .unwrap_or(FALLBACK_WIDTH)
}

/// Rendered width of `text` at `font_size` points, in millimetres.
pub(crate) fn text_width_mm(text: &str, font_size: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(|ch| u32::from(char_width_units(ch))).sum();
    #[allow(clippy::cast_precision_loss)]
    let width = units as f32 / 1000.0 * font_size / PT_PER_MM;
    if bold {
        width * BOLD_WIDTH_FACTOR
    } else {
        width
    }
}

/// Break `text` into lines no wider than `max_width_mm`, honouring explicit
/// newlines and splitting words that cannot fit on a line of their own.
pub(crate) fn wrap_text(text: &str, max_width_mm: f32, font_size: f32, bold: bool) -> Vec<String> {
    let fits = |candidate: &str| text_width_mm(candidate, font_size, bold) <= max_width_mm;
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate =
                if current.is_empty() { word.to_string() } else { format!("{current} {word}") };
            if fits(&candidate) {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if fits(word) {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                let mut extended = current.clone();
                extended.push(ch);
                if !current.is_empty() && !fits(&extended) {
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                } else {
                    current = extended;
                }
            }
        }
        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_scale_with_font_size() {
        let small = text_width_mm("Recommendations", 9.0, false);
        let large = text_width_mm("Recommendations", 18.0, false);
        assert!((large - small * 2.0).abs() < 0.001);
        assert!(text_width_mm("WWW", 9.0, false) > text_width_mm("iii", 9.0, false));
    }

    #[test]
    fn wrapping_respects_width_and_newlines() {
        let lines = wrap_text("Notice Issued\n(Open)", 100.0, 9.0, false);
        assert_eq!(lines, vec!["Notice Issued".to_string(), "(Open)".to_string()]);

        let narrow = wrap_text("Stop all construction works immediately", 20.0, 9.0, false);
        assert!(narrow.len() > 1);
        assert!(narrow.iter().all(|line| text_width_mm(line, 9.0, false) <= 20.0));
        assert_eq!(narrow.join(" "), "Stop all construction works immediately");
    }

    #[test]
    fn overlong_words_are_split() {
        let lines = wrap_text("LR/209/11/44/90/1234567890", 10.0, 9.0, false);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "LR/209/11/44/90/1234567890");
    }

    #[test]
    fn empty_text_is_one_blank_line() {
        assert_eq!(wrap_text("", 10.0, 9.0, false), vec![String::new()]);
    }
}
