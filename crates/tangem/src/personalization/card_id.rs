const ALPHABET: &str = "ABCDEF0123456789";
const BODY_LENGTH: usize = 15;

/// Card id for `number` within `series`, with its check digit.
///
/// A two-character series is followed by 13 digits, a four-character one by
/// 11. `None` when the series is malformed or the number does not fit.
pub fn generate_card_id(series: &str, number: u64) -> Option<String> {
    if number == 0 || !matches!(series.len(), 2 | 4) {
        return None;
    }
    if !series.chars().all(|c| ALPHABET.contains(c)) {
        return None;
    }

    let width = BODY_LENGTH - series.len();
    let body = format!("{series}{number:0width$}");
    if body.len() != BODY_LENGTH {
        return None;
    }
    Some(format!("{body}{}", check_digit(&body)))
}

/// Luhn digit where letters count from `A` = 0
fn check_digit(body: &str) -> u32 {
    // The check position itself is the first, undoubled, digit from the end
    let sum: u32 = body
        .chars()
        .rev()
        .enumerate()
        .map(|(position, c)| {
            let digit = c.to_digit(10).unwrap_or_else(|| u32::from(c) - u32::from('A'));
            if position % 2 == 0 { digit * 2 } else { digit }
        })
        .map(|digit| if digit > 9 { digit - 9 } else { digit })
        .sum();
    (10 - sum % 10) % 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ids() {
        assert_eq!(generate_card_id("AF99", 180_055_400).as_deref(), Some("AF99001800554003"));
        assert_eq!(generate_card_id("CB79", 1).as_deref(), Some("CB79000000000019"));
        assert_eq!(generate_card_id("BB", 300_000_000_000).as_deref(), Some("BB03000000000004"));
    }

    #[test]
    fn test_two_character_series() {
        let card_id = generate_card_id("CB", 7_900_000_000_000).unwrap();
        assert_eq!(card_id, "CB79000000000001");
        assert_eq!(check_digit(&card_id[..BODY_LENGTH]), 1);
    }

    #[test]
    fn test_rejected_input() {
        assert_eq!(generate_card_id("AF99", 0), None);
        assert_eq!(generate_card_id("AF9", 1), None);
        assert_eq!(generate_card_id("af99", 1), None);
        assert_eq!(generate_card_id("AG99", 1), None);
        assert_eq!(generate_card_id("AF99", 100_000_000_000), None);
    }
}
