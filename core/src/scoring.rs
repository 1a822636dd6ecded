//! Pure scoring primitives shared by all matching engines.

/// Weighted-sum confidence over the four match dimensions. Components
/// and the result are on the 0–100 scale; the result is rounded to two
/// decimals. Date and context default to 100 when a caller has nothing
/// better.
pub fn score(
    account_match: f64,
    amount_match: f64,
    date_match: f64,
    context_match: f64,
    weights: [f64; 4],
) -> f64 {
    let raw = account_match * weights[0]
        + amount_match * weights[1]
        + date_match * weights[2]
        + context_match * weights[3];
    round2(raw.clamp(0.0, 100.0))
}

/// Percentage difference between two amounts, relative to the larger
/// magnitude. Two zeros are identical (0%).
pub fn amount_difference_pct(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs());
    if denom < f64::EPSILON {
        return 0.0;
    }
    (a - b).abs() / denom * 100.0
}

/// Similarity on [0, 1] that decays monotonically with percentage
/// difference: 1.0 up to 1% apart, linearly down to 0.0 at 100% apart.
pub fn amount_similarity(a: f64, b: f64) -> f64 {
    let pct = amount_difference_pct(a, b);
    if pct <= 1.0 {
        1.0
    } else if pct >= 100.0 {
        0.0
    } else {
        1.0 - (pct - 1.0) / 99.0
    }
}

/// Account-name similarity on [0, 1]: character-bigram Dice coefficient
/// over lowercased alphanumeric text. Tolerant of word order and minor
/// OCR noise, which is what extracted account names actually contain.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let ba = bigrams(&a);
    let bb = bigrams(&b);
    if ba.is_empty() || bb.is_empty() {
        return 0.0;
    }
    let mut shared = 0usize;
    let mut pool = bb.clone();
    for g in &ba {
        if let Some(pos) = pool.iter().position(|h| h == g) {
            pool.swap_remove(pos);
            shared += 1;
        }
    }
    2.0 * shared as f64 / (ba.len() + bb.len()) as f64
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn bigrams(s: &str) -> Vec<[u8; 2]> {
    let bytes: Vec<u8> = s.bytes().filter(|b| *b != b' ').collect();
    bytes.windows(2).map(|w| [w[0], w[1]]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_sum_rounds_to_two_decimals() {
        let s = score(100.0, 100.0, 100.0, 100.0, [0.4, 0.4, 0.1, 0.1]);
        assert_eq!(s, 100.0);
        let s = score(80.0, 90.0, 100.0, 100.0, [0.4, 0.4, 0.1, 0.1]);
        assert_eq!(s, 88.0);
    }

    #[test]
    fn amount_similarity_is_monotone() {
        let base = 1_000.0;
        let mut prev = amount_similarity(base, base);
        for delta in [1.0, 10.0, 50.0, 200.0, 500.0, 900.0, 1_500.0] {
            let sim = amount_similarity(base, base + delta);
            assert!(sim <= prev, "similarity rose at delta {delta}");
            prev = sim;
        }
        assert_eq!(amount_similarity(100.0, 100.5), 1.0);
        assert_eq!(amount_similarity(100.0, 10_000.0), 0.0);
    }

    #[test]
    fn name_similarity_survives_case_and_punctuation() {
        assert_eq!(name_similarity("Accounts Receivable", "accounts receivable"), 1.0);
        assert!(name_similarity("Accts. Receivable", "Accounts Receivable") > 0.6);
        assert!(name_similarity("Mortgage Interest", "Security Deposits") < 0.4);
    }

    #[test]
    fn zero_amounts_are_identical() {
        assert_eq!(amount_difference_pct(0.0, 0.0), 0.0);
        assert_eq!(amount_similarity(0.0, 0.0), 1.0);
    }
}
