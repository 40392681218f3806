//! Fuzzy title/artist similarity used to match tracks across platforms.

/// Weight of the title in the blended score; the artist gets the rest.
const TITLE_WEIGHT: f64 = 0.7;

/// Differences up to this many seconds always count as the same recording.
const DURATION_SLACK_SECS: u32 = 10;

/// Relative duration tolerance for long tracks.
const DURATION_TOLERANCE: f64 = 0.15;

/// Lower-case and keep only letters, digits and CJK ideographs.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || is_cjk_ideograph(*c))
        .collect()
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2EBEF}'
        | '\u{30000}'..='\u{3134F}')
}

/// Levenshtein distance over chars.
///
/// Runs in O(|a|·|b|) time and keeps two rows sized by the shorter input.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut cur = vec![0; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        cur[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(lc != sc);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[short.len()]
}

/// Similarity in `[0, 1]` derived from the edit distance.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let distance = edit_distance(a, b);
    if distance >= max_len {
        return 0.0;
    }
    1.0 - distance as f64 / max_len as f64
}

/// Blend title and artist similarity of two tracks.
///
/// Zero when either title normalizes to nothing; title similarity alone when
/// either artist is missing.
pub fn score(title_a: &str, artist_a: &str, title_b: &str, artist_b: &str) -> f64 {
    let title_a = normalize(title_a);
    let title_b = normalize(title_b);
    if title_a.is_empty() || title_b.is_empty() {
        return 0.0;
    }
    let title_sim = similarity(&title_a, &title_b);

    let artist_a = normalize(artist_a);
    let artist_b = normalize(artist_b);
    if artist_a.is_empty() || artist_b.is_empty() {
        return title_sim;
    }

    let artist_sim = similarity(&artist_a, &artist_b);
    title_sim * TITLE_WEIGHT + artist_sim * (1.0 - TITLE_WEIGHT)
}

/// Whether two durations (seconds) plausibly belong to the same recording.
///
/// Unknown durations (0) never disqualify a candidate.
pub fn is_duration_close(reference: u32, candidate: u32) -> bool {
    if reference == 0 || candidate == 0 {
        return true;
    }
    let diff = reference.abs_diff(candidate);
    if diff <= DURATION_SLACK_SECS {
        return true;
    }
    let allowed = ((reference as f64 * DURATION_TOLERANCE) as u32).max(DURATION_SLACK_SECS);
    diff <= allowed
}
