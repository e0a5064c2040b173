/// Longest abbreviation produced for a team.
pub const MAX_SHORT_NAME_LEN: usize = 4;

/// Deterministic uppercase abbreviation for a team name.
///
/// Multi-word names use word initials ("Royal Challengers Bengaluru" ->
/// "RCB"), single words their first three letters ("India" -> "IND").
pub fn short_name(name: &str) -> String {
    let words: Vec<String> = name
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_' || c == '.')
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();

    let abbrev: String = match words.as_slice() {
        [] => String::new(),
        [single] => single.chars().take(3).collect(),
        many => many.iter().filter_map(|w| w.chars().next()).collect(),
    };

    abbrev
        .to_uppercase()
        .chars()
        .take(MAX_SHORT_NAME_LEN)
        .collect()
}
