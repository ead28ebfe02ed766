use std::io::{self, BufRead, Write};

/// Split a `--topics a,b` value, dropping blanks.
pub fn parse_topic_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interpret an interactive answer: empty picks every default, a list of
/// 1-based numbers picks those defaults, anything else is custom topics.
pub fn select_topics(input: &str, defaults: &[String]) -> Vec<String> {
    let input = input.trim();
    if input.is_empty() {
        return defaults.to_vec();
    }

    if input.chars().all(|c| c.is_ascii_digit() || c == ',' || c == ' ') {
        let indices: Result<Vec<usize>, _> = input.split(',').map(|part| part.trim().parse::<usize>()).collect();
        if let Ok(indices) = indices {
            let selected: Vec<String> = indices
                .into_iter()
                .filter_map(|i| i.checked_sub(1).and_then(|i| defaults.get(i)))
                .cloned()
                .collect();
            return if selected.is_empty() { defaults.to_vec() } else { selected };
        }
    }

    parse_topic_list(input)
}

pub fn prompt_topics(defaults: &[String]) -> io::Result<Vec<String>> {
    let mut out = io::stdout().lock();
    writeln!(out, "\nInteractive Topic Selection")?;
    writeln!(out, "{}", "=".repeat(30))?;
    writeln!(out, "Default topics:")?;
    for (i, topic) in defaults.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, topic)?;
    }
    writeln!(out, "\nOptions:")?;
    writeln!(out, "  - Press Enter to use all default topics")?;
    writeln!(out, "  - Enter topic numbers (comma-separated) to select specific topics")?;
    writeln!(out, "  - Enter custom topics (comma-separated)")?;
    write!(out, "\nYour choice: ")?;
    out.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(select_topics(&line, defaults))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        vec!["AI".to_string(), "ML".to_string(), "data science".to_string()]
    }

    #[test]
    fn test_enter_uses_defaults() {
        assert_eq!(select_topics("", &defaults()), defaults());
        assert_eq!(select_topics("  \n", &defaults()), defaults());
    }

    #[test]
    fn test_numbers_pick_defaults() {
        assert_eq!(
            select_topics("1, 3", &defaults()),
            vec!["AI".to_string(), "data science".to_string()]
        );
        assert_eq!(select_topics("2,9", &defaults()), vec!["ML".to_string()]);
    }

    #[test]
    fn test_out_of_range_numbers_fall_back_to_defaults() {
        assert_eq!(select_topics("0, 7", &defaults()), defaults());
    }

    #[test]
    fn test_custom_topics() {
        assert_eq!(
            select_topics("rust, , compilers ", &defaults()),
            vec!["rust".to_string(), "compilers".to_string()]
        );
        // A malformed number list is read as custom topics.
        assert_eq!(select_topics("1,,2", &defaults()), vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_parse_topic_list() {
        assert_eq!(parse_topic_list("a, b,"), vec!["a".to_string(), "b".to_string()]);
        assert!(parse_topic_list(" , ").is_empty());
    }
}
