use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};

use anyhow::{Result, anyhow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    All,
    None,
    /// Zero-based, ascending, without duplicates.
    Indices(Vec<usize>),
}

pub(crate) fn prompt_app_selection(count: usize) -> Result<Selection> {
    let mut stderr = io::stderr().lock();
    write!(
        stderr,
        "Select apps to install (e.g. 1,3-5 / all / none) [default: all]: "
    )?;
    stderr.flush()?;

    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        return Ok(Selection::None);
    }
    parse_selection(&input, count)
}

pub(crate) fn parse_selection(input: &str, count: usize) -> Result<Selection> {
    if count == 0 {
        return Ok(Selection::None);
    }

    let s = input.trim().to_ascii_lowercase();
    match s.as_str() {
        "" | "all" | "*" => return Ok(Selection::All),
        "none" | "no" | "n" | "q" | "quit" => return Ok(Selection::None),
        _ => {}
    }

    let mut picked = BTreeSet::new();
    for token in s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let (start, end) = match token.split_once('-') {
            Some((a, b)) => (parse_index(a, token, count)?, parse_index(b, token, count)?),
            None => {
                let n = parse_index(token, token, count)?;
                (n, n)
            }
        };
        if start > end {
            return Err(anyhow!("invalid range (start > end): {token}"));
        }
        picked.extend(start - 1..end);
    }

    if picked.is_empty() {
        return Err(anyhow!("nothing selected (use 'all' or 'none')"));
    }
    Ok(Selection::Indices(picked.into_iter().collect()))
}

/// Parses a 1-based position and checks it against `count`.
fn parse_index(s: &str, token: &str, count: usize) -> Result<usize> {
    let n = s
        .trim()
        .parse::<usize>()
        .map_err(|_| anyhow!("invalid selection: {token}"))?;
    if n == 0 || n > count {
        return Err(anyhow!("selection out of range 1..={count}: {token}"));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_keywords() {
        assert_eq!(parse_selection("  ", 3).unwrap(), Selection::All);
        assert_eq!(parse_selection("ALL", 3).unwrap(), Selection::All);
        assert_eq!(parse_selection("quit", 3).unwrap(), Selection::None);
        assert_eq!(parse_selection("1", 0).unwrap(), Selection::None);
    }

    #[test]
    fn numbers_and_ranges_are_merged() {
        assert_eq!(
            parse_selection("3-4, 1 4", 5).unwrap(),
            Selection::Indices(vec![0, 2, 3])
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_selection("0", 2).is_err());
        assert!(parse_selection("1-3", 2).is_err());
        assert!(parse_selection("2-1", 2).is_err());
        assert!(parse_selection("x", 2).is_err());
    }
}
