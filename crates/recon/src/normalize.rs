//! Text key canonicalization shared by every stage.

/// Trim, then collapse every whitespace run (newlines included) to one ASCII space.
///
/// No case folding and no character-set normalization: `H3.0×W1.5` and
/// `H3.0XW1.5` stay distinct keys.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// `normalize` with every space removed. Used for phrase and caption lookups
/// where table cells break words at arbitrary points.
pub fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_collapses() {
        assert_eq!(normalize("  조경\n  공사 \t"), "조경 공사");
        assert_eq!(normalize("H3.0×W1.5"), "H3.0×W1.5");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \r\n "), "");
    }

    #[test]
    fn idempotent() {
        let once = normalize(" a \n\n b  c ");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn case_is_preserved() {
        assert_ne!(normalize("h3.0"), normalize("H3.0"));
    }

    #[test]
    fn compact_drops_all_whitespace() {
        assert_eq!(compact("인정 수량\n제외"), "인정수량제외");
    }
}
