use uuid::Uuid;

/// Client-chosen player identifier (`player_` followed by 9 base-36 chars).
pub type PlayerId = String;

/// Maximum display name length in characters.
pub const MAX_NAME_LEN: usize = 12;

const ID_SUFFIX_LEN: usize = 9;
const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a fresh random player id.
pub fn generate_player_id() -> PlayerId {
    let bits = Uuid::new_v4().as_u128();
    let mut rest = bits;
    let mut suffix = String::with_capacity(ID_SUFFIX_LEN);
    for _ in 0..ID_SUFFIX_LEN {
        suffix.push(ID_ALPHABET[(rest % 36) as usize] as char);
        rest /= 36;
    }
    format!("player_{suffix}")
}

/// Trim a requested display name and cap it at [`MAX_NAME_LEN`] characters.
/// Returns `None` for blank names.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let trimmed: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    let trimmed = trimmed.trim_end().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Default display name for the `n`th join of a session (`Player 001`).
pub fn default_name(n: u32) -> String {
    format!("Player {n:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_format() {
        let id = generate_player_id();
        let suffix = id.strip_prefix("player_").unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }

    #[test]
    fn player_ids_differ() {
        assert_ne!(generate_player_id(), generate_player_id());
    }

    #[test]
    fn sanitize_truncates_to_twelve_chars() {
        assert_eq!(
            sanitize_name("  Bartholomew the Great "),
            Some("Bartholomew".to_string())
        );
        assert_eq!(sanitize_name("Ada"), Some("Ada".to_string()));
        assert_eq!(
            sanitize_name("ééééééééééééééé").map(|n| n.chars().count()),
            Some(12)
        );
    }

    #[test]
    fn sanitize_rejects_blank() {
        assert_eq!(sanitize_name(""), None);
        assert_eq!(sanitize_name("   "), None);
        assert_eq!(sanitize_name("\n\t"), None);
    }

    #[test]
    fn default_name_zero_pads() {
        assert_eq!(default_name(1), "Player 001");
        assert_eq!(default_name(42), "Player 042");
        assert_eq!(default_name(1234), "Player 1234");
    }
}
