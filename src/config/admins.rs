//! Admin identity configuration from environment variables.
//!
//! `ADMIN_USER_IDS` holds a comma separated list of user ids that are merged into
//! the admins listed in config.toml.

use crate::entities::UserId;

/// Parses a comma separated id list, skipping blanks and logging malformed entries.
#[must_use]
pub fn parse_admin_ids(raw: &str) -> Vec<UserId> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse::<UserId>() {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Ignoring malformed admin id {part:?}: {e}");
                None
            }
        })
        .collect()
}

/// Reads admin ids from `ADMIN_USER_IDS`, returning an empty list when unset.
#[must_use]
pub fn get_admin_ids() -> Vec<UserId> {
    std::env::var("ADMIN_USER_IDS")
        .map(|raw| parse_admin_ids(&raw))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids("1, 2,3"), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_admin_ids_skips_garbage() {
        assert_eq!(parse_admin_ids(" ,abc, 42 ,"), vec![42]);
        assert!(parse_admin_ids("").is_empty());
    }
}
