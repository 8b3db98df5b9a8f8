//! Code registry - Single-use bonus codes.
//!
//! Tokens look like `ABC-123-XYZ`: three groups of three characters drawn from
//! `A-Z0-9`. Redemption flips `redeemed` with a `WHERE redeemed = 0` guard and credits
//! the redeemer in the same transaction, so a token pays out at most once no matter
//! how many requests race for it.

use crate::{
    core::ledger,
    entities::{Code, UserId, code},
    errors::{Error, Result},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::collections::HashSet;

/// Characters a token is drawn from
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GROUP_LEN: usize = 3;
const GROUPS: usize = 3;
/// Length of a formatted token including separators
pub const CODE_LEN: usize = GROUP_LEN * GROUPS + GROUPS - 1;
/// Draws attempted for one code before giving up
pub const MAX_DRAWS_PER_CODE: usize = 32;

/// A successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    /// The code after being marked redeemed
    pub code: code::Model,
    /// Redeemer's balance after the credit
    pub balance: i64,
}

/// Codes split by state for the admin panel.
#[derive(Debug, Clone, Default)]
pub struct CodeOverview {
    /// Unused codes, newest first
    pub active: Vec<code::Model>,
    /// Used codes, most recently redeemed first
    pub redeemed: Vec<code::Model>,
}

/// Draws one formatted token.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut token = String::with_capacity(CODE_LEN);
    for group in 0..GROUPS {
        if group > 0 {
            token.push('-');
        }
        for _ in 0..GROUP_LEN {
            let index = rng.gen_range(0..CODE_ALPHABET.len());
            token.push(char::from(CODE_ALPHABET[index]));
        }
    }
    token
}

/// Upper-cases, strips whitespace and checks the `XXX-XXX-XXX` shape.
///
/// The undashed nine-character form is accepted and reformatted.
pub fn normalize_code(raw: &str) -> Result<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let is_token_char = |c: char| c.is_ascii_uppercase() || c.is_ascii_digit();

    let undashed =
        compact.is_ascii() && compact.len() == GROUP_LEN * GROUPS && !compact.contains('-');
    let groups: Vec<&str> = if undashed {
        (0..GROUPS)
            .map(|i| &compact[i * GROUP_LEN..(i + 1) * GROUP_LEN])
            .collect()
    } else {
        compact.split('-').collect()
    };

    let well_formed = groups.len() == GROUPS
        && groups
            .iter()
            .all(|g| g.len() == GROUP_LEN && g.chars().all(is_token_char));
    if !well_formed {
        return Err(Error::InvalidInput {
            message: "Invalid code format. Use XXX-XXX-XXX format.".to_string(),
        });
    }
    Ok(groups.join("-"))
}

/// Creates `count` fresh codes worth `credits` each.
///
/// The whole batch is inserted in one transaction; if any code cannot find a free
/// token the batch is discarded and [`Error::RegistryExhausted`] is returned.
pub async fn generate_batch(
    db: &DatabaseConnection,
    created_by: UserId,
    count: usize,
    credits: i64,
    max_batch: usize,
) -> Result<Vec<code::Model>> {
    let mut rng = StdRng::from_entropy();
    generate_batch_with(db, created_by, count, credits, max_batch, &mut rng).await
}

/// [`generate_batch`] with a caller-supplied random source.
#[allow(clippy::cast_precision_loss)]
pub async fn generate_batch_with<R>(
    db: &DatabaseConnection,
    created_by: UserId,
    count: usize,
    credits: i64,
    max_batch: usize,
    rng: &mut R,
) -> Result<Vec<code::Model>>
where
    R: Rng + Send,
{
    if count == 0 || count > max_batch {
        return Err(Error::InvalidInput {
            message: format!("Code count must be between 1 and {max_batch}."),
        });
    }
    if credits <= 0 {
        return Err(Error::InvalidAmount {
            amount: credits as f64,
        });
    }

    let txn = db.begin().await?;
    let mut taken = HashSet::with_capacity(count);
    let mut generated = Vec::with_capacity(count);
    let now = chrono::Utc::now();

    for _ in 0..count {
        let token = draw_unused(&txn, &taken, rng).await?;
        taken.insert(token.clone());

        let fresh = code::ActiveModel {
            token: Set(token),
            credits: Set(credits),
            created_by: Set(created_by),
            created_at: Set(now),
            redeemed: Set(false),
            redeemed_by: Set(None),
            redeemed_at: Set(None),
        };
        generated.push(fresh.insert(&txn).await?);
    }
    txn.commit().await?;

    tracing::info!(created_by, count, credits, "Generated bonus codes");
    Ok(generated)
}

async fn draw_unused<C, R>(db: &C, taken: &HashSet<String>, rng: &mut R) -> Result<String>
where
    C: ConnectionTrait,
    R: Rng + Send,
{
    for _ in 0..MAX_DRAWS_PER_CODE {
        let candidate = random_code(rng);
        if taken.contains(&candidate) {
            continue;
        }
        if Code::find_by_id(candidate.clone()).one(db).await?.is_none() {
            return Ok(candidate);
        }
    }
    tracing::warn!("No free code found after {MAX_DRAWS_PER_CODE} draws");
    Err(Error::RegistryExhausted {
        attempts: MAX_DRAWS_PER_CODE,
    })
}

/// Redeems `raw` for `user_id`, crediting the code's value exactly once.
pub async fn redeem(db: &DatabaseConnection, raw: &str, user_id: UserId) -> Result<Redemption> {
    let token = normalize_code(raw)?;

    let txn = db.begin().await?;
    let claimed = Code::update_many()
        .col_expr(code::Column::Redeemed, Expr::value(true))
        .col_expr(code::Column::RedeemedBy, Expr::value(Some(user_id)))
        .col_expr(
            code::Column::RedeemedAt,
            Expr::value(Some(chrono::Utc::now())),
        )
        .filter(code::Column::Token.eq(token.as_str()))
        .filter(code::Column::Redeemed.eq(false))
        .exec(&txn)
        .await?;

    let stored = Code::find_by_id(token.clone()).one(&txn).await?;
    let code = match (claimed.rows_affected, stored) {
        (_, None) => return Err(Error::CodeNotFound { code: token }),
        (0, Some(_)) => return Err(Error::AlreadyRedeemed { code: token }),
        (_, Some(code)) => code,
    };

    let balance = ledger::credit(&txn, user_id, code.credits).await?;
    txn.commit().await?;

    tracing::info!(code = %code.token, user_id, credits = code.credits, "Code redeemed");
    Ok(Redemption { code, balance })
}

/// All codes split into active and redeemed.
pub async fn overview(db: &DatabaseConnection) -> Result<CodeOverview> {
    let active = Code::find()
        .filter(code::Column::Redeemed.eq(false))
        .order_by_desc(code::Column::CreatedAt)
        .all(db)
        .await?;
    let redeemed = Code::find()
        .filter(code::Column::Redeemed.eq(true))
        .order_by_desc(code::Column::RedeemedAt)
        .all(db)
        .await?;
    Ok(CodeOverview { active, redeemed })
}

/// `(active, redeemed)` code counts.
pub async fn counts(db: &DatabaseConnection) -> Result<(u64, u64)> {
    let active = Code::find()
        .filter(code::Column::Redeemed.eq(false))
        .count(db)
        .await?;
    let redeemed = Code::find()
        .filter(code::Column::Redeemed.eq(true))
        .count(db)
        .await?;
    Ok((active, redeemed))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_random_code_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let token = random_code(&mut rng);
            assert_eq!(token.len(), CODE_LEN);
            assert_eq!(normalize_code(&token).unwrap(), token);
        }
    }

    #[test]
    fn test_normalize_code_variants() {
        assert_eq!(normalize_code(" abc-123-xyz ").unwrap(), "ABC-123-XYZ");
        assert_eq!(normalize_code("abc123xyz").unwrap(), "ABC-123-XYZ");
        assert_eq!(normalize_code("ABC - 123 - XYZ").unwrap(), "ABC-123-XYZ");
    }

    #[test]
    fn test_normalize_code_rejects_malformed() {
        for raw in ["", "ABC-123", "ABCD-123-XY", "AB!-123-XYZ", "ABC-123-XYZ-000", "ÄBC-123-XYZ"] {
            assert!(
                matches!(normalize_code(raw), Err(Error::InvalidInput { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_generate_batch_distinct_tokens() -> Result<()> {
        let db = setup_test_db().await?;
        let existing = generate_batch(&db, 1, 10, 20, 50).await?;

        let batch = generate_batch(&db, 1, 5, 50, 50).await?;
        assert_eq!(batch.len(), 5);

        let tokens: HashSet<_> = batch.iter().map(|c| c.token.clone()).collect();
        assert_eq!(tokens.len(), 5);
        for code in &batch {
            assert_eq!(code.credits, 50);
            assert!(!code.redeemed);
            assert!(existing.iter().all(|old| old.token != code.token));
        }
        assert_eq!(counts(&db).await?, (15, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_batch_bounds() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(matches!(
            generate_batch(&db, 1, 0, 10, 50).await,
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            generate_batch(&db, 1, 51, 10, 50).await,
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            generate_batch(&db, 1, 3, 0, 50).await,
            Err(Error::InvalidAmount { .. })
        ));
        assert_eq!(counts(&db).await?, (0, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_registry_discards_batch() -> Result<()> {
        let db = setup_test_db().await?;
        // A constant random source yields the same token on every draw
        let mut rng = StepRng::new(0, 0);

        let result = generate_batch_with(&db, 1, 2, 10, 50, &mut rng).await;
        assert!(matches!(
            result,
            Err(Error::RegistryExhausted {
                attempts: MAX_DRAWS_PER_CODE
            })
        ));
        assert_eq!(counts(&db).await?, (0, 0));

        let single = generate_batch_with(&db, 1, 1, 10, 50, &mut rng).await?;
        assert_eq!(single[0].token, "AAA-AAA-AAA");
        let again = generate_batch_with(&db, 1, 1, 10, 50, &mut rng).await;
        assert!(matches!(again, Err(Error::RegistryExhausted { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_credits_once() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = generate_batch(&db, 1, 5, 50, 50).await?;
        let token = batch[0].token.to_lowercase();

        let redemption = redeem(&db, &token, 77).await?;
        assert_eq!(redemption.balance, 50);
        assert!(redemption.code.redeemed);
        assert_eq!(redemption.code.redeemed_by, Some(77));
        assert!(redemption.code.redeemed_at.is_some());

        let second = redeem(&db, &token, 77).await;
        assert!(matches!(second, Err(Error::AlreadyRedeemed { .. })));
        assert_eq!(ledger::balance(&db, 77).await?, 50);
        assert_eq!(counts(&db).await?, (4, 1));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_redeem_credits_once() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = generate_batch(&db, 1, 1, 50, 50).await?;
        let token = batch[0].token.clone();

        let (a, b) = tokio::join!(redeem(&db, &token, 5), redeem(&db, &token, 6));
        let outcomes = [a, b];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let losses = outcomes
            .iter()
            .filter(|r| matches!(r, Err(Error::AlreadyRedeemed { .. })))
            .count();
        assert_eq!((wins, losses), (1, 1));

        let total = ledger::balance(&db, 5).await? + ledger::balance(&db, 6).await?;
        assert_eq!(total, 50);
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_unknown_and_malformed() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(matches!(
            redeem(&db, "ZZZ-ZZZ-ZZZ", 1).await,
            Err(Error::CodeNotFound { .. })
        ));
        assert!(matches!(
            redeem(&db, "nope", 1).await,
            Err(Error::InvalidInput { .. })
        ));
        assert_eq!(ledger::balance(&db, 1).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_overview_partitions_codes() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = generate_batch(&db, 1, 3, 10, 50).await?;
        redeem(&db, &batch[1].token, 9).await?;

        let overview = overview(&db).await?;
        assert_eq!(overview.active.len(), 2);
        assert_eq!(overview.redeemed.len(), 1);
        assert_eq!(overview.redeemed[0].token, batch[1].token);
        Ok(())
    }
}
