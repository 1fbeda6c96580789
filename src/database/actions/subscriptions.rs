use std::collections::HashMap;

use crate::{
    error::{Error, ErrorKind, QueryError},
    pagination::{PageContext, Pagination},
    schema::{Id, Profile, RecipeShort, Subscription},
};

use super::users::{get_profile, PROFILE_COLUMNS};
use sqlx::{Pool, Postgres};

/// Newest recipes of each author, at most `recipes_limit` per author, plus
/// the full count per author.
async fn author_recipes(
    author_ids: &[Id],
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<(HashMap<Id, Vec<RecipeShort>>, HashMap<Id, i64>), Error> {
    let rows: Vec<RecipeShort> = sqlx::query_as(
        "
        SELECT id, author_id, name, image, cooking_time
        FROM (
            SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, id DESC
    ",
    )
    .bind(author_ids)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let counts: Vec<(Id, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut recipes: HashMap<Id, Vec<RecipeShort>> = HashMap::new();
    for row in rows {
        recipes.entry(row.author_id).or_default().push(row);
    }

    Ok((recipes, counts.into_iter().collect()))
}

async fn with_recipes(
    authors: Vec<Profile>,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Subscription>, Error> {
    let author_ids: Vec<Id> = authors.iter().map(|a| a.id).collect();
    let (mut recipes, counts) = author_recipes(&author_ids, recipes_limit, pool).await?;

    Ok(authors
        .into_iter()
        .map(|author| Subscription {
            recipes: recipes.remove(&author.id).unwrap_or_default(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
            author,
        })
        .collect())
}

/// Starts following `author_id`. Following oneself or following twice is a conflict.
pub async fn subscribe(
    user_id: Id,
    author_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Subscription, Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(QueryError::from)?;
    if !exists {
        return Err(ErrorKind::NotFound.new("No user exists with specified id"));
    }
    if author_id == user_id {
        return Err(ErrorKind::Conflict.new("You can't subscribe to yourself"));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ErrorKind::Conflict.new("You are already subscribed to this user"));
    }
    tx.commit().await.map_err(QueryError::from)?;

    let author = get_profile(author_id, Some(user_id), pool).await?;
    with_recipes(vec![author], recipes_limit, pool)
        .await?
        .pop()
        .ok_or_else(|| ErrorKind::NotFound.new("No user exists with specified id"))
}

pub async fn unsubscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(QueryError::from)?;
    if !exists {
        return Err(ErrorKind::NotFound.new("No user exists with specified id"));
    }

    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ErrorKind::InvalidRequest.new("You are not subscribed to this user"));
    }

    tx.commit().await.map_err(QueryError::from)?;
    Ok(())
}

/// Authors followed by `user_id`, each with their newest recipes.
pub async fn fetch_subscriptions(
    user_id: Id,
    recipes_limit: Option<i64>,
    page: Pagination,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Subscription>, Error> {
    let authors: Vec<Profile> = sqlx::query_as(&format!(
        "
        SELECT {PROFILE_COLUMNS}, COUNT(*) OVER() AS count
        FROM subscriptions f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    "
    ))
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = match authors.first() {
        Some(author) => author.count,
        None if page.offset > 0 => {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
                    .map_err(QueryError::from)?;
            count
        }
        None => 0,
    };
    let subscriptions = with_recipes(authors, recipes_limit, pool).await?;
    Ok(PageContext::from_rows(subscriptions, total_count, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fixtures;

    #[sqlx::test(migrations = "./migrations")]
    async fn subscribing_twice_is_a_conflict(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;
        let author = fixtures::user("author", &pool).await;

        let subscription = subscribe(reader.user_id, author.user_id, None, &pool)
            .await
            .unwrap();
        assert_eq!(subscription.author.id, author.user_id);
        assert_eq!(subscription.recipes_count, 0);

        let again = subscribe(reader.user_id, author.user_id, None, &pool).await;
        assert_eq!(again.unwrap_err().code, 409);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn subscribing_to_yourself_is_a_conflict(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;

        let result = subscribe(reader.user_id, reader.user_id, None, &pool).await;
        assert_eq!(result.unwrap_err().code, 409);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_author_is_not_found(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;

        let result = subscribe(reader.user_id, 999, None, &pool).await;
        assert_eq!(result.unwrap_err().code, 404);

        let result = unsubscribe(reader.user_id, 999, &pool).await;
        assert_eq!(result.unwrap_err().code, 404);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unsubscribing_without_a_subscription_is_rejected(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;
        let author = fixtures::user("author", &pool).await;

        let result = unsubscribe(reader.user_id, author.user_id, &pool).await;
        assert_eq!(result.unwrap_err().code, 400);

        subscribe(reader.user_id, author.user_id, None, &pool)
            .await
            .unwrap();
        unsubscribe(reader.user_id, author.user_id, &pool)
            .await
            .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn recipes_limit_cuts_recipes_but_not_the_count(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;
        let author = fixtures::user("author", &pool).await;
        let salt = fixtures::ingredient("Salt", "g", &pool).await;
        let misc = fixtures::tag("misc", &pool).await;
        fixtures::recipe(&author, "Soup", &[(salt, 5)], &[misc], &pool).await;
        fixtures::recipe(&author, "Broth", &[(salt, 3)], &[misc], &pool).await;
        let newest = fixtures::recipe(&author, "Stew", &[(salt, 1)], &[misc], &pool).await;

        subscribe(reader.user_id, author.user_id, None, &pool)
            .await
            .unwrap();
        let page = Pagination { limit: 10, offset: 0 };
        let subscriptions = fetch_subscriptions(reader.user_id, Some(1), page, &pool)
            .await
            .unwrap();

        assert_eq!(subscriptions.count, 1);
        let subscription = &subscriptions.results[0];
        assert!(subscription.author.is_subscribed);
        assert_eq!(subscription.recipes_count, 3);
        let ids: Vec<Id> = subscription.recipes.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newest]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn page_past_the_end_keeps_the_total(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;
        let author = fixtures::user("author", &pool).await;
        subscribe(reader.user_id, author.user_id, None, &pool)
            .await
            .unwrap();

        let page = Pagination { limit: 10, offset: 10 };
        let subscriptions = fetch_subscriptions(reader.user_id, None, page, &pool)
            .await
            .unwrap();

        assert!(subscriptions.results.is_empty());
        assert_eq!(subscriptions.count, 1);
    }
}
