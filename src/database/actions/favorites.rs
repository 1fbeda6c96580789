use crate::{
    error::{Error, ErrorKind, QueryError},
    schema::{CartLine, Id, RecipeShort},
};

use sqlx::{PgConnection, Pool, Postgres};

/// A per-user set of recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Favorite,
    ShoppingCart,
}

impl Relation {
    pub fn table(&self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "cart_entries",
        }
    }

    fn already_added(&self) -> &'static str {
        match self {
            Relation::Favorite => "Recipe is already in favorites",
            Relation::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn not_added(&self) -> &'static str {
        match self {
            Relation::Favorite => "Recipe is not in favorites",
            Relation::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

async fn get_recipe_short(recipe_id: Id, conn: &mut PgConnection) -> Result<RecipeShort, Error> {
    let row: Option<RecipeShort> = sqlx::query_as(
        "SELECT id, author_id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(recipe_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| ErrorKind::NotFound.new("No recipe exists with specified id"))
}

/// Adds the recipe to the user's set. Adding twice is a conflict.
pub async fn add_relation(
    relation: Relation,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let recipe = get_recipe_short(recipe_id, &mut *tx).await?;

    let sql = format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table()
    );
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ErrorKind::Conflict.new(relation.already_added()));
    }

    tx.commit().await.map_err(QueryError::from)?;
    Ok(recipe)
}

/// Removes the recipe from the user's set. Removing an absent pair is rejected.
pub async fn remove_relation(
    relation: Relation,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    get_recipe_short(recipe_id, &mut *tx).await?;

    let sql = format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    );
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ErrorKind::InvalidRequest.new(relation.not_added()));
    }

    tx.commit().await.map_err(QueryError::from)?;
    Ok(())
}

/// Every amount line of every recipe in the user's cart.
pub async fn cart_lines(user_id: Id, pool: &Pool<Postgres>) -> Result<Vec<CartLine>, Error> {
    let rows: Vec<CartLine> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, a.amount AS amount
        FROM cart_entries c
        INNER JOIN amount_lines a ON a.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}
