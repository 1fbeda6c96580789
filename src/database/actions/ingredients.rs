use crate::{
    error::{Error, ErrorKind, FieldErrors, QueryError},
    filters::like_pattern,
    schema::{Id, Ingredient, NewIngredient},
    validation::validate_ingredient,
};

use sqlx::{Pool, Postgres, QueryBuilder};

/// Case-insensitive substring search on the name; everything when `name` is empty.
pub async fn fetch_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let pattern = like_pattern(name.unwrap_or("").trim());

    let rows: Vec<Ingredient> = sqlx::query_as(
        "
        SELECT id, name, measurement_unit
        FROM ingredients
        WHERE name ILIKE $1
        ORDER BY name, measurement_unit
    ",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Ingredient, Error> {
    let row: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    row.ok_or_else(|| ErrorKind::NotFound.new("No ingredient exists with specified id"))
}

pub async fn create_ingredient(
    ingredient: &NewIngredient,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, Error> {
    validate_ingredient(ingredient)?;

    let row: Option<Ingredient> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        RETURNING id, name, measurement_unit
    ",
    )
    .bind(&ingredient.name)
    .bind(&ingredient.measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| ErrorKind::Conflict.new("This ingredient already exists with the same unit"))
}

/// Bulk import. Invalid entries fail the whole batch; existing
/// `(name, unit)` pairs are skipped. Returns the number of inserted rows.
pub async fn import_ingredients(
    ingredients: &[NewIngredient],
    pool: &Pool<Postgres>,
) -> Result<u64, Error> {
    let mut errors = FieldErrors::new();
    for (index, ingredient) in ingredients.iter().enumerate() {
        if let Err(e) = validate_ingredient(ingredient) {
            for (field, messages) in e.fields {
                for message in messages {
                    errors.push(&format!("{index}.{field}"), message);
                }
            }
        }
    }
    errors.into_result()?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let mut inserted = 0;

    for chunk in ingredients.chunks(65535 / 2) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        query_builder.push_values(chunk, |mut b, ingredient| {
            b.push_bind(&ingredient.name)
                .push_bind(&ingredient.measurement_unit);
        });
        query_builder.push(" ON CONFLICT DO NOTHING");

        let result = query_builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(QueryError::from)?;
        inserted += result.rows_affected();
    }

    tx.commit().await.map_err(QueryError::from)?;

    log::info!("Imported {inserted} of {} ingredients", ingredients.len());
    Ok(inserted)
}
