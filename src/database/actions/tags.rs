use crate::{
    error::{Error, ErrorKind, FieldErrors, QueryError},
    schema::{Id, NewTag, Tag},
    validation::validate_tag,
};

use sqlx::{Pool, Postgres};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as("SELECT id, name, slug FROM tags ORDER BY name, slug")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT id, name, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    row.ok_or_else(|| ErrorKind::NotFound.new("No tag exists with specified id"))
}

async fn check_slug_free(slug: &str, except: Option<Id>, pool: &Pool<Postgres>) -> Result<(), Error> {
    let (taken,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM tags WHERE slug = $1 AND id IS DISTINCT FROM $2)")
            .bind(slug)
            .bind(except)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    let mut errors = FieldErrors::new();
    if taken {
        errors.push("slug", "A tag with this slug already exists");
    }
    errors.into_result()
}

pub async fn create_tag(tag: &NewTag, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    validate_tag(tag)?;
    check_slug_free(&tag.slug, None, pool).await?;

    let row: Tag = sqlx::query_as("INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING id, name, slug")
        .bind(&tag.name)
        .bind(&tag.slug)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("Created tag {} ({})", row.slug, row.id);
    Ok(row)
}

pub async fn update_tag(id: Id, tag: &NewTag, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    validate_tag(tag)?;
    check_slug_free(&tag.slug, Some(id), pool).await?;

    let row: Option<Tag> =
        sqlx::query_as("UPDATE tags SET name = $1, slug = $2 WHERE id = $3 RETURNING id, name, slug")
            .bind(&tag.name)
            .bind(&tag.slug)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    row.ok_or_else(|| ErrorKind::NotFound.new("No tag exists with specified id"))
}

pub async fn delete_tag(id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ErrorKind::NotFound.new("No tag exists with specified id"));
    }
    Ok(())
}
