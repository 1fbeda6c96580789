use std::collections::{HashMap, HashSet};

use crate::{
    authentication::permissions::{require_author, ActionType},
    config::Limits,
    error::{Error, ErrorKind, FieldErrors, QueryError},
    filters::{like_pattern, RecipeFilter},
    jwt::SessionData,
    pagination::{PageContext, Pagination},
    schema::{Id, Profile, Recipe, RecipeBundle, RecipeDraft, RecipePart, RecipeTag, Tag},
    validation::validate_recipe,
};

use super::{favorites::Relation, users::PROFILE_COLUMNS};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time";

fn push_relation_filter(
    query_builder: &mut QueryBuilder<Postgres>,
    relation: Relation,
    included: bool,
    user_id: Id,
) {
    let exists = if included { "EXISTS" } else { "NOT EXISTS" };
    query_builder
        .push(format!(
            " AND {exists} (SELECT 1 FROM {} x WHERE x.recipe_id = r.id AND x.user_id = ",
            relation.table()
        ))
        .push_bind(user_id)
        .push(")");
}

fn push_recipe_predicates(
    query_builder: &mut QueryBuilder<Postgres>,
    filter: &RecipeFilter,
    viewer_id: Option<Id>,
) {
    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.to_owned())
            .push("))");
    }
    if let Some(name) = &filter.ingredient_name {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM amount_lines a INNER JOIN ingredients i ON i.id = a.ingredient_id \
                 WHERE a.recipe_id = r.id AND i.name ILIKE ",
            )
            .push_bind(like_pattern(name))
            .push(")");
    }
    if let Some(user_id) = viewer_id {
        if let Some(included) = filter.is_favorited {
            push_relation_filter(query_builder, Relation::Favorite, included, user_id);
        }
        if let Some(included) = filter.is_in_shopping_cart {
            push_relation_filter(query_builder, Relation::ShoppingCart, included, user_id);
        }
    }
}

/// Newest first. Favorite and cart flags only filter for a signed in viewer.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    page: Pagination,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeBundle>, Error> {
    let viewer_id = viewer.map(|s| s.user_id);
    let filter = filter.clone().for_viewer(viewer_id.is_some());

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {RECIPE_COLUMNS}, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE"
    ));
    push_recipe_predicates(&mut query_builder, &filter, viewer_id);
    query_builder
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let rows: Vec<Recipe> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.offset > 0 => {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
            push_recipe_predicates(&mut query_builder, &filter, viewer_id);

            let (count,): (i64,) = query_builder
                .build_query_as()
                .fetch_one(pool)
                .await
                .map_err(QueryError::from)?;
            count
        }
        None => 0,
    };

    let bundles = load_bundles(rows, viewer_id, pool).await?;
    Ok(PageContext::from_rows(bundles, total_count, page))
}

fn group_by_recipe<T, F>(rows: Vec<T>, recipe_id: F) -> HashMap<Id, Vec<T>>
where
    F: Fn(&T) -> Id,
{
    let mut hashmap: HashMap<Id, Vec<T>> = HashMap::new();
    for row in rows {
        hashmap.entry(recipe_id(&row)).or_default().push(row);
    }
    hashmap
}

async fn relation_ids(
    relation: Relation,
    user_id: Option<Id>,
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Id>, Error> {
    let Some(user_id) = user_id else {
        return Ok(HashSet::new());
    };

    let sql = format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
        relation.table()
    );
    let rows: Vec<(Id,)> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(recipe_ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Loads authors, tags, lines and the viewer's flags for a batch of recipes,
/// keeping the input order.
pub async fn load_bundles(
    recipes: Vec<Recipe>,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeBundle>, Error> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = recipes.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<Id> = recipes.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: Vec<Profile> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = ANY($2)"
    ))
    .bind(viewer)
    .bind(&author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;
    let authors: HashMap<Id, Profile> = authors.into_iter().map(|a| (a.id, a)).collect();

    let tags: Vec<RecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;
    let mut tags = group_by_recipe(tags, |t| t.recipe_id);

    let parts: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT a.recipe_id AS recipe_id, i.id AS id, i.name AS name,
            i.measurement_unit AS measurement_unit, a.amount AS amount
        FROM amount_lines a
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE a.recipe_id = ANY($1)
        ORDER BY i.name, i.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;
    let mut parts = group_by_recipe(parts, |p| p.recipe_id);

    let favorited = relation_ids(Relation::Favorite, viewer, &recipe_ids, pool).await?;
    let in_cart = relation_ids(Relation::ShoppingCart, viewer, &recipe_ids, pool).await?;

    recipes
        .into_iter()
        .map(|recipe| -> Result<RecipeBundle, Error> {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                log::error!("Author {} of recipe {} is missing", recipe.author_id, recipe.id);
                ErrorKind::InternalServerError.default()
            })?;

            Ok(RecipeBundle {
                author,
                tags: tags
                    .remove(&recipe.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Tag::from)
                    .collect(),
                parts: parts.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                recipe,
            })
        })
        .collect()
}

async fn find_recipe(
    id: Id,
    lock: bool,
    conn: &mut PgConnection,
) -> Result<Recipe, Error> {
    let lock = if lock { " FOR UPDATE" } else { "" };
    let row: Option<Recipe> = sqlx::query_as(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1{lock}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| ErrorKind::NotFound.new("No recipe exists with specified id"))
}

pub async fn get_recipe(
    id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeBundle, Error> {
    let mut conn = pool.acquire().await.map_err(QueryError::from)?;
    let recipe = find_recipe(id, false, &mut *conn).await?;
    drop(conn);

    load_bundles(vec![recipe], viewer.map(|s| s.user_id), pool)
        .await?
        .pop()
        .ok_or_else(|| ErrorKind::NotFound.new("No recipe exists with specified id"))
}

pub async fn recipe_exists(id: Id, pool: &Pool<Postgres>) -> Result<bool, Error> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM recipes WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(exists)
}

/// The recipe, if it exists and the session may change it.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let mut conn = pool.acquire().await.map_err(QueryError::from)?;
    let recipe = find_recipe(id, false, &mut *conn).await?;
    require_author(session, recipe.author_id)?;

    Ok(recipe)
}

/// Reports every unknown ingredient and tag id.
async fn check_references(draft: &RecipeDraft, conn: &mut PgConnection) -> Result<(), Error> {
    let ingredient_ids: Vec<Id> = draft.ingredients.iter().map(|line| line.id).collect();
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(&ingredient_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    let found_ingredients: HashSet<Id> = found.into_iter().map(|(id,)| id).collect();

    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(&draft.tags)
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    let found_tags: HashSet<Id> = found.into_iter().map(|(id,)| id).collect();

    let mut errors = FieldErrors::new();
    for id in ingredient_ids.iter().filter(|id| !found_ingredients.contains(id)) {
        errors.push("ingredients", format!("Ingredient {id} doesn't exist"));
    }
    for id in draft.tags.iter().filter(|id| !found_tags.contains(id)) {
        errors.push("tags", format!("Tag {id} doesn't exist"));
    }
    errors.into_result()
}

/// Replaces all amount lines and tags of a recipe.
async fn write_lines(recipe_id: Id, draft: &RecipeDraft, conn: &mut PgConnection) -> Result<(), Error> {
    sqlx::query("DELETE FROM amount_lines WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO amount_lines (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(draft.ingredients.iter(), |mut b, line| {
        b.push_bind(recipe_id)
            .push_bind(line.id)
            .push_bind(line.amount);
    });
    query_builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(draft.tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    query_builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Writes the recipe with its lines and tags in one transaction.
pub async fn create_recipe(
    draft: &RecipeDraft,
    image: &str,
    limits: &Limits,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Id, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_recipe(draft, limits)?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    check_references(draft, &mut *tx).await?;

    let (id,): (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&draft.name)
    .bind(image)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    write_lines(id, draft, &mut *tx).await?;
    tx.commit().await.map_err(QueryError::from)?;

    log::info!("Created recipe {id} by {}", session.user_id);
    Ok(id)
}

/// Replaces the recipe's fields, lines and tags. Returns the previous image
/// when a new one was given.
pub async fn update_recipe(
    id: Id,
    draft: &RecipeDraft,
    image: Option<&str>,
    limits: &Limits,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Option<String>, Error> {
    validate_recipe(draft, limits)?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let recipe = find_recipe(id, true, &mut *tx).await?;
    require_author(session, recipe.author_id)?;
    check_references(draft, &mut *tx).await?;

    sqlx::query(
        "
        UPDATE recipes
        SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    write_lines(id, draft, &mut *tx).await?;
    tx.commit().await.map_err(QueryError::from)?;

    log::info!("Updated recipe {id}");
    Ok(image.map(|_| recipe.image))
}

/// Deletes the recipe and returns its image path.
pub async fn delete_recipe(id: Id, session: &SessionData, pool: &Pool<Postgres>) -> Result<String, Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let recipe = find_recipe(id, true, &mut *tx).await?;
    require_author(session, recipe.author_id)?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    tx.commit().await.map_err(QueryError::from)?;

    log::info!("Deleted recipe {id}");
    Ok(recipe.image)
}
