//! Rows shared by the store-backed action tests.

use sqlx::{Pool, Postgres};

use crate::{
    config::Limits,
    jwt::SessionData,
    schema::{Id, IngredientAmount, NewIngredient, NewTag, RecipeDraft, UserRole},
};

use super::{create_ingredient, create_recipe, create_tag};

pub async fn user(username: &str, pool: &Pool<Postgres>) -> SessionData {
    let (user_id,): (Id,) = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, 'Test', 'Cook', 'not-a-hash')
        RETURNING id
    ",
    )
    .bind(format!("{username}@example.com"))
    .bind(username)
    .fetch_one(pool)
    .await
    .unwrap();

    SessionData {
        user_id,
        username: username.to_string(),
        role: UserRole::User,
        token_id: format!("token-{username}"),
        expires_at: 0,
    }
}

pub async fn ingredient(name: &str, unit: &str, pool: &Pool<Postgres>) -> Id {
    let new = NewIngredient {
        name: name.to_string(),
        measurement_unit: unit.to_string(),
    };

    create_ingredient(&new, pool).await.unwrap().id
}

pub async fn tag(slug: &str, pool: &Pool<Postgres>) -> Id {
    let new = NewTag {
        name: slug.to_string(),
        slug: slug.to_string(),
    };

    create_tag(&new, pool).await.unwrap().id
}

pub fn draft(name: &str, ingredients: &[(Id, i32)], tags: &[Id]) -> RecipeDraft {
    RecipeDraft {
        name: name.to_string(),
        text: String::from("Mix and serve."),
        cooking_time: 10,
        ingredients: ingredients
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect(),
        tags: tags.to_vec(),
    }
}

pub async fn recipe(
    author: &SessionData,
    name: &str,
    ingredients: &[(Id, i32)],
    tags: &[Id],
    pool: &Pool<Postgres>,
) -> Id {
    let draft = draft(name, ingredients, tags);

    create_recipe(&draft, "recipes/test.png", &Limits::default(), author, pool)
        .await
        .unwrap()
}
