//! Wire representations. Every response body is built here from stored rows
//! by an explicit mapping; rows never go out as-is except tags and
//! ingredients, whose columns are their wire fields.

use serde::Serialize;

use super::schema::{
    Id, Profile, RecipeBundle, RecipePart, RecipeShort, Subscription, Tag, User,
};
use crate::media::media_url;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeIngredientView {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeShortView {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<RecipeShortView>,
    pub recipes_count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AvatarView {
    pub avatar: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TokenView {
    pub auth_token: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ShortLinkView {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ImportView {
    pub created: u64,
}

pub fn user_view(profile: &Profile, domain: &str) -> UserView {
    UserView {
        email: profile.email.to_owned(),
        id: profile.id,
        username: profile.username.to_owned(),
        first_name: profile.first_name.to_owned(),
        last_name: profile.last_name.to_owned(),
        is_subscribed: profile.is_subscribed,
        avatar: profile.avatar.as_deref().map(|path| media_url(domain, path)),
    }
}

/// The caller's own account; nobody can be subscribed to themselves.
pub fn own_user_view(user: &User, domain: &str) -> UserView {
    UserView {
        email: user.email.to_owned(),
        id: user.id,
        username: user.username.to_owned(),
        first_name: user.first_name.to_owned(),
        last_name: user.last_name.to_owned(),
        is_subscribed: false,
        avatar: user.avatar.as_deref().map(|path| media_url(domain, path)),
    }
}

pub fn recipe_ingredient_view(part: &RecipePart) -> RecipeIngredientView {
    RecipeIngredientView {
        id: part.id,
        name: part.name.to_owned(),
        measurement_unit: part.measurement_unit.to_owned(),
        amount: part.amount,
    }
}

pub fn recipe_view(bundle: &RecipeBundle, domain: &str) -> RecipeView {
    RecipeView {
        id: bundle.recipe.id,
        tags: bundle.tags.to_owned(),
        author: user_view(&bundle.author, domain),
        ingredients: bundle.parts.iter().map(recipe_ingredient_view).collect(),
        is_favorited: bundle.is_favorited,
        is_in_shopping_cart: bundle.is_in_shopping_cart,
        name: bundle.recipe.name.to_owned(),
        image: media_url(domain, &bundle.recipe.image),
        text: bundle.recipe.text.to_owned(),
        cooking_time: bundle.recipe.cooking_time,
    }
}

pub fn recipe_short_view(recipe: &RecipeShort, domain: &str) -> RecipeShortView {
    RecipeShortView {
        id: recipe.id,
        name: recipe.name.to_owned(),
        image: media_url(domain, &recipe.image),
        cooking_time: recipe.cooking_time,
    }
}

pub fn subscription_view(subscription: &Subscription, domain: &str) -> SubscriptionView {
    SubscriptionView {
        user: user_view(&subscription.author, domain),
        recipes: subscription
            .recipes
            .iter()
            .map(|recipe| recipe_short_view(recipe, domain))
            .collect(),
        recipes_count: subscription.recipes_count,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::{json, Value};

    use super::*;
    use crate::{
        config::Limits,
        form::Form,
        schema::{IngredientAmount, Recipe},
        validation::recipe_draft,
    };

    const DOMAIN: &str = "http://localhost:8000";

    fn author() -> Profile {
        Profile {
            id: 1,
            email: String::from("a@example.com"),
            username: String::from("author"),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            avatar: None,
            is_subscribed: true,
            count: 0,
        }
    }

    fn bundle() -> RecipeBundle {
        RecipeBundle {
            recipe: Recipe {
                id: 7,
                author_id: 1,
                name: String::from("Soup"),
                image: String::from("recipes/soup.png"),
                text: String::from("Boil"),
                cooking_time: 20,
                count: 1,
            },
            author: author(),
            tags: vec![Tag {
                id: 3,
                name: String::from("Lunch"),
                slug: String::from("lunch"),
            }],
            parts: vec![
                RecipePart {
                    recipe_id: 7,
                    id: 1,
                    name: String::from("Salt"),
                    measurement_unit: String::from("g"),
                    amount: 5,
                },
                RecipePart {
                    recipe_id: 7,
                    id: 4,
                    name: String::from("Water"),
                    measurement_unit: String::from("ml"),
                    amount: 500,
                },
            ],
            is_favorited: false,
            is_in_shopping_cart: true,
        }
    }

    #[test]
    fn recipe_wire_shape() {
        let value = serde_json::to_value(recipe_view(&bundle(), DOMAIN)).unwrap();

        assert_eq!(
            value,
            json!({
                "id": 7,
                "tags": [{ "id": 3, "name": "Lunch", "slug": "lunch" }],
                "author": {
                    "email": "a@example.com",
                    "id": 1,
                    "username": "author",
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "is_subscribed": true,
                    "avatar": null,
                },
                "ingredients": [
                    { "id": 1, "name": "Salt", "measurement_unit": "g", "amount": 5 },
                    { "id": 4, "name": "Water", "measurement_unit": "ml", "amount": 500 },
                ],
                "is_favorited": false,
                "is_in_shopping_cart": true,
                "name": "Soup",
                "image": "http://localhost:8000/media/recipes/soup.png",
                "text": "Boil",
                "cooking_time": 20,
            })
        );
    }

    #[test]
    fn serialized_recipe_round_trips_through_create_payload() {
        let view = serde_json::to_value(recipe_view(&bundle(), DOMAIN)).unwrap();

        let ingredients: Vec<Value> = view["ingredients"]
            .as_array()
            .unwrap()
            .iter()
            .rev()
            .map(|line| json!({ "id": line["id"], "amount": line["amount"] }))
            .collect();
        let tags: Vec<Value> = view["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tag| tag["id"].to_owned())
            .collect();

        let form = Form::from_data(
            [
                ("name", view["name"].to_owned()),
                ("text", view["text"].to_owned()),
                ("cooking_time", view["cooking_time"].to_owned()),
                ("ingredients", Value::Array(ingredients)),
                ("tags", Value::Array(tags)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        );
        let draft = recipe_draft(&form, &Limits::default(), false).unwrap();

        let original: HashSet<IngredientAmount> = bundle()
            .parts
            .iter()
            .map(|part| IngredientAmount {
                id: part.id,
                amount: part.amount,
            })
            .collect();
        let rebuilt: HashSet<IngredientAmount> = draft.ingredients.into_iter().collect();

        assert_eq!(original, rebuilt);
        assert_eq!(draft.tags, vec![3]);
    }

    #[test]
    fn subscription_flattens_user_fields() {
        let subscription = Subscription {
            author: author(),
            recipes: vec![RecipeShort {
                id: 7,
                author_id: 1,
                name: String::from("Soup"),
                image: String::from("recipes/soup.png"),
                cooking_time: 20,
            }],
            recipes_count: 4,
        };

        let value = serde_json::to_value(subscription_view(&subscription, DOMAIN)).unwrap();

        assert_eq!(value["username"], "author");
        assert_eq!(value["is_subscribed"], true);
        assert_eq!(value["recipes_count"], 4);
        assert_eq!(
            value["recipes"],
            json!([{
                "id": 7,
                "name": "Soup",
                "image": "http://localhost:8000/media/recipes/soup.png",
                "cooking_time": 20,
            }])
        );
    }

    #[test]
    fn avatar_is_exposed_as_url() {
        let mut profile = author();
        profile.avatar = Some(String::from("avatars/a.png"));

        let view = user_view(&profile, DOMAIN);

        assert_eq!(
            view.avatar.as_deref(),
            Some("http://localhost:8000/media/avatars/a.png")
        );
    }

    #[test]
    fn short_link_uses_dashed_key() {
        let value = serde_json::to_value(ShortLinkView {
            short_link: String::from("http://localhost:8000/recipes/7/"),
        })
        .unwrap();

        assert_eq!(value, json!({ "short-link": "http://localhost:8000/recipes/7/" }));
    }
}
