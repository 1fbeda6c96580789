use std::collections::HashSet;

use super::{
    error::{Error, ErrorKind, FieldErrors, TypeError},
    form::Form,
    schema::{Id, IngredientAmount, NewIngredient, NewTag, NewUser, RecipeDraft},
};
use crate::{
    config::Limits,
    constants::{
        EMAIL_MAX_LENGTH, INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH,
        NAME_MAX_LENGTH, PASSWORD_MAX_LENGTH, RECIPE_NAME_MAX_LENGTH, TAG_MAX_LENGTH,
        USERNAME_EXTRA_CHARACTERS, USERNAME_MAX_LENGTH,
    },
};

fn collect<T>(value: Result<T, TypeError>, errors: &mut FieldErrors) -> Option<T> {
    match value {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(e.field(), e.info());
            None
        }
    }
}

/// Parses and validates recipe form fields. Every problem is reported,
/// not only the first one.
pub fn recipe_draft(form: &Form, limits: &Limits, image_required: bool) -> Result<RecipeDraft, Error> {
    let mut errors = FieldErrors::new();

    if image_required && !form.has_file("image") {
        errors.push("image", "This field is required");
    }

    let name = collect(form.get_str("name"), &mut errors);
    let text = collect(form.get_str("text"), &mut errors);
    let cooking_time = collect(form.get_number::<i32>("cooking_time"), &mut errors);
    let ingredients = collect(
        form.get_json::<Vec<IngredientAmount>>("ingredients"),
        &mut errors,
    );
    let tags = collect(form.get_json::<Vec<Id>>("tags"), &mut errors);

    if let Some(name) = &name {
        check_text("name", name, RECIPE_NAME_MAX_LENGTH, &mut errors);
    }
    if let Some(text) = &text {
        check_text("text", text, usize::MAX, &mut errors);
    }
    if let Some(cooking_time) = cooking_time {
        check_cooking_time(cooking_time, limits, &mut errors);
    }
    if let Some(ingredients) = &ingredients {
        check_ingredients(ingredients, limits, &mut errors);
    }
    if let Some(tags) = &tags {
        check_tags(tags, &mut errors);
    }

    errors.into_result()?;

    match (name, text, cooking_time, ingredients, tags) {
        (Some(name), Some(text), Some(cooking_time), Some(ingredients), Some(tags)) => {
            Ok(RecipeDraft {
                name: name.trim().to_string(),
                text,
                cooking_time,
                ingredients,
                tags,
            })
        }
        _ => Err(ErrorKind::InvalidRequest.default()),
    }
}

pub fn validate_recipe(draft: &RecipeDraft, limits: &Limits) -> Result<(), Error> {
    let mut errors = FieldErrors::new();

    check_text("name", &draft.name, RECIPE_NAME_MAX_LENGTH, &mut errors);
    check_text("text", &draft.text, usize::MAX, &mut errors);
    check_cooking_time(draft.cooking_time, limits, &mut errors);
    check_ingredients(&draft.ingredients, limits, &mut errors);
    check_tags(&draft.tags, &mut errors);

    errors.into_result()
}

fn check_text(field: &str, value: &str, max_length: usize, errors: &mut FieldErrors) {
    let length = value.trim().chars().count();
    if length == 0 {
        errors.push(field, "This field may not be blank");
    } else if length > max_length {
        errors.push(
            field,
            format!("Ensure this field has no more than {max_length} characters"),
        );
    }
}

fn check_cooking_time(cooking_time: i32, limits: &Limits, errors: &mut FieldErrors) {
    if cooking_time < limits.min_cooking_time {
        errors.push(
            "cooking_time",
            format!("Cooking time must be at least {}", limits.min_cooking_time),
        );
    } else if cooking_time > limits.max_cooking_time {
        errors.push(
            "cooking_time",
            format!("Cooking time must be at most {}", limits.max_cooking_time),
        );
    }
}

fn check_ingredients(ingredients: &[IngredientAmount], limits: &Limits, errors: &mut FieldErrors) {
    if ingredients.is_empty() {
        errors.push("ingredients", "At least one ingredient is required");
        return;
    }

    let mut seen: HashSet<Id> = HashSet::new();
    for part in ingredients {
        if !seen.insert(part.id) {
            errors.push(
                "ingredients",
                format!("Ingredient {} is listed more than once", part.id),
            );
        }
        if part.amount < limits.min_amount {
            errors.push(
                "ingredients",
                format!(
                    "Amount of ingredient {} must be at least {}",
                    part.id, limits.min_amount
                ),
            );
        } else if part.amount > limits.max_amount {
            errors.push(
                "ingredients",
                format!(
                    "Amount of ingredient {} must be at most {}",
                    part.id, limits.max_amount
                ),
            );
        }
    }
}

fn check_tags(tags: &[Id], errors: &mut FieldErrors) {
    if tags.is_empty() {
        errors.push("tags", "At least one tag is required");
        return;
    }

    let mut seen: HashSet<Id> = HashSet::new();
    for tag in tags {
        if !seen.insert(*tag) {
            errors.push("tags", format!("Tag {tag} is listed more than once"));
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || USERNAME_EXTRA_CHARACTERS.contains(&c))
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn check_password(field: &str, password: &str, errors: &mut FieldErrors) {
    if password.is_empty() {
        errors.push(field, "This field may not be blank");
    } else if password.chars().count() > PASSWORD_MAX_LENGTH {
        errors.push(
            field,
            format!("Ensure this field has no more than {PASSWORD_MAX_LENGTH} characters"),
        );
    }
}

pub fn validate_new_user(user: &NewUser) -> Result<(), Error> {
    let mut errors = FieldErrors::new();

    if user.email.chars().count() > EMAIL_MAX_LENGTH {
        errors.push(
            "email",
            format!("Ensure this field has no more than {EMAIL_MAX_LENGTH} characters"),
        );
    } else if !is_valid_email(&user.email) {
        errors.push("email", "Enter a valid email address");
    }

    if user.username.chars().count() > USERNAME_MAX_LENGTH {
        errors.push(
            "username",
            format!("Ensure this field has no more than {USERNAME_MAX_LENGTH} characters"),
        );
    } else if !is_valid_username(&user.username) {
        errors.push(
            "username",
            "Enter a valid username: letters, digits and @/./+/-/_ only",
        );
    }

    check_text("first_name", &user.first_name, NAME_MAX_LENGTH, &mut errors);
    check_text("last_name", &user.last_name, NAME_MAX_LENGTH, &mut errors);
    check_password("password", &user.password, &mut errors);

    errors.into_result()
}

pub fn validate_tag(tag: &NewTag) -> Result<(), Error> {
    let mut errors = FieldErrors::new();

    check_text("name", &tag.name, TAG_MAX_LENGTH, &mut errors);
    if tag.slug.chars().count() > TAG_MAX_LENGTH {
        errors.push(
            "slug",
            format!("Ensure this field has no more than {TAG_MAX_LENGTH} characters"),
        );
    } else if !is_valid_slug(&tag.slug) {
        errors.push("slug", "Enter a valid slug: letters, digits, - and _ only");
    }

    errors.into_result()
}

pub fn validate_ingredient(ingredient: &NewIngredient) -> Result<(), Error> {
    let mut errors = FieldErrors::new();

    check_text(
        "name",
        &ingredient.name,
        INGREDIENT_NAME_MAX_LENGTH,
        &mut errors,
    );
    check_text(
        "measurement_unit",
        &ingredient.measurement_unit,
        MEASUREMENT_UNIT_MAX_LENGTH,
        &mut errors,
    );

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::UploadedFile;
    use serde_json::{json, Value};

    fn draft(ingredients: Vec<(Id, i32)>, tags: Vec<Id>, cooking_time: i32) -> RecipeDraft {
        RecipeDraft {
            name: String::from("Soup"),
            text: String::from("Boil everything"),
            cooking_time,
            ingredients: ingredients
                .into_iter()
                .map(|(id, amount)| IngredientAmount { id, amount })
                .collect(),
            tags,
        }
    }

    fn form(pairs: &[(&str, Value)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_owned()))
                .collect(),
        )
    }

    #[test]
    fn valid_recipe_passes() {
        let limits = Limits::default();

        assert!(validate_recipe(&draft(vec![(1, 5), (2, 1)], vec![1], 10), &limits).is_ok());
    }

    #[test]
    fn empty_ingredients_or_tags_fail() {
        let limits = Limits::default();

        let no_ingredients = validate_recipe(&draft(vec![], vec![1], 10), &limits).unwrap_err();
        let no_tags = validate_recipe(&draft(vec![(1, 5)], vec![], 10), &limits).unwrap_err();

        assert!(no_ingredients.fields.contains_key("ingredients"));
        assert!(no_tags.fields.contains_key("tags"));
    }

    #[test]
    fn repeated_references_fail() {
        let limits = Limits::default();

        let error =
            validate_recipe(&draft(vec![(1, 5), (1, 2)], vec![3, 3], 10), &limits).unwrap_err();

        assert_eq!(
            error.fields["ingredients"],
            vec!["Ingredient 1 is listed more than once"]
        );
        assert_eq!(error.fields["tags"], vec!["Tag 3 is listed more than once"]);
    }

    #[test]
    fn bounds_are_inclusive() {
        let limits = Limits {
            min_amount: 1,
            max_amount: 10,
            min_cooking_time: 1,
            max_cooking_time: 60,
        };

        assert!(validate_recipe(&draft(vec![(1, 1), (2, 10)], vec![1], 60), &limits).is_ok());
        assert!(validate_recipe(&draft(vec![(1, 0)], vec![1], 10), &limits).is_err());
        assert!(validate_recipe(&draft(vec![(1, 11)], vec![1], 10), &limits).is_err());
        assert!(validate_recipe(&draft(vec![(1, 1)], vec![1], 0), &limits).is_err());
        assert!(validate_recipe(&draft(vec![(1, 1)], vec![1], 61), &limits).is_err());
    }

    #[test]
    fn recipe_form_reports_every_field() {
        let form = form(&[
            ("name", json!("")),
            ("cooking_time", json!("0")),
            ("ingredients", json!("[]")),
        ]);

        let error = recipe_draft(&form, &Limits::default(), false).unwrap_err();

        let fields: Vec<&str> = error.fields.keys().map(String::as_str).collect();
        assert_eq!(
            fields,
            vec!["cooking_time", "ingredients", "name", "tags", "text"]
        );
    }

    #[test]
    fn new_recipe_needs_an_image() {
        let fields = [
            ("name", json!("Soup")),
            ("text", json!("Boil")),
            ("cooking_time", json!("15")),
            ("ingredients", json!(r#"[{"id": 1, "amount": 5}]"#)),
            ("tags", json!("[2]")),
        ];

        let error = recipe_draft(&form(&fields), &Limits::default(), true).unwrap_err();
        assert_eq!(error.body(), json!({ "image": ["This field is required"] }));

        let with_image = form(&fields).with_file(
            "image",
            UploadedFile {
                filename: Some(String::from("soup.png")),
                content_type: None,
                bytes: vec![0x89],
            },
        );
        assert!(recipe_draft(&with_image, &Limits::default(), true).is_ok());
    }

    #[test]
    fn recipe_form_builds_draft() {
        let form = form(&[
            ("name", json!(" Soup ")),
            ("text", json!("Boil")),
            ("cooking_time", json!("15")),
            ("ingredients", json!(r#"[{"id": 1, "amount": 5}]"#)),
            ("tags", json!("[2]")),
        ]);

        let draft = recipe_draft(&form, &Limits::default(), false).unwrap();

        assert_eq!(draft.name, "Soup");
        assert_eq!(draft.ingredients, vec![IngredientAmount { id: 1, amount: 5 }]);
        assert_eq!(draft.tags, vec![2]);
    }

    #[test]
    fn registration_rules() {
        let mut user = NewUser {
            email: String::from("cook@example.com"),
            username: String::from("cook.42"),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            password: String::from("hunter2"),
        };
        assert!(validate_new_user(&user).is_ok());

        user.email = String::from("not-an-email");
        user.username = String::from("bad name");
        user.password = String::new();
        let error = validate_new_user(&user).unwrap_err();

        assert!(error.fields.contains_key("email"));
        assert!(error.fields.contains_key("username"));
        assert!(error.fields.contains_key("password"));
        assert!(!error.fields.contains_key("first_name"));
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("a b@c.de"));
    }

    #[test]
    fn slug_and_tag_rules() {
        assert!(validate_tag(&NewTag {
            name: String::from("Breakfast"),
            slug: String::from("breakfast_1"),
        })
        .is_ok());

        let error = validate_tag(&NewTag {
            name: String::new(),
            slug: String::from("no spaces"),
        })
        .unwrap_err();
        assert!(error.fields.contains_key("name"));
        assert!(error.fields.contains_key("slug"));
    }

    #[test]
    fn ingredient_needs_unit() {
        let error = validate_ingredient(&NewIngredient {
            name: String::from("Salt"),
            measurement_unit: String::from("  "),
        })
        .unwrap_err();

        assert!(error.fields.contains_key("measurement_unit"));
    }
}
