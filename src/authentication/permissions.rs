use crate::{
    error::{Error, ErrorKind},
    jwt::SessionData,
    schema::{Id, UserRole},
};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageFavorites,
            ActionType::ManageShoppingCart,
            ActionType::ManageSubscriptions,
            ActionType::ManageOwnProfile,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageFavorites,
            ActionType::ManageShoppingCart,
            ActionType::ManageSubscriptions,
            ActionType::ManageOwnProfile,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageFavorites,
    ManageShoppingCart,
    ManageSubscriptions,
    ManageOwnProfile,

    ManageTags,
    ManageIngredients,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if &session.role != role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

/// Only the author may change a recipe.
pub fn require_author(session: &SessionData, author_id: Id) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    if session.user_id != author_id {
        return Err(ErrorKind::Forbidden.new("Only the author can change this recipe"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: Id, role: UserRole) -> SessionData {
        SessionData {
            user_id,
            username: String::from("someone"),
            role,
            token_id: String::from("jti"),
            expires_at: 0,
        }
    }

    #[test]
    fn users_cannot_manage_reference_data() {
        let user = session(1, UserRole::User);

        assert!(ActionType::CreateRecipes.authenticate(&user));
        assert!(ActionType::ManageFavorites.authenticate(&user));
        assert!(!ActionType::ManageTags.authenticate(&user));
        assert!(!ActionType::ManageIngredients.authenticate(&user));
    }

    #[test]
    fn admins_can_manage_reference_data() {
        let admin = session(1, UserRole::Admin);

        assert!(ActionType::ManageTags.authenticate(&admin));
        assert!(ActionType::ManageIngredients.authenticate(&admin));
    }

    #[test]
    fn only_author_passes() {
        assert!(require_author(&session(3, UserRole::User), 3).is_ok());

        let error = require_author(&session(4, UserRole::User), 3).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn admin_is_not_an_author_of_foreign_recipes() {
        let error = require_author(&session(1, UserRole::Admin), 3).unwrap_err();

        assert_eq!(error.code, 403);
    }
}
