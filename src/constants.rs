pub const API_PREFIX: &str = "api";
pub const MEDIA_PREFIX: &str = "media";

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USERNAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 150;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const RECIPE_NAME_MAX_LENGTH: usize = 256;
pub const TAG_MAX_LENGTH: usize = 32;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 128;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 64;

pub const USERNAME_EXTRA_CHARACTERS: &[char] = &['.', '@', '+', '-', '_'];

pub const RECIPE_IMAGE_FOLDER: &str = "recipes";
pub const AVATAR_IMAGE_FOLDER: &str = "avatars";

pub const JSON_BODY_LIMIT: u64 = 64 * 1024;
pub const IMPORT_BODY_LIMIT: u64 = 8 * 1024 * 1024;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_HEADER: &str = "Shopping list. User -";

pub const TOKEN_SCHEMES: &[&str] = &["Token", "Bearer"];
