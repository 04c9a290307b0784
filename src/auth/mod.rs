//! Credential, token and cookie primitives shared by every sign-in path.

pub mod cookie;
pub mod password;
pub mod secret;
pub mod token;

pub use cookie::{
    ACCESS_TOKEN_COOKIE_NAME, CookieError, build_cookie, clear_cookie, token_from_cookie_header,
};
pub use password::{CredentialHasher, PasswordError, generate_random_password};
pub use secret::ServerSecret;
pub use token::{AccessTokenClaims, TokenError, TokenMinter};
