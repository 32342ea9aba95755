//! Token authentication: random token generation, one-time bootstrap
//! tokens, the grant cookie, and the HTTP gates composing them.

mod cookie;
mod errors;
mod gate;
mod generator;
mod one_time;

pub use cookie::{AUTH_COOKIE_NAME, get_cookie, grant_cookie};
pub use errors::AccessError;
pub use gate::{
    ChannelAccess, GrantGate, TOKEN_PARAM, TokenGate, exchange_bootstrap_token, require_token,
};
pub use generator::{RandomTokenSource, TokenGenerator};
pub use one_time::{
    DEFAULT_TOKEN_LENGTH, OneTimeTokenIssuer, StaticToken, TokenAuthenticator,
    TokenExhaustedError,
};
