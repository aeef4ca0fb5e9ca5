use api_types::{
    auth::{LoginRequest, LoginResponse},
    user::User,
};

use super::decode_one;
use crate::{error::Result, http::Client};

/// Credential endpoints. Persisting the result is the caller's job.
pub struct Auth<'a> {
    client: &'a Client,
}

impl Client {
    pub fn auth(&self) -> Auth<'_> {
        Auth { client: self }
    }
}

impl Auth<'_> {
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let payload = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let envelope = self.client.post("auth/login", &payload).await?;
        decode_one("login", envelope)
    }

    /// The user behind the persisted token; used to re-validate on start-up.
    pub async fn me(&self) -> Result<User> {
        let envelope = self.client.get("auth/me", &[]).await?;
        decode_one("user", envelope)
    }
}
