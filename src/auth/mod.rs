use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// The resolved caller of an authenticated request. Session issuance
/// is out of scope; this boundary only verifies tokens minted
/// elsewhere.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Traveler,
    Organizer,
    Admin,
}

impl Role {
    fn parse(s: &str) -> Option<Role> {
        match s {
            "traveler" => Some(Role::Traveler),
            "organizer" => Some(Role::Organizer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Role::Traveler => "traveler",
            Role::Organizer => "organizer",
            Role::Admin => "admin",
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity>;
}

/// Verifies stateless `<user_id>:<role>:<hex hmac>` tokens signed with
/// the shared session secret.
pub struct HmacIdentityProvider {
    secret: String,
}

impl HmacIdentityProvider {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    fn signature(&self, user_id: &str, role: &str) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("HMAC key setup failed: {}", e)))?;
        mac.update(user_id.as_bytes());
        mac.update(b":");
        mac.update(role.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Mint a token. Used by the seed binary and tests; real session
    /// issuance lives in the identity service.
    pub fn mint(&self, user_id: Uuid, role: Role) -> Result<String> {
        let user_id = user_id.to_string();
        let signature = self.signature(&user_id, role.as_str())?;
        Ok(format!(
            "{}:{}:{}",
            user_id,
            role.as_str(),
            hex::encode(signature)
        ))
    }
}

#[async_trait]
impl IdentityProvider for HmacIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Identity> {
        let mut parts = token.splitn(3, ':');
        let (Some(user_id), Some(role), Some(signature_hex)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::Unauthorized);
        };

        let expected = hex::decode(signature_hex).map_err(|_| AppError::Unauthorized)?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("HMAC key setup failed: {}", e)))?;
        mac.update(user_id.as_bytes());
        mac.update(b":");
        mac.update(role.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| AppError::Unauthorized)?;

        Ok(Identity {
            user_id: Uuid::parse_str(user_id).map_err(|_| AppError::Unauthorized)?,
            role: Role::parse(role).ok_or(AppError::Unauthorized)?,
        })
    }
}
