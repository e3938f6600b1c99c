use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Stable string key identifying a logical account ("main", "secondary").
pub type AccountId = String;

/// A logical messaging tenant with its own provider credentials.
///
/// `secret_token` is the bearer token used against the provider API. It is
/// serialized only into the durable registry snapshot; read endpoints use
/// [`AccountView`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    #[serde(with = "crate::secret")]
    pub secret_token: SecretString,
    /// Provider-assigned phone number id (`phone_number_id` in webhook metadata).
    pub external_phone_id: String,
    /// Provider-assigned business account id.
    pub external_business_id: String,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Public projection without credentials.
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            name: self.display_name.clone(),
            phone_number_id: self.external_phone_id.clone(),
            business_account_id: self.external_business_id.clone(),
            status: self.status.clone(),
        }
    }

    /// Apply the fields present in `patch`, leaving the others untouched.
    pub fn apply(&mut self, patch: AccountPatch) {
        if let Some(name) = patch.display_name {
            self.display_name = name;
        }
        if let Some(token) = patch.secret_token {
            self.secret_token = token;
        }
        if let Some(phone_id) = patch.external_phone_id {
            self.external_phone_id = phone_id;
        }
        if let Some(business_id) = patch.external_business_id {
            self.external_business_id = business_id;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}

/// Account lifecycle states. Only active accounts resolve and send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(format!("invalid account status: '{other}'")),
        }
    }
}

/// Credential-free account representation returned by list/read APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: AccountId,
    pub name: String,
    pub phone_number_id: String,
    pub business_account_id: String,
    pub status: AccountStatus,
}

/// Request body for creating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub id: AccountId,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(alias = "token", deserialize_with = "crate::secret::deserialize")]
    pub secret_token: SecretString,
    #[serde(alias = "phone_number_id")]
    pub external_phone_id: String,
    #[serde(alias = "business_account_id", default)]
    pub external_business_id: String,
    #[serde(default)]
    pub status: Option<AccountStatus>,
}

impl CreateAccountRequest {
    pub fn into_account(self) -> Account {
        let now = Utc::now();
        Account {
            id: self.id,
            display_name: self.display_name,
            secret_token: self.secret_token,
            external_phone_id: self.external_phone_id,
            external_business_id: self.external_business_id,
            status: self.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for an account. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPatch {
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default, alias = "token", deserialize_with = "crate::secret::deserialize_option")]
    pub secret_token: Option<SecretString>,
    #[serde(default, alias = "phone_number_id")]
    pub external_phone_id: Option<String>,
    #[serde(default, alias = "business_account_id")]
    pub external_business_id: Option<String>,
    #[serde(default)]
    pub status: Option<AccountStatus>,
}
