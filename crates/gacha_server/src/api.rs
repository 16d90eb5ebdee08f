//! Request and response bodies.

use serde::{Deserialize, Serialize};

use gacha_economy::{DrawParams, DrawResult, DrawnCharacter, OwnedCharacter};

/// Header carrying the credential.
pub const TOKEN_HEADER: &str = "x-token";

/// `POST /gacha/draw`
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct DrawRequestBody {
    /// Gacha to draw from.
    pub gacha_id: i64,
    /// Number of draws.
    pub times: i64,
}

impl From<DrawRequestBody> for DrawParams {
    fn from(body: DrawRequestBody) -> Self {
        Self {
            gacha_id: body.gacha_id,
            times: body.times,
        }
    }
}

/// One drawn character.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterBody {
    /// Catalog entry id.
    #[serde(rename = "characterID")]
    pub character_id: String,
    /// Display name.
    pub name: String,
}

impl From<DrawnCharacter> for CharacterBody {
    fn from(c: DrawnCharacter) -> Self {
        Self {
            character_id: c.character_id,
            name: c.name,
        }
    }
}

/// Draw results in draw order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResponse {
    /// Exactly `times` entries.
    pub results: Vec<CharacterBody>,
}

impl From<DrawResult> for DrawResponse {
    fn from(result: DrawResult) -> Self {
        Self {
            results: result.results.into_iter().map(Into::into).collect(),
        }
    }
}

/// One owned character.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedCharacterBody {
    /// Ownership record id.
    #[serde(rename = "userCharacterID")]
    pub user_character_id: String,
    /// Catalog entry id.
    #[serde(rename = "characterID")]
    pub character_id: String,
    /// Display name.
    pub name: String,
}

impl From<OwnedCharacter> for OwnedCharacterBody {
    fn from(c: OwnedCharacter) -> Self {
        Self {
            user_character_id: c.ownership_id.to_string(),
            character_id: c.character_id,
            name: c.name,
        }
    }
}

/// `GET /character/list`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterListResponse {
    /// Owned characters, oldest first.
    pub characters: Vec<OwnedCharacterBody>,
}

/// `GET /user/balance`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Spendable currency.
    pub balance: u64,
}

/// Failure envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code, equal to the HTTP status.
    pub code: u16,
    /// Human-readable reason.
    pub message: String,
}
