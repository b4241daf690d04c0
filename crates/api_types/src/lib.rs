//! Request and response bodies of the Dinerito REST backend.
//!
//! Field names follow the backend exactly; translation into client-side
//! domain types happens in the `store` crate.
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de};

pub use money::{Money, ParseMoneyError};

mod money;

/// Reads `YYYY-MM-DD`, tolerating a trailing time component such as
/// `2024-12-01T00:00:00.000000Z` or `2024-12-01 10:30:00`.
pub fn deserialize_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(de::Error::custom)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
}

pub mod user {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct User {
        pub id: i64,
        pub email: String,
        pub name: String,
    }

    /// Body of `PUT /user/username`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct UsernameUpdate {
        pub name: String,
    }

    /// Only the name is echoed back by `PUT /user/username`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct UsernameUpdated {
        pub user: UsernameView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UsernameView {
        pub name: String,
    }
}

pub mod auth {
    use super::*;
    use crate::user::User;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Login {
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Register {
        pub name: String,
        pub email: String,
        pub password: String,
        /// The backend wants the confirmation even though the client only
        /// asks once; it is always equal to `password`.
        pub password_confirmation: String,
    }

    /// Response of both `POST /login` and `POST /register`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthResponse {
        pub user: User,
        pub token: String,
    }

    /// Error payload used by the backend on 4xx responses.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ErrorBody {
        #[serde(default)]
        pub message: Option<String>,
        #[serde(default)]
        pub error: Option<String>,
    }

    impl ErrorBody {
        pub fn into_message(self) -> Option<String> {
            self.message.or(self.error).filter(|m| !m.trim().is_empty())
        }
    }
}

pub mod category {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Category {
        pub id: i64,
        pub name: String,
        pub user_id: i64,
    }

    /// Body of `POST /categories` and `PUT /categories/{id}`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryName {
        pub name: String,
    }
}

pub mod movement {
    use super::*;
    use crate::category::Category;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum MovementType {
        Income,
        Expense,
    }

    /// The backend either embeds the whole category or just its name.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum CategoryRef {
        Record(Category),
        Name(String),
    }

    impl CategoryRef {
        pub fn name(&self) -> &str {
            match self {
                Self::Record(category) => &category.name,
                Self::Name(name) => name,
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Movement {
        pub id: i64,
        #[serde(default)]
        pub user_id: Option<i64>,
        #[serde(default)]
        pub category_id: Option<i64>,
        pub title: String,
        #[serde(rename = "type")]
        pub kind: MovementType,
        pub amount: Money,
        #[serde(deserialize_with = "deserialize_date")]
        pub date: NaiveDate,
        #[serde(default)]
        pub category: Option<CategoryRef>,
    }

    /// Body of `POST /movements`.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct MovementNew {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub category_id: Option<i64>,
        pub title: String,
        #[serde(rename = "type")]
        pub kind: MovementType,
        pub amount: Money,
        pub date: NaiveDate,
    }

    /// Body of `PUT /movements/{id}`. Absent fields are left untouched by
    /// the backend, so they are never serialized.
    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct MovementUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub category_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub title: Option<String>,
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        pub kind: Option<MovementType>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub amount: Option<Money>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub date: Option<NaiveDate>,
    }

    impl MovementUpdate {
        pub fn is_empty(&self) -> bool {
            self.category_id.is_none()
                && self.title.is_none()
                && self.kind.is_none()
                && self.amount.is_none()
                && self.date.is_none()
        }
    }
}

pub mod stats {
    use super::*;
    use crate::movement::Movement;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Period {
        Daily,
        Monthly,
        Yearly,
    }

    impl Period {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Daily => "daily",
                Self::Monthly => "monthly",
                Self::Yearly => "yearly",
            }
        }
    }

    /// Response of `GET /statistics/{period}`.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct StatsResponse {
        pub income: Money,
        pub expense: Money,
        pub balance: Money,
        #[serde(default)]
        pub movements: Vec<Movement>,
    }
}
