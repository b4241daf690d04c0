//! Client-side domain types and their translation to and from the wire.
use api_types::{
    Money,
    movement::{self as wire, MovementType},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use api_types::{category::Category, user::User};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Income,
    Expense,
}

impl MovementKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl From<MovementType> for MovementKind {
    fn from(value: MovementType) -> Self {
        match value {
            MovementType::Income => Self::Income,
            MovementType::Expense => Self::Expense,
        }
    }
}

impl From<MovementKind> for MovementType {
    fn from(value: MovementKind) -> Self {
        match value {
            MovementKind::Income => Self::Income,
            MovementKind::Expense => Self::Expense,
        }
    }
}

impl std::str::FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(format!("unknown movement type: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: MovementKind,
    pub label: String,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Category name as last reported by the backend. `category_id` is
    /// authoritative; see [`Movement::category_name`].
    #[serde(default)]
    pub category: Option<String>,
}

impl Movement {
    /// Current display name of the movement's category: looked up by id in
    /// `categories`, falling back to the name cached at fetch time.
    pub fn category_name<'a>(&'a self, categories: &'a [Category]) -> Option<&'a str> {
        self.category_id
            .and_then(|id| categories.iter().find(|c| c.id == id))
            .map(|c| c.name.as_str())
            .or(self.category.as_deref())
    }

    /// Wire body that would recreate this movement.
    pub fn to_wire(&self) -> wire::MovementNew {
        wire::MovementNew {
            category_id: self.category_id,
            title: self.label.clone(),
            kind: self.kind.into(),
            amount: self.amount,
            date: self.date,
        }
    }
}

impl From<wire::Movement> for Movement {
    fn from(value: wire::Movement) -> Self {
        let category_id = value.category_id.or(match &value.category {
            Some(wire::CategoryRef::Record(category)) => Some(category.id),
            _ => None,
        });
        Self {
            id: value.id,
            kind: value.kind.into(),
            label: value.title,
            amount: value.amount,
            date: value.date,
            category_id,
            category: value.category.map(|c| c.name().to_string()),
        }
    }
}

/// Input of [`MovementStore::add`](crate::MovementStore::add).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMovement {
    pub kind: MovementKind,
    pub label: String,
    pub amount: Money,
    pub date: NaiveDate,
    pub category_id: Option<i64>,
}

impl NewMovement {
    pub(crate) fn to_wire(&self) -> wire::MovementNew {
        wire::MovementNew {
            category_id: self.category_id,
            title: self.label.trim().to_string(),
            kind: self.kind.into(),
            amount: self.amount,
            date: self.date,
        }
    }
}

/// Fields to change on an existing movement. `None` means "leave as is".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MovementPatch {
    pub kind: Option<MovementKind>,
    pub label: Option<String>,
    pub amount: Option<Money>,
    pub date: Option<NaiveDate>,
    pub category_id: Option<i64>,
}

impl MovementPatch {
    pub fn is_empty(&self) -> bool {
        self.to_wire().is_empty()
    }

    pub(crate) fn to_wire(&self) -> wire::MovementUpdate {
        wire::MovementUpdate {
            category_id: self.category_id,
            title: self.label.as_ref().map(|l| l.trim().to_string()),
            kind: self.kind.map(Into::into),
            amount: self.amount,
            date: self.date,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub income: Money,
    pub expense: Money,
    pub balance: Money,
}

/// Sums incomes and expenses in one pass. Pure: the same slice always yields
/// the same totals.
pub fn compute_totals(movements: &[Movement]) -> Totals {
    let (income, expense) = movements
        .iter()
        .fold((Money::ZERO, Money::ZERO), |(income, expense), m| match m.kind {
            MovementKind::Income => (income + m.amount, expense),
            MovementKind::Expense => (income, expense + m.amount),
        });
    Totals {
        income,
        expense,
        balance: income - expense,
    }
}

/// Movements belonging to `category_id`, in collection order.
pub fn filter_by_category(movements: &[Movement], category_id: i64) -> Vec<Movement> {
    movements
        .iter()
        .filter(|m| m.category_id == Some(category_id))
        .cloned()
        .collect()
}

/// Result of one statistics query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statistics {
    pub totals: Totals,
    pub movements: Vec<Movement>,
}

impl From<api_types::stats::StatsResponse> for Statistics {
    fn from(value: api_types::stats::StatsResponse) -> Self {
        Self {
            totals: Totals {
                income: value.income,
                expense: value.expense,
                balance: value.balance,
            },
            movements: value.movements.into_iter().map(Movement::from).collect(),
        }
    }
}
