use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline status, in funnel order. A record's status and its date fields
/// are independently editable and may disagree; analytics derive stage
/// membership from both signals rather than trusting either alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Applied,
    PhoneScreen,
    Technical,
    FinalRound,
    Offer,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Applied,
        Status::PhoneScreen,
        Status::Technical,
        Status::FinalRound,
        Status::Offer,
        Status::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Applied => "applied",
            Status::PhoneScreen => "phone_screen",
            Status::Technical => "technical",
            Status::FinalRound => "final_round",
            Status::Offer => "offer",
            Status::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Applied => "Applied",
            Status::PhoneScreen => "Phone Screen",
            Status::Technical => "Technical",
            Status::FinalRound => "Final Round",
            Status::Offer => "Offer",
            Status::Rejected => "Rejected",
        }
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applied" => Ok(Status::Applied),
            "phone_screen" => Ok(Status::PhoneScreen),
            "technical" => Ok(Status::Technical),
            "final_round" => Ok(Status::FinalRound),
            "offer" => Ok(Status::Offer),
            "rejected" => Ok(Status::Rejected),
            other => Err(anyhow::anyhow!(
                "Unknown status '{}' (expected one of: applied, phone_screen, technical, final_round, offer, rejected)",
                other
            )),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

/// A single job application, owned by exactly one user. All dates are
/// date-only (no time-of-day), so week bucketing and comparisons can never
/// shift across a midnight boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub user_id: i64,
    pub company: String,
    pub position: String,
    /// None is treated as `applied` wherever a concrete status is needed.
    pub status: Option<Status>,
    /// Required at creation; modeled optional so analytics stay total over
    /// rows that predate the constraint.
    pub applied_date: Option<NaiveDate>,
    pub response_date: Option<NaiveDate>,
    pub first_interview_date: Option<NaiveDate>,
    pub offer_date: Option<NaiveDate>,
    pub rejection_date: Option<NaiveDate>,
    pub link: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Application {
    pub fn status_or_default(&self) -> Status {
        self.status.unwrap_or(Status::Applied)
    }
}
