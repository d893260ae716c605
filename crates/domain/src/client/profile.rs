//! Value objects describing a client.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Personal details of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub birthday: Option<NaiveDate>,
    pub sex: Option<String>,
}

impl Profile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Age in whole years on `today`, if the birthday is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.birthday.and_then(|birthday| today.years_since(birthday))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub main_phone: Option<String>,
    pub main_email: Option<String>,
    #[serde(default)]
    pub all_phones: BTreeSet<String>,
    #[serde(default)]
    pub all_emails: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub zip_code: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub complement: Option<String>,
    pub note: Option<String>,
}
