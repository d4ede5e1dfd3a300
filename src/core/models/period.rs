use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    Open,
    Closed,
}

impl PeriodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(PeriodStatus::Open),
            "closed" => Some(PeriodStatus::Closed),
            _ => None,
        }
    }
}

/// Inclusive date range. Either bound may be open.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DateRange {
    #[schema(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Period {
    pub id: String,
    pub group_id: String,
    #[schema(value_type = String, example = "2024-06-01")]
    pub date_from: NaiveDate,
    #[schema(value_type = String, example = "2024-06-30")]
    pub date_to: NaiveDate,
    pub status: PeriodStatus,
    #[schema(value_type = Option<String>)]
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
}

impl Period {
    pub fn range(&self) -> DateRange {
        DateRange::between(self.date_from, self.date_to)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.range().contains(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = DateRange::between(d(2024, 1, 1), d(2024, 1, 31));
        assert!(range.contains(d(2024, 1, 1)));
        assert!(range.contains(d(2024, 1, 31)));
        assert!(!range.contains(d(2024, 2, 1)));
    }

    #[test]
    fn open_bounds_match_everything_on_that_side() {
        let range = DateRange {
            from: None,
            to: Some(d(2024, 1, 31)),
        };
        assert!(range.contains(d(1999, 12, 31)));
        assert!(!range.contains(d(2024, 2, 1)));
        assert!(DateRange::default().contains(d(2030, 5, 5)));
    }
}
