use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Which posts a listing covers. Unset fields do not restrict the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub group_id: Option<i64>,
    pub author_id: Option<Uuid>,
    pub followed_by: Option<Uuid>,
    pub text_contains: Option<String>,
    pub published_since: Option<DateTime<Utc>>,
}

impl PostFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn group(group_id: i64) -> Self {
        Self {
            group_id: Some(group_id),
            ..Self::default()
        }
    }

    pub fn author(author_id: Uuid) -> Self {
        Self {
            author_id: Some(author_id),
            ..Self::default()
        }
    }

    /// Posts of every author `user_id` follows.
    pub fn feed(user_id: Uuid) -> Self {
        Self {
            followed_by: Some(user_id),
            ..Self::default()
        }
    }

    pub fn search(mut self, query: Option<&str>) -> Self {
        self.text_contains = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        self
    }

    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.published_since = since;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentFilter {
    pub post_id: Option<i64>,
    pub created_since: Option<DateTime<Utc>>,
}

/// Date filter offered by the admin lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    #[default]
    Any,
    Today,
    PastSevenDays,
    ThisMonth,
    ThisYear,
}

impl DateRange {
    pub const ALL: [DateRange; 5] = [
        DateRange::Any,
        DateRange::Today,
        DateRange::PastSevenDays,
        DateRange::ThisMonth,
        DateRange::ThisYear,
    ];

    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("today") => DateRange::Today,
            Some("past_seven_days") => DateRange::PastSevenDays,
            Some("this_month") => DateRange::ThisMonth,
            Some("this_year") => DateRange::ThisYear,
            _ => DateRange::Any,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            DateRange::Any => "any",
            DateRange::Today => "today",
            DateRange::PastSevenDays => "past_seven_days",
            DateRange::ThisMonth => "this_month",
            DateRange::ThisYear => "this_year",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DateRange::Any => "Any date",
            DateRange::Today => "Today",
            DateRange::PastSevenDays => "Past 7 days",
            DateRange::ThisMonth => "This month",
            DateRange::ThisYear => "This year",
        }
    }

    /// Lower bound of the range, in UTC, relative to `now`.
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let midnight = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single();
        match self {
            DateRange::Any => None,
            DateRange::Today => midnight(now.year(), now.month(), now.day()),
            DateRange::PastSevenDays => {
                midnight(now.year(), now.month(), now.day()).map(|d| d - Duration::days(7))
            }
            DateRange::ThisMonth => midnight(now.year(), now.month(), 1),
            DateRange::ThisYear => midnight(now.year(), 1, 1),
        }
    }
}

/// Escapes LIKE wildcards so user input matches literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
