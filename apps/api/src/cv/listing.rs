use serde::Deserialize;

use crate::pagination::SortOrder;

/// `?q=&sort=&order=` on both the JSON list and the HTML list page.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CvListQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvSortField {
    CreatedAt,
    UpdatedAt,
    Firstname,
    Lastname,
}

impl CvSortField {
    /// Unknown fields fall back to creation time.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("updated_at") => CvSortField::UpdatedAt,
            Some("firstname") => CvSortField::Firstname,
            Some("lastname") => CvSortField::Lastname,
            _ => CvSortField::CreatedAt,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            CvSortField::CreatedAt => "created_at",
            CvSortField::UpdatedAt => "updated_at",
            CvSortField::Firstname => "firstname",
            CvSortField::Lastname => "lastname",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvListing {
    pub search: Option<String>,
    pub sort: CvSortField,
    pub order: SortOrder,
}

impl CvListing {
    pub fn from_query(query: &CvListQuery) -> Self {
        Self {
            search: query
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            sort: CvSortField::parse(query.sort.as_deref()),
            order: SortOrder::parse(query.order.as_deref()),
        }
    }

    /// `ORDER BY` clause built only from whitelisted identifiers. Ties break on id.
    pub fn order_by(&self) -> String {
        let direction = self.order.as_sql();
        format!(" ORDER BY {} {direction}, id {direction}", self.sort.column())
    }
}

/// ILIKE pattern for a substring search, with the pattern metacharacters escaped.
pub fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
