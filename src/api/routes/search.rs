use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::sync::{SearchPage, SEARCH_PAGE_SIZE};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    /// 1-based page number
    pub page: Option<usize>,
    /// `pages` (default) or `all`
    pub paging: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    Pages,
    All,
}

impl SearchParams {
    pub fn query(&self) -> Result<&str, ApiError> {
        match self.q.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => Ok(q),
            _ => Err(ApiError::BadRequest("missing search term `q`".to_string())),
        }
    }

    pub fn paging(&self) -> Result<Paging, ApiError> {
        match self.paging.as_deref() {
            None | Some("") | Some("pages") => Ok(Paging::Pages),
            Some("all") => Ok(Paging::All),
            Some(other) => Err(ApiError::BadRequest(format!("unknown paging: {}", other))),
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, ApiError> {
    let query = params.query()?;
    let paging = params.paging()?;

    let people = state.arena.search_people(query).await?;

    let page = match paging {
        Paging::All => SearchPage::all(query, people),
        Paging::Pages => {
            SearchPage::paginate(query, people, params.page.unwrap_or(1), SEARCH_PAGE_SIZE)
        }
    };
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(q: Option<&str>, paging: Option<&str>) -> SearchParams {
        SearchParams {
            q: q.map(str::to_string),
            page: None,
            paging: paging.map(str::to_string),
        }
    }

    #[test]
    fn test_query_is_required() {
        assert!(params(None, None).query().is_err());
        assert!(params(Some("   "), None).query().is_err());
        assert_eq!(params(Some(" Sam Ortiz "), None).query().unwrap(), "Sam Ortiz");
    }

    #[test]
    fn test_paging_flag() {
        assert_eq!(params(None, None).paging().unwrap(), Paging::Pages);
        assert_eq!(params(None, Some("all")).paging().unwrap(), Paging::All);
        assert!(params(None, Some("infinite")).paging().is_err());
    }
}
