//! Arena API client.
//!
//! Two paginated collections keyed by `identityPersonId`:
//! - `/wrestlers/` returns every wrestler-appearance of a person with its
//!   events, teams, divisions, weight classes and bracket placements
//! - `/bouts/` returns every bout of a person with both wrestlers, their
//!   teams and divisions, the event, weight class and round name
//!
//! Plus a free-text person search on a separate host.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::ArenaConfig;
use crate::fetch::{human_file_size, FetchError, Fetcher};
use crate::models::{AthleteId, Bundle};

/// Relationships requested with wrestler appearances.
pub const APPEARANCE_INCLUDES: &[&str] = &[
    "bracketPlacements.weightClass",
    "bracketPlacements",
    "division",
    "event",
    "weightClass",
    "team",
];

/// Relationships requested with bouts.
pub const BOUT_INCLUDES: &[&str] = &[
    "bottomWrestler",
    "bottomWrestler.team",
    "topWrestler.team",
    "weightClass",
    "topWrestler.division",
    "bottomWrestler.division",
    "event",
    "roundName",
];

/// Search results requested per query.
pub const SEARCH_LIMIT: u32 = 200;

/// Percent-complete callback for one collection fetch, `0.0..=100.0`.
pub type OnPercent<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Where an athlete's bundles come from.
#[async_trait]
pub trait AthleteSource: Send + Sync {
    /// Name of this source, for logs.
    fn name(&self) -> &str;

    /// Every wrestler-appearance record of the athlete.
    async fn fetch_appearances(
        &self,
        athlete: &AthleteId,
        on_progress: OnPercent<'_>,
    ) -> Result<Bundle, FetchError>;

    /// Every bout of the athlete.
    async fn fetch_bouts(
        &self,
        athlete: &AthleteId,
        on_progress: OnPercent<'_>,
    ) -> Result<Bundle, FetchError>;
}

/// Client for the live arena API.
#[derive(Debug, Clone)]
pub struct ArenaClient {
    fetcher: Fetcher,
    base_url: Url,
    search_url: Url,
    page_size: u32,
}

impl ArenaClient {
    pub fn new(config: &ArenaConfig) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(config.fetcher_config())?;
        Self::with_fetcher(fetcher, config)
    }

    pub fn with_fetcher(fetcher: Fetcher, config: &ArenaConfig) -> Result<Self, FetchError> {
        let parse = |s: &str| Url::parse(s).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", s, e)));
        Ok(Self {
            fetcher,
            base_url: parse(&config.base_url)?,
            search_url: parse(&config.search_url)?,
            page_size: config.page_size,
        })
    }

    /// URL of one page of a collection.
    pub fn collection_url(
        &self,
        collection: &str,
        athlete: &AthleteId,
        includes: &[&str],
        page_size: u32,
        offset: u64,
    ) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join(&format!("{}/", collection))
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("identityPersonId", athlete.as_str())
                .append_pair("page[size]", &page_size.to_string())
                .append_pair("page[offset]", &offset.to_string());
            if !includes.is_empty() {
                query.append_pair("include", &includes.join(","));
            }
        }
        Ok(url)
    }

    /// URL of a person search.
    pub fn search_url(&self, name: &str) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("site_id", "2")
            .append_pair("version", "1.24.0")
            .append_pair("limit", &SEARCH_LIMIT.to_string())
            .append_pair("view", "global-search-web")
            .append_pair("fields", "data<1>")
            .append_pair("q", name)
            .append_pair("page", "1")
            .append_pair("type", "person");
        url
    }

    /// Fetch a whole collection, page by page when `page_size > 0`.
    ///
    /// Stops once `meta.total` primary records are collected or a page comes
    /// back empty.
    async fn fetch_collection(
        &self,
        collection: &str,
        athlete: &AthleteId,
        includes: &[&str],
        on_progress: OnPercent<'_>,
    ) -> Result<Bundle, FetchError> {
        if self.page_size == 0 {
            let url = self.collection_url(collection, athlete, includes, 0, 0)?;
            let byte_progress = |loaded: u64, total: Option<u64>| {
                if let Some(total) = total.filter(|t| *t > 0) {
                    on_progress(loaded as f64 / total as f64 * 100.0);
                }
            };
            let fetched = self.fetcher.fetch_json::<Bundle>(&url, &byte_progress).await?;
            info!(
                "Fetched {} {} ({})",
                fetched.value.primary.len(),
                collection,
                human_file_size(fetched.content_length as u64, false, 1)
            );
            on_progress(100.0);
            return Ok(fetched.value);
        }

        let bundle = collect_pages(
            |offset| async move {
                let url =
                    self.collection_url(collection, athlete, includes, self.page_size, offset)?;
                let page = self.fetcher.fetch_json::<Bundle>(&url, &|_, _| {}).await?;
                Ok::<_, FetchError>(page.value)
            },
            on_progress,
        )
        .await?;

        info!("Fetched {} {} in pages", bundle.primary.len(), collection);
        on_progress(100.0);
        Ok(bundle)
    }

    /// Search people by name.
    pub async fn search_people(&self, name: &str) -> Result<Vec<SearchPerson>, FetchError> {
        let url = self.search_url(name);
        let fetched = self
            .fetcher
            .fetch_json::<RawSearchResults>(&url, &|_, _| {})
            .await?;
        let people: Vec<SearchPerson> = fetched
            .value
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(SearchPerson::from_raw)
            .collect();
        info!("Search for {:?} returned {} people", name, people.len());
        Ok(people)
    }
}

/// Merge pages from `fetch_page(offset)` until `meta.total` primary records
/// are collected or a page comes back empty.
async fn collect_pages<F, Fut>(
    mut fetch_page: F,
    on_progress: OnPercent<'_>,
) -> Result<Bundle, FetchError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Bundle, FetchError>>,
{
    let mut bundle = Bundle::default();
    let mut offset: u64 = 0;
    loop {
        let page = fetch_page(offset).await?;
        let received = page.primary.len() as u64;
        debug!("Page at offset {}: {} records", offset, received);

        bundle.merge_page(page);
        offset += received;

        let total = bundle.meta.total;
        if total > 0 {
            on_progress((offset as f64 / total as f64 * 100.0).min(100.0));
        }
        if received == 0 || offset >= total {
            break;
        }
    }
    Ok(bundle)
}

#[async_trait]
impl AthleteSource for ArenaClient {
    fn name(&self) -> &str {
        "arena"
    }

    async fn fetch_appearances(
        &self,
        athlete: &AthleteId,
        on_progress: OnPercent<'_>,
    ) -> Result<Bundle, FetchError> {
        self.fetch_collection("wrestlers", athlete, APPEARANCE_INCLUDES, on_progress)
            .await
    }

    async fn fetch_bouts(
        &self,
        athlete: &AthleteId,
        on_progress: OnPercent<'_>,
    ) -> Result<Bundle, FetchError> {
        self.fetch_collection("bouts", athlete, BOUT_INCLUDES, on_progress)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct RawSearchResults {
    #[serde(default)]
    data: Option<Vec<RawPerson>>,
}

#[derive(Debug, Deserialize)]
struct RawPerson {
    arena_person_identity_id: Option<String>,
    name: Option<String>,
    high_school_grad_year: Option<i32>,
    birth_date: Option<String>,
    location: Option<RawLocation>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    name: Option<String>,
    city: Option<String>,
    state: Option<String>,
}

/// One person from a name search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPerson {
    pub id: AthleteId,
    pub name: String,
    pub grad_year: Option<i32>,
    pub birth_date: Option<String>,
    pub location: Option<String>,
}

impl SearchPerson {
    /// People without an arena identity cannot be loaded and are dropped.
    fn from_raw(raw: RawPerson) -> Option<Self> {
        let id = AthleteId::parse(raw.arena_person_identity_id.as_deref()?)?;
        let location = raw.location.and_then(|l| {
            let place: Vec<String> = [l.city, l.state].into_iter().flatten().collect();
            match (l.name, place.is_empty()) {
                (Some(name), false) => Some(format!("{} ({})", name, place.join(", "))),
                (Some(name), true) => Some(name),
                (None, false) => Some(place.join(", ")),
                (None, true) => None,
            }
        });
        Some(Self {
            id,
            name: raw.name.unwrap_or_default(),
            grad_year: raw.high_school_grad_year,
            birth_date: raw.birth_date,
            location,
        })
    }
}

/// Results shown per search page.
pub const SEARCH_PAGE_SIZE: usize = 10;

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub query: String,
    /// 1-based
    pub page: usize,
    pub pages: usize,
    pub total: usize,
    pub results: Vec<SearchPerson>,
}

impl SearchPage {
    /// Slice `people` into pages of `per_page`. Out-of-range pages clamp to
    /// the last page.
    pub fn paginate(query: &str, people: Vec<SearchPerson>, page: usize, per_page: usize) -> Self {
        let total = people.len();
        let per_page = per_page.max(1);
        let pages = total.div_ceil(per_page);
        let page = page.clamp(1, pages.max(1));
        let results = people
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        Self {
            query: query.to_string(),
            page,
            pages,
            total,
            results,
        }
    }

    /// Every result on a single page.
    pub fn all(query: &str, people: Vec<SearchPerson>) -> Self {
        let total = people.len();
        Self {
            query: query.to_string(),
            page: 1,
            pages: usize::from(total > 0),
            total,
            results: people,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Record, RecordType};
    use std::sync::Mutex;

    fn client(page_size: u32) -> ArenaClient {
        let config = ArenaConfig {
            page_size,
            ..Default::default()
        };
        ArenaClient::new(&config).unwrap()
    }

    fn person(n: usize) -> SearchPerson {
        SearchPerson {
            id: AthleteId::parse(&format!("00000000-0000-4000-8000-{:012}", n)).unwrap(),
            name: format!("Person {}", n),
            grad_year: None,
            birth_date: None,
            location: None,
        }
    }

    #[test]
    fn test_collection_url() {
        let athlete = AthleteId::parse("4a7f2c1e-9b3d-4e8a-a1b2-0c9d8e7f6a5b").unwrap();
        let url = client(0)
            .collection_url("bouts", &athlete, &["event", "roundName"], 0, 0)
            .unwrap();

        assert_eq!(url.host_str(), Some("floarena-api.flowrestling.org"));
        assert_eq!(url.path(), "/bouts/");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "identityPersonId".to_string(),
            athlete.as_str().to_string()
        )));
        assert!(pairs.contains(&("page[size]".to_string(), "0".to_string())));
        assert!(pairs.contains(&("page[offset]".to_string(), "0".to_string())));
        assert!(pairs.contains(&("include".to_string(), "event,roundName".to_string())));
    }

    fn page(ids: &[&str], total: u64) -> Bundle {
        let mut bundle = Bundle::new(
            ids.iter().map(|id| Record::new(RecordType::Bout, *id)).collect(),
            vec![Record::new(RecordType::Event, "e1")],
        );
        bundle.meta.total = total;
        bundle
    }

    #[tokio::test]
    async fn test_collect_pages_stops_at_total() {
        let pages = [
            page(&["b1", "b2"], 5),
            page(&["b3", "b4"], 5),
            page(&["b5"], 5),
            page(&["never"], 5),
        ];
        let offsets = Mutex::new(Vec::new());
        let percents = Mutex::new(Vec::new());

        let bundle = collect_pages(
            |offset| {
                offsets.lock().unwrap().push(offset);
                let page = pages[(offset / 2) as usize].clone();
                async move { Ok::<_, FetchError>(page) }
            },
            &|p| percents.lock().unwrap().push(p),
        )
        .await
        .unwrap();

        assert_eq!(*offsets.lock().unwrap(), vec![0, 2, 4]);
        let ids: Vec<_> = bundle.primary.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3", "b4", "b5"]);
        assert_eq!(bundle.included.len(), 1);
        let percents: Vec<f64> = percents.lock().unwrap().iter().map(|p| p.round()).collect();
        assert_eq!(percents, vec![40.0, 80.0, 100.0]);
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_empty_page() {
        let calls = Mutex::new(0);

        let bundle = collect_pages(
            |offset| {
                *calls.lock().unwrap() += 1;
                let page = if offset == 0 {
                    page(&["b1", "b2"], 10)
                } else {
                    page(&[], 10)
                };
                async move { Ok::<_, FetchError>(page) }
            },
            &|_| {},
        )
        .await
        .unwrap();

        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(bundle.primary.len(), 2);
        assert_eq!(bundle.meta.total, 10);
    }

    #[tokio::test]
    async fn test_collect_pages_propagates_errors() {
        let result = collect_pages(
            |_| async {
                Err::<Bundle, _>(FetchError::HttpStatus {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                })
            },
            &|_| {},
        )
        .await;

        assert!(matches!(result, Err(FetchError::HttpStatus { status: 500, .. })));
    }

    #[test]
    fn test_search_url() {
        let url = client(0).search_url("Sam Ortiz");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".to_string(), "Sam Ortiz".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "200".to_string())));
        assert!(pairs.contains(&("type".to_string(), "person".to_string())));
        assert!(pairs.contains(&("fields".to_string(), "data<1>".to_string())));
    }

    #[test]
    fn test_search_person_from_raw() {
        let raw: RawSearchResults = serde_json::from_value(serde_json::json!({
            "data": [
                {
                    "arena_person_identity_id": "4A7F2C1E-9B3D-4E8A-A1B2-0C9D8E7F6A5B",
                    "name": "Sam Ortiz",
                    "high_school_grad_year": 2026,
                    "birth_date": null,
                    "location": { "name": "Ames High", "city": "Ames", "state": "IA" }
                },
                { "arena_person_identity_id": null, "name": "No Id" }
            ],
            "meta": { "total": 2 }
        }))
        .unwrap();

        let people: Vec<_> = raw
            .data
            .unwrap()
            .into_iter()
            .filter_map(SearchPerson::from_raw)
            .collect();

        assert_eq!(people.len(), 1);
        assert_eq!(people[0].id.as_str(), "4a7f2c1e-9b3d-4e8a-a1b2-0c9d8e7f6a5b");
        assert_eq!(people[0].grad_year, Some(2026));
        assert_eq!(people[0].location.as_deref(), Some("Ames High (Ames, IA)"));
    }

    #[test]
    fn test_search_paginate() {
        let people: Vec<_> = (0..23).map(person).collect();

        let page = SearchPage::paginate("p", people.clone(), 3, SEARCH_PAGE_SIZE);
        assert_eq!(page.pages, 3);
        assert_eq!(page.total, 23);
        assert_eq!(page.results.len(), 3);
        assert_eq!(page.results[0].name, "Person 20");

        let clamped = SearchPage::paginate("p", people.clone(), 99, SEARCH_PAGE_SIZE);
        assert_eq!(clamped.page, 3);

        let all = SearchPage::all("p", people);
        assert_eq!(all.results.len(), 23);
        assert_eq!(all.pages, 1);
    }

    #[test]
    fn test_search_paginate_empty() {
        let page = SearchPage::paginate("nobody", Vec::new(), 1, SEARCH_PAGE_SIZE);
        assert_eq!(page.pages, 0);
        assert_eq!(page.page, 1);
        assert!(page.results.is_empty());
    }
}
