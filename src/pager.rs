// ===============================
// src/pager.rs
// ===============================
//
// Lazy pagination: a page is fetched only once the previous page's items
// have been consumed. Callers bound the pull with `take(n)`.
//
use futures_util::{stream, Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{AdManagerApi, ApiError};
use crate::gam::{ListRequest, ReportRow, Resource};
use crate::metrics::REPORT_ROWS;

/// `None` = exhausted, `Some(None)` = first page, `Some(Some(t))` = next token.
type Cursor = Option<Option<String>>;

fn next_cursor(token: Option<String>) -> Cursor {
    token.filter(|t| !t.is_empty()).map(Some)
}

pub fn items<'a, T>(
    api: &'a dyn AdManagerApi,
    resource: Resource,
    req: ListRequest,
) -> impl Stream<Item = Result<T, ApiError>> + Send + 'a
where
    T: DeserializeOwned + Send + 'a,
{
    stream::try_unfold(Some(None) as Cursor, move |cursor| {
        let mut req = req.clone();
        async move {
            let Some(token) = cursor else { return Ok(None) };
            req.page_token = token;
            let page = api.list_page(resource, &req).await?;
            Ok::<_, ApiError>(Some((page.items, next_cursor(page.next_page_token))))
        }
    })
    .map_ok(|items: Vec<Value>| stream::iter(items.into_iter().map(Ok::<_, ApiError>)))
    .try_flatten()
    .and_then(|v| async move { serde_json::from_value::<T>(v).map_err(ApiError::from) })
}

pub fn report_rows<'a>(
    api: &'a dyn AdManagerApi,
    result: String,
) -> impl Stream<Item = Result<ReportRow, ApiError>> + Send + 'a {
    stream::try_unfold(Some(None) as Cursor, move |cursor| {
        let result = result.clone();
        async move {
            let Some(token) = cursor else { return Ok(None) };
            let page = api.fetch_report_rows(&result, token.as_deref()).await?;
            REPORT_ROWS.inc_by(page.rows.len() as u64);
            Ok::<_, ApiError>(Some((page.rows, next_cursor(page.next_page_token))))
        }
    })
    .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, ApiError>)))
    .try_flatten()
}

/// Pull at most `limit` items.
pub async fn collect_limited<T, S>(s: S, limit: usize) -> Result<Vec<T>, ApiError>
where
    S: Stream<Item = Result<T, ApiError>>,
{
    s.take(limit).try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use serde_json::json;

    #[tokio::test]
    async fn stops_fetching_once_limit_is_met() {
        let api = FakeApi::default().with_pages(
            Resource::Orders,
            vec![
                vec![json!({"orderId": 1}), json!({"orderId": 2})],
                vec![json!({"orderId": 3}), json!({"orderId": 4})],
                vec![json!({"orderId": 5})],
            ],
        );
        let got: Vec<Value> = collect_limited(items(&api, Resource::Orders, ListRequest::new(2)), 3)
            .await
            .unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn walks_every_page_when_needed() {
        let api = FakeApi::default().with_pages(
            Resource::Orders,
            vec![vec![json!({"orderId": 1})], vec![json!({"orderId": 2})]],
        );
        let got: Vec<Value> = collect_limited(items(&api, Resource::Orders, ListRequest::new(1)), 10)
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn report_rows_follow_tokens() {
        let api = FakeApi::default().with_report_rows(vec![
            vec![json!({"dimensionValues": [{"intValue": "1"}]})],
            vec![json!({"dimensionValues": [{"intValue": "2"}]})],
        ]);
        let rows: Vec<ReportRow> = report_rows(&api, "r".into()).try_collect().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].dimension_text(0).as_deref(), Some("2"));
    }
}
