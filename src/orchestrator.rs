//! Batch operations shared by every single-host list.
//!
//! Each URL is reduced to its host, and the host is tested with the list's
//! own `contains` / `lookup`. Queries run one after another, in input order.

use crate::error::Result;
use crate::providers::{AddressListItem, HostList};
use crate::validation::url_hosts;
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tracing::debug;

/// Check if the host of any URL is listed, stopping at the first match.
pub async fn any_match<T>(list: &T, urls: &[&str]) -> Result<bool>
where
    T: HostList + ?Sized,
{
    any_host_match(list, &url_hosts(urls)?).await
}

/// [`any_match`] over URLs already reduced to their hosts.
pub(crate) async fn any_host_match<T>(list: &T, pairs: &[(&str, String)]) -> Result<bool>
where
    T: HostList + ?Sized,
{
    for (url, host) in pairs {
        if list.contains(host).await? {
            debug!(list = list.name(), url = %url, "URL matched");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Lazily yield the URLs whose host is listed.
pub fn filter_matching<'a, T>(list: &'a T, urls: &'a [&'a str]) -> BoxStream<'a, Result<String>>
where
    T: HostList + ?Sized,
{
    let pairs = match url_hosts(urls) {
        Ok(pairs) => pairs,
        Err(e) => return stream::once(future::ready(Err(e))).boxed(),
    };

    let answers = stream::iter(pairs).then(move |(url, host)| async move {
        list.contains(&host)
            .await
            .map(|listed| listed.then(|| url.to_string()))
    });

    keep_matches(answers)
}

/// Lazily yield the listing of every URL whose host is listed.
pub fn lookup_matching<'a, T>(
    list: &'a T,
    urls: &'a [&'a str],
) -> BoxStream<'a, Result<AddressListItem>>
where
    T: HostList + ?Sized,
{
    match url_hosts(urls) {
        Ok(pairs) => lookup_url_hosts(list, pairs),
        Err(e) => stream::once(future::ready(Err(e))).boxed(),
    }
}

/// [`lookup_matching`] over URLs already reduced to their hosts.
pub(crate) fn lookup_url_hosts<'a, T>(
    list: &'a T,
    pairs: Vec<(&'a str, String)>,
) -> BoxStream<'a, Result<AddressListItem>>
where
    T: HostList + ?Sized,
{
    let answers = stream::iter(pairs).then(move |(_, host)| async move { list.lookup(&host).await });

    keep_matches(answers)
}

/// Drop the non-matches of an answer stream and stop after the first error.
pub(crate) fn keep_matches<'a, T, S>(answers: S) -> BoxStream<'a, Result<T>>
where
    T: Send + 'a,
    S: Stream<Item = Result<Option<T>>> + Send + 'a,
{
    stop_after_error(answers)
        .try_filter_map(|answer| future::ready(Ok(answer)))
        .boxed()
}

/// End a stream right after it yields an error, so nothing past the
/// failing value is queried.
pub(crate) fn stop_after_error<'a, T, S>(items: S) -> impl Stream<Item = Result<T>> + Send + 'a
where
    T: Send + 'a,
    S: Stream<Item = Result<T>> + Send + 'a,
{
    items.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        *failed = item.is_err();
        future::ready(Some(item))
    })
}
