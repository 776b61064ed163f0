//! Per-call options for [`CacheManager::get`](super::CacheManager::get).

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use layercache_core::CachePolicy;

/// Type-erased fetch function producing the value on a miss.
///
/// It is called at most once per miss, and again for each background refresh,
/// so it must be callable repeatedly.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

/// Derives extra tags and parents from a freshly fetched value.
pub type DeclareFn<T> = Arc<dyn Fn(&T) -> Declarations + Send + Sync>;

/// Tags and parent keys declared for a cached value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub tags: Vec<String>,
    pub depends_on: Vec<String>,
}

/// Options for a read-through lookup.
pub struct GetOptions<T> {
    pub(crate) fetch: FetchFn<T>,
    pub(crate) policy: Arc<CachePolicy>,
    pub(crate) tags: Vec<String>,
    pub(crate) depends_on: Vec<String>,
    pub(crate) declare: Option<DeclareFn<T>>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) force_refresh: bool,
}

impl<T: Send + 'static> GetOptions<T> {
    /// Create options from a policy and a fetch function.
    ///
    /// Any error type that implements `Display` can be returned by the fetch;
    /// it is reported as the reason of a `FetchFailed` error.
    pub fn new<F, Fut, E>(policy: Arc<CachePolicy>, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + 'static,
    {
        let fetch: FetchFn<T> =
            Arc::new(move || fetch().map(|r| r.map_err(|e| e.to_string())).boxed());
        Self {
            fetch,
            policy,
            tags: Vec::new(),
            depends_on: Vec::new(),
            declare: None,
            timeout: None,
            force_refresh: false,
        }
    }
}

impl<T> GetOptions<T> {
    /// Tags to register for the key.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Parent keys whose deletion also deletes this key.
    pub fn with_depends_on<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = parents.into_iter().map(Into::into).collect();
        self
    }

    /// Declare additional tags and parents computed from each fetched value.
    ///
    /// Runs on every fetch, background refreshes included, so list results
    /// can depend on the entities they contain.
    pub fn with_declarations<F>(mut self, declare: F) -> Self
    where
        F: Fn(&T) -> Declarations + Send + Sync + 'static,
    {
        self.declare = Some(Arc::new(declare));
        self
    }

    /// Bound the fetch. Defaults to the manager's configured fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skip the tier walk and fetch unconditionally.
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn policy(&self) -> &Arc<CachePolicy> {
        &self.policy
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Static declarations merged with those derived from `value`.
    pub(crate) fn declarations_for(&self, value: &T) -> Declarations {
        let mut declared = Declarations {
            tags: self.tags.clone(),
            depends_on: self.depends_on.clone(),
        };
        if let Some(declare) = &self.declare {
            let derived = declare(value);
            for tag in derived.tags {
                if !declared.tags.contains(&tag) {
                    declared.tags.push(tag);
                }
            }
            for parent in derived.depends_on {
                if !declared.depends_on.contains(&parent) {
                    declared.depends_on.push(parent);
                }
            }
        }
        declared
    }
}

impl<T> Clone for GetOptions<T> {
    fn clone(&self) -> Self {
        Self {
            fetch: Arc::clone(&self.fetch),
            policy: Arc::clone(&self.policy),
            tags: self.tags.clone(),
            depends_on: self.depends_on.clone(),
            declare: self.declare.clone(),
            timeout: self.timeout,
            force_refresh: self.force_refresh,
        }
    }
}

impl<T> fmt::Debug for GetOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetOptions")
            .field("policy", &self.policy)
            .field("tags", &self.tags)
            .field("depends_on", &self.depends_on)
            .field("declares", &self.declare.is_some())
            .field("timeout", &self.timeout)
            .field("force_refresh", &self.force_refresh)
            .finish_non_exhaustive()
    }
}

/// Options for [`CacheManager::set`](super::CacheManager::set).
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub(crate) ttl: Option<Duration>,
    pub(crate) tags: Vec<String>,
    pub(crate) depends_on: Vec<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical TTL. Without one the entry never expires.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_depends_on<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = parents.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layercache_core::PolicyName;

    #[tokio::test]
    async fn test_fetch_error_becomes_string() {
        let options: GetOptions<u32> = GetOptions::new(PolicyName::Micro.builtin().into(), || async {
            Err::<u32, _>(std::io::Error::new(std::io::ErrorKind::Other, "db down"))
        });

        let result = (options.fetch)().await;
        assert_eq!(result, Err("db down".to_string()));
    }

    #[test]
    fn test_builders() {
        let options = GetOptions::new(PolicyName::Dynamic.builtin().into(), || async {
            Ok::<_, String>(1u8)
        })
        .with_tags(["supplier", "supplier:42"])
        .with_depends_on(["region:eu"])
        .with_timeout(Duration::from_secs(2));

        assert_eq!(options.tags(), ["supplier", "supplier:42"]);
        assert_eq!(options.depends_on(), ["region:eu"]);
        assert_eq!(options.timeout, Some(Duration::from_secs(2)));
        assert!(!options.force_refresh);
    }

    #[test]
    fn test_declarations_merge_without_duplicates() {
        let options = GetOptions::new(PolicyName::Api.builtin().into(), || async {
            Ok::<_, String>(vec![1u32, 2])
        })
        .with_tags(["supplier"])
        .with_declarations(|ids: &Vec<u32>| Declarations {
            tags: ids
                .iter()
                .map(|id| format!("supplier:{}", id))
                .chain(std::iter::once("supplier".to_string()))
                .collect(),
            depends_on: ids.iter().map(|id| format!("supplier:{}", id)).collect(),
        });

        let declared = options.declarations_for(&vec![1, 2]);
        assert_eq!(declared.tags, vec!["supplier", "supplier:1", "supplier:2"]);
        assert_eq!(declared.depends_on, vec!["supplier:1", "supplier:2"]);
    }
}
