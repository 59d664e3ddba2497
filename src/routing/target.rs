use super::safety::FilterSafety;
use tracing::debug;

/// Live candidate list for one outbound call.
///
/// Filters work in place on the owned `Vec` and keep the relative order of the
/// survivors. A filter whose safety net rejects the result leaves the list
/// untouched and allocates nothing. One instance belongs to a single call
/// pipeline; it is not meant to be filtered from several threads at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget<E> {
    endpoints: Vec<E>,
}

impl<E> RouteTarget<E> {
    pub fn new(endpoints: Vec<E>) -> Self {
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &[E] {
        &self.endpoints
    }

    pub fn into_endpoints(self) -> Vec<E> {
        self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Removes every endpoint the predicate rejects. Returns the new size, which may be zero.
    pub fn filter<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&E) -> bool,
    {
        self.endpoints.retain(|e| predicate(e));
        self.endpoints.len()
    }

    /// Applies `predicate` (`None` matches everything), then keeps at most
    /// `max_count` endpoints when `max_count > 0`. Returns the final size.
    pub fn filter_max<P>(&mut self, predicate: Option<P>, max_count: usize) -> usize
    where
        P: Fn(&E) -> bool,
    {
        if let Some(predicate) = predicate {
            self.filter(predicate);
        }
        self.truncate(max_count);
        self.endpoints.len()
    }

    /// Caps the list to its first `max_count` endpoints; zero means unlimited.
    pub fn limit(&mut self, max_count: usize) -> usize {
        self.filter_max(None::<fn(&E) -> bool>, max_count)
    }

    /// Narrows to the matching endpoints unless `safety` judges the result unsafe.
    ///
    /// Returns the number of matching endpoints whether or not the narrowing was
    /// committed, so callers can observe how thin the preferred subset was.
    /// When committed, the survivors are capped to `max_count` (zero means unlimited).
    ///
    /// The predicate is evaluated up to twice per endpoint, so it must be a pure
    /// function of the endpoint.
    pub fn filter_with<P, S>(&mut self, predicate: P, max_count: usize, safety: S) -> usize
    where
        P: Fn(&E) -> bool,
        S: FilterSafety,
    {
        let total = self.endpoints.len();
        let matched = self.endpoints.iter().filter(|e| predicate(*e)).count();

        if safety.should_discard(matched, total) {
            debug!(matched, total, "route filter discarded, keeping original candidates");
            return matched;
        }

        if matched < total {
            self.endpoints.retain(|e| predicate(e));
            debug_assert_eq!(self.endpoints.len(), matched, "route predicate is not pure");
        }
        self.truncate(max_count);
        matched
    }

    fn truncate(&mut self, max_count: usize) {
        if max_count > 0 && self.endpoints.len() > max_count {
            self.endpoints.truncate(max_count);
        }
    }
}

impl<E> From<Vec<E>> for RouteTarget<E> {
    fn from(endpoints: Vec<E>) -> Self {
        Self::new(endpoints)
    }
}
