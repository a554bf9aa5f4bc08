//! Function memoization on top of [`Cache`].

use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::entry::SetOptions;
use super::store::Cache;
use crate::error::{Error, Result};

type KeyFn<A> = Box<dyn Fn(&A) -> Result<String> + Send + Sync>;

/// Default key: the JSON serialization of the argument.
pub fn serialized_key<A: Serialize>(args: &A) -> Result<String> {
  serde_json::to_string(args).map_err(Error::from)
}

/// A function whose results are served from a shared cache.
pub struct Memoized<A, T, F> {
  cache: Arc<Cache<T>>,
  func: F,
  key_fn: KeyFn<A>,
  options: SetOptions,
  _args: PhantomData<fn(A)>,
}

impl<A, T, F> Memoized<A, T, F> {
  /// Replace the default key generator.
  pub fn with_key<K>(mut self, key_fn: K) -> Self
  where
    A: 'static,
    K: Fn(&A) -> String + Send + Sync + 'static,
  {
    self.key_fn = Box::new(move |args: &A| Ok(key_fn(args)));
    self
  }

  pub fn with_options(mut self, options: SetOptions) -> Self {
    self.options = options;
    self
  }

  pub fn cache(&self) -> &Arc<Cache<T>> {
    &self.cache
  }
}

impl<A, T, F> Memoized<A, T, F>
where
  T: Clone + Serialize,
  F: Fn(&A) -> T,
{
  /// Call the wrapped synchronous function, or return the cached result.
  pub fn call(&self, args: &A) -> Result<T> {
    let key = (self.key_fn)(args)?;
    if let Some(hit) = self.cache.get(&key) {
      return Ok(hit);
    }
    let value = (self.func)(args);
    self.cache.set(key, value.clone(), self.options)?;
    Ok(value)
  }
}

impl<A, T, F, Fut, E> Memoized<A, T, F>
where
  T: Clone + Serialize,
  F: Fn(A) -> Fut,
  Fut: Future<Output = std::result::Result<T, E>>,
  E: From<Error>,
{
  /// Call the wrapped async function. Only successful results are cached.
  pub async fn call_async(&self, args: A) -> std::result::Result<T, E> {
    let key = (self.key_fn)(&args)?;
    if let Some(hit) = self.cache.get(&key) {
      return Ok(hit);
    }
    let value = (self.func)(args).await?;
    self.cache.set(key, value.clone(), self.options)?;
    Ok(value)
  }
}

impl<T> Cache<T> {
  /// Wrap `func` so repeated calls with equal arguments hit the cache.
  ///
  /// Works for both `Fn(&A) -> T` (see [`Memoized::call`]) and
  /// `Fn(A) -> impl Future<Output = Result<T, E>>` (see [`Memoized::call_async`]).
  pub fn memoize<A, F>(self: &Arc<Self>, func: F) -> Memoized<A, T, F>
  where
    A: Serialize + 'static,
  {
    Memoized {
      cache: Arc::clone(self),
      func,
      key_fn: Box::new(serialized_key::<A>),
      options: SetOptions::default(),
      _args: PhantomData,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheOptions;
  use std::sync::atomic::{AtomicU32, Ordering};

  #[test]
  fn test_sync_memoize_reuses_results() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let cache: Arc<Cache<u64>> = Arc::new(Cache::new(CacheOptions::default()));
    let square = cache.memoize(move |n: &u64| {
      counter.fetch_add(1, Ordering::SeqCst);
      n * n
    });

    assert_eq!(square.call(&4).unwrap(), 16);
    assert_eq!(square.call(&4).unwrap(), 16);
    assert_eq!(square.call(&5).unwrap(), 25);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_custom_key_generator() {
    let cache: Arc<Cache<usize>> = Arc::new(Cache::new(CacheOptions::default()));
    let len = cache
      .memoize(|s: &String| s.len())
      .with_key(|s: &String| s.to_lowercase());

    assert_eq!(len.call(&"ABC".to_string()).unwrap(), 3);
    assert!(cache.contains("abc"));
  }

  #[tokio::test]
  async fn test_async_memoize_skips_errors() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let cache: Arc<Cache<u32>> = Arc::new(Cache::new(CacheOptions::default()));
    let fetch = cache.memoize(move |(id, fail): (u32, bool)| {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        if fail {
          Err(Error::Sync("offline".into()))
        } else {
          Ok(id * 10)
        }
      }
    });

    assert!(fetch.call_async((1, true)).await.is_err());
    assert!(fetch.call_async((1, true)).await.is_err());
    assert_eq!(fetch.call_async((2, false)).await.unwrap(), 20);
    assert_eq!(fetch.call_async((2, false)).await.unwrap(), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }
}
