use async_trait::async_trait;
use dashmap::DashMap;
use extract::{GenerateOptions, LanguageModel, LlmError};
use index::{EmbedOptions, Embedder};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Content-addressed store for model responses and embeddings.
pub struct Cache {
    embeddings: DashMap<String, Vec<f32>>,
    llm_responses: DashMap<String, String>,
    max_entries: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Cache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            embeddings: DashMap::new(),
            llm_responses: DashMap::new(),
            max_entries,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Clear a quarter of the map once it is full.
    fn make_room<V>(map: &DashMap<String, V>, max_entries: usize) {
        if map.len() < max_entries {
            return;
        }
        let to_remove: Vec<_> = map
            .iter()
            .take((max_entries / 4).max(1))
            .map(|r| r.key().clone())
            .collect();
        for key in to_remove {
            map.remove(&key);
        }
    }

    fn record<T>(&self, found: Option<T>) -> Option<T> {
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn set_embedding(&self, key: &str, embedding: Vec<f32>) {
        if self.max_entries == 0 {
            return;
        }
        Self::make_room(&self.embeddings, self.max_entries);
        self.embeddings.insert(hash_text(key), embedding);
    }

    pub fn get_embedding(&self, key: &str) -> Option<Vec<f32>> {
        self.record(self.embeddings.get(&hash_text(key)).map(|r| r.value().clone()))
    }

    pub fn set_llm_response(&self, key: &str, response: String) {
        if self.max_entries == 0 {
            return;
        }
        Self::make_room(&self.llm_responses, self.max_entries);
        self.llm_responses.insert(hash_text(key), response);
    }

    pub fn get_llm_response(&self, key: &str) -> Option<String> {
        self.record(self.llm_responses.get(&hash_text(key)).map(|r| r.value().clone()))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            embeddings_cached: self.embeddings.len(),
            llm_responses_cached: self.llm_responses.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.embeddings.clear();
        self.llm_responses.clear();
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub embeddings_cached: usize,
    pub llm_responses_cached: usize,
    pub hits: usize,
    pub misses: usize,
}

/// Serves repeated generations from the cache. Only deterministic calls
/// (temperature 0) are cached; errors never are.
pub struct CachedModel<M> {
    inner: M,
    cache: Arc<Cache>,
}

impl<M: LanguageModel> CachedModel<M> {
    pub fn new(inner: M, cache: Arc<Cache>) -> Self {
        Self { inner, cache }
    }
}

fn generation_key(prompt: &str, options: &GenerateOptions) -> String {
    format!(
        "{}\u{1f}{}\u{1f}{}",
        options.model_id.as_deref().unwrap_or(""),
        options.json,
        prompt
    )
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for CachedModel<M> {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        if options.temperature != 0.0 {
            return self.inner.generate(prompt, options).await;
        }

        let key = generation_key(prompt, options);
        if let Some(hit) = self.cache.get_llm_response(&key) {
            return Ok(hit);
        }
        let response = self.inner.generate(prompt, options).await?;
        self.cache.set_llm_response(&key, response.clone());
        Ok(response)
    }
}

/// Embeds only the texts the cache has not seen under the same options.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Arc<Cache>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, cache: Arc<Cache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(
        &self,
        texts: &[String],
        options: &EmbedOptions,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let keys: Vec<String> = texts
            .iter()
            .map(|t| format!("{:?}\u{1f}{}", options, t))
            .collect();
        let mut vectors: Vec<Option<Vec<f32>>> =
            keys.iter().map(|k| self.cache.get_embedding(k)).collect();

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();
        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed(&batch, options).await?;
            if fresh.len() != batch.len() {
                return Err(LlmError::Decode(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    fresh.len()
                )));
            }
            for (i, vector) in missing.into_iter().zip(fresh) {
                self.cache.set_embedding(&keys[i], vector.clone());
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::testing::ScriptedModel;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: &[String], _: &EmbedOptions) -> Result<Vec<Vec<f32>>, LlmError> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[tokio::test]
    async fn deterministic_generations_are_cached() {
        let model = Arc::new(ScriptedModel::new().with_default("answer"));
        let cached = CachedModel::new(model.clone(), Arc::new(Cache::new(100)));
        let options = GenerateOptions::default();

        assert_eq!(cached.generate("p", &options).await.unwrap(), "answer");
        assert_eq!(cached.generate("p", &options).await.unwrap(), "answer");
        assert_eq!(model.call_count(), 1);
        assert_eq!(cached.cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn sampled_generations_bypass_cache() {
        let model = Arc::new(ScriptedModel::new().with_default("answer"));
        let cached = CachedModel::new(model.clone(), Arc::new(Cache::new(100)));
        let options = GenerateOptions::default().with_temperature(0.7);

        cached.generate("p", &options).await.unwrap();
        cached.generate("p", &options).await.unwrap();
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let model = Arc::new(ScriptedModel::new().with_default_error(LlmError::Status(500)));
        let cached = CachedModel::new(model.clone(), Arc::new(Cache::new(100)));

        assert!(cached.generate("p", &GenerateOptions::default()).await.is_err());
        assert!(cached.generate("p", &GenerateOptions::default()).await.is_err());
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn embedder_only_fetches_unseen_texts() {
        let cache = Arc::new(Cache::new(100));
        let embedder = CachedEmbedder::new(
            CountingEmbedder {
                calls: AtomicUsize::new(0),
            },
            cache,
        );
        let options = EmbedOptions::default();

        embedder.embed(&["a".into(), "bb".into()], &options).await.unwrap();
        let vectors = embedder
            .embed(&["bb".into(), "ccc".into(), "a".into()], &options)
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![2.0], vec![3.0], vec![1.0]]);
        assert_eq!(embedder.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn full_cache_evicts_a_quarter() {
        let cache = Cache::new(4);
        for i in 0..4 {
            cache.set_llm_response(&i.to_string(), "x".into());
        }
        cache.set_llm_response("new", "y".into());
        assert_eq!(cache.stats().llm_responses_cached, 4);
        assert_eq!(cache.get_llm_response("new"), Some("y".to_string()));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = Cache::new(0);
        cache.set_llm_response("k", "v".into());
        assert_eq!(cache.get_llm_response("k"), None);
    }
}
