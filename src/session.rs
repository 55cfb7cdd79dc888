//! Per-model inference session cache
//!
//! Sessions are expensive to build (model weight load), so the pool keeps at
//! most one per model identifier for the lifetime of the process. First
//! access is single-flight: concurrent requests for the same unseen model
//! wait on one construction instead of racing to build duplicates. There is
//! no eviction; the model set is small and closed.

use crate::error::{BgServeError, Result};
use crate::inference::InferenceBackend;
use crate::models::{self, ModelDescriptor};
use crate::preprocessing;
use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Factory building inference backends for the session pool
pub trait SessionFactory: Send + Sync + std::fmt::Debug {
    /// Construct a backend for the given model, loading weights from
    /// `model_dir`
    ///
    /// # Errors
    /// - Missing or invalid model weights
    /// - Backend initialization failures
    fn create_backend(
        &self,
        model: &ModelDescriptor,
        model_dir: &Path,
    ) -> Result<Box<dyn InferenceBackend>>;
}

/// One loaded model, safe for concurrent use by in-flight requests
#[derive(Debug)]
pub struct RemovalSession {
    descriptor: &'static ModelDescriptor,
    backend: Box<dyn InferenceBackend>,
}

impl RemovalSession {
    /// The model identifier this session serves
    pub fn model_id(&self) -> &'static str {
        self.descriptor.id
    }

    /// Strip the background from an image, returning an RGBA result with
    /// the same dimensions as the input
    ///
    /// # Errors
    /// - Preprocessing failures (degenerate input)
    /// - Backend inference failures
    pub fn remove_background(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let tensor = preprocessing::image_to_tensor(image, &self.descriptor.preprocessing)?;
        let mask = self.backend.infer(&tensor)?;
        let result = preprocessing::apply_alpha_mask(image, &mask)?;
        Ok(DynamicImage::ImageRgba8(result))
    }
}

type SessionSlot = Arc<OnceCell<Arc<RemovalSession>>>;

/// Lazy, never-evicting cache of inference sessions keyed by model id
#[derive(Debug)]
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    model_dir: PathBuf,
    slots: Mutex<HashMap<&'static str, SessionSlot>>,
}

impl SessionPool {
    /// Create an empty pool loading weights from `model_dir`
    pub fn new(factory: Arc<dyn SessionFactory>, model_dir: PathBuf) -> Self {
        Self {
            factory,
            model_dir,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get or lazily build the session for a model identifier
    ///
    /// Unsupported identifiers fail before any slot is created. Failed
    /// construction leaves the slot empty, so a later request retries.
    ///
    /// # Errors
    /// - `UnsupportedModel` for identifiers outside the registry
    /// - Backend construction failures
    pub async fn get(&self, model_id: &str) -> Result<Arc<RemovalSession>> {
        let descriptor = models::validate_model(model_id)?;

        let slot = {
            let mut slots = self.slots.lock().expect("session pool mutex poisoned");
            Arc::clone(
                slots
                    .entry(descriptor.id)
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let session = slot
            .get_or_try_init(|| self.build_session(descriptor))
            .await?;
        Ok(Arc::clone(session))
    }

    /// Model identifiers with a fully constructed session
    pub fn cached_models(&self) -> Vec<&'static str> {
        let slots = self.slots.lock().expect("session pool mutex poisoned");
        slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| *id)
            .collect()
    }

    async fn build_session(&self, descriptor: &'static ModelDescriptor) -> Result<Arc<RemovalSession>> {
        tracing::info!(model = descriptor.id, "building inference session");
        let factory = Arc::clone(&self.factory);
        let model_dir = self.model_dir.clone();

        // Weight loading is blocking work; keep it off the async runtime
        let session = tokio::task::spawn_blocking(move || -> Result<RemovalSession> {
            let backend = factory.create_backend(descriptor, &model_dir)?;
            Ok(RemovalSession {
                descriptor,
                backend,
            })
        })
        .await
        .map_err(|e| BgServeError::processing(format!("session construction task failed: {e}")))??;

        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{MockBackend, MockSessionFactory};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts constructions, optionally failing the first N of them
    #[derive(Debug, Default)]
    struct CountingFactory {
        built: AtomicUsize,
        fail_first: AtomicUsize,
    }

    impl SessionFactory for CountingFactory {
        fn create_backend(
            &self,
            _model: &ModelDescriptor,
            _model_dir: &Path,
        ) -> Result<Box<dyn InferenceBackend>> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(BgServeError::model("weights unavailable"));
            }
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockBackend::new()))
        }
    }

    fn pool_with(factory: Arc<dyn SessionFactory>) -> SessionPool {
        SessionPool::new(factory, PathBuf::from("/nonexistent"))
    }

    #[tokio::test]
    async fn test_same_model_returns_same_session() {
        let factory = Arc::new(CountingFactory::default());
        let pool = pool_with(Arc::clone(&factory) as Arc<dyn SessionFactory>);

        let first = pool.get("u2net").await.unwrap();
        let second = pool.get("u2net").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_models_get_distinct_sessions() {
        let pool = pool_with(Arc::new(MockSessionFactory::new()));

        let a = pool.get("u2net").await.unwrap();
        let b = pool.get("silueta").await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.model_id(), "u2net");
        assert_eq!(b.model_id(), "silueta");

        let mut cached = pool.cached_models();
        cached.sort_unstable();
        assert_eq!(cached, vec!["silueta", "u2net"]);
    }

    #[tokio::test]
    async fn test_unsupported_model_creates_no_slot() {
        let factory = Arc::new(CountingFactory::default());
        let pool = pool_with(Arc::clone(&factory) as Arc<dyn SessionFactory>);

        let err = pool.get("dall-e").await.expect_err("must fail");
        assert!(matches!(err, BgServeError::UnsupportedModel { .. }));
        assert_eq!(factory.built.load(Ordering::SeqCst), 0);
        assert!(pool.cached_models().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_first_access_builds_once() {
        let factory = Arc::new(CountingFactory::default());
        let pool = Arc::new(pool_with(Arc::clone(&factory) as Arc<dyn SessionFactory>));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move { pool.get("birefnet-hrsod").await }));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_failed_construction_is_retried() {
        let factory = Arc::new(CountingFactory {
            built: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(1),
        });
        let pool = pool_with(Arc::clone(&factory) as Arc<dyn SessionFactory>);

        let err = pool.get("u2net").await.expect_err("first attempt fails");
        assert!(matches!(err, BgServeError::Model(_)));
        assert!(pool.cached_models().is_empty());

        let session = pool.get("u2net").await.expect("retry succeeds");
        assert_eq!(session.model_id(), "u2net");
        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_removes_background() {
        let pool = pool_with(Arc::new(MockSessionFactory::new()));
        let session = pool.get("u2net").await.unwrap();

        let image = DynamicImage::new_rgb8(40, 30);
        let result = session.remove_background(&image).unwrap();
        assert_eq!(result.width(), 40);
        assert_eq!(result.height(), 30);
    }
}
