//! Lazily loaded, exclusively owned model handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::device::DeviceProfile;
use crate::error::{Error, Result};
use crate::model::{ModelKey, ModelLoader};

/// Caches model handles by (task, variant).
///
/// The map lock is held across the load itself: loads are few and expensive,
/// and holding the lock guarantees a concurrent second caller for the same
/// key blocks until the first load finishes and then receives the cached
/// handle instead of loading twice.
pub struct ModelCache<L: ModelLoader> {
    loader: L,
    device: DeviceProfile,
    handles: Mutex<HashMap<ModelKey, Arc<L::Handle>>>,
}

impl<L: ModelLoader> ModelCache<L> {
    pub fn new(loader: L, device: DeviceProfile) -> Self {
        Self {
            loader,
            device,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    /// Returns the cached handle for `key`, loading it on first use.
    pub fn get_or_load(&self, key: &ModelKey) -> Result<Arc<L::Handle>> {
        let mut handles = self.handles.lock().unwrap();

        if let Some(handle) = handles.get(key) {
            debug!(%key, "model handle already loaded");
            return Ok(Arc::clone(handle));
        }

        info!(%key, device = %self.device.kind, "loading model");
        let handle = match self.loader.load(key, &self.device) {
            Ok(handle) => Arc::new(handle),
            Err(err @ Error::ModelLoadFailed { .. }) => return Err(err),
            Err(err) => {
                return Err(Error::ModelLoadFailed {
                    key: key.to_string(),
                    cause: err.to_string(),
                });
            }
        };
        handles.insert(key.clone(), Arc::clone(&handle));
        info!(%key, "model loaded");

        Ok(handle)
    }

    /// Drops all cached handles; the next `get_or_load` per key loads again.
    pub fn reset(&self) {
        self.handles.lock().unwrap().clear();
    }

    pub fn loaded_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::model::ColorizerVariant;

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    impl CountingLoader {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let loads = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    loads: Arc::clone(&loads),
                    delay: Duration::ZERO,
                    fail: false,
                },
                loads,
            )
        }
    }

    impl ModelLoader for CountingLoader {
        type Handle = String;

        fn load(&self, key: &ModelKey, _device: &DeviceProfile) -> Result<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(Error::InferenceError("weights corrupt".into()));
            }
            Ok(key.variant.clone())
        }
    }

    #[test]
    fn loads_once_per_key() {
        let (loader, loads) = CountingLoader::new();
        let cache = ModelCache::new(loader, DeviceProfile::cpu());
        let key = ModelKey::colorization(ColorizerVariant::Artistic);

        let first = cache.get_or_load(&key).unwrap();
        let second = cache.get_or_load(&key).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loaded_count(), 1);

        cache
            .get_or_load(&ModelKey::colorization(ColorizerVariant::Stable))
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn load_failure_is_reported_as_model_load_failed() {
        let (mut loader, loads) = CountingLoader::new();
        loader.fail = true;
        let cache = ModelCache::new(loader, DeviceProfile::cpu());
        let key = ModelKey::generation("sd-v1-5");

        let err = cache.get_or_load(&key).unwrap_err();
        assert!(matches!(err, Error::ModelLoadFailed { .. }));
        assert!(err.to_string().contains("weights corrupt"));
        // failures are not cached
        let _ = cache.get_or_load(&key).unwrap_err();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reset_forces_a_reload() {
        let (loader, loads) = CountingLoader::new();
        let cache = ModelCache::new(loader, DeviceProfile::cpu());
        let key = ModelKey::colorization(ColorizerVariant::Artistic);

        cache.get_or_load(&key).unwrap();
        cache.reset();
        assert_eq!(cache.loaded_count(), 0);
        cache.get_or_load(&key).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_callers_share_a_single_load() {
        let (mut loader, loads) = CountingLoader::new();
        loader.delay = Duration::from_millis(30);
        let cache = Arc::new(ModelCache::new(loader, DeviceProfile::cpu()));
        let key = ModelKey::generation("sd-v1-5");

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                scope.spawn(move || {
                    cache.get_or_load(&key).unwrap();
                });
            }
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
