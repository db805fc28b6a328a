//! Collision-resistant output artifact naming.

use chrono::Local;
use uuid::Uuid;

/// Produces output filenames that are practically collision-free even for
/// concurrent callers writing into the same directory, without coordination:
/// a wall-clock timestamp for humans plus a random token for uniqueness.
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    extension: String,
}

impl Default for ArtifactNamer {
    fn default() -> Self {
        Self::new("png")
    }
}

impl ArtifactNamer {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Next unique name, e.g. `generated_20240117_153012_a1b2c3d4.png`.
    pub fn next_name(&self, prefix: &str) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let token = Uuid::new_v4().simple().to_string();
        format!("{prefix}_{timestamp}_{}.{}", &token[..8], self.extension)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn name_has_expected_shape() {
        let namer = ArtifactNamer::default();
        let name = namer.next_name("generated");
        assert!(name.starts_with("generated_"));
        assert!(name.ends_with(".png"));
        // prefix, date, time, token
        assert_eq!(name.split('_').count(), 4);
    }

    #[test]
    fn custom_extension_is_used() {
        let namer = ArtifactNamer::new("jpg");
        assert!(namer.next_name("out").ends_with(".jpg"));
    }

    #[test]
    fn concurrent_names_are_distinct() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_250;

        let namer = ArtifactNamer::default();
        let names = Arc::new(Mutex::new(HashSet::new()));

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                let namer = namer.clone();
                let names = Arc::clone(&names);
                scope.spawn(move || {
                    for _ in 0..PER_THREAD {
                        names.lock().unwrap().insert(namer.next_name("generated"));
                    }
                });
            }
        });

        assert_eq!(names.lock().unwrap().len(), THREADS * PER_THREAD);
    }
}
