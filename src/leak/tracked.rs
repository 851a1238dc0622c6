use std::fmt;
use std::sync::{Arc, Weak};

/// A weak observation of an object expected to deallocate.
///
/// Holds no strong reference: building a `Tracked` never keeps the object
/// alive, and the detector can only ask whether it is still alive.
pub struct Tracked {
    description: String,
    alive: Box<dyn Fn() -> bool + Send + Sync>,
}

impl Tracked {
    /// Observe `object`, described by its type name.
    pub fn of<T>(object: &Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self::named(object, std::any::type_name::<T>())
    }

    /// Observe `object` under an explicit description.
    pub fn named<T>(object: &Arc<T>, description: impl Into<String>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let weak: Weak<T> = Arc::downgrade(object);
        Self {
            description: description.into(),
            alive: Box::new(move || weak.strong_count() > 0),
        }
    }

    /// Whether the observed object is still alive.
    pub fn is_alive(&self) -> bool {
        (self.alive)()
    }

    /// Description used in leak reports.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("description", &self.description)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observes_without_retaining() {
        let object = Arc::new(5u32);
        let tracked = Tracked::of(&object);
        assert!(tracked.is_alive());
        assert_eq!(tracked.description(), "u32");

        drop(object);
        assert!(!tracked.is_alive());
    }

    #[test]
    fn observes_trait_objects() {
        let object: Arc<dyn fmt::Debug + Send + Sync> = Arc::new("view");
        let tracked = Tracked::named(&object, "view");
        let clone = object.clone();
        drop(object);
        assert!(tracked.is_alive());
        drop(clone);
        assert!(!tracked.is_alive());
    }
}
