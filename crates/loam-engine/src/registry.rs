//! Custom class registry.
//!
//! A registered class pairs a type tag with behavior: records flattened from
//! its instances carry the tag, and hydration reattaches the class so
//! [`Transaction::call`] can dispatch methods on them. Hydrating a tagged
//! record whose tag is not registered is an error; data written by a newer
//! deployment stays inert rather than silently losing its behavior.
//!
//! [`Transaction::call`]: crate::transaction::Transaction::call

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::EngineResult;
use crate::transaction::Transaction;
use crate::value::{ObjHandle, Value};

/// Behavior for one registered type tag.
///
/// `invoke` receives the scope, the instance handle, and the method name;
/// implementations read and write the instance through ordinary container
/// operations, so method effects persist like any other mutation. Unknown
/// methods must return [`EngineError::MethodNotFound`].
///
/// [`EngineError::MethodNotFound`]: crate::error::EngineError::MethodNotFound
pub trait CustomClass: Send + Sync {
    /// The tag stored in flattened records of this class.
    fn type_tag(&self) -> &str;

    /// Dispatch a method call on an instance.
    fn invoke(
        &self,
        txn: &mut Transaction,
        this: ObjHandle,
        method: &str,
        args: &[Value],
    ) -> EngineResult<Value>;
}

/// Tag → class mapping shared by every scope of a database.
#[derive(Default)]
pub struct TypeRegistry {
    classes: RwLock<HashMap<String, Arc<dyn CustomClass>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its tag. Re-registering a tag replaces the
    /// previous class.
    pub fn register(&self, class: Arc<dyn CustomClass>) {
        let tag = class.type_tag().to_string();
        self.classes
            .write()
            .expect("lock poisoned")
            .insert(tag, class);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn CustomClass>> {
        self.classes.read().expect("lock poisoned").get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.classes.read().expect("lock poisoned").contains_key(tag)
    }

    /// All registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .classes
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        tags.sort();
        tags
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
