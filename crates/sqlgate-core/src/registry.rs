//! Driver registry with parent-chain resolution

use std::collections::HashMap;
use std::iter;
use std::sync::Arc;

use crate::{
    Capability, DialectOps, DriverDescriptor, ErrorPattern, GateError, NativeDialectParser,
    Result, SafeOption, SemanticType, SessionOptions, normalize_type_name, type_map,
};

/// All known drivers, keyed by id
///
/// Built once at startup and read-only afterwards. Parents must be registered
/// before their children, which keeps every chain acyclic and ending at the
/// root driver.
pub struct DriverRegistry {
    root_id: String,
    drivers: HashMap<String, DriverDescriptor>,
}

impl DriverRegistry {
    /// Create a registry around the parentless root driver
    ///
    /// The root must fill every dialect slot so lookups through any chain
    /// resolve.
    pub fn new(root: DriverDescriptor) -> Result<Self> {
        if let Some(parent) = &root.parent {
            return Err(GateError::Configuration(format!(
                "root driver '{}' must not declare a parent (found '{}')",
                root.id, parent
            )));
        }
        let missing = root.ops.missing_slots();
        if !missing.is_empty() {
            return Err(GateError::Configuration(format!(
                "root driver '{}' leaves dialect slots empty: {}",
                root.id,
                missing.join(", ")
            )));
        }

        tracing::info!(driver = %root.id, "registering root driver");
        let root_id = root.id.clone();
        let mut drivers = HashMap::new();
        drivers.insert(root_id.clone(), root);
        Ok(Self { root_id, drivers })
    }

    /// Register a driver whose parent is already registered
    pub fn register(&mut self, descriptor: DriverDescriptor) -> Result<()> {
        if self.drivers.contains_key(&descriptor.id) {
            return Err(GateError::DuplicateDriver(descriptor.id));
        }
        let Some(parent) = descriptor.parent.as_deref() else {
            return Err(GateError::Configuration(format!(
                "driver '{}' has no parent; only the root driver '{}' may be parentless",
                descriptor.id, self.root_id
            )));
        };
        if !self.drivers.contains_key(parent) {
            return Err(GateError::UnknownParent {
                driver: descriptor.id.clone(),
                parent: parent.to_string(),
            });
        }

        tracing::info!(driver = %descriptor.id, parent = %parent, "registering database driver");
        self.drivers.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Look up a driver by id
    pub fn resolve(&self, id: &str) -> Result<DriverHandle<'_>> {
        self.get(id).ok_or_else(|| {
            tracing::warn!(driver = %id, "driver not found in registry");
            GateError::UnknownDriver(id.to_string())
        })
    }

    pub fn get(&self, id: &str) -> Option<DriverHandle<'_>> {
        self.drivers.get(id).map(|descriptor| DriverHandle {
            registry: self,
            descriptor,
        })
    }

    /// Nearest declared value of `capability` along the chain of `id`
    pub fn capability(&self, id: &str, capability: Capability) -> Result<bool> {
        Ok(self.resolve(id)?.capability(capability))
    }

    pub fn root(&self) -> DriverHandle<'_> {
        DriverHandle {
            registry: self,
            descriptor: &self.drivers[&self.root_id],
        }
    }

    /// List all registered driver ids, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn has(&self, id: &str) -> bool {
        self.drivers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("root_id", &self.root_id)
            .field("drivers", &self.list())
            .finish()
    }
}

/// A resolved driver; every per-driver lookup goes through here
#[derive(Clone, Copy)]
pub struct DriverHandle<'r> {
    registry: &'r DriverRegistry,
    descriptor: &'r DriverDescriptor,
}

impl<'r> DriverHandle<'r> {
    pub fn id(&self) -> &'r str {
        &self.descriptor.id
    }

    pub fn display_name(&self) -> &'r str {
        &self.descriptor.display_name
    }

    pub fn descriptor(&self) -> &'r DriverDescriptor {
        self.descriptor
    }

    pub fn registry(&self) -> &'r DriverRegistry {
        self.registry
    }

    pub fn parent(&self) -> Option<DriverHandle<'r>> {
        self.descriptor
            .parent
            .as_deref()
            .and_then(|parent| self.registry.get(parent))
    }

    /// This driver followed by its ancestors, ending at the root
    pub fn chain(self) -> impl Iterator<Item = &'r DriverDescriptor> {
        let registry = self.registry;
        iter::successors(Some(self.descriptor), move |descriptor| {
            descriptor
                .parent
                .as_deref()
                .and_then(|parent| registry.drivers.get(parent))
        })
    }

    /// Whether `ancestor` is this driver or one of its ancestors
    pub fn inherits_from(&self, ancestor: &str) -> bool {
        self.chain().any(|descriptor| descriptor.id == ancestor)
    }

    pub fn capability(&self, capability: Capability) -> bool {
        self.chain()
            .find_map(|descriptor| descriptor.capabilities.get(capability))
            .unwrap_or(false)
    }

    /// Semantic type of a native type name, nearest override first
    pub fn semantic_type(&self, native_type: &str) -> SemanticType {
        let normalized = normalize_type_name(native_type);
        self.chain()
            .find_map(|descriptor| descriptor.type_map.get(&normalized).copied())
            .or_else(|| type_map::lookup_base(&normalized))
            .unwrap_or_else(|| {
                tracing::debug!(
                    driver = %self.id(),
                    native_type = %native_type,
                    "type mapping gap, using Other"
                );
                SemanticType::Other
            })
    }

    /// Native name used to cast to `semantic`
    pub fn native_type(&self, semantic: SemanticType) -> Option<&'r str> {
        self.chain()
            .find_map(|descriptor| descriptor.cast_types.get(&semantic))
            .map(|s| s.as_str())
    }

    /// Resolve a dialect slot through the chain
    pub fn op<T>(&self, slot: impl Fn(&DialectOps) -> Option<T>) -> Option<T> {
        self.chain().find_map(|descriptor| slot(&descriptor.ops))
    }

    pub fn default_admin_user(&self) -> Option<&'r str> {
        self.chain()
            .find_map(|descriptor| descriptor.default_admin_user.as_deref())
    }

    /// Forced connection options of the whole chain, root first
    pub fn safe_options(&self) -> Vec<SafeOption> {
        let mut options: Vec<SafeOption> = Vec::new();
        let chain: Vec<_> = self.chain().collect();
        for descriptor in chain.into_iter().rev() {
            options.extend(descriptor.safe_options.iter().cloned());
        }
        options
    }

    pub fn parser(&self) -> Option<Arc<dyn NativeDialectParser>> {
        self.chain()
            .find_map(|descriptor| descriptor.parser.clone())
    }

    /// Error patterns of the whole chain, nearest first
    pub fn error_patterns(self) -> impl Iterator<Item = &'r ErrorPattern> {
        self.chain()
            .flat_map(|descriptor| descriptor.error_patterns.iter())
    }

    pub fn session_setup(&self, options: &SessionOptions) -> Vec<String> {
        self.op(|ops| ops.session_setup)
            .map(|setup| setup(options))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for DriverHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DriverHandle").field(&self.descriptor.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi_descriptor;

    fn registry() -> DriverRegistry {
        let mut registry = DriverRegistry::new(ansi_descriptor()).unwrap();
        registry
            .register(
                DriverDescriptor::new("parent")
                    .parent("sql")
                    .capability(Capability::Regex, true)
                    .native_type("JSONB", SemanticType::Text)
                    .default_admin_user("root"),
            )
            .unwrap();
        registry
            .register(
                DriverDescriptor::new("child")
                    .parent("parent")
                    .capability(Capability::FullJoin, false)
                    .native_type("jsonb", SemanticType::Other),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_child_inherits_parent_capability() {
        let registry = registry();
        assert!(registry.capability("child", Capability::Regex).unwrap());
        assert!(registry.capability("parent", Capability::FullJoin).unwrap());
    }

    #[test]
    fn test_child_override_masks_parent() {
        let registry = registry();
        assert!(!registry.capability("child", Capability::FullJoin).unwrap());
        assert_eq!(
            registry.resolve("parent").unwrap().semantic_type("jsonb"),
            SemanticType::Text
        );
        assert_eq!(
            registry.resolve("child").unwrap().semantic_type("JSONB"),
            SemanticType::Other
        );
    }

    #[test]
    fn test_undeclared_capability_defaults_to_false() {
        let registry = registry();
        assert!(!registry.capability("child", Capability::CustomActions).unwrap());
        assert!(!registry.capability("sql", Capability::Regex).unwrap());
    }

    #[test]
    fn test_lookups_fall_back_to_root() {
        let registry = registry();
        let child = registry.resolve("child").unwrap();
        assert_eq!(child.semantic_type("bigint"), SemanticType::BigInteger);
        assert_eq!(child.native_type(SemanticType::Integer), Some("INTEGER"));
        assert_eq!(child.default_admin_user(), Some("root"));
        assert!(child.op(|ops| ops.placeholder).is_some());
        assert_eq!(
            child.chain().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["child", "parent", "sql"]
        );
        assert!(child.inherits_from("parent"));
        assert!(!registry.resolve("parent").unwrap().inherits_from("child"));
    }

    #[test]
    fn test_registration_errors() {
        let mut registry = registry();

        let err = registry
            .register(DriverDescriptor::new("parent").parent("sql"))
            .unwrap_err();
        assert!(matches!(err, GateError::DuplicateDriver(id) if id == "parent"));

        let err = registry
            .register(DriverDescriptor::new("orphan").parent("missing"))
            .unwrap_err();
        assert!(matches!(err, GateError::UnknownParent { ref parent, .. } if parent == "missing"));

        let err = registry.register(DriverDescriptor::new("second-root")).unwrap_err();
        assert!(err.is_configuration());
        assert!(!registry.has("second-root"));
    }

    #[test]
    fn test_unknown_driver() {
        let registry = registry();
        let err = registry.resolve("oracle").unwrap_err();
        assert!(matches!(err, GateError::UnknownDriver(id) if id == "oracle"));
        assert!(registry.capability("oracle", Capability::Regex).is_err());
    }

    #[test]
    fn test_root_must_fill_every_slot() {
        let err = DriverRegistry::new(DriverDescriptor::new("bare")).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("truncate"));
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.capability("child", Capability::Regex).unwrap())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
