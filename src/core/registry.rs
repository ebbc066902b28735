// Copyright @yucwang 2026

use crate::core::error::{Result, VolumeError};
use crate::core::volume::Volume;
use crate::volumes::BuiltinVolumes;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

pub type VolumeConstructor = Arc<dyn Fn() -> Box<dyn Volume> + Send + Sync>;

type ConstructorTable = HashMap<String, VolumeConstructor>;

// Type name to constructor. The built-in variants are loaded on first
// access; registering a name twice replaces the earlier constructor.
static REGISTRY: OnceLock<RwLock<ConstructorTable>> = OnceLock::new();

/// A set of volume variants registered together, e.g. by a plugin crate.
pub trait VolumeModule {
    fn name(&self) -> &str;
    fn register(&self, registrar: &mut Registrar<'_>);
}

pub struct Registrar<'a> {
    table: &'a mut ConstructorTable,
    module: &'a str,
}

impl<'a> Registrar<'a> {
    pub fn register<F>(&mut self, type_name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Volume> + Send + Sync + 'static,
    {
        insert(self.table, type_name, Arc::new(constructor), self.module);
    }
}

fn insert(table: &mut ConstructorTable, type_name: &str, constructor: VolumeConstructor, module: &str) {
    if table.insert(type_name.to_string(), constructor).is_some() {
        log::debug!("Volume type '{}' re-registered by module '{}'.", type_name, module);
    } else {
        log::debug!("Volume type '{}' registered by module '{}'.", type_name, module);
    }
}

fn registry() -> &'static RwLock<ConstructorTable> {
    REGISTRY.get_or_init(|| {
        let mut table = ConstructorTable::new();
        let module = BuiltinVolumes;
        let mut registrar = Registrar { table: &mut table, module: module.name() };
        module.register(&mut registrar);
        RwLock::new(table)
    })
}

/// Register a single volume type.
pub fn register_volume<F>(type_name: &str, constructor: F)
where
    F: Fn() -> Box<dyn Volume> + Send + Sync + 'static,
{
    let mut table = registry().write().unwrap_or_else(PoisonError::into_inner);
    insert(&mut table, type_name, Arc::new(constructor), "<direct>");
}

/// Let a module register all of its volume types.
pub fn load_module(module: &dyn VolumeModule) {
    let mut table = registry().write().unwrap_or_else(PoisonError::into_inner);
    let before = table.len();
    let mut registrar = Registrar { table: &mut table, module: module.name() };
    module.register(&mut registrar);
    log::info!("Loaded volume module '{}' ({} new type(s)).", module.name(), table.len() - before);
}

/// Create a volume of the given registered type.
pub fn create_instance(type_name: &str) -> Result<Box<dyn Volume>> {
    // The lock is released before construction so constructors may create
    // other volumes.
    let constructor = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(type_name)
        .cloned()
        .ok_or_else(|| VolumeError::UnknownType(type_name.to_string()))?;

    let mut volume = constructor();
    volume.base_mut().set_type_name(type_name);
    log::debug!("Created volume {}.", volume.base().label());
    Ok(volume)
}

pub fn is_registered(type_name: &str) -> bool {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(type_name)
}

/// Registered type names, sorted.
pub fn registered_types() -> Vec<String> {
    let mut names: Vec<String> = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::computation_node::ComputationNode;
    use crate::core::volume::SAMPLE_MISS;
    use crate::math::constants::{Float, Vector3f, Vector3i};
    use crate::volumes::const_volume::ConstantVolume;
    use crate::volumes::structured_volume::StructuredVolume;
    use crate::volumes::voxel::float_bytes;

    #[test]
    fn builtin_types_are_registered() {
        for name in ["structured_regular", "constant", "data_distributed"] {
            assert!(is_registered(name), "{} missing", name);
            let vol = create_instance(name).unwrap();
            assert_eq!(vol.base().type_name(), name);
        }
        assert!(registered_types().contains(&"constant".to_string()));
    }

    #[test]
    fn created_volumes_are_computation_nodes() {
        let a = create_instance("constant").unwrap();
        let b = create_instance("constant").unwrap();
        assert_ne!(ComputationNode::id(a.as_ref()), ComputationNode::id(b.as_ref()));
        assert_eq!(ComputationNode::id(a.as_ref()), a.base().id());
        let text = ComputationNode::to_string(a.as_ref());
        assert_eq!(text, format!("constant{}", a.base().id()));
    }

    #[test]
    fn unknown_type_is_a_lookup_error() {
        match create_instance("no_such_volume") {
            Err(VolumeError::UnknownType(name)) => assert_eq!(name, "no_such_volume"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("lookup should fail"),
        }
    }

    #[test]
    fn reregistration_replaces_constructor() {
        register_volume("registry_test_swap", || Box::new(ConstantVolume::new()));
        let first = create_instance("registry_test_swap").unwrap();
        assert!(first.as_any().downcast_ref::<ConstantVolume>().is_some());

        register_volume("registry_test_swap", || Box::new(StructuredVolume::new()));
        let second = create_instance("registry_test_swap").unwrap();
        assert!(second.as_any().downcast_ref::<StructuredVolume>().is_some());
        assert_eq!(second.base().type_name(), "registry_test_swap");
    }

    struct TestModule;

    impl VolumeModule for TestModule {
        fn name(&self) -> &str {
            "registry_test_module"
        }

        fn register(&self, registrar: &mut Registrar<'_>) {
            registrar.register("registry_test_a", || Box::new(ConstantVolume::new()));
            registrar.register("registry_test_b", || Box::new(StructuredVolume::new()));
        }
    }

    #[test]
    fn modules_register_their_types() {
        load_module(&TestModule);
        assert!(is_registered("registry_test_a"));
        assert_eq!(create_instance("registry_test_b").unwrap().base().type_name(), "registry_test_b");
    }

    #[test]
    fn testgrid_round_trip() {
        register_volume("testgrid", || {
            let mut vol = StructuredVolume::new();
            let _ = vol.set_param("dimensions", Vector3i::new(4, 4, 4).into());
            Box::new(vol)
        });

        let mut vol = create_instance("testgrid").unwrap();
        assert_eq!(vol.base().type_name(), "testgrid");
        let ones = float_bytes(&[1.0; 8]);
        assert!(vol.set_region(&ones, &Vector3i::new(1, 1, 1), &Vector3i::new(2, 2, 2)));
        vol.commit().unwrap();

        let points = [
            Vector3f::new(1.0, 1.0, 1.0),
            Vector3f::new(0.0, 0.0, 0.0),
            Vector3f::new(9.0, 0.0, 0.0),
        ];
        let mut out: [Float; 3] = [SAMPLE_MISS; 3];
        vol.compute_samples(&mut out, &points);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 0.0);
        assert!(out[2].is_nan());
    }
}
