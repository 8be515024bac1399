//! Unit tests for instance.rs and adapter selection

use super::*;
use crate::rhi::mock_backend::{adapter_info, registry, registry_with, test_config, MockGpu};
use crate::rhi::AdapterType;

fn desc() -> InstanceDesc {
    InstanceDesc {
        app_name: "instance_tests".to_string(),
        enable_validation: false,
        display: None,
    }
}

#[test]
fn test_unregistered_api_fails() {
    let gpu = MockGpu::new();
    let registry = registry(&gpu);
    assert!(registry.is_registered(GraphicsApi::Vulkan));
    assert!(!registry.is_registered(GraphicsApi::DirectX12));

    let result = Instance::new(&registry, GraphicsApi::DirectX12, desc());
    assert!(matches!(result, Err(Error::InitializationFailed(_))));

    let empty = BackendRegistry::new();
    assert!(Instance::new(&empty, GraphicsApi::Vulkan, desc()).is_err());
}

#[test]
fn test_instance_without_adapters_fails() {
    let gpu = MockGpu::new();
    let registry = registry_with(&gpu, Vec::new());
    assert!(matches!(
        Instance::new(&registry, GraphicsApi::Vulkan, desc()),
        Err(Error::InitializationFailed(_))
    ));
}

#[test]
fn test_high_performance_prefers_discrete_with_most_memory() {
    let gpu = MockGpu::new();
    let registry = registry_with(
        &gpu,
        vec![
            adapter_info("integrated", AdapterType::Integrated, 512),
            adapter_info("small discrete", AdapterType::Discrete, 4096),
            adapter_info("software", AdapterType::Software, 0),
            adapter_info("big discrete", AdapterType::Discrete, 16384),
        ],
    );
    let instance = Instance::new(&registry, GraphicsApi::Vulkan, desc()).unwrap();

    assert_eq!(instance.adapters().len(), 4);
    assert_eq!(instance.search_high_performance_adapter().unwrap().name(), "big discrete");
    assert_eq!(instance.search_minimum_power_adapter().unwrap().name(), "integrated");
    assert_eq!(
        instance.select_adapter(AdapterPreference::MinimumPower).unwrap().name(),
        "integrated"
    );
}

#[test]
fn test_software_adapter_is_last_resort() {
    let gpu = MockGpu::new();
    let registry = registry_with(
        &gpu,
        vec![
            adapter_info("warp", AdapterType::Software, 0),
            adapter_info("virtual", AdapterType::Virtual, 1024),
        ],
    );
    let instance = Instance::new(&registry, GraphicsApi::Vulkan, desc()).unwrap();
    assert_eq!(instance.search_high_performance_adapter().unwrap().name(), "virtual");
    assert_eq!(instance.search_minimum_power_adapter().unwrap().name(), "virtual");
}

#[test]
fn test_adapter_creates_device_with_validated_config() {
    let gpu = MockGpu::new();
    let registry = registry(&gpu);
    let instance = Instance::new(&registry, GraphicsApi::Vulkan, desc()).unwrap();
    let adapter = instance.select_adapter(AdapterPreference::HighPerformance).unwrap();

    let device = adapter.create_device(&test_config()).unwrap();
    assert_eq!(device.adapter_info().name, "Mock GPU");

    let mut bad = test_config();
    bad.frame_buffer_count = 5;
    assert!(matches!(adapter.create_device(&bad), Err(Error::InitializationFailed(_))));
}
