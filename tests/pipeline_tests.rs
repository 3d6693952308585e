//! Pipeline failures, artifact writing and conversion verification.

mod common;

use std::path::PathBuf;

use common::{generate_default, generate_json};
use tempfile::TempDir;
use vk_thunkgen::config::OutputConfig;
use vk_thunkgen::abi::{Abi, Heap, HeapError};
use vk_thunkgen::convert::{Direction, MarshalError, Marshaller, verify_routines};
use vk_thunkgen::{GeneratorConfig, write_artifacts};

fn no_driver() -> anyhow::Result<GeneratorConfig> {
    Ok(GeneratorConfig::from_str("[driver]\nfunctions = []\n")?)
}

// =============================================================================
// Fatal errors
// =============================================================================

#[test]
fn test_unknown_parameter_type() -> Result<(), anyhow::Error> {
    let json = r#"{
      "types": [ { "category": "handle", "name": "VkDevice", "type": "VK_DEFINE_HANDLE" } ],
      "commands": [
        { "name": "vkUseWidget", "return": "void",
          "params": [
            { "name": "device", "type": "VkDevice" },
            { "name": "pWidget", "type": "VkWidget", "pointer": "*", "const": true }
          ] }
      ],
      "features": [ { "name": "VK_VERSION_1_0", "commands": ["vkUseWidget"] } ]
    }"#;
    let err = generate_json(json, &no_driver()?).unwrap_err();
    let err = err.downcast::<vk_thunkgen::Error>()?;
    assert!(err.is_unknown_type());
    assert!(err.to_string().contains("VkWidget"));
    Ok(())
}

#[test]
fn test_records_containing_each_other() -> Result<(), anyhow::Error> {
    let json = r#"{
      "types": [
        { "category": "struct", "name": "VkOuter",
          "members": [ { "name": "inner", "type": "VkInner" } ] },
        { "category": "struct", "name": "VkInner",
          "members": [ { "name": "outer", "type": "VkOuter" } ] }
      ]
    }"#;
    let err = generate_json(json, &no_driver()?).unwrap_err();
    let err = err.downcast::<vk_thunkgen::Error>()?;
    assert!(err.is_cyclic_dependency());
    Ok(())
}

#[test]
fn test_self_referencing_record() -> Result<(), anyhow::Error> {
    let json = r#"{
      "types": [
        { "category": "basetype", "name": "VkDeviceSize", "type": "uint64_t" },
        { "category": "struct", "name": "VkNode",
          "members": [
            { "name": "size", "type": "VkDeviceSize" },
            { "name": "pNext", "type": "VkNode", "pointer": "*", "const": true }
          ] }
      ],
      "commands": [
        { "name": "vkWalk", "return": "void",
          "params": [ { "name": "pNode", "type": "VkNode", "pointer": "*", "const": true } ] }
      ],
      "features": [ { "name": "VK_VERSION_1_0", "commands": ["vkWalk"] } ]
    }"#;
    let generation = generate_json(json, &no_driver()?)?;
    assert_eq!(generation.record_order.len(), 1);
    assert!(generation
        .artifacts
        .public_header
        .contains("    VkDeviceSize WINE_VK_ALIGN(8) size;\n"));
    Ok(())
}

#[test]
fn test_unknown_extension_enum_target() -> Result<(), anyhow::Error> {
    let json = r#"{
      "extensions": [
        { "name": "VK_KHR_surface", "number": 1,
          "require": { "enums": [
            { "name": "VK_ERROR_SURFACE_LOST_KHR", "extends": "VkResult", "offset": 0, "dir": "-" }
          ] } }
      ]
    }"#;
    let err = generate_json(json, &no_driver()?).unwrap_err();
    let err = err.downcast::<vk_thunkgen::Error>()?;
    assert!(err.is_unknown_type());
    Ok(())
}

// =============================================================================
// Writing artifacts
// =============================================================================

#[test]
fn test_write_default_names() -> Result<(), anyhow::Error> {
    let generation = generate_default()?;
    let dir = TempDir::new()?;

    let written = generation.write(dir.path())?;
    let names: Vec<PathBuf> = written
        .iter()
        .filter_map(|p| p.strip_prefix(dir.path()).ok().map(PathBuf::from))
        .collect();
    assert_eq!(
        names,
        vec![
            PathBuf::from("vulkan.h"),
            PathBuf::from("vulkan_driver.h"),
            PathBuf::from("vulkan_thunks.h"),
            PathBuf::from("vulkan_thunks.c"),
        ]
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("vulkan_thunks.c"))?,
        generation.artifacts.thunks_source
    );

    // Only the artifacts remain; no temporary files are left behind.
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 4);
    Ok(())
}

#[test]
fn test_write_nested_and_overwrite() -> Result<(), anyhow::Error> {
    let generation = generate_default()?;
    let dir = TempDir::new()?;
    let output = OutputConfig {
        public_header: PathBuf::from("include/wine/vulkan.h"),
        driver_header: PathBuf::from("include/wine/vulkan_driver.h"),
        ..OutputConfig::default()
    };

    std::fs::create_dir_all(dir.path().join("include/wine"))?;
    std::fs::write(dir.path().join("include/wine/vulkan.h"), "stale")?;

    write_artifacts(&generation.artifacts, dir.path(), &output)?;
    assert_eq!(
        std::fs::read_to_string(dir.path().join("include/wine/vulkan.h"))?,
        generation.artifacts.public_header
    );
    assert!(dir.path().join("include/wine/vulkan_driver.h").is_file());
    assert!(dir.path().join("vulkan_thunks.h").is_file());
    assert_eq!(std::fs::read_dir(dir.path().join("include/wine"))?.count(), 2);
    Ok(())
}

#[test]
fn test_failed_write_replaces_nothing() -> Result<(), anyhow::Error> {
    let generation = generate_default()?;
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("vulkan.h"), "stale")?;
    // A regular file where the thunks header's directory should be.
    std::fs::write(dir.path().join("blocker"), "")?;
    let output = OutputConfig {
        thunks_header: PathBuf::from("blocker/vulkan_thunks.h"),
        ..OutputConfig::default()
    };

    let err = write_artifacts(&generation.artifacts, dir.path(), &output).unwrap_err();
    assert!(err.is_io());
    assert_eq!(std::fs::read_to_string(dir.path().join("vulkan.h"))?, "stale");
    assert!(!dir.path().join("vulkan_driver.h").exists());
    assert!(!dir.path().join("vulkan_thunks.c").exists());
    // Staged temporaries are removed again.
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 2);
    Ok(())
}

#[test]
fn test_write_into_missing_directory() -> Result<(), anyhow::Error> {
    let generation = generate_default()?;
    let dir = TempDir::new()?;
    let out = dir.path().join("build").join("vulkan");

    let written = generation.write(&out)?;
    assert_eq!(written.len(), 4);
    assert!(written.iter().all(|p| p.starts_with(&out) && p.is_file()));
    Ok(())
}

// =============================================================================
// Conversion verification
// =============================================================================

#[test]
fn test_planned_routines_round_trip() -> Result<(), anyhow::Error> {
    let generation = generate_default()?;
    let report = verify_routines(&generation.registry, &generation.plan)?;

    assert!(report.is_ok(), "mismatches: {:?}", report.mismatches);
    assert_eq!(report.leaked, 0);
    for name in [
        "VkMemoryAllocateInfo",
        "VkMappedMemoryRange",
        "VkSparseMemoryBind",
        "VkSparseBufferMemoryBindInfo",
        "VkBindSparseInfo",
    ] {
        assert!(report.checked.iter().any(|c| c == name), "{name} not checked");
    }
    assert!(report
        .skipped
        .iter()
        .any(|(name, _)| name == "VkMemoryRequirements"));
    Ok(())
}

#[test]
fn test_oversized_array_count_is_an_error() -> Result<(), anyhow::Error> {
    let generation = generate_default()?;
    let registry = &generation.registry;
    let mut marshaller = Marshaller::new(registry, &generation.plan);
    let mut heap = Heap::new();

    let info = registry.lookup("VkMemoryAllocateInfo")?;
    let src = marshaller.alloc_record(&mut heap, info, Abi::Win32)?;
    let err = marshaller
        .convert_array(&mut heap, info, Direction::WinToHost, src, u32::MAX / 4)
        .unwrap_err();
    assert!(matches!(
        err,
        MarshalError::Heap(HeapError::ArrayTooLarge { count, .. }) if count == u32::MAX / 4
    ));

    // A count read out of the caller's record is checked the same way.
    let bind_info = registry.lookup("VkSparseBufferMemoryBindInfo")?;
    let src = marshaller.alloc_record(&mut heap, bind_info, Abi::Win32)?;
    let mut byte = 0u8;
    marshaller.fill(&mut heap, bind_info, src, &mut || {
        byte = byte.wrapping_add(1);
        byte
    })?;
    let count_offset = marshaller
        .layout(bind_info, Abi::Win32)?
        .field("bindCount")
        .map(|f| f.offset)
        .ok_or_else(|| anyhow::anyhow!("no bindCount"))?;
    heap.write_u32(src + count_offset, u32::MAX / 4)?;

    let dst = marshaller.alloc_record(&mut heap, bind_info, Abi::Host)?;
    let err = marshaller
        .convert(&mut heap, bind_info, Direction::WinToHost, src, dst)
        .unwrap_err();
    assert!(matches!(
        err,
        MarshalError::Heap(HeapError::ArrayTooLarge { count, .. }) if count == u32::MAX / 4
    ));
    Ok(())
}
