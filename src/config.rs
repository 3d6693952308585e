//! Generator configuration parsing.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the upstream Wine behaviour. Tables given in a file are layered over the
//! default tables entry by entry rather than replacing them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::select::ExtensionPolicy;

/// Extensions processed unless a config says otherwise.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &["VK_KHR_surface", "VK_KHR_win32_surface", "VK_KHR_swapchain"];

/// Extensions never processed, along with anything requiring them.
pub const DEFAULT_DENIED_EXTENSIONS: &[&str] = &[
    "VK_EXT_acquire_xlib_display",
    "VK_EXT_debug_report",
    "VK_EXT_display_control",
    "VK_KHR_display",
    "VK_KHR_android_surface",
    "VK_KHR_xcb_surface",
    "VK_KHR_xlib_surface",
    "VK_KHR_mir_surface",
    "VK_KHR_wayland_surface",
    "VK_KHR_external_fence_fd",
    "VK_KHX_external_fence_fd",
    "VK_KHR_external_fence_win32",
    "VK_KHX_external_fence_win32",
    "VK_KHR_external_memory",
    "VK_KHX_external_memory_fd",
    "VK_KHX_external_memory_win32",
    "VK_KHR_external_semaphore",
    "VK_KHR_external_semaphore_capabilities",
    "VK_KHX_external_semaphore_capabilities",
    "VK_MVK_ios_surface",
    "VK_MVK_macos_surface",
    "VK_NN_vi_surface",
    "VK_NV_external_memory_win32",
];

/// Must be bumped whenever the driver function list or its signatures change.
pub const DEFAULT_DRIVER_VERSION: u32 = 3;

pub const DEFAULT_DRIVER_FUNCTIONS: &[&str] = &[
    "vkCreateInstance",
    "vkCreateWin32SurfaceKHR",
    "vkDestroyInstance",
    "vkDestroySurfaceKHR",
    "vkEnumerateInstanceExtensionProperties",
    "vkGetDeviceProcAddr",
    "vkGetInstanceProcAddr",
    "vkGetPhysicalDeviceWin32PresentationSupportKHR",
];

/// Functions implemented by hand: (name, emit_thunk, include_in_dispatch_table).
const DEFAULT_OVERRIDES: &[(&str, bool, bool)] = &[
    ("vkGetDeviceProcAddr", false, true),
    ("vkAllocateCommandBuffers", false, true),
    ("vkCmdExecuteCommands", false, true),
    ("vkCreateDevice", false, true),
    ("vkCreateWin32SurfaceKHR", false, true),
    ("vkDestroyDevice", false, true),
    ("vkDestroyInstance", false, true),
    ("vkDestroySurfaceKHR", false, true),
    ("vkEnumerateInstanceLayerProperties", false, false),
    ("vkEnumeratePhysicalDevices", false, true),
    ("vkFreeCommandBuffers", false, true),
    ("vkGetDeviceQueue", false, true),
    ("vkGetPhysicalDeviceWin32PresentationSupportKHR", false, true),
    ("vkQueueSubmit", false, true),
];

/// Field of each wrapper object holding the driver's own handle.
const DEFAULT_NATIVE_PAYLOADS: &[(&str, &str)] = &[
    ("VkCommandBuffer", "command_buffer"),
    ("VkDevice", "device"),
    ("VkInstance", "instance"),
    ("VkPhysicalDevice", "phys_dev"),
    ("VkQueue", "queue"),
];

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Generator configuration loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Prefix of generated entry points (`wine_vkFoo`).
    pub prefix: String,
    pub extensions: ExtensionsConfig,
    /// Functions implemented outside the generated thunks.
    pub overrides: BTreeMap<String, FunctionOverride>,
    pub driver: DriverConfig,
    /// Native handle field per dispatchable handle type.
    pub native_payloads: BTreeMap<String, String>,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            prefix: "wine_".to_string(),
            extensions: ExtensionsConfig::default(),
            overrides: default_overrides(),
            driver: DriverConfig::default(),
            native_payloads: default_native_payloads(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        for (name, value) in default_overrides() {
            config.overrides.entry(name).or_insert(value);
        }
        for (name, value) in default_native_payloads() {
            config.native_payloads.entry(name).or_insert(value);
        }
        Ok(config)
    }

    /// The extension allow/deny lists as a selection policy.
    pub fn policy(&self) -> ExtensionPolicy {
        ExtensionPolicy {
            allow: self.extensions.allow.clone(),
            deny: self.extensions.deny.clone(),
        }
    }

    pub fn override_for(&self, function: &str) -> Option<&FunctionOverride> {
        self.overrides.get(function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionsConfig {
    pub allow: BTreeSet<String>,
    pub deny: BTreeSet<String>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            allow: DEFAULT_ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            deny: DEFAULT_DENIED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Manual handling of one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FunctionOverride {
    /// Generate a thunk body. Off for functions implemented by hand.
    pub emit_thunk: bool,
    /// List the function in its scope's dispatch table and macro.
    pub include_in_dispatch_table: bool,
}

impl Default for FunctionOverride {
    fn default() -> Self {
        Self {
            emit_thunk: true,
            include_in_dispatch_table: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub version: u32,
    pub functions: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_DRIVER_VERSION,
            functions: DEFAULT_DRIVER_FUNCTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Artifact file names, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub public_header: PathBuf,
    pub driver_header: PathBuf,
    pub thunks_header: PathBuf,
    pub thunks_source: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            public_header: PathBuf::from("vulkan.h"),
            driver_header: PathBuf::from("vulkan_driver.h"),
            thunks_header: PathBuf::from("vulkan_thunks.h"),
            thunks_source: PathBuf::from("vulkan_thunks.c"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `warn` or `vk_thunkgen=debug`.
    pub level: String,
    pub format: LogFormat,
    pub color: bool,
    pub timestamps: bool,
    /// Print the module path of each event.
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
            color: true,
            timestamps: false,
            target: false,
        }
    }
}

fn default_overrides() -> BTreeMap<String, FunctionOverride> {
    DEFAULT_OVERRIDES
        .iter()
        .map(|(name, emit_thunk, include_in_dispatch_table)| {
            (
                name.to_string(),
                FunctionOverride {
                    emit_thunk: *emit_thunk,
                    include_in_dispatch_table: *include_in_dispatch_table,
                },
            )
        })
        .collect()
}

fn default_native_payloads() -> BTreeMap<String, String> {
    DEFAULT_NATIVE_PAYLOADS
        .iter()
        .map(|(handle, field)| (handle.to_string(), field.to_string()))
        .collect()
}
