//! Which DLLs a component version ships, grouped by architecture bucket.

use std::path::Path;

use tracing::debug;

use crate::components::DllComponentKind;
use crate::config::Arch;

const DXVK_DLLS: &[&str] = &[
    "d3d8.dll",
    "d3d9.dll",
    "d3d10.dll",
    "d3d10_1.dll",
    "d3d10core.dll",
    "d3d11.dll",
    "dxgi.dll",
];

const VKD3D_DLLS: &[&str] = &["d3d12.dll", "d3d12core.dll"];

const LATENCYFLEX_BUCKET: &str = "wine/usr/lib/wine/x86_64-windows";
const LATENCYFLEX_DLLS: &[&str] = &["latencyflex_layer.dll", "latencyflex_wine.dll"];

/// Ordered map of bucket directory to DLL file names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DllDescriptor {
    buckets: Vec<(String, Vec<String>)>,
}

impl DllDescriptor {
    pub fn new<B, D>(buckets: impl IntoIterator<Item = (B, Vec<D>)>) -> Self
    where
        B: Into<String>,
        D: Into<String>,
    {
        Self {
            buckets: buckets
                .into_iter()
                .map(|(bucket, dlls)| (bucket.into(), dlls.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// The full, unchecked descriptor for a component kind.
    pub fn for_kind(kind: DllComponentKind) -> Self {
        match kind {
            DllComponentKind::Dxvk => Self::new([("x32", DXVK_DLLS.to_vec()), ("x64", DXVK_DLLS.to_vec())]),
            DllComponentKind::Vkd3d => {
                Self::new([("x86", VKD3D_DLLS.to_vec()), ("x64", VKD3D_DLLS.to_vec())])
            }
            DllComponentKind::Nvapi => Self::new([("x32", vec!["nvapi.dll"]), ("x64", vec!["nvapi64.dll"])]),
            DllComponentKind::LatencyFlex => Self::new([(LATENCYFLEX_BUCKET, LATENCYFLEX_DLLS.to_vec())]),
        }
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets
            .iter()
            .map(|(bucket, dlls)| (bucket.as_str(), dlls.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Every DLL across every bucket, in order.
    pub fn dlls(&self) -> impl Iterator<Item = (&str, &str)> {
        self.buckets
            .iter()
            .flat_map(|(bucket, dlls)| dlls.iter().map(move |dll| (bucket.as_str(), dll.as_str())))
    }

    /// Keep only what exists under `base`.
    ///
    /// Missing DLLs are dropped one by one; a bucket survives only if its
    /// directory exists and at least one of its DLLs is still listed.
    pub fn prune(&self, base: &Path) -> Self {
        let mut buckets = Vec::new();
        for (bucket, dlls) in &self.buckets {
            let dir = base.join(bucket);
            if !dir.is_dir() {
                debug!(bucket = %bucket, path = %dir.display(), "Bucket missing, pruned");
                continue;
            }
            let present: Vec<String> = dlls
                .iter()
                .filter(|dll| {
                    let exists = dir.join(dll).is_file();
                    if !exists {
                        debug!(bucket = %bucket, dll = %dll, "DLL missing, pruned");
                    }
                    exists
                })
                .cloned()
                .collect();
            if !present.is_empty() {
                buckets.push((bucket.clone(), present));
            }
        }
        Self { buckets }
    }
}

/// System directory of a prefix that receives DLLs from `bucket`.
///
/// Returns `None` for buckets with no known mapping; their DLLs are still
/// registered as overrides but never copied.
pub fn system_dir(arch: Arch, bucket: &str) -> Option<&'static str> {
    let is_32 = matches!(bucket, "x32" | "x86");
    match arch {
        Arch::Win32 if is_32 => Some("system32"),
        Arch::Win32 => None,
        Arch::Win64 if is_32 => Some("syswow64"),
        Arch::Win64
            if bucket == "x64"
                || bucket.contains("x86_64")
                || bucket.contains("lib64")
                || bucket.contains("lib/") =>
        {
            Some("system32")
        }
        Arch::Win64 => None,
    }
}

/// Base name of a DLL as used in override keys (`d3d11.dll` -> `d3d11`).
pub fn dll_base_name(dll: &str) -> &str {
    dll.strip_suffix(".dll").unwrap_or(dll)
}
