//! Fixture generators for on-disk test trees: a fake NDK, Python projects
//! and a staged Android Python `lib` directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::builder::toolchain::{HOST_TAG, WRAPPER_SUFFIX};
use crate::core::target::AndroidAbi;

/// Create an NDK skeleton under `<root>/ndk` with clang wrappers for both
/// ABIs at each of `api_levels`. Returns the NDK root.
pub fn fake_ndk(root: &Path, api_levels: &[u32]) -> PathBuf {
    let ndk = root.join("ndk");
    let prebuilt = ndk.join("toolchains/llvm/prebuilt").join(HOST_TAG);
    let bin = prebuilt.join("bin");
    fs::create_dir_all(&bin).unwrap();
    fs::create_dir_all(prebuilt.join("sysroot")).unwrap();

    for abi in AndroidAbi::ALL {
        for level in api_levels {
            for suffix in ["clang", "clang++"] {
                let name = format!("{}{}-{}{}", abi.triple(), level, suffix, WRAPPER_SUFFIX);
                fs::write(bin.join(name), "#!/bin/sh\n").unwrap();
            }
        }
    }
    for tool in ["llvm-ar", "ld", "llvm-strip"] {
        fs::write(
            bin.join(format!("{}{}", tool, std::env::consts::EXE_SUFFIX)),
            "",
        )
        .unwrap();
    }

    ndk
}

/// Create a maturin project in `dir`. With `direct_pyo3` the crate declares
/// `pyo3` itself; otherwise it only gets it through `numpy`.
pub fn maturin_project(dir: &Path, name: &str, direct_pyo3: bool) -> PathBuf {
    fs::create_dir_all(dir.join("src")).unwrap();

    fs::write(
        dir.join("pyproject.toml"),
        format!(
            r#"[build-system]
requires = ["maturin>=1.5,<2.0"]
build-backend = "maturin"

[project]
name = "{name}"
version = "1.2.3"
"#
        ),
    )
    .unwrap();

    let dependency = if direct_pyo3 {
        r#"pyo3 = { version = "0.22", features = ["extension-module"] }"#
    } else {
        r#"numpy = "0.22""#
    };
    fs::write(
        dir.join("Cargo.toml"),
        format!(
            r#"[package]
name = "{name}"
version = "1.2.3"
edition = "2021"

[lib]
crate-type = ["cdylib"]

[dependencies]
{dependency}
"#
        ),
    )
    .unwrap();
    fs::write(dir.join("src/lib.rs"), "").unwrap();

    dir.to_path_buf()
}

/// Create a setuptools project in `dir`.
pub fn standard_project(dir: &Path, name: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("pyproject.toml"),
        format!(
            r#"[build-system]
requires = ["setuptools>=68"]
build-backend = "setuptools.build_meta"

[project]
name = "{name}"
version = "0.4.0"
"#
        ),
    )
    .unwrap();
    dir.to_path_buf()
}

/// Text of a `_sysconfigdata` module for an x86_64 Android CPython.
pub fn sysconfigdata_contents(version: &str) -> String {
    let nodot = version.replace('.', "");
    format!(
        r#"# system configuration generated and used by the sysconfig module
build_time_vars = {{'ABIFLAGS': '',
 'EXT_SUFFIX': '.cpython-{nodot}-x86_64-linux-android.so',
 'MULTIARCH': 'x86_64-linux-android',
 'SOABI': 'cpython-{nodot}-x86_64-linux-android',
 'VERSION': '{version}'}}
"#
    )
}

/// Stage an Android Python `lib` directory under `root`:
/// `lib/libpython<ver>.so` and `lib/python<ver>/_sysconfigdata_*.py`.
/// Returns the `lib` directory.
pub fn sysconfig_dir(root: &Path, version: &str) -> PathBuf {
    let lib = root.join("lib");
    let stdlib = lib.join(format!("python{}", version));
    fs::create_dir_all(&stdlib).unwrap();
    fs::write(lib.join(format!("libpython{}.so", version)), "").unwrap();
    fs::write(
        stdlib.join("_sysconfigdata__android_x86_64-linux-android.py"),
        sysconfigdata_contents(version),
    )
    .unwrap();
    lib
}
