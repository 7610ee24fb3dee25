// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable consulted by [`resolve_config_path`] before falling
/// back to the given relative default.
pub const CONFIG_ENV: &str = "SCP_CLIENT_CONFIG";

/// Resolves a config path to its canonical absolute form.
///
/// `SCP_CLIENT_CONFIG` wins over the passed-in default, so test and demo
/// harnesses can redirect configs without touching call sites.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let chosen = std::env::var(CONFIG_ENV).unwrap_or_else(|_| rel.to_string());
    let p = Path::new(&chosen);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    abs.canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))
}
