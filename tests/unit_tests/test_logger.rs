// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use scp_client_rs::cfg::{cli::resolve_config_path, logger::init_logger};

#[test]
fn initialises_from_yaml() -> Result<()> {
    let path = resolve_config_path("tests/config_logger.yaml")?;
    let _guard = init_logger(path.to_str().context("non-utf8 path")?)?;
    tracing::debug!("logger bootstrapped");
    Ok(())
}
