// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 迁移命令行入口，支持up/down/fresh/status等子命令
#[async_std::main]
async fn main() {
    cli::run_cli(migration::Migrator).await;
}
