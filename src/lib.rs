// Copyright 2026 the tsls authors. MIT license.

pub mod flags;
pub mod lsp;
