// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Top-down binary builders: plain SAH (C3) and spatial-split SBVH (C4).

pub mod sah;
pub mod sbvh;
