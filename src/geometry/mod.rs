// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Geometry module - mesh representation, topology queries and primitives

mod bbox;
mod mesh;
pub mod primitives;
pub mod topology;

pub use bbox::Aabb;
pub use mesh::{Mesh, Triangle, Vertex};
pub use topology::{EdgeKind, EdgeMap};
