//! Placement annotations attached to node outputs.
//!
//! An [`OpSharding`] describes how one output is laid out across devices: fully
//! replicated, pinned to a single device, tiled over a device grid, or left to
//! manual partitioning. Annotations participate in node identity through the
//! node's sharding hash.

use itertools::Itertools;

use crate::hash::{hash_combine, HashData, HashValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShardingType {
    Replicated,
    Maximal,
    Tuple,
    Other,
    Manual,
    Unknown,
}

impl ShardingType {
    fn id(&self) -> u32 {
        match self {
            ShardingType::Replicated => 0,
            ShardingType::Maximal => 1,
            ShardingType::Tuple => 2,
            ShardingType::Other => 3,
            ShardingType::Manual => 4,
            ShardingType::Unknown => 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpSharding {
    pub kind: ShardingType,
    pub tile_assignment_dimensions: Vec<i64>,
    pub tile_assignment_devices: Vec<i64>,
    /// Meaning of trailing tile dimensions that are not sharded data dims.
    pub last_tile_dims: Vec<ShardingType>,
    pub replicate_on_last_tile_dim: bool,
    pub tuple_shardings: Vec<OpSharding>,
}

impl OpSharding {
    fn with_kind(kind: ShardingType) -> Self {
        Self {
            kind,
            tile_assignment_dimensions: vec![],
            tile_assignment_devices: vec![],
            last_tile_dims: vec![],
            replicate_on_last_tile_dim: false,
            tuple_shardings: vec![],
        }
    }

    pub fn replicated() -> Self {
        Self::with_kind(ShardingType::Replicated)
    }

    pub fn manual() -> Self {
        Self::with_kind(ShardingType::Manual)
    }

    pub fn maximal(device: i64) -> Self {
        Self {
            tile_assignment_dimensions: vec![1],
            tile_assignment_devices: vec![device],
            ..Self::with_kind(ShardingType::Maximal)
        }
    }

    /// Tiles the value over a device grid. `devices` is the row-major device
    /// assignment and must hold one entry per tile.
    pub fn tiled(dims: impl Into<Vec<i64>>, devices: impl Into<Vec<i64>>) -> Self {
        let dims = dims.into();
        let devices = devices.into();
        let tiles = dims.iter().product::<i64>();
        assert!(
            usize::try_from(tiles).is_ok_and(|n| n == devices.len()),
            "tile assignment {dims:?} ({tiles} tiles) does not match {} devices",
            devices.len()
        );
        Self {
            tile_assignment_dimensions: dims,
            tile_assignment_devices: devices,
            ..Self::with_kind(ShardingType::Other)
        }
    }

    /// Like [`OpSharding::tiled`], but the last tile dimension replicates.
    pub fn partially_replicated(
        dims: impl Into<Vec<i64>>,
        devices: impl Into<Vec<i64>>,
    ) -> Self {
        Self {
            replicate_on_last_tile_dim: true,
            ..Self::tiled(dims, devices)
        }
    }

    pub fn tuple(shardings: impl Into<Vec<OpSharding>>) -> Self {
        Self {
            tuple_shardings: shardings.into(),
            ..Self::with_kind(ShardingType::Tuple)
        }
    }

    pub fn is_replicated(&self) -> bool {
        self.kind == ShardingType::Replicated
    }

    /// Folds this annotation into `seed`.
    pub(crate) fn fold_hash(&self, seed: HashValue) -> HashValue {
        let mut h = seed;
        for d in &self.tile_assignment_dimensions {
            h = hash_combine(h, (*d as u32).hash_data());
        }
        for d in &self.tile_assignment_devices {
            h = hash_combine(h, (*d as u32).hash_data());
        }
        for t in &self.last_tile_dims {
            h = hash_combine(h, t.id().hash_data());
        }
        h = hash_combine(h, self.kind.id().hash_data());
        h = hash_combine(h, self.replicate_on_last_tile_dim.hash_data());
        for s in &self.tuple_shardings {
            h = s.fold_hash(h);
        }
        h
    }
}

impl core::fmt::Display for OpSharding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ShardingType::Replicated => write!(f, "{{replicated}}"),
            ShardingType::Manual => write!(f, "{{manual}}"),
            ShardingType::Unknown => write!(f, "{{unknown}}"),
            ShardingType::Maximal => write!(
                f,
                "{{maximal device={}}}",
                self.tile_assignment_devices.first().copied().unwrap_or(0)
            ),
            ShardingType::Tuple => {
                write!(f, "{{{}}}", self.tuple_shardings.iter().join(", "))
            }
            ShardingType::Other => {
                write!(
                    f,
                    "{{devices=[{}]{}",
                    self.tile_assignment_dimensions.iter().join(","),
                    self.tile_assignment_devices.iter().join(",")
                )?;
                if self.replicate_on_last_tile_dim {
                    write!(f, " last_tile_dim_replicate")?;
                }
                write!(f, "}}")
            }
        }
    }
}
