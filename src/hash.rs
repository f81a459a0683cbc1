//! Deterministic hashing used for node identity.
//!
//! Digests are stable across runs and processes, so they can key caches
//! that outlive a single graph.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

pub type HashValue = u64;

pub const DEFAULT_HASH_SEED: HashValue = 0x5a2d296e9;

/// Stands in for an absent value so `None` and an empty list differ.
const NULL_OPT: HashValue = 0x8655d738f3678dda;

pub fn hash_combine(a: HashValue, b: HashValue) -> HashValue {
    a ^ b
        .wrapping_add(0x9e3779b97f4a7c15)
        .wrapping_add(a << 6)
        .wrapping_add(a >> 2)
}

pub fn hash_of<T: Hash + ?Sized>(value: &T) -> HashValue {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Values that can feed an operation hash seed.
pub trait HashData {
    fn hash_data(&self) -> HashValue;
}

macro_rules! hash_data_impl {
    ($($t:ty),*) => {
        $(
            impl HashData for $t {
                fn hash_data(&self) -> HashValue {
                    hash_of(self)
                }
            }
        )*
    };
}

hash_data_impl!(bool, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, str, String);

impl HashData for f32 {
    fn hash_data(&self) -> HashValue {
        hash_of(&self.to_bits())
    }
}

impl HashData for f64 {
    fn hash_data(&self) -> HashValue {
        hash_of(&self.to_bits())
    }
}

impl<T: HashData> HashData for [T] {
    fn hash_data(&self) -> HashValue {
        self.iter()
            .fold(hash_of(&self.len()), |h, x| hash_combine(h, x.hash_data()))
    }
}

impl<T: HashData> HashData for Vec<T> {
    fn hash_data(&self) -> HashValue {
        self.as_slice().hash_data()
    }
}

impl<T: HashData> HashData for Option<T> {
    fn hash_data(&self) -> HashValue {
        match self {
            Some(v) => v.hash_data(),
            None => NULL_OPT,
        }
    }
}

impl<T: HashData + ?Sized> HashData for &T {
    fn hash_data(&self) -> HashValue {
        (**self).hash_data()
    }
}

/// Folds every argument into a single digest.
///
/// ```
/// use squall::mhash;
/// let seed = mhash!(1u32, 0.5f64, vec![vec![0i64, 1]], false);
/// assert_ne!(seed, mhash!(1u32, 1.0f64, vec![vec![0i64, 1]], false));
/// ```
#[macro_export]
macro_rules! mhash {
    ($($x:expr),+ $(,)?) => {{
        let mut h: $crate::hash::HashValue = $crate::hash::DEFAULT_HASH_SEED;
        $(
            h = $crate::hash::hash_combine(h, $crate::hash::HashData::hash_data(&$x));
        )+
        h
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_is_order_sensitive() {
        let a = hash_of("a");
        let b = hash_of("b");
        assert_ne!(hash_combine(a, b), hash_combine(b, a));
    }

    #[test]
    fn deterministic() {
        assert_eq!(hash_of("xla::cross_replica_sum"), hash_of("xla::cross_replica_sum"));
        assert_eq!(mhash!(3u32, 1.0f64), mhash!(3u32, 1.0f64));
    }

    #[test]
    fn nested_lists_keep_boundaries() {
        let a: Vec<Vec<i64>> = vec![vec![0, 1], vec![2, 3]];
        let b: Vec<Vec<i64>> = vec![vec![0], vec![1, 2, 3]];
        assert_ne!(a.hash_data(), b.hash_data());
        assert_ne!(Option::<u32>::None.hash_data(), Vec::<u32>::new().hash_data());
    }

    #[test]
    fn floats_hash_by_bits() {
        assert_ne!(mhash!(1.0f64), mhash!(0.5f64));
        assert_ne!(mhash!(0.0f64), mhash!(-0.0f64));
    }
}
