use itertools::Itertools;

use crate::dtype::{self, Dtype};

/// Dimension size marking an unbounded dynamic dimension.
pub const UNBOUNDED_SIZE: i64 = i64::MIN;

/// Shape of a node output. Multi-output nodes carry a tuple with one entry
/// per output.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Array { dtype: Dtype, dims: Vec<i64> },
    Tuple(Vec<Shape>),
}

impl Shape {
    pub fn array(dtype: Dtype, dims: impl Into<Vec<i64>>) -> Self {
        Shape::Array {
            dtype,
            dims: dims.into(),
        }
    }

    pub fn scalar(dtype: Dtype) -> Self {
        Shape::array(dtype, vec![])
    }

    pub fn token() -> Self {
        Shape::scalar(dtype::token)
    }

    pub fn tuple(shapes: impl Into<Vec<Shape>>) -> Self {
        Shape::Tuple(shapes.into())
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Shape::Tuple(_))
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Shape::Array { dtype, .. } if dtype.is_token())
    }

    /// Number of tuple elements, zero for array shapes.
    pub fn tuple_arity(&self) -> usize {
        match self {
            Shape::Tuple(s) => s.len(),
            Shape::Array { .. } => 0,
        }
    }

    pub fn tuple_shapes(&self) -> &[Shape] {
        match self {
            Shape::Tuple(s) => s,
            Shape::Array { .. } => &[],
        }
    }

    pub fn dtype(&self) -> Option<Dtype> {
        match self {
            Shape::Array { dtype, .. } => Some(*dtype),
            Shape::Tuple(_) => None,
        }
    }

    pub fn dims(&self) -> &[i64] {
        match self {
            Shape::Array { dims, .. } => dims,
            Shape::Tuple(_) => &[],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims().len()
    }

    pub fn is_unbounded_dynamic(&self) -> bool {
        self.dims().iter().any(|d| *d == UNBOUNDED_SIZE)
    }

    pub fn is_unbounded_dynamic_dimension(&self, dim: usize) -> bool {
        self.dims().get(dim).is_some_and(|d| *d == UNBOUNDED_SIZE)
    }

    /// Number of elements, `None` for tuples and unbounded shapes.
    pub fn element_count(&self) -> Option<i64> {
        match self {
            Shape::Array { dims, .. } if !self.is_unbounded_dynamic() => {
                Some(crate::utils::prod(dims))
            }
            _ => None,
        }
    }

    pub fn byte_size(&self) -> Option<usize> {
        match self {
            Shape::Array { dtype, .. } => {
                Some(usize::try_from(self.element_count()?).ok()? * dtype.size)
            }
            Shape::Tuple(s) => s.iter().map(|s| s.byte_size()).sum(),
        }
    }
}

impl core::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Array { dtype, dims } => write!(
                f,
                "{}[{}]",
                dtype,
                dims.iter()
                    .map(|d| if *d == UNBOUNDED_SIZE {
                        "?".to_string()
                    } else {
                        d.to_string()
                    })
                    .join(",")
            ),
            Shape::Tuple(s) => write!(f, "({})", s.iter().join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let s = Shape::tuple(vec![
            Shape::array(dtype::float32, [4, 4]),
            Shape::array(dtype::float32, [UNBOUNDED_SIZE, 2]),
            Shape::scalar(dtype::uint32),
        ]);
        assert_eq!(s.to_string(), "(f32[4,4], f32[?,2], u32[])");
        assert_eq!(Shape::token().to_string(), "token[]");
    }

    #[test]
    fn tuple_accessors() {
        let a = Shape::array(dtype::int32, [2, 3]);
        assert_eq!(a.tuple_arity(), 0);
        assert_eq!(a.element_count(), Some(6));
        assert_eq!(a.byte_size(), Some(24));
        let t = Shape::tuple(vec![a.clone(), Shape::token()]);
        assert!(t.is_tuple());
        assert_eq!(t.tuple_arity(), 2);
        assert_eq!(t.tuple_shapes()[0], a);
        assert!(t.tuple_shapes()[1].is_token());
        assert_eq!(t.element_count(), None);
    }

    #[test]
    fn unbounded() {
        let s = Shape::array(dtype::float32, [UNBOUNDED_SIZE, 8]);
        assert!(s.is_unbounded_dynamic());
        assert!(s.is_unbounded_dynamic_dimension(0));
        assert!(!s.is_unbounded_dynamic_dimension(1));
        assert!(!s.is_unbounded_dynamic_dimension(7));
        assert_eq!(s.element_count(), None);
    }

    #[test]
    fn negative_dims_have_no_byte_size() {
        let s = Shape::array(dtype::float32, [-2, 3]);
        assert_eq!(s.element_count(), Some(-6));
        assert_eq!(s.byte_size(), None);
        let t = Shape::tuple(vec![Shape::scalar(dtype::float32), s]);
        assert_eq!(t.byte_size(), None);
    }
}
